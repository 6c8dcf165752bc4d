use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::SystemTime;

use super::step_1_tensor_preparation::MinMaxScaler;
use super::step_3_lstm_model_arch::{OrderLstmConfig, OrderLstmModel};
use crate::constants::{METADATA_EXTENSION, MODEL_EXTENSION};
use crate::error::{ForecastError, Result};
use crate::util::model_utils::TargetMetric;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ModelMetadata {
    pub version: String,
    pub timestamp: u64,
    pub metric: TargetMetric,
    pub model: OrderLstmConfig,
    /// Scaler fitted on the training split
    pub scaler: MinMaxScaler,
    /// Held-out mean absolute percentage error, as a fraction
    pub test_mape: Option<f64>,
}

impl ModelMetadata {
    pub fn new(
        metric: TargetMetric,
        model: OrderLstmConfig,
        scaler: MinMaxScaler,
        test_mape: Option<f64>,
    ) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            metric,
            model,
            scaler,
            test_mape,
        }
    }
}

type Recorder = BinFileRecorder<FullPrecisionSettings>;

/// Save the model weights and metadata next to `path`
pub fn save_model_with_metadata<B: Backend>(
    model: &OrderLstmModel<B>,
    metadata: &ModelMetadata,
    path: impl AsRef<Path>,
) -> Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent)?;
    }

    let model_path = path.as_ref().with_extension(MODEL_EXTENSION);
    model
        .clone()
        .save_file::<Recorder, _>(&model_path, &Recorder::default())
        .map_err(|e| ForecastError::Record(format!("{e:?}")))?;

    let metadata_path = path.as_ref().with_extension(METADATA_EXTENSION);
    let metadata_json = serde_json::to_string_pretty(metadata)?;
    std::fs::write(&metadata_path, metadata_json)?;
    Ok(())
}

/// Load the metadata stored next to `path`
pub fn load_metadata(path: impl AsRef<Path>) -> Result<ModelMetadata> {
    let metadata_path = path.as_ref().with_extension(METADATA_EXTENSION);
    let metadata_json = std::fs::read_to_string(&metadata_path)?;
    Ok(serde_json::from_str(&metadata_json)?)
}

/// Load a model whose dimensions are taken from its metadata
pub fn load_model_with_metadata<B: Backend>(
    path: impl AsRef<Path>,
    device: &B::Device,
) -> Result<(OrderLstmModel<B>, ModelMetadata)> {
    let metadata = load_metadata(path.as_ref())?;

    let model_path = path.as_ref().with_extension(MODEL_EXTENSION);
    let model = metadata
        .model
        .init::<B>(device)
        .load_file::<Recorder, _>(&model_path, &Recorder::default(), device)
        .map_err(|e| ForecastError::Record(format!("{e:?}")))?;

    Ok((model, metadata))
}
