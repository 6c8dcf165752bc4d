// External imports
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::cast::ToElement;
use burn_autodiff::Autodiff;
use burn_ndarray::{NdArray, NdArrayDevice};
use log::{debug, info};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::path::PathBuf;

// Internal imports
use super::step_1_tensor_preparation::{
    batch_tensors, build_windows, chronological_split, tensor_to_vec, windows_to_tensors,
    MinMaxScaler,
};
use super::step_3_lstm_model_arch::{OrderLstmConfig, OrderLstmModel};
use super::step_6_model_serialization::ModelMetadata;
use crate::config::{ForecastConfig, Hyperparameters};
use crate::error::{ForecastError, Result};
use crate::util::file_utils::f64_values;
use crate::util::model_utils::{ModelStore, TargetMetric};

type TrainBackend = Autodiff<NdArray<f32>>;

/// Everything the trainer needs besides the data
#[derive(Debug, Clone)]
pub struct TrainingOptions {
    pub params: Hyperparameters,
    pub lookback: usize,
    pub horizon: usize,
    pub split_ratio: f64,
    pub seed: u64,
}

impl TrainingOptions {
    pub fn from_config(config: &ForecastConfig, metric: TargetMetric) -> Self {
        Self {
            params: config.hyperparameters(metric).clone(),
            lookback: config.lookback,
            horizon: config.horizon,
            split_ratio: config.split_ratio,
            seed: config.seed,
        }
    }

    /// Rows each split needs to yield at least one window
    pub fn min_split_rows(&self) -> usize {
        (2 * self.lookback + 1).max(self.lookback + self.horizon)
    }
}

/// Outcome of one training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub metric: TargetMetric,
    pub train_samples: usize,
    pub test_samples: usize,
    /// Mean training loss per epoch
    pub loss_history: Vec<f64>,
    /// Held-out mean absolute percentage error, as a fraction
    pub test_mape: f64,
    pub model_path: PathBuf,
}

impl TrainingReport {
    pub fn final_loss(&self) -> Option<f64> {
        self.loss_history.last().copied()
    }
}

/// Mean absolute percentage error as a fraction
///
/// Points whose actual value is zero carry no percentage and are skipped;
/// with no usable points the error is 0.
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let (sum, count) = actual
        .iter()
        .zip(predicted)
        .filter(|(a, _)| a.abs() > f64::EPSILON)
        .fold((0.0, 0usize), |(sum, count), (a, p)| {
            (sum + ((a - p) / a).abs(), count + 1)
        });

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Train the LSTM for one metric column and persist it
///
/// # Arguments
///
/// * `table` - Series table holding the metric column (daily aggregates)
/// * `metric` - Metric to train; selects the column and the storage key
/// * `options` - Hyperparameters, window sizes, split ratio and shuffle seed
/// * `store` - Where the model is written; any previous model is overwritten
///
/// # Returns
///
/// A report with the loss history and the held-out MAPE
pub fn train_model(
    table: &DataFrame,
    metric: TargetMetric,
    options: &TrainingOptions,
    store: &ModelStore,
) -> Result<TrainingReport> {
    info!("Starting {} model training...", metric);
    let device = NdArrayDevice::default();

    let values = f64_values(table, metric.column_name())?;
    let (train, test) = chronological_split(&values, options.split_ratio);

    let required = options.min_split_rows();
    let available = train.len().min(test.len());
    if available < required {
        return Err(ForecastError::InsufficientData {
            available,
            required,
        });
    }

    let scaler = MinMaxScaler::fit(train);
    let train_windows = build_windows(&scaler.transform(train), options.lookback, options.horizon)?;
    let test_windows = build_windows(&scaler.transform(test), options.lookback, options.horizon)?;
    info!(
        "Data split: train samples: {}, test samples: {}",
        train_windows.len(),
        test_windows.len()
    );

    let params = &options.params;
    let config = OrderLstmConfig::new(params.hidden_units, options.lookback, options.horizon);
    let mut model: OrderLstmModel<TrainBackend> = config.init(&device);
    let mut optimizer = AdamConfig::new().init();
    let mut rng = StdRng::seed_from_u64(options.seed);

    let mut order: Vec<usize> = (0..train_windows.len()).collect();
    let mut loss_history = Vec::with_capacity(params.epochs);
    for epoch in 1..=params.epochs {
        order.shuffle(&mut rng);

        let mut epoch_loss = 0.0;
        let mut batches = 0;
        for rows in order.chunks(params.batch_size) {
            let (features, targets) = batch_tensors::<TrainBackend>(&train_windows, rows, &device);

            // Mean squared error
            let predictions = model.forward(features);
            let diff = predictions - targets;
            let loss = (diff.clone() * diff).mean();
            epoch_loss += loss.clone().into_scalar().to_f64();
            batches += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(params.learning_rate, model, grads);
        }

        let avg_loss = epoch_loss / batches as f64;
        debug!("Epoch {}/{}: train loss = {:.6}", epoch, params.epochs, avg_loss);
        loss_history.push(avg_loss);
    }

    let model = model.valid();

    // Held-out evaluation on the original scale
    let (test_features, _) = windows_to_tensors::<NdArray<f32>>(&test_windows, &device);
    let predicted = tensor_to_vec(model.predict(test_features))?;
    let actual: Vec<f64> = test_windows.targets.iter().copied().collect();
    let test_mape = mean_absolute_percentage_error(
        &scaler.inverse_transform(&actual),
        &scaler.inverse_transform(&predicted),
    );
    info!("{} model test MAPE: {:.4}", metric, test_mape);

    let metadata = ModelMetadata::new(metric, config, scaler, Some(test_mape));
    let model_path = store.save(metric, &model, &metadata)?;

    info!("Training completed and model saved.");
    Ok(TrainingReport {
        metric,
        train_samples: train_windows.len(),
        test_samples: test_windows.len(),
        loss_history,
        test_mape,
        model_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ORDER_COUNT, TOTAL_VALUE};
    use tempfile::tempdir;

    fn options(epochs: usize) -> TrainingOptions {
        TrainingOptions {
            params: Hyperparameters {
                hidden_units: 4,
                epochs,
                batch_size: 8,
                learning_rate: 0.01,
            },
            lookback: 3,
            horizon: 1,
            split_ratio: 0.7,
            seed: 7,
        }
    }

    fn daily_table(days: usize) -> DataFrame {
        let counts: Vec<f64> = (0..days).map(|d| 5.0 + (d % 7) as f64).collect();
        let totals: Vec<f64> = counts.iter().map(|c| c * 12.5).collect();
        df!(ORDER_COUNT => counts, TOTAL_VALUE => totals).unwrap()
    }

    #[test]
    fn test_mape() {
        let mape = mean_absolute_percentage_error(&[100.0, 0.0, 50.0], &[110.0, 3.0, 40.0]);
        assert!((mape - 0.15).abs() < 1e-12);
        assert_eq!(mean_absolute_percentage_error(&[0.0], &[1.0]), 0.0);
    }

    #[test]
    fn test_min_split_rows() {
        assert_eq!(options(1).min_split_rows(), 7);
        let mut long_horizon = options(1);
        long_horizon.horizon = 6;
        assert_eq!(long_horizon.min_split_rows(), 9);
    }

    #[test]
    fn test_train_model_persists_and_reports() {
        let temp_dir = tempdir().unwrap();
        let store = ModelStore::new(temp_dir.path());

        let report = train_model(&daily_table(60), TargetMetric::Orders, &options(3), &store).unwrap();

        // 42 train rows and 18 test rows, each losing 2 * lookback
        assert_eq!(report.train_samples, 36);
        assert_eq!(report.test_samples, 12);
        assert_eq!(report.loss_history.len(), 3);
        assert!(report.final_loss().unwrap().is_finite());
        assert!(report.test_mape.is_finite());
        assert!(store.contains(TargetMetric::Orders));
        assert!(report.model_path.exists());
    }

    #[test]
    fn test_train_model_insufficient_rows() {
        let temp_dir = tempdir().unwrap();
        let store = ModelStore::new(temp_dir.path());

        let err = train_model(&daily_table(12), TargetMetric::Earnings, &options(1), &store).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientData { available: 4, required: 7 }
        ));
        assert!(!store.contains(TargetMetric::Earnings));
    }

    #[test]
    fn test_train_model_missing_column() {
        let temp_dir = tempdir().unwrap();
        let store = ModelStore::new(temp_dir.path());
        let table = df!("other" => &[1.0, 2.0]).unwrap();

        let err = train_model(&table, TargetMetric::Orders, &options(1), &store).unwrap_err();
        assert!(matches!(err, ForecastError::MissingColumn(_)));
    }
}
