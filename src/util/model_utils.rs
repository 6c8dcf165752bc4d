use burn::prelude::Backend;
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::{METADATA_EXTENSION, MODEL_EXTENSION, ORDER_COUNT, TOTAL_VALUE};
use crate::error::{ForecastError, Result};
use crate::lstm::{
    step_3_lstm_model_arch::OrderLstmModel,
    step_6_model_serialization::{load_model_with_metadata, save_model_with_metadata, ModelMetadata},
};

/// Series a model can be trained on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetMetric {
    Orders,
    Earnings,
}

impl TargetMetric {
    pub const ALL: [TargetMetric; 2] = [TargetMetric::Orders, TargetMetric::Earnings];

    pub fn name(&self) -> &'static str {
        match self {
            TargetMetric::Orders => "orders",
            TargetMetric::Earnings => "earnings",
        }
    }

    /// Column of the daily aggregate table holding this metric
    pub fn column_name(&self) -> &'static str {
        match self {
            TargetMetric::Orders => ORDER_COUNT,
            TargetMetric::Earnings => TOTAL_VALUE,
        }
    }

    /// Storage key of the persisted model, independent of column naming
    pub fn storage_key(&self) -> &'static str {
        match self {
            TargetMetric::Orders => "orders_model",
            TargetMetric::Earnings => "earnings_model",
        }
    }
}

impl fmt::Display for TargetMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TargetMetric {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "orders" => Ok(TargetMetric::Orders),
            "earnings" => Ok(TargetMetric::Earnings),
            _ => Err(ForecastError::UnknownTarget(s.to_string())),
        }
    }
}

/// A forecast request: a metric, optionally narrowed to one customer
///
/// Written as `orders`, `earnings`, or `<metric>_<customer id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastTarget {
    pub metric: TargetMetric,
    pub customer_id: Option<String>,
}

impl ForecastTarget {
    pub fn metric(metric: TargetMetric) -> Self {
        Self {
            metric,
            customer_id: None,
        }
    }

    pub fn customer(metric: TargetMetric, customer_id: impl Into<String>) -> Self {
        Self {
            metric,
            customer_id: Some(customer_id.into()),
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        match raw.split_once('_') {
            None => Ok(Self::metric(raw.parse()?)),
            Some((_, customer)) if customer.is_empty() => {
                Err(ForecastError::UnknownTarget(raw.to_string()))
            }
            Some((metric, customer)) => Ok(Self::customer(metric.parse()?, customer)),
        }
    }

    /// Column of the series table the forecast reads
    pub fn column_name(&self) -> &str {
        match &self.customer_id {
            Some(customer) => customer,
            None => self.metric.column_name(),
        }
    }
}

impl fmt::Display for ForecastTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.customer_id {
            Some(customer) => write!(f, "{}_{}", self.metric, customer),
            None => write!(f, "{}", self.metric),
        }
    }
}

/// Directory of persisted models, one per [`TargetMetric`]
///
/// Each model is a weights file plus a JSON metadata sidecar. Saving
/// overwrites whatever was stored for the metric before.
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path without extension; weights and metadata hang off it
    pub fn base_path(&self, metric: TargetMetric) -> PathBuf {
        self.root.join(metric.storage_key())
    }

    pub fn model_path(&self, metric: TargetMetric) -> PathBuf {
        self.base_path(metric).with_extension(MODEL_EXTENSION)
    }

    pub fn metadata_path(&self, metric: TargetMetric) -> PathBuf {
        self.base_path(metric).with_extension(METADATA_EXTENSION)
    }

    pub fn contains(&self, metric: TargetMetric) -> bool {
        self.model_path(metric).exists() && self.metadata_path(metric).exists()
    }

    pub fn save<B: Backend>(
        &self,
        metric: TargetMetric,
        model: &OrderLstmModel<B>,
        metadata: &ModelMetadata,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;
        let base_path = self.base_path(metric);
        save_model_with_metadata(model, metadata, &base_path)?;

        let model_path = self.model_path(metric);
        info!("Model for {} saved to: {}", metric, model_path.display());
        Ok(model_path)
    }

    pub fn load<B: Backend>(
        &self,
        metric: TargetMetric,
        device: &B::Device,
    ) -> Result<(OrderLstmModel<B>, ModelMetadata)> {
        if !self.contains(metric) {
            return Err(ForecastError::ModelNotFound {
                target: metric.to_string(),
                path: self.model_path(metric),
            });
        }

        info!("Loading model for {} from: {}", metric, self.model_path(metric).display());
        load_model_with_metadata(self.base_path(metric), device)
    }
}
