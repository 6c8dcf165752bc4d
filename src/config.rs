//! Pipeline configuration.
//!
//! Every setting is read once into a [`ForecastConfig`] which is then passed
//! explicitly into the pipeline functions. Values come from the process
//! environment (optionally seeded from a `.env` file by the binary) or from any
//! other key lookup through [`ForecastConfig::from_lookup`].

use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_EPOCHS, DEFAULT_HIDDEN_UNITS, DEFAULT_HORIZON,
    DEFAULT_LEARNING_RATE, DEFAULT_LOOKBACK, DEFAULT_MODEL_DIR, DEFAULT_PREDICTIONS,
    DEFAULT_RESULTS_FILE, DEFAULT_SEED, TRAIN_SPLIT_RATIO,
};
use crate::util::model_utils::TargetMetric;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("variable {0} is not present in the configuration")]
    Missing(String),

    #[error("demanded type of type cast {ty:?} for variable {key} is invalid in the configuration (got {value:?})")]
    InvalidCast {
        key: String,
        value: String,
        ty: &'static str,
    },

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// Training hyperparameters for one target metric
#[derive(Debug, Clone, PartialEq)]
pub struct Hyperparameters {
    pub hidden_units: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            hidden_units: DEFAULT_HIDDEN_UNITS,
            epochs: DEFAULT_EPOCHS,
            batch_size: DEFAULT_BATCH_SIZE,
            learning_rate: DEFAULT_LEARNING_RATE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForecastConfig {
    pub data_dir: PathBuf,
    pub file_name: String,
    pub model_dir: PathBuf,
    pub results_file: PathBuf,
    pub lookback: usize,
    pub horizon: usize,
    pub predictions: usize,
    pub split_ratio: f64,
    pub seed: u64,
    pub customer_ids: Vec<String>,
    pub orders: Hyperparameters,
    pub earnings: Hyperparameters,
}

impl ForecastConfig {
    /// Build the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir: String = get_config(&lookup, "DIR_NAME", None)?;
        let file_name: String = get_config(&lookup, "FILENAME", None)?;
        let model_dir: String = get_config(&lookup, "MODEL_DIR", Some(DEFAULT_MODEL_DIR))?;
        let results_file: String =
            get_config(&lookup, "RESULTS_FILE", Some(DEFAULT_RESULTS_FILE))?;

        let lookback: usize = get_config(&lookup, "LOOKBACK", Some(&DEFAULT_LOOKBACK.to_string()))?;
        let horizon: usize = get_config(&lookup, "HORIZON", Some(&DEFAULT_HORIZON.to_string()))?;
        let predictions: usize =
            get_config(&lookup, "PREDICTIONS", Some(&DEFAULT_PREDICTIONS.to_string()))?;
        let split_ratio: f64 =
            get_config(&lookup, "SPLIT_RATIO", Some(&TRAIN_SPLIT_RATIO.to_string()))?;
        let seed: u64 = get_config(&lookup, "TRAINING_SEED", Some(&DEFAULT_SEED.to_string()))?;

        let customer_ids = lookup("CUSTOMER_IDS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        if lookback == 0 {
            return Err(invalid("LOOKBACK", "must be at least 1"));
        }
        if horizon == 0 {
            return Err(invalid("HORIZON", "must be at least 1"));
        }
        if !(split_ratio > 0.0 && split_ratio < 1.0) {
            return Err(invalid("SPLIT_RATIO", "must lie strictly between 0 and 1"));
        }

        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            file_name,
            model_dir: PathBuf::from(model_dir),
            results_file: PathBuf::from(results_file),
            lookback,
            horizon,
            predictions,
            split_ratio,
            seed,
            customer_ids,
            orders: read_hyperparameters(&lookup, "ORDERS")?,
            earnings: read_hyperparameters(&lookup, "EARNINGS")?,
        })
    }

    pub fn hyperparameters(&self, metric: TargetMetric) -> &Hyperparameters {
        match metric {
            TargetMetric::Orders => &self.orders,
            TargetMetric::Earnings => &self.earnings,
        }
    }

    pub fn data_path(&self) -> PathBuf {
        self.data_dir.join(&self.file_name)
    }
}

fn read_hyperparameters<F>(lookup: &F, prefix: &str) -> Result<Hyperparameters, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Hyperparameters::default();
    let params = Hyperparameters {
        hidden_units: get_config(
            lookup,
            &format!("{prefix}_UNITS"),
            Some(&defaults.hidden_units.to_string()),
        )?,
        epochs: get_config(
            lookup,
            &format!("{prefix}_EPOCHS"),
            Some(&defaults.epochs.to_string()),
        )?,
        batch_size: get_config(
            lookup,
            &format!("{prefix}_BATCH_SIZE"),
            Some(&defaults.batch_size.to_string()),
        )?,
        learning_rate: get_config(
            lookup,
            &format!("{prefix}_LEARNING_RATE"),
            Some(&defaults.learning_rate.to_string()),
        )?,
    };

    if params.hidden_units == 0 {
        return Err(invalid(&format!("{prefix}_UNITS"), "must be at least 1"));
    }
    if params.batch_size == 0 {
        return Err(invalid(&format!("{prefix}_BATCH_SIZE"), "must be at least 1"));
    }
    Ok(params)
}

/// Read `key`, falling back to `default`, and cast it to `T`.
///
/// A key with neither a value nor a default is [`ConfigError::Missing`]; a
/// value that does not parse as `T` is [`ConfigError::InvalidCast`].
fn get_config<T, F>(lookup: &F, key: &str, default: Option<&str>) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = match (lookup(key), default) {
        (Some(value), _) => value,
        (None, Some(default)) => default.to_string(),
        (None, None) => return Err(ConfigError::Missing(key.to_string())),
    };

    raw.trim().parse::<T>().map_err(|_| ConfigError::InvalidCast {
        key: key.to_string(),
        value: raw.clone(),
        ty: std::any::type_name::<T>(),
    })
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config =
            ForecastConfig::from_lookup(lookup_from(&[("DIR_NAME", "data"), ("FILENAME", "orders.csv")]))
                .unwrap();

        assert_eq!(config.data_path(), PathBuf::from("data/orders.csv"));
        assert_eq!(config.model_dir, PathBuf::from(DEFAULT_MODEL_DIR));
        assert_eq!(config.lookback, DEFAULT_LOOKBACK);
        assert_eq!(config.horizon, DEFAULT_HORIZON);
        assert_eq!(config.predictions, DEFAULT_PREDICTIONS);
        assert!((config.split_ratio - 0.7).abs() < f64::EPSILON);
        assert!(config.customer_ids.is_empty());
        assert_eq!(config.orders, Hyperparameters::default());
    }

    #[test]
    fn test_per_metric_hyperparameters() {
        let config = ForecastConfig::from_lookup(lookup_from(&[
            ("DIR_NAME", "data"),
            ("FILENAME", "orders.csv"),
            ("ORDERS_UNITS", "8"),
            ("ORDERS_EPOCHS", "3"),
            ("EARNINGS_BATCH_SIZE", "4"),
            ("CUSTOMER_IDS", "101, 202,,303"),
        ]))
        .unwrap();

        let orders = config.hyperparameters(TargetMetric::Orders);
        assert_eq!(orders.hidden_units, 8);
        assert_eq!(orders.epochs, 3);
        let earnings = config.hyperparameters(TargetMetric::Earnings);
        assert_eq!(earnings.batch_size, 4);
        assert_eq!(earnings.hidden_units, DEFAULT_HIDDEN_UNITS);
        assert_eq!(config.customer_ids, vec!["101", "202", "303"]);
    }

    #[test]
    fn test_missing_required_value() {
        let err = ForecastConfig::from_lookup(lookup_from(&[("DIR_NAME", "data")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("FILENAME".to_string()));
    }

    #[test]
    fn test_invalid_cast() {
        let err = ForecastConfig::from_lookup(lookup_from(&[
            ("DIR_NAME", "data"),
            ("FILENAME", "orders.csv"),
            ("LOOKBACK", "seven"),
        ]))
        .unwrap_err();

        match err {
            ConfigError::InvalidCast { key, value, .. } => {
                assert_eq!(key, "LOOKBACK");
                assert_eq!(value, "seven");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_out_of_range_values() {
        let err = ForecastConfig::from_lookup(lookup_from(&[
            ("DIR_NAME", "data"),
            ("FILENAME", "orders.csv"),
            ("SPLIT_RATIO", "1.5"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "SPLIT_RATIO"));

        let err = ForecastConfig::from_lookup(lookup_from(&[
            ("DIR_NAME", "data"),
            ("FILENAME", "orders.csv"),
            ("LOOKBACK", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "LOOKBACK"));
    }
}
