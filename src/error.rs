use std::path::PathBuf;

use polars::error::PolarsError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors produced anywhere in the load -> preprocess -> train/forecast pipeline
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("required column {0} not found")]
    MissingColumn(String),

    #[error("missing value in column {column} at row {row}")]
    MissingValue { column: String, row: usize },

    #[error("cannot parse timestamp {0:?}")]
    InvalidTimestamp(String),

    #[error("unknown forecast target {0:?}")]
    UnknownTarget(String),

    #[error("no model found for target {target} at {}", path.display())]
    ModelNotFound { target: String, path: PathBuf },

    #[error("not enough data: {available} rows available, {required} required")]
    InsufficientData { available: usize, required: usize },

    #[error("model record error: {0}")]
    Record(String),

    #[error("tensor error: {0}")]
    Tensor(String),

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ForecastError>;
