use chrono::NaiveDate;
use log::info;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

use crate::error::Result;
use crate::lstm::step_5_prediction::Forecast;

/// Summed predictions of both metrics for one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerForecastSummary {
    pub customer_id: String,
    pub orders_predictions: f64,
    pub values_predictions: f64,
}

impl CustomerForecastSummary {
    pub fn from_forecasts(customer_id: &str, orders: &Forecast, earnings: &Forecast) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            orders_predictions: orders.predicted_total(),
            values_predictions: earnings.predicted_total(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// JSON body returned for a single-target forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPayload {
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    pub predicted_total: f64,
    pub forecast: Vec<ForecastPoint>,
}

impl From<&Forecast> for ForecastPayload {
    fn from(forecast: &Forecast) -> Self {
        Self {
            target: forecast.target.to_string(),
            customer_id: forecast.target.customer_id.clone(),
            predicted_total: forecast.predicted_total(),
            forecast: forecast
                .dates
                .iter()
                .zip(&forecast.values)
                .map(|(date, value)| ForecastPoint {
                    date: *date,
                    value: *value,
                })
                .collect(),
        }
    }
}

/// Writes `customer_id,orders_predictions,values_predictions`, replacing any previous file
pub fn write_results_csv(path: &Path, summaries: &[CustomerForecastSummary]) -> Result<()> {
    let mut df = df!(
        "customer_id" => summaries.iter().map(|s| s.customer_id.clone()).collect::<Vec<_>>(),
        "orders_predictions" => summaries.iter().map(|s| s.orders_predictions).collect::<Vec<_>>(),
        "values_predictions" => summaries.iter().map(|s| s.values_predictions).collect::<Vec<_>>()
    )?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;

    info!("Wrote {} customer forecasts to: {}", summaries.len(), path.display());
    Ok(())
}
