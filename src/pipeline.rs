//! Request-level entry points.
//!
//! Each function runs a full load -> preprocess -> train/forecast cycle from
//! the files on disk; nothing is cached between calls.

use log::info;
use polars::prelude::DataFrame;

use crate::config::ForecastConfig;
use crate::error::Result;
use crate::lstm::step_4_train_model::{train_model, TrainingOptions, TrainingReport};
use crate::lstm::step_5_prediction::{forecast, Forecast};
use crate::util::file_utils::load_orders;
use crate::util::model_utils::{ForecastTarget, ModelStore, TargetMetric};
use crate::util::pre_processor::{prepare_customer_series, prepare_daily_series};
use crate::util::results::{write_results_csv, CustomerForecastSummary};

fn load_raw(config: &ForecastConfig) -> Result<DataFrame> {
    load_orders(&config.data_dir, &config.file_name)
}

/// Daily order counts and earnings of returning customers
pub fn view_daily(config: &ForecastConfig) -> Result<DataFrame> {
    prepare_daily_series(&load_raw(config)?)
}

/// Train and persist the model for one metric on the daily aggregates
pub fn train_metric(config: &ForecastConfig, metric: TargetMetric) -> Result<TrainingReport> {
    let daily = prepare_daily_series(&load_raw(config)?)?;
    let store = ModelStore::new(&config.model_dir);
    train_model(&daily, metric, &TrainingOptions::from_config(config, metric), &store)
}

/// Forecast a metric, or one customer's share of it
pub fn forecast_target(config: &ForecastConfig, target: &ForecastTarget) -> Result<Forecast> {
    let raw = load_raw(config)?;
    let table = match target.customer_id {
        Some(_) => prepare_customer_series(&raw, target.metric)?,
        None => prepare_daily_series(&raw)?,
    };

    let store = ModelStore::new(&config.model_dir);
    forecast(&store, target, &table, config.predictions)
}

/// Forecast both metrics for every configured customer and write the results file
pub fn forecast_customers(config: &ForecastConfig) -> Result<Vec<CustomerForecastSummary>> {
    let raw = load_raw(config)?;
    let orders_table = prepare_customer_series(&raw, TargetMetric::Orders)?;
    let earnings_table = prepare_customer_series(&raw, TargetMetric::Earnings)?;
    let store = ModelStore::new(&config.model_dir);

    let mut summaries = Vec::with_capacity(config.customer_ids.len());
    for customer_id in &config.customer_ids {
        let orders = forecast(
            &store,
            &ForecastTarget::customer(TargetMetric::Orders, customer_id.as_str()),
            &orders_table,
            config.predictions,
        )?;
        let earnings = forecast(
            &store,
            &ForecastTarget::customer(TargetMetric::Earnings, customer_id.as_str()),
            &earnings_table,
            config.predictions,
        )?;
        summaries.push(CustomerForecastSummary::from_forecasts(
            customer_id,
            &orders,
            &earnings,
        ));
    }

    write_results_csv(&config.results_file, &summaries)?;
    info!("Forecast {} customers", summaries.len());
    Ok(summaries)
}
