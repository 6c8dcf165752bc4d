// External imports
use burn::tensor::backend::Backend;
use burn_ndarray::{NdArray, NdArrayDevice};
use chrono::{Duration, NaiveDate};
use log::{info, warn};
use polars::prelude::*;
use std::collections::VecDeque;

// Internal imports
use super::step_1_tensor_preparation::{sequence_tensor, tensor_to_vec, MinMaxScaler};
use super::step_3_lstm_model_arch::OrderLstmModel;
use crate::constants::DATE;
use crate::error::{ForecastError, Result};
use crate::util::file_utils::{date_values, f64_values};
use crate::util::model_utils::{ForecastTarget, ModelStore};

type InferenceBackend = NdArray<f32>;

/// Forecast values on the original scale with their calendar dates
///
/// The first point repeats the last observation the forecast was seeded
/// from; the remaining points are predictions, one day apart.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    pub target: ForecastTarget,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl Forecast {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Predicted points only, without the seed observation
    pub fn predictions(&self) -> &[f64] {
        self.values.get(1..).unwrap_or_default()
    }

    pub fn predicted_total(&self) -> f64 {
        self.predictions().iter().sum()
    }
}

/// Roll the model forward one step at a time
///
/// Each prediction's first output is appended to the window and the oldest
/// value dropped before predicting again.
///
/// # Arguments
///
/// * `model` - Trained model
/// * `seed` - The last `lookback` scaled observations
/// * `steps` - Number of future steps to produce
///
/// # Returns
///
/// `steps` scaled predictions
pub fn rolling_forecast<B: Backend>(
    model: &OrderLstmModel<B>,
    seed: &[f64],
    steps: usize,
    device: &B::Device,
) -> Result<Vec<f64>> {
    let mut window: VecDeque<f64> = seed.iter().copied().collect();
    let mut predictions = Vec::with_capacity(steps);

    for _ in 0..steps {
        let input: Vec<f64> = window.iter().copied().collect();
        let output = tensor_to_vec(model.predict(sequence_tensor::<B>(&input, device)))?;
        let next = output
            .first()
            .copied()
            .ok_or_else(|| ForecastError::Tensor("model produced no output".to_string()))?;

        predictions.push(next);
        window.pop_front();
        window.push_back(next);
    }

    Ok(predictions)
}

/// Consecutive calendar days starting at `start`
pub fn future_dates(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    (0..count)
        .map(|offset| start + Duration::days(offset as i64))
        .collect()
}

/// Forecast `steps` days ahead for a target
///
/// The model of the target's base metric is loaded from `store`. The series
/// is rescaled with a scaler fitted on the full current series rather than
/// the one stored at training time; a warning is logged when the two differ.
///
/// # Arguments
///
/// * `store` - Persisted models
/// * `target` - Metric, optionally narrowed to one customer column
/// * `table` - Daily aggregate or per-customer table with a `date` column
/// * `steps` - Number of future days
///
/// # Returns
///
/// A [`Forecast`] with `steps + 1` dates and values
pub fn forecast(
    store: &ModelStore,
    target: &ForecastTarget,
    table: &DataFrame,
    steps: usize,
) -> Result<Forecast> {
    let device = NdArrayDevice::default();
    let (model, metadata) = store.load::<InferenceBackend>(target.metric, &device)?;
    let lookback = metadata.model.lookback;

    let observed = f64_values(table, target.column_name())?;
    let dates = date_values(table, DATE)?;
    if observed.len() < lookback {
        return Err(ForecastError::InsufficientData {
            available: observed.len(),
            required: lookback,
        });
    }
    let last_date = dates.last().copied().ok_or(ForecastError::InsufficientData {
        available: 0,
        required: lookback,
    })?;

    let (scaler, scaled) = MinMaxScaler::fit_transform(&observed);
    if !scaler.approx_eq(&metadata.scaler, 1e-9) {
        warn!(
            "Forecast scaler for {} spans [{}, {}] but the model was trained on [{}, {}]",
            target, scaler.min, scaler.max, metadata.scaler.min, metadata.scaler.max
        );
    }

    let seed = &scaled[scaled.len() - lookback..];
    let predictions = rolling_forecast(&model, seed, steps, &device)?;

    let mut produced = Vec::with_capacity(steps + 1);
    produced.push(scaled[scaled.len() - 1]);
    produced.extend(predictions);

    info!("Forecast {} steps ahead for {}", steps, target);
    Ok(Forecast {
        target: target.clone(),
        dates: future_dates(last_date, steps + 1),
        values: scaler.inverse_transform(&produced),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lstm::step_3_lstm_model_arch::OrderLstmConfig;
    use crate::lstm::step_6_model_serialization::ModelMetadata;
    use crate::util::file_utils::dates_to_series;
    use crate::util::model_utils::TargetMetric;
    use tempfile::tempdir;

    fn series_table(values: &[f64]) -> DataFrame {
        let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        let dates = future_dates(start, values.len());
        DataFrame::new(vec![
            dates_to_series(DATE, &dates).into_column(),
            Series::new("order_count".into(), values.to_vec()).into_column(),
            Series::new("42".into(), values.iter().map(|v| v * 2.0).collect::<Vec<_>>()).into_column(),
        ])
        .unwrap()
    }

    fn store_with_model(lookback: usize) -> (tempfile::TempDir, ModelStore) {
        let temp_dir = tempdir().unwrap();
        let store = ModelStore::new(temp_dir.path());
        let device = NdArrayDevice::default();

        let config = OrderLstmConfig::new(4, lookback, 1);
        let model = config.init::<InferenceBackend>(&device);
        let metadata = ModelMetadata::new(
            TargetMetric::Orders,
            config,
            MinMaxScaler::fit(&[0.0, 10.0]),
            None,
        );
        store.save(TargetMetric::Orders, &model, &metadata).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_future_dates() {
        let start = NaiveDate::from_ymd_opt(2021, 2, 27).unwrap();
        let dates = future_dates(start, 3);
        assert_eq!(
            dates,
            vec![
                start,
                NaiveDate::from_ymd_opt(2021, 2, 28).unwrap(),
                NaiveDate::from_ymd_opt(2021, 3, 1).unwrap(),
            ]
        );
    }

    #[test]
    fn test_rolling_forecast_length() {
        let device = NdArrayDevice::default();
        let model = OrderLstmConfig::new(4, 3, 1).init::<InferenceBackend>(&device);

        let predictions = rolling_forecast(&model, &[0.2, 0.4, 0.6], 5, &device).unwrap();
        assert_eq!(predictions.len(), 5);
        assert!(predictions.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_forecast_length_and_dates() {
        let (_dir, store) = store_with_model(3);
        let values: Vec<f64> = (0..20).map(|d| (d % 5) as f64).collect();
        let table = series_table(&values);

        let forecast = forecast(
            &store,
            &ForecastTarget::metric(TargetMetric::Orders),
            &table,
            7,
        )
        .unwrap();

        assert_eq!(forecast.len(), 8);
        assert_eq!(forecast.dates.len(), 8);
        assert_eq!(forecast.dates[0], NaiveDate::from_ymd_opt(2021, 1, 20).unwrap());
        assert_eq!(forecast.dates[7], NaiveDate::from_ymd_opt(2021, 1, 27).unwrap());
        // The seed point is the last observation on the original scale
        assert!((forecast.values[0] - values[19]).abs() < 1e-6);
        assert_eq!(forecast.predictions().len(), 7);
    }

    #[test]
    fn test_forecast_customer_column_uses_base_model() {
        let (_dir, store) = store_with_model(3);
        let table = series_table(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        let forecast = forecast(
            &store,
            &ForecastTarget::customer(TargetMetric::Orders, "42"),
            &table,
            2,
        )
        .unwrap();
        assert_eq!(forecast.len(), 3);
        assert!((forecast.values[0] - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_forecast_without_model() {
        let temp_dir = tempdir().unwrap();
        let store = ModelStore::new(temp_dir.path());
        let table = series_table(&[1.0, 2.0, 3.0, 4.0]);

        let err = forecast(
            &store,
            &ForecastTarget::metric(TargetMetric::Earnings),
            &table,
            3,
        )
        .unwrap_err();
        assert!(matches!(err, ForecastError::ModelNotFound { .. }));
    }

    #[test]
    fn test_forecast_short_series() {
        let (_dir, store) = store_with_model(5);
        let table = series_table(&[1.0, 2.0]);

        let err = forecast(
            &store,
            &ForecastTarget::metric(TargetMetric::Orders),
            &table,
            3,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientData { available: 2, required: 5 }
        ));
    }

    #[test]
    fn test_forecast_unknown_customer() {
        let (_dir, store) = store_with_model(2);
        let table = series_table(&[1.0, 2.0, 3.0]);

        let err = forecast(
            &store,
            &ForecastTarget::customer(TargetMetric::Orders, "999"),
            &table,
            1,
        )
        .unwrap_err();
        assert!(matches!(err, ForecastError::MissingColumn(ref c) if c == "999"));
    }
}
