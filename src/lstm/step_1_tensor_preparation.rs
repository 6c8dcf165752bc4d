// External crates
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

// Internal modules
use crate::error::{ForecastError, Result};

/// Min-max scaler mapping a fitted range onto [0, 1]
///
/// A constant series has its range treated as 1, so every value maps to 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub min: f64,
    pub max: f64,
}

impl MinMaxScaler {
    pub fn fit(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self { min: 0.0, max: 0.0 };
        }
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        Self { min, max }
    }

    pub fn fit_transform(values: &[f64]) -> (Self, Vec<f64>) {
        let scaler = Self::fit(values);
        let scaled = scaler.transform(values);
        (scaler, scaled)
    }

    fn range(&self) -> f64 {
        let range = self.max - self.min;
        if range.abs() < f64::EPSILON {
            1.0
        } else {
            range
        }
    }

    pub fn transform_value(&self, value: f64) -> f64 {
        (value - self.min) / self.range()
    }

    pub fn inverse_value(&self, value: f64) -> f64 {
        value * self.range() + self.min
    }

    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.transform_value(v)).collect()
    }

    pub fn inverse_transform(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|&v| self.inverse_value(v)).collect()
    }

    /// Whether two scalers map values identically, up to `tolerance`
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        (self.min - other.min).abs() <= tolerance && (self.max - other.max).abs() <= tolerance
    }
}

/// Splits a series in time order: the first `ratio` share trains, the rest tests
pub fn chronological_split(values: &[f64], ratio: f64) -> (&[f64], &[f64]) {
    let split_idx = ((values.len() as f64 * ratio) as usize).min(values.len());
    values.split_at(split_idx)
}

/// Supervised samples cut from one series
#[derive(Debug, Clone)]
pub struct WindowSet {
    /// Input windows, shape [samples, lookback]
    pub inputs: Array2<f64>,
    /// Target windows, shape [samples, horizon]
    pub targets: Array2<f64>,
}

impl WindowSet {
    pub fn len(&self) -> usize {
        self.inputs.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lookback(&self) -> usize {
        self.inputs.ncols()
    }

    pub fn horizon(&self) -> usize {
        self.targets.ncols()
    }
}

/// Cuts a series into (input, target) windows with a step of one
///
/// Offsets run from `lookback` up to `len - lookback` (exclusive); the input is
/// the `lookback` values before the offset and the target the `horizon` values
/// starting at it. The upper bound stops `lookback` samples before the end
/// rather than `horizon`, so a series of length N yields N - 2 * lookback
/// samples when `horizon <= lookback`. Offsets whose target would run past the
/// end of the series are skipped.
///
/// # Arguments
///
/// * `values` - The (usually scaled) series
/// * `lookback` - Number of past steps fed to the model
/// * `horizon` - Number of future steps predicted per sample
pub fn build_windows(values: &[f64], lookback: usize, horizon: usize) -> Result<WindowSet> {
    let n = values.len();
    let end = n.saturating_sub(lookback);

    let mut inputs = Vec::new();
    let mut targets = Vec::new();
    let mut samples = 0;
    for i in lookback..end {
        if i + horizon > n {
            break;
        }
        inputs.extend_from_slice(&values[i - lookback..i]);
        targets.extend_from_slice(&values[i..i + horizon]);
        samples += 1;
    }

    let inputs = Array2::from_shape_vec((samples, lookback), inputs)
        .map_err(|e| ForecastError::Tensor(e.to_string()))?;
    let targets = Array2::from_shape_vec((samples, horizon), targets)
        .map_err(|e| ForecastError::Tensor(e.to_string()))?;

    Ok(WindowSet { inputs, targets })
}

/// Builds model tensors for the selected window rows
///
/// # Returns
///
/// Features of shape [rows, lookback, 1] and targets of shape [rows, horizon]
pub fn batch_tensors<B: Backend>(
    windows: &WindowSet,
    rows: &[usize],
    device: &B::Device,
) -> (Tensor<B, 3>, Tensor<B, 2>) {
    let lookback = windows.lookback();
    let horizon = windows.horizon();

    let mut x = Vec::with_capacity(rows.len() * lookback);
    let mut y = Vec::with_capacity(rows.len() * horizon);
    for &row in rows {
        x.extend(windows.inputs.row(row).iter().map(|&v| v as f32));
        y.extend(windows.targets.row(row).iter().map(|&v| v as f32));
    }

    let features =
        Tensor::<B, 1>::from_floats(x.as_slice(), device).reshape([rows.len(), lookback, 1]);
    let targets = Tensor::<B, 1>::from_floats(y.as_slice(), device).reshape([rows.len(), horizon]);
    (features, targets)
}

/// Tensors for every window, in order
pub fn windows_to_tensors<B: Backend>(
    windows: &WindowSet,
    device: &B::Device,
) -> (Tensor<B, 3>, Tensor<B, 2>) {
    let rows: Vec<usize> = (0..windows.len()).collect();
    batch_tensors(windows, &rows, device)
}

/// A single input window shaped [1, len, 1]
pub fn sequence_tensor<B: Backend>(window: &[f64], device: &B::Device) -> Tensor<B, 3> {
    let x: Vec<f32> = window.iter().map(|&v| v as f32).collect();
    Tensor::<B, 1>::from_floats(x.as_slice(), device).reshape([1, window.len(), 1])
}

/// Flattens a tensor into row-major f64 values
pub fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f64>> {
    let data = tensor.into_data().convert::<f32>();
    let values = data
        .to_vec::<f32>()
        .map_err(|e| ForecastError::Tensor(format!("{e:?}")))?;
    Ok(values.into_iter().map(f64::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::{NdArray, NdArrayDevice};

    #[test]
    fn test_scaler_round_trip() {
        let values = vec![3.0, 17.5, -2.0, 40.25, 0.0];
        let (scaler, scaled) = MinMaxScaler::fit_transform(&values);

        assert!(scaled.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!((scaled[2] - 0.0).abs() < 1e-12);
        assert!((scaled[3] - 1.0).abs() < 1e-12);

        let restored = scaler.inverse_transform(&scaled);
        for (a, b) in values.iter().zip(restored.iter()) {
            assert!((a - b).abs() < 1e-9, "{a} != {b}");
        }
    }

    #[test]
    fn test_scaler_constant_series() {
        let (scaler, scaled) = MinMaxScaler::fit_transform(&[4.0, 4.0, 4.0]);
        assert_eq!(scaled, vec![0.0, 0.0, 0.0]);
        assert!((scaler.inverse_value(0.0) - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_chronological_split() {
        let values: Vec<f64> = (0..10).map(f64::from).collect();
        let (train, test) = chronological_split(&values, 0.7);
        assert_eq!(train, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(test, &[7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_build_windows_boundary() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let windows = build_windows(&values, 2, 1).unwrap();

        // Stops lookback samples early: 10 - 2 * 2 pairs, not 8
        assert_eq!(windows.len(), 6);
        assert_eq!(windows.inputs.row(0).to_vec(), vec![1.0, 2.0]);
        assert_eq!(windows.targets.row(0).to_vec(), vec![3.0]);
        assert_eq!(windows.inputs.row(5).to_vec(), vec![6.0, 7.0]);
        assert_eq!(windows.targets.row(5).to_vec(), vec![8.0]);
    }

    #[test]
    fn test_build_windows_counts() {
        let values: Vec<f64> = (0..30).map(f64::from).collect();
        for lookback in 1..=7 {
            for horizon in 1..=lookback {
                let windows = build_windows(&values, lookback, horizon).unwrap();
                assert_eq!(windows.len(), values.len() - 2 * lookback);
                assert_eq!(windows.lookback(), lookback);
                assert_eq!(windows.horizon(), horizon);
            }
        }
    }

    #[test]
    fn test_build_windows_short_series() {
        let windows = build_windows(&[1.0, 2.0, 3.0], 2, 1).unwrap();
        assert!(windows.is_empty());
        let windows = build_windows(&[], 3, 1).unwrap();
        assert!(windows.is_empty());
    }

    #[test]
    fn test_build_windows_long_horizon_skips_overflow() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let windows = build_windows(&values, 2, 4).unwrap();
        // Offsets 2..=6 keep their 4 targets inside the series
        assert_eq!(windows.len(), 5);
        assert_eq!(windows.targets.row(4).to_vec(), vec![7.0, 8.0, 9.0, 10.0]);
    }

    #[test]
    fn test_windows_to_tensors_shapes() {
        let device = NdArrayDevice::default();
        let values: Vec<f64> = (0..12).map(f64::from).collect();
        let windows = build_windows(&values, 3, 2).unwrap();

        let (features, targets) = windows_to_tensors::<NdArray>(&windows, &device);
        assert_eq!(features.dims(), [6, 3, 1]);
        assert_eq!(targets.dims(), [6, 2]);

        let flat = tensor_to_vec(features).unwrap();
        assert_eq!(&flat[..3], &[0.0, 1.0, 2.0]);
        let flat_targets = tensor_to_vec(targets).unwrap();
        assert_eq!(&flat_targets[..2], &[3.0, 4.0]);
    }

    #[test]
    fn test_sequence_tensor_shape() {
        let device = NdArrayDevice::default();
        let tensor = sequence_tensor::<NdArray>(&[0.1, 0.2, 0.3, 0.4], &device);
        assert_eq!(tensor.dims(), [1, 4, 1]);
    }
}
