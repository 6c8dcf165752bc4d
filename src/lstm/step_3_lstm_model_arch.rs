// External imports
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::{backend::Backend, Tensor};
use serde::{Deserialize, Serialize};

// Internal imports
use super::step_2_lstm_cell::OrderLstmCell;

/// The series are univariate: one value per day
pub const INPUT_FEATURES: usize = 1;

/// One recurrent layer followed by a dense layer emitting `horizon` steps
#[derive(Module, Debug)]
pub struct OrderLstmModel<B: Backend> {
    hidden_size: usize,
    horizon: usize,
    lstm: OrderLstmCell<B>,
    output_layer: Linear<B>,
}

impl<B: Backend> OrderLstmModel<B> {
    pub fn new(hidden_size: usize, horizon: usize, device: &B::Device) -> Self {
        let lstm = OrderLstmCell::new(INPUT_FEATURES, hidden_size, device);
        let output_layer = LinearConfig::new(hidden_size, horizon).init(device);

        Self {
            hidden_size,
            horizon,
            lstm,
            output_layer,
        }
    }

    /// Forward pass through the model
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape [batch_size, lookback, 1]
    ///
    /// # Returns
    ///
    /// Returns the output tensor of shape [batch_size, horizon]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let last_hidden = self.lstm.forward(x);
        self.output_layer.forward(last_hidden)
    }

    pub fn predict(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        self.forward(x)
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }
}

/// Dimensions needed to rebuild an [`OrderLstmModel`] before loading weights
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLstmConfig {
    pub hidden_size: usize,
    pub lookback: usize,
    pub horizon: usize,
}

impl OrderLstmConfig {
    pub fn new(hidden_size: usize, lookback: usize, horizon: usize) -> Self {
        Self {
            hidden_size,
            lookback,
            horizon,
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> OrderLstmModel<B> {
        OrderLstmModel::new(self.hidden_size, self.horizon, device)
    }
}
