// External imports
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::tensor::{activation, backend::Backend, Tensor};

/// Single-layer LSTM over a daily series
#[derive(Module, Debug)]
pub struct OrderLstmCell<B: Backend> {
    input_size: usize,
    hidden_size: usize,

    // Input projections
    input_gate: Linear<B>,
    forget_gate: Linear<B>,
    cell_gate: Linear<B>,
    output_gate: Linear<B>,

    // Recurrent connections
    input_recurrent: Linear<B>,
    forget_recurrent: Linear<B>,
    cell_recurrent: Linear<B>,
    output_recurrent: Linear<B>,
}

impl<B: Backend> OrderLstmCell<B> {
    /// Create a new LSTM cell
    ///
    /// # Arguments
    ///
    /// * `input_size` - Number of input features per time step
    /// * `hidden_size` - Size of hidden state
    /// * `device` - Device to place tensors on
    pub fn new(input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        let gate = || LinearConfig::new(input_size, hidden_size).init(device);
        let recurrent = || LinearConfig::new(hidden_size, hidden_size).init(device);

        Self {
            input_size,
            hidden_size,
            input_gate: gate(),
            forget_gate: gate(),
            cell_gate: gate(),
            output_gate: gate(),
            input_recurrent: recurrent(),
            forget_recurrent: recurrent(),
            cell_recurrent: recurrent(),
            output_recurrent: recurrent(),
        }
    }

    /// Run the cell over a whole sequence
    ///
    /// # Arguments
    ///
    /// * `x` - Input tensor of shape [batch_size, sequence_length, input_size]
    ///
    /// # Returns
    ///
    /// The hidden state after the last time step, shape [batch_size, hidden_size]
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 2> {
        let device = x.device();
        let [batch_size, sequence_length, _] = x.dims();

        let mut h = Tensor::zeros([batch_size, self.hidden_size], &device);
        let mut c = Tensor::zeros([batch_size, self.hidden_size], &device);

        for t in 0..sequence_length {
            let x_t = x
                .clone()
                .narrow(1, t, 1)
                .reshape([batch_size, self.input_size]);

            let i_t = activation::sigmoid(
                self.input_gate.forward(x_t.clone()) + self.input_recurrent.forward(h.clone()),
            );
            let f_t = activation::sigmoid(
                self.forget_gate.forward(x_t.clone()) + self.forget_recurrent.forward(h.clone()),
            );
            let g_t = activation::tanh(
                self.cell_gate.forward(x_t.clone()) + self.cell_recurrent.forward(h.clone()),
            );
            let o_t = activation::sigmoid(
                self.output_gate.forward(x_t) + self.output_recurrent.forward(h.clone()),
            );

            c = f_t * c + i_t * g_t;
            h = o_t * activation::tanh(c.clone());
        }

        h
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }
}
