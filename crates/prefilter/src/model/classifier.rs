use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::activation;

/// Configuration for the dense unify classifier.
///
/// ```text
/// (batch, input_dim)
///   → Linear(input_dim→hidden1) → tanh
///   → Linear(hidden1→hidden2) → tanh
///   → Linear(hidden2→1) → sigmoid → squeeze
///   → p(unify): (batch,)
/// ```
#[derive(Config, Debug)]
pub struct UnifyMlpConfig {
    /// Feature vector length, `2 * (num_subjects + 1)`.
    pub input_dim: usize,
    #[config(default = 8)]
    pub hidden1: usize,
    #[config(default = 8)]
    pub hidden2: usize,
}

/// Small tanh MLP predicting the probability that a pair unifies.
#[derive(Module, Debug)]
pub struct UnifyMlp<B: Backend> {
    linear1: Linear<B>,
    linear2: Linear<B>,
    output: Linear<B>,
}

impl UnifyMlpConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> UnifyMlp<B> {
        UnifyMlp {
            linear1: LinearConfig::new(self.input_dim, self.hidden1).init(device),
            linear2: LinearConfig::new(self.hidden1, self.hidden2).init(device),
            output: LinearConfig::new(self.hidden2, 1).init(device),
        }
    }
}

impl<B: Backend> UnifyMlp<B> {
    /// Input shape: `(batch, input_dim)`. Output: probabilities, shape `(batch,)`.
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 1> {
        let x = self.linear1.forward(x).tanh();
        let x = self.linear2.forward(x).tanh();
        let logits: Tensor<B, 1> = self.output.forward(x).squeeze::<1>(1);
        activation::sigmoid(logits)
    }
}
