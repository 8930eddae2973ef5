//! Fully connected (linear) layer.

use crate::nn::module::Module;
use crate::tensor::{Tensor, TensorError, TensorResult};
use rand::rngs::StdRng;

/// Fully connected layer computing `y = x·W + b` over the last axis.
///
/// `weights` has shape `[in_features, out_features]`, `bias` has shape
/// `[out_features]`. Inputs of any rank are accepted as long as their last
/// dimension equals `in_features`.
#[derive(Debug, Clone)]
pub struct Linear {
    pub weights: Tensor,
    pub bias: Option<Tensor>,
}

impl Linear {
    /// Creates a layer with weights and bias drawn from `U(-k, k)`, `k = 1/sqrt(in_features)`.
    pub fn new(in_features: usize, out_features: usize, rng: &mut StdRng) -> Self {
        let bound = 1.0 / (in_features.max(1) as f32).sqrt();
        let weights = Tensor::random_uniform(&[in_features, out_features], -bound, bound, rng);
        let bias = Tensor::random_uniform(&[out_features], -bound, bound, rng);
        Self {
            weights,
            bias: Some(bias),
        }
    }

    /// Creates a layer from explicit parameters.
    pub fn from_parts(weights: Tensor, bias: Option<Tensor>) -> TensorResult<Self> {
        if weights.ndim() != 2 {
            return Err(TensorError::ShapeError(format!(
                "Linear weights must be 2D, got {:?}",
                weights.shape()
            )));
        }
        if let Some(bias) = &bias {
            if bias.shape() != [weights.shape()[1]] {
                return Err(TensorError::ShapeError(format!(
                    "Linear bias {:?} does not match weights {:?}",
                    bias.shape(),
                    weights.shape()
                )));
            }
        }
        Ok(Self { weights, bias })
    }

    /// Drops the bias term.
    pub fn without_bias(mut self) -> Self {
        self.bias = None;
        self
    }

    pub fn in_features(&self) -> usize {
        self.weights.shape()[0]
    }

    pub fn out_features(&self) -> usize {
        self.weights.shape()[1]
    }
}

impl Module for Linear {
    fn forward(&self, inputs: &Tensor) -> TensorResult<Tensor> {
        let product = inputs.matmul(&self.weights)?;
        match &self.bias {
            Some(bias) => product.add(bias),
            None => Ok(product),
        }
    }

    fn parameters(&self) -> Vec<Tensor> {
        let mut params = vec![self.weights.clone()];
        params.extend(self.bias.iter().cloned());
        params
    }

    fn describe(&self) -> String {
        format!(
            "Linear ({} -> {}{})",
            self.in_features(),
            self.out_features(),
            if self.bias.is_some() { "" } else { ", no bias" }
        )
    }
}
