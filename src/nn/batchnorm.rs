//! Batch normalization layer.
//!
//! Supports train/eval modes, running statistics and learnable gamma/beta.

use crate::nn::Module;
use crate::tensor::{Tensor, TensorError, TensorResult};
use ndarray::{Array1, Axis};

/// Small constant for numerical stability.
const EPS: f32 = 1e-5;

/// Batch Normalization layer.
///
/// Normalizes every feature (an index along `feature_axis`) using
/// `y = gamma * (x - mean) / sqrt(var + eps) + beta`.
///
/// In training mode the statistics of the current batch are used, computed
/// over every axis except the feature axis. In inference mode the running
/// statistics are used instead. They start at zero mean / unit variance and
/// are only changed through [`BatchNorm::with_running_stats`]; updating them
/// belongs to the training loop, not to `forward`.
#[derive(Debug, Clone)]
pub struct BatchNorm {
    /// Learnable scale [num_features].
    pub gamma: Tensor,
    /// Learnable shift [num_features].
    pub beta: Tensor,
    running_mean: Array1<f32>,
    running_var: Array1<f32>,
    /// Axis holding the features (1 for NCHW and [N, C] inputs).
    pub feature_axis: usize,
    pub eps: f32,
    /// Training mode flag.
    pub training: bool,
}

impl BatchNorm {
    /// Creates a layer normalizing `num_features` features along axis 1.
    pub fn new(num_features: usize) -> Self {
        Self {
            gamma: Tensor::ones(&[num_features]),
            beta: Tensor::zeros(&[num_features]),
            running_mean: Array1::zeros(num_features),
            running_var: Array1::ones(num_features),
            feature_axis: 1,
            eps: EPS,
            training: true,
        }
    }

    pub fn with_feature_axis(mut self, feature_axis: usize) -> Self {
        self.feature_axis = feature_axis;
        self
    }

    pub fn with_eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }

    /// Replaces the running statistics used in inference mode.
    pub fn with_running_stats(mut self, mean: Vec<f32>, var: Vec<f32>) -> TensorResult<Self> {
        let expected = self.num_features();
        if mean.len() != expected || var.len() != expected {
            return Err(TensorError::ShapeError(format!(
                "BatchNorm running stats must have {} entries, got {} and {}",
                expected,
                mean.len(),
                var.len()
            )));
        }
        self.running_mean = Array1::from(mean);
        self.running_var = Array1::from(var);
        Ok(self)
    }

    pub fn num_features(&self) -> usize {
        self.gamma.len()
    }

    pub fn train(&mut self) {
        self.training = true;
    }

    pub fn eval(&mut self) {
        self.training = false;
    }
}

impl Module for BatchNorm {
    fn forward(&self, x: &Tensor) -> TensorResult<Tensor> {
        let axis = self.feature_axis;
        if axis >= x.ndim() || x.shape()[axis] != self.num_features() {
            return Err(TensorError::ShapeError(format!(
                "BatchNorm over {} features on axis {} cannot accept input {:?}",
                self.num_features(),
                axis,
                x.shape()
            )));
        }

        let mut out = x.data().clone();
        let params = self.gamma.data().iter().zip(self.beta.data().iter());
        for (feature, (mut lane, (&gamma, &beta))) in out.axis_iter_mut(Axis(axis)).zip(params).enumerate() {
            let (mean, var) = if self.training {
                let count = lane.len().max(1) as f32;
                let mean = lane.sum() / count;
                let var = lane.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / count;
                (mean, var)
            } else {
                (self.running_mean[feature], self.running_var[feature])
            };
            let std = (var + self.eps).sqrt();
            lane.mapv_inplace(|v| gamma * (v - mean) / std + beta);
        }
        Ok(Tensor::new(out))
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![self.gamma.clone(), self.beta.clone()]
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn describe(&self) -> String {
        format!("BatchNorm ({} features, axis {})", self.num_features(), self.feature_axis)
    }
}
