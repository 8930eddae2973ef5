use crate::tensor::{Tensor, TensorError, TensorResult};
use ndarray::Axis;

use super::module::Module;

/// Layer normalization over the last axis.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    pub gamma: Tensor,
    pub beta: Tensor,
    eps: f32,
}

impl LayerNorm {
    pub fn new(normalized_size: usize) -> Self {
        LayerNorm {
            gamma: Tensor::ones(&[normalized_size]),
            beta: Tensor::zeros(&[normalized_size]),
            eps: 1e-5,
        }
    }

    pub fn with_eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }

    pub fn normalized_size(&self) -> usize {
        self.gamma.len()
    }

    pub fn forward(&self, x: &Tensor) -> TensorResult<Tensor> {
        let size = self.normalized_size();
        if x.shape().last() != Some(&size) {
            return Err(TensorError::ShapeError(format!(
                "LayerNorm over {} features cannot accept input {:?}",
                size,
                x.shape()
            )));
        }

        let mut out = x.data().clone();
        let last = Axis(out.ndim() - 1);
        for mut lane in out.lanes_mut(last) {
            let count = size.max(1) as f32;
            let mean = lane.sum() / count;
            let var = lane.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / count;
            let std = (var + self.eps).sqrt();
            for ((v, &g), &b) in lane.iter_mut().zip(self.gamma.data().iter()).zip(self.beta.data().iter()) {
                *v = g * (*v - mean) / std + b;
            }
        }
        Ok(Tensor::new(out))
    }
}

impl Module for LayerNorm {
    fn forward(&self, input: &Tensor) -> TensorResult<Tensor> {
        self.forward(input)
    }

    fn parameters(&self) -> Vec<Tensor> {
        vec![self.gamma.clone(), self.beta.clone()]
    }

    fn describe(&self) -> String {
        format!("LayerNorm ({})", self.normalized_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layernorm_rows_have_zero_mean() {
        let x = Tensor::from_shape_vec(&[2, 3], vec![1.0, 2.0, 3.0, 10.0, 20.0, 60.0]).unwrap();
        let y = LayerNorm::new(3).forward(&x).unwrap();
        for row in y.data().outer_iter() {
            assert!(row.sum().abs() < 1e-4);
        }
    }

    #[test]
    fn test_layernorm_rejects_wrong_size() {
        let x = Tensor::zeros(&[2, 4]);
        assert!(LayerNorm::new(3).forward(&x).is_err());
    }
}
