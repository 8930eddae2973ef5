//! Activation layers. None of them has trainable parameters.

use crate::nn::module::Module;
use crate::tensor::{Tensor, TensorResult};

// --- ReLU ---

/// Applies `max(0, x)` element-wise.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReLU;

impl ReLU {
    pub fn new() -> Self {
        ReLU
    }
}

impl Module for ReLU {
    fn forward(&self, inputs: &Tensor) -> TensorResult<Tensor> {
        Ok(inputs.relu())
    }

    fn parameters(&self) -> Vec<Tensor> {
        Vec::new()
    }

    fn describe(&self) -> String {
        "ReLU".to_string()
    }
}

// --- LeakyReLU ---

/// `x` for positive inputs, `negative_slope * x` otherwise.
#[derive(Debug, Clone, Copy)]
pub struct LeakyReLU {
    pub negative_slope: f32,
}

impl LeakyReLU {
    pub fn new(negative_slope: f32) -> Self {
        Self { negative_slope }
    }
}

impl Default for LeakyReLU {
    fn default() -> Self {
        Self::new(0.01)
    }
}

impl Module for LeakyReLU {
    fn forward(&self, inputs: &Tensor) -> TensorResult<Tensor> {
        Ok(inputs.leaky_relu(self.negative_slope))
    }

    fn parameters(&self) -> Vec<Tensor> {
        Vec::new()
    }

    fn describe(&self) -> String {
        format!("LeakyReLU (slope {})", self.negative_slope)
    }
}

// --- ELU ---

#[derive(Debug, Clone, Copy)]
pub struct ELU {
    pub alpha: f32,
}

impl ELU {
    pub fn new(alpha: f32) -> Self {
        Self { alpha }
    }
}

impl Default for ELU {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Module for ELU {
    fn forward(&self, inputs: &Tensor) -> TensorResult<Tensor> {
        Ok(inputs.elu(self.alpha))
    }

    fn parameters(&self) -> Vec<Tensor> {
        Vec::new()
    }

    fn describe(&self) -> String {
        format!("ELU (alpha {})", self.alpha)
    }
}

// --- Sigmoid / Tanh ---

#[derive(Debug, Clone, Copy, Default)]
pub struct Sigmoid;

impl Module for Sigmoid {
    fn forward(&self, inputs: &Tensor) -> TensorResult<Tensor> {
        Ok(inputs.sigmoid())
    }

    fn parameters(&self) -> Vec<Tensor> {
        Vec::new()
    }

    fn describe(&self) -> String {
        "Sigmoid".to_string()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Tanh;

impl Module for Tanh {
    fn forward(&self, inputs: &Tensor) -> TensorResult<Tensor> {
        Ok(inputs.tanh())
    }

    fn parameters(&self) -> Vec<Tensor> {
        Vec::new()
    }

    fn describe(&self) -> String {
        "Tanh".to_string()
    }
}

// --- GELU / SiLU ---

/// Gaussian error linear unit (tanh approximation).
#[derive(Debug, Clone, Copy, Default)]
pub struct GELU;

impl Module for GELU {
    fn forward(&self, inputs: &Tensor) -> TensorResult<Tensor> {
        Ok(inputs.gelu())
    }

    fn parameters(&self) -> Vec<Tensor> {
        Vec::new()
    }

    fn describe(&self) -> String {
        "GELU".to_string()
    }
}

/// `x * sigmoid(x)`, also known as Swish.
#[derive(Debug, Clone, Copy, Default)]
pub struct SiLU;

pub type Swish = SiLU;

impl Module for SiLU {
    fn forward(&self, inputs: &Tensor) -> TensorResult<Tensor> {
        Ok(inputs.silu())
    }

    fn parameters(&self) -> Vec<Tensor> {
        Vec::new()
    }

    fn describe(&self) -> String {
        "SiLU".to_string()
    }
}
