//! Module implementing the 2D convolution layer.

use crate::nn::module::Module;
use crate::tensor::{Tensor, TensorResult};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Configuration for Conv2d layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conv2dConfig {
    /// Number of input channels.
    pub in_channels: usize,
    /// Number of output channels (filters).
    pub out_channels: usize,
    /// Convolution kernel size.
    pub kernel_size: (usize, usize),
    /// Convolution stride.
    pub stride: (usize, usize),
    /// Padding.
    pub padding: (usize, usize),
    /// Dilation (kernel expansion).
    pub dilation: (usize, usize),
    /// Number of groups for grouped/depthwise convolution.
    pub groups: usize,
    /// Use bias.
    pub bias: bool,
}

impl Default for Conv2dConfig {
    fn default() -> Self {
        Self {
            in_channels: 1,
            out_channels: 1,
            kernel_size: (3, 3),
            stride: (1, 1),
            padding: (0, 0),
            dilation: (1, 1),
            groups: 1,
            bias: true,
        }
    }
}

impl Conv2dConfig {
    pub fn new(in_channels: usize, out_channels: usize, kernel_size: (usize, usize)) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel_size,
            ..Default::default()
        }
    }

    pub fn with_stride(mut self, stride: (usize, usize)) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_padding(mut self, padding: (usize, usize)) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_dilation(mut self, dilation: (usize, usize)) -> Self {
        self.dilation = dilation;
        self
    }

    pub fn with_groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }
}

/// 2D Convolutional layer.
///
/// Applies 2D convolution to input tensor of shape [N, C_in, H, W].
/// Output tensor has shape [N, C_out, H_out, W_out].
///
/// # Example
///
/// ```rust
/// use rand::{rngs::StdRng, SeedableRng};
/// use resgraph::nn::{Conv2d, Conv2dConfig, Module};
/// use resgraph::tensor::Tensor;
///
/// let mut rng = StdRng::seed_from_u64(0);
/// let conv = Conv2d::new(Conv2dConfig::new(3, 8, (3, 3)).with_padding((1, 1)), &mut rng);
/// let output = conv.forward(&Tensor::zeros(&[1, 3, 5, 5])).unwrap();
/// assert_eq!(output.shape(), &[1, 8, 5, 5]);
/// ```
#[derive(Debug, Clone)]
pub struct Conv2d {
    /// Weight tensor [C_out, C_in/groups, kH, kW].
    pub weight: Tensor,
    /// Optional bias [C_out].
    pub bias: Option<Tensor>,
    /// Layer configuration.
    pub config: Conv2dConfig,
}

impl Conv2d {
    /// Creates a layer with parameters drawn from `U(-k, k)`, `k = 1/sqrt(fan_in)`.
    pub fn new(config: Conv2dConfig, rng: &mut StdRng) -> Self {
        let groups = config.groups.max(1);
        let in_per_group = config.in_channels / groups;
        let (kh, kw) = config.kernel_size;
        let fan_in = (in_per_group * kh * kw).max(1);
        let bound = 1.0 / (fan_in as f32).sqrt();

        let weight = Tensor::random_uniform(&[config.out_channels, in_per_group, kh, kw], -bound, bound, rng);
        let bias = config
            .bias
            .then(|| Tensor::random_uniform(&[config.out_channels], -bound, bound, rng));

        Self { weight, bias, config }
    }
}

impl Module for Conv2d {
    fn forward(&self, inputs: &Tensor) -> TensorResult<Tensor> {
        inputs.conv2d(
            &self.weight,
            self.bias.as_ref(),
            self.config.stride,
            self.config.padding,
            self.config.dilation,
            self.config.groups,
        )
    }

    fn parameters(&self) -> Vec<Tensor> {
        let mut params = vec![self.weight.clone()];
        params.extend(self.bias.iter().cloned());
        params
    }

    fn describe(&self) -> String {
        let c = &self.config;
        format!(
            "Conv2d ({} -> {}, kernel {}x{}, stride {}x{}, padding {}x{})",
            c.in_channels, c.out_channels, c.kernel_size.0, c.kernel_size.1, c.stride.0, c.stride.1, c.padding.0, c.padding.1
        )
    }
}
