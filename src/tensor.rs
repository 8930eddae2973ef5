//! Module defining the eager `Tensor` consumed and produced by every `Module`.
//!
//! The composition engine never looks inside a tensor: it only adds two of them
//! and multiplies one by a scalar. The kernels below exist so that the bundled
//! layers (`Linear`, `Conv2d`, normalizations, activations) have something to run on.
//!
//! Every operation that can fail on shapes returns a `TensorResult`; element-wise
//! maps cannot fail and return the new tensor directly.

use ndarray::{ArrayD, Array4, Ix2, Ix4, IxDyn};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use std::fmt;
use std::ops::Mul;
use thiserror::Error;

/// Default absolute tolerance used by [`Tensor::all_close`].
pub const DEFAULT_TOLERANCE: f32 = 1e-5;

/// Errors raised by tensor kernels and by modules built on top of them.
///
/// This is also the error type of `Module::forward`, so a failure inside any
/// module reaches the caller of a container unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TensorError {
    #[error("Tensor shape error: {0}")]
    ShapeError(String),

    #[error("Element-wise shapes differ: {lhs:?} and {rhs:?}")]
    ShapeMismatch { lhs: Vec<usize>, rhs: Vec<usize> },

    #[error("Incompatible matmul shapes: {lhs:?} and {rhs:?}")]
    MatmulDimensionError { lhs: Vec<usize>, rhs: Vec<usize> },

    #[error("Computation error: {0}")]
    ComputationError(String),
}

pub type TensorResult<T> = std::result::Result<T, TensorError>;

/// Dense `f32` tensor of arbitrary rank, stored row-major on the CPU.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: ArrayD<f32>,
}

impl Tensor {
    /// Wraps an existing array.
    pub fn new(data: ArrayD<f32>) -> Self {
        Self { data }
    }

    /// Builds a tensor from a flat row-major buffer.
    pub fn from_shape_vec(shape: &[usize], values: Vec<f32>) -> TensorResult<Self> {
        let data = ArrayD::from_shape_vec(IxDyn(shape), values)
            .map_err(|e| TensorError::ShapeError(e.to_string()))?;
        Ok(Self { data })
    }

    pub fn zeros(shape: &[usize]) -> Self {
        Self::full(shape, 0.0)
    }

    pub fn ones(shape: &[usize]) -> Self {
        Self::full(shape, 1.0)
    }

    pub fn full(shape: &[usize], value: f32) -> Self {
        Self {
            data: ArrayD::from_elem(IxDyn(shape), value),
        }
    }

    /// Draws every element uniformly from `[low, high)`.
    ///
    /// Requires `low < high`.
    pub fn random_uniform(shape: &[usize], low: f32, high: f32, rng: &mut StdRng) -> Self {
        Self {
            data: ArrayD::random_using(IxDyn(shape), Uniform::new(low, high), rng),
        }
    }

    pub fn data(&self) -> &ArrayD<f32> {
        &self.data
    }

    pub fn into_data(self) -> ArrayD<f32> {
        self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Arithmetic mean of all elements (`NaN` for an empty tensor).
    pub fn mean(&self) -> f32 {
        self.data.mean().unwrap_or(f32::NAN)
    }

    /// Element-wise comparison within an absolute tolerance.
    ///
    /// Tensors of different shapes are never close.
    pub fn all_close(&self, other: &Tensor, abs_tolerance: f32) -> bool {
        self.shape() == other.shape()
            && self
                .data
                .iter()
                .zip(other.data.iter())
                .all(|(a, b)| (a - b).abs() <= abs_tolerance)
    }

    // --- Engine operations ---

    /// Element-wise sum of two tensors of identical shape.
    ///
    /// No broadcasting: `a.add(&b)` and `b.add(&a)` either both succeed with
    /// the same result or both fail with `ShapeMismatch`.
    pub fn add(&self, rhs: &Tensor) -> TensorResult<Tensor> {
        if self.shape() != rhs.shape() {
            return Err(TensorError::ShapeMismatch {
                lhs: self.shape().to_vec(),
                rhs: rhs.shape().to_vec(),
            });
        }
        Ok(Tensor::new(&self.data + &rhs.data))
    }

    /// Adds `value` to every element.
    pub fn add_scalar(&self, value: f32) -> Tensor {
        Tensor::new(&self.data + value)
    }

    /// Multiplies every element by `factor`.
    pub fn scale(&self, factor: f32) -> Tensor {
        Tensor::new(&self.data * factor)
    }

    // --- Linear algebra ---

    /// Multiplies over the last axis: `[.., k] x [k, n] -> [.., n]`.
    ///
    /// A rank-1 left operand is treated as a single row.
    pub fn matmul(&self, rhs: &Tensor) -> TensorResult<Tensor> {
        let mismatch = || TensorError::MatmulDimensionError {
            lhs: self.shape().to_vec(),
            rhs: rhs.shape().to_vec(),
        };
        let b = rhs
            .data
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| mismatch())?;
        let Some((&inner, leading)) = self.shape().split_last() else {
            return Err(mismatch());
        };
        if inner != b.nrows() {
            return Err(mismatch());
        }

        let rows: usize = leading.iter().product();
        let a = self
            .data
            .to_shape((rows, inner))
            .map_err(|e| TensorError::ShapeError(e.to_string()))?;
        let product = a.dot(&b);

        let mut out_shape = leading.to_vec();
        out_shape.push(b.ncols());
        let reshaped = product
            .to_shape(out_shape)
            .map_err(|e| TensorError::ShapeError(e.to_string()))?
            .into_owned();
        Ok(Tensor::new(reshaped))
    }

    /// 2D convolution, NCHW layout.
    ///
    /// Input `[N, C_in, H, W]`, weight `[C_out, C_in / groups, kH, kW]`, bias `[C_out]`.
    pub fn conv2d(
        &self,
        weight: &Tensor,
        bias: Option<&Tensor>,
        stride: (usize, usize),
        padding: (usize, usize),
        dilation: (usize, usize),
        groups: usize,
    ) -> TensorResult<Tensor> {
        let input_arr = self
            .data
            .view()
            .into_dimensionality::<Ix4>()
            .map_err(|e| TensorError::ShapeError(format!("Conv2d input: {}", e)))?;
        let weight_arr = weight
            .data
            .view()
            .into_dimensionality::<Ix4>()
            .map_err(|e| TensorError::ShapeError(format!("Conv2d weight: {}", e)))?;

        let (batch_size, in_channels, in_h, in_w) = input_arr.dim();
        let (out_channels, weight_in_channels, kernel_h, kernel_w) = weight_arr.dim();

        if groups == 0 || out_channels % groups != 0 {
            return Err(TensorError::ShapeError(format!(
                "Conv2d: {} output channels cannot be split into {} groups",
                out_channels, groups
            )));
        }
        if in_channels != weight_in_channels * groups {
            return Err(TensorError::ShapeError(format!(
                "Conv2d: input channels {} != weight_in_channels {} * groups {}",
                in_channels, weight_in_channels, groups
            )));
        }

        let (stride_h, stride_w) = stride;
        let (pad_h, pad_w) = padding;
        let (dil_h, dil_w) = dilation;
        if stride_h == 0 || stride_w == 0 || dil_h == 0 || dil_w == 0 {
            return Err(TensorError::ShapeError(
                "Conv2d: stride and dilation must be positive".to_string(),
            ));
        }

        let effective_kernel_h = kernel_h.saturating_sub(1) * dil_h + 1;
        let effective_kernel_w = kernel_w.saturating_sub(1) * dil_w + 1;
        let padded_h = in_h + 2 * pad_h;
        let padded_w = in_w + 2 * pad_w;
        if kernel_h == 0 || kernel_w == 0 || padded_h < effective_kernel_h || padded_w < effective_kernel_w {
            return Err(TensorError::ShapeError(format!(
                "Conv2d: kernel {}x{} does not fit padded input {}x{}",
                effective_kernel_h, effective_kernel_w, padded_h, padded_w
            )));
        }
        let out_h = (padded_h - effective_kernel_h) / stride_h + 1;
        let out_w = (padded_w - effective_kernel_w) / stride_w + 1;

        let mut output = Array4::<f32>::zeros((batch_size, out_channels, out_h, out_w));

        let out_channels_per_group = out_channels / groups;
        let in_channels_per_group = in_channels / groups;

        for n in 0..batch_size {
            for g in 0..groups {
                let in_ch_start = g * in_channels_per_group;
                let out_ch_start = g * out_channels_per_group;

                for oc in 0..out_channels_per_group {
                    let out_ch = out_ch_start + oc;
                    for oh in 0..out_h {
                        for ow in 0..out_w {
                            let mut sum = 0.0f32;
                            for ic in 0..weight_in_channels {
                                let in_ch = in_ch_start + ic;
                                for kh in 0..kernel_h {
                                    for kw in 0..kernel_w {
                                        let ih = (oh * stride_h + kh * dil_h) as isize - pad_h as isize;
                                        let iw = (ow * stride_w + kw * dil_w) as isize - pad_w as isize;
                                        if ih >= 0 && ih < in_h as isize && iw >= 0 && iw < in_w as isize {
                                            sum += input_arr[[n, in_ch, ih as usize, iw as usize]]
                                                * weight_arr[[out_ch, ic, kh, kw]];
                                        }
                                    }
                                }
                            }
                            output[[n, out_ch, oh, ow]] = sum;
                        }
                    }
                }
            }
        }

        if let Some(bias) = bias {
            if bias.shape() != [out_channels] {
                return Err(TensorError::ShapeError(format!(
                    "Conv2d: bias shape {:?} does not match {} output channels",
                    bias.shape(),
                    out_channels
                )));
            }
            for (c, &b) in bias.data.iter().enumerate() {
                output
                    .slice_mut(ndarray::s![.., c, .., ..])
                    .mapv_inplace(|v| v + b);
            }
        }

        Ok(Tensor::new(output.into_dyn()))
    }

    // --- Activations ---

    pub fn relu(&self) -> Tensor {
        Tensor::new(self.data.mapv(|x| x.max(0.0)))
    }

    pub fn leaky_relu(&self, negative_slope: f32) -> Tensor {
        Tensor::new(self.data.mapv(|x| if x > 0.0 { x } else { negative_slope * x }))
    }

    /// `x` if positive, `alpha * (exp(x) - 1)` otherwise.
    pub fn elu(&self, alpha: f32) -> Tensor {
        Tensor::new(self.data.mapv(|x| if x > 0.0 { x } else { alpha * (x.exp() - 1.0) }))
    }

    pub fn sigmoid(&self) -> Tensor {
        Tensor::new(self.data.mapv(|x| 1.0 / (1.0 + (-x).exp())))
    }

    pub fn tanh(&self) -> Tensor {
        Tensor::new(self.data.mapv(|x| x.tanh()))
    }

    /// Tanh approximation of GELU.
    pub fn gelu(&self) -> Tensor {
        const SQRT_2_OVER_PI: f32 = 0.797_884_6;
        Tensor::new(
            self.data
                .mapv(|x| 0.5 * x * (1.0 + (SQRT_2_OVER_PI * (x + 0.044715 * x.powi(3))).tanh())),
        )
    }

    /// `x * sigmoid(x)`.
    pub fn silu(&self) -> Tensor {
        Tensor::new(self.data.mapv(|x| x / (1.0 + (-x).exp())))
    }
}

impl From<ArrayD<f32>> for Tensor {
    fn from(data: ArrayD<f32>) -> Self {
        Self::new(data)
    }
}

impl Mul<f32> for &Tensor {
    type Output = Tensor;
    fn mul(self, factor: f32) -> Tensor {
        self.scale(factor)
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor{:?}", self.shape())
    }
}
