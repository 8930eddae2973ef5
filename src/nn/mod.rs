//! # Neural Network Modules
//!
//! Building blocks that can be chained into forward-pass graphs.
//!
//! Everything here implements [`Module`]: one tensor in, one tensor out,
//! deterministic for fixed parameters. Containers only ever see that trait.
//!
//! ## Available Modules
//!
//! ### Containers
//! - [`Residual`] / [`ResidualBuilder`]: chain with shortcut edges and per-slot scales
//! - [`Sequential`]: plain chain
//!
//! ### Core Layers
//! - [`Linear`]: Fully connected / dense layer
//! - [`Conv2d`]: 2D convolution with configurable stride, padding, dilation
//!
//! ### Normalization
//! - [`LayerNorm`]: Layer normalization
//! - [`BatchNorm`]: Batch normalization
//!
//! ### Activations
//! - [`ReLU`], [`LeakyReLU`], [`ELU`]: Rectified linear units
//! - [`Sigmoid`], [`Tanh`]: Classic activations
//! - [`GELU`], [`SiLU`]/[`Swish`]: Modern smooth activations
//!
//! ## Example
//!
//! ```rust
//! use rand::{rngs::StdRng, SeedableRng};
//! use resgraph::nn::{Conv2d, Conv2dConfig, BatchNorm, Module, ReLU, Residual};
//! use resgraph::tensor::Tensor;
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let mut block = Residual::builder();
//! block.add(Conv2d::new(Conv2dConfig::new(4, 4, (3, 3)).with_padding((1, 1)), &mut rng));
//! block.add(BatchNorm::new(4));
//! block.add(ReLU::new());
//! block.add_shortcut(1, 3).unwrap();
//! let block = block.build();
//!
//! let x = Tensor::random_uniform(&[2, 4, 6, 6], -1.0, 1.0, &mut rng);
//! assert_eq!(block.forward(&x).unwrap().shape(), &[2, 4, 6, 6]);
//! ```

pub mod activations;
pub mod batchnorm;
pub mod conv;
pub mod linear;
pub mod module;
pub mod norm;
pub mod residual;
pub mod sequential;

// Activations
pub use activations::{ELU, GELU, LeakyReLU, ReLU, SiLU, Sigmoid, Swish, Tanh};

// Layers
pub use batchnorm::BatchNorm;
pub use conv::{Conv2d, Conv2dConfig};
pub use linear::Linear;
pub use norm::LayerNorm;

// Containers
pub use residual::{Residual, ResidualBuilder, ResidualError, ResidualResult, Shortcut};
pub use sequential::Sequential;

// Base trait
pub use module::Module;
