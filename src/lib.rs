//! # resgraph: residual composition of neural network modules
//!
//! A [`Residual`](nn::Residual) container runs its modules in order and lets any
//! earlier value skip ahead through shortcut edges, optionally projected and
//! scaled on arrival. Everything evaluates eagerly on [`Tensor`](tensor::Tensor)s
//! backed by `ndarray`.
//!
//! ## Usage Example
//!
//! ```
//! use rand::{rngs::StdRng, SeedableRng};
//! use resgraph::nn::{Linear, ReLU, Residual};
//! use resgraph::tensor::Tensor;
//!
//! let mut rng = StdRng::seed_from_u64(0);
//!
//! // output = relu(linear(x)) + x
//! let mut builder = Residual::builder();
//! builder.add(Linear::new(6, 6, &mut rng));
//! builder.add(ReLU);
//! builder.add_shortcut(0, 3).unwrap();
//! let block = builder.build();
//!
//! let x = Tensor::random_uniform(&[2, 6], -1.0, 1.0, &mut rng);
//! let y = block.forward(&x).unwrap();
//! assert_eq!(y.shape(), &[2, 6]);
//! ```

pub mod config;
pub mod nn;
pub mod tensor;
