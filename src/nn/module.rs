//! Module defining the core `Module` trait for all neural network layers.

use crate::tensor::{Tensor, TensorResult};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Trait defining the common interface for all layers/modules.
///
/// A module is a deterministic single-tensor-in, single-tensor-out transform.
/// Containers depend only on this trait, never on concrete layer types.
///
/// # Re-entrancy
///
/// The trait does not require `Send` or `Sync`, and containers hold their
/// modules as `Box<dyn Module>`. A container is therefore neither `Send` nor
/// `Sync` and cannot be shared across threads; build one per thread instead.
///
/// ```compile_fail
/// fn shareable<T: Sync>() {}
/// shareable::<resgraph::nn::Residual>();
/// ```
pub trait Module {
    /// Runs the transform on `input`.
    ///
    /// Errors are returned to the caller as-is; containers never translate them.
    fn forward(&self, input: &Tensor) -> TensorResult<Tensor>;

    /// Returns all trainable parameters of this module, in a stable order.
    fn parameters(&self) -> Vec<Tensor>;

    /// Switches between training and inference behaviour.
    fn set_training(&mut self, _training: bool) {}

    /// One-line human readable description.
    fn describe(&self) -> String {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full).to_string()
    }
}

impl fmt::Debug for dyn Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl<M: Module + ?Sized> Module for Box<M> {
    fn forward(&self, input: &Tensor) -> TensorResult<Tensor> {
        (**self).forward(input)
    }

    fn parameters(&self) -> Vec<Tensor> {
        (**self).parameters()
    }

    fn set_training(&mut self, training: bool) {
        (**self).set_training(training)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

// Shared pointers are the explicit opt-in for weight sharing: the same module
// can sit in several slots, or be used outside the container at the same time.

impl<M: Module + ?Sized> Module for Rc<M> {
    fn forward(&self, input: &Tensor) -> TensorResult<Tensor> {
        (**self).forward(input)
    }

    fn parameters(&self) -> Vec<Tensor> {
        (**self).parameters()
    }

    fn set_training(&mut self, training: bool) {
        if Rc::get_mut(self)
            .map(|module| module.set_training(training))
            .is_none()
        {
            log::warn!(
                "{} is shared; training mode left unchanged",
                (**self).describe()
            );
        }
    }

    fn describe(&self) -> String {
        format!("shared {}", (**self).describe())
    }
}

impl<M: Module + ?Sized> Module for Arc<M> {
    fn forward(&self, input: &Tensor) -> TensorResult<Tensor> {
        (**self).forward(input)
    }

    fn parameters(&self) -> Vec<Tensor> {
        (**self).parameters()
    }

    fn set_training(&mut self, training: bool) {
        if Arc::get_mut(self)
            .map(|module| module.set_training(training))
            .is_none()
        {
            log::warn!(
                "{} is shared; training mode left unchanged",
                (**self).describe()
            );
        }
    }

    fn describe(&self) -> String {
        format!("shared {}", (**self).describe())
    }
}
