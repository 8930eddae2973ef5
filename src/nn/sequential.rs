//! Plain chain of modules without any shortcut edges.

use crate::nn::module::Module;
use crate::tensor::{Tensor, TensorResult};
use std::fmt;

/// Sequential container: chains modules in insertion order.
#[derive(Default)]
pub struct Sequential {
    modules: Vec<Box<dyn Module>>,
}

impl Sequential {
    pub fn new() -> Self {
        Self { modules: Vec::new() }
    }

    /// Appends a module and returns its 1-based position in the chain.
    pub fn add<M: Module + 'static>(&mut self, module: M) -> usize {
        self.push(Box::new(module))
    }

    pub fn push(&mut self, module: Box<dyn Module>) -> usize {
        self.modules.push(module);
        self.modules.len()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Module for Sequential {
    fn forward(&self, input: &Tensor) -> TensorResult<Tensor> {
        let mut current = input.clone();
        for module in &self.modules {
            current = module.forward(&current)?;
        }
        Ok(current)
    }

    fn parameters(&self) -> Vec<Tensor> {
        self.modules.iter().flat_map(|m| m.parameters()).collect()
    }

    fn set_training(&mut self, training: bool) {
        for module in &mut self.modules {
            module.set_training(training);
        }
    }

    fn describe(&self) -> String {
        let inner: Vec<String> = self.modules.iter().map(|m| m.describe()).collect();
        format!("Sequential [{}]", inner.join(" -> "))
    }
}

impl fmt::Debug for Sequential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}
