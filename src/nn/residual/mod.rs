//! Residual container: a chain of modules with additive shortcut edges and
//! per-slot scale factors.
//!
//! ## Slots
//!
//! ```text
//!   slot 0        slot 1        slot 2              slot N        slot N+1
//!   input ──(1)── out(1) ──(2)── out(2) ── ... ──(N)── out(N) ───── output
//! ```
//!
//! Before module `i` runs (and before the output is returned, for `N + 1`),
//! the value flowing into slot `i` is combined:
//!
//! 1. start from the value of slot `i - 1`;
//! 2. add every shortcut ending at `i`, in registration order, each one after
//!    its optional projection;
//! 3. multiply by the factor registered for `i`, if any.
//!
//! Summation always precedes scaling, and scaling always precedes the module
//! call (or the return). Every term of a sum must have exactly the shape of
//! the slot value; nothing is broadcast.

mod builder;
mod registry;
mod topology;

pub use builder::ResidualBuilder;
pub use registry::{ResidualError, ResidualResult, ScaleRegistry, Shortcut, ShortcutRegistry};
pub use topology::{SlotEdge, SlotNode, Topology};

use crate::nn::module::Module;
use crate::tensor::{Tensor, TensorResult};
use log::trace;
use std::fmt;

/// Frozen residual container.
///
/// Built with [`ResidualBuilder`]; immutable during evaluation, so repeated
/// `forward` calls are independent of each other.
#[derive(Debug)]
pub struct Residual {
    modules: Vec<Box<dyn Module>>,
    shortcuts: ShortcutRegistry,
    scales: ScaleRegistry,
}

/// Accumulated values, one per slot evaluated so far.
struct SlotTable {
    values: Vec<Tensor>,
}

impl SlotTable {
    fn new(input: &Tensor, capacity: usize) -> Self {
        let mut values = Vec::with_capacity(capacity);
        values.push(input.clone());
        Self { values }
    }

    fn push(&mut self, value: Tensor) {
        self.values.push(value);
    }

    // Registration guarantees `from < to`, and slot `to` is only combined once
    // every earlier slot is in the table.
    fn get(&self, slot: usize) -> &Tensor {
        &self.values[slot]
    }

    fn last(&self) -> &Tensor {
        &self.values[self.values.len() - 1]
    }
}

impl Residual {
    pub fn builder() -> ResidualBuilder {
        ResidualBuilder::new()
    }

    pub(crate) fn from_parts(
        modules: Vec<Box<dyn Module>>,
        shortcuts: ShortcutRegistry,
        scales: ScaleRegistry,
    ) -> Self {
        Self {
            modules,
            shortcuts,
            scales,
        }
    }

    /// Number of modules `N` in the chain.
    pub fn num_modules(&self) -> usize {
        self.modules.len()
    }

    /// The virtual slot `N + 1` holding the container output.
    pub fn output_slot(&self) -> usize {
        self.modules.len() + 1
    }

    /// Module occupying `slot` (1-based).
    pub fn module(&self, slot: usize) -> Option<&dyn Module> {
        let index = slot.checked_sub(1)?;
        self.modules.get(index).map(|m| m.as_ref())
    }

    /// Shortcuts in registration order.
    pub fn shortcuts(&self) -> &[Shortcut] {
        self.shortcuts.as_slice()
    }

    pub fn scale(&self, slot: usize) -> Option<f32> {
        self.scales.get(slot)
    }

    pub fn scales(&self) -> &ScaleRegistry {
        &self.scales
    }

    /// Runs the chain once on `input`.
    ///
    /// Any error raised by a module or a projection is returned unchanged.
    pub fn forward(&self, input: &Tensor) -> TensorResult<Tensor> {
        let mut slots = SlotTable::new(input, self.modules.len() + 1);
        for (index, module) in self.modules.iter().enumerate() {
            let combined = self.combine(index + 1, &slots)?;
            slots.push(module.forward(&combined)?);
        }
        self.combine(self.output_slot(), &slots)
    }

    /// Sum-then-scale of everything destined for `slot`.
    fn combine(&self, slot: usize, slots: &SlotTable) -> TensorResult<Tensor> {
        let mut combined = slots.last().clone();
        let mut incoming = 0;
        for shortcut in self.shortcuts.incoming(slot) {
            let source = slots.get(shortcut.from);
            combined = match &shortcut.projection {
                Some(projection) => combined.add(&projection.forward(source)?)?,
                None => combined.add(source)?,
            };
            incoming += 1;
        }
        let factor = self.scales.get(slot);
        if let Some(factor) = factor {
            combined = combined.scale(factor);
        }
        trace!("residual: slot {} combined {} shortcut(s), scale {:?}", slot, incoming, factor);
        Ok(combined)
    }
}

impl Module for Residual {
    fn forward(&self, input: &Tensor) -> TensorResult<Tensor> {
        self.forward(input)
    }

    /// Chain parameters first, then projection parameters in registration order.
    fn parameters(&self) -> Vec<Tensor> {
        let chain = self.modules.iter().flat_map(|m| m.parameters());
        let projections = self
            .shortcuts
            .as_slice()
            .iter()
            .filter_map(|s| s.projection.as_ref())
            .flat_map(|p| p.parameters());
        chain.chain(projections).collect()
    }

    fn set_training(&mut self, training: bool) {
        for module in &mut self.modules {
            module.set_training(training);
        }
        for shortcut in self.shortcuts.iter_mut() {
            if let Some(projection) = &mut shortcut.projection {
                projection.set_training(training);
            }
        }
    }

    fn describe(&self) -> String {
        format!(
            "Residual ({} module(s), {} shortcut(s), {} scale(s))",
            self.modules.len(),
            self.shortcuts.len(),
            self.scales.len()
        )
    }
}

impl fmt::Display for Residual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Residual [input")?;
        for slot in 1..=self.modules.len() {
            write!(f, " -> ({})", slot)?;
        }
        write!(f, " -> output]")?;
        for (index, module) in self.modules.iter().enumerate() {
            write!(f, "\n\t({}): {}", index + 1, module.describe())?;
        }
        for shortcut in self.shortcuts.as_slice() {
            write!(f, "\n\tshortcut {}", shortcut.describe())?;
        }
        for (slot, factor) in self.scales.iter() {
            write!(f, "\n\tscale before ({}): {}", slot, factor)?;
        }
        Ok(())
    }
}
