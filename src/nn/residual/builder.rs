//! Graph-building phase of a residual container.

use super::registry::{
    validate_scale_slot, validate_shortcut, ResidualResult, ScaleRegistry, Shortcut, ShortcutRegistry,
};
use super::Residual;
use crate::nn::module::Module;
use log::debug;

/// Accumulates modules, shortcuts and scales, then freezes them into a [`Residual`].
///
/// Every index is checked against the number of modules added so far, so a
/// rejected call never reaches the frozen container. Indices are absolute: a
/// shortcut into slot `N + 1` targets the container output only as long as no
/// further module is added.
///
/// ```rust
/// use rand::{rngs::StdRng, SeedableRng};
/// use resgraph::nn::{Linear, Module, ReLU, Residual};
/// use resgraph::tensor::Tensor;
///
/// let mut rng = StdRng::seed_from_u64(0);
/// let mut builder = Residual::builder();
/// builder.add(Linear::new(4, 4, &mut rng));
/// builder.add(ReLU::new());
/// builder.add_shortcut(0, 3).unwrap();
/// let block = builder.build();
///
/// let y = block.forward(&Tensor::zeros(&[2, 4])).unwrap();
/// assert_eq!(y.shape(), &[2, 4]);
/// ```
#[derive(Debug, Default)]
pub struct ResidualBuilder {
    modules: Vec<Box<dyn Module>>,
    shortcuts: ShortcutRegistry,
    scales: ScaleRegistry,
}

impl ResidualBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `module` to the chain and returns its slot number.
    pub fn add<M: Module + 'static>(&mut self, module: M) -> usize {
        self.add_boxed(Box::new(module))
    }

    pub fn add_boxed(&mut self, module: Box<dyn Module>) -> usize {
        let slot = self.modules.len() + 1;
        debug!("residual: slot {} <- {}", slot, module.describe());
        self.modules.push(module);
        slot
    }

    /// Adds the value of slot `from` to the combined input of slot `to`.
    pub fn add_shortcut(&mut self, from: usize, to: usize) -> ResidualResult<()> {
        self.register_shortcut(from, to, None)
    }

    /// Like [`add_shortcut`](Self::add_shortcut), passing the source value
    /// through `projection` first. The edge takes sole ownership of it.
    pub fn add_projected_shortcut<M: Module + 'static>(
        &mut self,
        from: usize,
        to: usize,
        projection: M,
    ) -> ResidualResult<()> {
        self.register_shortcut(from, to, Some(Box::new(projection)))
    }

    pub fn add_boxed_shortcut(
        &mut self,
        from: usize,
        to: usize,
        projection: Option<Box<dyn Module>>,
    ) -> ResidualResult<()> {
        self.register_shortcut(from, to, projection)
    }

    fn register_shortcut(
        &mut self,
        from: usize,
        to: usize,
        projection: Option<Box<dyn Module>>,
    ) -> ResidualResult<()> {
        validate_shortcut(from, to, self.modules.len())?;
        let shortcut = Shortcut { from, to, projection };
        debug!("residual: shortcut {}", shortcut.describe());
        self.shortcuts.push(shortcut);
        Ok(())
    }

    /// Multiplies the combined value of `slot` by `factor` before it is consumed.
    ///
    /// Returns the factor previously registered for this slot, which is replaced.
    pub fn add_scale(&mut self, slot: usize, factor: f32) -> ResidualResult<Option<f32>> {
        validate_scale_slot(slot, self.modules.len())?;
        let previous = self.scales.insert(slot, factor);
        match previous {
            Some(old) => debug!("residual: scale before ({}) {} replaced by {}", slot, old, factor),
            None => debug!("residual: scale before ({}) {}", slot, factor),
        }
        Ok(previous)
    }

    pub fn num_modules(&self) -> usize {
        self.modules.len()
    }

    pub fn num_shortcuts(&self) -> usize {
        self.shortcuts.len()
    }

    pub fn num_scales(&self) -> usize {
        self.scales.len()
    }

    /// Freezes the graph.
    pub fn build(self) -> Residual {
        debug!(
            "residual: frozen with {} module(s), {} shortcut(s), {} scale(s)",
            self.modules.len(),
            self.shortcuts.len(),
            self.scales.len()
        );
        Residual::from_parts(self.modules, self.shortcuts, self.scales)
    }
}
