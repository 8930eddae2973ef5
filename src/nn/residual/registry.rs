//! Shortcut and scale registries of a residual container, plus the slot-index
//! checks every registration goes through.
//!
//! Slot numbering: `0` is the container input, `1..=N` are module outputs and
//! `N + 1` is the container output, where `N` is the number of modules.

use crate::nn::module::Module;
use std::collections::BTreeMap;
use thiserror::Error;

/// Rejected registration. The container state is left unchanged.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidualError {
    #[error("Invalid shortcut {from} -> {to} for {num_modules} module(s): expected 0 <= from < to <= {}", .num_modules + 1)]
    InvalidShortcut {
        from: usize,
        to: usize,
        num_modules: usize,
    },

    #[error("Invalid scale slot {slot} for {num_modules} module(s): expected 1 <= slot <= {}", .num_modules + 1)]
    InvalidScaleSlot { slot: usize, num_modules: usize },
}

pub type ResidualResult<T> = std::result::Result<T, ResidualError>;

/// Checks `0 <= from < to <= num_modules + 1`.
pub(crate) fn validate_shortcut(from: usize, to: usize, num_modules: usize) -> ResidualResult<()> {
    if from >= to || to > num_modules + 1 {
        return Err(ResidualError::InvalidShortcut { from, to, num_modules });
    }
    Ok(())
}

/// Checks `1 <= slot <= num_modules + 1`.
pub(crate) fn validate_scale_slot(slot: usize, num_modules: usize) -> ResidualResult<()> {
    if slot == 0 || slot > num_modules + 1 {
        return Err(ResidualError::InvalidScaleSlot { slot, num_modules });
    }
    Ok(())
}

/// Additive edge from an earlier slot into the combined input of a later one.
#[derive(Debug)]
pub struct Shortcut {
    pub from: usize,
    pub to: usize,
    /// Applied to the source value before it is added. Owned by this edge only.
    pub projection: Option<Box<dyn Module>>,
}

impl Shortcut {
    pub fn describe(&self) -> String {
        match &self.projection {
            Some(projection) => format!("{} -> {} via {}", self.from, self.to, projection.describe()),
            None => format!("{} -> {}", self.from, self.to),
        }
    }
}

/// Multiset of shortcuts, kept in registration order.
///
/// Registration order is also the summation order for edges sharing a target.
#[derive(Debug, Default)]
pub struct ShortcutRegistry {
    edges: Vec<Shortcut>,
}

impl ShortcutRegistry {
    pub fn push(&mut self, shortcut: Shortcut) {
        self.edges.push(shortcut);
    }

    /// Edges ending at `to`, in registration order.
    pub fn incoming(&self, to: usize) -> impl Iterator<Item = &Shortcut> {
        self.edges.iter().filter(move |edge| edge.to == to)
    }

    pub fn as_slice(&self) -> &[Shortcut] {
        &self.edges
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Shortcut> {
        self.edges.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// At most one factor per slot; a later registration replaces the earlier one.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ScaleRegistry {
    factors: BTreeMap<usize, f32>,
}

impl ScaleRegistry {
    /// Stores `factor` for `slot` and returns the factor it replaced.
    pub fn insert(&mut self, slot: usize, factor: f32) -> Option<f32> {
        self.factors.insert(slot, factor)
    }

    pub fn get(&self, slot: usize) -> Option<f32> {
        self.factors.get(&slot).copied()
    }

    /// `(slot, factor)` pairs in ascending slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.factors.iter().map(|(&slot, &factor)| (slot, factor))
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }
}
