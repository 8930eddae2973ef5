//! Slot graph of a residual container as a `petgraph` graph, for inspection
//! and Graphviz rendering.

use super::Residual;
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use std::fmt;

/// One node per slot `0..=N+1`.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotNode {
    pub slot: usize,
    pub label: String,
    /// Factor applied to the combined value before this slot consumes it.
    pub scale: Option<f32>,
}

impl fmt::Display for SlotNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}) {}", self.slot, self.label)?;
        if let Some(scale) = self.scale {
            write!(f, " x{}", scale)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotEdge {
    /// Slot `i - 1` feeding slot `i`.
    Chain,
    /// Registered shortcut, with the description of its projection if any.
    Shortcut { projection: Option<String> },
}

impl fmt::Display for SlotEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotEdge::Chain => Ok(()),
            SlotEdge::Shortcut { projection: None } => write!(f, "shortcut"),
            SlotEdge::Shortcut { projection: Some(p) } => write!(f, "shortcut via {}", p),
        }
    }
}

pub type Topology = DiGraph<SlotNode, SlotEdge>;

impl Residual {
    /// Builds the slot graph: `N + 2` nodes, `N + 1` chain edges and one edge per shortcut.
    pub fn topology(&self) -> Topology {
        let mut graph = Topology::new();
        let output = self.output_slot();

        let nodes: Vec<NodeIndex> = (0..=output)
            .map(|slot| {
                let label = if slot == 0 {
                    "input".to_string()
                } else if slot == output {
                    "output".to_string()
                } else {
                    self.modules[slot - 1].describe()
                };
                graph.add_node(SlotNode {
                    slot,
                    label,
                    scale: self.scales.get(slot),
                })
            })
            .collect();

        for pair in nodes.windows(2) {
            graph.add_edge(pair[0], pair[1], SlotEdge::Chain);
        }
        for shortcut in self.shortcuts.as_slice() {
            graph.add_edge(
                nodes[shortcut.from],
                nodes[shortcut.to],
                SlotEdge::Shortcut {
                    projection: shortcut.projection.as_ref().map(|p| p.describe()),
                },
            );
        }
        graph
    }

    /// Graphviz DOT rendering of [`topology`](Self::topology).
    pub fn to_dot(&self) -> String {
        let graph = self.topology();
        format!("{}", Dot::new(&graph))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::ReLU;
    use petgraph::algo::is_cyclic_directed;

    #[test]
    fn test_topology_counts_and_acyclic() {
        let mut builder = Residual::builder();
        builder.add(ReLU);
        builder.add(ReLU);
        builder.add(ReLU);
        builder.add_shortcut(1, 3).unwrap();
        builder.add_shortcut(1, 4).unwrap();
        builder.add_projected_shortcut(2, 4, ReLU).unwrap();
        builder.add_scale(4, 0.5).unwrap();
        let block = builder.build();

        let graph = block.topology();
        assert_eq!(graph.node_count(), 5);
        assert_eq!(graph.edge_count(), 4 + 3);
        assert!(!is_cyclic_directed(&graph));

        let output = graph.node_weights().last().unwrap();
        assert_eq!(output.to_string(), "(4) output x0.5");
    }

    #[test]
    fn test_to_dot_mentions_shortcuts() {
        let mut builder = Residual::builder();
        builder.add(ReLU);
        builder.add_projected_shortcut(0, 2, ReLU).unwrap();
        let dot = builder.build().to_dot();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("shortcut via ReLU"));
        assert!(dot.contains("(0) input"));
    }
}
