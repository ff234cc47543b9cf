// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! A graph representation of the process units that make up a treatment
//! plant, and the stream connections between them.

mod creation;
mod retrieval;
mod validation;

pub mod iterators;
mod traversal;

#[cfg(test)]
mod test_utils;

use crate::{Edge, Node, PlantGraphConfig};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// `Node`s stored in a `DiGraph` instance can be addressed with `NodeIndex`es.
///
/// `NodeIndexMap` stores the corresponding `NodeIndex` for any `unit_id`, so
/// that Nodes in the `DiGraph` can be retrieved from their `unit_id`s.
pub(crate) type NodeIndexMap = HashMap<u64, NodeIndex>;

/// A graph representation of the process units of a plant and the streams
/// between them.
///
/// Connections are stored as edge weights, so two units can be connected
/// more than once through different ports.
pub struct PlantGraph<N, E>
where
    N: Node,
    E: Edge,
{
    graph: DiGraph<N, E>,
    node_indices: NodeIndexMap,
    root_id: u64,
    evaluation_order: Vec<u64>,
    config: PlantGraphConfig,
}

impl<N, E> PlantGraph<N, E>
where
    N: Node,
    E: Edge,
{
    /// Returns the ID of the influent unit.
    pub fn influent_id(&self) -> u64 {
        self.root_id
    }

    /// Returns the configuration the graph was validated with.
    pub fn config(&self) -> &PlantGraphConfig {
        &self.config
    }
}
