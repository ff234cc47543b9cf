// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Methods for validating the acyclicity, the connectedness and the boundary
//! units of a [`PlantGraph`].

use std::collections::BTreeSet;

use crate::{unit_category::CategoryPredicates, Edge, Error, Node};

use super::PlantGraphValidator;

impl<N, E> PlantGraphValidator<'_, N, E>
where
    N: Node,
    E: Edge,
{
    /// Validates that all units are connected into a single graph.
    ///
    /// It does so by ensuring that all the units are reachable by traversing
    /// the graph from the influent, following feedback connections too.
    pub(super) fn validate_connected_graph(&self, root: &N) -> Result<(), Error> {
        let root_id = root.unit_id();
        let mut visited = BTreeSet::new();
        let mut queue = vec![root_id];
        visited.insert(root_id);
        while let Some(node_id) = queue.pop() {
            for successor in self.pg.successors(node_id)? {
                if visited.insert(successor.unit_id()) {
                    queue.push(successor.unit_id());
                }
            }
        }

        let unvisited = self
            .pg
            .units()
            .map(|n| n.unit_id())
            .filter(|id| !visited.contains(id))
            .collect::<Vec<_>>();

        if !unvisited.is_empty() {
            return Err(Error::invalid_graph(format!(
                "Units {:?} are not connected to the influent.",
                unvisited
            )));
        }

        Ok(())
    }

    /// Validates that every cycle in the graph is broken by a feedback
    /// connection.
    ///
    /// If a cycle of forward connections is detected, an error is returned,
    /// that lists the units in the cycle.
    pub(super) fn validate_acyclicity(
        &self,
        node: &N,
        mut predecessors: Vec<u64>,
    ) -> Result<(), Error> {
        predecessors.push(node.unit_id());
        for successor in self.pg.forward_successors(node.unit_id())? {
            if let Some(first_occurance) = predecessors
                .iter()
                .position(|id| *id == successor.unit_id())
            {
                return Err(Error::invalid_graph(format!(
                    "Cycle without a feedback connection detected: {} -> {}",
                    predecessors[first_occurance..]
                        .iter()
                        .map(|x| x.to_string())
                        .collect::<Vec<_>>()
                        .join(" -> "),
                    successor.unit_id()
                )));
            }
            self.validate_acyclicity(successor, predecessors.clone())?;
        }
        Ok(())
    }

    /// Validates that the influent is where the plant starts, and that sinks
    /// are where it ends.
    ///
    /// Feedback connections count too: nothing may be recycled into the
    /// influent, and a sink's stream leaves the plant.
    pub(super) fn validate_boundaries(&self) -> Result<(), Error> {
        let influent = self.root.unit_id();
        if let Some(feed) = self.pg.predecessors(influent)?.next() {
            return Err(Error::invalid_graph(format!(
                "The influent can't receive streams, but {}:{} feeds it.",
                feed.category(),
                feed.unit_id()
            )));
        }
        if self.pg.successors(influent)?.next().is_none() {
            return Err(Error::invalid_graph("The influent doesn't feed any unit."));
        }

        for sink in self.pg.units().filter(|n| n.is_sink()) {
            if let Some(fed) = self.pg.successors(sink.unit_id())?.next() {
                return Err(Error::invalid_graph(format!(
                    "Sink:{} ends a stream, but feeds {}:{}.",
                    sink.unit_id(),
                    fed.category(),
                    fed.unit_id()
                )));
            }
        }

        Ok(())
    }
}
