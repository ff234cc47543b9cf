// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! This module contains methods that help with graph traversal.

use petgraph::visit::EdgeFiltered;

use crate::{Edge, Error, Node, PlantGraph};

/// Traversal methods.
impl<N, E> PlantGraph<N, E>
where
    N: Node,
    E: Edge,
{
    /// Returns the order in which units are evaluated in each step.
    ///
    /// Every unit comes after all the units feeding it through forward
    /// connections.  Feedback connections are ignored, since they carry the
    /// previous step's streams.
    pub fn evaluation_order(&self) -> &[u64] {
        &self.evaluation_order
    }

    /// Returns the units fed by the unit with the given `unit_id` through
    /// forward connections.
    pub(crate) fn forward_successors(
        &self,
        unit_id: u64,
    ) -> Result<impl Iterator<Item = &N> + '_, Error> {
        Ok(self
            .outgoing(unit_id)?
            .filter(|c| !c.is_feedback())
            .filter_map(|c| self.unit(c.destination()).ok()))
    }

    pub(super) fn forward_order(&self) -> Result<Vec<u64>, Error> {
        let forward = EdgeFiltered::from_fn(&self.graph, |e| !e.weight().is_feedback());
        let sorted = petgraph::algo::toposort(&forward, None).map_err(|cycle| {
            Error::invalid_graph(format!(
                "Cycle without a feedback connection detected at {}:{}.",
                self.graph[cycle.node_id()].category(),
                self.graph[cycle.node_id()].unit_id()
            ))
        })?;
        Ok(sorted
            .into_iter()
            .map(|i| self.graph[i].unit_id())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_utils::PlantGraphBuilder;
    use crate::PlantGraphConfig;

    fn position(order: &[u64], id: u64) -> usize {
        order.iter().position(|x| *x == id).unwrap()
    }

    #[test]
    fn test_evaluation_order() -> Result<(), Error> {
        let mut builder = PlantGraphBuilder::new();
        let influent = builder.influent();
        let combiner = builder.combiner(3);
        builder.connect(influent, combiner);
        let last = builder.reactor_chain(combiner, 5);
        let splitter = builder.splitter(2);
        let settler = builder.settler();
        let effluent = builder.sink();
        let waste = builder.sink();
        builder
            .connect(last, splitter)
            .feedback(splitter, 0, combiner, 1)
            .connect_ports(splitter, 1, settler, 0)
            .connect_ports(settler, 0, effluent, 0)
            .feedback(settler, 1, combiner, 2)
            .connect_ports(settler, 2, waste, 0);

        let graph = builder.build(None)?;
        let order = graph.evaluation_order();
        assert_eq!(order.len(), 11);
        assert_eq!(order[0], influent.unit_id());

        for connection in graph.connections().filter(|c| !c.is_feedback()) {
            assert!(
                position(order, connection.source()) < position(order, connection.destination())
            );
        }
        assert!(position(order, combiner.unit_id()) < position(order, settler.unit_id()));

        let successors = graph
            .forward_successors(splitter.unit_id())?
            .map(|n| n.unit_id())
            .collect::<Vec<_>>();
        assert_eq!(successors, [settler.unit_id()]);

        Ok(())
    }

    #[test]
    fn test_unreachable_cycle() {
        let mut builder = PlantGraphBuilder::new();
        let influent = builder.influent();
        let sink = builder.sink();
        builder.connect(influent, sink);

        let combiner = builder.combiner(1);
        let splitter = builder.splitter(2);
        let overflow = builder.sink();
        builder
            .connect(combiner, splitter)
            .connect_ports(splitter, 0, combiner, 0)
            .connect_ports(splitter, 1, overflow, 0);

        assert!(builder.build(None).is_err_and(|e| e
            == Error::invalid_graph("Units [2, 3, 4] are not connected to the influent.")));

        let config = PlantGraphConfig {
            allow_unconnected_units: true,
            ..Default::default()
        };
        assert!(builder.build(Some(config)).is_err_and(|e| e
            .message()
            .starts_with("Cycle without a feedback connection detected at")));
    }
}
