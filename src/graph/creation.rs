// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Methods for creating [`PlantGraph`] instances from given units and
//! connections.

use std::collections::HashSet;

use petgraph::graph::DiGraph;

use crate::{unit_category::CategoryPredicates, Edge, Error, Node, PlantGraphConfig};

use super::{NodeIndexMap, PlantGraph};

/// `PlantGraph` instantiation.
impl<N, E> PlantGraph<N, E>
where
    N: Node,
    E: Edge,
{
    /// Creates a new [`PlantGraph`] from the given units and connections.
    ///
    /// Returns an error if the graph is invalid.
    pub fn try_new<NodeIterator: IntoIterator<Item = N>, EdgeIterator: IntoIterator<Item = E>>(
        units: NodeIterator,
        connections: EdgeIterator,
        config: PlantGraphConfig,
    ) -> Result<Self, Error> {
        let (graph, indices) = Self::create_graph(units)?;
        let root_id = Self::find_root(&graph)?.unit_id();

        let mut pg = Self {
            graph,
            node_indices: indices,
            root_id,
            evaluation_order: Vec::new(),
            config,
        };
        pg.add_connections(connections)?;

        pg.validate()?;
        pg.evaluation_order = pg.forward_order()?;

        tracing::debug!(order = ?pg.evaluation_order, "Plant graph validated.");

        Ok(pg)
    }

    fn find_root(graph: &DiGraph<N, E>) -> Result<&N, Error> {
        let mut roots_iter = graph
            .raw_nodes()
            .iter()
            .filter(|n| n.weight.is_influent());

        let root = roots_iter
            .next()
            .map(|n| &n.weight)
            .ok_or_else(|| Error::invalid_graph("No influent unit found."))?;

        if roots_iter.next().is_some() {
            return Err(Error::invalid_graph("Multiple influent units found."));
        }

        Ok(root)
    }

    fn create_graph(units: impl IntoIterator<Item = N>) -> Result<(DiGraph<N, E>, NodeIndexMap), Error> {
        let mut graph = DiGraph::new();
        let mut indices = NodeIndexMap::new();

        for unit in units {
            let uid = unit.unit_id();

            if indices.contains_key(&uid) {
                return Err(Error::invalid_graph(format!(
                    "Duplicate unit ID found: {uid}"
                )));
            }

            let idx = graph.add_node(unit);
            indices.insert(uid, idx);
        }

        Ok((graph, indices))
    }

    fn add_connections(&mut self, connections: impl IntoIterator<Item = E>) -> Result<(), Error> {
        let mut used_outputs = HashSet::new();
        let mut fed_inputs = HashSet::new();

        for connection in connections {
            let sid = connection.source();
            let did = connection.destination();

            if sid == did {
                return Err(Error::invalid_connection(format!(
                    "Connection:({sid}, {did}) Can't connect a unit to itself."
                )));
            }
            for uid in [sid, did] {
                if !self.node_indices.contains_key(&uid) {
                    return Err(Error::invalid_connection(format!(
                        "Connection:({sid}, {did}) Can't find a unit with ID {uid}"
                    )));
                }
            }

            let source_idx = self.node_indices[&sid];
            let dest_idx = self.node_indices[&did];
            let source = &self.graph[source_idx];
            let dest = &self.graph[dest_idx];

            let sport = connection.source_port();
            let dport = connection.destination_port();
            if sport >= source.output_ports() {
                return Err(Error::invalid_connection(format!(
                    "Connection:({sid}, {did}) {}:{sid} has no output port {sport}.",
                    source.category()
                )));
            }
            if dport >= dest.input_ports() {
                return Err(Error::invalid_connection(format!(
                    "Connection:({sid}, {did}) {}:{did} has no input port {dport}.",
                    dest.category()
                )));
            }
            if !used_outputs.insert((sid, sport)) {
                return Err(Error::invalid_connection(format!(
                    "Connection:({sid}, {did}) Output port {sport} of {}:{sid} is already connected.",
                    source.category()
                )));
            }
            if !fed_inputs.insert((did, dport)) {
                return Err(Error::invalid_connection(format!(
                    "Connection:({sid}, {did}) Input port {dport} of {}:{did} is already connected.",
                    dest.category()
                )));
            }

            self.graph.add_edge(source_idx, dest_idx, connection);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_utils::{TestConnection, TestUnit};
    use crate::UnitCategory;

    fn nodes_and_edges() -> (Vec<TestUnit>, Vec<TestConnection>) {
        let units = vec![
            TestUnit::new(3, UnitCategory::Settler, 1, 3),
            TestUnit::new(1, UnitCategory::Combiner, 2, 1),
            TestUnit::new(4, UnitCategory::Sink, 1, 0),
            TestUnit::new(2, UnitCategory::Asm1Reactor, 1, 1),
            TestUnit::new(5, UnitCategory::Sink, 1, 0),
        ];
        let connections = vec![
            TestConnection::new(1, 2),
            TestConnection::new(2, 3),
            TestConnection::ports(3, 0, 4, 0),
            TestConnection::ports(3, 1, 1, 1).feedback(),
            TestConnection::ports(3, 2, 5, 0),
        ];

        (units, connections)
    }

    #[test]
    fn test_unit_validation() {
        let config = PlantGraphConfig::default();
        let (mut units, mut connections) = nodes_and_edges();

        assert!(
            PlantGraph::try_new(units.clone(), connections.clone(), config.clone())
                .is_err_and(|e| e == Error::invalid_graph("No influent unit found.")),
        );

        units.push(TestUnit::new(0, UnitCategory::Influent, 0, 1));
        connections.push(TestConnection::new(0, 1));
        assert!(
            PlantGraph::try_new(units.clone(), connections.clone(), config.clone()).is_ok()
        );

        units.push(TestUnit::new(2, UnitCategory::Splitter, 1, 2));
        assert!(
            PlantGraph::try_new(units.clone(), connections.clone(), config.clone())
                .is_err_and(|e| e == Error::invalid_graph("Duplicate unit ID found: 2"))
        );

        units.pop();
        units.push(TestUnit::new(9, UnitCategory::Influent, 0, 1));
        assert!(
            PlantGraph::try_new(units.clone(), connections.clone(), config.clone())
                .is_err_and(|e| e == Error::invalid_graph("Multiple influent units found."))
        );

        units.pop();
        assert!(
            PlantGraph::try_new(units.clone(), connections.clone(), config.clone()).is_ok()
        );
    }

    #[test]
    fn test_connection_validation() {
        let config = PlantGraphConfig::default();
        let (mut units, mut connections) = nodes_and_edges();

        units.push(TestUnit::new(0, UnitCategory::Influent, 0, 1));
        connections.push(TestConnection::new(0, 1));

        connections.push(TestConnection::new(2, 2));
        assert!(
            PlantGraph::try_new(units.clone(), connections.clone(), config.clone())
                .is_err_and(|e| e
                    == Error::invalid_connection(
                        "Connection:(2, 2) Can't connect a unit to itself."
                    ))
        );

        connections.pop();
        connections.push(TestConnection::new(2, 9));
        assert!(
            PlantGraph::try_new(units.clone(), connections.clone(), config.clone())
                .is_err_and(|e| e
                    == Error::invalid_connection("Connection:(2, 9) Can't find a unit with ID 9"))
        );

        connections.pop();
        connections.push(TestConnection::ports(3, 3, 4, 0));
        assert!(
            PlantGraph::try_new(units.clone(), connections.clone(), config.clone())
                .is_err_and(|e| e
                    == Error::invalid_connection(
                        "Connection:(3, 4) Settler:3 has no output port 3."
                    ))
        );

        connections.pop();
        connections.push(TestConnection::ports(2, 0, 1, 2));
        assert!(
            PlantGraph::try_new(units.clone(), connections.clone(), config.clone())
                .is_err_and(|e| e
                    == Error::invalid_connection(
                        "Connection:(2, 1) Combiner:1 has no input port 2."
                    ))
        );

        connections.pop();
        connections.push(TestConnection::new(2, 3));
        assert!(
            PlantGraph::try_new(units.clone(), connections.clone(), config.clone())
                .is_err_and(|e| e
                    == Error::invalid_connection(
                        "Connection:(2, 3) Output port 0 of ASM1Reactor:2 is already connected."
                    ))
        );

        connections.pop();
        connections.push(TestConnection::ports(3, 2, 4, 0));
        connections.retain(|c| *c != TestConnection::ports(3, 2, 5, 0));
        assert!(
            PlantGraph::try_new(units.clone(), connections.clone(), config.clone())
                .is_err_and(|e| e
                    == Error::invalid_connection(
                        "Connection:(3, 4) Input port 0 of Sink:4 is already connected."
                    ))
        );

        connections.pop();
        connections.push(TestConnection::ports(3, 2, 5, 0));
        assert!(
            PlantGraph::try_new(units.clone(), connections.clone(), config.clone()).is_ok()
        );
    }
}
