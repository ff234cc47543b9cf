// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Methods for retrieving units and connections from a [`PlantGraph`].

use petgraph::graph::NodeIndex;
use petgraph::Direction;

use crate::iterators::{Connections, Neighbors, UnitConnections, Units};
use crate::{Edge, Error, Node, PlantGraph};

/// `Unit` and `Connection` retrieval.
impl<N, E> PlantGraph<N, E>
where
    N: Node,
    E: Edge,
{
    fn index_of(&self, unit_id: u64) -> Result<NodeIndex, Error> {
        self.node_indices
            .get(&unit_id)
            .copied()
            .ok_or_else(|| Error::unit_not_found(format!("Unit with id {} not found.", unit_id)))
    }

    /// Returns the unit with the given `unit_id`, if it exists.
    pub fn unit(&self, unit_id: u64) -> Result<&N, Error> {
        self.index_of(unit_id).map(|i| &self.graph[i])
    }

    /// Returns an iterator over the units in the graph.
    pub fn units(&self) -> Units<N> {
        Units {
            iter: self.graph.raw_nodes().iter(),
        }
    }

    /// Returns an iterator over the connections in the graph.
    pub fn connections(&self) -> Connections<E> {
        Connections {
            iter: self.graph.raw_edges().iter(),
        }
    }

    /// Returns an iterator over the connections that feed the unit with the
    /// given `unit_id`.
    ///
    /// Returns an error if the given `unit_id` does not exist.
    pub fn incoming(&self, unit_id: u64) -> Result<UnitConnections<E>, Error> {
        self.index_of(unit_id).map(|index| UnitConnections {
            iter: self.graph.edges_directed(index, Direction::Incoming),
        })
    }

    /// Returns an iterator over the connections leaving the unit with the
    /// given `unit_id`.
    ///
    /// Returns an error if the given `unit_id` does not exist.
    pub fn outgoing(&self, unit_id: u64) -> Result<UnitConnections<E>, Error> {
        self.index_of(unit_id).map(|index| UnitConnections {
            iter: self.graph.edges_directed(index, Direction::Outgoing),
        })
    }

    /// Returns an iterator over the *predecessors* of the unit with the
    /// given `unit_id`.
    ///
    /// Returns an error if the given `unit_id` does not exist.
    pub fn predecessors(&self, unit_id: u64) -> Result<Neighbors<N, E>, Error> {
        self.index_of(unit_id).map(|index| Neighbors {
            graph: &self.graph,
            iter: self.graph.neighbors_directed(index, Direction::Incoming),
        })
    }

    /// Returns an iterator over the *successors* of the unit with the given
    /// `unit_id`.
    ///
    /// Returns an error if the given `unit_id` does not exist.
    pub fn successors(&self, unit_id: u64) -> Result<Neighbors<N, E>, Error> {
        self.index_of(unit_id).map(|index| Neighbors {
            graph: &self.graph,
            iter: self.graph.neighbors_directed(index, Direction::Outgoing),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_utils::{TestConnection, TestUnit};
    use crate::unit_category::CategoryPredicates;
    use crate::{PlantGraphConfig, UnitCategory};

    fn nodes_and_edges() -> (Vec<TestUnit>, Vec<TestConnection>) {
        let units = vec![
            TestUnit::new(0, UnitCategory::Influent, 0, 1),
            TestUnit::new(1, UnitCategory::Combiner, 2, 1),
            TestUnit::new(2, UnitCategory::Asm1Reactor, 1, 1),
            TestUnit::new(3, UnitCategory::Splitter, 1, 2),
            TestUnit::new(4, UnitCategory::Sink, 1, 0),
        ];
        let connections = vec![
            TestConnection::new(0, 1),
            TestConnection::new(1, 2),
            TestConnection::new(2, 3),
            TestConnection::ports(3, 0, 1, 1).feedback(),
            TestConnection::ports(3, 1, 4, 0),
        ];

        (units, connections)
    }

    fn graph() -> Result<PlantGraph<TestUnit, TestConnection>, Error> {
        let (units, connections) = nodes_and_edges();
        PlantGraph::try_new(units, connections, PlantGraphConfig::default())
    }

    #[test]
    fn test_unit() -> Result<(), Error> {
        let graph = graph()?;

        assert_eq!(
            graph.unit(0),
            Ok(&TestUnit::new(0, UnitCategory::Influent, 0, 1))
        );
        assert_eq!(
            graph.unit(3),
            Ok(&TestUnit::new(3, UnitCategory::Splitter, 1, 2))
        );
        assert_eq!(
            graph.unit(9),
            Err(Error::unit_not_found("Unit with id 9 not found."))
        );
        assert_eq!(graph.influent_id(), 0);

        Ok(())
    }

    #[test]
    fn test_units() -> Result<(), Error> {
        let (units, _) = nodes_and_edges();
        let graph = graph()?;

        assert!(graph.units().eq(&units));
        assert!(graph
            .units()
            .filter(|x| x.is_sink())
            .eq(&[TestUnit::new(4, UnitCategory::Sink, 1, 0)]));

        Ok(())
    }

    #[test]
    fn test_connections() -> Result<(), Error> {
        let (_, connections) = nodes_and_edges();
        let graph = graph()?;

        assert!(graph.connections().eq(&connections));

        assert!(graph.connections().filter(|x| x.source() == 3).eq(&[
            TestConnection::ports(3, 0, 1, 1).feedback(),
            TestConnection::ports(3, 1, 4, 0)
        ]));

        let mut incoming = graph.incoming(1)?.collect::<Vec<_>>();
        incoming.sort_by_key(|c| c.destination_port());
        assert_eq!(
            incoming,
            [
                &TestConnection::new(0, 1),
                &TestConnection::ports(3, 0, 1, 1).feedback()
            ]
        );
        assert_eq!(graph.outgoing(3)?.count(), 2);
        assert_eq!(graph.outgoing(4)?.count(), 0);

        Ok(())
    }

    #[test]
    fn test_neighbors() -> Result<(), Error> {
        let graph = graph()?;

        assert!(graph.predecessors(0).is_ok_and(|x| x.eq(&[])));

        assert!(graph
            .predecessors(2)
            .is_ok_and(|x| x.eq(&[TestUnit::new(1, UnitCategory::Combiner, 2, 1)])));

        assert!(graph
            .successors(0)
            .is_ok_and(|x| x.eq(&[TestUnit::new(1, UnitCategory::Combiner, 2, 1)])));

        assert!(graph.successors(3).is_ok_and(|x| {
            x.eq(&[
                TestUnit::new(4, UnitCategory::Sink, 1, 0),
                TestUnit::new(1, UnitCategory::Combiner, 2, 1),
            ])
        }));

        assert!(graph.successors(4).is_ok_and(|x| x.eq(&[])));

        assert!(graph
            .predecessors(32)
            .is_err_and(|e| e == Error::unit_not_found("Unit with id 32 not found.")));
        assert!(graph
            .successors(32)
            .is_err_and(|e| e == Error::unit_not_found("Unit with id 32 not found.")));

        Ok(())
    }
}
