// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Iterators over units and connections in a `PlantGraph`.

use petgraph::graph::DiGraph;

use crate::{Edge, Node};

/// An iterator over the units in a `PlantGraph`.
pub struct Units<'a, N>
where
    N: Node,
{
    pub(crate) iter: std::slice::Iter<'a, petgraph::graph::Node<N>>,
}

impl<'a, N> Iterator for Units<'a, N>
where
    N: Node,
{
    type Item = &'a N;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|n| &n.weight)
    }
}

/// An iterator over all the connections in a `PlantGraph`, in the order
/// they were given.
pub struct Connections<'a, E>
where
    E: Edge,
{
    pub(crate) iter: std::slice::Iter<'a, petgraph::graph::Edge<E>>,
}

impl<'a, E> Iterator for Connections<'a, E>
where
    E: Edge,
{
    type Item = &'a E;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|e| &e.weight)
    }
}

/// An iterator over the connections entering or leaving a single unit.
pub struct UnitConnections<'a, E>
where
    E: Edge,
{
    pub(crate) iter: petgraph::graph::Edges<'a, E, petgraph::Directed>,
}

impl<'a, E> Iterator for UnitConnections<'a, E>
where
    E: Edge,
{
    type Item = &'a E;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|e| e.weight())
    }
}

/// An iterator over the neighbors of a unit in a `PlantGraph`.
///
/// A neighbor connected through several ports is returned once per
/// connection.
pub struct Neighbors<'a, N, E>
where
    N: Node,
{
    pub(crate) graph: &'a DiGraph<N, E>,
    pub(crate) iter: petgraph::graph::Neighbors<'a, E>,
}

impl<'a, N, E> Iterator for Neighbors<'a, N, E>
where
    N: Node,
{
    type Item = &'a N;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|i| &self.graph[i])
    }
}
