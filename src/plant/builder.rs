// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Assembling a [`Plant`] from process units and the connections between
//! them.

use crate::process_unit::ProcessUnit;
use crate::{Edge, Error, Node, PlantGraph, PlantGraphConfig, UnitCategory};

use super::Plant;

/// Represents a unit added to a [`PlantBuilder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UnitHandle(u64);

impl UnitHandle {
    /// Returns the unit ID of the unit.
    pub fn unit_id(&self) -> u64 {
        self.0
    }
}

/// A stream connection between an output port of one unit and an input
/// port of another.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Connection {
    pub source: u64,
    pub source_port: usize,
    pub destination: u64,
    pub destination_port: usize,
    /// Feedback connections deliver the stream of the previous step.
    pub feedback: bool,
}

impl Edge for Connection {
    fn source(&self) -> u64 {
        self.source
    }

    fn destination(&self) -> u64 {
        self.destination
    }

    fn source_port(&self) -> usize {
        self.source_port
    }

    fn destination_port(&self) -> usize {
        self.destination_port
    }

    fn is_feedback(&self) -> bool {
        self.feedback
    }
}

/// The graph node describing a unit owned by a [`Plant`].
#[derive(Clone, Debug, PartialEq)]
pub struct UnitNode {
    id: u64,
    category: UnitCategory,
    input_ports: usize,
    output_ports: usize,
}

impl Node for UnitNode {
    fn unit_id(&self) -> u64 {
        self.id
    }

    fn category(&self) -> UnitCategory {
        self.category
    }

    fn input_ports(&self) -> usize {
        self.input_ports
    }

    fn output_ports(&self) -> usize {
        self.output_ports
    }
}

/// A builder for [`Plant`]s.
///
/// Units get consecutive IDs starting from 0, in the order they are added.
#[derive(Default)]
pub struct PlantBuilder {
    units: Vec<Box<dyn ProcessUnit>>,
    connections: Vec<Connection>,
}

impl PlantBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unit to the plant and returns its handle.
    pub fn add_unit(&mut self, unit: impl ProcessUnit + 'static) -> UnitHandle {
        let handle = UnitHandle(self.units.len() as u64);
        self.units.push(Box::new(unit));
        handle
    }

    /// Connects an output port of `source` to an input port of
    /// `destination`.
    pub fn connect(
        &mut self,
        source: UnitHandle,
        source_port: usize,
        destination: UnitHandle,
        destination_port: usize,
    ) -> &mut Self {
        self.push(source, source_port, destination, destination_port, false)
    }

    /// Connects an output port of `source` to an input port of
    /// `destination`, delivering the stream one step late.  Every recycle
    /// loop needs at least one such connection.
    pub fn connect_feedback(
        &mut self,
        source: UnitHandle,
        source_port: usize,
        destination: UnitHandle,
        destination_port: usize,
    ) -> &mut Self {
        self.push(source, source_port, destination, destination_port, true)
    }

    fn push(
        &mut self,
        source: UnitHandle,
        source_port: usize,
        destination: UnitHandle,
        destination_port: usize,
        feedback: bool,
    ) -> &mut Self {
        self.connections.push(Connection {
            source: source.0,
            source_port,
            destination: destination.0,
            destination_port,
            feedback,
        });
        self
    }

    /// Validates the layout and builds the plant.
    pub fn build(self, config: PlantGraphConfig) -> Result<Plant, Error> {
        let nodes = self
            .units
            .iter()
            .enumerate()
            .map(|(id, unit)| UnitNode {
                id: id as u64,
                category: unit.category(),
                input_ports: unit.input_ports(),
                output_ports: unit.output_ports(),
            })
            .collect::<Vec<_>>();
        let graph = PlantGraph::try_new(nodes, self.connections, config)?;

        Plant::new(graph, self.units)
    }
}
