// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! This module is only compiled when running unit tests and contains features
//! that are shared by all tests of the `graph` module.
//!
//! - the `TestUnit` and `TestConnection` types, which implement the `Node`
//!   and `Edge` traits respectively.
//! - the `PlantGraphBuilder`, which can declaratively build plant layouts for
//!   use in tests.

use crate::{Edge, Error, Node, PlantGraph, PlantGraphConfig, UnitCategory};

#[derive(Clone, Debug, PartialEq)]
pub(super) struct TestUnit {
    id: u64,
    category: UnitCategory,
    inputs: usize,
    outputs: usize,
}

impl TestUnit {
    pub(super) fn new(id: u64, category: UnitCategory, inputs: usize, outputs: usize) -> Self {
        TestUnit {
            id,
            category,
            inputs,
            outputs,
        }
    }
}

impl Node for TestUnit {
    fn unit_id(&self) -> u64 {
        self.id
    }

    fn category(&self) -> UnitCategory {
        self.category
    }

    fn input_ports(&self) -> usize {
        self.inputs
    }

    fn output_ports(&self) -> usize {
        self.outputs
    }
}

#[derive(Clone, Debug, PartialEq)]
pub(super) struct TestConnection {
    source: u64,
    source_port: usize,
    destination: u64,
    destination_port: usize,
    feedback: bool,
}

impl TestConnection {
    /// A forward connection between port 0 of `source` and port 0 of
    /// `destination`.
    pub(super) fn new(source: u64, destination: u64) -> Self {
        Self::ports(source, 0, destination, 0)
    }

    pub(super) fn ports(
        source: u64,
        source_port: usize,
        destination: u64,
        destination_port: usize,
    ) -> Self {
        TestConnection {
            source,
            source_port,
            destination,
            destination_port,
            feedback: false,
        }
    }

    pub(super) fn feedback(mut self) -> Self {
        self.feedback = true;
        self
    }
}

impl Edge for TestConnection {
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

/// Represents a unit added to the `PlantGraphBuilder`.
#[derive(Eq, Hash, PartialEq, Copy, Clone, Debug)]
pub(super) struct UnitHandle(u64);

impl UnitHandle {
    /// Returns the unit ID of the unit.
    pub(super) fn unit_id(&self) -> u64 {
        self.0
    }
}

/// A builder for creating plant layouts easily, for use in tests.
pub(super) struct PlantGraphBuilder {
    units: Vec<TestUnit>,
    connections: Vec<TestConnection>,
    next_id: u64,
}

impl PlantGraphBuilder {
    pub(super) fn new() -> Self {
        PlantGraphBuilder {
            units: Vec::new(),
            connections: Vec::new(),
            next_id: 0,
        }
    }

    /// Adds a unit to the graph and returns its handle.
    pub(super) fn add_unit(
        &mut self,
        category: UnitCategory,
        inputs: usize,
        outputs: usize,
    ) -> UnitHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.units
            .push(TestUnit::new(id, category, inputs, outputs));
        UnitHandle(id)
    }

    pub(super) fn influent(&mut self) -> UnitHandle {
        self.add_unit(UnitCategory::Influent, 0, 1)
    }

    pub(super) fn sink(&mut self) -> UnitHandle {
        self.add_unit(UnitCategory::Sink, 1, 0)
    }

    pub(super) fn combiner(&mut self, inputs: usize) -> UnitHandle {
        self.add_unit(UnitCategory::Combiner, inputs, 1)
    }

    pub(super) fn splitter(&mut self, outputs: usize) -> UnitHandle {
        self.add_unit(UnitCategory::Splitter, 1, outputs)
    }

    pub(super) fn reactor(&mut self) -> UnitHandle {
        self.add_unit(UnitCategory::Asm1Reactor, 1, 1)
    }

    pub(super) fn settler(&mut self) -> UnitHandle {
        self.add_unit(UnitCategory::Settler, 1, 3)
    }

    /// Connects port 0 of `from` to port 0 of `to`.
    pub(super) fn connect(&mut self, from: UnitHandle, to: UnitHandle) -> &mut Self {
        self.connect_ports(from, 0, to, 0)
    }

    pub(super) fn connect_ports(
        &mut self,
        from: UnitHandle,
        from_port: usize,
        to: UnitHandle,
        to_port: usize,
    ) -> &mut Self {
        self.connections
            .push(TestConnection::ports(from.0, from_port, to.0, to_port));
        self
    }

    /// Adds a feedback connection between the given ports.
    pub(super) fn feedback(
        &mut self,
        from: UnitHandle,
        from_port: usize,
        to: UnitHandle,
        to_port: usize,
    ) -> &mut Self {
        self.connections
            .push(TestConnection::ports(from.0, from_port, to.0, to_port).feedback());
        self
    }

    /// Adds a chain of `count` reactors fed from port 0 of `from`, and
    /// returns a handle to the last reactor.
    pub(super) fn reactor_chain(&mut self, from: UnitHandle, count: usize) -> UnitHandle {
        let mut last = from;
        for _ in 0..count {
            let reactor = self.reactor();
            self.connect(last, reactor);
            last = reactor;
        }
        last
    }

    /// Builds and returns the plant graph from the units and connections
    /// added to the builder.
    pub(super) fn build(
        &self,
        config: Option<PlantGraphConfig>,
    ) -> Result<PlantGraph<TestUnit, TestConnection>, Error> {
        PlantGraph::try_new(
            self.units.clone(),
            self.connections.clone(),
            config.unwrap_or_default(),
        )
    }
}
