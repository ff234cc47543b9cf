// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! The units at the boundary of a plant: where water enters and where
//! streams leave.

use crate::process_unit::{ProcessUnit, StepOutput};
use crate::stream::ensure_inputs;
use crate::{Error, Stream, UnitCategory};

/// The plant influent.
///
/// The influent has no input ports in the plant graph.  When stepped, it is
/// given the external plant influent as its only input and emits it
/// unchanged.
#[derive(Clone, Debug, Default)]
pub struct Influent {
    last: Stream,
}

impl Influent {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessUnit for Influent {
    fn category(&self) -> UnitCategory {
        UnitCategory::Influent
    }

    fn input_ports(&self) -> usize {
        0
    }

    fn output_ports(&self) -> usize {
        1
    }

    fn step(&mut self, inputs: &[Stream], _dt: f64) -> Result<StepOutput, Error> {
        ensure_inputs("Influent", inputs, 1)?;
        self.last = inputs[0];
        Ok(StepOutput::new(vec![self.last]))
    }

    fn state(&self) -> Vec<f64> {
        self.last.values().to_vec()
    }
}

/// A terminal unit that records the last stream it received.
#[derive(Clone, Debug, Default)]
pub struct Sink {
    last: Stream,
}

impl Sink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stream received in the last step.
    pub fn last(&self) -> &Stream {
        &self.last
    }
}

impl ProcessUnit for Sink {
    fn category(&self) -> UnitCategory {
        UnitCategory::Sink
    }

    fn input_ports(&self) -> usize {
        1
    }

    fn output_ports(&self) -> usize {
        0
    }

    fn step(&mut self, inputs: &[Stream], _dt: f64) -> Result<StepOutput, Error> {
        ensure_inputs("Sink", inputs, 1)?;
        self.last = inputs[0];
        Ok(StepOutput::default())
    }

    fn state(&self) -> Vec<f64> {
        self.last.values().to_vec()
    }
}
