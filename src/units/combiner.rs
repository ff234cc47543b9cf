// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! A flow-weighted stream mixer.

use crate::process_unit::{ProcessUnit, StepOutput};
use crate::stream::ensure_inputs;
use crate::{Asm1, Error, Stream, UnitCategory};

/// Mixes any number of streams into one.
#[derive(Clone, Debug)]
pub struct Combiner {
    inputs: usize,
}

impl Combiner {
    /// Creates a combiner with the given number of input ports.
    pub fn new(inputs: usize) -> Result<Self, Error> {
        if inputs == 0 {
            return Err(Error::invalid_parameter(
                "A combiner needs at least one input port.",
            ));
        }
        Ok(Self { inputs })
    }

    /// Mixes `streams`.
    ///
    /// The output flow is the sum of the input flows, and every other
    /// component is the flow-weighted average of the inputs.  When the total
    /// flow is not positive, the output is the zero stream.
    pub fn combine(streams: &[Stream]) -> Stream {
        let total: f64 = streams.iter().map(Stream::flow).sum();
        if !(total > 0.0) {
            return Stream::zeros();
        }

        let mut out = Stream::zeros();
        for stream in streams {
            let q = stream.flow();
            for (acc, value) in out.values_mut().iter_mut().zip(stream.values()) {
                *acc += q * value;
            }
        }
        for value in out.values_mut().iter_mut() {
            *value /= total;
        }
        out[Asm1::Q] = total;
        out
    }
}

impl ProcessUnit for Combiner {
    fn category(&self) -> UnitCategory {
        UnitCategory::Combiner
    }

    fn input_ports(&self) -> usize {
        self.inputs
    }

    fn output_ports(&self) -> usize {
        1
    }

    fn step(&mut self, inputs: &[Stream], _dt: f64) -> Result<StepOutput, Error> {
        ensure_inputs("Combiner", inputs, self.inputs)?;
        Ok(StepOutput::new(vec![Self::combine(inputs)]))
    }
}
