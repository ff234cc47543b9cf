// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! The plant driver: process units wired together by a validated
//! [`PlantGraph`], stepped forward one global timestep at a time.

pub mod bsm1;
pub mod bsm2;
mod builder;

pub use builder::{Connection, PlantBuilder, UnitHandle, UnitNode};

use crate::process_unit::{ProcessUnit, StepWarning, UnitControl};
use crate::stream::ensure_timestep;
use crate::unit_category::CategoryPredicates;
use crate::{Edge, Error, Node, PlantGraph, Stream};

/// The outcome of a successful [`Plant::step`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepReport {
    /// Simulation time at the end of the step, in days.
    pub time: f64,
    /// Warnings raised by the units, with the ID of the unit that raised
    /// them.
    pub warnings: Vec<(u64, StepWarning)>,
}

impl StepReport {
    /// Returns the number of non-converged algebraic solves in the step.
    pub fn non_convergence_count(&self) -> usize {
        self.warnings
            .iter()
            .filter(|(_, w)| w.is_non_convergence())
            .count()
    }
}

/// A wastewater treatment plant.
///
/// Each step evaluates every unit exactly once, in the graph's
/// [evaluation order][PlantGraph::evaluation_order].  Forward connections
/// carry the streams produced earlier in the same step, feedback connections
/// carry the streams of the previous step.  There is no iteration within a
/// step.
pub struct Plant {
    graph: PlantGraph<UnitNode, Connection>,
    units: Vec<Box<dyn ProcessUnit>>,
    /// The connection feeding each input port, per unit.
    feeds: Vec<Vec<Connection>>,
    /// The latest stream on each output port, per unit.
    outputs: Vec<Vec<Stream>>,
    time: f64,
}

impl Plant {
    fn new(
        graph: PlantGraph<UnitNode, Connection>,
        units: Vec<Box<dyn ProcessUnit>>,
    ) -> Result<Self, Error> {
        let mut feeds = Vec::with_capacity(units.len());
        let mut outputs = Vec::with_capacity(units.len());
        for (id, unit) in units.iter().enumerate() {
            let mut ports = vec![None; unit.input_ports()];
            for connection in graph.incoming(id as u64)? {
                if let Some(port) = ports.get_mut(connection.destination_port()) {
                    *port = Some(*connection);
                }
            }
            let ports = ports.into_iter().collect::<Option<Vec<_>>>().ok_or_else(|| {
                Error::internal(format!(
                    "{}:{id} has an unfed input port after validation.",
                    unit.category()
                ))
            })?;
            feeds.push(ports);
            outputs.push(vec![Stream::zeros(); unit.output_ports()]);
        }

        Ok(Self {
            graph,
            units,
            feeds,
            outputs,
            time: 0.0,
        })
    }

    /// Returns the validated plant graph.
    pub fn graph(&self) -> &PlantGraph<UnitNode, Connection> {
        &self.graph
    }

    /// Returns the simulation time, in days.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Returns the unit with the given ID.
    pub fn unit(&self, unit_id: u64) -> Result<&dyn ProcessUnit, Error> {
        self.graph.unit(unit_id)?;
        Ok(self.units[unit_id as usize].as_ref())
    }

    /// Returns the latest stream produced on an output port of a unit.
    ///
    /// Before the first step, every output is the zero stream.
    pub fn output(&self, unit_id: u64, port: usize) -> Result<&Stream, Error> {
        let node = self.graph.unit(unit_id)?;
        self.outputs[unit_id as usize].get(port).ok_or_else(|| {
            Error::invalid_parameter(format!(
                "{}:{unit_id} has no output port {port}.",
                node.category()
            ))
        })
    }

    /// Returns the latest stream received by a sink.
    pub fn sink_stream(&self, unit_id: u64) -> Result<&Stream, Error> {
        let node = self.graph.unit(unit_id)?;
        if !node.is_sink() {
            return Err(Error::invalid_parameter(format!(
                "{}:{unit_id} is not a sink.",
                node.category()
            )));
        }
        let feed = self.feeds[unit_id as usize].first().ok_or_else(|| {
            Error::internal(format!("Sink:{unit_id} has no input port."))
        })?;
        self.output(feed.source(), feed.source_port())
    }

    /// Applies a control input to a unit, effective from the next step.
    pub fn set_control(&mut self, unit_id: u64, control: UnitControl) -> Result<(), Error> {
        let node = self.graph.unit(unit_id)?;
        let context = format!("{}:{unit_id}", node.category());
        self.units[unit_id as usize]
            .apply_control(&control)
            .map_err(|e| e.in_context(context))
    }

    /// Advances every unit by `dt` days, with `influent` entering the plant.
    ///
    /// A unit error aborts the step; units evaluated before the failing one
    /// have already advanced.  In strict convergence mode, non-converged
    /// solves are reported as an error after all units have stepped.
    pub fn step(&mut self, influent: &Stream, dt: f64) -> Result<StepReport, Error> {
        ensure_timestep("Plant", dt)?;
        if !influent.is_finite() {
            return Err(Error::invalid_stream(
                "Plant influent contains non-finite values.",
            ));
        }

        let previous = self.outputs.clone();
        let mut warnings = Vec::new();

        for &id in self.graph.evaluation_order() {
            let index = id as usize;
            let category = self.graph.unit(id)?.category();

            let inputs = if id == self.graph.influent_id() {
                vec![*influent]
            } else {
                self.feeds[index]
                    .iter()
                    .map(|c| {
                        let buffer = if c.is_feedback() {
                            &previous
                        } else {
                            &self.outputs
                        };
                        buffer[c.source() as usize][c.source_port()]
                    })
                    .collect()
            };

            let _span = tracing::info_span!("unit", id, category = %category).entered();
            let out = self.units[index]
                .step(&inputs, dt)
                .map_err(|e| e.in_context(format!("{category}:{id}")))?;

            if out.outputs.len() != self.outputs[index].len() {
                return Err(Error::internal(format!(
                    "{category}:{id} produced {} streams for {} output ports.",
                    out.outputs.len(),
                    self.outputs[index].len()
                )));
            }
            self.outputs[index] = out.outputs;
            warnings.extend(out.warnings.into_iter().map(|w| (id, w)));
        }

        self.time += dt;
        let report = StepReport {
            time: self.time,
            warnings,
        };

        let failures = report.non_convergence_count();
        if self.graph.config().strict_convergence && failures > 0 {
            return Err(Error::not_converged(format!(
                "{failures} algebraic solve(s) did not converge in the step ending at day {}.",
                self.time
            )));
        }

        Ok(report)
    }

    /// Repeatedly steps the plant with a constant influent until no output
    /// stream changes by more than `atol + 1e-5·|value|` between steps.
    ///
    /// Returns the number of steps taken.  The simulation time is left
    /// where it was.
    pub fn stabilize(
        &mut self,
        influent: &Stream,
        dt: f64,
        atol: f64,
        max_iterations: usize,
    ) -> Result<usize, Error> {
        if !(atol.is_finite() && atol >= 0.0) {
            return Err(Error::invalid_parameter(format!(
                "Stabilization tolerance must be non-negative, got {atol}."
            )));
        }

        let start = self.time;
        for iteration in 1..=max_iterations {
            let before = self.outputs.clone();
            let stepped = self.step(influent, dt);
            self.time = start;
            stepped?;

            let mut settled = true;
            let mut max_change = 0.0_f64;
            for (old, new) in before.iter().flatten().zip(self.outputs.iter().flatten()) {
                for (a, b) in old.values().iter().zip(new.values()) {
                    let change = (b - a).abs();
                    max_change = max_change.max(change);
                    if change > atol + 1e-5 * b.abs() {
                        settled = false;
                    }
                }
            }
            tracing::debug!(iteration, max_change, "Stabilizing plant.");

            if settled {
                return Ok(iteration);
            }
        }

        Err(Error::not_converged(format!(
            "Plant did not stabilize within {max_iterations} iterations."
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{Asm1Reactor, Asm1ReactorConfig, Combiner, Influent, Sink, Splitter};
    use crate::{Asm1, PlantGraphConfig};

    fn influent(flow: f64) -> Stream {
        let mut s = Stream::zeros();
        s[Asm1::Si] = 30.0;
        s[Asm1::Ss] = 69.5;
        s[Asm1::Snh] = 31.56;
        s[Asm1::Salk] = 7.0;
        s[Asm1::Temp] = 15.0;
        s.with_flow(flow)
    }

    /// influent -> combiner -> splitter -> sink, with half of the flow
    /// recycled to the combiner.
    fn recycle_plant(config: PlantGraphConfig) -> Result<(Plant, UnitHandle, UnitHandle), Error> {
        let mut builder = PlantBuilder::new();
        let inlet = builder.add_unit(Influent::new());
        let combiner = builder.add_unit(Combiner::new(2)?);
        let splitter = builder.add_unit(Splitter::ratios(vec![1.0, 1.0])?);
        let sink = builder.add_unit(Sink::new());
        builder
            .connect(inlet, 0, combiner, 0)
            .connect(combiner, 0, splitter, 0)
            .connect(splitter, 0, sink, 0)
            .connect_feedback(splitter, 1, combiner, 1);
        Ok((builder.build(config)?, combiner, sink))
    }

    #[test]
    fn test_feedback_reads_previous_step() -> Result<(), Error> {
        let (mut plant, combiner, sink) = recycle_plant(PlantGraphConfig::default())?;
        assert_eq!(plant.sink_stream(sink.unit_id())?, &Stream::zeros());

        let report = plant.step(&influent(100.0), 0.5)?;
        assert_eq!(report.time, 0.5);
        assert!(report.warnings.is_empty());
        assert_eq!(plant.sink_stream(sink.unit_id())?.flow(), 50.0);

        plant.step(&influent(100.0), 0.5)?;
        assert_eq!(plant.output(combiner.unit_id(), 0)?.flow(), 150.0);
        assert_eq!(plant.sink_stream(sink.unit_id())?.flow(), 75.0);
        assert_eq!(plant.time(), 1.0);

        assert_eq!(plant.sink_stream(sink.unit_id())?[Asm1::Ss], 69.5);

        Ok(())
    }

    #[test]
    fn test_stabilize() -> Result<(), Error> {
        let (mut plant, _, sink) = recycle_plant(PlantGraphConfig::default())?;

        let iterations = plant.stabilize(&influent(100.0), 0.5, 1e-6, 100)?;
        assert!(iterations > 10 && iterations < 40);
        assert!((plant.sink_stream(sink.unit_id())?.flow() - 100.0).abs() < 1e-2);
        assert_eq!(plant.time(), 0.0);

        let (mut plant, _, _) = recycle_plant(PlantGraphConfig::default())?;
        assert!(plant
            .stabilize(&influent(100.0), 0.5, 1e-6, 3)
            .is_err_and(|e| e
                == Error::not_converged("Plant did not stabilize within 3 iterations.")));

        Ok(())
    }

    #[test]
    fn test_accessors() -> Result<(), Error> {
        let (mut plant, combiner, sink) = recycle_plant(PlantGraphConfig::default())?;

        assert_eq!(plant.graph().evaluation_order(), [0, 1, 2, 3]);
        assert_eq!(plant.unit(2)?.category(), crate::UnitCategory::Splitter);
        assert!(plant
            .unit(7)
            .is_err_and(|e| e == Error::unit_not_found("Unit with id 7 not found.")));
        assert!(plant
            .output(combiner.unit_id(), 1)
            .is_err_and(|e| e == Error::invalid_parameter("Combiner:1 has no output port 1.")));
        assert!(plant
            .sink_stream(combiner.unit_id())
            .is_err_and(|e| e == Error::invalid_parameter("Combiner:1 is not a sink.")));

        plant.set_control(2, UnitControl::SplitRatios(vec![0.0, 1.0]))?;
        plant.step(&influent(100.0), 0.5)?;
        assert_eq!(plant.sink_stream(sink.unit_id())?.flow(), 0.0);

        assert!(plant
            .set_control(combiner.unit_id(), UnitControl::Kla(10.0))
            .is_err_and(|e| e
                == Error::invalid_parameter("Combiner:1: Combiner does not accept Kla(10.0).")));

        Ok(())
    }

    #[test]
    fn test_step_errors() -> Result<(), Error> {
        let (mut plant, _, _) = recycle_plant(PlantGraphConfig::default())?;
        assert!(plant.step(&influent(100.0), 0.0).is_err_and(|e| e
            == Error::invalid_parameter("Plant requires a positive timestep, got 0.")));

        let mut bad = influent(100.0);
        bad[Asm1::Ss] = f64::NAN;
        assert!(plant.step(&bad, 0.1).is_err_and(|e| e
            == Error::invalid_stream("Plant influent contains non-finite values.")));
        assert_eq!(plant.time(), 0.0);

        let mut builder = PlantBuilder::new();
        let inlet = builder.add_unit(Influent::new());
        let reactor = builder.add_unit(Asm1Reactor::new(Asm1ReactorConfig::new(1000.0, 240.0))?);
        let sink = builder.add_unit(Sink::new());
        builder
            .connect(inlet, 0, reactor, 0)
            .connect(reactor, 0, sink, 0);
        let mut plant = builder.build(PlantGraphConfig::default())?;
        assert!(plant
            .set_control(reactor.unit_id(), UnitControl::CarbonDose(-1.0))
            .is_err_and(|e| e.message().starts_with("ASM1Reactor:1: ")));

        let report = plant.step(&influent(18446.0), 0.01)?;
        assert!(report.warnings.is_empty());
        assert!(plant.sink_stream(sink.unit_id())?[Asm1::So] > 0.0);

        Ok(())
    }

    #[test]
    fn test_invalid_layout() -> Result<(), Error> {
        let mut builder = PlantBuilder::new();
        let inlet = builder.add_unit(Influent::new());
        let combiner = builder.add_unit(Combiner::new(2)?);
        let splitter = builder.add_unit(Splitter::ratios(vec![1.0, 1.0])?);
        let sink = builder.add_unit(Sink::new());
        builder
            .connect(inlet, 0, combiner, 0)
            .connect(combiner, 0, splitter, 0)
            .connect(splitter, 0, sink, 0)
            .connect(splitter, 1, combiner, 1);

        assert!(builder
            .build(PlantGraphConfig::default())
            .is_err_and(|e| e
                == Error::invalid_graph("Cycle without a feedback connection detected: 1 -> 2 -> 1")));

        Ok(())
    }
}
