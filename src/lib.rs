// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

/*!
# Wastewater Treatment Plant Benchmark Simulation

This is a library for simulating wastewater treatment plants in the style of
the IWA Benchmark Simulation Models (BSM1 and BSM2): activated sludge
reactors, secondary settlers, anaerobic digesters and the units connecting
them, stepped forward in time as a directed graph of process units.

## Process units

Every unit implements [`ProcessUnit`]: it consumes one [`Stream`] per input
port, advances its internal state by a timestep, and produces one stream per
output port.  A stream is a fixed-layout vector of ASM1 concentrations, the
flow rate and the temperature, indexed by [`Asm1`].

The available units live in the [`units`] module:

- [`PrimaryClarifier`][units::PrimaryClarifier]: a primary clarifier whose
  solids removal follows from the hydraulic retention time.
- [`Asm1Reactor`][units::Asm1Reactor]: a completely mixed activated sludge
  reactor with aeration, optional carbon dosing and an optional dissolved
  oxygen controller.
- [`Settler`][units::Settler]: a 10-layer secondary clarifier based on the
  double-exponential settling velocity.
- [`Adm1Digester`][units::Adm1Digester]: an anaerobic digester with gas
  headspace, with the ASM1/ADM1 interfaces applied at its boundaries.
- [`Combiner`][units::Combiner], [`Splitter`][units::Splitter],
  [`Separator`][units::Separator] and [`Storage`][units::Storage] for
  hydraulics, thickening, dewatering and sludge storage.

## The `Node` and `Edge` traits

The plant layout is a [`PlantGraph`], instances of which can be created by
passing an iterator of units and the connections between them to the
[`try_new`][PlantGraph::try_new] method.  The graph doesn't know about the
unit and connection types and instead uses traits to interact with them:
they must implement the [`Node`] and [`Edge`] traits, respectively.

Most applications don't need to do this themselves, and use a
[`PlantBuilder`] instead, which owns the units and builds a [`Plant`].

## Validation

The [`try_new`][PlantGraph::try_new] method performs several checks on the
graph, including checking that:

- There is exactly one influent unit, and it has no predecessors.
- All connections point to existing units and ports.
- Every input port is fed by exactly one connection.
- All units are reachable from the influent.
- Every cycle contains a feedback connection.
- Sinks have no successors.

If any of the validation steps fail, the method will return an [`Error`], and a
[`PlantGraph`] instance otherwise.

## Stepping

[`Plant::step`] evaluates every unit once, in a fixed topological order of
the forward connections.  Feedback connections deliver the streams produced
in the previous step, so recycle loops are not iterated within a step.
Numerical trouble inside a unit is reported as [`StepWarning`]s and through
`tracing` events, unless [`PlantGraphConfig::strict_convergence`] is set.

The open-loop BSM1 and BSM2 layouts are available from
[`plant::bsm1::open_loop`] and [`plant::bsm2::open_loop`].
*/

mod config;
pub use config::PlantGraphConfig;

mod error;
pub use error::Error;

mod graph;
pub use graph::{iterators, PlantGraph};

mod graph_traits;
pub use graph_traits::{Edge, Node};

mod integration;
pub use integration::{IntegrationOutcome, IntegrationReport, IntegratorOptions};

mod newton;

pub mod plant;
pub use plant::{Plant, PlantBuilder, StepReport, UnitHandle};

mod process_unit;
pub use process_unit::{ProcessUnit, Solver, StepOutput, StepWarning, UnitControl};

mod stream;
pub use stream::{Asm1, Stream, STREAM_LEN};

mod unit_category;
pub use unit_category::UnitCategory;

pub mod units;
