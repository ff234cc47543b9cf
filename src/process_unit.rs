// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! The interface shared by all process units, and the types exchanged
//! through it.

use crate::integration::IntegrationOutcome;
use crate::{Error, Stream, UnitCategory};

/// The algebraic solves embedded in a unit's derivative evaluations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Solver {
    /// The charge balance solved for the hydrogen-ion concentration.
    Ph,
    /// The dissolved hydrogen balance.
    Hydrogen,
}

impl std::fmt::Display for Solver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Solver::Ph => write!(f, "pH"),
            Solver::Hydrogen => write!(f, "S_h2"),
        }
    }
}

/// A non-fatal condition observed while stepping a unit.
#[derive(Clone, Debug, PartialEq)]
pub enum StepWarning {
    /// An algebraic solve stopped at its iteration budget.  The unit used
    /// the last iterate.
    NonConvergence {
        solver: Solver,
        iterations: usize,
        residual: f64,
    },
    /// The integrator could not cover the whole timestep.  The unit state was
    /// left at the last accepted point.
    Instability(IntegrationOutcome),
    /// The requested underflow exceeded the inflow and was scaled down.
    UnderflowClamped { requested: f64, available: f64 },
}

impl StepWarning {
    /// Returns `true` if the warning reports a non-converged solve.
    pub fn is_non_convergence(&self) -> bool {
        matches!(self, StepWarning::NonConvergence { .. })
    }
}

/// The result of stepping a unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepOutput {
    /// One stream per output port.
    pub outputs: Vec<Stream>,
    pub warnings: Vec<StepWarning>,
}

impl StepOutput {
    pub(crate) fn new(outputs: Vec<Stream>) -> Self {
        Self {
            outputs,
            warnings: Vec::new(),
        }
    }
}

/// Control inputs that can be changed between steps.
#[derive(Clone, Debug, PartialEq)]
pub enum UnitControl {
    /// Oxygen transfer coefficient, in 1/d.  A negative value holds the
    /// dissolved oxygen at its absolute value.
    Kla(f64),
    /// Dissolved oxygen setpoint of a reactor's oxygen controller, in
    /// g O2/m³.
    DoSetpoint(f64),
    /// External carbon dosage, in m³/d.
    CarbonDose(f64),
    /// Settler return sludge flow, in m³/d.
    ReturnFlow(f64),
    /// Settler waste sludge flow, in m³/d.
    WasteFlow(f64),
    /// Splitter ratios, one per output port.
    SplitRatios(Vec<f64>),
    /// Storage tank outflow, in m³/d.
    StorageOutflow(f64),
    /// Digester operating temperature, in K.
    OperatingTemperature(f64),
}

/// A process unit that transforms input streams into output streams, one
/// timestep at a time.
///
/// Each unit owns its state exclusively; the only way data enters or leaves
/// a unit is through the streams passed to and returned from
/// [`step`][ProcessUnit::step].
pub trait ProcessUnit {
    /// Returns the category of the unit.
    fn category(&self) -> UnitCategory;

    /// Returns the number of input streams `step` expects.
    fn input_ports(&self) -> usize;

    /// Returns the number of output streams `step` produces.
    fn output_ports(&self) -> usize;

    /// Advances the unit by `dt` days and returns its output streams.
    fn step(&mut self, inputs: &[Stream], dt: f64) -> Result<StepOutput, Error>;

    /// Applies a control input, effective from the next step.
    fn apply_control(&mut self, control: &UnitControl) -> Result<(), Error> {
        Err(Error::invalid_parameter(format!(
            "{} does not accept {:?}.",
            self.category(),
            control
        )))
    }

    /// Returns the unit's internal state, in the unit's documented layout.
    fn state(&self) -> Vec<f64> {
        Vec::new()
    }
}
