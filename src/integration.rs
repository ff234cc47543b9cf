// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! Time integration of unit states with the Dormand-Prince 5(4) stepper of
//! `ode_solvers`.
//!
//! Units describe their dynamics by implementing [`System`] for a
//! right-hand-side type built fresh for every step.  The stepper only
//! borrows it, so that units can read back anything the right-hand side
//! recorded while it was evaluated.

use ode_solvers::dop_shared::{IntegrationError, OutputType};
use ode_solvers::{DVector, Dopri5, System};

/// The state vector handed to [`System::system`].
pub(crate) type State = DVector<f64>;

/// Options for integrating a unit's state over a timestep.
#[derive(Clone, Debug, PartialEq)]
pub struct IntegratorOptions {
    /// Relative tolerance of the local error estimate.
    pub rtol: f64,
    /// Absolute tolerance of the local error estimate.
    pub atol: f64,
    /// First trial sub-step, in days.  Later steps start from the sub-step
    /// size the previous step ended with.
    pub initial_step: f64,
    /// Largest sub-step the controller may take.
    pub max_step: f64,
    /// Maximum number of sub-steps per timestep.
    pub max_steps: u32,
}

impl Default for IntegratorOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-8,
            initial_step: 1e-4,
            max_step: 0.1,
            max_steps: 500_000,
        }
    }
}

/// How an integration call ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum IntegrationOutcome {
    /// The end of the interval was reached.
    Completed,
    /// The sub-step shrank below what the time resolution allows, usually
    /// because the right-hand side produced non-finite values.
    StepSizeUnderflow { time: f64 },
    /// The sub-step budget was exhausted before the end of the interval.
    StepLimitReached { time: f64 },
    /// The stepper detected a stiff problem.
    Stiff { time: f64 },
}

/// Statistics of an integration call.
#[derive(Clone, Debug, PartialEq)]
pub struct IntegrationReport {
    pub outcome: IntegrationOutcome,
    /// Number of accepted sub-steps.
    pub accepted: usize,
}

impl IntegrationReport {
    /// Returns `true` if the whole interval was integrated.
    pub fn is_complete(&self) -> bool {
        self.outcome == IntegrationOutcome::Completed
    }
}

/// Lends a right-hand side to the stepper, which wants to own its system.
struct Borrowed<'a, S>(&'a S);

impl<S> System<f64, State> for Borrowed<'_, S>
where
    S: System<f64, State>,
{
    fn system(&self, x: f64, y: &State, dy: &mut State) {
        self.0.system(x, y, dy)
    }
}

/// Integrates `y` in place over `dt` days.
///
/// `step_hint` is the first trial sub-step, and is updated to the size of
/// the last full sub-step taken.  If the interval can't be covered, `y` is
/// left at the last accepted point.
pub(crate) fn integrate<S>(
    system: &S,
    y: &mut [f64],
    dt: f64,
    step_hint: &mut f64,
    options: &IntegratorOptions,
) -> IntegrationReport
where
    S: System<f64, State>,
{
    let mut stepper = Dopri5::from_param(
        Borrowed(system),
        0.0,
        dt,
        dt,
        State::from_column_slice(y),
        options.rtol,
        options.atol,
        0.9,
        0.04,
        0.2,
        10.0,
        options.max_step,
        step_hint.min(options.max_step).min(dt),
        options.max_steps,
        // Stiffness is handled through the step size controller alone.
        u32::MAX,
        OutputType::Sparse,
    );

    let outcome = match stepper.integrate() {
        Ok(_) => IntegrationOutcome::Completed,
        Err(IntegrationError::StepSizeUnderflow { x }) => {
            IntegrationOutcome::StepSizeUnderflow { time: x }
        }
        Err(IntegrationError::MaxNumStepReached { x, .. }) => {
            IntegrationOutcome::StepLimitReached { time: x }
        }
        Err(IntegrationError::StiffnessDetected { x }) => IntegrationOutcome::Stiff { time: x },
    };

    // The first entry is the initial state, the others the accepted steps.
    if let Some(last) = stepper.y_out().last() {
        y.copy_from_slice(last.as_slice());
    }
    let times = stepper.x_out();
    // The final sub-step is truncated to the end of the interval.
    if let [.., before, last_full, _] = times.as_slice() {
        if last_full > before {
            *step_hint = last_full - before;
        }
    }

    IntegrationReport {
        outcome,
        accepted: times.len().saturating_sub(1),
    }
}
