// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! A scalar Newton-Raphson solver for strictly positive roots.

/// Convergence tolerance on the absolute residual.
pub(crate) const TOLERANCE: f64 = 1e-12;

/// Iteration budget of a single solve.
pub(crate) const MAX_ITERATIONS: usize = 1000;

/// Non-positive iterates are replaced by this value.
pub(crate) const FLOOR: f64 = 1e-12;

/// The result of a Newton-Raphson solve.
///
/// The solver always returns its last iterate, converged or not.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NewtonOutcome {
    /// The last iterate.
    pub value: f64,
    /// Number of Newton updates performed.
    pub iterations: usize,
    /// The residual at `value`.
    pub residual: f64,
    /// Whether `|residual|` dropped to the tolerance.
    pub converged: bool,
}

/// Solves `f(x) = 0` for a positive `x`, starting from `x0`.
///
/// Each iteration evaluates the residual and its derivative at the current
/// iterate and takes a full Newton step; an iterate that lands at or below
/// zero is clamped to [`FLOOR`].  The loop stops once `|f(x)| <= TOLERANCE`
/// or after [`MAX_ITERATIONS`] updates.
pub(crate) fn solve_positive(
    x0: f64,
    mut f: impl FnMut(f64) -> f64,
    mut df: impl FnMut(f64) -> f64,
) -> NewtonOutcome {
    let mut x = if x0 > 0.0 && x0.is_finite() { x0 } else { FLOOR };
    let mut residual = f(x);
    let mut iterations = 0;

    while residual.abs() > TOLERANCE && iterations < MAX_ITERATIONS {
        let gradient = df(x);
        let mut next = x - residual / gradient;
        if !(next > 0.0) {
            // also catches NaN from a vanishing gradient
            next = FLOOR;
        }
        x = next;
        residual = f(x);
        iterations += 1;
    }

    NewtonOutcome {
        value: x,
        iterations,
        residual,
        converged: residual.abs() <= TOLERANCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_root() {
        let outcome = solve_positive(1.0, |x| x * x - 2.0, |x| 2.0 * x);
        assert!(outcome.converged);
        assert!((outcome.value - 2f64.sqrt()).abs() < 1e-12);
        assert!(outcome.iterations < 10);
    }

    #[test]
    fn test_already_converged() {
        let outcome = solve_positive(3.0, |x| x - 3.0, |_| 1.0);
        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.value, 3.0);
    }

    #[test]
    fn test_non_positive_iterates_are_clamped() {
        // The first step from 10 overshoots below zero.
        let outcome = solve_positive(10.0, |x| x - 1e-3, |_| 0.5);
        assert!(outcome.value > 0.0);

        let outcome = solve_positive(-5.0, |x| x * x - 4.0, |x| 2.0 * x);
        assert!(outcome.converged);
        assert!((outcome.value - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_non_convergence() {
        // No positive root.
        let outcome = solve_positive(1.0, |x| x * x + 1.0, |x| 2.0 * x);
        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, MAX_ITERATIONS);
        assert!(outcome.value > 0.0);
        assert!(outcome.residual >= 1.0);
    }
}
