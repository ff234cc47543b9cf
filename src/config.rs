// License: MIT
// Copyright © 2024 Frequenz Energy-as-a-Service GmbH

//! This module contains the configuration options for the `PlantGraph` and
//! the `Plant` built on top of it.

/// Configuration options for the `PlantGraph`.
#[derive(Clone, Default, Debug)]
pub struct PlantGraphConfig {
    /// Whether to allow units in the graph that are not reachable from the
    /// influent.
    pub allow_unconnected_units: bool,

    /// Whether a plant step that produced non-converged algebraic solves
    /// should be reported as an error.  The numerical results of the step are
    /// the same either way; when this is `false`, non-convergence is only
    /// reported through the step's warnings.
    pub strict_convergence: bool,
}
