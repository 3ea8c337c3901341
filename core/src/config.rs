use crate::error::SketchResult;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Nonlinear backend used for the numeric part of a solve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverBackend {
    /// Sequential quadratic programming with a quasi-Newton Hessian.
    #[default]
    Sqp,
    /// Primal-dual Newton iteration with filter line search.
    InteriorPoint,
}

impl fmt::Display for SolverBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverBackend::Sqp => write!(f, "sqp"),
            SolverBackend::InteriorPoint => write!(f, "interior_point"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub backend: SolverBackend,
    /// Upper bound on backend iterations per solve.
    pub max_iterations: usize,
    /// Largest absolute residual accepted as "satisfied".
    pub constraint_tolerance: f64,
    /// Stationarity tolerance on the Lagrangian gradient.
    pub optimality_tolerance: f64,
    /// Relative step for central finite differences.
    pub finite_difference_step: f64,
    /// Fire the geometry-changed callback even when substitution alone
    /// determined every coordinate.
    pub notify_when_determined: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            backend: SolverBackend::Sqp,
            max_iterations: 100,
            constraint_tolerance: 1e-8,
            optimality_tolerance: 1e-6,
            finite_difference_step: 1e-6,
            notify_when_determined: true,
        }
    }
}

impl SolverConfig {
    /// Parse a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> SketchResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_backend(mut self, backend: SolverBackend) -> Self {
        self.backend = backend;
        self
    }
}
