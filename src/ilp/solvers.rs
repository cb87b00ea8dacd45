//! Solver backends.
//!
//! [`coin_cbc`] handles the integer programs, [`highs`] the linear
//! programs. Both implement the same narrow [`Solver`] trait: feed in a
//! [`Problem`], get back a status together with an assignment and its
//! objective value. The objective value is always recomputed from the
//! assignment on our side, so the reported value does not depend on the
//! backend.

pub mod coin_cbc;
pub mod highs;

use std::collections::BTreeMap;

use thiserror::Error;

use super::{Problem, VariableName};

/// Errors at the backend boundary (model loading failures and the like).
/// Regular "infeasible" or "time limit" answers are not errors, they are
/// [`SolveResult`] variants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("solver backend failed: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A complete variable assignment returned by a solver.
#[derive(Debug, Clone)]
pub struct Assignment<V: VariableName> {
    values: BTreeMap<V, f64>,
    objective: f64,
}

impl<V: VariableName> Assignment<V> {
    pub(crate) fn new(values: BTreeMap<V, f64>, problem: &Problem<V>) -> Self {
        let objective = problem.get_objective_function().eval(&values);
        Assignment { values, objective }
    }

    /// The value of a variable (0 for variables unknown to the solver).
    pub fn value(&self, var: &V) -> f64 {
        self.values.get(var).copied().unwrap_or(0.0)
    }

    /// Whether a binary/integer variable is set, using the usual 0.5
    /// threshold on the relaxed value.
    pub fn is_one(&self, var: &V) -> bool {
        self.value(var) > 0.5
    }

    /// Objective value of the assignment, recomputed from the values.
    pub fn objective(&self) -> f64 {
        self.objective
    }

    pub fn values(&self) -> &BTreeMap<V, f64> {
        &self.values
    }
}

/// Outcome of a solve.
#[derive(Debug, Clone)]
pub enum SolveResult<V: VariableName> {
    /// The backend proved optimality and returned an assignment.
    Optimal(Assignment<V>),
    /// The backend proved that no assignment satisfies the constraints.
    Infeasible,
    /// Any other terminal status (time limit, unbounded, numerical
    /// failure), with the backend's status code for error reporting.
    Other(String),
}

/// The seam between the selection algorithms and the LP/IP backends.
pub trait Solver<V: VariableName>: Send + Sync {
    fn solve(&self, problem: &Problem<V>) -> Result<SolveResult<V>>;
}
