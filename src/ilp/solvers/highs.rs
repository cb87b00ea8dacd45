//! HiGHS backend.
//!
//! This module implements a [`Solver`] backed by the [`highs`] crate.
//! It is the LP side of the engine: the leximin dual programs must be
//! solved with an interior-point method *without* cross-over so that the
//! returned solution is strictly complementary where possible, and HiGHS
//! is the backend that exposes that switch (see [`LpMethod`]).

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::ops::Bound;

use super::{Assignment, Error, Result, SolveResult, Solver};
use crate::ilp::{linexpr::Sign, ObjectiveSense, Problem, VariableName, VariableType};

/// How HiGHS should solve the continuous relaxation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpMethod {
    /// Leave the choice to HiGHS (dual simplex in practice).
    Default,
    /// Interior-point method. With `crossover` disabled the solver
    /// returns the barrier iterate itself, which tends to lie in the
    /// relative interior of the optimal face.
    Barrier { crossover: bool },
}

/// HiGHS solver handle.
#[derive(Debug, Clone)]
pub struct HighsSolver {
    method: LpMethod,
    time_limit: Option<f64>,
    disable_logging: bool,
}

impl Default for HighsSolver {
    fn default() -> Self {
        HighsSolver::new()
    }
}

impl HighsSolver {
    pub fn new() -> Self {
        HighsSolver {
            method: LpMethod::Default,
            time_limit: None,
            disable_logging: true,
        }
    }

    /// A solver configured for strictly complementary LP solutions:
    /// barrier only, no cross-over.
    pub fn barrier_no_crossover() -> Self {
        HighsSolver {
            method: LpMethod::Barrier { crossover: false },
            time_limit: None,
            disable_logging: true,
        }
    }

    pub fn with_method(mut self, method: LpMethod) -> Self {
        self.method = method;
        self
    }

    /// Hosts that want to time-bound a run set a limit here and treat the
    /// resulting non-optimal status as an abort.
    pub fn with_time_limit(mut self, seconds: Option<f64>) -> Self {
        self.time_limit = seconds;
        self
    }

    pub fn with_disable_logging(mut self, disable_logging: bool) -> Self {
        self.disable_logging = disable_logging;
        self
    }
}

impl<V: VariableName> Solver<V> for HighsSolver {
    fn solve(&self, problem: &Problem<V>) -> Result<SolveResult<V>> {
        use highs::{RowProblem, Sense};

        let mut highs_problem = RowProblem::default();

        let cols: BTreeMap<_, _> = problem
            .get_variables()
            .iter()
            .map(|(var, desc)| {
                let obj_coef = problem
                    .get_objective_function()
                    .get(var)
                    .unwrap_or(0.0);

                let col = match desc.get_type() {
                    VariableType::Binary => highs_problem.add_integer_column(obj_coef, 0..=1),
                    VariableType::Integer => {
                        highs_problem.add_integer_column(obj_coef, bounds(desc.get_min(), desc.get_max()))
                    }
                    VariableType::Continuous => {
                        highs_problem.add_column(obj_coef, bounds(desc.get_min(), desc.get_max()))
                    }
                };
                (var.clone(), col)
            })
            .collect();

        for (constraint, _desc) in problem.get_constraints() {
            let row_factors: Vec<_> = constraint.coefficients().map(|(v, w)| (cols[v], w)).collect();
            let neg_constant = -constraint.get_constant();
            match constraint.get_sign() {
                Sign::Equals => {
                    highs_problem.add_row(neg_constant..=neg_constant, row_factors);
                }
                Sign::LessThan => {
                    highs_problem.add_row(..=neg_constant, row_factors);
                }
            }
        }

        let sense = match problem.get_objective_sense() {
            ObjectiveSense::Minimize => Sense::Minimise,
            ObjectiveSense::Maximize => Sense::Maximise,
        };
        let mut model = highs_problem
            .try_optimise(sense)
            .map_err(|e| Error::Backend(format!("highs model load failed: {:?}", e)))?;

        if self.disable_logging {
            model.make_quiet();
        }
        if let LpMethod::Barrier { crossover } = self.method {
            model.set_option("solver", "ipm");
            if !crossover {
                model.set_option("run_crossover", "off");
            }
        }
        if let Some(time_limit) = self.time_limit {
            model.set_option("time_limit", time_limit);
        }

        let solved = model
            .try_solve()
            .map_err(|e| Error::Backend(format!("highs solve failed: {:?}", e)))?;

        use highs::HighsModelStatus;
        match solved.status() {
            HighsModelStatus::Optimal => {
                let columns = solved.get_solution().columns().to_vec();
                let values: BTreeMap<_, _> = problem
                    .get_variables_vec()
                    .iter()
                    .enumerate()
                    .map(|(i, var)| (var.clone(), columns[i]))
                    .collect();
                Ok(SolveResult::Optimal(Assignment::new(values, problem)))
            }
            HighsModelStatus::Infeasible => Ok(SolveResult::Infeasible),
            status => Ok(SolveResult::Other(format!("highs status {:?}", status))),
        }
    }
}

fn bounds(min: Option<f64>, max: Option<f64>) -> (Bound<f64>, Bound<f64>) {
    (
        min.map_or(Bound::Unbounded, Bound::Included),
        max.map_or(Bound::Unbounded, Bound::Included),
    )
}
