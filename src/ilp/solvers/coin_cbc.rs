//! COIN-CBC backend.
//!
//! This module implements a [`Solver`] which uses the [`coin_cbc`] crate,
//! an interface to the COIN-OR CBC solver. CBC is the workhorse for every
//! integer program in this crate (panel generation, pricing, quota
//! relaxation).


use std::collections::BTreeMap;

use super::{Assignment, Result, SolveResult, Solver};
use crate::ilp::{linexpr::Sign, ObjectiveSense, Problem, VariableName, VariableType};

/// CBC solver handle.
///
/// The only real configuration is whether the backend may write to
/// stdout. CBC is initialized per solve; there is no shared state, so a
/// single instance can be reused for every IP of a run.
#[derive(Debug, Clone)]
pub struct CbcSolver {
    disable_logging: bool,
    time_limit_in_seconds: Option<u32>,
}

impl Default for CbcSolver {
    fn default() -> Self {
        CbcSolver::new()
    }
}

impl CbcSolver {
    pub fn new() -> Self {
        CbcSolver {
            disable_logging: true,
            time_limit_in_seconds: None,
        }
    }

    pub fn with_disable_logging(mut self, disable_logging: bool) -> Self {
        self.disable_logging = disable_logging;
        self
    }

    /// Hosts that want to time-bound a run set a limit here; a solve cut
    /// off by it surfaces as a non-optimal status.
    pub fn with_time_limit(mut self, seconds: Option<u32>) -> Self {
        self.time_limit_in_seconds = seconds;
        self
    }
}

struct CbcModel<V: VariableName> {
    model: coin_cbc::Model,
    cols: BTreeMap<V, coin_cbc::Col>,
}

impl<V: VariableName> Solver<V> for CbcSolver {
    fn solve(&self, problem: &Problem<V>) -> Result<SolveResult<V>> {
        // cbc does not seem to shut up even if logging is disabled,
        // we block output directly
        let stdout_gag = gag::Gag::stdout();
        // We allow for errors in case this is run in multiple threads
        if !self.disable_logging {
            if let Ok(gag) = stdout_gag {
                drop(gag);
            }
        }

        let mut cbc_model = self.build_model(problem);

        let sol = cbc_model.model.solve();
        let raw = sol.raw();

        if raw.is_proven_optimal() {
            let values: BTreeMap<_, _> = cbc_model
                .cols
                .iter()
                .map(|(v, col)| (v.clone(), sol.col(*col)))
                .collect();
            Ok(SolveResult::Optimal(Assignment::new(values, problem)))
        } else if raw.is_proven_infeasible() {
            Ok(SolveResult::Infeasible)
        } else {
            Ok(SolveResult::Other(format!(
                "cbc status {:?} (secondary {:?})",
                raw.status(),
                raw.secondary_status()
            )))
        }
    }
}

impl CbcSolver {
    fn build_model<V: VariableName>(&self, problem: &Problem<V>) -> CbcModel<V> {
        use coin_cbc::Model;

        let mut model = Model::default();

        let cols: BTreeMap<_, _> = problem
            .get_variables()
            .iter()
            .map(|(var, desc)| {
                let col = match desc.get_type() {
                    VariableType::Binary => model.add_binary(),
                    VariableType::Integer => model.add_integer(),
                    VariableType::Continuous => model.add_col(),
                };

                if desc.get_type() != VariableType::Binary {
                    match desc.get_min() {
                        Some(m) => model.set_col_lower(col, m),
                        None => model.set_col_lower(col, -f64::INFINITY),
                    }

                    match desc.get_max() {
                        Some(m) => model.set_col_upper(col, m),
                        None => model.set_col_upper(col, f64::INFINITY),
                    }
                }

                (var.clone(), col)
            })
            .collect();

        for (constraint, _desc) in problem.get_constraints() {
            let row = model.add_row();
            for (v, w) in constraint.coefficients() {
                let col = cols[v];
                model.set_weight(row, col, w);
            }
            match constraint.get_sign() {
                Sign::Equals => {
                    model.set_row_equal(row, -constraint.get_constant());
                }
                Sign::LessThan => {
                    model.set_row_upper(row, -constraint.get_constant());
                }
            }
        }

        model.set_obj_sense(match problem.get_objective_sense() {
            ObjectiveSense::Maximize => coin_cbc::Sense::Maximize,
            ObjectiveSense::Minimize => coin_cbc::Sense::Minimize,
        });
        for (var, coef) in problem.get_objective_function().coefficients() {
            model.set_obj_coeff(cols[var], coef);
        }

        if self.disable_logging {
            model.set_parameter("log", "0");
            model.set_parameter("slog", "0");
        }

        if let Some(time_limit) = self.time_limit_in_seconds {
            model.set_parameter("timeMode", "elapsed");
            model.set_parameter("seconds", &time_limit.to_string());
        }

        CbcModel { model, cols }
    }
}
