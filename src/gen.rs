//! Panel selection algorithms.
//!
//! Three algorithms produce (distributions over) panels for an
//! [`Instance`](crate::instance::Instance):
//!
//! - [`legacy`] — the randomized greedy sampler used historically by
//!   practitioners; it draws one panel at a time and marginal selection
//!   probabilities are only defined empirically.
//! - [`leximin`] — computes an exact distribution over feasible panels
//!   whose vector of per-agent selection probabilities is
//!   leximin-optimal.
//! - [`xmin`] — widens the support of the leximin distribution with
//!   sampler-discovered panels while preserving leximin optimality.
//!
//! [`feasibility`] holds the integer program the exact algorithms are
//! built on, along with the quota-relaxation diagnoser used when no
//! feasible panel exists.

pub mod feasibility;
pub mod legacy;
pub mod leximin;
pub mod xmin;

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::instance::AgentId;

/// Numerical deviation accepted as equality when dealing with solvers.
pub const EPS: f64 = 5e-4;

/// A feasible panel: exactly `k` distinct agents satisfying every quota
/// (and the household rule where active).
pub type Panel = BTreeSet<AgentId>;

/// Suggested quota relaxation produced by the diagnoser when the
/// original quotas admit no panel.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaRelaxation {
    /// Recommended `(min, max)` per `(category, feature value)`.
    pub quotas: BTreeMap<(String, String), (usize, usize)>,
    /// Human-readable description of each recommended change.
    pub notes: Vec<String>,
}

#[derive(Error, Debug)]
pub enum Error {
    /// A panel could not be constructed even though the instance is not
    /// provably infeasible (sampler budget exhausted, lost feasibility
    /// mid-run, missing progress in the leximin loop).
    #[error("No valid panel could be constructed: {0}")]
    Selection(String),
    /// A solver returned a status that is neither optimal nor
    /// infeasible. Always fatal; the backend code is included.
    #[error("The solver returned unexpected status: {0}")]
    SolverStatus(String),
    /// The quotas provably admit no feasible panel. Carries the
    /// diagnoser's minimally relaxed quotas and recommendations.
    #[error("The quotas do not admit any feasible panel")]
    InfeasibleQuotas(QuotaRelaxation),
    /// The solver backend failed outright (model loading and such).
    #[error(transparent)]
    Solver(#[from] crate::ilp::solvers::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A distribution over feasible panels: non-negative probabilities
/// summing to 1 (within [`EPS`]) over distinct panels.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelDistribution {
    pub panels: Vec<Panel>,
    pub probabilities: Vec<f64>,
    /// Log of the computation, suitable for display to a human
    /// operator.
    pub output_lines: Vec<String>,
}

impl PanelDistribution {
    /// Per-agent marginal selection probabilities. Agents of the pool
    /// appearing in no panel get probability 0.
    pub fn marginals(&self, pool_size: usize) -> BTreeMap<AgentId, f64> {
        let mut probs: BTreeMap<AgentId, f64> = (0..pool_size).map(|id| (id, 0.0)).collect();
        for (panel, prob) in self.panels.iter().zip(self.probabilities.iter()) {
            for &id in panel {
                *probs.get_mut(&id).expect("agent ids are pool indices") += prob;
            }
        }
        probs
    }
}

/// Records a log line and echoes it, the way the historical tool did.
pub(crate) fn note(lines: &mut Vec<String>, msg: String) {
    println!("{}", msg);
    lines.push(msg);
}
