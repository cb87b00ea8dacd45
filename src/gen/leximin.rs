//! The LEXIMIN algorithm: an exact distribution over feasible panels
//! whose sorted vector of selection probabilities is lexicographically
//! maximal.
//!
//! The distribution lives in an LP with one variable per feasible panel,
//! which is exponentially large, so the engine works on the dual and
//! prices in panels by column generation:
//!
//! ```text
//! maximize z                                    minimize ŷ - Σ_{i fixed} F[i]·yᵢ
//! s.t. Σ_{P ∋ i} x_P ≥ z      (i unfixed)       s.t. Σ_{i ∈ P} yᵢ ≤ ŷ      ∀ P
//!      Σ_{P ∋ i} x_P ≥ F[i]   (i fixed)              Σ_{i unfixed} yᵢ = 1
//!      Σ_P x_P ≤ 1                                   ŷ, yᵢ ≥ 0
//!      x_P ≥ 0
//! ```
//!
//! Whenever the dual optimum is supported on the current panel set, every
//! agent with positive dual weight has a binding coverage constraint in
//! all primal optima (strict complementarity), so its probability can be
//! fixed to the current optimum and the outer loop recurses on the rest.
//! The dual LPs are therefore solved with an interior-point method and
//! cross-over disabled, which maximizes the number of strictly positive
//! dual weights per iteration.

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};

use super::feasibility::PanelProblem;
use super::{note, Error, Panel, PanelDistribution, Result, EPS};
use crate::ilp::solvers::coin_cbc::CbcSolver;
use crate::ilp::solvers::highs::HighsSolver;
use crate::ilp::solvers::{SolveResult, Solver};
use crate::ilp::{LinExpr, ObjectiveSense, Problem, ProblemBuilder, Variable};
use crate::instance::{AgentId, Instance};

/// When the dual LP goes infeasible from floating-point drift, all fixed
/// probabilities are shaved by this much and the stage is retried.
const PROBABILITY_REDUCTION: f64 = 1e-4;

/// Retry budget for the shaving above. Fixed probabilities reach zero
/// long before this, so hitting the cap means the backend is genuinely
/// broken.
const MAX_PROBABILITY_REDUCTIONS: usize = 10_000;

/// Tunables of the leximin computation.
#[derive(Debug, Clone, Default)]
pub struct LeximinOptions {
    /// Rounds of the multiplicative-weights phase seeding the initial
    /// portfolio. Defaults to `2·|pool|`.
    pub multiplicative_weights_rounds: Option<usize>,
}

/// Computes the leximin-optimal distribution for an instance.
///
/// Raises [`Error::InfeasibleQuotas`] with a relaxation suggestion when
/// no feasible panel exists.
pub fn find_distribution_leximin(
    instance: &Instance,
    options: &LeximinOptions,
) -> Result<PanelDistribution> {
    let ip_solver = CbcSolver::new();
    let dual_solver = HighsSolver::barrier_no_crossover();
    let recon_solver = HighsSolver::new();

    let mut output_lines = vec![String::from("Using leximin algorithm.")];

    let panel_problem = PanelProblem::new(instance);
    panel_problem.check_feasible(&ip_solver)?;

    let rounds = options
        .multiplicative_weights_rounds
        .unwrap_or(2 * instance.pool_size())
        .max(1);
    let (committees, _covered, lines) = initial_portfolio(&panel_problem, rounds, &ip_solver)?;
    output_lines.extend(lines);

    expand_distribution_leximin(
        &panel_problem,
        committees,
        &ip_solver,
        &dual_solver,
        &recon_solver,
        output_lines,
    )
}

/// Builds a diverse starting set of feasible panels which together cover
/// every agent that appears in any feasible panel.
///
/// Returns the panels, the covered agents and log lines. On exit, agents
/// missing from the covered set are certified not to appear in any
/// feasible panel.
pub fn initial_portfolio<S: Solver<AgentId>>(
    panel_problem: &PanelProblem,
    rounds: usize,
    solver: &S,
) -> Result<(BTreeSet<Panel>, BTreeSet<AgentId>, Vec<String>)> {
    let pool_size = panel_problem.instance().pool_size();
    let mut output_lines = Vec::new();
    let mut committees: BTreeSet<Panel> = BTreeSet::new();
    let mut covered: BTreeSet<AgentId> = BTreeSet::new();

    // Multiplicative-weights phase. Each round finds a feasible panel
    // maximizing the sum of its members' weights, then shrinks the
    // weights of the members, so later rounds strongly prioritize agents
    // that appear in few panels so far.
    let mut weights = vec![1.0f64; pool_size];
    for round in 0..rounds {
        let (new_set, _value) = panel_problem.weighted_panel(&weights, solver)?;

        for &id in &new_set {
            weights[id] *= 0.8;
        }
        // rescaling changes nothing conceptually but prevents the
        // weights from drifting toward 0
        let coefficient_sum: f64 = weights.iter().sum();
        for weight in &mut weights {
            *weight *= pool_size as f64 / coefficient_sum;
        }

        if committees.contains(&new_set) {
            // the panel is already known, make the weights a bit more
            // equal again to mix things up
            for weight in &mut weights {
                *weight = 0.9 * *weight + 0.1;
            }
        } else {
            covered.extend(new_set.iter().copied());
            committees.insert(new_set);
        }

        println!(
            "Multiplicative weights phase, round {}/{}. Discovered {} committees so far.",
            round + 1,
            rounds,
            committees.len()
        );
    }

    // Coverage completion: for every agent still missing, look for a
    // panel specifically containing it.
    for id in 0..pool_size {
        if covered.contains(&id) {
            continue;
        }
        let new_set = panel_problem.panel_including(id, solver)?;
        if new_set.contains(&id) {
            covered.extend(new_set.iter().copied());
            committees.insert(new_set);
        } else {
            note(
                &mut output_lines,
                format!("Agent {} not contained in any feasible committee.", id),
            );
        }
    }

    if covered.len() == pool_size {
        note(
            &mut output_lines,
            String::from("All agents are contained in some feasible committee."),
        );
    }

    Ok((committees, covered, output_lines))
}

/// Variables of the dual LP: one weight per agent plus the cap `ŷ`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DualVar {
    Agent(AgentId),
    Cap,
}

impl std::fmt::Display for DualVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DualVar::Agent(id) => write!(f, "y_{}", id),
            DualVar::Cap => write!(f, "y_cap"),
        }
    }
}

fn dual_problem(
    pool_size: usize,
    committees: &BTreeSet<Panel>,
    fixed: &BTreeMap<AgentId, f64>,
) -> Problem<DualVar> {
    let mut builder = ProblemBuilder::new()
        .set_variables(
            (0..pool_size).map(|id| (DualVar::Agent(id), Variable::continuous().min(0.0))),
        )
        .set_variable(DualVar::Cap, Variable::continuous().min(0.0));

    let unfixed_sum = LinExpr::sum(
        (0..pool_size)
            .filter(|id| !fixed.contains_key(id))
            .map(|id| LinExpr::var(DualVar::Agent(id))),
    );
    builder = builder.add_constraint(
        unfixed_sum.eq(&LinExpr::constant(1.0)),
        "weights of unfixed agents sum to 1",
    );

    for (i, committee) in committees.iter().enumerate() {
        let committee_sum =
            LinExpr::sum(committee.iter().map(|&id| LinExpr::var(DualVar::Agent(id))));
        builder = builder.add_constraint(
            committee_sum.leq(&LinExpr::var(DualVar::Cap)),
            format!("panel {} stays below the cap", i),
        );
    }

    let objective = LinExpr::var(DualVar::Cap)
        - LinExpr::sum(
            fixed
                .iter()
                .map(|(&id, &prob)| LinExpr::term(prob, DualVar::Agent(id))),
        );

    builder
        .set_objective_function(objective, ObjectiveSense::Minimize)
        .build()
        .expect("all dual variables are declared")
}

/// The leximin engine proper: starting from a portfolio of feasible
/// panels, fixes every agent's probability to its leximin value and
/// reconstructs a randomization realizing those probabilities.
///
/// Used by [`find_distribution_leximin`] with the initial portfolio and
/// by the XMIN extender with an enlarged one.
pub fn expand_distribution_leximin<I, D, C>(
    panel_problem: &PanelProblem,
    mut committees: BTreeSet<Panel>,
    ip_solver: &I,
    dual_solver: &D,
    recon_solver: &C,
    mut output_lines: Vec<String>,
) -> Result<PanelDistribution>
where
    I: Solver<AgentId>,
    D: Solver<DualVar>,
    C: Solver<ReconVar>,
{
    let pool_size = panel_problem.instance().pool_size();

    // Selection probabilities get fixed to their leximin value as the
    // algorithm progresses; the outer loop maximizes the minimum of all
    // unfixed probabilities while honoring the fixed ones. Every
    // iteration fixes at least one more agent.
    let mut fixed: BTreeMap<AgentId, f64> = BTreeMap::new();
    let mut reduction_counter = 0usize;

    while fixed.len() < pool_size {
        println!("Fixed {}/{} probabilities.", fixed.len(), pool_size);

        // Inner column generation: solve the dual restricted to the
        // current panels, then ask the pricing IP for a panel violating
        // it. Terminates when no panel does (within tolerance).
        let (agent_weights, dual_obj) = loop {
            let dual = dual_problem(pool_size, &committees, &fixed);
            let assignment = match dual_solver.solve(&dual)? {
                SolveResult::Optimal(assignment) => assignment,
                status @ (SolveResult::Infeasible | SolveResult::Other(_)) => {
                    // In theory the dual stays feasible: fixing
                    // probabilities only adds constraints the previous
                    // optimum satisfied. Floating-point drift can still
                    // push the fixed probabilities out of reach, in
                    // which case they are all shaved a little and the
                    // stage is retried.
                    if reduction_counter >= MAX_PROBABILITY_REDUCTIONS {
                        return Err(Error::SolverStatus(format!(
                            "dual stage failed even after {} probability reductions ({:?})",
                            reduction_counter, status
                        )));
                    }
                    for prob in fixed.values_mut() {
                        *prob = (*prob - PROBABILITY_REDUCTION).max(0.0);
                    }
                    reduction_counter += 1;
                    println!(
                        "Dual stage not optimal, reducing fixed probabilities (round {}).",
                        reduction_counter
                    );
                    continue;
                }
            };

            let agent_weights: Vec<f64> = (0..pool_size)
                .map(|id| assignment.value(&DualVar::Agent(id)))
                .collect();

            // the panel maximizing Σ_{i ∈ P} yᵢ, i.e. the most violated
            // dual constraint if any is violated
            let (new_set, value) = panel_problem.weighted_panel(&agent_weights, ip_solver)?;

            let upper = assignment.value(&DualVar::Cap);
            let dual_obj = assignment.objective();

            note(
                &mut output_lines,
                format!(
                    "Maximin is at most {:.2}%, can do {:.2}% with {} committees. Gap {:.2}%.",
                    (dual_obj - upper + value) * 100.0,
                    dual_obj * 100.0,
                    committees.len(),
                    (value - upper) * 100.0
                ),
            );

            if value <= upper + EPS {
                // the current panels are enough to support an optimal
                // primal solution
                break (agent_weights, dual_obj);
            }

            if !committees.insert(new_set) {
                // the pricing IP claims a violation by a panel we
                // already constrain; the tolerance bookkeeping is off
                return Err(Error::SolverStatus(format!(
                    "pricing returned a known panel with violation {}",
                    value - upper
                )));
            }
        };

        // By strict complementarity, a positive dual weight means the
        // agent's coverage constraint is binding in every optimal primal
        // solution, so its probability equals the LP optimum.
        let mut fixed_any = false;
        for id in 0..pool_size {
            if !fixed.contains_key(&id) && agent_weights[id] > EPS {
                fixed.insert(id, dual_obj.max(0.0));
                fixed_any = true;
            }
        }

        if !fixed_any {
            // The barrier solution should put weight at least 1/|U| on
            // some unfixed agent (they sum to 1). If the tolerance
            // missed it, fall back to the heaviest one so the outer
            // loop always makes progress.
            let heaviest = (0..pool_size)
                .filter(|id| !fixed.contains_key(id))
                .max_by(|a, b| {
                    agent_weights[*a]
                        .partial_cmp(&agent_weights[*b])
                        .expect("dual weights are finite")
                });
            match heaviest {
                Some(id) if agent_weights[id] > 0.0 => {
                    note(
                        &mut output_lines,
                        format!(
                            "No dual weight above tolerance; fixing agent {} (weight {:.6}).",
                            id, agent_weights[id]
                        ),
                    );
                    fixed.insert(id, dual_obj.max(0.0));
                }
                _ => {
                    return Err(Error::Selection(String::from(
                        "leximin iteration could not fix any probability",
                    )))
                }
            }
        }
    }

    let (panels, probabilities) = reconstruct_randomization(&committees, &fixed, recon_solver)?;

    Ok(PanelDistribution {
        panels,
        probabilities,
        output_lines,
    })
}

/// Variables of the randomization-reconstruction LP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReconVar {
    /// Output probability of one panel.
    Panel(usize),
    /// Epigraph variable standing in for `Panel(i)²`.
    Square(usize),
    /// Largest downward deviation from the fixed probabilities.
    Slack,
}

impl std::fmt::Display for ReconVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconVar::Panel(i) => write!(f, "p_{}", i),
            ReconVar::Square(i) => write!(f, "q_{}", i),
            ReconVar::Slack => write!(f, "slack"),
        }
    }
}

/// Tangent points for the epigraph of `x ↦ x²` on `[0, 1]`. The cut at a
/// point `a` is `q ≥ 2a·x − a²`; together with `q ≥ 0` this is a convex
/// piecewise-linear under-approximation tight at the five points.
const SQUARE_CUTS: [f64; 4] = [0.25, 0.5, 0.75, 1.0];

/// Chooses non-negative panel weights summing to 1 that realize the
/// fixed probabilities within a minimized slack. The quadratic
/// regularizer `Σ x_P²` of the objective prefers spreading mass over
/// many panels; it enters the LP through epigraph cuts since the
/// backends are linear.
fn reconstruct_randomization<C: Solver<ReconVar>>(
    committees: &BTreeSet<Panel>,
    fixed: &BTreeMap<AgentId, f64>,
    solver: &C,
) -> Result<(Vec<Panel>, Vec<f64>)> {
    let panels: Vec<Panel> = committees.iter().cloned().collect();

    let mut builder = ProblemBuilder::new()
        .set_variables(
            (0..panels.len()).map(|i| (ReconVar::Panel(i), Variable::continuous().min(0.0))),
        )
        .set_variables(
            (0..panels.len()).map(|i| (ReconVar::Square(i), Variable::continuous().min(0.0))),
        )
        .set_variable(ReconVar::Slack, Variable::continuous().min(0.0));

    let total = LinExpr::sum((0..panels.len()).map(|i| LinExpr::var(ReconVar::Panel(i))));
    builder = builder.add_constraint(
        total.eq(&LinExpr::constant(1.0)),
        "probabilities add up to 1",
    );

    for (&id, &prob) in fixed {
        let person_probability = LinExpr::sum(
            panels
                .iter()
                .enumerate()
                .filter(|(_i, panel)| panel.contains(&id))
                .map(|(i, _panel)| LinExpr::var(ReconVar::Panel(i))),
        );
        builder = builder.add_constraint(
            (person_probability + LinExpr::var(ReconVar::Slack))
                .geq(&LinExpr::constant(prob)),
            format!("agent {} receives its fixed probability", id),
        );
    }

    for i in 0..panels.len() {
        for a in SQUARE_CUTS {
            builder = builder.add_constraint(
                LinExpr::var(ReconVar::Square(i))
                    .geq(&(2.0 * a * LinExpr::var(ReconVar::Panel(i)) - a * a)),
                format!("square cut of panel {} at {}", i, a),
            );
        }
    }

    let objective = LinExpr::var(ReconVar::Slack)
        + LinExpr::sum((0..panels.len()).map(|i| LinExpr::var(ReconVar::Square(i))));
    let problem = builder
        .set_objective_function(objective, ObjectiveSense::Minimize)
        .build()
        .expect("all reconstruction variables are declared");

    let assignment = match solver.solve(&problem)? {
        SolveResult::Optimal(assignment) => assignment,
        SolveResult::Infeasible => {
            // with the slack variable the LP is always feasible
            return Err(Error::SolverStatus(
                "randomization reconstruction reported infeasible".into(),
            ));
        }
        SolveResult::Other(code) => return Err(Error::SolverStatus(code)),
    };

    // bound between 0 and 1 and renormalize, downstream sampling is
    // sensitive to small deviations here
    let mut probabilities: Vec<f64> = (0..panels.len())
        .map(|i| assignment.value(&ReconVar::Panel(i)).clamp(0.0, 1.0))
        .collect();
    let total: f64 = probabilities.iter().sum();
    for prob in &mut probabilities {
        *prob /= total;
    }

    Ok((panels, probabilities))
}

/// Union of the members of a panel set, i.e. the agents the set covers.
pub(crate) fn covered_agents(committees: &BTreeSet<Panel>) -> BTreeSet<AgentId> {
    committees.iter().flatten().copied().collect()
}
