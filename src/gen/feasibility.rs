//! The panel feasibility integer program and the quota-relaxation
//! diagnoser.
//!
//! Feasible solutions of the IP are exactly the panels of the instance:
//! one binary variable per agent, a cardinality row, one quota row pair
//! per feature value, and an at-most-one row per household with at least
//! two members. The exact algorithms drive it with changing linear
//! objectives over the agent indicators: diverse-panel discovery,
//! coverage of a single agent, and pricing during column generation.


use std::collections::BTreeMap;

use super::{note, Error, Panel, QuotaRelaxation, Result};
use crate::ilp::solvers::{SolveResult, Solver};
use crate::ilp::{LinExpr, ObjectiveSense, Problem, ProblemBuilder, Variable};
use crate::instance::{AgentId, Instance};

/// Builder for the panel IP of a fixed instance.
///
/// The constraint set never changes over a run; only the objective does.
/// Each call assembles a fresh [`Problem`] from the shared constraint
/// skeleton, which keeps the solver seam stateless.
#[derive(Debug, Clone)]
pub struct PanelProblem<'a> {
    instance: &'a Instance,
    required: Vec<AgentId>,
}

impl<'a> PanelProblem<'a> {
    pub fn new(instance: &'a Instance) -> Self {
        PanelProblem {
            instance,
            required: Vec::new(),
        }
    }

    /// Forces the given agents onto every panel the program produces.
    pub fn with_required(mut self, agents: impl IntoIterator<Item = AgentId>) -> Self {
        self.required.extend(agents);
        self
    }

    pub fn instance(&self) -> &'a Instance {
        self.instance
    }

    fn base_builder(&self) -> ProblemBuilder<AgentId> {
        let instance = self.instance;
        let mut builder = ProblemBuilder::new().set_variables(
            (0..instance.pool_size()).map(|id| (id, Variable::binary())),
        );

        for &id in &self.required {
            builder = builder.add_constraint(
                LinExpr::var(id).eq(&LinExpr::constant(1.0)),
                format!("agent {} is required on the panel", id),
            );
        }

        // we have to select exactly `k` many agents
        let member_count = LinExpr::sum((0..instance.pool_size()).map(LinExpr::var));
        builder = builder.add_constraint(
            member_count.eq(&LinExpr::constant(instance.panel_size() as f64)),
            format!("panel has exactly {} members", instance.panel_size()),
        );

        // we have to respect the quotas
        for fv in instance.feature_refs() {
            let quota = instance.feature_value(fv);
            let holder_count = LinExpr::sum(instance.holders(fv).iter().copied().map(LinExpr::var));
            builder = builder
                .add_constraint(
                    holder_count.geq(&LinExpr::constant(quota.min as f64)),
                    format!("at least {} members with {}", quota.min, instance.feature_name(fv)),
                )
                .add_constraint(
                    holder_count.leq(&LinExpr::constant(quota.max as f64)),
                    format!("at most {} members with {}", quota.max, instance.feature_name(fv)),
                );
        }

        // we might not be able to select multiple agents from the same
        // household
        for (h, members) in instance.shared_households().iter().enumerate() {
            let household_count = LinExpr::sum(members.iter().copied().map(LinExpr::var));
            builder = builder.add_constraint(
                household_count.leq(&LinExpr::constant(1.0)),
                format!("at most one member of household {}", h),
            );
        }

        builder
    }

    fn problem_with_objective(&self, objective: LinExpr<AgentId>) -> Problem<AgentId> {
        self.base_builder()
            .set_objective_function(objective, ObjectiveSense::Maximize)
            .build()
            .expect("all agent variables are declared")
    }

    fn extract_panel(&self, assignment: &crate::ilp::solvers::Assignment<AgentId>) -> Panel {
        (0..self.instance.pool_size())
            .filter(|id| assignment.is_one(id))
            .collect()
    }

    /// Feasibility probe. Returns some panel if one exists; otherwise
    /// runs the relaxation diagnoser and reports its recommendation
    /// through [`Error::InfeasibleQuotas`].
    pub fn check_feasible<S: Solver<AgentId> + Solver<RelaxVar>>(
        &self,
        solver: &S,
    ) -> Result<Panel> {
        let problem = self.problem_with_objective(LinExpr::constant(0.0));
        match solver.solve(&problem)? {
            SolveResult::Optimal(assignment) => Ok(self.extract_panel(&assignment)),
            SolveResult::Infeasible => {
                let relaxation = relax_infeasible_quotas(self.instance, &[Vec::new()], solver)?;
                Err(Error::InfeasibleQuotas(relaxation))
            }
            SolveResult::Other(code) => Err(Error::SolverStatus(code)),
        }
    }

    /// The panel maximizing `Σ weights[i]·x_i`, together with the
    /// objective value. `weights` is indexed by agent id.
    pub fn weighted_panel<S: Solver<AgentId>>(
        &self,
        weights: &[f64],
        solver: &S,
    ) -> Result<(Panel, f64)> {
        let objective = LinExpr::sum(
            weights
                .iter()
                .enumerate()
                .map(|(id, &w)| LinExpr::term(w, id)),
        );
        let problem = self.problem_with_objective(objective);
        match solver.solve(&problem)? {
            SolveResult::Optimal(assignment) => {
                Ok((self.extract_panel(&assignment), assignment.objective()))
            }
            // The probe ran first, so the quotas are known to be
            // satisfiable; losing feasibility here is a solver problem.
            SolveResult::Infeasible => Err(Error::SolverStatus(
                "panel program became infeasible after a successful probe".into(),
            )),
            SolveResult::Other(code) => Err(Error::SolverStatus(code)),
        }
    }

    /// The panel maximizing the inclusion of one specific agent. The
    /// returned panel contains the agent unless no feasible panel does.
    pub fn panel_including<S: Solver<AgentId>>(
        &self,
        agent: AgentId,
        solver: &S,
    ) -> Result<Panel> {
        let problem = self.problem_with_objective(LinExpr::var(agent));
        match solver.solve(&problem)? {
            SolveResult::Optimal(assignment) => Ok(self.extract_panel(&assignment)),
            SolveResult::Infeasible => Err(Error::SolverStatus(
                "panel program became infeasible after a successful probe".into(),
            )),
            SolveResult::Other(code) => Err(Error::SolverStatus(code)),
        }
    }
}

/// Variables of the quota-relaxation IP. Slack variables are shared
/// between the per-inclusion-set copies of the panel model; agent
/// variables are scoped to their copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RelaxVar {
    Agent { set: usize, agent: AgentId },
    MinSlack { category: usize, value: usize },
    MaxSlack { category: usize, value: usize },
}

impl std::fmt::Display for RelaxVar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelaxVar::Agent { set, agent } => write!(f, "x_{}_{}", set, agent),
            RelaxVar::MinSlack { category, value } => write!(f, "dmin_{}_{}", category, value),
            RelaxVar::MaxSlack { category, value } => write!(f, "dmax_{}_{}", category, value),
        }
    }
}

/// Make the diagnoser more reluctant to reduce lower quotas that are
/// already low. If the lower quota was 1, reducing it one more (to 0) is
/// 3 times more salient than increasing a quota by 1. This bonus tapers
/// off quickly, reducing from 10 is only 1.2 times as salient as an
/// increase.
fn reduction_weight(min: usize) -> f64 {
    if min == 0 {
        0.0 // cannot be relaxed anyway
    } else {
        1.0 + 2.0 / min as f64
    }
}

/// Assuming that the quotas are not satisfiable, suggest a minimal
/// relaxation that would be.
///
/// `ensure_inclusion` lists agent sets that some panel must contain
/// under the relaxed quotas: passing `[vec![a], vec![b, c]]` demands
/// that some valid panel contains `a` and some valid panel contains both
/// `b` and `c`. The default of a single empty set just requires a panel
/// to exist. One fresh copy of the panel model is built per set; all
/// copies share the slack variables.
pub fn relax_infeasible_quotas<S: Solver<RelaxVar>>(
    instance: &Instance,
    ensure_inclusion: &[Vec<AgentId>],
    solver: &S,
) -> Result<QuotaRelaxation> {
    assert!(
        !ensure_inclusion.is_empty(),
        "otherwise the existence of a panel is not required"
    );

    let mut builder = ProblemBuilder::new();

    // for every feature value, how much the lower and upper quotas get
    // relaxed
    for (c, v) in instance.feature_refs() {
        let quota = instance.feature_value((c, v));
        builder = builder
            .set_variable(
                RelaxVar::MinSlack { category: c, value: v },
                Variable::integer().min(0.0).max(quota.min as f64),
            )
            .set_variable(
                RelaxVar::MaxSlack { category: c, value: v },
                Variable::integer().min(0.0),
            );
    }

    for (set, inclusion_set) in ensure_inclusion.iter().enumerate() {
        let agent_var = |agent: AgentId| RelaxVar::Agent { set, agent };

        builder = builder.set_variables(
            (0..instance.pool_size()).map(|agent| (agent_var(agent), Variable::binary())),
        );
        for &agent in inclusion_set {
            builder = builder.add_constraint(
                LinExpr::var(agent_var(agent)).eq(&LinExpr::constant(1.0)),
                format!("panel {} must contain agent {}", set, agent),
            );
        }

        let member_count =
            LinExpr::sum((0..instance.pool_size()).map(|agent| LinExpr::var(agent_var(agent))));
        builder = builder.add_constraint(
            member_count.eq(&LinExpr::constant(instance.panel_size() as f64)),
            format!("panel {} has exactly {} members", set, instance.panel_size()),
        );

        // the relaxed quotas must be respected
        for (c, v) in instance.feature_refs() {
            let quota = instance.feature_value((c, v));
            let holder_count = LinExpr::sum(
                instance
                    .holders((c, v))
                    .iter()
                    .map(|&agent| LinExpr::var(agent_var(agent))),
            );
            let min_slack = LinExpr::var(RelaxVar::MinSlack { category: c, value: v });
            let max_slack = LinExpr::var(RelaxVar::MaxSlack { category: c, value: v });
            builder = builder
                .add_constraint(
                    (&holder_count + &min_slack).geq(&LinExpr::constant(quota.min as f64)),
                    format!("relaxed lower quota of {}", instance.feature_name((c, v))),
                )
                .add_constraint(
                    (&holder_count - &max_slack).leq(&LinExpr::constant(quota.max as f64)),
                    format!("relaxed upper quota of {}", instance.feature_name((c, v))),
                );
        }

        // household rows once per household per inclusion set; the
        // household rule itself is never relaxed
        for (h, members) in instance.shared_households().iter().enumerate() {
            let household_count =
                LinExpr::sum(members.iter().map(|&agent| LinExpr::var(agent_var(agent))));
            builder = builder.add_constraint(
                household_count.leq(&LinExpr::constant(1.0)),
                format!("panel {} has at most one member of household {}", set, h),
            );
        }
    }

    // minimize the amount by which the quotas have to be relaxed
    let objective = LinExpr::sum(instance.feature_refs().flat_map(|(c, v)| {
        let quota_min = instance.feature_value((c, v)).min;
        [
            LinExpr::term(
                reduction_weight(quota_min),
                RelaxVar::MinSlack { category: c, value: v },
            ),
            LinExpr::var(RelaxVar::MaxSlack { category: c, value: v }),
        ]
    }));

    let problem = builder
        .set_objective_function(objective, ObjectiveSense::Minimize)
        .build()
        .expect("all relaxation variables are declared");

    let assignment = match solver.solve(&problem)? {
        SolveResult::Optimal(assignment) => assignment,
        SolveResult::Infeasible => {
            return Err(Error::Selection(
                "no quota relaxation restores feasibility; either the pool is very bad or the \
                 required inclusions contradict the household rule"
                    .into(),
            ))
        }
        SolveResult::Other(code) => return Err(Error::SolverStatus(code)),
    };

    let mut output_lines = Vec::new();
    let mut new_quotas = BTreeMap::new();
    for (c, v) in instance.feature_refs() {
        let quota = instance.feature_value((c, v));
        let min_relax = assignment
            .value(&RelaxVar::MinSlack { category: c, value: v })
            .round() as usize;
        let max_relax = assignment
            .value(&RelaxVar::MaxSlack { category: c, value: v })
            .round() as usize;

        let lower = quota.min - min_relax.min(quota.min);
        if lower < quota.min {
            note(
                &mut output_lines,
                format!(
                    "Recommend lowering lower quota of {} to {}.",
                    instance.feature_name((c, v)),
                    lower
                ),
            );
        }
        let upper = quota.max + max_relax;
        if upper > quota.max {
            note(
                &mut output_lines,
                format!(
                    "Recommend raising upper quota of {} to {}.",
                    instance.feature_name((c, v)),
                    upper
                ),
            );
        }

        let category_name = instance.categories()[c].name.clone();
        let value_name = instance.categories()[c].values[v].name.clone();
        new_quotas.insert((category_name, value_name), (lower, upper));
    }

    Ok(QuotaRelaxation {
        quotas: new_quotas,
        notes: output_lines,
    })
}
