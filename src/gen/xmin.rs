//! The XMIN extender.
//!
//! XMIN keeps the leximin-optimal selection probabilities but widens the
//! support of the distribution: it repeatedly asks the LEGACY sampler
//! for a feasible panel not yet in the portfolio, adds it, and re-runs
//! the leximin engine from the enlarged portfolio. Sampler-found panels
//! are always feasible, so the leximin order of the marginals can only
//! stay put or improve; the payoff is a less brittle randomization
//! spread over more panels.

#[cfg(test)]
mod tests;

use std::collections::BTreeSet;

use rand::Rng;

use super::feasibility::PanelProblem;
use super::legacy::{Sampler, DEFAULT_MAX_ATTEMPTS};
use super::leximin::{
    covered_agents, expand_distribution_leximin, find_distribution_leximin, LeximinOptions,
};
use super::{Panel, PanelDistribution, Result};
use crate::ilp::solvers::coin_cbc::CbcSolver;
use crate::ilp::solvers::highs::HighsSolver;
use crate::instance::Instance;

/// Computes the LEXIMIN distribution, then enlarges its support with
/// sampler-discovered panels until the sampler stops finding new ones
/// (or the iteration budget of `5·|pool|` runs out).
pub fn find_distribution_xmin<R: Rng>(
    instance: &Instance,
    options: &LeximinOptions,
    rng: &mut R,
) -> Result<PanelDistribution> {
    let ip_solver = CbcSolver::new();
    let dual_solver = HighsSolver::barrier_no_crossover();
    let recon_solver = HighsSolver::new();

    let mut distribution = find_distribution_leximin(instance, options)?;

    let panel_problem = PanelProblem::new(instance);
    let sampler = Sampler::new(instance);

    let number_of_iterations = instance.pool_size() * 5;
    for i in 0..number_of_iterations {
        println!("Xmin iteration number {} out of {}.", i, number_of_iterations);

        let mut committees: BTreeSet<Panel> = distribution.panels.iter().cloned().collect();
        let new_panel = match panel_not_in_portfolio(instance, &sampler, &committees, rng)? {
            Some(panel) => panel,
            None => break,
        };
        committees.insert(new_panel);

        let covered = covered_agents(&committees);
        println!(
            "Portfolio of {} panels covers {} of {} agents.",
            committees.len(),
            covered.len(),
            instance.pool_size()
        );

        distribution = expand_distribution_leximin(
            &panel_problem,
            committees,
            &ip_solver,
            &dual_solver,
            &recon_solver,
            distribution.output_lines,
        )?;
    }

    Ok(distribution)
}

/// Samples panels with LEGACY until one outside the portfolio shows up,
/// giving up after `3·|pool|` successful draws.
fn panel_not_in_portfolio<R: Rng>(
    instance: &Instance,
    sampler: &Sampler,
    portfolio: &BTreeSet<Panel>,
    rng: &mut R,
) -> Result<Option<Panel>> {
    for _ in 0..instance.pool_size() * 3 {
        let panel = sampler.draw_until(rng, DEFAULT_MAX_ATTEMPTS)?;
        if !portfolio.contains(&panel) {
            return Ok(Some(panel));
        }
    }
    Ok(None)
}
