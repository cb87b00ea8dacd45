//! Probability allocations and their analysis.
//!
//! Wraps the three algorithms into a uniform "allocation" interface:
//! each run yields the per-agent selection probabilities, the set of
//! distinct panels observed (or carrying probability), and a histogram
//! of pair co-occurrence probabilities. On top of that sit the
//! inequality statistics of an allocation and the per-instance analysis
//! report comparing the algorithms.


use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Beta, ContinuousCDF};
use thiserror::Error;

use crate::cache;
use crate::gen::legacy::{Sampler, DEFAULT_MAX_ATTEMPTS};
use crate::gen::leximin::{find_distribution_leximin, LeximinOptions};
use crate::gen::xmin::find_distribution_xmin;
use crate::gen::{Panel, PanelDistribution};
use crate::instance::{AgentId, Instance};

/// Probabilities below this are treated as "the panel is not part of the
/// leximin support".
const PROBABLE_PANEL_THRESHOLD: f64 = 1e-11;

/// Probability floor applied before the geometric mean of the LEGACY
/// benchmark, so a single never-selected agent does not zero it out.
const GEOMETRIC_MEAN_CAP: f64 = 1.0 / 10_000.0;

/// Per-agent selection probabilities.
pub type ProbAllocation = BTreeMap<AgentId, f64>;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Selection(#[from] crate::gen::Error),
    #[error(transparent)]
    Cache(#[from] cache::Error),
    #[error("Error while writing analysis output")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Accumulated probability (or count) of unordered agent pairs sitting
/// on the same panel. Keys are canonicalized to `(min(i,j), max(i,j))`;
/// lookups and insertions accept either order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PairHistogramRepr", into = "PairHistogramRepr")]
pub struct PairHistogram {
    agent_count: usize,
    pairs: BTreeMap<(AgentId, AgentId), f64>,
}

impl PairHistogram {
    /// A histogram over all pairs of `agent_count` agents, initialized
    /// to zero.
    pub fn new(agent_count: usize) -> Self {
        let pairs = (0..agent_count)
            .flat_map(|i| ((i + 1)..agent_count).map(move |j| ((i, j), 0.0)))
            .collect();
        PairHistogram { agent_count, pairs }
    }

    /// The histogram of the uniform distribution over pairs.
    pub fn uniform(agent_count: usize) -> Self {
        let mut histogram = Self::new(agent_count);
        let uni_prob = 1.0 / histogram.pairs.len() as f64;
        for value in histogram.pairs.values_mut() {
            *value = uni_prob;
        }
        histogram
    }

    pub fn agent_count(&self) -> usize {
        self.agent_count
    }

    fn key(i: AgentId, j: AgentId) -> (AgentId, AgentId) {
        (i.min(j), i.max(j))
    }

    pub fn get(&self, i: AgentId, j: AgentId) -> f64 {
        self.pairs[&Self::key(i, j)]
    }

    pub fn add(&mut self, i: AgentId, j: AgentId, weight: f64) {
        *self
            .pairs
            .get_mut(&Self::key(i, j))
            .expect("both agents are pool members") += weight;
    }

    /// Accumulates every pair of every panel of a portfolio, weighted by
    /// the panel's probability.
    pub fn add_portfolio<'a, I>(&mut self, portfolio: I)
    where
        I: IntoIterator<Item = (&'a Panel, f64)>,
    {
        for (panel, prob) in portfolio {
            for (&i, &j) in panel.iter().tuple_combinations() {
                self.add(i, j, prob);
            }
        }
    }

    /// Turns accumulated counts into probabilities by dividing every
    /// entry.
    pub fn divide_by(&mut self, num: f64) {
        for value in self.pairs.values_mut() {
            *value /= num;
        }
    }

    /// All pair probabilities, in canonical key order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.pairs.values().copied()
    }
}

#[derive(Serialize, Deserialize)]
struct PairHistogramRepr {
    agent_count: usize,
    entries: Vec<(AgentId, AgentId, f64)>,
}

impl From<PairHistogramRepr> for PairHistogram {
    fn from(repr: PairHistogramRepr) -> Self {
        let mut histogram = PairHistogram::new(repr.agent_count);
        for (i, j, value) in repr.entries {
            *histogram
                .pairs
                .get_mut(&PairHistogram::key(i, j))
                .expect("serialized entries refer to pool members") = value;
        }
        histogram
    }
}

impl From<PairHistogram> for PairHistogramRepr {
    fn from(histogram: PairHistogram) -> Self {
        PairHistogramRepr {
            agent_count: histogram.agent_count,
            entries: histogram
                .pairs
                .into_iter()
                .map(|((i, j), value)| (i, j, value))
                .collect(),
        }
    }
}

/// Everything one algorithm run produces: the marginal probabilities,
/// the distinct panels seen (or carrying probability), and the pair
/// histogram. This is also the payload of the result cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmRun {
    pub allocation: ProbAllocation,
    pub panels: BTreeSet<Panel>,
    pub pairs: PairHistogram,
}

/// Estimates the LEGACY probability allocation by drawing `iterations`
/// panels in a row with the given seed.
pub fn legacy_probabilities(
    instance: &Instance,
    iterations: usize,
    random_seed: u64,
) -> Result<AlgorithmRun> {
    let sampler = Sampler::new(instance);
    let mut rng = StdRng::seed_from_u64(random_seed);

    let mut found_panels: BTreeSet<Panel> = BTreeSet::new();
    let mut pairs = PairHistogram::new(instance.pool_size());
    let mut appearances = vec![0usize; instance.pool_size()];

    let progress = ProgressBar::new(iterations as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise:.dim}] Sampling panels... [{bar:25.green}] {pos}/{len} {eta:.dim}",
        )
        .expect("valid progress template")
        .progress_chars("=> "),
    );

    for _ in 0..iterations {
        let panel = sampler.draw_until(&mut rng, DEFAULT_MAX_ATTEMPTS)?;
        pairs.add_portfolio([(&panel, 1.0)]);
        for &id in &panel {
            appearances[id] += 1;
        }
        found_panels.insert(panel);
        progress.inc(1);
    }
    progress.finish_and_clear();

    pairs.divide_by(iterations as f64);
    let allocation = appearances
        .into_iter()
        .enumerate()
        .map(|(id, count)| (id, count as f64 / iterations as f64))
        .collect();

    Ok(AlgorithmRun {
        allocation,
        panels: found_panels,
        pairs,
    })
}

fn run_from_distribution(
    instance: &Instance,
    distribution: &PanelDistribution,
    support_only: bool,
) -> AlgorithmRun {
    let allocation = distribution.marginals(instance.pool_size());

    let mut pairs = PairHistogram::new(instance.pool_size());
    pairs.add_portfolio(
        distribution
            .panels
            .iter()
            .zip(distribution.probabilities.iter().copied()),
    );

    let panels = distribution
        .panels
        .iter()
        .zip(distribution.probabilities.iter())
        .filter(|(_panel, &prob)| !support_only || prob > PROBABLE_PANEL_THRESHOLD)
        .map(|(panel, _prob)| panel.clone())
        .collect();

    AlgorithmRun {
        allocation,
        panels,
        pairs,
    }
}

/// Computes the exact LEXIMIN probability allocation.
pub fn leximin_probabilities(instance: &Instance, options: &LeximinOptions) -> Result<AlgorithmRun> {
    let distribution = find_distribution_leximin(instance, options)?;
    Ok(run_from_distribution(instance, &distribution, true))
}

/// Computes the exact XMIN probability allocation.
pub fn xmin_probabilities(
    instance: &Instance,
    options: &LeximinOptions,
    random_seed: u64,
) -> Result<AlgorithmRun> {
    let mut rng = StdRng::seed_from_u64(random_seed);
    let distribution = find_distribution_xmin(instance, options, &mut rng)?;
    Ok(run_from_distribution(instance, &distribution, false))
}

/// Three measures of inequality of a probability allocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocationStats {
    pub gini: f64,
    pub geometric_mean: f64,
    pub min: f64,
}

/// Computes the Gini coefficient, geometric mean and minimum of an
/// allocation.
///
/// With `cap_for_geometric_mean`, probabilities below 1/10 000 are
/// raised to 1/10 000 before the geometric mean, preventing it from
/// collapsing to zero; only the LEGACY benchmark is given this
/// advantage.
pub fn allocation_stats(alloc: &ProbAllocation, cap_for_geometric_mean: bool) -> AllocationStats {
    let n = alloc.len();
    let k = alloc.values().sum::<f64>().round();

    let mut sorted_probs: Vec<f64> = alloc.values().copied().collect();
    sorted_probs.sort_by(|a, b| a.partial_cmp(b).expect("probabilities are finite"));

    // Formulation for the Gini coefficient adapted from:
    // Damgaard, C., & Weiner, J. (2000). Describing inequality in plant
    // size or fecundity. Ecology, 81(4), 1139-1142.
    let gini = sorted_probs
        .iter()
        .enumerate()
        .map(|(i, prob)| (2.0 * i as f64 - n as f64 + 1.0) * prob)
        .sum::<f64>()
        / (n as f64 * k);

    let geometric_mean = geometric_mean(sorted_probs.iter().map(|&prob| {
        if cap_for_geometric_mean {
            prob.max(GEOMETRIC_MEAN_CAP)
        } else {
            prob
        }
    }));

    let min = sorted_probs.first().copied().unwrap_or(0.0);

    AllocationStats {
        gini,
        geometric_mean,
        min,
    }
}

fn geometric_mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let mut log_sum = 0.0;
    let mut count = 0usize;
    for value in values {
        log_sum += value.ln();
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    (log_sum / count as f64).exp()
}

/// The 99th percentile of a Jeffreys prior for a binomial proportion,
/// updated with the observed sample. Used as an upper confidence bound
/// on LEGACY's true minimum selection probability.
pub fn upper_confidence_bound(num_trials: usize, sample_proportion: f64) -> f64 {
    let num_successes = (sample_proportion * num_trials as f64).round() as usize;
    if num_successes == num_trials {
        1.0
    } else {
        let num_failures = num_trials - num_successes;
        let posterior = Beta::new(0.5 + num_successes as f64, 0.5 + num_failures as f64)
            .expect("shape parameters are positive");
        posterior.inverse_cdf(0.99)
    }
}

/// Knobs of [`analyze_instance`].
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Panels per LEGACY sample.
    pub iterations: usize,
    pub leximin: LeximinOptions,
    /// Skip the three timed LEXIMIN runs at the end of the report.
    pub skip_timing: bool,
    /// Where cached distributions live.
    pub distributions_dir: PathBuf,
    /// Where the statistics report is written.
    pub analysis_dir: PathBuf,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            iterations: 10_000,
            leximin: LeximinOptions::default(),
            skip_timing: false,
            distributions_dir: PathBuf::from("distributions"),
            analysis_dir: PathBuf::from("analysis"),
        }
    }
}

/// Runs LEGACY (or retrieves the cached sample). With `resample`, a
/// second sample is taken with a different random seed.
pub fn run_legacy_or_retrieve(
    instance_name: &str,
    instance: &Instance,
    resample: bool,
    options: &AnalysisOptions,
) -> Result<AlgorithmRun> {
    let (tag, random_seed) = if resample {
        ("legacy_second", 1)
    } else {
        ("legacy_first", 0)
    };
    let key = cache::Key::new(instance_name, instance.panel_size(), tag);
    if let Some(run) = cache::load(&options.distributions_dir, &key)? {
        return Ok(run);
    }
    let run = legacy_probabilities(instance, options.iterations, random_seed)?;
    cache::store(&options.distributions_dir, &key, &run)?;
    Ok(run)
}

/// Runs LEXIMIN or retrieves the cached result.
pub fn run_leximin_or_retrieve(
    instance_name: &str,
    instance: &Instance,
    options: &AnalysisOptions,
) -> Result<AlgorithmRun> {
    let key = cache::Key::new(instance_name, instance.panel_size(), "leximin");
    if let Some(run) = cache::load(&options.distributions_dir, &key)? {
        return Ok(run);
    }
    let run = leximin_probabilities(instance, &options.leximin)?;
    cache::store(&options.distributions_dir, &key, &run)?;
    Ok(run)
}

/// Runs XMIN or retrieves the cached result.
pub fn run_xmin_or_retrieve(
    instance_name: &str,
    instance: &Instance,
    options: &AnalysisOptions,
) -> Result<AlgorithmRun> {
    let key = cache::Key::new(instance_name, instance.panel_size(), "xmin");
    if let Some(run) = cache::load(&options.distributions_dir, &key)? {
        return Ok(run);
    }
    let run = xmin_probabilities(instance, &options.leximin, 0)?;
    cache::store(&options.distributions_dir, &key, &run)?;
    Ok(run)
}

/// Full analysis of the three algorithms on one instance. The report is
/// echoed to stdout, written to
/// `<analysis_dir>/<instance>_<k>_statistics.txt` and returned.
pub fn analyze_instance(
    instance_name: &str,
    instance: &Instance,
    options: &AnalysisOptions,
) -> Result<Vec<String>> {
    let legacy_first = run_legacy_or_retrieve(instance_name, instance, false, options)?;
    let legacy_second = run_legacy_or_retrieve(instance_name, instance, true, options)?;
    let leximin = run_leximin_or_retrieve(instance_name, instance, options)?;
    let xmin = run_xmin_or_retrieve(instance_name, instance, options)?;

    let k = instance.panel_size();
    let n = instance.pool_size();

    let legacy_stats = allocation_stats(&legacy_first.allocation, true);
    let leximin_stats = allocation_stats(&leximin.allocation, false);
    let xmin_stats = allocation_stats(&xmin.allocation, false);

    let mut lines: Vec<String> = Vec::new();
    let mut log = |msg: String| {
        println!("{}", msg);
        lines.push(msg);
    };

    let separator = "*".repeat(80);

    log(format!("instance: {}", instance_name));
    log(format!("pool size n: {}", n));
    log(format!("panel size k: {}", k));
    log(format!("# quota categories: {}", instance.categories().len()));
    log(format!(
        "mean selection probability k/n: {:.1}%",
        100.0 * k as f64 / n as f64
    ));
    log(separator.clone());

    // the least frequently selected agent of the first sample, evaluated
    // on the second, independent sample
    let legacy_first_minimizer = instance_minimizer(&legacy_first.allocation);
    let first_minimizer_second_prob = legacy_second.allocation[&legacy_first_minimizer];
    log(format!(
        "LEGACY minimum probability: <= {:.2}% (99% upper confidence bound based on Jeffreys \
         interval for a binomial parameter, calculated from sample proportion {:.4} and sample \
         size {})",
        100.0 * upper_confidence_bound(options.iterations, first_minimizer_second_prob),
        first_minimizer_second_prob,
        options.iterations
    ));
    log(format!(
        "LEXIMIN minimum probability (exact): {:.1}%",
        100.0 * leximin_stats.min
    ));
    log(format!(
        "XMIN minimum probability (exact): {:.1}%",
        100.0 * xmin_stats.min
    ));
    log(separator.clone());

    log(format!(
        "LEGACY number of unique panels seen: {}",
        legacy_second.panels.len()
    ));
    log(format!(
        "LEXIMIN number of unique panels possible: {}",
        leximin.panels.len()
    ));
    log(format!(
        "XMIN number of unique panels possible: {}",
        xmin.panels.len()
    ));
    log(separator.clone());

    log(format!(
        "gini coefficient of LEGACY: {:.1}%",
        100.0 * legacy_stats.gini
    ));
    log(format!(
        "gini coefficient of LEXIMIN: {:.1}%",
        100.0 * leximin_stats.gini
    ));
    log(format!(
        "gini coefficient of XMIN: {:.1}%",
        100.0 * xmin_stats.gini
    ));
    log(separator.clone());

    log(format!(
        "geometric mean of LEGACY: {:.1}%",
        100.0 * legacy_stats.geometric_mean
    ));
    log(format!(
        "geometric mean of LEXIMIN: {:.1}%",
        100.0 * leximin_stats.geometric_mean
    ));
    log(format!(
        "geometric mean of XMIN: {:.1}%",
        100.0 * xmin_stats.geometric_mean
    ));
    log(separator.clone());

    let share_below_leximin_min = legacy_first
        .allocation
        .values()
        .filter(|&&prob| prob < leximin_stats.min)
        .count() as f64
        / n as f64;
    log(format!(
        "share selected by LEGACY with probability below LEXIMIN minimum selection probability: \
         {:.1}%",
        100.0 * share_below_leximin_min
    ));

    if options.skip_timing {
        log(String::from("Skip timing."));
    } else {
        let mut timings: Vec<f64> = Vec::new();
        for i in 0..3 {
            let start = std::time::Instant::now();
            leximin_probabilities(instance, &options.leximin)?;
            let elapsed = start.elapsed().as_secs_f64();
            timings.push(elapsed);
            println!("Run {}/3 of LEXIMIN took {:.1} seconds.", i + 1, elapsed);
        }
        timings.sort_by(|a, b| a.partial_cmp(b).expect("timings are finite"));
        log(format!(
            "Out of 3 runs, LEXIMIN took a median running time of {:.1} seconds.",
            timings[1]
        ));
    }

    std::fs::create_dir_all(&options.analysis_dir)?;
    let report_path = report_path(&options.analysis_dir, instance_name, k);
    let mut report = std::fs::File::create(report_path)?;
    for line in &lines {
        writeln!(report, "{}", line)?;
    }

    Ok(lines)
}

/// Path of the statistics report of an instance.
pub fn report_path(analysis_dir: &Path, instance_name: &str, k: usize) -> PathBuf {
    analysis_dir.join(format!("{}_{}_statistics.txt", instance_name, k))
}

fn instance_minimizer(alloc: &ProbAllocation) -> AgentId {
    alloc
        .iter()
        .min_by(|(_i, a), (_j, b)| a.partial_cmp(b).expect("probabilities are finite"))
        .map(|(&id, _prob)| id)
        .expect("the pool is not empty")
}
