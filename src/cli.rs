//! Command-line front: instance discovery, argument handling and
//! dispatch to the analysis.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use crate::analysis::{self, allocation_stats, AlgorithmRun, AnalysisOptions};
use crate::frontend::csv;
use crate::gen::leximin::LeximinOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    Legacy,
    Leximin,
    Xmin,
}

/// Analyze a given instance, comparing the LEGACY, LEXIMIN and XMIN
/// panel selection algorithms. Produced information is logged to
/// `<analysis-dir>/<instance>_<k>_statistics.txt`.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Args {
    /// Name of the instance (its files live in <data-dir>/<name>_<k>)
    pub instance_name: String,
    /// Panel size
    pub panel_size: usize,
    /// Directory containing the instance subdirectories
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,
    /// Directory holding cached algorithm results
    #[arg(long, default_value = "distributions")]
    pub distributions_dir: PathBuf,
    /// Directory the statistics report is written to
    #[arg(long, default_value = "analysis")]
    pub analysis_dir: PathBuf,
    /// Number of panels per LEGACY sample
    #[arg(long, default_value_t = 10_000)]
    pub iterations: usize,
    /// Rounds of the multiplicative-weights phase (default: twice the
    /// pool size)
    #[arg(long)]
    pub mw_rounds: Option<usize>,
    /// Comma-separated respondent columns identifying a household;
    /// enables the at-most-one-per-household rule
    #[arg(long, value_delimiter = ',')]
    pub address_columns: Vec<String>,
    /// Run a single algorithm and print its allocation instead of the
    /// full analysis
    #[arg(long, value_enum)]
    pub algorithm: Option<Algorithm>,
    /// Do not time three LEXIMIN runs at the end of the analysis
    #[arg(long)]
    pub skiptiming: bool,
}

struct Discovery {
    valid_inputs: Vec<(String, usize)>,
    errors: Vec<(String, String)>,
}

impl Discovery {
    fn epilog(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.valid_inputs.is_empty() {
            lines.push(String::from(
                "Based on the subdirectories of the data directory, no instances were found.",
            ));
        } else {
            lines.push(String::from(
                "Valid input combinations of instance_name and panel_size (based on the \
                 subdirectories of the data directory):",
            ));
            for (name, k) in &self.valid_inputs {
                lines.push(format!("    {:<15}{}", format!("{}, ", name), k));
            }
        }
        if !self.errors.is_empty() {
            lines.push(String::from(
                "There were additional subdirectories, but some problem prevents them from being \
                 used:",
            ));
            for (name, error) in &self.errors {
                lines.push(format!("    {:<15}{}", format!("{}: ", name), error));
            }
        }
        lines
    }
}

/// Scans the data directory for `<name>_<k>` instance subdirectories
/// containing both CSV files.
fn discover_instances(data_dir: &Path) -> Result<Discovery> {
    let mut valid_inputs = Vec::new();
    let mut errors = Vec::new();

    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(data_dir)
        .with_context(|| format!("cannot read data directory {}", data_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();

    for subdir in subdirs {
        let dir_name = match subdir.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_string(),
            None => continue,
        };
        let parsed = dir_name
            .rsplit_once('_')
            .and_then(|(data_name, k_string)| {
                k_string
                    .parse::<usize>()
                    .ok()
                    .map(|k| (data_name.to_string(), k))
            });
        let Some((data_name, k)) = parsed else {
            errors.push((
                dir_name,
                String::from("directory name does not end in underscore followed by a panel size"),
            ));
            continue;
        };
        if !subdir.join(csv::CATEGORIES_FILE).exists() {
            errors.push((
                dir_name,
                format!("directory does not contain file '{}'", csv::CATEGORIES_FILE),
            ));
            continue;
        }
        if !subdir.join(csv::RESPONDENTS_FILE).exists() {
            errors.push((
                dir_name,
                format!("directory does not contain file '{}'", csv::RESPONDENTS_FILE),
            ));
            continue;
        }
        valid_inputs.push((data_name, k));
    }

    Ok(Discovery {
        valid_inputs,
        errors,
    })
}

/// Surfaces quota-infeasibility diagnoses with their recommendations
/// before converting the error for the caller.
fn into_anyhow(err: analysis::Error) -> anyhow::Error {
    if let analysis::Error::Selection(crate::gen::Error::InfeasibleQuotas(relaxation)) = &err {
        eprintln!("The quotas admit no feasible panel. Recommended relaxation:");
        for note in &relaxation.notes {
            eprintln!("  {}", note);
        }
    }
    anyhow::Error::new(err)
}

fn print_run(algorithm: Algorithm, run: &AlgorithmRun) {
    let stats = allocation_stats(&run.allocation, algorithm == Algorithm::Legacy);
    println!("{} unique panels", run.panels.len());
    for (id, prob) in &run.allocation {
        println!("agent {:>4}: {:.4}", id, prob);
    }
    println!(
        "minimum {:.4}, gini coefficient {:.4}, geometric mean {:.4}",
        stats.min, stats.gini, stats.geometric_mean
    );
}

pub fn run_cli(args: Args) -> Result<()> {
    let discovery = discover_instances(&args.data_dir)?;
    let input = (args.instance_name.clone(), args.panel_size);
    if !discovery.valid_inputs.contains(&input) {
        eprintln!("Input does not specify a valid combination of instance name and panel size.");
        for line in discovery.epilog() {
            eprintln!("{}", line);
        }
        bail!(
            "no instance {} with panel size {} under {}",
            args.instance_name,
            args.panel_size,
            args.data_dir.display()
        );
    }

    let instance_dir = args
        .data_dir
        .join(format!("{}_{}", args.instance_name, args.panel_size));
    let instance = csv::load_instance(&instance_dir, args.panel_size, &args.address_columns)
        .with_context(|| format!("cannot load instance from {}", instance_dir.display()))?;

    let options = AnalysisOptions {
        iterations: args.iterations,
        leximin: LeximinOptions {
            multiplicative_weights_rounds: args.mw_rounds,
        },
        skip_timing: args.skiptiming,
        distributions_dir: args.distributions_dir.clone(),
        analysis_dir: args.analysis_dir.clone(),
    };

    match args.algorithm {
        None => {
            analysis::analyze_instance(&args.instance_name, &instance, &options)
                .map_err(into_anyhow)?;
        }
        Some(algorithm) => {
            let run = match algorithm {
                Algorithm::Legacy => {
                    analysis::run_legacy_or_retrieve(&args.instance_name, &instance, false, &options)
                }
                Algorithm::Leximin => {
                    analysis::run_leximin_or_retrieve(&args.instance_name, &instance, &options)
                }
                Algorithm::Xmin => {
                    analysis::run_xmin_or_retrieve(&args.instance_name, &instance, &options)
                }
            }
            .map_err(into_anyhow)?;
            print_run(algorithm, &run);
        }
    }

    Ok(())
}
