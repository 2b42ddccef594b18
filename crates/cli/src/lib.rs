// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI for benchviz.
//!
//! This crate provides the `benchviz` command: running benchmark suites on
//! remote instances, regenerating reports from earlier runs, and listing
//! the instances and suites a run would use.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

use anyhow::{bail, Context, Result};
use benchviz_adapters::{
    parse_selection, AwsCliProvider, BenchmarkCatalog, Instance, InstanceProvider, Orchestrator,
    RunnerConfig, SshRunner, StaticProvider,
};
use benchviz_core::AggregatedReport;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// benchviz CLI.
#[derive(Parser, Debug)]
#[command(name = "benchviz")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (TOML).
    #[arg(short, long, global = true, env = "BENCHVIZ_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Where instances come from.
#[derive(Args, Debug, Clone, Default)]
pub struct InstanceSource {
    /// TOML inventory of instances. Without it, running EC2 instances are
    /// listed through the `aws` CLI.
    #[arg(long)]
    pub inventory: Option<PathBuf>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run benchmark suites on instances and write an HTML report.
    ///
    /// Results land in `<results-dir>/<YYYYmmdd_HHMMSS>/`:
    /// - <instance>/<instance>__system_info.txt - host description
    /// - <instance>/<benchmark>/<instance>__<file> - downloaded output
    /// - report.html - rendered report
    /// - report.json - aggregated metrics
    Run {
        /// Instance source.
        #[command(flatten)]
        source: InstanceSource,

        /// Instances to use: `all` or comma-separated 1-based indices.
        #[arg(short, long, default_value = "all")]
        instances: String,

        /// Suites to run: `all`, comma-separated 1-based indices, or empty
        /// for the configured default suite.
        #[arg(short, long, default_value = "")]
        benchmarks: String,

        /// Local benchmark checkout to list suites from. Without it the
        /// repository is cloned into a temporary directory.
        #[arg(long)]
        benchmarks_root: Option<PathBuf>,

        /// Results directory override.
        #[arg(short, long)]
        results_dir: Option<PathBuf>,
    },

    /// Regenerate report.html from an existing run directory.
    Reprocess {
        /// Run directory, e.g. results/20250101_120000.
        dir: PathBuf,
    },

    /// List the instances a run would use.
    Instances {
        /// Instance source.
        #[command(flatten)]
        source: InstanceSource,
    },

    /// List the benchmark suites.
    Benchmarks {
        /// Local benchmark checkout. Without it the repository is cloned.
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn provider_for(source: &InstanceSource, config: &RunnerConfig) -> Result<Arc<dyn InstanceProvider>> {
    let provider: Arc<dyn InstanceProvider> = match &source.inventory {
        Some(path) => Arc::new(
            StaticProvider::from_file(path)
                .with_context(|| format!("loading inventory {}", path.display()))?,
        ),
        None => Arc::new(AwsCliProvider::new(
            config.cloud.profile.clone(),
            config.cloud.region.clone(),
        )),
    };
    Ok(provider)
}

fn orchestrator(config: RunnerConfig, provider: Arc<dyn InstanceProvider>) -> Orchestrator {
    let runner = Arc::new(SshRunner::new(config.ssh.clone()));
    Orchestrator::new(config, runner, provider)
}

/// Pick entries of `items` by a selection string; see [`parse_selection`].
pub fn select<T: Clone>(items: &[T], selection: &str, default_index: usize) -> Vec<T> {
    parse_selection(selection, items.len(), default_index)
        .into_iter()
        .map(|index| items[index].clone())
        .collect()
}

fn print_instances(instances: &[Instance]) {
    for (i, instance) in instances.iter().enumerate() {
        let details = [instance.instance_type.as_deref(), instance.instance_id.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(", ");
        if details.is_empty() {
            println!("{:>3}. {} ({})", i + 1, instance.name.bold(), instance.destination());
        } else {
            println!(
                "{:>3}. {} ({}) [{}]",
                i + 1,
                instance.name.bold(),
                instance.destination(),
                details
            );
        }
    }
}

fn print_catalog(catalog: &BenchmarkCatalog, default_dir: &str) {
    for (i, benchmark) in catalog.benchmarks().iter().enumerate() {
        let marker = if benchmark.dir == default_dir { " (default)" } else { "" };
        println!("{:>3}. {} - {}{}", i + 1, benchmark.dir, benchmark.name, marker.dimmed());
    }
}

fn print_summary(report: &AggregatedReport, report_path: &Path) {
    println!();
    for instance in report.instance_names() {
        let failed = report.failures.iter().filter(|f| f.instance == instance).count();
        if failed == 0 {
            println!("{} {}", "✓".green(), instance);
        } else {
            println!("{} {} ({} failed)", "✗".red(), instance, failed);
        }
    }
    for failure in &report.failures {
        println!(
            "  {} {}/{}: {}",
            "-".red(),
            failure.instance,
            failure.benchmark,
            failure.message
        );
    }
    println!("\nReport written to {}", report_path.display().to_string().bold());
}

async fn execute(cli: Cli) -> Result<()> {
    let mut config =
        RunnerConfig::load(cli.config.as_deref()).context("loading configuration")?;
    debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Run {
            source,
            instances,
            benchmarks,
            benchmarks_root,
            results_dir,
        } => {
            if let Some(dir) = results_dir {
                config.results_dir = dir;
            }
            let default_dir = config.benchmark.default_benchmark.clone();
            let provider = provider_for(&source, &config)?;
            let orchestrator = orchestrator(config, provider);

            let available = orchestrator.list_instances().await?;
            let targets = select(&available, &instances, 0);
            if targets.is_empty() {
                bail!("no instances selected from {} available", available.len());
            }

            let catalog = orchestrator.catalog(benchmarks_root.as_deref()).await?;
            let default_index = catalog.position(&default_dir).unwrap_or(0);
            let suites = select(catalog.benchmarks(), &benchmarks, default_index);
            if suites.is_empty() {
                bail!("no benchmarks selected from {} available", catalog.len());
            }

            info!(
                instances = targets.len(),
                benchmarks = suites.len(),
                "running benchmarks"
            );
            let summary = orchestrator.run(&targets, &suites).await?;
            print_summary(&summary.report, &summary.report_path);
            Ok(())
        }
        Commands::Reprocess { dir } => {
            let path = benchviz_benchmarks::reprocess(&dir)
                .with_context(|| format!("reprocessing {}", dir.display()))?;
            println!("Report written to {}", path.display().to_string().bold());
            Ok(())
        }
        Commands::Instances { source } => {
            let provider = provider_for(&source, &config)?;
            let instances = provider.list_instances().await?;
            if instances.is_empty() {
                println!("No instances found");
            } else {
                print_instances(&instances);
            }
            Ok(())
        }
        Commands::Benchmarks { root } => {
            let default_dir = config.benchmark.default_benchmark.clone();
            let provider: Arc<dyn InstanceProvider> = Arc::new(StaticProvider::default());
            let catalog = orchestrator(config, provider).catalog(root.as_deref()).await?;
            if catalog.is_empty() {
                println!("No benchmark suites found");
            } else {
                print_catalog(&catalog, &default_dir);
            }
            Ok(())
        }
    }
}

/// Run the CLI with the process arguments.
///
/// # Returns
///
/// Returns `Ok(())` on success, or an error if the command fails.
pub fn run() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(execute(cli))
}
