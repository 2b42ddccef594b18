// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Run orchestration.
//!
//! A run prepares every instance in parallel, then executes each
//! (instance, benchmark) pair with at most `max_concurrency` pairs in
//! flight. The report is then built from the run directory exactly as
//! `benchviz reprocess` builds it. A failing pair becomes a
//! [`RunFailure`](benchviz_core::RunFailure) in the report; it never
//! cancels the others.

use crate::config::{BenchmarkSettings, RunnerConfig};
use crate::console::InstanceConsole;
use crate::provider::{Instance, InstanceProvider, ProviderError};
use crate::session::Session;
use crate::ssh::{shell_quote, CommandRunner, RemoteError};
use crate::suite::{Benchmark, BenchmarkCatalog, BenchmarkSuite, SuiteError};
use benchviz_benchmarks::io::{
    benchmark_dir, create_run_dir, instance_dir, write_report, write_system_info, ResultsIoError,
    RUN_DIR_FORMAT,
};
use benchviz_benchmarks::{aggregate_files, scan_results_dir, ReportOptions};
use benchviz_core::{AggregatedReport, SystemInfo};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Instance discovery failed
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Benchmark suites could not be listed
    #[error("Suite error: {0}")]
    Suite(#[from] SuiteError),

    /// The run directory or report could not be written
    #[error("Results error: {0}")]
    Results(#[from] ResultsIoError),

    /// The benchmark repository could not be cloned locally
    #[error("Failed to clone {repo}: {reason}")]
    Clone { repo: String, reason: String },

    /// Local temporary storage failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Nothing to run
    #[error("No instances selected")]
    NoInstances,

    /// Nothing to run
    #[error("No benchmarks selected")]
    NoBenchmarks,
}

/// Result type for orchestration.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Why an instance could not be prepared.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("SSH connection failed: {0}")]
    Unreachable(RemoteError),

    #[error("Failed to create temporary directory: {0}")]
    Workspace(RemoteError),

    #[error("Failed to clone repository: {0}")]
    Clone(RemoteError),
}

/// Outcome of a finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_dir: PathBuf,
    pub report_path: PathBuf,
    pub report: AggregatedReport,
}

/// An instance that is ready to run suites.
#[derive(Debug, Clone)]
pub struct PreparedInstance {
    pub instance: Instance,
    /// Remote directory holding the repository checkout.
    pub checkout: String,
    pub system_info: SystemInfo,
}

#[derive(Debug)]
struct TaskOutcome {
    instance: String,
    benchmark: String,
    failure: Option<String>,
}

/// Normalise `uname -m` output.
pub fn normalize_architecture(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains("aarch64") || raw.contains("arm64") {
        "ARM64".to_string()
    } else if raw.contains("x86_64") {
        "x86_64".to_string()
    } else {
        raw.to_string()
    }
}

/// Gather architecture, CPU model and core count. Commands that fail
/// leave their field unset.
pub fn collect_system_info(runner: &dyn CommandRunner, instance: &Instance) -> SystemInfo {
    let mut info = SystemInfo::default();
    let stdout = |command: &str| match runner.run(instance, command) {
        Ok(output) if output.success() && !output.stdout.trim().is_empty() => Some(output.stdout),
        Ok(_) => None,
        Err(e) => {
            debug!(instance = %instance.name, command, error = %e, "system info probe failed");
            None
        }
    };

    if let Some(arch) = stdout("uname -m") {
        info.architecture = Some(normalize_architecture(&arch));
    }
    if let Some(model) = stdout("grep -m1 'model name' /proc/cpuinfo || lscpu | grep 'Model name'") {
        info.cpu_model = model
            .lines()
            .find_map(|line| line.split_once(':'))
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty());
    }
    if let Some(cores) = stdout("nproc") {
        info.cpu_cores = cores.trim().parse().ok();
    }
    info
}

/// Remote working directory name for a run started at `started`.
pub fn workspace_name(started: DateTime<Utc>) -> String {
    format!("bench_{}_{}", started.format(RUN_DIR_FORMAT), std::process::id())
}

/// Probe, install packages, create `workspace` and clone the benchmark
/// repository into it. A failed package install is only logged.
pub fn prepare_instance(
    runner: &dyn CommandRunner,
    instance: &Instance,
    settings: &BenchmarkSettings,
    workspace: &str,
    session: &Session,
) -> std::result::Result<PreparedInstance, PrepareError> {
    let console = InstanceConsole::new(&instance.name);

    console.info(&format!("Connecting to {}...", instance.address));
    runner
        .run(instance, "echo 'SSH connection successful'")
        .and_then(|output| output.check(instance))
        .map_err(PrepareError::Unreachable)?;

    console.info("Collecting system information...");
    let system_info = collect_system_info(runner, instance);

    console.info("Installing required packages...");
    match runner.run(
        instance,
        "sudo apt-get update -y && sudo apt-get install git build-essential -y",
    ) {
        Ok(output) if output.success() => {}
        Ok(output) => {
            warn!(instance = %instance.name, exit_code = output.exit_code, "package installation failed");
            console.error(&format!(
                "Package installation failed with exit code {}",
                output.exit_code
            ));
        }
        Err(e) => {
            warn!(instance = %instance.name, error = %e, "package installation failed");
            console.error(&format!("Package installation failed: {}", e));
        }
    }

    console.info(&format!("Creating temporary directory {}...", workspace));
    runner
        .run(instance, &format!("mkdir -p {}", shell_quote(workspace)))
        .and_then(|output| output.check(instance))
        .map_err(PrepareError::Workspace)?;
    session.track_remote_dir(instance, workspace);

    console.info("Cloning repository...");
    runner
        .run(
            instance,
            &format!(
                "cd {} && git clone {}",
                shell_quote(workspace),
                shell_quote(&settings.repo_url)
            ),
        )
        .and_then(|output| output.check(instance))
        .map_err(PrepareError::Clone)?;

    Ok(PreparedInstance {
        instance: instance.clone(),
        checkout: format!("{}/{}", workspace, settings.checkout_dir()),
        system_info,
    })
}

fn execute_benchmark(
    runner: &dyn CommandRunner,
    prepared: &PreparedInstance,
    benchmark: &Benchmark,
    run_dir: &Path,
) -> TaskOutcome {
    let instance = &prepared.instance;
    let mut outcome = TaskOutcome {
        instance: instance.name.clone(),
        benchmark: benchmark.dir.clone(),
        failure: None,
    };

    let console = InstanceConsole::new(&instance.name);
    console.info(&format!("Running {}...", benchmark.dir));

    let result = benchmark_dir(run_dir, &instance.name, &benchmark.dir)
        .map_err(SuiteError::from)
        .and_then(|out_dir| {
            let remote_dir = format!("{}/{}", prepared.checkout, benchmark.dir);
            BenchmarkSuite::new(benchmark.kind()).run(runner, instance, &remote_dir, &out_dir)
        });

    let run = match result {
        Ok(run) => run,
        Err(e) => {
            error!(instance = %instance.name, benchmark = %benchmark.dir, error = %e, "benchmark failed");
            console.error(&format!("Error running {}: {}", benchmark.dir, e));
            outcome.failure = Some(e.to_string());
            return outcome;
        }
    };

    if run.exit_code != 0 {
        outcome.failure = Some(format!(
            "{} exited with code {}",
            run.script, run.exit_code
        ));
    }

    if aggregate_files(&run.files(), &benchmark.kind()).is_none() {
        outcome
            .failure
            .get_or_insert_with(|| "no usable output".to_string());
    }
    outcome
}

/// Drives benchmark runs across instances.
pub struct Orchestrator {
    config: RunnerConfig,
    runner: Arc<dyn CommandRunner>,
    provider: Arc<dyn InstanceProvider>,
}

impl Orchestrator {
    /// A `max_concurrency` of 0 is raised to 1.
    pub fn new(
        mut config: RunnerConfig,
        runner: Arc<dyn CommandRunner>,
        provider: Arc<dyn InstanceProvider>,
    ) -> Self {
        if config.max_concurrency == 0 {
            warn!("max_concurrency is 0, running one benchmark at a time");
            config.max_concurrency = 1;
        }
        Self {
            config,
            runner,
            provider,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub async fn list_instances(&self) -> Result<Vec<Instance>> {
        Ok(self.provider.list_instances().await?)
    }

    /// Suites of `root`, or of a fresh shallow clone of the configured
    /// repository when `root` is `None`.
    pub async fn catalog(&self, root: Option<&Path>) -> Result<BenchmarkCatalog> {
        if let Some(root) = root {
            return Ok(BenchmarkCatalog::discover(root)?);
        }

        let session = Session::new();
        let result = self.clone_catalog(&session).await;
        session.close(Arc::clone(&self.runner)).await;
        result
    }

    async fn clone_catalog(&self, session: &Session) -> Result<BenchmarkCatalog> {
        let repo = &self.config.benchmark.repo_url;
        let checkout = session
            .local_temp_dir()?
            .join(self.config.benchmark.checkout_dir());

        info!(repo = %repo, "cloning benchmark repository");
        let output = tokio::process::Command::new("git")
            .args(["clone", "--depth", "1", "--quiet"])
            .arg(repo)
            .arg(&checkout)
            .output()
            .await
            .map_err(|e| OrchestratorError::Clone {
                repo: repo.clone(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(OrchestratorError::Clone {
                repo: repo.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(BenchmarkCatalog::discover(&checkout)?)
    }

    /// Run `benchmarks` on `instances` and write the report into a new
    /// timestamped directory under the configured results directory.
    pub async fn run(&self, instances: &[Instance], benchmarks: &[Benchmark]) -> Result<RunSummary> {
        if instances.is_empty() {
            return Err(OrchestratorError::NoInstances);
        }
        if benchmarks.is_empty() {
            return Err(OrchestratorError::NoBenchmarks);
        }

        let session = Arc::new(Session::new());
        let result = self.run_in(&session, instances, benchmarks).await;

        info!("cleaning up");
        session.close(Arc::clone(&self.runner)).await;
        result
    }

    async fn run_in(
        &self,
        session: &Arc<Session>,
        instances: &[Instance],
        benchmarks: &[Benchmark],
    ) -> Result<RunSummary> {
        let started = Utc::now();
        let run_dir = create_run_dir(&self.config.results_dir, started)?;
        let workspace = format!(
            "{}/{}",
            self.config.benchmark.remote_root.trim_end_matches('/'),
            workspace_name(started)
        );
        info!(
            run_dir = %run_dir.display(),
            instances = instances.len(),
            benchmarks = benchmarks.len(),
            "starting run"
        );

        for instance in instances {
            instance_dir(&run_dir, &instance.name)?;
        }

        let mut failures = Vec::new();
        let prepared = self.prepare_all(session, instances, &workspace).await;
        let mut ready = Vec::new();
        for (instance, result) in prepared {
            match result {
                Ok(prepared) => {
                    let stored = write_system_info(&run_dir, &instance.name, &prepared.system_info);
                    if let Err(e) = stored {
                        warn!(instance = %instance.name, error = %e, "failed to store system information");
                    }
                    ready.push(prepared);
                }
                Err(message) => {
                    error!(instance = %instance.name, error = %message, "instance preparation failed");
                    InstanceConsole::new(&instance.name).error(&message);
                    for benchmark in benchmarks {
                        failures.push((instance.name.clone(), benchmark.dir.clone(), message.clone()));
                    }
                }
            }
        }

        for outcome in self.execute_all(&ready, benchmarks, &run_dir).await {
            if let Some(message) = outcome.failure {
                failures.push((outcome.instance, outcome.benchmark, message));
            }
        }

        let mut report = scan_results_dir(&run_dir);
        for instance in instances {
            report.ensure_instance(instance.name.clone());
        }
        for (instance, benchmark, message) in failures {
            report.record_failure(instance, benchmark, message);
        }

        let report_path = write_report(&run_dir, &report, &ReportOptions::now())?;
        info!(
            report = %report_path.display(),
            failures = report.failures.len(),
            "run finished"
        );

        Ok(RunSummary {
            run_dir,
            report_path,
            report,
        })
    }

    async fn prepare_all(
        &self,
        session: &Arc<Session>,
        instances: &[Instance],
        workspace: &str,
    ) -> Vec<(Instance, std::result::Result<PreparedInstance, String>)> {
        let tasks = instances.iter().map(|instance| {
            let runner = Arc::clone(&self.runner);
            let session = Arc::clone(session);
            let settings = self.config.benchmark.clone();
            let instance = instance.clone();
            let workspace = workspace.to_string();
            async move {
                let task_instance = instance.clone();
                let result = tokio::task::spawn_blocking(move || {
                    prepare_instance(runner.as_ref(), &task_instance, &settings, &workspace, &session)
                })
                .await;
                let result = match result {
                    Ok(prepared) => prepared.map_err(|e| e.to_string()),
                    Err(e) => Err(format!("preparation task failed: {}", e)),
                };
                (instance, result)
            }
        });
        futures::future::join_all(tasks).await
    }

    async fn execute_all(
        &self,
        ready: &[PreparedInstance],
        benchmarks: &[Benchmark],
        run_dir: &Path,
    ) -> Vec<TaskOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));

        let tasks = ready.iter().flat_map(|prepared| {
            benchmarks.iter().map(move |benchmark| (prepared, benchmark))
        });
        let tasks = tasks.map(|(prepared, benchmark)| {
            let semaphore = Arc::clone(&semaphore);
            let runner = Arc::clone(&self.runner);
            let prepared = prepared.clone();
            let benchmark = benchmark.clone();
            let run_dir = run_dir.to_path_buf();
            async move {
                let instance = prepared.instance.name.clone();
                let name = benchmark.dir.clone();
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return TaskOutcome {
                            instance,
                            benchmark: name,
                            failure: Some(e.to_string()),
                        }
                    }
                };
                debug!(instance = %instance, benchmark = %name, "benchmark slot acquired");
                tokio::task::spawn_blocking(move || {
                    execute_benchmark(runner.as_ref(), &prepared, &benchmark, &run_dir)
                })
                .await
                .unwrap_or_else(|e| TaskOutcome {
                    instance,
                    benchmark: name,
                    failure: Some(format!("benchmark task failed: {}", e)),
                })
            }
        });
        futures::future::join_all(tasks).await
    }
}
