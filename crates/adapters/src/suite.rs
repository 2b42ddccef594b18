// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark suites.
//!
//! A suite is a `<number>_<name>` directory of the benchmark repository
//! holding an optional `setup.sh`, one benchmark script and, optionally,
//! an `outputs_info.txt` listing the files the script leaves behind.
//! Running a suite captures the script's streams as the raw output and
//! downloads the listed files into the local benchmark directory.

use crate::console::InstanceConsole;
use crate::provider::Instance;
use crate::ssh::{shell_quote, CommandRunner, RemoteError};
use benchviz_benchmarks::io::{write_fetched, write_raw_output, ResultsIoError};
use benchviz_core::BenchmarkKind;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

static SUITE_DIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)_(\w+)$").expect("valid suite directory regex"));

/// Script run when a suite ships several and none has a preferred name.
pub const FALLBACK_SCRIPT: &str = "benchmark.sh";

/// Errors that can occur while discovering or running suites.
#[derive(Debug, Error)]
pub enum SuiteError {
    /// The benchmark checkout could not be listed
    #[error("Failed to read benchmark checkout {}: {source}", path.display())]
    Catalog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Talking to the instance failed
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Output could not be stored locally
    #[error("Results error: {0}")]
    Results(#[from] ResultsIoError),
}

/// Result type for suite operations.
pub type Result<T> = std::result::Result<T, SuiteError>;

/// One suite directory of the benchmark repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Benchmark {
    pub number: u32,
    pub name: String,
    /// Directory name, also the benchmark type of its results.
    pub dir: String,
}

impl Benchmark {
    /// Parse a `<number>_<name>` directory name.
    pub fn from_dir_name(dir: &str) -> Option<Self> {
        let caps = SUITE_DIR.captures(dir)?;
        Some(Self {
            number: caps[1].parse().ok()?,
            name: caps[2].to_string(),
            dir: dir.to_string(),
        })
    }

    pub fn kind(&self) -> BenchmarkKind {
        BenchmarkKind::from_dir_name(&self.dir)
    }
}

/// Suites available in a local checkout, ordered by number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BenchmarkCatalog {
    benchmarks: Vec<Benchmark>,
}

impl BenchmarkCatalog {
    /// Build a catalog from directory names, ignoring those that are not suites.
    pub fn from_dir_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut benchmarks: Vec<Benchmark> = names
            .into_iter()
            .filter_map(|name| Benchmark::from_dir_name(name.as_ref()))
            .collect();
        benchmarks.sort_by(|a, b| a.number.cmp(&b.number).then_with(|| a.dir.cmp(&b.dir)));
        Self { benchmarks }
    }

    /// Scan the immediate subdirectories of `root`.
    pub fn discover(root: &Path) -> Result<Self> {
        let entries = std::fs::read_dir(root).map_err(|source| SuiteError::Catalog {
            path: root.to_path_buf(),
            source,
        })?;

        let names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();

        let catalog = Self::from_dir_names(names);
        debug!(root = %root.display(), count = catalog.len(), "discovered benchmark suites");
        Ok(catalog)
    }

    pub fn benchmarks(&self) -> &[Benchmark] {
        &self.benchmarks
    }

    pub fn len(&self) -> usize {
        self.benchmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.benchmarks.is_empty()
    }

    /// Position of the suite in directory `dir`.
    pub fn position(&self, dir: &str) -> Option<usize> {
        self.benchmarks.iter().position(|b| b.dir == dir)
    }
}

/// Resolve `all`, an empty string, or comma-separated 1-based indices into
/// 0-based positions below `count`. Out-of-range and non-numeric entries
/// are ignored.
pub fn parse_selection(input: &str, count: usize, default_index: usize) -> Vec<usize> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("all") {
        return (0..count).collect();
    }
    if input.is_empty() {
        return if default_index < count {
            vec![default_index]
        } else {
            Vec::new()
        };
    }
    input
        .split(',')
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .filter(|&n| n >= 1 && n <= count)
        .map(|n| n - 1)
        .collect()
}

/// Pick the script to run from an `ls` listing of the suite directory.
pub fn select_script(listing: &str) -> String {
    let scripts: Vec<&str> = listing
        .lines()
        .filter_map(|line| line.split_whitespace().last())
        .filter(|name| name.ends_with(".sh"))
        .collect();

    for preferred in ["cpu_benchmark.sh", FALLBACK_SCRIPT] {
        if scripts.contains(&preferred) {
            return preferred.to_string();
        }
    }
    scripts
        .into_iter()
        .find(|name| *name != "setup.sh")
        .unwrap_or(FALLBACK_SCRIPT)
        .to_string()
}

/// Output files a suite of `kind` leaves behind when it ships no
/// `outputs_info.txt`.
pub fn default_outputs(kind: &BenchmarkKind) -> Vec<String> {
    let names: &[&str] = match kind {
        BenchmarkKind::CpuUtilization => &[
            "cpu_benchmark_results.txt",
            "mpstat_full_load.txt",
            "metadata_full_load.txt",
        ],
        BenchmarkKind::Generic(_) => &["benchmark_results.txt"],
    };
    names.iter().map(|name| name.to_string()).collect()
}

/// One file name per non-blank line of `outputs_info.txt`.
pub fn parse_outputs_info(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Local artefacts of one suite run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteRun {
    pub script: String,
    /// Exit status of the benchmark script.
    pub exit_code: i32,
    pub raw_output: PathBuf,
    pub fetched: Vec<PathBuf>,
    /// Listed outputs that could not be downloaded.
    pub missing: Vec<String>,
}

impl SuiteRun {
    /// Every local file of the run, for aggregation.
    pub fn files(&self) -> Vec<PathBuf> {
        let mut files = self.fetched.clone();
        files.push(self.raw_output.clone());
        files
    }
}

/// Runs one suite on one instance.
#[derive(Debug, Clone)]
pub struct BenchmarkSuite {
    kind: BenchmarkKind,
}

impl BenchmarkSuite {
    pub fn new(kind: BenchmarkKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> &BenchmarkKind {
        &self.kind
    }

    /// Run the suite found at `remote_dir` on `instance` and store its
    /// output in `out_dir`.
    ///
    /// A failing `setup.sh` or benchmark script is logged and the run
    /// continues, since the script may still have written results. Only
    /// connection and local I/O failures are errors.
    pub fn run(
        &self,
        runner: &dyn CommandRunner,
        instance: &Instance,
        remote_dir: &str,
        out_dir: &Path,
    ) -> Result<SuiteRun> {
        let console = InstanceConsole::new(&instance.name);
        let benchmark = self.kind.as_str();
        let cd = format!("cd {}", shell_quote(remote_dir));

        console.info(&format!("Running setup script for {}...", benchmark));
        let setup = runner.run(instance, &format!("{} && chmod +x setup.sh && ./setup.sh", cd))?;
        if !setup.success() {
            warn!(instance = %instance.name, benchmark, exit_code = setup.exit_code, "setup script failed");
            console.error(&format!("Setup script failed with exit code {}", setup.exit_code));
        }

        let listing = runner.run(instance, &format!("{} && ls -la *.sh", cd))?;
        let script = select_script(&listing.stdout);

        console.info(&format!("Running {} in {}...", script, benchmark));
        let quoted = shell_quote(&script);
        let output = runner.run(
            instance,
            &format!("{} && chmod +x {} && ./{}", cd, quoted, quoted),
        )?;
        if !output.success() {
            warn!(instance = %instance.name, benchmark, exit_code = output.exit_code, "benchmark script failed");
            console.error(&format!(
                "Benchmark script failed with exit code {}",
                output.exit_code
            ));
        }

        let raw_output = write_raw_output(out_dir, &instance.name, &output.stdout, &output.stderr)?;
        console.info(&format!("Saved raw output to {}", raw_output.display()));

        let info = runner.run(
            instance,
            &format!("cat {}/outputs_info.txt 2>/dev/null || echo ''", shell_quote(remote_dir)),
        )?;
        let mut outputs = parse_outputs_info(&info.stdout);
        if outputs.is_empty() {
            outputs = default_outputs(&self.kind);
        }

        let mut fetched = Vec::new();
        let mut missing = Vec::new();
        for name in outputs {
            let remote_path = format!("{}/{}", remote_dir, name);
            match runner.fetch(instance, &remote_path)? {
                Some(bytes) => {
                    fetched.push(write_fetched(out_dir, &instance.name, &name, &bytes)?);
                    console.info(&format!("Downloaded {}", name));
                }
                None => {
                    console.error(&format!("Failed to download {}", name));
                    missing.push(name);
                }
            }
        }

        info!(
            instance = %instance.name,
            benchmark,
            fetched = fetched.len(),
            missing = missing.len(),
            "suite finished"
        );

        Ok(SuiteRun {
            script,
            exit_code: output.exit_code,
            raw_output,
            fetched,
            missing,
        })
    }
}
