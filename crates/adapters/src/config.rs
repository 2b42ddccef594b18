// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runner configuration.
//!
//! Settings are layered with the `config` crate: built-in defaults, then an
//! optional TOML file, then `BENCHVIZ__`-prefixed environment variables
//! (`BENCHVIZ__SSH__CONNECT_TIMEOUT_SECS=20`, `BENCHVIZ__MAX_CONCURRENCY=5`).
//!
//! # Example
//!
//! ```
//! use benchviz_adapters::config::RunnerConfig;
//!
//! let config = RunnerConfig::default();
//! assert_eq!(config.max_concurrency, 3);
//! assert_eq!(config.ssh.connect_timeout_secs, 10);
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "BENCHVIZ";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The layered sources could not be read or deserialized
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    /// A value is out of range
    #[error("Invalid configuration value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// SSH client options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Identity file passed with `-i`. Instances may carry their own.
    pub key_path: Option<PathBuf>,
    /// `ConnectTimeout` in seconds.
    pub connect_timeout_secs: u64,
    /// `StrictHostKeyChecking` value.
    pub strict_host_key_checking: String,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            key_path: None,
            connect_timeout_secs: 10,
            strict_host_key_checking: "accept-new".to_string(),
        }
    }
}

/// Cloud account used for instance discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub profile: String,
    pub region: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            profile: "arm".to_string(),
            region: "us-west-2".to_string(),
        }
    }
}

/// Benchmark repository settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkSettings {
    /// Repository cloned on every instance.
    pub repo_url: String,
    /// Benchmark selected when the user picks nothing.
    pub default_benchmark: String,
    /// Remote parent of the per-run working directories.
    pub remote_root: String,
}

impl Default for BenchmarkSettings {
    fn default() -> Self {
        Self {
            repo_url: "https://github.com/geremyCohen/bench_guide".to_string(),
            default_benchmark: benchviz_core::CPU_UTILIZATION_DIR.to_string(),
            remote_root: "~/benchmarks".to_string(),
        }
    }
}

impl BenchmarkSettings {
    /// Directory name `git clone` creates for the repository.
    pub fn checkout_dir(&self) -> &str {
        let url = self.repo_url.trim_end_matches('/');
        let last = url.rsplit('/').next().unwrap_or(url);
        last.strip_suffix(".git").unwrap_or(last)
    }
}

/// Complete runner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub ssh: SshConfig,
    pub cloud: CloudConfig,
    pub benchmark: BenchmarkSettings,
    /// Local parent of the timestamped run directories.
    pub results_dir: PathBuf,
    /// Benchmark executions allowed in flight at once.
    pub max_concurrency: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            ssh: SshConfig::default(),
            cloud: CloudConfig::default(),
            benchmark: BenchmarkSettings::default(),
            results_dir: PathBuf::from("results"),
            max_concurrency: 3,
        }
    }
}

impl RunnerConfig {
    /// Load defaults, then `file` if given, then environment overrides.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let defaults = ::config::Config::try_from(&RunnerConfig::default())?;
        let mut builder = ::config::Config::builder().add_source(defaults);

        if let Some(path) = file {
            builder = builder.add_source(
                ::config::File::from(path.to_path_buf()).format(::config::FileFormat::Toml),
            );
        }

        let loaded: RunnerConfig = builder
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject values the runner cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "max_concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.ssh.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "ssh.connect_timeout_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.benchmark.repo_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "benchmark.repo_url",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}
