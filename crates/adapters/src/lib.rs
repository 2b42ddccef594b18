// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Remote execution side of benchviz.
//!
//! This crate finds instances, runs benchmark suites on them over SSH and
//! turns the downloaded output into a report:
//!
//! - [`provider`]: where instances come from (TOML inventory or the `aws` CLI)
//! - [`ssh`]: the [`CommandRunner`] seam and its `ssh` implementation
//! - [`suite`]: suite discovery, selection and execution
//! - [`orchestrator`]: bounded parallel runs and report writing
//! - [`session`]: cleanup of everything a run acquired
//! - [`config`]: layered [`RunnerConfig`]

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod console;
pub mod orchestrator;
pub mod provider;
pub mod session;
pub mod ssh;
pub mod suite;

pub use config::{ConfigError, RunnerConfig};
pub use orchestrator::{Orchestrator, OrchestratorError, RunSummary};
pub use provider::{AwsCliProvider, Instance, InstanceProvider, ProviderError, StaticProvider};
pub use session::Session;
pub use ssh::{CommandOutput, CommandRunner, RemoteError, SshRunner};
pub use suite::{parse_selection, Benchmark, BenchmarkCatalog, BenchmarkSuite, SuiteError};
