// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Remote command execution.
//!
//! [`CommandRunner`] is the seam between orchestration and the network.
//! [`SshRunner`] implements it with the system `ssh` client; tests use the
//! generated `MockCommandRunner`.
//!
//! Calls are blocking and bounded by the SSH connect timeout. Async
//! callers run them on the blocking thread pool.

use crate::config::SshConfig;
use crate::provider::Instance;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, trace};

/// Errors that can occur while talking to an instance.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The local `ssh` client could not be started
    #[error("Failed to start ssh for {instance}: {source}")]
    Spawn {
        instance: String,
        #[source]
        source: std::io::Error,
    },

    /// A remote command exited unsuccessfully
    #[error("Command on {instance} exited with {exit_code}: {stderr}")]
    CommandFailed {
        instance: String,
        exit_code: i32,
        stderr: String,
    },
}

/// Result type for remote operations.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Captured result of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; `-1` when the process was killed by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a non-zero exit into [`RemoteError::CommandFailed`].
    pub fn check(self, instance: &Instance) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(RemoteError::CommandFailed {
                instance: instance.name.clone(),
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Runs shell commands on instances.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner: Send + Sync {
    /// Run `command` through the login shell of `instance`.
    ///
    /// A non-zero exit is reported in [`CommandOutput::exit_code`], not as
    /// an error.
    fn run(&self, instance: &Instance, command: &str) -> Result<CommandOutput>;

    /// Contents of `remote_path`, or `None` when it cannot be read.
    fn fetch(&self, instance: &Instance, remote_path: &str) -> Result<Option<Vec<u8>>>;
}

/// Expand a leading `~/` against `$HOME`.
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

/// Quote a value for a POSIX shell unless it is made of safe characters.
/// A leading `~/` is kept outside the quotes so the remote shell expands it.
pub fn shell_quote(value: &str) -> String {
    let safe = |c: char| c.is_ascii_alphanumeric() || "/._-~:=@%+,".contains(c);
    if !value.is_empty() && value.chars().all(safe) {
        return value.to_string();
    }
    match value.strip_prefix("~/") {
        Some(rest) => format!("~/{}", shell_quote(rest)),
        None => format!("'{}'", value.replace('\'', r"'\''")),
    }
}

/// [`CommandRunner`] backed by the system `ssh` client.
#[derive(Debug, Clone)]
pub struct SshRunner {
    config: SshConfig,
}

impl SshRunner {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// Arguments passed to `ssh` for `command` on `instance`.
    pub fn ssh_args(&self, instance: &Instance, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            format!("StrictHostKeyChecking={}", self.config.strict_host_key_checking),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.config.connect_timeout_secs),
        ];
        if let Some(key) = instance.key_path.as_ref().or(self.config.key_path.as_ref()) {
            args.push("-i".to_string());
            args.push(expand_home(key).to_string_lossy().into_owned());
        }
        args.push(instance.destination());
        args.push(command.to_string());
        args
    }

    fn exec(&self, instance: &Instance, command: &str) -> Result<std::process::Output> {
        trace!(instance = %instance.name, command, "ssh");
        Command::new("ssh")
            .args(self.ssh_args(instance, command))
            .output()
            .map_err(|source| RemoteError::Spawn {
                instance: instance.name.clone(),
                source,
            })
    }
}

impl CommandRunner for SshRunner {
    fn run(&self, instance: &Instance, command: &str) -> Result<CommandOutput> {
        let output = self.exec(instance, command)?;
        let result = CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(instance = %instance.name, command, exit_code = result.exit_code, "remote command finished");
        Ok(result)
    }

    fn fetch(&self, instance: &Instance, remote_path: &str) -> Result<Option<Vec<u8>>> {
        let output = self.exec(instance, &format!("cat {}", shell_quote(remote_path)))?;
        if output.status.success() {
            Ok(Some(output.stdout))
        } else {
            debug!(instance = %instance.name, remote_path, "remote file not readable");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance() -> Instance {
        Instance::new("graviton4", "10.0.0.12", "ubuntu")
    }

    #[test]
    fn test_ssh_args_include_timeout_and_host_key_policy() {
        let runner = SshRunner::new(SshConfig::default());
        let args = runner.ssh_args(&instance(), "nproc");
        assert_eq!(
            args,
            vec![
                "-o",
                "StrictHostKeyChecking=accept-new",
                "-o",
                "ConnectTimeout=10",
                "ubuntu@10.0.0.12",
                "nproc"
            ]
        );
    }

    #[test]
    fn test_instance_key_overrides_configured_key() {
        let runner = SshRunner::new(SshConfig {
            key_path: Some(PathBuf::from("/keys/default.pem")),
            ..SshConfig::default()
        });

        let args = runner.ssh_args(&instance(), "true");
        assert!(args.contains(&"/keys/default.pem".to_string()));

        let mut own = instance();
        own.key_path = Some(PathBuf::from("/keys/own.pem"));
        let args = runner.ssh_args(&own, "true");
        assert!(args.contains(&"/keys/own.pem".to_string()));
        assert!(!args.contains(&"/keys/default.pem".to_string()));
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("~/benchmarks/run_1/out.txt"), "~/benchmarks/run_1/out.txt");
        assert_eq!(shell_quote("~/my dir/out.txt"), "~/'my dir/out.txt'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_check_turns_exit_code_into_error() {
        let failed = CommandOutput {
            exit_code: 2,
            stdout: String::new(),
            stderr: "No such file\n".to_string(),
        };
        match failed.check(&instance()) {
            Err(RemoteError::CommandFailed { exit_code, stderr, .. }) => {
                assert_eq!(exit_code, 2);
                assert_eq!(stderr, "No such file");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
