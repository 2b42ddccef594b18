// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Resources acquired during a run.
//!
//! A [`Session`] records every remote working directory and local
//! temporary directory as it is created. [`Session::close`] releases all
//! of them; the orchestrator calls it whether the run succeeded or not.

use crate::provider::Instance;
use crate::ssh::{shell_quote, CommandRunner};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::TempDir;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
struct RemoteDir {
    instance: Instance,
    path: String,
}

/// Tracks what a run must clean up. Shared between tasks by reference.
#[derive(Debug, Default)]
pub struct Session {
    remote_dirs: Mutex<Vec<RemoteDir>>,
    local_dirs: Mutex<Vec<TempDir>>,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember a directory created on `instance`.
    pub fn track_remote_dir(&self, instance: &Instance, path: impl Into<String>) {
        locked(&self.remote_dirs).push(RemoteDir {
            instance: instance.clone(),
            path: path.into(),
        });
    }

    /// Create a local temporary directory that lives until [`Session::close`].
    pub fn local_temp_dir(&self) -> std::io::Result<PathBuf> {
        let dir = tempfile::Builder::new().prefix("benchviz-").tempdir()?;
        let path = dir.path().to_path_buf();
        locked(&self.local_dirs).push(dir);
        Ok(path)
    }

    /// Number of resources still held.
    pub fn pending(&self) -> usize {
        locked(&self.remote_dirs).len() + locked(&self.local_dirs).len()
    }

    /// Release everything. Failures are logged and do not stop the
    /// remaining cleanup. Calling it twice is harmless.
    pub async fn close(&self, runner: Arc<dyn CommandRunner>) {
        let remote_dirs = std::mem::take(&mut *locked(&self.remote_dirs));
        let removals = remote_dirs.into_iter().map(|dir| {
            let runner = Arc::clone(&runner);
            tokio::task::spawn_blocking(move || {
                let command = format!("rm -rf {}", shell_quote(&dir.path));
                match runner.run(&dir.instance, &command) {
                    Ok(output) if output.success() => {
                        debug!(instance = %dir.instance.name, path = %dir.path, "removed remote directory");
                    }
                    Ok(output) => {
                        warn!(instance = %dir.instance.name, path = %dir.path, exit_code = output.exit_code, "failed to remove remote directory");
                    }
                    Err(e) => {
                        warn!(instance = %dir.instance.name, path = %dir.path, error = %e, "failed to remove remote directory");
                    }
                }
            })
        });
        for joined in futures::future::join_all(removals).await {
            if let Err(e) = joined {
                warn!(error = %e, "remote cleanup task failed");
            }
        }

        for dir in std::mem::take(&mut *locked(&self.local_dirs)) {
            let path = dir.path().display().to_string();
            if let Err(e) = dir.close() {
                warn!(path = %path, error = %e, "failed to remove local temporary directory");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssh::{CommandOutput, MockCommandRunner};

    #[tokio::test]
    async fn test_close_releases_everything_once() {
        let session = Session::new();
        let instance = Instance::new("graviton4", "10.0.0.12", "ubuntu");
        session.track_remote_dir(&instance, "~/benchmarks/bench_20250101_000000_42");
        let local = session.local_temp_dir().unwrap();
        assert!(local.is_dir());
        assert_eq!(session.pending(), 2);

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|instance, command| {
                instance.name == "graviton4" && command == "rm -rf ~/benchmarks/bench_20250101_000000_42"
            })
            .times(1)
            .returning(|_, _| Ok(CommandOutput::default()));
        let runner: Arc<dyn CommandRunner> = Arc::new(runner);

        session.close(Arc::clone(&runner)).await;
        assert_eq!(session.pending(), 0);
        assert!(!local.exists());

        // nothing left to release
        session.close(runner).await;
    }

    #[tokio::test]
    async fn test_close_continues_after_remote_failure() {
        let session = Session::new();
        session.track_remote_dir(&Instance::new("a", "10.0.0.1", "ubuntu"), "~/benchmarks/x");
        session.track_remote_dir(&Instance::new("b", "10.0.0.2", "ubuntu"), "~/benchmarks/y");

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|instance, _| instance.name == "a")
            .returning(|_, _| {
                Ok(CommandOutput {
                    exit_code: 255,
                    ..CommandOutput::default()
                })
            });
        runner
            .expect_run()
            .withf(|instance, _| instance.name == "b")
            .times(1)
            .returning(|_, _| Ok(CommandOutput::default()));

        session.close(Arc::new(runner)).await;
        assert_eq!(session.pending(), 0);
    }
}
