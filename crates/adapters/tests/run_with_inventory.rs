// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Full run against a scripted runner and a TOML inventory.

use benchviz_adapters::ssh::Result as RemoteResult;
use benchviz_adapters::{
    Benchmark, CommandOutput, CommandRunner, Instance, InstanceProvider, Orchestrator,
    RunnerConfig, StaticProvider,
};
use benchviz_benchmarks::io::read_report_json;
use benchviz_benchmarks::report::section_count;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const INVENTORY: &str = r#"
[[instances]]
name = "graviton4"
address = "10.0.0.12"
username = "ubuntu"

[[instances]]
name = "xeon"
address = "10.0.0.13"
username = "ec2-user"
key_path = "/keys/xeon.pem"
"#;

/// Answers the commands a suite run issues and records them.
#[derive(Default)]
struct ScriptedRunner {
    commands: Mutex<Vec<(String, String)>>,
}

impl ScriptedRunner {
    fn commands_for(&self, instance: &str) -> Vec<String> {
        self.commands
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == instance)
            .map(|(_, command)| command.clone())
            .collect()
    }
}

fn ok(stdout: &str) -> RemoteResult<CommandOutput> {
    Ok(CommandOutput {
        exit_code: 0,
        stdout: stdout.to_string(),
        stderr: String::new(),
    })
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, instance: &Instance, command: &str) -> RemoteResult<CommandOutput> {
        self.commands
            .lock()
            .unwrap()
            .push((instance.name.clone(), command.to_string()));

        let arm = instance.name == "graviton4";
        match command {
            "uname -m" => ok(if arm { "aarch64\n" } else { "x86_64\n" }),
            "nproc" => ok("8\n"),
            c if c.contains("model name") => ok(if arm {
                "Model name: Neoverse-V2\n"
            } else {
                "model name\t: Intel(R) Xeon(R) Platinum 8488C\n"
            }),
            c if c.ends_with("ls -la *.sh") => ok("-rwx 1 u u 1 Jan 1 00:00 benchmark.sh\n"),
            c if c.contains("outputs_info.txt") => ok("metadata_full_load.txt\n"),
            _ => ok(""),
        }
    }

    fn fetch(&self, instance: &Instance, remote_path: &str) -> RemoteResult<Option<Vec<u8>>> {
        if !remote_path.ends_with("/metadata_full_load.txt") {
            return Ok(None);
        }
        let avg = if instance.name == "graviton4" { "98.7" } else { "91.2" };
        let body = format!(
            "run_name=full_load\nload=8\nduration=60\navg_utilization={}\n",
            avg
        );
        Ok(Some(body.into_bytes()))
    }
}

#[tokio::test]
async fn test_run_over_inventory() {
    let tmp = TempDir::new().unwrap();
    let provider = Arc::new(StaticProvider::from_toml(INVENTORY).unwrap());
    let instances = provider.list_instances().await.unwrap();
    assert_eq!(instances.len(), 2);

    let runner = Arc::new(ScriptedRunner::default());
    let config = RunnerConfig {
        results_dir: tmp.path().to_path_buf(),
        max_concurrency: 1,
        ..RunnerConfig::default()
    };
    let orchestrator = Orchestrator::new(config, runner.clone(), provider);

    let cpu = Benchmark::from_dir_name("100_cpu_utilization").unwrap();
    let summary = orchestrator.run(&instances, &[cpu]).await.unwrap();

    assert!(summary.report.failures.is_empty());
    let graviton = summary.report.get("graviton4", "100_cpu_utilization").unwrap();
    assert_eq!(graviton.first_average_utilization(), Some(98.7));
    assert_eq!(graviton.system_info.architecture.as_deref(), Some("ARM64"));
    let xeon = summary.report.get("xeon", "100_cpu_utilization").unwrap();
    assert_eq!(
        xeon.system_info.cpu_model.as_deref(),
        Some("Intel(R) Xeon(R) Platinum 8488C")
    );

    let html = std::fs::read_to_string(&summary.report_path).unwrap();
    assert_eq!(section_count(&html), 1);
    assert!(html.contains("Neoverse-V2"));

    let stored = read_report_json(&summary.run_dir.join("report.json")).unwrap();
    assert_eq!(stored.instance_names(), vec!["graviton4", "xeon"]);

    // every workspace created on an instance is removed again
    for name in ["graviton4", "xeon"] {
        let commands = runner.commands_for(name);
        let mkdir = commands
            .iter()
            .find_map(|c| c.strip_prefix("mkdir -p "))
            .unwrap()
            .to_string();
        assert!(commands.contains(&format!("rm -rf {}", mkdir)));
        assert!(commands
            .iter()
            .any(|c| c.contains("bench_guide/100_cpu_utilization") && c.ends_with("./benchmark.sh")));
    }
}
