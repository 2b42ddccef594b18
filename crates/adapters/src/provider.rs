// Copyright 2025 Benchviz Contributors
// SPDX-License-Identifier: Apache-2.0

//! Instance providers.
//!
//! A provider lists the machines benchmarks run on and releases any it
//! created. Two providers ship with benchviz:
//!
//! - [`StaticProvider`] reads a TOML inventory;
//! - [`AwsCliProvider`] lists running EC2 instances through the `aws` CLI.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Errors that can occur while discovering or releasing instances.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Inventory file could not be read
    #[error("Failed to read inventory {}: {source}", path.display())]
    Inventory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Inventory file is not valid TOML for the expected shape
    #[error("Invalid inventory: {0}")]
    InvalidInventory(#[from] toml::de::Error),

    /// External command could not be started
    #[error("Failed to run {command}: {source}")]
    Spawn {
        command: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// External command exited unsuccessfully
    #[error("{command} failed: {stderr}")]
    CommandFailed { command: &'static str, stderr: String },

    /// External command output could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// A reachable machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Display name, also used for directory and file names.
    pub name: String,
    /// Host name or IP address.
    pub address: String,
    /// SSH login user.
    pub username: String,
    /// Identity file for this instance, overriding the configured one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_time: Option<DateTime<Utc>>,
}

impl Instance {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            username: username.into(),
            key_path: None,
            instance_id: None,
            instance_type: None,
            launch_time: None,
        }
    }

    /// `user@address`.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.username, self.address)
    }
}

/// Source of instances.
#[async_trait]
pub trait InstanceProvider: Send + Sync {
    /// Instances available for benchmarking.
    async fn list_instances(&self) -> Result<Vec<Instance>>;
}

#[derive(Debug, Deserialize)]
struct Inventory {
    #[serde(default)]
    instances: Vec<Instance>,
}

/// Fixed list of instances, typically from a TOML inventory:
///
/// ```toml
/// [[instances]]
/// name = "graviton4"
/// address = "10.0.0.12"
/// username = "ubuntu"
/// key_path = "~/.ssh/bench.pem"
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    instances: Vec<Instance>,
}

impl StaticProvider {
    pub fn new(instances: Vec<Instance>) -> Self {
        Self { instances }
    }

    /// Parse an inventory document.
    pub fn from_toml(document: &str) -> Result<Self> {
        let inventory: Inventory = toml::from_str(document)?;
        Ok(Self::new(inventory.instances))
    }

    /// Read an inventory file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let document = std::fs::read_to_string(path).map_err(|source| ProviderError::Inventory {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&document)
    }
}

#[async_trait]
impl InstanceProvider for StaticProvider {
    async fn list_instances(&self) -> Result<Vec<Instance>> {
        Ok(self.instances.clone())
    }
}

/// Login user for an AMI, judged by its name and description.
pub fn username_for_image(name: &str, description: &str) -> &'static str {
    let text = format!("{} {}", name, description).to_lowercase();
    if text.contains("debian") {
        "admin"
    } else if text.contains("ubuntu") {
        "ubuntu"
    } else if text.contains("amazon") || text.contains("amzn") {
        "ec2-user"
    } else {
        "ubuntu"
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstances {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<Ec2Instance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Ec2Instance {
    instance_id: String,
    instance_type: Option<String>,
    image_id: Option<String>,
    key_name: Option<String>,
    launch_time: Option<DateTime<Utc>>,
    platform: Option<String>,
    public_ip_address: Option<String>,
    private_ip_address: Option<String>,
    #[serde(default)]
    tags: Vec<Tag>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Tag {
    key: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeImages {
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Image {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
}

/// Running EC2 instances, listed through the `aws` CLI.
#[derive(Debug, Clone)]
pub struct AwsCliProvider {
    profile: String,
    region: String,
    ssh_dir: PathBuf,
}

impl AwsCliProvider {
    pub fn new(profile: impl Into<String>, region: impl Into<String>) -> Self {
        let ssh_dir = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_default()
            .join(".ssh");
        Self {
            profile: profile.into(),
            region: region.into(),
            ssh_dir,
        }
    }

    async fn aws(&self, args: &[&str]) -> Result<Vec<u8>> {
        let output = Command::new("aws")
            .args(args)
            .args(["--profile", self.profile.as_str(), "--region", self.region.as_str()])
            .args(["--output", "json"])
            .output()
            .await
            .map_err(|source| ProviderError::Spawn {
                command: "aws",
                source,
            })?;
        if !output.status.success() {
            return Err(ProviderError::CommandFailed {
                command: "aws",
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    async fn username_for(&self, image_id: Option<&str>) -> &'static str {
        let Some(image_id) = image_id else {
            return "ubuntu";
        };
        match self.aws(&["ec2", "describe-images", "--image-ids", image_id]).await {
            Ok(bytes) => match serde_json::from_slice::<DescribeImages>(&bytes) {
                Ok(response) => response
                    .images
                    .first()
                    .map(|image| username_for_image(&image.name, &image.description))
                    .unwrap_or("ubuntu"),
                Err(e) => {
                    debug!(image_id, error = %e, "unreadable image description");
                    "ubuntu"
                }
            },
            Err(e) => {
                debug!(image_id, error = %e, "image lookup failed");
                "ubuntu"
            }
        }
    }

    /// `~/.ssh/<key_name>.pem`, else the first common default key found.
    fn key_path_for(&self, key_name: Option<&str>) -> Option<PathBuf> {
        let named = key_name.map(|name| self.ssh_dir.join(format!("{}.pem", name)));
        if let Some(path) = named.as_ref().filter(|p| p.exists()) {
            return Some(path.clone());
        }
        ["id_rsa", "id_ed25519"]
            .iter()
            .map(|name| self.ssh_dir.join(name))
            .find(|p| p.exists())
            .or(named)
    }

    async fn to_instance(&self, raw: Ec2Instance) -> Option<Instance> {
        if raw.platform.as_deref() == Some("windows") {
            debug!(instance_id = %raw.instance_id, "skipping windows instance");
            return None;
        }
        let address = raw.public_ip_address.or(raw.private_ip_address)?;
        let name = raw
            .tags
            .iter()
            .find(|tag| tag.key == "Name")
            .map(|tag| tag.value.clone())
            .unwrap_or_else(|| "unnamed".to_string());
        let username = self.username_for(raw.image_id.as_deref()).await;

        Some(Instance {
            name,
            address,
            username: username.to_string(),
            key_path: self.key_path_for(raw.key_name.as_deref()),
            instance_id: Some(raw.instance_id),
            instance_type: raw.instance_type,
            launch_time: raw.launch_time,
        })
    }
}

/// Newest launch first; instances without a launch time go last.
pub fn sort_newest_first(instances: &mut [Instance]) {
    instances.sort_by(|a, b| b.launch_time.cmp(&a.launch_time));
}

#[async_trait]
impl InstanceProvider for AwsCliProvider {
    async fn list_instances(&self) -> Result<Vec<Instance>> {
        let bytes = self
            .aws(&[
                "ec2",
                "describe-instances",
                "--filters",
                "Name=instance-state-name,Values=running",
            ])
            .await?;
        let response: DescribeInstances = serde_json::from_slice(&bytes)?;

        let mut instances = Vec::new();
        for raw in response.reservations.into_iter().flat_map(|r| r.instances) {
            if let Some(instance) = self.to_instance(raw).await {
                instances.push(instance);
            }
        }
        sort_newest_first(&mut instances);

        info!(count = instances.len(), region = %self.region, "listed running instances");
        Ok(instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_static_inventory() {
        let provider = StaticProvider::from_toml(
            r#"
[[instances]]
name = "graviton4"
address = "10.0.0.12"
username = "ubuntu"
key_path = "/keys/bench.pem"

[[instances]]
name = "xeon"
address = "10.0.0.13"
username = "ec2-user"
"#,
        )
        .unwrap();

        let instances = provider.list_instances().await.unwrap();
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].destination(), "ubuntu@10.0.0.12");
        assert_eq!(instances[0].key_path, Some(PathBuf::from("/keys/bench.pem")));
        assert!(instances[1].key_path.is_none());
    }

    #[test]
    fn test_invalid_inventory() {
        let err = StaticProvider::from_toml("[[instances]]\nname = 3\n").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidInventory(_)));
    }

    #[test]
    fn test_username_for_image() {
        assert_eq!(username_for_image("debian-12-arm64-20250101", ""), "admin");
        assert_eq!(
            username_for_image("", "Canonical, Ubuntu, 24.04 LTS"),
            "ubuntu"
        );
        assert_eq!(username_for_image("al2023-ami-2023.4", "Amazon Linux 2023"), "ec2-user");
        assert_eq!(username_for_image("custom-golden-image", ""), "ubuntu");
    }

    #[test]
    fn test_sort_newest_first() {
        let at = |h| Some(Utc.with_ymd_and_hms(2025, 5, 14, h, 0, 0).unwrap());
        let mut instances = vec![
            Instance { launch_time: at(8), ..Instance::new("old", "a", "u") },
            Instance::new("unknown", "b", "u"),
            Instance { launch_time: at(12), ..Instance::new("new", "c", "u") },
        ];
        sort_newest_first(&mut instances);
        let names: Vec<_> = instances.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["new", "old", "unknown"]);
    }

    #[test]
    fn test_describe_instances_shape() {
        let json = r#"{"Reservations":[{"Instances":[{
            "InstanceId":"i-0abc","InstanceType":"c8g.xlarge","ImageId":"ami-1",
            "KeyName":"bench","LaunchTime":"2025-05-14T12:00:00+00:00",
            "PublicIpAddress":"3.3.3.3","Tags":[{"Key":"Name","Value":"graviton4"}]
        }]}]}"#;
        let response: DescribeInstances = serde_json::from_str(json).unwrap();
        let raw = &response.reservations[0].instances[0];
        assert_eq!(raw.instance_id, "i-0abc");
        assert_eq!(raw.tags[0].value, "graviton4");
        assert!(raw.private_ip_address.is_none());
    }
}
