/*
 * SPDX-FileCopyrightText: Copyright (c) 2024-2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: LicenseRef-NvidiaProprietary
 *
 * NVIDIA CORPORATION, its affiliates and licensors retain all intellectual
 * property and proprietary rights in and to this material, related
 * documentation and any modifications thereto. Any use, reproduction,
 * disclosure or distribution of this material and related documentation
 * without an express license agreement from NVIDIA CORPORATION or
 * its affiliates is strictly prohibited.
 */

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use eyre::WrapErr;
use platform::{NetDeviceRecord, VirtualPlatform};
use platform::acquire::MetadataSources;
use stratus_host_support::agent_config::AgentConfig;
use stratus_host_support::inventory::LinuxHost;

#[derive(Debug, Parser)]
#[command(
    name = "stratus-net-agent",
    version,
    about = "Network device discovery agent for virtual platforms"
)]
pub struct Options {
    /// Path to the agent configuration file. All fields default when absent.
    #[arg(long)]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Option<AgentCommand>,
}

impl Options {
    pub fn load() -> Self {
        Self::parse()
    }
}

#[derive(Debug, Subcommand)]
pub enum AgentCommand {
    /// Run one discovery cycle and print the synthesized device inventory
    Discover,
    /// Run one discovery cycle and print the device-to-network map
    Map,
    /// Rebuild the device inventory from a persisted node-state file
    /// instead of running discovery
    Restore {
        /// JSON file holding the previously persisted device records
        #[arg(long)]
        state_path: PathBuf,
    },
}

pub async fn start(options: Options) -> eyre::Result<()> {
    let (config, path) = match options.config_path {
        // normal production case
        None => (AgentConfig::default(), "default".to_string()),
        // development overrides
        Some(config_path) => (
            AgentConfig::load_from(&config_path).wrap_err(format!(
                "Error loading agent configuration from {}",
                config_path.display()
            ))?,
            config_path.display().to_string(),
        ),
    };
    tracing::info!("Using configuration from {path}: {config:?}");

    let sources = metadata_sources(&config);
    let host = Arc::new(LinuxHost::new());
    let mut platform = VirtualPlatform::new(host.clone(), host);

    match options.cmd {
        None => {
            tracing::error!("Missing cmd. Try `stratus-net-agent --help`");
        }

        Some(AgentCommand::Discover) => {
            platform
                .discover(&sources, config.discovery.use_host_path)
                .await
                .wrap_err("discovery error")?;
            let records = platform.synthesize().await.wrap_err("synthesis error")?;
            print_json(&records)?;
        }

        Some(AgentCommand::Map) => {
            platform
                .discover(&sources, config.discovery.use_host_path)
                .await
                .wrap_err("discovery error")?;
            print_json(platform.device_map())?;
        }

        Some(AgentCommand::Restore { state_path }) => {
            let data = std::fs::read_to_string(&state_path).wrap_err(format!(
                "Error reading node state from {}",
                state_path.display()
            ))?;
            let records: Vec<NetDeviceRecord> =
                serde_json::from_str(&data).wrap_err("Error decoding node state")?;
            platform.restore_from_inventory(&records);
            let records = platform.synthesize().await.wrap_err("synthesis error")?;
            print_json(&records)?;
        }
    }
    Ok(())
}

// Print to stderr so the output can be re-directed to a file without logs
fn print_json<T: serde::Serialize>(value: &T) -> eyre::Result<()> {
    let rendered = serde_json::to_string_pretty(value)?;
    eprintln!("{rendered}");
    Ok(())
}

/// Fixed well-known source layout unless the config carries dev overrides.
fn metadata_sources(config: &AgentConfig) -> MetadataSources {
    let mut sources = MetadataSources::default();
    if let Some(snapshot_root) = &config.discovery.snapshot_root {
        sources.metadata_dir = snapshot_root.clone();
        sources.host_metadata_dir = snapshot_root.clone();
    }
    if let Some(base_url) = &config.discovery.service_base_url {
        sources.base_url = base_url.clone();
    }
    sources.fetch_retries = config.discovery.fetch_retries;
    sources.fetch_backoff = Duration::from_secs(config.discovery.fetch_backoff_secs);
    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_sources_defaults() {
        let sources = metadata_sources(&AgentConfig::default());
        assert_eq!(
            sources.metadata_dir,
            PathBuf::from("/var/config/openstack/2018-08-27")
        );
        assert_eq!(sources.fetch_retries, 4);
        assert_eq!(sources.fetch_backoff, Duration::from_secs(2));
    }

    #[test]
    fn test_metadata_sources_dev_overrides() {
        let mut config = AgentConfig::default();
        config.discovery.snapshot_root = Some(PathBuf::from("/tmp/config-drive"));
        config.discovery.service_base_url = Some("http://127.0.0.1:7780".to_owned());

        let sources = metadata_sources(&config);
        assert_eq!(sources.metadata_dir, PathBuf::from("/tmp/config-drive"));
        assert_eq!(sources.host_metadata_dir, PathBuf::from("/tmp/config-drive"));
        assert_eq!(sources.base_url, "http://127.0.0.1:7780");
    }
}
