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

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Describes the format of the configuration file used by the stratus
/// network discovery agent.
///
/// This is what we READ from /etc/stratus/config.toml. In prod all of the
/// fields will default. We only implement Serialize for unit tests.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

impl AgentConfig {
    /// Loads the agent configuration file in toml format from the given path
    pub fn load_from(path: &Path) -> Result<Self, std::io::Error> {
        let data = std::fs::read_to_string(path)?;

        toml::from_str(&data).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Invalid AgentConfig toml data: {e}"),
            )
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiscoveryConfig {
    /// Read the config-drive snapshot from the host-mounted path rather
    /// than the runtime path.
    #[serde(default)]
    pub use_host_path: bool,

    /// Local dev only. Override the config-drive snapshot root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_root: Option<PathBuf>,

    /// Local dev only. Override the metadata service base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_base_url: Option<String>,

    /// How many times to retry each metadata service fetch.
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,

    /// Fixed backoff between fetch retries, in seconds.
    #[serde(default = "default_fetch_backoff_secs")]
    pub fetch_backoff_secs: u64,
}

fn default_fetch_retries() -> u32 {
    4u32
}

fn default_fetch_backoff_secs() -> u64 {
    2u64
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            use_host_path: false,
            snapshot_root: None,
            service_base_url: None,
            fetch_retries: default_fetch_retries(),
            fetch_backoff_secs: default_fetch_backoff_secs(),
        }
    }
}
