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

use stratus_host_support::inventory::InventoryError;

/// Failure of one metadata source. A single source failing is expected
/// (the fallback chain absorbs it); these only reach callers inside
/// [`DiscoveryError::Acquisition`] once every source is exhausted.
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("opening {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("decoding {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("fetching {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("decoding response from {url}: {source}")]
    DecodeResponse {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum DiscoveryError {
    /// Both the config drive and the metadata service failed; there is no
    /// usable metadata on this guest.
    #[error("no usable metadata source (config drive: {config_drive}; metadata service: {service})")]
    Acquisition {
        config_drive: SourceError,
        service: SourceError,
    },

    /// More than one live device claims the same MAC address; there is no
    /// safe way to pick one, and this hardware topology is unsupported.
    #[error("more than one device found with MAC address {mac} is unsupported")]
    AmbiguousMac { mac: String },

    /// The hardware inventory itself is unusable (query failed or came
    /// back empty); discovery is meaningless on this host.
    #[error("hardware inventory unusable: {reason}")]
    Environment {
        reason: String,
        #[source]
        source: Option<InventoryError>,
    },
}

impl DiscoveryError {
    pub(crate) fn environment(reason: impl Into<String>) -> Self {
        DiscoveryError::Environment {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn inventory(reason: impl Into<String>, source: InventoryError) -> Self {
        DiscoveryError::Environment {
            reason: reason.into(),
            source: Some(source),
        }
    }
}
