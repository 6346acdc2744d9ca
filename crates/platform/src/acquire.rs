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
use std::time::Duration;

use serde::de::DeserializeOwned;
use stratus_host_support::inventory::{HardwareInventory, NicInfo};
use tracing::{debug, info, warn};
use tryhard::RetryFutureConfig;

use crate::error::{DiscoveryError, SourceError};
use crate::metadata::{InstanceMetadata, NetworkData};

const METADATA_DIR: &str = "/var/config/openstack/2018-08-27";
const HOST_METADATA_DIR: &str = "/host/var/config/openstack/2018-08-27";
const METADATA_BASE_URL: &str = "http://169.254.169.254/openstack/2018-08-27";
const META_DATA_JSON: &str = "meta_data.json";
const NETWORK_DATA_JSON: &str = "network_data.json";

const DEFAULT_FETCH_RETRIES: u32 = 4;
const DEFAULT_FETCH_BACKOFF: Duration = Duration::from_secs(2);

/// Where the two metadata documents come from. `Default` is the fixed
/// well-known layout; tests and local development point it elsewhere.
#[derive(Debug, Clone)]
pub struct MetadataSources {
    pub metadata_dir: PathBuf,
    pub host_metadata_dir: PathBuf,
    pub base_url: String,
    pub fetch_retries: u32,
    pub fetch_backoff: Duration,
}

impl Default for MetadataSources {
    fn default() -> Self {
        MetadataSources {
            metadata_dir: PathBuf::from(METADATA_DIR),
            host_metadata_dir: PathBuf::from(HOST_METADATA_DIR),
            base_url: METADATA_BASE_URL.to_owned(),
            fetch_retries: DEFAULT_FETCH_RETRIES,
            fetch_backoff: DEFAULT_FETCH_BACKOFF,
        }
    }
}

/// Obtains the instance metadata and network topology, preferring the
/// config-drive snapshot and falling back to the metadata service, then
/// corrects the declared bus addresses against live hardware.
///
/// Fails only when both sources are exhausted, or when live hardware
/// contradicts itself (one MAC on several devices).
pub async fn acquire(
    sources: &MetadataSources,
    inventory: &dyn HardwareInventory,
    use_host_path: bool,
) -> Result<(InstanceMetadata, NetworkData), DiscoveryError> {
    let (mut metadata, network_data) = match read_config_drive(sources, use_host_path) {
        Ok(documents) => documents,
        Err(config_drive) => {
            warn!(%config_drive, "couldn't read config-drive snapshot, falling back to the metadata service");
            fetch_from_service(sources)
                .await
                .map_err(|service| DiscoveryError::Acquisition {
                    config_drive,
                    service,
                })?
        }
    };

    correct_bus_addresses(&mut metadata, inventory).await?;

    Ok((metadata, network_data))
}

/// Reads both documents from the config-drive snapshot directory. Any open
/// or decode failure aborts this attempt; the caller falls back to the
/// metadata service.
fn read_config_drive(
    sources: &MetadataSources,
    use_host_path: bool,
) -> Result<(InstanceMetadata, NetworkData), SourceError> {
    let snapshot_dir = if use_host_path {
        &sources.host_metadata_dir
    } else {
        &sources.metadata_dir
    };

    info!("reading instance meta_data from config-drive");
    let metadata = read_document(&snapshot_dir.join(META_DATA_JSON))?;

    info!("reading network_data from config-drive");
    let network_data = read_document(&snapshot_dir.join(NETWORK_DATA_JSON))?;

    Ok((metadata, network_data))
}

fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T, SourceError> {
    let file = std::fs::File::open(path).map_err(|source| SourceError::Open {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_reader(file).map_err(|source| SourceError::Decode {
        path: path.to_owned(),
        source,
    })
}

/// Fetches both documents from the metadata service. Failure here is fatal
/// to acquisition: there is no further fallback.
async fn fetch_from_service(
    sources: &MetadataSources,
) -> Result<(InstanceMetadata, NetworkData), SourceError> {
    let client = reqwest::Client::new();

    info!("getting instance meta_data from the metadata service");
    let metadata = fetch_document(&client, sources, META_DATA_JSON).await?;

    info!("getting network_data from the metadata service");
    let network_data = fetch_document(&client, sources, NETWORK_DATA_JSON).await?;

    Ok((metadata, network_data))
}

async fn fetch_document<T: DeserializeOwned>(
    client: &reqwest::Client,
    sources: &MetadataSources,
    document: &str,
) -> Result<T, SourceError> {
    let url = format!("{}/{document}", sources.base_url);
    debug!(%url, "getting document body");

    let retry_config =
        RetryFutureConfig::new(sources.fetch_retries).fixed_backoff(sources.fetch_backoff);
    let body = tryhard::retry_fn(|| async {
        let response = client.get(&url).send().await?;
        response.error_for_status()?.bytes().await
    })
    .with_config(retry_config)
    .await
    .map_err(|source| SourceError::Fetch {
        url: url.clone(),
        source,
    })?;

    serde_json::from_slice(&body).map_err(|source| SourceError::DecodeResponse { url, source })
}

// We can't rely on the PCI address from the metadata, so we look up the
// real PCI address of the NIC matching each descriptor's MAC.
//
// Libvirt/QEMU cannot guarantee that the address specified in the domain
// XML matches the address seen by the guest; see
// https://libvirt.org/pci-addresses.html. The q35 machine type makes this
// visible through its switch from PCI to PCI-E for virtual devices. The
// declared value is a best-effort hint only.
async fn correct_bus_addresses(
    metadata: &mut InstanceMetadata,
    inventory: &dyn HardwareInventory,
) -> Result<(), DiscoveryError> {
    let nics = inventory.list_nics().await.map_err(|source| {
        DiscoveryError::inventory("couldn't enumerate network interfaces", source)
    })?;

    for device in &mut metadata.devices {
        let observed = match pci_address_for_mac(&device.mac, &nics)? {
            Some(address) => address,
            None => {
                // Expected on some hypervisor generations. Return the data
                // as acquired and let correlation work with the declared
                // addresses.
                warn!(
                    mac = %device.mac,
                    "no live interface with this MAC address, leaving bus addresses uncorrected"
                );
                return Ok(());
            }
        };
        if observed != device.address {
            debug!(
                mac = %device.mac,
                declared = %device.address,
                observed = %observed,
                "declared bus address doesn't match the live device, overwriting"
            );
            device.address = observed;
        }
    }

    Ok(())
}

// The PCI address of the unique live NIC holding a MAC. Two NICs sharing a
// MAC is a hard error -- there is no safe way to pick one.
fn pci_address_for_mac(mac: &str, nics: &[NicInfo]) -> Result<Option<String>, DiscoveryError> {
    let mut found: Option<&str> = None;
    for nic in nics {
        if !nic.mac_address.eq_ignore_ascii_case(mac) {
            continue;
        }
        let Some(address) = nic.pci_address.as_deref() else {
            continue;
        };
        if found.is_some() {
            return Err(DiscoveryError::AmbiguousMac {
                mac: mac.to_owned(),
            });
        }
        found = Some(address);
    }
    Ok(found.map(str::to_owned))
}
