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

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use stratus_host_support::inventory::PciDeviceInfo;
use tracing::warn;

use crate::VirtualPlatform;
use crate::error::DiscoveryError;
use crate::metadata::{InstanceMetadata, NetworkData};
use crate::synthesize::NetDeviceRecord;

/// Namespace prefix for the logical network identifiers handed to
/// inventory consumers.
pub const NETWORK_ID_PREFIX: &str = "openstack";

/// PCI base class of network controllers.
const PCI_NET_CLASS: u64 = 0x02;

/// What correlation learned about one physical device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAssociation {
    pub mac_address: String,
    pub network_id: String,
}

/// Map from physical PCI bus address to the logical network association
/// discovered for it. At most one association per address.
pub type CorrelationMap = HashMap<String, DeviceAssociation>;

impl VirtualPlatform {
    /// Rebuilds the correlation map from the two metadata documents and
    /// the live PCI inventory. The map is replaced wholesale; a previous
    /// map is discarded even when the new pass resolves fewer devices.
    ///
    /// Two passes. Hardware-passthrough descriptors carry a usable MAC in
    /// the instance metadata and match directly. User-space datapath
    /// devices (vhostuser) don't surface there with a discoverable name,
    /// so every remaining network-class PCI device is probed for a live
    /// interface name and matched through that.
    pub async fn correlate(
        &mut self,
        metadata: &InstanceMetadata,
        network_data: &NetworkData,
    ) -> Result<(), DiscoveryError> {
        let mut device_map = CorrelationMap::new();

        for device in &metadata.devices {
            if let Some(association) = lookup_association(network_data, &device.mac) {
                device_map.insert(device.address.clone(), association);
            }
        }

        let pci_devices = self.list_pci_devices_checked().await?;
        for device in &pci_devices {
            if device_map.contains_key(&device.address) {
                // already discovered via the instance metadata
                continue;
            }
            if !is_network_class(device) {
                continue;
            }
            let Some(name) = self.host.virtual_interface_name(&device.address).await else {
                // no stable kernel name, nothing to correlate through
                continue;
            };
            let Some(mac_address) = self.host.netdev_mac(&name).await else {
                continue;
            };
            if let Some(association) = lookup_association(network_data, &mac_address) {
                device_map.insert(device.address.clone(), association);
            }
        }

        self.device_map = device_map;
        Ok(())
    }

    /// Restart path: rebuild the map directly from previously persisted
    /// inventory records, skipping acquisition and correlation. Replaces
    /// any prior map, never merges.
    pub fn restore_from_inventory(&mut self, records: &[NetDeviceRecord]) {
        self.device_map = records
            .iter()
            .map(|record| {
                (
                    record.address.clone(),
                    DeviceAssociation {
                        mac_address: record.mac.clone(),
                        network_id: record.net_filter.clone(),
                    },
                )
            })
            .collect();
    }

    /// Correlation and synthesis are both meaningless without an
    /// enumerable PCI bus, so an empty device set is an error here, not an
    /// empty success.
    pub(crate) async fn list_pci_devices_checked(
        &self,
    ) -> Result<Vec<PciDeviceInfo>, DiscoveryError> {
        let pci_devices = self
            .inventory
            .list_pci_devices()
            .await
            .map_err(|source| DiscoveryError::inventory("couldn't enumerate PCI devices", source))?;
        if pci_devices.is_empty() {
            return Err(DiscoveryError::environment("no PCI devices enumerated"));
        }
        Ok(pci_devices)
    }
}

/// Whether a PCI device decodes as a network-class device. An unparsable
/// class id is logged and treated as "not a network device", never as an
/// error.
pub(crate) fn is_network_class(device: &PciDeviceInfo) -> bool {
    match u64::from_str_radix(device.class_id.trim_start_matches("0x"), 16) {
        Ok(class) => (class >> 16) == PCI_NET_CLASS,
        Err(error) => {
            warn!(
                address = %device.address,
                class = %device.class_id,
                %error,
                "unable to parse device class, skipping"
            );
            false
        }
    }
}

// Every (link, network) pair matching the MAC overwrites the previous
// match: several networks on one link is last-write-wins, not an error.
// Deliberately looser than the duplicate-MAC handling in the correction
// pass.
fn lookup_association(network_data: &NetworkData, mac_address: &str) -> Option<DeviceAssociation> {
    let mut association = None;
    for link in &network_data.links {
        if !link.ethernet_mac_address.eq_ignore_ascii_case(mac_address) {
            continue;
        }
        for network in &network_data.networks {
            if network.link == link.id {
                association = Some(DeviceAssociation {
                    mac_address: mac_address.to_owned(),
                    network_id: format!("{NETWORK_ID_PREFIX}:{}", network.network_id),
                });
            }
        }
    }
    association
}
