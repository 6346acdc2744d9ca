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

use async_trait::async_trait;
use mockall::automock;
use tracing::warn;

use crate::netlink;
use crate::sysfs::SysfsRoot;

/// One kernel network interface and the PCI device it sits on. Loopback
/// and tunnel interfaces have no backing PCI device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NicInfo {
    pub name: String,
    pub mac_address: String,
    pub pci_address: Option<String>,
}

/// Static identity of one PCI device. The hex attributes are kept as the
/// lower-case strings sysfs reports, without the 0x prefix (class
/// "020000", vendor "15b3", ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PciDeviceInfo {
    pub address: String,
    pub class_id: String,
    pub vendor_id: String,
    pub device_id: String,
}

#[derive(thiserror::Error, Debug)]
pub enum InventoryError {
    #[error("listing network interfaces: {0}")]
    NetDevices(#[source] std::io::Error),
    #[error("listing PCI devices: {0}")]
    PciDevices(#[source] std::io::Error),
}

/// Hardware inventory: static device identity as enumerated from the
/// host. Whole-host queries only; per-device attributes live on
/// [`HostIntrospect`].
#[automock]
#[async_trait]
pub trait HardwareInventory: Send + Sync {
    async fn list_nics(&self) -> Result<Vec<NicInfo>, InventoryError>;
    async fn list_pci_devices(&self) -> Result<Vec<PciDeviceInfo>, InventoryError>;
}

/// Host introspection: live per-device attributes that need the kernel's
/// view rather than static identity. Every lookup is best-effort; None
/// means the attribute could not be resolved, and the caller decides how
/// much that matters.
#[automock]
#[async_trait]
pub trait HostIntrospect: Send + Sync {
    /// Kernel network-interface name attached to a PCI device, including
    /// the virtio indirection level.
    async fn virtual_interface_name(&self, pci_address: &str) -> Option<String>;
    async fn netdev_mac(&self, name: &str) -> Option<String>;
    async fn netdev_mtu(&self, pci_address: &str) -> Option<u32>;
    async fn link_speed(&self, name: &str) -> Option<String>;
    async fn link_type(&self, name: &str) -> Option<String>;
    async fn driver_name(&self, pci_address: &str) -> Option<String>;
}

/// Production implementation of both facilities, backed by sysfs for
/// static identity and netlink for live link attributes.
#[derive(Debug, Clone, Default)]
pub struct LinuxHost {
    sysfs: SysfsRoot,
}

impl LinuxHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tests point this at a synthetic sysfs tree.
    pub fn with_sysfs_root(base: impl Into<PathBuf>) -> Self {
        LinuxHost {
            sysfs: SysfsRoot::new(base),
        }
    }
}

#[async_trait]
impl HardwareInventory for LinuxHost {
    async fn list_nics(&self) -> Result<Vec<NicInfo>, InventoryError> {
        let names = self
            .sysfs
            .net_device_names()
            .map_err(InventoryError::NetDevices)?;
        let mut nics = Vec::with_capacity(names.len());
        for name in names {
            let mac_address = match self.sysfs.netdev_address(&name) {
                Ok(address) => address,
                Err(error) => {
                    warn!(%name, %error, "skipping interface without a readable address");
                    continue;
                }
            };
            let pci_address = self.sysfs.netdev_pci_address(&name);
            nics.push(NicInfo {
                name,
                mac_address,
                pci_address,
            });
        }
        Ok(nics)
    }

    async fn list_pci_devices(&self) -> Result<Vec<PciDeviceInfo>, InventoryError> {
        let addresses = self
            .sysfs
            .pci_device_addresses()
            .map_err(InventoryError::PciDevices)?;
        let mut devices = Vec::with_capacity(addresses.len());
        for address in addresses {
            let identity = (
                self.sysfs.pci_attribute(&address, "class"),
                self.sysfs.pci_attribute(&address, "vendor"),
                self.sysfs.pci_attribute(&address, "device"),
            );
            match identity {
                (Ok(class_id), Ok(vendor_id), Ok(device_id)) => devices.push(PciDeviceInfo {
                    address,
                    class_id,
                    vendor_id,
                    device_id,
                }),
                _ => warn!(%address, "skipping PCI device with unreadable identity attributes"),
            }
        }
        Ok(devices)
    }
}

#[async_trait]
impl HostIntrospect for LinuxHost {
    async fn virtual_interface_name(&self, pci_address: &str) -> Option<String> {
        self.sysfs.pci_net_name(pci_address)
    }

    async fn netdev_mac(&self, name: &str) -> Option<String> {
        match netlink::get_interface_link(name).await {
            Ok(link_data) => link_data.and_then(|link_data| link_data.mac_string()),
            Err(error) => {
                warn!(%name, %error, "netlink MAC lookup failed");
                None
            }
        }
    }

    async fn netdev_mtu(&self, pci_address: &str) -> Option<u32> {
        let name = self.sysfs.pci_net_name(pci_address)?;
        match netlink::get_interface_link(&name).await {
            Ok(link_data) => link_data.and_then(|link_data| link_data.mtu),
            Err(error) => {
                warn!(%name, %error, "netlink MTU lookup failed");
                None
            }
        }
    }

    async fn link_speed(&self, name: &str) -> Option<String> {
        self.sysfs
            .netdev_speed(name)
            .map(|speed| format!("{speed} Mb/s"))
    }

    async fn link_type(&self, name: &str) -> Option<String> {
        match netlink::get_interface_link(name).await {
            Ok(link_data) => {
                link_data.and_then(|link_data| link_data.link_type_label().map(str::to_owned))
            }
            Err(error) => {
                warn!(%name, %error, "netlink link type lookup failed");
                None
            }
        }
    }

    async fn driver_name(&self, pci_address: &str) -> Option<String> {
        self.sysfs.pci_driver_name(pci_address)
    }
}
