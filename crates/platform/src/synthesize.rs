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

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::VirtualPlatform;
use crate::correlate;
use crate::error::DiscoveryError;

/// Uniform inventory record for one discovered network device. Created
/// fresh on every synthesis call; an external caller persists these and
/// may later feed them back through
/// [`VirtualPlatform::restore_from_inventory`].
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetDeviceRecord {
    pub address: String,
    pub driver: String,
    pub vendor_id: String,
    pub device_id: String,
    #[serde(default)]
    pub mtu: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub link_speed: String,
    #[serde(default)]
    pub link_type: String,
    pub net_filter: String,
    pub total_functions: u32,
    pub configured_functions: u32,
    pub functions: Vec<NetDeviceFunction>,
}

/// One function of a [`NetDeviceRecord`]. The virtual platforms this
/// discovery runs on expose no multi-function hardware, so every record
/// carries exactly one synthesized entry mirroring the device itself.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetDeviceFunction {
    pub function_id: u32,
    pub address: String,
    pub driver: String,
    pub vendor_id: String,
    pub device_id: String,
    #[serde(default)]
    pub mtu: u32,
    #[serde(default)]
    pub mac: String,
}

impl VirtualPlatform {
    /// Builds one inventory record per correlated network-class PCI
    /// device. Devices that can't be fully resolved (no correlation
    /// entry, no driver) are logged and skipped; the call fails only when
    /// the PCI inventory itself is unusable.
    pub async fn synthesize(&self) -> Result<Vec<NetDeviceRecord>, DiscoveryError> {
        let pci_devices = self.list_pci_devices_checked().await?;

        let mut records = Vec::new();
        for device in &pci_devices {
            if !correlate::is_network_class(device) {
                continue;
            }

            let Some(association) = self.device_map.get(&device.address) else {
                warn!(address = %device.address, "device has no correlation entry, skipping");
                continue;
            };
            let Some(driver) = self.host.driver_name(&device.address).await else {
                warn!(address = %device.address, "couldn't resolve device driver, skipping");
                continue;
            };

            let mut record = NetDeviceRecord {
                address: device.address.clone(),
                driver,
                vendor_id: device.vendor_id.clone(),
                device_id: device.device_id.clone(),
                net_filter: association.network_id.clone(),
                ..Default::default()
            };

            if let Some(mtu) = self
                .host
                .netdev_mtu(&device.address)
                .await
                .filter(|mtu| *mtu > 0)
            {
                record.mtu = mtu;
            }
            if let Some(name) = self.host.virtual_interface_name(&device.address).await {
                record.mac = match self.host.netdev_mac(&name).await {
                    Some(mac) => mac,
                    // live lookup came up empty, settle for the MAC the
                    // correlation pass recorded
                    None => association.mac_address.clone(),
                };
                if let Some(link_speed) = self.host.link_speed(&name).await {
                    record.link_speed = link_speed;
                }
                if let Some(link_type) = self.host.link_type(&name).await {
                    record.link_type = link_type;
                }
                record.name = name;
            }

            // No multi-function hardware exists on these platforms; the
            // device stands in as its own sole function so downstream
            // consumers see a uniform shape.
            record.total_functions = 1;
            record.configured_functions = 1;
            record.functions.push(NetDeviceFunction {
                function_id: 0,
                address: record.address.clone(),
                driver: record.driver.clone(),
                vendor_id: record.vendor_id.clone(),
                device_id: record.device_id.clone(),
                mtu: record.mtu,
                mac: record.mac.clone(),
            });

            records.push(record);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use stratus_host_support::inventory::{
        MockHardwareInventory, MockHostIntrospect, PciDeviceInfo,
    };

    use super::*;

    fn pci_device(address: &str, class_id: &str) -> PciDeviceInfo {
        PciDeviceInfo {
            address: address.to_owned(),
            class_id: class_id.to_owned(),
            vendor_id: "1af4".to_owned(),
            device_id: "1000".to_owned(),
        }
    }

    fn inventory_with(devices: Vec<PciDeviceInfo>) -> MockHardwareInventory {
        let mut inventory = MockHardwareInventory::new();
        inventory
            .expect_list_pci_devices()
            .returning(move || Ok(devices.clone()));
        inventory
    }

    fn platform_with_map(
        inventory: MockHardwareInventory,
        host: MockHostIntrospect,
        entries: &[(&str, &str, &str)],
    ) -> VirtualPlatform {
        let mut platform = VirtualPlatform::new(Arc::new(inventory), Arc::new(host));
        let records: Vec<NetDeviceRecord> = entries
            .iter()
            .map(|(address, mac, net_filter)| NetDeviceRecord {
                address: (*address).to_owned(),
                mac: (*mac).to_owned(),
                net_filter: (*net_filter).to_owned(),
                ..Default::default()
            })
            .collect();
        platform.restore_from_inventory(&records);
        platform
    }

    #[tokio::test]
    async fn test_synthesizes_single_function_record() {
        let inventory = inventory_with(vec![pci_device("0000:04:00.0", "020000")]);
        let mut host = MockHostIntrospect::new();
        host.expect_driver_name()
            .returning(|_address| Some("virtio-pci".to_owned()));
        host.expect_netdev_mtu().returning(|_address| Some(1500));
        host.expect_virtual_interface_name()
            .returning(|_address| Some("ens4".to_owned()));
        host.expect_netdev_mac()
            .returning(|_name| Some("52:54:00:12:34:56".to_owned()));
        host.expect_link_speed()
            .returning(|_name| Some("10000 Mb/s".to_owned()));
        host.expect_link_type()
            .returning(|_name| Some("ethernet".to_owned()));

        let platform = platform_with_map(
            inventory,
            host,
            &[("0000:04:00.0", "aa:aa:aa:aa:aa:04", "openstack:net-4")],
        );

        let records = platform.synthesize().await.unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.address, "0000:04:00.0");
        assert_eq!(record.driver, "virtio-pci");
        assert_eq!(record.vendor_id, "1af4");
        assert_eq!(record.device_id, "1000");
        assert_eq!(record.mtu, 1500);
        assert_eq!(record.name, "ens4");
        // the live MAC wins over the correlated one
        assert_eq!(record.mac, "52:54:00:12:34:56");
        assert_eq!(record.link_speed, "10000 Mb/s");
        assert_eq!(record.link_type, "ethernet");
        assert_eq!(record.net_filter, "openstack:net-4");
        assert_eq!(record.total_functions, 1);
        assert_eq!(record.configured_functions, 1);
        assert_eq!(
            record.functions,
            vec![NetDeviceFunction {
                function_id: 0,
                address: "0000:04:00.0".to_owned(),
                driver: "virtio-pci".to_owned(),
                vendor_id: "1af4".to_owned(),
                device_id: "1000".to_owned(),
                mtu: 1500,
                mac: "52:54:00:12:34:56".to_owned(),
            }]
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_correlated_mac() {
        let inventory = inventory_with(vec![pci_device("0000:04:00.0", "020000")]);
        let mut host = MockHostIntrospect::new();
        host.expect_driver_name()
            .returning(|_address| Some("virtio-pci".to_owned()));
        host.expect_netdev_mtu().returning(|_address| None);
        host.expect_virtual_interface_name()
            .returning(|_address| Some("ens4".to_owned()));
        host.expect_netdev_mac().returning(|_name| None);
        host.expect_link_speed().returning(|_name| None);
        host.expect_link_type().returning(|_name| None);

        let platform = platform_with_map(
            inventory,
            host,
            &[("0000:04:00.0", "aa:aa:aa:aa:aa:04", "openstack:net-4")],
        );

        let records = platform.synthesize().await.unwrap();
        assert_eq!(records[0].mac, "aa:aa:aa:aa:aa:04");
        assert_eq!(records[0].mtu, 0);
        assert_eq!(records[0].functions[0].mac, "aa:aa:aa:aa:aa:04");
    }

    // A network-class device with neither a correlation entry nor a
    // driver is dropped from the output without failing the call.
    #[tokio::test]
    async fn test_skips_uncorrelated_and_driverless_devices() {
        let inventory = inventory_with(vec![
            pci_device("0000:03:00.0", "020000"), // no correlation entry
            pci_device("0000:04:00.0", "020000"), // correlated but no driver
            pci_device("0000:05:00.0", "010802"), // not a network device
        ]);
        let mut host = MockHostIntrospect::new();
        host.expect_driver_name().returning(|_address| None);

        let platform = platform_with_map(
            inventory,
            host,
            &[("0000:04:00.0", "aa:aa:aa:aa:aa:04", "openstack:net-4")],
        );

        let records = platform.synthesize().await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_empty_pci_inventory_is_fatal() {
        let inventory = inventory_with(vec![]);
        let platform = platform_with_map(inventory, MockHostIntrospect::new(), &[]);

        let error = platform.synthesize().await.unwrap_err();
        assert!(
            matches!(error, DiscoveryError::Environment { .. }),
            "unexpected error: {error}"
        );
    }

    // Restoring persisted records and synthesizing against unchanged
    // hardware reproduces the same set of bus addresses.
    #[tokio::test]
    async fn test_restore_then_synthesize_round_trip() {
        let persisted = [
            ("0000:04:00.0", "aa:aa:aa:aa:aa:04", "openstack:net-4"),
            ("0000:05:00.0", "aa:aa:aa:aa:aa:05", "openstack:net-5"),
        ];
        let inventory = inventory_with(vec![
            pci_device("0000:04:00.0", "020000"),
            pci_device("0000:05:00.0", "020000"),
        ]);
        let mut host = MockHostIntrospect::new();
        host.expect_driver_name()
            .returning(|_address| Some("virtio-pci".to_owned()));
        host.expect_netdev_mtu().returning(|_address| Some(1500));
        host.expect_virtual_interface_name().returning(|_address| None);

        let platform = platform_with_map(inventory, host, &persisted);

        let records = platform.synthesize().await.unwrap();
        let synthesized: HashSet<&str> =
            records.iter().map(|record| record.address.as_str()).collect();
        let restored: HashSet<&str> = persisted.iter().map(|(address, ..)| *address).collect();
        assert_eq!(synthesized, restored);

        // no live interface name resolved, so name and MAC stay unset
        assert!(
            records
                .iter()
                .all(|record| record.name.is_empty() && record.mac.is_empty())
        );
    }

    #[test]
    fn test_record_round_trips_through_json() {
        let record = NetDeviceRecord {
            address: "0000:04:00.0".to_owned(),
            driver: "virtio-pci".to_owned(),
            vendor_id: "1af4".to_owned(),
            device_id: "1000".to_owned(),
            mtu: 1500,
            name: "ens4".to_owned(),
            mac: "52:54:00:12:34:56".to_owned(),
            link_speed: "10000 Mb/s".to_owned(),
            link_type: "ethernet".to_owned(),
            net_filter: "openstack:net-4".to_owned(),
            total_functions: 1,
            configured_functions: 1,
            functions: vec![NetDeviceFunction {
                function_id: 0,
                address: "0000:04:00.0".to_owned(),
                driver: "virtio-pci".to_owned(),
                vendor_id: "1af4".to_owned(),
                device_id: "1000".to_owned(),
                mtu: 1500,
                mac: "52:54:00:12:34:56".to_owned(),
            }],
        };

        let encoded = serde_json::to_string(&record).unwrap();
        let decoded: NetDeviceRecord = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, record);
    }
}
