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
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;

const DEFAULT_SYSFS_BASE: &str = "/sys";

// bus:device.function, e.g. 0000:01:00.0
const PCI_ADDRESS_PATTERN: &str = r"^[0-9a-fA-F]{4}:[0-9a-fA-F]{2}:[0-9a-fA-F]{2}\.[0-7]$";

/// Read-only view of a sysfs tree. The base is configurable so tests can
/// point it at a synthetic tree.
#[derive(Debug, Clone)]
pub struct SysfsRoot {
    base: PathBuf,
}

impl Default for SysfsRoot {
    fn default() -> Self {
        SysfsRoot {
            base: PathBuf::from(DEFAULT_SYSFS_BASE),
        }
    }
}

impl SysfsRoot {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        SysfsRoot { base: base.into() }
    }

    fn class_net(&self) -> PathBuf {
        self.base.join("class/net")
    }

    fn netdev_dir(&self, name: &str) -> PathBuf {
        self.class_net().join(name)
    }

    fn pci_devices_dir(&self) -> PathBuf {
        self.base.join("bus/pci/devices")
    }

    fn pci_device_dir(&self, address: &str) -> PathBuf {
        self.pci_devices_dir().join(address)
    }

    /// Names of all network interfaces known to the kernel, sorted so
    /// callers iterate deterministically.
    pub fn net_device_names(&self) -> io::Result<Vec<String>> {
        let mut names = read_entry_names(&self.class_net())?;
        names.sort();
        Ok(names)
    }

    /// Contents of /sys/class/net/<name>/address -- optimized for a
    /// human-readable EUI-48 (colon-separated hex bytes); trailing
    /// whitespace is trimmed.
    pub fn netdev_address(&self, name: &str) -> io::Result<String> {
        read_trimmed(&self.netdev_dir(name).join("address"))
    }

    /// PCI address owning a network interface, resolved through the
    /// `device` symlink. Virtio interfaces hang off an intermediate
    /// virtioN node, so the link target is walked upwards until a
    /// component looks like a PCI address. None for interfaces with no
    /// backing PCI device (loopback, tunnels).
    pub fn netdev_pci_address(&self, name: &str) -> Option<String> {
        let target = fs::read_link(self.netdev_dir(name).join("device")).ok()?;
        let pattern = Regex::new(PCI_ADDRESS_PATTERN).ok()?;
        target.components().rev().find_map(|component| {
            let component = component.as_os_str().to_str()?;
            pattern
                .is_match(component)
                .then(|| component.to_lowercase())
        })
    }

    /// Link speed in Mb/s, when the driver exposes one. Interfaces that
    /// are down report -1, which fails the parse and comes back as None.
    pub fn netdev_speed(&self, name: &str) -> Option<u32> {
        read_trimmed(&self.netdev_dir(name).join("speed"))
            .ok()?
            .parse()
            .ok()
    }

    /// Addresses of all enumerated PCI devices, sorted.
    pub fn pci_device_addresses(&self) -> io::Result<Vec<String>> {
        let mut addresses = read_entry_names(&self.pci_devices_dir())?;
        addresses.sort();
        Ok(addresses)
    }

    /// A single hex identity attribute (class, vendor, device) with the 0x
    /// prefix stripped, e.g. "020000" for a network-class device.
    pub fn pci_attribute(&self, address: &str, attribute: &str) -> io::Result<String> {
        let raw = read_trimmed(&self.pci_device_dir(address).join(attribute))?;
        Ok(raw.trim_start_matches("0x").to_lowercase())
    }

    /// Name of the driver bound to a PCI device, if any.
    pub fn pci_driver_name(&self, address: &str) -> Option<String> {
        let target = fs::read_link(self.pci_device_dir(address).join("driver")).ok()?;
        Some(target.file_name()?.to_str()?.to_owned())
    }

    /// Kernel network-interface name attached to a PCI device. Most
    /// devices expose it under net/ directly; virtio devices interpose a
    /// virtioN node between the PCI device and the interface.
    pub fn pci_net_name(&self, address: &str) -> Option<String> {
        let device_dir = self.pci_device_dir(address);
        if let Some(name) = first_entry_name(&device_dir.join("net")) {
            return Some(name);
        }
        let entries = read_entry_names(&device_dir).ok()?;
        entries
            .iter()
            .filter(|entry| entry.starts_with("virtio"))
            .find_map(|entry| first_entry_name(&device_dir.join(entry).join("net")))
    }
}

fn read_trimmed(path: &Path) -> io::Result<String> {
    fs::read_to_string(path).map(|contents| contents.trim().to_owned())
}

fn read_entry_names(dir: &Path) -> io::Result<Vec<String>> {
    fs::read_dir(dir)?
        .map(|entry| entry.map(|entry| entry.file_name().to_string_lossy().into_owned()))
        .collect()
}

fn first_entry_name(dir: &Path) -> Option<String> {
    let mut names = read_entry_names(dir).ok()?;
    names.sort();
    names.into_iter().next()
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::symlink;

    use super::*;

    // Lay out the slice of a sysfs tree these lookups walk:
    //   class/net/<name>/{address,speed,device -> PCI node}
    //   bus/pci/devices/<addr>/{class,vendor,device,driver,net/<name>}
    fn fake_sysfs() -> (tempfile::TempDir, SysfsRoot) {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path();

        let pci_dir = base.join("bus/pci/devices/0000:00:03.0");
        fs::create_dir_all(pci_dir.join("net/eth0")).unwrap();
        fs::write(pci_dir.join("class"), "0x020000\n").unwrap();
        fs::write(pci_dir.join("vendor"), "0x15b3\n").unwrap();
        fs::write(pci_dir.join("device"), "0x101e\n").unwrap();
        fs::create_dir_all(base.join("drivers/mlx5_core")).unwrap();
        symlink(base.join("drivers/mlx5_core"), pci_dir.join("driver")).unwrap();

        // virtio device: interface name sits one level down
        let virtio_pci_dir = base.join("bus/pci/devices/0000:00:05.0");
        fs::create_dir_all(virtio_pci_dir.join("virtio2/net/eth1")).unwrap();
        fs::write(virtio_pci_dir.join("class"), "0x020000\n").unwrap();
        fs::write(virtio_pci_dir.join("vendor"), "0x1af4\n").unwrap();
        fs::write(virtio_pci_dir.join("device"), "0x1041\n").unwrap();

        let eth0 = base.join("class/net/eth0");
        fs::create_dir_all(&eth0).unwrap();
        fs::write(eth0.join("address"), "aa:bb:cc:dd:ee:01\n").unwrap();
        fs::write(eth0.join("speed"), "10000\n").unwrap();
        symlink("../../bus/pci/devices/0000:00:03.0", eth0.join("device")).unwrap();

        let eth1 = base.join("class/net/eth1");
        fs::create_dir_all(&eth1).unwrap();
        fs::write(eth1.join("address"), "aa:bb:cc:dd:ee:02\n").unwrap();
        fs::write(eth1.join("speed"), "-1\n").unwrap();
        symlink(
            "../../bus/pci/devices/0000:00:05.0/virtio2",
            eth1.join("device"),
        )
        .unwrap();

        let lo = base.join("class/net/lo");
        fs::create_dir_all(&lo).unwrap();
        fs::write(lo.join("address"), "00:00:00:00:00:00\n").unwrap();
        fs::create_dir_all(base.join("devices/virtual/net/lo")).unwrap();

        let sysfs = SysfsRoot::new(base);
        (dir, sysfs)
    }

    #[test]
    fn test_net_device_names_sorted() {
        let (_dir, sysfs) = fake_sysfs();
        let names = sysfs.net_device_names().unwrap();
        assert_eq!(names, vec!["eth0", "eth1", "lo"]);
    }

    #[test]
    fn test_netdev_address_trimmed() {
        let (_dir, sysfs) = fake_sysfs();
        assert_eq!(sysfs.netdev_address("eth0").unwrap(), "aa:bb:cc:dd:ee:01");
    }

    #[test]
    fn test_netdev_pci_address_direct_and_virtio() {
        let (_dir, sysfs) = fake_sysfs();
        assert_eq!(
            sysfs.netdev_pci_address("eth0").as_deref(),
            Some("0000:00:03.0")
        );
        // walks up past the virtioN component
        assert_eq!(
            sysfs.netdev_pci_address("eth1").as_deref(),
            Some("0000:00:05.0")
        );
        assert_eq!(sysfs.netdev_pci_address("lo"), None);
    }

    #[test]
    fn test_netdev_speed_down_interface_is_none() {
        let (_dir, sysfs) = fake_sysfs();
        assert_eq!(sysfs.netdev_speed("eth0"), Some(10000));
        assert_eq!(sysfs.netdev_speed("eth1"), None);
        assert_eq!(sysfs.netdev_speed("lo"), None);
    }

    #[test]
    fn test_pci_attributes_strip_hex_prefix() {
        let (_dir, sysfs) = fake_sysfs();
        assert_eq!(
            sysfs.pci_attribute("0000:00:03.0", "class").unwrap(),
            "020000"
        );
        assert_eq!(
            sysfs.pci_attribute("0000:00:03.0", "vendor").unwrap(),
            "15b3"
        );
        assert_eq!(
            sysfs.pci_attribute("0000:00:03.0", "device").unwrap(),
            "101e"
        );
    }

    #[test]
    fn test_pci_driver_name() {
        let (_dir, sysfs) = fake_sysfs();
        assert_eq!(
            sysfs.pci_driver_name("0000:00:03.0").as_deref(),
            Some("mlx5_core")
        );
        assert_eq!(sysfs.pci_driver_name("0000:00:05.0"), None);
    }

    #[test]
    fn test_pci_net_name_direct_and_virtio() {
        let (_dir, sysfs) = fake_sysfs();
        assert_eq!(sysfs.pci_net_name("0000:00:03.0").as_deref(), Some("eth0"));
        assert_eq!(sysfs.pci_net_name("0000:00:05.0").as_deref(), Some("eth1"));
        assert_eq!(sysfs.pci_net_name("0000:00:07.0"), None);
    }
}
