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

//! Discovery core for guests running on an OpenStack virtual platform.
//!
//! Reconciles three independently sourced views of the guest's network
//! hardware -- instance metadata, the declared network topology, and live
//! hardware enumeration -- into one map from physical bus address to
//! logical network identity, and synthesizes uniform per-device inventory
//! records from that map.

use std::sync::Arc;

use stratus_host_support::inventory::{HardwareInventory, HostIntrospect};

pub mod acquire;
pub mod correlate;
pub mod error;
pub mod metadata;
pub mod synthesize;

pub use correlate::{CorrelationMap, DeviceAssociation};
pub use error::DiscoveryError;
pub use synthesize::{NetDeviceFunction, NetDeviceRecord};

/// Owner of the device-to-network correlation map and the facilities used
/// to build it. One instance per process; embeddings that share it across
/// threads must serialize calls that read or replace the map.
pub struct VirtualPlatform {
    inventory: Arc<dyn HardwareInventory>,
    host: Arc<dyn HostIntrospect>,
    device_map: CorrelationMap,
}

impl VirtualPlatform {
    pub fn new(inventory: Arc<dyn HardwareInventory>, host: Arc<dyn HostIntrospect>) -> Self {
        VirtualPlatform {
            inventory,
            host,
            device_map: CorrelationMap::new(),
        }
    }

    /// The current device-to-network map. Rebuilt wholesale by
    /// [`Self::correlate`] and [`Self::restore_from_inventory`], never
    /// patched in place.
    pub fn device_map(&self) -> &CorrelationMap {
        &self.device_map
    }

    /// One full discovery cycle: acquire both metadata documents, then
    /// rebuild the correlation map from them and the live PCI inventory.
    pub async fn discover(
        &mut self,
        sources: &acquire::MetadataSources,
        use_host_path: bool,
    ) -> Result<(), DiscoveryError> {
        let (metadata, network_data) =
            acquire::acquire(sources, self.inventory.as_ref(), use_host_path).await?;
        self.correlate(&metadata, &network_data).await
    }
}
