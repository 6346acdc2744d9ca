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

//! On-the-wire model of the two OpenStack metadata documents (2018-08-27
//! format). Decoded once during acquisition and treated as read-only
//! afterwards, except for the bus-address correction pass.

use serde::{Deserialize, Serialize};

/// Device structure within meta_data.json. The declared `address` is a
/// best-effort hint from the hypervisor; the correction pass may overwrite
/// it with the address the guest actually observes.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vf_trusted: Option<bool>,
    #[serde(rename = "type", default)]
    pub device_type: String,
    #[serde(default)]
    pub mac: String,
    #[serde(default)]
    pub bus: String,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

/// meta_data.json, reduced to the fields discovery consumes.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceMetadata {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub launch_index: i32,
    #[serde(default)]
    pub availability_zone: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub devices: Vec<DeviceDescriptor>,
}

/// One virtual network attachment point in network_data.json.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkLink {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vif_id: Option<String>,
    #[serde(rename = "type", default)]
    pub link_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u32>,
    #[serde(default)]
    pub ethernet_mac_address: String,
}

/// One logical network in network_data.json, tied to a link by id.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Network {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub network_type: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub network_id: String,
}

/// network_data.json. Service entries in the document are not modeled.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkData {
    #[serde(default)]
    pub links: Vec<NetworkLink>,
    #[serde(default)]
    pub networks: Vec<Network>,
}
