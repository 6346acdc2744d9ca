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

use futures_util::TryStreamExt;
use netlink_packet_route::link::{LinkAttribute, LinkMessage};
pub use netlink_packet_route::link::LinkLayerType;
use {rtnetlink, tokio};

#[derive(Clone, Debug)]
// The attribute fields are Option<T> because the netlink protocol allows
// them to be absent (even though we have no reason to believe they'd ever
// actually be missing).
pub struct InterfaceLinkData {
    pub link_type: LinkLayerType,
    pub address: Option<Vec<u8>>,
    pub mtu: Option<u32>,
}

impl InterfaceLinkData {
    /// Hardware address as lower-case colon-separated hex, the format the
    /// rest of the stack compares MACs in.
    pub fn mac_string(&self) -> Option<String> {
        self.address
            .as_ref()
            .filter(|bytes| !bytes.is_empty())
            .map(|bytes| {
                bytes
                    .iter()
                    .map(|byte| format!("{byte:02x}"))
                    .collect::<Vec<_>>()
                    .join(":")
            })
    }

    /// Stable label for the link layer type, or None for types we don't
    /// hand out to inventory consumers.
    pub fn link_type_label(&self) -> Option<&'static str> {
        match self.link_type {
            LinkLayerType::Ether => Some("ethernet"),
            LinkLayerType::Infiniband => Some("infiniband"),
            LinkLayerType::Loopback => Some("loopback"),
            _ => None,
        }
    }
}

impl From<LinkMessage> for InterfaceLinkData {
    fn from(link_message: LinkMessage) -> Self {
        let link_type = link_message.header.link_layer_type;
        let address = link_message
            .attributes
            .iter()
            .find_map(|attribute| match attribute {
                LinkAttribute::Address(address) => Some(address.to_owned()),
                _ => None,
            });
        let mtu = link_message
            .attributes
            .iter()
            .find_map(|attribute| match attribute {
                LinkAttribute::Mtu(size) => Some(*size),
                _ => None,
            });
        InterfaceLinkData {
            link_type,
            address,
            mtu,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LinkQueryError {
    #[error("couldn't open netlink connection: {0}")]
    Connection(#[from] std::io::Error),
    #[error("netlink communication failed: {0}")]
    Communication(rtnetlink::Error),
}

// Retrieve the link data (hardware address, MTU, link layer type) for one
// interface. This is roughly equivalent to `ip link show dev <name>` since
// we're using the same netlink interface under the hood as that command.
// Returns Ok(None) when the kernel doesn't know the name.
pub async fn get_interface_link(name: &str) -> Result<Option<InterfaceLinkData>, LinkQueryError> {
    let (netlink_connection, rtnetlink_handle, _receiver) = rtnetlink::new_connection()?;

    // We have to spawn off the netlink connection because of the architecture
    // of `netlink_proto::Connection`, which runs in the background and owns
    // the socket. We communicate with it via channel messages, and it will exit
    // when both `rtnetlink_handle` and `_receiver` go out of scope.
    tokio::spawn(netlink_connection);

    let mut responses = rtnetlink_handle
        .link()
        .get()
        .match_name(name.to_owned())
        .execute();
    match responses.try_next().await {
        Ok(link_message) => Ok(link_message.map(InterfaceLinkData::from)),
        // An unknown interface name comes back as a netlink-level error
        // (ENODEV) rather than an empty dump.
        Err(rtnetlink::Error::NetlinkError(_)) => Ok(None),
        Err(error) => Err(LinkQueryError::Communication(error)),
    }
}
