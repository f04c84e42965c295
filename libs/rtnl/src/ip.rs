//! Utilities for reading the addresses assigned to links

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use futures::TryStreamExt;
use ipnet::IpNet;
use netlink_packet_route::{address::nlas::Nla, AddressMessage};
use rtnetlink::Handle;

/// Address families that can be requested from [`addr_list`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Check if an address belongs to this family
    #[must_use]
    pub fn contains(self, addr: &IpAddr) -> bool {
        matches!(
            (self, addr),
            (AddressFamily::V4, IpAddr::V4(_)) | (AddressFamily::V6, IpAddr::V6(_))
        )
    }
}

/// List every address of the given family assigned to a link
pub async fn addr_list(
    rt_handle: &Handle,
    link_index: u32,
    family: AddressFamily,
) -> Result<Vec<IpNet>, rtnetlink::Error> {
    log::trace!("Listing {:?} addresses on link {}", family, link_index);
    let messages: Vec<AddressMessage> = rt_handle
        .address()
        .get()
        .set_link_index_filter(link_index)
        .execute()
        .try_collect()
        .await
        .map_err(|err| {
            log::error!("Failed to list addresses on link {}", link_index);
            log::error!("{}", err);
            err
        })?;

    Ok(messages
        .iter()
        .filter_map(address_of)
        .filter(|net| family.contains(&net.addr()))
        .collect())
}

/// Pull the interface address and prefix length out of an address message
fn address_of(message: &AddressMessage) -> Option<IpNet> {
    let prefix_len = message.header.prefix_len;
    message.nlas.iter().find_map(|nla| match nla {
        Nla::Address(bytes) => bytes_to_net(bytes, prefix_len),
        _ => None,
    })
}

/// Interpret raw address bytes as an IPv4 or IPv6 network
fn bytes_to_net(bytes: &[u8], prefix_len: u8) -> Option<IpNet> {
    let addr = match bytes.len() {
        4 => IpAddr::V4(Ipv4Addr::from(<[u8; 4]>::try_from(bytes).ok()?)),
        16 => IpAddr::V6(Ipv6Addr::from(<[u8; 16]>::try_from(bytes).ok()?)),
        _ => return None,
    };
    IpNet::new(addr, prefix_len).ok()
}
