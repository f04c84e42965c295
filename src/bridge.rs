//! Access to the bridge interface and the metadata route that goes through it

use std::{future::Future, net::Ipv4Addr};

use ipnet::{IpNet, Ipv4Net};
use rtnl::ip::AddressFamily;

use crate::{
    config::{NetworkConfig, Route},
    error::{ConfigError, LookupError},
};

/// Read access to the host's interface table
pub trait InterfaceLookup {
    /// List the IPv4 addresses configured on the named interface
    fn addresses_of(
        &self,
        interface_name: &str,
    ) -> impl Future<Output = Result<Vec<Ipv4Net>, LookupError>> + Send;
}

/// Interface lookups backed by rtnetlink. Every call queries the kernel.
pub struct NetlinkLookup {
    rt_handle: rtnetlink::Handle,
}

impl NetlinkLookup {
    /// Open a netlink connection on the current tokio runtime
    pub fn new() -> Result<Self, LookupError> {
        Ok(Self {
            rt_handle: rtnl::new_handle()?,
        })
    }
}

impl InterfaceLookup for NetlinkLookup {
    async fn addresses_of(&self, interface_name: &str) -> Result<Vec<Ipv4Net>, LookupError> {
        let link_index = rtnl::link::get_link_index(&self.rt_handle, interface_name)
            .await?
            .ok_or_else(|| LookupError::InterfaceNotFound(interface_name.to_owned()))?;

        Ok(
            rtnl::ip::addr_list(&self.rt_handle, link_index, AddressFamily::V4)
                .await?
                .into_iter()
                .filter_map(|net| match net {
                    IpNet::V4(net) => Some(net),
                    IpNet::V6(_) => None,
                })
                .collect(),
        )
    }
}

/// Build the host route to the metadata service via the bridge's own address.
///
/// The bridge must carry exactly one IPv4 address. Multi-homed bridges are not supported.
pub async fn derive_metadata_route<L: InterfaceLookup>(
    config: &NetworkConfig,
    metadata_address: Ipv4Addr,
    lookup: &L,
) -> Result<Route, ConfigError> {
    let addresses = lookup
        .addresses_of(&config.bridge_name)
        .await
        .map_err(|source| ConfigError::BridgeLookupFailed {
            name: config.bridge_name.clone(),
            source,
        })?;

    match addresses.as_slice() {
        [bridge_net] => {
            log::debug!(
                "Routing metadata traffic for {} via bridge {} ({})",
                metadata_address,
                config.bridge_name,
                bridge_net
            );
            Ok(Route {
                dst: Ipv4Net::from(metadata_address),
                gw: Some(bridge_net.addr()),
            })
        }
        _ => Err(ConfigError::BridgeAddressCount {
            name: config.bridge_name.clone(),
            count: addresses.len(),
        }),
    }
}
