//! Decides which address a container gets

use std::{fmt, net::Ipv4Addr, time::Duration};

use ipnet::Ipv4Net;

use crate::{config::NetworkConfig, error::AllocationError, metadata::IpFinder};

/// The address chosen for a container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub ip: Ipv4Addr,
    pub prefix_len: u8,
}

impl ResolvedAddress {
    /// Parse an `a.b.c.d/N` string
    pub fn parse(cidr: &str) -> Result<Self, AllocationError> {
        let net: Ipv4Net = cidr.parse().map_err(|source| AllocationError::InvalidCidr {
            cidr: cidr.to_owned(),
            source,
        })?;
        Ok(Self {
            ip: net.addr(),
            prefix_len: net.prefix_len(),
        })
    }

    /// Get the network mask implied by the prefix length
    #[must_use]
    pub fn netmask(&self) -> Ipv4Addr {
        Ipv4Net::from(*self).netmask()
    }
}

impl From<ResolvedAddress> for Ipv4Net {
    fn from(address: ResolvedAddress) -> Self {
        // The prefix length was validated when the address was parsed
        Ipv4Net::new(address.ip, address.prefix_len).unwrap_or_else(|_| Ipv4Net::from(address.ip))
    }
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.prefix_len)
    }
}

/// Pick the address for a container.
///
/// An explicit `IPAddress` always wins and the metadata service is not consulted. Otherwise
/// the metadata service is asked (bounded by `deadline`) and its answer gets the subnet
/// prefix appended.
pub async fn resolve_address<F: IpFinder>(
    config: &NetworkConfig,
    container_id: &str,
    finder: &F,
    deadline: Duration,
) -> Result<ResolvedAddress, AllocationError> {
    let cidr = match config.ipam.ip_address.as_str() {
        "" => {
            let ip = tokio::time::timeout(
                deadline,
                finder.get_ip(container_id, &config.ipam.container_uuid),
            )
            .await
            .map_err(|_| {
                log::error!("Metadata lookup for {} timed out", container_id);
                AllocationError::MetadataTimeout(deadline)
            })??;

            match ip {
                Some(ip) if !ip.is_empty() => format!("{}{}", ip, config.subnet_prefix()?),
                _ => return Err(AllocationError::NoAddressFound),
            }
        }
        explicit if explicit.contains('/') => explicit.to_owned(),
        explicit => format!("{}{}", explicit, config.subnet_prefix()?),
    };
    log::debug!("ip: {}", cidr);

    ResolvedAddress::parse(&cidr)
}
