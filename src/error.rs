//! Errors surfaced while allocating an address

use std::time::Duration;

/// Problems with the network configuration or the bridge it points at
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load netconf: {0}")]
    MalformedJson(#[source] serde_json::Error),
    #[error("IPAM config missing 'ipam' key")]
    MissingIpam,
    #[error("failed to parse args {args}: {reason}")]
    MalformedArgs { args: String, reason: String },
    #[error("bridge subnet {0:?} has no prefix length")]
    MalformedSubnet(String),
    #[error("failed to look up bridge {name}: {source}")]
    BridgeLookupFailed {
        name: String,
        #[source]
        source: LookupError,
    },
    #[error("expected exactly one IPv4 address on bridge {name}, found {count}")]
    BridgeAddressCount { name: String, count: usize },
    #[error("invalid metadata address {0:?}")]
    InvalidMetadataAddress(String),
}

/// Failures while reading the host's interface table
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("interface {0} not found")]
    InterfaceNotFound(String),
    #[error(transparent)]
    Netlink(#[from] rtnetlink::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Anything that stops an allocation from producing a result
#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("No IP address found")]
    NoAddressFound,
    #[error("invalid CIDR {cidr:?}: {source}")]
    InvalidCidr {
        cidr: String,
        #[source]
        source: ipnet::AddrParseError,
    },
    #[error("metadata service unavailable: {0}")]
    MetadataUnavailable(#[from] rancher_metadata::Error),
    #[error("metadata service did not answer within {0:?}")]
    MetadataTimeout(Duration),
}
