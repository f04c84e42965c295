//! What the plugin prints back to the runtime

use std::io::Write;

use ipnet::Ipv4Net;

use crate::{config::Route, resolver::ResolvedAddress};

/// CNI spec version this plugin speaks
pub const CNI_VERSION: &str = "0.1.0";

/// Error code for failures that have no more specific CNI code
pub const CODE_GENERIC: u32 = 100;

/// Error code for an unknown or missing `CNI_COMMAND`
pub const CODE_INVALID_ENVIRONMENT: u32 = 4;

/// IPv4 settings for the container interface
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct IpConfig {
    pub ip: Ipv4Net,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
}

/// DNS settings. This plugin never sets any
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct Dns {}

/// A successful allocation
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AllocationResult {
    pub ip4: IpConfig,
    pub dns: Dns,
}

impl AllocationResult {
    /// Write the result as JSON
    pub fn print<W: Write>(&self, out: W) -> serde_json::Result<()> {
        serde_json::to_writer(out, self)
    }
}

/// Combine the resolved address with the configured routes.
///
/// The metadata route always comes last.
#[must_use]
pub fn assemble(
    address: ResolvedAddress,
    static_routes: &[Route],
    metadata_route: Route,
) -> AllocationResult {
    let mut routes = static_routes.to_vec();
    routes.push(metadata_route);
    AllocationResult {
        ip4: IpConfig {
            ip: address.into(),
            routes,
        },
        dns: Dns::default(),
    }
}

/// The error document printed when a command fails
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginError {
    pub cni_version: String,
    pub code: u32,
    pub msg: String,
}

impl PluginError {
    #[must_use]
    pub fn new(code: u32, msg: impl ToString) -> Self {
        Self {
            cni_version: CNI_VERSION.to_owned(),
            code,
            msg: msg.to_string(),
        }
    }

    /// Write the error as JSON
    pub fn print<W: Write>(&self, out: W) -> serde_json::Result<()> {
        serde_json::to_writer(out, self)
    }
}

/// Answer to the `VERSION` command
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub cni_version: String,
    pub supported_versions: Vec<String>,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            cni_version: CNI_VERSION.to_owned(),
            supported_versions: vec![CNI_VERSION.to_owned()],
        }
    }
}
