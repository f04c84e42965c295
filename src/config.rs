//! The CNI network configuration handed to the plugin on stdin

use std::{net::Ipv4Addr, path::Path, time::Duration};

use ipnet::Ipv4Net;

use crate::{args::CniArgs, error::ConfigError};

/// Environment variable overriding the metadata service address
pub const METADATA_ADDRESS_ENV: &str = "RANCHER_METADATA_ADDRESS";

/// Environment variable overriding the metadata request timeout, in seconds
pub const METADATA_TIMEOUT_ENV: &str = "RANCHER_METADATA_TIMEOUT";

/// How long to wait on the metadata service when nothing else is configured
pub const DEFAULT_METADATA_TIMEOUT: Duration = Duration::from_secs(30);

/// A static route handed to the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Route {
    /// Destination network
    pub dst: Ipv4Net,
    /// Next hop. Omitted routes use the interface's default gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gw: Option<Ipv4Addr>,
}

/// The `ipam` section of the network configuration, with runtime overrides applied
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpamConfig {
    #[serde(rename = "type", default)]
    pub plugin_type: String,
    #[serde(default)]
    pub log_to_file: String,
    #[serde(default)]
    pub is_debug_level: String,
    /// Prefix length in `/N` form, overriding the one in the bridge subnet
    #[serde(default)]
    pub subnet_prefix_size: String,
    #[serde(default)]
    pub routes: Vec<Route>,
    #[serde(rename = "RancherContainerUUID", default)]
    pub container_uuid: String,
    /// Address to assign instead of asking the metadata service
    #[serde(rename = "IPAddress", default)]
    pub ip_address: String,
}

impl IpamConfig {
    /// Apply runtime overrides, producing a new config. Override values always win.
    #[must_use]
    pub fn with_overrides(&self, overrides: &CniArgs) -> Self {
        let pick = |base: &str, over: &Option<String>| {
            over.clone().unwrap_or_else(|| base.to_owned())
        };
        Self {
            plugin_type: self.plugin_type.clone(),
            log_to_file: pick(&self.log_to_file, &overrides.log_to_file),
            is_debug_level: pick(&self.is_debug_level, &overrides.is_debug_level),
            subnet_prefix_size: self.subnet_prefix_size.clone(),
            routes: self.routes.clone(),
            container_uuid: pick(&self.container_uuid, &overrides.container_uuid),
            ip_address: pick(&self.ip_address, &overrides.ip_address),
        }
    }

    /// Check if debug logging was requested
    #[must_use]
    pub fn debug_enabled(&self) -> bool {
        self.is_debug_level == "true"
    }

    /// Get the file logs should be appended to, if any
    #[must_use]
    pub fn log_file(&self) -> Option<&Path> {
        match self.log_to_file.as_str() {
            "" => None,
            path => Some(Path::new(path)),
        }
    }
}

/// Network configuration as it arrives on stdin, before validation
#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNetworkConfig {
    #[serde(default)]
    cni_version: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "bridge", default)]
    bridge_name: String,
    #[serde(default)]
    bridge_subnet: String,
    #[serde(default)]
    ipam: Option<IpamConfig>,
}

/// A validated network configuration for one allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub cni_version: String,
    pub name: String,
    /// Name of the bridge interface containers are attached to
    pub bridge_name: String,
    /// Subnet of the bridge in CIDR notation
    pub bridge_subnet: String,
    pub ipam: IpamConfig,
}

impl NetworkConfig {
    /// Load the network configuration and merge the runtime's `CNI_ARGS` into its IPAM section
    pub fn load(bytes: &[u8], args: &str) -> Result<Self, ConfigError> {
        let raw: RawNetworkConfig =
            serde_json::from_slice(bytes).map_err(ConfigError::MalformedJson)?;
        let ipam = raw.ipam.ok_or(ConfigError::MissingIpam)?;
        let overrides = CniArgs::parse(args)?;

        Ok(Self {
            cni_version: raw.cni_version,
            name: raw.name,
            bridge_name: raw.bridge_name,
            bridge_subnet: raw.bridge_subnet,
            ipam: ipam.with_overrides(&overrides),
        })
    }

    /// Get the prefix length (in `/N` form) assigned addresses should carry
    pub fn subnet_prefix(&self) -> Result<String, ConfigError> {
        if !self.ipam.subnet_prefix_size.is_empty() {
            return Ok(self.ipam.subnet_prefix_size.clone());
        }
        match self.bridge_subnet.split_once('/') {
            Some((_, prefix)) => Ok(format!("/{prefix}")),
            None => Err(ConfigError::MalformedSubnet(self.bridge_subnet.clone())),
        }
    }
}

/// Where and how patiently to reach the metadata service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataSettings {
    /// Address of the metadata service. Empty selects the default
    pub address: String,
    /// Upper bound on each metadata round-trip
    pub timeout: Duration,
}

impl MetadataSettings {
    /// Read the settings from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the settings through an arbitrary variable lookup
    #[must_use]
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Self {
        let address = lookup(METADATA_ADDRESS_ENV)
            .filter(|address| !address.is_empty())
            .unwrap_or_else(|| rancher_metadata::DEFAULT_METADATA_ADDRESS.to_owned());

        let timeout = match lookup(METADATA_TIMEOUT_ENV) {
            // A zero timeout would expire before the first request goes out
            Some(raw) => match raw.parse::<u64>() {
                Ok(seconds) if seconds > 0 => Duration::from_secs(seconds),
                _ => {
                    log::warn!(
                        "Ignoring invalid {}={:?}, using {:?}",
                        METADATA_TIMEOUT_ENV,
                        raw,
                        DEFAULT_METADATA_TIMEOUT
                    );
                    DEFAULT_METADATA_TIMEOUT
                }
            },
            None => DEFAULT_METADATA_TIMEOUT,
        };

        Self { address, timeout }
    }

    /// Get the metadata service address as an IPv4 address, for routing
    pub fn ipv4_address(&self) -> Result<Ipv4Addr, ConfigError> {
        self.address
            .parse()
            .map_err(|_| ConfigError::InvalidMetadataAddress(self.address.clone()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const NETCONF: &str = r#"{
        "cniVersion": "0.1.0",
        "name": "rancher-cni-network",
        "type": "rancher-bridge",
        "bridge": "docker0",
        "bridgeSubnet": "10.42.0.0/16",
        "ipam": {
            "type": "rancher-cni-ipam",
            "logToFile": "/var/log/rancher-cni.log",
            "isDebugLevel": "false",
            "routes": [
                { "dst": "0.0.0.0/0", "gw": "10.42.0.1" },
                { "dst": "192.168.0.0/16" }
            ]
        }
    }"#;

    #[test]
    fn test_load() {
        let config = NetworkConfig::load(NETCONF.as_bytes(), "").unwrap();
        assert_eq!(config.name, "rancher-cni-network");
        assert_eq!(config.bridge_name, "docker0");
        assert_eq!(config.bridge_subnet, "10.42.0.0/16");
        assert_eq!(config.ipam.plugin_type, "rancher-cni-ipam");
        assert_eq!(
            config.ipam.routes,
            vec![
                Route {
                    dst: "0.0.0.0/0".parse().unwrap(),
                    gw: Some(Ipv4Addr::new(10, 42, 0, 1)),
                },
                Route {
                    dst: "192.168.0.0/16".parse().unwrap(),
                    gw: None,
                },
            ]
        );
        assert_eq!(config.ipam.log_file(), Some(Path::new("/var/log/rancher-cni.log")));
        assert!(!config.ipam.debug_enabled());
    }

    #[test]
    fn test_load_merges_args() {
        let config = NetworkConfig::load(
            NETCONF.as_bytes(),
            "IgnoreUnknown=1;RancherContainerUUID=5e7d1c;IPAddress=10.42.7.7/16;IsDebugLevel=true",
        )
        .unwrap();
        assert_eq!(config.ipam.container_uuid, "5e7d1c");
        assert_eq!(config.ipam.ip_address, "10.42.7.7/16");
        assert!(config.ipam.debug_enabled());
        // Untouched fields keep their document values
        assert_eq!(config.ipam.log_to_file, "/var/log/rancher-cni.log");
    }

    #[test]
    fn test_overrides_do_not_mutate_base() {
        let base = IpamConfig {
            ip_address: "10.42.0.2/16".to_owned(),
            ..IpamConfig::default()
        };
        let merged = base.with_overrides(&CniArgs {
            ip_address: Some("10.42.0.3/16".to_owned()),
            ..CniArgs::default()
        });
        assert_eq!(base.ip_address, "10.42.0.2/16");
        assert_eq!(merged.ip_address, "10.42.0.3/16");
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            NetworkConfig::load(b"{\"name\": ", ""),
            Err(ConfigError::MalformedJson(_))
        ));
    }

    #[test]
    fn test_missing_ipam() {
        let netconf = br#"{"name":"net","bridge":"docker0","bridgeSubnet":"10.42.0.0/16"}"#;
        assert!(matches!(
            NetworkConfig::load(netconf, ""),
            Err(ConfigError::MissingIpam)
        ));
    }

    #[test]
    fn test_malformed_args() {
        assert!(matches!(
            NetworkConfig::load(NETCONF.as_bytes(), "IPAddress"),
            Err(ConfigError::MalformedArgs { .. })
        ));
    }

    #[test]
    fn test_subnet_prefix_from_bridge() {
        let config = NetworkConfig::load(NETCONF.as_bytes(), "").unwrap();
        assert_eq!(config.subnet_prefix().unwrap(), "/16");
    }

    #[test]
    fn test_subnet_prefix_override() {
        let mut config = NetworkConfig::load(NETCONF.as_bytes(), "").unwrap();
        config.ipam.subnet_prefix_size = "/20".to_owned();
        assert_eq!(config.subnet_prefix().unwrap(), "/20");
    }

    #[test]
    fn test_subnet_prefix_malformed() {
        let mut config = NetworkConfig::load(NETCONF.as_bytes(), "").unwrap();
        config.bridge_subnet = "10.42.0.0".to_owned();
        assert!(matches!(
            config.subnet_prefix(),
            Err(ConfigError::MalformedSubnet(_))
        ));
    }

    #[test]
    fn test_metadata_settings_defaults() {
        let settings = MetadataSettings::from_lookup(|_| None);
        assert_eq!(settings.address, "169.254.169.250");
        assert_eq!(settings.timeout, DEFAULT_METADATA_TIMEOUT);
        assert_eq!(
            settings.ipv4_address().unwrap(),
            Ipv4Addr::new(169, 254, 169, 250)
        );
    }

    #[test]
    fn test_metadata_settings_from_env() {
        let env: HashMap<&str, &str> = [
            (METADATA_ADDRESS_ENV, "10.0.0.250"),
            (METADATA_TIMEOUT_ENV, "5"),
        ]
        .into_iter()
        .collect();
        let settings = MetadataSettings::from_lookup(|key| env.get(key).map(|v| (*v).to_owned()));
        assert_eq!(settings.address, "10.0.0.250");
        assert_eq!(settings.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_metadata_timeout_rejects_zero_and_garbage() {
        for raw in ["0", "soon", "-5"] {
            let settings = MetadataSettings::from_lookup(|key| {
                (key == METADATA_TIMEOUT_ENV).then(|| raw.to_owned())
            });
            assert_eq!(settings.timeout, DEFAULT_METADATA_TIMEOUT);
        }
    }

    #[test]
    fn test_metadata_address_with_port_is_not_routable() {
        let settings = MetadataSettings {
            address: "rancher-metadata:80".to_owned(),
            timeout: DEFAULT_METADATA_TIMEOUT,
        };
        assert!(matches!(
            settings.ipv4_address(),
            Err(ConfigError::InvalidMetadataAddress(_))
        ));
    }
}
