//! Parsing of the `CNI_ARGS` override string
//!
//! The runtime passes extra per-container settings as `KEY=VALUE` pairs joined
//! with `;`, e.g. `IgnoreUnknown=1;RancherContainerUUID=abc;IPAddress=10.42.3.4/16`.

use crate::error::ConfigError;

/// A sparse set of IPAM overrides supplied by the runtime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CniArgs {
    pub ignore_unknown: bool,
    pub container_uuid: Option<String>,
    pub ip_address: Option<String>,
    pub log_to_file: Option<String>,
    pub is_debug_level: Option<String>,
}

impl CniArgs {
    /// Parse a `CNI_ARGS` string
    pub fn parse(args: &str) -> Result<Self, ConfigError> {
        let mut parsed = Self::default();
        if args.is_empty() {
            return Ok(parsed);
        }

        let malformed = |reason: String| ConfigError::MalformedArgs {
            args: args.to_owned(),
            reason,
        };

        // Split into pairs first so IgnoreUnknown applies regardless of where it appears
        let mut pairs = Vec::new();
        for pair in args.split(';') {
            match pair.split('=').collect::<Vec<_>>().as_slice() {
                [key, value] => pairs.push((*key, *value)),
                _ => return Err(malformed(format!("ARGS: invalid pair {pair:?}"))),
            }
        }
        for (key, value) in &pairs {
            if *key == "IgnoreUnknown" {
                parsed.ignore_unknown = parse_bool(value).ok_or_else(|| {
                    malformed(format!("ARGS: error parsing value of pair {key}={value}"))
                })?;
            }
        }

        let mut unknown = Vec::new();
        for (key, value) in pairs {
            let value = value.to_owned();
            match key {
                "IgnoreUnknown" => {}
                "RancherContainerUUID" => parsed.container_uuid = Some(value),
                "IPAddress" => parsed.ip_address = Some(value),
                "LogToFile" => parsed.log_to_file = Some(value),
                "IsDebugLevel" => parsed.is_debug_level = Some(value),
                _ if parsed.ignore_unknown => {
                    log::trace!("Ignoring unknown CNI arg {}", key);
                }
                _ => unknown.push(format!("{key}={value}")),
            }
        }
        if !unknown.is_empty() {
            return Err(malformed(format!("ARGS: unknown args {unknown:?}")));
        }

        Ok(parsed)
    }
}

/// Booleans the way the runtime spells them
fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" => Some(true),
        "0" | "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_args() {
        assert_eq!(CniArgs::parse("").unwrap(), CniArgs::default());
    }

    #[test]
    fn test_known_args() {
        let args = CniArgs::parse(concat!(
            "RancherContainerUUID=5e7d1c;IPAddress=10.42.3.4/16;",
            "LogToFile=/var/log/ipam.log;IsDebugLevel=true",
        ))
        .unwrap();
        assert_eq!(args.container_uuid.as_deref(), Some("5e7d1c"));
        assert_eq!(args.ip_address.as_deref(), Some("10.42.3.4/16"));
        assert_eq!(args.log_to_file.as_deref(), Some("/var/log/ipam.log"));
        assert_eq!(args.is_debug_level.as_deref(), Some("true"));
        assert!(!args.ignore_unknown);
    }

    #[test]
    fn test_unknown_args_rejected() {
        assert!(matches!(
            CniArgs::parse("K8S_POD_NAME=web"),
            Err(ConfigError::MalformedArgs { .. })
        ));
    }

    #[test]
    fn test_unknown_args_ignored() {
        // IgnoreUnknown counts even when it comes after the unknown key
        let args =
            CniArgs::parse("K8S_POD_NAME=web;IPAddress=10.42.0.9/16;IgnoreUnknown=1").unwrap();
        assert!(args.ignore_unknown);
        assert_eq!(args.ip_address.as_deref(), Some("10.42.0.9/16"));
    }

    #[test]
    fn test_invalid_pair() {
        assert!(matches!(
            CniArgs::parse("IPAddress"),
            Err(ConfigError::MalformedArgs { .. })
        ));
        assert!(matches!(
            CniArgs::parse("IPAddress=a=b"),
            Err(ConfigError::MalformedArgs { .. })
        ));
        assert!(matches!(
            CniArgs::parse("IgnoreUnknown=maybe"),
            Err(ConfigError::MalformedArgs { .. })
        ));
    }
}
