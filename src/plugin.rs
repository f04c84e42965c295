//! The ADD and DEL operations

use crate::{
    bridge::{derive_metadata_route, InterfaceLookup},
    config::{MetadataSettings, NetworkConfig},
    error::AllocationError,
    metadata::IpFinder,
    resolver::resolve_address,
    result::{assemble, AllocationResult},
};

/// Connect to the metadata service, giving up after the configured timeout
pub async fn connect_metadata(
    settings: &MetadataSettings,
) -> Result<rancher_metadata::Client, AllocationError> {
    log::debug!("Connecting to metadata service at {}", settings.address);
    tokio::time::timeout(settings.timeout, rancher_metadata::Client::connect(&settings.address))
        .await
        .map_err(|_| {
            log::error!(
                "Metadata service at {} did not answer within {:?}",
                settings.address,
                settings.timeout
            );
            AllocationError::MetadataTimeout(settings.timeout)
        })?
        .map_err(|err| {
            log::error!("Failed to reach metadata service: {}", err);
            AllocationError::MetadataUnavailable(err)
        })
}

/// Allocate an address and routes for one container.
///
/// Nothing is retried and no partial result is produced: the first failure ends the allocation.
pub async fn allocate<F: IpFinder, L: InterfaceLookup>(
    config: &NetworkConfig,
    container_id: &str,
    finder: &F,
    lookup: &L,
    metadata: &MetadataSettings,
) -> Result<AllocationResult, AllocationError> {
    log::debug!("rancher UUID: {}", config.ipam.container_uuid);
    log::debug!("IPAddress from args: {}", config.ipam.ip_address);

    // A broken bridge fails the allocation before the metadata service is asked anything
    let metadata_route = derive_metadata_route(config, metadata.ipv4_address()?, lookup)
        .await
        .map_err(|err| {
            log::error!("error getting metadata route: {}", err);
            err
        })?;

    let address = resolve_address(config, container_id, finder, metadata.timeout).await?;

    let result = assemble(address, &config.ipam.routes, metadata_route);
    log::info!("Allocated {} to container {}", result.ip4.ip, container_id);
    Ok(result)
}

/// Release a container's address. Allocation keeps no state, so there is nothing to undo.
pub fn release(container_id: &str) -> Result<(), AllocationError> {
    log::debug!("Releasing container {}", container_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use ipnet::Ipv4Net;

    use super::*;
    use crate::{
        bridge::tests::FakeInterfaces,
        config::{Route, DEFAULT_METADATA_TIMEOUT},
        error::ConfigError,
        metadata::tests::FakeFinder,
    };

    const NETCONF: &str = r#"{
        "name": "rancher-cni-network",
        "bridge": "docker0",
        "bridgeSubnet": "10.42.0.0/16",
        "ipam": {
            "type": "rancher-cni-ipam",
            "routes": [
                { "dst": "0.0.0.0/0", "gw": "10.42.0.1" },
                { "dst": "172.16.0.0/12", "gw": "10.42.0.254" }
            ]
        }
    }"#;

    fn settings() -> MetadataSettings {
        MetadataSettings {
            address: "169.254.169.250".to_owned(),
            timeout: DEFAULT_METADATA_TIMEOUT,
        }
    }

    #[tokio::test]
    async fn test_allocate_from_metadata() {
        let config =
            NetworkConfig::load(NETCONF.as_bytes(), "RancherContainerUUID=5e7d1c").unwrap();
        let finder = FakeFinder::answering(Some("10.42.0.5"));
        let lookup = FakeInterfaces::with("docker0", &["10.42.0.1/16"]);

        let result = allocate(&config, "c0ffee", &finder, &lookup, &settings())
            .await
            .unwrap();

        assert_eq!(result.ip4.ip, "10.42.0.5/16".parse::<Ipv4Net>().unwrap());
        let gateway = Some(Ipv4Addr::new(10, 42, 0, 1));
        assert_eq!(
            result.ip4.routes,
            vec![
                Route {
                    dst: "0.0.0.0/0".parse().unwrap(),
                    gw: gateway,
                },
                Route {
                    dst: "172.16.0.0/12".parse().unwrap(),
                    gw: Some(Ipv4Addr::new(10, 42, 0, 254)),
                },
                Route {
                    dst: "169.254.169.250/32".parse().unwrap(),
                    gw: gateway,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_allocate_explicit_address() {
        let config = NetworkConfig::load(NETCONF.as_bytes(), "IPAddress=10.42.9.9/16").unwrap();
        let finder = FakeFinder::answering(Some("10.42.0.5"));
        let lookup = FakeInterfaces::with("docker0", &["10.42.0.1/16"]);

        let result = allocate(&config, "c0ffee", &finder, &lookup, &settings())
            .await
            .unwrap();

        assert_eq!(result.ip4.ip, "10.42.9.9/16".parse::<Ipv4Net>().unwrap());
        assert_eq!(finder.calls(), 0);
    }

    #[tokio::test]
    async fn test_allocate_aborts_on_bad_bridge() {
        let config = NetworkConfig::load(NETCONF.as_bytes(), "").unwrap();
        let finder = FakeFinder::answering(Some("10.42.0.5"));
        let lookup = FakeInterfaces::with("docker0", &["10.42.0.1/16", "10.42.0.2/16"]);

        assert!(matches!(
            allocate(&config, "c0ffee", &finder, &lookup, &settings()).await,
            Err(AllocationError::Config(ConfigError::BridgeAddressCount { count: 2, .. }))
        ));
        assert_eq!(finder.calls(), 0);
    }

    #[tokio::test]
    async fn test_allocate_without_address() {
        let config = NetworkConfig::load(NETCONF.as_bytes(), "").unwrap();
        let finder = FakeFinder::answering(None);
        let lookup = FakeInterfaces::with("docker0", &["10.42.0.1/16"]);

        assert!(matches!(
            allocate(&config, "c0ffee", &finder, &lookup, &settings()).await,
            Err(AllocationError::NoAddressFound)
        ));
    }

    #[tokio::test]
    async fn test_allocate_is_repeatable() {
        let config = NetworkConfig::load(NETCONF.as_bytes(), "").unwrap();
        let finder = FakeFinder::answering(Some("10.42.0.5"));
        let lookup = FakeInterfaces::with("docker0", &["10.42.0.1/16"]);

        let first = allocate(&config, "c0ffee", &finder, &lookup, &settings())
            .await
            .unwrap();
        let second = allocate(&config, "c0ffee", &finder, &lookup, &settings())
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_release_always_succeeds() {
        for container_id in ["", "c0ffee", "does-not-exist"] {
            assert!(release(container_id).is_ok());
        }
    }

    #[tokio::test]
    async fn test_connect_metadata_unavailable() {
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let settings = MetadataSettings {
            address: addr.to_string(),
            timeout: DEFAULT_METADATA_TIMEOUT,
        };
        assert!(matches!(
            connect_metadata(&settings).await,
            Err(AllocationError::MetadataUnavailable(_))
        ));
    }
}
