/// A container as reported by the metadata service.
///
/// Only the fields needed for address lookups are kept; everything else in the
/// payload is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Deserialize)]
pub struct Container {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub uuid: String,
    /// The container ID as known by the container runtime
    #[serde(default)]
    pub external_id: String,
    #[serde(default)]
    pub primary_ip: String,
}

/// Find the primary IP of the container matching either the runtime container ID or the
/// Rancher UUID.
///
/// Containers without a primary IP never match. An empty `uuid` only matches by container ID.
#[must_use]
pub fn find_primary_ip(containers: &[Container], container_id: &str, uuid: &str) -> Option<String> {
    containers
        .iter()
        .filter(|container| !container.primary_ip.is_empty())
        .find(|container| {
            container.external_id == container_id || (!uuid.is_empty() && container.uuid == uuid)
        })
        .map(|container| container.primary_ip.clone())
}
