//! The metadata service, seen as "container identity in, reserved IP out"

use std::future::Future;

/// Something that knows which IP a container was given ahead of time
pub trait IpFinder {
    /// Look up the IP reserved for a container.
    ///
    /// `Ok(None)` means the container has no known address.
    fn get_ip(
        &self,
        container_id: &str,
        container_uuid: &str,
    ) -> impl Future<Output = Result<Option<String>, rancher_metadata::Error>> + Send;
}

impl IpFinder for rancher_metadata::Client {
    async fn get_ip(
        &self,
        container_id: &str,
        container_uuid: &str,
    ) -> Result<Option<String>, rancher_metadata::Error> {
        rancher_metadata::Client::get_ip(self, container_id, container_uuid).await
    }
}
