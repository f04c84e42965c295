use hyper::{
    body::Bytes,
    client::HttpConnector,
    header::ACCEPT,
    Body, Method, Request, Uri,
};

use crate::{container::find_primary_ip, Container, Error, API_VERSION, DEFAULT_METADATA_ADDRESS};

/// A handle on the metadata service
#[derive(Debug, Clone)]
pub struct Client {
    /// Underlying HTTP client
    http: hyper::Client<HttpConnector>,
    /// Base URL of the versioned metadata API, without a trailing slash
    base_url: String,
}

impl Client {
    /// Build a client for the metadata service at `address` (`host` or `host:port`).
    ///
    /// An empty address selects [`DEFAULT_METADATA_ADDRESS`]. No request is made.
    pub fn new(address: &str) -> Result<Self, Error> {
        let address = match address.trim() {
            "" => DEFAULT_METADATA_ADDRESS,
            address => address,
        };
        let base_url = format!("http://{address}/{API_VERSION}");

        // Make sure the address produces a usable URI before handing out a client
        base_url
            .parse::<Uri>()
            .map_err(|source| Error::InvalidAddress {
                address: address.to_owned(),
                source,
            })?;

        Ok(Self {
            http: hyper::Client::new(),
            base_url,
        })
    }

    /// Build a client and make sure the metadata service answers
    pub async fn connect(address: &str) -> Result<Self, Error> {
        let client = Self::new(address)?;
        let version = client.version().await?;
        log::debug!(
            "Connected to metadata service at {} (version {})",
            client.base_url,
            version
        );
        Ok(client)
    }

    /// Get the base URL requests are made against
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the metadata version string
    pub async fn version(&self) -> Result<String, Error> {
        let body = self.get("/version").await?;
        Ok(String::from_utf8_lossy(&body).trim().trim_matches('"').to_owned())
    }

    /// List every container known to the metadata service
    pub async fn containers(&self) -> Result<Vec<Container>, Error> {
        let body = self.get("/containers").await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Look up the primary IP of a container by runtime container ID or Rancher UUID.
    ///
    /// Returns `Ok(None)` if no container matches.
    pub async fn get_ip(&self, container_id: &str, uuid: &str) -> Result<Option<String>, Error> {
        let containers = self.containers().await?;
        log::trace!(
            "Searching {} containers for id={} uuid={}",
            containers.len(),
            container_id,
            uuid
        );
        Ok(find_primary_ip(&containers, container_id, uuid))
    }

    /// Issue a GET request against the metadata API and collect the body
    async fn get(&self, path: &str) -> Result<Bytes, Error> {
        let uri: Uri = format!("{}{}", self.base_url, path)
            .parse()
            .map_err(hyper::http::Error::from)?;
        log::trace!("GET {}", uri);

        let request = Request::builder()
            .method(Method::GET)
            .uri(uri.clone())
            .header(ACCEPT, "application/json")
            .body(Body::empty())?;
        let response = self.http.request(request).await.map_err(|err| {
            log::error!("Metadata request to {} failed", uri);
            log::error!("{}", err);
            err
        })?;

        let status = response.status();
        if !status.is_success() {
            log::error!("Metadata service answered {} for {}", status, uri);
            return Err(Error::Status { status, uri });
        }
        Ok(hyper::body::to_bytes(response.into_body()).await?)
    }
}
