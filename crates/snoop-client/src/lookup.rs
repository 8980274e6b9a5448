//! ServiceClient - calls a service by name through the registry.
//!
//! Every call first asks the registry for the service's current descriptor,
//! so a service that moved or went away is noticed on the next request.

use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use snoop_core::{ClientConfig, RegistryEndpoints, Result, ServiceDescriptor, SnoopError};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// HTTP client for one named service.
pub struct ServiceClient {
    client: Client,
    endpoints: RegistryEndpoints,
    identity: String,
}

impl ServiceClient {
    /// Create a client for `identity`, looked up in the registry at `registry_url`.
    pub fn new(registry_url: &str, identity: impl Into<String>) -> Result<Self> {
        Self::with_timeout(registry_url, identity, ClientConfig::LOOKUP_TIMEOUT)
    }

    pub fn with_timeout(
        registry_url: &str,
        identity: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoints = RegistryEndpoints::parse(registry_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("snoop-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SnoopError::Other(format!("Failed to create HTTP client: {}", e)))?;

        let identity = identity.into();
        info!("Service client created for {}", identity);

        Ok(Self {
            client,
            endpoints,
            identity,
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Fetch the current descriptor. A non-live service is [`SnoopError::NotFound`].
    pub async fn descriptor(&self) -> Result<ServiceDescriptor> {
        let url = self.endpoints.service(&self.identity)?;
        debug!("Looking up {} at {}", self.identity, url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| request_error(&url, e))?;

        match response.status() {
            StatusCode::OK => {
                let body = response.text().await.map_err(|e| request_error(&url, e))?;
                snoop_core::codec::decode(&body)
            }
            StatusCode::NOT_FOUND => Err(SnoopError::NotFound {
                identity: self.identity.clone(),
            }),
            status => Err(SnoopError::UnexpectedStatus {
                endpoint: url.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    /// Base URL of the service's API.
    pub async fn service_root(&self) -> Result<Url> {
        self.descriptor().await?.service_root()
    }

    /// All descriptors the registry holds, live or not.
    pub async fn list_services(&self) -> Result<Vec<ServiceDescriptor>> {
        let url = self.endpoints.services()?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| request_error(&url, e))?;

        if !response.status().is_success() {
            return Err(SnoopError::UnexpectedStatus {
                endpoint: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| request_error(&url, e))?;
        Ok(serde_json::from_str(&body)?)
    }

    /// GET a resource under the service root. `None` when the service is unavailable.
    pub async fn simple_get(&self, resource_path: &str) -> Option<Response> {
        let url = self.resource_url(resource_path).await?;
        self.finish(self.client.get(url)).await
    }

    /// DELETE a resource under the service root.
    pub async fn simple_delete(&self, resource_path: &str) -> Option<Response> {
        let url = self.resource_url(resource_path).await?;
        self.finish(self.client.delete(url)).await
    }

    /// PUT `resource` as JSON to a path under the service root.
    pub async fn simple_put<T: Serialize + ?Sized>(
        &self,
        resource_path: &str,
        resource: &T,
    ) -> Option<Response> {
        let url = self.resource_url(resource_path).await?;
        self.finish(self.client.put(url).json(resource)).await
    }

    /// POST `resource` as JSON to a path under the service root.
    pub async fn simple_post<T: Serialize + ?Sized>(
        &self,
        resource_path: &str,
        resource: &T,
    ) -> Option<Response> {
        let url = self.resource_url(resource_path).await?;
        self.finish(self.client.post(url).json(resource)).await
    }

    async fn resource_url(&self, resource_path: &str) -> Option<Url> {
        let joined = self
            .service_root()
            .await
            .and_then(|root| join_resource(&root, resource_path));

        match joined {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Service unavailable for {}: {}", self.identity, e);
                None
            }
        }
    }

    async fn finish(&self, request: reqwest::RequestBuilder) -> Option<Response> {
        match request.send().await {
            Ok(response) => Some(response),
            Err(e) => {
                warn!("Request to {} failed: {}", self.identity, e);
                None
            }
        }
    }
}

fn join_resource(root: &Url, resource_path: &str) -> Result<Url> {
    root.join(resource_path.trim_start_matches('/'))
        .map_err(|e| SnoopError::Url {
            url: format!("{}{}", root, resource_path),
            message: e.to_string(),
        })
}

fn request_error(url: &Url, err: reqwest::Error) -> SnoopError {
    if err.is_timeout() {
        SnoopError::Timeout {
            endpoint: url.to_string(),
            timeout: ClientConfig::LOOKUP_TIMEOUT,
        }
    } else {
        SnoopError::connection(url.as_str(), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_resource_under_root() {
        let root = Url::parse("http://10.0.0.1:8080/api/").unwrap();
        assert_eq!(
            join_resource(&root, "/orders/7").unwrap().as_str(),
            "http://10.0.0.1:8080/api/orders/7"
        );
        assert_eq!(
            join_resource(&root, "health").unwrap().as_str(),
            "http://10.0.0.1:8080/api/health"
        );
    }

    #[test]
    fn test_new_rejects_bad_registry_url() {
        assert!(ServiceClient::new("not a url", "svc-a").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_registry_gives_none() {
        let client =
            ServiceClient::with_timeout("http://127.0.0.1:9/", "svc-a", Duration::from_secs(2))
                .unwrap();

        assert!(client.descriptor().await.unwrap_err().is_transient());
        assert!(client.simple_get("orders").await.is_none());
    }
}
