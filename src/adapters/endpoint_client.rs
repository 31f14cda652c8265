//! Thin `reqwest`-backed `EndpointClient` (spec.md §1: remote agent
//! enrollment and RPC are out of scope; this adapter assumes each
//! instance exposes a minimal JSON RPC surface at its `url` and only
//! shapes requests/responses, never interprets orchestrator-specific
//! semantics).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::ports::{ContainerConfigSnapshot, EndpointClient, RawContainer, RemoteImage};

pub struct HttpEndpointClient {
    http: Client,
}

impl HttpEndpointClient {
    pub fn new() -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(60))
                .pool_max_idle_per_host(10)
                .tcp_nodelay(true)
                .build()
                .expect("endpoint http client builder is infallible with this configuration"),
        }
    }

    fn endpoint_url(instance_url: &str, endpoint_id: i64, path: &str) -> String {
        format!("{}/endpoints/{endpoint_id}{path}", instance_url.trim_end_matches('/'))
    }

    async fn post_json<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> DomainResult<reqwest::Response> {
        let resp = self.http.post(url).json(body).send().await.map_err(|e| DomainError::DatabaseError(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(DomainError::UpgradeFailed { step: "endpoint_call", reason: format!("{url} returned {}", resp.status()) });
        }
        Ok(resp)
    }
}

impl Default for HttpEndpointClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct ListContainersResponse {
    containers: Vec<RawContainer>,
}

#[derive(Serialize)]
struct PullRequest<'a> {
    image_ref: &'a str,
    credential: Option<&'a str>,
}

#[derive(Serialize)]
struct CreateRequest<'a> {
    snapshot: &'a ContainerConfigSnapshot,
    image_ref: &'a str,
}

#[derive(Deserialize)]
struct CreateResponse {
    container_id: String,
}

#[derive(Deserialize)]
struct ListImagesResponse {
    images: Vec<RemoteImage>,
}

#[async_trait]
impl EndpointClient for HttpEndpointClient {
    async fn list_containers(&self, instance_url: &str, endpoint_id: i64) -> DomainResult<Vec<RawContainer>> {
        let url = Self::endpoint_url(instance_url, endpoint_id, "/containers");
        let resp = self.http.get(&url).send().await.map_err(|e| DomainError::DatabaseError(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(DomainError::UpgradeFailed { step: "list_containers", reason: format!("{url} returned {}", resp.status()) });
        }
        let body: ListContainersResponse = resp.json().await.map_err(|e| DomainError::SerializationError(e.to_string()))?;
        Ok(body.containers)
    }

    async fn pull_image(&self, instance_url: &str, endpoint_id: i64, image_ref: &str, credential: Option<&str>) -> DomainResult<()> {
        let url = Self::endpoint_url(instance_url, endpoint_id, "/images/pull");
        self.post_json(&url, &PullRequest { image_ref, credential }).await?;
        Ok(())
    }

    async fn snapshot_config(&self, instance_url: &str, endpoint_id: i64, container_id: &str) -> DomainResult<ContainerConfigSnapshot> {
        let url = Self::endpoint_url(instance_url, endpoint_id, &format!("/containers/{container_id}/snapshot"));
        let resp = self.http.get(&url).send().await.map_err(|e| DomainError::DatabaseError(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(DomainError::UpgradeFailed { step: "snapshot_config", reason: format!("{url} returned {}", resp.status()) });
        }
        resp.json().await.map_err(|e| DomainError::SerializationError(e.to_string()))
    }

    async fn stop(&self, instance_url: &str, endpoint_id: i64, container_id: &str) -> DomainResult<()> {
        let url = Self::endpoint_url(instance_url, endpoint_id, &format!("/containers/{container_id}/stop"));
        self.post_json(&url, &serde_json::json!({})).await?;
        Ok(())
    }

    async fn remove(&self, instance_url: &str, endpoint_id: i64, container_id: &str) -> DomainResult<()> {
        let url = Self::endpoint_url(instance_url, endpoint_id, &format!("/containers/{container_id}/remove"));
        self.post_json(&url, &serde_json::json!({})).await?;
        Ok(())
    }

    async fn create(&self, instance_url: &str, endpoint_id: i64, snapshot: &ContainerConfigSnapshot, image_ref: &str) -> DomainResult<String> {
        let url = Self::endpoint_url(instance_url, endpoint_id, "/containers");
        let resp = self.post_json(&url, &CreateRequest { snapshot, image_ref }).await?;
        let body: CreateResponse = resp.json().await.map_err(|e| DomainError::SerializationError(e.to_string()))?;
        Ok(body.container_id)
    }

    async fn start_and_wait_running(&self, instance_url: &str, endpoint_id: i64, container_id: &str) -> DomainResult<()> {
        let url = Self::endpoint_url(instance_url, endpoint_id, &format!("/containers/{container_id}/start"));
        self.post_json(&url, &serde_json::json!({})).await?;
        Ok(())
    }

    async fn list_images(&self, instance_url: &str, endpoint_id: i64) -> DomainResult<Vec<RemoteImage>> {
        let url = Self::endpoint_url(instance_url, endpoint_id, "/images");
        let resp = self.http.get(&url).send().await.map_err(|e| DomainError::DatabaseError(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(DomainError::UpgradeFailed { step: "list_images", reason: format!("{url} returned {}", resp.status()) });
        }
        let body: ListImagesResponse = resp.json().await.map_err(|e| DomainError::SerializationError(e.to_string()))?;
        Ok(body.images)
    }

    async fn delete_image(&self, instance_url: &str, endpoint_id: i64, image_id: &str) -> DomainResult<()> {
        let url = Self::endpoint_url(instance_url, endpoint_id, &format!("/images/{image_id}"));
        let resp = self.http.delete(&url).send().await.map_err(|e| DomainError::DatabaseError(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(DomainError::UpgradeFailed { step: "delete_image", reason: format!("{url} returned {}", resp.status()) });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_url_joins_instance_and_path_without_double_slash() {
        assert_eq!(HttpEndpointClient::endpoint_url("https://prod.example/", 7, "/containers"), "https://prod.example/endpoints/7/containers");
        assert_eq!(HttpEndpointClient::endpoint_url("https://prod.example", 7, "/containers"), "https://prod.example/endpoints/7/containers");
    }
}
