//! OCI Distribution v2 registry client (spec.md §4.1, SPEC_FULL.md §4.1).
//!
//! Implements the generic registry-v2 surface needed by the Upstream
//! Resolver: token-based bearer auth (anonymous fallback), tag listing,
//! and manifest-digest resolution via the `Docker-Content-Digest` header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;

use crate::domain::errors::{ProviderError, ProviderResult};
use crate::domain::models::ForgeRelease;
use crate::domain::ports::UpstreamProvider;

const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v2+json, application/vnd.oci.image.manifest.v1+json, application/vnd.docker.distribution.manifest.list.v2+json, application/vnd.oci.image.index.v1+json";

pub struct RegistryClient {
    http: Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(
            Client::builder()
                .timeout(Duration::from_secs(30))
                .pool_max_idle_per_host(10)
                .tcp_nodelay(true)
                .build()
                .expect("registry http client builder is infallible with this configuration"),
            base_url,
        )
    }

    pub fn with_client(http: Client, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into() }
    }

    /// Resolves a `WWW-Authenticate: Bearer realm=...,service=...,scope=...`
    /// challenge into a short-lived bearer token, following the standard
    /// registry-v2 token-auth dance. Falls back to `None` (anonymous) when
    /// the registry doesn't challenge at all.
    async fn bearer_token(&self, challenge: &str, credential: Option<&str>) -> ProviderResult<Option<String>> {
        let params = parse_bearer_challenge(challenge);
        let Some(realm) = params.get("realm") else { return Ok(None) };

        let mut req = self.http.get(realm);
        if let Some(service) = params.get("service") {
            req = req.query(&[("service", service)]);
        }
        if let Some(scope) = params.get("scope") {
            req = req.query(&[("scope", scope)]);
        }
        if let Some(cred) = credential {
            req = req.bearer_auth(cred);
        }

        let resp = req.send().await.map_err(|e| ProviderError::Transient(e.to_string()))?;
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if !resp.status().is_success() {
            return Err(ProviderError::Transient(format!("token endpoint returned {}", resp.status())));
        }

        #[derive(Deserialize)]
        struct TokenResponse {
            #[serde(alias = "access_token")]
            token: Option<String>,
        }
        let body: TokenResponse = resp.json().await.map_err(|e| ProviderError::Transient(e.to_string()))?;
        Ok(body.token)
    }

    async fn authorized_request(
        &self,
        url: &str,
        accept: &str,
        credential: Option<&str>,
    ) -> ProviderResult<reqwest::Response> {
        let first = self.http.get(url).header(header::ACCEPT, accept).send().await.map_err(|e| ProviderError::Transient(e.to_string()))?;

        if first.status() == StatusCode::UNAUTHORIZED {
            if let Some(challenge) = first.headers().get(header::WWW_AUTHENTICATE).and_then(|v| v.to_str().ok()) {
                if let Some(token) = self.bearer_token(challenge, credential).await? {
                    return self
                        .http
                        .get(url)
                        .header(header::ACCEPT, accept)
                        .bearer_auth(token)
                        .send()
                        .await
                        .map_err(|e| ProviderError::Transient(e.to_string()));
                }
            }
        }
        Ok(first)
    }
}

fn parse_bearer_challenge(challenge: &str) -> std::collections::HashMap<String, String> {
    let mut out = std::collections::HashMap::new();
    let Some(rest) = challenge.strip_prefix("Bearer ") else { return out };
    for part in rest.split(',') {
        if let Some((key, value)) = part.split_once('=') {
            out.insert(key.trim().to_string(), value.trim().trim_matches('"').to_string());
        }
    }
    out
}

fn classify_status(status: StatusCode) -> Option<ProviderError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        Some(ProviderError::RateLimited)
    } else if status.is_server_error() {
        Some(ProviderError::Transient(format!("registry returned {status}")))
    } else {
        None
    }
}

#[async_trait]
impl UpstreamProvider for RegistryClient {
    async fn resolve_tag_digest(&self, repo: &str, tag: &str, credential: Option<&str>) -> ProviderResult<Option<String>> {
        let url = format!("{}/v2/{repo}/manifests/{tag}", self.base_url);
        let resp = self.authorized_request(&url, MANIFEST_ACCEPT, credential).await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if let Some(err) = classify_status(resp.status()) {
            return Err(err);
        }
        if !resp.status().is_success() {
            return Err(ProviderError::Transient(format!("registry returned {}", resp.status())));
        }

        match resp.headers().get("Docker-Content-Digest").and_then(|v| v.to_str().ok()) {
            Some(digest) => Ok(Some(digest.to_string())),
            // A compliant registry-v2 implementation always sets this header
            // on a manifest GET; one that doesn't isn't a digest source we
            // can resolve against.
            None => Err(ProviderError::Transient("registry response missing Docker-Content-Digest header".into())),
        }
    }

    async fn list_tags(&self, repo: &str, credential: Option<&str>) -> ProviderResult<Vec<String>> {
        let url = format!("{}/v2/{repo}/tags/list", self.base_url);
        let resp = self.authorized_request(&url, "application/json", credential).await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(vec![]);
        }
        if let Some(err) = classify_status(resp.status()) {
            return Err(err);
        }
        if !resp.status().is_success() {
            return Err(ProviderError::Transient(format!("registry returned {}", resp.status())));
        }

        #[derive(Deserialize)]
        struct TagsList {
            tags: Vec<String>,
        }
        let body: TagsList = resp.json().await.map_err(|e| ProviderError::Transient(e.to_string()))?;
        Ok(body.tags)
    }

    async fn latest_release(&self, _ref_: &str, _token: Option<&str>) -> ProviderResult<Option<ForgeRelease>> {
        // A container registry has no release feed; only forge clients answer this.
        Ok(None)
    }

    async fn release_by_tag(&self, _ref_: &str, _tag: &str, _token: Option<&str>) -> ProviderResult<Option<ForgeRelease>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bearer_challenge_params() {
        let challenge = r#"Bearer realm="https://auth.example/token",service="registry.example",scope="repository:acme/widget:pull""#;
        let params = parse_bearer_challenge(challenge);
        assert_eq!(params.get("realm").map(String::as_str), Some("https://auth.example/token"));
        assert_eq!(params.get("service").map(String::as_str), Some("registry.example"));
        assert_eq!(params.get("scope").map(String::as_str), Some("repository:acme/widget:pull"));
    }

    #[test]
    fn classifies_429_as_rate_limited_and_5xx_as_transient() {
        assert!(matches!(classify_status(StatusCode::TOO_MANY_REQUESTS), Some(ProviderError::RateLimited)));
        assert!(matches!(classify_status(StatusCode::BAD_GATEWAY), Some(ProviderError::Transient(_))));
        assert!(classify_status(StatusCode::OK).is_none());
    }
}
