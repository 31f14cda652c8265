//! Git forge release-feed client (spec.md §4.1).
//!
//! spec.md names "two forge release APIs" without pinning vendors.
//! `ForgeKind` resolves that (DESIGN.md Open Question) to the two shapes
//! every forge release feed in practice reduces to: a GitHub-style
//! `/repos/<ref>/releases` list, and a GitLab-style
//! `/projects/<ref>/releases` list. Both return a JSON array newest-first;
//! only field names differ.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::domain::errors::{ProviderError, ProviderResult};
use crate::domain::models::ForgeRelease;
use crate::domain::ports::UpstreamProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForgeKind {
    GitHubLike,
    GitLabLike,
}

impl std::str::FromStr for ForgeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github-like" => Ok(Self::GitHubLike),
            "gitlab-like" => Ok(Self::GitLabLike),
            other => Err(format!("unknown forge kind: {other}")),
        }
    }
}

pub struct ForgeClient {
    http: Client,
    base_url: String,
    kind: ForgeKind,
}

impl ForgeClient {
    pub fn new(kind: ForgeKind, base_url: impl Into<String>) -> Self {
        Self::with_client(
            Client::builder()
                .timeout(Duration::from_secs(30))
                .pool_max_idle_per_host(10)
                .tcp_nodelay(true)
                .build()
                .expect("forge http client builder is infallible with this configuration"),
            kind,
            base_url,
        )
    }

    pub fn with_client(http: Client, kind: ForgeKind, base_url: impl Into<String>) -> Self {
        Self { http, base_url: base_url.into(), kind }
    }

    async fn list_releases(&self, ref_: &str, token: Option<&str>) -> ProviderResult<Vec<ForgeRelease>> {
        let url = match self.kind {
            ForgeKind::GitHubLike => format!("{}/repos/{ref_}/releases", self.base_url),
            ForgeKind::GitLabLike => format!("{}/projects/{}/releases", self.base_url, urlencode_path_segment(ref_)),
        };

        let mut req = self.http.get(&url);
        req = match (self.kind, token) {
            (ForgeKind::GitHubLike, Some(t)) => req.bearer_auth(t),
            (ForgeKind::GitLabLike, Some(t)) => req.header("PRIVATE-TOKEN", t),
            (_, None) => req,
        };

        let resp = req.send().await.map_err(|e| ProviderError::Transient(e.to_string()))?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(vec![]);
        }
        if resp.status() == StatusCode::TOO_MANY_REQUESTS || resp.status() == StatusCode::FORBIDDEN {
            return Err(ProviderError::RateLimited);
        }
        if !resp.status().is_success() {
            return Err(ProviderError::Transient(format!("forge returned {}", resp.status())));
        }

        match self.kind {
            ForgeKind::GitHubLike => {
                let releases: Vec<GitHubRelease> = resp.json().await.map_err(|e| ProviderError::Transient(e.to_string()))?;
                Ok(releases.into_iter().map(Into::into).collect())
            }
            ForgeKind::GitLabLike => {
                let releases: Vec<GitLabRelease> = resp.json().await.map_err(|e| ProviderError::Transient(e.to_string()))?;
                Ok(releases.into_iter().map(Into::into).collect())
            }
        }
    }
}

fn urlencode_path_segment(segment: &str) -> String {
    segment.replace('/', "%2F")
}

#[derive(Deserialize)]
struct GitHubRelease {
    tag_name: String,
    published_at: Option<chrono::DateTime<chrono::Utc>>,
    html_url: Option<String>,
}

impl From<GitHubRelease> for ForgeRelease {
    fn from(r: GitHubRelease) -> Self {
        ForgeRelease { tag: r.tag_name, published_at: r.published_at, html_url: r.html_url }
    }
}

#[derive(Deserialize)]
struct GitLabRelease {
    tag_name: String,
    released_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(rename = "_links")]
    links: Option<GitLabLinks>,
}

#[derive(Deserialize)]
struct GitLabLinks {
    #[serde(rename = "self")]
    self_: Option<String>,
}

impl From<GitLabRelease> for ForgeRelease {
    fn from(r: GitLabRelease) -> Self {
        ForgeRelease { tag: r.tag_name, published_at: r.released_at, html_url: r.links.and_then(|l| l.self_) }
    }
}

/// Matches a release tag against `tag`, trying the bare tag and a
/// leading-`v`-stripped/added variant both ways (spec.md §4.1).
fn tag_matches(candidate: &str, tag: &str) -> bool {
    candidate == tag
        || candidate.strip_prefix('v') == Some(tag)
        || format!("v{tag}") == candidate
        || tag.strip_prefix('v') == Some(candidate)
}

#[async_trait]
impl UpstreamProvider for ForgeClient {
    async fn resolve_tag_digest(&self, _repo: &str, _tag: &str, _credential: Option<&str>) -> ProviderResult<Option<String>> {
        // A release feed has no manifest digest concept; only registries answer this.
        Ok(None)
    }

    async fn list_tags(&self, _repo: &str, _credential: Option<&str>) -> ProviderResult<Vec<String>> {
        Ok(vec![])
    }

    async fn latest_release(&self, ref_: &str, token: Option<&str>) -> ProviderResult<Option<ForgeRelease>> {
        let releases = self.list_releases(ref_, token).await?;
        Ok(releases.into_iter().next())
    }

    async fn release_by_tag(&self, ref_: &str, tag: &str, token: Option<&str>) -> ProviderResult<Option<ForgeRelease>> {
        let releases = self.list_releases(ref_, token).await?;
        Ok(releases.into_iter().find(|r| tag_matches(&r.tag, tag)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_matches_with_and_without_leading_v() {
        assert!(tag_matches("v1.2.3", "1.2.3"));
        assert!(tag_matches("1.2.3", "v1.2.3"));
        assert!(tag_matches("1.2.3", "1.2.3"));
        assert!(!tag_matches("1.2.4", "1.2.3"));
    }

    #[test]
    fn gitlab_path_segment_is_encoded() {
        assert_eq!(urlencode_path_segment("acme/widget"), "acme%2Fwidget");
    }
}
