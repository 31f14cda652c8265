//! Unified interface over the three upstream providers (spec.md §4.1).

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::domain::errors::{ProviderError, ProviderResult};
use crate::domain::models::LatestDescriptor;
use crate::domain::ports::UpstreamProvider;

/// The symbolic tag whose meaning changes over time. Reverse-resolved to
/// a concrete version tag when possible (spec.md GLOSSARY: "moving tag").
const MOVING_TAG: &str = "latest";

pub struct ResolveOptions<'a> {
    pub forge_ref: Option<&'a str>,
    pub forge_token: Option<&'a str>,
    pub use_fallback: bool,
    pub registry_credential: Option<&'a str>,
}

/// Composes a registry provider with an optional forge fallback behind the
/// same `UpstreamProvider` capability set (spec.md §9 design note).
pub struct UpstreamResolver {
    registry: Arc<dyn UpstreamProvider>,
    forge: Arc<dyn UpstreamProvider>,
}

impl UpstreamResolver {
    pub fn new(registry: Arc<dyn UpstreamProvider>, forge: Arc<dyn UpstreamProvider>) -> Self {
        Self { registry, forge }
    }

    /// `resolveLatest(repo, tag, {forgeRefOpt, useFallback})` (spec.md §4.1).
    ///
    /// Queries the registry for `tag`'s manifest digest. If `tag` is the
    /// moving tag, reverse-resolves it to a concrete version by scanning
    /// the repo's tag list for a non-moving tag whose digest matches; this
    /// may fail, in which case the moving tag is reported as-is. On
    /// primary-call failure, falls back to the forge's latest-release feed
    /// when `use_fallback` is set and a forge ref is supplied.
    pub async fn resolve_latest(&self, repo: &str, tag: &str, opts: ResolveOptions<'_>) -> ProviderResult<Option<LatestDescriptor>> {
        match self.registry.resolve_tag_digest(repo, tag, opts.registry_credential).await {
            Ok(Some(digest)) => {
                let resolved_tag = if tag == MOVING_TAG {
                    self.reverse_resolve_tag(repo, &digest, opts.registry_credential).await.unwrap_or_else(|| tag.to_string())
                } else {
                    tag.to_string()
                };
                Ok(Some(LatestDescriptor {
                    digest: Some(digest),
                    tag: Some(resolved_tag),
                    published_at: None,
                    resolved_at: Utc::now(),
                }))
            }
            Ok(None) => Ok(None),
            Err(ProviderError::RateLimited) => Err(ProviderError::RateLimited),
            Err(ProviderError::Transient(reason)) => {
                warn!(repo, tag, reason, "registry resolve failed, considering forge fallback");
                if opts.use_fallback {
                    if let Some(forge_ref) = opts.forge_ref {
                        return self.resolve_forge_latest(forge_ref, opts.forge_token).await;
                    }
                }
                Ok(None)
            }
        }
    }

    /// Scans the repo's tag list for a non-moving tag whose manifest digest
    /// equals `digest`. Returns `None` if no such tag is found or listing fails.
    async fn reverse_resolve_tag(&self, repo: &str, digest: &str, credential: Option<&str>) -> Option<String> {
        let tags = match self.registry.list_tags(repo, credential).await {
            Ok(tags) => tags,
            Err(e) => {
                warn!(repo, error = %e, "failed to list tags for moving-tag reverse resolution");
                return None;
            }
        };

        for candidate in tags.into_iter().filter(|t| t != MOVING_TAG) {
            match self.registry.resolve_tag_digest(repo, &candidate, credential).await {
                Ok(Some(candidate_digest)) if candidate_digest == digest => return Some(candidate),
                _ => continue,
            }
        }
        None
    }

    /// `resolveForgeLatest(forgeKind, ref, tokenOpt)` (spec.md §4.1). A
    /// release with no tag is not reported rather than inventing one.
    pub async fn resolve_forge_latest(&self, ref_: &str, token: Option<&str>) -> ProviderResult<Option<LatestDescriptor>> {
        let release = self.forge.latest_release(ref_, token).await?;
        Ok(release.filter(|r| !r.tag.is_empty()).map(|r| LatestDescriptor {
            digest: None,
            tag: Some(r.tag),
            published_at: r.published_at,
            resolved_at: Utc::now(),
        }))
    }

    /// `resolveForgeByTag(forgeKind, ref, tag, tokenOpt)` (spec.md §4.1).
    pub async fn resolve_forge_by_tag(&self, ref_: &str, tag: &str, token: Option<&str>) -> ProviderResult<Option<LatestDescriptor>> {
        let release = self.forge.release_by_tag(ref_, tag, token).await?;
        Ok(release.filter(|r| !r.tag.is_empty()).map(|r| LatestDescriptor {
            digest: None,
            tag: Some(r.tag),
            published_at: r.published_at,
            resolved_at: Utc::now(),
        }))
    }
}

pub use crate::services::version_normalize::has_update;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FakeRegistry {
        digests: std::collections::HashMap<String, String>,
        tags: Vec<String>,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl UpstreamProvider for FakeRegistry {
        async fn resolve_tag_digest(&self, _repo: &str, tag: &str, _credential: Option<&str>) -> ProviderResult<Option<String>> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.digests.get(tag).cloned())
        }

        async fn list_tags(&self, _repo: &str, _credential: Option<&str>) -> ProviderResult<Vec<String>> {
            Ok(self.tags.clone())
        }

        async fn latest_release(&self, _ref_: &str, _token: Option<&str>) -> ProviderResult<Option<crate::domain::models::ForgeRelease>> {
            Ok(None)
        }

        async fn release_by_tag(&self, _ref_: &str, _tag: &str, _token: Option<&str>) -> ProviderResult<Option<crate::domain::models::ForgeRelease>> {
            Ok(None)
        }
    }

    fn empty_forge() -> Arc<dyn UpstreamProvider> {
        Arc::new(FakeRegistry {
            digests: Default::default(),
            tags: vec![],
            calls: Mutex::new(0),
        })
    }

    #[tokio::test]
    async fn reverse_resolves_moving_tag_to_concrete_version() {
        let mut digests = std::collections::HashMap::new();
        digests.insert("latest".to_string(), "sha256:abc".to_string());
        digests.insert("1.2.3".to_string(), "sha256:abc".to_string());
        digests.insert("1.2.2".to_string(), "sha256:old".to_string());
        let registry = Arc::new(FakeRegistry {
            digests,
            tags: vec!["latest".into(), "1.2.3".into(), "1.2.2".into()],
            calls: Mutex::new(0),
        });
        let resolver = UpstreamResolver::new(registry, empty_forge());

        let result = resolver
            .resolve_latest(
                "acme/widget",
                "latest",
                ResolveOptions { forge_ref: None, forge_token: None, use_fallback: false, registry_credential: None },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.tag.as_deref(), Some("1.2.3"));
        assert_eq!(result.digest.as_deref(), Some("sha256:abc"));
    }

    #[tokio::test]
    async fn moving_tag_stays_as_is_when_reverse_resolution_fails() {
        let mut digests = std::collections::HashMap::new();
        digests.insert("latest".to_string(), "sha256:abc".to_string());
        let registry = Arc::new(FakeRegistry {
            digests,
            tags: vec!["latest".into()],
            calls: Mutex::new(0),
        });
        let resolver = UpstreamResolver::new(registry, empty_forge());

        let result = resolver
            .resolve_latest(
                "acme/widget",
                "latest",
                ResolveOptions { forge_ref: None, forge_token: None, use_fallback: false, registry_credential: None },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(result.tag.as_deref(), Some("latest"));
    }
}
