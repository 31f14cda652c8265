use async_trait::async_trait;

use crate::domain::errors::ProviderResult;
use crate::domain::models::ForgeRelease;

/// One capability set, three implementations (spec.md §9 design note):
/// a container registry client, and two forge clients, each able to
/// answer "what tag does this digest resolve to" and "what's the latest
/// release". `UpstreamResolver` composes these with the digest→forge
/// fallback; the composition itself satisfies this same trait so it can
/// be swapped in anywhere a single provider is expected.
#[async_trait]
pub trait UpstreamProvider: Send + Sync {
    /// Resolve the manifest digest of `tag` in `repo`. `None` when the tag
    /// doesn't exist; a `ProviderError` for transient/rate-limit failures.
    async fn resolve_tag_digest(&self, repo: &str, tag: &str, credential: Option<&str>) -> ProviderResult<Option<String>>;

    /// List all tags for `repo`, for moving-tag reverse resolution.
    async fn list_tags(&self, repo: &str, credential: Option<&str>) -> ProviderResult<Vec<String>>;

    /// Latest release for `ref_`, trying with and without a leading `v`
    /// prefix isn't relevant here (that's `resolve_forge_by_tag`); this is
    /// the feed's own notion of "latest".
    async fn latest_release(&self, ref_: &str, token: Option<&str>) -> ProviderResult<Option<ForgeRelease>>;

    /// Release matching `tag` exactly, trying with and without a leading
    /// `v` prefix (spec.md §4.1).
    async fn release_by_tag(&self, ref_: &str, tag: &str, token: Option<&str>) -> ProviderResult<Option<ForgeRelease>>;
}
