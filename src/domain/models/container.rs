use serde::{Deserialize, Serialize};

/// A container as last observed by an inventory sweep, joined with the
/// deployed-image record and the cached `LatestDescriptor` for its
/// `(repo, tag)`. This is the view the Matching Engine selects over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatedContainer {
    pub container_id: String,
    pub instance_id: i64,
    pub endpoint_id: i64,
    pub name: String,
    pub stack_name: Option<String>,
    pub image: String,
    pub status: String,
    pub state: String,
    pub current_digest: Option<String>,
    pub current_digest_full: Option<String>,
    pub registry: String,
    pub repo: String,
    pub tag: String,
    pub has_update: bool,
    /// Base URL of the owning instance, required by the upgrade executor.
    pub instance_url: String,
    /// The `LatestDescriptor` this container was annotated against, when one exists.
    pub latest_tag: Option<String>,
    pub latest_digest: Option<String>,
}

impl AnnotatedContainer {
    /// The image reference the upgrade executor should pull: same repo,
    /// the latest known tag if one was resolved, otherwise the current tag.
    pub fn latest_image_ref(&self) -> String {
        let tag = self.latest_tag.as_deref().unwrap_or(&self.tag);
        if self.registry == "docker.io" {
            format!("{}:{}", self.repo, tag)
        } else {
            format!("{}/{}:{}", self.registry, self.repo, tag)
        }
    }
}

/// An image present on an endpoint that no running container currently
/// references, as surfaced for cleanup (spec.md §6 `/api/images/unused`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedImage {
    pub instance_id: i64,
    pub endpoint_id: i64,
    pub instance_url: String,
    pub image_id: String,
    pub repo_tags: Vec<String>,
    pub size_bytes: Option<i64>,
}

/// Derived during inventory sweep: the registry coordinate a container's
/// image reference resolves to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployedImage {
    pub instance_id: i64,
    pub image_ref: String,
    pub registry: String,
    pub repo: String,
    pub tag: String,
    pub current_digest_full: Option<String>,
}

/// Splits an image reference (`registry/repo:tag`, `repo:tag`, `repo`) into
/// its registry, repo, and tag components.
///
/// `registry` is the portion before the first `/` when that portion
/// contains a `.` or a `:` (spec.md §4.3); otherwise the default public
/// registry is assumed. A missing tag defaults to `latest`.
pub fn parse_image_ref(image: &str) -> (String, String, String) {
    const DEFAULT_REGISTRY: &str = "docker.io";

    let (repo_and_tag, registry) = match image.split_once('/') {
        Some((first, rest)) if first.contains('.') || first.contains(':') => {
            (rest.to_string(), first.to_string())
        }
        _ => (image.to_string(), DEFAULT_REGISTRY.to_string()),
    };

    match repo_and_tag.rsplit_once(':') {
        // Guard against mistaking a port-containing registry host for a tag
        // separator when no registry was split off above.
        Some((repo, tag)) if !tag.contains('/') => (registry, repo.to_string(), tag.to_string()),
        _ => (registry, repo_and_tag, "latest".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_registry_repo_tag() {
        assert_eq!(
            parse_image_ref("ghcr.io/acme/widget:1.2.3"),
            ("ghcr.io".into(), "acme/widget".into(), "1.2.3".into())
        );
    }

    #[test]
    fn defaults_to_public_registry_without_dot_or_colon() {
        assert_eq!(
            parse_image_ref("library/nginx:latest"),
            ("docker.io".into(), "library/nginx".into(), "latest".into())
        );
    }

    #[test]
    fn defaults_tag_to_latest() {
        assert_eq!(
            parse_image_ref("acme/widget"),
            ("docker.io".into(), "acme/widget".into(), "latest".into())
        );
    }

    #[test]
    fn does_not_confuse_port_in_registry_host_with_tag() {
        assert_eq!(
            parse_image_ref("registry.local:5000/acme/widget"),
            ("registry.local:5000".into(), "acme/widget".into(), "latest".into())
        );
    }
}
