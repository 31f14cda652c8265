use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source kind for a tracked app, or (when used on its own) the source
/// a `LatestDescriptor` was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Registry,
    #[serde(rename = "forge-a")]
    ForgeA,
    #[serde(rename = "forge-b")]
    ForgeB,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registry => "registry",
            Self::ForgeA => "forge-a",
            Self::ForgeB => "forge-b",
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "registry" => Ok(Self::Registry),
            "forge-a" => Ok(Self::ForgeA),
            "forge-b" => Ok(Self::ForgeB),
            other => Err(format!("unknown source kind: {other}")),
        }
    }
}

/// The system's cached notion of the newest upstream artifact for a given
/// image coordinate (registry/repo/tag) or tracked-app source.
///
/// Keyed by `(user_id, repo, tag)` for registry images, or
/// `(user_id, source_kind, source_ref)` for tracked apps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatestDescriptor {
    pub digest: Option<String>,
    pub tag: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub resolved_at: DateTime<Utc>,
}

/// A single release entry as returned by a forge's release feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeRelease {
    pub tag: String,
    pub published_at: Option<DateTime<Utc>>,
    pub html_url: Option<String>,
}
