use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::upstream::SourceKind;

/// A non-containerized (or independently-tracked) upstream a user wants
/// update notifications for, resolved through a forge release feed or a
/// registry, without necessarily being tied to a running container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedApp {
    pub id: Uuid,
    pub user_id: i64,
    pub name: String,
    pub source_kind: SourceKind,
    pub source_ref: String,
    pub current_version: Option<String>,
    pub current_digest: Option<String>,
    pub latest_version: Option<String>,
    pub latest_digest: Option<String>,
    pub current_published_at: Option<DateTime<Utc>>,
    pub latest_published_at: Option<DateTime<Utc>>,
    pub has_update: bool,
    pub last_checked: Option<DateTime<Utc>>,
    /// Opaque forge access token, resolved through `CredentialProvider`
    /// rather than stored in plaintext on this struct in memory for long.
    pub forge_token: Option<String>,
}
