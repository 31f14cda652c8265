use serde::{Deserialize, Serialize};

/// A tenant of the control plane. Every other entity is user-scoped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}
