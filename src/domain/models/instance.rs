use serde::{Deserialize, Serialize};

/// How an instance authenticates with its remote container-orchestrator endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    Token,
    Userpass,
}

impl AuthKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Userpass => "userpass",
        }
    }
}

impl std::str::FromStr for AuthKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "token" => Ok(Self::Token),
            "userpass" => Ok(Self::Userpass),
            other => Err(format!("unknown auth kind: {other}")),
        }
    }
}

/// A remote container-orchestrator endpoint owned by a user.
///
/// Credentials are never stored on this struct; they are resolved through
/// the opaque `CredentialProvider` port keyed by `(user_id, instance.id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub url: String,
    pub auth_kind: AuthKind,
}
