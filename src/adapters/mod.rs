//! Concrete implementations of the `domain::ports` boundaries: SQLite
//! persistence, the upstream-provider HTTP clients, the endpoint RPC
//! client, and the environment-backed credential provider.

pub mod credentials;
pub mod endpoint_client;
pub mod forge_client;
pub mod registry_client;
pub mod sqlite;

pub use credentials::EnvCredentialProvider;
pub use endpoint_client::HttpEndpointClient;
pub use forge_client::{ForgeClient, ForgeKind};
pub use registry_client::RegistryClient;
