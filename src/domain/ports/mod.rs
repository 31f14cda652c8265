//! Trait boundaries to everything the spec treats as an external
//! collaborator: the store, the remote orchestrators, the upstream
//! providers, credentials, and the notification transport.

pub mod batch_repository;
pub mod credential_provider;
pub mod endpoint_client;
pub mod instance_repository;
pub mod intent_repository;
pub mod notifier;
pub mod tracked_app_repository;
pub mod upstream_provider;

pub use batch_repository::{BatchJobConfigRepository, BatchRunRepository};
pub use credential_provider::CredentialProvider;
pub use endpoint_client::{ContainerConfigSnapshot, EndpointClient, RawContainer};
pub use instance_repository::{ContainerInventoryPort, InstanceRepository};
pub use intent_repository::{IntentExecutionRepository, IntentRepository};
pub use notifier::Notifier;
pub use tracked_app_repository::{LatestDescriptorRepository, TrackedAppRepository};
pub use upstream_provider::UpstreamProvider;
