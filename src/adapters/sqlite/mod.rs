//! SQLite adapters for every repository port (spec.md §6's store).

pub mod batch_repository;
pub mod connection;
pub mod instance_repository;
pub mod intent_repository;
pub mod tracked_app_repository;

pub use batch_repository::{SqliteBatchJobConfigRepository, SqliteBatchRunRepository};
pub use connection::{create_migrated_test_pool, create_pool, ConnectionError, PoolConfig};
pub use instance_repository::SqliteInstanceRepository;
pub use intent_repository::{SqliteIntentExecutionRepository, SqliteIntentRepository};
pub use tracked_app_repository::{SqliteLatestDescriptorRepository, SqliteTrackedAppRepository};
