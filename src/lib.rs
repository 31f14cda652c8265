//! fleetctl - multi-tenant control plane that keeps container workloads
//! across many container-orchestrator instances in sync with their
//! upstream images and upstream source releases.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod http;
pub mod logging;
pub mod services;
