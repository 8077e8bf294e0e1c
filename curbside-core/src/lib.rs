//! Core types and service wiring for the curbside collection schedule aggregator.

/// In-process schedule cache.
pub mod memory;
/// Domain models shared by all providers and stores.
pub mod model;
/// Schedule notification emails.
pub mod notify;
/// Registry and helpers for plugging city-specific providers into the service.
pub mod plugin;
/// Traits describing the collaborator interfaces.
pub mod ports;
/// Offline `GeoNames` postal table.
pub mod postal;
/// ZIP code to region resolution.
pub mod region;
/// Bounded retry for rate-limited calls.
pub mod retry;
/// Statewide rule baselines.
pub mod rules;
/// High-level service facade used by clients.
pub mod service;

pub use model::*;
pub use plugin::*;
pub use ports::*;
pub use service::*;
