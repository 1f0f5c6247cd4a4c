//! Common types module for the order wizard.
//!
//! This module defines the data model shared by every wizard component: the
//! static step catalog, the step graph types, the wizard state document,
//! draft records and the per-service verification configuration.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Draft records, local snapshots and order codes.
pub mod draft;
/// Event types for communication between wizard components.
pub mod events;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Per-service verification configuration.
pub mod service;
/// Wizard state document and its module slices.
pub mod state;
/// Step catalog and step graph types.
pub mod steps;
/// Storage types for managing persistent data.
pub mod storage;
/// Utility functions for formatting and timestamps.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use api::*;
pub use draft::*;
pub use events::*;
pub use registry::*;
pub use service::*;
pub use state::*;
pub use steps::*;
pub use storage::*;
pub use utils::{current_timestamp, truncate_id};
pub use validation::*;
