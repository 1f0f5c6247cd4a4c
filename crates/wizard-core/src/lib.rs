//! Core engine of the order wizard.
//!
//! This crate turns a service's verification configuration into an ordered
//! step graph, navigates it with a pure state machine, and keeps the wizard
//! state durable through a local snapshot cache, an autosave worker writing
//! the remote draft record, and a step-number query parameter. A session
//! ties these together for one user; the engine owns the shared services and
//! is composed by the builder from configuration and storage factories.

pub mod builder;
pub mod engine;
pub mod persistence;
pub mod session;
pub mod state;
pub mod steps;

pub use builder::{BuilderError, WizardBuilder, WizardFactories};
pub use engine::{event_bus::EventBus, EngineError, WizardEngine};
pub use persistence::{DraftSink, PersistenceError, SaveIndicator, SnapshotCache};
pub use session::{SessionDeps, SessionError, SessionOptions, WizardSession};
pub use state::{reduce, WizardAction, WizardError, WizardMachine};
pub use steps::{build_steps, renumber_steps, visible_steps, BuildError};
