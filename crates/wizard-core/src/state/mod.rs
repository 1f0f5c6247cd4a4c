//! Wizard state machine over a built step graph.

pub mod wizard;

pub use wizard::{reduce, WizardAction, WizardError, WizardMachine};
