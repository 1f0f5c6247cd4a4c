//! Order identifiers and draft records for the order wizard.
//!
//! This crate provides the Order Identifier Service, which issues and checks
//! human-shareable order codes, and the draft service that owns the lifecycle
//! of the remote draft record keyed by those codes.

use thiserror::Error;
use wizard_types::{DraftStatus, OrderCodeError};

pub mod code;
pub mod drafts;

pub use code::OrderCodeGenerator;
pub use drafts::DraftService;

/// Errors that can occur while managing draft records.
#[derive(Debug, Error)]
pub enum DraftError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Draft not found: {0}")]
	NotFound(String),
	#[error("Invalid order code: {0}")]
	InvalidCode(#[from] OrderCodeError),
	/// The regenerated code collided as well.
	#[error("Order code collision persisted after retry: {0}")]
	Collision(String),
	#[error("Invalid status transition from {from} to {to}")]
	InvalidTransition { from: DraftStatus, to: DraftStatus },
	#[error("Draft {code} is {status} and no longer accepts edits")]
	NotEditable { code: String, status: DraftStatus },
}
