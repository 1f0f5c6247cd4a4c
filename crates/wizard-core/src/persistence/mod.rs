//! Draft persistence.
//!
//! Three independent pieces keep a wizard's progress durable:
//!
//! - [`snapshot`]: the versioned local cache, discarded on version mismatch
//! - [`autosave`]: the worker that debounces changes and upserts the remote
//!   draft record
//! - [`url_sync`]: the step-number query parameter, synced in both
//!   directions with loop suppression
//!
//! The remote draft store is reached through [`DraftSink`] so sessions can be
//! driven against test doubles.

pub mod autosave;
pub mod snapshot;
pub mod url_sync;

pub use autosave::{AutosaveConfig, AutosaveHandle, AutosaveWorker, SaveOutcome};
pub use snapshot::{SnapshotCache, StorageSnapshotCache};
pub use url_sync::{MemoryParamChannel, StepParamChannel, StepParamSync};

use async_trait::async_trait;
use thiserror::Error;
use wizard_order::{DraftError, DraftService};
use wizard_types::{DraftRecord, OrderCode, WizardState};

/// Errors raised by the persistence layer.
#[derive(Debug, Error)]
pub enum PersistenceError {
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Draft error: {0}")]
	Draft(#[from] DraftError),
	#[error("Save cancelled")]
	Cancelled,
	#[error("Autosave worker stopped")]
	WorkerStopped,
}

/// Remote draft store as seen by a wizard session.
#[async_trait]
pub trait DraftSink: Send + Sync {
	/// Creates a record for `state` and assigns its order code.
	async fn create(&self, service_id: &str, state: WizardState) -> Result<DraftRecord, DraftError>;

	/// Replaces the state of an existing record.
	async fn save(
		&self,
		code: &OrderCode,
		state: WizardState,
		revision: u64,
	) -> Result<DraftRecord, DraftError>;

	/// Loads a record, `None` when it does not exist.
	async fn load(&self, code: &OrderCode) -> Result<Option<DraftRecord>, DraftError>;

	async fn submit(&self, code: &OrderCode) -> Result<DraftRecord, DraftError>;
}

#[async_trait]
impl DraftSink for DraftService {
	async fn create(&self, service_id: &str, state: WizardState) -> Result<DraftRecord, DraftError> {
		DraftService::create(self, service_id, state).await
	}

	async fn save(
		&self,
		code: &OrderCode,
		state: WizardState,
		revision: u64,
	) -> Result<DraftRecord, DraftError> {
		DraftService::save(self, code, state, revision).await
	}

	async fn load(&self, code: &OrderCode) -> Result<Option<DraftRecord>, DraftError> {
		match DraftService::load(self, code).await {
			Ok(record) => Ok(Some(record)),
			Err(DraftError::NotFound(_)) => Ok(None),
			Err(e) => Err(e),
		}
	}

	async fn submit(&self, code: &OrderCode) -> Result<DraftRecord, DraftError> {
		DraftService::submit(self, code).await
	}
}

/// Save status shown next to the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveIndicator {
	/// Everything is persisted.
	Saved,
	/// A remote write is in flight.
	Saving,
	/// The last write failed; it will be retried.
	NotSaved,
	/// There are changes and no write was attempted yet.
	Unsaved,
}

impl SaveIndicator {
	pub fn derive(is_dirty: bool, saving: bool, failed: bool) -> Self {
		match (is_dirty, saving, failed) {
			(_, true, _) => SaveIndicator::Saving,
			(true, false, true) => SaveIndicator::NotSaved,
			(true, false, false) => SaveIndicator::Unsaved,
			(false, false, _) => SaveIndicator::Saved,
		}
	}
}
