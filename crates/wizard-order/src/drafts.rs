//! Draft record lifecycle.
//!
//! Draft records live in the `drafts` namespace, keyed by order code. A record
//! is created once (create-only write, with a single regeneration retry on a
//! code collision), then overwritten as a whole by later saves. Saves carry
//! the revision of the wizard state they captured; a save older than the
//! stored revision is ignored so that a slow autosave cannot clobber a newer
//! explicit save. Submission is a status transition on the same record.

use crate::code::OrderCodeGenerator;
use crate::DraftError;
use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;
use wizard_storage::{StorageError, StorageService};
use wizard_types::{
	current_timestamp, truncate_id, DraftRecord, DraftStatus, OrderCode, StorageKey, WizardState,
};

/// Creates, saves and transitions draft records.
pub struct DraftService {
	storage: Arc<StorageService>,
	codes: OrderCodeGenerator,
	/// Retention applied on every write.
	ttl: Option<Duration>,
}

impl DraftService {
	pub fn new(storage: Arc<StorageService>, codes: OrderCodeGenerator) -> Self {
		Self {
			storage,
			codes,
			ttl: None,
		}
	}

	/// Sets the retention of draft records.
	pub fn with_ttl(mut self, ttl: Duration) -> Self {
		self.ttl = Some(ttl);
		self
	}

	pub fn codes(&self) -> &OrderCodeGenerator {
		&self.codes
	}

	/// Creates a draft record for `state` under a freshly generated code.
	///
	/// A code collision triggers exactly one regeneration; a second collision
	/// is returned as `DraftError::Collision`.
	#[instrument(skip_all, fields(service = %service_id))]
	pub async fn create(
		&self,
		service_id: &str,
		state: WizardState,
	) -> Result<DraftRecord, DraftError> {
		let mut attempt = 0;
		loop {
			let code = self.codes.generate()?;
			let now = current_timestamp();
			let mut state = state.clone();
			state.order_id = Some(code.clone());

			let record = DraftRecord {
				code: code.clone(),
				service_id: service_id.to_string(),
				status: DraftStatus::Draft,
				revision: state.revision,
				state,
				created_at: now,
				updated_at: now,
				submitted_at: None,
			};

			match self
				.storage
				.insert(StorageKey::Drafts.as_str(), code.as_str(), &record, self.ttl)
				.await
			{
				Ok(()) => {
					tracing::info!(order_code = %code, "Draft created");
					return Ok(record);
				},
				Err(StorageError::AlreadyExists(_)) if attempt == 0 => {
					tracing::warn!(
						order_code = %code,
						"Order code collision, regenerating once"
					);
					attempt += 1;
				},
				Err(StorageError::AlreadyExists(_)) => {
					return Err(DraftError::Collision(code.to_string()));
				},
				Err(e) => return Err(DraftError::Storage(e.to_string())),
			}
		}
	}

	/// Loads a draft record.
	pub async fn load(&self, code: &OrderCode) -> Result<DraftRecord, DraftError> {
		self.storage
			.retrieve(StorageKey::Drafts.as_str(), code.as_str())
			.await
			.map_err(|e| match e {
				StorageError::NotFound => DraftError::NotFound(code.to_string()),
				other => DraftError::Storage(other.to_string()),
			})
	}

	/// Parses an externally supplied code and loads its record.
	pub async fn load_by_str(&self, code: &str) -> Result<DraftRecord, DraftError> {
		let code = self.codes.parse(code)?;
		self.load(&code).await
	}

	/// Replaces the state held by a draft record.
	///
	/// Writes carrying a revision older than the stored one are ignored and
	/// the stored record is returned unchanged. Records that left the draft
	/// status reject writes.
	#[instrument(skip_all, fields(order_code = %truncate_id(code.as_str()), revision = revision))]
	pub async fn save(
		&self,
		code: &OrderCode,
		state: WizardState,
		revision: u64,
	) -> Result<DraftRecord, DraftError> {
		let current = self.load(code).await?;
		if !current.status.accepts_edits() {
			return Err(DraftError::NotEditable {
				code: code.to_string(),
				status: current.status,
			});
		}
		if revision < current.revision {
			tracing::debug!(
				stored = current.revision,
				"Ignoring draft write older than the stored revision"
			);
			return Ok(current);
		}

		let code_for_state = code.clone();
		self.update_with(current, |record| {
			record.state = state;
			record.state.order_id = Some(code_for_state);
			record.revision = revision;
		})
		.await
	}

	/// Submits a draft, moving it out of the editable status.
	#[instrument(skip_all, fields(order_code = %truncate_id(code.as_str())))]
	pub async fn submit(&self, code: &OrderCode) -> Result<DraftRecord, DraftError> {
		let record = self.transition(code, DraftStatus::Submitted).await?;
		tracing::info!("Draft submitted");
		Ok(record)
	}

	/// Moves a draft to a new status with validation.
	pub async fn transition(
		&self,
		code: &OrderCode,
		new_status: DraftStatus,
	) -> Result<DraftRecord, DraftError> {
		let record = self.load(code).await?;
		if !Self::is_valid_transition(record.status, new_status) {
			return Err(DraftError::InvalidTransition {
				from: record.status,
				to: new_status,
			});
		}

		self.update_with(record, |r| {
			r.status = new_status;
			if new_status == DraftStatus::Submitted {
				r.submitted_at = Some(current_timestamp());
			}
		})
		.await
	}

	/// Removes expired drafts from storage.
	pub async fn cleanup_expired(&self) -> Result<usize, DraftError> {
		self.storage
			.cleanup_expired()
			.await
			.map_err(|e| DraftError::Storage(e.to_string()))
	}

	/// Applies an update to a record and persists it.
	async fn update_with<F>(
		&self,
		mut record: DraftRecord,
		updater: F,
	) -> Result<DraftRecord, DraftError>
	where
		F: FnOnce(&mut DraftRecord),
	{
		updater(&mut record);
		record.updated_at = current_timestamp();

		self.storage
			.update_with_ttl(
				StorageKey::Drafts.as_str(),
				record.code.as_str(),
				&record,
				self.ttl,
			)
			.await
			.map_err(|e| match e {
				StorageError::NotFound => DraftError::NotFound(record.code.to_string()),
				other => DraftError::Storage(other.to_string()),
			})?;

		Ok(record)
	}

	/// Checks if a status transition is valid.
	fn is_valid_transition(from: DraftStatus, to: DraftStatus) -> bool {
		static TRANSITIONS: Lazy<HashMap<DraftStatus, HashSet<DraftStatus>>> = Lazy::new(|| {
			let mut m = HashMap::new();
			m.insert(
				DraftStatus::Draft,
				HashSet::from([DraftStatus::Submitted, DraftStatus::Cancelled]),
			);
			m.insert(
				DraftStatus::Submitted,
				HashSet::from([DraftStatus::Processing, DraftStatus::Cancelled]),
			);
			m.insert(
				DraftStatus::Processing,
				HashSet::from([DraftStatus::Completed, DraftStatus::Cancelled]),
			);
			m.insert(DraftStatus::Completed, HashSet::new()); // terminal
			m.insert(DraftStatus::Cancelled, HashSet::new()); // terminal
			m
		});

		TRANSITIONS.get(&from).is_some_and(|set| set.contains(&to))
	}
}
