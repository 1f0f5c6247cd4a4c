//! Versioned local snapshot cache.
//!
//! One snapshot per service, stored in the `snapshots` namespace. A snapshot
//! written by another cache version is never migrated: it is deleted and the
//! caller starts from a fresh state.

use super::PersistenceError;
use async_trait::async_trait;
use std::sync::Arc;
use wizard_storage::{StorageError, StorageService};
use wizard_types::{current_timestamp, LocalSnapshot, ModularStep, StorageKey, WizardState};

/// Local cache of in-progress wizard state.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
	/// Loads the snapshot of a service, `None` when absent or stale.
	async fn load(&self, service_id: &str) -> Result<Option<LocalSnapshot>, PersistenceError>;

	async fn store(&self, snapshot: &LocalSnapshot) -> Result<(), PersistenceError>;

	async fn clear(&self, service_id: &str) -> Result<(), PersistenceError>;

	/// Version written into new snapshots.
	fn version(&self) -> u32;

	/// Captures `state` against the graph it was built for.
	fn snapshot(&self, service_id: &str, steps: &[ModularStep], state: &WizardState) -> LocalSnapshot {
		LocalSnapshot {
			cache_version: self.version(),
			service_id: service_id.to_string(),
			saved_at: current_timestamp(),
			steps: steps.iter().map(|step| step.id).collect(),
			state: state.clone(),
		}
	}
}

/// Snapshot cache backed by the storage service.
pub struct StorageSnapshotCache {
	storage: Arc<StorageService>,
	version: u32,
}

impl StorageSnapshotCache {
	pub fn new(storage: Arc<StorageService>, version: u32) -> Self {
		Self { storage, version }
	}

	async fn discard(&self, service_id: &str) -> Result<(), PersistenceError> {
		match self
			.storage
			.remove(StorageKey::Snapshots.as_str(), service_id)
			.await
		{
			Ok(()) | Err(StorageError::NotFound) => Ok(()),
			Err(e) => Err(PersistenceError::Storage(e.to_string())),
		}
	}
}

#[async_trait]
impl SnapshotCache for StorageSnapshotCache {
	async fn load(&self, service_id: &str) -> Result<Option<LocalSnapshot>, PersistenceError> {
		// Read untyped first so a stale shape never has to decode.
		let raw: serde_json::Value = match self
			.storage
			.retrieve(StorageKey::Snapshots.as_str(), service_id)
			.await
		{
			Ok(value) => value,
			Err(StorageError::NotFound) => return Ok(None),
			Err(StorageError::Serialization(e)) => {
				tracing::warn!(service = %service_id, error = %e, "Discarding unreadable snapshot");
				self.discard(service_id).await?;
				return Ok(None);
			},
			Err(e) => return Err(PersistenceError::Storage(e.to_string())),
		};

		let stored_version = raw.get("cacheVersion").and_then(|v| v.as_u64());
		if stored_version != Some(u64::from(self.version)) {
			tracing::warn!(
				service = %service_id,
				stored = ?stored_version,
				current = self.version,
				"Discarding snapshot from another cache version"
			);
			self.discard(service_id).await?;
			return Ok(None);
		}

		match serde_json::from_value::<LocalSnapshot>(raw) {
			Ok(snapshot) => Ok(Some(snapshot)),
			Err(e) => {
				tracing::warn!(service = %service_id, error = %e, "Discarding undecodable snapshot");
				self.discard(service_id).await?;
				Ok(None)
			},
		}
	}

	async fn store(&self, snapshot: &LocalSnapshot) -> Result<(), PersistenceError> {
		self.storage
			.store(
				StorageKey::Snapshots.as_str(),
				&snapshot.service_id,
				snapshot,
			)
			.await
			.map_err(|e| PersistenceError::Storage(e.to_string()))
	}

	async fn clear(&self, service_id: &str) -> Result<(), PersistenceError> {
		self.discard(service_id).await
	}

	fn version(&self) -> u32 {
		self.version
	}
}
