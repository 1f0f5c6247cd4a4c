//! Lifecycle management for the wizard engine.
//!
//! Handles the checks run before the engine starts serving and the cleanup
//! performed when it stops.

use super::{EngineError, WizardEngine};
use wizard_types::StepCatalog;

impl WizardEngine {
	/// Verifies the step catalog and every configured step graph.
	pub async fn initialize(&self) -> Result<(), EngineError> {
		tracing::info!("Initializing wizard engine");

		StepCatalog::validate().map_err(|e| EngineError::Config(e.to_string()))?;
		for service_id in self.config.services.keys() {
			let steps = self.steps_for(service_id, None)?;
			tracing::debug!(service = %service_id, steps = steps.len(), "Step graph ready");
		}

		Ok(())
	}

	/// Performs cleanup operations
	pub async fn shutdown(&self) -> Result<(), EngineError> {
		tracing::info!("Shutting down wizard engine");

		// Drop what expired while running
		match self.drafts.cleanup_expired().await {
			Ok(count) if count > 0 => {
				tracing::debug!("Storage cleanup: removed {} expired drafts", count);
			},
			Ok(_) => {},
			Err(e) => return Err(EngineError::Service(e.to_string())),
		}

		Ok(())
	}
}
