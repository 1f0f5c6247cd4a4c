//! Builder pattern for constructing wizard engines.
//!
//! Composes a WizardEngine from the configuration and a set of storage
//! factories, failing early on anything that would otherwise surface on the
//! first request: an inconsistent step catalog, a service whose step graph
//! cannot be built, or a storage backend that does not load.

use crate::engine::{event_bus::EventBus, WizardEngine};
use crate::steps::build_steps;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use wizard_config::Config;
use wizard_order::{DraftService, OrderCodeGenerator};
use wizard_storage::{StorageError, StorageInterface, StorageService};
use wizard_types::StepCatalog;

/// Errors that can occur during wizard engine construction.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Container for the factory functions needed to build a WizardEngine.
///
/// Each storage factory takes the TOML table of its implementation and
/// returns a backend.
pub struct WizardFactories<SF> {
	pub storage_factories: HashMap<String, SF>,
}

/// Builder for constructing a WizardEngine with pluggable storage.
pub struct WizardBuilder {
	config: Config,
}

impl WizardBuilder {
	/// Creates a new WizardBuilder with the given configuration.
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Builds the WizardEngine using the given storage factories.
	pub fn build<SF>(self, factories: WizardFactories<SF>) -> Result<WizardEngine, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		StepCatalog::validate().map_err(|e| BuilderError::Config(e.to_string()))?;

		let mut service_ids: Vec<&String> = self.config.services.keys().collect();
		service_ids.sort();
		for service_id in service_ids {
			let steps = build_steps(&self.config.services[service_id], None).map_err(|e| {
				BuilderError::Config(format!("Service '{}': {}", service_id, e))
			})?;
			tracing::info!(component = "steps", service = %service_id, steps = steps.len(), "Loaded");
		}

		// Create storage implementations
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			if let Some(factory) = factories.storage_factories.get(name) {
				match factory(config) {
					Ok(implementation) => {
						storage_impls.insert(name.clone(), implementation);
						let is_primary = &self.config.storage.primary == name;
						tracing::info!(component = "storage", implementation = %name, enabled = %is_primary, "Loaded");
					},
					Err(e) => {
						tracing::error!(
							component = "storage",
							implementation = %name,
							error = %e,
							"Failed to create storage implementation"
						);
						return Err(BuilderError::Config(format!(
							"Failed to create storage implementation '{}': {}",
							name, e
						)));
					},
				}
			}
		}

		if storage_impls.is_empty() {
			return Err(BuilderError::MissingComponent(
				"No valid storage implementations available".into(),
			));
		}

		// Get the primary storage implementation
		let primary_storage = &self.config.storage.primary;
		let storage_backend = storage_impls.remove(primary_storage).ok_or_else(|| {
			BuilderError::Config(format!(
				"Primary storage '{}' failed to load or has invalid configuration",
				primary_storage
			))
		})?;
		let storage = Arc::new(StorageService::new(storage_backend));

		let codes = OrderCodeGenerator::new(self.config.wizard.order_code_prefix.clone())
			.map_err(|e| BuilderError::Config(format!("Invalid order code prefix: {}", e)))?;
		let drafts = Arc::new(
			DraftService::new(storage.clone(), codes).with_ttl(self.config.wizard.draft_ttl()),
		);

		Ok(WizardEngine::new(
			self.config,
			storage,
			drafts,
			EventBus::default(),
		))
	}
}
