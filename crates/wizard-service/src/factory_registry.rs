//! Factory registry for storage implementations.
//!
//! Every storage backend registers itself by name; the configuration picks
//! which ones to instantiate.

use std::collections::HashMap;
use std::sync::OnceLock;
use wizard_config::Config;
use wizard_core::{WizardBuilder, WizardEngine, WizardFactories};
use wizard_storage::StorageFactory;

/// Global registry for all implementation factories
pub struct FactoryRegistry {
	pub storage: HashMap<String, StorageFactory>,
}

impl FactoryRegistry {
	/// Create a new empty registry
	pub fn new() -> Self {
		Self {
			storage: HashMap::new(),
		}
	}

	/// Register a storage implementation
	pub fn register_storage(&mut self, name: impl Into<String>, factory: StorageFactory) {
		self.storage.insert(name.into(), factory);
	}
}

impl Default for FactoryRegistry {
	fn default() -> Self {
		Self::new()
	}
}

// Global registry instance
static REGISTRY: OnceLock<FactoryRegistry> = OnceLock::new();

/// Get the global factory registry, initializing it on first use
pub fn get_registry() -> &'static FactoryRegistry {
	REGISTRY.get_or_init(|| {
		let mut registry = FactoryRegistry::new();

		for (name, factory) in wizard_storage::get_all_implementations() {
			tracing::debug!("Registering storage implementation: {}", name);
			registry.register_storage(name, factory);
		}

		registry
	})
}

/// Build the wizard engine using the registry and config
pub fn build_engine_from_config(config: Config) -> Result<WizardEngine, Box<dyn std::error::Error>> {
	let registry = get_registry();

	let mut storage_factories = HashMap::new();
	for name in config.storage.implementations.keys() {
		match registry.storage.get(name) {
			Some(factory) => {
				storage_factories.insert(name.clone(), *factory);
			},
			None => {
				let mut available: Vec<_> = registry.storage.keys().cloned().collect();
				available.sort();
				return Err(format!(
					"Unknown storage implementation '{}'. Available: [{}]",
					name,
					available.join(", ")
				)
				.into());
			},
		}
	}

	let engine = WizardBuilder::new(config).build(WizardFactories { storage_factories })?;
	Ok(engine)
}

#[cfg(test)]
mod tests {
	use super::*;
	use wizard_config::builders::ConfigBuilder;
	use wizard_types::{ModuleToggle, ServiceVerificationConfig};

	fn config() -> ConfigBuilder {
		ConfigBuilder::new().service(
			"notary",
			ServiceVerificationConfig {
				personal_kyc: ModuleToggle::enabled(),
				..Default::default()
			},
		)
	}

	#[test]
	fn test_registry_knows_builtin_storage() {
		let registry = get_registry();
		assert!(registry.storage.contains_key("memory"));
		assert!(registry.storage.contains_key("file"));
	}

	#[test]
	fn test_build_engine_from_config() {
		let engine = build_engine_from_config(config().build()).unwrap();
		assert_eq!(engine.config().wizard.id, "test-wizard");
	}

	#[test]
	fn test_unknown_storage_lists_available() {
		let config = config()
			.storage("redis", toml::Value::Table(toml::map::Map::new()))
			.build();
		let error = build_engine_from_config(config).err().unwrap();
		assert!(error.to_string().contains("Unknown storage implementation 'redis'"));
		assert!(error.to_string().contains("file, memory"));
	}
}
