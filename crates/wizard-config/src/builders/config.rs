//! Configuration builder for tests and embedded setups.
//!
//! Produces a `Config` with an in-memory storage backend and short autosave
//! timings, without going through TOML.

use crate::{ApiConfig, Config, StorageConfig, WizardSettings};
use std::collections::HashMap;
use wizard_types::ServiceVerificationConfig;

/// Builder for creating `Config` instances with a fluent API.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
	wizard_id: String,
	cache_version: u32,
	autosave_interval_ms: u64,
	debounce_ms: u64,
	order_code_prefix: String,
	storage_primary: String,
	storage_implementations: HashMap<String, toml::Value>,
	storage_cleanup_interval_seconds: u64,
	services: HashMap<String, ServiceVerificationConfig>,
	api: Option<ApiConfig>,
}

impl Default for ConfigBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigBuilder {
	/// Creates a new `ConfigBuilder` with default values suitable for testing.
	pub fn new() -> Self {
		let mut storage_implementations = HashMap::new();
		storage_implementations.insert(
			"memory".to_string(),
			toml::Value::Table(toml::map::Map::new()),
		);

		Self {
			wizard_id: "test-wizard".to_string(),
			cache_version: 1,
			autosave_interval_ms: 1_000,
			debounce_ms: 100,
			order_code_prefix: "ORD".to_string(),
			storage_primary: "memory".to_string(),
			storage_implementations,
			storage_cleanup_interval_seconds: 60,
			services: HashMap::new(),
			api: None,
		}
	}

	pub fn wizard_id(mut self, id: impl Into<String>) -> Self {
		self.wizard_id = id.into();
		self
	}

	pub fn cache_version(mut self, version: u32) -> Self {
		self.cache_version = version;
		self
	}

	/// Sets the autosave interval and debounce window, in milliseconds.
	pub fn autosave(mut self, interval_ms: u64, debounce_ms: u64) -> Self {
		self.autosave_interval_ms = interval_ms;
		self.debounce_ms = debounce_ms;
		self
	}

	pub fn order_code_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.order_code_prefix = prefix.into();
		self
	}

	/// Sets the primary storage implementation and its configuration table.
	pub fn storage(mut self, primary: impl Into<String>, config: toml::Value) -> Self {
		let primary = primary.into();
		self.storage_implementations.insert(primary.clone(), config);
		self.storage_primary = primary;
		self
	}

	pub fn storage_cleanup_interval_seconds(mut self, interval: u64) -> Self {
		self.storage_cleanup_interval_seconds = interval;
		self
	}

	/// Adds a service configuration.
	pub fn service(mut self, id: impl Into<String>, config: ServiceVerificationConfig) -> Self {
		self.services.insert(id.into(), config);
		self
	}

	pub fn api(mut self, api: Option<ApiConfig>) -> Self {
		self.api = api;
		self
	}

	/// Builds the `Config` with the configured values.
	///
	/// The result is not validated; feed it through the engine builder or
	/// serialize and parse it to get validation.
	pub fn build(self) -> Config {
		Config {
			wizard: WizardSettings {
				id: self.wizard_id,
				cache_version: self.cache_version,
				autosave_interval_ms: self.autosave_interval_ms,
				debounce_ms: self.debounce_ms,
				order_code_prefix: self.order_code_prefix,
				step_param: "step".to_string(),
				draft_ttl_days: 7,
			},
			storage: StorageConfig {
				primary: self.storage_primary,
				implementations: self.storage_implementations,
				cleanup_interval_seconds: self.storage_cleanup_interval_seconds,
			},
			services: self.services,
			api: self.api,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use wizard_types::ModuleToggle;

	#[test]
	fn test_built_config_round_trips_through_validation() {
		let config = ConfigBuilder::new()
			.service(
				"birth-certificate",
				ServiceVerificationConfig {
					personal_kyc: ModuleToggle::enabled(),
					..Default::default()
				},
			)
			.build();

		let text = toml::to_string(&config).unwrap();
		let parsed: Config = text.parse().unwrap();
		assert_eq!(parsed.wizard.id, "test-wizard");
		assert_eq!(parsed.storage.primary, "memory");
	}
}
