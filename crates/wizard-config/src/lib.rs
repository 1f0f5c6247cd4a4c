//! Configuration module for the order wizard.
//!
//! This module provides the structures used to configure the wizard: the
//! engine settings (cache version, autosave timing, order code prefix), the
//! storage backend, the per-service verification configurations and the
//! HTTP API. Configuration is loaded from TOML and validated as a whole
//! before anything is built from it.
//!
//! ## Modular Configuration Support
//!
//! Configurations can be split into multiple files:
//! - Use `include = ["services.toml", "storage.toml"]` to include other files
//! - Each top-level section must be unique across all files

pub mod builders;
mod loader;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use wizard_types::ServiceVerificationConfig;

pub use loader::ConfigLoader;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Keep the message, drop the echoed input
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the order wizard.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Engine-wide wizard settings.
	pub wizard: WizardSettings,
	/// Configuration for the storage backend.
	pub storage: StorageConfig,
	/// Verification configuration of every service, keyed by service id.
	pub services: HashMap<String, ServiceVerificationConfig>,
	/// Configuration for the HTTP API server.
	pub api: Option<ApiConfig>,
}

/// Engine-wide wizard settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WizardSettings {
	/// Identifier of this wizard deployment, used in logs.
	pub id: String,
	/// Version tag written into local snapshots. Snapshots carrying any
	/// other version are discarded on load.
	#[serde(default = "default_cache_version")]
	pub cache_version: u32,
	/// Interval of the periodic autosave while the state is dirty.
	#[serde(default = "default_autosave_interval_ms")]
	pub autosave_interval_ms: u64,
	/// Quiet period after a change before an autosave is attempted.
	#[serde(default = "default_debounce_ms")]
	pub debounce_ms: u64,
	/// Leading segment of generated order codes.
	#[serde(default = "default_order_code_prefix")]
	pub order_code_prefix: String,
	/// Name of the query parameter mirroring the current step.
	#[serde(default = "default_step_param")]
	pub step_param: String,
	/// Retention of remote drafts, in days.
	#[serde(default = "default_draft_ttl_days")]
	pub draft_ttl_days: u64,
}

impl WizardSettings {
	pub fn autosave_interval(&self) -> Duration {
		Duration::from_millis(self.autosave_interval_ms)
	}

	pub fn debounce(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}

	pub fn draft_ttl(&self) -> Duration {
		Duration::from_secs(self.draft_ttl_days.saturating_mul(24 * 60 * 60))
	}
}

fn default_cache_version() -> u32 {
	1
}

fn default_autosave_interval_ms() -> u64 {
	30_000
}

fn default_debounce_ms() -> u64 {
	1_500
}

fn default_order_code_prefix() -> String {
	"ORD".to_string()
}

fn default_step_param() -> String {
	"step".to_string()
}

/// Drafts are short-lived; a week covers an abandoned session.
fn default_draft_ttl_days() -> u64 {
	7
}

/// Configuration for the storage backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Which implementation to use as primary.
	pub primary: String,
	/// Map of storage implementation names to their configurations.
	pub implementations: HashMap<String, toml::Value>,
	/// Interval in seconds for cleaning up expired storage entries.
	pub cleanup_interval_seconds: u64,
}

/// Configuration for the HTTP API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	/// Whether the API server is enabled.
	#[serde(default)]
	pub enabled: bool,
	/// Host address to bind the server to.
	#[serde(default = "default_api_host")]
	pub host: String,
	/// Port to bind the server to.
	#[serde(default = "default_api_port")]
	pub port: u16,
	/// Request timeout in seconds.
	#[serde(default = "default_api_timeout")]
	pub timeout_seconds: u64,
	/// Maximum request size in bytes.
	#[serde(default = "default_max_request_size")]
	pub max_request_size: usize,
	/// CORS configuration.
	pub cors: Option<CorsConfig>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
	/// Allowed origins for CORS.
	pub allowed_origins: Vec<String>,
	/// Allowed headers for CORS.
	pub allowed_headers: Vec<String>,
	/// Allowed methods for CORS.
	pub allowed_methods: Vec<String>,
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_api_timeout() -> u64 {
	30
}

fn default_max_request_size() -> usize {
	1024 * 1024 // 1MB
}

/// Resolves environment variables in a string.
///
/// Replaces ${VAR_NAME} with the value of the environment variable VAR_NAME.
/// Supports default values with ${VAR_NAME:-default_value}.
///
/// Input strings are limited to 1MB to bound regex work.
pub(crate) fn resolve_env_vars(input: &str) -> Result<String, ConfigError> {
	const MAX_INPUT_SIZE: usize = 1024 * 1024;
	if input.len() > MAX_INPUT_SIZE {
		return Err(ConfigError::Validation(format!(
			"Configuration file too large: {} bytes (max: {} bytes)",
			input.len(),
			MAX_INPUT_SIZE
		)));
	}

	let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]{0,127})(?::-([^}]{0,256}))?\}")
		.map_err(|e| ConfigError::Parse(format!("Regex error: {}", e)))?;

	let mut result = String::with_capacity(input.len());
	let mut last_end = 0;

	for cap in re.captures_iter(input) {
		let (Some(full_match), Some(var_name)) = (cap.get(0), cap.get(1)) else {
			continue;
		};
		let value = match std::env::var(var_name.as_str()) {
			Ok(v) => v,
			Err(_) => match cap.get(2) {
				Some(default) => default.as_str().to_string(),
				None => {
					return Err(ConfigError::Validation(format!(
						"Environment variable '{}' not found",
						var_name.as_str()
					)))
				},
			},
		};

		result.push_str(&input[last_end..full_match.start()]);
		result.push_str(&value);
		last_end = full_match.end();
	}
	result.push_str(&input[last_end..]);

	Ok(result)
}

/// Checks the shape of an order code prefix: 2 to 5 uppercase ASCII letters.
fn is_valid_prefix(prefix: &str) -> bool {
	(2..=5).contains(&prefix.len()) && prefix.bytes().all(|b| b.is_ascii_uppercase())
}

impl Config {
	/// Loads configuration from a file with environment variable resolution.
	///
	/// Supports `include = [...]` directives; each top-level section must be
	/// unique across all configuration files.
	pub async fn from_file(path: &str) -> Result<Self, ConfigError> {
		let path_buf = Path::new(path);
		let base_dir = path_buf.parent().unwrap_or_else(|| Path::new("."));

		let mut loader = ConfigLoader::new(base_dir);
		let file_name = path_buf
			.file_name()
			.ok_or_else(|| ConfigError::Validation(format!("Invalid path: {}", path)))?;
		loader.load_config(file_name).await
	}

	/// Returns the verification configuration of a service.
	pub fn service(&self, service_id: &str) -> Option<&ServiceVerificationConfig> {
		self.services.get(service_id)
	}

	/// Validates the configuration to ensure all required fields are properly set.
	///
	/// - Wizard id is not empty, cache version is at least 1
	/// - The debounce window is shorter than the autosave interval
	/// - The order code prefix has the shape of a code prefix
	/// - The primary storage backend is configured and the cleanup interval
	///   is within 1..=86400 seconds
	/// - At least one service exists and each passes its own validation
	fn validate(&self) -> Result<(), ConfigError> {
		let wizard = &self.wizard;
		if wizard.id.trim().is_empty() {
			return Err(ConfigError::Validation("Wizard ID cannot be empty".into()));
		}
		if wizard.cache_version == 0 {
			return Err(ConfigError::Validation(
				"cache_version must be at least 1".into(),
			));
		}
		if wizard.autosave_interval_ms == 0 {
			return Err(ConfigError::Validation(
				"autosave_interval_ms must be greater than 0".into(),
			));
		}
		if wizard.debounce_ms >= wizard.autosave_interval_ms {
			return Err(ConfigError::Validation(format!(
				"debounce_ms ({}) must be shorter than autosave_interval_ms ({})",
				wizard.debounce_ms, wizard.autosave_interval_ms
			)));
		}
		if !is_valid_prefix(&wizard.order_code_prefix) {
			return Err(ConfigError::Validation(format!(
				"order_code_prefix '{}' must be 2 to 5 uppercase ASCII letters",
				wizard.order_code_prefix
			)));
		}
		if wizard.step_param.trim().is_empty() {
			return Err(ConfigError::Validation("step_param cannot be empty".into()));
		}
		if wizard.draft_ttl_days == 0 {
			return Err(ConfigError::Validation(
				"draft_ttl_days must be at least 1".into(),
			));
		}

		// Validate storage config
		if self.storage.primary.is_empty() {
			return Err(ConfigError::Validation(
				"Storage primary implementation cannot be empty".into(),
			));
		}
		if !self
			.storage
			.implementations
			.contains_key(&self.storage.primary)
		{
			return Err(ConfigError::Validation(format!(
				"Primary storage '{}' not found in implementations",
				self.storage.primary
			)));
		}
		if self.storage.cleanup_interval_seconds == 0 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds must be greater than 0".into(),
			));
		}
		if self.storage.cleanup_interval_seconds > 86400 {
			return Err(ConfigError::Validation(
				"Storage cleanup_interval_seconds cannot exceed 86400 (24 hours)".into(),
			));
		}

		// Validate services
		if self.services.is_empty() {
			return Err(ConfigError::Validation(
				"At least one service must be configured".into(),
			));
		}
		for (service_id, service) in &self.services {
			if service_id.trim().is_empty() {
				return Err(ConfigError::Validation("Service ID cannot be empty".into()));
			}
			service.validate().map_err(|e| {
				ConfigError::Validation(format!("Service '{}': {}", service_id, e))
			})?;
		}

		if let Some(api) = &self.api {
			if api.enabled && api.host.trim().is_empty() {
				return Err(ConfigError::Validation("API host cannot be empty".into()));
			}
		}

		Ok(())
	}
}

/// Parses a TOML string into a validated configuration.
///
/// Environment variables are resolved before parsing.
impl FromStr for Config {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let resolved = resolve_env_vars(s)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}
}
