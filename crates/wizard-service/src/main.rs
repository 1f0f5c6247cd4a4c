//! Main entry point for the order wizard service.
//!
//! Loads the configuration, builds the wizard engine with the registered
//! storage backends and serves the step graph and draft store API until
//! interrupted.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use wizard_config::Config;

mod apis;
mod factory_registry;
mod server;

/// Command-line arguments for the order wizard service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, env = "WIZARD_CONFIG", default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started order wizard");

	let config = Config::from_file(&args.config.to_string_lossy()).await?;
	tracing::info!("Loaded configuration [{}]", config.wizard.id);

	let engine = Arc::new(factory_registry::build_engine_from_config(config.clone())?);

	match config.api.filter(|api| api.enabled) {
		Some(api_config) => {
			// Run the engine and the API server concurrently
			let engine_task = engine.run();
			let api_task = server::start_server(api_config, Arc::clone(&engine));

			tokio::select! {
				result = engine_task => {
					tracing::info!("Engine finished");
					result?;
				}
				result = api_task => {
					tracing::info!("API server finished");
					result?;
				}
			}
		},
		None => {
			tracing::info!("API disabled, running engine only");
			engine.run().await?;
		},
	}

	tracing::info!("Stopped order wizard");
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::tempdir;
	use wizard_types::StepId;

	#[test]
	fn test_args_defaults() {
		let args = Args::try_parse_from(["order-wizard"]).unwrap();
		assert_eq!(args.log_level, "info");
		if std::env::var_os("WIZARD_CONFIG").is_none() {
			assert_eq!(args.config, PathBuf::from("config.toml"));
		}
	}

	#[test]
	fn test_args_custom_values() {
		let args =
			Args::try_parse_from(["order-wizard", "-c", "custom.toml", "-l", "debug"]).unwrap();
		assert_eq!(args.config, PathBuf::from("custom.toml"));
		assert_eq!(args.log_level, "debug");
	}

	#[tokio::test]
	async fn test_build_engine_from_file_config() {
		let temp_dir = tempdir().expect("Failed to create temp dir");
		let config_path = temp_dir.path().join("wizard.toml");

		let config_content = r#"
[wizard]
id = "file-wizard"
order_code_prefix = "DOC"
debounce_ms = 500

[storage]
primary = "memory"
cleanup_interval_seconds = 120
[storage.implementations.memory]

[services.company-registration]
client_type_selection = true
[services.company-registration.personal_kyc]
enabled = true
[services.company-registration.company_kyc]
enabled = true

[api]
enabled = true
port = 3100
"#;
		std::fs::write(&config_path, config_content).expect("Failed to write config");

		let config = Config::from_file(&config_path.to_string_lossy())
			.await
			.expect("Failed to load config");
		assert_eq!(config.wizard.id, "file-wizard");
		assert_eq!(config.wizard.debounce_ms, 500);
		assert!(config.api.as_ref().is_some_and(|api| api.enabled));

		let engine = factory_registry::build_engine_from_config(config).unwrap();
		let steps = engine
			.summaries_for("company-registration", None)
			.unwrap();
		assert_eq!(steps.first().map(|s| s.id), Some(StepId::Contact));

		let record = engine
			.drafts()
			.create("company-registration", Default::default())
			.await
			.unwrap();
		assert_eq!(record.code.prefix(), "DOC");
	}
}
