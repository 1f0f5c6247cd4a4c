//! Wizard engine.
//!
//! The engine owns the shared services of a wizard deployment (storage, the
//! draft service, the snapshot cache and the engine-wide event bus), hands
//! out step graphs and sessions per service, and runs the periodic cleanup
//! of expired drafts until shutdown.

pub mod event_bus;
pub mod lifecycle;

use crate::persistence::{AutosaveConfig, StepParamChannel, StorageSnapshotCache};
use crate::session::{SessionDeps, SessionError, SessionOptions, WizardSession};
use crate::steps::{build_steps, summarize_steps};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use wizard_config::Config;
use wizard_order::DraftService;
use wizard_storage::StorageService;
use wizard_types::{
	truncate_id, ClientType, ModularStep, SaveEvent, StepSummary, WizardEvent, WizardState,
};

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Service error: {0}")]
	Service(String),
	#[error("Unknown service: {0}")]
	UnknownService(String),
}

/// Shared services of a wizard deployment.
#[derive(Clone)]
pub struct WizardEngine {
	pub(crate) config: Config,
	pub(crate) storage: Arc<StorageService>,
	pub(crate) drafts: Arc<DraftService>,
	pub(crate) snapshots: Arc<StorageSnapshotCache>,
	/// Engine-wide events (drafts created and submitted through the API).
	pub(crate) event_bus: event_bus::EventBus,
}

impl WizardEngine {
	pub fn new(
		config: Config,
		storage: Arc<StorageService>,
		drafts: Arc<DraftService>,
		event_bus: event_bus::EventBus,
	) -> Self {
		let snapshots = Arc::new(StorageSnapshotCache::new(
			storage.clone(),
			config.wizard.cache_version,
		));
		Self {
			config,
			storage,
			drafts,
			snapshots,
			event_bus,
		}
	}

	/// Builds the step graph of a service.
	pub fn steps_for(
		&self,
		service_id: &str,
		client_type: Option<ClientType>,
	) -> Result<Vec<ModularStep>, EngineError> {
		let service = self
			.config
			.service(service_id)
			.ok_or_else(|| EngineError::UnknownService(service_id.to_string()))?;
		build_steps(service, client_type).map_err(|e| EngineError::Config(e.to_string()))
	}

	/// Steps a user of the given client type sees, numbered for display.
	pub fn summaries_for(
		&self,
		service_id: &str,
		client_type: Option<ClientType>,
	) -> Result<Vec<StepSummary>, EngineError> {
		let steps = self.steps_for(service_id, client_type)?;
		let state = WizardState {
			client_type,
			..Default::default()
		};
		Ok(summarize_steps(&steps, &state))
	}

	/// Opens a wizard session persisting through the engine's services.
	pub async fn open_session(
		&self,
		service_id: &str,
		client_type: Option<ClientType>,
		shared_code: Option<String>,
		params: Option<Arc<dyn StepParamChannel>>,
	) -> Result<WizardSession, SessionError> {
		let service = self
			.config
			.service(service_id)
			.ok_or_else(|| SessionError::UnknownService(service_id.to_string()))?;

		let options = SessionOptions {
			service_id: service_id.to_string(),
			client_type,
			shared_code,
			autosave: AutosaveConfig::from(&self.config.wizard),
			step_param: self.config.wizard.step_param.clone(),
		};
		let deps = SessionDeps {
			drafts: self.drafts.clone(),
			snapshots: self.snapshots.clone(),
			codes: self.drafts.codes().clone(),
			params,
		};
		WizardSession::open(service, options, deps).await
	}

	/// Runs the engine until Ctrl+C.
	pub async fn run(&self) -> Result<(), EngineError> {
		self.run_until(async {
			if let Err(e) = tokio::signal::ctrl_c().await {
				tracing::error!(error = %e, "Failed to listen for shutdown signal");
			}
		})
		.await
	}

	/// Runs the engine until `shutdown` completes.
	pub async fn run_until<F>(&self, shutdown: F) -> Result<(), EngineError>
	where
		F: Future<Output = ()>,
	{
		self.initialize().await?;

		let mut event_receiver = self.event_bus.subscribe();

		// Start draft cleanup task
		let drafts = self.drafts.clone();
		let cleanup_interval = tokio::time::interval(Duration::from_secs(
			self.config.storage.cleanup_interval_seconds,
		));
		let cleanup_handle = tokio::spawn(async move {
			let mut interval = cleanup_interval;
			loop {
				interval.tick().await;
				match drafts.cleanup_expired().await {
					Ok(count) if count > 0 => {
						tracing::debug!("Storage cleanup: removed {} expired drafts", count);
					},
					Err(e) => {
						tracing::warn!("Storage cleanup failed: {}", e);
					},
					_ => {},
				}
			}
		});

		tokio::pin!(shutdown);
		loop {
			tokio::select! {
				event = event_receiver.recv() => match event {
					Ok(WizardEvent::Save(SaveEvent::DraftCreated { order_code })) => {
						tracing::info!(order_code = %truncate_id(order_code.as_str()), "Draft created");
					},
					Ok(WizardEvent::Save(SaveEvent::Submitted { order_code })) => {
						tracing::info!(order_code = %truncate_id(order_code.as_str()), "Draft submitted");
					},
					Ok(other) => {
						tracing::debug!(event = ?other, "Wizard event");
					},
					Err(RecvError::Lagged(missed)) => {
						tracing::warn!(missed, "Engine fell behind the event bus");
					},
					Err(RecvError::Closed) => break,
				},

				_ = &mut shutdown => break,
			}
		}

		cleanup_handle.abort();
		self.shutdown().await
	}

	/// Returns a reference to the event bus.
	pub fn event_bus(&self) -> &event_bus::EventBus {
		&self.event_bus
	}

	/// Returns a reference to the configuration.
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Returns a reference to the storage service.
	pub fn storage(&self) -> &Arc<StorageService> {
		&self.storage
	}

	/// Returns a reference to the draft service.
	pub fn drafts(&self) -> &Arc<DraftService> {
		&self.drafts
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::persistence::MemoryParamChannel;
	use wizard_config::builders::ConfigBuilder;
	use wizard_order::OrderCodeGenerator;
	use wizard_storage::implementations::memory::MemoryStorage;
	use wizard_types::{ModuleToggle, ServiceVerificationConfig, StepId};

	fn engine() -> WizardEngine {
		let config = ConfigBuilder::new()
			.service(
				"company-registration",
				ServiceVerificationConfig {
					personal_kyc: ModuleToggle::enabled(),
					company_kyc: ModuleToggle::enabled(),
					client_type_selection: true,
					..Default::default()
				},
			)
			.build();
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let drafts = Arc::new(DraftService::new(
			storage.clone(),
			OrderCodeGenerator::new("ORD").unwrap(),
		));
		WizardEngine::new(config, storage, drafts, event_bus::EventBus::default())
	}

	#[test]
	fn test_summaries_depend_on_client_type() {
		let engine = engine();
		let company = engine
			.summaries_for("company-registration", Some(ClientType::Company))
			.unwrap();
		let individual = engine
			.summaries_for("company-registration", Some(ClientType::Individual))
			.unwrap();
		assert!(company.iter().any(|s| s.id == StepId::CompanyData));
		assert!(!individual.iter().any(|s| s.id == StepId::CompanyData));
		assert_eq!(individual.last().map(|s| s.number), Some(individual.len() as u32));
	}

	#[test]
	fn test_unknown_service() {
		assert!(matches!(
			engine().steps_for("nope", None),
			Err(EngineError::UnknownService(_))
		));
	}

	#[tokio::test(start_paused = true)]
	async fn test_open_session_uses_engine_settings() {
		let engine = engine();
		let params = Arc::new(MemoryParamChannel::with_param("step", "2"));
		let session = engine
			.open_session("company-registration", None, None, Some(params))
			.await
			.unwrap();
		assert_eq!(session.state().current_step_id, StepId::ClientType);
		assert!(matches!(
			engine.open_session("nope", None, None, None).await,
			Err(SessionError::UnknownService(_))
		));
	}

	#[tokio::test]
	async fn test_run_until_stops_on_signal() {
		let engine = engine();
		let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
		let runner = {
			let engine = engine.clone();
			tokio::spawn(async move {
				engine
					.run_until(async {
						stopped.await.ok();
					})
					.await
			})
		};

		tokio::task::yield_now().await;
		stop.send(()).unwrap();
		runner.await.unwrap().unwrap();
	}
}
