//! A single user's pass through the wizard.
//!
//! The session ties the pieces together: it builds the step graph of a
//! service, restores progress from a shared draft or the local snapshot,
//! applies actions to the state machine, mirrors the current step into the
//! step parameter and hands every data change to its autosave worker.
//! Navigation and save results are published on a per-session event bus.

use crate::engine::event_bus::{EventBus, DEFAULT_CAPACITY};
use crate::persistence::{
	AutosaveConfig, AutosaveHandle, AutosaveWorker, DraftSink, PersistenceError, SaveIndicator,
	SaveOutcome, SnapshotCache, StepParamChannel, StepParamSync,
};
use crate::state::{WizardAction, WizardError, WizardMachine};
use crate::steps::{build_steps, visible_number, BuildError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::instrument;
use wizard_order::OrderCodeGenerator;
use wizard_types::{
	ClientType, DraftRecord, DraftStatus, ModularStep, OrderCodeError, SaveEvent,
	ServiceVerificationConfig, StepEvent, StepSummary, WizardEvent, WizardState,
};

/// Errors surfaced to the caller of a session.
#[derive(Debug, Error)]
pub enum SessionError {
	#[error("Failed to build step graph: {0}")]
	Build(#[from] BuildError),
	#[error("Navigation rejected: {0}")]
	Navigation(#[from] WizardError),
	#[error("Persistence error: {0}")]
	Persistence(#[from] PersistenceError),
	#[error("Invalid order code: {0}")]
	InvalidCode(#[from] OrderCodeError),
	#[error("Draft not found: {0}")]
	DraftNotFound(String),
	#[error("Draft {code} is {status} and cannot be edited")]
	NotEditable { code: String, status: DraftStatus },
	#[error("Unknown service: {0}")]
	UnknownService(String),
}

/// What a session is opened for.
#[derive(Debug, Clone)]
pub struct SessionOptions {
	pub service_id: String,
	/// Client type known before the wizard starts, if any.
	pub client_type: Option<ClientType>,
	/// Order code from a shared link.
	pub shared_code: Option<String>,
	pub autosave: AutosaveConfig,
	/// Name of the step-number query parameter.
	pub step_param: String,
}

/// Collaborators a session persists through.
pub struct SessionDeps {
	pub drafts: Arc<dyn DraftSink>,
	pub snapshots: Arc<dyn SnapshotCache>,
	/// Checks shared codes before any lookup.
	pub codes: OrderCodeGenerator,
	pub params: Option<Arc<dyn StepParamChannel>>,
}

pub struct WizardSession {
	service_id: String,
	machine: WizardMachine,
	drafts: Arc<dyn DraftSink>,
	snapshots: Arc<dyn SnapshotCache>,
	autosave: AutosaveHandle,
	event_bus: EventBus,
	events: broadcast::Receiver<WizardEvent>,
	url_sync: Option<StepParamSync>,
	saving: bool,
	failed: bool,
}

impl WizardSession {
	/// Opens a session for one service.
	#[instrument(skip_all, fields(service = %options.service_id))]
	pub async fn open(
		config: &ServiceVerificationConfig,
		options: SessionOptions,
		deps: SessionDeps,
	) -> Result<Self, SessionError> {
		let steps = build_steps(config, options.client_type)?;
		let mut state = Self::restore(&options, &deps).await?;
		if state.client_type.is_none() {
			state.client_type = options.client_type;
		}

		let mut machine = WizardMachine::new(steps, state)?;

		let mut url_sync = deps
			.params
			.map(|channel| StepParamSync::new(channel, options.step_param.clone()));
		if let Some(sync) = url_sync.as_mut() {
			if let Some(target) = sync.inbound(machine.steps(), machine.state()) {
				if let Err(e) = machine.dispatch(WizardAction::SyncFromParam(target)) {
					tracing::debug!(error = %e, "Step parameter not applied");
				}
			}
			// Consumes the one-shot suppression on the inbound move itself.
			sync.outbound(machine.steps(), machine.state());
		}

		let event_bus = EventBus::new(DEFAULT_CAPACITY);
		let events = event_bus.subscribe();
		let autosave = AutosaveWorker::new(
			options.service_id.clone(),
			deps.drafts.clone(),
			deps.snapshots.clone(),
			machine.steps().to_vec(),
			options.autosave,
			event_bus.clone(),
		)
		.with_order_code(machine.state().order_id.clone())
		.spawn();

		// A restored snapshot may hold changes the draft store never got.
		if machine.state().is_dirty {
			autosave.notify(machine.state().clone())?;
		}

		tracing::info!(
			step = %machine.state().current_step_id,
			order_code = ?machine.state().order_id.as_ref().map(|c| c.to_string()),
			"Wizard session opened"
		);

		Ok(Self {
			service_id: options.service_id,
			machine,
			drafts: deps.drafts,
			snapshots: deps.snapshots,
			autosave,
			event_bus,
			events,
			url_sync,
			saving: false,
			failed: false,
		})
	}

	/// Picks the starting state: a shared draft wins over the local snapshot.
	async fn restore(
		options: &SessionOptions,
		deps: &SessionDeps,
	) -> Result<WizardState, SessionError> {
		if let Some(raw) = options.shared_code.as_deref() {
			let code = deps.codes.parse(raw)?;
			let record = deps
				.drafts
				.load(&code)
				.await
				.map_err(PersistenceError::from)?
				.ok_or_else(|| SessionError::DraftNotFound(code.to_string()))?;
			if !record.status.accepts_edits() {
				return Err(SessionError::NotEditable {
					code: code.to_string(),
					status: record.status,
				});
			}
			let mut state = record.state;
			state.order_id = Some(code);
			state.is_dirty = false;
			return Ok(state);
		}

		match deps.snapshots.load(&options.service_id).await {
			Ok(Some(snapshot)) if snapshot.service_id == options.service_id => Ok(snapshot.state),
			Ok(_) => Ok(WizardState::default()),
			Err(e) => {
				tracing::warn!(error = %e, "Local snapshot unavailable, starting fresh");
				Ok(WizardState::default())
			},
		}
	}

	pub fn service_id(&self) -> &str {
		&self.service_id
	}

	pub fn state(&self) -> &WizardState {
		self.machine.state()
	}

	pub fn machine(&self) -> &WizardMachine {
		&self.machine
	}

	pub fn steps(&self) -> &[ModularStep] {
		self.machine.steps()
	}

	pub fn summaries(&self) -> Vec<StepSummary> {
		self.machine.summaries()
	}

	/// Subscribes to the events of this session.
	pub fn subscribe(&self) -> broadcast::Receiver<WizardEvent> {
		self.event_bus.subscribe()
	}

	/// Applies an action.
	///
	/// Refused navigation leaves the state untouched and is reported both as
	/// an error and as a `StepEvent::Rejected`.
	pub fn dispatch(&mut self, action: WizardAction) -> Result<&WizardState, SessionError> {
		let from = self.machine.state().current_step_id;
		let revision = self.machine.state().revision;
		let target = match &action {
			WizardAction::JumpTo(target) | WizardAction::SyncFromParam(target) => Some(*target),
			_ => None,
		};

		if let Err(e) = self.machine.dispatch(action) {
			if let Some(target) = target {
				self.event_bus
					.publish(WizardEvent::Step(StepEvent::Rejected {
						target,
						reason: e.to_string(),
					}))
					.ok();
			}
			tracing::debug!(error = %e, "Action rejected");
			return Err(e.into());
		}

		let state = self.machine.state();
		if state.current_step_id != from {
			let number = visible_number(self.machine.steps(), state, state.current_step_id)
				.unwrap_or(1);
			tracing::debug!(from = %from, to = %state.current_step_id, number, "Step changed");
			self.event_bus
				.publish(WizardEvent::Step(StepEvent::Changed {
					from,
					to: state.current_step_id,
					number,
				}))
				.ok();
		}
		if let Some(sync) = self.url_sync.as_mut() {
			sync.outbound(self.machine.steps(), state);
		}
		if state.revision != revision {
			self.autosave.notify(state.clone())?;
		}

		Ok(self.machine.state())
	}

	/// Saves the current state now, superseding scheduled autosaves.
	pub async fn save_now(&mut self) -> Result<SaveOutcome, SessionError> {
		let outcome = self.autosave.save_now(self.machine.state().clone()).await?;
		self.machine.dispatch(WizardAction::MarkSaved {
			revision: outcome.revision,
			order_code: outcome.order_code.clone(),
			saved_at: outcome.saved_at,
		})?;
		self.failed = false;
		Ok(outcome)
	}

	/// Folds a persistence event into the session.
	pub fn apply_event(&mut self, event: &WizardEvent) {
		match event {
			WizardEvent::Save(SaveEvent::Saving { .. }) => self.saving = true,
			WizardEvent::Save(SaveEvent::Saved {
				order_code,
				revision,
				saved_at,
			}) => {
				self.saving = false;
				self.failed = false;
				let marked = self.machine.dispatch(WizardAction::MarkSaved {
					revision: *revision,
					order_code: order_code.clone(),
					saved_at: *saved_at,
				});
				if let Err(e) = marked {
					tracing::warn!(error = %e, "Failed to record save");
				}
			},
			WizardEvent::Save(SaveEvent::Failed { .. }) => {
				self.saving = false;
				self.failed = true;
			},
			WizardEvent::Save(SaveEvent::DraftCreated { .. })
			| WizardEvent::Save(SaveEvent::Submitted { .. })
			| WizardEvent::Step(_) => {},
		}
	}

	/// Applies every event published since the last call.
	pub fn sync_events(&mut self) -> usize {
		let mut applied = 0;
		loop {
			match self.events.try_recv() {
				Ok(event) => {
					self.apply_event(&event);
					applied += 1;
				},
				Err(broadcast::error::TryRecvError::Lagged(missed)) => {
					tracing::warn!(missed, "Session fell behind its events");
				},
				Err(_) => break,
			}
		}
		applied
	}

	pub fn indicator(&self) -> SaveIndicator {
		SaveIndicator::derive(self.machine.state().is_dirty, self.saving, self.failed)
	}

	/// Saves and submits the draft, then drops the local snapshot.
	pub async fn submit(&mut self) -> Result<DraftRecord, SessionError> {
		let outcome = self.save_now().await?;
		let record = self
			.drafts
			.submit(&outcome.order_code)
			.await
			.map_err(PersistenceError::from)?;

		self.event_bus
			.publish(WizardEvent::Save(SaveEvent::Submitted {
				order_code: record.code.clone(),
			}))
			.ok();
		if let Err(e) = self.snapshots.clear(&self.service_id).await {
			tracing::warn!(error = %e, "Failed to clear local snapshot");
		}
		tracing::info!(order_code = %record.code, "Order submitted");
		Ok(record)
	}

	/// Flushes pending saves and returns the final state.
	pub async fn close(mut self) -> Result<WizardState, SessionError> {
		self.autosave.shutdown().await?;
		self.sync_events();
		Ok(self.machine.into_state())
	}
}
