//! Autosave worker.
//!
//! A tokio task owns the write path to the remote draft record of one
//! session. It receives the latest state on every change and:
//!
//! - waits for the debounce window to pass without further changes, then
//!   writes the local snapshot and upserts the remote draft
//! - retries on a fixed interval while a change is still unpersisted
//! - on an explicit save, drops the pending timers, cancels an in-flight
//!   update (an in-flight create is awaited so a single record is created)
//!   and saves inline
//!
//! Every write carries the state revision, and the draft store ignores
//! writes older than what it holds, so whichever write lands last the
//! newest revision wins.

use super::{DraftSink, PersistenceError, SnapshotCache};
use crate::engine::event_bus::EventBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};
use wizard_config::WizardSettings;
use wizard_order::DraftError;
use wizard_types::{DraftRecord, ModularStep, OrderCode, SaveEvent, WizardEvent, WizardState};

/// Autosave timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutosaveConfig {
	/// Quiet period after a change before it is written.
	pub debounce: Duration,
	/// Retry period while a change stays unpersisted.
	pub interval: Duration,
}

impl From<&WizardSettings> for AutosaveConfig {
	fn from(settings: &WizardSettings) -> Self {
		Self {
			debounce: settings.debounce(),
			interval: settings.autosave_interval(),
		}
	}
}

/// Result of a successful explicit save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
	pub order_code: OrderCode,
	pub revision: u64,
	pub saved_at: u64,
}

enum Command {
	Changed(WizardState),
	SaveNow(
		WizardState,
		oneshot::Sender<Result<SaveOutcome, PersistenceError>>,
	),
	Shutdown(oneshot::Sender<()>),
}

struct InFlight {
	handle: JoinHandle<Result<DraftRecord, DraftError>>,
	revision: u64,
	creating: bool,
}

/// Handle used by a session to drive its autosave worker.
pub struct AutosaveHandle {
	sender: mpsc::UnboundedSender<Command>,
}

impl AutosaveHandle {
	/// Hands the latest state to the worker and restarts the debounce window.
	pub fn notify(&self, state: WizardState) -> Result<(), PersistenceError> {
		self.sender
			.send(Command::Changed(state))
			.map_err(|_| PersistenceError::WorkerStopped)
	}

	/// Saves `state` right away, superseding any scheduled autosave.
	pub async fn save_now(&self, state: WizardState) -> Result<SaveOutcome, PersistenceError> {
		let (reply, response) = oneshot::channel();
		self.sender
			.send(Command::SaveNow(state, reply))
			.map_err(|_| PersistenceError::WorkerStopped)?;
		response.await.map_err(|_| PersistenceError::WorkerStopped)?
	}

	/// Flushes pending work and stops the worker.
	pub async fn shutdown(&self) -> Result<(), PersistenceError> {
		let (done, finished) = oneshot::channel();
		self.sender
			.send(Command::Shutdown(done))
			.map_err(|_| PersistenceError::WorkerStopped)?;
		finished.await.map_err(|_| PersistenceError::WorkerStopped)
	}
}

/// Background writer of one session's draft.
pub struct AutosaveWorker {
	service_id: String,
	sink: Arc<dyn DraftSink>,
	snapshots: Arc<dyn SnapshotCache>,
	steps: Vec<ModularStep>,
	config: AutosaveConfig,
	event_bus: EventBus,
	/// Assigned by the first successful create.
	order_code: Option<OrderCode>,
	/// Latest state not yet confirmed by the draft store.
	pending: Option<WizardState>,
}

impl AutosaveWorker {
	pub fn new(
		service_id: impl Into<String>,
		sink: Arc<dyn DraftSink>,
		snapshots: Arc<dyn SnapshotCache>,
		steps: Vec<ModularStep>,
		config: AutosaveConfig,
		event_bus: EventBus,
	) -> Self {
		Self {
			service_id: service_id.into(),
			sink,
			snapshots,
			steps,
			config,
			event_bus,
			order_code: None,
			pending: None,
		}
	}

	/// Continues an existing draft instead of creating a new one.
	pub fn with_order_code(mut self, code: Option<OrderCode>) -> Self {
		self.order_code = code;
		self
	}

	/// Starts the worker task.
	pub fn spawn(self) -> AutosaveHandle {
		let (sender, receiver) = mpsc::unbounded_channel();
		tokio::spawn(self.run(receiver));
		AutosaveHandle { sender }
	}

	async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
		let mut deadline: Option<Instant> = None;
		let mut in_flight: Option<InFlight> = None;
		let mut retry = time::interval_at(Instant::now() + self.config.interval, self.config.interval);
		retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

		tracing::debug!(service = %self.service_id, "Autosave worker started");

		loop {
			let idle = in_flight.is_none();
			let debounce_at = deadline.unwrap_or_else(Instant::now);

			tokio::select! {
				command = commands.recv() => match command {
					Some(Command::Changed(state)) => {
						self.pending = Some(state);
						deadline = Some(Instant::now() + self.config.debounce);
					},
					Some(Command::SaveNow(state, reply)) => {
						deadline = None;
						retry.reset();
						self.settle_for_explicit(&mut in_flight).await;
						let result = self.save_inline(state).await;
						reply.send(result).ok();
					},
					Some(Command::Shutdown(done)) => {
						self.flush(&mut in_flight).await;
						done.send(()).ok();
						break;
					},
					None => {
						self.flush(&mut in_flight).await;
						break;
					},
				},

				_ = time::sleep_until(debounce_at), if deadline.is_some() && idle => {
					deadline = None;
					if let Some(state) = self.pending.clone() {
						in_flight = Some(self.start_save(state).await);
					}
				},

				_ = retry.tick(), if idle && deadline.is_none() && self.pending.is_some() => {
					if let Some(state) = self.pending.clone() {
						tracing::debug!(revision = state.revision, "Retrying unsaved draft");
						in_flight = Some(self.start_save(state).await);
					}
				},

				joined = join(&mut in_flight), if !idle => {
					if let Some(flight) = in_flight.take() {
						self.finish(flight.revision, flight.creating, flatten(joined))
							.await
							.ok();
					}
				},
			}
		}

		tracing::debug!(service = %self.service_id, "Autosave worker stopped");
	}

	/// Writes the local snapshot and spawns the remote write.
	async fn start_save(&mut self, mut state: WizardState) -> InFlight {
		if self.order_code.is_some() {
			state.order_id = self.order_code.clone();
		}
		self.write_snapshot(&state).await;

		let revision = state.revision;
		self.event_bus
			.publish(WizardEvent::Save(SaveEvent::Saving { revision }))
			.ok();

		let sink = self.sink.clone();
		let service_id = self.service_id.clone();
		let code = self.order_code.clone();
		let creating = code.is_none();
		let handle = tokio::spawn(async move {
			match code {
				Some(code) => sink.save(&code, state, revision).await,
				None => sink.create(&service_id, state).await,
			}
		});

		InFlight {
			handle,
			revision,
			creating,
		}
	}

	async fn save_inline(&mut self, state: WizardState) -> Result<SaveOutcome, PersistenceError> {
		self.pending = Some(state.clone());
		let flight = self.start_save(state).await;
		let joined = flight.handle.await;
		self.finish(flight.revision, flight.creating, flatten(joined))
			.await
	}

	/// Makes way for an explicit save: an update is cancelled, a create is
	/// awaited so the explicit save reuses its code.
	async fn settle_for_explicit(&mut self, in_flight: &mut Option<InFlight>) {
		let Some(flight) = in_flight.take() else {
			return;
		};
		if !flight.creating {
			flight.handle.abort();
		}
		match flatten(flight.handle.await) {
			Err(PersistenceError::Cancelled) => {
				tracing::debug!(
					revision = flight.revision,
					"Autosave superseded by explicit save"
				);
			},
			result => {
				self.finish(flight.revision, flight.creating, result)
					.await
					.ok();
			},
		}
	}

	/// Lets in-flight work land and writes whatever is still pending.
	async fn flush(&mut self, in_flight: &mut Option<InFlight>) {
		if let Some(flight) = in_flight.take() {
			let joined = flight.handle.await;
			self.finish(flight.revision, flight.creating, flatten(joined))
				.await
				.ok();
		}
		if let Some(state) = self.pending.clone() {
			self.save_inline(state).await.ok();
		}
	}

	async fn finish(
		&mut self,
		revision: u64,
		creating: bool,
		result: Result<DraftRecord, PersistenceError>,
	) -> Result<SaveOutcome, PersistenceError> {
		match result {
			Ok(record) => {
				let code = record.code.clone();
				if creating {
					self.event_bus
						.publish(WizardEvent::Save(SaveEvent::DraftCreated {
							order_code: code.clone(),
						}))
						.ok();
					self.write_snapshot(&record.state).await;
				}
				self.order_code = Some(code.clone());
				if self
					.pending
					.as_ref()
					.is_some_and(|pending| pending.revision <= revision)
				{
					self.pending = None;
				}

				let outcome = SaveOutcome {
					order_code: code,
					revision,
					saved_at: record.updated_at,
				};
				tracing::debug!(
					order_code = %outcome.order_code,
					revision,
					"Draft saved"
				);
				self.event_bus
					.publish(WizardEvent::Save(SaveEvent::Saved {
						order_code: outcome.order_code.clone(),
						revision,
						saved_at: outcome.saved_at,
					}))
					.ok();
				Ok(outcome)
			},
			Err(e) => {
				if let PersistenceError::Draft(DraftError::NotEditable { .. }) = &e {
					// Retrying cannot succeed once the draft left the editable status.
					self.pending = None;
				}
				tracing::warn!(revision, error = %e, "Draft save failed");
				self.event_bus
					.publish(WizardEvent::Save(SaveEvent::Failed {
						revision,
						error: e.to_string(),
					}))
					.ok();
				Err(e)
			},
		}
	}

	async fn write_snapshot(&self, state: &WizardState) {
		let snapshot = self
			.snapshots
			.snapshot(&self.service_id, &self.steps, state);
		if let Err(e) = self.snapshots.store(&snapshot).await {
			tracing::warn!(service = %self.service_id, error = %e, "Failed to write local snapshot");
		}
	}
}

async fn join(
	in_flight: &mut Option<InFlight>,
) -> Result<Result<DraftRecord, DraftError>, JoinError> {
	match in_flight.as_mut() {
		Some(flight) => (&mut flight.handle).await,
		None => std::future::pending().await,
	}
}

fn flatten(
	joined: Result<Result<DraftRecord, DraftError>, JoinError>,
) -> Result<DraftRecord, PersistenceError> {
	match joined {
		Ok(result) => result.map_err(PersistenceError::from),
		Err(e) if e.is_cancelled() => Err(PersistenceError::Cancelled),
		Err(e) => Err(PersistenceError::Storage(e.to_string())),
	}
}
