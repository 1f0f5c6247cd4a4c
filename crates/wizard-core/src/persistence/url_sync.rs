//! Step-number query parameter sync.
//!
//! The parameter holds the 1-based ordinal of the current step among the
//! visible steps. It is read once when a session opens and written after
//! every step change. Applying an inbound value moves the current step, which
//! would normally trigger an outbound write of the same value, so the first
//! outbound sync after an inbound one is skipped. A clamped value is not
//! suppressed and gets rewritten with the step actually shown.

use crate::steps::{visible_number, visible_steps};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wizard_types::{ModularStep, StepId, WizardState};

/// Where the step parameter lives (a URL query string, in practice).
pub trait StepParamChannel: Send + Sync {
	fn read(&self, name: &str) -> Option<String>;
	fn write(&self, name: &str, value: &str);
}

/// In-process parameter channel.
#[derive(Default)]
pub struct MemoryParamChannel {
	params: Mutex<HashMap<String, String>>,
	writes: AtomicUsize,
}

impl MemoryParamChannel {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a channel already holding one parameter, as when a link is
	/// opened.
	pub fn with_param(name: &str, value: &str) -> Self {
		let channel = Self::default();
		channel
			.params
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.insert(name.to_string(), value.to_string());
		channel
	}

	/// Number of writes performed through [`StepParamChannel::write`].
	pub fn writes(&self) -> usize {
		self.writes.load(Ordering::SeqCst)
	}
}

impl StepParamChannel for MemoryParamChannel {
	fn read(&self, name: &str) -> Option<String> {
		self.params
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.get(name)
			.cloned()
	}

	fn write(&self, name: &str, value: &str) {
		self.writes.fetch_add(1, Ordering::SeqCst);
		self.params
			.lock()
			.unwrap_or_else(|e| e.into_inner())
			.insert(name.to_string(), value.to_string());
	}
}

/// Two-way sync between the current step and the step parameter.
pub struct StepParamSync {
	channel: Arc<dyn StepParamChannel>,
	name: String,
	suppress_next: bool,
}

impl StepParamSync {
	pub fn new(channel: Arc<dyn StepParamChannel>, name: impl Into<String>) -> Self {
		Self {
			channel,
			name: name.into(),
			suppress_next: false,
		}
	}

	/// Reads the parameter and resolves it to a visible step.
	///
	/// Non-integer values are ignored. Out-of-range numbers are clamped to
	/// the first or last visible step.
	pub fn inbound(&mut self, steps: &[ModularStep], state: &WizardState) -> Option<StepId> {
		let raw = self.channel.read(&self.name)?;
		let requested: i64 = match raw.trim().parse() {
			Ok(number) => number,
			Err(_) => {
				tracing::debug!(param = %self.name, value = %raw, "Ignoring non-numeric step parameter");
				return None;
			},
		};

		let visible = visible_steps(steps, state);
		if visible.is_empty() {
			return None;
		}
		let last = visible.len() as i64;
		let number = requested.clamp(1, last);
		if number != requested {
			tracing::debug!(requested, clamped = number, "Step parameter out of range");
		}

		self.suppress_next = number == requested;
		visible.get((number - 1) as usize).map(|step| step.id)
	}

	/// Mirrors the current step into the parameter.
	///
	/// Returns whether a write happened. Skipped once right after an inbound
	/// sync, and whenever the parameter already holds the value.
	pub fn outbound(&mut self, steps: &[ModularStep], state: &WizardState) -> bool {
		if std::mem::take(&mut self.suppress_next) {
			return false;
		}
		let Some(number) = visible_number(steps, state, state.current_step_id) else {
			return false;
		};
		let value = number.to_string();
		if self.channel.read(&self.name).as_deref() == Some(value.as_str()) {
			return false;
		}
		self.channel.write(&self.name, &value);
		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::steps::build_steps;
	use wizard_types::{ClientType, ModuleToggle, ServiceVerificationConfig};

	fn graph() -> Vec<ModularStep> {
		build_steps(
			&ServiceVerificationConfig {
				personal_kyc: ModuleToggle::enabled(),
				company_kyc: ModuleToggle::enabled(),
				client_type_selection: true,
				..Default::default()
			},
			None,
		)
		.unwrap()
	}

	fn individual() -> WizardState {
		WizardState {
			client_type: Some(ClientType::Individual),
			..Default::default()
		}
	}

	fn sync_with(value: &str) -> (Arc<MemoryParamChannel>, StepParamSync) {
		let channel = Arc::new(MemoryParamChannel::with_param("step", value));
		let sync = StepParamSync::new(channel.clone(), "step");
		(channel, sync)
	}

	#[test]
	fn test_inbound_resolves_visible_ordinal() {
		let (_, mut sync) = sync_with("3");
		// contact, client-type, personal-data, ...
		assert_eq!(
			sync.inbound(&graph(), &individual()),
			Some(StepId::PersonalData)
		);
	}

	#[test]
	fn test_inbound_clamps_out_of_range() {
		let steps = graph();
		let (_, mut sync) = sync_with("99");
		assert_eq!(sync.inbound(&steps, &individual()), Some(StepId::Review));
		let (_, mut sync) = sync_with("-4");
		assert_eq!(sync.inbound(&steps, &individual()), Some(StepId::Contact));
	}

	#[test]
	fn test_inbound_ignores_garbage() {
		let (_, mut sync) = sync_with("review");
		assert_eq!(sync.inbound(&graph(), &individual()), None);
		let channel = Arc::new(MemoryParamChannel::new());
		let mut empty = StepParamSync::new(channel, "step");
		assert_eq!(empty.inbound(&graph(), &individual()), None);
	}

	#[test]
	fn test_outbound_suppressed_once_after_inbound() {
		let steps = graph();
		let (channel, mut sync) = sync_with("3");
		let target = sync.inbound(&steps, &individual()).unwrap();
		let state = WizardState {
			current_step_id: target,
			..individual()
		};

		assert!(!sync.outbound(&steps, &state));
		assert_eq!(channel.writes(), 0);

		let moved = WizardState {
			current_step_id: StepId::Options,
			..state
		};
		assert!(sync.outbound(&steps, &moved));
		assert_eq!(channel.read("step").as_deref(), Some("4"));
		assert_eq!(channel.writes(), 1);
	}

	#[test]
	fn test_clamped_inbound_is_rewritten() {
		let steps = graph();
		let (channel, mut sync) = sync_with("99");
		let target = sync.inbound(&steps, &individual()).unwrap();
		let state = WizardState {
			current_step_id: target,
			..individual()
		};

		assert!(sync.outbound(&steps, &state));
		let last = visible_steps(&steps, &state).len().to_string();
		assert_eq!(channel.read("step"), Some(last));
	}

	#[test]
	fn test_outbound_skips_unchanged_value() {
		let steps = graph();
		let channel = Arc::new(MemoryParamChannel::new());
		let mut sync = StepParamSync::new(channel.clone(), "step");
		let state = individual();

		assert!(sync.outbound(&steps, &state));
		assert!(!sync.outbound(&steps, &state));
		assert_eq!(channel.writes(), 1);
		assert_eq!(channel.read("step").as_deref(), Some("1"));
	}
}
