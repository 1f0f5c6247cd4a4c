//! Wizard state machine.
//!
//! Transitions are computed by [`reduce`], a pure function from the built
//! step list, the current state and an action to the next state. After every
//! action the current step is re-resolved against the new state so that it
//! always names a visible step of the graph.

use crate::steps::{nearest_visible, next_visible, visible_number, visible_steps};
use thiserror::Error;
use wizard_types::{
	ClientType, Direction, ModularStep, ModuleData, ModuleType, OrderCode, StepCatalog, StepId,
	StepSummary, WizardState, CLIENT_TYPE_FIELD,
};

/// Errors returned when an action is refused. The state is left unchanged.
#[derive(Debug, Error, PartialEq)]
pub enum WizardError {
	#[error("Step {0} is not part of this wizard")]
	UnknownStep(StepId),
	#[error("Step {0} is not currently visible")]
	StepHidden(StepId),
	#[error("Invalid data for module {module}: {reason}")]
	InvalidPatch { module: ModuleType, reason: String },
	#[error("No visible step")]
	NoVisibleStep,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardAction {
	/// Move to the next visible step; no-op on the last one.
	Advance,
	/// Move to the previous visible step; no-op on the first one.
	Retreat,
	/// Move to a specific step, which must be in the graph and visible.
	JumpTo(StepId),
	/// Shallow-merge data into a module slice.
	UpdateModule { module: ModuleType, patch: ModuleData },
	SetClientType(Option<ClientType>),
	/// Validity reported by the collaborator rendering a step.
	ReportStep { step: StepId, valid: bool },
	/// A remote save of `revision` succeeded.
	MarkSaved {
		revision: u64,
		order_code: OrderCode,
		saved_at: u64,
	},
	/// Step requested through the URL parameter.
	SyncFromParam(StepId),
}

/// Computes the state following `action`.
pub fn reduce(
	steps: &[ModularStep],
	state: &WizardState,
	action: WizardAction,
) -> Result<WizardState, WizardError> {
	let mut next = state.clone();

	match action {
		WizardAction::Advance => {
			next.last_direction = Direction::Forward;
			if let Some(id) = next_visible(steps, state, state.current_step_id, Direction::Forward) {
				next.current_step_id = id;
			}
		},
		WizardAction::Retreat => {
			next.last_direction = Direction::Backward;
			if let Some(id) = next_visible(steps, state, state.current_step_id, Direction::Backward)
			{
				next.current_step_id = id;
			}
		},
		WizardAction::JumpTo(target) | WizardAction::SyncFromParam(target) => {
			let step = steps
				.iter()
				.find(|step| step.id == target)
				.ok_or(WizardError::UnknownStep(target))?;
			if !step.is_visible(state) {
				return Err(WizardError::StepHidden(target));
			}
			if target != state.current_step_id {
				next.last_direction = if StepCatalog::position(target)
					> StepCatalog::position(state.current_step_id)
				{
					Direction::Forward
				} else {
					Direction::Backward
				};
				next.current_step_id = target;
			}
		},
		WizardAction::UpdateModule { module, patch } => {
			match next.module_mut(module) {
				Some(slice) => slice.extend(patch),
				None => next.client_type = client_type_from_patch(&patch)?,
			}
			mark_changed(&mut next);
		},
		WizardAction::SetClientType(client_type) => {
			if next.client_type != client_type {
				next.client_type = client_type;
				mark_changed(&mut next);
			}
		},
		WizardAction::ReportStep { step, valid } => {
			if !steps.iter().any(|s| s.id == step) {
				return Err(WizardError::UnknownStep(step));
			}
			next.step_validity.insert(step, valid);
		},
		WizardAction::MarkSaved {
			revision,
			order_code,
			saved_at,
		} => {
			next.order_id = Some(order_code);
			next.last_saved_at = Some(saved_at);
			// A change made while the save was in flight keeps the state dirty.
			if revision >= next.revision {
				next.is_dirty = false;
			}
		},
	}

	resolve_current(steps, &mut next)?;
	Ok(next)
}

/// Points the current step at a visible step, moving in the last direction
/// of travel when the current one became hidden.
fn resolve_current(steps: &[ModularStep], state: &mut WizardState) -> Result<(), WizardError> {
	let resolved = nearest_visible(steps, state, state.current_step_id, state.last_direction)
		.ok_or(WizardError::NoVisibleStep)?;
	if resolved != state.current_step_id {
		tracing::debug!(
			from = %state.current_step_id,
			to = %resolved,
			"Current step hidden, re-resolved"
		);
		state.current_step_id = resolved;
	}
	Ok(())
}

fn mark_changed(state: &mut WizardState) {
	state.revision += 1;
	state.is_dirty = true;
}

/// The client type module has no free-form slice; its patch carries the
/// selected type under `client_type` (null clears it).
fn client_type_from_patch(patch: &ModuleData) -> Result<Option<ClientType>, WizardError> {
	let invalid = |reason: String| WizardError::InvalidPatch {
		module: ModuleType::ClientType,
		reason,
	};
	match patch.get(CLIENT_TYPE_FIELD) {
		None => Err(invalid(format!("missing field '{}'", CLIENT_TYPE_FIELD))),
		Some(serde_json::Value::Null) => Ok(None),
		Some(serde_json::Value::String(raw)) => raw.parse().map(Some).map_err(invalid),
		Some(other) => Err(invalid(format!("expected a string, got {}", other))),
	}
}

/// A built step graph together with the state navigating it.
#[derive(Debug, Clone)]
pub struct WizardMachine {
	steps: Vec<ModularStep>,
	state: WizardState,
}

impl WizardMachine {
	/// Wraps a graph and a state, moving the current step onto a visible one
	/// if needed (restored states may point at a step that is now hidden).
	pub fn new(steps: Vec<ModularStep>, mut state: WizardState) -> Result<Self, WizardError> {
		resolve_current(&steps, &mut state)?;
		Ok(Self { steps, state })
	}

	pub fn steps(&self) -> &[ModularStep] {
		&self.steps
	}

	pub fn state(&self) -> &WizardState {
		&self.state
	}

	pub fn into_state(self) -> WizardState {
		self.state
	}

	/// Applies an action; on error the state is unchanged.
	pub fn dispatch(&mut self, action: WizardAction) -> Result<&WizardState, WizardError> {
		self.state = reduce(&self.steps, &self.state, action)?;
		Ok(&self.state)
	}

	pub fn advance(&mut self) -> Result<&WizardState, WizardError> {
		self.dispatch(WizardAction::Advance)
	}

	pub fn retreat(&mut self) -> Result<&WizardState, WizardError> {
		self.dispatch(WizardAction::Retreat)
	}

	pub fn jump_to(&mut self, step: StepId) -> Result<&WizardState, WizardError> {
		self.dispatch(WizardAction::JumpTo(step))
	}

	pub fn update_module(
		&mut self,
		module: ModuleType,
		patch: ModuleData,
	) -> Result<&WizardState, WizardError> {
		self.dispatch(WizardAction::UpdateModule { module, patch })
	}

	pub fn visible_steps(&self) -> Vec<&ModularStep> {
		visible_steps(&self.steps, &self.state)
	}

	pub fn current_step(&self) -> Option<&ModularStep> {
		self.steps
			.iter()
			.find(|step| step.id == self.state.current_step_id)
	}

	/// 1-based position of the current step among the visible steps.
	pub fn current_number(&self) -> u32 {
		visible_number(&self.steps, &self.state, self.state.current_step_id).unwrap_or(1)
	}

	pub fn total_visible(&self) -> u32 {
		self.visible_steps().len() as u32
	}

	pub fn is_first(&self) -> bool {
		next_visible(
			&self.steps,
			&self.state,
			self.state.current_step_id,
			Direction::Backward,
		)
		.is_none()
	}

	pub fn is_last(&self) -> bool {
		next_visible(
			&self.steps,
			&self.state,
			self.state.current_step_id,
			Direction::Forward,
		)
		.is_none()
	}

	/// Whether the collaborator of the current step has not reported it
	/// invalid and there is a step to move to.
	pub fn can_advance(&self) -> bool {
		let valid = self
			.state
			.step_validity
			.get(&self.state.current_step_id)
			.copied()
			.unwrap_or(true);
		valid && !self.is_last()
	}

	/// Share of the visible steps reached, current step included.
	pub fn progress_percent(&self) -> u8 {
		let total = self.total_visible().max(1);
		((self.current_number().min(total) * 100) / total) as u8
	}

	pub fn summaries(&self) -> Vec<StepSummary> {
		crate::steps::summarize_steps(&self.steps, &self.state)
	}
}
