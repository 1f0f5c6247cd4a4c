//! Step graph construction and navigation helpers.
//!
//! A built graph is a plain `Vec<ModularStep>` in catalog template order.
//! Visibility is always evaluated against the state passed in, never against
//! the state the graph was built with.

pub mod builder;
pub mod conditions;

pub use builder::{build_steps, BuildError, COMPANY_CONDITION};
pub use conditions::{compile_condition, parse_condition, ConditionError};

use wizard_types::{Direction, ModularStep, StepCatalog, StepId, StepSummary, WizardState};

/// Steps currently visible for `state`, in graph order.
pub fn visible_steps<'a>(steps: &'a [ModularStep], state: &WizardState) -> Vec<&'a ModularStep> {
	steps.iter().filter(|step| step.is_visible(state)).collect()
}

/// Copies the given steps with display numbers `1..=N`.
pub fn renumber_steps<'a>(steps: impl IntoIterator<Item = &'a ModularStep>) -> Vec<ModularStep> {
	steps
		.into_iter()
		.zip(1u32..)
		.map(|(step, number)| ModularStep {
			number,
			..step.clone()
		})
		.collect()
}

/// Serializable view of the visible steps, renumbered.
pub fn summarize_steps(steps: &[ModularStep], state: &WizardState) -> Vec<StepSummary> {
	renumber_steps(visible_steps(steps, state))
		.iter()
		.map(ModularStep::summary)
		.collect()
}

/// 1-based ordinal of a step among the visible steps.
pub fn visible_number(steps: &[ModularStep], state: &WizardState, id: StepId) -> Option<u32> {
	visible_steps(steps, state)
		.iter()
		.position(|step| step.id == id)
		.map(|index| index as u32 + 1)
}

/// First visible step strictly after (or before) `from` in template order.
///
/// `from` does not need to be part of the graph.
pub fn next_visible(
	steps: &[ModularStep],
	state: &WizardState,
	from: StepId,
	direction: Direction,
) -> Option<StepId> {
	let origin = StepCatalog::position(from);
	let visible = |step: &&ModularStep| step.is_visible(state);
	match direction {
		Direction::Forward => steps
			.iter()
			.filter(|step| StepCatalog::position(step.id) > origin)
			.find(visible)
			.map(|step| step.id),
		Direction::Backward => steps
			.iter()
			.rev()
			.filter(|step| StepCatalog::position(step.id) < origin)
			.find(visible)
			.map(|step| step.id),
	}
}

/// Resolves `from` to a visible step.
///
/// Returns `from` itself when it is in the graph and visible, otherwise the
/// nearest visible step in `direction`, falling back to the opposite one.
pub fn nearest_visible(
	steps: &[ModularStep],
	state: &WizardState,
	from: StepId,
	direction: Direction,
) -> Option<StepId> {
	if steps
		.iter()
		.any(|step| step.id == from && step.is_visible(state))
	{
		return Some(from);
	}
	let opposite = match direction {
		Direction::Forward => Direction::Backward,
		Direction::Backward => Direction::Forward,
	};
	next_visible(steps, state, from, direction).or_else(|| next_visible(steps, state, from, opposite))
}
