//! Compiler for step condition strings.
//!
//! Service configurations restrict modules with tiny expressions such as
//! `client_type == 'PJ'` or `citizenship != "BR"`. Only equality and
//! inequality against three state-derived fields are understood:
//!
//! - `client_type`: `PF` or `PJ`, from the client type selection
//! - `applicant_type`: `adult` or `minor`, derived from the birth date
//! - `citizenship`: free text from the personal identity slice, compared
//!   case-insensitively
//!
//! Anything else compiles to an always-true condition and logs a warning, so
//! a typo in configuration can never hide a step.

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use wizard_types::{ApplicantType, ClientType, StepCondition, WizardState};

static CONDITION_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
	Regex::new(
		r#"^\s*(client_type|applicant_type|citizenship)\s*(==|!=)\s*['"]([^'"]*)['"]\s*$"#,
	)
	.ok()
});

/// Reasons a condition string is not understood.
#[derive(Debug, Error, PartialEq)]
pub enum ConditionError {
	#[error("unrecognized condition pattern")]
	UnknownPattern,
	#[error("unknown value '{value}' for field '{field}'")]
	UnknownValue { field: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
	Equal,
	NotEqual,
}

impl Comparison {
	/// A missing value never equals the literal.
	fn holds<T: PartialEq>(self, actual: Option<T>, expected: &T) -> bool {
		let equal = actual.as_ref() == Some(expected);
		match self {
			Comparison::Equal => equal,
			Comparison::NotEqual => !equal,
		}
	}
}

/// Compiles a condition string into a step condition.
///
/// Unrecognized input yields a condition that is always satisfied.
pub fn compile_condition(source: &str) -> StepCondition {
	match parse_condition(source) {
		Ok(condition) => condition,
		Err(reason) => {
			tracing::warn!(
				condition = %source,
				reason = %reason,
				"Step condition not understood, step stays visible"
			);
			StepCondition::always(source)
		},
	}
}

/// Parses a condition string, reporting why it was rejected.
pub fn parse_condition(source: &str) -> Result<StepCondition, ConditionError> {
	let pattern = CONDITION_PATTERN
		.as_ref()
		.ok_or(ConditionError::UnknownPattern)?;
	let captures = pattern
		.captures(source)
		.ok_or(ConditionError::UnknownPattern)?;

	let field = captures.get(1).map_or("", |m| m.as_str());
	let comparison = match captures.get(2).map(|m| m.as_str()) {
		Some("==") => Comparison::Equal,
		Some("!=") => Comparison::NotEqual,
		_ => return Err(ConditionError::UnknownPattern),
	};
	let literal = captures.get(3).map_or("", |m| m.as_str()).trim();

	match field {
		"client_type" => {
			let expected: ClientType =
				literal.parse().map_err(|_| ConditionError::UnknownValue {
					field: "client_type",
					value: literal.to_string(),
				})?;
			Ok(StepCondition::new(source.trim(), move |state: &WizardState| {
				comparison.holds(state.client_type, &expected)
			}))
		},
		"applicant_type" => {
			let expected: ApplicantType =
				literal.parse().map_err(|_| ConditionError::UnknownValue {
					field: "applicant_type",
					value: literal.to_string(),
				})?;
			Ok(StepCondition::new(source.trim(), move |state: &WizardState| {
				comparison.holds(state.applicant_type(), &expected)
			}))
		},
		"citizenship" => {
			if literal.is_empty() {
				return Err(ConditionError::UnknownValue {
					field: "citizenship",
					value: String::new(),
				});
			}
			let expected = literal.to_ascii_uppercase();
			Ok(StepCondition::new(source.trim(), move |state: &WizardState| {
				let actual = state.citizenship().map(str::to_ascii_uppercase);
				comparison.holds(actual, &expected)
			}))
		},
		_ => Err(ConditionError::UnknownPattern),
	}
}
