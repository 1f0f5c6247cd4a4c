//! Step catalog and step graph types.
//!
//! The catalog is the closed, static description of every step the wizard
//! can show. A built step graph is a list of [`ModularStep`]s, each of which
//! may carry a [`StepCondition`] deciding whether it is currently visible.

use crate::WizardState;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised when a step identifier or the catalog itself is invalid.
#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
	/// A string did not name any known step.
	#[error("Unknown step id: {0}")]
	UnknownStep(String),
	/// A string did not name any known module.
	#[error("Unknown module: {0}")]
	UnknownModule(String),
	/// The template order is inconsistent with the step enumeration.
	#[error("Invalid step catalog: {0}")]
	Invalid(String),
}

/// Identifier of a wizard step.
///
/// The set is closed: every step the wizard can ever show is listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepId {
	Contact,
	ClientType,
	CompanyData,
	PersonalData,
	PropertyData,
	VehicleData,
	Options,
	KycDocuments,
	Signature,
	Delivery,
	Billing,
	Review,
}

impl StepId {
	/// Returns the wire representation of the step id.
	pub fn as_str(&self) -> &'static str {
		match self {
			StepId::Contact => "contact",
			StepId::ClientType => "client-type",
			StepId::CompanyData => "company-data",
			StepId::PersonalData => "personal-data",
			StepId::PropertyData => "property-data",
			StepId::VehicleData => "vehicle-data",
			StepId::Options => "options",
			StepId::KycDocuments => "kyc-documents",
			StepId::Signature => "signature",
			StepId::Delivery => "delivery",
			StepId::Billing => "billing",
			StepId::Review => "review",
		}
	}

	/// Returns an iterator over all StepId variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Contact,
			Self::ClientType,
			Self::CompanyData,
			Self::PersonalData,
			Self::PropertyData,
			Self::VehicleData,
			Self::Options,
			Self::KycDocuments,
			Self::Signature,
			Self::Delivery,
			Self::Billing,
			Self::Review,
		]
		.into_iter()
	}
}

impl fmt::Display for StepId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for StepId {
	type Err = CatalogError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all()
			.find(|id| id.as_str() == s)
			.ok_or_else(|| CatalogError::UnknownStep(s.to_string()))
	}
}

/// A self-contained data domain within the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
	Contact,
	ClientType,
	PersonalKyc,
	CompanyKyc,
	Property,
	Vehicle,
	Signature,
	SelectedOptions,
	Delivery,
	Billing,
}

impl ModuleType {
	/// Returns the string representation of the module.
	pub fn as_str(&self) -> &'static str {
		match self {
			ModuleType::Contact => "contact",
			ModuleType::ClientType => "client_type",
			ModuleType::PersonalKyc => "personal_kyc",
			ModuleType::CompanyKyc => "company_kyc",
			ModuleType::Property => "property",
			ModuleType::Vehicle => "vehicle",
			ModuleType::Signature => "signature",
			ModuleType::SelectedOptions => "selected_options",
			ModuleType::Delivery => "delivery",
			ModuleType::Billing => "billing",
		}
	}

	/// Returns an iterator over all ModuleType variants.
	pub fn all() -> impl Iterator<Item = Self> {
		[
			Self::Contact,
			Self::ClientType,
			Self::PersonalKyc,
			Self::CompanyKyc,
			Self::Property,
			Self::Vehicle,
			Self::Signature,
			Self::SelectedOptions,
			Self::Delivery,
			Self::Billing,
		]
		.into_iter()
	}
}

impl fmt::Display for ModuleType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ModuleType {
	type Err = CatalogError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::all()
			.find(|m| m.as_str() == s)
			.ok_or_else(|| CatalogError::UnknownModule(s.to_string()))
	}
}

/// Static metadata of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepMeta {
	pub id: StepId,
	/// Default display label.
	pub label: &'static str,
	/// Module whose slice of the wizard state this step edits.
	pub module: Option<ModuleType>,
}

/// The static table of every known step.
pub struct StepCatalog;

impl StepCatalog {
	/// Fixed order in which steps are laid out when a graph is built.
	pub const TEMPLATE: [StepId; 12] = [
		StepId::Contact,
		StepId::ClientType,
		StepId::CompanyData,
		StepId::PersonalData,
		StepId::PropertyData,
		StepId::VehicleData,
		StepId::Options,
		StepId::KycDocuments,
		StepId::Signature,
		StepId::Delivery,
		StepId::Billing,
		StepId::Review,
	];

	/// Returns the catalog entry for a step.
	pub fn meta(id: StepId) -> StepMeta {
		let (label, module) = match id {
			StepId::Contact => ("Contact", Some(ModuleType::Contact)),
			StepId::ClientType => ("Client type", Some(ModuleType::ClientType)),
			StepId::CompanyData => ("Company data", Some(ModuleType::CompanyKyc)),
			StepId::PersonalData => ("Personal data", Some(ModuleType::PersonalKyc)),
			StepId::PropertyData => ("Property data", Some(ModuleType::Property)),
			StepId::VehicleData => ("Vehicle data", Some(ModuleType::Vehicle)),
			StepId::Options => ("Options", Some(ModuleType::SelectedOptions)),
			StepId::KycDocuments => ("Identity documents", Some(ModuleType::PersonalKyc)),
			StepId::Signature => ("Signature", Some(ModuleType::Signature)),
			StepId::Delivery => ("Delivery", Some(ModuleType::Delivery)),
			StepId::Billing => ("Billing", Some(ModuleType::Billing)),
			StepId::Review => ("Review", None),
		};
		StepMeta { id, label, module }
	}

	/// Index of a step in the template order.
	pub fn position(id: StepId) -> usize {
		Self::TEMPLATE
			.iter()
			.position(|&s| s == id)
			.unwrap_or(Self::TEMPLATE.len())
	}

	/// Checks that the template lists every step exactly once and that
	/// every entry carries a label.
	///
	/// Meant to run once at startup; a failure is a programming error.
	pub fn validate() -> Result<(), CatalogError> {
		let mut seen = HashSet::new();
		for id in Self::TEMPLATE {
			if !seen.insert(id) {
				return Err(CatalogError::Invalid(format!(
					"step '{}' appears twice in the template",
					id
				)));
			}
			if Self::meta(id).label.trim().is_empty() {
				return Err(CatalogError::Invalid(format!("step '{}' has no label", id)));
			}
		}
		if let Some(missing) = StepId::all().find(|id| !seen.contains(id)) {
			return Err(CatalogError::Invalid(format!(
				"step '{}' is missing from the template",
				missing
			)));
		}
		Ok(())
	}
}

/// Shared predicate type used by step conditions.
pub type Predicate = Arc<dyn Fn(&WizardState) -> bool + Send + Sync>;

/// A pure visibility predicate over the wizard state.
///
/// The source text is kept next to the compiled closure so that built graphs
/// can be logged, compared and serialized.
#[derive(Clone)]
pub struct StepCondition {
	source: String,
	predicate: Predicate,
}

impl StepCondition {
	pub fn new<F>(source: impl Into<String>, predicate: F) -> Self
	where
		F: Fn(&WizardState) -> bool + Send + Sync + 'static,
	{
		Self {
			source: source.into(),
			predicate: Arc::new(predicate),
		}
	}

	/// A condition that is always satisfied.
	pub fn always(source: impl Into<String>) -> Self {
		Self::new(source, |_| true)
	}

	pub fn source(&self) -> &str {
		&self.source
	}

	pub fn evaluate(&self, state: &WizardState) -> bool {
		(self.predicate)(state)
	}

	/// Combines two conditions; the result holds when both hold.
	pub fn and(self, other: StepCondition) -> StepCondition {
		let source = format!("{} && {}", self.source, other.source);
		let (left, right) = (self.predicate, other.predicate);
		StepCondition {
			source,
			predicate: Arc::new(move |state| left(state) && right(state)),
		}
	}
}

impl fmt::Debug for StepCondition {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("StepCondition").field(&self.source).finish()
	}
}

/// One entry of a built step graph.
#[derive(Debug, Clone)]
pub struct ModularStep {
	pub id: StepId,
	pub label: String,
	pub module: Option<ModuleType>,
	/// Display ordinal. Recomputed whenever the visible subset changes; never
	/// use it to identify a step.
	pub number: u32,
	/// Visibility predicate; `None` means always visible.
	pub condition: Option<StepCondition>,
}

impl ModularStep {
	/// Returns whether this step is visible for the given state.
	pub fn is_visible(&self, state: &WizardState) -> bool {
		self.condition
			.as_ref()
			.is_none_or(|condition| condition.evaluate(state))
	}

	pub fn summary(&self) -> StepSummary {
		StepSummary {
			id: self.id,
			label: self.label.clone(),
			module: self.module,
			number: self.number,
			condition: self.condition.as_ref().map(|c| c.source().to_string()),
		}
	}
}

/// Serializable view of a [`ModularStep`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
	pub id: StepId,
	pub label: String,
	pub module: Option<ModuleType>,
	pub number: u32,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub condition: Option<String>,
}
