//! Wizard state document.
//!
//! `WizardState` is the aggregate mutable document for one in-progress
//! order. Module slices are opaque JSON objects owned by the module
//! collaborators; the wizard only reads the few fields that step conditions
//! are defined over.

use crate::{ModuleType, OrderCode, StepId};
use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Opaque per-module answer data.
pub type ModuleData = serde_json::Map<String, serde_json::Value>;

/// Field of the personal identity slice holding the ISO birth date.
pub const BIRTH_DATE_FIELD: &str = "birth_date";
/// Field of the personal identity slice holding the citizenship.
pub const CITIZENSHIP_FIELD: &str = "citizenship";
/// Field of a client type patch carrying the selected type.
pub const CLIENT_TYPE_FIELD: &str = "client_type";
/// Age from which an applicant is considered an adult.
pub const ADULT_AGE: i32 = 18;

/// Whether the order is placed by an individual or a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientType {
	/// Individual (pessoa fisica).
	#[serde(rename = "PF")]
	Individual,
	/// Company (pessoa juridica).
	#[serde(rename = "PJ")]
	Company,
}

impl ClientType {
	pub fn as_str(&self) -> &'static str {
		match self {
			ClientType::Individual => "PF",
			ClientType::Company => "PJ",
		}
	}
}

impl fmt::Display for ClientType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ClientType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_uppercase().as_str() {
			"PF" => Ok(Self::Individual),
			"PJ" => Ok(Self::Company),
			other => Err(format!("unknown client type '{}'", other)),
		}
	}
}

/// Applicant category derived from the birth date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicantType {
	Adult,
	Minor,
}

impl ApplicantType {
	pub fn as_str(&self) -> &'static str {
		match self {
			ApplicantType::Adult => "adult",
			ApplicantType::Minor => "minor",
		}
	}

	/// Classifies an applicant born on `birth` as of `today`.
	pub fn from_birth_date(birth: NaiveDate, today: NaiveDate) -> Self {
		let mut age = today.year() - birth.year();
		if (today.month(), today.day()) < (birth.month(), birth.day()) {
			age -= 1;
		}
		if age >= ADULT_AGE {
			ApplicantType::Adult
		} else {
			ApplicantType::Minor
		}
	}
}

impl FromStr for ApplicantType {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"adult" => Ok(Self::Adult),
			"minor" => Ok(Self::Minor),
			other => Err(format!("unknown applicant type '{}'", other)),
		}
	}
}

/// Direction of the last navigation made by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
	#[default]
	Forward,
	Backward,
}

/// The aggregate document for one in-progress order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WizardState {
	pub contact: ModuleData,
	pub personal_kyc: ModuleData,
	pub company_kyc: ModuleData,
	pub property: ModuleData,
	pub vehicle: ModuleData,
	pub signature: ModuleData,
	pub selected_options: ModuleData,
	pub delivery: ModuleData,
	pub billing: ModuleData,
	pub client_type: Option<ClientType>,
	pub current_step_id: StepId,
	/// Assigned on the first successful persistence.
	pub order_id: Option<OrderCode>,
	pub is_dirty: bool,
	/// Unix seconds of the last successful remote save.
	pub last_saved_at: Option<u64>,
	/// Incremented on every data mutation.
	pub revision: u64,
	pub last_direction: Direction,
	/// Validity reported by step collaborators.
	pub step_validity: BTreeMap<StepId, bool>,
}

impl Default for WizardState {
	fn default() -> Self {
		Self {
			contact: ModuleData::new(),
			personal_kyc: ModuleData::new(),
			company_kyc: ModuleData::new(),
			property: ModuleData::new(),
			vehicle: ModuleData::new(),
			signature: ModuleData::new(),
			selected_options: ModuleData::new(),
			delivery: ModuleData::new(),
			billing: ModuleData::new(),
			client_type: None,
			current_step_id: StepId::Contact,
			order_id: None,
			is_dirty: false,
			last_saved_at: None,
			revision: 0,
			last_direction: Direction::Forward,
			step_validity: BTreeMap::new(),
		}
	}
}

impl WizardState {
	/// Returns the data slice of a module.
	///
	/// The client type module has no free-form slice and yields `None`.
	pub fn module(&self, module: ModuleType) -> Option<&ModuleData> {
		match module {
			ModuleType::Contact => Some(&self.contact),
			ModuleType::PersonalKyc => Some(&self.personal_kyc),
			ModuleType::CompanyKyc => Some(&self.company_kyc),
			ModuleType::Property => Some(&self.property),
			ModuleType::Vehicle => Some(&self.vehicle),
			ModuleType::Signature => Some(&self.signature),
			ModuleType::SelectedOptions => Some(&self.selected_options),
			ModuleType::Delivery => Some(&self.delivery),
			ModuleType::Billing => Some(&self.billing),
			ModuleType::ClientType => None,
		}
	}

	pub fn module_mut(&mut self, module: ModuleType) -> Option<&mut ModuleData> {
		match module {
			ModuleType::Contact => Some(&mut self.contact),
			ModuleType::PersonalKyc => Some(&mut self.personal_kyc),
			ModuleType::CompanyKyc => Some(&mut self.company_kyc),
			ModuleType::Property => Some(&mut self.property),
			ModuleType::Vehicle => Some(&mut self.vehicle),
			ModuleType::Signature => Some(&mut self.signature),
			ModuleType::SelectedOptions => Some(&mut self.selected_options),
			ModuleType::Delivery => Some(&mut self.delivery),
			ModuleType::Billing => Some(&mut self.billing),
			ModuleType::ClientType => None,
		}
	}

	/// Applicant type as of `today`, if a valid birth date was entered.
	pub fn applicant_type_on(&self, today: NaiveDate) -> Option<ApplicantType> {
		let raw = self.personal_kyc.get(BIRTH_DATE_FIELD)?.as_str()?;
		let birth = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()?;
		Some(ApplicantType::from_birth_date(birth, today))
	}

	pub fn applicant_type(&self) -> Option<ApplicantType> {
		self.applicant_type_on(Utc::now().date_naive())
	}

	pub fn citizenship(&self) -> Option<&str> {
		self.personal_kyc
			.get(CITIZENSHIP_FIELD)
			.and_then(|v| v.as_str())
			.map(str::trim)
			.filter(|s| !s.is_empty())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn date(y: i32, m: u32, d: u32) -> NaiveDate {
		NaiveDate::from_ymd_opt(y, m, d).unwrap()
	}

	#[test]
	fn test_applicant_type_respects_birthday() {
		let birth = date(2000, 6, 15);
		assert_eq!(
			ApplicantType::from_birth_date(birth, date(2018, 6, 14)),
			ApplicantType::Minor
		);
		assert_eq!(
			ApplicantType::from_birth_date(birth, date(2018, 6, 15)),
			ApplicantType::Adult
		);
	}

	#[test]
	fn test_applicant_type_reads_personal_slice() {
		let mut state = WizardState::default();
		assert_eq!(state.applicant_type_on(date(2026, 1, 1)), None);

		state
			.personal_kyc
			.insert(BIRTH_DATE_FIELD.into(), json!("2015-03-02"));
		assert_eq!(
			state.applicant_type_on(date(2026, 1, 1)),
			Some(ApplicantType::Minor)
		);

		state
			.personal_kyc
			.insert(BIRTH_DATE_FIELD.into(), json!("not a date"));
		assert_eq!(state.applicant_type_on(date(2026, 1, 1)), None);
	}

	#[test]
	fn test_state_serializes_in_camel_case() {
		let mut state = WizardState::default();
		state.client_type = Some(ClientType::Company);
		let value = serde_json::to_value(&state).unwrap();
		assert_eq!(value["clientType"], json!("PJ"));
		assert_eq!(value["currentStepId"], json!("contact"));
		assert!(value.get("personalKyc").is_some());

		// Missing fields fall back to defaults.
		let partial: WizardState = serde_json::from_value(json!({"isDirty": true})).unwrap();
		assert!(partial.is_dirty);
		assert_eq!(partial.current_step_id, StepId::Contact);
	}

	#[test]
	fn test_client_type_module_has_no_slice() {
		let mut state = WizardState::default();
		assert!(state.module(ModuleType::ClientType).is_none());
		assert!(state.module_mut(ModuleType::Billing).is_some());
	}
}
