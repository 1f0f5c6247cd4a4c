//! Per-service verification configuration.
//!
//! Each service (document type) declares which wizard modules it needs and,
//! optionally, a condition string restricting when a module applies. The
//! configuration is read-only for the wizard.

use crate::{ModuleType, StepId, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Enablement of one module, with an optional applicability condition.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ModuleToggle {
	#[serde(default)]
	pub enabled: bool,
	/// Condition string such as `client_type == 'PJ'`.
	#[serde(default)]
	pub condition: Option<String>,
}

impl ModuleToggle {
	pub fn enabled() -> Self {
		Self {
			enabled: true,
			condition: None,
		}
	}

	pub fn when(condition: impl Into<String>) -> Self {
		Self {
			enabled: true,
			condition: Some(condition.into()),
		}
	}
}

/// Declarative toggle set of a service.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ServiceVerificationConfig {
	#[serde(default)]
	pub personal_kyc: ModuleToggle,
	#[serde(default)]
	pub company_kyc: ModuleToggle,
	#[serde(default)]
	pub property: ModuleToggle,
	#[serde(default)]
	pub vehicle: ModuleToggle,
	#[serde(default)]
	pub signature: ModuleToggle,
	/// Whether the user picks between individual and company.
	#[serde(default)]
	pub client_type_selection: bool,
	/// Identity documents accepted for upload.
	#[serde(default)]
	pub accepted_documents: Vec<String>,
	/// Label overrides keyed by step id.
	#[serde(default)]
	pub step_labels: BTreeMap<String, String>,
}

impl ServiceVerificationConfig {
	/// Returns the toggle of a configurable module.
	pub fn module(&self, module: ModuleType) -> Option<&ModuleToggle> {
		match module {
			ModuleType::PersonalKyc => Some(&self.personal_kyc),
			ModuleType::CompanyKyc => Some(&self.company_kyc),
			ModuleType::Property => Some(&self.property),
			ModuleType::Vehicle => Some(&self.vehicle),
			ModuleType::Signature => Some(&self.signature),
			_ => None,
		}
	}

	pub fn kyc_enabled(&self) -> bool {
		self.personal_kyc.enabled || self.company_kyc.enabled
	}

	/// Label override for a step, if configured.
	pub fn label_for(&self, id: StepId) -> Option<&str> {
		self.step_labels.get(id.as_str()).map(String::as_str)
	}

	/// Checks the configuration for internal consistency.
	pub fn validate(&self) -> Result<(), ValidationError> {
		for module in [
			ModuleType::PersonalKyc,
			ModuleType::CompanyKyc,
			ModuleType::Property,
			ModuleType::Vehicle,
			ModuleType::Signature,
		] {
			let Some(toggle) = self.module(module) else {
				continue;
			};
			if let Some(condition) = &toggle.condition {
				if condition.trim().is_empty() {
					return Err(ValidationError::InvalidValue {
						field: format!("{}.condition", module),
						message: "condition cannot be empty".into(),
					});
				}
			}
		}

		if self.client_type_selection && !self.company_kyc.enabled {
			return Err(ValidationError::InvalidValue {
				field: "client_type_selection".into(),
				message: "client type selection requires company_kyc to be enabled".into(),
			});
		}

		if !self.accepted_documents.is_empty() && !self.kyc_enabled() {
			return Err(ValidationError::InvalidValue {
				field: "accepted_documents".into(),
				message: "documents are listed but no identity module is enabled".into(),
			});
		}

		for (key, label) in &self.step_labels {
			if key.parse::<StepId>().is_err() {
				return Err(ValidationError::InvalidValue {
					field: format!("step_labels.{}", key),
					message: format!("unknown step id '{}'", key),
				});
			}
			if label.trim().is_empty() {
				return Err(ValidationError::InvalidValue {
					field: format!("step_labels.{}", key),
					message: "label cannot be empty".into(),
				});
			}
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_deserialize_from_toml() {
		let config: ServiceVerificationConfig = toml::from_str(
			r#"
client_type_selection = true
accepted_documents = ["rg", "cnh"]

[personal_kyc]
enabled = true

[company_kyc]
enabled = true
condition = "client_type == 'PJ'"

[step_labels]
vehicle-data = "Vehicle registration"
"#,
		)
		.unwrap();

		assert!(config.personal_kyc.enabled);
		assert!(!config.property.enabled);
		assert_eq!(
			config.company_kyc.condition.as_deref(),
			Some("client_type == 'PJ'")
		);
		assert_eq!(
			config.label_for(StepId::VehicleData),
			Some("Vehicle registration")
		);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_unknown_step_label_rejected() {
		let mut config = ServiceVerificationConfig {
			personal_kyc: ModuleToggle::enabled(),
			..Default::default()
		};
		config
			.step_labels
			.insert("payment".into(), "Payment".into());
		let err = config.validate().unwrap_err();
		assert!(err.to_string().contains("unknown step id 'payment'"));
	}

	#[test]
	fn test_selection_requires_company_module() {
		let config = ServiceVerificationConfig {
			personal_kyc: ModuleToggle::enabled(),
			client_type_selection: true,
			..Default::default()
		};
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_blank_condition_rejected() {
		let config = ServiceVerificationConfig {
			vehicle: ModuleToggle::when("  "),
			..Default::default()
		};
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_documents_require_identity_module() {
		let config = ServiceVerificationConfig {
			signature: ModuleToggle::enabled(),
			accepted_documents: vec!["rg".into()],
			..Default::default()
		};
		assert!(config.validate().is_err());
	}
}
