//! Step Graph Builder.
//!
//! Walks the catalog template in order and keeps the steps whose module the
//! service enables. Steps whose presence depends on runtime answers get a
//! condition instead of being dropped, so the same graph stays valid when
//! the user changes their client type mid-flow.

use super::conditions::compile_condition;
use thiserror::Error;
use wizard_types::{
	ClientType, ModularStep, ServiceVerificationConfig, StepCatalog, StepCondition, StepId,
	ValidationError,
};

/// Condition attached to the company step when the user picks a client type.
pub const COMPANY_CONDITION: &str = "client_type == 'PJ'";

/// Errors that prevent a step graph from being built.
#[derive(Debug, Error)]
pub enum BuildError {
	#[error("Invalid service configuration: {0}")]
	Config(#[from] ValidationError),
}

/// Outcome of the inclusion rules for one catalog entry.
enum Inclusion {
	Excluded,
	Included(Option<StepCondition>),
}

/// Builds the ordered step list of a service.
///
/// Pure function of its inputs: the same configuration and client type
/// always produce the same list. Numbers are assigned over the full list
/// and are only advisory; see [`super::renumber_steps`].
pub fn build_steps(
	config: &ServiceVerificationConfig,
	client_type: Option<ClientType>,
) -> Result<Vec<ModularStep>, BuildError> {
	config.validate()?;

	let mut steps = Vec::with_capacity(StepCatalog::TEMPLATE.len());
	for id in StepCatalog::TEMPLATE {
		let Inclusion::Included(condition) = inclusion(config, client_type, id) else {
			continue;
		};
		let meta = StepCatalog::meta(id);
		steps.push(ModularStep {
			id,
			label: config.label_for(id).unwrap_or(meta.label).to_string(),
			module: meta.module,
			number: steps.len() as u32 + 1,
			condition,
		});
	}

	tracing::debug!(
		steps = steps.len(),
		client_type = ?client_type,
		"Built step graph"
	);
	Ok(steps)
}

fn inclusion(
	config: &ServiceVerificationConfig,
	client_type: Option<ClientType>,
	id: StepId,
) -> Inclusion {
	let toggled = |enabled: bool, condition: Option<&String>| {
		if enabled {
			Inclusion::Included(condition.map(|c| compile_condition(c)))
		} else {
			Inclusion::Excluded
		}
	};

	match id {
		StepId::Contact
		| StepId::Options
		| StepId::Delivery
		| StepId::Billing
		| StepId::Review => Inclusion::Included(None),
		StepId::ClientType => {
			if config.client_type_selection {
				Inclusion::Included(None)
			} else {
				Inclusion::Excluded
			}
		},
		StepId::CompanyData => {
			let toggle = &config.company_kyc;
			if !toggle.enabled {
				return Inclusion::Excluded;
			}
			let configured = toggle.condition.as_deref().map(compile_condition);
			if config.client_type_selection {
				let company = compile_condition(COMPANY_CONDITION);
				Inclusion::Included(Some(match configured {
					Some(extra) => company.and(extra),
					None => company,
				}))
			} else if client_type == Some(ClientType::Individual) {
				Inclusion::Excluded
			} else {
				Inclusion::Included(configured)
			}
		},
		StepId::PersonalData => toggled(
			config.personal_kyc.enabled,
			config.personal_kyc.condition.as_ref(),
		),
		StepId::PropertyData => {
			toggled(config.property.enabled, config.property.condition.as_ref())
		},
		StepId::VehicleData => toggled(config.vehicle.enabled, config.vehicle.condition.as_ref()),
		StepId::KycDocuments => {
			if config.kyc_enabled() && !config.accepted_documents.is_empty() {
				Inclusion::Included(None)
			} else {
				Inclusion::Excluded
			}
		},
		StepId::Signature => {
			toggled(config.signature.enabled, config.signature.condition.as_ref())
		},
	}
}
