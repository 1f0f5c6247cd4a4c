//! Step graph endpoint.
//!
//! Returns the steps of a service that are visible for a client type, in
//! display order and numbered from 1.

use thiserror::Error;
use tracing::info;
use wizard_core::{EngineError, WizardEngine};
use wizard_types::{APIError, StepSummary, StepsQuery};

/// Errors that can occur while resolving a step graph.
#[derive(Debug, Error)]
pub enum StepsError {
	#[error("Unknown service: {0}")]
	UnknownService(String),
	#[error("Service is misconfigured: {0}")]
	InvalidService(String),
	#[error("Internal error: {0}")]
	Internal(String),
}

impl From<EngineError> for StepsError {
	fn from(error: EngineError) -> Self {
		match error {
			EngineError::UnknownService(id) => StepsError::UnknownService(id),
			EngineError::Config(message) => StepsError::InvalidService(message),
			EngineError::Service(message) => StepsError::Internal(message),
		}
	}
}

impl From<StepsError> for APIError {
	fn from(error: StepsError) -> Self {
		let message = error.to_string();
		match error {
			StepsError::UnknownService(_) => APIError::NotFound {
				error_type: "SERVICE_NOT_FOUND".to_string(),
				message,
			},
			StepsError::InvalidService(_) => APIError::UnprocessableEntity {
				error_type: "INVALID_SERVICE_CONFIG".to_string(),
				message,
				details: None,
			},
			StepsError::Internal(_) => APIError::InternalServerError {
				error_type: "INTERNAL_ERROR".to_string(),
				message,
			},
		}
	}
}

/// Resolves the visible steps of a service.
pub fn get_steps(
	engine: &WizardEngine,
	service_id: &str,
	query: StepsQuery,
) -> Result<Vec<StepSummary>, StepsError> {
	info!(service = %service_id, client_type = ?query.client_type, "Resolving step graph");
	Ok(engine.summaries_for(service_id, query.client_type)?)
}
