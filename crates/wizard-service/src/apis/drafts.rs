//! Draft store endpoints.
//!
//! Creates, reads, updates and submits remote draft records. Order codes
//! coming from the path are validated against the configured prefix before
//! any storage access.

use thiserror::Error;
use tracing::info;
use wizard_core::WizardEngine;
use wizard_order::DraftError;
use wizard_types::{
	truncate_id, APIError, CreateDraftRequest, DraftRecord, OrderCode, SaveEvent,
	UpdateDraftRequest, WizardEvent,
};

/// Errors that can occur during draft processing.
#[derive(Debug, Error)]
pub enum DraftApiError {
	#[error("Unknown service: {0}")]
	UnknownService(String),
	#[error(transparent)]
	Draft(#[from] DraftError),
}

impl From<DraftApiError> for APIError {
	fn from(error: DraftApiError) -> Self {
		let message = error.to_string();
		match error {
			DraftApiError::UnknownService(_) => APIError::NotFound {
				error_type: "SERVICE_NOT_FOUND".to_string(),
				message,
			},
			DraftApiError::Draft(DraftError::InvalidCode(_)) => APIError::BadRequest {
				error_type: "INVALID_ORDER_CODE".to_string(),
				message,
			},
			DraftApiError::Draft(DraftError::NotFound(_)) => APIError::NotFound {
				error_type: "DRAFT_NOT_FOUND".to_string(),
				message,
			},
			DraftApiError::Draft(DraftError::NotEditable { .. }) => APIError::Conflict {
				error_type: "DRAFT_NOT_EDITABLE".to_string(),
				message,
			},
			DraftApiError::Draft(DraftError::InvalidTransition { .. }) => APIError::Conflict {
				error_type: "INVALID_TRANSITION".to_string(),
				message,
			},
			DraftApiError::Draft(DraftError::Collision(_) | DraftError::Storage(_)) => {
				APIError::InternalServerError {
					error_type: "STORAGE_ERROR".to_string(),
					message,
				}
			},
		}
	}
}

/// Creates a draft record for a configured service.
pub async fn create_draft(
	engine: &WizardEngine,
	request: CreateDraftRequest,
) -> Result<DraftRecord, DraftApiError> {
	if engine.config().service(&request.service_id).is_none() {
		return Err(DraftApiError::UnknownService(request.service_id));
	}

	let state = request.state.unwrap_or_default();
	let record = engine.drafts().create(&request.service_id, state).await?;
	engine
		.event_bus()
		.publish(WizardEvent::Save(SaveEvent::DraftCreated {
			order_code: record.code.clone(),
		}))
		.ok();
	Ok(record)
}

/// Loads a draft record by its order code.
pub async fn get_draft(engine: &WizardEngine, code: &str) -> Result<DraftRecord, DraftApiError> {
	let code = parse_code(engine, code)?;
	info!(order_code = %truncate_id(code.as_str()), "Retrieving draft");
	Ok(engine.drafts().load(&code).await?)
}

/// Replaces the wizard state held by a draft record.
///
/// A request carrying an older revision than the stored one leaves the
/// record untouched and returns it as stored.
pub async fn update_draft(
	engine: &WizardEngine,
	code: &str,
	request: UpdateDraftRequest,
) -> Result<DraftRecord, DraftApiError> {
	let code = parse_code(engine, code)?;
	Ok(engine
		.drafts()
		.save(&code, request.state, request.revision)
		.await?)
}

/// Submits a draft record.
pub async fn submit_draft(engine: &WizardEngine, code: &str) -> Result<DraftRecord, DraftApiError> {
	let code = parse_code(engine, code)?;
	let record = engine.drafts().submit(&code).await?;
	engine
		.event_bus()
		.publish(WizardEvent::Save(SaveEvent::Submitted {
			order_code: record.code.clone(),
		}))
		.ok();
	Ok(record)
}

fn parse_code(engine: &WizardEngine, code: &str) -> Result<OrderCode, DraftApiError> {
	engine
		.drafts()
		.codes()
		.parse(code)
		.map_err(|e| DraftApiError::Draft(DraftError::InvalidCode(e)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use wizard_config::builders::ConfigBuilder;
	use wizard_types::{DraftStatus, ModuleToggle, ServiceVerificationConfig, StepId, WizardState};

	fn engine() -> WizardEngine {
		let config = ConfigBuilder::new()
			.service(
				"notary",
				ServiceVerificationConfig {
					personal_kyc: ModuleToggle::enabled(),
					..Default::default()
				},
			)
			.build();
		crate::factory_registry::build_engine_from_config(config).unwrap()
	}

	fn create_request() -> CreateDraftRequest {
		CreateDraftRequest {
			service_id: "notary".to_string(),
			state: None,
		}
	}

	#[tokio::test]
	async fn test_create_and_get() {
		let engine = engine();
		let mut events = engine.event_bus().subscribe();

		let record = create_draft(&engine, create_request()).await.unwrap();
		assert_eq!(record.status, DraftStatus::Draft);
		assert_eq!(record.state.order_id.as_ref(), Some(&record.code));
		assert!(matches!(
			events.recv().await.unwrap(),
			WizardEvent::Save(SaveEvent::DraftCreated { .. })
		));

		let loaded = get_draft(&engine, record.code.as_str()).await.unwrap();
		assert_eq!(loaded.code, record.code);
	}

	#[tokio::test]
	async fn test_unknown_service() {
		let request = CreateDraftRequest {
			service_id: "missing".to_string(),
			state: None,
		};
		let error = create_draft(&engine(), request).await.unwrap_err();
		assert_eq!(APIError::from(error).status_code(), 404);
	}

	#[tokio::test]
	async fn test_malformed_code_is_bad_request() {
		let error = get_draft(&engine(), "not-a-code").await.unwrap_err();
		assert_eq!(APIError::from(error).status_code(), 400);

		// Well-formed but issued under another prefix.
		let error = get_draft(&engine(), "DOC-20250101-ABC123").await.unwrap_err();
		assert_eq!(APIError::from(error).status_code(), 400);
	}

	#[tokio::test]
	async fn test_missing_draft_is_not_found() {
		let error = get_draft(&engine(), "ORD-20250101-ABC123").await.unwrap_err();
		assert!(matches!(error, DraftApiError::Draft(DraftError::NotFound(_))));
		assert_eq!(APIError::from(error).status_code(), 404);
	}

	#[tokio::test]
	async fn test_update_ignores_stale_revision() {
		let engine = engine();
		let record = create_draft(&engine, create_request()).await.unwrap();

		let newer = WizardState {
			current_step_id: StepId::PersonalData,
			revision: 3,
			..Default::default()
		};
		let updated = update_draft(
			&engine,
			record.code.as_str(),
			UpdateDraftRequest {
				state: newer,
				revision: 3,
			},
		)
		.await
		.unwrap();
		assert_eq!(updated.revision, 3);

		let stale = update_draft(
			&engine,
			record.code.as_str(),
			UpdateDraftRequest {
				state: WizardState::default(),
				revision: 1,
			},
		)
		.await
		.unwrap();
		assert_eq!(stale.revision, 3);
		assert_eq!(stale.state.current_step_id, StepId::PersonalData);
	}

	#[tokio::test]
	async fn test_submit_freezes_draft() {
		let engine = engine();
		let record = create_draft(&engine, create_request()).await.unwrap();
		let code = record.code.as_str().to_string();

		let submitted = submit_draft(&engine, &code).await.unwrap();
		assert_eq!(submitted.status, DraftStatus::Submitted);
		assert!(submitted.submitted_at.is_some());

		let again = submit_draft(&engine, &code).await.unwrap_err();
		assert_eq!(APIError::from(again).status_code(), 409);

		let edit = update_draft(
			&engine,
			&code,
			UpdateDraftRequest {
				state: WizardState::default(),
				revision: 10,
			},
		)
		.await
		.unwrap_err();
		let api_error = APIError::from(edit);
		assert_eq!(api_error.status_code(), 409);
		assert_eq!(api_error.to_error_response().error, "DRAFT_NOT_EDITABLE");
	}
}
