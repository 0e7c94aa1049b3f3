//! Legal-form submission: turns the screen's form data into an
//! [`AutomationRequest`] tied to the user's case.

use serde_json::{json, Value};
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::IntakeBackend;
use crate::bridge::{AutomationRequest, BridgeError};
use crate::store::{KeyValueStore, Session, StoreError};

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Build the request for the automation bridge.
///
/// Makes sure a case exists for the form data: the session's case is
/// updated, or a new one is created and remembered. Backend trouble is
/// logged and the request goes out with whatever case id is known.
#[instrument(skip_all)]
pub async fn prepare_request(
    store: &dyn KeyValueStore,
    backend: &dyn IntakeBackend,
    fields: Value,
) -> Result<AutomationRequest, SubmissionError> {
    let request = AutomationRequest::new(fields)?;
    let session = Session::load(store)?;
    let token = session.access_token.as_deref();
    let form_data = Value::Object(request.fields().clone());

    let case_id = match session.case_id.as_deref() {
        Some(case_id) => {
            let patch = json!({ "legal_form": form_data });
            if let Err(e) = backend.update_case(token, case_id, &patch).await {
                warn!(case_id, error = %e, "Could not record legal form on case");
            }
            Some(case_id.to_string())
        }
        None => {
            let draft = json!({ "status": "draft", "legal_form": form_data });
            match backend.create_case(token, &draft).await {
                Ok(case) => {
                    info!(case_id = %case.id, "Created case for legal form");
                    if let Err(e) = Session::set_case_id(store, &case.id) {
                        warn!(error = %e, "Could not remember new case id");
                    }
                    Some(case.id)
                }
                Err(e) => {
                    warn!(error = %e, "Could not create case, submitting without one");
                    None
                }
            }
        }
    };

    Ok(request.with_session(&session).with_case_id(case_id))
}
