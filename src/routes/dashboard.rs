//! Dashboard consumer routes
//!
//! - GET  /dashboard                 - full state
//! - GET  /dashboard/stats           - stats projection
//! - GET  /dashboard/goals           - goals projection
//! - GET  /dashboard/schedule        - schedule projection
//! - POST /dashboard/refetch         - manual refetch (202)
//! - POST /dashboard/activate/{id}   - track a player (202, 400 on empty id)
//! - POST /dashboard/deactivate      - detach (202)

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde_json::json;
use tracing::info;

use super::{error_response, json_response};
use crate::server::AppState;
use crate::types::{SidelineError, SubjectId};

pub fn handle_state(state: &AppState) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &state.dashboard.state())
}

pub fn handle_stats(state: &AppState) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &state.dashboard.stats())
}

pub fn handle_goals(state: &AppState) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &state.dashboard.goals())
}

pub fn handle_schedule(state: &AppState) -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &state.dashboard.schedule())
}

pub fn handle_refetch(state: &AppState) -> Response<Full<Bytes>> {
    match state.dashboard.refetch() {
        Ok(()) => accepted("refetch", None),
        Err(e) => error_response(e),
    }
}

/// `raw_id` is the still percent-encoded path segment
pub fn handle_activate(state: &AppState, raw_id: &str) -> Response<Full<Bytes>> {
    let decoded = match urlencoding::decode(raw_id) {
        Ok(decoded) => decoded,
        Err(e) => {
            return error_response(SidelineError::InvalidSubject(format!(
                "player id is not valid UTF-8: {}",
                e
            )))
        }
    };

    let subject = match SubjectId::new(&decoded) {
        Ok(subject) => subject,
        Err(e) => return error_response(e),
    };

    info!(subject = %subject, "Activation requested over HTTP");
    match state.dashboard.activate(subject.clone()) {
        Ok(()) => accepted("activate", Some(&subject)),
        Err(e) => error_response(e),
    }
}

pub fn handle_deactivate(state: &AppState) -> Response<Full<Bytes>> {
    match state.dashboard.deactivate() {
        Ok(()) => accepted("deactivate", None),
        Err(e) => error_response(e),
    }
}

fn accepted(action: &str, subject: Option<&SubjectId>) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::ACCEPTED,
        &json!({
            "accepted": true,
            "action": action,
            "subject": subject,
        }),
    )
}
