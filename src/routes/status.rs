//! Controller status (/status)

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::json_response;
use crate::live::CounterReport;
use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub phase: &'static str,
    pub subject: Option<String>,
    pub is_live: bool,
    pub is_loading: bool,
    /// Kind of the current error, if any
    pub error: Option<&'static str>,
    pub coalesce_window_ms: u64,
    pub bus: &'static str,
    pub counters: CounterReport,
}

pub fn status_check(state: &AppState) -> Response<Full<Bytes>> {
    let phase = state.dashboard.phase();
    let current = state.dashboard.state();

    let response = StatusResponse {
        phase: phase.name(),
        subject: phase.subject().map(|s| s.to_string()),
        is_live: current.is_live,
        is_loading: current.is_loading,
        error: current.error.as_ref().map(|e| e.kind()),
        coalesce_window_ms: state.args.coalesce_window_ms,
        bus: state.bus_name,
        counters: state.dashboard.counters(),
    };

    json_response(StatusCode::OK, &response)
}
