//! Liveness endpoint (/health, /healthz)
//!
//! 200 while the dashboard controller is running, 503 once it has stopped.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::json_response;
use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    /// 'online' or 'degraded'
    pub status: &'static str,
    pub version: &'static str,
    /// Seconds since startup
    pub uptime: u64,
    pub timestamp: String,
    pub mode: &'static str,
    pub instance_id: String,
    /// Change bus in use ('nats' or 'memory')
    pub bus: &'static str,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    let healthy = !state.dashboard.is_closed();

    HealthResponse {
        healthy,
        status: if healthy { "online" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        instance_id: state.args.instance_id.to_string(),
        bus: state.bus_name,
    }
}

pub fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    let response = build_health_response(state);
    let status = if response.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_response(status, &response)
}
