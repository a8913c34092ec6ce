//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one task per connection. Every route is a
//! synchronous read of the dashboard handle or a command send, so routing
//! is a plain function of method and path ([`dispatch`]).

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN,
};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::config::Args;
use crate::live::DashboardHandle;
use crate::routes::{self, json_response};
use crate::types::SidelineError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Handle to the running dashboard controller
    pub dashboard: DashboardHandle,
    /// Change bus in use, for health and status output
    pub bus_name: &'static str,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, dashboard: DashboardHandle, bus_name: &'static str) -> Self {
        Self {
            args,
            dashboard,
            bus_name,
            started_at: Instant::now(),
        }
    }
}

/// Serve until `shutdown` flips to true
pub async fn run(
    state: Arc<AppState>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), SidelineError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Sideline listening on {} as instance {}",
        state.args.listen, state.args.instance_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled");
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move { handle_request(state, addr, req).await }
                        });

                        if let Err(err) = http1::Builder::new()
                            .serve_connection(io, service)
                            .await
                        {
                            error!("Error serving connection from {}: {:?}", addr, err);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {:?}", e);
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("HTTP server shutting down");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("[{}] {} {}", addr, method, path);

    Ok(dispatch(&state, &method, &path))
}

/// Route one request
pub fn dispatch(state: &AppState, method: &Method, path: &str) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET, "/health") | (&Method::GET, "/healthz") => routes::health_check(state),
        (&Method::GET, "/status") => routes::status_check(state),

        (&Method::GET, "/dashboard") => routes::handle_state(state),
        (&Method::GET, "/dashboard/stats") => routes::handle_stats(state),
        (&Method::GET, "/dashboard/goals") => routes::handle_goals(state),
        (&Method::GET, "/dashboard/schedule") => routes::handle_schedule(state),

        (&Method::POST, "/dashboard/refetch") => routes::handle_refetch(state),
        (&Method::POST, "/dashboard/deactivate") => routes::handle_deactivate(state),
        (&Method::POST, p) if p.starts_with("/dashboard/activate/") => {
            routes::handle_activate(state, &p["/dashboard/activate/".len()..])
        }

        (&Method::OPTIONS, _) => preflight_response(),

        _ => not_found_response(path),
    }
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    response
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({
            "error": "Not Found",
            "path": path,
        }),
    )
}
