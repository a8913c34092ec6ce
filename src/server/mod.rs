//! HTTP server for the dashboard consumer surface

pub mod http;

pub use http::{dispatch, run, AppState};
