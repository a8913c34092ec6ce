//! Live dashboard: router, coalescer, lifecycle controller and state store

pub mod coalescer;
pub mod controller;
pub mod router;
pub mod store;

pub use coalescer::RefetchCoalescer;
pub use controller::{
    spawn_dashboard, ControllerCounters, CounterReport, DashboardHandle, Phase,
};
pub use router::ChangeEventRouter;
pub use store::{DashboardState, DerivedStateStore};
