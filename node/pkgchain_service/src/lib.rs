//! Stateful façade crate: wires the skipchain store, propagation tree and
//! cosigning driver behind a single-mutex repository map (spec §4.7, §5),
//! and exposes them over HTTP.

pub mod api;
pub mod cosign_remote;
pub mod error;
pub mod propagation_http;
pub mod state;

pub use api::{into_router, AppState};
pub use error::ApiError;
pub use state::ServiceState;
