//! HTTP gateway exposing the query pipeline, corpus listing, health and
//! index management.

mod error;
mod handlers;
mod router;
mod server;

pub use error::{ApiError, GatewayError};
pub use router::build_router;
pub use server::{AppState, GatewayServer};
