//! HTTP surface for the order intake service.
//!
//! The router is composable: `api_router()` returns a `Router` that can be
//! mounted on any axum server instance. Handlers take `State<ApiContext>`,
//! which carries the shared database handle and the order-update channel.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use types::ApiContext;
