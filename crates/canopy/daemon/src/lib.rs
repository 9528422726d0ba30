//! canopyd, the Canopy control plane daemon.
//!
//! Exposes deployment lifecycle management over REST: callers post
//! content, the daemon binds it into a resource program and drives the
//! provisioning engine, and the resulting site URL comes back in the
//! response. The library surface exists so integration tests can mount
//! the router without a listening socket.

pub mod api;
pub mod config;
pub mod error;

pub use api::rest::{create_router, AppState};
pub use config::DaemonConfig;
pub use error::{ApiError, ApiResult, DaemonError, DaemonResult};
