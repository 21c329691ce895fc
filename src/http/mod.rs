//! HTTP protocol handling subsystem (data plane).
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout)
//!     → runtime worker: route match
//!     → script rewrite / access phases (may exit early)
//!     → request.rs (script headers, upstream URI)
//!     → load balancer picks node, hyper client forwards
//!     → script header_filter / log phases
//!     → response.rs (gateway-generated responses)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{GatewayServer, GatewayState};
