//! Route Gateway Library
//!
//! An API gateway whose routes can carry a script. The admin control plane
//! validates and stores routes; gateway workers compile the scripts and run
//! them at request-processing phases.
//!
//! # Architecture Overview
//!
//! ```text
//!   Admin request                  ┌──────────────────────────────────────────┐
//!   ─────────────▶ admin ─▶ route ─┼─▶ consistency ─▶ script::validate        │
//!                                  │        │                                  │
//!                                  │        ▼                                  │
//!                                  │      store (revision, broadcast)          │
//!                                  └────────┬─────────────────────────────────┘
//!                                           │ RouteWatch per worker
//!                                           ▼
//!                                  runtime::propagator ─▶ runtime::worker
//!                                                          (compile, swap)
//!                                                               │
//!   Client request                                              ▼
//!   ─────────────▶ http::server ─▶ routing ─▶ script phases ─▶ load_balancer ─▶ upstream
//! ```

// Control plane
pub mod admin;
pub mod route;
pub mod store;

// Data plane
pub mod http;
pub mod load_balancer;
pub mod routing;
pub mod runtime;
pub mod script;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::{RunningGateway, Shutdown};
