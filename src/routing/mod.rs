//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → matcher.rs (evaluate each route's uri)
//!     → runtime::table picks the most specific match
//!     → Return: matched route entry or NoMatch (404)
//! ```
//!
//! # Design Decisions
//! - Matchers are compiled once per route revision, on the worker
//! - No regex in hot path (exact and prefix matching only)
//! - Deterministic: ties between equally specific routes go to the smaller id

pub mod matcher;

pub use matcher::{Matcher, UriMatcher};
