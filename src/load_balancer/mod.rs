//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → route's upstream nodes
//!     → round_robin.rs (weighted rotation through nodes)
//!     → Return node address or None (no usable node)
//! ```
//!
//! # Design Decisions
//! - One balancer per route entry, rebuilt when the route changes
//! - Zero-weight nodes never receive traffic

pub mod round_robin;

pub use round_robin::RoundRobin;

/// Upstream node selection strategy.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Address (`host:port`) of the next node, or `None` if there is none.
    fn next_node(&self) -> Option<&str>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
