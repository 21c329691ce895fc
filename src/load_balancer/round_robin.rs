//! Weighted round-robin over a route's upstream nodes.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::load_balancer::LoadBalancer;
use crate::route::Upstream;

/// Round-robin selector.
/// Stores an internal counter and walks the cumulative weights, so a node
/// with weight 2 is picked twice as often as one with weight 1.
#[derive(Debug, Default)]
pub struct RoundRobin {
    nodes: Vec<(String, u64)>,
    total_weight: u64,
    counter: AtomicU64,
}

impl RoundRobin {
    pub fn new(upstream: &Upstream) -> Self {
        let nodes: Vec<(String, u64)> = upstream
            .nodes
            .iter()
            .filter(|(_, weight)| **weight > 0)
            .map(|(addr, weight)| (addr.clone(), u64::from(*weight)))
            .collect();
        let total_weight = nodes.iter().map(|(_, w)| w).sum();

        Self {
            nodes,
            total_weight,
            counter: AtomicU64::new(0),
        }
    }
}

impl LoadBalancer for RoundRobin {
    fn next_node(&self) -> Option<&str> {
        if self.total_weight == 0 {
            return None;
        }

        let mut slot = self.counter.fetch_add(1, Ordering::Relaxed) % self.total_weight;
        for (addr, weight) in &self.nodes {
            if slot < *weight {
                return Some(addr);
            }
            slot -= weight;
        }
        None
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn upstream(nodes: &[(&str, u32)]) -> Upstream {
        Upstream {
            lb_type: "roundrobin".into(),
            nodes: nodes
                .iter()
                .map(|(a, w)| (a.to_string(), *w))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[test]
    fn test_round_robin() {
        let lb = RoundRobin::new(&upstream(&[("127.0.0.1:8080", 1), ("127.0.0.1:8081", 1)]));

        assert_eq!(lb.next_node(), Some("127.0.0.1:8080"));
        assert_eq!(lb.next_node(), Some("127.0.0.1:8081"));
        assert_eq!(lb.next_node(), Some("127.0.0.1:8080"));
    }

    #[test]
    fn test_weights_respected() {
        let lb = RoundRobin::new(&upstream(&[("a:1", 3), ("b:1", 1)]));
        let picks: Vec<_> = (0..8).map(|_| lb.next_node().unwrap().to_string()).collect();

        assert_eq!(picks.iter().filter(|p| *p == "a:1").count(), 6);
        assert_eq!(picks.iter().filter(|p| *p == "b:1").count(), 2);
    }

    #[test]
    fn test_empty_upstream() {
        let lb = RoundRobin::new(&upstream(&[]));
        assert!(lb.is_empty());
        assert_eq!(lb.next_node(), None);
    }
}
