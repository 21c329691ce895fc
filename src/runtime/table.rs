//! Per-worker route table.
//!
//! Readers clone an `Arc<RouteEntry>` out of the map and load the script
//! artifact once per request, so a concurrent compile or delete never
//! changes the script a request is already running.

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::load_balancer::RoundRobin;
use crate::route::RouteRecord;
use crate::routing::{Matcher, UriMatcher};
use crate::runtime::state::ScriptState;
use crate::script::CompiledScript;

/// A route as seen by one gateway worker.
#[derive(Debug)]
pub struct RouteEntry {
    pub record: Arc<RouteRecord>,
    pub matcher: UriMatcher,
    pub balancer: RoundRobin,
    state: AtomicU8,
    script: ArcSwapOption<CompiledScript>,
}

impl RouteEntry {
    pub fn new(record: Arc<RouteRecord>, state: ScriptState, script: Option<Arc<CompiledScript>>) -> Self {
        Self {
            matcher: UriMatcher::parse(&record.uri),
            balancer: RoundRobin::new(&record.upstream),
            record,
            state: AtomicU8::new(state as u8),
            script: ArcSwapOption::new(script),
        }
    }

    pub fn id(&self) -> &str {
        &self.record.id
    }

    pub fn revision(&self) -> u64 {
        self.record.revision
    }

    pub fn state(&self) -> ScriptState {
        ScriptState::from(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: ScriptState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// The artifact currently serving requests.
    pub fn script(&self) -> Option<Arc<CompiledScript>> {
        self.script.load_full()
    }

    /// Swap in a new artifact; the previous one is dropped once no request holds it.
    pub fn install(&self, script: Option<Arc<CompiledScript>>) {
        self.script.store(script);
    }
}

/// All routes known to one worker.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: DashMap<String, Arc<RouteEntry>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<Arc<RouteEntry>> {
        self.entries.get(id).map(|e| e.value().clone())
    }

    pub fn insert(&self, entry: Arc<RouteEntry>) -> Option<Arc<RouteEntry>> {
        self.entries.insert(entry.id().to_string(), entry)
    }

    pub fn remove(&self, id: &str) -> Option<Arc<RouteEntry>> {
        self.entries.remove(id).map(|(_, entry)| entry)
    }

    /// Drop every entry whose id fails `keep`. Returns the removed ids.
    pub fn retain(&self, mut keep: impl FnMut(&str) -> bool) -> Vec<String> {
        let mut removed = Vec::new();
        self.entries.retain(|id, _| {
            let kept = keep(id);
            if !kept {
                removed.push(id.clone());
            }
            kept
        });
        removed
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Most specific route matching `path`: exact before prefix, longer
    /// prefix before shorter, then smallest id.
    pub fn match_path(&self, path: &str) -> Option<Arc<RouteEntry>> {
        let mut best: Option<Arc<RouteEntry>> = None;

        for item in self.entries.iter() {
            let entry = item.value();
            if !entry.matcher.matches(path) {
                continue;
            }
            let better = match &best {
                None => true,
                Some(current) => {
                    let (new_key, cur_key) = (entry.matcher.specificity(), current.matcher.specificity());
                    new_key > cur_key || (new_key == cur_key && entry.id() < current.id())
                }
            };
            if better {
                best = Some(entry.clone());
            }
        }
        best
    }
}
