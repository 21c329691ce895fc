//! Route write path: consistency checks, script validation, persistence.

use std::collections::HashSet;
use std::sync::Arc;

use crate::observability::metrics;
use crate::route::consistency::ConsistencyEnforcer;
use crate::route::model::{RouteRecord, RouteWrite};
use crate::route::types::RouteError;
use crate::script::ScriptEngine;
use crate::store::{RouteStore, StoreError};

/// Result of applying a declared routes file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub applied: usize,
    pub deleted: usize,
    pub rejected: usize,
}

/// Control-plane entry point for route changes.
#[derive(Clone)]
pub struct RouteService {
    store: Arc<dyn RouteStore>,
    enforcer: ConsistencyEnforcer,
}

impl RouteService {
    pub fn new(store: Arc<dyn RouteStore>, engine: Arc<dyn ScriptEngine>) -> Self {
        Self {
            store,
            enforcer: ConsistencyEnforcer::new(engine),
        }
    }

    pub fn store(&self) -> &Arc<dyn RouteStore> {
        &self.store
    }

    /// Create a route. The id comes from the body or, when absent, is generated
    /// after the checks (so a `script_id` without an id is still rejected).
    pub fn create(&self, mut write: RouteWrite) -> Result<RouteRecord, RouteError> {
        self.enforcer.check(&write).inspect_err(|e| reject("create", e))?;

        let id = write
            .id
            .take()
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let record = self
            .store
            .create(RouteRecord::from_write(id, write))
            .inspect_err(|e| tracing::error!(error = %e, "Route create failed in store"))?;

        accepted("create", &record);
        Ok(record)
    }

    /// Create or fully replace the route at `id`.
    pub fn put(&self, id: &str, mut write: RouteWrite) -> Result<RouteRecord, RouteError> {
        match &write.id {
            Some(body_id) if body_id != id => {
                let err = RouteError::IdMismatch {
                    path: id.to_string(),
                    body: body_id.clone(),
                };
                reject("put", &err);
                return Err(err);
            }
            _ => write.id = Some(id.to_string()),
        }

        self.enforcer.check(&write).inspect_err(|e| reject("put", e))?;
        let existing = self.store.get(id)?;

        let record = self
            .store
            .put(RouteRecord::from_write(id.to_string(), write))
            .inspect_err(|e| tracing::error!(route_id = %id, error = %e, "Route write failed in store"))?;

        accepted(if existing.is_some() { "update" } else { "create" }, &record);
        Ok(record)
    }

    pub fn get(&self, id: &str) -> Result<RouteRecord, RouteError> {
        self.store
            .get(id)?
            .ok_or_else(|| RouteError::Store(StoreError::NotFound(id.to_string())))
    }

    pub fn list(&self) -> Result<Vec<RouteRecord>, RouteError> {
        Ok(self.store.list()?)
    }

    /// Delete a route, returning the deletion revision.
    pub fn delete(&self, id: &str) -> Result<u64, RouteError> {
        let revision = self.store.delete(id)?;
        tracing::info!(route_id = %id, revision, "Route deleted");
        metrics::record_route_write("delete", "ok");
        Ok(revision)
    }

    /// Delete stored routes that no longer pass the write checks, such as
    /// records from a data file written under looser script limits. Returns
    /// the ids removed.
    pub fn purge_invalid(&self) -> Result<Vec<String>, StoreError> {
        let mut purged = Vec::new();
        for record in self.store.list()? {
            let Err(e) = self.enforcer.check_stored(&record) else {
                continue;
            };
            tracing::error!(
                route_id = %record.id,
                revision = record.revision,
                error = %e,
                "Stored route failed validation; removing it"
            );
            metrics::record_route_write("purge", e.kind());
            self.store.delete(&record.id)?;
            purged.push(record.id);
        }
        Ok(purged)
    }

    /// Apply a declared route set. `declared` holds the ids the previous call
    /// applied; ids no longer declared are deleted.
    pub fn sync_declared(&self, routes: Vec<RouteWrite>, declared: &mut HashSet<String>) -> SyncReport {
        let mut report = SyncReport::default();
        let mut seen = HashSet::new();

        for route in routes {
            let Some(id) = route.id.clone() else {
                tracing::warn!(uri = %route.uri, "Declared route without id skipped");
                report.rejected += 1;
                continue;
            };

            // Skip rewrites of identical content so workers are not churned.
            if let Ok(Some(current)) = self.store.get(&id) {
                if same_content(&current, &route) {
                    seen.insert(id);
                    continue;
                }
            }

            match self.put(&id, route) {
                Ok(_) => {
                    report.applied += 1;
                    seen.insert(id);
                }
                Err(e) => {
                    tracing::error!(route_id = %id, error = %e, "Declared route rejected");
                    report.rejected += 1;
                    // Keep the stored version; it is still declared.
                    seen.insert(id);
                }
            }
        }

        for stale in declared.difference(&seen) {
            match self.delete(stale) {
                Ok(_) => report.deleted += 1,
                Err(RouteError::Store(StoreError::NotFound(_))) => {}
                Err(e) => tracing::error!(route_id = %stale, error = %e, "Failed to delete undeclared route"),
            }
        }

        *declared = seen;
        report
    }
}

impl std::fmt::Debug for RouteService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteService")
            .field("revision", &self.store.revision())
            .finish()
    }
}

fn same_content(current: &RouteRecord, write: &RouteWrite) -> bool {
    current.name == write.name
        && current.uri == write.uri
        && current.upstream == write.upstream
        && current.script == write.script
        && current.script_id == write.script_id
}

fn reject(op: &'static str, err: &RouteError) {
    tracing::warn!(op, kind = err.kind(), error = %err, "Route write rejected");
    metrics::record_route_write(op, err.kind());
}

fn accepted(op: &'static str, record: &RouteRecord) {
    tracing::info!(
        route_id = %record.id,
        revision = record.revision,
        script = record.has_script(),
        op,
        "Route stored"
    );
    metrics::record_route_write(op, "ok");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::model::Upstream;
    use crate::script::RhaiEngine;
    use crate::store::{MemoryStore, RouteWatch};

    const VALID: &str = "fn access(ctx) {\n ctx.log_warn(\"hit access phase\");\n}\n";
    const INVALID: &str = "fn access(ctx) {\n ctx.log_warn(\"hit access phase\");\n";

    fn service() -> (RouteService, MemoryStore) {
        let store = MemoryStore::new(64, None);
        let service = RouteService::new(Arc::new(store.clone()), Arc::new(RhaiEngine::default()));
        (service, store)
    }

    fn write(id: Option<&str>, script: Option<&str>, script_id: Option<&str>) -> RouteWrite {
        let mut upstream = Upstream::default();
        upstream.nodes.insert("127.0.0.1:1980".into(), 1);
        RouteWrite {
            id: id.map(String::from),
            name: Some("route1".into()),
            uri: "/hello".into(),
            upstream,
            script: script.map(String::from),
            script_id: script_id.map(String::from),
            revision: None,
        }
    }

    /// Store that is always down.
    struct DownStore;

    impl RouteStore for DownStore {
        fn create(&self, _: RouteRecord) -> Result<RouteRecord, StoreError> {
            Err(StoreError::Unavailable("maintenance".into()))
        }
        fn put(&self, _: RouteRecord) -> Result<RouteRecord, StoreError> {
            Err(StoreError::Unavailable("maintenance".into()))
        }
        fn get(&self, _: &str) -> Result<Option<RouteRecord>, StoreError> {
            Ok(None)
        }
        fn list(&self) -> Result<Vec<RouteRecord>, StoreError> {
            Err(StoreError::Unavailable("maintenance".into()))
        }
        fn delete(&self, _: &str) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("maintenance".into()))
        }
        fn watch(&self) -> Result<RouteWatch, StoreError> {
            Err(StoreError::Unavailable("maintenance".into()))
        }
        fn revision(&self) -> u64 {
            0
        }
    }

    #[test]
    fn test_read_after_write_is_exact() {
        let (service, _) = service();
        let stored = service.put("r1", write(None, Some(VALID), Some("r1"))).unwrap();
        let read = service.get("r1").unwrap();

        assert_eq!(stored, read);
        assert_eq!(read.script.as_deref(), Some(VALID));
        assert_eq!(read.script_id.as_deref(), Some("r1"));
        assert_eq!(read.name.as_deref(), Some("route1"));
    }

    #[test]
    fn test_rejected_write_changes_nothing() {
        let (service, store) = service();
        let first = service.put("r1", write(None, Some(VALID), None)).unwrap();

        assert!(service.put("r1", write(None, Some(INVALID), None)).is_err());
        assert!(service.put("r1", write(None, Some(VALID), Some("not-r1"))).is_err());
        assert!(service.put("r1", write(None, None, Some("r1"))).is_err());

        assert_eq!(service.get("r1").unwrap(), first);
        assert_eq!(store.revision(), first.revision);
    }

    #[test]
    fn test_create_generates_id_only_after_checks() {
        let (service, store) = service();

        let err = service.create(write(None, Some(VALID), Some("r1"))).unwrap_err();
        assert!(matches!(err, RouteError::ScriptIdWithoutId { .. }));
        assert_eq!(store.revision(), 0);

        let record = service.create(write(None, Some(VALID), None)).unwrap();
        assert_eq!(record.id.len(), 32);

        let record = service.create(write(Some("r1"), Some(VALID), Some("r1"))).unwrap();
        assert_eq!(record.id, "r1");
        assert!(matches!(
            service.create(write(Some("r1"), None, None)),
            Err(RouteError::Store(StoreError::AlreadyExists(_)))
        ));
    }

    #[test]
    fn test_put_rejects_body_id_mismatch() {
        let (service, _) = service();
        let err = service.put("r1", write(Some("r2"), None, None)).unwrap_err();
        assert!(matches!(err, RouteError::IdMismatch { .. }));
    }

    #[test]
    fn test_update_revisions_increase() {
        let (service, _) = service();
        let a = service.put("r1", write(None, Some(VALID), Some("r1"))).unwrap();
        let b = service.put("r1", write(None, Some(VALID), Some("r1"))).unwrap();
        let c = service.put("r1", write(None, None, None)).unwrap();

        assert!(a.revision < b.revision && b.revision < c.revision);
        assert!(!c.has_script());
    }

    #[test]
    fn test_store_errors_are_server_errors() {
        let service = RouteService::new(Arc::new(DownStore), Arc::new(RhaiEngine::default()));
        let err = service.put("r1", write(None, Some(VALID), None)).unwrap_err();
        assert!(!err.is_client_error());

        // Client errors still win: nothing reaches the store.
        let err = service.put("r1", write(None, Some(INVALID), None)).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_purge_invalid_removes_unvalidated_records() {
        let (service, store) = service();
        service.put("good", write(None, Some(VALID), None)).unwrap();
        // Written past the checks, as a data file load would.
        store
            .put(RouteRecord::from_write("bad".into(), write(Some("bad"), Some(INVALID), None)))
            .unwrap();

        assert_eq!(service.purge_invalid().unwrap(), vec!["bad".to_string()]);
        assert!(store.get("bad").unwrap().is_none());
        assert!(store.get("good").unwrap().is_some());
        assert!(service.purge_invalid().unwrap().is_empty());
    }

    #[test]
    fn test_resubmitting_stored_invalid_script_is_rejected() {
        let (service, store) = service();
        store
            .put(RouteRecord::from_write("r1".into(), write(Some("r1"), Some(INVALID), None)))
            .unwrap();

        let err = service.put("r1", write(None, Some(INVALID), None)).unwrap_err();
        assert!(matches!(err, RouteError::Script(_)));
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn test_sync_declared() {
        let (service, store) = service();
        let mut declared = HashSet::new();

        let report = service.sync_declared(
            vec![
                write(Some("a"), Some(VALID), Some("a")),
                write(Some("b"), None, None),
                write(Some("c"), Some(INVALID), None),
                write(None, None, None),
            ],
            &mut declared,
        );
        assert_eq!(report, SyncReport { applied: 2, deleted: 0, rejected: 2 });
        let revision = store.revision();

        // Same content again: no new revisions.
        let report = service.sync_declared(vec![write(Some("a"), Some(VALID), Some("a"))], &mut declared);
        assert_eq!(report, SyncReport { applied: 0, deleted: 1, rejected: 0 });
        assert!(store.get("b").unwrap().is_none());
        assert_eq!(store.revision(), revision + 1);
    }
}
