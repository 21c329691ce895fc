//! Cross-field checks on route writes.
//!
//! # Responsibilities
//! - Bind `script_id` to the route's own id
//! - Require the script source whenever `script_id` is present
//! - Run the script validator on every script source, stored or new
//! - Sanity-check the non-script fields the gateway needs
//!
//! # Design Decisions
//! - Structural checks run before the (more expensive) script parse
//! - Pure: nothing is logged or stored here, the caller persists on `Ok`
//! - Updates follow the same script_id rules as creates; a write that
//!   omits `script` never keeps a previously stored one
//! - A resubmitted script is validated again: engine limits may have
//!   changed since it was stored

use std::sync::Arc;

use crate::route::model::{RouteRecord, RouteWrite};
use crate::route::types::RouteError;
use crate::script::ScriptEngine;

/// Applies the route/script identity invariants and script validation.
#[derive(Debug, Clone)]
pub struct ConsistencyEnforcer {
    engine: Arc<dyn ScriptEngine>,
}

impl ConsistencyEnforcer {
    pub fn new(engine: Arc<dyn ScriptEngine>) -> Self {
        Self { engine }
    }

    /// Check `incoming` before it is stored.
    ///
    /// `incoming.id` must already hold the effective id (from the path or the
    /// body); `None` means the caller has not assigned one.
    pub fn check(&self, incoming: &RouteWrite) -> Result<(), RouteError> {
        if let Some(script_id) = &incoming.script_id {
            let Some(id) = &incoming.id else {
                return Err(RouteError::ScriptIdWithoutId {
                    script_id: script_id.clone(),
                });
            };
            if script_id != id {
                return Err(RouteError::ScriptIdMismatch {
                    id: id.clone(),
                    script_id: script_id.clone(),
                });
            }
            if incoming.script.is_none() {
                return Err(RouteError::ScriptIdWithoutScript {
                    script_id: script_id.clone(),
                });
            }
        }

        check_fields(incoming)?;

        if let Some(source) = &incoming.script {
            self.engine.validate(source)?;
        }

        Ok(())
    }

    /// Re-run every check on a record that is already stored, e.g. one
    /// loaded from the data file.
    pub fn check_stored(&self, record: &RouteRecord) -> Result<(), RouteError> {
        self.check(&record.to_write())
    }
}

fn check_fields(incoming: &RouteWrite) -> Result<(), RouteError> {
    if let Some(id) = &incoming.id {
        if id.is_empty() || id.len() > 64 || !id.chars().all(|c| c.is_ascii_alphanumeric() || "-_.".contains(c)) {
            return Err(RouteError::InvalidField {
                field: "id",
                reason: format!("`{}` must be 1-64 characters of [A-Za-z0-9-_.]", id),
            });
        }
    }

    if !incoming.uri.starts_with('/') {
        return Err(RouteError::InvalidField {
            field: "uri",
            reason: format!("`{}` must start with '/'", incoming.uri),
        });
    }

    if incoming.upstream.nodes.is_empty() {
        return Err(RouteError::InvalidField {
            field: "upstream.nodes",
            reason: "at least one node is required".to_string(),
        });
    }

    for (node, weight) in &incoming.upstream.nodes {
        let valid_port = node
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !valid_port {
            return Err(RouteError::InvalidField {
                field: "upstream.nodes",
                reason: format!("`{}` is not host:port", node),
            });
        }
        if *weight == 0 {
            return Err(RouteError::InvalidField {
                field: "upstream.nodes",
                reason: format!("`{}` has zero weight", node),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::model::Upstream;
    use crate::script::{RhaiEngine, ScriptError};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const VALID: &str = "fn access(ctx) {\n ctx.log_warn(\"hit access phase\");\n}\n";
    const INVALID: &str = "fn access(ctx) {\n ctx.log_warn(\"hit access phase\");\n";

    /// Counts validator calls and delegates to Rhai.
    #[derive(Debug, Default)]
    struct CountingEngine {
        calls: AtomicUsize,
        inner: RhaiEngine,
    }

    impl ScriptEngine for CountingEngine {
        fn validate(&self, source: &str) -> Result<(), ScriptError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.validate(source)
        }

        fn compile(&self, source: &str) -> Result<Arc<dyn crate::script::Program>, ScriptError> {
            self.inner.compile(source)
        }
    }

    fn enforcer() -> ConsistencyEnforcer {
        ConsistencyEnforcer::new(Arc::new(RhaiEngine::default()))
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

    #[test]
    fn test_script_id_must_equal_id() {
        let err = enforcer()
            .check(&write(Some("r1"), Some(VALID), Some("not-r1")))
            .unwrap_err();
        assert!(matches!(err, RouteError::ScriptIdMismatch { .. }));
    }

    #[test]
    fn test_script_id_requires_id() {
        let err = enforcer()
            .check(&write(None, Some(VALID), Some("r1")))
            .unwrap_err();
        assert!(matches!(err, RouteError::ScriptIdWithoutId { .. }));
    }

    #[test]
    fn test_script_id_requires_script_on_create_and_update() {
        let incoming = write(Some("r1"), None, Some("r1"));
        let err = enforcer().check(&incoming).unwrap_err();
        assert!(matches!(err, RouteError::ScriptIdWithoutScript { .. }));

        let mut stored = RouteRecord::from_write("r1".into(), write(Some("r1"), None, Some("r1")));
        stored.revision = 3;
        let err = enforcer().check_stored(&stored).unwrap_err();
        assert!(matches!(err, RouteError::ScriptIdWithoutScript { .. }));
    }

    #[test]
    fn test_invalid_script_rejected_regardless_of_other_fields() {
        for incoming in [
            write(Some("r1"), Some(INVALID), None),
            write(Some("r1"), Some(INVALID), Some("r1")),
            write(None, Some(INVALID), None),
        ] {
            let err = enforcer().check(&incoming).unwrap_err();
            assert!(matches!(err, RouteError::Script(ScriptError::Syntax { .. })));
        }
    }

    #[test]
    fn test_structural_checks_run_before_validation() {
        let engine = Arc::new(CountingEngine::default());
        let enforcer = ConsistencyEnforcer::new(engine.clone());

        assert!(enforcer.check(&write(Some("r1"), Some(INVALID), Some("r2"))).is_err());
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_resubmitted_script_is_revalidated() {
        let engine = Arc::new(CountingEngine::default());
        let enforcer = ConsistencyEnforcer::new(engine.clone());
        let incoming = write(Some("r1"), Some(VALID), Some("r1"));

        enforcer.check(&incoming).unwrap();
        enforcer.check(&incoming).unwrap();
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stored_invalid_script_is_caught() {
        let mut stored = RouteRecord::from_write("r1".into(), write(Some("r1"), Some(INVALID), None));
        stored.revision = 1;
        assert!(matches!(
            enforcer().check_stored(&stored),
            Err(RouteError::Script(ScriptError::Syntax { .. }))
        ));

        // Same text resubmitted over it is rejected too.
        assert!(enforcer().check(&stored.to_write()).is_err());
    }

    #[test]
    fn test_valid_writes_pass() {
        enforcer().check(&write(Some("r1"), Some(VALID), Some("r1"))).unwrap();
        enforcer().check(&write(Some("r1"), Some(VALID), None)).unwrap();
        enforcer().check(&write(None, None, None)).unwrap();
    }

    #[test]
    fn test_field_sanity() {
        let mut bad_uri = write(Some("r1"), None, None);
        bad_uri.uri = "hello".into();
        assert!(matches!(
            enforcer().check(&bad_uri),
            Err(RouteError::InvalidField { field: "uri", .. })
        ));

        let mut no_nodes = write(Some("r1"), None, None);
        no_nodes.upstream.nodes.clear();
        assert!(matches!(
            enforcer().check(&no_nodes),
            Err(RouteError::InvalidField { field: "upstream.nodes", .. })
        ));

        let bad_id = write(Some("r 1"), None, None);
        assert!(matches!(
            enforcer().check(&bad_id),
            Err(RouteError::InvalidField { field: "id", .. })
        ));
    }
}
