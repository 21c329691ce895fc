//! Route record model.
//!
//! `RouteWrite` is what an administrator submits; `RouteRecord` is what the
//! store keeps and ships to workers. The script attachment is the pair
//! `script` (source) / `script_id` (reference to the route's own script).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_upstream_type() -> String {
    "roundrobin".to_string()
}

/// Upstream target of a route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Upstream {
    /// Balancing strategy; only round robin is understood by the gateway.
    #[serde(rename = "type", default = "default_upstream_type")]
    pub lb_type: String,

    /// `host:port` → weight.
    #[serde(default)]
    pub nodes: BTreeMap<String, u32>,
}

impl Default for Upstream {
    fn default() -> Self {
        Self {
            lb_type: default_upstream_type(),
            nodes: BTreeMap::new(),
        }
    }
}

/// Route definition as submitted through the admin API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RouteWrite {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub uri: String,

    #[serde(default)]
    pub upstream: Upstream,

    /// Raw script source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    /// Script reference; only ever the route's own id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_id: Option<String>,

    /// Accepted so a read record can be written back; the store assigns revisions.
    #[serde(default, skip_serializing)]
    pub revision: Option<u64>,
}

/// Route as persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RouteRecord {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub uri: String,

    pub upstream: Upstream,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_id: Option<String>,

    /// Assigned by the store on every accepted write.
    #[serde(default)]
    pub revision: u64,
}

impl RouteRecord {
    /// Build an unstored record (revision 0) from a checked write.
    pub fn from_write(id: String, write: RouteWrite) -> Self {
        Self {
            id,
            name: write.name,
            uri: write.uri,
            upstream: write.upstream,
            script: write.script,
            script_id: write.script_id,
            revision: 0,
        }
    }

    /// The write that would store this record again.
    pub fn to_write(&self) -> RouteWrite {
        RouteWrite {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            uri: self.uri.clone(),
            upstream: self.upstream.clone(),
            script: self.script.clone(),
            script_id: self.script_id.clone(),
            revision: Some(self.revision),
        }
    }

    pub fn has_script(&self) -> bool {
        self.script.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_json_shape() {
        let write: RouteWrite = serde_json::from_str(
            r#"{
                "name": "route1",
                "uri": "/hello",
                "upstream": {"type": "roundrobin", "nodes": {"127.0.0.1:1980": 1}},
                "script": "fn access(ctx) { }",
                "script_id": "r1"
            }"#,
        )
        .unwrap();

        assert_eq!(write.id, None);
        assert_eq!(write.script_id.as_deref(), Some("r1"));
        assert_eq!(write.upstream.nodes.get("127.0.0.1:1980"), Some(&1));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let err = serde_json::from_str::<RouteWrite>(r#"{"uri": "/a", "scirpt": "x"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_record_serialization_omits_absent_script() {
        let record = RouteRecord::from_write(
            "r1".into(),
            RouteWrite {
                uri: "/hello".into(),
                ..RouteWrite::default()
            },
        );
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("script"));
        assert!(json.contains("\"id\":\"r1\""));
    }

    #[test]
    fn test_read_record_can_be_written_back() {
        let mut record = RouteRecord::from_write(
            "r1".into(),
            RouteWrite {
                uri: "/hello".into(),
                script: Some("fn access(ctx) { }".into()),
                script_id: Some("r1".into()),
                ..RouteWrite::default()
            },
        );
        record.revision = 7;

        let json = serde_json::to_string(&record).unwrap();
        let write: RouteWrite = serde_json::from_str(&json).unwrap();
        assert_eq!(write.id.as_deref(), Some("r1"));
        assert_eq!(write.revision, Some(7));
    }
}
