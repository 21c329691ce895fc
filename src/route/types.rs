//! Route write errors.

use thiserror::Error;

use crate::script::ScriptError;
use crate::store::StoreError;

/// Errors raised by the route write path.
#[derive(Debug, Error)]
pub enum RouteError {
    /// `script_id` names something other than the route itself.
    #[error("script_id `{script_id}` must equal route id `{id}`")]
    ScriptIdMismatch { id: String, script_id: String },

    /// `script_id` was given for a route without an id.
    #[error("script_id `{script_id}` requires the route id to be set")]
    ScriptIdWithoutId { script_id: String },

    /// `script_id` was given without the script it refers to.
    #[error("script_id `{script_id}` requires script in the same write")]
    ScriptIdWithoutScript { script_id: String },

    /// The body id disagrees with the id in the request path.
    #[error("body id `{body}` does not match path id `{path}`")]
    IdMismatch { path: String, body: String },

    /// A non-script field is unusable.
    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// The script payload was rejected by the engine.
    #[error("invalid script: {0}")]
    Script(#[from] ScriptError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RouteError {
    /// Errors caused by the submitted payload; never retried.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, RouteError::Store(_))
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RouteError::ScriptIdMismatch { .. }
            | RouteError::ScriptIdWithoutId { .. }
            | RouteError::ScriptIdWithoutScript { .. }
            | RouteError::IdMismatch { .. }
            | RouteError::InvalidField { .. } => "validation",
            RouteError::Script(_) => "syntax",
            RouteError::Store(_) => "store",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_and_kind() {
        let err = RouteError::ScriptIdMismatch {
            id: "r1".into(),
            script_id: "not-r1".into(),
        };
        assert_eq!(err.to_string(), "script_id `not-r1` must equal route id `r1`");
        assert_eq!(err.kind(), "validation");
        assert!(err.is_client_error());

        let err = RouteError::from(ScriptError::Syntax { detail: "eof".into() });
        assert_eq!(err.kind(), "syntax");

        let err = RouteError::from(StoreError::Unavailable("down".into()));
        assert!(!err.is_client_error());
        assert_eq!(err.to_string(), "store unavailable: down");
    }
}
