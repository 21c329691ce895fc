//! Script phases and error definitions.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A named point in request processing at which a script may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Before access checks; may rewrite the upstream request.
    Rewrite,
    /// Access control point; may short-circuit with `ctx.exit`.
    Access,
    /// After upstream response headers arrive.
    HeaderFilter,
    /// After the response has been produced.
    Log,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 4] = [Phase::Rewrite, Phase::Access, Phase::HeaderFilter, Phase::Log];

    /// Name of the script function that hooks this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Rewrite => "rewrite",
            Phase::Access => "access",
            Phase::HeaderFilter => "header_filter",
            Phase::Log => "log",
        }
    }

    pub fn from_fn_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of phases a compiled script declares hooks for.
pub type PhaseSet = BTreeSet<Phase>;

/// Errors raised while validating, compiling or running a script.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScriptError {
    /// The payload is empty or whitespace only.
    #[error("script is empty")]
    Empty,

    /// The payload exceeds the configured source limit.
    #[error("script is {size} bytes, limit is {max} bytes")]
    TooLarge { size: usize, max: usize },

    /// The payload does not parse.
    #[error("syntax error: {detail}")]
    Syntax { detail: String },

    /// A phase hook has the wrong arity.
    #[error("phase function `{phase}` must take exactly one parameter, found {found}")]
    PhaseSignature { phase: Phase, found: usize },

    /// The script raised or hit an engine limit while running.
    #[error("runtime fault in {phase} phase: {detail}")]
    Runtime { phase: Phase, detail: String },

    /// The script did not finish within its execution budget.
    #[error("{phase} phase exceeded its {budget:?} execution budget")]
    Timeout { phase: Phase, budget: Duration },
}

impl ScriptError {
    /// True for errors caused by the submitted source itself.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ScriptError::Empty
                | ScriptError::TooLarge { .. }
                | ScriptError::Syntax { .. }
                | ScriptError::PhaseSignature { .. }
        )
    }
}
