//! Per-route script state machine.
//!
//! # States
//! - NoScript: route has no script; requests bypass the engine
//! - Compiling: a new revision's script is being compiled
//! - Ready: the latest revision's script is installed
//! - Failed: the latest revision failed to compile
//!
//! # State Transitions
//! ```text
//! any → NoScript:  put without script
//! any → Compiling: put with script
//! Compiling → Ready:  compile succeeded, artifact swapped in
//! Compiling → Failed: compile failed, previous artifact (if any) keeps serving
//! ```

use std::fmt;

/// Script state tag, stored as an `AtomicU8` on each route entry.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptState {
    NoScript = 0,
    Compiling = 1,
    Ready = 2,
    Failed = 3,
}

impl From<u8> for ScriptState {
    fn from(val: u8) -> Self {
        match val {
            1 => ScriptState::Compiling,
            2 => ScriptState::Ready,
            3 => ScriptState::Failed,
            _ => ScriptState::NoScript,
        }
    }
}

impl ScriptState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptState::NoScript => "no_script",
            ScriptState::Compiling => "compiling",
            ScriptState::Ready => "ready",
            ScriptState::Failed => "failed",
        }
    }
}

impl fmt::Display for ScriptState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8_round_trip() {
        for state in [
            ScriptState::NoScript,
            ScriptState::Compiling,
            ScriptState::Ready,
            ScriptState::Failed,
        ] {
            assert_eq!(ScriptState::from(state as u8), state);
        }
        assert_eq!(ScriptState::from(200), ScriptState::NoScript);
    }
}
