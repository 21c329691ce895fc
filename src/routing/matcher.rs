//! URI matching for gateway requests.
//!
//! # Responsibilities
//! - Match a request path against a route's `uri`
//! - Rank matches so the most specific route wins
//!
//! # Design Decisions
//! - `uri` ending in `*` is a prefix match, anything else is exact
//! - Matching is case-sensitive
//! - No regex, so matching stays O(len)

/// Trait for matching request paths against a route condition.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if `path` matches this condition.
    fn matches(&self, path: &str) -> bool;
}

/// Compiled form of a route `uri`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriMatcher {
    Exact(String),
    Prefix(String),
}

impl UriMatcher {
    pub fn parse(uri: &str) -> Self {
        match uri.strip_suffix('*') {
            Some(prefix) => UriMatcher::Prefix(prefix.to_string()),
            None => UriMatcher::Exact(uri.to_string()),
        }
    }

    /// Ordering key: exact beats any prefix, longer prefix beats shorter.
    pub fn specificity(&self) -> (u8, usize) {
        match self {
            UriMatcher::Exact(uri) => (1, uri.len()),
            UriMatcher::Prefix(prefix) => (0, prefix.len()),
        }
    }
}

impl Matcher for UriMatcher {
    fn matches(&self, path: &str) -> bool {
        match self {
            UriMatcher::Exact(uri) => path == uri,
            UriMatcher::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }
}
