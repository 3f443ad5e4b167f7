//! Scope-name syntax for policy selection.
//!
//! A scope is a dot-delimited hierarchical identifier such as
//! `payments.refund.retry`. Each segment is one or more ASCII alphanumerics
//! or underscores. Scope names select configuration profiles; malformed
//! names are rejected at registration time, never at call time.

use std::fmt;

/// The reserved scope name that always exists and acts as the terminal
/// fallback for resolution.
pub const DEFAULT_SCOPE: &str = "DEFAULT";

/// Check whether a string is a syntactically valid scope name.
///
/// Valid names match `^[A-Za-z0-9_]+(\.[A-Za-z0-9_]+)*$`: non-empty
/// dot-separated segments of word characters. The empty string, leading or
/// trailing dots, and empty segments are all invalid.
///
/// # Examples
/// ```
/// use scoped_executor::domain::scope::is_valid_scope;
///
/// assert!(is_valid_scope("payments"));
/// assert!(is_valid_scope("payments.refund_v2"));
/// assert!(!is_valid_scope(""));
/// assert!(!is_valid_scope("payments."));
/// assert!(!is_valid_scope("payments..refund"));
/// assert!(!is_valid_scope("payments/refund"));
/// ```
pub fn is_valid_scope(scope: &str) -> bool {
    if scope.is_empty() {
        return false;
    }
    scope
        .split('.')
        .all(|segment| !segment.is_empty() && segment.bytes().all(is_word_byte))
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Case-insensitive scope-name equality.
///
/// Registered scope names are unique case-insensitively and exact-match
/// lookups ignore case.
pub fn scope_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// A validated scope name.
///
/// Construction enforces the syntax rules, so holding a `ScopeName`
/// guarantees the invariant downstream code relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeName(String);

impl ScopeName {
    /// Validate and wrap a scope name.
    pub fn new(scope: impl Into<String>) -> Result<Self, MalformedScope> {
        let scope = scope.into();
        if is_valid_scope(&scope) {
            Ok(Self(scope))
        } else {
            Err(MalformedScope(scope))
        }
    }

    /// The name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ScopeName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Error produced when a scope name fails syntax validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedScope(pub String);

impl fmt::Display for MalformedScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "malformed scope syntax: {:?}", self.0)
    }
}

impl std::error::Error for MalformedScope {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_scopes() {
        assert!(is_valid_scope("a"));
        assert!(is_valid_scope("DEFAULT"));
        assert!(is_valid_scope("payments"));
        assert!(is_valid_scope("payments.refund"));
        assert!(is_valid_scope("payments.refund.retry_2"));
        assert!(is_valid_scope("A1_b2.C3"));
    }

    #[test]
    fn test_invalid_scopes() {
        assert!(!is_valid_scope(""));
        assert!(!is_valid_scope("."));
        assert!(!is_valid_scope(".payments"));
        assert!(!is_valid_scope("payments."));
        assert!(!is_valid_scope("payments..refund"));
        assert!(!is_valid_scope("payments refund"));
        assert!(!is_valid_scope("payments-refund"));
        assert!(!is_valid_scope("payments/refund"));
    }

    #[test]
    fn test_scope_name_construction() {
        let name = ScopeName::new("payments.refund").unwrap();
        assert_eq!(name.as_str(), "payments.refund");
        assert_eq!(name.to_string(), "payments.refund");

        let err = ScopeName::new("not a scope").unwrap_err();
        assert_eq!(err, MalformedScope("not a scope".to_string()));
        assert!(err.to_string().contains("malformed scope syntax"));
    }

    #[test]
    fn test_case_insensitive_equality() {
        assert!(scope_eq("Payments.Refund", "payments.refund"));
        assert!(scope_eq("DEFAULT", "default"));
        assert!(!scope_eq("payments", "payments.refund"));
    }
}
