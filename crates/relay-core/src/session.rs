//! Session identity and display-name value objects.

use std::fmt;

use crate::{DomainError, DomainResult};

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Identifier for one accepted connection.
///
/// Assigned by the listener from a monotonically increasing counter, so it is
/// unique for the lifetime of the server process. Two connections from the
/// same peer always get different IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Creates a SessionId from a connection number.
    pub const fn new(connection_number: u64) -> Self {
        Self(connection_number)
    }

    /// Returns the underlying connection number.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

impl From<u64> for SessionId {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

/// A display name claimed by a session.
///
/// Always trimmed and non-empty. Comparison is exact and case-sensitive,
/// so `alice` and `Alice` are different names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisplayName(String);

impl DisplayName {
    /// Parses a raw JOIN payload into a display name.
    ///
    /// Surrounding whitespace is removed before validation.
    ///
    /// # Errors
    ///
    /// - `DomainError::EmptyName` if nothing is left after trimming
    /// - `DomainError::NameContainsLineBreak` if a `\r` or `\n` remains inside
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(DomainError::EmptyName);
        }
        if name.contains(['\r', '\n']) {
            return Err(DomainError::NameContainsLineBreak {
                name: name.to_string(),
            });
        }
        Ok(Self(name.to_string()))
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DisplayName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<DisplayName> for String {
    fn from(name: DisplayName) -> Self {
        name.0
    }
}

impl AsRef<str> for DisplayName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_display() {
        let id = SessionId::new(42);
        assert_eq!(id.to_string(), "session-42");
        assert_eq!(id.get(), 42);
        assert_eq!(SessionId::from(7), SessionId::new(7));
    }

    #[test]
    fn test_display_name_trims() {
        let name = DisplayName::parse("  alice \t").unwrap();
        assert_eq!(name.as_str(), "alice");
        assert_eq!(name.to_string(), "alice");
    }

    #[test]
    fn test_display_name_rejects_empty() {
        assert_eq!(DisplayName::parse(""), Err(DomainError::EmptyName));
        assert_eq!(DisplayName::parse("   "), Err(DomainError::EmptyName));
    }

    #[test]
    fn test_display_name_rejects_embedded_line_break() {
        let err = DisplayName::parse("al\rice").unwrap_err();
        assert!(matches!(err, DomainError::NameContainsLineBreak { .. }));
    }

    #[test]
    fn test_display_name_is_case_sensitive() {
        let lower = DisplayName::parse("alice").unwrap();
        let upper = DisplayName::parse("Alice").unwrap();
        assert_ne!(lower, upper);
    }

    #[test]
    fn test_display_name_keeps_inner_spaces_and_colons() {
        let name = DisplayName::parse(" mary ann: ").unwrap();
        assert_eq!(name.as_str(), "mary ann:");
    }

    #[test]
    fn test_display_name_ordering_is_lexicographic() {
        let mut names = vec![
            DisplayName::parse("carol").unwrap(),
            DisplayName::parse("alice").unwrap(),
            DisplayName::parse("bob").unwrap(),
        ];
        names.sort();
        let sorted: Vec<&str> = names.iter().map(DisplayName::as_str).collect();
        assert_eq!(sorted, vec!["alice", "bob", "carol"]);
    }
}
