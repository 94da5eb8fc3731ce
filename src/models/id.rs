use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error(
    "Invalid id {value:?}: ids must be a single path segment (no '/', '\\\\', NUL, '.' or '..')"
)]
pub struct IdError {
    value: String,
}

/// Opaque identifier assigned by the aggregator (transactions, accounts) or
/// chosen by the operator (users).
///
/// User ids name a directory in the file-backed store and must be safe path
/// segments; see [`Id::from_string_checked`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Create an ID, validating that it is a safe path segment.
    pub fn from_string_checked(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        if Self::is_path_safe(&value) {
            Ok(Self(value))
        } else {
            Err(IdError { value })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the string is safe to use as a single path segment.
    pub fn is_path_safe(value: &str) -> bool {
        if value.is_empty() || value == "." || value == ".." {
            return false;
        }
        !value.chars().any(|c| c == '/' || c == '\\' || c == '\0')
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_string_checked_accepts_plain_user_ids() {
        let id = Id::from_string_checked("rob").unwrap();
        assert_eq!(id.as_str(), "rob");
    }

    #[test]
    fn from_string_checked_rejects_unsafe_values() {
        assert!(Id::from_string_checked("../escape").is_err());
        assert!(Id::from_string_checked("..").is_err());
        assert!(Id::from_string_checked(".").is_err());
        assert!(Id::from_string_checked("").is_err());
        assert!(Id::from_string_checked("foo/bar").is_err());
        assert!(Id::from_string_checked("foo\\bar").is_err());
        assert!(Id::from_string_checked("bad\0id").is_err());
    }

    #[test]
    fn ids_order_lexically() {
        let mut ids = vec![Id::from("b"), Id::from("a")];
        ids.sort();
        assert_eq!(ids, vec![Id::from("a"), Id::from("b")]);
    }
}
