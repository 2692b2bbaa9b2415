//! URL-safe page identifiers.
//!
//! A [`Slug`] is the storage key for a page: validated on construction so the
//! file driver can use it as a path component without further checks.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Slug(String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug must not be empty")]
    Empty,
    #[error("slug contains invalid character `{0}`")]
    InvalidCharacter(char),
}

impl Slug {
    /// Validate a raw string as a slug.
    ///
    /// Allowed characters are ASCII alphanumerics, `-` and `_`; anything else
    /// (separators, dots, whitespace) is rejected so a slug can never escape
    /// the content root when used as a file name.
    pub fn new(value: impl Into<String>) -> Result<Self, SlugError> {
        let raw = value.into();
        if raw.trim().is_empty() {
            return Err(SlugError::Empty);
        }
        if let Some(ch) = raw
            .chars()
            .find(|ch| !(ch.is_ascii_alphanumeric() || *ch == '-' || *ch == '_'))
        {
            return Err(SlugError::InvalidCharacter(ch));
        }
        Ok(Self(raw))
    }

    /// Normalize arbitrary text (a title, say) into a valid slug.
    pub fn from_title(title: &str) -> Result<Self, SlugError> {
        Self::new(slug::slugify(title))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for Slug {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Slug::new(raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_url_safe_identifiers() {
        for raw in ["about", "systems-handbook", "release_notes", "v2"] {
            assert!(Slug::new(raw).is_ok(), "{raw} should be a valid slug");
        }
    }

    #[test]
    fn rejects_path_traversal_material() {
        assert_eq!(Slug::new(""), Err(SlugError::Empty));
        assert_eq!(Slug::new("   "), Err(SlugError::Empty));
        assert_eq!(Slug::new("a/b"), Err(SlugError::InvalidCharacter('/')));
        assert_eq!(Slug::new(".."), Err(SlugError::InvalidCharacter('.')));
        assert_eq!(Slug::new("hello world"), Err(SlugError::InvalidCharacter(' ')));
    }

    #[test]
    fn slugifies_titles() {
        let slug = Slug::from_title("Release Notes: Q3 2026!").expect("slugified");
        assert_eq!(slug.as_str(), "release-notes-q3-2026");
    }

    #[test]
    fn deserializes_with_validation() {
        let ok: Result<Slug, _> = serde_json::from_str("\"about\"");
        assert!(ok.is_ok());
        let bad: Result<Slug, _> = serde_json::from_str("\"../etc\"");
        assert!(bad.is_err());
    }
}
