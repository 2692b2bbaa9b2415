use thiserror::Error;

use crate::domain::slug::SlugError;

/// Failures surfaced by content drivers and the page service.
///
/// Cache-layer failures (including integrity check failures) are absorbed at
/// the cache boundary and never reach this type.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("page `{slug}` not found")]
    NotFound { slug: String },
    #[error("storage unavailable: {message}")]
    StorageUnavailable { message: String },
    #[error("validation failed for `{field}`: {reason}")]
    Validation { field: &'static str, reason: String },
}

impl ContentError {
    pub fn not_found(slug: impl Into<String>) -> Self {
        Self::NotFound { slug: slug.into() }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::StorageUnavailable {
            message: message.into(),
        }
    }

    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<SlugError> for ContentError {
    fn from(err: SlugError) -> Self {
        Self::Validation {
            field: "slug",
            reason: err.to_string(),
        }
    }
}
