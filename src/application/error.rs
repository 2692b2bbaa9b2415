use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{domain::error::ContentError, infra::error::InfraError};

/// Structured error detail attached to responses for the logging middleware;
/// the body only ever carries the public message.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Content(ContentError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Content(ContentError::Validation { .. }) => StatusCode::BAD_REQUEST,
            AppError::Content(ContentError::StorageUnavailable { .. }) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Infra(InfraError::Database(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infra(_) | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            AppError::Content(ContentError::NotFound { .. }) => "Page not found",
            AppError::Content(ContentError::Validation { .. }) => "Request could not be processed",
            AppError::Content(ContentError::StorageUnavailable { .. })
            | AppError::Infra(InfraError::Database(_)) => "Service temporarily unavailable",
            AppError::Infra(_) | AppError::Unexpected(_) => "Unexpected error occurred",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, self.public_message()).into_response();
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let err = AppError::from(ContentError::not_found("ghost"));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn validation_maps_to_400() {
        let err = AppError::from(ContentError::validation("slug", "empty"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn storage_unavailable_maps_to_503() {
        let err = AppError::from(ContentError::unavailable("db down"));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn report_collects_the_source_chain() {
        let io = std::io::Error::other("disk on fire");
        let report =
            ErrorReport::from_error("test", StatusCode::INTERNAL_SERVER_ERROR, &io);
        assert_eq!(report.messages, vec!["disk on fire".to_string()]);
    }
}
