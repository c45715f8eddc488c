use std::fmt::Debug;

use tracing::warn;

use crate::client::{ApiClientError, HttpResponse};

const BODY_MAX_LENGTH: usize = 1024;

/// Post-response hook turning responses into errors.
pub trait ErrorStrategy: Debug + Send + Sync {
    /// Inspects `response`.
    ///
    /// # Errors
    ///
    /// Returns the error the response stands for.
    fn apply(&self, response: &HttpResponse) -> Result<(), ApiClientError>;
}

/// Rejects any `>= 400` status with [`ApiClientError::UnexpectedStatusCode`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusErrorStrategy;

impl ErrorStrategy for StatusErrorStrategy {
    fn apply(&self, response: &HttpResponse) -> Result<(), ApiClientError> {
        let status = response.status();
        if !(status.is_client_error() || status.is_server_error()) {
            return Ok(());
        }

        let text = response.text();
        let body = match text.char_indices().nth(BODY_MAX_LENGTH) {
            Some((cut, _)) => format!("{}...", text.get(..cut).unwrap_or_default()),
            None => text.into_owned(),
        };
        warn!(status = status.as_u16(), "error status received");

        Err(ApiClientError::UnexpectedStatusCode {
            status_code: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;

    #[test]
    fn should_accept_success_and_redirect() {
        assert!(StatusErrorStrategy.apply(&HttpResponse::new(StatusCode::OK)).is_ok());
        assert!(StatusErrorStrategy.apply(&HttpResponse::new(StatusCode::FOUND)).is_ok());
    }

    #[test]
    fn should_reject_error_status() {
        let response = HttpResponse::new(StatusCode::NOT_FOUND).with_body("no such user");

        let error = StatusErrorStrategy.apply(&response).expect_err("404");

        insta::assert_snapshot!(error.to_string(), @"Unexpected status code 404: no such user");
    }

    #[test]
    fn should_truncate_long_bodies() {
        let response =
            HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR).with_body("x".repeat(2000));

        let error = StatusErrorStrategy.apply(&response).expect_err("500");

        match error {
            ApiClientError::UnexpectedStatusCode { body, .. } => {
                assert_eq!(body.len(), BODY_MAX_LENGTH + 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
