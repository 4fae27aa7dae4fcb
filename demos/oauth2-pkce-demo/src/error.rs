use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ras_identity_oauth2::OAuth2Error;
use serde::Serialize;
use tracing::error;

/// JSON error body returned by every handler
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

/// Handler error: an OAuth2 failure rendered as an HTTP response
#[derive(Debug)]
pub struct AppError(pub OAuth2Error);

impl From<OAuth2Error> for AppError {
    fn from(err: OAuth2Error) -> Self {
        AppError(err)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            OAuth2Error::NoPendingAuthorization
            | OAuth2Error::ExpiredAuthorization
            | OAuth2Error::StateMismatch
            | OAuth2Error::MissingAuthorizationCode
            | OAuth2Error::ProviderError { .. } => StatusCode::BAD_REQUEST,
            OAuth2Error::TokenExchangeFailed { .. }
            | OAuth2Error::IdentityFetchFailed { .. }
            | OAuth2Error::InvalidTokenResponse(_)
            | OAuth2Error::InvalidIdentityResponse(_) => StatusCode::BAD_GATEWAY,
            OAuth2Error::TransportError(_) => StatusCode::SERVICE_UNAVAILABLE,
            OAuth2Error::ConfigError(_)
            | OAuth2Error::RandomSourceUnavailable(_)
            | OAuth2Error::UrlError(_)
            | OAuth2Error::SerializationError(_)
            | OAuth2Error::SessionError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code; provider errors pass through unchanged
    pub fn code(&self) -> &str {
        match &self.0 {
            OAuth2Error::NoPendingAuthorization => "no_pending_authorization",
            OAuth2Error::ExpiredAuthorization => "expired_authorization",
            OAuth2Error::StateMismatch => "state_mismatch",
            OAuth2Error::MissingAuthorizationCode => "missing_code",
            OAuth2Error::ProviderError { error, .. } => error,
            OAuth2Error::TokenExchangeFailed { .. } => "token_exchange_failed",
            OAuth2Error::IdentityFetchFailed { .. } => "identity_fetch_failed",
            OAuth2Error::InvalidTokenResponse(_) | OAuth2Error::InvalidIdentityResponse(_) => {
                "invalid_provider_response"
            }
            OAuth2Error::TransportError(_) => "provider_unavailable",
            _ => "server_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        let error_description = match &self.0 {
            OAuth2Error::ProviderError {
                description: Some(description),
                ..
            } => Some(description.clone()),
            err => Some(err.user_message()),
        };

        let body = Json(ErrorResponse {
            error: self.code().to_string(),
            error_description,
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError(OAuth2Error::StateMismatch).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError(OAuth2Error::TokenExchangeFailed {
                status: 400,
                body: String::new()
            })
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError(OAuth2Error::ConfigError("x".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_provider_error_code_passes_through() {
        let err = AppError(OAuth2Error::ProviderError {
            error: "access_denied".to_string(),
            description: None,
        });
        assert_eq!(err.code(), "access_denied");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
