//! OAuth2 error types.

use ras_identity_session::SessionError;
use thiserror::Error;

pub type OAuth2Result<T> = Result<T, OAuth2Error>;

#[derive(Debug, Error)]
pub enum OAuth2Error {
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("No pending authorization for this session")]
    NoPendingAuthorization,

    #[error("Pending authorization expired")]
    ExpiredAuthorization,

    #[error("Invalid state parameter")]
    StateMismatch,

    #[error("Missing authorization code")]
    MissingAuthorizationCode,

    #[error("Provider error: {error}")]
    ProviderError {
        error: String,
        description: Option<String>,
    },

    // Display omits the body; it is logged server-side only.
    #[error("Token exchange failed with HTTP status {status}")]
    TokenExchangeFailed { status: u16, body: String },

    #[error("Identity request failed with HTTP status {status}")]
    IdentityFetchFailed { status: u16, body: String },

    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    #[error("Invalid identity response: {0}")]
    InvalidIdentityResponse(String),

    #[error("HTTP transport error: {0}")]
    TransportError(#[from] reqwest::Error),

    #[error("Secure random source unavailable: {0}")]
    RandomSourceUnavailable(#[from] rand::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Session error: {0}")]
    SessionError(#[from] SessionError),
}

impl OAuth2Error {
    /// Message that is safe to show to the end user
    pub fn user_message(&self) -> String {
        match self {
            OAuth2Error::NoPendingAuthorization => {
                "No sign-in is in progress for this session. Please start again.".to_string()
            }
            OAuth2Error::ExpiredAuthorization => {
                "Your sign-in attempt expired. Please try again.".to_string()
            }
            OAuth2Error::StateMismatch => {
                "The sign-in response could not be verified. Please try again.".to_string()
            }
            OAuth2Error::MissingAuthorizationCode => {
                "The sign-in response was incomplete. Please try again.".to_string()
            }
            OAuth2Error::ProviderError { error, .. } => {
                format!("Sign-in was not completed: {}", error)
            }
            OAuth2Error::TokenExchangeFailed { .. }
            | OAuth2Error::IdentityFetchFailed { .. }
            | OAuth2Error::InvalidTokenResponse(_)
            | OAuth2Error::InvalidIdentityResponse(_) => {
                "Authentication with the identity provider failed.".to_string()
            }
            OAuth2Error::TransportError(_) => {
                "The identity provider could not be reached. Please try again.".to_string()
            }
            OAuth2Error::ConfigError(_) => "Sign-in is not configured correctly.".to_string(),
            OAuth2Error::RandomSourceUnavailable(_)
            | OAuth2Error::UrlError(_)
            | OAuth2Error::SerializationError(_)
            | OAuth2Error::SessionError(_) => "An internal error occurred.".to_string(),
        }
    }

    /// Whether a user-initiated retry of the whole login may succeed.
    ///
    /// Never retry the token exchange itself: authorization codes are single-use.
    pub fn is_transient(&self) -> bool {
        matches!(self, OAuth2Error::TransportError(_))
    }
}
