//! OAuth2 configuration types.

use crate::error::{OAuth2Error, OAuth2Result};
use std::fmt;
use url::Url;

pub const ENV_CLIENT_ID: &str = "OAUTH_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "OAUTH_CLIENT_SECRET";
pub const ENV_AUTHORIZATION_ENDPOINT: &str = "OAUTH_AUTH_URL";
pub const ENV_TOKEN_ENDPOINT: &str = "OAUTH_TOKEN_URL";
pub const ENV_USERINFO_ENDPOINT: &str = "OAUTH_USERINFO_URL";
pub const ENV_REDIRECT_URI: &str = "OAUTH_REDIRECT_URI";
pub const ENV_SCOPE: &str = "OAUTH_SCOPE";

const DEFAULT_CLIENT_ID: &str = "demo-client-id";
const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://example-oauth-provider.com/oauth/authorize";
const DEFAULT_TOKEN_ENDPOINT: &str = "https://example-oauth-provider.com/oauth/token";
const DEFAULT_USERINFO_ENDPOINT: &str = "https://example-oauth-provider.com/oauth/userinfo";
const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/oauth/callback";
const DEFAULT_SCOPE: &str = "openid profile email";

/// Static configuration of the authorization server this client talks to.
///
/// Loaded once at startup. URL fields are parsed up front, so a
/// `ProviderConfig` always holds absolute http(s) URLs.
#[derive(Clone, PartialEq)]
pub struct ProviderConfig {
    pub client_id: String,
    /// Unused by the PKCE flow; kept for providers that require
    /// confidential-client authentication.
    pub client_secret: Option<String>,
    pub authorization_endpoint: Url,
    pub token_endpoint: Url,
    pub userinfo_endpoint: Url,
    /// Sent exactly as configured; providers compare it byte for byte with
    /// the registered value
    pub redirect_uri: String,
    pub scope: String,
}

impl ProviderConfig {
    /// Build a configuration from string URLs, validating each one
    pub fn new(
        client_id: impl Into<String>,
        authorization_endpoint: &str,
        token_endpoint: &str,
        userinfo_endpoint: &str,
        redirect_uri: &str,
        scope: impl Into<String>,
    ) -> OAuth2Result<Self> {
        let client_id = client_id.into();
        if client_id.trim().is_empty() {
            return Err(OAuth2Error::ConfigError(
                "client_id must not be empty".to_string(),
            ));
        }

        // Validated, but kept as given: parsing would normalise it
        parse_absolute_url("redirect_uri", redirect_uri)?;

        Ok(Self {
            client_id,
            client_secret: None,
            authorization_endpoint: parse_absolute_url(
                "authorization_endpoint",
                authorization_endpoint,
            )?,
            token_endpoint: parse_absolute_url("token_endpoint", token_endpoint)?,
            userinfo_endpoint: parse_absolute_url("userinfo_endpoint", userinfo_endpoint)?,
            redirect_uri: redirect_uri.to_string(),
            scope: scope.into(),
        })
    }

    pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Load from the `OAUTH_*` environment variables, falling back to the
    /// demo defaults for anything unset.
    pub fn from_env() -> OAuth2Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> OAuth2Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Self::new(
            var(ENV_CLIENT_ID, DEFAULT_CLIENT_ID),
            &var(ENV_AUTHORIZATION_ENDPOINT, DEFAULT_AUTHORIZATION_ENDPOINT),
            &var(ENV_TOKEN_ENDPOINT, DEFAULT_TOKEN_ENDPOINT),
            &var(ENV_USERINFO_ENDPOINT, DEFAULT_USERINFO_ENDPOINT),
            &var(ENV_REDIRECT_URI, DEFAULT_REDIRECT_URI),
            var(ENV_SCOPE, DEFAULT_SCOPE),
        )?;

        // Public PKCE clients have no secret; only send one when asked to
        match lookup(ENV_CLIENT_SECRET).filter(|secret| !secret.is_empty()) {
            Some(client_secret) => Ok(config.with_client_secret(client_secret)),
            None => Ok(config),
        }
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("authorization_endpoint", &self.authorization_endpoint.as_str())
            .field("token_endpoint", &self.token_endpoint.as_str())
            .field("userinfo_endpoint", &self.userinfo_endpoint.as_str())
            .field("redirect_uri", &self.redirect_uri)
            .field("scope", &self.scope)
            .finish()
    }
}

fn parse_absolute_url(field: &str, value: &str) -> OAuth2Result<Url> {
    let url = Url::parse(value)
        .map_err(|e| OAuth2Error::ConfigError(format!("{} '{}': {}", field, value, e)))?;

    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(OAuth2Error::ConfigError(format!(
            "{} '{}': expected an absolute http(s) URL",
            field, value
        )));
    }

    Ok(url)
}

/// What to do with the pending authorization when a callback carries the
/// wrong `state`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateMismatchPolicy {
    /// Keep the attempt so the legitimate callback can still complete
    #[default]
    Preserve,
    /// Drop the attempt and force a fresh login
    Discard,
}

/// Protocol tuning shared by all logins
#[derive(Debug, Clone)]
pub struct OAuth2Settings {
    pub pending_ttl_seconds: u64,
    pub http_timeout_seconds: u64,
    pub state_mismatch_policy: StateMismatchPolicy,
}

impl Default for OAuth2Settings {
    fn default() -> Self {
        Self {
            pending_ttl_seconds: 600, // 10 minutes
            http_timeout_seconds: 10,
            state_mismatch_policy: StateMismatchPolicy::Preserve,
        }
    }
}

impl OAuth2Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pending_ttl(mut self, seconds: u64) -> Self {
        self.pending_ttl_seconds = seconds;
        self
    }

    pub fn with_http_timeout(mut self, seconds: u64) -> Self {
        self.http_timeout_seconds = seconds;
        self
    }

    pub fn with_state_mismatch_policy(mut self, policy: StateMismatchPolicy) -> Self {
        self.state_mismatch_policy = policy;
        self
    }
}
