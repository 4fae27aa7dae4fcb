//! Outbound calls to the provider's token and userinfo endpoints.

use crate::config::ProviderConfig;
use crate::error::{OAuth2Error, OAuth2Result};
use ras_identity_core::{IdentityClaims, TokenSet};
use reqwest::Client;
use reqwest::header::ACCEPT;
use std::time::Duration;
use tracing::{debug, error, info};

/// HTTP client for the back-channel half of the flow.
///
/// Neither call is retried: an authorization code can only be redeemed once.
#[derive(Clone)]
pub struct OAuth2Client {
    http_client: Client,
}

impl OAuth2Client {
    pub fn new(http_timeout_seconds: u64) -> OAuth2Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(http_timeout_seconds))
            .build()?;

        Ok(Self { http_client })
    }

    /// Use a preconfigured `reqwest` client, e.g. one with a proxy
    pub fn with_http_client(http_client: Client) -> Self {
        Self { http_client }
    }

    /// Redeem an authorization code together with its PKCE verifier
    pub async fn exchange_code_for_tokens(
        &self,
        config: &ProviderConfig,
        code: &str,
        code_verifier: &str,
    ) -> OAuth2Result<TokenSet> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("client_id", config.client_id.as_str()),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("code_verifier", code_verifier),
        ];
        if let Some(secret) = &config.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        let response = self
            .http_client
            .post(config.token_endpoint.clone())
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        // Error bodies are not guaranteed to be JSON
        let body = response.text().await?;

        if !status.is_success() {
            error!("Token exchange failed with status {}: {}", status, body);
            return Err(OAuth2Error::TokenExchangeFailed {
                status: status.as_u16(),
                body,
            });
        }

        let tokens: TokenSet = serde_json::from_str(&body)
            .map_err(|e| OAuth2Error::InvalidTokenResponse(e.to_string()))?;

        info!(
            "Successfully exchanged code for tokens: {}",
            tokens.redacted_access_token()
        );
        Ok(tokens)
    }

    /// Fetch the user's claims with a bearer access token
    pub async fn fetch_identity(
        &self,
        config: &ProviderConfig,
        access_token: &str,
    ) -> OAuth2Result<IdentityClaims> {
        let response = self
            .http_client
            .get(config.userinfo_endpoint.clone())
            .header(ACCEPT, "application/json")
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("User info request failed with status {}: {}", status, body);
            return Err(OAuth2Error::IdentityFetchFailed {
                status: status.as_u16(),
                body,
            });
        }

        let identity: IdentityClaims = serde_json::from_str(&body)
            .map_err(|e| OAuth2Error::InvalidIdentityResponse(e.to_string()))?;

        debug!(
            "Successfully retrieved user info for subject: {}",
            identity.subject
        );
        Ok(identity)
    }
}
