//! The full login flow for one relying party.

use crate::callback::{CallbackParams, CallbackValidator};
use crate::client::OAuth2Client;
use crate::config::{OAuth2Settings, ProviderConfig};
use crate::error::OAuth2Result;
use crate::pending::PendingAuthorizationStore;
use crate::request::build_authorization_url;
use ras_identity_core::AuthenticatedSession;
use ras_identity_session::{SessionMaterializer, SessionStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// Where to send the browser to start a login
#[derive(Debug, Clone, Serialize)]
pub struct LoginRedirect {
    pub url: String,
    pub state: String,
}

/// Ties the protocol pieces together over a shared session store.
///
/// Cheap to clone; share one instance across request handlers.
#[derive(Clone)]
pub struct OAuth2Flow {
    config: Arc<ProviderConfig>,
    client: OAuth2Client,
    pending: PendingAuthorizationStore,
    validator: CallbackValidator,
    materializer: SessionMaterializer,
}

impl OAuth2Flow {
    pub fn new(
        config: ProviderConfig,
        settings: OAuth2Settings,
        sessions: Arc<dyn SessionStore>,
    ) -> OAuth2Result<Self> {
        let client = OAuth2Client::new(settings.http_timeout_seconds)?;
        Ok(Self::with_client(config, settings, sessions, client))
    }

    pub fn with_client(
        config: ProviderConfig,
        settings: OAuth2Settings,
        sessions: Arc<dyn SessionStore>,
        client: OAuth2Client,
    ) -> Self {
        let pending = PendingAuthorizationStore::new(sessions.clone(), settings.pending_ttl_seconds);
        let validator = CallbackValidator::new(pending.clone(), settings.state_mismatch_policy);

        Self {
            config: Arc::new(config),
            client,
            pending,
            validator,
            materializer: SessionMaterializer::new(sessions),
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn pending_store(&self) -> &PendingAuthorizationStore {
        &self.pending
    }

    /// Start a login for `session_id`, replacing any attempt in flight
    #[instrument(skip(self, session_id))]
    pub async fn begin_login(&self, session_id: &str) -> OAuth2Result<LoginRedirect> {
        let params = self.pending.begin_authorization(session_id).await?;
        let url = build_authorization_url(&self.config, &params.code_challenge, &params.state);

        info!("Starting OAuth2 login");
        Ok(LoginRedirect {
            url: url.to_string(),
            state: params.state,
        })
    }

    /// Validate the provider's redirect, redeem the code, and authenticate
    /// the session.
    ///
    /// Every protocol failure is returned as its [`OAuth2Error`] variant.
    ///
    /// [`OAuth2Error`]: crate::OAuth2Error
    #[instrument(skip(self, session_id, params))]
    pub async fn handle_callback(
        &self,
        session_id: &str,
        params: &CallbackParams,
    ) -> OAuth2Result<AuthenticatedSession> {
        let validated = self
            .validator
            .validate(session_id, params)
            .await?
            .into_result()?;

        let tokens = self
            .client
            .exchange_code_for_tokens(&self.config, &validated.code, &validated.code_verifier)
            .await?;

        let identity = self
            .client
            .fetch_identity(&self.config, &tokens.access_token)
            .await?;

        let session = self
            .materializer
            .complete_login(session_id, tokens, identity)
            .await?;

        Ok(session)
    }

    pub async fn current_session(
        &self,
        session_id: &str,
    ) -> OAuth2Result<Option<AuthenticatedSession>> {
        Ok(self.materializer.current_session(session_id).await?)
    }

    /// Re-key a session after login; see [`SessionMaterializer::rotate`]
    pub async fn rotate_session(&self, old_id: &str, new_id: &str) -> OAuth2Result<bool> {
        Ok(self.materializer.rotate(old_id, new_id).await?)
    }

    pub async fn logout(&self, session_id: &str) -> OAuth2Result<()> {
        self.materializer.logout(session_id).await?;
        info!("User logged out");
        Ok(())
    }
}
