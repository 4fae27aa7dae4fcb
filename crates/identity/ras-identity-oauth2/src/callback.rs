//! Callback validation.
//!
//! A callback moves a session's pending attempt into exactly one terminal
//! outcome. The checks run in a fixed order:
//!
//! 1. a provider `error` ends the attempt, whatever else is present;
//! 2. the session must have a pending attempt;
//! 3. the attempt must be within its TTL;
//! 4. `state` must match the attempt, compared in constant time;
//! 5. only then is the attempt removed and the code handed on.
//!
//! Expiry is checked before `state` so the two failures stay distinguishable
//! in diagnostics.

use crate::config::StateMismatchPolicy;
use crate::error::{OAuth2Error, OAuth2Result};
use crate::pending::PendingAuthorizationStore;
use ras_identity_core::redact;
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

/// Query parameters of the provider's redirect back to us
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Code and verifier ready for the token exchange
#[derive(Clone, PartialEq)]
pub struct ValidatedCallback {
    pub code: String,
    pub code_verifier: String,
}

impl fmt::Debug for ValidatedCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedCallback")
            .field("code", &redact(&self.code))
            .field("code_verifier", &redact(&self.code_verifier))
            .finish()
    }
}

/// Terminal outcome of validating one callback
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    Validated(ValidatedCallback),
    /// No login was started for this session, or it was already used
    NoPending,
    Expired,
    StateMismatch,
    /// State matched but the provider sent no code
    MissingCode,
    /// The provider refused, or the user declined consent
    ProviderError {
        error: String,
        description: Option<String>,
    },
}

impl CallbackOutcome {
    pub fn is_validated(&self) -> bool {
        matches!(self, CallbackOutcome::Validated(_))
    }

    /// Turn every outcome except `Validated` into its error
    pub fn into_result(self) -> OAuth2Result<ValidatedCallback> {
        match self {
            CallbackOutcome::Validated(validated) => Ok(validated),
            CallbackOutcome::NoPending => Err(OAuth2Error::NoPendingAuthorization),
            CallbackOutcome::Expired => Err(OAuth2Error::ExpiredAuthorization),
            CallbackOutcome::StateMismatch => Err(OAuth2Error::StateMismatch),
            CallbackOutcome::MissingCode => Err(OAuth2Error::MissingAuthorizationCode),
            CallbackOutcome::ProviderError { error, description } => {
                Err(OAuth2Error::ProviderError { error, description })
            }
        }
    }
}

/// Checks inbound callbacks against the session's pending attempt
#[derive(Clone)]
pub struct CallbackValidator {
    pending: PendingAuthorizationStore,
    state_mismatch_policy: StateMismatchPolicy,
}

impl CallbackValidator {
    pub fn new(pending: PendingAuthorizationStore, state_mismatch_policy: StateMismatchPolicy) -> Self {
        Self {
            pending,
            state_mismatch_policy,
        }
    }

    /// Validate a callback for `session_id`.
    ///
    /// Protocol failures are returned as outcomes; `Err` is reserved for
    /// session storage failures.
    pub async fn validate(
        &self,
        session_id: &str,
        params: &CallbackParams,
    ) -> OAuth2Result<CallbackOutcome> {
        if let Some(error) = &params.error {
            // A denied authorization is not resumable
            self.pending.discard(session_id).await?;
            info!("Provider returned error on callback: {}", error);
            return Ok(CallbackOutcome::ProviderError {
                error: error.clone(),
                description: params.error_description.clone(),
            });
        }

        let pending = match self.pending.consume_pending_authorization(session_id).await {
            Ok(pending) => pending,
            Err(OAuth2Error::NoPendingAuthorization) => {
                debug!("Callback received without a pending authorization");
                return Ok(CallbackOutcome::NoPending);
            }
            Err(OAuth2Error::ExpiredAuthorization) => return Ok(CallbackOutcome::Expired),
            Err(e) => return Err(e),
        };

        let supplied_state = params.state.as_deref().unwrap_or_default();
        let state_matches: bool = supplied_state
            .as_bytes()
            .ct_eq(pending.state.as_bytes())
            .into();
        if !state_matches {
            warn!(
                "OAuth2 callback state mismatch (possible CSRF); pending attempt {}",
                match self.state_mismatch_policy {
                    StateMismatchPolicy::Preserve => "kept",
                    StateMismatchPolicy::Discard => "discarded",
                }
            );
            if self.state_mismatch_policy == StateMismatchPolicy::Discard {
                self.pending
                    .discard_attempt(session_id, &pending.state)
                    .await?;
            }
            return Ok(CallbackOutcome::StateMismatch);
        }

        // Removal is the one-time-use gate: a concurrent callback for the
        // same attempt loses here
        if !self
            .pending
            .discard_attempt(session_id, &pending.state)
            .await?
        {
            debug!("Pending authorization already consumed by another callback");
            return Ok(CallbackOutcome::NoPending);
        }

        match params.code.as_deref().filter(|code| !code.is_empty()) {
            Some(code) => Ok(CallbackOutcome::Validated(ValidatedCallback {
                code: code.to_string(),
                code_verifier: pending.code_verifier,
            })),
            None => {
                warn!("OAuth2 callback with valid state but no authorization code");
                Ok(CallbackOutcome::MissingCode)
            }
        }
    }
}
