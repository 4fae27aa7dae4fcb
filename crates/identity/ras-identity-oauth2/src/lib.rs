//! OAuth2 Authorization Code flow with PKCE, for a relying party.
//!
//! This crate implements the client side of the flow against a single
//! provider:
//!
//! - [`generate_pkce_params`] creates the verifier, S256 challenge and `state`
//! - [`build_authorization_url`] builds the browser redirect
//! - [`PendingAuthorizationStore`] binds one in-flight attempt to a session
//! - [`CallbackValidator`] decides the outcome of the provider's redirect
//! - [`OAuth2Client`] redeems the code and fetches the user's claims
//! - [`OAuth2Flow`] wires these to a [`SessionStore`] and completes the login
//!
//! Sessions are stored through the [`SessionStore`] capability from
//! `ras-identity-session`, so any backend with per-key atomic updates works.

mod callback;
mod client;
mod config;
mod error;
mod flow;
mod pending;
mod pkce;
mod request;


pub use callback::{CallbackOutcome, CallbackParams, CallbackValidator, ValidatedCallback};
pub use client::OAuth2Client;
pub use config::{OAuth2Settings, ProviderConfig, StateMismatchPolicy};
pub use config::{
    ENV_AUTHORIZATION_ENDPOINT, ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_REDIRECT_URI, ENV_SCOPE,
    ENV_TOKEN_ENDPOINT, ENV_USERINFO_ENDPOINT,
};
pub use error::{OAuth2Error, OAuth2Result};
pub use flow::{LoginRedirect, OAuth2Flow};
pub use pending::{PendingAuthorization, PendingAuthorizationStore};
pub use pkce::{
    CODE_CHALLENGE_METHOD, PkceParams, compute_code_challenge, generate_pkce_params,
    generate_random_string,
};
pub use request::build_authorization_url;

// Re-export common types for convenience
pub use ras_identity_core::{AuthenticatedSession, IdentityClaims, SessionUser, TokenSet};
pub use ras_identity_session::{InMemorySessionStore, SessionStore};
