//! PKCE (RFC 7636) parameter generation.

use crate::error::OAuth2Result;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use ras_identity_core::redact;
use sha2::{Digest, Sha256};
use std::fmt;

pub const CODE_CHALLENGE_METHOD: &str = "S256";

/// Random bytes behind a code verifier; encodes to 128 characters, the
/// RFC 7636 maximum.
pub const CODE_VERIFIER_BYTES: usize = 96;

/// Random bytes behind a `state` value
pub const STATE_BYTES: usize = 32;

/// Verifier, challenge and CSRF state for one authorization attempt
#[derive(Clone, PartialEq)]
pub struct PkceParams {
    pub code_verifier: String,
    pub code_challenge: String,
    pub state: String,
}

impl fmt::Debug for PkceParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkceParams")
            .field("code_verifier", &redact(&self.code_verifier))
            .field("code_challenge", &self.code_challenge)
            .field("state", &self.state)
            .finish()
    }
}

/// Fill `byte_length` bytes from the operating system's secure random
/// source and encode them as base64url without padding.
///
/// Fails rather than falling back to a weaker generator.
pub fn generate_random_string(byte_length: usize) -> OAuth2Result<String> {
    let mut bytes = vec![0u8; byte_length];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// `BASE64URL(SHA256(verifier))` without padding
pub fn compute_code_challenge(code_verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code_verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Generate a fresh, independent verifier/challenge/state triple
pub fn generate_pkce_params() -> OAuth2Result<PkceParams> {
    let code_verifier = generate_random_string(CODE_VERIFIER_BYTES)?;
    let code_challenge = compute_code_challenge(&code_verifier);
    let state = generate_random_string(STATE_BYTES)?;

    Ok(PkceParams {
        code_verifier,
        code_challenge,
        state,
    })
}
