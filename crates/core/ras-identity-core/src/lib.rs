//! Core identity types shared by the session and OAuth2 crates.
//!
//! These are the records that flow out of an authorization: the claims a
//! provider reports about a user, the credentials it issued, and the
//! application-level session built from both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Maximum number of characters of a secret that may appear in diagnostics.
pub const REDACTED_PREFIX_LEN: usize = 20;

/// Redact a secret for logging or display.
///
/// At most [`REDACTED_PREFIX_LEN`] characters are kept, and never more than
/// half of the secret, so short values are not revealed in full.
pub fn redact(secret: &str) -> String {
    let total = secret.chars().count();
    let keep = REDACTED_PREFIX_LEN.min(total / 2);
    let prefix: String = secret.chars().take(keep).collect();
    format!("{}...", prefix)
}

/// Identity claims returned by a provider's userinfo endpoint.
///
/// The subject is taken from the OpenID Connect `sub` field, falling back to
/// the legacy `id` field, which may be a string or a number. When both are
/// present `sub` wins and `id` is kept in `additional_claims`, alongside
/// every other claim without a dedicated field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawIdentityClaims")]
pub struct IdentityClaims {
    #[serde(rename = "sub")]
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub email_verified: Option<bool>,
    #[serde(flatten)]
    pub additional_claims: HashMap<String, serde_json::Value>,
}

/// Wire shape of a userinfo response before the subject is resolved
#[derive(Deserialize)]
struct RawIdentityClaims {
    #[serde(default)]
    sub: Option<serde_json::Value>,
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
    #[serde(default, deserialize_with = "lenient_bool")]
    email_verified: Option<bool>,
    #[serde(flatten)]
    additional_claims: HashMap<String, serde_json::Value>,
}

fn subject_from(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl TryFrom<RawIdentityClaims> for IdentityClaims {
    type Error = String;

    fn try_from(raw: RawIdentityClaims) -> Result<Self, Self::Error> {
        let RawIdentityClaims {
            sub,
            id,
            email,
            name,
            picture,
            email_verified,
            mut additional_claims,
        } = raw;

        let subject = match (sub.and_then(subject_from), id) {
            (Some(subject), id) => {
                if let Some(id) = id {
                    additional_claims.insert("id".to_string(), id);
                }
                subject
            }
            (None, Some(id)) => subject_from(id)
                .ok_or_else(|| "claim `id` must be a non-empty string or a number".to_string())?,
            (None, None) => return Err("missing subject: expected `sub` or `id`".to_string()),
        };

        Ok(Self {
            subject,
            email,
            name,
            picture,
            email_verified,
            additional_claims,
        })
    }
}

impl IdentityClaims {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            email: None,
            name: None,
            picture: None,
            email_verified: None,
            additional_claims: HashMap::new(),
        }
    }
}

// Some providers send `email_verified` as the string "true"/"false".
fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        String(String),
    }

    let value = match Option::<BoolOrString>::deserialize(deserializer)? {
        Some(BoolOrString::Bool(value)) => Some(value),
        Some(BoolOrString::String(value)) => match value.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        None => None,
    };
    Ok(value)
}

/// Application-level user record stored in an authenticated session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
}

impl From<IdentityClaims> for SessionUser {
    fn from(claims: IdentityClaims) -> Self {
        Self {
            id: claims.subject,
            email: claims.email,
            name: claims.name,
            picture: claims.picture,
            email_verified: claims.email_verified,
        }
    }
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Credentials issued by the token endpoint.
///
/// `Debug` never prints the tokens themselves.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

impl TokenSet {
    /// Access token prefix suitable for display
    pub fn redacted_access_token(&self) -> String {
        redact(&self.access_token)
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &self.redacted_access_token())
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field(
                "refresh_token",
                &self.refresh_token.as_deref().map(redact),
            )
            .field("id_token", &self.id_token.as_deref().map(redact))
            .finish()
    }
}

/// The authenticated state of a browser session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticatedSession {
    pub user: SessionUser,
    pub tokens: TokenSet,
    pub authenticated_at: DateTime<Utc>,
}

impl AuthenticatedSession {
    pub fn new(identity: IdentityClaims, tokens: TokenSet) -> Self {
        Self {
            user: SessionUser::from(identity),
            tokens,
            authenticated_at: Utc::now(),
        }
    }
}
