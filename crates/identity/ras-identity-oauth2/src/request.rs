//! Authorization request construction.

use crate::config::ProviderConfig;
use crate::pkce::CODE_CHALLENGE_METHOD;
use url::Url;

/// Build the URL the browser is redirected to at the start of a login.
///
/// Every parameter is always present, even when its value is empty. Query
/// parameters already on the configured endpoint are kept.
pub fn build_authorization_url(config: &ProviderConfig, code_challenge: &str, state: &str) -> Url {
    let mut url = config.authorization_endpoint.clone();

    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("scope", &config.scope)
        .append_pair("state", state)
        .append_pair("code_challenge", code_challenge)
        .append_pair("code_challenge_method", CODE_CHALLENGE_METHOD);

    url
}
