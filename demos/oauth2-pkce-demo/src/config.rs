use anyhow::{Context, Result};
use ras_identity_oauth2::{OAuth2Settings, ProviderConfig};

/// Configuration for the demo server
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_host: String,
    pub server_port: u16,
    /// Lifetime of a browser session in the store
    pub session_ttl_seconds: u64,
    pub provider: ProviderConfig,
    pub oauth2: OAuth2Settings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = ProviderConfig::from_lookup(&lookup)
            .context("Invalid OAuth2 provider configuration")?;

        Ok(Self {
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            server_port: lookup("SERVER_PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            session_ttl_seconds: lookup("SESSION_TTL_SECONDS")
                .unwrap_or_else(|| "86400".to_string())
                .parse()
                .context("SESSION_TTL_SECONDS must be a number of seconds")?,
            provider,
            oauth2: OAuth2Settings::default(),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.session_ttl_seconds, 86400);
        assert_eq!(config.provider.client_id, "demo-client-id");
        assert_eq!(config.oauth2.pending_ttl_seconds, 600);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("SERVER_HOST", "127.0.0.1"),
            ("SERVER_PORT", "8080"),
            ("OAUTH_CLIENT_ID", "my-app"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr(), "127.0.0.1:8080");
        assert_eq!(config.provider.client_id, "my-app");
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[("SERVER_PORT", "http")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_provider_url_is_rejected() {
        let result = AppConfig::from_lookup(lookup_from(&[("OAUTH_TOKEN_URL", "not a url")]));
        let err = result.unwrap_err();
        assert!(format!("{:#}", err).contains("token_endpoint"));
    }
}
