use crate::api::client::PollsClient;
use crate::error::{ConfigError, LoadError};
use crate::polls::PollPage;
use crate::realtime::{ChannelManager, WsConnector};
use url::Url;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8000";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub api_base_url: Url,
    pub ws_base_url: Url,
    pub user_id: Option<String>,
}

impl ClientConfig {
    /// Reads `POLL_API_URL`, `POLL_WS_URL` and `POLL_USER_ID`, after loading
    /// a `.env` file if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |var: &'static str, default: &str| -> Result<Url, ConfigError> {
            let raw = lookup(var).unwrap_or_else(|| default.to_string());
            Url::parse(&raw).map_err(|source| ConfigError::InvalidUrl { var, source })
        };

        Ok(Self {
            api_base_url: read("POLL_API_URL", DEFAULT_API_URL)?,
            ws_base_url: read("POLL_WS_URL", DEFAULT_WS_URL)?,
            user_id: lookup("POLL_USER_ID").filter(|id| !id.trim().is_empty()),
        })
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: ClientConfig,
    pub polls: PollsClient,
}

impl AppState {
    pub fn new(config: ClientConfig) -> Result<Self, LoadError> {
        let polls = PollsClient::new(config.api_base_url.clone())?;
        Ok(AppState { config, polls })
    }

    /// A fresh poll page with its own realtime channel.
    pub fn poll_page(&self) -> PollPage<WsConnector> {
        let connector = WsConnector::new(self.config.ws_base_url.clone());
        PollPage::new(ChannelManager::new(connector), self.config.user_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_local_server() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_base_url.as_str(), "http://127.0.0.1:8000/");
        assert_eq!(config.ws_base_url.as_str(), "ws://127.0.0.1:8000/");
        assert_eq!(config.user_id, None);
    }

    #[test]
    fn env_values_override_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("POLL_API_URL", "https://polls.example/api"),
            ("POLL_WS_URL", "wss://polls.example"),
            ("POLL_USER_ID", "user-42"),
        ]))
        .unwrap();

        assert_eq!(config.api_base_url.host_str(), Some("polls.example"));
        assert_eq!(config.ws_base_url.scheme(), "wss");
        assert_eq!(config.user_id.as_deref(), Some("user-42"));
    }

    #[test]
    fn blank_user_id_is_absent() {
        let config = ClientConfig::from_lookup(lookup(&[("POLL_USER_ID", "  ")])).unwrap();
        assert_eq!(config.user_id, None);
    }

    #[test]
    fn bad_url_names_the_variable() {
        let err = ClientConfig::from_lookup(lookup(&[("POLL_WS_URL", "not a url")])).unwrap_err();
        let ConfigError::InvalidUrl { var, .. } = err;
        assert_eq!(var, "POLL_WS_URL");
    }
}
