use crate::listener::ListenerSpec;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;

pub const DEFAULT_MAIN_LISTEN: &str = "127.0.0.1:8080";
pub const DEFAULT_FAILOVER_LISTEN: &str = "127.0.0.1:8081";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    #[serde(rename = "mainListen", default, skip_serializing_if = "Option::is_none")]
    pub main_listen: Option<String>,
    /// Older config files call the main listener `listen`. `mainListen` wins
    /// when both are present.
    #[serde(rename = "listen", default, skip_serializing_if = "Option::is_none")]
    pub legacy_listen: Option<String>,
    #[serde(rename = "failOverListen", default = "default_failover_listen")]
    pub failover_listen: String,
}

fn default_failover_listen() -> String {
    DEFAULT_FAILOVER_LISTEN.to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            main_listen: None,
            legacy_listen: None,
            failover_listen: default_failover_listen(),
        }
    }
}

impl BackendConfig {
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config: BackendConfig = serde_json::from_str(&content)?;
        if let (Some(main), Some(legacy)) = (&config.main_listen, &config.legacy_listen) {
            if main != legacy {
                warn!(
                    "Config sets both mainListen ({}) and listen ({}), using mainListen",
                    main, legacy
                );
            }
        }
        Ok(config)
    }

    /// Like [`from_file`](Self::from_file), but any failure means defaults.
    pub fn load_or_default(path: &str) -> Self {
        Self::from_file(path).unwrap_or_else(|e| {
            warn!("Error loading config file {}, using default values: {}", path, e);
            Self::default()
        })
    }

    pub fn main_listen(&self) -> &str {
        self.main_listen
            .as_deref()
            .or(self.legacy_listen.as_deref())
            .unwrap_or(DEFAULT_MAIN_LISTEN)
    }

    pub fn main_target(&self) -> ListenerSpec {
        listen_target(self.main_listen(), DEFAULT_MAIN_LISTEN)
    }

    pub fn failover_target(&self) -> ListenerSpec {
        listen_target(&self.failover_listen, DEFAULT_FAILOVER_LISTEN)
    }
}

/// Parse `raw`, falling back to `default` with a warning.
pub fn listen_target(raw: &str, default: &str) -> ListenerSpec {
    raw.parse().unwrap_or_else(|e| {
        warn!("{}, using {}", e, default);
        // The defaults are well-formed constants.
        default
            .parse()
            .unwrap_or_else(|_| ListenerSpec::new("127.0.0.1", 8080))
    })
}
