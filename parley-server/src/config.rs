use std::path::Path;

use serde::{Deserialize, Serialize};

use parley_core::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Reported as `model` when a request does not name one.
    pub model_name: String,
    /// `max_tokens` applied when a request omits it.
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: usize,
    #[serde(default)]
    pub verbose: bool,
    /// Requests that may wait for the engine before submitters back off.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_max_tokens() -> usize {
    128
}
fn default_queue_depth() -> usize {
    1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            model_name: "parley".to_string(),
            default_max_tokens: default_max_tokens(),
            verbose: false,
            queue_depth: default_queue_depth(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
