//! Service configuration files.
//!
//! - `server.yaml`: debug flag, request timeout and the paths of the
//!   other files
//! - `llm.yaml`: credentials for every chat model a pipeline may name
//!
//! Values resolve as command line flag > file > built-in default. A missing
//! `server.yaml` is not an error; a missing `llm.yaml` is.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use llm_client::{ChatClient, OpenAiClient};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, ServiceError};

/// Default per-request deadline in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub debug: bool,
    pub request_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            debug: false,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub users: PathBuf,
    pub pipelines: PathBuf,
    pub llm: PathBuf,
    pub history: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            users: PathBuf::from("configs/users.yaml"),
            pipelines: PathBuf::from("configs/pipelines.json"),
            llm: PathBuf::from("configs/llm.yaml"),
            history: PathBuf::from("data/history.jsonl"),
        }
    }
}

/// Contents of `server.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub paths: PathsConfig,
}

/// Values given on the command line; `None` keeps the file's value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub debug: bool,
    pub users: Option<PathBuf>,
    pub pipelines: Option<PathBuf>,
    pub llm: Option<PathBuf>,
    pub history: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Load `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(yaml) => {
                info!("Loaded server config from {}", path.display());
                Self::from_yaml(&yaml).map_err(|e| ServiceError::config(path, e))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Server config {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(ServiceError::config(path, e)),
        }
    }

    /// Apply command line values on top of the loaded file (builder pattern).
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        // A flag can turn debug on but never off.
        self.server.debug |= overrides.debug;
        if let Some(users) = overrides.users {
            self.paths.users = users;
        }
        if let Some(pipelines) = overrides.pipelines {
            self.paths.pipelines = pipelines;
        }
        if let Some(llm) = overrides.llm {
            self.paths.llm = llm;
        }
        if let Some(history) = overrides.history {
            self.paths.history = history;
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }
}

/// One entry of `llm.yaml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmCredentials {
    /// Full chat completion URL
    pub chat_endpoint: String,
    pub api_key: String,
    pub model: String,
}

/// Contents of `llm.yaml`: config key → credentials.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmGlobalConfig {
    #[serde(default)]
    pub llms: HashMap<String, LlmCredentials>,
}

impl LlmGlobalConfig {
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = fs::read_to_string(path).map_err(|e| ServiceError::config(path, e))?;
        let config = Self::from_yaml(&yaml).map_err(|e| ServiceError::config(path, e))?;
        info!("Loaded {} LLM configs from {}", config.llms.len(), path.display());
        Ok(config)
    }

    /// Create one client per configured key.
    pub fn build_clients(&self) -> Result<HashMap<String, Arc<dyn ChatClient>>> {
        self.llms
            .iter()
            .map(|(key, creds)| -> Result<(String, Arc<dyn ChatClient>)> {
                let client = OpenAiClient::new(&creds.chat_endpoint, &creds.api_key, &creds.model)?;
                Ok((key.clone(), Arc::new(client) as Arc<dyn ChatClient>))
            })
            .collect()
    }
}
