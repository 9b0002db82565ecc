//! Process configuration, read once at startup from the environment.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_API_URL: &str = "https://api.aimlapi.com/v1/chat/completions";
pub const DEFAULT_IMAGE_API_URL: &str = "https://api.aimlapi.com/v1/images/generations";
pub const DEFAULT_COMPLETION_MODEL: &str = "openai/gpt-5-chat-latest";
pub const DEFAULT_IMAGE_MODEL: &str = "openai/gpt-image-1";
const DEFAULT_DATABASE_PATH: &str = "legacy_linter.db";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_CORS_ORIGINS: &str = "http://localhost:3000";
const DEFAULT_LOG_DIR: &str = "logs";

/// Which master prompt the orchestrator sends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Always ask for a full modernization package
    Direct,
    /// Let the model classify the request and answer in kind
    Classifying,
}

impl PromptMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptMode::Direct => "direct",
            PromptMode::Classifying => "classifying",
        }
    }

    pub fn from_str(s: &str) -> Option<PromptMode> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Some(PromptMode::Direct),
            "classifying" => Some(PromptMode::Classifying),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub image_api_url: String,
    pub completion_model: String,
    pub image_model: String,
    pub mode: PromptMode,
    pub database_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub cors_origins: Vec<String>,
    pub log_dir: PathBuf,
}

impl AppConfig {
    /// Load `.env` (if any) and read the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_vars(&std::env::vars().collect())
    }

    /// Build a config from an explicit variable map
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mode = match get("ORCHESTRATOR_MODE") {
            Some(raw) => PromptMode::from_str(&raw).ok_or(ConfigError::InvalidMode(raw))?,
            None => PromptMode::Direct,
        };

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddr(bind_raw.clone()))?;

        let cors_origins = get("CORS_ORIGINS")
            .unwrap_or_else(|| DEFAULT_CORS_ORIGINS.to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(Self {
            api_key: get("API_KEY"),
            api_url: get("API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            image_api_url: get("IMAGE_API_URL").unwrap_or_else(|| DEFAULT_IMAGE_API_URL.to_string()),
            completion_model: get("COMPLETION_MODEL")
                .unwrap_or_else(|| DEFAULT_COMPLETION_MODEL.to_string()),
            image_model: get("IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            mode,
            database_path: PathBuf::from(
                get("DATABASE_PATH").unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string()),
            ),
            bind_addr,
            cors_origins,
            log_dir: PathBuf::from(get("LOG_DIR").unwrap_or_else(|| DEFAULT_LOG_DIR.to_string())),
        })
    }
}
