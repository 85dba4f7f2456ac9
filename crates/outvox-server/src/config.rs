//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Telephony carrier settings.
    #[serde(default)]
    pub carrier: CarrierConfig,

    /// AI realtime session settings.
    #[serde(default)]
    pub ai: AiConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "outvox_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Telephony carrier configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CarrierConfig {
    /// Base URL of the carrier's click-to-call API.
    #[serde(default = "default_carrier_base_url")]
    pub base_url: String,

    /// Carrier API key.
    #[serde(default)]
    pub api_key: String,
}

/// AI realtime session configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    /// Websocket endpoint for the realtime session.
    #[serde(default = "default_ai_endpoint")]
    pub endpoint: String,

    /// AI API key.
    #[serde(default)]
    pub api_key: String,

    /// Model identifier.
    #[serde(default = "default_ai_model")]
    pub model: String,

    /// Cap on pre-ready buffered audio frames per call.
    #[serde(default = "default_buffer_cap")]
    pub buffer_cap: usize,

    /// Seconds to wait for a terminal webhook after a hangup request
    /// before force-finalizing the call.
    #[serde(default = "default_hangup_fallback_secs")]
    pub hangup_fallback_secs: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_carrier_base_url() -> String {
    "https://api-smartflo.tatateleservices.com/v1".to_string()
}

fn default_ai_endpoint() -> String {
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent".to_string()
}

fn default_ai_model() -> String {
    "gemini-2.5-flash-native-audio-preview-09-2025".to_string()
}

fn default_buffer_cap() -> usize {
    outvox_media::DEFAULT_FRAME_CAP
}

fn default_hangup_fallback_secs() -> u64 {
    10
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            base_url: default_carrier_base_url(),
            api_key: String::new(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_ai_endpoint(),
            api_key: String::new(),
            model: default_ai_model(),
            buffer_cap: default_buffer_cap(),
            hangup_fallback_secs: default_hangup_fallback_secs(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `OUTVOX_HOST` overrides `server.host`
/// - `OUTVOX_PORT` overrides `server.port`
/// - `OUTVOX_LOG_LEVEL` overrides `logging.level`
/// - `OUTVOX_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `OUTVOX_CARRIER_BASE_URL` overrides `carrier.base_url`
/// - `OUTVOX_CARRIER_API_KEY` overrides `carrier.api_key`
/// - `OUTVOX_AI_API_KEY` overrides `ai.api_key`
/// - `OUTVOX_AI_MODEL` overrides `ai.model`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("OUTVOX_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("OUTVOX_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(level) = std::env::var("OUTVOX_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("OUTVOX_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(base_url) = std::env::var("OUTVOX_CARRIER_BASE_URL") {
        config.carrier.base_url = base_url;
    }
    if let Ok(api_key) = std::env::var("OUTVOX_CARRIER_API_KEY") {
        config.carrier.api_key = api_key;
    }
    if let Ok(api_key) = std::env::var("OUTVOX_AI_API_KEY") {
        config.ai.api_key = api_key;
    }
    if let Ok(model) = std::env::var("OUTVOX_AI_MODEL") {
        config.ai.model = model;
    }

    Ok(config)
}
