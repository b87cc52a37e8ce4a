//! Configuration Module
//!
//! Handles application configuration loading, validation, and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::RetryConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Messaging session provider
    #[serde(default)]
    pub session: SessionConfig,

    /// Meal menu storage
    #[serde(default)]
    pub menu: MenuConfig,

    /// Language model backend for `!ask` / `/gpt`
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// HTTP trigger endpoint
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Command dispatch behaviour
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Session re-establishment policy
    #[serde(default)]
    pub reconnect: ReconnectConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which session provider drives the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionProviderKind {
    /// WhatsApp Web via `whatsapp-rust` (requires the `whatsapp` feature)
    #[serde(alias = "wa")]
    WhatsApp,
    /// Lines from stdin, replies on stdout
    Console,
}

impl std::str::FromStr for SessionProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "whatsapp" | "wa" => Ok(Self::WhatsApp),
            "console" => Ok(Self::Console),
            other => anyhow::bail!("Unknown session provider: {}", other),
        }
    }
}

fn default_provider() -> SessionProviderKind {
    if cfg!(feature = "whatsapp") {
        SessionProviderKind::WhatsApp
    } else {
        SessionProviderKind::Console
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Provider (default: whatsapp when compiled in, otherwise console)
    #[serde(default = "default_provider")]
    pub provider: SessionProviderKind,

    /// WhatsApp session database (pairing keys, Signal sessions)
    #[serde(default = "default_session_path")]
    pub whatsapp_db: PathBuf,

    /// Phone number (digits, with country code) to link with an 8-character
    /// pairing code instead of scanning a QR code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pair_phone: Option<String>,

    /// Capacity of the event queue between provider and dispatcher
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            whatsapp_db: default_session_path(),
            pair_phone: None,
            event_buffer: default_event_buffer(),
        }
    }
}

fn default_session_path() -> PathBuf {
    wabot_home().join("whatsapp").join("session.db")
}

fn default_event_buffer() -> usize {
    256
}

/// Only `true` (any case) turns a flag on. Anything other than `false` is
/// reported, since it is most likely a typo.
fn parse_flag(key: &str, value: &str) -> bool {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        return true;
    }
    if !value.eq_ignore_ascii_case("false") {
        tracing::warn!("{}={:?} is not true/false, treating it as false", key, value);
    }
    false
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuConfig {
    /// JSON file holding the weekly menu
    #[serde(default = "default_menu_path")]
    pub path: PathBuf,
}

impl Default for MenuConfig {
    fn default() -> Self {
        Self {
            path: default_menu_path(),
        }
    }
}

fn default_menu_path() -> PathBuf {
    PathBuf::from("meal.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key (usually from OPENAI_API_KEY)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// API base URL override
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    #[serde(default = "default_openai_model")]
    pub model: String,

    #[serde(default = "default_sampling")]
    pub temperature: f32,

    #[serde(default = "default_sampling")]
    pub top_p: f32,

    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Let OpenAI keep the response for later retrieval
    #[serde(default = "default_true")]
    pub store: bool,

    /// Total request timeout in seconds
    #[serde(default = "default_openai_timeout")]
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            temperature: default_sampling(),
            top_p: default_sampling(),
            max_output_tokens: default_max_output_tokens(),
            store: true,
            timeout_secs: default_openai_timeout(),
        }
    }
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4.1-nano".to_string()
}

fn default_sampling() -> f32 {
    1.0
}

fn default_max_output_tokens() -> u32 {
    2048
}

fn default_openai_timeout() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

/// HTTP trigger endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Whether the endpoint is served
    #[serde(default)]
    pub enabled: bool,

    /// Bind address (default: "127.0.0.1")
    #[serde(default = "default_gateway_bind")]
    pub bind: String,

    /// Port (default: 3000)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: default_gateway_bind(),
            port: default_gateway_port(),
        }
    }
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Send replies; when false they are only logged
    #[serde(default = "default_true")]
    pub reply_enabled: bool,

    /// Words that trigger a mention reply in group chats
    #[serde(default = "default_greetings")]
    pub greeting_keywords: Vec<String>,

    /// Reply to unrecognised direct messages (off when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_fallback_reply: Option<String>,

    /// Upper bound on a single outbound send, in seconds
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            reply_enabled: true,
            greeting_keywords: default_greetings(),
            direct_fallback_reply: None,
            send_timeout_secs: default_send_timeout(),
        }
    }
}

fn default_greetings() -> Vec<String> {
    vec!["halo".to_string()]
}

fn default_send_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Consecutive failed attempts before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Upper bound on one connection attempt, in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl ReconnectConfig {
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_attempts: self.max_attempts,
            attempt_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    8
}

fn default_connect_timeout() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily log files; console only when unset
    #[serde(default = "default_log_dir", skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: default_log_dir(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> Option<PathBuf> {
    Some(PathBuf::from("logs"))
}

/// Base directory for bot state: ~/.local/share/wabot (or ./.wabot)
pub fn wabot_home() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wabot")
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Priority (lowest to highest):
    /// 1. Default values
    /// 2. System config: ~/.config/wabot/config.toml
    /// 3. Local config: ./wabot.toml
    /// 4. Environment variables
    pub fn load() -> Result<Self> {
        tracing::debug!("Loading configuration...");

        let mut config = Self::default();

        if let Some(system_config_path) = Self::system_config_path()
            && system_config_path.exists()
        {
            tracing::debug!("Loading system config from: {:?}", system_config_path);
            config = Self::from_file(&system_config_path)?;
        }

        let local_config_path = Self::local_config_path();
        if local_config_path.exists() {
            tracing::debug!("Loading local config from: {:?}", local_config_path);
            config = Self::from_file(&local_config_path)?;
        }

        config.apply_env_overrides()?;

        tracing::debug!("Configuration loaded successfully");
        Ok(config)
    }

    /// Load configuration from a specific file path, then apply environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading configuration from custom path: {:?}", path);

        if !path.exists() {
            anyhow::bail!("Config file not found: {:?}", path);
        }
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Get the system config path: ~/.config/wabot/config.toml
    pub fn system_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("wabot").join("config.toml"))
    }

    /// Get the local config path: ./wabot.toml
    pub fn local_config_path() -> PathBuf {
        PathBuf::from("./wabot.toml")
    }

    /// Parse a TOML file. Sections missing from the file keep their defaults;
    /// a later file replaces an earlier one wholesale.
    fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        toml::from_str(&contents).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from a key lookup (the process environment in production).
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(api_key) = var("OPENAI_API_KEY") {
            self.openai.api_key = Some(api_key);
        }
        if let Some(base_url) = var("OPENAI_BASE_URL") {
            self.openai.base_url = base_url;
        }
        if let Some(model) = var("OPENAI_MODEL") {
            self.openai.model = model;
        }

        if let Some(do_reply) = var("DO_REPLY") {
            self.dispatch.reply_enabled = parse_flag("DO_REPLY", &do_reply);
        }

        if let Some(path) = var("WABOT_MENU_PATH") {
            self.menu.path = PathBuf::from(path);
        }

        if let Some(level) = var("WABOT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(dir) = var("WABOT_LOG_DIR") {
            self.logging.dir = Some(PathBuf::from(dir));
        }

        if let Some(enabled) = var("WABOT_GATEWAY_ENABLED") {
            self.gateway.enabled = parse_flag("WABOT_GATEWAY_ENABLED", &enabled);
        }
        if let Some(port) = var("WABOT_GATEWAY_PORT") {
            self.gateway.port = port
                .parse()
                .with_context(|| format!("Invalid WABOT_GATEWAY_PORT: {}", port))?;
        }

        if let Some(provider) = var("WABOT_SESSION_PROVIDER") {
            self.session.provider = provider.parse()?;
        }
        if let Some(phone) = var("WABOT_PAIR_PHONE") {
            let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
            self.session.pair_phone = (!digits.is_empty()).then_some(digits);
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        tracing::debug!("Validating configuration...");

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            );
        }

        if self.gateway.enabled && self.gateway.port == 0 {
            anyhow::bail!("Gateway is enabled but port is 0");
        }

        if self.reconnect.max_attempts == 0 {
            anyhow::bail!("reconnect.max_attempts must be at least 1");
        }
        if self.reconnect.initial_delay_ms > self.reconnect.max_delay_ms {
            anyhow::bail!(
                "reconnect.initial_delay_ms ({}) exceeds reconnect.max_delay_ms ({})",
                self.reconnect.initial_delay_ms,
                self.reconnect.max_delay_ms
            );
        }

        if self.session.event_buffer == 0 {
            anyhow::bail!("session.event_buffer must be at least 1");
        }

        if self.session.provider == SessionProviderKind::WhatsApp && !cfg!(feature = "whatsapp") {
            anyhow::bail!(
                "session.provider is \"whatsapp\" but this build has no WhatsApp support; \
                 rebuild with `--features whatsapp` or use provider = \"console\""
            );
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let toml_string =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        fs::write(path, toml_string)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        tracing::info!("Configuration saved to: {:?}", path);
        Ok(())
    }

    /// Copy of the config with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.openai.api_key.is_some() {
            copy.openai.api_key = Some("***".to_string());
        }
        copy
    }
}
