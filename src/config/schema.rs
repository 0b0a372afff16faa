use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

// ── Top-level config ──────────────────────────────────────────────

/// Top-level PitchSmith configuration, loaded from `config.toml`.
///
/// Resolution order: `PITCHSMITH_CONFIG_DIR` env → `~/.pitchsmith/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// Data directory (evaluation log lives here) - computed, not serialized
    #[serde(skip)]
    pub data_dir: PathBuf,

    /// Telegram transport settings (`[telegram]`).
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Session eviction settings (`[sessions]`).
    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Generation collaborator settings (`[generation]`).
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Evaluation persistence settings (`[evaluations]`).
    #[serde(default)]
    pub evaluations: EvaluationsConfig,
}

/// Telegram transport configuration (`[telegram]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token. Overridden by `PITCHSMITH_BOT_TOKEN` or
    /// `TELEGRAM_BOT_TOKEN` env vars.
    #[serde(default)]
    pub bot_token: String,
    /// Primary (domain-addressed) API base. Default: `"https://api.telegram.org"`.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Literal address for the secondary endpoint. DNS for the API host is
    /// pinned to this address so TLS still validates the virtual host.
    /// Default: `"149.154.167.220"`.
    #[serde(default = "default_api_ip")]
    pub api_ip: Option<String>,
    /// Long-poll timeout passed to `getUpdates`, in seconds. Default: `30`.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    /// Pause between poll iterations, in milliseconds. Default: `1000`.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Extra wait after a degraded fetch, in milliseconds. Default: `5000`.
    #[serde(default = "default_fetch_error_delay_ms")]
    pub fetch_error_delay_ms: u64,
    /// Identity-probe attempts before starting degraded. Default: `5`.
    #[serde(default = "default_bootstrap_max_attempts")]
    pub bootstrap_max_attempts: u32,
    /// Base delay for bootstrap backoff, in milliseconds. Default: `5000`.
    #[serde(default = "default_bootstrap_base_delay_ms")]
    pub bootstrap_base_delay_ms: u64,
    /// Retry attempts per `sendMessage` / `getMe`. Default: `3`.
    #[serde(default = "default_send_retry_attempts")]
    pub send_retry_attempts: u32,
    /// Base delay for send retries, in milliseconds. Default: `1000`.
    #[serde(default = "default_send_retry_base_ms")]
    pub send_retry_base_ms: u64,
    /// Retry attempts per `sendChatAction`. Default: `2`.
    #[serde(default = "default_action_retry_attempts")]
    pub action_retry_attempts: u32,
    /// Base delay for chat-action retries, in milliseconds. Default: `500`.
    #[serde(default = "default_action_retry_base_ms")]
    pub action_retry_base_ms: u64,
    /// Retry attempts per `getUpdates`. Default: `3`.
    #[serde(default = "default_fetch_retry_attempts")]
    pub fetch_retry_attempts: u32,
    /// Base delay for fetch retries, in milliseconds. Default: `2000`.
    #[serde(default = "default_fetch_retry_base_ms")]
    pub fetch_retry_base_ms: u64,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}
fn default_api_ip() -> Option<String> {
    Some("149.154.167.220".to_string())
}
fn default_poll_timeout_secs() -> u64 {
    30
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_fetch_error_delay_ms() -> u64 {
    5000
}
fn default_bootstrap_max_attempts() -> u32 {
    5
}
fn default_bootstrap_base_delay_ms() -> u64 {
    5000
}
fn default_send_retry_attempts() -> u32 {
    3
}
fn default_send_retry_base_ms() -> u64 {
    1000
}
fn default_action_retry_attempts() -> u32 {
    2
}
fn default_action_retry_base_ms() -> u64 {
    500
}
fn default_fetch_retry_attempts() -> u32 {
    3
}
fn default_fetch_retry_base_ms() -> u64 {
    2000
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base: default_api_base(),
            api_ip: default_api_ip(),
            poll_timeout_secs: default_poll_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            fetch_error_delay_ms: default_fetch_error_delay_ms(),
            bootstrap_max_attempts: default_bootstrap_max_attempts(),
            bootstrap_base_delay_ms: default_bootstrap_base_delay_ms(),
            send_retry_attempts: default_send_retry_attempts(),
            send_retry_base_ms: default_send_retry_base_ms(),
            action_retry_attempts: default_action_retry_attempts(),
            action_retry_base_ms: default_action_retry_base_ms(),
            fetch_retry_attempts: default_fetch_retry_attempts(),
            fetch_retry_base_ms: default_fetch_retry_base_ms(),
        }
    }
}

/// Session eviction configuration (`[sessions]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Idle TTL after which a session is evicted, in minutes. Default: `30`.
    #[serde(default = "default_session_ttl_minutes")]
    pub ttl_minutes: u64,
}

fn default_session_ttl_minutes() -> u64 {
    30
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_session_ttl_minutes(),
        }
    }
}

/// Generation collaborator configuration (`[generation]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// OpenAI-compatible chat completions base URL.
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,
    /// API key. Overridden by `PITCHSMITH_API_KEY` or `OPENAI_API_KEY`.
    pub api_key: Option<String>,
    /// Model routed through the endpoint. Default: `"gpt-4.1-mini"`.
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Sampling temperature (0.0–2.0). Default: `0.7`.
    #[serde(default = "default_generation_temperature")]
    pub temperature: f64,
    /// Most recent turns sent per request. Default: `10`.
    #[serde(default = "default_max_history_turns")]
    pub max_history_turns: usize,
}

fn default_generation_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_generation_model() -> String {
    "gpt-4.1-mini".to_string()
}
fn default_generation_temperature() -> f64 {
    0.7
}
fn default_max_history_turns() -> usize {
    10
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: default_generation_base_url(),
            api_key: None,
            model: default_generation_model(),
            temperature: default_generation_temperature(),
            max_history_turns: default_max_history_turns(),
        }
    }
}

/// Evaluation persistence configuration (`[evaluations]` section).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EvaluationsConfig {
    /// Path to the JSON-lines evaluation log. Defaults to
    /// `<data_dir>/evaluations.jsonl` when unset.
    pub log_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            data_dir: PathBuf::new(),
            telegram: TelegramConfig::default(),
            sessions: SessionsConfig::default(),
            generation: GenerationConfig::default(),
            evaluations: EvaluationsConfig::default(),
        }
    }
}

fn default_config_dir() -> Result<PathBuf> {
    if let Ok(custom) = std::env::var("PITCHSMITH_CONFIG_DIR") {
        if !custom.trim().is_empty() {
            return Ok(PathBuf::from(custom));
        }
    }
    let user_dirs = UserDirs::new().context("Could not determine home directory")?;
    Ok(user_dirs.home_dir().join(".pitchsmith"))
}

impl Config {
    /// Load the config file, creating it with defaults on first run.
    pub async fn load_or_init() -> Result<Self> {
        let dir = default_config_dir()?;
        let config_path = dir.join("config.toml");

        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let mut config = if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            toml::from_str::<Config>(&contents).context("Failed to parse config file")?
        } else {
            let config = Config::default();
            let toml_str = toml::to_string_pretty(&config).context("Failed to serialize config")?;
            fs::write(&config_path, toml_str)
                .await
                .context("Failed to write default config")?;
            // The token lives in this file once the user fills it in.
            #[cfg(unix)]
            {
                use std::{fs::Permissions, os::unix::fs::PermissionsExt};
                let _ = fs::set_permissions(&config_path, Permissions::from_mode(0o600)).await;
            }
            tracing::info!(path = %config_path.display(), "Wrote default config");
            config
        };

        config.config_path = config_path;
        config.data_dir = dir;
        Ok(config)
    }

    /// Apply environment-variable overrides on top of the loaded file.
    pub fn apply_env_overrides(&mut self) {
        // Bot token: PITCHSMITH_BOT_TOKEN or the conventional TELEGRAM_BOT_TOKEN
        if let Ok(token) = std::env::var("PITCHSMITH_BOT_TOKEN")
            .or_else(|_| std::env::var("TELEGRAM_BOT_TOKEN"))
        {
            if !token.is_empty() {
                self.telegram.bot_token = token;
            }
        }

        // Generation API key: PITCHSMITH_API_KEY or OPENAI_API_KEY
        if let Ok(key) =
            std::env::var("PITCHSMITH_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY"))
        {
            if !key.is_empty() {
                self.generation.api_key = Some(key);
            }
        }

        // Generation endpoint: PITCHSMITH_GENERATION_URL
        if let Ok(url) = std::env::var("PITCHSMITH_GENERATION_URL") {
            if !url.is_empty() {
                self.generation.base_url = url;
            }
        }
    }

    /// Resolved path of the evaluation log.
    pub fn evaluation_log_path(&self) -> PathBuf {
        match &self.evaluations.log_path {
            Some(path) => PathBuf::from(path),
            None => self.data_dir.join("evaluations.jsonl"),
        }
    }
}
