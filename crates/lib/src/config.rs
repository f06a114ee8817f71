//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.jawhar/config.json`) and environment.
//! Credentials are usually supplied through the environment (or a `.env` file loaded by the CLI)
//! and take precedence over values in the file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Gateway server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// WhatsApp Cloud API credentials and webhook settings.
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// External user directory.
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Dedup, staleness, and pacing knobs for the inbound pipeline.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 8000).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    8000
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// WhatsApp Cloud API config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppConfig {
    /// Bearer token for the Graph API. Overridden by WHATSAPP_API_TOKEN env when set.
    pub api_token: Option<String>,
    /// Business phone number id used in the messages endpoint. Overridden by WHATSAPP_PHONE_NUMBER_ID.
    pub phone_number_id: Option<String>,
    /// Graph API base including version (default "https://graph.facebook.com/v18.0").
    #[serde(default = "default_whatsapp_api_base")]
    pub api_base: String,
    /// Token expected in `hub.verify_token` during webhook subscription. Overridden by WEBHOOK_VERIFY_TOKEN.
    pub verify_token: Option<String>,
    /// App secret for X-Hub-Signature-256 validation. Overridden by WHATSAPP_APP_SECRET.
    pub app_secret: Option<String>,
    /// When true, POST /webhook checks the payload signature (skipped with a warning if no app secret).
    #[serde(default)]
    pub verify_signatures: bool,
    /// Timeout for each outbound Graph API call.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

fn default_whatsapp_api_base() -> String {
    "https://graph.facebook.com/v18.0".to_string()
}

fn default_send_timeout_secs() -> u64 {
    10
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            phone_number_id: None,
            api_base: default_whatsapp_api_base(),
            verify_token: None,
            app_secret: None,
            verify_signatures: false,
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

/// External user directory config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryConfig {
    /// Endpoint that accepts `{action, phone, ...}` POSTs. Overridden by DIRECTORY_URL.
    pub url: Option<String>,
    /// Per-call timeout (default 5).
    #[serde(default = "default_directory_timeout_secs")]
    pub timeout_secs: u64,
    /// Secret required by `update_points`. Overridden by DIRECTORY_ADMIN_SECRET.
    pub admin_secret: Option<String>,
}

fn default_directory_timeout_secs() -> u64 {
    5
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_directory_timeout_secs(),
            admin_secret: None,
        }
    }
}

/// Inbound pipeline knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Maximum number of processed message ids kept before the cache is flushed (default 1000).
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    /// Messages older than this are dropped without a reply (default 300).
    #[serde(default = "default_staleness_window_secs")]
    pub staleness_window_secs: u64,
    /// Delay between messages of a multi-message reply (default 500).
    #[serde(default = "default_pacing_millis")]
    pub pacing_millis: u64,
}

fn default_dedup_capacity() -> usize {
    1000
}

fn default_staleness_window_secs() -> u64 {
    300
}

fn default_pacing_millis() -> u64 {
    500
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            dedup_capacity: default_dedup_capacity(),
            staleness_window_secs: default_staleness_window_secs(),
            pacing_millis: default_pacing_millis(),
        }
    }
}

impl PipelineConfig {
    pub fn staleness_window(&self) -> Duration {
        Duration::from_secs(self.staleness_window_secs)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_millis)
    }
}

/// Non-empty trimmed env var, if set.
fn env_override(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Env var wins over the config value; blank values count as unset.
fn resolve(key: &str, configured: Option<&String>) -> Option<String> {
    env_override(key).or_else(|| {
        configured
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Resolve the Graph API token: env WHATSAPP_API_TOKEN overrides config.
pub fn resolve_whatsapp_token(config: &Config) -> Option<String> {
    resolve("WHATSAPP_API_TOKEN", config.whatsapp.api_token.as_ref())
}

/// Resolve the business phone number id: env WHATSAPP_PHONE_NUMBER_ID overrides config.
pub fn resolve_phone_number_id(config: &Config) -> Option<String> {
    resolve(
        "WHATSAPP_PHONE_NUMBER_ID",
        config.whatsapp.phone_number_id.as_ref(),
    )
}

/// Resolve the webhook verify token: env WEBHOOK_VERIFY_TOKEN overrides config.
pub fn resolve_verify_token(config: &Config) -> Option<String> {
    resolve("WEBHOOK_VERIFY_TOKEN", config.whatsapp.verify_token.as_ref())
}

/// Resolve the app secret used for payload signatures: env WHATSAPP_APP_SECRET overrides config.
pub fn resolve_app_secret(config: &Config) -> Option<String> {
    resolve("WHATSAPP_APP_SECRET", config.whatsapp.app_secret.as_ref())
}

/// Resolve the directory endpoint: env DIRECTORY_URL overrides config.
pub fn resolve_directory_url(config: &Config) -> Option<String> {
    resolve("DIRECTORY_URL", config.directory.url.as_ref())
}

/// Resolve the directory admin secret: env DIRECTORY_ADMIN_SECRET overrides config.
pub fn resolve_directory_admin_secret(config: &Config) -> Option<String> {
    resolve(
        "DIRECTORY_ADMIN_SECRET",
        config.directory.admin_secret.as_ref(),
    )
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("JAWHAR_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".jawhar").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or JAWHAR_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

/// Write a default config file (and its parent directory) if none exists yet. Returns true when a file was written.
pub fn init_config_file(path: &Path) -> Result<bool> {
    if path.exists() {
        log::debug!("config already exists at {}, skipping", path.display());
        return Ok(false);
    }
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating config directory {}", dir.display()))?;
    let body = serde_json::to_string_pretty(&Config::default())
        .context("serializing default config")?;
    std::fs::write(path, body)
        .with_context(|| format!("writing default config to {}", path.display()))?;
    log::info!("created default config at {}", path.display());
    Ok(true)
}
