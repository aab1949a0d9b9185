//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.minutai/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.
//! Provider credentials are process-wide; requests never carry them.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ProviderId;
use crate::inference::providers::{self, anthropic, gemini, openai};

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MinutaiConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub anthropic: ProviderConfig,
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub gemini: ProviderConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub max_tokens: Option<u32>,
    /// Per-request timeout for provider calls. Unset means no explicit timeout.
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LOG_LEVEL: &str = "info";

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProvider {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub bind: String,
    pub port: u16,
    pub max_tokens: u32,
    pub request_timeout: Option<Duration>,
    pub anthropic: ResolvedProvider,
    pub openai: ResolvedProvider,
    pub gemini: ResolvedProvider,
}

impl ResolvedConfig {
    pub fn provider(&self, id: ProviderId) -> &ResolvedProvider {
        match id {
            ProviderId::Anthropic => &self.anthropic,
            ProviderId::OpenAi => &self.openai,
            ProviderId::Gemini => &self.gemini,
        }
    }
}

/// Values given on the command line. `None` = flag not specified.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.minutai/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".minutai").join("config.toml"))
}

/// Load config from an explicit path, or from `~/.minutai/config.toml`.
///
/// A missing default file is generated (commented out) and treated as empty.
/// A missing explicit file is an error. A malformed file returns
/// `ConfigError::Parse`.
pub fn load_config(explicit: Option<&Path>) -> Result<MinutaiConfig, ConfigError> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match config_path() {
            Some(p) => p,
            None => {
                warn!("Could not determine home directory, using default config");
                return Ok(MinutaiConfig::default());
            }
        },
    };

    if explicit.is_none() && !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(MinutaiConfig::default());
    }

    let contents = fs::read_to_string(&path).map_err(ConfigError::Io)?;
    let config: MinutaiConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    // The derived Debug would print API keys.
    debug!(
        "Config: server={:?}, general={:?}",
        config.server, config.general
    );
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# MinutAI Configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# max_tokens = 2048
# request_timeout_secs = 120         # Unset = no explicit timeout

# [server]
# bind = "127.0.0.1"
# port = 3000

# [anthropic]
# api_key = "sk-ant-..."             # Or set ANTHROPIC_API_KEY env var
# base_url = "https://api.anthropic.com/v1"
# model = "claude-3-5-haiku-20241022"

# [openai]
# api_key = "sk-..."                 # Or set OPENAI_API_KEY env var
# base_url = "https://api.openai.com/v1"
# model = "gpt-4o-mini"

# [gemini]
# api_key = "..."                    # Or set GEMINI_API_KEY env var
# base_url = "https://generativelanguage.googleapis.com/v1beta"
# model = "gemini-2.5-flash"
"#;

    if let Some(parent) = path.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        warn!("Failed to create config directory: {}", e);
        return;
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Log level for the whole run: CLI → `MINUTAI_LOG_LEVEL` → default. It is
/// settled before any config file is read so that loading can log.
pub fn log_level(cli: &CliOverrides) -> String {
    log_level_with_env(cli, |key| std::env::var(key).ok())
}

pub fn log_level_with_env<F>(cli: &CliOverrides, env: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    cli.log_level
        .clone()
        .or_else(|| env("MINUTAI_LOG_LEVEL"))
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
}

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(config: &MinutaiConfig, cli: &CliOverrides) -> ResolvedConfig {
    resolve_with_env(config, cli, |key| std::env::var(key).ok())
}

/// Same as [`resolve`], reading environment variables through `env`.
pub fn resolve_with_env<F>(config: &MinutaiConfig, cli: &CliOverrides, env: F) -> ResolvedConfig
where
    F: Fn(&str) -> Option<String>,
{
    // Bind address: CLI → env → config → default
    let bind = cli
        .bind
        .clone()
        .or_else(|| env("MINUTAI_BIND"))
        .or_else(|| config.server.bind.clone())
        .unwrap_or_else(|| DEFAULT_BIND.to_string());

    let port = cli
        .port
        .or_else(|| env("MINUTAI_PORT").and_then(|p| p.parse().ok()))
        .or(config.server.port)
        .unwrap_or(DEFAULT_PORT);

    ResolvedConfig {
        bind,
        port,
        max_tokens: config
            .general
            .max_tokens
            .unwrap_or(providers::DEFAULT_MAX_TOKENS),
        request_timeout: config.general.request_timeout_secs.map(Duration::from_secs),
        anthropic: resolve_provider(
            &config.anthropic,
            &env,
            "ANTHROPIC",
            anthropic::DEFAULT_BASE_URL,
            anthropic::DEFAULT_MODEL,
        ),
        openai: resolve_provider(
            &config.openai,
            &env,
            "OPENAI",
            openai::DEFAULT_BASE_URL,
            openai::DEFAULT_MODEL,
        ),
        gemini: resolve_provider(
            &config.gemini,
            &env,
            "GEMINI",
            gemini::DEFAULT_BASE_URL,
            gemini::DEFAULT_MODEL,
        ),
    }
}

/// API key and base URL: env → config → default. Model: config → default.
fn resolve_provider<F>(
    config: &ProviderConfig,
    env: &F,
    prefix: &str,
    default_base_url: &str,
    default_model: &str,
) -> ResolvedProvider
where
    F: Fn(&str) -> Option<String>,
{
    let api_key = env(&format!("{prefix}_API_KEY"))
        .or_else(|| config.api_key.clone())
        .filter(|key| !key.trim().is_empty());

    let base_url = env(&format!("{prefix}_BASE_URL"))
        .or_else(|| config.base_url.clone())
        .unwrap_or_else(|| default_base_url.to_string());

    ResolvedProvider {
        api_key,
        base_url,
        model: config
            .model
            .clone()
            .unwrap_or_else(|| default_model.to_string()),
    }
}
