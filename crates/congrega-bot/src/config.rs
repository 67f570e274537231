//! Runtime configuration.
//!
//! Non-secret defaults live in `config/default.toml`; secrets and
//! deployment-specific values come from the environment (loaded from
//! `.env` by the binary). Command-line flags override both.

use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

use congrega_classifier::LlmConfig;
use congrega_gateway::ChatwootConfig;

/// Path of the optional config file, relative to the working directory.
const CONFIG_FILE: &str = "config/default.toml";

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bind_addr: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub chatwoot: ChatwootConfig,
    /// Absent when no API key is configured; the bot then classifies
    /// locally only.
    pub llm: Option<LlmConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    database: DatabaseSection,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    #[serde(default = "default_bind")]
    bind: String,
    #[serde(default = "default_port")]
    port: u16,
}

#[derive(Debug, Deserialize)]
struct DatabaseSection {
    #[serde(default = "default_db_path")]
    path: PathBuf,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/congrega.db")
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl BotConfig {
    /// Resolve the configuration: file defaults, environment, CLI flags.
    pub fn load(bind_override: Option<String>, port_override: Option<u16>) -> anyhow::Result<Self> {
        let file = load_file_config()?;

        let chatwoot = ChatwootConfig {
            base_url: require_env("CHATWOOT_BASE_URL")?,
            account_id: require_env("CHATWOOT_ACCOUNT_ID")?
                .parse()
                .context("CHATWOOT_ACCOUNT_ID must be a number")?,
            inbox_id: require_env("CHATWOOT_INBOX_ID")?
                .parse()
                .context("CHATWOOT_INBOX_ID must be a number")?,
            api_token: require_env("CHATWOOT_API_TOKEN")?,
        };

        Ok(Self {
            bind_addr: bind_override.unwrap_or(file.server.bind),
            port: port_override.unwrap_or(file.server.port),
            db_path: file.database.path,
            chatwoot,
            llm: LlmConfig::from_env(),
        })
    }
}

fn load_file_config() -> anyhow::Result<FileConfig> {
    match std::fs::read_to_string(CONFIG_FILE) {
        Ok(raw) => toml::from_str(&raw).with_context(|| format!("invalid {CONFIG_FILE}")),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(e) => Err(e).with_context(|| format!("cannot read {CONFIG_FILE}")),
    }
}

/// Read a non-empty environment variable.
pub fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn require_env(name: &str) -> anyhow::Result<String> {
    env_non_empty(name).with_context(|| format!("{name} is required"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
