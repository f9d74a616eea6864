//! Configuration loading, validation, and management for rollcall.
//!
//! Loads configuration from `~/.rollcall/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use rollcall_core::roster::RosterSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.rollcall/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// The original roster and its columns
    #[serde(default)]
    pub roster: RosterConfig,

    /// Where working snapshots are exported
    #[serde(default)]
    pub artifacts: ArtifactConfig,

    /// Telegram bot settings
    #[serde(default)]
    pub telegram: TelegramSettings,

    /// Webhook gateway
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Audit trail
    #[serde(default)]
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    /// The original attendance sheet. Never written to.
    #[serde(default = "default_roster_path")]
    pub path: PathBuf,

    #[serde(default = "default_registration_column")]
    pub registration_column: String,

    #[serde(default = "default_identity_column")]
    pub identity_column: String,

    #[serde(default = "default_status_column")]
    pub status_column: String,

    /// Optional header-less sheet mapping registration numbers to names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_list: Option<PathBuf>,

    /// Class name printed on the absentee report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

fn default_roster_path() -> PathBuf {
    AppConfig::config_dir().join("attendance_original.csv")
}
fn default_registration_column() -> String {
    RosterSchema::default().registration_column
}
fn default_identity_column() -> String {
    RosterSchema::default().identity_column
}
fn default_status_column() -> String {
    RosterSchema::default().status_column
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            path: default_roster_path(),
            registration_column: default_registration_column(),
            identity_column: default_identity_column(),
            status_column: default_status_column(),
            name_list: None,
            class_name: None,
        }
    }
}

impl RosterConfig {
    pub fn schema(&self) -> RosterSchema {
        RosterSchema {
            registration_column: self.registration_column.clone(),
            identity_column: self.identity_column.clone(),
            status_column: self.status_column.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    #[serde(default = "default_artifact_dir")]
    pub dir: PathBuf,

    /// Versions kept per lineage; older ones are pruned
    #[serde(default = "default_keep")]
    pub keep: usize,

    #[serde(default = "default_file_stem")]
    pub file_stem: String,
}

fn default_artifact_dir() -> PathBuf {
    AppConfig::config_dir().join("working")
}
fn default_keep() -> usize {
    20
}
fn default_file_stem() -> String {
    "attendance".into()
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            dir: default_artifact_dir(),
            keep: default_keep(),
            file_stem: default_file_stem(),
        }
    }
}

/// How Telegram updates reach the bot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelegramMode {
    #[default]
    Polling,
    Webhook,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramSettings {
    /// Bot token from @BotFather
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// Allowlist of sender IDs. Empty = deny all. ["*"] = allow all.
    #[serde(default)]
    pub allowed_users: Vec<String>,

    #[serde(default)]
    pub mode: TelegramMode,

    /// Public base URL the webhook is registered under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,

    /// Expected `X-Telegram-Bot-Api-Secret-Token` header value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.telegram.org".into()
}
fn default_poll_timeout() -> u64 {
    30
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            bot_token: None,
            allowed_users: vec![],
            mode: TelegramMode::default(),
            public_url: None,
            webhook_secret: None,
            api_base: default_api_base(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("bot_token", &redact(&self.bot_token))
            .field("allowed_users", &self.allowed_users)
            .field("mode", &self.mode)
            .field("public_url", &self.public_url)
            .field("webhook_secret", &redact(&self.webhook_secret))
            .field("api_base", &self.api_base)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// JSON-lines file receiving every audit entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Recent entries kept in memory
    #[serde(default = "default_audit_retain")]
    pub retain: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: None,
            retain: default_audit_retain(),
        }
    }
}

fn default_audit_retain() -> usize {
    1_000
}

impl AppConfig {
    /// Load configuration from the default path (~/.rollcall/config.toml).
    ///
    /// Environment variables override the file:
    /// - `ROLLCALL_BOT_TOKEN`, then `TELEGRAM_BOT_TOKEN`
    /// - `ROLLCALL_ROSTER`
    /// - `ROLLCALL_PUBLIC_URL`, then `RENDER_EXTERNAL_URL`
    /// - `RENDER` (any value switches Telegram to webhook mode)
    /// - `PORT`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load a specific file, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read_file(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(token) = env("ROLLCALL_BOT_TOKEN").or_else(|| env("TELEGRAM_BOT_TOKEN")) {
            self.telegram.bot_token = Some(token);
        }

        if let Some(roster) = env("ROLLCALL_ROSTER") {
            self.roster.path = PathBuf::from(roster);
        }

        if let Some(url) = env("ROLLCALL_PUBLIC_URL").or_else(|| env("RENDER_EXTERNAL_URL")) {
            self.telegram.public_url = Some(url);
        }

        if env("RENDER").is_some() {
            self.telegram.mode = TelegramMode::Webhook;
        }

        if let Some(port) = env("PORT") {
            match port.parse() {
                Ok(p) => self.gateway.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring non-numeric PORT"),
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".rollcall")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let columns = [
            &self.roster.registration_column,
            &self.roster.identity_column,
            &self.roster.status_column,
        ];
        if columns.iter().any(|c| c.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "roster column names must not be empty".into(),
            ));
        }
        for (i, a) in columns.iter().enumerate() {
            if columns[i + 1..].iter().any(|b| a.trim() == b.trim()) {
                return Err(ConfigError::ValidationError(format!(
                    "roster column '{a}' is configured twice"
                )));
            }
        }

        if self.artifacts.keep == 0 {
            return Err(ConfigError::ValidationError(
                "artifacts.keep must be at least 1".into(),
            ));
        }

        if self.artifacts.file_stem.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "artifacts.file_stem must not be empty".into(),
            ));
        }

        if self.telegram.mode == TelegramMode::Webhook && self.telegram.public_url.is_none() {
            return Err(ConfigError::ValidationError(
                "telegram.public_url is required in webhook mode".into(),
            ));
        }

        Ok(())
    }

    /// Check if a bot token is available (from config or environment).
    pub fn has_bot_token(&self) -> bool {
        self.telegram
            .bot_token
            .as_deref()
            .is_some_and(|t| !t.trim().is_empty())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.roster.status_column, "Attendance *");
        assert_eq!(config.artifacts.keep, 20);
        assert_eq!(config.audit.retain, 1_000);
        assert_eq!(config.telegram.mode, TelegramMode::Polling);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.roster.path, config.roster.path);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.roster.registration_column, "Registration Id");
    }

    #[test]
    fn parses_file_sections() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(
            tmp,
            r#"
[roster]
path = "/srv/roll/original.csv"
name_list = "/srv/roll/names.csv"
class_name = "II M Tech CSE"

[artifacts]
dir = "/srv/roll/working"
keep = 5

[telegram]
allowed_users = ["*"]
"#
        )
        .unwrap();

        let config = AppConfig::load_from(tmp.path()).unwrap();
        assert_eq!(config.roster.path, PathBuf::from("/srv/roll/original.csv"));
        assert_eq!(config.roster.class_name.as_deref(), Some("II M Tech CSE"));
        assert_eq!(config.artifacts.keep, 5);
        assert_eq!(config.artifacts.file_stem, "attendance");
        assert_eq!(config.telegram.allowed_users, vec!["*".to_string()]);
    }

    #[test]
    fn unknown_telegram_mode_is_a_parse_error() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        write!(tmp, "[telegram]\nmode = \"carrier_pigeon\"\n").unwrap();
        let err = AppConfig::load_from(tmp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn duplicate_columns_rejected() {
        let mut config = AppConfig::default();
        config.roster.identity_column = "Registration Id".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_keep_rejected() {
        let mut config = AppConfig::default();
        config.artifacts.keep = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn webhook_mode_needs_public_url() {
        let mut config = AppConfig::default();
        config.telegram.mode = TelegramMode::Webhook;
        assert!(config.validate().is_err());
        config.telegram.public_url = Some("https://roll.example.com".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("ROLLCALL_ROSTER", "/data/roster.csv"),
            ("RENDER", "true"),
            ("RENDER_EXTERNAL_URL", "https://roll.onrender.com"),
            ("PORT", "10000"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert!(config.has_bot_token());
        assert_eq!(config.roster.path, PathBuf::from("/data/roster.csv"));
        assert_eq!(config.telegram.mode, TelegramMode::Webhook);
        assert_eq!(
            config.telegram.public_url.as_deref(),
            Some("https://roll.onrender.com")
        );
        assert_eq!(config.gateway.port, 10000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.telegram.bot_token = Some("123:very-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("Registration Id"));
        assert!(toml_str.contains("[artifacts]"));
    }
}
