use crate::error::{CoreError, Result};
use crate::sync::{DEFAULT_RESYNC_THRESHOLD_SECS, DEFAULT_TICK_INTERVAL};
use const_format::concatcp;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Default Spotify now-playing poll interval while a track is playing
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

/// Default poll interval while nothing is playing
pub const DEFAULT_IDLE_POLL_INTERVAL_MS: u64 = 5000;

const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LyricordConfig {
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub lyrics: LyricsConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_redirect_uri")]
    pub oauth_redirect_uri: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_idle_poll_interval")]
    pub idle_poll_interval_ms: u64,
}

fn default_redirect_uri() -> String {
    DEFAULT_REDIRECT_URI.into()
}

const fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

const fn default_idle_poll_interval() -> u64 {
    DEFAULT_IDLE_POLL_INTERVAL_MS
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            oauth_redirect_uri: default_redirect_uri(),
            poll_interval_ms: default_poll_interval(),
            idle_poll_interval_ms: default_idle_poll_interval(),
        }
    }
}

impl SpotifyConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn idle_poll_interval(&self) -> Duration {
        Duration::from_millis(self.idle_poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricsConfig {
    /// Provider priority: providers are tried in order
    #[serde(default = "default_providers")]
    pub providers: Vec<LyricsProviderType>,
}

fn default_providers() -> Vec<LyricsProviderType> {
    vec![LyricsProviderType::Lrclib]
}

impl Default for LyricsConfig {
    fn default() -> Self {
        Self {
            providers: default_providers(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LyricsProviderType {
    Lrclib,
}

/// Timing of the lyric synchronizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Reported progress closer than this to the virtual clock is ignored
    #[serde(default = "default_resync_threshold")]
    pub resync_threshold_ms: u64,
}

#[allow(clippy::cast_possible_truncation)]
const fn default_tick_interval() -> u64 {
    DEFAULT_TICK_INTERVAL.as_millis() as u64
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn default_resync_threshold() -> u64 {
    (DEFAULT_RESYNC_THRESHOLD_SECS * 1000.0) as u64
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval(),
            resync_threshold_ms: default_resync_threshold(),
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    #[must_use]
    pub fn resync_threshold_secs(&self) -> f64 {
        Duration::from_millis(self.resync_threshold_ms).as_secs_f64()
    }
}

/// Discord Rich Presence. Disabled while `client_id` is empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Application ID from the Discord developer portal
    #[serde(default)]
    pub client_id: String,
}

impl DiscordConfig {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !self.client_id.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Also write logs to a file in the cache directory
    #[serde(default)]
    pub enabled: bool,
}

/// Environment variables that override `[spotify]` settings
pub const ENV_CLIENT_ID: &str = "SPOTIFY_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "SPOTIFY_CLIENT_SECRET";
pub const ENV_REDIRECT_URI: &str = "SPOTIFY_REDIRECT_URI";
/// Idle poll interval in whole seconds
pub const ENV_POLL_INTERVAL: &str = "SPOTIFY_POLL_INTERVAL";
/// Overrides `[discord] client_id`
pub const ENV_DISCORD_CLIENT_ID: &str = "DISCORD_CLIENT_ID";

impl LyricordConfig {
    /// Get the configuration directory path (~/.config/lyricord/)
    #[must_use]
    pub fn config_dir() -> PathBuf {
        crate::paths::config_dir()
    }

    /// Get the config file path (~/.config/lyricord/config.toml)
    #[must_use]
    pub fn config_path() -> PathBuf {
        crate::paths::config_path()
    }

    /// Load config from file or create template on first run.
    ///
    /// Spotify and Discord settings from the environment take precedence over
    /// the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, if an
    /// environment override is malformed, or if required fields are missing.
    /// On first run the template is written and [`CoreError::ConfigNotFound`]
    /// is returned.
    pub fn load_or_create() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&config_path, CONFIG_TEMPLATE)?;
            info!("Wrote config template to {}", config_path.display());

            return Err(CoreError::ConfigNotFound { path: config_path });
        }

        let content = fs::read_to_string(&config_path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Parse a config from TOML text without validating it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigParseError`] for malformed TOML.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply Spotify and Discord overrides from `lookup` (normally the process
    /// environment).
    /// Empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigInvalid`] if the poll interval is not a
    /// whole number of seconds.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(id) = get(ENV_CLIENT_ID) {
            self.spotify.client_id = id;
        }
        if let Some(secret) = get(ENV_CLIENT_SECRET) {
            self.spotify.client_secret = secret;
        }
        if let Some(uri) = get(ENV_REDIRECT_URI) {
            self.spotify.oauth_redirect_uri = uri;
        }
        if let Some(interval) = get(ENV_POLL_INTERVAL) {
            let secs: u64 = interval
                .trim()
                .parse()
                .map_err(|_| CoreError::ConfigInvalid {
                    message: format!("{ENV_POLL_INTERVAL} must be whole seconds, got {interval:?}"),
                })?;
            self.spotify.idle_poll_interval_ms = secs.saturating_mul(1000);
        }
        if let Some(id) = get(ENV_DISCORD_CLIENT_ID) {
            self.discord.client_id = id;
        }
        Ok(())
    }

    /// Validate required fields.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConfigMissingField`] for an empty client ID or
    /// secret and [`CoreError::ConfigInvalid`] for zero intervals or an empty
    /// provider list.
    pub fn validate(&self) -> Result<()> {
        if self.spotify.client_id.is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "spotify.client_id".to_string(),
            });
        }
        if self.spotify.client_secret.is_empty() {
            return Err(CoreError::ConfigMissingField {
                field: "spotify.client_secret".to_string(),
            });
        }
        if self.spotify.poll_interval_ms == 0 || self.spotify.idle_poll_interval_ms == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "spotify poll intervals must be greater than zero".to_string(),
            });
        }
        if self.sync.tick_interval_ms == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "sync.tick_interval_ms must be greater than zero".to_string(),
            });
        }
        if self.lyrics.providers.is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "lyrics.providers must list at least one provider".to_string(),
            });
        }
        Ok(())
    }
}

/// Template written on first run
pub const CONFIG_TEMPLATE: &str = concatcp!(
    r#"# Lyricord Configuration
# ~/.config/lyricord/config.toml

[spotify]
# Required: Get these from https://developer.spotify.com/dashboard
# (or set SPOTIFY_CLIENT_ID / SPOTIFY_CLIENT_SECRET in the environment)
client_id = ""
client_secret = ""
oauth_redirect_uri = ""#,
    DEFAULT_REDIRECT_URI,
    "\"\n# How often to ask Spotify what is playing\npoll_interval_ms = ",
    DEFAULT_POLL_INTERVAL_MS,
    "\n# Poll interval while nothing is playing (SPOTIFY_POLL_INTERVAL, in seconds)\nidle_poll_interval_ms = ",
    DEFAULT_IDLE_POLL_INTERVAL_MS,
    r#"

[lyrics]
# Providers are tried in order; first synced result wins
providers = ["lrclib"]

[sync]
# How often the active lyric line is re-evaluated
tick_interval_ms = 100
# Progress reports closer than this to the lyric clock are ignored
resync_threshold_ms = 1000

[discord]
# Application ID for Rich Presence; leave empty to disable
# (or set DISCORD_CLIENT_ID in the environment)
client_id = ""

[logging]
# Also write logs to lyricord.log in the cache directory
enabled = false
"#
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_from_empty_file() {
        let config = LyricordConfig::from_toml_str("").unwrap();
        assert_eq!(config.spotify.poll_interval_ms, 5000);
        assert_eq!(config.spotify.idle_poll_interval_ms, 5000);
        assert_eq!(config.spotify.oauth_redirect_uri, DEFAULT_REDIRECT_URI);
        assert_eq!(config.lyrics.providers, vec![LyricsProviderType::Lrclib]);
        assert_eq!(config.sync.tick_interval(), Duration::from_millis(100));
        assert!((config.sync.resync_threshold_secs() - 1.0).abs() < 1e-9);
        assert!(!config.discord.is_enabled());
        assert!(!config.logging.enabled);
    }

    #[test]
    fn test_template_parses() {
        let config = LyricordConfig::from_toml_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config.spotify.oauth_redirect_uri, DEFAULT_REDIRECT_URI);
        assert_eq!(config.spotify.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.sync.tick_interval_ms, 100);
        assert_eq!(config.sync.resync_threshold_ms, 1000);
        assert!(!config.discord.is_enabled());
        // Template ships without credentials
        assert!(matches!(
            config.validate(),
            Err(CoreError::ConfigMissingField { .. })
        ));
    }

    #[test]
    fn test_full_config() {
        let config = LyricordConfig::from_toml_str(
            r#"
[spotify]
client_id = "id"
client_secret = "secret"
poll_interval_ms = 2000

[sync]
tick_interval_ms = 50
resync_threshold_ms = 1500

[discord]
client_id = "1234"

[logging]
enabled = true
"#,
        )
        .unwrap();

        assert!(config.validate().is_ok());
        assert!(config.discord.is_enabled());
        assert_eq!(config.discord.client_id, "1234");
        assert_eq!(config.spotify.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.sync.tick_interval(), Duration::from_millis(50));
        assert!((config.sync.resync_threshold_secs() - 1.5).abs() < 1e-9);
        assert!(config.logging.enabled);
    }

    #[test]
    fn test_parse_error() {
        let err = LyricordConfig::from_toml_str("[spotify\nclient_id = 1").unwrap_err();
        assert!(matches!(err, CoreError::ConfigParseError(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_CLIENT_ID, "env-id"),
            (ENV_CLIENT_SECRET, "env-secret"),
            (ENV_REDIRECT_URI, ""),
            (ENV_POLL_INTERVAL, "12"),
            (ENV_DISCORD_CLIENT_ID, "99"),
        ]
        .into_iter()
        .collect();

        let mut config = LyricordConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(ToString::to_string))
            .unwrap();

        assert_eq!(config.spotify.client_id, "env-id");
        assert_eq!(config.spotify.client_secret, "env-secret");
        // Empty values do not override
        assert_eq!(config.spotify.oauth_redirect_uri, DEFAULT_REDIRECT_URI);
        assert_eq!(config.spotify.idle_poll_interval(), Duration::from_secs(12));
        assert_eq!(config.discord.client_id, "99");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_poll_interval_must_be_number() {
        let mut config = LyricordConfig::default();
        let err = config
            .apply_overrides(|key| (key == ENV_POLL_INTERVAL).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, CoreError::ConfigInvalid { .. }));
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let mut config = LyricordConfig::default();
        config.spotify.client_id = "id".into();
        config.spotify.client_secret = "secret".into();
        config.sync.tick_interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(CoreError::ConfigInvalid { .. })
        ));
    }
}
