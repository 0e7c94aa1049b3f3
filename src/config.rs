use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub paths: PathsConfig,
    #[serde(default)]
    pub wizard: WizardConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding the key/value store and logs
    pub state: String,
}

/// Onboarding wizard behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WizardConfig {
    /// Write a resume instruction every time the wizard moves forward
    #[serde(default = "default_checkpoint_on_advance")]
    pub checkpoint_on_advance: bool,
}

fn default_checkpoint_on_advance() -> bool {
    true
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            checkpoint_on_advance: default_checkpoint_on_advance(),
        }
    }
}

/// Automation bridge timing and targets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Seconds to wait for the agent to acknowledge a payload (default: 10)
    #[serde(default = "default_ack_timeout")]
    pub ack_timeout_secs: u64,
    /// Milliseconds between the completion signal and the waiting screen (default: 2000)
    #[serde(default = "default_redirect_delay")]
    pub redirect_delay_ms: u64,
    /// Third-party form opened once the agent has the payload
    #[serde(default)]
    pub form_url: String,
    /// Waiting screen route; `{case_id}` is substituted when known
    #[serde(default = "default_waiting_route")]
    pub waiting_route: String,
    /// Open the form in the system browser
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,
}

fn default_ack_timeout() -> u64 {
    10
}

fn default_redirect_delay() -> u64 {
    2000
}

fn default_waiting_route() -> String {
    "/cases/{case_id}/awaiting-decision".to_string()
}

fn default_open_browser() -> bool {
    true
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ack_timeout_secs: default_ack_timeout(),
            redirect_delay_ms: default_redirect_delay(),
            form_url: String::new(),
            waiting_route: default_waiting_route(),
            open_browser: default_open_browser(),
        }
    }
}

impl BridgeConfig {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }

    pub fn redirect_delay(&self) -> Duration {
        Duration::from_millis(self.redirect_delay_ms)
    }
}

/// Intake REST backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL; unset runs offline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Request timeout in seconds (default: 15)
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

fn default_backend_timeout() -> u64 {
    15
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_backend_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs to `<state>/logs/` instead of stderr
    #[serde(default)]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
        }
    }
}

impl Config {
    /// Path to the project-local config file
    pub fn local_config_path() -> PathBuf {
        PathBuf::from(".claimflow/config.toml")
    }

    /// Later layers win: defaults, `.claimflow/config.toml`, the user file,
    /// `--config`, then the environment.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Lowest layer: built-in values, serialized back through the builder
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let local_config = Self::local_config_path();
        if local_config.exists() {
            builder = builder.add_source(config::File::from(local_config));
        }

        // Per-user file, shared by every case directory
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("claimflow").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // --config
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // CLAIMFLOW__SECTION__KEY, e.g. CLAIMFLOW__BRIDGE__ACK_TIMEOUT_SECS
        builder = builder.add_source(
            config::Environment::with_prefix("CLAIMFLOW")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Save config to `.claimflow/config.toml`
    pub fn save(&self) -> Result<PathBuf> {
        let config_path = Self::local_config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(&config_path, toml_str).context("Failed to write config file")?;

        Ok(config_path)
    }

    /// Get absolute path to state directory
    pub fn state_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.paths.state);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }

    /// Get absolute path to logs directory
    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig {
                state: ".claimflow".to_string(), // Relative to cwd
            },
            wizard: WizardConfig::default(),
            bridge: BridgeConfig::default(),
            backend: BackendConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.bridge.ack_timeout(), Duration::from_secs(10));
        assert_eq!(config.bridge.redirect_delay(), Duration::from_millis(2000));
        assert!(config.wizard.checkpoint_on_advance);
        assert!(config.backend.base_url.is_none());
        assert!(config.logs_path().ends_with("logs"));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [paths]
            state = "/tmp/claimflow"

            [bridge]
            form_url = "https://forms.example.test/claim"
            "#,
        )
        .unwrap();
        assert_eq!(config.bridge.form_url, "https://forms.example.test/claim");
        assert_eq!(config.bridge.ack_timeout_secs, 10);
        assert_eq!(config.state_path(), PathBuf::from("/tmp/claimflow"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_defaults_roundtrip_through_toml() {
        let toml_str = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.bridge.waiting_route, default_waiting_route());
        assert_eq!(parsed.backend.timeout_secs, 15);
    }
}
