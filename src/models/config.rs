//! Application configuration.
//!
//! Settings come from `/etc/skconf/config.toml`, then the user config file,
//! then `SKCONF_*` environment variables. Invalid values are replaced by their
//! defaults with a warning, unless `SKCONF_STRICT_CONFIG` is set, in which case
//! loading fails.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,

    pub refresh: RefreshConfig,

    pub display: DisplayConfig,

    pub behavior: BehaviorConfig,
}

/// Notebook server connection
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the notebook server, including any user prefix
    /// Example: "https://hub.example.org/user/jdoe/"
    pub url: String,

    /// API token sent as `Authorization: token <TOKEN>`
    pub token: Option<String>,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8888/".to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Status poll interval while the panel is visible, in milliseconds
    pub visible_interval_ms: u64,

    /// Visibility re-check interval while the panel is hidden, in milliseconds
    pub hidden_interval_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            visible_interval_ms: 2000,
            hidden_interval_ms: 500,
        }
    }
}

/// Minimum allowed poll interval in milliseconds (prevents tight polling loops)
const MIN_VISIBLE_INTERVAL_MS: u64 = 250;

/// Minimum visibility re-check interval in milliseconds
const MIN_HIDDEN_INTERVAL_MS: u64 = 50;

/// Fields in RefreshConfig that require interval validation.
#[derive(Clone, Copy)]
enum RefreshField {
    VisibleInterval,
    HiddenInterval,
}

impl RefreshField {
    /// Returns the config key for error messages (e.g., "visible_interval_ms").
    const fn as_str(self) -> &'static str {
        match self {
            Self::VisibleInterval => "visible_interval_ms",
            Self::HiddenInterval => "hidden_interval_ms",
        }
    }
}

/// Validate that an interval value meets the minimum requirement.
/// In non-strict mode, corrects invalid values to the default and adds a warning.
/// In strict mode, returns an error for invalid values.
fn validate_interval(
    value: &mut u64,
    field: RefreshField,
    min: u64,
    default: u64,
    strict: bool,
    warnings: &mut Vec<String>,
) -> Result<(), String> {
    if *value < min {
        let field_name = field.as_str();
        let msg = format!("refresh.{field_name} must be at least {min} ms, got {value}");
        if strict {
            return Err(msg);
        }
        warnings.push(format!("{msg} - using default ({default})"));
        *value = default;
    }
    Ok(())
}

impl RefreshConfig {
    /// Validate refresh configuration values.
    /// Returns a list of warnings for invalid values that were corrected to defaults.
    /// If `strict` is true, returns Err instead of correcting values.
    pub fn validate(&mut self, strict: bool) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();
        let defaults = Self::default();

        validate_interval(
            &mut self.visible_interval_ms,
            RefreshField::VisibleInterval,
            MIN_VISIBLE_INTERVAL_MS,
            defaults.visible_interval_ms,
            strict,
            &mut warnings,
        )?;

        validate_interval(
            &mut self.hidden_interval_ms,
            RefreshField::HiddenInterval,
            MIN_HIDDEN_INTERVAL_MS,
            defaults.hidden_interval_ms,
            strict,
            &mut warnings,
        )?;

        Ok(warnings)
    }

    #[must_use]
    pub fn visible_interval(&self) -> Duration {
        Duration::from_millis(self.visible_interval_ms)
    }

    #[must_use]
    pub fn hidden_interval(&self) -> Duration {
        Duration::from_millis(self.hidden_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Theme name
    pub theme: String,

    /// Show the side panel (configuration + allocations) in the TUI
    pub side_panel: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            theme: "dark".to_string(),
            side_panel: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Require confirmation before killing allocations
    pub confirm_cancel: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            confirm_cancel: true,
        }
    }
}

impl AppConfig {
    /// System-wide config file
    pub const SYSTEM_CONFIG_PATH: &'static str = "/etc/skconf/config.toml";

    /// Get the user config file path, respecting XDG_CONFIG_HOME
    ///
    /// Resolution order:
    /// 1. $XDG_CONFIG_HOME/skconf/config.toml (if XDG_CONFIG_HOME is set)
    /// 2. $HOME/.config/skconf/config.toml (if HOME is set)
    /// 3. dirs::config_dir()/skconf/config.toml (fallback using dirs crate)
    /// 4. None if no config directory can be determined
    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
            && !xdg_config.is_empty()
        {
            return Some(PathBuf::from(xdg_config).join("skconf/config.toml"));
        }

        if let Some(home) = std::env::var_os("HOME") {
            return Some(PathBuf::from(home).join(".config/skconf/config.toml"));
        }

        dirs::config_dir().map(|dir| dir.join("skconf/config.toml"))
    }

    /// Load configuration from files and environment.
    /// Returns the config and any warnings encountered during loading.
    ///
    /// In strict mode the first problem is returned as an error instead.
    pub fn load() -> Result<(Self, Vec<String>), String> {
        let mut paths = vec![PathBuf::from(Self::SYSTEM_CONFIG_PATH)];
        paths.extend(Self::user_config_path());
        Self::load_from(&paths, |key| std::env::var(key).ok())
    }

    /// Load from explicit files and an environment lookup.
    pub fn load_from(
        paths: &[PathBuf],
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, Vec<String>), String> {
        let strict = is_strict_mode(&env);
        let mut merged = toml::Table::new();
        let mut warnings = Vec::new();

        for path in paths {
            Self::load_config_file(&mut merged, path, strict, &mut warnings)?;
        }

        // Every file passed on its own, so the merged table deserializes too
        let mut config = toml::Value::Table(merged)
            .try_into::<Self>()
            .map_err(|e| format!("Config merge error: {e}"))?;

        config.apply_env_overrides(&env, strict, &mut warnings)?;

        warnings.extend(config.refresh.validate(strict)?);
        config.validate_server(strict, &mut warnings)?;

        Ok((config, warnings))
    }

    /// Load a config file, collecting warnings on parse errors but not on missing files.
    fn load_config_file(
        merged: &mut toml::Table,
        path: &Path,
        strict: bool,
        warnings: &mut Vec<String>,
    ) -> Result<(), String> {
        let problem = match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<AppConfig>(&content)
                .and_then(|_| toml::from_str::<toml::Table>(&content))
            {
                Ok(table) => {
                    tracing::debug!(path = %path.display(), "loaded config file");
                    merge_tables(merged, table);
                    return Ok(());
                }
                Err(e) => format!("Config parse error in '{}': {}", path.display(), e),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => format!("Could not read config '{}': {}", path.display(), e),
        };

        if strict {
            return Err(problem);
        }
        warnings.push(problem);
        Ok(())
    }

    fn apply_env_overrides(
        &mut self,
        env: &impl Fn(&str) -> Option<String>,
        strict: bool,
        warnings: &mut Vec<String>,
    ) -> Result<(), String> {
        if let Some(val) = env("SKCONF_URL")
            && !val.is_empty()
        {
            self.server.url = val;
        }

        // Explicit token first, then the ones Jupyter itself exports
        if let Some(token) = ["SKCONF_TOKEN", "JUPYTER_TOKEN", "JUPYTERHUB_API_TOKEN"]
            .iter()
            .filter_map(|key| env(key))
            .find(|val| !val.is_empty())
        {
            self.server.token = Some(token);
        }

        if let Some(val) = env("SKCONF_REFRESH_MS") {
            match val.parse::<u64>() {
                Ok(ms) if ms >= MIN_VISIBLE_INTERVAL_MS => {
                    self.refresh.visible_interval_ms = ms;
                }
                Ok(_) => report_env_error(
                    strict,
                    "SKCONF_REFRESH_MS",
                    &val,
                    &format!("must be at least {MIN_VISIBLE_INTERVAL_MS} ms"),
                    warnings,
                )?,
                Err(_) => report_env_error(
                    strict,
                    "SKCONF_REFRESH_MS",
                    &val,
                    "expected a positive integer (milliseconds)",
                    warnings,
                )?,
            }
        }

        if let Some(val) = env("SKCONF_THEME") {
            self.display.theme = val;
        }
        if env("SKCONF_NO_PANEL").is_some() {
            self.display.side_panel = false;
        }
        Ok(())
    }

    fn validate_server(&mut self, strict: bool, warnings: &mut Vec<String>) -> Result<(), String> {
        let url = self.server.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            let msg = format!("server.url must start with http:// or https://, got '{url}'");
            if strict {
                return Err(msg);
            }
            let default = ServerConfig::default().url;
            warnings.push(format!("{msg} - using default ({default})"));
            self.server.url = default;
        }
        if self.server.timeout_secs == 0 {
            let msg = "server.timeout_secs must be at least 1".to_string();
            if strict {
                return Err(msg);
            }
            let default = ServerConfig::default().timeout_secs;
            warnings.push(format!("{msg} - using default ({default})"));
            self.server.timeout_secs = default;
        }
        Ok(())
    }
}

/// Check if strict config mode is enabled via SKCONF_STRICT_CONFIG
fn is_strict_mode(env: &impl Fn(&str) -> Option<String>) -> bool {
    env("SKCONF_STRICT_CONFIG")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Report an environment variable error, failing if strict mode is enabled
/// Overlay `other` onto `base`, key by key; nested tables merge recursively.
fn merge_tables(base: &mut toml::Table, other: toml::Table) {
    for (key, value) in other {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(overlay)) => {
                merge_tables(existing, overlay);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

fn report_env_error(
    strict: bool,
    var_name: &str,
    value: &str,
    reason: &str,
    warnings: &mut Vec<String>,
) -> Result<(), String> {
    let msg = format!("Invalid value '{value}' for {var_name}: {reason}");
    if strict {
        return Err(msg);
    }
    warnings.push(format!("{msg} - using default"));
    Ok(())
}
