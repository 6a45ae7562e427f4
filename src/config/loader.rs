//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::{Config, LogFormat};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "UART_ENGINE";

/// Config file name
const CONFIG_FILE_NAME: &str = "uart-engine.toml";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "UART_ENGINE_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `UART_ENGINE_CONFIG` environment variable (explicit path)
    /// 2. `./uart-engine.toml` (current directory)
    /// 3. `uart-engine.toml` in the platform config directory
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override file values in every case.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };
        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Defaults plus environment overrides; malformed overrides are skipped.
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        if let Err(e) = apply_env_overrides(&mut config) {
            debug!("Ignoring environment override: {}", e);
        }

        Self {
            config_path: None,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to the file it was loaded from.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self
            .config_path
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("No config file path set".to_string()))?;

        save_to_file(&self.config, path)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
        debug!("{} points at missing file {}", CONFIG_PATH_ENV, path.display());
    }

    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    get_default_config_path().filter(|path| path.exists())
}

/// Platform config directory for this crate (XDG, `Library/Application Support`, `%APPDATA%`).
pub fn get_default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "uart-engine").map(|dirs| dirs.config_dir().to_path_buf())
}

pub fn get_default_config_path() -> Option<PathBuf> {
    get_default_config_dir().map(|d| d.join(CONFIG_FILE_NAME))
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    debug!("Loading configuration from {}", path.display());
    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Raw value of `UART_ENGINE_<key>` with the full variable name.
fn env_value(key: &str) -> Option<(String, String)> {
    let var = format!("{}_{}", ENV_PREFIX, key);
    std::env::var(&var).ok().map(|value| (var, value))
}

fn env_parse<T: FromStr>(key: &str, what: &str) -> ConfigResult<Option<T>> {
    match env_value(key) {
        Some((var, value)) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::env_parse(var, format!("Invalid {}", what))),
        None => Ok(None),
    }
}

/// Parse an enum override using its configuration-file spelling.
fn env_enum<T: DeserializeOwned>(key: &str) -> ConfigResult<Option<T>> {
    match env_value(key) {
        Some((var, value)) => toml::Value::String(value.trim().to_lowercase())
            .try_into()
            .map(Some)
            .map_err(|e| ConfigError::env_parse(var, e.to_string())),
        None => Ok(None),
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env_value(key).map(|(_, v)| v.eq_ignore_ascii_case("true") || v == "1")
}

/// Apply environment variable overrides to the configuration.
///
/// Variables follow the pattern `UART_ENGINE_<SECTION>_<KEY>`, for example
/// `UART_ENGINE_SERIAL_SPEED=115200` or `UART_ENGINE_TESTING_PORT=/dev/ttyUSB0`.
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    let serial = &mut config.serial;
    if let Some(speed) = env_parse("SERIAL_SPEED", "baud rate")? {
        serial.speed = speed;
    }
    if let Some(bits) = env_parse("SERIAL_DATA_BITS", "data bits")? {
        serial.data_bits = bits;
    }
    if let Some(bits) = env_parse("SERIAL_STOP_BITS", "stop bits")? {
        serial.stop_bits = bits;
    }
    if let Some(parity) = env_enum("SERIAL_PARITY")? {
        serial.parity = parity;
    }
    if let Some(flow) = env_enum("SERIAL_FLOW_CONTROL")? {
        serial.flow_control = flow;
    }
    if let Some(active) = env_bool("SERIAL_ACTIVE") {
        serial.active = active;
    }
    if let Some(ms) = env_parse("SERIAL_READ_TIMEOUT_MS", "timeout")? {
        serial.read_timeout_ms = ms;
    }
    if let Some(ms) = env_parse("SERIAL_WRITE_TIMEOUT_MS", "timeout")? {
        serial.write_timeout_ms = ms;
    }

    if let Some((_, level)) = env_value("LOGGING_LEVEL") {
        config.logging.level = level;
    }
    if let Some(format) = env_enum::<LogFormat>("LOGGING_FORMAT")? {
        config.logging.format = format;
    }

    if let Some((_, port)) = env_value("TESTING_PORT") {
        config.testing.port = Some(port);
    }
    if let Some(speed) = env_parse("TESTING_SPEED", "baud rate")? {
        config.testing.speed = speed;
    }
    if let Some(loopback) = env_bool("TESTING_LOOPBACK") {
        config.testing.loopback = loopback;
    }
    if let Some(ms) = env_parse("TESTING_TIMEOUT_MS", "timeout")? {
        config.testing.timeout_ms = ms;
    }

    Ok(())
}
