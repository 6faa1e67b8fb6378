use crate::error::{KeyflowError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const HOME_ENV: &str = "KEYFLOW_HOME";
pub const PID_FILENAME: &str = "keyflow-daemon.pid";
pub const HOTKEYS_FILENAME: &str = "hotkeys.json";
pub const CONFIG_FILENAME: &str = "config.json";
pub const STATS_FILENAME: &str = "stats.json";
pub const PAUSED_FILENAME: &str = "paused";
pub const LOG_FILENAME: &str = "daemon.log";

pub const DEFAULT_COOLDOWN: f64 = 0.3;
pub const DEFAULT_PASTE_DELAY: f64 = 0.05;

/// User settings persisted in `config.json`.
///
/// `dark_mode` and `accepted_use_policy` belong to front ends and are only
/// carried through so that saving never drops them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    pub dark_mode: bool,
    pub cooldown: f64,
    pub paste_delay: f64,
    pub accepted_use_policy: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dark_mode: false,
            cooldown: DEFAULT_COOLDOWN,
            paste_delay: DEFAULT_PASTE_DELAY,
            accepted_use_policy: false,
        }
    }
}

/// Convert user supplied seconds into a duration, clamping instead of failing.
///
/// Negative values and NaN become zero, values too large to represent
/// saturate at `Duration::MAX`.
pub fn clamp_seconds(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Get the keyflow data directory
pub fn get_config_dir() -> PathBuf {
    if let Ok(dir) = env::var(HOME_ENV) {
        return PathBuf::from(dir);
    }
    env::var("HOME")
        .map(|home| PathBuf::from(home).join(".keyflow"))
        .unwrap_or_else(|_| PathBuf::from(".keyflow"))
}

/// Ensure the data directory exists, seeding empty hotkeys and default settings
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = get_config_dir();
    ensure_data_dir_at(&dir)?;
    Ok(dir)
}

pub fn ensure_data_dir_at(dir: &Path) -> Result<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)?;
    }

    let hotkeys = dir.join(HOTKEYS_FILENAME);
    if !hotkeys.exists() {
        tracing::info!("Creating hotkeys file at {}", hotkeys.display());
        fs::write(&hotkeys, "{}")?;
    }

    let config = dir.join(CONFIG_FILENAME);
    if !config.exists() {
        tracing::info!("Creating config file at {}", config.display());
        fs::write(&config, serde_json::to_string_pretty(&Settings::default())?)?;
    }

    Ok(())
}

pub fn get_pid_file_path() -> PathBuf {
    get_config_dir().join(PID_FILENAME)
}

pub fn get_hotkeys_file_path() -> PathBuf {
    get_config_dir().join(HOTKEYS_FILENAME)
}

pub fn get_settings_file_path() -> PathBuf {
    get_config_dir().join(CONFIG_FILENAME)
}

pub fn get_stats_file_path() -> PathBuf {
    get_config_dir().join(STATS_FILENAME)
}

pub fn get_paused_file_path() -> PathBuf {
    get_config_dir().join(PAUSED_FILENAME)
}

pub fn get_log_file_path() -> PathBuf {
    get_config_dir().join(LOG_FILENAME)
}

/// Parse `config.json` contents.
///
/// Every field falls back to its default on its own: a missing key, a value
/// of the wrong type or an unreadable file never rejects the rest.
pub fn parse_settings(content: &str) -> Settings {
    let defaults = Settings::default();
    let map = match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            tracing::warn!("Settings file is not a JSON object, using defaults");
            return defaults;
        }
        Err(e) => {
            tracing::warn!("Ignoring malformed settings file: {}", e);
            return defaults;
        }
    };

    Settings {
        dark_mode: flag_field(&map, "dark_mode", defaults.dark_mode),
        cooldown: seconds_field(&map, "cooldown", defaults.cooldown),
        paste_delay: seconds_field(&map, "paste_delay", defaults.paste_delay),
        accepted_use_policy: flag_field(&map, "accepted_use_policy", defaults.accepted_use_policy),
    }
}

fn flag_field(map: &Map<String, Value>, key: &str, default: bool) -> bool {
    match map.get(key) {
        None => default,
        Some(value) => value.as_bool().unwrap_or_else(|| {
            tracing::warn!("Ignoring non-boolean '{}' setting: {}", key, value);
            default
        }),
    }
}

fn seconds_field(map: &Map<String, Value>, key: &str, default: f64) -> f64 {
    let parsed = match map.get(key) {
        None => return default,
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        Some(value) => value.as_f64(),
    };
    parsed.unwrap_or_else(|| {
        tracing::warn!("Ignoring non-numeric '{}' setting, using {}s", key, default);
        default
    })
}

/// Load settings from a data directory, merging missing keys with defaults
pub fn load_settings_at(dir: &Path) -> Result<Settings> {
    let path = dir.join(CONFIG_FILENAME);
    if !path.exists() {
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(&path)?;
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }

    Ok(parse_settings(&content))
}

pub fn save_settings_at(dir: &Path, settings: &Settings) -> Result<()> {
    ensure_data_dir_at(dir)?;
    let serialized = serde_json::to_string_pretty(settings)?;
    fs::write(dir.join(CONFIG_FILENAME), serialized)?;
    Ok(())
}

pub fn load_settings() -> Result<Settings> {
    load_settings_at(&get_config_dir())
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_at(&get_config_dir(), settings)
}

/// Check if daemon is running
pub fn is_daemon_running() -> Result<Option<u32>> {
    let pid_file = get_pid_file_path();

    if !pid_file.exists() {
        return Ok(None);
    }

    let pid_str = fs::read_to_string(&pid_file)?;
    let pid = pid_str
        .trim()
        .parse::<u32>()
        .map_err(|_| KeyflowError::InvalidPid)?;

    #[cfg(unix)]
    {
        let alive = std::process::Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .status()
            .map(|status| status.success())
            .unwrap_or(false);

        if alive {
            return Ok(Some(pid));
        }
        // Stale PID file left by a killed worker
        let _ = fs::remove_file(&pid_file);
        Ok(None)
    }

    // For non-Unix systems, assume it's running if PID file exists
    #[cfg(not(unix))]
    {
        Ok(Some(pid))
    }
}
