//! Configuration file management for traffic-scope.
//!
//! Reads/writes `~/.traffic-scope/config.yaml` with tracker thresholds,
//! server bind address, and fallback ownship values for replay/serve.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::tracker::DEFAULT_MAX_AGE_SEC;
use crate::types::{OwnshipReference, Result, TrafficError};

/// Full configuration structure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub tracker: TrackerConfig,
    pub server: ServerConfig,
    pub ownship: OwnshipDefaults,
}

/// Thresholds applied by the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerConfig {
    /// Targets farther than this are dropped. 0 disables the filter.
    pub ignore_beyond_distance_mi: f64,
    /// Targets silent for longer than this are evicted by a sweep.
    pub max_age_sec: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            ignore_beyond_distance_mi: 0.0,
            max_age_sec: DEFAULT_MAX_AGE_SEC,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.ignore_beyond_distance_mi.is_finite() || self.ignore_beyond_distance_mi < 0.0 {
            return Err(TrafficError::Config(format!(
                "ignore_beyond_distance_mi must be >= 0, got {}",
                self.ignore_beyond_distance_mi
            )));
        }
        if !self.max_age_sec.is_finite() || self.max_age_sec <= 0.0 {
            return Err(TrafficError::Config(format!(
                "max_age_sec must be > 0, got {}",
                self.max_age_sec
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

/// Ownship values used until a live snapshot arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OwnshipDefaults {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub gps_alt_ft: Option<i32>,
}

impl OwnshipDefaults {
    pub fn to_reference(&self) -> OwnshipReference {
        OwnshipReference {
            lat: self.lat,
            lon: self.lon,
            gps_alt_ft: self.gps_alt_ft,
            ..Default::default()
        }
    }
}

/// Get the config directory path (`~/.traffic-scope/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".traffic-scope")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.traffic-scope/config.yaml`.
///
/// Returns default config if the file is missing or malformed.
pub fn load_config() -> Config {
    let path = config_file();
    if !path.exists() {
        return Config::default();
    }
    match load_config_from(&path) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), "ignoring config file: {e}");
            Config::default()
        }
    }
}

/// Load and parse a specific config file.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)?;
    parse_config(&text)
}

/// Save config to `~/.traffic-scope/config.yaml`.
pub fn save_config(config: &Config) -> Result<PathBuf> {
    let path = config_file();
    save_config_to(config, &path)?;
    Ok(path)
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, serialize_config(config))?;
    Ok(())
}

/// Parse simple YAML-like config text.
pub fn parse_config(text: &str) -> Result<Config> {
    let mut config = Config::default();
    let mut current_section: Option<String> = None;

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');

        let Some((key, val)) = stripped.split_once(':') else {
            return Err(TrafficError::Config(format!(
                "line {line_no}: expected `key: value`"
            )));
        };
        let key = key.trim();
        let val = val.trim();

        if !is_indented {
            current_section = if val.is_empty() {
                Some(key.to_string())
            } else {
                None
            };
            continue;
        }

        let Some(section) = current_section.as_deref() else {
            continue;
        };
        match (section, key) {
            ("tracker", "ignore_beyond_distance_mi") => {
                config.tracker.ignore_beyond_distance_mi = parse_number(val, line_no)?
            }
            ("tracker", "max_age_sec") => config.tracker.max_age_sec = parse_number(val, line_no)?,
            ("server", "host") => {
                if let Some(v) = parse_string_value(val) {
                    config.server.host = v;
                }
            }
            ("server", "port") => config.server.port = parse_number(val, line_no)?,
            ("ownship", "lat") => config.ownship.lat = parse_optional(val, line_no)?,
            ("ownship", "lon") => config.ownship.lon = parse_optional(val, line_no)?,
            ("ownship", "gps_alt_ft") => config.ownship.gps_alt_ft = parse_optional(val, line_no)?,
            _ => {}
        }
    }

    config.tracker.validate()?;
    Ok(config)
}

fn is_null(val: &str) -> bool {
    val == "null" || val == "~" || val.is_empty()
}

fn parse_string_value(val: &str) -> Option<String> {
    if is_null(val) {
        return None;
    }
    if (val.starts_with('"') && val.ends_with('"') && val.len() >= 2)
        || (val.starts_with('\'') && val.ends_with('\'') && val.len() >= 2)
    {
        return Some(val[1..val.len() - 1].to_string());
    }
    Some(val.to_string())
}

fn parse_number<T: std::str::FromStr>(val: &str, line_no: usize) -> Result<T> {
    val.parse()
        .map_err(|_| TrafficError::Config(format!("line {line_no}: invalid number `{val}`")))
}

fn parse_optional<T: std::str::FromStr>(val: &str, line_no: usize) -> Result<Option<T>> {
    if is_null(val) {
        return Ok(None);
    }
    parse_number(val, line_no).map(Some)
}

fn optional_line<T: std::fmt::Display>(key: &str, val: Option<T>) -> String {
    match val {
        Some(v) => format!("  {key}: {v}"),
        None => format!("  {key}: null"),
    }
}

/// Serialize config to YAML-like text.
pub fn serialize_config(config: &Config) -> String {
    let mut lines = vec!["# traffic-scope configuration".to_string(), String::new()];

    lines.push("tracker:".into());
    lines.push(format!(
        "  ignore_beyond_distance_mi: {}",
        config.tracker.ignore_beyond_distance_mi
    ));
    lines.push(format!("  max_age_sec: {}", config.tracker.max_age_sec));
    lines.push(String::new());

    lines.push("server:".into());
    lines.push(format!("  host: \"{}\"", config.server.host));
    lines.push(format!("  port: {}", config.server.port));
    lines.push(String::new());

    lines.push("ownship:".into());
    lines.push(optional_line("lat", config.ownship.lat));
    lines.push(optional_line("lon", config.ownship.lon));
    lines.push(optional_line("gps_alt_ft", config.ownship.gps_alt_ft));

    lines.join("\n") + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
