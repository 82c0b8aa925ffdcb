use crate::types::*;
use std::{
    env,
    fs,
    path::Path,
};

pub fn env_default(key: &str) -> Option<String> {
  env::var(key)
    .ok()
    .map(|value| value.trim().to_string())
    .filter(|value| !value.is_empty())
}

/// "1", "true", "yes" and "on" switch a flag on, in any case.
pub fn flag_is_set(raw: &str) -> bool {
  matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

pub fn apply_env_defaults(mut config: EngineConfig) -> EngineConfig {
  if config.stats_source_url.trim().is_empty() {
    if let Some(value) = env_default("STATS_SOURCE_URL") {
      config.stats_source_url = value;
    }
  }
  if config.stats_source_token.trim().is_empty() {
    if let Some(value) = env_default("STATS_SOURCE_TOKEN") {
      config.stats_source_token = value;
    }
  }
  if let Some(value) = env_default("SERIES_GAP_MINUTES") {
    match value.parse::<i64>() {
      Ok(minutes) if minutes > 0 => config.series_gap_minutes = minutes,
      _ => tracing::warn!("ignoring SERIES_GAP_MINUTES={value}: expected a positive number of minutes"),
    }
  }
  if let Some(value) = env_default("LOG_DIR") {
    config.log_dir = value;
  }
  if let Some(value) = env_default("RELINK_FROM_SCRATCH") {
    config.relink_from_scratch = flag_is_set(&value);
  }
  config
}

pub fn load_config_from(path: &Path) -> Result<EngineConfig, String> {
  if !path.is_file() {
    return Ok(apply_env_defaults(EngineConfig::default()));
  }
  let data = fs::read_to_string(path).map_err(|e| format!("read config {}: {e}", path.display()))?;
  let config =
    serde_json::from_str::<EngineConfig>(&data).map_err(|e| format!("parse config {}: {e}", path.display()))?;
  Ok(apply_env_defaults(config))
}

pub fn save_config_to(path: &Path, config: &EngineConfig) -> Result<(), String> {
  let payload = serde_json::to_string_pretty(config).map_err(|e| e.to_string())?;
  fs::write(path, payload).map_err(|e| format!("write config {}: {e}", path.display()))
}

/// Export variables from a `.env` file; variables already set win.
pub fn load_env_file(env_path: &Path) {
  if !env_path.is_file() {
    return;
  }
  if let Err(e) = dotenvy::from_path(env_path) {
    tracing::warn!("ignoring {}: {e}", env_path.display());
  }
}

/// Case-insensitive lookup key for team identifiers.
pub fn normalize_team_key(raw: &str) -> String {
  raw.trim().to_lowercase()
}

pub fn strip_bracket_chars(raw: &str) -> String {
  raw
    .chars()
    .filter(|ch| !matches!(ch, '[' | ']' | '(' | ')' | '{' | '}' | '<' | '>'))
    .collect::<String>()
    .trim()
    .to_string()
}

/// Order-insensitive key for a matchup between two canonical names.
pub fn pair_key(a: &str, b: &str) -> String {
  if a <= b {
    format!("{a}|{b}")
  } else {
    format!("{b}|{a}")
  }
}
