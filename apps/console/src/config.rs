use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use shared::RequestKind;

pub const DEFAULT_CONFIG_PATH: &str = "console.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleSettings {
    pub response_delay_ms: u64,
    pub response_timeout_ms: u64,
    pub log_filter: String,
    pub fail_kinds: Vec<RequestKind>,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            response_delay_ms: 2000,
            response_timeout_ms: 10_000,
            log_filter: "info".into(),
            fail_kinds: Vec::new(),
        }
    }
}

impl ConsoleSettings {
    pub fn response_delay(&self) -> Duration {
        Duration::from_millis(self.response_delay_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    /// Applies a flat `key = "value"` table. Unknown keys are ignored.
    pub fn apply_file_overrides(&mut self, raw: &str) -> Result<()> {
        let file_cfg: HashMap<String, String> =
            toml::from_str(raw).context("config file is not a flat table of strings")?;

        if let Some(v) = file_cfg.get("response_delay_ms") {
            self.response_delay_ms = parse_millis("response_delay_ms", v)?;
        }
        if let Some(v) = file_cfg.get("response_timeout_ms") {
            self.response_timeout_ms = parse_millis("response_timeout_ms", v)?;
        }
        if let Some(v) = file_cfg.get("log_filter") {
            self.log_filter = v.clone();
        }
        if let Some(v) = file_cfg.get("fail_kinds") {
            self.fail_kinds = parse_kinds("fail_kinds", v)?;
        }
        Ok(())
    }

    /// `APP__*` variables win over the config file.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("APP__RESPONSE_DELAY_MS") {
            self.response_delay_ms = parse_millis("APP__RESPONSE_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("APP__RESPONSE_TIMEOUT_MS") {
            self.response_timeout_ms = parse_millis("APP__RESPONSE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = lookup("APP__LOG_FILTER") {
            self.log_filter = v;
        }
        if let Some(v) = lookup("APP__FAIL_KINDS") {
            self.fail_kinds = parse_kinds("APP__FAIL_KINDS", &v)?;
        }
        Ok(())
    }
}

/// Defaults, then the config file, then the environment. An explicit `path`
/// must exist; the default `console.toml` is optional.
pub fn load_settings(path: Option<&Path>) -> Result<ConsoleSettings> {
    let mut settings = ConsoleSettings::default();

    let (path, required) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
    };

    match fs::read_to_string(&path) {
        Ok(raw) => settings
            .apply_file_overrides(&raw)
            .with_context(|| format!("invalid config file '{}'", path.display()))?,
        Err(err) if err.kind() == ErrorKind::NotFound && !required => {}
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read '{}'", path.display()));
        }
    }

    settings.apply_env_overrides(|key| std::env::var(key).ok())?;
    Ok(settings)
}

fn parse_millis(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .with_context(|| format!("{key} must be a whole number of milliseconds, got '{raw}'"))
}

fn parse_kinds(key: &str, raw: &str) -> Result<Vec<RequestKind>> {
    let mut kinds = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let kind = part
            .parse::<RequestKind>()
            .with_context(|| format!("{key} lists an unknown request kind"))?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    Ok(kinds)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
