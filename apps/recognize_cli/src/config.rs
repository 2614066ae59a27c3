use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{bail, Context};
use client_core::{
    file::{DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_MAX_UPLOAD_BYTES},
    orchestrator::{DEFAULT_POLL_INTERVAL, DEFAULT_STALL_WARNING_AFTER},
    OrchestratorConfig, UploadPolicy,
};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "recognizer.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub poll_interval_ms: u64,
    pub stall_warning_secs: u64,
    pub output_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub allowed_extensions: Vec<String>,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".into(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            stall_warning_secs: DEFAULT_STALL_WARNING_AFTER.as_secs(),
            output_dir: PathBuf::from("."),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            log_level: "info".into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileSettings {
    server_url: Option<String>,
    poll_interval_ms: Option<u64>,
    stall_warning_secs: Option<u64>,
    output_dir: Option<PathBuf>,
    max_upload_bytes: Option<u64>,
    allowed_extensions: Option<Vec<String>>,
    log_level: Option<String>,
}

/// Defaults, then the TOML file, then environment. An explicitly named file
/// must exist; the default one is optional. The result is not normalized yet,
/// since command-line flags still apply on top.
pub fn load_settings(explicit_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    let (path, required) = match explicit_path {
        Some(path) => (path, true),
        None => (Path::new(DEFAULT_CONFIG_FILE), false),
    };
    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("failed to parse config file '{}'", path.display()))?;
            settings.apply_file(file_cfg);
        }
        Err(error) if required => {
            return Err(error)
                .with_context(|| format!("failed to read config file '{}'", path.display()));
        }
        Err(_) => {}
    }

    settings.apply_env(|key| std::env::var(key).ok());
    Ok(settings)
}

impl Settings {
    fn apply_file(&mut self, file_cfg: FileSettings) {
        if let Some(v) = file_cfg.server_url {
            self.server_url = v;
        }
        if let Some(v) = file_cfg.poll_interval_ms {
            self.poll_interval_ms = v;
        }
        if let Some(v) = file_cfg.stall_warning_secs {
            self.stall_warning_secs = v;
        }
        if let Some(v) = file_cfg.output_dir {
            self.output_dir = v;
        }
        if let Some(v) = file_cfg.max_upload_bytes {
            self.max_upload_bytes = v;
        }
        if let Some(v) = file_cfg.allowed_extensions {
            self.allowed_extensions = v;
        }
        if let Some(v) = file_cfg.log_level {
            self.log_level = v;
        }
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("RECOGNIZER_SERVER_URL") {
            self.server_url = v;
        }
        if let Some(v) = lookup("APP__SERVER_URL") {
            self.server_url = v;
        }

        if let Some(parsed) = lookup("APP__POLL_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.poll_interval_ms = parsed;
        }
        if let Some(parsed) = lookup("APP__STALL_WARNING_SECS").and_then(|v| v.parse().ok()) {
            self.stall_warning_secs = parsed;
        }

        if let Some(v) = lookup("APP__OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("APP__LOG_LEVEL") {
            self.log_level = v;
        }
    }

    pub fn normalize(&mut self) -> anyhow::Result<()> {
        self.server_url = self.server_url.trim().to_string();
        let url = Url::parse(&self.server_url)
            .with_context(|| format!("invalid server url '{}'", self.server_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("server url '{}' must use http or https", self.server_url);
        }

        if self.poll_interval_ms == 0 {
            self.poll_interval_ms = Settings::default().poll_interval_ms;
        }
        self.allowed_extensions = self
            .allowed_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Ok(())
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            stall_warning_after: Duration::from_secs(self.stall_warning_secs),
            upload_policy: UploadPolicy {
                allowed_extensions: self.allowed_extensions.clone(),
                max_bytes: self.max_upload_bytes,
            },
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
