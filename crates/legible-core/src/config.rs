// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LegibleError, Result};

/// Vision model backends that can produce OCR words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OcrProvider {
    /// Locally hosted model server.
    #[default]
    Ollama,
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Google,
}

impl OcrProvider {
    pub const ALL: [OcrProvider; 4] = [
        OcrProvider::Ollama,
        OcrProvider::OpenAi,
        OcrProvider::Anthropic,
        OcrProvider::Google,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
        }
    }

    /// Model used when the configuration leaves `model` empty.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Ollama => "llava",
            Self::OpenAi => "gpt-4o",
            Self::Anthropic => "claude-3-5-sonnet-20241022",
            Self::Google => "gemini-1.5-pro",
        }
    }

    /// Cloud providers need a key; the local server does not.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }

    /// Environment variables consulted for the API key, in order.
    pub fn api_key_env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::Ollama => &[],
            Self::OpenAi => &["OPENAI_API_KEY"],
            Self::Anthropic => &["ANTHROPIC_API_KEY"],
            Self::Google => &["GOOGLE_API_KEY", "GOOGLE_APPLICATION_CREDENTIALS"],
        }
    }
}

impl fmt::Display for OcrProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OcrProvider {
    type Err = LegibleError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == lower)
            .ok_or_else(|| {
                LegibleError::Config(format!(
                    "invalid OCR provider {s:?}, must be one of: ollama, openai, anthropic, google"
                ))
            })
    }
}

/// Vision OCR settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub provider: OcrProvider,
    /// Model name; empty means the provider default.
    pub model: String,
    /// API endpoint. Required for the local provider.
    pub endpoint: String,
    /// API key for cloud providers. Never serialized back out.
    #[serde(skip_serializing)]
    pub api_key: String,
    pub max_retries: u32,
    /// Sampling temperature in [0, 2]. Zero is recommended for OCR.
    pub temperature: f64,
    /// Overrides the bundled prompt template.
    pub prompt_file: Option<PathBuf>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            provider: OcrProvider::Ollama,
            model: String::new(),
            endpoint: "http://localhost:11434".into(),
            api_key: String::new(),
            max_retries: 3,
            temperature: 0.0,
            prompt_file: None,
        }
    }
}

impl OcrConfig {
    /// Configured model, or the provider default.
    pub fn effective_model(&self) -> &str {
        if self.model.is_empty() {
            self.provider.default_model()
        } else {
            &self.model
        }
    }

    /// Fill an empty `api_key` from the provider's environment variables.
    pub fn load_api_key_from_env(&mut self) {
        if !self.api_key.is_empty() {
            return;
        }
        for var in self.provider.api_key_env_vars() {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    self.api_key = value;
                    return;
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(LegibleError::Config(format!(
                "OCR temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        if self.provider.requires_api_key() && self.api_key.is_empty() {
            return Err(LegibleError::Config(format!(
                "API key not found for provider {}, set {}",
                self.provider,
                self.provider.api_key_env_vars().join(" or ")
            )));
        }
        if !self.provider.requires_api_key() && self.endpoint.is_empty() {
            return Err(LegibleError::Config(format!(
                "endpoint cannot be empty for provider {}",
                self.provider
            )));
        }
        Ok(())
    }
}

/// Settings consumed by the long-running service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Time between scheduled syncs.
    #[serde(with = "duration_secs")]
    pub sync_interval: Duration,
    /// Upper bound on a single sync run.
    #[serde(with = "duration_secs")]
    pub sync_timeout: Duration,
    /// Address for the status listener, e.g. `127.0.0.1:8080`. Disabled when unset.
    pub health_addr: Option<String>,
    pub pid_file: Option<PathBuf>,
    /// How long the status listener gets to drain on shutdown.
    #[serde(with = "duration_secs")]
    pub shutdown_grace: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            sync_interval: Duration::from_secs(5 * 60),
            sync_timeout: Duration::from_secs(30 * 60),
            health_addr: None,
            pid_file: None,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Persistent application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegibleConfig {
    /// Root of the mirrored output tree.
    pub output_dir: PathBuf,
    /// Sync ledger location.
    pub state_file: PathBuf,
    /// Credential file holding the device and user tokens.
    pub token_file: PathBuf,
    /// Label filter; empty means every document.
    pub labels: Vec<String>,
    pub ocr_enabled: bool,
    pub ocr: OcrConfig,
    pub daemon: DaemonConfig,
}

impl Default for LegibleConfig {
    fn default() -> Self {
        let base = legible_home();
        Self {
            output_dir: base.join("output"),
            state_file: base.join("state.json"),
            token_file: base.join("token.json"),
            labels: Vec::new(),
            ocr_enabled: true,
            ocr: OcrConfig::default(),
            daemon: DaemonConfig::default(),
        }
    }
}

impl LegibleConfig {
    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LegibleError::Config(format!("cannot read config {}: {e}", path.display()))
        })?;
        let mut config: LegibleConfig = serde_json::from_str(&raw).map_err(|e| {
            LegibleError::Config(format!("cannot parse config {}: {e}", path.display()))
        })?;
        config.ocr.load_api_key_from_env();
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(LegibleError::Config("output_dir cannot be empty".into()));
        }
        if self.state_file.as_os_str().is_empty() {
            return Err(LegibleError::Config("state_file cannot be empty".into()));
        }
        if self.daemon.sync_interval.is_zero() {
            return Err(LegibleError::Config(
                "sync_interval must be positive".into(),
            ));
        }
        if self.ocr_enabled {
            self.ocr.validate()?;
        }
        Ok(())
    }
}

/// `$HOME/.legible`, or `./.legible` when no home directory is known.
pub fn legible_home() -> PathBuf {
    match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => PathBuf::from(home).join(".legible"),
        _ => PathBuf::from(".legible"),
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
