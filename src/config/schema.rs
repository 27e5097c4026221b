use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on corrective retries; each one is a paid oracle round-trip.
const MAX_STRUCTURAL_RETRIES: u32 = 5;

/// Slack added on top of the worst-case oracle chain when the gateway
/// deadline is derived.
const GATEWAY_TIMEOUT_MARGIN_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model identifiers tried in order: primary first, then fallbacks.
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_models() -> Vec<String> {
    vec!["gpt-4o".into(), "gpt-4o-mini".into()]
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            api_key: None,
            base_url: default_base_url(),
            models: default_models(),
            log_level: default_log_level(),
            generation: GenerationConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Corrective retries after the first attempt on structural/contextual failure.
    #[serde(default = "default_max_structural_retries")]
    pub max_structural_retries: u32,
    #[serde(default = "default_true")]
    pub grammar_retry: bool,
    #[serde(default = "default_true")]
    pub placeholder_retry: bool,
    /// Run the ambiguity challenge on every structurally valid exercise.
    #[serde(default)]
    pub ambiguity_check: bool,
    #[serde(default = "default_oracle_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_structural_retries() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

fn default_oracle_timeout_secs() -> u64 {
    120
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_structural_retries: default_max_structural_retries(),
            grammar_retry: true,
            placeholder_retry: true,
            ambiguity_check: false,
            request_timeout_secs: default_oracle_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Whole-pipeline deadline. Unset derives it from the oracle chain; an
    /// explicit value below the worst case is rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    8787
}

fn default_max_body_bytes() -> usize {
    16_384
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            max_body_bytes: default_max_body_bytes(),
            request_timeout_secs: None,
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        let storygap_dir = home.join(".storygap");
        if !storygap_dir.exists() {
            fs::create_dir_all(&storygap_dir).context("Failed to create .storygap directory")?;
        }
        Self::load_or_init_at(&storygap_dir.join("config.toml"))
    }

    pub fn load_or_init_at(config_path: &Path) -> Result<Self> {
        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(config_path).context("Failed to read config file")?;
            let mut config: Config = toml::from_str(&contents)
                .map_err(|e| ConfigError::Load(e.to_string()))
                .context("Failed to parse config file")?;
            config.config_path = config_path.to_path_buf();
            config
        } else {
            let config = Self {
                config_path: config_path.to_path_buf(),
                ..Self::default()
            };
            config.save()?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) =
            std::env::var("STORYGAP_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY"))
            && !key.is_empty()
        {
            self.api_key = Some(key);
        }

        if let Ok(base_url) = std::env::var("STORYGAP_BASE_URL")
            && !base_url.is_empty()
        {
            self.base_url = base_url;
        }

        if let Ok(models) = std::env::var("STORYGAP_MODELS") {
            let parsed: Vec<String> = models
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(ToString::to_string)
                .collect();
            if !parsed.is_empty() {
                self.models = parsed;
            }
        }

        if let Ok(level) = std::env::var("STORYGAP_LOG_LEVEL")
            && !level.is_empty()
        {
            self.log_level = level;
        }
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.models.iter().all(|m| m.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "models must name at least one model identifier".into(),
            ));
        }
        if self.generation.max_structural_retries > MAX_STRUCTURAL_RETRIES {
            return Err(ConfigError::Validation(format!(
                "generation.max_structural_retries must be <= {MAX_STRUCTURAL_RETRIES}"
            )));
        }
        if let Some(secs) = self.gateway.request_timeout_secs {
            let worst_case = self.worst_case_pipeline_secs();
            if secs < worst_case {
                return Err(ConfigError::Validation(format!(
                    "gateway.request_timeout_secs ({secs}) is below the worst-case oracle chain ({worst_case}s)"
                )));
            }
        }
        if self.log_level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::Validation(format!(
                "unknown log_level '{}'",
                self.log_level
            )));
        }
        Ok(())
    }

    /// Longest a single request can spend waiting on the oracle: every
    /// generation call (plus its ambiguity challenge, when enabled) walking
    /// the whole model chain up to the transport timeout.
    pub fn worst_case_pipeline_secs(&self) -> u64 {
        let generation = &self.generation;
        let mut calls = 1
            + u64::from(generation.max_structural_retries)
            + u64::from(generation.placeholder_retry)
            + u64::from(generation.grammar_retry);
        if generation.ambiguity_check {
            calls *= 2;
        }
        let models = u64::try_from(self.models.len()).unwrap_or(u64::MAX);
        calls
            .saturating_mul(models)
            .saturating_mul(generation.request_timeout_secs)
    }

    /// Deadline enforced by the gateway around one pipeline run.
    pub fn gateway_timeout(&self) -> Duration {
        let secs = self.gateway.request_timeout_secs.unwrap_or_else(|| {
            self.worst_case_pipeline_secs()
                .saturating_add(GATEWAY_TIMEOUT_MARGIN_SECS)
        });
        Duration::from_secs(secs)
    }

    /// Copy safe to print: the API key is replaced by a marker.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.api_key.is_some() {
            copy.api_key = Some("[REDACTED]".into());
        }
        copy
    }
}
