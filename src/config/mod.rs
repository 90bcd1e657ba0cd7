// SPDX-License-Identifier: MIT

//! Configuration management for Vetter

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Result, VetterError};

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Twitter API credentials
    #[serde(default)]
    pub twitter: TwitterConfig,

    /// Gemini classification service settings
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Audit pipeline settings
    #[serde(default)]
    pub audit: AuditConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TwitterConfig {
    /// OAuth 2.0 bearer token
    pub bearer_token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-call timeout for classification requests
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AuditConfig {
    /// Items per classification request (capped at 20)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Default path for the markdown report
    #[serde(default = "default_report_path")]
    pub report_path: String,
    /// Character cap applied to item text when building the prompt.
    /// Stored text is never truncated.
    #[serde(default = "default_prompt_text_cap")]
    pub prompt_text_cap: usize,
    /// Character cap for the Text column of the CSV export
    #[serde(default = "default_csv_text_cap")]
    pub csv_text_cap: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

// Default value functions
fn default_model() -> String { "gemini-1.5-flash".to_string() }
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_timeout() -> u64 { 45 }
fn default_batch_size() -> usize { 20 }
fn default_report_path() -> String { "audit_report.md".to_string() }
fn default_prompt_text_cap() -> usize { 1000 }
fn default_csv_text_cap() -> usize { 500 }
fn default_db_path() -> String { "vetter.db".to_string() }

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            report_path: default_report_path(),
            prompt_text_cap: default_prompt_text_cap(),
            csv_text_cap: default_csv_text_cap(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            twitter: TwitterConfig::default(),
            gemini: GeminiConfig::default(),
            audit: AuditConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)
                .map_err(|e| VetterError::Config(format!("Failed to parse config: {}", e)))?
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.is_empty() {
                config.gemini.api_key = Some(key);
            }
        }
        if let Ok(token) = std::env::var("TWITTER_BEARER_TOKEN") {
            if !token.is_empty() {
                config.twitter.bearer_token = Some(token);
            }
        }

        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// The Gemini credential, required before an audit run starts
    pub fn require_gemini_key(&self) -> Result<&str> {
        self.gemini
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                VetterError::Config(
                    "Gemini API key not configured. Set GEMINI_API_KEY or add it to the config file"
                        .to_string(),
                )
            })
    }

    /// The Twitter bearer token, required before a fetch run starts
    pub fn require_bearer_token(&self) -> Result<&str> {
        self.twitter
            .bearer_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                VetterError::Config(
                    "Twitter bearer token not configured. Set TWITTER_BEARER_TOKEN or add it to the config file"
                        .to_string(),
                )
            })
    }
}
