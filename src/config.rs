use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

/// The two LLM providers the pipeline coordinates: `research` produces the
/// long-form research document, `writer` produces the article body plus
/// related-article suggestions.
#[derive(Debug, Deserialize, Clone)]
pub struct ProvidersConfig {
    pub research: ProviderConfig,
    pub writer: ProviderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    /// API dialect: `"openai"` (chat completions) or `"anthropic"` (messages).
    pub kind: String,
    pub model: String,
    /// Environment variable holding the API key. The key itself never
    /// lives in the config file.
    pub api_key_env: String,
    /// Override the API base URL (useful for proxies and tests).
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    3
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_temperature() -> f64 {
    0.7
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// Attempts for the generate-and-parse sequence before a malformed
    /// completion becomes fatal.
    #[serde(default = "default_parse_attempts")]
    pub parse_attempts: u32,
    /// Fixed sleep between articles in batch generation, to respect
    /// provider rate limits.
    #[serde(default = "default_pacing_secs")]
    pub pacing_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            parse_attempts: default_parse_attempts(),
            pacing_secs: default_pacing_secs(),
        }
    }
}

fn default_parse_attempts() -> u32 {
    3
}
fn default_pacing_secs() -> u64 {
    2
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    for (label, provider) in [
        ("providers.research", &config.providers.research),
        ("providers.writer", &config.providers.writer),
    ] {
        match provider.kind.as_str() {
            "openai" | "anthropic" => {}
            other => anyhow::bail!(
                "Unknown provider kind for {}: '{}'. Must be openai or anthropic.",
                label,
                other
            ),
        }
        if provider.model.is_empty() {
            anyhow::bail!("{}.model must not be empty", label);
        }
        if provider.api_key_env.is_empty() {
            anyhow::bail!("{}.api_key_env must not be empty", label);
        }
        if !(0.0..=2.0).contains(&provider.temperature) {
            anyhow::bail!("{}.temperature must be in [0.0, 2.0]", label);
        }
    }

    if config.generation.parse_attempts == 0 {
        anyhow::bail!("generation.parse_attempts must be >= 1");
    }

    Ok(config)
}
