//! Configuration: an optional TOML file, the environment and the command line, resolved once
//! into [`Settings`].

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::Deserialize;
use url::Url;

use crate::{
    cli::{Cli, SourceKind},
    date::SortOrder,
    error::ExportError,
};

/// Environment variables consulted for the SerpAPI key, in order.
pub const API_KEY_VARS: &[&str] = &["SERPAPI_API_KEY", "API_KEY"];

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Contents of `scholar-export.toml`. Every key is optional.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ConfigFile {
    pub serpapi: SerpApiConfig,
    pub scrape: ScrapeConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SerpApiConfig {
    #[serde(deserialize_with = "deserialize_env_var")]
    pub api_key: Option<String>,
    pub base_url: String,
    pub delay_ms: u64,
    pub page_size: u32,
    pub language: String,
}

impl Default for SerpApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://serpapi.com/search.json".to_string(),
            delay_ms: 5000,
            page_size: 100,
            language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub base_url: String,
    pub delay_ms: u64,
    pub page_size: usize,
    pub user_agent: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://scholar.google.com".to_string(),
            delay_ms: 1000,
            page_size: 100,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub order: SortOrder,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            order: SortOrder::default(),
        }
    }
}

/// Deserialize a string that may be an environment variable reference like `${VAR}`
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand `${VAR}` to the variable's value; anything else is taken literally.
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl ConfigFile {
    /// Load the configuration file.
    ///
    /// An explicit path must exist. Otherwise the search order is:
    /// 1. ./scholar-export.toml
    /// 2. the user config directory, e.g. ~/.config/scholar-export/config.toml
    ///
    /// Without any file, defaults are used.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let local_config = PathBuf::from("scholar-export.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(dirs) = directories::ProjectDirs::from("", "", "scholar-export") {
            let user_config = dirs.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Everything a run needs, with precedence already applied.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: SourceSettings,
    pub output_dir: PathBuf,
    pub order: SortOrder,
}

#[derive(Debug, Clone)]
pub enum SourceSettings {
    SerpApi(SerpApiSettings),
    Scrape(ScrapeSettings),
}

#[derive(Debug, Clone)]
pub struct SerpApiSettings {
    pub api_key: String,
    pub base_url: Url,
    pub delay: Duration,
    pub page_size: u32,
    pub language: String,
}

#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub base_url: Url,
    pub delay: Duration,
    pub page_size: usize,
    pub user_agent: String,
}

impl Settings {
    /// Combine command line flags, environment (through `env`) and the config file.
    ///
    /// Fails with [`ExportError::MissingCredential`] when SerpAPI is selected and no key is
    /// available, so nothing touches the network without one.
    pub fn resolve(
        cli: &Cli,
        file: ConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let source = match cli.source {
            SourceKind::Serpapi => {
                let cfg = file.serpapi;
                let present = |k: &String| !k.trim().is_empty();
                let api_key = API_KEY_VARS
                    .iter()
                    .find_map(|&var| env(var).filter(present))
                    .or(cfg.api_key.filter(present))
                    .ok_or(ExportError::MissingCredential {
                        source_name: "SerpAPI",
                    })?;
                SourceSettings::SerpApi(SerpApiSettings {
                    api_key: api_key.trim().to_string(),
                    base_url: base_url(cli.base_url.as_ref(), &cfg.base_url)?,
                    delay: Duration::from_millis(cli.delay_ms.unwrap_or(cfg.delay_ms)),
                    page_size: cfg.page_size,
                    language: cfg.language,
                })
            }
            SourceKind::Scrape => {
                let cfg = file.scrape;
                SourceSettings::Scrape(ScrapeSettings {
                    base_url: base_url(cli.base_url.as_ref(), &cfg.base_url)?,
                    delay: Duration::from_millis(cli.delay_ms.unwrap_or(cfg.delay_ms)),
                    page_size: cfg.page_size.max(1),
                    user_agent: cfg.user_agent,
                })
            }
        };

        Ok(Settings {
            source,
            output_dir: cli.output_dir.clone().unwrap_or(file.output.dir),
            order: cli.order.unwrap_or(file.output.order),
        })
    }
}

fn base_url(flag: Option<&Url>, configured: &str) -> Result<Url> {
    match flag {
        Some(url) => Ok(url.clone()),
        None => Url::parse(configured).with_context(|| format!("invalid base_url: {configured}")),
    }
}
