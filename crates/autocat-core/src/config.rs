//! Configuration for autocat
//!
//! Config is resolved once at startup and handed to each client's constructor:
//! 1. Optional TOML file (explicit path, else ~/.config/autocat/config.toml if present)
//! 2. Environment variables override file values
//!
//! Environment variables:
//! - `FIREFLY_URL`: Firefly III base URL (required)
//! - `FIREFLY_PERSONAL_TOKEN`: Personal access token (required)
//! - `FIREFLY_TAG`: Marker tag added to classified transactions (default: "AI categorized")
//! - `AI_BACKEND`: `openai_compatible` (default) or `mock`
//! - `OPENAI_BASE_URL`: Chat completions base URL (default: https://api.openai.com/v1);
//!   `BASE_URL` is accepted when it is not set
//! - `OPENAI_API_KEY`: API key (required for openai_compatible)
//! - `OPENAI_MODEL`: Model name (default: gpt-4o-mini)
//! - `CLASSIFY_STRATEGY`: `json` (default), `label` or `function`
//! - `CLASSIFY_REJECT_ON`: `category` (default) or `category_and_budget`
//! - `AUTOCAT_PROMPTS_DIR`: Prompt override directory

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{PromptStrategy, RejectionPolicy};

pub const DEFAULT_TAG: &str = "AI categorized";
pub const DEFAULT_MODEL_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub ledger: LedgerConfig,
    pub model: ModelConfig,
    pub classification: ClassificationConfig,
}

/// Firefly III connection settings
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Base URL without trailing slash
    pub url: String,
    pub token: String,
    /// Marker tag appended to every classified transaction
    pub tag: String,
}

/// Which model backend to construct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    OpenAICompatible,
    Mock,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai_compatible" | "openai" | "vllm" | "localai" | "llamacpp" => {
                Ok(Self::OpenAICompatible)
            }
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown AI_BACKEND: {}", s)),
        }
    }
}

/// Model provider settings
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub backend: BackendKind,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
}

/// Classification behaviour
#[derive(Debug, Clone, Default)]
pub struct ClassificationConfig {
    pub strategy: PromptStrategy,
    pub rejection: RejectionPolicy,
    /// Prompt override directory (None = default data dir)
    pub prompts_dir: Option<PathBuf>,
}

/// On-disk config file; every field optional so env can fill the gaps
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub ledger: FileLedger,
    pub model: FileModel,
    pub classification: FileClassification,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileLedger {
    pub url: Option<String>,
    pub token: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileModel {
    pub backend: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileClassification {
    pub strategy: Option<String>,
    pub reject_on: Option<String>,
    pub prompts_dir: Option<PathBuf>,
}

impl FileConfig {
    /// Read the explicit file, else the default file if present
    ///
    /// An explicit `path` must exist; without one an empty layer is returned.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_path(p),
            None => match default_config_path() {
                Some(p) if p.exists() => Self::from_path(&p),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Parse a TOML config file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }
}

impl Config {
    /// Load config from an optional file and the process environment
    ///
    /// An explicit `path` must exist; the default path is used only if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = FileConfig::load(path)?;
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Resolve only the prompt override directory
    ///
    /// Needs neither ledger nor model settings, so prompt inspection works
    /// before those are configured.
    pub fn load_prompts_dir(path: Option<&Path>) -> Result<Option<PathBuf>> {
        let file = FileConfig::load(path)?;
        Ok(prompts_dir(&file, |key| std::env::var(key).ok()))
    }

    /// Resolve a config from a file layer and a variable lookup
    pub fn resolve<F>(file: FileConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let prompts_dir = prompts_dir(&file, &lookup);
        let pick = |key: &str, from_file: Option<String>| {
            lookup(key).filter(|v| !v.is_empty()).or(from_file)
        };

        let url = pick("FIREFLY_URL", file.ledger.url)
            .ok_or_else(|| Error::Config("FIREFLY_URL is not set".into()))?;
        let token = pick("FIREFLY_PERSONAL_TOKEN", file.ledger.token)
            .ok_or_else(|| Error::Config("FIREFLY_PERSONAL_TOKEN is not set".into()))?;
        let tag = pick("FIREFLY_TAG", file.ledger.tag).unwrap_or_else(|| DEFAULT_TAG.to_string());

        let backend = pick("AI_BACKEND", file.model.backend)
            .map(|b| b.parse::<BackendKind>())
            .transpose()
            .map_err(Error::Config)?
            .unwrap_or_default();
        let api_key = pick("OPENAI_API_KEY", file.model.api_key);
        if backend == BackendKind::OpenAICompatible && api_key.is_none() {
            return Err(Error::Config("OPENAI_API_KEY is not set".into()));
        }
        let base_url = lookup("OPENAI_BASE_URL")
            .filter(|v| !v.is_empty())
            .or_else(|| pick("BASE_URL", file.model.base_url))
            .unwrap_or_else(|| DEFAULT_MODEL_BASE_URL.to_string());
        let model = pick("OPENAI_MODEL", file.model.model).unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let strategy = pick("CLASSIFY_STRATEGY", file.classification.strategy)
            .map(|s| s.parse::<PromptStrategy>())
            .transpose()
            .map_err(Error::Config)?
            .unwrap_or_default();
        let rejection = pick("CLASSIFY_REJECT_ON", file.classification.reject_on)
            .map(|s| s.parse::<RejectionPolicy>())
            .transpose()
            .map_err(Error::Config)?
            .unwrap_or_default();
        Ok(Self {
            ledger: LedgerConfig {
                url: url.trim_end_matches('/').to_string(),
                token,
                tag,
            },
            model: ModelConfig {
                backend,
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
                model,
            },
            classification: ClassificationConfig {
                strategy,
                rejection,
                prompts_dir,
            },
        })
    }
}

/// `AUTOCAT_PROMPTS_DIR`, else the file's `classification.prompts_dir`
fn prompts_dir<F>(file: &FileConfig, lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    lookup("AUTOCAT_PROMPTS_DIR")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| file.classification.prompts_dir.clone())
}

/// Default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("autocat").join("config.toml"))
}
