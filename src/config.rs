//! Configuration: the persisted key/model store and the values resolved from it.
//!
//! Nothing here is global. `main` opens a [`FileConfigStore`], resolves a
//! [`Settings`] value from it and the environment, and hands both to the
//! pieces that need them.

use crate::error::{HowError, Result};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const API_KEY: &str = "apiKey";
pub const MODEL: &str = "model";
pub const MAX_ATTEMPTS: &str = "maxAttempts";
pub const BASE_URL: &str = "baseUrl";

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const FALLBACK_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const MOCK_ENV: &str = "HOW_USE_MOCK";

const API_KEYS_URL: &str = "https://platform.openai.com/account/api-keys";

/// Read/write access to persisted settings, keyed by name.
pub trait ConfigStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// On-disk shape of `~/.how/config.toml`.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub max_attempts: Option<u32>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Config {
    fn get(&self, key: &str) -> Option<String> {
        match key {
            API_KEY => self.api_key.clone(),
            MODEL => self.model.clone(),
            MAX_ATTEMPTS => self.max_attempts.map(|n| n.to_string()),
            BASE_URL => self.base_url.clone(),
            _ => None,
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            API_KEY => self.api_key = Some(value.to_string()),
            MODEL => self.model = Some(value.to_string()),
            MAX_ATTEMPTS => {
                let n = value
                    .parse::<u32>()
                    .map_err(|_| HowError::Config(format!("{} must be a number, got '{}'", key, value)))?;
                self.max_attempts = Some(n);
            }
            BASE_URL => self.base_url = Some(value.to_string()),
            other => return Err(HowError::Config(format!("Unknown config key '{}'", other))),
        }
        Ok(())
    }
}

/// Config store backed by a TOML file. Every `set` is written through.
pub struct FileConfigStore {
    path: PathBuf,
    config: Config,
}

impl FileConfigStore {
    /// Opens the store at `~/.how/config.toml`.
    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    /// Opens the store at `path`. A missing file is an empty config.
    pub fn open(path: PathBuf) -> Result<Self> {
        let config = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            info!("Loaded config from: {}", path.display());
            config
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };
        Ok(Self { path, config })
    }

    pub fn default_path() -> Result<PathBuf> {
        let home = home_dir().ok_or_else(|| HowError::Config("Could not find home directory".to_string()))?;
        Ok(home.join(".how").join("config.toml"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&self.config)?;
        fs::write(&self.path, content)?;
        info!("Saved config to: {}", self.path.display());
        Ok(())
    }
}

impl ConfigStore for FileConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.config.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.config.set(key, value)?;
        self.save()
    }
}

/// In-memory store, for tests and for runs that must not touch disk.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    values: HashMap<String, String>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Values in effect for one invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub max_attempts: u32,
    /// Use the offline proposal client instead of the model service.
    pub use_mock: bool,
}

impl Settings {
    /// Resolves settings from the store, falling back to `env` lookups.
    ///
    /// A stored API key takes precedence over `OPENAI_API_KEY`. The base URL
    /// comes from `OPENAI_BASE_URL` first, then the store.
    pub fn resolve<F>(store: &dyn ConfigStore, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = store
            .get(API_KEY)
            .or_else(|| env(API_KEY_ENV))
            .filter(|k| !k.trim().is_empty());

        let model = store
            .get(MODEL)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let base_url = env(BASE_URL_ENV)
            .or_else(|| store.get(BASE_URL))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let max_attempts = match store.get(MAX_ATTEMPTS) {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| HowError::Config(format!("{} must be a number, got '{}'", MAX_ATTEMPTS, raw)))?,
            None => DEFAULT_MAX_ATTEMPTS,
        };
        if max_attempts == 0 {
            return Err(HowError::Usage(format!("error: {} must be at least 1", MAX_ATTEMPTS)));
        }

        Ok(Self {
            api_key,
            model,
            base_url,
            max_attempts,
            use_mock: env(MOCK_ENV).is_some(),
        })
    }

    /// Resolves settings using the process environment.
    pub fn from_env(store: &dyn ConfigStore) -> Result<Self> {
        Self::resolve(store, |key| std::env::var(key).ok())
    }
}

/// First-run prompt for a missing API key. The key is persisted and returned.
pub fn prompt_for_api_key_with_io<R: BufRead, W: Write>(
    store: &mut dyn ConfigStore,
    input: &mut R,
    output: &mut W,
) -> Result<String> {
    writeln!(
        output,
        "Missing OpenAI API Key. You can create or find your OpenAI API key at {}.",
        API_KEYS_URL
    )?;

    loop {
        write!(output, "Paste your API key here: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(HowError::Config("No API key provided".to_string()));
        }
        let key = line.trim();
        if key.is_empty() {
            continue;
        }

        store.set(API_KEY, key)?;
        info!("API key saved to config store");
        return Ok(key.to_string());
    }
}

/// Interactive configurator behind `--config`.
///
/// Asks for an API key and a model name. Blank answers keep the current value.
pub fn configure_with_io<R: BufRead, W: Write>(
    store: &mut dyn ConfigStore,
    input: &mut R,
    output: &mut W,
) -> Result<()> {
    let current_key = store.get(API_KEY);
    let current_model = store.get(MODEL).unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let key_hint = match &current_key {
        Some(key) => mask(key),
        None => "not set".to_string(),
    };
    write!(output, "OpenAI API key [{}]: ", key_hint)?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    let key = line.trim();
    if !key.is_empty() {
        store.set(API_KEY, key)?;
    }

    write!(output, "Model [{}]: ", current_model)?;
    output.flush()?;
    line.clear();
    input.read_line(&mut line)?;
    let model = line.trim();
    if !model.is_empty() {
        store.set(MODEL, model)?;
    }

    writeln!(output, "Configuration saved.")?;
    Ok(())
}

fn mask(key: &str) -> String {
    let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
    format!("...{}", tail)
}
