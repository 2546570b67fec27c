//! Configuration defaults from TOML files and environment variables.
//!
//! Config is loaded in this order of precedence (highest wins):
//! 1. Environment variables (`TOOLSCRIPT_BASE_URL`, `TOOLSCRIPT_API_KEY`,
//!    `TOOLSCRIPT_MODEL`)
//! 2. TOML file specified via --config CLI flag
//! 3. ./toolscript.toml in the current directory
//! 4. $XDG_CONFIG_HOME/toolscript/toolscript.toml
//! 5. Built-in defaults
//!
//! Flags such as --ports or --credential-context never live here; they are
//! per-invocation inputs consumed by the options resolver.

use crate::error::ConfigError;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const LOCAL_CONFIG_FILE: &str = "toolscript.toml";
const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL_ID: &str = "gpt-4o";
const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1:0";
const DEFAULT_CACHE_DIR: &str = ".toolscript/cache";

/// Resolved defaults consumed by the options resolver.
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub cache: CacheOptions,
    /// Default server listen address; the flag overrides it.
    pub listen_address: String,
    pub color: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            cache: CacheOptions::default(),
            listen_address: DEFAULT_LISTEN_ADDRESS.into(),
            color: true,
        }
    }
}

/// Model API connection settings.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.into(),
            api_key: String::new(),
            model: DEFAULT_MODEL_ID.into(),
        }
    }
}

/// Source-cache settings threaded into the loader.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    pub disabled: bool,
    pub dir: PathBuf,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            disabled: false,
            dir: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }
}

// ---------------------------------------------------------------------------
// TOML file shape
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    api: FileApi,
    cache: FileCache,
    server: FileServer,
    display: FileDisplay,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileApi {
    base_url: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    /// Environment variable to read the key from instead of inlining it.
    api_key_env: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileCache {
    disabled: Option<bool>,
    dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileServer {
    listen_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileDisplay {
    color: Option<bool>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load configuration, optionally from an explicit file path.
pub fn load_config(explicit_path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = Config::default();

    let file = match explicit_path {
        // An explicitly named file must exist and parse.
        Some(path) => Some(read_config_file(Path::new(path))?),
        None => default_config_file()?,
    };
    if let Some(file) = file {
        apply_file(&mut config, file)?;
    }
    apply_env(&mut config);

    Ok(config)
}

fn default_config_file() -> Result<Option<FileConfig>, ConfigError> {
    let local = Path::new(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return read_config_file(local).map(Some);
    }
    if let Some(config_dir) = dirs::config_dir() {
        let global = config_dir.join("toolscript").join(LOCAL_CONFIG_FILE);
        if global.is_file() {
            return read_config_file(&global).map(Some);
        }
    }
    Ok(None)
}

fn read_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}

fn apply_file(config: &mut Config, file: FileConfig) -> Result<(), ConfigError> {
    if let Some(base_url) = file.api.base_url {
        config.api.base_url = base_url;
    }
    if let Some(model) = file.api.model {
        config.api.model = model;
    }
    if let Some(key) = file.api.api_key {
        config.api.api_key = key;
    }
    if let Some(env_name) = file.api.api_key_env {
        let value = env::var(&env_name).map_err(|_| {
            ConfigError::Invalid(format!("api_key_env names unset variable {env_name}"))
        })?;
        config.api.api_key = value;
    }
    if let Some(disabled) = file.cache.disabled {
        config.cache.disabled = disabled;
    }
    if let Some(dir) = file.cache.dir {
        config.cache.dir = PathBuf::from(dir);
    }
    if let Some(listen) = file.server.listen_address {
        config.listen_address = listen;
    }
    if let Some(color) = file.display.color {
        config.color = color;
    }
    Ok(())
}

fn apply_env(config: &mut Config) {
    if let Ok(base_url) = env::var("TOOLSCRIPT_BASE_URL") {
        if !base_url.is_empty() {
            config.api.base_url = base_url;
        }
    }
    if let Ok(key) = env::var("TOOLSCRIPT_API_KEY") {
        if !key.is_empty() {
            config.api.api_key = key;
        }
    }
    if let Ok(model) = env::var("TOOLSCRIPT_MODEL") {
        if !model.is_empty() {
            config.api.model = model;
        }
    }
}
