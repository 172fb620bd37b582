use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::MgsError;

pub const DEFAULT_HOST: &str = "https://metagenscope.com";
pub const CONFIG_FILE_NAME: &str = ".metagenscope.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Result types skipped when cataloging a local repository.
    #[serde(default)]
    pub unsupported_result_types: Vec<String>,
}

/// Credential store backed by a JSON file in the user's home directory.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new() -> Result<Self, MgsError> {
        if let Ok(path) = std::env::var("METAGENSCOPE_CONFIG") {
            if !path.trim().is_empty() {
                return Ok(Self::with_path(PathBuf::from(path.trim())));
            }
        }
        let path = BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(CONFIG_FILE_NAME))
            .ok_or_else(|| MgsError::Filesystem("unable to resolve home directory".to_string()))?;
        Ok(Self::with_path(path))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file reads as the default config.
    pub fn load(&self) -> Result<Config, MgsError> {
        if !self.path.exists() {
            return Ok(Config::default());
        }
        let content =
            fs::read_to_string(&self.path).map_err(|_| MgsError::ConfigRead(self.path.clone()))?;
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_json::from_str(&content).map_err(|err| MgsError::ConfigParse(err.to_string()))
    }

    pub fn save(&self, config: &Config) -> Result<(), MgsError> {
        let dir = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|err| MgsError::Filesystem(err.to_string()))?;

        let json = serde_json::to_string_pretty(config)
            .map_err(|err| MgsError::ConfigParse(err.to_string()))?;
        let mut temp =
            NamedTempFile::new_in(dir).map_err(|err| MgsError::Filesystem(err.to_string()))?;
        temp.write_all(json.as_bytes())
            .and_then(|_| temp.write_all(b"\n"))
            .map_err(|err| MgsError::Filesystem(err.to_string()))?;
        temp.persist(&self.path)
            .map_err(|err| MgsError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn get_token(&self) -> Result<Option<String>, MgsError> {
        Ok(self
            .load()?
            .token
            .filter(|token| !token.trim().is_empty()))
    }

    pub fn set_token(&self, token: &str) -> Result<(), MgsError> {
        let mut config = self.load()?;
        config.token = Some(token.to_string());
        self.save(&config)
    }
}

/// Connection settings resolved once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub host: String,
    pub token: Option<String>,
}

impl Settings {
    /// Precedence: explicit value, then environment, then config file, then default.
    pub fn resolve(host: Option<String>, token: Option<String>, config: &Config) -> Self {
        let host = host
            .or_else(|| env_value("METAGENSCOPE_HOST"))
            .or_else(|| config.host.clone())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let token = token
            .or_else(|| env_value("METAGENSCOPE_TOKEN"))
            .or_else(|| config.token.clone())
            .filter(|token| !token.trim().is_empty());
        Self {
            host: host.trim_end_matches('/').to_string(),
            token,
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
