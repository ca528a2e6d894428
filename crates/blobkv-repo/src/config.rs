//! Bootstrap configuration, consumed once when a repository is connected.
//!
//! | Setting | Env var | Default |
//! |---|---|---|
//! | provider | `BLOB_PROVIDER` | `transient` |
//! | identity | `BLOB_IDENTITY` | `none` |
//! | secret | `BLOB_SECRET` | empty |
//! | container | `BUCKET_NAME` | `blobkv` |
//! | basedir | `BLOB_BASEDIR` | `./blobkv-data` |
//! | page size | `BLOB_PAGE_SIZE` | `1000` |

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_PROVIDER: &str = "BLOB_PROVIDER";
pub const ENV_IDENTITY: &str = "BLOB_IDENTITY";
pub const ENV_SECRET: &str = "BLOB_SECRET";
pub const ENV_CONTAINER: &str = "BUCKET_NAME";
pub const ENV_BASEDIR: &str = "BLOB_BASEDIR";
pub const ENV_PAGE_SIZE: &str = "BLOB_PAGE_SIZE";

pub const DEFAULT_IDENTITY: &str = "none";
pub const DEFAULT_CONTAINER: &str = "blobkv";
pub const DEFAULT_BASEDIR: &str = "./blobkv-data";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported provider: {0:?} (expected \"transient\" or \"filesystem\")")]
    UnsupportedProvider(String),

    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Storage provider selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// In-process memory; nothing survives the process.
    #[default]
    Transient,
    /// One directory per container below `basedir`.
    Filesystem,
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "transient" => Ok(Self::Transient),
            "filesystem" => Ok(Self::Filesystem),
            _ => Err(ConfigError::UnsupportedProvider(s.to_string())),
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Filesystem => write!(f, "filesystem"),
        }
    }
}

/// Access secret. Never printed by `Debug` and never serialized.
///
/// Secrets often arrive through single-line environment variables, so the
/// literal two-character sequence `\n` is turned into a real newline when
/// the secret is read in (e.g. PEM-encoded keys).
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub struct Secret(String);

impl Secret {
    pub fn new(raw: &str) -> Self {
        Self(unescape_newlines(raw))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Secret {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(<empty>)")
        } else {
            f.write_str("Secret(<redacted>)")
        }
    }
}

/// Replace literal `\n` escape sequences with newlines.
pub fn unescape_newlines(raw: &str) -> String {
    raw.replace("\\n", "\n")
}

/// Settings for connecting a [`BlobRepository`](crate::BlobRepository).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub provider: Provider,
    /// Access identity handed to the provider.
    pub identity: String,
    #[serde(skip_serializing)]
    pub secret: Secret,
    /// The single container all keys live in.
    pub container: String,
    /// Base directory of the `filesystem` provider.
    pub basedir: PathBuf,
    /// Maximum entries per listing page requested from the backend.
    pub page_size: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Transient,
            identity: DEFAULT_IDENTITY.to_string(),
            secret: Secret::default(),
            container: DEFAULT_CONTAINER.to_string(),
            basedir: PathBuf::from(DEFAULT_BASEDIR),
            page_size: blobkv_store::DEFAULT_PAGE_SIZE,
        }
    }
}

impl RepositoryConfig {
    /// Read settings from the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`. Unset and empty variables fall back
    /// to the default, except the secret, whose default is empty anyway.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(provider) = get(ENV_PROVIDER) {
            config.provider = provider.parse()?;
        }
        if let Some(identity) = get(ENV_IDENTITY) {
            config.identity = identity;
        }
        if let Some(secret) = lookup(ENV_SECRET) {
            config.secret = Secret::new(&secret);
        }
        if let Some(container) = get(ENV_CONTAINER) {
            config.container = container;
        }
        if let Some(basedir) = get(ENV_BASEDIR) {
            config.basedir = PathBuf::from(basedir);
        }
        if let Some(page_size) = get(ENV_PAGE_SIZE) {
            config.page_size = page_size
                .trim()
                .parse()
                .map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
                    key: ENV_PAGE_SIZE,
                    value: page_size.clone(),
                    reason: e.to_string(),
                })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.container.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: ENV_CONTAINER,
                value: self.container.clone(),
                reason: "container name must not be empty".into(),
            });
        }
        if self.page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: ENV_PAGE_SIZE,
                value: "0".into(),
                reason: "page size must be at least 1".into(),
            });
        }
        Ok(())
    }
}
