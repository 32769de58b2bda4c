use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SetupError;

/// Default split threshold: one article carries at most this many file bytes.
pub const DEFAULT_ARTICLE_SIZE: u64 = 768_000;
/// Default socket write chunk; one throughput sample is emitted per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 10_240;
/// Plain NNTP port.
pub const DEFAULT_NNTP_PORT: u16 = 119;

fn default_article_size() -> u64 {
    DEFAULT_ARTICLE_SIZE
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_port() -> u16 {
    DEFAULT_NNTP_PORT
}

fn default_connections() -> usize {
    1
}

/// `[global]` section of config.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// `From` header of every posted article.
    pub from: String,
    /// Newsgroup(s) used when no `-g` override is given.
    pub default_group: String,
    /// Optional text prepended to every subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_prefix: Option<String>,
    /// Split threshold in bytes.
    #[serde(default = "default_article_size")]
    pub article_size: u64,
    /// Socket write chunk in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            from: "ypost <ypost@localhost>".to_string(),
            default_group: "alt.binaries.test".to_string(),
            subject_prefix: None,
            article_size: DEFAULT_ARTICLE_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// One `[server.<name>]` section of config.toml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Number of concurrent connections (and queue depth) for this server.
    #[serde(default = "default_connections")]
    pub connections: usize,
    #[serde(default)]
    pub tls: bool,
    /// Skip certificate verification (self-signed servers).
    #[serde(default)]
    pub insecure_tls: bool,
}

/// Configuration file loaded from `~/.config/ypost/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PosterConfig {
    pub global: GlobalConfig,
    #[serde(default, rename = "server", skip_serializing_if = "BTreeMap::is_empty")]
    pub servers: BTreeMap<String, ServerSection>,
}

/// Resolved, validated settings for one server. Read-only for the run's duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub connections: usize,
    pub tls: bool,
    pub insecure_tls: bool,
}

impl ServerConfig {
    /// Credentials to send, if a username is configured. A missing password is sent as empty.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match self.username.as_deref() {
            Some(user) if !user.is_empty() => {
                Some((user, self.password.as_deref().unwrap_or("")))
            }
            _ => None,
        }
    }

    /// `address:port`, for logs.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// How each file's subject is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubjectMode {
    /// The same subject for every file.
    Explicit(String),
    /// The name of the file's parent directory.
    ParentDirectory,
}

/// Immutable configuration for one posting run, built once at startup and
/// shared (`Arc<RunConfig>`) by every pipeline component.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub from: String,
    /// Value of the `Newsgroups` header (comma-separated list).
    pub newsgroups: String,
    pub subject_prefix: Option<String>,
    pub article_size: u64,
    pub chunk_size: usize,
    pub subject: SubjectMode,
    pub servers: Vec<ServerConfig>,
}

impl PosterConfig {
    /// Validate the file config and combine it with the run's subject mode and
    /// optional newsgroup override into a [`RunConfig`].
    pub fn into_run_config(
        self,
        subject: SubjectMode,
        groups_override: Option<&str>,
        config_origin: &str,
    ) -> Result<RunConfig, SetupError> {
        let global = self.global;
        if global.from.trim().is_empty() {
            return Err(SetupError::MissingValue("global.from"));
        }
        let newsgroups = match groups_override.map(str::trim).filter(|g| !g.is_empty()) {
            Some(groups) => normalize_groups(groups),
            None => normalize_groups(&global.default_group),
        };
        if newsgroups.is_empty() {
            return Err(SetupError::MissingValue("global.default_group"));
        }
        if global.article_size == 0 {
            return Err(SetupError::InvalidValue {
                field: "global.article_size".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if global.chunk_size == 0 {
            return Err(SetupError::InvalidValue {
                field: "global.chunk_size".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        if let SubjectMode::Explicit(ref s) = subject {
            if s.trim().is_empty() {
                return Err(SetupError::MissingValue("subject"));
            }
        }
        if self.servers.is_empty() {
            return Err(SetupError::NoServers(config_origin.to_string()));
        }

        let mut servers = Vec::with_capacity(self.servers.len());
        for (name, section) in self.servers {
            if section.address.trim().is_empty() {
                return Err(SetupError::InvalidValue {
                    field: format!("server.{name}.address"),
                    reason: "must not be empty".to_string(),
                });
            }
            if section.connections == 0 {
                return Err(SetupError::InvalidValue {
                    field: format!("server.{name}.connections"),
                    reason: "must be at least 1".to_string(),
                });
            }
            servers.push(ServerConfig {
                name,
                address: section.address.trim().to_string(),
                port: section.port,
                username: section.username,
                password: section.password,
                connections: section.connections,
                tls: section.tls,
                insecure_tls: section.insecure_tls,
            });
        }

        Ok(RunConfig {
            from: global.from,
            newsgroups,
            subject_prefix: global.subject_prefix.filter(|p| !p.trim().is_empty()),
            article_size: global.article_size,
            chunk_size: global.chunk_size,
            subject,
            servers,
        })
    }

    /// Copy of this config with every password replaced, for display.
    pub fn redacted(&self) -> PosterConfig {
        let mut out = self.clone();
        for section in out.servers.values_mut() {
            if section.password.is_some() {
                section.password = Some("********".to_string());
            }
        }
        out
    }

    /// Serialize as config.toml text.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// `a.b.c, d.e` -> `a.b.c,d.e`
fn normalize_groups(groups: &str) -> String {
    groups
        .split(',')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("ypost")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from the default XDG path, creating a default file if none exists.
pub fn load_or_init() -> Result<PosterConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

/// Load configuration from `path`, creating a default file there if none exists.
pub fn load_or_init_at(path: &Path) -> Result<PosterConfig> {
    if !path.exists() {
        let default_cfg = PosterConfig::default();
        let toml = default_cfg.to_toml()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)
            .with_context(|| format!("failed to write default config: {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from(path)
}

/// Load configuration from an existing file.
pub fn load_from(path: &Path) -> Result<PosterConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let cfg: PosterConfig =
        toml::from_str(&data).with_context(|| format!("invalid config: {}", path.display()))?;
    Ok(cfg)
}
