use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use directories_next::ProjectDirs;
use serde::Deserialize;

use crate::column::ConsistencyLevel;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
    pub base_url: String,
    pub database: Database,
    #[serde(default)]
    pub limits: Limits,
    #[serde(default)]
    pub auth: Auth,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub kind: DatabaseKind,
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_keyspace")]
    pub keyspace: String,
    #[serde(default = "default_column_family")]
    pub column_family: String,
    #[serde(default)]
    pub consistency: ConsistencyLevel,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Only used by the memory backend.
    #[serde(default = "default_replicas")]
    pub replicas: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    Memory,
    #[cfg(feature = "sqlite")]
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Limits {
    pub max_upload_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_upload_size: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Auth {
    /// Header set by the front proxy to the authenticated user name.
    pub user_header: String,
}

impl Default for Auth {
    fn default() -> Self {
        Auth {
            user_header: "x-remote-user".to_owned(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_keyspace() -> String {
    "hashbin".to_owned()
}

fn default_column_family() -> String {
    "pastes".to_owned()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_max_connections() -> u32 {
    8
}

fn default_replicas() -> usize {
    1
}

impl Config {
    /// Read the config file, falling back to the platform config directory.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_owned(),
            None => default_path().context("could not determine config directory")?,
        };

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        contents.parse()
    }
}

impl std::str::FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("failed to deserialize config")
    }
}

fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "hashbin").map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = r#"
            base_url = "https://paste.example.org"

            [database]
            kind = "memory"
        "#
        .parse()
        .unwrap();

        assert_eq!(config.bind, default_bind());
        assert_eq!(config.database.kind, DatabaseKind::Memory);
        assert_eq!(config.database.keyspace, "hashbin");
        assert_eq!(config.database.column_family, "pastes");
        assert_eq!(config.database.consistency, ConsistencyLevel::One);
        assert_eq!(config.database.connect_timeout_secs, 10);
        assert_eq!(config.limits.max_upload_size, 1024 * 1024);
        assert_eq!(config.auth.user_header, "x-remote-user");
    }

    #[test]
    #[cfg(feature = "sqlite")]
    fn full_config() {
        let config: Config = r#"
            bind = "[::]:80"
            base_url = "https://paste.example.org"

            [database]
            kind = "sqlite"
            url = "sqlite://pastes.db?mode=rwc"
            keyspace = "pasten"
            column_family = "corpus"
            consistency = "quorum"
            connect_timeout_secs = 3

            [limits]
            max_upload_size = 4096

            [auth]
            user_header = "x-forwarded-user"
        "#
        .parse()
        .unwrap();

        assert_eq!(config.bind.port(), 80);
        assert_eq!(config.database.kind, DatabaseKind::Sqlite);
        assert_eq!(config.database.column_family, "corpus");
        assert_eq!(config.database.consistency, ConsistencyLevel::Quorum);
        assert_eq!(config.limits.max_upload_size, 4096);
        assert_eq!(config.auth.user_header, "x-forwarded-user");
    }

    #[test]
    fn unknown_consistency_is_rejected() {
        let result: anyhow::Result<Config> = r#"
            base_url = "x"
            [database]
            kind = "memory"
            consistency = "eventually"
        "#
        .parse();
        assert!(result.is_err());
    }
}
