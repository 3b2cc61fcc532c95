// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the `flux-dev.toml` configuration file, and resolve
//! its entries into the descriptors the update workflow operates on. The
//! configuration is loaded once by the caller and handed to the components
//! that need it.
//!
//! # General Layout
//!
//! ```toml
//! dump_file = "dump.sql"
//!
//! [servers]
//! "db1.example.com" = "deploy"
//!
//! [servers.staging]
//! user = "forge"
//! host = "10.0.0.5"
//! port = 2222
//! identity_file = "~/.ssh/staging"
//! proxy_jump = "bastion"
//! directory = "/home/forge/app"
//!
//! [database]
//! database = "erp"
//! ```
//!
//! A server is either a plain SSH user (simple form), or a table (extended
//! form). The `[database]` table is optional. Without it the local project
//! `.env` file is consulted.

use crate::env::DotEnv;

use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fmt::{Debug, Formatter, Result as FmtResult},
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};

/// Port SSH uses when a server does not name one.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Top-level configuration file layout.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Local dump file, relative to the project directory.
    #[serde(default = "default_dump_file")]
    pub dump_file: PathBuf,

    /// Remote servers keyed by name.
    #[serde(default)]
    pub servers: BTreeMap<String, ServerEntry>,

    /// Local database connection. Read from the project `.env` if absent.
    pub database: Option<LocalDatabase>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dump_file: default_dump_file(),
            servers: BTreeMap::new(),
            database: None,
        }
    }
}

impl Config {
    /// Load configuration file at target path.
    ///
    /// A missing file is not an error. It simply yields an empty
    /// configuration, so the server selector can tell the operator what to
    /// add.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if file exists but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if file contents are invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        match fs::read_to_string(path.as_ref()) {
            Ok(data) => data.parse(),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(error) => Err(ConfigError::Read {
                path: path.as_ref().to_path_buf(),
                source: error,
            }),
        }
    }

    /// Resolve local database connection parameters.
    ///
    /// Uses the `[database]` table if configured, otherwise reads the
    /// `DB_*` keys of the project's `.env` file.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::UnreadableEnvFile`] if no `[database]` table
    ///   is configured and the `.env` file cannot be read.
    pub fn local_database(&self, project_dir: &Path) -> Result<LocalDatabase> {
        if let Some(database) = &self.database {
            return Ok(database.clone());
        }

        let path = project_dir.join(".env");
        let data = fs::read(&path)
            .map_err(|source| ConfigError::UnreadableEnvFile { path, source })?;
        let env = DotEnv::new(String::from_utf8_lossy(&data));

        Ok(LocalDatabase::from_dotenv(&env))
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut config: Config = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Identity files are local paths, so expand them here. Remote
        // directories are left alone, because "~" refers to the remote home.
        for entry in config.servers.values_mut() {
            if let ServerEntry::Extended(server) = entry {
                if let Some(identity) = server.identity_file.take() {
                    let expanded = shellexpand::full(identity.to_string_lossy().as_ref())
                        .map_err(ConfigError::ShellExpansion)?
                        .into_owned();
                    server.identity_file = Some(PathBuf::from(expanded));
                }
            }
        }

        Ok(config)
    }
}

/// Server entry as written in the configuration file.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServerEntry {
    /// Simple form: just the SSH user.
    User(String),

    /// Extended form with connection overrides.
    Extended(ExtendedServer),
}

/// Extended server entry.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExtendedServer {
    /// SSH user.
    pub user: String,

    /// SSH host name, defaults to the server name.
    pub host: Option<String>,

    /// SSH port.
    pub port: Option<u16>,

    /// Private key passed to ssh via `-i`.
    pub identity_file: Option<PathBuf>,

    /// Bastion host passed to ssh via `-J`.
    pub proxy_jump: Option<String>,

    /// Application root on the remote server, defaults to `~/{name}`.
    pub directory: Option<String>,
}

/// Fully resolved remote server descriptor.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RemoteServer {
    pub name: String,
    pub user: String,
    pub host: String,
    pub port: Option<u16>,
    pub identity_file: Option<PathBuf>,
    pub proxy_jump: Option<String>,
    pub directory: String,
}

impl RemoteServer {
    /// Resolve configuration entry into a descriptor.
    ///
    /// Omitted fields fall back to the simple-form defaults: the host is the
    /// server name, and the directory is `~/{name}`.
    pub fn resolve(name: impl Into<String>, entry: &ServerEntry) -> Self {
        let name = name.into();
        match entry {
            ServerEntry::User(user) => Self {
                host: name.clone(),
                directory: format!("~/{name}"),
                user: user.clone(),
                port: None,
                identity_file: None,
                proxy_jump: None,
                name,
            },
            ServerEntry::Extended(server) => Self {
                host: server.host.clone().unwrap_or_else(|| name.clone()),
                directory: server
                    .directory
                    .clone()
                    .unwrap_or_else(|| format!("~/{name}")),
                user: server.user.clone(),
                port: server.port,
                identity_file: server.identity_file.clone(),
                proxy_jump: server.proxy_jump.clone(),
                name,
            },
        }
    }

    /// SSH destination in `user@host` form.
    pub fn target(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Port that will actually be used for the connection.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_SSH_PORT)
    }

    /// Label shown when the operator picks a server.
    pub fn label(&self) -> String {
        if self.host == self.name {
            format!("{} ({})", self.name, self.user)
        } else {
            format!("{} → {} ({})", self.name, self.host, self.user)
        }
    }
}

/// Local MySQL connection parameters.
#[derive(PartialEq, Eq, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocalDatabase {
    #[serde(default = "default_db_host")]
    pub host: String,

    #[serde(default = "default_db_port")]
    pub port: u16,

    #[serde(default = "default_db_username")]
    pub username: String,

    #[serde(default)]
    pub password: String,

    pub database: String,
}

impl LocalDatabase {
    /// Read connection parameters from a Laravel `.env` file.
    ///
    /// Missing keys take the stock Laravel defaults.
    pub fn from_dotenv(env: &DotEnv) -> Self {
        Self {
            host: env.get("DB_HOST").unwrap_or_else(default_db_host),
            port: env
                .get("DB_PORT")
                .and_then(|port| port.parse().ok())
                .unwrap_or_else(default_db_port),
            username: env.get("DB_USERNAME").unwrap_or_else(default_db_username),
            password: env.get("DB_PASSWORD").unwrap_or_default(),
            database: env.get("DB_DATABASE").unwrap_or_else(|| "laravel".into()),
        }
    }
}

impl Debug for LocalDatabase {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("LocalDatabase")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

fn default_dump_file() -> PathBuf {
    PathBuf::from("dump.sql")
}

fn default_db_host() -> String {
    "127.0.0.1".into()
}

fn default_db_port() -> u16 {
    3306
}

fn default_db_username() -> String {
    "root".into()
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read configuration file {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),

    /// No database table configured, and no project `.env` to fall back on.
    #[error("no [database] table configured and cannot read {path:?}")]
    UnreadableEnvFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
