//! Configuration handling for the DB Helper.
//!
//! This module provides the library-level [`DatabaseConfig`] and the CLI
//! configuration of the demonstration binary, read from arguments and
//! environment variables.

use crate::models::{DatabaseType, Value, mask_connection_string};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_PROCEDURE: &str = "InsertUser_SP";
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Errors raised while assembling configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("No connection string configured: pass --database or --credentials")]
    MissingConnectionString,

    #[error("Connection string is empty")]
    EmptyConnectionString,

    #[error("Failed to read credentials file {}: {source}", .path.display())]
    CredentialsFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown database type for connection string: {0}")]
    UnknownDatabaseType(String),

    #[error("Invalid user '{0}': expected NAME:PASSWORD:ID with a numeric id")]
    InvalidUser(String),
}

/// Connection string plus connection policy for one [`Database`](crate::db::Database).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub connection_string: String,
    /// Reuse one connection for every command (required for transactions).
    #[serde(default)]
    pub singleton: bool,
}

impl DatabaseConfig {
    pub fn new(connection_string: impl Into<String>, singleton: bool) -> Self {
        Self {
            connection_string: connection_string.into(),
            singleton,
        }
    }

    /// Read the connection string from the first non-empty line of a file.
    pub fn from_credentials_file(
        path: impl AsRef<Path>,
        singleton: bool,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|source| ConfigError::CredentialsFile {
                path: path.to_path_buf(),
                source,
            })?;
        let connection_string = contents
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or(ConfigError::EmptyConnectionString)?;
        Ok(Self::new(connection_string, singleton))
    }

    /// Backend selected by the connection string's scheme.
    pub fn database_type(&self) -> Result<DatabaseType, ConfigError> {
        DatabaseType::from_connection_string(&self.connection_string)
            .ok_or_else(|| ConfigError::UnknownDatabaseType(self.masked_connection_string()))
    }

    /// Get a display-safe version of the connection string (password masked).
    pub fn masked_connection_string(&self) -> String {
        mask_connection_string(&self.connection_string)
    }
}

/// One user row inserted by the demonstration binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub password: String,
    pub id: i64,
}

impl UserRecord {
    pub fn new(username: impl Into<String>, password: impl Into<String>, id: i64) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            id,
        }
    }

    /// Users inserted when none are given on the command line.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("alice", "alice123", 1),
            Self::new("bob", "bob123", 2),
            Self::new("carol", "carol123", 3),
        ]
    }

    /// Procedure arguments, in call order.
    pub fn to_parameters(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("Username", Value::from(self.username.as_str())),
            ("Password", Value::from(self.password.as_str())),
            ("Id", Value::from(self.id)),
        ]
    }
}

impl FromStr for UserRecord {
    type Err = ConfigError;

    /// Parse `NAME:PASSWORD:ID`. The password may itself contain `:`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidUser(s.to_string());
        let (username, rest) = s.split_once(':').ok_or_else(invalid)?;
        let (password, id) = rest.rsplit_once(':').ok_or_else(invalid)?;
        if username.is_empty() {
            return Err(invalid());
        }
        let id = id.trim().parse::<i64>().map_err(|_| invalid())?;
        Ok(Self::new(username, password, id))
    }
}

/// Command line configuration for the `db-helper` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "db-helper",
    about = "Insert users through a stored procedure inside one transaction",
    version,
    author
)]
pub struct Config {
    /// Connection string (sqlite:path, postgres://..., mysql://...).
    #[arg(short = 'd', long = "database", value_name = "URL", env = "DB_HELPER_DATABASE")]
    pub database: Option<String>,

    /// File whose first line is the connection string.
    /// Used when --database is not given.
    #[arg(
        short = 'c',
        long = "credentials",
        value_name = "FILE",
        env = "DB_HELPER_CREDENTIALS"
    )]
    pub credentials: Option<PathBuf>,

    /// User to insert, as NAME:PASSWORD:ID.
    /// Can be specified multiple times; defaults to three demo users.
    #[arg(short = 'u', long = "user", value_name = "NAME:PASSWORD:ID")]
    pub users: Vec<String>,

    /// Stored procedure that inserts one user and returns its id
    #[arg(
        short = 'p',
        long,
        default_value = DEFAULT_PROCEDURE,
        env = "DB_HELPER_PROCEDURE"
    )]
    pub procedure: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = DEFAULT_LOG_LEVEL, env = "DB_HELPER_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "DB_HELPER_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Resolve the singleton database configuration.
    ///
    /// `--database` wins over `--credentials`.
    pub fn database_config(&self) -> Result<DatabaseConfig, ConfigError> {
        match (&self.database, &self.credentials) {
            (Some(url), _) if url.trim().is_empty() => Err(ConfigError::EmptyConnectionString),
            (Some(url), _) => Ok(DatabaseConfig::new(url.trim(), true)),
            (None, Some(path)) => DatabaseConfig::from_credentials_file(path, true),
            (None, None) => Err(ConfigError::MissingConnectionString),
        }
    }

    /// Parse the users to insert.
    pub fn users(&self) -> Result<Vec<UserRecord>, ConfigError> {
        if self.users.is_empty() {
            return Ok(UserRecord::defaults());
        }
        self.users.iter().map(|s| s.parse()).collect()
    }
}
