//! DB Helper Library
//!
//! A driver-agnostic data-access helper for SQL databases (SQLite,
//! PostgreSQL, MySQL): singleton or per-call connections, one ambient
//! transaction at a time, and key/value parameter marshaling.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::{Config, DatabaseConfig};
pub use db::{Command, Connection, DataReader, Database, Driver, Transaction};
pub use error::{DbError, DbResult};
pub use models::{CommandRequest, CommandType, Parameter, Row, Value};
