//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - The `Database` helper (connection policy, ambient transactions)
//! - Connection, transaction, command and reader handles
//! - Backend drivers built on sqlx
//! - Parameter binding and type mappings
//! - Driver dispatch macro for runtime backend selection

pub mod command;
pub mod connection;
pub mod database;
pub mod driver;
#[macro_use]
pub mod macros;
pub mod params;
pub mod reader;
pub mod transaction;
pub mod types;

pub use command::Command;
pub use connection::Connection;
pub use database::Database;
pub use driver::{Driver, MySqlDriver, PostgresDriver, SqliteDriver, Statement};
pub use reader::DataReader;
pub use transaction::Transaction;
