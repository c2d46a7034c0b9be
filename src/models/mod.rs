//! Data models for the database helper.
//!
//! This module re-exports all model types used throughout the crate.

pub mod command;
pub mod connection;
pub mod parameter;
pub mod value;

// Re-export commonly used types
pub use command::{CommandRequest, CommandType};
pub use connection::{ConnectionState, DatabaseType, TransactionState, mask_connection_string};
pub use parameter::{DbType, Parameter, ParameterDirection};
pub use value::{Row, Value};
