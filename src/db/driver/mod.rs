//! Backend drivers.
//!
//! A [`Driver`] is the connection factory a [`Database`](crate::db::Database)
//! is built with. It is the whole capability set the helper relies on: open and
//! close a raw connection, control a transaction on it, render a command into
//! backend SQL, and run that SQL.
//!
//! # Architecture
//!
//! The concrete drivers are organized in submodules:
//! - `mysql`: MySQL / MariaDB over `sqlx::MySqlConnection`
//! - `postgres`: PostgreSQL over `sqlx::PgConnection`
//! - `sqlite`: SQLite over `sqlx::SqliteConnection`
//!
//! Each submodule provides identical functionality adapted to the database's type system.
//! Futures are boxed so every driver returns the same `Send` types.

pub mod mysql;
pub mod postgres;
pub mod sqlite;

pub use mysql::MySqlDriver;
pub use postgres::PostgresDriver;
pub use sqlite::SqliteDriver;

use crate::error::{DbError, DbResult};
use crate::models::{CommandType, DatabaseType, Parameter, Row, Value};
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;

/// A statement ready for the backend: rendered SQL plus the parameters to bind, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub parameters: Vec<Parameter>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, parameters: Vec<Parameter>) -> Self {
        Self {
            sql: sql.into(),
            parameters,
        }
    }

    /// Whether the statement can run through the simple (unprepared) query path.
    pub fn is_unparameterized(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// Connection factory and execution capabilities of one backend.
pub trait Driver: Send + Sync + 'static {
    /// Native, open connection.
    type Raw: Send + 'static;

    fn database_type(&self) -> DatabaseType;

    /// Establish a connection from a backend connection string.
    fn open<'a>(&'a self, connection_string: &'a str) -> BoxFuture<'a, DbResult<Self::Raw>>;

    fn close(&self, raw: Self::Raw) -> BoxFuture<'_, DbResult<()>>;

    fn begin<'a>(&'a self, raw: &'a mut Self::Raw) -> BoxFuture<'a, DbResult<()>>;

    fn commit<'a>(&'a self, raw: &'a mut Self::Raw) -> BoxFuture<'a, DbResult<()>>;

    fn rollback<'a>(&'a self, raw: &'a mut Self::Raw) -> BoxFuture<'a, DbResult<()>>;

    /// Render command text into the SQL this backend executes.
    fn render(
        &self,
        text: &str,
        command_type: CommandType,
        parameters: &[Parameter],
    ) -> DbResult<String>;

    /// Execute a statement and return the number of affected rows.
    fn execute<'a>(
        &'a self,
        raw: &'a mut Self::Raw,
        statement: &'a Statement,
    ) -> BoxFuture<'a, DbResult<u64>>;

    /// Execute a statement and return the first column of the first row.
    fn scalar<'a>(
        &'a self,
        raw: &'a mut Self::Raw,
        statement: &'a Statement,
    ) -> BoxFuture<'a, DbResult<Option<Value>>>;

    /// Execute a statement and stream its rows.
    fn fetch<'a>(
        &'a self,
        raw: &'a mut Self::Raw,
        statement: &'a Statement,
    ) -> BoxStream<'a, DbResult<Row>>;
}

// =============================================================================
// Common Helper Functions
// =============================================================================

/// Check that a procedure or parameter name is a plain (optionally schema-qualified) identifier.
pub(crate) fn validate_identifier(name: &str, what: &str) -> DbResult<()> {
    let valid = !name.is_empty()
        && name.split('.').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
                && !part.starts_with(|c: char| c.is_ascii_digit())
        });
    if valid {
        Ok(())
    } else {
        Err(DbError::invalid_input(format!(
            "{what} '{name}' is not a valid identifier"
        )))
    }
}

/// Reject parameters that do not carry an input value.
pub(crate) fn ensure_input_parameters(parameters: &[Parameter], backend: DatabaseType) -> DbResult<()> {
    match parameters.iter().find(|p| !p.direction().is_input()) {
        Some(param) => Err(DbError::unsupported(
            format!("{:?} parameter '{}'", param.direction(), param.name()),
            backend.display_name(),
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParameterDirection;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("InsertUser_SP", "procedure").is_ok());
        assert!(validate_identifier("app.insert_user", "procedure").is_ok());
        assert!(validate_identifier("", "procedure").is_err());
        assert!(validate_identifier("1abc", "procedure").is_err());
        assert!(validate_identifier("drop table x;--", "procedure").is_err());
        assert!(validate_identifier("a..b", "procedure").is_err());
    }

    #[test]
    fn test_output_parameters_rejected() {
        let params = vec![
            Parameter::new("Id", 1),
            Parameter::new("Out", None::<i64>).with_direction(ParameterDirection::Output),
        ];
        let err = ensure_input_parameters(&params, DatabaseType::MySQL).unwrap_err();
        assert!(matches!(err, DbError::Unsupported { .. }));
        assert!(ensure_input_parameters(&params[..1], DatabaseType::MySQL).is_ok());
    }

    #[test]
    fn test_statement_unparameterized() {
        assert!(Statement::new("SELECT 1", Vec::new()).is_unparameterized());
        assert!(!Statement::new("SELECT ?", vec![Parameter::new("a", 1)]).is_unparameterized());
    }
}
