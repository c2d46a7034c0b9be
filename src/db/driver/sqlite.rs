//! SQLite driver.

use super::{Driver, Statement, ensure_input_parameters};
use crate::db::params::bind_sqlite_param;
use crate::db::types::RowToValues;
use crate::error::{DbError, DbResult};
use crate::models::{CommandType, DatabaseType, Parameter, Row, Value};
use futures_util::future::BoxFuture;
use futures_util::stream::{BoxStream, StreamExt};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection as _, Executor};
use std::str::FromStr;

/// Driver for SQLite database files (`sqlite:path/to/db.sqlite`).
///
/// Missing database files are created on open. SQLite has no stored
/// procedures, so stored-procedure commands are rejected at render time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    type Raw = SqliteConnection;

    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    fn open<'a>(&'a self, connection_string: &'a str) -> BoxFuture<'a, DbResult<SqliteConnection>> {
        Box::pin(async move {
            let options = SqliteConnectOptions::from_str(connection_string)?.create_if_missing(true);
            Ok(options.connect().await?)
        })
    }

    fn close(&self, raw: SqliteConnection) -> BoxFuture<'_, DbResult<()>> {
        Box::pin(async move { Ok(raw.close().await?) })
    }

    fn begin<'a>(&'a self, raw: &'a mut SqliteConnection) -> BoxFuture<'a, DbResult<()>> {
        Box::pin(async move {
            raw.execute("BEGIN").await?;
            Ok(())
        })
    }

    fn commit<'a>(&'a self, raw: &'a mut SqliteConnection) -> BoxFuture<'a, DbResult<()>> {
        Box::pin(async move {
            raw.execute("COMMIT").await?;
            Ok(())
        })
    }

    fn rollback<'a>(&'a self, raw: &'a mut SqliteConnection) -> BoxFuture<'a, DbResult<()>> {
        Box::pin(async move {
            raw.execute("ROLLBACK").await?;
            Ok(())
        })
    }

    fn render(
        &self,
        text: &str,
        command_type: CommandType,
        parameters: &[Parameter],
    ) -> DbResult<String> {
        ensure_input_parameters(parameters, DatabaseType::SQLite)?;
        match command_type {
            CommandType::Text => Ok(text.to_string()),
            CommandType::StoredProcedure => Err(DbError::unsupported(
                "Stored procedures",
                DatabaseType::SQLite.display_name(),
            )),
        }
    }

    fn execute<'a>(
        &'a self,
        raw: &'a mut SqliteConnection,
        statement: &'a Statement,
    ) -> BoxFuture<'a, DbResult<u64>> {
        Box::pin(async move {
            // When params is empty, execute raw SQL directly so multi-statement scripts work
            let result = if statement.is_unparameterized() {
                raw.execute(statement.sql.as_str()).await?
            } else {
                let mut query = sqlx::query(&statement.sql);
                for param in &statement.parameters {
                    query = bind_sqlite_param(query, param);
                }
                query.execute(raw).await?
            };
            Ok(result.rows_affected())
        })
    }

    fn scalar<'a>(
        &'a self,
        raw: &'a mut SqliteConnection,
        statement: &'a Statement,
    ) -> BoxFuture<'a, DbResult<Option<Value>>> {
        Box::pin(async move {
            let row = if statement.is_unparameterized() {
                raw.fetch_optional(statement.sql.as_str()).await?
            } else {
                let mut query = sqlx::query(&statement.sql);
                for param in &statement.parameters {
                    query = bind_sqlite_param(query, param);
                }
                query.fetch_optional(raw).await?
            };
            Ok(row.and_then(|row| row.first_value()))
        })
    }

    fn fetch<'a>(
        &'a self,
        raw: &'a mut SqliteConnection,
        statement: &'a Statement,
    ) -> BoxStream<'a, DbResult<Row>> {
        let rows = if statement.is_unparameterized() {
            raw.fetch(statement.sql.as_str())
        } else {
            let mut query = sqlx::query(&statement.sql);
            for param in &statement.parameters {
                query = bind_sqlite_param(query, param);
            }
            query.fetch(raw)
        };
        rows.map(|row| row.map(|row| row.to_row()).map_err(DbError::from))
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_text_passes_through() {
        let sql = SqliteDriver
            .render("SELECT * FROM users WHERE id = ?", CommandType::Text, &[Parameter::new("id", 1)])
            .unwrap();
        assert_eq!(sql, "SELECT * FROM users WHERE id = ?");
    }

    #[test]
    fn test_render_stored_procedure_unsupported() {
        let err = SqliteDriver
            .render("InsertUser_SP", CommandType::StoredProcedure, &[])
            .unwrap_err();
        assert!(matches!(err, DbError::Unsupported { .. }));
        assert!(err.to_string().contains("SQLite"));
    }

    #[test]
    fn test_database_type() {
        assert_eq!(SqliteDriver.database_type(), DatabaseType::SQLite);
    }

    #[tokio::test]
    async fn test_in_memory_roundtrip() {
        let driver = SqliteDriver;
        let mut raw = driver.open("sqlite::memory:").await.unwrap();

        let create = Statement::new("CREATE TABLE t (id INTEGER, name TEXT)", Vec::new());
        driver.execute(&mut raw, &create).await.unwrap();

        let insert = Statement::new(
            "INSERT INTO t (id, name) VALUES (?, ?)",
            vec![Parameter::new("id", 1), Parameter::new("name", "A")],
        );
        assert_eq!(driver.execute(&mut raw, &insert).await.unwrap(), 1);

        let count = Statement::new("SELECT COUNT(*) FROM t", Vec::new());
        assert_eq!(
            driver.scalar(&mut raw, &count).await.unwrap(),
            Some(Value::Int(1))
        );

        let select = Statement::new("SELECT id, name FROM t", Vec::new());
        let rows: Vec<_> = driver.fetch(&mut raw, &select).collect().await;
        assert_eq!(rows.len(), 1);
        let row = rows.into_iter().next().unwrap().unwrap();
        assert_eq!(row.get_by_name("name"), Some(&Value::Text("A".into())));

        driver.close(raw).await.unwrap();
    }
}
