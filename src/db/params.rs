//! Parameter binding utilities for database queries.
//!
//! This module provides functions to bind command [`Parameter`]s to database-specific
//! query objects. NULL values are bound as a typed NULL derived from the parameter's
//! [`DbType`], so backends with strict typing (PostgreSQL) accept them.
//! `Int32` integers bind as 4-byte values on PostgreSQL and MySQL; SQLite
//! integers are always 64-bit.

use crate::models::{DbType, Parameter, Value};
use serde_json::Value as JsonValue;
use sqlx::mysql::MySqlArguments;
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::types::Json;
use sqlx::{MySql, Postgres, Sqlite};

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    param: &'q Parameter,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match param.value() {
        Value::Null => match param.db_type() {
            DbType::Boolean => query.bind(None::<bool>),
            DbType::Int32 => query.bind(None::<i32>),
            DbType::Int64 => query.bind(None::<i64>),
            DbType::Double => query.bind(None::<f64>),
            DbType::Binary => query.bind(None::<Vec<u8>>),
            DbType::String | DbType::Json => query.bind(None::<String>),
        },
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => match i32::try_from(*v) {
            Ok(narrow) if param.db_type() == DbType::Int32 => query.bind(narrow),
            _ => query.bind(*v),
        },
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Bytes(v) => query.bind(v.as_slice()),
        Value::Json(v) => query.bind(Json(v)),
    }
}

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q Parameter,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param.value() {
        Value::Null => match param.db_type() {
            DbType::Boolean => query.bind(None::<bool>),
            DbType::Int32 => query.bind(None::<i32>),
            DbType::Int64 => query.bind(None::<i64>),
            DbType::Double => query.bind(None::<f64>),
            DbType::Binary => query.bind(None::<Vec<u8>>),
            DbType::Json => query.bind(None::<Json<JsonValue>>),
            DbType::String => query.bind(None::<String>),
        },
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => match i32::try_from(*v) {
            Ok(narrow) if param.db_type() == DbType::Int32 => query.bind(narrow),
            _ => query.bind(*v),
        },
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Bytes(v) => query.bind(v.as_slice()),
        Value::Json(v) => query.bind(Json(v)),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q Parameter,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param.value() {
        Value::Null => match param.db_type() {
            DbType::Boolean => query.bind(None::<bool>),
            DbType::Int32 => query.bind(None::<i32>),
            DbType::Int64 => query.bind(None::<i64>),
            DbType::Double => query.bind(None::<f64>),
            DbType::Binary => query.bind(None::<Vec<u8>>),
            DbType::String | DbType::Json => query.bind(None::<String>),
        },
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Bytes(v) => query.bind(v.as_slice()),
        // SQLite doesn't have native JSON type, store as string
        Value::Json(v) => query.bind(v.to_string()),
    }
}
