//! In-memory driver for integration tests.
//!
//! Understands a handful of statements:
//! - `CALL InsertUser(...)` inserts a user from the `Username`, `Password`
//!   and `Id` parameters and returns the id
//! - `SELECT COUNT(*) FROM users` counts the users visible to the session
//! - `SELECT * FROM users` streams them
//! - `SELECT * FROM numbers` streams 100 rows
//! - `SELECT NULL` returns a SQL NULL, `SELECT NOTHING` returns no rows
//! - `FAIL` returns a driver error
//!
//! Writes made inside a transaction are staged per session and only become
//! visible to other sessions on commit.

#![allow(dead_code)]

use db_helper::db::{Driver, Statement};
use db_helper::error::{DbError, DbResult};
use db_helper::models::{CommandType, DatabaseType, Parameter, Row, Value};
use futures_util::future::{self, BoxFuture, FutureExt};
use futures_util::stream::{self, BoxStream, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard};

pub const CONNECTION_STRING: &str = "memory://users";
pub const UNREACHABLE: &str = "memory://unreachable";

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: Value,
    pub password: Value,
}

#[derive(Debug, Default)]
pub struct MemoryState {
    pub users: Vec<User>,
    pub opens: usize,
    pub closes: usize,
    pub begins: usize,
    pub commits: usize,
    pub rollbacks: usize,
    /// SQL of every statement executed, in order.
    pub executed: Vec<String>,
    next_session: u64,
}

pub struct MemorySession {
    pub id: u64,
    staged: Option<Vec<User>>,
}

#[derive(Clone, Default)]
pub struct MemoryDriver {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap()
    }

    /// Users committed so far.
    pub fn committed_users(&self) -> usize {
        self.state().users.len()
    }

    fn visible_users(&self, session: &MemorySession) -> Vec<User> {
        let mut users = self.state().users.clone();
        if let Some(staged) = &session.staged {
            users.extend(staged.iter().cloned());
        }
        users
    }

    fn insert_user(&self, session: &mut MemorySession, statement: &Statement) -> DbResult<i64> {
        let param = |name: &str| {
            statement
                .parameters
                .iter()
                .find(|p| p.bare_name() == name)
                .map(|p| p.value().clone())
                .ok_or_else(|| DbError::driver(format!("missing parameter {name}")))
        };
        let id = param("Id")?
            .as_i64()
            .ok_or_else(|| DbError::driver("Id must be an integer"))?;
        let user = User {
            id,
            username: param("Username")?,
            password: param("Password")?,
        };
        match &mut session.staged {
            Some(staged) => staged.push(user),
            None => self.state().users.push(user),
        }
        Ok(id)
    }

    fn record(&self, statement: &Statement) {
        self.state().executed.push(statement.sql.clone());
    }

    fn user_rows(users: Vec<User>) -> Vec<DbResult<Row>> {
        users
            .into_iter()
            .map(|u| {
                Ok(Row::new(
                    vec!["id".into(), "username".into(), "password".into()],
                    vec![Value::Int(u.id), u.username, u.password],
                ))
            })
            .collect()
    }
}

fn fail() -> DbError {
    DbError::driver("simulated backend failure")
}

impl Driver for MemoryDriver {
    type Raw = MemorySession;

    fn database_type(&self) -> DatabaseType {
        DatabaseType::SQLite
    }

    fn open<'a>(&'a self, connection_string: &'a str) -> BoxFuture<'a, DbResult<MemorySession>> {
        let result = if connection_string == UNREACHABLE {
            Err(DbError::driver("connection refused"))
        } else {
            let mut state = self.state();
            state.opens += 1;
            state.next_session += 1;
            Ok(MemorySession {
                id: state.next_session,
                staged: None,
            })
        };
        future::ready(result).boxed()
    }

    fn close(&self, _raw: MemorySession) -> BoxFuture<'_, DbResult<()>> {
        self.state().closes += 1;
        future::ready(Ok(())).boxed()
    }

    fn begin<'a>(&'a self, raw: &'a mut MemorySession) -> BoxFuture<'a, DbResult<()>> {
        let result = if raw.staged.is_some() {
            Err(DbError::driver("transaction already in progress"))
        } else {
            raw.staged = Some(Vec::new());
            self.state().begins += 1;
            Ok(())
        };
        future::ready(result).boxed()
    }

    fn commit<'a>(&'a self, raw: &'a mut MemorySession) -> BoxFuture<'a, DbResult<()>> {
        let result = match raw.staged.take() {
            Some(staged) => {
                let mut state = self.state();
                state.users.extend(staged);
                state.commits += 1;
                Ok(())
            }
            None => Err(DbError::driver("no transaction in progress")),
        };
        future::ready(result).boxed()
    }

    fn rollback<'a>(&'a self, raw: &'a mut MemorySession) -> BoxFuture<'a, DbResult<()>> {
        let result = match raw.staged.take() {
            Some(_) => {
                self.state().rollbacks += 1;
                Ok(())
            }
            None => Err(DbError::driver("no transaction in progress")),
        };
        future::ready(result).boxed()
    }

    fn render(
        &self,
        text: &str,
        command_type: CommandType,
        parameters: &[Parameter],
    ) -> DbResult<String> {
        match command_type {
            CommandType::Text => Ok(text.to_string()),
            CommandType::StoredProcedure => {
                if text.is_empty() || text.contains(' ') {
                    return Err(DbError::invalid_input(format!("bad procedure name '{text}'")));
                }
                let args: Vec<_> = parameters
                    .iter()
                    .map(|p| format!("@{}", p.bare_name()))
                    .collect();
                Ok(format!("CALL {}({})", text, args.join(", ")))
            }
        }
    }

    fn execute<'a>(
        &'a self,
        raw: &'a mut MemorySession,
        statement: &'a Statement,
    ) -> BoxFuture<'a, DbResult<u64>> {
        self.record(statement);
        let result = if statement.sql.starts_with("CALL InsertUser") {
            self.insert_user(raw, statement).map(|_| 1)
        } else if statement.sql == "FAIL" {
            Err(fail())
        } else {
            Ok(0)
        };
        future::ready(result).boxed()
    }

    fn scalar<'a>(
        &'a self,
        raw: &'a mut MemorySession,
        statement: &'a Statement,
    ) -> BoxFuture<'a, DbResult<Option<Value>>> {
        self.record(statement);
        let result = match statement.sql.as_str() {
            sql if sql.starts_with("CALL InsertUser") => {
                self.insert_user(raw, statement).map(|id| Some(Value::Int(id)))
            }
            "SELECT COUNT(*) FROM users" => {
                Ok(Some(Value::Int(self.visible_users(raw).len() as i64)))
            }
            "SELECT NULL" => Ok(Some(Value::Null)),
            "SELECT NOTHING" => Ok(None),
            "FAIL" => Err(fail()),
            _ => Ok(None),
        };
        future::ready(result).boxed()
    }

    fn fetch<'a>(
        &'a self,
        raw: &'a mut MemorySession,
        statement: &'a Statement,
    ) -> BoxStream<'a, DbResult<Row>> {
        self.record(statement);
        let items = match statement.sql.as_str() {
            "SELECT * FROM users" => Self::user_rows(self.visible_users(raw)),
            "SELECT * FROM numbers" => (0..100)
                .map(|n| Ok(Row::new(vec!["n".into()], vec![Value::Int(n)])))
                .collect(),
            "FAIL" => vec![Err(fail())],
            _ => Vec::new(),
        };
        stream::iter(items).boxed()
    }
}

/// Parameters for one `InsertUser` call.
pub fn user(username: &str, password: Option<&str>, id: i64) -> Vec<(&'static str, Value)> {
    vec![
        ("Username", Value::from(username)),
        ("Password", Value::from(password)),
        ("Id", Value::from(id)),
    ]
}
