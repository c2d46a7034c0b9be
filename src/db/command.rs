//! Command objects.
//!
//! A [`Command`] is built for a single execution: it owns a copy of the
//! caller's parameters, the connection it runs on, the transaction it is
//! enlisted in (if any), and the statement its driver rendered.

use crate::db::connection::Connection;
use crate::db::driver::{Driver, Statement};
use crate::db::reader::DataReader;
use crate::db::transaction::Transaction;
use crate::error::{DbError, DbResult};
use crate::models::{CommandRequest, CommandType, Parameter, Value};
use tracing::debug;

pub struct Command<D: Driver> {
    text: String,
    command_type: CommandType,
    statement: Statement,
    connection: Connection<D>,
    transaction: Option<Transaction<D>>,
}

impl<D: Driver> Command<D> {
    /// Build a command on `connection`, copying the request's parameters.
    pub fn new(
        connection: Connection<D>,
        request: &CommandRequest,
        transaction: Option<Transaction<D>>,
    ) -> DbResult<Self> {
        let parameters = request.parameters.clone();
        let sql = connection
            .driver()
            .render(&request.text, request.command_type, &parameters)?;
        Ok(Self {
            text: request.text.clone(),
            command_type: request.command_type,
            statement: Statement::new(sql, parameters),
            connection,
            transaction,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn command_type(&self) -> CommandType {
        self.command_type
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.statement.parameters
    }

    /// SQL sent to the backend.
    pub fn sql(&self) -> &str {
        &self.statement.sql
    }

    pub fn connection(&self) -> &Connection<D> {
        &self.connection
    }

    pub fn transaction(&self) -> Option<&Transaction<D>> {
        self.transaction.as_ref()
    }

    /// Execute and return the number of affected rows.
    pub async fn execute_non_query(&self) -> DbResult<u64> {
        self.check_enlistment()?;
        self.log_execution("non_query");
        self.connection.execute(&self.statement).await
    }

    /// Execute and return the first column of the first row.
    pub async fn execute_scalar(&self) -> DbResult<Option<Value>> {
        self.check_enlistment()?;
        self.log_execution("scalar");
        self.connection.scalar(&self.statement).await
    }

    /// Execute and stream the result rows.
    ///
    /// The reader holds the connection until it is drained, closed or dropped.
    pub async fn execute_reader(&self) -> DbResult<DataReader<D>> {
        self.check_enlistment()?;
        self.log_execution("reader");
        DataReader::start(self.connection.clone(), self.statement.clone()).await
    }

    fn check_enlistment(&self) -> DbResult<()> {
        let Some(transaction) = &self.transaction else {
            return Ok(());
        };
        match transaction.connection() {
            None => Err(DbError::invalid_transaction(format!(
                "transaction {} is no longer usable",
                transaction.id()
            ))),
            Some(connection) if connection != self.connection => {
                Err(DbError::invalid_operation(format!(
                    "transaction {} belongs to a different connection",
                    transaction.id()
                )))
            }
            Some(_) => Ok(()),
        }
    }

    fn log_execution(&self, mode: &str) {
        debug!(
            connection_id = %self.connection.id(),
            transaction_id = self.transaction.as_ref().map(|t| t.id()),
            command_type = %self.command_type,
            mode,
            parameter_count = self.statement.parameters.len(),
            "Executing command: {}",
            self.text
        );
    }
}

impl<D: Driver> std::fmt::Debug for Command<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("text", &self.text)
            .field("command_type", &self.command_type)
            .field("parameters", &self.statement.parameters.len())
            .field("connection", &self.connection.id())
            .field("transaction", &self.transaction.as_ref().map(|t| t.id()))
            .finish()
    }
}
