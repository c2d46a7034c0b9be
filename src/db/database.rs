//! The database helper.
//!
//! [`Database`] wraps one driver and one connection string, and decides per
//! call which connection and transaction a command runs on.
//!
//! # Connection policy
//!
//! - **Per-call** (`singleton == false`): every command gets a fresh
//!   connection that is opened for the call and closed afterwards.
//! - **Singleton** (`singleton == true`): one connection is created lazily,
//!   opened on first use and kept open until [`Database::dispose`].
//!
//! # Transactions
//!
//! Singleton instances may hold one *ambient* transaction
//! ([`Database::begin_transaction`]); every command created while it is live
//! runs on its connection and is enlisted in it. The `*_in` variants accept a
//! transaction owned by the caller instead, which is adopted as the ambient
//! transaction unless a different one is already live.

use crate::config::DatabaseConfig;
use crate::db::command::Command;
use crate::db::connection::Connection;
use crate::db::driver::Driver;
use crate::db::reader::DataReader;
use crate::db::transaction::Transaction;
use crate::error::{DbError, DbResult};
use crate::models::{CommandRequest, Parameter, Value, mask_connection_string};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the transaction for an execution comes from.
enum TransactionSource<'t, D: Driver> {
    /// Whatever ambient transaction the instance holds, if any.
    Ambient,
    /// A transaction passed in by the caller.
    Supplied(&'t Transaction<D>),
}

impl<D: Driver> Clone for TransactionSource<'_, D> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<D: Driver> Copy for TransactionSource<'_, D> {}

/// Driver-agnostic data-access helper.
pub struct Database<D: Driver> {
    driver: Arc<D>,
    connection_string: String,
    singleton: bool,
    disposed: bool,
    connection: Option<Connection<D>>,
    transaction: Option<Transaction<D>>,
}

impl<D: Driver> Database<D> {
    /// Create a helper for `connection_string`. Nothing is opened yet.
    pub fn new(driver: D, connection_string: impl Into<String>, singleton: bool) -> Self {
        let connection_string = connection_string.into();
        let driver = Arc::new(driver);
        debug!(
            database_type = %driver.database_type(),
            connection = %mask_connection_string(&connection_string),
            singleton,
            "Database helper created"
        );
        Self {
            driver,
            connection_string,
            singleton,
            disposed: false,
            connection: None,
            transaction: None,
        }
    }

    pub fn from_config(driver: D, config: &DatabaseConfig) -> Self {
        Self::new(driver, config.connection_string.clone(), config.singleton)
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// The stored ambient transaction, live or not.
    pub fn transaction(&self) -> Option<&Transaction<D>> {
        self.transaction.as_ref()
    }

    /// The most recently created connection.
    pub fn connection(&self) -> Option<&Connection<D>> {
        self.connection.as_ref()
    }

    /// Whether an ambient transaction is live.
    pub fn transaction_is_on(&self) -> bool {
        self.transaction.as_ref().is_some_and(Transaction::is_live)
    }

    // =========================================================================
    // Connections and commands
    // =========================================================================

    /// Get the connection for the next command.
    ///
    /// Singleton instances reuse their connection; otherwise a new, closed
    /// connection is created and stored.
    pub fn get_connection(&mut self) -> DbResult<Connection<D>> {
        self.check_disposed("get a connection")?;
        if self.singleton {
            if let Some(connection) = &self.connection {
                return Ok(connection.clone());
            }
        }
        let connection = Connection::new(Arc::clone(&self.driver), self.connection_string.clone());
        self.connection = Some(connection.clone());
        Ok(connection)
    }

    /// Build a command for `request`.
    ///
    /// While an ambient transaction is live the command runs on its
    /// connection and is enlisted in it.
    pub fn get_command(&mut self, request: &CommandRequest) -> DbResult<Command<D>> {
        self.check_disposed("create a command")?;
        match self.ambient() {
            Some((transaction, connection)) => Command::new(connection, request, Some(transaction)),
            None => {
                let connection = self.get_connection()?;
                Command::new(connection, request, None)
            }
        }
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Execute a command and return the number of affected rows.
    pub async fn execute_non_query(&mut self, request: impl Into<CommandRequest>) -> DbResult<u64> {
        let command = self.prepare(&request.into(), TransactionSource::Ambient).await?;
        let result = command.execute_non_query().await;
        self.release(&command, result).await
    }

    /// Execute a command inside a caller-owned transaction.
    pub async fn execute_non_query_in(
        &mut self,
        request: impl Into<CommandRequest>,
        transaction: &Transaction<D>,
    ) -> DbResult<u64> {
        let command = self
            .prepare(&request.into(), TransactionSource::Supplied(transaction))
            .await?;
        command.execute_non_query().await
    }

    /// Execute a command and return the first column of the first row.
    ///
    /// `None` means the command returned no rows; a SQL NULL is `Some(Value::Null)`.
    pub async fn execute_scalar(&mut self, request: impl Into<CommandRequest>) -> DbResult<Option<Value>> {
        let command = self.prepare(&request.into(), TransactionSource::Ambient).await?;
        let result = command.execute_scalar().await;
        self.release(&command, result).await
    }

    pub async fn execute_scalar_in(
        &mut self,
        request: impl Into<CommandRequest>,
        transaction: &Transaction<D>,
    ) -> DbResult<Option<Value>> {
        let command = self
            .prepare(&request.into(), TransactionSource::Supplied(transaction))
            .await?;
        command.execute_scalar().await
    }

    /// Execute a command and stream its rows.
    ///
    /// The connection stays open for the reader; per-call connections are
    /// closed by the caller through [`DataReader::connection`].
    pub async fn execute_reader(&mut self, request: impl Into<CommandRequest>) -> DbResult<DataReader<D>> {
        let command = self.prepare(&request.into(), TransactionSource::Ambient).await?;
        match command.execute_reader().await {
            Ok(reader) => Ok(reader),
            Err(e) => self.release(&command, Err(e)).await,
        }
    }

    pub async fn execute_reader_in(
        &mut self,
        request: impl Into<CommandRequest>,
        transaction: &Transaction<D>,
    ) -> DbResult<DataReader<D>> {
        let command = self
            .prepare(&request.into(), TransactionSource::Supplied(transaction))
            .await?;
        command.execute_reader().await
    }

    async fn prepare(
        &mut self,
        request: &CommandRequest,
        source: TransactionSource<'_, D>,
    ) -> DbResult<Command<D>> {
        self.check_disposed("execute a command")?;
        self.bind_transaction(source)?;
        let command = self.get_command(request)?;
        if matches!(source, TransactionSource::Ambient) && command.connection().is_closed() {
            command.connection().open().await?;
        }
        Ok(command)
    }

    /// Close a per-call connection after an execution, keeping the execution's error.
    async fn release<T>(&self, command: &Command<D>, result: DbResult<T>) -> DbResult<T> {
        if self.singleton || command.transaction().is_some() {
            return result;
        }
        let closed = command.connection().close().await;
        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(close_err)) => Err(close_err),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!(
                    connection_id = %command.connection().id(),
                    error = %close_err,
                    "Failed to close connection after command error"
                );
                Err(e)
            }
        }
    }

    /// Resolve the transaction for an execution.
    ///
    /// A supplied transaction must be live and may not replace a different
    /// live ambient transaction; on success it becomes the ambient one.
    fn bind_transaction(&mut self, source: TransactionSource<'_, D>) -> DbResult<()> {
        let TransactionSource::Supplied(supplied) = source else {
            return Ok(());
        };
        if let Some(ambient) = self.transaction.as_ref().filter(|t| t.is_live()) {
            if ambient == supplied {
                return Ok(());
            }
            return Err(DbError::conflicting_transaction(ambient.id(), supplied.id()));
        }
        if !supplied.is_live() {
            return Err(DbError::invalid_transaction(format!(
                "supplied transaction {} is not active on an open connection",
                supplied.id()
            )));
        }
        self.transaction = Some(supplied.clone());
        Ok(())
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Begin the ambient transaction, or return it if one is already live.
    pub async fn begin_transaction(&mut self) -> DbResult<Transaction<D>> {
        self.check_disposed("begin a transaction")?;
        self.check_singleton("begin a transaction")?;

        if let Some(transaction) = self.transaction.as_ref().filter(|t| t.is_live()) {
            return Ok(transaction.clone());
        }

        let connection = self.get_connection()?;
        if connection.is_closed() {
            connection.open().await?;
        }
        let transaction = connection.begin_transaction().await?;
        self.transaction = Some(transaction.clone());
        Ok(transaction)
    }

    /// Commit the ambient transaction.
    pub async fn commit_transaction(&mut self) -> DbResult<()> {
        self.check_disposed("commit a transaction")?;
        self.check_singleton("commit a transaction")?;
        self.begun_transaction("commit")?.commit().await
    }

    /// Roll back the ambient transaction.
    pub async fn rollback_transaction(&mut self) -> DbResult<()> {
        self.check_disposed("roll back a transaction")?;
        self.check_singleton("roll back a transaction")?;
        self.begun_transaction("roll back")?.rollback().await
    }

    /// Roll back `transaction` and close its connection.
    ///
    /// Works on any transaction, independent of a `Database` instance.
    pub async fn abort_any_transaction(transaction: &Transaction<D>) -> DbResult<()> {
        let Some(connection) = transaction.connection() else {
            return Err(DbError::invalid_transaction(format!(
                "cannot abort transaction {}: it has no open connection",
                transaction.id()
            )));
        };
        transaction.rollback().await?;
        connection.close().await?;
        info!(transaction_id = %transaction.id(), "Transaction aborted");
        Ok(())
    }

    fn begun_transaction(&self, operation: &str) -> DbResult<&Transaction<D>> {
        self.transaction.as_ref().ok_or_else(|| {
            DbError::invalid_transaction(format!("cannot {operation}: no transaction was begun"))
        })
    }

    // =========================================================================
    // Parameters
    // =========================================================================

    /// Turn a name/value mapping into parameters, in iteration order.
    ///
    /// `None` values become [`Value::Null`].
    pub fn get_parameters<I, K, V>(&mut self, values: I) -> DbResult<Vec<Parameter>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let connection = self.get_connection()?;
        Ok(values
            .into_iter()
            .map(|(name, value)| connection.create_parameter(name, value))
            .collect())
    }

    // =========================================================================
    // Disposal
    // =========================================================================

    /// Release the connection and transaction. Safe to call more than once.
    pub async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(transaction) = &self.transaction {
            // Roll back before the connection goes away
            transaction.dispose().await;
        }
        if let Some(connection) = self.connection.take() {
            if let Err(e) = connection.close().await {
                warn!(
                    connection_id = %connection.id(),
                    error = %e,
                    "Failed to close connection while disposing"
                );
            }
        }
        self.disposed = true;
        debug!("Database helper disposed");
    }

    fn ambient(&self) -> Option<(Transaction<D>, Connection<D>)> {
        let transaction = self.transaction.as_ref()?;
        let connection = transaction.connection()?;
        Some((transaction.clone(), connection))
    }

    fn check_disposed(&self, operation: &str) -> DbResult<()> {
        if self.disposed {
            return Err(DbError::disposed(operation));
        }
        Ok(())
    }

    fn check_singleton(&self, operation: &str) -> DbResult<()> {
        if !self.singleton {
            return Err(DbError::mode(operation));
        }
        Ok(())
    }
}

impl<D: Driver> std::fmt::Debug for Database<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("connection", &mask_connection_string(&self.connection_string))
            .field("singleton", &self.singleton)
            .field("disposed", &self.disposed)
            .field("transaction", &self.transaction.as_ref().map(|t| t.id()))
            .finish()
    }
}
