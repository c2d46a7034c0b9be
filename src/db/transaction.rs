//! Transaction handle.
//!
//! A [`Transaction`] is bound to the connection session it began in. It is
//! *live* while it is active and that session is still open; once it is
//! committed or rolled back, or its connection is closed underneath it, it
//! no longer has a connection and every finalizing call fails with
//! [`DbError::InvalidTransaction`].

use crate::db::connection::Connection;
use crate::db::driver::Driver;
use crate::error::{DbError, DbResult};
use crate::models::TransactionState;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};
use uuid::Uuid;

struct TransactionSlot<D: Driver> {
    connection: Option<Connection<D>>,
    state: TransactionState,
    /// Connection generation the transaction began in.
    generation: u64,
}

struct TransactionInner<D: Driver> {
    id: String,
    started_at: DateTime<Utc>,
    slot: Mutex<TransactionSlot<D>>,
}

/// Handle to a transaction on one connection.
pub struct Transaction<D: Driver> {
    inner: Arc<TransactionInner<D>>,
}

impl<D: Driver> Transaction<D> {
    pub(crate) fn new(connection: Connection<D>, generation: u64) -> Self {
        let id = format!("tx_{}", Uuid::new_v4().simple());
        info!(
            transaction_id = %id,
            connection_id = %connection.id(),
            "Transaction started"
        );
        Self {
            inner: Arc::new(TransactionInner {
                id,
                started_at: Utc::now(),
                slot: Mutex::new(TransactionSlot {
                    connection: Some(connection),
                    state: TransactionState::Active,
                    generation,
                }),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.inner.started_at
    }

    pub fn state(&self) -> TransactionState {
        self.slot().state
    }

    /// The connection this transaction runs on, while it is live.
    pub fn connection(&self) -> Option<Connection<D>> {
        self.live_connection()
    }

    /// Whether the transaction is active and its connection session is still open.
    pub fn is_live(&self) -> bool {
        self.live_connection().is_some()
    }

    /// Commit the transaction.
    pub async fn commit(&self) -> DbResult<()> {
        let connection = self.require_live("commit")?;
        connection.commit().await?;
        self.finish(TransactionState::Committed);
        info!(transaction_id = %self.inner.id, "Transaction committed");
        Ok(())
    }

    /// Roll the transaction back.
    pub async fn rollback(&self) -> DbResult<()> {
        let connection = self.require_live("rollback")?;
        connection.rollback().await?;
        self.finish(TransactionState::RolledBack);
        info!(transaction_id = %self.inner.id, "Transaction rolled back");
        Ok(())
    }

    /// Release the transaction, rolling back if it is still live.
    ///
    /// Rollback failures are logged, not returned.
    pub async fn dispose(&self) {
        if self.is_live() {
            if let Err(e) = self.rollback().await {
                warn!(
                    transaction_id = %self.inner.id,
                    error = %e,
                    "Rollback failed while disposing transaction"
                );
            }
        }
        if self.state().is_active() {
            self.finish(TransactionState::RolledBack);
        }
    }

    fn require_live(&self, operation: &str) -> DbResult<Connection<D>> {
        match self.live_connection() {
            Some(connection) => Ok(connection),
            None if self.state().is_ended() => Err(DbError::invalid_transaction(format!(
                "cannot {operation}: transaction {} is already {}",
                self.inner.id,
                state_label(self.state())
            ))),
            None => Err(DbError::invalid_transaction(format!(
                "cannot {operation}: the connection of transaction {} is closed",
                self.inner.id
            ))),
        }
    }

    fn live_connection(&self) -> Option<Connection<D>> {
        let slot = self.slot();
        if !slot.state.is_active() {
            return None;
        }
        slot.connection
            .as_ref()
            .filter(|c| c.generation() == slot.generation && !c.is_closed())
            .cloned()
    }

    fn finish(&self, state: TransactionState) {
        let mut slot = self.slot();
        slot.state = state;
        slot.connection = None;
    }

    fn slot(&self) -> MutexGuard<'_, TransactionSlot<D>> {
        self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn state_label(state: TransactionState) -> &'static str {
    match state {
        TransactionState::Active => "active",
        TransactionState::Committed => "committed",
        TransactionState::RolledBack => "rolled back",
    }
}

impl<D: Driver> Clone for Transaction<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Driver> PartialEq for Transaction<D> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<D: Driver> Eq for Transaction<D> {}

impl<D: Driver> std::fmt::Debug for Transaction<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("started_at", &self.inner.started_at)
            .finish()
    }
}
