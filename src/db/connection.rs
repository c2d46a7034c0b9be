//! Connection handle.
//!
//! A [`Connection`] is a cheap, cloneable handle to one backend session that
//! may or may not be open. Clones share identity: they compare equal and see
//! the same open/closed state.
//!
//! Every close advances the connection's generation counter. Transactions
//! remember the generation they began in, and open readers watch it to stop
//! streaming as soon as the connection goes away.

use crate::db::driver::{Driver, Statement};
use crate::db::transaction::Transaction;
use crate::error::{DbError, DbResult};
use crate::models::{ConnectionState, DatabaseType, Parameter, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard, watch};
use tracing::debug;
use uuid::Uuid;

struct ConnectionInner<D: Driver> {
    id: Uuid,
    driver: Arc<D>,
    connection_string: String,
    /// Native connection; `None` while closed.
    raw: Arc<Mutex<Option<D::Raw>>>,
    generation: watch::Sender<u64>,
    /// Reader that currently owns the session, 0 when none.
    reader: AtomicU64,
    next_reader: AtomicU64,
}

/// Handle to one backend connection created by a [`Driver`].
pub struct Connection<D: Driver> {
    inner: Arc<ConnectionInner<D>>,
}

impl<D: Driver> Connection<D> {
    /// Create a closed connection bound to a connection string.
    pub fn new(driver: Arc<D>, connection_string: impl Into<String>) -> Self {
        let (generation, _) = watch::channel(0);
        Self {
            inner: Arc::new(ConnectionInner {
                id: Uuid::new_v4(),
                driver,
                connection_string: connection_string.into(),
                raw: Arc::new(Mutex::new(None)),
                generation,
                reader: AtomicU64::new(0),
                next_reader: AtomicU64::new(1),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn connection_string(&self) -> &str {
        &self.inner.connection_string
    }

    pub fn database_type(&self) -> DatabaseType {
        self.inner.driver.database_type()
    }

    pub(crate) fn driver(&self) -> &Arc<D> {
        &self.inner.driver
    }

    /// Current state. A connection whose session is held by a reader reports `Fetching`.
    pub fn state(&self) -> ConnectionState {
        match self.inner.raw.try_lock() {
            Ok(slot) if slot.is_some() => ConnectionState::Open,
            Ok(_) => ConnectionState::Closed,
            Err(_) => ConnectionState::Fetching,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.state().is_closed()
    }

    /// Number of times this connection has been closed.
    pub(crate) fn generation(&self) -> u64 {
        *self.inner.generation.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.generation.subscribe()
    }

    /// Open the connection. Opening an open connection is a no-op.
    pub async fn open(&self) -> DbResult<()> {
        let mut slot = self.acquire().await?;
        if slot.is_some() {
            return Ok(());
        }
        let raw = self.inner.driver.open(&self.inner.connection_string).await?;
        *slot = Some(raw);
        debug!(
            connection_id = %self.inner.id,
            database_type = %self.database_type(),
            "Connection opened"
        );
        Ok(())
    }

    /// Close the connection, ending its session.
    ///
    /// Readers streaming from this connection are stopped first. Closing a
    /// closed connection is a no-op.
    pub async fn close(&self) -> DbResult<()> {
        self.inner.generation.send_modify(|generation| *generation += 1);
        let raw = self.inner.raw.lock().await.take();
        match raw {
            Some(raw) => {
                self.inner.driver.close(raw).await?;
                debug!(connection_id = %self.inner.id, "Connection closed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Create an input parameter for commands on this connection.
    pub fn create_parameter(&self, name: impl Into<String>, value: impl Into<Value>) -> Parameter {
        Parameter::new(name, value)
    }

    /// Begin a transaction on this (open) connection.
    pub async fn begin_transaction(&self) -> DbResult<Transaction<D>> {
        let generation = self.generation();
        {
            let mut slot = self.acquire().await?;
            let raw = open_raw(&mut slot)?;
            self.inner.driver.begin(raw).await?;
        }
        Ok(Transaction::new(self.clone(), generation))
    }

    pub(crate) async fn commit(&self) -> DbResult<()> {
        let mut slot = self.acquire().await?;
        let raw = open_raw(&mut slot)?;
        self.inner.driver.commit(raw).await
    }

    pub(crate) async fn rollback(&self) -> DbResult<()> {
        let mut slot = self.acquire().await?;
        let raw = open_raw(&mut slot)?;
        self.inner.driver.rollback(raw).await
    }

    pub(crate) async fn execute(&self, statement: &Statement) -> DbResult<u64> {
        let mut slot = self.acquire().await?;
        let raw = open_raw(&mut slot)?;
        self.inner.driver.execute(raw, statement).await
    }

    pub(crate) async fn scalar(&self, statement: &Statement) -> DbResult<Option<Value>> {
        let mut slot = self.acquire().await?;
        let raw = open_raw(&mut slot)?;
        self.inner.driver.scalar(raw, statement).await
    }

    /// Take exclusive ownership of the open session for a reader task.
    ///
    /// Returns the guard and the reader id to hand back to [`Self::release_reader`].
    pub(crate) async fn acquire_owned(
        &self,
    ) -> DbResult<(OwnedMutexGuard<Option<D::Raw>>, u64)> {
        let slot = match Arc::clone(&self.inner.raw).try_lock_owned() {
            Ok(slot) => slot,
            Err(_) if !self.has_reader() => Arc::clone(&self.inner.raw).lock_owned().await,
            Err(_) => return Err(busy()),
        };
        if slot.is_none() {
            return Err(not_open());
        }
        let reader = self.inner.next_reader.fetch_add(1, Ordering::Relaxed);
        self.inner.reader.store(reader, Ordering::Release);
        Ok((slot, reader))
    }

    /// Mark `reader` as done with the session. Its task may still be
    /// winding down; the next caller waits for the lock instead of failing.
    pub(crate) fn release_reader(&self, reader: u64) {
        let _ = self
            .inner
            .reader
            .compare_exchange(reader, 0, Ordering::AcqRel, Ordering::Relaxed);
    }

    fn has_reader(&self) -> bool {
        self.inner.reader.load(Ordering::Acquire) != 0
    }

    /// Lock the session. Fails while a live reader holds it.
    async fn acquire(&self) -> DbResult<MutexGuard<'_, Option<D::Raw>>> {
        match self.inner.raw.try_lock() {
            Ok(slot) => Ok(slot),
            Err(_) if !self.has_reader() => Ok(self.inner.raw.lock().await),
            Err(_) => Err(busy()),
        }
    }
}

fn open_raw<R>(slot: &mut Option<R>) -> DbResult<&mut R> {
    slot.as_mut().ok_or_else(not_open)
}

fn busy() -> DbError {
    DbError::invalid_operation("connection is busy with an open reader")
}

fn not_open() -> DbError {
    DbError::invalid_operation("connection is not open")
}

impl<D: Driver> Clone for Connection<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Driver> PartialEq for Connection<D> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<D: Driver> Eq for Connection<D> {}

impl<D: Driver> std::fmt::Debug for Connection<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("database_type", &self.database_type())
            .field("state", &self.state())
            .finish()
    }
}
