//! Forward-only data reader.
//!
//! Rows are fetched by a background task that holds the connection's session
//! exclusively and forwards rows through a bounded channel, so rows are
//! pulled from the backend only as fast as the caller consumes them.

use crate::db::connection::Connection;
use crate::db::driver::{Driver, Statement};
use crate::error::{DbError, DbResult};
use crate::models::Row;
use futures_util::stream::{Stream, StreamExt, TryStreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Rows buffered ahead of the consumer.
const READ_AHEAD: usize = 16;

/// Stream of rows bound to an open connection.
///
/// Finite and not restartable. Once the connection closes, the reader yields
/// one [`DbError::InvalidOperation`] and then ends.
pub struct DataReader<D: Driver> {
    connection: Connection<D>,
    rows: mpsc::Receiver<DbResult<Row>>,
    generation: u64,
    reader_id: u64,
    task: JoinHandle<()>,
    finished: bool,
}

impl<D: Driver> DataReader<D> {
    pub(crate) async fn start(connection: Connection<D>, statement: Statement) -> DbResult<Self> {
        let (mut slot, reader_id) = connection.acquire_owned().await?;
        let driver = connection.driver().clone();
        let mut closed = connection.subscribe();
        let generation = *closed.borrow_and_update();
        let connection_id = connection.id();
        let (tx, rx) = mpsc::channel(READ_AHEAD);

        let task = tokio::spawn(async move {
            let Some(raw) = slot.as_mut() else {
                return;
            };
            let mut rows = driver.fetch(raw, &statement);
            loop {
                let next = tokio::select! {
                    _ = closed.changed() => break,
                    next = rows.next() => next,
                };
                let Some(item) = next else {
                    break;
                };
                let failed = item.is_err();
                tokio::select! {
                    _ = closed.changed() => break,
                    sent = tx.send(item) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
                if failed {
                    break;
                }
            }
            debug!(connection_id = %connection_id, "Reader released connection");
        });

        debug!(connection_id = %connection.id(), "Reader started");
        Ok(Self {
            connection,
            rows: rx,
            generation,
            reader_id,
            task,
            finished: false,
        })
    }

    /// Connection the reader streams from.
    pub fn connection(&self) -> &Connection<D> {
        &self.connection
    }

    /// Read the next row, or `None` once the result set is exhausted.
    pub async fn read(&mut self) -> DbResult<Option<Row>> {
        self.next().await.transpose()
    }

    /// Drain the remaining rows.
    pub async fn collect_rows(self) -> DbResult<Vec<Row>> {
        self.try_collect().await
    }

    /// Stop reading and release the connection for other commands.
    pub async fn close(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
        self.connection.release_reader(self.reader_id);
        self.finished = true;
    }

    fn invalidated(&self) -> bool {
        self.connection.generation() != self.generation
    }
}

impl<D: Driver> Stream for DataReader<D> {
    type Item = DbResult<Row>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }
        if this.invalidated() {
            this.finished = true;
            return Poll::Ready(Some(Err(DbError::invalid_operation(
                "reader invalidated: connection closed",
            ))));
        }
        match this.rows.poll_recv(cx) {
            Poll::Ready(Some(item)) => Poll::Ready(Some(item)),
            Poll::Ready(None) => {
                this.finished = true;
                if this.invalidated() {
                    Poll::Ready(Some(Err(DbError::invalid_operation(
                        "reader invalidated: connection closed",
                    ))))
                } else {
                    Poll::Ready(None)
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<D: Driver> Drop for DataReader<D> {
    fn drop(&mut self) {
        // The aborted task lets go of the session on its next poll
        self.task.abort();
        self.connection.release_reader(self.reader_id);
    }
}

impl<D: Driver> std::fmt::Debug for DataReader<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataReader")
            .field("connection", &self.connection.id())
            .field("finished", &self.finished)
            .finish()
    }
}
