//! Connection handle over a single SQLite connection.
//!
//! The native [`rusqlite::Connection`] is owned by a
//! [`tokio_rusqlite::Connection`], which runs every call on one background
//! thread in the order calls were queued. Results come back through a oneshot
//! future per statement, so no SQLite work runs on the caller's thread. A unit
//! of work submitted with [`Scheduling::Unordered`] is queued as a single call
//! whose statements the handle may reorder.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::Context;

use async_trait::async_trait;
use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt};
use futures::pin_mut;
use futures::task::noop_waker_ref;
use rusqlite::params_from_iter;

use crate::config::{OpenMode, SqliteConfig};
use crate::diagnostics::{DiagnosticSink, TracingSink};
use crate::error::{Result, SqliteError};
use crate::statement::{self, SqlStatement, StatementKind};
use crate::value::{ExecOutcome, Row, Value};

/// Asynchronous statement execution.
///
/// Implemented by [`ConnectionHandle`]; [`crate::SqliteWriter`] is generic
/// over it.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run a statement that returns no rows.
    async fn execute(&self, statement: SqlStatement) -> Result<ExecOutcome>;

    /// Run a query and collect every row; no match yields an empty vector.
    async fn query_all(&self, statement: SqlStatement) -> Result<Vec<Row>>;

    /// Run a query and return its first row, or `None` when nothing matched.
    async fn query_one(&self, statement: SqlStatement) -> Result<Option<Row>>;
}

#[async_trait]
impl<T: Executor + ?Sized> Executor for Arc<T> {
    async fn execute(&self, statement: SqlStatement) -> Result<ExecOutcome> {
        (**self).execute(statement).await
    }

    async fn query_all(&self, statement: SqlStatement) -> Result<Vec<Row>> {
        (**self).query_all(statement).await
    }

    async fn query_one(&self, statement: SqlStatement) -> Result<Option<Row>> {
        (**self).query_one(statement).await
    }
}

#[async_trait]
impl<T: Executor + ?Sized> Executor for &T {
    async fn execute(&self, statement: SqlStatement) -> Result<ExecOutcome> {
        (**self).execute(statement).await
    }

    async fn query_all(&self, statement: SqlStatement) -> Result<Vec<Row>> {
        (**self).query_all(statement).await
    }

    async fn query_one(&self, statement: SqlStatement) -> Result<Option<Row>> {
        (**self).query_one(statement).await
    }
}

/// How the statements of a unit of work are handed to the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheduling {
    /// One call per statement in submission order, each completing before
    /// the next.
    Ordered,
    /// One call for the whole unit; execution order is up to the handle.
    Unordered,
}

enum Reply {
    Execute(oneshot::Sender<Result<ExecOutcome>>),
    QueryAll(oneshot::Sender<Result<Vec<Row>>>),
    QueryOne(oneshot::Sender<Result<Option<Row>>>),
}

struct Job {
    statement: SqlStatement,
    reply: Reply,
}

impl Job {
    fn run(self, conn: &rusqlite::Connection, sink: &dyn DiagnosticSink) {
        let Job { statement, reply } = self;
        match reply {
            Reply::Execute(tx) => {
                let _ = tx.send(report(sink, &statement, execute(conn, &statement)));
            }
            Reply::QueryAll(tx) => {
                let _ = tx.send(report(sink, &statement, query(conn, &statement, None)));
            }
            Reply::QueryOne(tx) => {
                let row = query(conn, &statement, Some(1)).map(|rows| rows.into_iter().next());
                let _ = tx.send(report(sink, &statement, row));
            }
        }
    }
}

/// Handle to one open SQLite database.
///
/// `Open` until [`close`](Self::close) is called, then permanently `Closed`:
/// every later operation fails with [`SqliteError::ClosedHandle`]. Dropping the
/// handle also releases the connection.
pub struct ConnectionHandle {
    path: PathBuf,
    mode: OpenMode,
    conn: Mutex<Option<tokio_rusqlite::Connection>>,
    sink: Arc<dyn DiagnosticSink>,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("open", &self.is_open())
            .finish()
    }
}

impl ConnectionHandle {
    /// Open a handle reporting failures through [`TracingSink`].
    pub async fn open(config: SqliteConfig) -> Result<Self> {
        Self::open_with_sink(config, Arc::new(TracingSink)).await
    }

    /// Validates `config` before any connection attempt, then opens the
    /// database. When `config.wal` is set the journal is switched to
    /// write-ahead logging before the handle is returned.
    pub async fn open_with_sink(
        config: SqliteConfig,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self> {
        if let Err(e) = config.validate() {
            sink.report(&e);
            return Err(e);
        }

        let SqliteConfig { db_path, mode, wal } = config;
        let conn = match tokio_rusqlite::Connection::open_with_flags(&db_path, mode.flags()).await
        {
            Ok(conn) => conn,
            Err(e) => {
                let error = SqliteError::Connection {
                    path: db_path,
                    source: Box::new(e),
                };
                sink.report(&error);
                return Err(error);
            }
        };
        tracing::debug!(path = %db_path.display(), %mode, "sqlite connection opened");

        let handle = Self {
            path: db_path,
            mode,
            conn: Mutex::new(Some(conn)),
            sink,
        };
        if wal {
            // the handle is dropped on failure, which releases the connection
            handle.query_one(statement::set_wal_mode()?).await?;
        }
        Ok(handle)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.slot().is_some()
    }

    /// Run `unit` and dispatch its submissions in submission order.
    pub fn run_ordered<F, R>(&self, unit: F) -> R
    where
        F: FnOnce(&mut UnitOfWork) -> R,
    {
        self.run(Scheduling::Ordered, unit)
    }

    /// Run `unit` and dispatch its submissions as one reorderable batch. The
    /// caller guarantees the statements are independent.
    pub fn run_unordered<F, R>(&self, unit: F) -> R
    where
        F: FnOnce(&mut UnitOfWork) -> R,
    {
        self.run(Scheduling::Unordered, unit)
    }

    /// Returns once every submission is queued on the connection, not once
    /// they have completed.
    pub fn run<F, R>(&self, scheduling: Scheduling, unit: F) -> R
    where
        F: FnOnce(&mut UnitOfWork) -> R,
    {
        let mut work = UnitOfWork { jobs: Vec::new() };
        let result = unit(&mut work);
        self.dispatch(scheduling, work.jobs);
        result
    }

    /// Release the native connection. Closing a closed handle is a no-op.
    ///
    /// Statements queued before the close still run.
    pub async fn close(&self) -> Result<()> {
        let conn = self.slot().take();
        let Some(conn) = conn else {
            return Ok(());
        };
        if let Err(e) = conn.close().await {
            // the handle stays closed; dropping the returned connection releases it
            let error = SqliteError::Connection {
                path: self.path.clone(),
                source: Box::new(e),
            };
            self.sink.report(&error);
            return Err(error);
        }
        tracing::debug!(path = %self.path.display(), "sqlite connection closed");
        Ok(())
    }

    fn slot(&self) -> MutexGuard<'_, Option<tokio_rusqlite::Connection>> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Jobs that cannot be queued are dropped, resolving their futures with
    /// `ClosedHandle`.
    fn dispatch(&self, scheduling: Scheduling, jobs: Vec<Job>) {
        if jobs.is_empty() {
            return;
        }
        let conn = self.slot().clone();
        let Some(conn) = conn else {
            self.sink.report(&SqliteError::ClosedHandle);
            return;
        };
        tracing::debug!(?scheduling, statements = jobs.len(), "dispatching unit of work");
        match scheduling {
            Scheduling::Ordered => {
                for job in jobs {
                    self.queue(&conn, vec![job]);
                }
            }
            Scheduling::Unordered => self.queue(&conn, group_by_text(jobs)),
        }
    }

    fn queue(&self, conn: &tokio_rusqlite::Connection, jobs: Vec<Job>) {
        let sink = Arc::clone(&self.sink);
        let call = conn.call(move |conn| {
            for job in jobs {
                job.run(conn, sink.as_ref());
            }
            Ok(())
        });
        pin_mut!(call);
        // the call is queued on its first poll; each job answers on its own
        // channel, so the call future itself is not kept
        let _ = call.as_mut().poll(&mut Context::from_waker(noop_waker_ref()));
    }

    async fn submit<T>(&self, statement: SqlStatement, reply: fn(oneshot::Sender<Result<T>>) -> Reply) -> Result<T>
    where
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.dispatch(
            Scheduling::Ordered,
            vec![Job {
                statement,
                reply: reply(tx),
            }],
        );
        rx.await.unwrap_or_else(|_| Err(SqliteError::ClosedHandle))
    }
}

#[async_trait]
impl Executor for ConnectionHandle {
    async fn execute(&self, statement: SqlStatement) -> Result<ExecOutcome> {
        self.submit(statement, Reply::Execute).await
    }

    async fn query_all(&self, statement: SqlStatement) -> Result<Vec<Row>> {
        self.submit(statement, Reply::QueryAll).await
    }

    async fn query_one(&self, statement: SqlStatement) -> Result<Option<Row>> {
        self.submit(statement, Reply::QueryOne).await
    }
}

/// Statements collected inside [`ConnectionHandle::run_ordered`] or
/// [`ConnectionHandle::run_unordered`].
///
/// Each submission returns a future resolving once the statement has run.
/// Nothing is queued until the enclosing closure returns.
pub struct UnitOfWork {
    jobs: Vec<Job>,
}

impl UnitOfWork {
    pub fn execute(&mut self, statement: SqlStatement) -> BoxFuture<'static, Result<ExecOutcome>> {
        let (tx, rx) = oneshot::channel();
        self.push(statement, Reply::Execute(tx));
        resolve(rx)
    }

    pub fn query_all(&mut self, statement: SqlStatement) -> BoxFuture<'static, Result<Vec<Row>>> {
        let (tx, rx) = oneshot::channel();
        self.push(statement, Reply::QueryAll(tx));
        resolve(rx)
    }

    pub fn query_one(
        &mut self,
        statement: SqlStatement,
    ) -> BoxFuture<'static, Result<Option<Row>>> {
        let (tx, rx) = oneshot::channel();
        self.push(statement, Reply::QueryOne(tx));
        resolve(rx)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn push(&mut self, statement: SqlStatement, reply: Reply) {
        self.jobs.push(Job { statement, reply });
    }
}

fn resolve<T: Send + 'static>(rx: oneshot::Receiver<Result<T>>) -> BoxFuture<'static, Result<T>> {
    async move { rx.await.unwrap_or_else(|_| Err(SqliteError::ClosedHandle)) }.boxed()
}

fn report<T>(
    sink: &dyn DiagnosticSink,
    statement: &SqlStatement,
    result: rusqlite::Result<T>,
) -> Result<T> {
    result.map_err(|source| {
        let error = SqliteError::Statement {
            sql: statement.text().to_string(),
            source,
        };
        sink.report(&error);
        error
    })
}

fn total_changes(conn: &rusqlite::Connection) -> rusqlite::Result<i64> {
    conn.prepare_cached("SELECT total_changes()")?
        .query_row([], |row| row.get(0))
}

fn execute(conn: &rusqlite::Connection, statement: &SqlStatement) -> rusqlite::Result<ExecOutcome> {
    // sqlite3_changes() keeps the previous DML count across DDL, the running
    // total does not move
    let before = total_changes(conn)?;
    conn.prepare_cached(statement.text())?
        .execute(params_from_iter(statement.params().iter()))?;
    let changes = usize::try_from(total_changes(conn)? - before).unwrap_or_default();
    let last_insert_id = (statement.kind() == StatementKind::Insert && changes > 0)
        .then(|| conn.last_insert_rowid());
    Ok(ExecOutcome {
        last_insert_id,
        changes,
    })
}

fn query(
    conn: &rusqlite::Connection,
    statement: &SqlStatement,
    limit: Option<usize>,
) -> rusqlite::Result<Vec<Row>> {
    let mut stmt = conn.prepare_cached(statement.text())?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query(params_from_iter(statement.params().iter()))?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let values = (0..columns.len())
            .map(|i| row.get_ref(i).map(Value::from))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        result.push(Row::new(columns.clone(), values));
        if limit.is_some_and(|limit| result.len() >= limit) {
            break;
        }
    }
    Ok(result)
}

/// Reorders a batch so statements sharing the same text run back to back,
/// groups appearing in order of first submission.
fn group_by_text(jobs: Vec<Job>) -> Vec<Job> {
    let mut groups: Vec<Vec<Job>> = Vec::new();
    for job in jobs {
        match groups
            .iter_mut()
            .find(|group| group[0].statement.text() == job.statement.text())
        {
            Some(group) => group.push(job),
            None => groups.push(vec![job]),
        }
    }
    groups.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(text: &str) -> Job {
        let (tx, _rx) = oneshot::channel();
        Job {
            statement: SqlStatement::raw(text).expect("no placeholders"),
            reply: Reply::Execute(tx),
        }
    }

    #[test]
    fn unordered_batch_groups_identical_statements() {
        let jobs = vec![job("A"), job("B"), job("A"), job("C"), job("B")];
        let order: Vec<String> = group_by_text(jobs)
            .into_iter()
            .map(|job| job.statement.text().to_string())
            .collect();
        assert_eq!(order, vec!["A", "A", "B", "B", "C"]);
    }
}
