use crate::connection::{ConnectionHandle, Executor, UnitOfWork};
use crate::error::Result;
use crate::statement::{self, RowData, SqlStatement};
use crate::value::{ExecOutcome, Params, Value};

/// Writes to a SQLite database through an [`Executor`].
///
/// Every operation renders its statement first; input shape errors come back
/// as [`crate::SqliteError::InvalidConfiguration`] without any SQL reaching the
/// executor.
#[derive(Debug)]
pub struct SqliteWriter<E = ConnectionHandle> {
    executor: E,
}

impl<E: Executor> SqliteWriter<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn into_inner(self) -> E {
        self.executor
    }

    /// Turns on write-ahead logging and returns the journal mode SQLite reports.
    pub async fn set_wal_mode(&self) -> Result<String> {
        let row = self.executor.query_one(statement::set_wal_mode()?).await?;
        Ok(row
            .and_then(|row| row.get("journal_mode").and_then(Value::as_text).map(str::to_owned))
            .unwrap_or_default())
    }

    /// Creates `name` with an auto-increment `id` primary key followed by the
    /// given columns.
    pub async fn create_table<N, T>(
        &self,
        name: &str,
        column_names: &[N],
        column_types: &[T],
    ) -> Result<ExecOutcome>
    where
        N: AsRef<str>,
        T: AsRef<str>,
    {
        let sql = statement::create_table(name, column_names, column_types)?;
        self.run(sql).await
    }

    pub async fn drop_table(&self, name: &str) -> Result<ExecOutcome> {
        self.run(statement::drop_table(name)?).await
    }

    pub async fn insert_row<C: AsRef<str>>(
        &self,
        table: &str,
        columns: &[C],
        values: impl Into<Params>,
    ) -> Result<ExecOutcome> {
        self.run(statement::insert_row(table, columns, values)?).await
    }

    /// Inserts every row with a single statement. A row whose length differs
    /// from `columns` rejects the whole batch.
    pub async fn insert_multiple_rows<C, R>(
        &self,
        table: &str,
        columns: &[C],
        rows: &[R],
    ) -> Result<ExecOutcome>
    where
        C: AsRef<str>,
        R: AsRef<[Value]>,
    {
        self.run(statement::insert_multiple_rows(table, columns, rows)?)
            .await
    }

    /// `data` may be ordered like `columns` or keyed by column name.
    pub async fn update_row<C: AsRef<str>>(
        &self,
        table: &str,
        columns: &[C],
        data: impl Into<RowData>,
        where_column: &str,
        where_value: impl Into<Value>,
    ) -> Result<ExecOutcome> {
        let sql = statement::update_row(table, columns, data, where_column, where_value)?;
        self.run(sql).await
    }

    pub async fn delete_row(
        &self,
        table: &str,
        where_column: &str,
        where_value: impl Into<Value>,
    ) -> Result<ExecOutcome> {
        self.run(statement::delete_row(table, where_column, where_value)?)
            .await
    }

    async fn run(&self, sql: SqlStatement) -> Result<ExecOutcome> {
        self.executor.execute(sql).await
    }
}

impl SqliteWriter<ConnectionHandle> {
    pub fn run_ordered<F, R>(&self, unit: F) -> R
    where
        F: FnOnce(&mut UnitOfWork) -> R,
    {
        self.executor.run_ordered(unit)
    }

    pub fn run_unordered<F, R>(&self, unit: F) -> R
    where
        F: FnOnce(&mut UnitOfWork) -> R,
    {
        self.executor.run_unordered(unit)
    }

    /// Close the database connection
    pub async fn close_db(&self) -> Result<()> {
        self.executor.close().await
    }
}
