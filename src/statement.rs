//! SQL rendering for the writer operations.
//!
//! Every function here is pure: it validates its inputs and returns a
//! [`SqlStatement`] without touching a connection. Only identifiers (table and
//! column names) and column types are written into the SQL text; values are
//! always bound as `?` parameters.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, SqliteError};
use crate::value::{Params, Value};

/// Column every created table receives.
pub const ID_COLUMN: &str = "id";

/// What a statement does, as far as its execution outcome is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Adds rows; a successful run reports the last inserted rowid.
    Insert,
    Other,
}

impl StatementKind {
    /// Classifies by leading keyword: `INSERT` or `REPLACE`.
    pub fn of(sql: &str) -> Self {
        let keyword = sql
            .trim_start()
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()
            .unwrap_or_default();
        if keyword.eq_ignore_ascii_case("INSERT") || keyword.eq_ignore_ascii_case("REPLACE") {
            StatementKind::Insert
        } else {
            StatementKind::Other
        }
    }
}

/// Rendered SQL text paired with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    text: String,
    params: Params,
    kind: StatementKind,
}

impl SqlStatement {
    /// Fails when the number of `?` placeholders differs from `params.len()`.
    pub fn new(text: impl Into<String>, params: impl Into<Params>) -> Result<Self> {
        let text = text.into();
        let params = params.into();
        let placeholders = count_placeholders(&text);
        if placeholders != params.len() {
            return Err(SqliteError::invalid(format!(
                "statement has {placeholders} placeholders but {} parameters: {text}",
                params.len()
            )));
        }
        let kind = StatementKind::of(&text);
        Ok(Self { text, params, kind })
    }

    /// A statement without parameters.
    pub fn raw(text: impl Into<String>) -> Result<Self> {
        Self::new(text, Params::new())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn with_kind(mut self, kind: StatementKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn into_parts(self) -> (String, Params) {
        (self.text, self.params)
    }
}

/// Row data for an update, either aligned with the column list or keyed by
/// column name.
#[derive(Debug, Clone, PartialEq)]
pub enum RowData {
    Ordered(Vec<Value>),
    Keyed(HashMap<String, Value>),
}

impl RowData {
    /// Resolve into values in `columns` order.
    pub fn normalize<C: AsRef<str>>(self, columns: &[C]) -> Result<Vec<Value>> {
        match self {
            RowData::Ordered(values) => {
                if values.len() != columns.len() {
                    return Err(SqliteError::invalid(format!(
                        "{} columns but {} values",
                        columns.len(),
                        values.len()
                    )));
                }
                Ok(values)
            }
            RowData::Keyed(mut map) => {
                let mut values = Vec::with_capacity(columns.len());
                for column in columns {
                    let column = column.as_ref();
                    let value = map.remove(column).ok_or_else(|| {
                        SqliteError::invalid(format!("no value supplied for column `{column}`"))
                    })?;
                    values.push(value);
                }
                if let Some(extra) = map.keys().next() {
                    return Err(SqliteError::invalid(format!(
                        "value supplied for column `{extra}` which is not being updated"
                    )));
                }
                Ok(values)
            }
        }
    }
}

impl From<Vec<Value>> for RowData {
    fn from(values: Vec<Value>) -> Self {
        RowData::Ordered(values)
    }
}

impl From<HashMap<String, Value>> for RowData {
    fn from(map: HashMap<String, Value>) -> Self {
        RowData::Keyed(map)
    }
}

pub fn create_table<N, T>(name: &str, column_names: &[N], column_types: &[T]) -> Result<SqlStatement>
where
    N: AsRef<str>,
    T: AsRef<str>,
{
    check_identifier("table", name)?;
    if column_names.is_empty() || column_types.is_empty() {
        return Err(SqliteError::invalid(format!(
            "table `{name}` needs at least one column"
        )));
    }
    if column_names.len() != column_types.len() {
        return Err(SqliteError::invalid(format!(
            "table `{name}` has {} column names but {} column types",
            column_names.len(),
            column_types.len()
        )));
    }
    check_columns(column_names)?;
    if let Some(id) = column_names
        .iter()
        .find(|c| c.as_ref().eq_ignore_ascii_case(ID_COLUMN))
    {
        return Err(SqliteError::invalid(format!(
            "column `{}` is reserved for the primary key",
            id.as_ref()
        )));
    }

    let mut definitions = Vec::with_capacity(column_names.len() + 1);
    definitions.push(format!("{ID_COLUMN} INTEGER PRIMARY KEY AUTOINCREMENT"));
    for (column, ty) in column_names.iter().zip(column_types) {
        let ty = ty.as_ref().trim();
        check_column_type(column.as_ref(), ty)?;
        definitions.push(format!("{} {}", column.as_ref(), ty));
    }

    SqlStatement::raw(format!(
        "CREATE TABLE IF NOT EXISTS {name}({})",
        definitions.join(", ")
    ))
}

pub fn drop_table(name: &str) -> Result<SqlStatement> {
    check_identifier("table", name)?;
    SqlStatement::raw(format!("DROP TABLE IF EXISTS {name}"))
}

pub fn insert_row<C: AsRef<str>>(
    table: &str,
    columns: &[C],
    values: impl Into<Params>,
) -> Result<SqlStatement> {
    let values = values.into();
    let head = insert_head(table, columns)?;
    if values.len() != columns.len() {
        return Err(SqliteError::invalid(format!(
            "insert into `{table}` has {} columns but {} values",
            columns.len(),
            values.len()
        )));
    }
    SqlStatement::new(
        format!("{head} VALUES {}", placeholder_group(columns.len())),
        values,
    )
    .map(|sql| sql.with_kind(StatementKind::Insert))
}

/// One statement for the whole batch; parameters are flattened row by row.
pub fn insert_multiple_rows<C, R>(table: &str, columns: &[C], rows: &[R]) -> Result<SqlStatement>
where
    C: AsRef<str>,
    R: AsRef<[Value]>,
{
    let head = insert_head(table, columns)?;
    if rows.is_empty() {
        return Err(SqliteError::invalid(format!(
            "insert into `{table}` needs at least one row"
        )));
    }
    if let Some((index, row)) = rows
        .iter()
        .enumerate()
        .find(|(_, row)| row.as_ref().len() != columns.len())
    {
        return Err(SqliteError::invalid(format!(
            "row {index} for `{table}` has {} values but {} columns",
            row.as_ref().len(),
            columns.len()
        )));
    }

    let group = placeholder_group(columns.len());
    let groups = vec![group.as_str(); rows.len()].join(", ");
    let params: Params = rows
        .iter()
        .flat_map(|row| row.as_ref().iter().cloned())
        .collect();
    SqlStatement::new(format!("{head} VALUES {groups}"), params)
        .map(|sql| sql.with_kind(StatementKind::Insert))
}

/// `where_value` is bound as the last parameter.
pub fn update_row<C: AsRef<str>>(
    table: &str,
    columns: &[C],
    data: impl Into<RowData>,
    where_column: &str,
    where_value: impl Into<Value>,
) -> Result<SqlStatement> {
    check_identifier("table", table)?;
    check_identifier("column", where_column)?;
    if columns.is_empty() {
        return Err(SqliteError::invalid(format!(
            "update of `{table}` needs at least one column"
        )));
    }
    check_columns(columns)?;
    let mut values = data.into().normalize(columns)?;
    values.push(where_value.into());

    let assignments = columns
        .iter()
        .map(|c| format!("{} = ?", c.as_ref()))
        .collect::<Vec<_>>()
        .join(", ");
    SqlStatement::new(
        format!("UPDATE {table} SET {assignments} WHERE {where_column} = ?"),
        values,
    )
}

pub fn delete_row(
    table: &str,
    where_column: &str,
    where_value: impl Into<Value>,
) -> Result<SqlStatement> {
    check_identifier("table", table)?;
    check_identifier("column", where_column)?;
    SqlStatement::new(
        format!("DELETE FROM {table} WHERE {where_column} = ?"),
        Params::new().with_value(where_value),
    )
}

pub fn set_wal_mode() -> Result<SqlStatement> {
    SqlStatement::raw("PRAGMA journal_mode = WAL")
}

fn insert_head<C: AsRef<str>>(table: &str, columns: &[C]) -> Result<String> {
    check_identifier("table", table)?;
    if columns.is_empty() {
        return Err(SqliteError::invalid(format!(
            "insert into `{table}` needs at least one column"
        )));
    }
    check_columns(columns)?;
    let columns = columns.iter().map(AsRef::as_ref).collect::<Vec<_>>();
    Ok(format!("INSERT INTO {table}({})", columns.join(", ")))
}

fn placeholder_group(width: usize) -> String {
    format!("({})", vec!["?"; width].join(", "))
}

fn check_columns<C: AsRef<str>>(columns: &[C]) -> Result<()> {
    let mut seen = HashSet::with_capacity(columns.len());
    for column in columns {
        let column = column.as_ref();
        check_identifier("column", column)?;
        if !seen.insert(column.to_ascii_lowercase()) {
            return Err(SqliteError::invalid(format!("duplicate column `{column}`")));
        }
    }
    Ok(())
}

/// Accepts `name` or `schema.name` where each part is `[A-Za-z_][A-Za-z0-9_]*`.
pub fn check_identifier(kind: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        });
    if valid {
        Ok(())
    } else {
        Err(SqliteError::invalid(format!("invalid {kind} name `{name}`")))
    }
}

fn check_column_type(column: &str, ty: &str) -> Result<()> {
    if ty.is_empty() || ty.contains(';') || ty.contains("--") || ty.contains("/*") {
        return Err(SqliteError::invalid(format!(
            "invalid type `{ty}` for column `{column}`"
        )));
    }
    Ok(())
}

/// Anonymous `?` placeholders outside quoted literals, identifiers and comments.
pub(crate) fn count_placeholders(sql: &str) -> usize {
    let mut count = 0;
    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                // doubled quotes inside a literal re-enter here as an empty literal
                for inner in chars.by_ref() {
                    if inner == c {
                        break;
                    }
                }
            }
            '[' => {
                for _ in chars.by_ref().take_while(|&inner| inner != ']') {}
            }
            '-' if chars.peek() == Some(&'-') => {
                for _ in chars.by_ref().take_while(|&inner| inner != '\n') {}
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for inner in chars.by_ref() {
                    if previous == '*' && inner == '/' {
                        break;
                    }
                    previous = inner;
                }
            }
            '?' => count += 1,
            _ => {}
        }
    }
    count
}
