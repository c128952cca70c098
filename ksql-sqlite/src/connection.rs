use crate::{
    CBox, SqliteTransaction,
    bind::bind_params,
    error_message_from_ptr,
    extract::{extract_names, extract_row},
};
use async_stream::try_stream;
use ksql_core::{
    Connection, Context, Dialect, Error, Executor, Query, QueryResult, Result, RowsAffected,
    SQLITE, stream::Stream, truncate_long,
};
use libsqlite3_sys::{
    SQLITE_BUSY, SQLITE_DONE, SQLITE_OK, SQLITE_OPEN_CREATE, SQLITE_OPEN_READWRITE,
    SQLITE_OPEN_URI, SQLITE_ROW, sqlite3, sqlite3_changes64, sqlite3_close, sqlite3_column_count,
    sqlite3_errmsg, sqlite3_finalize, sqlite3_last_insert_rowid, sqlite3_open_v2,
    sqlite3_prepare_v2, sqlite3_step, sqlite3_stmt,
};
use std::{
    ffi::{CStr, CString, c_char, c_int},
    future::Future,
    ptr,
};
use tokio::task::spawn_blocking;

/// A connection to a SQLite database.
///
/// The url has the form `sqlite://<path>[?mode=ro|rw|rwc|memory]`, use
/// `sqlite://:memory:` for a private in memory database.
pub struct SqliteConnection {
    pub(crate) connection: CBox<*mut sqlite3>,
}

fn connection_error(connection: &CBox<*mut sqlite3>) -> Error {
    Error::msg(error_message_from_ptr(&unsafe { sqlite3_errmsg(**connection) }).to_string())
}

fn prepare(connection: &CBox<*mut sqlite3>, sql: &str) -> Result<CBox<*mut sqlite3_stmt>> {
    let len = sql.len();
    let sql = CString::new(sql)
        .map_err(|e| Error::new(e).context("Could not create a CString from the query String"))?;
    let mut statement = CBox::new(ptr::null_mut(), |p| unsafe {
        sqlite3_finalize(p);
    });
    let mut tail: *const c_char = ptr::null();
    let rc = unsafe {
        sqlite3_prepare_v2(
            **connection,
            sql.as_ptr(),
            len as c_int,
            &mut *statement,
            &mut tail,
        )
    };
    if rc != SQLITE_OK {
        return Err(connection_error(connection));
    }
    if !tail.is_null() {
        let remaining = unsafe { CStr::from_ptr(tail) }.to_string_lossy();
        if !remaining.trim().is_empty() {
            return Err(Error::msg("Cannot prepare more than one statement at a time"));
        }
    }
    if statement.is_null() {
        return Err(Error::msg("The query does not contain any statement"));
    }
    Ok(statement)
}

fn step(statement: &CBox<*mut sqlite3_stmt>) -> c_int {
    unsafe { sqlite3_step(**statement) }
}

fn column_count(statement: &CBox<*mut sqlite3_stmt>) -> c_int {
    unsafe { sqlite3_column_count(**statement) }
}

fn rows_affected(connection: &CBox<*mut sqlite3>) -> RowsAffected {
    let (changes, rowid) = unsafe {
        (
            sqlite3_changes64(**connection),
            sqlite3_last_insert_rowid(**connection),
        )
    };
    RowsAffected {
        rows_affected: changes.max(0) as u64,
        last_affected_id: (rowid != 0).then_some(rowid),
    }
}

impl Executor for SqliteConnection {
    fn dialect(&self) -> &'static dyn Dialect {
        &SQLITE
    }

    fn run(&mut self, query: Query) -> impl Stream<Item = Result<QueryResult>> + Send {
        // Borrowed handle, the connection itself is closed by `self`
        let connection = CBox::new(*self.connection, |_| {});
        try_stream! {
            let Query { sql, params } = query;
            let context = format!("While running the query:\n{}", truncate_long!(sql));
            let prepared = spawn_blocking(move || {
                let statement = prepare(&connection, &sql);
                (connection, statement)
            })
            .await
            .context(context.clone())?;
            let (connection, statement) = prepared;
            let statement = statement.map_err(|e| {
                let error = e.context(context.clone());
                log::error!("{:#}", error);
                error
            })?;
            bind_params(&statement, &params).context(context.clone())?;
            let labels = extract_names(&statement)?;
            loop {
                match step(&statement) {
                    SQLITE_BUSY => continue,
                    SQLITE_DONE => break,
                    SQLITE_ROW => {
                        let row = extract_row(&statement, &labels).context(context.clone())?;
                        yield QueryResult::Row(row);
                    }
                    _ => {
                        let error = connection_error(&connection).context(context.clone());
                        log::error!("{:#}", error);
                        Err::<(), _>(error)?;
                    }
                }
            }
            if column_count(&statement) == 0 {
                yield QueryResult::Affected(rows_affected(&connection));
            }
        }
    }
}

const URL_PREFIX: &str = "sqlite://";

/// Translates `sqlite://path?query` into the `file:path?query` form SQLite opens with URI handling.
fn sqlite_uri(url: &str) -> Result<CString> {
    let Some(path) = url.strip_prefix(URL_PREFIX) else {
        return Err(Error::msg(format!(
            "Expected sqlite connection url to start with `{}`",
            URL_PREFIX
        )));
    };
    CString::new(format!("file:{}", path))
        .with_context(|| format!("Error while decoding connection URL: `{}`", url))
}

impl Connection for SqliteConnection {
    type Transaction<'c> = SqliteTransaction<'c>;

    async fn connect(url: &str) -> Result<SqliteConnection> {
        let uri = sqlite_uri(url)?;
        let mut connection = CBox::new(ptr::null_mut(), |p| unsafe {
            sqlite3_close(p);
        });
        let rc = unsafe {
            sqlite3_open_v2(
                uri.as_ptr(),
                &mut *connection,
                SQLITE_OPEN_URI | SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE,
                ptr::null(),
            )
        };
        if rc != SQLITE_OK {
            let error = if connection.is_null() {
                Error::msg("Out of memory while opening the database")
            } else {
                connection_error(&connection)
            }
            .context(format!("Could not open the database `{}`", url));
            log::error!("{:#}", error);
            return Err(error);
        }
        Ok(Self { connection })
    }

    fn begin(&mut self) -> impl Future<Output = Result<SqliteTransaction<'_>>> + Send {
        SqliteTransaction::new(self)
    }
}
