use crate::SqliteConnection;
use ksql_core::{
    Dialect, Executor, Query, QueryResult, Result, SQLITE, Transaction, future::TryFutureExt,
    stream::Stream,
};
use std::future::Future;

/// A transaction holding the connection until it is committed or rolled back.
pub struct SqliteTransaction<'c> {
    connection: &'c mut SqliteConnection,
}

impl<'c> SqliteTransaction<'c> {
    pub async fn new(connection: &'c mut SqliteConnection) -> Result<Self> {
        connection
            .execute(SQLITE.transaction_begin().into())
            .await?;
        Ok(Self { connection })
    }
}

impl<'c> Executor for SqliteTransaction<'c> {
    fn dialect(&self) -> &'static dyn Dialect {
        self.connection.dialect()
    }

    fn run(&mut self, query: Query) -> impl Stream<Item = Result<QueryResult>> + Send {
        self.connection.run(query)
    }
}

impl<'c> Transaction<'c> for SqliteTransaction<'c> {
    fn commit(self) -> impl Future<Output = Result<()>> + Send {
        self.connection
            .execute(SQLITE.transaction_commit().into())
            .map_ok(|_| ())
    }

    fn rollback(self) -> impl Future<Output = Result<()>> + Send {
        self.connection
            .execute(SQLITE.transaction_rollback().into())
            .map_ok(|_| ())
    }
}
