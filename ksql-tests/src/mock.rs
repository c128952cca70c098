use async_stream::stream;
use ksql::{
    Connection, Dialect, Error, Executor, Query, QueryResult, Result, RowLabeled, RowNames,
    RowsAffected, SQLITE, Transaction, Value, dialect_by_name, stream::Stream,
};
use std::{
    collections::VecDeque,
    fmt,
    future::{self, Future},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// What the mock answers to the next query.
#[derive(Debug, Clone, PartialEq)]
pub enum MockResponse {
    Rows { labels: RowNames, rows: Vec<Vec<Value>> },
    Affected(RowsAffected),
    Error(String),
}

#[derive(Debug, Default)]
struct MockState {
    queries: Vec<Query>,
    responses: VecDeque<MockResponse>,
    rows_pulled: usize,
    transaction_log: Vec<&'static str>,
}

/// Scripted connection: records every query and replays the queued responses
/// in order. Clones share the same script, keep one to inspect the state
/// after moving the other into a `KsqlDb`.
///
/// Transaction control statements are logged and never consume a response.
/// With nothing queued a query returns no rows and affects none.
#[derive(Clone)]
pub struct MockConnection {
    dialect: &'static dyn Dialect,
    state: Arc<Mutex<MockState>>,
}

impl fmt::Debug for MockConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockConnection")
            .field("dialect", &self.dialect.name())
            .field("state", &*self.state())
            .finish()
    }
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new(&SQLITE)
    }
}

impl MockConnection {
    pub fn new(dialect: &'static dyn Dialect) -> Self {
        Self {
            dialect,
            state: Default::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push_rows(&self, labels: &[&str], rows: Vec<Vec<Value>>) -> &Self {
        let labels: RowNames = labels.iter().map(|v| v.to_string()).collect();
        self.state()
            .responses
            .push_back(MockResponse::Rows { labels, rows });
        self
    }

    pub fn push_affected(&self, rows_affected: u64, last_affected_id: Option<i64>) -> &Self {
        self.state()
            .responses
            .push_back(MockResponse::Affected(RowsAffected {
                rows_affected,
                last_affected_id,
            }));
        self
    }

    pub fn push_error(&self, message: impl Into<String>) -> &Self {
        self.state()
            .responses
            .push_back(MockResponse::Error(message.into()));
        self
    }

    /// Every query received so far, transaction control included.
    pub fn queries(&self) -> Vec<Query> {
        self.state().queries.clone()
    }

    pub fn last_query(&self) -> Option<Query> {
        self.state().queries.last().cloned()
    }

    /// Rows handed to the consumer, a row is counted when it is polled.
    pub fn rows_pulled(&self) -> usize {
        self.state().rows_pulled
    }

    /// `BEGIN`, `COMMIT` and `ROLLBACK` in the order they were received.
    pub fn transaction_log(&self) -> Vec<&'static str> {
        self.state().transaction_log.clone()
    }

    /// Responses not consumed yet.
    pub fn pending(&self) -> usize {
        self.state().responses.len()
    }

    fn receive(&self, query: Query) -> MockResponse {
        let mut state = self.state();
        let control = [
            self.dialect.transaction_begin(),
            self.dialect.transaction_commit(),
            self.dialect.transaction_rollback(),
        ]
        .into_iter()
        .find(|v| *v == query.sql);
        state.queries.push(query);
        if let Some(control) = control {
            state.transaction_log.push(control);
            return MockResponse::Affected(RowsAffected::default());
        }
        state
            .responses
            .pop_front()
            .unwrap_or(MockResponse::Affected(RowsAffected::default()))
    }

    fn pulled(&self) {
        self.state().rows_pulled += 1;
    }
}

impl Executor for MockConnection {
    fn dialect(&self) -> &'static dyn Dialect {
        self.dialect
    }

    fn run(&mut self, query: Query) -> impl Stream<Item = Result<QueryResult>> + Send {
        let connection = self.clone();
        stream! {
            match connection.receive(query) {
                MockResponse::Rows { labels, rows } => {
                    for values in rows {
                        connection.pulled();
                        yield Ok(QueryResult::Row(RowLabeled::new(labels.clone(), values.into())));
                    }
                }
                MockResponse::Affected(v) => yield Ok(QueryResult::Affected(v)),
                MockResponse::Error(message) => yield Err(Error::msg(message)),
            }
        }
    }
}

impl Connection for MockConnection {
    type Transaction<'c> = MockTransaction<'c>;

    /// `mock://<dialect name>`, for example `mock://postgres`.
    fn connect(url: &str) -> impl Future<Output = Result<Self>> + Send {
        let result = url
            .strip_prefix("mock://")
            .and_then(dialect_by_name)
            .map(MockConnection::new)
            .ok_or_else(|| Error::msg(format!("Unknown mock url `{}`", url)));
        future::ready(result)
    }

    async fn begin(&mut self) -> Result<MockTransaction<'_>> {
        let begin = self.dialect.transaction_begin();
        self.execute(begin.into()).await?;
        Ok(MockTransaction { connection: self })
    }
}

pub struct MockTransaction<'c> {
    connection: &'c mut MockConnection,
}

impl<'c> Executor for MockTransaction<'c> {
    fn dialect(&self) -> &'static dyn Dialect {
        self.connection.dialect
    }

    fn run(&mut self, query: Query) -> impl Stream<Item = Result<QueryResult>> + Send {
        self.connection.run(query)
    }
}

impl<'c> Transaction<'c> for MockTransaction<'c> {
    async fn commit(self) -> Result<()> {
        let commit = self.connection.dialect.transaction_commit();
        self.connection.execute(commit.into()).await.map(|_| ())
    }

    async fn rollback(self) -> Result<()> {
        let rollback = self.connection.dialect.transaction_rollback();
        self.connection.execute(rollback.into()).await.map(|_| ())
    }
}
