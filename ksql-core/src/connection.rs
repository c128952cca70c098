use crate::{Executor, Result, Transaction};
use std::future::Future;

pub trait Connection: Executor + Sized {
    type Transaction<'c>: Transaction<'c>
    where
        Self: 'c;

    /// Open a connection to the database at the given URL
    fn connect(url: &str) -> impl Future<Output = Result<Self>> + Send;

    /// Start a transaction, the connection is borrowed until it ends.
    fn begin(&mut self) -> impl Future<Output = Result<Self::Transaction<'_>>> + Send;
}
