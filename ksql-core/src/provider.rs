use crate::{
    AsValue, ChunkParser, Connection, Error, Executor, InsertMethod, InsertStatement, KsqlError,
    Query, Record, Result, RowLabeled, StructInfoCache, Table, Transaction, Value, build_query,
    fill_many, fill_one, future::BoxFuture, record_ids, run_chunks, stream::TryStreamExt,
    write_delete, write_insert, write_update,
};
use anyhow::Context;
use futures::FutureExt;
use std::{
    any,
    future::Future,
    panic::{self, AssertUnwindSafe},
    pin::pin,
    sync::Arc,
};
use uuid::Uuid;

/// What `delete` accepts to identify the row: a record or a bare ID value.
pub trait IdOrRecord: Send {
    /// Values of the ID columns of `table`, in column order.
    fn id_values(&self, cache: &StructInfoCache, table: &Table) -> Result<Vec<Value>>;
}

impl<R: Record> IdOrRecord for &R {
    fn id_values(&self, cache: &StructInfoCache, table: &Table) -> Result<Vec<Value>> {
        let info = cache.resolve::<R>()?;
        record_ids(&info, table, *self)
    }
}

fn single_id<T>(table: &Table, value: Value) -> Result<Vec<Value>> {
    if table.is_composite() {
        return Err(KsqlError::InvalidShape {
            type_name: any::type_name::<T>(),
            reason: format!(
                "table `{}` has a composite key, delete it by record",
                table.name()
            ),
        }
        .into());
    }
    if value.is_zero() {
        return Err(KsqlError::MissingId {
            column: table.id_columns()[0].clone(),
        }
        .into());
    }
    Ok(vec![value])
}

macro_rules! impl_id_or_record {
    ($($source:ty),+) => {
        $(
            impl IdOrRecord for $source {
                fn id_values(&self, _cache: &StructInfoCache, table: &Table) -> Result<Vec<Value>> {
                    single_id::<$source>(table, self.clone().as_value())
                }
            }
        )+
    };
}

impl_id_or_record!(i8, i16, i32, i64, u8, u16, u32, u64, String, Uuid);

impl IdOrRecord for &str {
    fn id_values(&self, _cache: &StructInfoCache, table: &Table) -> Result<Vec<Value>> {
        single_id::<&str>(table, Value::Varchar(Some(self.to_string())))
    }
}

impl IdOrRecord for Value {
    fn id_values(&self, _cache: &StructInfoCache, table: &Table) -> Result<Vec<Value>> {
        single_id::<Value>(table, self.clone())
    }
}

/// The operations available on a database handle, inside or outside a
/// transaction.
pub trait Provider: Send {
    /// Handle given to the callback of [`Provider::transaction`].
    type Scoped<'t>: Provider
    where
        Self: 't;

    /// Replaces the content of `records` with the rows of the query.
    ///
    /// A query starting with `FROM` gets the `SELECT` clause generated from `R`.
    fn query<R: Record + Default>(
        &mut self,
        records: &mut Vec<R>,
        query: &str,
        params: Vec<Value>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Fills `record` with the first row of the query, [`KsqlError::NotFound`] when there is none.
    fn query_one<R: Record + Default>(
        &mut self,
        record: &mut R,
        query: &str,
        params: Vec<Value>,
    ) -> impl Future<Output = Result<()>> + Send;

    fn query_chunks<R, F>(
        &mut self,
        parser: ChunkParser<'_, F>,
    ) -> impl Future<Output = Result<()>> + Send
    where
        R: Record + Default,
        F: FnMut(&[R]) -> Result<()> + Send;

    /// Inserts `record` and writes back the IDs generated by the database.
    fn insert<R: Record>(
        &mut self,
        table: &Table,
        record: &mut R,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Updates the non null fields of `record`, the row is matched by its IDs.
    fn patch<R: Record>(
        &mut self,
        table: &Table,
        record: &R,
    ) -> impl Future<Output = Result<()>> + Send;

    fn delete(
        &mut self,
        table: &Table,
        id: impl IdOrRecord,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Runs a statement and returns the number of rows affected.
    fn exec(
        &mut self,
        query: &str,
        params: Vec<Value>,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Runs `f` inside a transaction.
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err` or
    /// panics. The panic is resumed after the rollback.
    fn transaction<'a, T, F>(&'a mut self, f: F) -> impl Future<Output = Result<T>> + Send
    where
        Self: 'a,
        T: Send + 'a,
        F: for<'t> FnOnce(&'t mut Self::Scoped<'a>) -> BoxFuture<'t, Result<T>> + Send + 'a;
}

pub(crate) async fn query_records<E, R>(
    executor: &mut E,
    cache: &StructInfoCache,
    records: &mut Vec<R>,
    query: &str,
    params: Vec<Value>,
) -> Result<()>
where
    E: Executor,
    R: Record + Default,
{
    let info = cache.resolve::<R>()?;
    let query = build_query::<R>(cache, executor.dialect(), query, params)?;
    log::debug!("{}", query);
    let rows: Vec<RowLabeled> = executor.fetch(query).try_collect().await?;
    fill_many(cache, &info, rows, records)
}

pub(crate) async fn query_record<E, R>(
    executor: &mut E,
    cache: &StructInfoCache,
    record: &mut R,
    query: &str,
    params: Vec<Value>,
) -> Result<()>
where
    E: Executor,
    R: Record + Default,
{
    let info = cache.resolve::<R>()?;
    let query = build_query::<R>(cache, executor.dialect(), query, params)?;
    log::debug!("{}", query);
    let mut stream = pin!(executor.fetch(query));
    let Some(row) = stream.try_next().await? else {
        return Err(KsqlError::NotFound.into());
    };
    *record = R::default();
    fill_one(cache, &info, row, record)
}

/// Some drivers label returned columns with the quoted expression text.
fn returned_column(row: &RowLabeled, column: &str) -> Option<Value> {
    row.get_column(column).cloned().or_else(|| {
        row.labels
            .iter()
            .position(|v| {
                v.trim_matches(['"', '`', '[', ']'])
                    .eq_ignore_ascii_case(column)
            })
            .map(|i| row.values[i].clone())
    })
}

pub(crate) async fn insert_record<E, R>(
    executor: &mut E,
    cache: &StructInfoCache,
    table: &Table,
    record: &mut R,
) -> Result<()>
where
    E: Executor,
    R: Record,
{
    let info = cache.resolve::<R>()?;
    let InsertStatement {
        query,
        method,
        returned_ids,
    } = write_insert(executor.dialect(), &info, table, record)?;
    log::debug!("{}", query);
    match method {
        InsertMethod::Returning | InsertMethod::Output => {
            let rows: Vec<RowLabeled> = executor.fetch(query).try_collect().await?;
            let Some(row) = rows.into_iter().next() else {
                return Err(Error::msg(format!(
                    "The insert into `{}` did not return the generated IDs",
                    table.name()
                )));
            };
            for (column, index) in returned_ids {
                let Some(value) = returned_column(&row, &column) else {
                    return Err(Error::msg(format!(
                        "The insert into `{}` did not return the column `{}`",
                        table.name(),
                        column
                    )));
                };
                record.decode_field(index, value).with_context(|| {
                    format!(
                        "Could not decode the generated ID `{}` into `{}`",
                        column,
                        info.type_name()
                    )
                })?;
            }
        }
        InsertMethod::LastInsertId => {
            let result = executor.execute(query).await?;
            if let Some((column, index)) = returned_ids.first() {
                let Some(id) = result.last_affected_id else {
                    return Err(Error::msg(format!(
                        "The driver did not report the ID generated for `{}`",
                        column
                    )));
                };
                record
                    .decode_field(*index, Value::Int64(Some(id)))
                    .with_context(|| {
                        format!(
                            "Could not decode the generated ID `{}` into `{}`",
                            column,
                            info.type_name()
                        )
                    })?;
            }
        }
        InsertMethod::NoIdRetrieval => {
            executor.execute(query).await?;
        }
    }
    Ok(())
}

pub(crate) async fn patch_record<E, R>(
    executor: &mut E,
    cache: &StructInfoCache,
    table: &Table,
    record: &R,
) -> Result<()>
where
    E: Executor,
    R: Record,
{
    let info = cache.resolve::<R>()?;
    let query = write_update(executor.dialect(), &info, table, record)?;
    log::debug!("{}", query);
    let result = executor.execute(query).await?;
    if result.rows_affected == 0 {
        return Err(KsqlError::NotFound.into());
    }
    Ok(())
}

pub(crate) async fn delete_record<E, I>(
    executor: &mut E,
    cache: &StructInfoCache,
    table: &Table,
    id: I,
) -> Result<()>
where
    E: Executor,
    I: IdOrRecord,
{
    let ids = id.id_values(cache, table)?;
    let query = write_delete(executor.dialect(), table, ids);
    log::debug!("{}", query);
    let result = executor.execute(query).await?;
    if result.rows_affected == 0 {
        return Err(KsqlError::NotFound.into());
    }
    Ok(())
}

pub(crate) async fn exec_query<E: Executor>(
    executor: &mut E,
    query: &str,
    params: Vec<Value>,
) -> Result<u64> {
    let query = Query::new(query, params);
    log::debug!("{}", query);
    Ok(executor.execute(query).await?.rows_affected)
}

/// Entry point of the library, wraps a driver connection.
#[derive(Debug)]
pub struct KsqlDb<C: Connection> {
    connection: C,
    cache: Arc<StructInfoCache>,
}

impl<C: Connection> KsqlDb<C> {
    /// Uses the process wide metadata cache.
    pub fn new(connection: C) -> Self {
        Self::with_cache(connection, StructInfoCache::global())
    }

    pub fn with_cache(connection: C, cache: Arc<StructInfoCache>) -> Self {
        Self { connection, cache }
    }

    /// Connects through the driver `C`.
    pub async fn connect(url: &str) -> Result<Self> {
        Ok(Self::new(C::connect(url).await?))
    }

    pub fn connection(&mut self) -> &mut C {
        &mut self.connection
    }

    pub fn cache(&self) -> &Arc<StructInfoCache> {
        &self.cache
    }

    pub fn into_inner(self) -> C {
        self.connection
    }
}

/// Handle scoped to a running transaction.
#[derive(Debug)]
pub struct KsqlTx<E: Executor> {
    executor: E,
    cache: Arc<StructInfoCache>,
}

impl<E: Executor> KsqlTx<E> {
    pub fn executor(&mut self) -> &mut E {
        &mut self.executor
    }
}

impl<C: Connection> Provider for KsqlDb<C> {
    type Scoped<'t>
        = KsqlTx<C::Transaction<'t>>
    where
        Self: 't;

    async fn query<R: Record + Default>(
        &mut self,
        records: &mut Vec<R>,
        query: &str,
        params: Vec<Value>,
    ) -> Result<()> {
        query_records(&mut self.connection, &self.cache, records, query, params).await
    }

    async fn query_one<R: Record + Default>(
        &mut self,
        record: &mut R,
        query: &str,
        params: Vec<Value>,
    ) -> Result<()> {
        query_record(&mut self.connection, &self.cache, record, query, params).await
    }

    async fn query_chunks<R, F>(&mut self, parser: ChunkParser<'_, F>) -> Result<()>
    where
        R: Record + Default,
        F: FnMut(&[R]) -> Result<()> + Send,
    {
        run_chunks(&mut self.connection, &self.cache, parser).await
    }

    async fn insert<R: Record>(&mut self, table: &Table, record: &mut R) -> Result<()> {
        insert_record(&mut self.connection, &self.cache, table, record).await
    }

    async fn patch<R: Record>(&mut self, table: &Table, record: &R) -> Result<()> {
        patch_record(&mut self.connection, &self.cache, table, record).await
    }

    async fn delete(&mut self, table: &Table, id: impl IdOrRecord) -> Result<()> {
        delete_record(&mut self.connection, &self.cache, table, id).await
    }

    async fn exec(&mut self, query: &str, params: Vec<Value>) -> Result<u64> {
        exec_query(&mut self.connection, query, params).await
    }

    async fn transaction<'a, T, F>(&'a mut self, f: F) -> Result<T>
    where
        Self: 'a,
        T: Send + 'a,
        F: for<'t> FnOnce(&'t mut Self::Scoped<'a>) -> BoxFuture<'t, Result<T>> + Send + 'a,
    {
        let cache = self.cache.clone();
        let transaction = self.connection.begin().await?;
        let mut scoped = KsqlTx {
            executor: transaction,
            cache,
        };
        let result = AssertUnwindSafe(f(&mut scoped)).catch_unwind().await;
        match result {
            Ok(Ok(value)) => {
                scoped.executor.commit().await?;
                Ok(value)
            }
            Ok(Err(error)) => {
                log::warn!("Rolling back the transaction: {:#}", error);
                if let Err(e) = scoped.executor.rollback().await {
                    log::error!("Could not roll back the transaction: {:#}", e);
                }
                Err(error)
            }
            Err(payload) => {
                log::warn!("Rolling back the transaction after a panic");
                if let Err(e) = scoped.executor.rollback().await {
                    log::error!("Could not roll back the transaction: {:#}", e);
                }
                panic::resume_unwind(payload)
            }
        }
    }
}

impl<E: Executor> Provider for KsqlTx<E> {
    type Scoped<'t>
        = KsqlTx<E>
    where
        Self: 't;

    async fn query<R: Record + Default>(
        &mut self,
        records: &mut Vec<R>,
        query: &str,
        params: Vec<Value>,
    ) -> Result<()> {
        query_records(&mut self.executor, &self.cache, records, query, params).await
    }

    async fn query_one<R: Record + Default>(
        &mut self,
        record: &mut R,
        query: &str,
        params: Vec<Value>,
    ) -> Result<()> {
        query_record(&mut self.executor, &self.cache, record, query, params).await
    }

    async fn query_chunks<R, F>(&mut self, parser: ChunkParser<'_, F>) -> Result<()>
    where
        R: Record + Default,
        F: FnMut(&[R]) -> Result<()> + Send,
    {
        run_chunks(&mut self.executor, &self.cache, parser).await
    }

    async fn insert<R: Record>(&mut self, table: &Table, record: &mut R) -> Result<()> {
        insert_record(&mut self.executor, &self.cache, table, record).await
    }

    async fn patch<R: Record>(&mut self, table: &Table, record: &R) -> Result<()> {
        patch_record(&mut self.executor, &self.cache, table, record).await
    }

    async fn delete(&mut self, table: &Table, id: impl IdOrRecord) -> Result<()> {
        delete_record(&mut self.executor, &self.cache, table, id).await
    }

    async fn exec(&mut self, query: &str, params: Vec<Value>) -> Result<u64> {
        exec_query(&mut self.executor, query, params).await
    }

    /// Already inside a transaction, `f` runs on this same handle.
    async fn transaction<'a, T, F>(&'a mut self, f: F) -> Result<T>
    where
        Self: 'a,
        T: Send + 'a,
        F: for<'t> FnOnce(&'t mut Self::Scoped<'a>) -> BoxFuture<'t, Result<T>> + Send + 'a,
    {
        f(self).await
    }
}
