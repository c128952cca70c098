use crate::{
    Executor, KsqlError, Record, Result, StructInfoCache, Value, build_query, fill_one,
    is_abort_iteration, stream::TryStreamExt, truncate_long,
};
use std::pin::pin;

/// A query read in batches of at most `chunk_size` records.
///
/// `for_each_chunk` receives every batch in order. Returning
/// [`KsqlError::AbortIteration`] stops reading without error, any other
/// error stops reading and is returned to the caller.
pub struct ChunkParser<'a, F> {
    pub query: &'a str,
    pub params: Vec<Value>,
    pub chunk_size: usize,
    pub for_each_chunk: F,
}

/// False when the callback asked to stop.
fn flush<R, F>(for_each_chunk: &mut F, chunk: &[R]) -> Result<bool>
where
    F: FnMut(&[R]) -> Result<()>,
{
    match for_each_chunk(chunk) {
        Ok(()) => Ok(true),
        Err(e) if is_abort_iteration(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Drives the rows of the query through a single buffer reused across chunks.
pub async fn run_chunks<E, R, F>(
    executor: &mut E,
    cache: &StructInfoCache,
    parser: ChunkParser<'_, F>,
) -> Result<()>
where
    E: Executor,
    R: Record + Default,
    F: FnMut(&[R]) -> Result<()>,
{
    let ChunkParser {
        query,
        params,
        chunk_size,
        mut for_each_chunk,
    } = parser;
    if chunk_size == 0 {
        return Err(KsqlError::InvalidChunkSize.into());
    }
    let info = cache.resolve::<R>()?;
    let query = build_query::<R>(cache, executor.dialect(), query, params)?;
    log::debug!("Reading chunks of {}: {}", chunk_size, truncate_long!(query.sql));
    let mut stream = pin!(executor.fetch(query));
    let mut buffer: Vec<R> = Vec::with_capacity(chunk_size);
    let mut len = 0;
    while let Some(row) = stream.try_next().await? {
        if len < buffer.len() {
            let slot = &mut buffer[len];
            *slot = R::default();
            fill_one(cache, &info, row, slot)?;
        } else {
            let mut record = R::default();
            fill_one(cache, &info, row, &mut record)?;
            buffer.push(record);
        }
        len += 1;
        if len == chunk_size {
            len = 0;
            if !flush(&mut for_each_chunk, &buffer)? {
                return Ok(());
            }
        }
    }
    if len > 0 {
        flush(&mut for_each_chunk, &buffer[..len])?;
    }
    Ok(())
}
