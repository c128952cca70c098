mod chunks;
#[cfg(not(feature = "disable-json"))]
mod json;
mod mock;
mod nested;
#[cfg(not(feature = "disable-transactions"))]
mod transactions;
mod users;

pub use mock::*;

use crate::{chunks::chunks, nested::nested, users::users};
#[cfg(not(feature = "disable-json"))]
use json::json;
use ksql::{Connection, Dialect, KsqlDb, StructInfoCache};
use log::LevelFilter;
use std::{env, sync::Arc};
#[cfg(not(feature = "disable-transactions"))]
use transactions::transactions;

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

/// Placeholder for the parameter at `position` (1 based) in the syntax of `dialect`.
pub fn placeholder(dialect: &dyn Dialect, position: usize) -> String {
    let mut out = String::new();
    dialect.write_placeholder(&mut out, position);
    out
}

/// Runs the whole suite against a live database. Every test owns its tables,
/// dropping and creating them first.
pub async fn execute_tests<C: Connection>(connection: C) {
    let mut db = KsqlDb::with_cache(connection, Arc::new(StructInfoCache::new()));
    users(&mut db).await;
    chunks(&mut db).await;
    nested(&mut db).await;
    #[cfg(not(feature = "disable-json"))]
    json(&mut db).await;
    #[cfg(not(feature = "disable-transactions"))]
    transactions(&mut db).await;
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
