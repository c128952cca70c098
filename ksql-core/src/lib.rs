mod as_value;
mod chunks;
mod connection;
mod dialect;
mod error;
mod executor;
mod materialize;
mod provider;
mod query;
mod record;
mod struct_info;
mod table;
mod transaction;
mod util;
mod value;
mod writer;

pub use ::anyhow::Context;
pub use as_value::*;
pub use chunks::*;
pub use connection::*;
pub use dialect::*;
pub use error::*;
pub use executor::*;
pub use materialize::*;
pub use provider::*;
pub use query::*;
pub use record::*;
pub use struct_info::*;
pub use table::*;
pub use transaction::*;
pub use util::*;
pub use value::*;
pub use writer::*;
pub mod stream {
    pub use ::futures::stream::*;
}
pub use ::futures::future;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;

/// Builds the positional parameters of a query.
///
/// ```
/// use ksql_core::{Value, params};
/// let params = params![42, "Bia", None::<i32>];
/// assert_eq!(params[1], Value::Varchar(Some("Bia".into())));
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($value)),+]
    };
}
