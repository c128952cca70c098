//! Keep-it-simple SQL: struct to row mapping over any driver implementing
//! [`Connection`].
//!
//! ```ignore
//! #[derive(Record, Default)]
//! struct User {
//!     #[ksql("id")]
//!     id: i64,
//!     #[ksql("name")]
//!     name: String,
//! }
//!
//! let mut users = Vec::<User>::new();
//! db.query(&mut users, "FROM users WHERE name = ?", params!["Bia"]).await?;
//! ```
pub use ksql_core::*;
pub use ksql_macros::Record;
