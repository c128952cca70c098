use std::fmt::Write;

/// How a dialect gives back the ID generated by an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMethod {
    /// `INSERT ... RETURNING id`
    Returning,
    /// `INSERT ... OUTPUT INSERTED.id VALUES ...`
    Output,
    /// Plain insert, the driver reports the last inserted id.
    LastInsertId,
    /// Plain insert, ID fields are left untouched.
    NoIdRetrieval,
}

/// Database specific SQL syntax used by the statement builder.
pub trait Dialect: Send + Sync {
    /// Name of the dialect, also used as part of the SELECT clause cache key.
    fn name(&self) -> &'static str;

    fn insert_method(&self) -> InsertMethod;

    /// Positional parameter placeholder, `position` starts from 1.
    fn write_placeholder(&self, out: &mut String, position: usize) {
        let _ = position;
        out.push('?');
    }

    /// Escape occurrences of `search` char with `replace` while copying into buffer.
    fn write_escaped(&self, out: &mut String, value: &str, search: char, replace: &str) {
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == search {
                out.push_str(&value[position..i]);
                out.push_str(replace);
                position = i + c.len_utf8();
            }
        }
        out.push_str(&value[position..]);
    }

    /// Quote identifiers ("name") doubling inner quotes.
    fn write_identifier_quoted(&self, out: &mut String, value: &str) {
        out.push('"');
        self.write_escaped(out, value, '"', "\"\"");
        out.push('"');
    }

    /// Clause listing the columns returned by an `InsertMethod::Output` insert.
    fn write_output_clause(&self, out: &mut String, columns: &[&str]) {
        out.push_str(" OUTPUT ");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str("INSERTED.");
            self.write_identifier_quoted(out, column);
        }
    }

    /// Body of an insert without any explicit column.
    fn write_default_values(&self, out: &mut String) {
        out.push_str(" DEFAULT VALUES");
    }

    fn transaction_begin(&self) -> &'static str {
        "BEGIN"
    }

    fn transaction_commit(&self) -> &'static str {
        "COMMIT"
    }

    fn transaction_rollback(&self) -> &'static str {
        "ROLLBACK"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }
    fn insert_method(&self) -> InsertMethod {
        InsertMethod::Returning
    }
    fn write_placeholder(&self, out: &mut String, position: usize) {
        let _ = write!(out, "${}", position);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite3"
    }
    fn insert_method(&self) -> InsertMethod {
        InsertMethod::Returning
    }
    fn write_identifier_quoted(&self, out: &mut String, value: &str) {
        out.push('`');
        self.write_escaped(out, value, '`', "``");
        out.push('`');
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl Dialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }
    fn insert_method(&self) -> InsertMethod {
        InsertMethod::LastInsertId
    }
    fn write_identifier_quoted(&self, out: &mut String, value: &str) {
        out.push('`');
        self.write_escaped(out, value, '`', "``");
        out.push('`');
    }
    fn write_default_values(&self, out: &mut String) {
        out.push_str(" () VALUES ()");
    }
    fn transaction_begin(&self) -> &'static str {
        "START TRANSACTION"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl Dialect for SqlServerDialect {
    fn name(&self) -> &'static str {
        "sqlserver"
    }
    fn insert_method(&self) -> InsertMethod {
        InsertMethod::Output
    }
    fn write_placeholder(&self, out: &mut String, position: usize) {
        let _ = write!(out, "@p{}", position);
    }
    fn write_identifier_quoted(&self, out: &mut String, value: &str) {
        out.push('[');
        self.write_escaped(out, value, ']', "]]");
        out.push(']');
    }
    fn transaction_begin(&self) -> &'static str {
        "BEGIN TRANSACTION"
    }
    fn transaction_commit(&self) -> &'static str {
        "COMMIT TRANSACTION"
    }
    fn transaction_rollback(&self) -> &'static str {
        "ROLLBACK TRANSACTION"
    }
}

pub static POSTGRES: PostgresDialect = PostgresDialect;
pub static SQLITE: SqliteDialect = SqliteDialect;
pub static MYSQL: MysqlDialect = MysqlDialect;
pub static SQLSERVER: SqlServerDialect = SqlServerDialect;

/// Built in dialect registered under `name`.
pub fn dialect_by_name(name: &str) -> Option<&'static dyn Dialect> {
    Some(match name {
        "postgres" => &POSTGRES,
        "sqlite3" => &SQLITE,
        "mysql" => &MYSQL,
        "sqlserver" => &SQLSERVER,
        _ => return None,
    })
}
