use crate::{
    AsValue, Dialect, InsertMethod, KsqlError, Query, Record, Result, StructInfo,
    StructInfoCache, Table, Value, first_token, separated_by,
};
use time::{OffsetDateTime, PrimitiveDateTime};

/// Comma separated list of the columns selected for `R`.
///
/// Nested records list every column of every member as `alias.column`.
pub fn write_select_columns<R: Record>(
    cache: &StructInfoCache,
    dialect: &dyn Dialect,
    info: &StructInfo,
    out: &mut String,
) -> Result<()> {
    if !info.is_nested() {
        separated_by(
            out,
            info.fields(),
            |out, field| dialect.write_identifier_quoted(out, &field.name),
            ", ",
        );
        return Ok(());
    }
    let mut first = true;
    for field in info.fields() {
        let nested = R::nested_struct_info(cache, field.index).ok_or_else(|| {
            KsqlError::InvalidShape {
                type_name: info.type_name(),
                reason: format!("field `{}` does not hold a record", field.name),
            }
        })??;
        for column in nested.fields() {
            if !first {
                out.push_str(", ");
            }
            first = false;
            dialect.write_identifier_quoted(out, &field.name);
            out.push('.');
            dialect.write_identifier_quoted(out, &column.name);
        }
    }
    Ok(())
}

/// Completes the query text for `R`.
///
/// A query starting with `FROM` gets the generated `SELECT` clause in front,
/// any other query is sent as written.
pub fn build_query<R: Record>(
    cache: &StructInfoCache,
    dialect: &dyn Dialect,
    query: &str,
    params: Vec<Value>,
) -> Result<Query> {
    let info = cache.resolve::<R>()?;
    if first_token(query).eq_ignore_ascii_case("FROM") {
        let select = cache.select_clause::<R>(dialect)?;
        return Ok(Query::new(
            format!("{} {}", select, query.trim_start()),
            params,
        ));
    }
    if info.is_nested() {
        return Err(KsqlError::NestedStructWithSelect {
            type_name: info.type_name(),
        }
        .into());
    }
    Ok(Query::new(query, params))
}

/// An insert statement and how to read back the generated IDs.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub query: Query,
    pub method: InsertMethod,
    /// ID columns to decode after the insert, as (column, field index).
    pub returned_ids: Vec<(String, usize)>,
}

fn write_placeholder(
    dialect: &dyn Dialect,
    out: &mut String,
    params: &mut Vec<Value>,
    value: Value,
) {
    params.push(value);
    dialect.write_placeholder(out, params.len());
}

fn write_id_condition(
    dialect: &dyn Dialect,
    out: &mut String,
    params: &mut Vec<Value>,
    table: &Table,
    ids: Vec<Value>,
) {
    out.push_str(" WHERE ");
    let mut ids = ids.into_iter();
    separated_by(
        out,
        table.id_columns(),
        |out, column| {
            dialect.write_identifier_quoted(out, column);
            out.push_str(" = ");
            write_placeholder(dialect, out, params, ids.next().unwrap_or(Value::Null));
        },
        " AND ",
    );
}

/// The current time, as the same kind of timestamp the field holds.
fn now_utc_like(current: &Value) -> Value {
    let now = OffsetDateTime::now_utc();
    match current {
        Value::Timestamp(..) => PrimitiveDateTime::new(now.date(), now.time()).as_value(),
        _ => now.as_value(),
    }
}

fn reject_nested(info: &StructInfo) -> Result<()> {
    if info.is_nested() {
        return Err(KsqlError::InvalidShape {
            type_name: info.type_name(),
            reason: "nested structs can only be used to read JOIN results".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Values of the ID columns of `table` held by `record`.
///
/// Missing or zero valued IDs are a `MissingId` error.
pub fn record_ids<R: Record>(
    info: &StructInfo,
    table: &Table,
    record: &R,
) -> Result<Vec<Value>> {
    reject_nested(info)?;
    table
        .id_columns()
        .iter()
        .map(|column| {
            let field = info.by_name(column);
            let missing = || KsqlError::MissingId {
                column: column.clone(),
            };
            if !field.valid {
                return Err(missing().into());
            }
            let value = record.encode_field(field.index)?;
            if value.is_zero() {
                return Err(missing().into());
            }
            Ok(value)
        })
        .collect()
}

/// `INSERT INTO` statement for `record`.
///
/// Zero valued IDs are left to the database, `skipInserts` fields are left
/// out and `timeNowUTC` fields take the current time.
pub fn write_insert<R: Record>(
    dialect: &dyn Dialect,
    info: &StructInfo,
    table: &Table,
    record: &R,
) -> Result<InsertStatement> {
    reject_nested(info)?;
    if info.fields().is_empty() {
        return Err(KsqlError::MissingTags {
            type_name: info.type_name(),
        }
        .into());
    }
    let mut ids = Vec::with_capacity(table.id_columns().len());
    for column in table.id_columns() {
        let field = info.by_name(column);
        if !field.valid {
            return Err(KsqlError::MissingId {
                column: column.clone(),
            }
            .into());
        }
        ids.push((field.name.clone(), field.index));
    }
    let mut columns = Vec::with_capacity(info.fields().len());
    let mut values = Vec::with_capacity(info.fields().len());
    let mut omitted_ids = 0;
    for field in info.fields() {
        if field.modifiers.skip_inserts {
            continue;
        }
        let mut value = record.encode_field(field.index)?;
        let is_id = ids.iter().any(|(_, index)| *index == field.index);
        if is_id && value.is_zero() {
            omitted_ids += 1;
            continue;
        }
        if field.modifiers.time_now_utc {
            value = now_utc_like(&value);
        }
        columns.push(field.name.as_str());
        values.push(value);
    }
    let mut method = dialect.insert_method();
    if method == InsertMethod::LastInsertId && (table.is_composite() || omitted_ids == 0) {
        method = InsertMethod::NoIdRetrieval;
    }
    let id_names: Vec<&str> = ids.iter().map(|(name, _)| name.as_str()).collect();
    let mut out = String::with_capacity(64 + columns.len() * 24);
    let mut params = Vec::with_capacity(values.len());
    out.push_str("INSERT INTO ");
    out.push_str(table.name());
    if columns.is_empty() {
        if method == InsertMethod::Output {
            dialect.write_output_clause(&mut out, &id_names);
        }
        dialect.write_default_values(&mut out);
    } else {
        out.push_str(" (");
        separated_by(
            &mut out,
            &columns,
            |out, column| dialect.write_identifier_quoted(out, column),
            ", ",
        );
        out.push(')');
        if method == InsertMethod::Output {
            dialect.write_output_clause(&mut out, &id_names);
        }
        out.push_str(" VALUES (");
        separated_by(
            &mut out,
            values,
            |out, value| write_placeholder(dialect, out, &mut params, value),
            ", ",
        );
        out.push(')');
    }
    if method == InsertMethod::Returning {
        out.push_str(" RETURNING ");
        separated_by(
            &mut out,
            &id_names,
            |out, column| dialect.write_identifier_quoted(out, column),
            ", ",
        );
    }
    Ok(InsertStatement {
        query: Query::new(out, params),
        method,
        returned_ids: match method {
            InsertMethod::NoIdRetrieval => Vec::new(),
            _ => ids,
        },
    })
}

/// `UPDATE` statement writing the non null fields of `record`.
pub fn write_update<R: Record>(
    dialect: &dyn Dialect,
    info: &StructInfo,
    table: &Table,
    record: &R,
) -> Result<Query> {
    let ids = record_ids(info, table, record)?;
    let id_indexes: Vec<usize> = table
        .id_columns()
        .iter()
        .map(|column| info.by_name(column).index)
        .collect();
    let mut assignments = Vec::with_capacity(info.fields().len());
    for field in info.fields() {
        if field.modifiers.skip_updates || id_indexes.contains(&field.index) {
            continue;
        }
        let value = record.encode_field(field.index)?;
        if field.modifiers.time_now_utc {
            assignments.push((field.name.as_str(), now_utc_like(&value)));
        } else if !value.is_null() {
            assignments.push((field.name.as_str(), value));
        }
    }
    if assignments.is_empty() {
        return Err(KsqlError::NoValuesToUpdate.into());
    }
    let mut out = String::with_capacity(64 + assignments.len() * 24);
    let mut params = Vec::with_capacity(assignments.len() + ids.len());
    out.push_str("UPDATE ");
    out.push_str(table.name());
    out.push_str(" SET ");
    separated_by(
        &mut out,
        assignments,
        |out, (column, value)| {
            dialect.write_identifier_quoted(out, column);
            out.push_str(" = ");
            write_placeholder(dialect, out, &mut params, value);
        },
        ", ",
    );
    write_id_condition(dialect, &mut out, &mut params, table, ids);
    Ok(Query::new(out, params))
}

/// `DELETE FROM` statement matching one row by its IDs, in `table` order.
pub fn write_delete(dialect: &dyn Dialect, table: &Table, ids: Vec<Value>) -> Query {
    let mut out = String::with_capacity(64);
    let mut params = Vec::with_capacity(ids.len());
    out.push_str("DELETE FROM ");
    out.push_str(table.name());
    write_id_condition(dialect, &mut out, &mut params, table, ids);
    Query::new(out, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldDecl, MYSQL, POSTGRES, SQLITE, SQLSERVER, decode_value, encode_value, unmapped_field};

    #[derive(Default, Debug)]
    struct User {
        id: i64,
        name: String,
        age: Option<i32>,
    }

    impl Record for User {
        fn declared_fields() -> &'static [FieldDecl] {
            static FIELDS: [FieldDecl; 3] = [
                FieldDecl { ident: "id", tag: Some("id"), table_alias: None },
                FieldDecl { ident: "name", tag: Some("name"), table_alias: None },
                FieldDecl { ident: "age", tag: Some("age"), table_alias: None },
            ];
            &FIELDS
        }
        fn encode_field(&self, index: usize) -> Result<Value> {
            match index {
                0 => encode_value(&self.id),
                1 => encode_value(&self.name),
                2 => encode_value(&self.age),
                _ => Err(unmapped_field::<Self>(index)),
            }
        }
        fn decode_field(&mut self, index: usize, value: Value) -> Result<()> {
            match index {
                0 => decode_value(&mut self.id, value),
                1 => decode_value(&mut self.name, value),
                2 => decode_value(&mut self.age, value),
                _ => Err(unmapped_field::<Self>(index)),
            }
        }
    }

    #[test]
    fn select_prefix() {
        let cache = StructInfoCache::new();
        let query = build_query::<User>(&cache, &POSTGRES, "  FROM users WHERE id = $1", vec![1i32.into()]).unwrap();
        assert_eq!(query.sql, r#"SELECT "id", "name", "age" FROM users WHERE id = $1"#);
        let query = build_query::<User>(&cache, &SQLITE, "from users", vec![]).unwrap();
        assert_eq!(query.sql, "SELECT `id`, `name`, `age` from users");
        let query = build_query::<User>(&cache, &SQLITE, "SELECT name FROM users", vec![]).unwrap();
        assert_eq!(query.sql, "SELECT name FROM users");
    }

    #[test]
    fn insert_returning() {
        let cache = StructInfoCache::new();
        let info = cache.resolve::<User>().unwrap();
        let user = User { id: 0, name: "Fernanda".into(), age: None };
        let insert = write_insert(&POSTGRES, &info, &Table::new("users"), &user).unwrap();
        assert_eq!(
            insert.query.sql,
            r#"INSERT INTO users ("name", "age") VALUES ($1, $2) RETURNING "id""#
        );
        assert_eq!(insert.query.params, [Value::Varchar(Some("Fernanda".into())), Value::Int32(None)]);
        assert_eq!(insert.returned_ids, [("id".to_string(), 0)]);
    }

    #[test]
    fn insert_output_and_last_insert_id() {
        let cache = StructInfoCache::new();
        let info = cache.resolve::<User>().unwrap();
        let user = User { id: 0, name: "Bia".into(), age: Some(30) };
        let insert = write_insert(&SQLSERVER, &info, &Table::new("users"), &user).unwrap();
        assert_eq!(
            insert.query.sql,
            "INSERT INTO users ([name], [age]) OUTPUT INSERTED.[id] VALUES (@p1, @p2)"
        );
        let insert = write_insert(&MYSQL, &info, &Table::new("users"), &user).unwrap();
        assert_eq!(insert.query.sql, "INSERT INTO users (`name`, `age`) VALUES (?, ?)");
        assert_eq!(insert.method, InsertMethod::LastInsertId);
        let user = User { id: 7, ..user };
        let insert = write_insert(&MYSQL, &info, &Table::new("users"), &user).unwrap();
        assert_eq!(insert.method, InsertMethod::NoIdRetrieval);
        assert!(insert.returned_ids.is_empty());
    }

    #[test]
    fn insert_requires_declared_ids() {
        let cache = StructInfoCache::new();
        let info = cache.resolve::<User>().unwrap();
        let error = write_insert(&SQLITE, &info, &Table::new("users").with_ids(["uid"]), &User::default())
            .unwrap_err();
        assert_eq!(
            KsqlError::of(&error),
            Some(&KsqlError::MissingId { column: "uid".into() })
        );
    }

    #[test]
    fn update_skips_nulls() {
        let cache = StructInfoCache::new();
        let info = cache.resolve::<User>().unwrap();
        let user = User { id: 1, name: "".into(), age: None };
        let update = write_update(&SQLITE, &info, &Table::new("users"), &user).unwrap();
        assert_eq!(update.sql, "UPDATE users SET `name` = ? WHERE `id` = ?");
        assert_eq!(update.params, [Value::Varchar(Some("".into())), Value::Int64(Some(1))]);
        let error = write_update(&SQLITE, &info, &Table::new("users"), &User::default()).unwrap_err();
        assert!(matches!(KsqlError::of(&error), Some(KsqlError::MissingId { .. })));
    }

    #[test]
    fn update_matches_ids_ignoring_case() {
        let cache = StructInfoCache::new();
        let info = cache.resolve::<User>().unwrap();
        let user = User { id: 3, name: "Bia".into(), age: None };
        let update = write_update(&POSTGRES, &info, &Table::new("users").with_ids(["ID"]), &user).unwrap();
        assert_eq!(update.sql, r#"UPDATE users SET "name" = $1 WHERE "ID" = $2"#);
        assert_eq!(update.params, [Value::Varchar(Some("Bia".into())), Value::Int64(Some(3))]);
    }

    #[test]
    fn delete_composite_key() {
        let table = Table::new("user_permissions").with_ids(["user_id", "perm_id"]);
        let delete = write_delete(&POSTGRES, &table, vec![1i64.into(), 2i64.into()]);
        assert_eq!(
            delete.sql,
            r#"DELETE FROM user_permissions WHERE "user_id" = $1 AND "perm_id" = $2"#
        );
        assert_eq!(delete.params.len(), 2);
    }
}
