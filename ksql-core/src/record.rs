use crate::{AsValue, Error, Result, StructInfo, StructInfoCache, Value};
use serde::{Serialize, de::DeserializeOwned};
use std::{any, sync::Arc};

/// A struct field as declared in the source, in declaration order.
///
/// `tag` is the content of `#[ksql("...")]`, `table_alias` the content of
/// `#[tablename("...")]`. Both are interpreted by [`StructInfoCache::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDecl {
    pub ident: &'static str,
    pub tag: Option<&'static str>,
    pub table_alias: Option<&'static str>,
}

/// A type whose fields can be mapped to the columns of a row.
///
/// Implemented by `#[derive(Record)]`, field indexes are declaration
/// positions as listed by [`Record::declared_fields`].
pub trait Record: Send + Sync + 'static {
    fn declared_fields() -> &'static [FieldDecl]
    where
        Self: Sized;

    /// Encode the field at `index` into a query parameter.
    fn encode_field(&self, index: usize) -> Result<Value>;

    /// Decode `value` into the field at `index`.
    fn decode_field(&mut self, index: usize, value: Value) -> Result<()>;

    /// The record held by a `tablename` field.
    fn nested_field(&mut self, index: usize) -> Option<&mut dyn Record> {
        let _ = index;
        None
    }

    /// Metadata of the record type held by a `tablename` field.
    fn nested_struct_info(
        cache: &StructInfoCache,
        index: usize,
    ) -> Option<Result<Arc<StructInfo>>>
    where
        Self: Sized,
    {
        let _ = (cache, index);
        None
    }
}

pub fn encode_value<T: AsValue + Clone>(value: &T) -> Result<Value> {
    Ok(value.clone().as_value())
}

/// Null resets the destination to its default, anything else is converted.
pub fn decode_value<T: AsValue + Default>(destination: &mut T, value: Value) -> Result<()> {
    *destination = if value.is_null() {
        T::default()
    } else {
        T::try_from_value(value)?
    };
    Ok(())
}

/// Serializes the field as a JSON document, `None` like values become `NULL`.
pub fn encode_json<T: Serialize>(value: &T) -> Result<Value> {
    let json = serde_json::to_value(value).map_err(|e| {
        Error::new(e).context(format!(
            "Could not serialize {} as JSON",
            any::type_name::<T>()
        ))
    })?;
    if json.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::Varchar(Some(json.to_string())))
}

/// Deserializes a JSON document stored as text or bytes. Null resets the
/// destination to its default, the same as an absent document.
pub fn decode_json<T: DeserializeOwned + Default>(
    destination: &mut T,
    value: Value,
) -> Result<()> {
    let context = || format!("Could not deserialize JSON into {}", any::type_name::<T>());
    *destination = match value {
        v if v.is_null() => T::default(),
        Value::Varchar(Some(v)) => {
            serde_json::from_str(&v).map_err(|e| Error::new(e).context(context()))?
        }
        Value::Blob(Some(v)) => {
            serde_json::from_slice(&v).map_err(|e| Error::new(e).context(context()))?
        }
        v => {
            return Err(Error::msg(format!(
                "Cannot read a JSON document from a {} value, expected text or bytes",
                v.type_name()
            )));
        }
    };
    Ok(())
}

/// Error for an index the record does not map.
pub fn unmapped_field<T: ?Sized>(index: usize) -> Error {
    Error::msg(format!(
        "Field {} of {} is not mapped to a column",
        index,
        any::type_name::<T>()
    ))
}
