use crate::CBox;
use ksql_core::{AsValue, Error, Result, RowLabeled, RowNames, Value};
use libsqlite3_sys::*;
use std::{
    ffi::{CStr, c_int},
    slice,
};

pub(crate) fn extract_value(statement: *mut sqlite3_stmt, index: c_int) -> Result<Value> {
    unsafe {
        let column_type = sqlite3_column_type(statement, index);
        Ok(match column_type {
            SQLITE_NULL => Value::Null,
            SQLITE_INTEGER => sqlite3_column_int64(statement, index).as_value(),
            SQLITE_FLOAT => sqlite3_column_double(statement, index).as_value(),
            SQLITE_BLOB => {
                let ptr = sqlite3_column_blob(statement, index) as *const u8;
                let len = sqlite3_column_bytes(statement, index) as usize;
                if ptr.is_null() || len == 0 {
                    Value::Blob(Some(Box::default()))
                } else {
                    Value::Blob(Some(slice::from_raw_parts(ptr, len).into()))
                }
            }
            SQLITE_TEXT => {
                let ptr = sqlite3_column_text(statement, index);
                let len = sqlite3_column_bytes(statement, index) as usize;
                if ptr.is_null() || len == 0 {
                    String::new().as_value()
                } else {
                    String::from_utf8_lossy(slice::from_raw_parts(ptr, len))
                        .into_owned()
                        .as_value()
                }
            }
            _ => {
                return Err(Error::msg(format!(
                    "Unexpected column type {}",
                    column_type
                )));
            }
        })
    }
}

pub(crate) fn extract_name(statement: *mut sqlite3_stmt, index: c_int) -> Result<String> {
    unsafe {
        let name = sqlite3_column_name(statement, index);
        if name.is_null() {
            return Err(Error::msg(format!("Column {} has no name", index)));
        }
        Ok(CStr::from_ptr(name).to_str()?.into())
    }
}

pub(crate) fn extract_names(statement: &CBox<*mut sqlite3_stmt>) -> Result<RowNames> {
    let count = unsafe { sqlite3_column_count(**statement) };
    (0..count).map(|i| extract_name(**statement, i)).collect()
}

pub(crate) fn extract_row(
    statement: &CBox<*mut sqlite3_stmt>,
    labels: &RowNames,
) -> Result<RowLabeled> {
    let values = (0..labels.len() as c_int)
        .map(|i| extract_value(**statement, i))
        .collect::<Result<_>>()?;
    Ok(RowLabeled::new(labels.clone(), values))
}
