use crate::{CBox, error_message_from_ptr};
use ksql_core::{Error, Result, Value, truncate_long};
use libsqlite3_sys::*;
use rust_decimal::prelude::ToPrimitive;
use std::{
    ffi::{CStr, c_int},
    os::raw::{c_char, c_void},
};
use time::{format_description::well_known::Rfc3339, macros::format_description};

unsafe fn bind_text(statement: *mut sqlite3_stmt, index: c_int, v: &str) -> c_int {
    unsafe {
        sqlite3_bind_text(
            statement,
            index,
            v.as_ptr() as *const c_char,
            v.len() as c_int,
            SQLITE_TRANSIENT(),
        )
    }
}

fn out_of_bounds(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot bind {:?} into a sqlite integer because it is out of bounds",
        value
    ))
}

fn bind_value(statement: *mut sqlite3_stmt, index: c_int, value: &Value) -> Result<c_int> {
    let temporal = |v: std::result::Result<String, time::error::Format>| {
        v.map_err(|e| Error::new(e).context(format!("Cannot format {:?} as text", value)))
    };
    unsafe {
        Ok(match value {
            v if v.is_null() => sqlite3_bind_null(statement, index),
            Value::Boolean(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::Int8(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::Int16(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::Int32(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::Int64(Some(v)) => sqlite3_bind_int64(statement, index, *v),
            Value::UInt8(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::UInt16(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::UInt32(Some(v)) => sqlite3_bind_int64(statement, index, *v as sqlite3_int64),
            Value::UInt64(Some(v)) => {
                let v = sqlite3_int64::try_from(*v).map_err(|_| out_of_bounds(value))?;
                sqlite3_bind_int64(statement, index, v)
            }
            Value::Float32(Some(v)) => sqlite3_bind_double(statement, index, *v as f64),
            Value::Float64(Some(v)) => sqlite3_bind_double(statement, index, *v),
            Value::Decimal(Some(v)) => sqlite3_bind_double(
                statement,
                index,
                v.to_f64().ok_or_else(|| {
                    Error::msg(format!("Cannot convert the Decimal value `{}` to f64", v))
                })?,
            ),
            Value::Varchar(Some(v)) => bind_text(statement, index, v),
            Value::Blob(Some(v)) => sqlite3_bind_blob(
                statement,
                index,
                v.as_ptr() as *const c_void,
                v.len() as c_int,
                SQLITE_TRANSIENT(),
            ),
            Value::Date(Some(v)) => {
                let v = temporal(v.format(format_description!("[year]-[month]-[day]")))?;
                bind_text(statement, index, &v)
            }
            Value::Time(Some(v)) => {
                let v = temporal(v.format(format_description!(
                    "[hour]:[minute]:[second].[subsecond]"
                )))?;
                bind_text(statement, index, &v)
            }
            Value::Timestamp(Some(v)) => {
                let v = temporal(v.format(format_description!(
                    "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"
                )))?;
                bind_text(statement, index, &v)
            }
            Value::TimestampWithTimezone(Some(v)) => {
                let v = temporal(v.format(&Rfc3339))?;
                bind_text(statement, index, &v)
            }
            Value::Uuid(Some(v)) => bind_text(statement, index, &v.to_string()),
            _ => {
                let error = Error::msg(format!("Cannot use a {:?} as a query parameter", value));
                log::error!("{:#}", error);
                return Err(error);
            }
        })
    }
}

/// Binds the parameters in order, starting from position 1.
pub(crate) fn bind_params(statement: &CBox<*mut sqlite3_stmt>, params: &[Value]) -> Result<()> {
    unsafe {
        let expected = sqlite3_bind_parameter_count(**statement);
        if expected as usize != params.len() {
            let error = Error::msg(format!(
                "The query expects {} parameters but {} were provided",
                expected,
                params.len()
            ));
            log::error!("{:#}", error);
            return Err(error);
        }
        for (i, value) in params.iter().enumerate() {
            let index = i as c_int + 1;
            let rc = bind_value(**statement, index, value)?;
            if rc != SQLITE_OK {
                let db = sqlite3_db_handle(**statement);
                let query = sqlite3_sql(**statement);
                let error = Error::msg(error_message_from_ptr(&sqlite3_errmsg(db)).to_string())
                    .context(format!(
                        "Cannot bind parameter {} to query:\n{}",
                        index,
                        truncate_long!(CStr::from_ptr(query).to_string_lossy())
                    ));
                log::error!("{:#}", error);
                return Err(error);
            }
        }
    }
    Ok(())
}
