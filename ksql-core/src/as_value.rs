use crate::{Error, Result, Value, truncate_long};
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use std::{any, fmt::Display, str::FromStr};
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, Time, format_description::well_known::Rfc3339,
    macros::format_description,
};
use uuid::Uuid;

/// Conversion between native Rust types and the dynamically typed [`Value`].
///
/// This is what record fields must implement to be mapped to a column: the
/// derive macro encodes fields through [`AsValue::as_value`] and decodes them
/// through [`AsValue::try_from_value`].
///
/// # Conversion contract
/// - The canonical variant is always accepted (`Value::Int32` for `i32`).
/// - Integer variants of any width convert with a range check, the error
///   names both the offending value and the target type.
/// - Text is parsed as a fallback, some drivers (SQLite) return numbers,
///   dates and uuids as text.
/// - `NULL` is only accepted by `Option<T>`, non optional fields receive
///   their default value before reaching this trait (see [`decode_value`](crate::decode_value)).
///
/// ```rust
/// use ksql_core::{AsValue, Value};
/// let v = 42i32.as_value();
/// assert!(matches!(v, Value::Int32(Some(42))));
/// let n: i64 = AsValue::try_from_value(v).unwrap();
/// assert_eq!(n, 42);
/// ```
pub trait AsValue {
    /// Typed null for this type.
    fn as_empty_value() -> Value;
    /// Convert into the owned [`Value`] representation.
    fn as_value(self) -> Value;
    /// Convert a dynamic [`Value`] into `Self`.
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
    /// Parse a textual representation of `Self`.
    fn parse(input: &str) -> Result<Self>
    where
        Self: Sized,
    {
        Err(Error::msg(format!(
            "Cannot parse `{}` as {}",
            truncate_long!(input),
            any::type_name::<Self>()
        )))
    }
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

impl From<&'static str> for Value {
    fn from(value: &'static str) -> Self {
        Value::Varchar(Some(value.into()))
    }
}

pub(crate) fn conversion_error<T>(value: &Value) -> Error {
    Error::msg(format!(
        "Cannot convert {} value {:?} to {}",
        value.type_name(),
        value,
        any::type_name::<T>(),
    ))
}

fn convert_integer<S, D>(value: S) -> Result<D>
where
    S: Display + Copy,
    D: TryFrom<S>,
{
    D::try_from(value).map_err(|_| {
        Error::msg(format!(
            "Value {} is out of range for {}",
            value,
            any::type_name::<D>()
        ))
    })
}

fn parse_from_str<T: FromStr>(input: &str) -> Result<T> {
    input.trim().parse::<T>().map_err(|_| {
        Error::msg(format!(
            "Cannot parse `{}` as {}",
            truncate_long!(input),
            any::type_name::<T>()
        ))
    })
}

macro_rules! impl_as_value_integer {
    ($source:ty, $destination:path, $to_primitive:ident) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    Value::Int8(Some(v)) => convert_integer(v),
                    Value::Int16(Some(v)) => convert_integer(v),
                    Value::Int32(Some(v)) => convert_integer(v),
                    Value::Int64(Some(v)) => convert_integer(v),
                    Value::UInt8(Some(v)) => convert_integer(v),
                    Value::UInt16(Some(v)) => convert_integer(v),
                    Value::UInt32(Some(v)) => convert_integer(v),
                    Value::UInt64(Some(v)) => convert_integer(v),
                    Value::Boolean(Some(v)) => Ok(v as _),
                    Value::Decimal(Some(v)) => {
                        let error = Error::msg(format!(
                            "Value {v}: Decimal does not fit into {}",
                            any::type_name::<Self>()
                        ));
                        if !v.is_integer() {
                            return Err(error.context("The value is not a integer"));
                        }
                        v.$to_primitive().ok_or(error)
                    }
                    Value::Varchar(Some(ref v)) => <Self as AsValue>::parse(v),
                    _ => Err(conversion_error::<Self>(&value)),
                }
            }
            fn parse(input: &str) -> Result<Self> {
                parse_from_str(input)
            }
        }
    };
}
impl_as_value_integer!(i8, Value::Int8, to_i8);
impl_as_value_integer!(i16, Value::Int16, to_i16);
impl_as_value_integer!(i32, Value::Int32, to_i32);
impl_as_value_integer!(i64, Value::Int64, to_i64);
impl_as_value_integer!(u8, Value::UInt8, to_u8);
impl_as_value_integer!(u16, Value::UInt16, to_u16);
impl_as_value_integer!(u32, Value::UInt32, to_u32);
impl_as_value_integer!(u64, Value::UInt64, to_u64);

impl AsValue for isize {
    fn as_empty_value() -> Value {
        Value::Int64(None)
    }
    fn as_value(self) -> Value {
        Value::Int64(Some(self as i64))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        convert_integer(i64::try_from_value(value)?)
    }
}

impl AsValue for usize {
    fn as_empty_value() -> Value {
        Value::UInt64(None)
    }
    fn as_value(self) -> Value {
        Value::UInt64(Some(self as u64))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        convert_integer(u64::try_from_value(value)?)
    }
}

impl AsValue for bool {
    fn as_empty_value() -> Value {
        Value::Boolean(None)
    }
    fn as_value(self) -> Value {
        Value::Boolean(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Boolean(Some(v)) => Ok(v),
            Value::Int8(Some(v)) => Ok(v != 0),
            Value::Int16(Some(v)) => Ok(v != 0),
            Value::Int32(Some(v)) => Ok(v != 0),
            Value::Int64(Some(v)) => Ok(v != 0),
            Value::UInt8(Some(v)) => Ok(v != 0),
            Value::UInt16(Some(v)) => Ok(v != 0),
            Value::UInt32(Some(v)) => Ok(v != 0),
            Value::UInt64(Some(v)) => Ok(v != 0),
            Value::Varchar(Some(ref v)) => <Self as AsValue>::parse(v),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
    fn parse(input: &str) -> Result<Self> {
        match input.trim() {
            "1" | "t" | "true" | "TRUE" => Ok(true),
            "0" | "f" | "false" | "FALSE" => Ok(false),
            _ => Err(Error::msg(format!(
                "Cannot parse `{}` as bool",
                truncate_long!(input)
            ))),
        }
    }
}

macro_rules! impl_as_value_float {
    ($source:ty, $destination:path, $to_primitive:ident) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    Value::Float32(Some(v)) => Ok(v as _),
                    Value::Float64(Some(v)) => Ok(v as _),
                    Value::Int8(Some(v)) => Ok(v as _),
                    Value::Int16(Some(v)) => Ok(v as _),
                    Value::Int32(Some(v)) => Ok(v as _),
                    Value::Int64(Some(v)) => Ok(v as _),
                    Value::UInt8(Some(v)) => Ok(v as _),
                    Value::UInt16(Some(v)) => Ok(v as _),
                    Value::UInt32(Some(v)) => Ok(v as _),
                    Value::UInt64(Some(v)) => Ok(v as _),
                    Value::Decimal(Some(v)) => v.$to_primitive().ok_or_else(|| {
                        Error::msg(format!(
                            "Value {v}: Decimal does not fit into {}",
                            any::type_name::<Self>()
                        ))
                    }),
                    Value::Varchar(Some(ref v)) => <Self as AsValue>::parse(v),
                    _ => Err(conversion_error::<Self>(&value)),
                }
            }
            fn parse(input: &str) -> Result<Self> {
                parse_from_str(input)
            }
        }
    };
}
impl_as_value_float!(f32, Value::Float32, to_f32);
impl_as_value_float!(f64, Value::Float64, to_f64);

impl AsValue for Decimal {
    fn as_empty_value() -> Value {
        Value::Decimal(None)
    }
    fn as_value(self) -> Value {
        Value::Decimal(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        let conversion = |v: Option<Decimal>| v.ok_or_else(|| conversion_error::<Self>(&value));
        match value {
            Value::Decimal(Some(v)) => Ok(v),
            Value::Int8(Some(v)) => Ok(v.into()),
            Value::Int16(Some(v)) => Ok(v.into()),
            Value::Int32(Some(v)) => Ok(v.into()),
            Value::Int64(Some(v)) => Ok(v.into()),
            Value::UInt8(Some(v)) => Ok(v.into()),
            Value::UInt16(Some(v)) => Ok(v.into()),
            Value::UInt32(Some(v)) => Ok(v.into()),
            Value::UInt64(Some(v)) => Ok(v.into()),
            Value::Float32(Some(v)) => conversion(Decimal::from_f32(v)),
            Value::Float64(Some(v)) => conversion(Decimal::from_f64(v)),
            Value::Varchar(Some(ref v)) => <Self as AsValue>::parse(v),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
    fn parse(input: &str) -> Result<Self> {
        parse_from_str(input)
    }
}

impl AsValue for String {
    fn as_empty_value() -> Value {
        Value::Varchar(None)
    }
    fn as_value(self) -> Value {
        Value::Varchar(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Varchar(Some(v)) => Ok(v),
            Value::Blob(Some(v)) => String::from_utf8(v.into_vec())
                .map_err(|e| Error::new(e).context("Blob value is not a valid UTF-8 string")),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
    fn parse(input: &str) -> Result<Self> {
        Ok(input.to_owned())
    }
}

impl AsValue for Box<[u8]> {
    fn as_empty_value() -> Value {
        Value::Blob(None)
    }
    fn as_value(self) -> Value {
        Value::Blob(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(Some(v)) => Ok(v),
            Value::Varchar(Some(v)) => Ok(v.into_bytes().into_boxed_slice()),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
}

impl AsValue for Vec<u8> {
    fn as_empty_value() -> Value {
        Value::Blob(None)
    }
    fn as_value(self) -> Value {
        Value::Blob(Some(self.into_boxed_slice()))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Box::<[u8]>::try_from_value(value).map(Into::into)
    }
}

macro_rules! impl_as_value_temporal {
    ($source:ty, $destination:path, $($format:expr),+ $(,)?) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    $destination(Some(v)) => Ok(v),
                    Value::Varchar(Some(ref v)) => <Self as AsValue>::parse(v),
                    _ => Err(conversion_error::<Self>(&value)),
                }
            }
            fn parse(input: &str) -> Result<Self> {
                let input = input.trim();
                $(
                    if let Ok(v) = <$source>::parse(input, $format) {
                        return Ok(v);
                    }
                )+
                Err(Error::msg(format!(
                    "Cannot parse `{}` as {}",
                    truncate_long!(input),
                    any::type_name::<Self>()
                )))
            }
        }
    };
}
impl_as_value_temporal!(Date, Value::Date, format_description!("[year]-[month]-[day]"));
impl_as_value_temporal!(
    Time,
    Value::Time,
    format_description!("[hour]:[minute]:[second].[subsecond]"),
    format_description!("[hour]:[minute]:[second]"),
    format_description!("[hour]:[minute]"),
);
impl_as_value_temporal!(
    PrimitiveDateTime,
    Value::Timestamp,
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
);

impl AsValue for OffsetDateTime {
    fn as_empty_value() -> Value {
        Value::TimestampWithTimezone(None)
    }
    fn as_value(self) -> Value {
        Value::TimestampWithTimezone(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::TimestampWithTimezone(Some(v)) => Ok(v),
            Value::Timestamp(Some(v)) => Ok(v.assume_utc()),
            Value::Varchar(Some(ref v)) => <Self as AsValue>::parse(v),
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
    fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if let Ok(v) = OffsetDateTime::parse(input, &Rfc3339) {
            return Ok(v);
        }
        if let Ok(v) = OffsetDateTime::parse(
            input,
            format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]:[offset_minute]"
            ),
        ) {
            return Ok(v);
        }
        // Timestamps without offset are stored in UTC
        <PrimitiveDateTime as AsValue>::parse(input)
            .map(PrimitiveDateTime::assume_utc)
            .map_err(|e| e.context(format!("Cannot parse `{}` as OffsetDateTime", input)))
    }
}

impl AsValue for Uuid {
    fn as_empty_value() -> Value {
        Value::Uuid(None)
    }
    fn as_value(self) -> Value {
        Value::Uuid(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Uuid(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => <Self as AsValue>::parse(v),
            Value::Blob(Some(ref v)) => {
                Uuid::from_slice(v).map_err(|_| conversion_error::<Self>(&value))
            }
            _ => Err(conversion_error::<Self>(&value)),
        }
    }
    fn parse(input: &str) -> Result<Self> {
        parse_from_str(input)
    }
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::try_from_value(value).map(Some)
    }
    fn parse(input: &str) -> Result<Self> {
        T::parse(input).map(Some)
    }
}

impl<T: AsValue> AsValue for Box<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        (*self).as_value()
    }
    fn try_from_value(value: Value) -> Result<Self> {
        T::try_from_value(value).map(Box::new)
    }
    fn parse(input: &str) -> Result<Self> {
        T::parse(input).map(Box::new)
    }
}

#[cfg(test)]
mod tests {
    use crate::{AsValue, Value};
    use time::macros::{date, datetime, time};

    #[test]
    fn integers_convert_across_widths() {
        assert_eq!(i32::try_from_value(Value::Int64(Some(42))).unwrap(), 42);
        assert_eq!(i64::try_from_value(Value::Int8(Some(-3))).unwrap(), -3);
        assert_eq!(u16::try_from_value(Value::Int64(Some(65535))).unwrap(), 65535);
        assert!(i8::try_from_value(Value::Int64(Some(300))).is_err());
        assert!(u32::try_from_value(Value::Int32(Some(-1))).is_err());
        assert_eq!(i32::try_from_value(Value::Varchar(Some(" 17 ".into()))).unwrap(), 17);
    }

    #[test]
    fn conversion_error_names_both_types() {
        let error = i32::try_from_value(Value::Varchar(Some("abc".into())))
            .unwrap_err()
            .to_string();
        assert!(error.contains("i32"), "{error}");
        let error = i64::try_from_value(Value::Blob(Some(Box::new([1, 2]))))
            .unwrap_err()
            .to_string();
        assert!(error.contains("Blob"), "{error}");
        assert!(error.contains("i64"), "{error}");
    }

    #[test]
    fn options_accept_null() {
        assert_eq!(Option::<i32>::try_from_value(Value::Null).unwrap(), None);
        assert_eq!(Option::<i32>::try_from_value(Value::Int64(None)).unwrap(), None);
        assert_eq!(
            Option::<i32>::try_from_value(Value::Int64(Some(5))).unwrap(),
            Some(5)
        );
        assert!(i32::try_from_value(Value::Null).is_err());
        assert_eq!(None::<String>.as_value(), Value::Varchar(None));
    }

    #[test]
    fn booleans_from_integers() {
        assert!(bool::try_from_value(Value::Int64(Some(1))).unwrap());
        assert!(!bool::try_from_value(Value::Int64(Some(0))).unwrap());
        assert!(bool::try_from_value(Value::Varchar(Some("true".into()))).unwrap());
    }

    #[test]
    fn temporal_from_text() {
        assert_eq!(
            time::Date::try_from_value(Value::Varchar(Some("2024-02-29".into()))).unwrap(),
            date!(2024 - 02 - 29)
        );
        assert_eq!(
            time::Time::try_from_value(Value::Varchar(Some("08:30:00".into()))).unwrap(),
            time!(8:30)
        );
        assert_eq!(
            time::OffsetDateTime::try_from_value(Value::Varchar(Some(
                "2024-02-29T08:30:00Z".into()
            )))
            .unwrap(),
            datetime!(2024-02-29 8:30 UTC)
        );
        assert_eq!(
            time::OffsetDateTime::try_from_value(Value::Varchar(Some(
                "2024-02-29 08:30:00".into()
            )))
            .unwrap(),
            datetime!(2024-02-29 8:30 UTC)
        );
    }

    #[test]
    fn text_and_blobs() {
        assert_eq!(
            String::try_from_value(Value::Blob(Some(b"Bia".to_vec().into_boxed_slice()))).unwrap(),
            "Bia"
        );
        assert_eq!(
            Vec::<u8>::try_from_value(Value::Varchar(Some("ab".into()))).unwrap(),
            b"ab".to_vec()
        );
    }
}
