use rust_decimal::Decimal;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use uuid::Uuid;

/// Dynamically typed cell exchanged with the drivers, both as query parameter
/// and as column of a result row.
///
/// Every typed variant wraps an `Option`: `None` represents SQL `NULL` while
/// still remembering the type, which is what drivers need to bind a typed null.
#[derive(Default, Debug, Clone)]
pub enum Value {
    #[default]
    Null,
    Boolean(Option<bool>),
    Int8(Option<i8>),
    Int16(Option<i16>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    UInt8(Option<u8>),
    UInt16(Option<u16>),
    UInt32(Option<u32>),
    UInt64(Option<u64>),
    Float32(Option<f32>),
    Float64(Option<f64>),
    Decimal(Option<Decimal>),
    Varchar(Option<String>),
    Blob(Option<Box<[u8]>>),
    Date(Option<Date>),
    Time(Option<Time>),
    Timestamp(Option<PrimitiveDateTime>),
    TimestampWithTimezone(Option<OffsetDateTime>),
    Uuid(Option<Uuid>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(l), Self::Boolean(r)) => l == r,
            (Self::Int8(l), Self::Int8(r)) => l == r,
            (Self::Int16(l), Self::Int16(r)) => l == r,
            (Self::Int32(l), Self::Int32(r)) => l == r,
            (Self::Int64(l), Self::Int64(r)) => l == r,
            (Self::UInt8(l), Self::UInt8(r)) => l == r,
            (Self::UInt16(l), Self::UInt16(r)) => l == r,
            (Self::UInt32(l), Self::UInt32(r)) => l == r,
            (Self::UInt64(l), Self::UInt64(r)) => l == r,
            (Self::Float32(l), Self::Float32(r)) => l == r,
            (Self::Float64(l), Self::Float64(r)) => l == r,
            (Self::Decimal(l), Self::Decimal(r)) => l == r,
            (Self::Varchar(l), Self::Varchar(r)) => l == r,
            (Self::Blob(l), Self::Blob(r)) => l == r,
            (Self::Date(l), Self::Date(r)) => l == r,
            (Self::Time(l), Self::Time(r)) => l == r,
            (Self::Timestamp(l), Self::Timestamp(r)) => l == r,
            (Self::TimestampWithTimezone(l), Self::TimestampWithTimezone(r)) => l == r,
            (Self::Uuid(l), Self::Uuid(r)) => l == r,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl Value {
    /// True for `Null` and for any typed variant holding `None`.
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Boolean(v) => v.is_none(),
            Value::Int8(v) => v.is_none(),
            Value::Int16(v) => v.is_none(),
            Value::Int32(v) => v.is_none(),
            Value::Int64(v) => v.is_none(),
            Value::UInt8(v) => v.is_none(),
            Value::UInt16(v) => v.is_none(),
            Value::UInt32(v) => v.is_none(),
            Value::UInt64(v) => v.is_none(),
            Value::Float32(v) => v.is_none(),
            Value::Float64(v) => v.is_none(),
            Value::Decimal(v) => v.is_none(),
            Value::Varchar(v) => v.is_none(),
            Value::Blob(v) => v.is_none(),
            Value::Date(v) => v.is_none(),
            Value::Time(v) => v.is_none(),
            Value::Timestamp(v) => v.is_none(),
            Value::TimestampWithTimezone(v) => v.is_none(),
            Value::Uuid(v) => v.is_none(),
        }
    }

    /// True when the value is null or the zero value of its type (`0`, `""`,
    /// `false`, nil uuid, empty blob).
    ///
    /// Used to decide whether an ID column was provided by the caller.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Boolean(Some(v)) => !v,
            Value::Int8(Some(v)) => *v == 0,
            Value::Int16(Some(v)) => *v == 0,
            Value::Int32(Some(v)) => *v == 0,
            Value::Int64(Some(v)) => *v == 0,
            Value::UInt8(Some(v)) => *v == 0,
            Value::UInt16(Some(v)) => *v == 0,
            Value::UInt32(Some(v)) => *v == 0,
            Value::UInt64(Some(v)) => *v == 0,
            Value::Float32(Some(v)) => *v == 0.0,
            Value::Float64(Some(v)) => *v == 0.0,
            Value::Decimal(Some(v)) => v.is_zero(),
            Value::Varchar(Some(v)) => v.is_empty(),
            Value::Blob(Some(v)) => v.is_empty(),
            Value::Uuid(Some(v)) => v.is_nil(),
            Value::Date(Some(..))
            | Value::Time(Some(..))
            | Value::Timestamp(Some(..))
            | Value::TimestampWithTimezone(Some(..)) => false,
            _ => self.is_null(),
        }
    }

    /// Name of the variant, used in conversion error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Boolean(..) => "Boolean",
            Value::Int8(..) => "Int8",
            Value::Int16(..) => "Int16",
            Value::Int32(..) => "Int32",
            Value::Int64(..) => "Int64",
            Value::UInt8(..) => "UInt8",
            Value::UInt16(..) => "UInt16",
            Value::UInt32(..) => "UInt32",
            Value::UInt64(..) => "UInt64",
            Value::Float32(..) => "Float32",
            Value::Float64(..) => "Float64",
            Value::Decimal(..) => "Decimal",
            Value::Varchar(..) => "Varchar",
            Value::Blob(..) => "Blob",
            Value::Date(..) => "Date",
            Value::Time(..) => "Time",
            Value::Timestamp(..) => "Timestamp",
            Value::TimestampWithTimezone(..) => "TimestampWithTimezone",
            Value::Uuid(..) => "Uuid",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Value;

    #[test]
    fn null_and_zero() {
        assert!(Value::Null.is_null());
        assert!(Value::Int32(None).is_null());
        assert!(!Value::Int32(Some(0)).is_null());
        assert!(Value::Int32(Some(0)).is_zero());
        assert!(!Value::Int64(Some(7)).is_zero());
        assert!(Value::Varchar(Some("".into())).is_zero());
        assert!(!Value::Varchar(Some("Bia".into())).is_zero());
        assert!(Value::Uuid(Some(uuid::Uuid::nil())).is_zero());
    }

    #[test]
    fn typed_nulls_compare_by_type() {
        assert_eq!(Value::Int32(None), Value::Int32(None));
        assert_ne!(Value::Int32(None), Value::Int64(None));
        assert_ne!(Value::Varchar(Some("a".into())), Value::Varchar(None));
    }
}
