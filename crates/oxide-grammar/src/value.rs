//! Binding values and clause parameters.
//!
//! A [`Binding`] is a value destined for a `?` placeholder. A [`Param`] is
//! what clauses store: either a binding or a raw [`Expression`] that is
//! emitted inline and never bound.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::expression::Expression;

/// Explicit wire type carried by a [`TypedBinding`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Float,
    Double,
    Decimal,
    Text,
    Binary,
    Date,
    Time,
    Timestamp,
    Json,
    Uuid,
}

/// A value paired with the wire type the connection should bind it as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedBinding {
    /// The plain value.
    pub value: Box<Binding>,
    /// The wire type tag.
    pub wire_type: WireType,
}

/// A parameter value bound to a placeholder.
///
/// Deserialization is untagged: `null`, booleans, integers, floats and
/// strings map to their obvious variants, `{"value": .., "wire_type": ..}`
/// to [`Binding::Typed`], and any other JSON to [`Binding::Json`]. Dates and
/// byte buffers serialize as strings and arrays and read back as text and
/// JSON respectively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Binding {
    /// NULL value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// 64-bit integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// Text value.
    Text(String),
    /// Value with an explicit wire type.
    Typed(TypedBinding),
    /// JSON document.
    Json(serde_json::Value),
    /// Binary payload.
    Bytes(Vec<u8>),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day.
    Time(NaiveTime),
    /// Date and time without a zone.
    DateTime(NaiveDateTime),
}

impl Binding {
    /// Wraps a value with an explicit wire type.
    #[must_use]
    pub fn typed(value: impl ToBinding, wire_type: WireType) -> Self {
        Self::Typed(TypedBinding {
            value: Box::new(value.to_binding()),
            wire_type,
        })
    }

    /// Returns the value with every typed wrapper removed.
    #[must_use]
    pub fn unwrap_typed(&self) -> &Self {
        match self {
            Self::Typed(typed) => typed.value.unwrap_typed(),
            other => other,
        }
    }

    /// Returns true for the NULL value (after unwrapping typed wrappers).
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self.unwrap_typed(), Self::Null)
    }

    /// Converts the value into a JSON document.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(n) => Value::from(*n),
            Self::Float(f) => serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number),
            Self::Text(s) => Value::String(s.clone()),
            Self::Typed(typed) => typed.value.to_json(),
            Self::Json(value) => value.clone(),
            Self::Bytes(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
            Self::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Self::Time(t) => Value::String(t.format("%H:%M:%S").to_string()),
            Self::DateTime(dt) => Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

impl From<serde_json::Value> for Binding {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Self::Text(s),
            other => Self::Json(other),
        }
    }
}

/// Trait for types that can be converted to bindings.
pub trait ToBinding {
    /// Converts the value to a [`Binding`].
    fn to_binding(self) -> Binding;
}

impl ToBinding for Binding {
    fn to_binding(self) -> Binding {
        self
    }
}

impl ToBinding for bool {
    fn to_binding(self) -> Binding {
        Binding::Bool(self)
    }
}

impl ToBinding for i64 {
    fn to_binding(self) -> Binding {
        Binding::Int(self)
    }
}

impl ToBinding for i32 {
    fn to_binding(self) -> Binding {
        Binding::Int(i64::from(self))
    }
}

impl ToBinding for i16 {
    fn to_binding(self) -> Binding {
        Binding::Int(i64::from(self))
    }
}

impl ToBinding for i8 {
    fn to_binding(self) -> Binding {
        Binding::Int(i64::from(self))
    }
}

impl ToBinding for u32 {
    fn to_binding(self) -> Binding {
        Binding::Int(i64::from(self))
    }
}

impl ToBinding for u16 {
    fn to_binding(self) -> Binding {
        Binding::Int(i64::from(self))
    }
}

impl ToBinding for u8 {
    fn to_binding(self) -> Binding {
        Binding::Int(i64::from(self))
    }
}

impl ToBinding for f64 {
    fn to_binding(self) -> Binding {
        Binding::Float(self)
    }
}

impl ToBinding for f32 {
    fn to_binding(self) -> Binding {
        Binding::Float(f64::from(self))
    }
}

impl ToBinding for String {
    fn to_binding(self) -> Binding {
        Binding::Text(self)
    }
}

impl ToBinding for &str {
    fn to_binding(self) -> Binding {
        Binding::Text(String::from(self))
    }
}

impl ToBinding for Vec<u8> {
    fn to_binding(self) -> Binding {
        Binding::Bytes(self)
    }
}

impl ToBinding for &[u8] {
    fn to_binding(self) -> Binding {
        Binding::Bytes(self.to_vec())
    }
}

impl ToBinding for NaiveDate {
    fn to_binding(self) -> Binding {
        Binding::Date(self)
    }
}

impl ToBinding for NaiveTime {
    fn to_binding(self) -> Binding {
        Binding::Time(self)
    }
}

impl ToBinding for NaiveDateTime {
    fn to_binding(self) -> Binding {
        Binding::DateTime(self)
    }
}

impl<Tz: TimeZone> ToBinding for DateTime<Tz> {
    fn to_binding(self) -> Binding {
        Binding::DateTime(self.naive_utc())
    }
}

impl ToBinding for serde_json::Value {
    fn to_binding(self) -> Binding {
        Binding::Json(self)
    }
}

impl<T: ToBinding> ToBinding for Option<T> {
    fn to_binding(self) -> Binding {
        match self {
            Some(v) => v.to_binding(),
            None => Binding::Null,
        }
    }
}

/// A clause operand: a bound value or a raw expression emitted inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ParamRepr", into = "ParamRepr")]
pub enum Param {
    /// Bound through a `?` placeholder.
    Value(Binding),
    /// Emitted verbatim.
    Raw(Expression),
}

impl Param {
    /// Returns the binding, or `None` for raw expressions.
    #[must_use]
    pub const fn binding(&self) -> Option<&Binding> {
        match self {
            Self::Value(binding) => Some(binding),
            Self::Raw(_) => None,
        }
    }

    /// Returns true when the operand is a raw expression.
    #[must_use]
    pub const fn is_expression(&self) -> bool {
        matches!(self, Self::Raw(_))
    }
}

/// JSON shape of a [`Param`]: `{"raw": "..."}` for expressions, any binding otherwise.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ParamRepr {
    Raw { raw: Expression },
    Value(Binding),
}

impl From<ParamRepr> for Param {
    fn from(repr: ParamRepr) -> Self {
        match repr {
            ParamRepr::Raw { raw } => Self::Raw(raw),
            ParamRepr::Value(binding) => Self::Value(binding),
        }
    }
}

impl From<Param> for ParamRepr {
    fn from(param: Param) -> Self {
        match param {
            Param::Raw(raw) => Self::Raw { raw },
            Param::Value(binding) => Self::Value(binding),
        }
    }
}

impl From<Expression> for Param {
    fn from(expr: Expression) -> Self {
        Self::Raw(expr)
    }
}

impl<T: ToBinding> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        Self::Value(value.to_binding())
    }
}

macro_rules! param_from_binding {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Param {
                fn from(value: $ty) -> Self {
                    Self::Value(value.to_binding())
                }
            }
        )*
    };
}

param_from_binding!(
    Binding,
    bool,
    i64,
    i32,
    i16,
    i8,
    u32,
    u16,
    u8,
    f64,
    f32,
    String,
    &str,
    Vec<u8>,
    &[u8],
    NaiveDate,
    NaiveTime,
    NaiveDateTime,
    serde_json::Value,
);
