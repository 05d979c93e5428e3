//! Literal escaping for inlined bindings.

use super::Grammar;
use crate::value::Binding;

/// Replaces a quoted string containing a NUL byte.
pub const NULL_BYTE_SENTINEL: &str = "<NullByte>";

/// Replaces a quoted string that is not valid UTF-8.
pub const INVALID_UTF8_SENTINEL: &str = "<InvalidUtf8Byte>";

/// Quotes raw bytes as a SQL string literal, doubling single quotes.
///
/// Never fails: payloads that cannot be represented yield a sentinel.
#[must_use]
pub fn quote_string(bytes: &[u8]) -> String {
    if bytes.contains(&0) {
        return String::from(NULL_BYTE_SENTINEL);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => format!("'{}'", text.replace('\'', "''")),
        Err(_) => String::from(INVALID_UTF8_SENTINEL),
    }
}

pub(super) fn escape<G: Grammar + ?Sized>(g: &G, value: &Binding) -> String {
    match value {
        Binding::Typed(typed) => g.escape(&typed.value),
        Binding::Null => String::from("null"),
        Binding::Bool(flag) => String::from(if *flag { "1" } else { "0" }),
        Binding::Int(n) => quote_string(n.to_string().as_bytes()),
        Binding::Float(f) => quote_string(f.to_string().as_bytes()),
        Binding::Text(text) => quote_string(text.as_bytes()),
        Binding::Json(serde_json::Value::String(text)) => quote_string(text.as_bytes()),
        Binding::Json(document) => quote_string(document.to_string().as_bytes()),
        Binding::Bytes(bytes) => g.escape_binary(bytes),
        Binding::Date(date) => quote_string(date.format("%Y-%m-%d").to_string().as_bytes()),
        Binding::Time(time) => quote_string(time.format("%H:%M:%S").to_string().as_bytes()),
        Binding::DateTime(datetime) => {
            quote_string(datetime.format(g.date_format()).to_string().as_bytes())
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::expression::raw;
    use crate::grammar::{GenericGrammar, SqlServerGrammar};
    use crate::value::{Param, WireType};

    #[test]
    fn test_quote_string() {
        assert_eq!(quote_string(b"it's"), "'it''s'");
        assert_eq!(quote_string(b"a\0b"), NULL_BYTE_SENTINEL);
        assert_eq!(quote_string(&[0xe2, 0x82]), INVALID_UTF8_SENTINEL);
    }

    #[test]
    fn test_escape_values() {
        let g = GenericGrammar::default();
        assert_eq!(g.escape(&Binding::Null), "null");
        assert_eq!(g.escape(&Binding::Bool(true)), "1");
        assert_eq!(g.escape(&Binding::Bool(false)), "0");
        assert_eq!(g.escape(&Binding::Int(42)), "'42'");
        assert_eq!(g.escape(&Binding::Float(1.5)), "'1.5'");
        assert_eq!(g.escape(&Binding::Bytes(b"text".to_vec())), "<Buffer[4]>");
        assert_eq!(
            g.escape(&Binding::Json(serde_json::json!({"a": "b"}))),
            "'{\"a\":\"b\"}'"
        );
        assert_eq!(g.escape(&Binding::Json(serde_json::json!("plain"))), "'plain'");
    }

    #[test]
    fn test_escape_unwraps_typed_bindings() {
        let g = GenericGrammar::default();
        assert_eq!(g.escape(&Binding::typed(None::<i64>, WireType::BigInt)), "null");
        assert_eq!(g.escape(&Binding::typed("x", WireType::Text)), "'x'");
    }

    #[test]
    fn test_escape_dates() {
        let datetime = NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_milli_opt(7, 8, 9, 120)
            .unwrap();
        assert_eq!(
            GenericGrammar::default().escape(&Binding::DateTime(datetime)),
            "'2024-05-06 07:08:09'"
        );
        assert_eq!(
            SqlServerGrammar::default().escape(&Binding::DateTime(datetime)),
            "'2024-05-06 07:08:09.120'"
        );
    }

    #[test]
    fn test_escape_param_expression() {
        let g = GenericGrammar::default();
        assert_eq!(g.escape_param(&Param::from(raw("o'clock"))), "'o''clock'");
    }

    #[test]
    fn test_sqlserver_binary_is_hex() {
        let g = SqlServerGrammar::default();
        assert_eq!(g.escape(&Binding::Bytes(b"text".to_vec())), "0x74657874");
    }
}
