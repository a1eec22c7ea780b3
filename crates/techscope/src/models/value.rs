use serde::{Serialize, Serializer};
use serde_json::Value;
use time::PrimitiveDateTime;

use crate::utils::time::format_canonical;

/// One cell of a query result.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlScalar {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Timestamp(PrimitiveDateTime),
}

/// Cells aligned positionally with the projected column list.
pub type ResultRow = Vec<SqlScalar>;

impl SqlScalar {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Converts a decoded JSON cell; nested arrays and objects are not
    /// scalars.
    #[must_use]
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(flag) => Some(Self::Bool(flag)),
            Value::Number(number) => number
                .as_i64()
                .map(Self::Integer)
                .or_else(|| number.as_f64().map(Self::Real)),
            Value::String(text) => Some(Self::Text(text)),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl From<rusqlite::types::Value> for SqlScalar {
    fn from(value: rusqlite::types::Value) -> Self {
        use rusqlite::types::Value as SqlValue;

        match value {
            SqlValue::Null => Self::Null,
            SqlValue::Integer(value) => Self::Integer(value),
            SqlValue::Real(value) => Self::Real(value),
            SqlValue::Text(value) => Self::Text(value),
            SqlValue::Blob(value) => Self::Text(encode_blob_hex(&value)),
        }
    }
}

impl Serialize for SqlScalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Bool(flag) => serializer.serialize_bool(*flag),
            Self::Integer(value) => serializer.serialize_i64(*value),
            Self::Real(value) if value.is_finite() => serializer.serialize_f64(*value),
            Self::Real(value) => serializer.serialize_str(non_finite_label(*value)),
            Self::Text(text) => serializer.serialize_str(text),
            Self::Timestamp(timestamp) => match format_canonical(*timestamp) {
                Some(rendered) => serializer.serialize_str(&rendered),
                None => serializer.serialize_none(),
            },
        }
    }
}

/// JSON has no spelling for these; keep them distinguishable from NULL.
fn non_finite_label(value: f64) -> &'static str {
    if value.is_nan() {
        "NaN"
    } else if value.is_sign_negative() {
        "-inf"
    } else {
        "inf"
    }
}

fn encode_blob_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push(HEX[(byte >> 4) as usize] as char);
        output.push(HEX[(byte & 0x0f) as usize] as char);
    }
    output
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::SqlScalar;

    #[test]
    fn json_cells_map_to_scalars() {
        assert_eq!(SqlScalar::from_json(json!(null)), Some(SqlScalar::Null));
        assert_eq!(SqlScalar::from_json(json!(7)), Some(SqlScalar::Integer(7)));
        assert_eq!(SqlScalar::from_json(json!(1.5)), Some(SqlScalar::Real(1.5)));
        assert_eq!(
            SqlScalar::from_json(json!("AWS")),
            Some(SqlScalar::text("AWS"))
        );
        assert_eq!(SqlScalar::from_json(json!(["nested"])), None);
    }

    #[test]
    fn blobs_render_as_lowercase_hex() {
        let scalar = SqlScalar::from(rusqlite::types::Value::Blob(vec![0x00, 0xab, 0x10]));
        assert_eq!(scalar, SqlScalar::text("00ab10"));
    }
}
