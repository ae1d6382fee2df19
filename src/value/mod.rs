//! Primitive type system and best-effort value coercion.
//!
//! Spreadsheet cells are messy: numbers arrive as strings, booleans as
//! anything non-empty, integers as floats. The contract of [`convert`] is
//! therefore "never fail on bad user data": a cell that cannot be coerced
//! degrades to the target type's default value. The only fallible entry
//! point is [`convert_token`], which rejects type tokens outside the
//! primitive set.

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::TypeError;

/// An ordered field-name → value mapping: one parsed row, one object
/// container, or one resolved foreign reference.
pub type Record = IndexMap<String, Value>;

// =============================================================================
// Primitive types
// =============================================================================

/// The primitive cell types a field can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    Int,
    Float,
    Bool,
    Str,
}

impl PrimitiveType {
    /// Resolve a type token, case-sensitively.
    ///
    /// `double` is a legacy alias for `float`. Unknown tokens return `None`;
    /// the caller treats the field as a non-primitive (array or query)
    /// expression.
    pub fn resolve(token: &str) -> Option<Self> {
        match token {
            "int" => Some(Self::Int),
            "float" | "double" => Some(Self::Float),
            "bool" => Some(Self::Bool),
            "string" => Some(Self::Str),
            _ => None,
        }
    }

    /// The canonical token for this type.
    pub fn token(&self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::Str => "string",
        }
    }

    /// The default value substituted for empty or unconvertible cells.
    pub fn default_value(&self) -> Value {
        match self {
            Self::Int => Value::Int(0),
            Self::Float => Value::Float(0.0),
            Self::Bool => Value::Bool(false),
            Self::Str => Value::Str(String::new()),
        }
    }
}

// =============================================================================
// Values
// =============================================================================

/// A materialized cell or document value.
///
/// `Map` doubles as a parsed record and as a resolved foreign reference
/// (object- or dict-shaped). Serialization is untagged, so the JSON output
/// is the plain value; key order follows insertion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Array(Vec<Value>),
    Map(Record),
}

impl Value {
    /// The primitive kind of this value, if it has one.
    pub fn kind(&self) -> Option<PrimitiveType> {
        match self {
            Value::Int(_) => Some(PrimitiveType::Int),
            Value::Float(_) => Some(PrimitiveType::Float),
            Value::Bool(_) => Some(PrimitiveType::Bool),
            Value::Str(_) => Some(PrimitiveType::Str),
            _ => None,
        }
    }

    /// True for an absent cell.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Zero test used by the sparse-matrix encoder.
    ///
    /// Null, numeric zero, `false` and the empty string all count as zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Bool(b) => !*b,
            Value::Str(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Canonical string form used as a dict key.
    pub fn key_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Str(s) => s.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }
}

// =============================================================================
// Coercion
// =============================================================================

/// Coerce a raw cell value to a primitive type. Never fails.
///
/// - An absent cell yields the type's default value.
/// - A value already of the target kind is returned unchanged.
/// - `int`: best-effort parse via float, then truncate; 0 on failure.
/// - `float`: best-effort parse; 0.0 on failure. A whole number stays
///   float-typed.
/// - `bool`: non-empty / non-zero is true.
/// - `string`: stringifies anything.
pub fn convert(raw: &Value, ty: PrimitiveType) -> Value {
    if raw.is_null() {
        return ty.default_value();
    }
    if raw.kind() == Some(ty) {
        return raw.clone();
    }
    match ty {
        PrimitiveType::Int => Value::Int(as_f64(raw).map(|f| f as i64).unwrap_or(0)),
        PrimitiveType::Float => Value::Float(as_f64(raw).unwrap_or(0.0)),
        PrimitiveType::Bool => Value::Bool(truthy(raw)),
        PrimitiveType::Str => Value::Str(stringify(raw)),
    }
}

/// Coerce a raw cell value to the type named by `token`.
///
/// Fails with [`TypeError::Unsupported`] for tokens outside the primitive
/// set. Well-formed schemas never reach that branch; the header parsers
/// validate type expressions before any cell is converted.
pub fn convert_token(raw: &Value, token: &str) -> Result<Value, TypeError> {
    match PrimitiveType::resolve(token) {
        Some(ty) => Ok(convert(raw, ty)),
        None => Err(TypeError::Unsupported(token.to_string())),
    }
}

/// Split a raw cell on `delim` and coerce every element.
///
/// An empty cell yields an empty array. Elements are trimmed before
/// conversion.
pub fn convert_array(raw: &Value, elem: PrimitiveType, delim: &str) -> Value {
    let text = match raw {
        Value::Null => String::new(),
        other => stringify(other),
    };
    if text.is_empty() {
        return Value::Array(Vec::new());
    }
    let items = text
        .split(delim)
        .map(|part| convert(&Value::Str(part.trim().to_string()), elem))
        .collect();
    Value::Array(items)
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Str(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Bool(b) => *b,
        Value::Str(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Map(m) => !m.is_empty(),
    }
}

fn stringify(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Str(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_tokens() {
        assert_eq!(PrimitiveType::resolve("int"), Some(PrimitiveType::Int));
        assert_eq!(PrimitiveType::resolve("float"), Some(PrimitiveType::Float));
        // legacy alias
        assert_eq!(PrimitiveType::resolve("double"), Some(PrimitiveType::Float));
        assert_eq!(PrimitiveType::resolve("bool"), Some(PrimitiveType::Bool));
        assert_eq!(PrimitiveType::resolve("string"), Some(PrimitiveType::Str));
        // case-sensitive
        assert_eq!(PrimitiveType::resolve("Int"), None);
        assert_eq!(PrimitiveType::resolve("str"), None);
    }

    #[test]
    fn test_default_values() {
        assert_eq!(PrimitiveType::Int.default_value(), Value::Int(0));
        assert_eq!(PrimitiveType::Float.default_value(), Value::Float(0.0));
        assert_eq!(PrimitiveType::Bool.default_value(), Value::Bool(false));
        assert_eq!(PrimitiveType::Str.default_value(), Value::Str(String::new()));
    }

    #[test]
    fn test_convert_int_truncates_via_float() {
        assert_eq!(convert(&Value::Str("3.7".into()), PrimitiveType::Int), Value::Int(3));
        assert_eq!(convert(&Value::Float(9.99), PrimitiveType::Int), Value::Int(9));
        assert_eq!(convert(&Value::Str("abc".into()), PrimitiveType::Int), Value::Int(0));
        assert_eq!(convert(&Value::Null, PrimitiveType::Int), Value::Int(0));
    }

    #[test]
    fn test_convert_float_stays_float_for_whole_numbers() {
        assert_eq!(convert(&Value::Str("3".into()), PrimitiveType::Float), Value::Float(3.0));
        assert_eq!(convert(&Value::Int(5), PrimitiveType::Float), Value::Float(5.0));
        assert_eq!(convert(&Value::Str("bad".into()), PrimitiveType::Float), Value::Float(0.0));
    }

    #[test]
    fn test_convert_bool_nonempty_nonzero() {
        assert_eq!(convert(&Value::Str("x".into()), PrimitiveType::Bool), Value::Bool(true));
        assert_eq!(convert(&Value::Str("".into()), PrimitiveType::Bool), Value::Bool(false));
        assert_eq!(convert(&Value::Int(0), PrimitiveType::Bool), Value::Bool(false));
        assert_eq!(convert(&Value::Float(0.5), PrimitiveType::Bool), Value::Bool(true));
        assert_eq!(convert(&Value::Null, PrimitiveType::Bool), Value::Bool(false));
    }

    #[test]
    fn test_convert_string_stringifies() {
        assert_eq!(convert(&Value::Int(42), PrimitiveType::Str), Value::Str("42".into()));
        assert_eq!(convert(&Value::Bool(true), PrimitiveType::Str), Value::Str("true".into()));
        assert_eq!(convert(&Value::Null, PrimitiveType::Str), Value::Str(String::new()));
    }

    #[test]
    fn test_convert_same_kind_unchanged() {
        let v = Value::Str("  spaced  ".into());
        assert_eq!(convert(&v, PrimitiveType::Str), v);
    }

    #[test]
    fn test_convert_idempotent() {
        let raws = [
            Value::Null,
            Value::Int(7),
            Value::Float(2.5),
            Value::Bool(true),
            Value::Str("3.7".into()),
            Value::Str("abc".into()),
            Value::Str(String::new()),
        ];
        let types = [
            PrimitiveType::Int,
            PrimitiveType::Float,
            PrimitiveType::Bool,
            PrimitiveType::Str,
        ];
        for raw in &raws {
            for ty in types {
                let once = convert(raw, ty);
                let twice = convert(&once, ty);
                assert_eq!(once, twice, "convert not idempotent for {:?} -> {:?}", raw, ty);
            }
        }
    }

    #[test]
    fn test_convert_token_rejects_unknown() {
        assert!(convert_token(&Value::Int(1), "int").is_ok());
        let err = convert_token(&Value::Int(1), "decimal").unwrap_err();
        assert!(err.to_string().contains("decimal"));
    }

    #[test]
    fn test_convert_array_default_and_custom_delim() {
        let v = convert_array(&Value::Str("1, 2,3".into()), PrimitiveType::Int, ",");
        assert_eq!(v, Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]));

        let v = convert_array(&Value::Str("a;b".into()), PrimitiveType::Str, ";");
        assert_eq!(v, Value::Array(vec![Value::Str("a".into()), Value::Str("b".into())]));

        assert_eq!(
            convert_array(&Value::Null, PrimitiveType::Int, ","),
            Value::Array(Vec::new())
        );
    }

    #[test]
    fn test_is_zero() {
        assert!(Value::Null.is_zero());
        assert!(Value::Int(0).is_zero());
        assert!(Value::Float(0.0).is_zero());
        assert!(Value::Bool(false).is_zero());
        assert!(Value::Str(String::new()).is_zero());
        assert!(!Value::Int(-1).is_zero());
        assert!(!Value::Str("x".into()).is_zero());
        assert!(!Value::Float(0.25).is_zero());
    }

    #[test]
    fn test_serialization_is_untagged() {
        let mut rec = Record::new();
        rec.insert("id".into(), Value::Int(1));
        rec.insert("name".into(), Value::Str("sword".into()));
        let v = Value::Map(rec);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, r#"{"id":1,"name":"sword"}"#);
        assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");
    }
}
