//! Attribute triplets and the units-driven coercion of their raw values.
//!
//! Store metadata is untyped: every fact is an `(attribute, value, units)`
//! triplet of strings. The units field doubles as a type tag, so decoding a
//! value means looking at its units first.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single metadata fact about an object, exactly as it travels to and from
/// the store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name (e.g. `IS_COMPRESSED`).
    pub name: String,

    /// Raw value text.
    pub value: String,

    /// Units text; also selects how `value` is decoded.
    pub units: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>, units: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            units: units.into(),
        }
    }

    /// Decode this triplet's value using its own units.
    pub fn typed_value(&self) -> TypedValue {
        coerce(&self.value, &self.units)
    }
}

/// Decoded scalar value of an attribute.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum TypedValue {
    None,
    Bool(bool),
    Bytes(u64),
    String(String),
}

impl TypedValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<u64> {
        match self {
            TypedValue::Bytes(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, TypedValue::None)
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::None => write!(f, "none"),
            TypedValue::Bool(b) => write!(f, "{}", b),
            TypedValue::Bytes(n) => write!(f, "{}", n),
            TypedValue::String(s) => write!(f, "{}", s),
        }
    }
}

/// The closed vocabulary of unit tags this crate understands.
///
/// Anything outside the vocabulary maps to [`UnitTag::Other`], whose values
/// are kept as opaque strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnitTag {
    /// `""` or `"none"`.
    Empty,
    /// `"bool"`.
    Bool,
    /// `"bytes"`, or the legacy `"int"`.
    Bytes,
    Other,
}

impl UnitTag {
    /// Classify a units string. Case-insensitive and total.
    pub fn from_tag(units: &str) -> Self {
        match units.trim().to_ascii_lowercase().as_str() {
            "" | "none" => UnitTag::Empty,
            "bool" => UnitTag::Bool,
            "bytes" | "int" => UnitTag::Bytes,
            _ => UnitTag::Other,
        }
    }
}

/// Convert a raw value into a [`TypedValue`] according to its units tag.
///
/// Never fails: when a value cannot be decoded under its tag the raw string is
/// returned unchanged.
pub fn coerce(raw: &str, units: &str) -> TypedValue {
    match UnitTag::from_tag(units) {
        UnitTag::Empty => {
            if is_none_sentinel(raw) {
                TypedValue::None
            } else {
                TypedValue::String(raw.to_string())
            }
        }
        UnitTag::Bool => TypedValue::Bool(raw.trim().eq_ignore_ascii_case("true")),
        UnitTag::Bytes => match parse_byte_count(raw) {
            Some(n) => TypedValue::Bytes(n),
            None => TypedValue::String(raw.to_string()),
        },
        UnitTag::Other => TypedValue::String(raw.to_string()),
    }
}

fn is_none_sentinel(raw: &str) -> bool {
    let lowered = raw.trim().to_ascii_lowercase();
    lowered.is_empty() || lowered == "none"
}

/// Parse a float literal and truncate it, so `"123.0"` reads as 123.
fn parse_byte_count(raw: &str) -> Option<u64> {
    let parsed = raw.trim().parse::<f64>().ok()?;
    if !parsed.is_finite() || parsed < 0.0 {
        return None;
    }
    Some(parsed.trunc() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_units_with_sentinel_values_decode_to_none() {
        assert_eq!(coerce("", ""), TypedValue::None);
        assert_eq!(coerce("None", ""), TypedValue::None);
        assert_eq!(coerce("NONE", "none"), TypedValue::None);
    }

    #[test]
    fn empty_units_keep_other_values_verbatim() {
        assert_eq!(coerce("gzip", ""), TypedValue::String("gzip".into()));
        assert_eq!(coerce("MixedCase", "None"), TypedValue::String("MixedCase".into()));
    }

    #[test]
    fn bool_is_case_insensitive() {
        assert_eq!(coerce("TRUE", "BOOL"), TypedValue::Bool(true));
        assert_eq!(coerce("true", "bool"), coerce("TRUE", "BOOL"));
        assert_eq!(coerce("True", "Bool"), TypedValue::Bool(true));
    }

    #[test]
    fn malformed_bool_reads_as_false() {
        assert_eq!(coerce("yes", "bool"), TypedValue::Bool(false));
        assert_eq!(coerce("", "bool"), TypedValue::Bool(false));
        assert_eq!(coerce("1", "BOOL"), TypedValue::Bool(false));
    }

    #[test]
    fn bytes_truncate_float_literals() {
        assert_eq!(coerce("12345", "bytes"), TypedValue::Bytes(12345));
        assert_eq!(coerce("123.0", "BYTES"), TypedValue::Bytes(123));
        assert_eq!(coerce("99.9", "int"), TypedValue::Bytes(99));
        assert_eq!(coerce("1e3", "Int"), TypedValue::Bytes(1000));
    }

    #[test]
    fn unparseable_bytes_fall_back_to_string() {
        assert_eq!(coerce("lots", "bytes"), TypedValue::String("lots".into()));
        assert_eq!(coerce("-4", "bytes"), TypedValue::String("-4".into()));
        assert_eq!(coerce("NaN", "bytes"), TypedValue::String("NaN".into()));
    }

    #[test]
    fn unknown_units_keep_raw_value() {
        assert_eq!(UnitTag::from_tag("celsius"), UnitTag::Other);
        assert_eq!(coerce("21.5", "celsius"), TypedValue::String("21.5".into()));
        assert_eq!(coerce("TRUE", "flag"), TypedValue::String("TRUE".into()));
    }

    #[test]
    fn unit_tags_are_classified_case_insensitively() {
        assert_eq!(UnitTag::from_tag(""), UnitTag::Empty);
        assert_eq!(UnitTag::from_tag("NONE"), UnitTag::Empty);
        assert_eq!(UnitTag::from_tag("Bool"), UnitTag::Bool);
        assert_eq!(UnitTag::from_tag("INT"), UnitTag::Bytes);
        assert_eq!(UnitTag::from_tag("bytes"), UnitTag::Bytes);
    }

    proptest! {
        #[test]
        fn bytes_coercion_is_idempotent(v in 0.0f64..1.0e15) {
            let literal = v.to_string();
            let first = coerce(&literal, "bytes");
            let second = coerce(&first.to_string(), "bytes");
            prop_assert_eq!(first, second);
        }
    }
}
