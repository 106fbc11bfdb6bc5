//! Typed view of an object's attribute set and the decoder that builds it
//! from the store's attribute/value/units listing.
//!
//! The listing looks like this (`imeta ls` output):
//!
//! ```text
//! AVUs defined for dataObj a.fastq:
//! attribute: IS_COMPRESSED
//! value: true
//! units: bool
//! ----
//! attribute: UNCOMPRESSED_SIZE
//! value: 1048576
//! units: bytes
//! ```
//!
//! Only lines labelled `attribute`, `value` or `units` carry data; everything
//! else is skipped.

use crate::models::attribute::{TypedValue, coerce};
use serde::{Serialize, Serializer, ser::SerializeMap};
use std::fmt;
use thiserror::Error;

/// One decoded attribute.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct MetadataEntry {
    pub value: TypedValue,
    pub units: String,
    /// Value exactly as listed, for writing the attribute back unchanged.
    #[serde(skip)]
    pub raw: String,
}

/// Attribute name → decoded entry. Keeps the order attributes first appeared in.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    entries: Vec<(String, MetadataEntry)>,
}

impl ObjectMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite an attribute. Overwrites keep the original position.
    pub fn insert(&mut self, name: impl Into<String>, entry: MetadataEntry) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = entry,
            None => self.entries.push((name, entry)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&MetadataEntry> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, entry)| entry)
    }

    pub fn value(&self, name: &str) -> Option<&TypedValue> {
        self.get(name).map(|entry| &entry.value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataEntry)> {
        self.entries.iter().map(|(n, entry)| (n.as_str(), entry))
    }
}

impl Serialize for ObjectMetadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, entry) in &self.entries {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}

/// The three labelled fields of a triplet, in wire order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Attribute,
    Value,
    Units,
}

impl Field {
    fn label(self) -> &'static str {
        match self {
            Field::Attribute => "attribute",
            Field::Value => "value",
            Field::Units => "units",
        }
    }

    fn next(self) -> Field {
        match self {
            Field::Attribute => Field::Value,
            Field::Value => Field::Units,
            Field::Units => Field::Attribute,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("malformed metadata at line {line}: expected `{expected}` but found `{found}`")]
    OutOfOrder {
        line: usize,
        expected: Field,
        found: Field,
    },
    #[error("malformed metadata: stream ended while expecting `{expected}` for attribute `{attribute}`")]
    Truncated { attribute: String, expected: Field },
}

/// Split a listing line into its field label and trimmed content.
///
/// Only the first `:` separates label from content; values may contain more.
fn classify(line: &str) -> Option<(Field, &str)> {
    let (label, rest) = line.split_once(':')?;
    let field = match label.trim() {
        "attribute" => Field::Attribute,
        "value" => Field::Value,
        "units" => Field::Units,
        _ => return None,
    };
    Some((field, rest.trim()))
}

/// Decode an attribute/value/units listing into [`ObjectMetadata`].
///
/// Fields must arrive in `attribute`, `value`, `units` order; a labelled line
/// arriving out of turn, or a listing that stops mid-triplet, is rejected.
/// Later duplicates of an attribute name overwrite earlier ones.
pub fn decode<I, S>(lines: I) -> Result<ObjectMetadata, MetadataError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut metadata = ObjectMetadata::new();
    let mut expecting = Field::Attribute;
    let mut name = String::new();
    let mut raw_value = String::new();

    for (index, line) in lines.into_iter().enumerate() {
        let Some((field, content)) = classify(line.as_ref()) else {
            continue;
        };
        if field != expecting {
            return Err(MetadataError::OutOfOrder {
                line: index + 1,
                expected: expecting,
                found: field,
            });
        }
        match field {
            Field::Attribute => name = content.to_string(),
            Field::Value => raw_value = content.to_string(),
            Field::Units => {
                let entry = MetadataEntry {
                    value: coerce(&raw_value, content),
                    units: content.to_string(),
                    raw: std::mem::take(&mut raw_value),
                };
                metadata.insert(std::mem::take(&mut name), entry);
            }
        }
        expecting = field.next();
    }

    if expecting != Field::Attribute {
        return Err(MetadataError::Truncated {
            attribute: name,
            expected: expecting,
        });
    }
    Ok(metadata)
}

/// Convenience wrapper over [`decode`] for a whole listing held in memory.
pub fn decode_text(text: &str) -> Result<ObjectMetadata, MetadataError> {
    decode(text.lines())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decodes_boolean_flag_with_upper_case_units() {
        let md = decode_text("attribute: IS_COMPRESSED\nvalue: TRUE\nunits: BOOL\n").unwrap();
        assert_eq!(md.len(), 1);
        assert_eq!(
            md.get("IS_COMPRESSED"),
            Some(&MetadataEntry {
                value: TypedValue::Bool(true),
                units: "BOOL".into(),
                raw: "TRUE".into(),
            })
        );
    }

    #[test]
    fn empty_listing_decodes_to_empty_map() {
        assert!(decode_text("").unwrap().is_empty());
        assert!(decode_text("AVUs defined for dataObj a.fastq:\nNone\n").unwrap().is_empty());
    }

    #[test]
    fn skips_headers_separators_and_blank_lines() {
        let text = "AVUs defined for dataObj /coll/a.fastq:\n\
                    attribute: UNCOMPRESSED_SIZE\n\
                    value: 2048.0\n\
                    units: bytes\n\
                    ----\n\
                    \n\
                    attribute: HASH_METHOD\n\
                    value: sha1\n\
                    units:\n";
        let md = decode_text(text).unwrap();
        assert_eq!(md.len(), 2);
        assert_eq!(md.value("UNCOMPRESSED_SIZE"), Some(&TypedValue::Bytes(2048)));
        assert_eq!(md.value("HASH_METHOD"), Some(&TypedValue::String("sha1".into())));
        let names: Vec<&str> = md.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["UNCOMPRESSED_SIZE", "HASH_METHOD"]);
    }

    #[test]
    fn values_may_contain_colons() {
        let md = decode_text("attribute: PARENT_FILE\nvalue: /tmp/20260101T10:00:00_a\nunits:\n")
            .unwrap();
        assert_eq!(
            md.value("PARENT_FILE"),
            Some(&TypedValue::String("/tmp/20260101T10:00:00_a".into()))
        );
    }

    #[test]
    fn duplicate_attributes_overwrite() {
        let text = "attribute: A\nvalue: 1\nunits: bytes\nattribute: A\nvalue: 2\nunits: bytes\n";
        let md = decode_text(text).unwrap();
        assert_eq!(md.len(), 1);
        assert_eq!(md.value("A"), Some(&TypedValue::Bytes(2)));
    }

    #[test]
    fn value_before_attribute_is_rejected() {
        let err = decode_text("value: 1\nattribute: A\nunits: bytes\n").unwrap_err();
        assert_eq!(
            err,
            MetadataError::OutOfOrder {
                line: 1,
                expected: Field::Attribute,
                found: Field::Value,
            }
        );
    }

    #[test]
    fn units_before_value_is_rejected() {
        let err = decode_text("attribute: A\nunits: bytes\nvalue: 1\n").unwrap_err();
        assert!(matches!(
            err,
            MetadataError::OutOfOrder {
                line: 2,
                expected: Field::Value,
                found: Field::Units,
            }
        ));
    }

    #[test]
    fn truncated_triplet_is_rejected() {
        let err = decode_text("attribute: A\nvalue: 1\n").unwrap_err();
        assert_eq!(
            err,
            MetadataError::Truncated {
                attribute: "A".into(),
                expected: Field::Units,
            }
        );
    }

    fn triplet_text(names: &[String]) -> String {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| format!("attribute: {}\nvalue: {}\nunits: bytes\n----\n", n, i))
            .collect()
    }

    proptest! {
        #[test]
        fn well_formed_streams_decode_every_triplet(count in 0usize..40) {
            let names: Vec<String> = (0..count).map(|i| format!("ATTR_{}", i)).collect();
            let md = decode_text(&triplet_text(&names)).unwrap();
            prop_assert_eq!(md.len(), count);
            for (i, n) in names.iter().enumerate() {
                prop_assert_eq!(md.value(n), Some(&TypedValue::Bytes(i as u64)));
            }
        }

        #[test]
        fn swapping_fields_of_any_triplet_is_rejected(count in 1usize..20, pick in 0usize..20) {
            let names: Vec<String> = (0..count).map(|i| format!("ATTR_{}", i)).collect();
            let mut lines: Vec<String> = triplet_text(&names).lines().map(str::to_string).collect();
            let target = (pick % count) * 4;
            lines.swap(target + 1, target + 2);
            prop_assert!(decode(lines).is_err());
        }
    }
}
