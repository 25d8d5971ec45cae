//! The human-editable YAML record set.
//!
//! Missing templates are written out for a person to review and complete:
//!
//! ```yaml
//! templates:
//! - venue: NeurIPS
//!   year: '2025'
//!   kind: proceedings
//!   fields:
//!     venue: ''
//!     publisher:
//!       value: Curran Associates, Inc.
//!       origin: sourced
//!     month:
//!       value: December
//!       origin: guessed
//! ```
//!
//! A field value is either a plain string or a `{value, origin}` mapping.
//! Origins mark suggestions (`guessed` from the venue name, `sourced` from
//! sibling entries); a value without an origin is taken as confirmed.
//!
//! Reading is tolerant of hand edits: the document may be a bare list or carry
//! a `templates` key, `type` is accepted for `kind`, and numbers are read as
//! strings. Every record is decoded on its own, so one broken record is kept
//! as [`RecordItem::Malformed`] while the rest of the document stays usable.

use crate::aggregate::MissingTemplateRecord;
use crate::classify::VenueKind;
use crate::{Error, Result};
use serde::de::Error as _;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const HEADER: &str = "\
# Templates for venues that have none yet.
#
# Fill in or correct the fields of each record, then import this file.
# Values marked `origin: guessed` come from the venue name and
# `origin: sourced` from other entries of the same venue; check them.
# Replacing a value by a plain string marks it as confirmed.
# Empty fields are ignored on import. Delete records you do not want.
";

/// How a value entered the record set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldOrigin {
    /// Heuristic guess from the venue name
    Guessed,
    /// Copied from an entry of the same venue
    Sourced,
    /// Typed or confirmed by a person
    #[default]
    Plain,
}

/// A field value with its origin.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldValue {
    pub value: String,
    pub origin: FieldOrigin,
}

impl FieldValue {
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            origin: FieldOrigin::Plain,
        }
    }

    pub fn guessed(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            origin: FieldOrigin::Guessed,
        }
    }

    pub fn sourced(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            origin: FieldOrigin::Sourced,
        }
    }

    fn from_yaml(node: &Value) -> std::result::Result<Self, String> {
        if let Some(value) = scalar(node) {
            return Ok(Self::plain(value));
        }
        let Value::Mapping(map) = node else {
            return Err("field value must be a string or a {value, origin} mapping".to_string());
        };

        let value = match map.get("value") {
            Some(v) => scalar(v).ok_or("field 'value' must be a string")?,
            None => String::new(),
        };
        let origin = match map.get("origin").and_then(Value::as_str) {
            Some(origin) => match origin.trim().to_lowercase().as_str() {
                "guessed" => FieldOrigin::Guessed,
                "sourced" => FieldOrigin::Sourced,
                _ => FieldOrigin::Plain,
            },
            None => FieldOrigin::Plain,
        };
        Ok(Self { value, origin })
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.origin {
            FieldOrigin::Plain => serializer.serialize_str(&self.value),
            origin => {
                let mut state = serializer.serialize_struct("FieldValue", 2)?;
                state.serialize_field("value", &self.value)?;
                state.serialize_field("origin", &origin)?;
                state.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let node = Value::deserialize(deserializer)?;
        FieldValue::from_yaml(&node).map_err(D::Error::custom)
    }
}

/// Reads a scalar as a string; null is empty.
fn scalar(node: &Value) -> Option<String> {
    match node {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

fn de_scalar<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    let node = Value::deserialize(deserializer)?;
    scalar(&node).ok_or_else(|| D::Error::custom("expected a string"))
}

fn de_opt_scalar<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    let s = de_scalar(deserializer)?;
    Ok((!s.trim().is_empty()).then_some(s))
}

/// Field maps keep their document order.
mod ordered_fields {
    use super::{FieldValue, scalar};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_yaml::Mapping;

    pub fn serialize<S: Serializer>(
        fields: &[(String, FieldValue)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(fields.iter().map(|(k, v)| (k, v)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, FieldValue)>, D::Error> {
        Option::<Mapping>::deserialize(deserializer)?
            .unwrap_or_default()
            .into_iter()
            .map(|(name, node)| {
                let name = scalar(&name)
                    .ok_or_else(|| D::Error::custom("field names must be strings"))?;
                let value = FieldValue::from_yaml(&node)
                    .map_err(|e| D::Error::custom(format!("field '{}': {}", name, e)))?;
                Ok((name.trim().to_lowercase(), value))
            })
            .collect()
    }
}

/// One record of the set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EditableRecord {
    #[serde(default, deserialize_with = "de_scalar")]
    pub venue: String,
    /// Empty for journals
    #[serde(default, deserialize_with = "de_scalar", skip_serializing_if = "String::is_empty")]
    pub year: String,
    /// Raw kind as written; `None` when absent
    #[serde(
        default,
        alias = "type",
        deserialize_with = "de_opt_scalar",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(default, with = "ordered_fields")]
    pub fields: Vec<(String, FieldValue)>,
    /// Notes for the reviewer; never imported
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hints: BTreeMap<String, String>,
}

impl EditableRecord {
    /// Builds the record for a missing template.
    ///
    /// Each desired field takes the sourced value, else the guessed value,
    /// else an empty placeholder. Suggestions for fields outside the desired
    /// list follow at the end.
    pub fn from_missing(missing: &MissingTemplateRecord) -> Self {
        let guessed: BTreeMap<&str, &str> = missing.guessed.fields().collect();
        let pick = |name: &str| match (missing.sourced.get(name), guessed.get(name)) {
            (Some(value), _) => FieldValue::sourced(value.as_str()),
            (None, Some(value)) => FieldValue::guessed(*value),
            (None, None) => FieldValue::plain(""),
        };

        let mut fields: Vec<(String, FieldValue)> = missing
            .desired
            .iter()
            .map(|name| (name.clone(), pick(name)))
            .collect();
        let extras = missing
            .sourced
            .keys()
            .map(String::as_str)
            .chain(guessed.keys().copied())
            .filter(|name| !missing.desired.iter().any(|d| d == name));
        for name in extras {
            if !fields.iter().any(|(n, _)| n == name) {
                fields.push((name.to_string(), pick(name)));
            }
        }

        let mut hints = BTreeMap::new();
        if let Some(hint) = &missing.guessed.issn_hint {
            hints.insert("issn".to_string(), hint.clone());
        }

        let identity = &missing.identity;
        Self {
            venue: identity.venue.clone(),
            year: match identity.kind {
                VenueKind::Journal => String::new(),
                VenueKind::Proceedings => identity.year.clone(),
            },
            kind: Some(identity.kind.to_string()),
            fields,
            hints,
        }
    }

    /// Returns the value of a field, if present.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// A document position: a decoded record or the reason it could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordItem {
    Record(EditableRecord),
    Malformed(String),
}

#[derive(Serialize)]
struct Document<'a> {
    templates: Vec<&'a EditableRecord>,
}

/// An ordered set of editable records.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordSet {
    items: Vec<RecordItem>,
}

impl RecordSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// One record per missing template, in the given order.
    pub fn from_missing(missing: &[MissingTemplateRecord]) -> Self {
        missing.iter().map(EditableRecord::from_missing).collect()
    }

    pub fn push(&mut self, record: EditableRecord) {
        self.items.push(RecordItem::Record(record));
    }

    /// All document positions, in order.
    pub fn items(&self) -> &[RecordItem] {
        &self.items
    }

    /// Decoded records.
    pub fn records(&self) -> impl Iterator<Item = &EditableRecord> {
        self.items.iter().filter_map(|item| match item {
            RecordItem::Record(record) => Some(record),
            RecordItem::Malformed(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Serializes the set behind an instruction header.
    ///
    /// Malformed items have no content to write and are skipped.
    pub fn to_yaml_string(&self) -> Result<String> {
        let document = Document {
            templates: self.records().collect(),
        };
        let body = serde_yaml::to_string(&document)?;
        Ok(format!("{}\n{}", HEADER, body))
    }

    /// Parses a possibly hand-edited document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecordSet`] only when the document as a whole is not
    /// YAML or has no recognisable record list. Individual bad records become
    /// [`RecordItem::Malformed`].
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let document: Value = serde_yaml::from_str(yaml)?;
        let nodes = match document {
            Value::Null => Vec::new(),
            Value::Sequence(nodes) => nodes,
            Value::Mapping(map) => match map.get("templates").cloned() {
                Some(Value::Sequence(nodes)) => nodes,
                Some(Value::Null) | None => Vec::new(),
                Some(_) => {
                    return Err(Error::RecordSet("'templates' must be a list".to_string()));
                }
            },
            _ => {
                return Err(Error::RecordSet(
                    "expected a list of records or a 'templates' key".to_string(),
                ));
            }
        };

        let items = nodes
            .into_iter()
            .map(|node| match serde_yaml::from_value::<EditableRecord>(node) {
                Ok(record) => RecordItem::Record(record),
                Err(e) => RecordItem::Malformed(e.to_string()),
            })
            .collect();
        Ok(Self { items })
    }

    /// Reads a record set file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let set = Self::from_yaml_str(&fs::read_to_string(path)?)?;
        tracing::info!(path = %path.display(), records = set.len(), "read record set");
        Ok(set)
    }

    /// Writes the set to a file, replacing it.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_yaml_string()?)?;
        tracing::info!(path = %path.display(), records = self.len(), "wrote record set");
        Ok(())
    }
}

impl FromIterator<EditableRecord> for RecordSet {
    fn from_iter<I: IntoIterator<Item = EditableRecord>>(iter: I) -> Self {
        let mut set = Self::new();
        for record in iter {
            set.push(record);
        }
        set
    }
}
