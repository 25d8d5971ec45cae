//! The two-tier template store.
//!
//! Templates hold the fields to inject into entries published at a venue.
//! Journal metadata is stable across years, so the journal tier is keyed by
//! name alone. Conference metadata (location, ISBN, month) changes with every
//! edition, so the proceedings tier is keyed by name and year.
//!
//! Keys are compared through a normalized form (braces removed, whitespace
//! collapsed, lowercased): `{IEEE} Access` and `IEEE Access` are the same
//! journal. There is no substring matching and no year fuzzing.
//!
//! # Example
//!
//! ```
//! use bibfill::{MergeMode, TemplateKey, TemplateRecord, TemplateStore, VenueIdentity, VenueKind};
//!
//! let mut store = TemplateStore::new();
//! let report = store.merge(
//!     [(TemplateKey::journal("IEEE Access"), TemplateRecord::from_iter([("issn", "2169-3536")]))],
//!     MergeMode::Apply,
//! );
//! assert_eq!(report.applied(), 1);
//!
//! let identity = VenueIdentity::new("{IEEE} Access", "2019", VenueKind::Journal);
//! assert_eq!(store.lookup(&identity).unwrap().get("issn"), Some("2169-3536"));
//! ```

mod check;
mod persist;

pub use check::{CompletenessReport, JournalGap, ProceedingsGap};

use crate::classify::{VenueIdentity, VenueKind};
use crate::utils::normalize_text;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

/// The lookup key of a template within its tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TemplateKey {
    Journal { venue: String },
    Proceedings { venue: String, year: String },
}

impl TemplateKey {
    pub fn journal(venue: impl Into<String>) -> Self {
        TemplateKey::Journal {
            venue: venue.into(),
        }
    }

    pub fn proceedings(venue: impl Into<String>, year: impl Into<String>) -> Self {
        TemplateKey::Proceedings {
            venue: venue.into(),
            year: year.into(),
        }
    }

    pub fn kind(&self) -> VenueKind {
        match self {
            TemplateKey::Journal { .. } => VenueKind::Journal,
            TemplateKey::Proceedings { .. } => VenueKind::Proceedings,
        }
    }

    pub fn venue(&self) -> &str {
        match self {
            TemplateKey::Journal { venue } | TemplateKey::Proceedings { venue, .. } => venue,
        }
    }

    /// The year of a proceedings key; journals have none.
    pub fn year(&self) -> Option<&str> {
        match self {
            TemplateKey::Journal { .. } => None,
            TemplateKey::Proceedings { year, .. } => Some(year),
        }
    }

    /// Normalized form used for comparison and ordering.
    pub(crate) fn normalized(&self) -> NormalizedKey {
        NormalizedKey {
            kind: self.kind(),
            venue: normalize_text(self.venue()),
            year: self.year().map(normalize_text).unwrap_or_default(),
        }
    }

    /// Returns true if both keys address the same template.
    pub fn same_template(&self, other: &TemplateKey) -> bool {
        self.normalized() == other.normalized()
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateKey::Journal { venue } => write!(f, "journal '{}'", venue),
            TemplateKey::Proceedings { venue, year } => {
                write!(f, "proceedings ('{}', {})", venue, year)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct NormalizedKey {
    kind: VenueKind,
    venue: String,
    year: String,
}

/// Fields to inject when an entry matches a template key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct TemplateRecord(BTreeMap<String, String>);

impl TemplateRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the trimmed value of a field if it is non-empty.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Sets a field; the name is lowercased.
    pub fn insert(&mut self, field: impl AsRef<str>, value: impl Into<String>) -> Option<String> {
        self.0
            .insert(field.as_ref().trim().to_lowercase(), value.into())
    }

    /// Iterates over fields with non-empty values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(k, v)| (k.as_str(), v.trim()))
            .filter(|(_, v)| !v.is_empty())
    }

    /// All stored fields, including blank ones.
    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for TemplateRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = TemplateRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// Lowercases field names; two names that collide after lowercasing are an error.
impl TryFrom<BTreeMap<String, String>> for TemplateRecord {
    type Error = String;

    fn try_from(fields: BTreeMap<String, String>) -> std::result::Result<Self, Self::Error> {
        let mut record = TemplateRecord::new();
        for (name, value) in fields {
            if record.0.contains_key(&name.trim().to_lowercase()) {
                return Err(format!("field '{}' is defined twice", name.trim()));
            }
            record.insert(name, value);
        }
        Ok(record)
    }
}

impl From<TemplateRecord> for BTreeMap<String, String> {
    fn from(record: TemplateRecord) -> Self {
        record.0
    }
}

/// Whether a merge only reports or also mutates the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Report what would change; leave the store untouched.
    #[default]
    Preview,
    /// Mutate the store, then report.
    Apply,
}

/// An incoming record that changes a field already stored under its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    /// The stored key (keeps the stored spelling of the venue)
    pub key: TemplateKey,
    /// Stored fields before the merge
    pub old_fields: TemplateRecord,
    /// Incoming fields
    pub new_fields: TemplateRecord,
}

impl fmt::Display for Collision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.key)?;
        for (field, new) in self.new_fields.iter() {
            match self.old_fields.get(field) {
                Some(old) if old != new => write!(f, " {} '{}' -> '{}';", field, old, new)?,
                _ => {}
            }
        }
        Ok(())
    }
}

/// The outcome of [`TemplateStore::merge`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeReport {
    pub mode: MergeMode,
    /// Keys that did not exist before
    pub added: Vec<TemplateKey>,
    /// Existing keys whose fields changed
    pub updated: Vec<TemplateKey>,
    /// Existing keys the incoming record did not change
    pub unchanged: Vec<TemplateKey>,
    /// Updates that changed a stored value
    pub collisions: Vec<Collision>,
}

impl MergeReport {
    /// Number of keys added or updated (or that would be, in preview mode).
    pub fn applied(&self) -> usize {
        self.added.len() + self.updated.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    key: TemplateKey,
    record: TemplateRecord,
}

/// The template database: a journal tier and a proceedings tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateStore {
    templates: BTreeMap<NormalizedKey, Slot>,
}

impl TemplateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds the template for an entry identity.
    ///
    /// Journals match on venue only, proceedings on venue and year.
    pub fn lookup(&self, identity: &VenueIdentity) -> Option<&TemplateRecord> {
        self.get(&identity.template_key())
    }

    /// Finds the template stored under a key.
    pub fn get(&self, key: &TemplateKey) -> Option<&TemplateRecord> {
        self.templates.get(&key.normalized()).map(|slot| &slot.record)
    }

    /// Returns true if a template is stored under the key.
    pub fn contains(&self, key: &TemplateKey) -> bool {
        self.templates.contains_key(&key.normalized())
    }

    /// Stores a template, replacing any previous one under the same key.
    ///
    /// Returns the replaced record.
    pub fn insert(&mut self, key: TemplateKey, record: TemplateRecord) -> Option<TemplateRecord> {
        self.templates
            .insert(key.normalized(), Slot { key, record })
            .map(|slot| slot.record)
    }

    /// Iterates over all templates, journals first.
    pub fn iter(&self) -> impl Iterator<Item = (&TemplateKey, &TemplateRecord)> {
        self.templates.values().map(|slot| (&slot.key, &slot.record))
    }

    /// Iterates over the journal tier as `(venue, record)`.
    pub fn journals(&self) -> impl Iterator<Item = (&str, &TemplateRecord)> {
        self.iter().filter_map(|(key, record)| match key {
            TemplateKey::Journal { venue } => Some((venue.as_str(), record)),
            TemplateKey::Proceedings { .. } => None,
        })
    }

    /// Iterates over the proceedings tier as `(venue, year, record)`.
    pub fn proceedings(&self) -> impl Iterator<Item = (&str, &str, &TemplateRecord)> {
        self.iter().filter_map(|(key, record)| match key {
            TemplateKey::Proceedings { venue, year } => {
                Some((venue.as_str(), year.as_str(), record))
            }
            TemplateKey::Journal { .. } => None,
        })
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Merges records into the store.
    ///
    /// New keys are added. For an existing key, incoming fields overwrite
    /// stored fields of the same name and stored fields the record does not
    /// mention are kept; keys are never removed. When an incoming value
    /// replaces a different stored value the merge still happens (explicit
    /// edits win) and a [`Collision`] is reported.
    ///
    /// In [`MergeMode::Preview`] the store is left untouched and the report
    /// describes what [`MergeMode::Apply`] would do.
    pub fn merge<I>(&mut self, records: I, mode: MergeMode) -> MergeReport
    where
        I: IntoIterator<Item = (TemplateKey, TemplateRecord)>,
    {
        let report = match mode {
            MergeMode::Apply => self.apply(records, mode),
            MergeMode::Preview => self.clone().apply(records, mode),
        };

        tracing::info!(
            mode = ?mode,
            added = report.added.len(),
            updated = report.updated.len(),
            unchanged = report.unchanged.len(),
            collisions = report.collisions.len(),
            "template merge"
        );
        report
    }

    fn apply<I>(&mut self, records: I, mode: MergeMode) -> MergeReport
    where
        I: IntoIterator<Item = (TemplateKey, TemplateRecord)>,
    {
        let mut report = MergeReport {
            mode,
            ..Default::default()
        };

        for (key, record) in records {
            match self.templates.entry(key.normalized()) {
                btree_map::Entry::Vacant(vacant) => {
                    tracing::debug!(key = %key, "template added");
                    report.added.push(key.clone());
                    vacant.insert(Slot { key, record });
                }
                btree_map::Entry::Occupied(mut occupied) => {
                    let slot = occupied.get_mut();
                    let overwrites = record.iter().any(|(field, value)| {
                        slot.record.get(field).is_some_and(|old| old != value)
                    });

                    let mut merged = slot.record.clone();
                    for (field, value) in record.iter() {
                        merged.insert(field, value);
                    }

                    if merged == slot.record {
                        report.unchanged.push(slot.key.clone());
                        continue;
                    }

                    if overwrites {
                        tracing::debug!(key = %slot.key, "template collision");
                        report.collisions.push(Collision {
                            key: slot.key.clone(),
                            old_fields: slot.record.clone(),
                            new_fields: record,
                        });
                    }
                    tracing::debug!(key = %slot.key, "template updated");
                    report.updated.push(slot.key.clone());
                    slot.record = merged;
                }
            }
        }
        report
    }
}
