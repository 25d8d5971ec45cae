//! Imports an edited record set into the template store.
//!
//! Records are validated one by one. A bad record is rejected with its
//! position and identity, and the remaining records are still merged.
//!
//! ```
//! use bibfill::import::import;
//! use bibfill::record_set::RecordSet;
//! use bibfill::{MergeMode, TemplateStore};
//!
//! let set = RecordSet::from_yaml_str(r#"
//! templates:
//!   - venue: ICLR
//!     year: 2025
//!     fields: { venue: Singapore }
//!   - venue: NeurIPS
//!     fields: { month: December }
//! "#).unwrap();
//!
//! let mut store = TemplateStore::new();
//! let report = import(&mut store, &set, MergeMode::Apply);
//! assert_eq!(report.applied, 1);
//! assert_eq!(report.rejected.len(), 1);
//! ```

use crate::classify::VenueKind;
use crate::record_set::{EditableRecord, RecordItem, RecordSet};
use crate::template::{MergeMode, MergeReport, TemplateKey, TemplateRecord, TemplateStore};
use crate::utils::clean_value;
use thiserror::Error;

/// Why a record was not imported.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("record could not be decoded: {0}")]
    Malformed(String),

    #[error("missing venue")]
    MissingVenue,

    #[error("missing year for a proceedings record")]
    MissingYear,

    #[error("no non-empty fields")]
    EmptyFields,

    #[error("unknown kind '{0}'")]
    UnknownKind(String),
}

/// A record that was not imported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    /// Zero-based position in the record set
    pub index: usize,
    pub venue: String,
    pub year: String,
    pub kind: Option<String>,
    pub error: RecordError,
}

/// Outcome of [`import`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportReport {
    /// Keys added or updated (or that would be, in preview mode)
    pub applied: usize,
    pub merge: MergeReport,
    pub rejected: Vec<RejectedRecord>,
}

/// Converts an edited record into a store entry.
///
/// A missing kind means proceedings. Journals ignore the year. Field values
/// are cleaned and blank ones dropped; origin markers are discarded.
pub fn to_template(
    record: &EditableRecord,
) -> std::result::Result<(TemplateKey, TemplateRecord), RecordError> {
    let kind = match &record.kind {
        Some(kind) => kind
            .parse::<VenueKind>()
            .map_err(|_| RecordError::UnknownKind(kind.clone()))?,
        None => VenueKind::Proceedings,
    };

    let venue = clean_value(&record.venue);
    if venue.is_empty() {
        return Err(RecordError::MissingVenue);
    }

    let key = match kind {
        VenueKind::Journal => TemplateKey::journal(venue),
        VenueKind::Proceedings => {
            let year = clean_value(&record.year);
            if year.is_empty() {
                return Err(RecordError::MissingYear);
            }
            TemplateKey::proceedings(venue, year)
        }
    };

    let fields: TemplateRecord = record
        .fields
        .iter()
        .map(|(name, value)| (name.as_str(), clean_value(&value.value)))
        .filter(|(name, value)| !name.trim().is_empty() && !value.is_empty())
        .collect();
    if fields.is_empty() {
        return Err(RecordError::EmptyFields);
    }

    Ok((key, fields))
}

/// Validates every record and merges the valid ones into `store`.
pub fn import(store: &mut TemplateStore, set: &RecordSet, mode: MergeMode) -> ImportReport {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for (index, item) in set.items().iter().enumerate() {
        let result = match item {
            RecordItem::Record(record) => to_template(record).map_err(|error| RejectedRecord {
                index,
                venue: record.venue.clone(),
                year: record.year.clone(),
                kind: record.kind.clone(),
                error,
            }),
            RecordItem::Malformed(message) => Err(RejectedRecord {
                index,
                venue: String::new(),
                year: String::new(),
                kind: None,
                error: RecordError::Malformed(message.clone()),
            }),
        };

        match result {
            Ok(template) => accepted.push(template),
            Err(rejection) => {
                tracing::warn!(
                    index = rejection.index,
                    venue = %rejection.venue,
                    year = %rejection.year,
                    kind = rejection.kind.as_deref().unwrap_or(""),
                    error = %rejection.error,
                    "rejected record"
                );
                rejected.push(rejection);
            }
        }
    }

    let merge = store.merge(accepted, mode);
    ImportReport {
        applied: merge.applied(),
        merge,
        rejected,
    }
}
