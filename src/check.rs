//! Missing-field check over bibliography entries.

use crate::Entry;
use std::collections::BTreeSet;
use std::fmt;

/// An entry lacking at least one required field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingFieldsRow {
    pub key: String,
    pub entry_type: String,
    /// The year, or `N/A`
    pub year: String,
    pub missing: Vec<String>,
}

impl fmt::Display for MissingFieldsRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<40} | {:<15} | {:<6} | {}",
            self.key,
            self.entry_type,
            self.year,
            self.missing.join(", ")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MissingFieldsReport {
    /// Number of entries of a checked type
    pub checked: usize,
    pub rows: Vec<MissingFieldsRow>,
    /// `(field, entries missing it)` in required-field order
    pub field_counts: Vec<(String, usize)>,
}

impl MissingFieldsReport {
    pub fn is_clean(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Lists entries of the given types that lack any of `required`.
///
/// A field is missing when it is absent or blank. Blank names in `required`
/// are ignored.
///
/// ```
/// use bibfill::Entry;
/// use bibfill::check::check_missing_fields;
/// use std::collections::BTreeSet;
///
/// let entries = [Entry::new("a", "article").with_field("year", "2024")];
/// let types = BTreeSet::from(["article".to_string()]);
/// let report = check_missing_fields(&entries, &["journal", "doi"], &types);
/// assert_eq!(report.rows[0].missing, vec!["journal", "doi"]);
/// ```
pub fn check_missing_fields<S: AsRef<str>>(
    entries: &[Entry],
    required: &[S],
    entry_types: &BTreeSet<String>,
) -> MissingFieldsReport {
    let required: Vec<String> = required
        .iter()
        .map(|f| f.as_ref().trim().to_lowercase())
        .filter(|f| !f.is_empty())
        .collect();

    let mut report = MissingFieldsReport::default();
    if required.is_empty() {
        return report;
    }

    for entry in entries.iter().filter(|e| entry_types.contains(&e.entry_type)) {
        report.checked += 1;
        let missing: Vec<String> = required
            .iter()
            .filter(|f| !entry.has_field(f))
            .cloned()
            .collect();
        if !missing.is_empty() {
            report.rows.push(MissingFieldsRow {
                key: entry.key.clone(),
                entry_type: entry.entry_type.clone(),
                year: entry.field("year").unwrap_or("N/A").to_string(),
                missing,
            });
        }
    }

    report.field_counts = required
        .iter()
        .map(|field| {
            let count = report.rows.iter().filter(|r| r.missing.contains(field)).count();
            (field.clone(), count)
        })
        .collect();

    tracing::info!(
        checked = report.checked,
        missing = report.rows.len(),
        "missing-field check"
    );
    report
}
