//! Template-based field completion.
//!
//! The [`Completer`] classifies each entry, looks up its template and copies
//! the fields the entry lacks. It never overwrites a filled field: when an
//! entry disagrees with its template the entry wins and a [`ConflictRecord`]
//! is emitted.
//!
//! Every entry ends in exactly one [`ResolutionStatus`]:
//!
//! | Status            | Meaning                                              |
//! |-------------------|------------------------------------------------------|
//! | `Filtered`        | entry type not selected for completion               |
//! | `Incomplete`      | no venue or no year, so no identity to look up       |
//! | `Satisfied`       | nothing to fill in                                   |
//! | `Completed`       | a template was found and applied                     |
//! | `MissingTemplate` | the identity has no template yet                     |
//!
//! Missing fields are never guessed into entries. Guesses only pre-fill the
//! editable record set built from [`CompletionReport::missing_templates`].

use crate::aggregate::{Aggregation, Aggregator};
use crate::classify::{Classifier, VenueIdentity};
use crate::config::{Config, RequiredFields};
use crate::template::{NormalizedKey, TemplateRecord, TemplateStore};
use crate::utils::values_match;
use crate::{Entry, Result};
use std::collections::HashSet;
use std::fmt;

/// An entry value that disagrees with its template.
///
/// The entry keeps `existing_value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRecord {
    pub entry_key: String,
    pub field: String,
    pub existing_value: String,
    pub template_value: String,
}

impl ConflictRecord {
    pub fn new(
        entry_key: impl Into<String>,
        field: impl Into<String>,
        existing_value: impl Into<String>,
        template_value: impl Into<String>,
    ) -> Self {
        Self {
            entry_key: entry_key.into(),
            field: field.into(),
            existing_value: existing_value.into(),
            template_value: template_value.into(),
        }
    }
}

impl fmt::Display for ConflictRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\tEXISTING={}\tTEMPLATE={}",
            self.entry_key, self.field, self.existing_value, self.template_value
        )
    }
}

/// Outcome of resolving one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionStatus {
    /// The entry type is not selected for completion.
    Filtered,
    /// The entry lacks a venue or a year.
    Incomplete,
    /// Nothing was missing.
    Satisfied(VenueIdentity),
    /// A template was found and applied.
    Completed(VenueIdentity),
    /// No template exists for the identity.
    MissingTemplate(VenueIdentity),
}

impl ResolutionStatus {
    /// The identity of the entry, if one could be extracted.
    pub fn identity(&self) -> Option<&VenueIdentity> {
        match self {
            ResolutionStatus::Satisfied(id)
            | ResolutionStatus::Completed(id)
            | ResolutionStatus::MissingTemplate(id) => Some(id),
            ResolutionStatus::Filtered | ResolutionStatus::Incomplete => None,
        }
    }

    /// The identity to register as missing a template.
    pub fn unresolved_identity(&self) -> Option<&VenueIdentity> {
        match self {
            ResolutionStatus::MissingTemplate(id) => Some(id),
            _ => None,
        }
    }
}

/// Fields added to one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPatch {
    pub key: String,
    /// `(field, value)` in insertion order
    pub fields: Vec<(String, String)>,
}

/// The result of [`Completer::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The completed entry (unchanged unless fields were added)
    pub entry: Entry,
    pub status: ResolutionStatus,
    /// Fields copied from the template, in the order they were added
    pub added: Vec<String>,
    /// Required fields the template could not supply
    pub still_missing: Vec<String>,
    pub conflicts: Vec<ConflictRecord>,
}

impl Resolution {
    fn unchanged(entry: &Entry, status: ResolutionStatus) -> Self {
        Self {
            entry: entry.clone(),
            status,
            added: Vec::new(),
            still_missing: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    /// The fields this resolution added, or `None` if the entry is unchanged.
    pub fn patch(&self) -> Option<EntryPatch> {
        if self.added.is_empty() {
            return None;
        }
        let fields = self
            .added
            .iter()
            .filter_map(|name| Some((name.clone(), self.entry.fields.get(name)?.clone())))
            .collect();
        Some(EntryPatch {
            key: self.entry.key.clone(),
            fields,
        })
    }
}

/// Completes entries from a [`TemplateStore`].
#[derive(Debug, Clone)]
pub struct Completer<'a> {
    store: &'a TemplateStore,
    classifier: Classifier,
    config: Config,
}

impl<'a> Completer<'a> {
    /// Creates a completer over a store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the configuration is
    /// invalid.
    pub fn new(store: &'a TemplateStore, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            classifier: Classifier::new(config.classifier.clone()),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolves a single entry.
    ///
    /// # Examples
    ///
    /// ```
    /// use bibfill::{
    ///     Completer, Config, Entry, MergeMode, ResolutionStatus, TemplateKey, TemplateRecord,
    ///     TemplateStore,
    /// };
    ///
    /// let mut store = TemplateStore::new();
    /// store.merge(
    ///     [(
    ///         TemplateKey::proceedings("BigConf 2024", "2024"),
    ///         TemplateRecord::from_iter([("month", "June")]),
    ///     )],
    ///     MergeMode::Apply,
    /// );
    /// let completer = Completer::new(&store, Config::default()).unwrap();
    ///
    /// let entry = Entry::new("abc2024", "inproceedings")
    ///     .with_field("venue", "BigConf 2024")
    ///     .with_field("year", "2024")
    ///     .with_field("month", "May");
    /// let resolution = completer.resolve(&entry);
    ///
    /// assert_eq!(resolution.entry.field("month"), Some("May"));
    /// assert_eq!(resolution.conflicts[0].template_value, "June");
    /// assert!(matches!(resolution.status, ResolutionStatus::Satisfied(_)));
    /// ```
    pub fn resolve(&self, entry: &Entry) -> Resolution {
        if !self.config.completion.entry_types.contains(&entry.entry_type) {
            return Resolution::unchanged(entry, ResolutionStatus::Filtered);
        }

        let Some(identity) = self.classifier.identify(entry) else {
            tracing::debug!(key = %entry.key, "entry has no venue identity");
            return Resolution::unchanged(entry, ResolutionStatus::Incomplete);
        };

        let template = self.store.lookup(&identity);
        let listed = matches!(self.config.completion.required_fields, RequiredFields::Listed(_));
        let missing: Vec<String> = match (&self.config.completion.required_fields, template) {
            (RequiredFields::Listed(fields), _) => fields
                .iter()
                .filter(|f| !entry.has_field(f))
                .cloned()
                .collect(),
            (RequiredFields::Template, Some(template)) => template
                .iter()
                .map(|(name, _)| name)
                .filter(|f| !entry.has_field(f))
                .map(str::to_string)
                .collect(),
            (RequiredFields::Template, None) => Vec::new(),
        };
        let conflicts = template
            .map(|t| find_conflicts(entry, t))
            .unwrap_or_default();

        let mut resolution = Resolution {
            conflicts,
            ..Resolution::unchanged(entry, ResolutionStatus::Incomplete)
        };

        match template {
            _ if missing.is_empty() && (listed || template.is_some()) => {
                resolution.status = ResolutionStatus::Satisfied(identity);
            }
            None => {
                tracing::debug!(key = %entry.key, identity = %identity, "no template");
                resolution.still_missing = missing;
                resolution.status = ResolutionStatus::MissingTemplate(identity);
            }
            Some(template) => {
                for field in missing {
                    match template.get(&field) {
                        Some(value) => {
                            resolution.entry.set_field(&field, value);
                            resolution.added.push(field);
                        }
                        None => resolution.still_missing.push(field),
                    }
                }
                tracing::debug!(
                    key = %entry.key,
                    identity = %identity,
                    added = resolution.added.len(),
                    still_missing = resolution.still_missing.len(),
                    "entry completed"
                );
                resolution.status = ResolutionStatus::Completed(identity);
            }
        }

        for conflict in &resolution.conflicts {
            tracing::debug!(
                key = %conflict.entry_key,
                field = %conflict.field,
                existing = %conflict.existing_value,
                template = %conflict.template_value,
                "field conflict"
            );
        }
        resolution
    }

    /// Resolves a batch of entries.
    pub fn run(&self, entries: &[Entry]) -> CompletionReport {
        let resolutions: Vec<Resolution> = entries.iter().map(|e| self.resolve(e)).collect();
        let report = CompletionReport {
            resolutions,
            aggregator: Aggregator::new(
                self.store,
                self.classifier.clone(),
                self.config.aggregate.clone(),
            ),
        };

        tracing::info!(
            entries = entries.len(),
            completed = report.patches().len(),
            conflicts = report.conflicts().len(),
            incomplete = report.incomplete().len(),
            filtered = report.filtered().len(),
            missing_templates = report.missing_identities().len(),
            "completion run finished"
        );
        report
    }
}

fn find_conflicts(entry: &Entry, template: &TemplateRecord) -> Vec<ConflictRecord> {
    template
        .iter()
        .filter_map(|(field, template_value)| {
            let existing = entry.field(field)?;
            (!values_match(existing, template_value))
                .then(|| ConflictRecord::new(&entry.key, field, existing, template_value))
        })
        .collect()
}

/// Results of [`Completer::run`], in entry order.
#[derive(Debug, Clone)]
pub struct CompletionReport {
    resolutions: Vec<Resolution>,
    aggregator: Aggregator,
}

impl CompletionReport {
    pub fn resolutions(&self) -> &[Resolution] {
        &self.resolutions
    }

    /// All entries, completed where a template applied.
    pub fn entries(&self) -> Vec<&Entry> {
        self.resolutions.iter().map(|r| &r.entry).collect()
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.resolutions.into_iter().map(|r| r.entry).collect()
    }

    pub fn conflicts(&self) -> Vec<&ConflictRecord> {
        self.resolutions
            .iter()
            .flat_map(|r| r.conflicts.iter())
            .collect()
    }

    /// Entries without a venue identity, with all their raw fields.
    pub fn incomplete(&self) -> Vec<&Entry> {
        self.with_status(|s| matches!(s, ResolutionStatus::Incomplete))
    }

    /// Keys of entries whose type is not selected for completion.
    pub fn filtered(&self) -> Vec<&str> {
        self.with_status(|s| matches!(s, ResolutionStatus::Filtered))
            .into_iter()
            .map(|e| e.key.as_str())
            .collect()
    }

    /// Identities without a template, one per template key, in first-seen order.
    pub fn missing_identities(&self) -> Vec<&VenueIdentity> {
        let mut seen: HashSet<NormalizedKey> = HashSet::new();
        self.resolutions
            .iter()
            .filter_map(|r| r.status.unresolved_identity())
            .filter(|id| seen.insert(id.template_key().normalized()))
            .collect()
    }

    /// The fields added to each changed entry.
    pub fn patches(&self) -> Vec<EntryPatch> {
        self.resolutions.iter().filter_map(Resolution::patch).collect()
    }

    /// Builds pre-filled records for every identity without a template.
    ///
    /// Sibling values are sourced from all entries selected for completion.
    pub fn missing_templates(&self) -> Aggregation {
        let sources: Vec<Entry> = self
            .resolutions
            .iter()
            .filter(|r| r.status != ResolutionStatus::Filtered)
            .map(|r| r.entry.clone())
            .collect();
        let identities: Vec<VenueIdentity> =
            self.missing_identities().into_iter().cloned().collect();
        self.aggregator.aggregate(&identities, &sources)
    }

    fn with_status(&self, pred: impl Fn(&ResolutionStatus) -> bool) -> Vec<&Entry> {
        self.resolutions
            .iter()
            .filter(|r| pred(&r.status))
            .map(|r| &r.entry)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::VenueKind;
    use crate::import::import;
    use crate::record_set::RecordSet;
    use crate::template::{MergeMode, TemplateKey};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn record(fields: &[(&str, &str)]) -> TemplateRecord {
        fields.iter().copied().collect()
    }

    fn store() -> TemplateStore {
        let mut store = TemplateStore::new();
        store.merge(
            [
                (
                    TemplateKey::proceedings("BigConf 2024", "2024"),
                    record(&[("month", "June")]),
                ),
                (
                    TemplateKey::journal("IEEE Access"),
                    record(&[("publisher", "IEEE"), ("issn", "2169-3536")]),
                ),
            ],
            MergeMode::Apply,
        );
        store
    }

    fn bigconf_entry() -> Entry {
        Entry::new("abc2024", "inproceedings")
            .with_field("venue", "BigConf 2024")
            .with_field("year", "2024")
            .with_field("title", "A Paper")
    }

    fn listed(fields: &[&str]) -> Config {
        let mut config = Config::new();
        config.set_required_fields(RequiredFields::listed(fields));
        config
    }

    #[test]
    fn test_bigconf_month_is_filled() {
        let store = store();
        let completer = Completer::new(&store, listed(&["month"])).unwrap();
        let resolution = completer.resolve(&bigconf_entry());

        assert_eq!(resolution.entry.field("month"), Some("June"));
        assert_eq!(resolution.added, vec!["month"]);
        assert!(resolution.conflicts.is_empty());
        assert_eq!(
            resolution.status,
            ResolutionStatus::Completed(VenueIdentity::new(
                "BigConf 2024",
                "2024",
                VenueKind::Proceedings
            ))
        );
    }

    #[rstest]
    #[case(Config::default())]
    #[case(listed(&["month"]))]
    fn test_bigconf_conflict_keeps_entry_value(#[case] config: Config) {
        let store = store();
        let completer = Completer::new(&store, config).unwrap();
        let entry = bigconf_entry().with_field("month", "May");
        let resolution = completer.resolve(&entry);

        assert_eq!(resolution.entry, entry);
        assert_eq!(
            resolution.conflicts,
            vec![ConflictRecord::new("abc2024", "month", "May", "June")]
        );
    }

    #[test]
    fn test_conflict_comparison_ignores_case_braces_and_whitespace() {
        let store = store();
        let completer = Completer::new(&store, Config::default()).unwrap();
        let entry = Entry::new("k", "article")
            .with_field("journal", "IEEE Access")
            .with_field("year", "2020")
            .with_field("publisher", "{ieee}  ");

        let resolution = completer.resolve(&entry);
        assert!(resolution.conflicts.is_empty());
        assert_eq!(resolution.entry.fields["publisher"], "{ieee}  ");
        assert_eq!(resolution.added, vec!["issn"]);
    }

    #[test]
    fn test_journal_fields_become_template_values() {
        let store = store();
        let completer = Completer::new(&store, listed(&["publisher", "issn", "address"])).unwrap();

        for year in ["2016", "2025"] {
            let entry = Entry::new(format!("j{year}"), "article")
                .with_field("journal", "{IEEE} Access")
                .with_field("year", year)
                .with_field("issn", "");
            let resolution = completer.resolve(&entry);

            assert_eq!(resolution.entry.field("publisher"), Some("IEEE"));
            assert_eq!(resolution.entry.field("issn"), Some("2169-3536"));
            assert_eq!(resolution.still_missing, vec!["address"]);
        }
    }

    #[test]
    fn test_template_mode_injects_every_template_field() {
        let store = store();
        let completer = Completer::new(&store, Config::default()).unwrap();
        let entry = Entry::new("k", "article")
            .with_field("journal", "IEEE Access")
            .with_field("year", "2020");

        let resolution = completer.resolve(&entry);
        assert_eq!(resolution.added, vec!["issn", "publisher"]);
        assert!(resolution.still_missing.is_empty());
    }

    #[test]
    fn test_satisfied_entry_is_not_a_missing_template() {
        let store = TemplateStore::new();
        let completer = Completer::new(&store, listed(&["month"])).unwrap();
        let entry = Entry::new("k", "inproceedings")
            .with_field("booktitle", "Unknown Workshop")
            .with_field("year", "2023")
            .with_field("month", "March");

        let report = completer.run(&[entry]);
        assert!(matches!(report.resolutions()[0].status, ResolutionStatus::Satisfied(_)));
        assert!(report.missing_identities().is_empty());
    }

    #[test]
    fn test_neurips_without_template_is_missing() {
        let store = store();
        let completer = Completer::new(&store, listed(&["month", "publisher"])).unwrap();
        let entry = Entry::new("n1", "inproceedings")
            .with_field("booktitle", "NeurIPS")
            .with_field("year", "2025");

        let resolution = completer.resolve(&entry);
        assert_eq!(resolution.entry, entry);
        assert_eq!(resolution.still_missing, vec!["month", "publisher"]);
        assert_eq!(
            resolution.status.unresolved_identity(),
            Some(&VenueIdentity::new("NeurIPS", "2025", VenueKind::Proceedings))
        );
    }

    #[rstest]
    #[case(&[("title", "No venue")])]
    #[case(&[("booktitle", "CVPR")])]
    #[case(&[("year", "2024")])]
    fn test_incomplete_entries_appear_only_as_incomplete(#[case] fields: &[(&str, &str)]) {
        let store = store();
        let completer = Completer::new(&store, Config::default()).unwrap();
        let mut entry = Entry::new("lost", "inproceedings");
        for (name, value) in fields {
            entry.set_field(name, *value);
        }

        let report = completer.run(std::slice::from_ref(&entry));
        assert_eq!(report.incomplete(), vec![&entry]);
        assert!(report.missing_identities().is_empty());
        assert!(report.patches().is_empty());
        assert!(report.conflicts().is_empty());
        assert!(report.filtered().is_empty());

        let aggregation = report.missing_templates();
        assert!(aggregation.templates.is_empty());
        assert_eq!(aggregation.incomplete, vec![entry]);
    }

    #[test]
    fn test_filtered_entry_types_pass_through() {
        let store = store();
        let completer = Completer::new(&store, Config::default()).unwrap();
        let entry = Entry::new("m", "misc")
            .with_field("journal", "IEEE Access")
            .with_field("year", "2020");

        let report = completer.run(std::slice::from_ref(&entry));
        assert_eq!(report.filtered(), vec!["m"]);
        assert_eq!(report.entries(), vec![&entry]);
        assert!(report.incomplete().is_empty());
    }

    #[test]
    fn test_second_run_is_idempotent() {
        let store = store();
        let completer = Completer::new(&store, Config::default()).unwrap();
        let entries = vec![
            bigconf_entry(),
            Entry::new("j", "article")
                .with_field("journal", "IEEE Access")
                .with_field("year", "2021")
                .with_field("publisher", "Wiley"),
        ];

        let first = completer.run(&entries);
        let completed = first.clone().into_entries();
        let second = completer.run(&completed);

        assert_eq!(second.into_entries(), completed);
        assert_eq!(first.conflicts().len(), 1);
        assert!(completer.run(&completed).patches().is_empty());
        assert_eq!(completer.run(&completed).conflicts(), first.conflicts());
    }

    #[test]
    fn test_missing_template_workflow_completes_next_run() {
        let mut store = store();
        let entries = vec![
            Entry::new("n1", "inproceedings")
                .with_field("booktitle", "NeurIPS")
                .with_field("year", "2025"),
            Entry::new("n2", "inproceedings")
                .with_field("booktitle", "NeurIPS")
                .with_field("year", "2025")
                .with_field("publisher", "Curran Associates, Inc."),
        ];

        let first = Completer::new(&store, Config::default()).unwrap().run(&entries);
        assert!(first.patches().is_empty());
        let missing = first.missing_templates().templates;
        assert_eq!(missing.len(), 1);

        // a reviewer fills the empty location placeholder
        let yaml = RecordSet::from_missing(&missing).to_yaml_string().unwrap();
        let edited: RecordSet = RecordSet::from_yaml_str(&yaml)
            .unwrap()
            .records()
            .cloned()
            .map(|mut record| {
                for (name, value) in &mut record.fields {
                    if name == "venue" {
                        value.value = "New Orleans, LA, USA".to_string();
                    }
                }
                record
            })
            .collect();

        let imported = import(&mut store, &edited, MergeMode::Apply);
        assert!(imported.rejected.is_empty());
        assert!(imported.merge.collisions.is_empty());
        assert_eq!(imported.merge.added, vec![TemplateKey::proceedings("NeurIPS", "2025")]);

        let second = Completer::new(&store, Config::default()).unwrap().run(&entries);
        assert!(second.conflicts().is_empty());
        assert!(second.missing_identities().is_empty());
        for entry in second.entries() {
            assert_eq!(entry.field("publisher"), Some("Curran Associates, Inc."));
            assert_eq!(entry.field("month"), Some("December"));
            assert_eq!(entry.field("venue"), Some("New Orleans, LA, USA"));
        }
        assert!(
            second
                .resolutions()
                .iter()
                .all(|r| matches!(r.status, ResolutionStatus::Completed(_)))
        );

        let third = Completer::new(&store, Config::default())
            .unwrap()
            .run(&second.clone().into_entries());
        assert!(third.patches().is_empty());
        assert!(third.conflicts().is_empty());
    }

    #[test]
    fn test_missing_identities_are_deduplicated() {
        let store = store();
        let completer = Completer::new(&store, Config::default()).unwrap();
        let entries = vec![
            Entry::new("a", "article")
                .with_field("journal", "Neural Networks")
                .with_field("year", "2020"),
            Entry::new("b", "article")
                .with_field("journal", "{Neural} Networks")
                .with_field("year", "2022"),
            Entry::new("c", "inproceedings")
                .with_field("booktitle", "ICLR")
                .with_field("year", "2024"),
            Entry::new("d", "inproceedings")
                .with_field("booktitle", "ICLR")
                .with_field("year", "2025"),
        ];

        let report = completer.run(&entries);
        let venues: Vec<(&str, &str)> = report
            .missing_identities()
            .iter()
            .map(|id| (id.venue.as_str(), id.year.as_str()))
            .collect();
        assert_eq!(venues, vec![("Neural Networks", "2020"), ("ICLR", "2024"), ("ICLR", "2025")]);
    }

    #[test]
    fn test_patches_list_added_fields() {
        let store = store();
        let completer = Completer::new(&store, Config::default()).unwrap();
        let report = completer.run(&[bigconf_entry()]);

        assert_eq!(
            report.patches(),
            vec![EntryPatch {
                key: "abc2024".to_string(),
                fields: vec![("month".to_string(), "June".to_string())],
            }]
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let store = store();
        let mut config = Config::new();
        config.set_entry_types(["inprocedings"]);
        assert!(Completer::new(&store, config).is_err());
    }

    #[test]
    fn test_conflict_row() {
        let conflict = ConflictRecord::new("abc2024", "month", "May", "June");
        assert_eq!(conflict.to_string(), "abc2024\tmonth\tEXISTING=May\tTEMPLATE=June");
    }
}
