//! Configuration consumed by the completion engine.
//!
//! Every section has defaults, so a partial document deserializes cleanly
//! and `Config::default()` reproduces the stock behaviour.
//!
//! # Example
//!
//! ```
//! use bibfill::config::{Config, RequiredFields};
//!
//! let mut config = Config::new();
//! config
//!     .set_required_fields(RequiredFields::listed(["month", "publisher"]))
//!     .set_entry_types(["article", "inproceedings"]);
//! assert!(config.validate().is_ok());
//! ```

use crate::classify::VenueKind;
use crate::regex::RegexBuilder;
use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// Entry types completion and the missing-field check look at by default.
pub const DEFAULT_ENTRY_TYPES: &[&str] = &["inproceedings", "article", "proceedings", "conference"];

/// Fields every journal template is expected to carry.
pub const DEFAULT_JOURNAL_TEMPLATE_FIELDS: &[&str] = &["publisher", "issn"];

/// Fields every proceedings template is expected to carry.
pub const DEFAULT_PROCEEDINGS_TEMPLATE_FIELDS: &[&str] = &["venue", "publisher", "month"];

/// Fields offered for a missing journal template.
pub const DEFAULT_JOURNAL_DESIRED_FIELDS: &[&str] = &["publisher", "issn", "address"];

/// Fields offered for a missing proceedings template.
pub const DEFAULT_PROCEEDINGS_DESIRED_FIELDS: &[&str] = &[
    "venue",
    "publisher",
    "month",
    "isbn",
    "issn",
    "editor",
    "series",
    "address",
];

/// Extra fields required of proceedings templates whose venue matches a pattern.
const DEFAULT_VENUE_OVERRIDES: &[(&str, &[&str])] = &[
    (r"ECCV|European Conference on Computer Vision", &["series"]),
    (r"Lecture Notes in Computer Science|LNCS", &["series"]),
];

/// Entry types recognised by BibTeX and biblatex.
const KNOWN_ENTRY_TYPES: &[&str] = &[
    "article",
    "book",
    "booklet",
    "collection",
    "conference",
    "dataset",
    "inbook",
    "incollection",
    "inproceedings",
    "manual",
    "mastersthesis",
    "misc",
    "online",
    "patent",
    "periodical",
    "phdthesis",
    "proceedings",
    "report",
    "software",
    "techreport",
    "thesis",
    "unpublished",
];

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn normalize_names<I, S, C>(names: I) -> C
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    C: FromIterator<String>,
{
    names
        .into_iter()
        .map(|n| n.as_ref().trim().to_lowercase())
        .collect()
}

/// Entry types and field names are matched lowercased.
fn lowercase_names<'de, D, C>(deserializer: D) -> std::result::Result<C, D::Error>
where
    D: Deserializer<'de>,
    C: FromIterator<String>,
{
    Vec::<String>::deserialize(deserializer).map(normalize_names)
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub completion: CompletionConfig,
    pub classifier: ClassifierConfig,
    pub aggregate: AggregateConfig,
    pub templates: TemplateCheckConfig,
}

impl Config {
    /// Creates a configuration with default settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets which fields completion should fill in
    pub fn set_required_fields(&mut self, required: RequiredFields) -> &mut Self {
        self.completion.required_fields = required;
        self
    }

    /// Sets the entry types completion applies to
    pub fn set_entry_types<I, S>(&mut self, types: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.completion.entry_types = normalize_names(types);
        self
    }

    /// Sets the fields holding the venue name for one kind, in priority order
    pub fn set_venue_fields<I, S>(&mut self, kind: VenueKind, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields: Vec<String> = normalize_names(fields);
        match kind {
            VenueKind::Journal => self.classifier.journal_venue_fields = fields,
            VenueKind::Proceedings => self.classifier.proceedings_venue_fields = fields,
        }
        self
    }

    /// Sets the classification used for unrecognised entry types
    pub fn set_fallback_kind(&mut self, kind: VenueKind) -> &mut Self {
        self.classifier.fallback = kind;
        self
    }

    /// Checks the configuration for values that would make a run meaningless.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for unknown entry types, blank field names or
    /// venue override patterns that do not compile.
    pub fn validate(&self) -> Result<()> {
        let type_sets = [
            &self.completion.entry_types,
            &self.classifier.journal_types,
            &self.classifier.proceedings_types,
        ];
        for entry_type in type_sets.into_iter().flatten() {
            if !KNOWN_ENTRY_TYPES.contains(&entry_type.as_str()) {
                return Err(Error::Config(format!("unknown entry type '{}'", entry_type)));
            }
        }

        if let RequiredFields::Listed(fields) = &self.completion.required_fields {
            check_field_names("completion.required_fields", fields)?;
        }
        check_field_names("aggregate.journal_fields", &self.aggregate.journal_fields)?;
        check_field_names(
            "aggregate.proceedings_fields",
            &self.aggregate.proceedings_fields,
        )?;
        check_field_names("templates.journal_fields", &self.templates.journal_fields)?;
        check_field_names(
            "templates.proceedings_fields",
            &self.templates.proceedings_fields,
        )?;

        for rule in &self.templates.venue_overrides {
            rule.compile()?;
        }
        Ok(())
    }
}

fn check_field_names<'a>(
    section: &str,
    fields: impl IntoIterator<Item = &'a String>,
) -> Result<()> {
    if fields.into_iter().any(|f| f.trim().is_empty()) {
        return Err(Error::Config(format!("{} contains a blank field name", section)));
    }
    Ok(())
}

/// Which fields completion fills in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RequiredFieldsRepr", into = "RequiredFieldsRepr")]
pub enum RequiredFields {
    /// Every field the matching template defines.
    Template,
    /// Only the listed fields.
    Listed(BTreeSet<String>),
}

impl RequiredFields {
    /// Builds a [`RequiredFields::Listed`] from field names.
    pub fn listed<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        RequiredFields::Listed(normalize_names(fields))
    }
}

impl Default for RequiredFields {
    fn default() -> Self {
        RequiredFields::Template
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RequiredFieldsRepr {
    Keyword(String),
    List(Vec<String>),
}

impl TryFrom<RequiredFieldsRepr> for RequiredFields {
    type Error = String;

    fn try_from(repr: RequiredFieldsRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            RequiredFieldsRepr::Keyword(k) if k.trim().eq_ignore_ascii_case("template") => {
                Ok(RequiredFields::Template)
            }
            RequiredFieldsRepr::Keyword(k) => Err(format!(
                "required_fields must be \"template\" or a list of fields, got \"{}\"",
                k
            )),
            RequiredFieldsRepr::List(fields) => Ok(RequiredFields::listed(fields)),
        }
    }
}

impl From<RequiredFields> for RequiredFieldsRepr {
    fn from(required: RequiredFields) -> Self {
        match required {
            RequiredFields::Template => RequiredFieldsRepr::Keyword("template".to_string()),
            RequiredFields::Listed(fields) => {
                RequiredFieldsRepr::List(fields.into_iter().collect())
            }
        }
    }
}

/// Settings for the field resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Fields to fill in
    pub required_fields: RequiredFields,
    /// Entry types to complete; other entries pass through untouched
    #[serde(deserialize_with = "lowercase_names")]
    pub entry_types: BTreeSet<String>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            required_fields: RequiredFields::default(),
            entry_types: DEFAULT_ENTRY_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Settings for the entry classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Entry types always classified as journal entries
    #[serde(deserialize_with = "lowercase_names")]
    pub journal_types: BTreeSet<String>,
    /// Entry types always classified as proceedings entries
    #[serde(deserialize_with = "lowercase_names")]
    pub proceedings_types: BTreeSet<String>,
    /// Kind used when neither the type nor a `journal` field decides
    pub fallback: VenueKind,
    /// Fields holding the venue name of journal entries, in priority order
    #[serde(deserialize_with = "lowercase_names")]
    pub journal_venue_fields: Vec<String>,
    /// Fields holding the venue name of proceedings entries, in priority order
    #[serde(deserialize_with = "lowercase_names")]
    pub proceedings_venue_fields: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            journal_types: BTreeSet::from(["article".to_string()]),
            proceedings_types: ["inproceedings", "proceedings", "conference"]
                .into_iter()
                .map(String::from)
                .collect(),
            fallback: VenueKind::Proceedings,
            journal_venue_fields: to_strings(&["journal"]),
            proceedings_venue_fields: to_strings(&["booktitle", "venue"]),
        }
    }
}

/// Fields offered as pre-fill when a template is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateConfig {
    pub journal_fields: Vec<String>,
    pub proceedings_fields: Vec<String>,
}

impl AggregateConfig {
    /// Desired fields for a venue kind.
    pub fn fields_for(&self, kind: VenueKind) -> &[String] {
        match kind {
            VenueKind::Journal => &self.journal_fields,
            VenueKind::Proceedings => &self.proceedings_fields,
        }
    }
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            journal_fields: to_strings(DEFAULT_JOURNAL_DESIRED_FIELDS),
            proceedings_fields: to_strings(DEFAULT_PROCEEDINGS_DESIRED_FIELDS),
        }
    }
}

/// Settings for the template completeness check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateCheckConfig {
    pub journal_fields: Vec<String>,
    pub proceedings_fields: Vec<String>,
    pub venue_overrides: Vec<VenueOverride>,
}

impl Default for TemplateCheckConfig {
    fn default() -> Self {
        Self {
            journal_fields: to_strings(DEFAULT_JOURNAL_TEMPLATE_FIELDS),
            proceedings_fields: to_strings(DEFAULT_PROCEEDINGS_TEMPLATE_FIELDS),
            venue_overrides: DEFAULT_VENUE_OVERRIDES
                .iter()
                .map(|(pattern, fields)| VenueOverride {
                    pattern: pattern.to_string(),
                    fields: to_strings(fields),
                })
                .collect(),
        }
    }
}

/// Extra required fields for proceedings whose venue matches `pattern`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueOverride {
    /// Case-insensitive regular expression matched against the venue name
    pub pattern: String,
    pub fields: Vec<String>,
}

impl VenueOverride {
    pub(crate) fn compile(&self) -> Result<crate::regex::Regex> {
        RegexBuilder::new(&self.pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::Config(format!("invalid venue pattern '{}': {}", self.pattern, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.completion.required_fields, RequiredFields::Template);
        assert!(config.completion.entry_types.contains("inproceedings"));
        assert!(!config.completion.entry_types.contains("misc"));
        assert_eq!(config.classifier.fallback, VenueKind::Proceedings);
        assert_eq!(config.templates.journal_fields, vec!["publisher", "issn"]);
        assert_eq!(config.templates.venue_overrides.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_entry_type_is_rejected() {
        let mut config = Config::new();
        config.set_entry_types(["article", "jornal"]);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("jornal")));
    }

    #[test]
    fn test_invalid_override_pattern_is_rejected() {
        let mut config = Config::new();
        config.templates.venue_overrides.push(VenueOverride {
            pattern: "(unclosed".to_string(),
            fields: vec!["series".to_string()],
        });
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_blank_field_name_is_rejected() {
        let mut config = Config::new();
        config.aggregate.journal_fields.push("  ".to_string());
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_required_fields_from_json() {
        let template: RequiredFields = serde_json::from_str(r#""template""#).unwrap();
        assert_eq!(template, RequiredFields::Template);

        let listed: RequiredFields = serde_json::from_str(r#"["Month", "publisher"]"#).unwrap();
        assert_eq!(listed, RequiredFields::listed(["month", "publisher"]));

        assert!(serde_json::from_str::<RequiredFields>(r#""everything""#).is_err());
    }

    #[test]
    fn test_partial_config_document() {
        let config: Config = serde_json::from_str(
            r#"{
                "completion": { "required_fields": ["month"] },
                "classifier": { "fallback": "journal" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.completion.required_fields, RequiredFields::listed(["month"]));
        assert_eq!(config.completion.entry_types, CompletionConfig::default().entry_types);
        assert_eq!(config.classifier.fallback, VenueKind::Journal);
        assert_eq!(config.classifier.proceedings_venue_fields, vec!["booktitle", "venue"]);
    }

    #[test]
    fn test_venue_override_is_case_insensitive() {
        let rule = &TemplateCheckConfig::default().venue_overrides[0];
        let regex = rule.compile().unwrap();
        assert!(regex.is_match("Computer Vision -- eccv 2024"));
        assert!(!regex.is_match("CVPR 2024"));
    }

    #[test]
    fn test_venue_fields_are_lowercased() {
        let config: Config = serde_json::from_str(
            r#"{ "classifier": { "proceedings_venue_fields": ["Booktitle", " VENUE "] } }"#,
        )
        .unwrap();
        assert_eq!(config.classifier.proceedings_venue_fields, vec!["booktitle", "venue"]);

        let mut config = Config::new();
        config
            .set_venue_fields(VenueKind::Journal, ["Journal", "JournalTitle"])
            .set_fallback_kind(VenueKind::Journal);
        assert_eq!(config.classifier.journal_venue_fields, vec!["journal", "journaltitle"]);
        assert_eq!(config.classifier.fallback, VenueKind::Journal);
    }

    #[test]
    fn test_entry_types_from_document_are_lowercased() {
        let config: Config =
            serde_json::from_str(r#"{ "completion": { "entry_types": ["Article"] } }"#).unwrap();
        assert_eq!(config.completion.entry_types, BTreeSet::from(["article".to_string()]));
        assert!(config.validate().is_ok());
    }
}
