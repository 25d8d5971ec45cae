//! A library for completing BibTeX metadata from a venue/year template database.
//!
//! `bibfill` matches bibliography entries against a two-tier template store
//! (journals keyed by name, proceedings keyed by name and year), injects the
//! fields an entry is missing, and reports every disagreement between an
//! entry and its template instead of overwriting it.
//!
//! # Key Features
//!
//! - **Template completion**: Journal templates are year-agnostic, proceedings
//!   templates are per year (location, ISBN and month change every edition).
//! - **Conflict reporting**: Existing values always win; differences are listed.
//! - **Human-in-the-loop growth**: Venues without a template are collected into
//!   an editable YAML record set, pre-filled with guesses and values found on
//!   sibling entries. The edited set is imported back into the store.
//! - **Checks**: Missing-field reports for entries and completeness reports for
//!   the template store itself.
//!
//! # Features
//!
//! - `bibtex` - BibTeX reader and comment-preserving patch writer (enabled by default)
//! - `regex` - Use the `regex` crate (enabled by default)
//! - `lite` - Use `regex-lite` instead of `regex`
//!
//! # Basic Usage
//!
//! ```rust
//! use bibfill::{Completer, Config, Entry, TemplateKey, TemplateRecord, TemplateStore, MergeMode};
//!
//! let mut store = TemplateStore::new();
//! let record = TemplateRecord::from_iter([("month", "June")]);
//! store.merge([(TemplateKey::proceedings("BigConf 2024", "2024"), record)], MergeMode::Apply);
//!
//! let entry = Entry::new("abc2024", "inproceedings")
//!     .with_field("venue", "BigConf 2024")
//!     .with_field("year", "2024")
//!     .with_field("title", "A Paper");
//!
//! let completer = Completer::new(&store, Config::default()).unwrap();
//! let report = completer.run(&[entry]);
//! assert_eq!(report.entries()[0].field("month"), Some("June"));
//! assert!(report.conflicts().is_empty());
//! ```
//!
//! # The Template Workflow
//!
//! 1. Run a [`Completer`] over the bibliography.
//! 2. Write [`CompletionReport::missing_templates`] out as a
//!    [`RecordSet`](record_set::RecordSet) and let a human fill it in.
//! 3. [`import`](import::import) the edited set into the [`TemplateStore`] and save it.
//! 4. Run the completer again.
//!
//! # Error Handling
//!
//! Per-entry and per-record problems are collected into reports. Only failures
//! that make the whole run meaningless (an unreadable store, an unparseable
//! document, invalid configuration) surface as [`Error`]:
//!
//! ```rust
//! use bibfill::{Error, TemplateStore};
//!
//! match TemplateStore::from_json_str("not json") {
//!     Ok(_) => unreachable!(),
//!     Err(Error::Store(msg)) => eprintln!("corrupt store: {}", msg),
//!     Err(e) => eprintln!("other error: {}", e),
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub mod aggregate;
#[cfg(feature = "bibtex")]
pub mod bibtex;
pub mod check;
pub mod classify;
pub mod config;
pub mod guess;
pub mod import;
pub mod record_set;
mod regex;
pub mod report;
pub mod resolve;
pub mod template;
mod utils;

// Reexports
pub use aggregate::{Aggregator, MissingTemplateRecord};
#[cfg(feature = "bibtex")]
pub use bibtex::BibTexParser;
pub use classify::{Classifier, VenueIdentity, VenueKind};
pub use config::Config;
pub use resolve::{Completer, CompletionReport, ConflictRecord, Resolution, ResolutionStatus};
pub use template::{MergeMode, MergeReport, TemplateKey, TemplateRecord, TemplateStore};

/// A specialized Result type for completion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a run.
///
/// Per-entry outcomes (missing templates, conflicts, incomplete entries) and
/// per-record import rejections are never reported through this type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template store error: {0}")]
    Store(String),

    #[error("Record set error: {0}")]
    RecordSet(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {message} at line {line}")]
    Parse { message: String, line: usize },
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Store(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::RecordSet(err.to_string())
    }
}

/// A single bibliography entry.
///
/// Field names are stored lowercased. Values read by
/// [`BibTexParser`](bibtex::BibTexParser) are plain text; the source file is
/// only ever patched, never regenerated from entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Citation key
    pub key: String,
    /// Raw type tag, lowercased (`article`, `inproceedings`, ...)
    pub entry_type: String,
    /// Field name to value
    pub fields: BTreeMap<String, String>,
}

impl Entry {
    /// Creates an entry with no fields.
    ///
    /// # Examples
    ///
    /// ```
    /// use bibfill::Entry;
    /// let entry = Entry::new("smith2024", "Article");
    /// assert_eq!(entry.entry_type, "article");
    /// ```
    #[must_use]
    pub fn new(key: impl Into<String>, entry_type: impl AsRef<str>) -> Self {
        Self {
            key: key.into(),
            entry_type: entry_type.as_ref().trim().to_lowercase(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter.
    #[must_use]
    pub fn with_field(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.set_field(name, value);
        self
    }

    /// Sets a field, replacing any previous value.
    pub fn set_field(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.fields
            .insert(name.as_ref().trim().to_lowercase(), value.into());
    }

    /// Returns the trimmed value of a field if it is filled (non-empty).
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Returns true if the field carries a non-empty value.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}

/// Trait for implementing bibliography parsers.
pub trait EntryParser {
    /// Parse a string containing zero or more entries.
    ///
    /// # Arguments
    ///
    /// * `input` - The string containing bibliography data
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the input is malformed
    fn parse(&self, input: &str) -> Result<Vec<Entry>>;
}
