//! Entry classification and venue identity extraction.
//!
//! Every entry that takes part in completion is either a *journal* entry,
//! matched against the year-agnostic journal tier, or a *proceedings* entry,
//! matched against the per-year proceedings tier.
//!
//! # Decision Order
//!
//! 1. The entry type is one of the configured journal types → journal
//! 2. The entry type is one of the configured proceedings types → proceedings
//! 3. The entry carries a non-empty `journal` field → journal
//! 4. Otherwise the configured fallback (proceedings by default)
//!
//! The fallback means `misc` and other unknown types are treated as
//! proceedings unless the caller filters them out first or changes the
//! fallback.
//!
//! # Example
//!
//! ```
//! use bibfill::{Classifier, Entry, VenueKind};
//! use bibfill::config::ClassifierConfig;
//!
//! let classifier = Classifier::new(ClassifierConfig::default());
//! let entry = Entry::new("k", "inproceedings")
//!     .with_field("booktitle", "Interspeech 2025")
//!     .with_field("year", "2025");
//!
//! let identity = classifier.identify(&entry).unwrap();
//! assert_eq!(identity.kind, VenueKind::Proceedings);
//! assert_eq!(identity.venue, "Interspeech 2025");
//! ```

use crate::config::ClassifierConfig;
use crate::template::TemplateKey;
use crate::{Entry, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of venue an entry was published in.
///
/// Ordered so that journals sort before proceedings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueKind {
    Journal,
    Proceedings,
}

impl VenueKind {
    /// Returns the lowercase name used in reports and record sets.
    pub fn as_str(&self) -> &'static str {
        match self {
            VenueKind::Journal => "journal",
            VenueKind::Proceedings => "proceedings",
        }
    }
}

impl fmt::Display for VenueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VenueKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "journal" => Ok(VenueKind::Journal),
            "proceedings" => Ok(VenueKind::Proceedings),
            other => Err(Error::Config(format!("unknown venue kind '{}'", other))),
        }
    }
}

/// The `(venue, year, kind)` identity of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VenueIdentity {
    /// Raw venue string as found on the entry (trimmed)
    pub venue: String,
    /// Raw year string (trimmed)
    pub year: String,
    /// Classified kind
    pub kind: VenueKind,
}

impl VenueIdentity {
    pub fn new(venue: impl Into<String>, year: impl Into<String>, kind: VenueKind) -> Self {
        Self {
            venue: venue.into(),
            year: year.into(),
            kind,
        }
    }

    /// The key this identity is looked up under in its template tier.
    ///
    /// Journal keys drop the year.
    pub fn template_key(&self) -> TemplateKey {
        match self.kind {
            VenueKind::Journal => TemplateKey::journal(&self.venue),
            VenueKind::Proceedings => TemplateKey::proceedings(&self.venue, &self.year),
        }
    }
}

impl fmt::Display for VenueIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] venue='{}' year='{}'", self.kind, self.venue, self.year)
    }
}

/// Classifies entries and extracts their venue identity.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    #[must_use]
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Determines whether an entry is a journal or a proceedings entry.
    pub fn classify(&self, entry: &Entry) -> VenueKind {
        let entry_type = entry.entry_type.as_str();
        if self.config.journal_types.contains(entry_type) {
            return VenueKind::Journal;
        }
        if self.config.proceedings_types.contains(entry_type) {
            return VenueKind::Proceedings;
        }
        if entry.has_field("journal") {
            return VenueKind::Journal;
        }
        self.config.fallback
    }

    /// Classifies an entry and extracts its identity.
    ///
    /// Returns `None` when the entry lacks a venue or a year.
    pub fn identify(&self, entry: &Entry) -> Option<VenueIdentity> {
        self.extract_identity(entry, self.classify(entry))
    }

    /// Extracts the identity of an entry for an already known kind.
    ///
    /// The venue is read from the kind's own venue fields first, then from the
    /// other kind's fields.
    pub fn extract_identity(&self, entry: &Entry, kind: VenueKind) -> Option<VenueIdentity> {
        let (primary, secondary) = match kind {
            VenueKind::Journal => (
                &self.config.journal_venue_fields,
                &self.config.proceedings_venue_fields,
            ),
            VenueKind::Proceedings => (
                &self.config.proceedings_venue_fields,
                &self.config.journal_venue_fields,
            ),
        };

        let venue = primary
            .iter()
            .chain(secondary.iter())
            .find_map(|name| entry.field(name))?;
        let year = entry.field("year")?;

        Some(VenueIdentity::new(venue, year, kind))
    }
}
