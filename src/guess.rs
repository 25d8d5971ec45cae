//! Heuristic pre-fill suggestions from venue names.
//!
//! Guesses only ever land in the editable record set, marked as guessed. They
//! are never written into entries or into the template store.
//!
//! ```
//! use bibfill::VenueKind;
//! use bibfill::guess::Guesser;
//!
//! let venue = "2025 IEEE/CVF Conference on Computer Vision (CVPR)";
//! let guesses = Guesser::new().guess(venue, VenueKind::Proceedings);
//! assert_eq!(guesses.publisher.as_deref(), Some("IEEE"));
//! assert_eq!(guesses.month.as_deref(), Some("June"));
//! ```

use crate::classify::VenueKind;
use crate::regex::Regex;
use crate::template::TemplateStore;
use crate::utils::{is_issn, normalize_text, tokens};
use std::sync::LazyLock;

/// Venue keywords and the publisher they imply, in priority order.
const PUBLISHER_TABLE: &[(&str, &str)] = &[
    ("ieee", "IEEE"),
    ("acm", "Association for Computing Machinery"),
    ("springer", "Springer"),
    ("lecture notes", "Springer"),
    ("lncs", "Springer"),
    ("elsevier", "Elsevier"),
    ("aaai", "AAAI Press"),
    ("pmlr", "PMLR"),
    ("proceedings of machine learning research", "PMLR"),
    ("jmlr", "JMLR"),
    ("journal of machine learning research", "JMLR"),
    ("nature", "Springer Nature"),
    ("wiley", "Wiley"),
    ("mdpi", "MDPI"),
    ("oxford", "Oxford University Press"),
    ("cambridge", "Cambridge University Press"),
];

/// Conference acronyms and the month they are usually held in.
const CONFERENCE_MONTHS: &[(&str, &str)] = &[
    ("cvpr", "June"),
    ("iccv", "October"),
    ("eccv", "October"),
    ("neurips", "December"),
    ("nips", "December"),
    ("icml", "July"),
    ("iclr", "May"),
    ("aaai", "February"),
    ("ijcai", "August"),
    ("acl", "July"),
    ("emnlp", "November"),
    ("naacl", "June"),
    ("kdd", "August"),
    ("sigir", "July"),
    ("www", "May"),
    ("mm", "October"),
    ("interspeech", "September"),
    ("bmvc", "November"),
    ("wacv", "January"),
    ("miccai", "October"),
    ("coling", "October"),
];

const MONTHS: &[&str] = &[
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Minimum Jaro-Winkler similarity for a sibling journal to inform an ISSN hint.
pub const ISSN_HINT_SIMILARITY: f64 = 0.85;

static PUBLISHER_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    PUBLISHER_TABLE
        .iter()
        .map(|(keyword, publisher)| {
            let pattern = format!(r"(?i)\b{}\b", keyword.replace(' ', r"\s+"));
            (Regex::new(&pattern).unwrap(), *publisher)
        })
        .collect()
});

/// Suggestions for a venue. Absent guesses are `None`, never empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Guesses {
    pub publisher: Option<String>,
    /// Proceedings only
    pub month: Option<String>,
    /// Journals only; a format hint, not a value
    pub issn_hint: Option<String>,
}

impl Guesses {
    /// Guessed field values as `(field, value)`. The ISSN hint is not a value.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [("publisher", &self.publisher), ("month", &self.month)]
            .into_iter()
            .filter_map(|(name, value)| Some((name, value.as_deref()?)))
    }

    pub fn is_empty(&self) -> bool {
        self.publisher.is_none() && self.month.is_none() && self.issn_hint.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct KnownJournal {
    normalized: String,
    venue: String,
    issn: String,
}

/// Produces [`Guesses`] from venue text and a list of known sibling journals.
#[derive(Debug, Clone, Default)]
pub struct Guesser {
    known_journals: Vec<KnownJournal>,
}

impl Guesser {
    /// A guesser with no sibling journals; ISSN hints are never produced.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A guesser that knows the given `(journal, issn)` pairs.
    ///
    /// Pairs whose ISSN is not well formed are ignored.
    pub fn with_known_journals<I, V, S>(journals: I) -> Self
    where
        I: IntoIterator<Item = (V, S)>,
        V: Into<String>,
        S: AsRef<str>,
    {
        let known_journals = journals
            .into_iter()
            .filter(|(_, issn)| is_issn(issn.as_ref()))
            .map(|(venue, issn)| {
                let venue = venue.into();
                KnownJournal {
                    normalized: normalize_text(&venue),
                    venue,
                    issn: issn.as_ref().trim().to_string(),
                }
            })
            .collect();
        Self { known_journals }
    }

    /// A guesser that knows the journals of a template store.
    pub fn from_store(store: &TemplateStore) -> Self {
        Self::with_known_journals(
            store
                .journals()
                .filter_map(|(venue, record)| Some((venue, record.get("issn")?))),
        )
    }

    /// Guesses publisher, month and ISSN hint for a venue.
    ///
    /// Depends only on the arguments and the known journal list.
    pub fn guess(&self, venue: &str, kind: VenueKind) -> Guesses {
        Guesses {
            publisher: guess_publisher(venue).map(String::from),
            month: match kind {
                VenueKind::Proceedings => guess_month(venue).map(String::from),
                VenueKind::Journal => None,
            },
            issn_hint: match kind {
                VenueKind::Journal => self.issn_hint(venue),
                VenueKind::Proceedings => None,
            },
        }
    }

    fn issn_hint(&self, venue: &str) -> Option<String> {
        let normalized = normalize_text(venue);
        let (similarity, sibling) = self
            .known_journals
            .iter()
            .filter(|j| j.normalized != normalized)
            .map(|j| (strsim::jaro_winkler(&normalized, &j.normalized), j))
            .max_by(|a, b| a.0.total_cmp(&b.0))?;

        (similarity >= ISSN_HINT_SIMILARITY).then(|| {
            format!(
                "NNNN-NNNC (unverified; similar to \"{}\" with ISSN {})",
                sibling.venue, sibling.issn
            )
        })
    }
}

/// Infers a publisher from keywords in a venue name.
pub fn guess_publisher(venue: &str) -> Option<&'static str> {
    PUBLISHER_PATTERNS
        .iter()
        .find(|(regex, _)| regex.is_match(venue))
        .map(|(_, publisher)| *publisher)
}

/// Infers a conference month from a venue name.
///
/// A month named in the venue text wins over the conference table. Both match
/// whole words only, so `NAACL` is not read as `ACL`.
pub fn guess_month(venue: &str) -> Option<&'static str> {
    let words = tokens(venue);
    let has = |word: &str| words.iter().any(|w| w == word);

    MONTHS
        .iter()
        .find(|month| has(&month.to_lowercase()))
        .copied()
        .or_else(|| {
            CONFERENCE_MONTHS
                .iter()
                .find(|(acronym, _)| has(acronym))
                .map(|(_, month)| *month)
        })
}
