//! BibTeX reader and patch writer.
//!
//! The reader turns a `.bib` document into [`Entry`] values using the
//! `biblatex` crate. The patch writer
//! adds completed fields back into the original text without reformatting
//! anything else, so comments and layout survive a completion run.
//!
//! # Example
//!
//! ```
//! use bibfill::{BibTexParser, EntryParser};
//!
//! let input = r#"
//! @string{bc = "BigConf 2024"}
//! @inproceedings{abc2024,
//!   title     = {A Paper},
//!   booktitle = bc,
//!   year      = 2024,
//!   month     = jun,
//! }"#;
//!
//! let entries = BibTexParser::new().parse(input).unwrap();
//! assert_eq!(entries[0].field("booktitle"), Some("BigConf 2024"));
//! assert_eq!(entries[0].field("month"), Some("June"));
//! assert_eq!(entries[0].field("title"), Some("A Paper"));
//! ```

mod parse;
mod patch;

pub use patch::patch_bibtex;

use crate::{Entry, EntryParser, Result};
use std::collections::BTreeMap;

/// Parser for BibTeX documents.
///
/// Field values are flattened to plain text (protective braces removed).
/// `@string` definitions, `#` concatenation and the standard month macros
/// are resolved; `@comment` and `@preamble` blocks are skipped. A block that
/// fails to parse is skipped with a warning as long as other entries parse.
#[derive(Debug, Default, Clone)]
pub struct BibTexParser {
    macros: BTreeMap<String, String>,
}

impl BibTexParser {
    /// Creates a new BibTeX parser instance.
    ///
    /// # Examples
    ///
    /// ```
    /// use bibfill::BibTexParser;
    /// let parser = BibTexParser::new();
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Predefines a string macro, as if the document started with `@string`.
    ///
    /// The value must have balanced braces.
    #[must_use]
    pub fn with_macro(mut self, name: &str, value: &str) -> Self {
        self.macros
            .insert(name.trim().to_lowercase(), value.to_string());
        self
    }
}

impl EntryParser for BibTexParser {
    /// Parses BibTeX formatted text into entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`](crate::Error::Parse) with the line of the
    /// first broken block when no entry could be parsed.
    fn parse(&self, input: &str) -> Result<Vec<Entry>> {
        let entries = parse::bibtex_parse(input, &self.macros)?;
        tracing::debug!(entries = entries.len(), "parsed bibtex");
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_predefined_macro() {
        let parser = BibTexParser::new().with_macro(
            "TPAMI",
            "IEEE Transactions on Pattern Analysis and Machine Intelligence",
        );
        let entries = parser
            .parse("@article{k, journal = tpami, year = 2024}")
            .unwrap();
        assert_eq!(
            entries[0].field("journal"),
            Some("IEEE Transactions on Pattern Analysis and Machine Intelligence")
        );
    }

    #[test]
    fn test_broken_trailing_entry_is_skipped() {
        let input = "@article{ok, year = 2020}\n\n@article{bad,\n  title = {Unclosed\n";
        let entries = BibTexParser::new().parse(input).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "ok");
    }

    #[test]
    fn test_error_reports_line() {
        let input = "% refs\n\n\n@article{bad,\n  title = {Unclosed\n";
        let err = BibTexParser::new().parse(input).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 4, .. }), "{err}");
    }
}
