//! BibTeX reading on top of `biblatex`.
//!
//! The whole document is parsed first. If that fails, the text is split into
//! blocks at every `@` that starts a line and each block is parsed on its own,
//! so one broken entry does not hide the rest of the file.

use crate::regex::Regex;
use crate::{Entry, Error, Result};
use biblatex::{Bibliography, Chunk, Spanned};
use std::collections::BTreeMap;
use std::sync::LazyLock;

const MONTH_MACROS: &[(&str, &str)] = &[
    ("jan", "January"),
    ("feb", "February"),
    ("mar", "March"),
    ("apr", "April"),
    ("may", "May"),
    ("jun", "June"),
    ("jul", "July"),
    ("aug", "August"),
    ("sep", "September"),
    ("oct", "October"),
    ("nov", "November"),
    ("dec", "December"),
];

static BLOCK_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ \t]*@").unwrap());

static STRING_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*@\s*string\s*[{(]").unwrap());

/// Parses a BibTeX document. `macros` are predefined `@string` values.
pub(crate) fn bibtex_parse(text: &str, macros: &BTreeMap<String, String>) -> Result<Vec<Entry>> {
    let prelude = string_prelude(macros);
    match Bibliography::parse(&format!("{}{}", prelude, text)) {
        Ok(bibliography) => Ok(bibliography.iter().map(to_entry).collect()),
        Err(err) => {
            tracing::debug!(error = %err, "document did not parse as a whole, parsing by block");
            parse_blocks(text, prelude)
        }
    }
}

/// `@string` definitions for the month macros followed by `macros`.
fn string_prelude(macros: &BTreeMap<String, String>) -> String {
    MONTH_MACROS
        .iter()
        .map(|(name, month)| (*name, *month))
        .chain(macros.iter().map(|(name, value)| (name.as_str(), value.as_str())))
        .map(|(name, value)| format!("@string{{{} = {{{}}}}}\n", name, value))
        .collect()
}

fn parse_blocks(text: &str, mut prelude: String) -> Result<Vec<Entry>> {
    let starts: Vec<usize> = BLOCK_START.find_iter(text).map(|m| m.start()).collect();
    let blocks: Vec<(usize, &str)> = starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = starts.get(i + 1).copied().unwrap_or(text.len());
            (start, &text[start..end])
        })
        .collect();

    // usable macro definitions apply to every entry block
    for (_, block) in blocks.iter().filter(|(_, b)| STRING_BLOCK.is_match(b)) {
        let candidate = format!("{}{}\n", prelude, block);
        if Bibliography::parse(&candidate).is_ok() {
            prelude = candidate;
        }
    }

    let mut entries = Vec::new();
    let mut first_error = None;
    for (start, block) in blocks.iter().filter(|(_, b)| !STRING_BLOCK.is_match(b)) {
        match Bibliography::parse(&format!("{}{}", prelude, block)) {
            Ok(bibliography) => entries.extend(bibliography.iter().map(to_entry)),
            Err(err) => {
                let line = line_of(text, *start);
                tracing::warn!(line, error = %err, "skipping unparseable bibtex block");
                first_error.get_or_insert(Error::Parse {
                    message: err.to_string(),
                    line,
                });
            }
        }
    }

    match first_error {
        Some(err) if entries.is_empty() => Err(err),
        _ => Ok(entries),
    }
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

fn to_entry(entry: &biblatex::Entry) -> Entry {
    let mut converted = Entry::new(entry.key.clone(), entry.entry_type.to_string());
    for (name, chunks) in &entry.fields {
        converted
            .fields
            .entry(name.to_lowercase())
            .or_insert_with(|| chunks_to_string(chunks));
    }
    converted
}

fn chunks_to_string(chunks: &[Spanned<Chunk>]) -> String {
    chunks
        .iter()
        .map(|c| match &c.v {
            Chunk::Normal(s) | Chunk::Verbatim(s) | Chunk::Math(s) => s.as_str(),
        })
        .collect()
}
