//! JSON persistence for the template store.
//!
//! The document keeps the two tiers apart:
//!
//! ```json
//! {
//!   "journals": { "IEEE Access": { "issn": "2169-3536", "publisher": "IEEE" } },
//!   "proceedings": [
//!     { "venue": "ICLR", "year": "2025", "fields": { "address": "Singapore" } }
//!   ]
//! }
//! ```
//!
//! Values are strings and round-trip exactly. Journals are written sorted by
//! name, proceedings by year (newest first) and then venue, so saved stores
//! produce stable diffs.

use super::{TemplateKey, TemplateRecord, TemplateStore};
use crate::utils::year_value;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoreDocument {
    #[serde(default)]
    journals: BTreeMap<String, TemplateRecord>,
    #[serde(default)]
    proceedings: Vec<ProceedingsDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProceedingsDocument {
    venue: String,
    year: String,
    #[serde(default)]
    fields: TemplateRecord,
}

impl TemplateStore {
    /// Parses a store from its JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the document is not valid JSON, carries
    /// non-string values, or stores two templates under the same key.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: StoreDocument = serde_json::from_str(json)?;

        let mut store = TemplateStore::new();
        let journals = document
            .journals
            .into_iter()
            .map(|(venue, fields)| (TemplateKey::journal(venue), fields));
        let proceedings = document
            .proceedings
            .into_iter()
            .map(|p| (TemplateKey::proceedings(p.venue, p.year), p.fields));

        for (key, fields) in journals.chain(proceedings) {
            if store.contains(&key) {
                return Err(Error::Store(format!("duplicate template key {}", key)));
            }
            store.insert(key, fields);
        }
        Ok(store)
    }

    /// Serializes the store to a pretty-printed JSON document.
    pub fn to_json_string(&self) -> Result<String> {
        let journals = self
            .journals()
            .map(|(venue, record)| (venue.to_string(), record.clone()))
            .collect();

        let mut proceedings: Vec<ProceedingsDocument> = self
            .proceedings()
            .map(|(venue, year, record)| ProceedingsDocument {
                venue: venue.to_string(),
                year: year.to_string(),
                fields: record.clone(),
            })
            .collect();
        proceedings.sort_by(|a, b| {
            year_value(&b.year)
                .cmp(&year_value(&a.year))
                .then_with(|| a.venue.cmp(&b.venue))
        });

        let document = StoreDocument {
            journals,
            proceedings,
        };
        let mut json = serde_json::to_string_pretty(&document)?;
        json.push('\n');
        Ok(json)
    }

    /// Loads a store from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Store`]
    /// if it is corrupt.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let store = Self::from_json_str(&json).map_err(|e| match e {
            Error::Store(msg) => Error::Store(format!("{}: {}", path.display(), msg)),
            other => other,
        })?;

        tracing::info!(
            path = %path.display(),
            journals = store.journals().count(),
            proceedings = store.proceedings().count(),
            "loaded template store"
        );
        Ok(store)
    }

    /// Loads a store, treating a missing file as an empty store.
    ///
    /// Any other failure (permissions, corrupt content) is still an error.
    pub fn open_or_empty(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        match fs::metadata(path) {
            Ok(_) => Self::load(path),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "template store not found, starting empty");
                Ok(Self::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the store to a JSON file.
    ///
    /// An existing file is first copied to `<name>.bak`. The new content is
    /// written to a sibling temporary file that is then renamed over the
    /// target, so readers never observe a partial write.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json_string()?;

        if path.exists() {
            fs::copy(path, sibling_path(path, "bak")?)?;
        }
        let tmp = sibling_path(path, "tmp")?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;

        tracing::info!(path = %path.display(), templates = self.len(), "saved template store");
        Ok(())
    }
}

/// `dir/name.json` -> `dir/name.json.<suffix>`
fn sibling_path(path: &Path, suffix: &str) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| Error::Store(format!("'{}' is not a file path", path.display())))?;
    let mut sibling = OsString::from(name);
    sibling.push(".");
    sibling.push(suffix);
    Ok(path.with_file_name(sibling))
}
