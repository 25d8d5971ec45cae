//! Line-oriented report output.
//!
//! Reports are appended line by line to a [`ReportSink`]. Rows are
//! tab-separated so they can be grepped and diffed:
//!
//! | Report             | Row                                           |
//! |--------------------|-----------------------------------------------|
//! | conflicts          | `key  field  EXISTING=..  TEMPLATE=..`        |
//! | incomplete entries | `key  venue=..  year=..` (`(empty)` if blank) |
//! | missing templates  | `venue  year  kind`                           |
//!
//! ```
//! use bibfill::ConflictRecord;
//! use bibfill::report::write_conflicts;
//!
//! let conflict = ConflictRecord::new("abc2024", "month", "May", "June");
//! let mut lines: Vec<String> = Vec::new();
//! write_conflicts(&mut lines, [&conflict]).unwrap();
//! assert_eq!(lines, vec!["abc2024\tmonth\tEXISTING=May\tTEMPLATE=June"]);
//! ```

use crate::Entry;
use crate::Result;
use crate::aggregate::MissingTemplateRecord;
use crate::check::MissingFieldsReport;
use crate::config::ClassifierConfig;
use crate::import::ImportReport;
use crate::resolve::ConflictRecord;
use crate::template::CompletenessReport;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const EMPTY: &str = "(empty)";

/// An append-only destination for report lines.
pub trait ReportSink {
    /// Appends one line; the sink adds the line terminator.
    fn append_line(&mut self, line: &str) -> Result<()>;
}

impl ReportSink for Vec<String> {
    fn append_line(&mut self, line: &str) -> Result<()> {
        self.push(line.to_string());
        Ok(())
    }
}

/// A report file that starts with a header line.
#[derive(Debug)]
pub struct FileReport {
    path: PathBuf,
    writer: BufWriter<File>,
    lines: usize,
}

impl FileReport {
    /// Creates (or truncates) the file and writes `header` as its first line.
    pub fn create(path: impl AsRef<Path>, header: &str) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut writer = BufWriter::new(File::create(&path)?);
        writeln!(writer, "{}", header)?;
        Ok(Self {
            path,
            writer,
            lines: 0,
        })
    }

    /// Number of lines appended after the header.
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Flushes the file.
    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        tracing::info!(path = %self.path.display(), lines = self.lines, "wrote report");
        Ok(())
    }
}

impl ReportSink for FileReport {
    fn append_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{}", line)?;
        self.lines += 1;
        Ok(())
    }
}

fn or_empty(value: Option<&str>) -> &str {
    value.unwrap_or(EMPTY)
}

/// Writes one row per conflict. Returns the number of rows.
pub fn write_conflicts<'a, I>(sink: &mut impl ReportSink, conflicts: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a ConflictRecord>,
{
    let mut rows = 0;
    for conflict in conflicts {
        sink.append_line(&conflict.to_string())?;
        rows += 1;
    }
    Ok(rows)
}

/// Writes one row per entry without a venue identity.
///
/// The venue column shows the first filled venue field the classifier
/// would have read.
pub fn write_incomplete<'a, I>(
    sink: &mut impl ReportSink,
    entries: I,
    classifier: &ClassifierConfig,
) -> Result<usize>
where
    I: IntoIterator<Item = &'a Entry>,
{
    let mut rows = 0;
    for entry in entries {
        let venue = classifier
            .proceedings_venue_fields
            .iter()
            .chain(&classifier.journal_venue_fields)
            .find_map(|name| entry.field(name));
        sink.append_line(&format!(
            "{}\tvenue={}\tyear={}",
            entry.key,
            or_empty(venue),
            or_empty(entry.field("year"))
        ))?;
        rows += 1;
    }
    Ok(rows)
}

/// Writes one row per missing template.
pub fn write_missing_templates(
    sink: &mut impl ReportSink,
    templates: &[MissingTemplateRecord],
) -> Result<usize> {
    for template in templates {
        let id = &template.identity;
        sink.append_line(&format!("{}\t{}\t{}", id.venue, id.year, id.kind))?;
    }
    Ok(templates.len())
}

/// Writes the rows and per-field summary of a missing-field check.
pub fn write_missing_fields(
    sink: &mut impl ReportSink,
    report: &MissingFieldsReport,
) -> Result<()> {
    for row in &report.rows {
        sink.append_line(&row.to_string())?;
    }
    if report.is_clean() {
        sink.append_line(&format!(
            "All {} checked entries have the required fields.",
            report.checked
        ))?;
    } else {
        sink.append_line(&format!(
            "{} of {} entries miss fields: {}",
            report.rows.len(),
            report.checked,
            summary(&report.field_counts)
        ))?;
    }
    Ok(())
}

/// Writes the gaps found by a template completeness check.
pub fn write_completeness(sink: &mut impl ReportSink, report: &CompletenessReport) -> Result<()> {
    for gap in &report.journals {
        sink.append_line(&format!("journal\t{}\tmissing={}", gap.venue, gap.missing.join(",")))?;
    }
    for gap in &report.proceedings {
        sink.append_line(&format!(
            "proceedings\t{}\t{}\tmissing={}",
            gap.venue,
            gap.year,
            gap.missing.join(",")
        ))?;
    }
    sink.append_line(&format!(
        "journals: {} of {} incomplete ({})",
        report.journals.len(),
        report.journal_total,
        summary(&report.journal_field_counts)
    ))?;
    sink.append_line(&format!(
        "proceedings: {} of {} incomplete ({})",
        report.proceedings.len(),
        report.proceedings_total,
        summary(&report.proceedings_field_counts)
    ))?;
    Ok(())
}

/// Writes rejected records and merge collisions of an import.
pub fn write_import(sink: &mut impl ReportSink, report: &ImportReport) -> Result<()> {
    for rejected in &report.rejected {
        sink.append_line(&format!(
            "REJECTED\t#{}\tvenue={}\tyear={}\tkind={}\t{}",
            rejected.index,
            or_empty(Some(rejected.venue.as_str()).filter(|v| !v.is_empty())),
            or_empty(Some(rejected.year.as_str()).filter(|v| !v.is_empty())),
            or_empty(rejected.kind.as_deref()),
            rejected.error
        ))?;
    }
    for collision in &report.merge.collisions {
        sink.append_line(&format!("COLLISION\t{}", collision))?;
    }
    sink.append_line(&format!(
        "{:?}: {} added, {} updated, {} unchanged, {} rejected",
        report.merge.mode,
        report.merge.added.len(),
        report.merge.updated.len(),
        report.merge.unchanged.len(),
        report.rejected.len()
    ))?;
    Ok(())
}

fn summary(counts: &[(String, usize)]) -> String {
    counts
        .iter()
        .map(|(field, count)| format!("{}: {}", field, count))
        .collect::<Vec<_>>()
        .join("; ")
}
