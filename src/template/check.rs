use super::TemplateStore;
use crate::Result;
use crate::config::TemplateCheckConfig;
use crate::utils::year_value;
use itertools::Itertools;

/// A journal template lacking configured fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalGap {
    pub venue: String,
    pub missing: Vec<String>,
}

/// A proceedings template lacking configured or venue-specific fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProceedingsGap {
    pub venue: String,
    pub year: String,
    pub missing: Vec<String>,
}

/// Result of [`TemplateStore::check_completeness`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompletenessReport {
    pub journal_total: usize,
    pub proceedings_total: usize,
    pub journals: Vec<JournalGap>,
    /// Ordered by year (newest first), then venue
    pub proceedings: Vec<ProceedingsGap>,
    /// `(field, templates missing it)` for the configured journal fields
    pub journal_field_counts: Vec<(String, usize)>,
    /// `(field, templates missing it)` for the configured proceedings fields
    pub proceedings_field_counts: Vec<(String, usize)>,
}

impl CompletenessReport {
    pub fn is_complete(&self) -> bool {
        self.journals.is_empty() && self.proceedings.is_empty()
    }
}

impl TemplateStore {
    /// Reports which templates lack the fields every template of their tier
    /// is expected to carry.
    ///
    /// Proceedings whose venue matches a venue override must also carry the
    /// override's fields. A field counts as missing when it is absent or blank.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if an override pattern
    /// does not compile.
    pub fn check_completeness(&self, config: &TemplateCheckConfig) -> Result<CompletenessReport> {
        let overrides = config
            .venue_overrides
            .iter()
            .map(|rule| Ok((rule.compile()?, &rule.fields)))
            .collect::<Result<Vec<_>>>()?;

        let mut report = CompletenessReport::default();

        for (venue, record) in self.journals() {
            report.journal_total += 1;
            let missing: Vec<String> = config
                .journal_fields
                .iter()
                .filter(|f| record.get(f).is_none())
                .cloned()
                .collect();
            if !missing.is_empty() {
                report.journals.push(JournalGap {
                    venue: venue.to_string(),
                    missing,
                });
            }
        }

        for (venue, year, record) in self.proceedings() {
            report.proceedings_total += 1;
            let extra = overrides
                .iter()
                .filter(|(regex, _)| regex.is_match(venue))
                .flat_map(|(_, fields)| fields.iter());
            let missing: Vec<String> = config
                .proceedings_fields
                .iter()
                .chain(extra)
                .unique()
                .filter(|f| record.get(f).is_none())
                .cloned()
                .collect();
            if !missing.is_empty() {
                report.proceedings.push(ProceedingsGap {
                    venue: venue.to_string(),
                    year: year.to_string(),
                    missing,
                });
            }
        }
        report.proceedings.sort_by(|a, b| {
            year_value(&b.year)
                .cmp(&year_value(&a.year))
                .then_with(|| a.venue.cmp(&b.venue))
        });

        report.journal_field_counts =
            field_counts(&config.journal_fields, &report.journals, |g| &g.missing);
        report.proceedings_field_counts =
            field_counts(&config.proceedings_fields, &report.proceedings, |g| &g.missing);

        tracing::info!(
            journals = report.journal_total,
            incomplete_journals = report.journals.len(),
            proceedings = report.proceedings_total,
            incomplete_proceedings = report.proceedings.len(),
            "template completeness check"
        );
        Ok(report)
    }
}

fn field_counts<T>(
    fields: &[String],
    gaps: &[T],
    missing: impl Fn(&T) -> &Vec<String>,
) -> Vec<(String, usize)> {
    fields
        .iter()
        .map(|field| {
            let count = gaps.iter().filter(|g| missing(g).contains(field)).count();
            (field.clone(), count)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VenueOverride;
    use crate::template::{TemplateKey, TemplateRecord};
    use pretty_assertions::assert_eq;

    fn record(fields: &[(&str, &str)]) -> TemplateRecord {
        fields.iter().copied().collect()
    }

    fn store() -> TemplateStore {
        let mut store = TemplateStore::new();
        store.insert(
            TemplateKey::journal("IEEE Access"),
            record(&[("publisher", "IEEE"), ("issn", "2169-3536")]),
        );
        store.insert(
            TemplateKey::journal("Pattern Recognition"),
            record(&[("publisher", "Elsevier")]),
        );
        store.insert(
            TemplateKey::proceedings("CVPR", "2025"),
            record(&[("venue", "Nashville, TN"), ("publisher", "IEEE"), ("month", "June")]),
        );
        store.insert(
            TemplateKey::proceedings("European Conference on Computer Vision (ECCV)", "2024"),
            record(&[("venue", "Milan, Italy"), ("publisher", "Springer"), ("month", "  ")]),
        );
        store.insert(TemplateKey::proceedings("ICLR", "2025"), record(&[("venue", "Singapore")]));
        store
    }

    #[test]
    fn test_completeness_report() {
        let report = store()
            .check_completeness(&TemplateCheckConfig::default())
            .unwrap();

        assert_eq!(report.journal_total, 2);
        assert_eq!(report.proceedings_total, 3);
        assert_eq!(
            report.journals,
            vec![JournalGap {
                venue: "Pattern Recognition".to_string(),
                missing: vec!["issn".to_string()],
            }]
        );
        assert_eq!(
            report.proceedings,
            vec![
                ProceedingsGap {
                    venue: "ICLR".to_string(),
                    year: "2025".to_string(),
                    missing: vec!["publisher".to_string(), "month".to_string()],
                },
                ProceedingsGap {
                    venue: "European Conference on Computer Vision (ECCV)".to_string(),
                    year: "2024".to_string(),
                    missing: vec!["month".to_string(), "series".to_string()],
                },
            ]
        );
        assert_eq!(
            report.proceedings_field_counts,
            vec![
                ("venue".to_string(), 0),
                ("publisher".to_string(), 1),
                ("month".to_string(), 2),
            ]
        );
        assert!(!report.is_complete());
    }

    #[test]
    fn test_override_fields_are_not_duplicated() {
        let mut config = TemplateCheckConfig::default();
        config.venue_overrides = vec![VenueOverride {
            pattern: "iclr".to_string(),
            fields: vec!["month".to_string(), "isbn".to_string()],
        }];

        let report = store().check_completeness(&config).unwrap();
        let iclr = report.proceedings.iter().find(|g| g.venue == "ICLR").unwrap();
        assert_eq!(iclr.missing, vec!["publisher", "month", "isbn"]);
    }

    #[test]
    fn test_empty_store_is_complete() {
        let report = TemplateStore::new()
            .check_completeness(&TemplateCheckConfig::default())
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(
            report.journal_field_counts,
            vec![("publisher".to_string(), 0), ("issn".to_string(), 0)]
        );
    }
}
