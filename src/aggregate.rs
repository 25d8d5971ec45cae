//! Collects identities without a template into pre-filled records.

use crate::Entry;
use crate::classify::{Classifier, VenueIdentity, VenueKind};
use crate::config::AggregateConfig;
use crate::guess::{Guesser, Guesses};
use crate::template::{NormalizedKey, TemplateStore};
use crate::utils::{clean_value, normalize_text, values_match};
use std::collections::{BTreeMap, HashMap, HashSet};

/// A venue that needs a template, with suggestions for its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTemplateRecord {
    pub identity: VenueIdentity,
    /// Heuristic suggestions from the venue name
    pub guessed: Guesses,
    /// Values found on entries sharing the template key, first non-empty wins
    pub sourced: BTreeMap<String, String>,
    /// Fields a template of this kind should define
    pub desired: Vec<String>,
}

impl MissingTemplateRecord {
    pub fn kind(&self) -> VenueKind {
        self.identity.kind
    }
}

/// Output of [`Aggregator::aggregate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregation {
    /// Ordered by kind, normalized venue, then year
    pub templates: Vec<MissingTemplateRecord>,
    /// Source entries without a venue identity, with all raw fields
    pub incomplete: Vec<Entry>,
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    classifier: Classifier,
    guesser: Guesser,
    config: AggregateConfig,
}

impl Aggregator {
    /// Creates an aggregator whose guesser knows the journals of `store`.
    pub fn new(store: &TemplateStore, classifier: Classifier, config: AggregateConfig) -> Self {
        Self {
            classifier,
            guesser: Guesser::from_store(store),
            config,
        }
    }

    pub fn with_guesser(classifier: Classifier, guesser: Guesser, config: AggregateConfig) -> Self {
        Self {
            classifier,
            guesser,
            config,
        }
    }

    /// Builds one record per distinct template key among `identities`.
    ///
    /// `sources` are scanned for sibling values; those without an identity
    /// are returned as incomplete instead.
    pub fn aggregate(&self, identities: &[VenueIdentity], sources: &[Entry]) -> Aggregation {
        let mut siblings: HashMap<NormalizedKey, Vec<&Entry>> = HashMap::new();
        let mut incomplete = Vec::new();
        for entry in sources {
            match self.classifier.identify(entry) {
                Some(id) => siblings
                    .entry(id.template_key().normalized())
                    .or_default()
                    .push(entry),
                None => incomplete.push(entry.clone()),
            }
        }

        let mut seen = HashSet::new();
        let mut templates: Vec<MissingTemplateRecord> = identities
            .iter()
            .filter_map(|identity| {
                let key = identity.template_key().normalized();
                if !seen.insert(key.clone()) {
                    return None;
                }
                let entries = siblings.get(&key).map(Vec::as_slice).unwrap_or_default();
                Some(self.build(identity, entries))
            })
            .collect();

        templates.sort_by_cached_key(|t| {
            (
                t.identity.kind,
                normalize_text(&t.identity.venue),
                normalize_text(&t.identity.year),
            )
        });

        tracing::info!(
            templates = templates.len(),
            incomplete = incomplete.len(),
            "aggregated missing templates"
        );
        Aggregation {
            templates,
            incomplete,
        }
    }

    fn build(&self, identity: &VenueIdentity, siblings: &[&Entry]) -> MissingTemplateRecord {
        let desired = self.config.fields_for(identity.kind).to_vec();

        let mut sourced = BTreeMap::new();
        for field in &desired {
            let value = siblings
                .iter()
                .filter_map(|entry| entry.field(field))
                // a `venue` equal to the name is the name, not a location
                .find(|value| field != "venue" || !values_match(value, &identity.venue));
            if let Some(value) = value {
                sourced.insert(field.clone(), clean_value(value));
            }
        }

        MissingTemplateRecord {
            identity: identity.clone(),
            guessed: self.guesser.guess(&identity.venue, identity.kind),
            sourced,
            desired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClassifierConfig;
    use pretty_assertions::assert_eq;

    fn aggregator() -> Aggregator {
        Aggregator::with_guesser(
            Classifier::new(ClassifierConfig::default()),
            Guesser::new(),
            AggregateConfig::default(),
        )
    }

    fn neurips(key: &str) -> Entry {
        Entry::new(key, "inproceedings")
            .with_field("booktitle", "NeurIPS")
            .with_field("year", "2025")
    }

    #[test]
    fn test_neurips_sources_publisher_from_sibling() {
        let identity = VenueIdentity::new("NeurIPS", "2025", VenueKind::Proceedings);
        let sources = vec![
            neurips("a"),
            neurips("b").with_field("publisher", "Curran Associates, Inc."),
            neurips("c").with_field("publisher", "Someone Else"),
            Entry::new("d", "inproceedings")
                .with_field("booktitle", "NeurIPS")
                .with_field("year", "2024")
                .with_field("isbn", "123"),
        ];

        let aggregation = aggregator().aggregate(&[identity.clone(), identity.clone()], &sources);
        assert_eq!(aggregation.templates.len(), 1);

        let record = &aggregation.templates[0];
        assert_eq!(record.identity, identity);
        assert_eq!(record.kind(), VenueKind::Proceedings);
        assert_eq!(
            record.sourced,
            BTreeMap::from([("publisher".to_string(), "Curran Associates, Inc.".to_string())])
        );
        assert_eq!(record.guessed.publisher, None);
        assert_eq!(record.desired, AggregateConfig::default().proceedings_fields);
    }

    #[test]
    fn test_journal_siblings_ignore_year() {
        let identity = VenueIdentity::new("Neural Networks", "2020", VenueKind::Journal);
        let sources = vec![
            Entry::new("a", "article")
                .with_field("journal", "Neural Networks")
                .with_field("year", "2020"),
            Entry::new("b", "article")
                .with_field("journal", "{Neural} Networks")
                .with_field("year", "2018")
                .with_field("issn", "0893-6080")
                .with_field("address", "Oxford,\n  UK"),
        ];

        let record = &aggregator().aggregate(&[identity], &sources).templates[0];
        assert_eq!(record.sourced["issn"], "0893-6080");
        assert_eq!(record.sourced["address"], "Oxford, UK");
    }

    #[test]
    fn test_venue_name_is_not_sourced_as_location() {
        let identity = VenueIdentity::new("BigConf 2025", "2025", VenueKind::Proceedings);
        let sources = vec![
            Entry::new("a", "inproceedings")
                .with_field("venue", "BigConf 2025")
                .with_field("year", "2025"),
        ];

        let record = &aggregator().aggregate(&[identity], &sources).templates[0];
        assert!(record.sourced.is_empty());
    }

    #[test]
    fn test_publisher_equal_to_venue_name_is_sourced() {
        let identity = VenueIdentity::new("eLife", "2023", VenueKind::Journal);
        let sources = vec![
            Entry::new("a", "article")
                .with_field("journal", "eLife")
                .with_field("year", "2023")
                .with_field("publisher", "eLife"),
        ];

        let record = &aggregator().aggregate(&[identity], &sources).templates[0];
        assert_eq!(
            record.sourced,
            BTreeMap::from([("publisher".to_string(), "eLife".to_string())])
        );
    }

    #[test]
    fn test_ordering_is_kind_venue_year() {
        let identities = vec![
            VenueIdentity::new("ICML", "2025", VenueKind::Proceedings),
            VenueIdentity::new("Pattern Recognition", "2020", VenueKind::Journal),
            VenueIdentity::new("CVPR", "2025", VenueKind::Proceedings),
            VenueIdentity::new("CVPR", "2024", VenueKind::Proceedings),
            VenueIdentity::new("IEEE Access", "2021", VenueKind::Journal),
        ];

        let order: Vec<(VenueKind, String, String)> = aggregator()
            .aggregate(&identities, &[])
            .templates
            .into_iter()
            .map(|t| (t.identity.kind, t.identity.venue, t.identity.year))
            .collect();

        assert_eq!(
            order,
            vec![
                (VenueKind::Journal, "IEEE Access".into(), "2021".into()),
                (VenueKind::Journal, "Pattern Recognition".into(), "2020".into()),
                (VenueKind::Proceedings, "CVPR".into(), "2024".into()),
                (VenueKind::Proceedings, "CVPR".into(), "2025".into()),
                (VenueKind::Proceedings, "ICML".into(), "2025".into()),
            ]
        );
    }

    #[test]
    fn test_entries_without_identity_are_incomplete() {
        let orphan = Entry::new("x", "inproceedings")
            .with_field("title", "Lost")
            .with_field("note", "keep me");
        let aggregation = aggregator().aggregate(&[], &[orphan.clone(), neurips("a")]);

        assert!(aggregation.templates.is_empty());
        assert_eq!(aggregation.incomplete, vec![orphan]);
    }
}
