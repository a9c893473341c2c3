//! In-memory pipeline
//!
//! Sequences the stages for one input graph:
//!
//! 1. local-name repair on the raw text
//! 2. parsing and splitting by subject type
//! 3. deduplication of every classed partition, with one merge map applied
//!    to all partitions so no reference is left dangling
//! 4. reconciliation of the canonical subjects, folded back as
//!    `owl:sameAs` links (and minted IRIs for unresolved blank nodes)
//!
//! Each stage takes its input by reference and returns new sets plus the
//! mappings and statistics it produced.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::classes::ClassRule;
use crate::config::Config;
use crate::dedupe::{deduper_for, DedupeStats, MergeMap};
use crate::error::PipelineError;
use crate::lookup::AuthorityLookup;
use crate::ntriples::read_statements;
use crate::reconcile::{
    fold_resolutions, reconcile_subjects, reconciler_for, Minter, ReconcileSettings,
    ReconcileStats, Resolution,
};
use crate::repair::{LocalNameRepair, RepairResult, RepairStats};
use crate::split::{split, Partition, RdfTypeLookup, SplitResult, SplitStats};
use crate::statement::{StatementSet, Term};

pub type Partitions = BTreeMap<Partition, StatementSet>;

#[derive(Debug, Default)]
pub struct DedupeOutcome {
    pub partitions: Partitions,
    pub merge_map: MergeMap,
    /// Per deduplicated partition, keyed by its display form
    pub stats: BTreeMap<String, DedupeStats>,
}

#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub partitions: Partitions,
    pub results: BTreeMap<Term, Resolution>,
    /// Unresolved blank nodes renamed to minted IRIs
    pub renames: BTreeMap<Term, Term>,
    pub stats: ReconcileStats,
}

/// Statistics of a full run
#[derive(Debug, Default, Clone, Serialize)]
pub struct PipelineStats {
    pub repair: RepairStats,
    pub unparsed_lines: usize,
    pub split: SplitStats,
    pub dedupe: BTreeMap<String, DedupeStats>,
    pub reconcile: ReconcileStats,
}

#[derive(Debug, Default)]
pub struct PipelineOutput {
    pub partitions: Partitions,
    pub merge_map: MergeMap,
    pub results: BTreeMap<Term, Resolution>,
    pub renames: BTreeMap<Term, Term>,
    /// Lines the parser could not read, passed through verbatim
    pub unparsed: Vec<String>,
    pub stats: PipelineStats,
}

pub struct Pipeline {
    repair: Option<LocalNameRepair>,
    config: Config,
}

impl Pipeline {
    pub fn new(config: &Config) -> Result<Self, PipelineError> {
        config.validate()?;
        let repair = config
            .local_namespace
            .as_deref()
            .map(|ns| LocalNameRepair::new(ns, &config.repair_prefix))
            .transpose()?;

        Ok(Self {
            repair,
            config: config.clone(),
        })
    }

    fn rule_for(&self, partition: &Partition) -> Option<&ClassRule> {
        partition.type_uri().and_then(|t| self.config.classes.rule_for(t))
    }

    /// Repair malformed local names; a no-op without a local namespace
    pub fn repair(&self, text: &str) -> RepairResult {
        match &self.repair {
            Some(repair) => repair.repair_text(text),
            None => RepairResult {
                text: text.to_string(),
                stats: RepairStats {
                    lines: text.lines().count(),
                    repaired_lines: 0,
                },
            },
        }
    }

    /// Split statements by the rdf:type statements they carry
    pub fn split(&self, statements: &StatementSet) -> SplitResult {
        let type_lookup = RdfTypeLookup::from_statements(statements);
        split(statements, &type_lookup)
    }

    /// Which classed partition is responsible for each subject
    ///
    /// A subject in several classed partitions is handled once, by the most
    /// specific class; ties go to the first partition in key order.
    fn assign_owners<'a>(&self, partitions: &'a Partitions) -> BTreeMap<&'a Term, &'a Partition> {
        let mut owners: BTreeMap<&Term, (&Partition, u8)> = BTreeMap::new();
        for (partition, statements) in partitions {
            let Some(rule) = self.rule_for(partition) else {
                continue;
            };
            let rank = rule.class.specificity();
            for subject in statements.subjects() {
                let replace = owners
                    .get(subject)
                    .map_or(true, |(_, existing)| rank > *existing);
                if replace {
                    owners.insert(subject, (partition, rank));
                }
            }
        }
        owners.into_iter().map(|(s, (p, _))| (s, p)).collect()
    }

    fn owned_subjects<'a>(
        owners: &BTreeMap<&'a Term, &'a Partition>,
        partition: &Partition,
    ) -> BTreeSet<&'a Term> {
        owners
            .iter()
            .filter(|(_, owner)| **owner == partition)
            .map(|(subject, _)| *subject)
            .collect()
    }

    /// Merge duplicate entities across all classed partitions
    pub fn dedupe(&self, partitions: &Partitions) -> DedupeOutcome {
        let owners = self.assign_owners(partitions);
        let mut maps = Vec::new();
        let mut stats = BTreeMap::new();

        for (partition, statements) in partitions {
            let Some(rule) = self.rule_for(partition) else {
                continue;
            };
            let owned = Self::owned_subjects(&owners, partition);
            let restricted = statements.restrict_to_subjects(&owned);
            let result = deduper_for(rule.class).dedupe(&restricted, &rule.name_property);

            tracing::debug!(
                %partition,
                class = %rule.class,
                clusters = result.stats.clusters,
                merged = result.stats.merged_subjects,
                "deduplicated partition"
            );
            maps.push(result.merge_map);
            stats.insert(partition.to_string(), result.stats);
        }

        let merge_map = MergeMap::combine(&maps);
        let partitions = partitions
            .iter()
            .map(|(p, s)| (p.clone(), merge_map.apply(s)))
            .collect();

        DedupeOutcome {
            partitions,
            merge_map,
            stats,
        }
    }

    /// Reconcile the subjects of every classed partition
    pub fn reconcile(&self, partitions: &Partitions, lookup: &dyn AuthorityLookup) -> ReconcileOutcome {
        let owners = self.assign_owners(partitions);
        let mut results = BTreeMap::new();
        let mut stats = ReconcileStats::default();
        let mut minter = self.config.mint_namespace.as_deref().map(|namespace| {
            let mut minter = Minter::new(namespace);
            for statements in partitions.values() {
                minter.reserve(statements.iter().flat_map(|s| [&s.subject, &s.object]));
            }
            minter
        });
        let mut renames = BTreeMap::new();

        for (partition, statements) in partitions {
            let Some(rule) = self.rule_for(partition) else {
                continue;
            };
            let subjects: BTreeSet<Term> = Self::owned_subjects(&owners, partition)
                .into_iter()
                .cloned()
                .collect();
            if subjects.is_empty() {
                continue;
            }

            let settings = ReconcileSettings {
                name_property: rule.name_property.clone(),
                type_hint: self.config.type_hint(rule.class),
                limit: self.config.lookup_limit(),
            };
            let reconciler = reconciler_for(rule.class, settings, self.config.min_score);
            let result = reconcile_subjects(statements, &subjects, reconciler.as_ref(), lookup);

            if let Some(minter) = minter.as_mut() {
                for (subject, resolution) in &result.results {
                    if resolution.is_resolved() || !subject.is_blank() {
                        continue;
                    }
                    let minted = reconciler
                        .query(subject, statements)
                        .and_then(|q| minter.mint(rule.class, &q.text));
                    if let Some(iri) = minted {
                        renames.insert(subject.clone(), iri);
                    }
                }
            }

            stats.add(&result.stats);
            results.extend(result.results);
        }

        let partitions = partitions
            .iter()
            .map(|(p, s)| (p.clone(), fold_resolutions(s, &results, &renames)))
            .collect();

        tracing::debug!(
            resolved = stats.resolved,
            unresolved = stats.unresolved,
            minted = renames.len(),
            "reconciled partitions"
        );

        ReconcileOutcome {
            partitions,
            results,
            renames,
            stats,
        }
    }

    /// Run every stage over one N-Triples document
    pub fn run(&self, text: &str, source: &str, lookup: &dyn AuthorityLookup) -> PipelineOutput {
        let repaired = self.repair(text);
        let parsed = read_statements(&repaired.text, source);
        let unparsed: Vec<String> = parsed.rejected.into_iter().map(|(_, line)| line).collect();

        let split_result = self.split(&parsed.statements);
        let deduped = self.dedupe(&split_result.partitions);
        let reconciled = self.reconcile(&deduped.partitions, lookup);

        tracing::info!(
            source,
            partitions = split_result.stats.partitions,
            merged = deduped.merge_map.len(),
            resolved = reconciled.stats.resolved,
            unresolved = reconciled.stats.unresolved,
            unparsed = unparsed.len(),
            "pipeline run complete"
        );

        let stats = PipelineStats {
            repair: repaired.stats,
            unparsed_lines: unparsed.len(),
            split: split_result.stats,
            dedupe: deduped.stats,
            reconcile: reconciled.stats,
        };

        PipelineOutput {
            partitions: reconciled.partitions,
            merge_map: deduped.merge_map,
            results: reconciled.results,
            renames: reconciled.renames,
            unparsed,
            stats,
        }
    }
}
