//! Partitioning of statement sets by subject type
//!
//! Every statement is routed to one partition per rdf:type of its subject.
//! Subjects without a type land in [`Partition::Untyped`]; nothing is
//! dropped, and the union of all partitions is the input set.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::statement::{StatementSet, Term};
use crate::vocab::{local_name, UNTYPED_PARTITION};

/// Key of an output partition
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Partition {
    Typed(String),
    Untyped,
}

impl Partition {
    pub fn type_uri(&self) -> Option<&str> {
        match self {
            Partition::Typed(uri) => Some(uri),
            Partition::Untyped => None,
        }
    }

    /// Short name suitable as a file stem
    pub fn file_stem(&self) -> String {
        match self {
            Partition::Typed(uri) => {
                let name: String = local_name(uri)
                    .chars()
                    .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
                    .collect();
                if name.is_empty() {
                    "type".to_string()
                } else {
                    name
                }
            }
            Partition::Untyped => UNTYPED_PARTITION.to_string(),
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Typed(uri) => write!(f, "<{}>", uri),
            Partition::Untyped => write!(f, "{}", UNTYPED_PARTITION),
        }
    }
}

/// Resolves the declared types of a subject
pub trait TypeLookup {
    fn types_of(&self, subject: &Term) -> BTreeSet<String>;
}

/// Type lookup derived from the rdf:type statements of a set
#[derive(Debug, Default)]
pub struct RdfTypeLookup {
    types: BTreeMap<Term, BTreeSet<String>>,
}

impl RdfTypeLookup {
    pub fn from_statements(statements: &StatementSet) -> Self {
        let mut types: BTreeMap<Term, BTreeSet<String>> = BTreeMap::new();
        for subject in statements.subjects() {
            let declared = statements.types_of(subject);
            if !declared.is_empty() {
                types.insert(subject.clone(), declared);
            }
        }
        Self { types }
    }
}

impl TypeLookup for RdfTypeLookup {
    fn types_of(&self, subject: &Term) -> BTreeSet<String> {
        self.types.get(subject).cloned().unwrap_or_default()
    }
}

/// Statistics from splitting
#[derive(Debug, Default, Clone, Serialize)]
pub struct SplitStats {
    pub subjects: usize,
    pub untyped_subjects: usize,
    /// Subjects routed to more than one partition
    pub multi_typed_subjects: usize,
    pub partitions: usize,
}

#[derive(Debug, Default)]
pub struct SplitResult {
    pub partitions: BTreeMap<Partition, StatementSet>,
    pub stats: SplitStats,
}

/// Split `statements` into one set per subject type
pub fn split(statements: &StatementSet, type_lookup: &dyn TypeLookup) -> SplitResult {
    let mut partitions: BTreeMap<Partition, StatementSet> = BTreeMap::new();
    let mut stats = SplitStats::default();

    for (subject, about) in statements.by_subject() {
        stats.subjects += 1;

        let types = type_lookup.types_of(subject);
        let targets: Vec<Partition> = if types.is_empty() {
            stats.untyped_subjects += 1;
            vec![Partition::Untyped]
        } else {
            if types.len() > 1 {
                stats.multi_typed_subjects += 1;
            }
            types.into_iter().map(Partition::Typed).collect()
        };

        for target in targets {
            partitions
                .entry(target)
                .or_default()
                .extend(about.iter().map(|s| (*s).clone()));
        }
    }

    stats.partitions = partitions.len();
    tracing::debug!(
        subjects = stats.subjects,
        untyped = stats.untyped_subjects,
        partitions = stats.partitions,
        "split statements by subject type"
    );

    SplitResult { partitions, stats }
}

/// Assigns unique file stems to partitions, suffixing `-2`, `-3`, ... when
/// two type IRIs share a local name
///
/// Stems are unique ignoring case and never equal one of `reserved`.
pub fn partition_file_stems(
    partitions: &BTreeMap<Partition, StatementSet>,
    reserved: &[&str],
) -> BTreeMap<Partition, String> {
    let mut used: BTreeSet<String> = reserved.iter().map(|s| s.to_lowercase()).collect();
    let mut stems = BTreeMap::new();
    for partition in partitions.keys() {
        let base = partition.file_stem();
        let mut stem = base.clone();
        let mut n = 1;
        while !used.insert(stem.to_lowercase()) {
            n += 1;
            stem = format!("{}-{}", base, n);
        }
        stems.insert(partition.clone(), stem);
    }
    stems
}
