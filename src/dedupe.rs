//! Duplicate detection and merging
//!
//! Subjects of one partition are grouped by the normalized key of their
//! authority name (plus class-specific discriminators). Every cluster of two
//! or more subjects collapses onto its smallest member, and all statements
//! are rewritten through the resulting [`MergeMap`].

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::classes::EntityClass;
use crate::normalize::{normalize_key, year_tokens};
use crate::statement::{StatementSet, Term};
use crate::vocab::{BF_SOURCE, PERSON_DATE_PROPERTIES};

/// Mapping from duplicate subject to canonical subject
///
/// Never contains chains: a canonical subject is never itself a key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeMap {
    map: BTreeMap<Term, Term>,
}

impl MergeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from clusters; each cluster collapses onto its smallest term
    pub fn from_clusters<I>(clusters: I) -> Self
    where
        I: IntoIterator<Item = BTreeSet<Term>>,
    {
        let mut map = BTreeMap::new();
        for cluster in clusters {
            let mut members = cluster.into_iter();
            let Some(canonical) = members.next() else {
                continue;
            };
            for duplicate in members {
                map.insert(duplicate, canonical.clone());
            }
        }
        Self { map }
    }

    /// Combine several maps into one chain-free map
    ///
    /// Maps produced for different partitions may disagree about a subject
    /// that was in both; their clusters are joined and the smallest member
    /// of the joined cluster becomes canonical.
    pub fn combine<'a, I>(maps: I) -> Self
    where
        I: IntoIterator<Item = &'a MergeMap>,
    {
        let mut sets = DisjointSets::default();
        for map in maps {
            for (duplicate, canonical) in map.iter() {
                sets.union(duplicate, canonical);
            }
        }
        Self::from_clusters(sets.clusters())
    }

    /// Canonical subject for `term` (the term itself if it is not merged)
    pub fn canonical<'a>(&'a self, term: &'a Term) -> &'a Term {
        self.map.get(term).unwrap_or(term)
    }

    pub fn contains(&self, term: &Term) -> bool {
        self.map.contains_key(term)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Term, &Term)> {
        self.map.iter()
    }

    /// Rewrite subject and object references through the map
    pub fn apply(&self, statements: &StatementSet) -> StatementSet {
        if self.is_empty() {
            return statements.clone();
        }
        statements.map_terms(|t| self.canonical(t).clone())
    }

    /// Serializable view: duplicate → canonical, both in N-Triples syntax
    pub fn to_json(&self) -> serde_json::Value {
        let entries: serde_json::Map<String, serde_json::Value> = self
            .map
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        serde_json::Value::Object(entries)
    }
}

/// Union-find over terms, used to join overlapping clusters
#[derive(Default)]
struct DisjointSets {
    parent: BTreeMap<Term, Term>,
}

impl DisjointSets {
    fn find(&mut self, term: &Term) -> Term {
        let parent = self
            .parent
            .entry(term.clone())
            .or_insert_with(|| term.clone())
            .clone();
        if &parent == term {
            return parent;
        }
        let root = self.find(&parent);
        self.parent.insert(term.clone(), root.clone());
        root
    }

    fn union(&mut self, a: &Term, b: &Term) {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a != root_b {
            self.parent.insert(root_a, root_b);
        }
    }

    fn clusters(mut self) -> Vec<BTreeSet<Term>> {
        let terms: Vec<Term> = self.parent.keys().cloned().collect();
        let mut grouped: BTreeMap<Term, BTreeSet<Term>> = BTreeMap::new();
        for term in terms {
            let root = self.find(&term);
            grouped.entry(root).or_default().insert(term);
        }
        grouped.into_values().filter(|c| c.len() > 1).collect()
    }
}

/// Statistics from deduplication
#[derive(Debug, Default, Clone, Serialize)]
pub struct DedupeStats {
    pub subjects: usize,
    /// Subjects without a usable name, left out of clustering
    pub unnamed_subjects: usize,
    pub clusters: usize,
    pub merged_subjects: usize,
    pub statements_in: usize,
    pub statements_out: usize,
}

#[derive(Debug, Default)]
pub struct DedupeResult {
    pub statements: StatementSet,
    pub merge_map: MergeMap,
    pub stats: DedupeStats,
}

/// Class-specific duplicate detection
pub trait Deduper: Send + Sync {
    fn class(&self) -> EntityClass;

    /// Extra key material that separates same-named but distinct entities
    fn discriminator(&self, subject: &Term, statements: &StatementSet) -> Option<String>;

    /// Cluster key of a subject, or `None` if it has no usable name
    ///
    /// With several names, the smallest normalized key is used.
    fn cluster_key(
        &self,
        subject: &Term,
        statements: &StatementSet,
        name_property: &str,
    ) -> Option<String> {
        let name_key = statements
            .literal_values(subject, name_property)
            .into_iter()
            .filter_map(|name| normalize_key(Some(name)))
            .min()?;

        match self.discriminator(subject, statements) {
            Some(extra) if !extra.is_empty() => Some(format!("{}|{}", name_key, extra)),
            _ => Some(name_key),
        }
    }

    /// Merge duplicate subjects of `statements`
    fn dedupe(&self, statements: &StatementSet, name_property: &str) -> DedupeResult {
        let mut stats = DedupeStats {
            statements_in: statements.len(),
            ..Default::default()
        };

        let mut by_key: BTreeMap<String, BTreeSet<Term>> = BTreeMap::new();
        for subject in statements.subjects() {
            stats.subjects += 1;
            match self.cluster_key(subject, statements, name_property) {
                Some(key) => {
                    by_key.entry(key).or_default().insert(subject.clone());
                }
                None => stats.unnamed_subjects += 1,
            }
        }

        let clusters: Vec<BTreeSet<Term>> = by_key
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .inspect(|(key, members)| {
                tracing::debug!(class = %self.class(), %key, size = members.len(), "duplicate cluster");
            })
            .map(|(_, members)| members)
            .collect();

        stats.clusters = clusters.len();
        let merge_map = MergeMap::from_clusters(clusters);
        stats.merged_subjects = merge_map.len();

        let rewritten = merge_map.apply(statements);
        stats.statements_out = rewritten.len();

        DedupeResult {
            statements: rewritten,
            merge_map,
            stats,
        }
    }
}

/// Persons: the name key is extended with years from date properties
#[derive(Debug, Default, Clone)]
pub struct PersonDeduper;

impl Deduper for PersonDeduper {
    fn class(&self) -> EntityClass {
        EntityClass::Person
    }

    fn discriminator(&self, subject: &Term, statements: &StatementSet) -> Option<String> {
        let years: BTreeSet<String> = PERSON_DATE_PROPERTIES
            .iter()
            .flat_map(|p| statements.literal_values(subject, p))
            .flat_map(year_tokens)
            .collect();
        if years.is_empty() {
            None
        } else {
            Some(years.into_iter().collect::<Vec<_>>().join(","))
        }
    }
}

/// Corporate bodies: jurisdictions, meetings and organizations with the
/// same name stay apart
#[derive(Debug, Default, Clone)]
pub struct CorporateDeduper;

impl Deduper for CorporateDeduper {
    fn class(&self) -> EntityClass {
        EntityClass::CorporateAgent
    }

    fn discriminator(&self, subject: &Term, statements: &StatementSet) -> Option<String> {
        let types = statements.types_of(subject);
        Some(types.into_iter().collect::<Vec<_>>().join(","))
    }
}

/// Topics: the subject kind and the source scheme both discriminate
#[derive(Debug, Default, Clone)]
pub struct TopicDeduper;

impl Deduper for TopicDeduper {
    fn class(&self) -> EntityClass {
        EntityClass::Topic
    }

    fn discriminator(&self, subject: &Term, statements: &StatementSet) -> Option<String> {
        let types = statements.types_of(subject);
        let sources: BTreeSet<&str> = statements
            .objects(subject, BF_SOURCE)
            .into_iter()
            .filter_map(|t| match t {
                Term::Iri(iri) => Some(iri.as_str()),
                Term::Literal { value, .. } => Some(value.as_str()),
                Term::Blank(_) => None,
            })
            .collect();

        Some(format!(
            "{};{}",
            types.into_iter().collect::<Vec<_>>().join(","),
            sources.into_iter().collect::<Vec<_>>().join(",")
        ))
    }
}

/// Anything else in the class table: name only
#[derive(Debug, Default, Clone)]
pub struct GenericDeduper;

impl Deduper for GenericDeduper {
    fn class(&self) -> EntityClass {
        EntityClass::Generic
    }

    fn discriminator(&self, _subject: &Term, _statements: &StatementSet) -> Option<String> {
        None
    }
}

/// Deduper variant for an entity class
pub fn deduper_for(class: EntityClass) -> Box<dyn Deduper> {
    match class {
        EntityClass::Person => Box::new(PersonDeduper),
        EntityClass::CorporateAgent => Box::new(CorporateDeduper),
        EntityClass::Topic => Box::new(TopicDeduper),
        EntityClass::Generic => Box::new(GenericDeduper),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::Statement;
    use crate::vocab::{
        BF_JURISDICTION, BF_ORGANIZATION, BF_PERSON, MADS_BIRTH_DATE, RDFS_LABEL, RDF_TYPE,
    };

    fn person(id: &str, label: &str) -> Vec<Statement> {
        let s = Term::iri(id);
        vec![
            Statement::new(s.clone(), RDF_TYPE, Term::iri(BF_PERSON)),
            Statement::new(s, RDFS_LABEL, Term::literal(label)),
        ]
    }

    fn work_with_contributors(contributors: &[&str]) -> Vec<Statement> {
        contributors
            .iter()
            .map(|c| {
                Statement::new(
                    Term::iri("http://example.org/work1"),
                    "http://id.loc.gov/ontologies/bibframe/contributor",
                    Term::iri(*c),
                )
            })
            .collect()
    }

    fn twain_set() -> StatementSet {
        let mut set: StatementSet = person("http://example.org/p2", "Twain, Mark, 1835-1910.")
            .into_iter()
            .chain(person("http://example.org/p1", "TWAIN, MARK, 1835-1910"))
            .chain(person("http://example.org/p3", "Twain, Mark, 1835-1910"))
            .chain(person("http://example.org/p4", "Clemens, Olivia"))
            .collect();
        set.extend(work_with_contributors(&[
            "http://example.org/p2",
            "http://example.org/p3",
            "http://example.org/p4",
        ]));
        set
    }

    #[test]
    fn test_merges_onto_smallest_subject() {
        let result = PersonDeduper.dedupe(&twain_set(), RDFS_LABEL);

        let canonical = Term::iri("http://example.org/p1");
        assert_eq!(result.merge_map.len(), 2);
        assert_eq!(
            result.merge_map.canonical(&Term::iri("http://example.org/p2")),
            &canonical
        );
        assert_eq!(
            result.merge_map.canonical(&Term::iri("http://example.org/p3")),
            &canonical
        );
        assert_eq!(result.stats.clusters, 1);
        assert_eq!(result.stats.merged_subjects, 2);
    }

    #[test]
    fn test_merge_closure() {
        let result = PersonDeduper.dedupe(&twain_set(), RDFS_LABEL);

        for statement in &result.statements {
            assert!(!result.merge_map.contains(&statement.subject));
            assert!(!result.merge_map.contains(&statement.object));
        }
        // The work now points at the canonical subject only
        let contributors = result.statements.objects(
            &Term::iri("http://example.org/work1"),
            "http://id.loc.gov/ontologies/bibframe/contributor",
        );
        assert_eq!(contributors.len(), 2);
        // Both label spellings survive on the canonical subject
        let labels = result
            .statements
            .literal_values(&Term::iri("http://example.org/p1"), RDFS_LABEL);
        assert_eq!(labels.len(), 3);
    }

    #[test]
    fn test_deterministic() {
        let a = PersonDeduper.dedupe(&twain_set(), RDFS_LABEL);
        let b = PersonDeduper.dedupe(&twain_set(), RDFS_LABEL);
        assert_eq!(a.merge_map, b.merge_map);
        assert_eq!(a.statements, b.statements);
    }

    #[test]
    fn test_no_spurious_merge() {
        let result = GenericDeduper.dedupe(&twain_set(), RDFS_LABEL);
        assert_eq!(
            result.merge_map.canonical(&Term::iri("http://example.org/p4")),
            &Term::iri("http://example.org/p4")
        );

        // Two small clusters with different keys beside the Twain cluster
        let mut set = twain_set();
        set.extend(person("http://example.org/p5", "Clemens, Olivia"));
        set.extend(person("http://example.org/p6", "Howells, William Dean"));
        set.extend(person("http://example.org/p7", "Howells, William Dean"));

        for result in [
            PersonDeduper.dedupe(&set, RDFS_LABEL),
            GenericDeduper.dedupe(&set, RDFS_LABEL),
        ] {
            let map = &result.merge_map;
            let p4 = Term::iri("http://example.org/p4");
            let p6 = Term::iri("http://example.org/p6");
            assert_eq!(map.len(), 4);
            assert_eq!(map.canonical(&Term::iri("http://example.org/p5")), &p4);
            assert_eq!(map.canonical(&Term::iri("http://example.org/p7")), &p6);
            assert_eq!(map.canonical(&p4), &p4);
            assert_eq!(map.canonical(&p6), &p6);
            assert_eq!(
                map.canonical(&Term::iri("http://example.org/p3")),
                &Term::iri("http://example.org/p1")
            );
        }
    }

    #[test]
    fn test_unnamed_subjects_never_cluster() {
        let set: StatementSet = [
            Statement::new(Term::blank("a"), RDF_TYPE, Term::iri(BF_PERSON)),
            Statement::new(Term::blank("b"), RDF_TYPE, Term::iri(BF_PERSON)),
            Statement::new(Term::blank("c"), RDFS_LABEL, Term::literal("...")),
            Statement::new(Term::blank("d"), RDFS_LABEL, Term::literal("--")),
        ]
        .into_iter()
        .collect();

        let result = PersonDeduper.dedupe(&set, RDFS_LABEL);
        assert!(result.merge_map.is_empty());
        assert_eq!(result.stats.unnamed_subjects, 4);
        assert_eq!(result.statements, set);
    }

    #[test]
    fn test_person_dates_prevent_merge() {
        let mut set: StatementSet = person("http://example.org/a", "Smith, John")
            .into_iter()
            .chain(person("http://example.org/b", "Smith, John"))
            .chain(person("http://example.org/c", "Smith, John"))
            .collect();
        set.insert(Statement::new(
            Term::iri("http://example.org/a"),
            MADS_BIRTH_DATE,
            Term::literal("1901"),
        ));
        set.insert(Statement::new(
            Term::iri("http://example.org/b"),
            MADS_BIRTH_DATE,
            Term::literal("1950-03-02"),
        ));

        let result = PersonDeduper.dedupe(&set, RDFS_LABEL);
        assert!(result.merge_map.is_empty());

        // Without the date discriminator they would collapse
        let generic = GenericDeduper.dedupe(&set, RDFS_LABEL);
        assert_eq!(generic.merge_map.len(), 2);
    }

    #[test]
    fn test_corporate_types_prevent_merge() {
        let a = Term::iri("http://example.org/ny-state");
        let b = Term::iri("http://example.org/ny-org");
        let set: StatementSet = [
            Statement::new(a.clone(), RDF_TYPE, Term::iri(BF_JURISDICTION)),
            Statement::new(a, RDFS_LABEL, Term::literal("New York (State)")),
            Statement::new(b.clone(), RDF_TYPE, Term::iri(BF_ORGANIZATION)),
            Statement::new(b, RDFS_LABEL, Term::literal("New York State")),
        ]
        .into_iter()
        .collect();

        let result = CorporateDeduper.dedupe(&set, RDFS_LABEL);
        assert!(result.merge_map.is_empty());
    }

    #[test]
    fn test_blank_nodes_merge_onto_iri() {
        let set: StatementSet = [
            Statement::new(Term::blank("b0"), RDFS_LABEL, Term::literal("Rivers")),
            Statement::new(
                Term::iri("http://example.org/t1"),
                RDFS_LABEL,
                Term::literal("Rivers."),
            ),
        ]
        .into_iter()
        .collect();

        let result = TopicDeduper.dedupe(&set, RDFS_LABEL);
        assert_eq!(
            result.merge_map.canonical(&Term::blank("b0")),
            &Term::iri("http://example.org/t1")
        );
        assert_eq!(result.statements.subjects().len(), 1);
        assert_eq!(result.statements.len(), 2);
    }

    #[test]
    fn test_combine_removes_chains() {
        let a = Term::iri("http://example.org/a");
        let b = Term::iri("http://example.org/b");
        let c = Term::iri("http://example.org/c");

        let first = MergeMap::from_clusters([BTreeSet::from([b.clone(), c.clone()])]);
        let second = MergeMap::from_clusters([BTreeSet::from([a.clone(), b.clone()])]);
        let combined = MergeMap::combine([&first, &second]);

        assert_eq!(combined.canonical(&b), &a);
        assert_eq!(combined.canonical(&c), &a);
        for (_, canonical) in combined.iter() {
            assert!(!combined.contains(canonical));
        }
    }
}
