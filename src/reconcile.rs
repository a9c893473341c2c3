//! Authority reconciliation
//!
//! A [`Reconciler`] builds a class-appropriate query for one subject, runs it
//! against an [`AuthorityLookup`], and decides whether exactly one candidate
//! is an acceptable match. Lookup failures, empty answers and ambiguous
//! answers are all reported as [`Resolution::Unresolved`]; reconciliation
//! never fails.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use url::Url;

use crate::classes::EntityClass;
use crate::lookup::{AuthorityLookup, Candidate, LookupQuery};
use crate::normalize::{name_tokens, normalize_key, year_tokens};
use crate::statement::{Statement, StatementSet, Term};
use crate::vocab::{OWL_SAME_AS, PERSON_DATE_PROPERTIES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnresolvedReason {
    NoName,
    LookupFailed,
    NoCandidates,
    /// Candidates were returned but none passed the acceptance rule
    Rejected,
    /// More than one candidate passed and nothing told them apart
    Ambiguous,
}

impl UnresolvedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnresolvedReason::NoName => "no-name",
            UnresolvedReason::LookupFailed => "lookup-failed",
            UnresolvedReason::NoCandidates => "no-candidates",
            UnresolvedReason::Rejected => "rejected",
            UnresolvedReason::Ambiguous => "ambiguous",
        }
    }
}

/// Outcome of reconciling one subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
    Resolved(String),
    Unresolved(UnresolvedReason),
}

impl Resolution {
    pub fn uri(&self) -> Option<&str> {
        match self {
            Resolution::Resolved(uri) => Some(uri),
            Resolution::Unresolved(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// Settings shared by every reconciler variant
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    pub name_property: String,
    /// Passed to the service to narrow the search
    pub type_hint: Option<String>,
    pub limit: usize,
}

impl ReconcileSettings {
    pub fn new(name_property: impl Into<String>) -> Self {
        Self {
            name_property: name_property.into(),
            type_hint: None,
            limit: 10,
        }
    }
}

/// Class-specific reconciliation
pub trait Reconciler: Send + Sync {
    fn class(&self) -> EntityClass;

    fn settings(&self) -> &ReconcileSettings;

    /// Query for `subject`, or `None` if it has no usable name
    fn query(&self, subject: &Term, statements: &StatementSet) -> Option<LookupQuery> {
        let name = preferred_name(subject, statements, &self.settings().name_property)?;
        Some(LookupQuery {
            years: year_tokens(name),
            text: name.to_string(),
            class: self.class(),
            type_hint: self.settings().type_hint.clone(),
            limit: self.settings().limit,
        })
    }

    /// Pick the accepted candidate, if any
    fn accept(&self, query: &LookupQuery, candidates: &[Candidate]) -> Resolution;

    /// Resolve `subject` to an authority URI
    ///
    /// Read-only with respect to `statements`.
    fn reconcile(
        &self,
        subject: &Term,
        statements: &StatementSet,
        lookup: &dyn AuthorityLookup,
    ) -> Resolution {
        let Some(query) = self.query(subject, statements) else {
            return Resolution::Unresolved(UnresolvedReason::NoName);
        };

        let candidates = match lookup.lookup(&query) {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(%subject, error = %e, "authority lookup failed");
                return Resolution::Unresolved(UnresolvedReason::LookupFailed);
            }
        };
        if candidates.is_empty() {
            return Resolution::Unresolved(UnresolvedReason::NoCandidates);
        }

        let usable: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| is_absolute_uri(&c.uri))
            .collect();
        let resolution = self.accept(&query, &usable);
        tracing::debug!(%subject, class = %self.class(), ?resolution, "reconciled");
        resolution
    }
}

/// The name with the smallest normalized key, so the choice is stable
fn preferred_name<'a>(
    subject: &'a Term,
    statements: &'a StatementSet,
    name_property: &'a str,
) -> Option<&'a str> {
    statements
        .literal_values(subject, name_property)
        .into_iter()
        .filter_map(|name| normalize_key(Some(name)).map(|key| (key, name)))
        .min()
        .map(|(_, name)| name)
}

fn is_absolute_uri(uri: &str) -> bool {
    Url::parse(uri).is_ok()
}

/// Resolved if exactly one distinct URI is in `matches`
fn unique<'a, I>(matches: I) -> Resolution
where
    I: IntoIterator<Item = &'a Candidate>,
{
    let mut uris: BTreeSet<&str> = matches.into_iter().map(|c| c.uri.as_str()).collect();
    if uris.len() > 1 {
        return Resolution::Unresolved(UnresolvedReason::Ambiguous);
    }
    match uris.pop_first() {
        Some(uri) => Resolution::Resolved(uri.to_string()),
        None => Resolution::Unresolved(UnresolvedReason::Rejected),
    }
}

fn same_key(a: &str, b: &str) -> bool {
    match (normalize_key(Some(a)), normalize_key(Some(b))) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

/// Persons: name match ignoring years, plus date agreement
///
/// Every year known for the subject must appear in the candidate heading.
pub struct PersonReconciler {
    settings: ReconcileSettings,
}

impl PersonReconciler {
    pub fn new(settings: ReconcileSettings) -> Self {
        Self { settings }
    }
}

impl Reconciler for PersonReconciler {
    fn class(&self) -> EntityClass {
        EntityClass::Person
    }

    fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    fn query(&self, subject: &Term, statements: &StatementSet) -> Option<LookupQuery> {
        let name = preferred_name(subject, statements, &self.settings.name_property)?;
        let years: BTreeSet<String> = year_tokens(name)
            .into_iter()
            .chain(
                PERSON_DATE_PROPERTIES
                    .iter()
                    .flat_map(|p| statements.literal_values(subject, p))
                    .flat_map(year_tokens),
            )
            .collect();

        Some(LookupQuery {
            text: name.to_string(),
            class: EntityClass::Person,
            type_hint: self.settings.type_hint.clone(),
            years: years.into_iter().collect(),
            limit: self.settings.limit,
        })
    }

    fn accept(&self, query: &LookupQuery, candidates: &[Candidate]) -> Resolution {
        let wanted = name_tokens(&query.text);
        unique(candidates.iter().filter(|c| {
            if name_tokens(&c.label) != wanted {
                return false;
            }
            let years = year_tokens(&c.label);
            query.years.iter().all(|y| years.contains(y))
        }))
    }
}

/// Corporate bodies: exact key match; the service's own match flag breaks
/// ties between several exact matches
pub struct CorporateReconciler {
    settings: ReconcileSettings,
}

impl CorporateReconciler {
    pub fn new(settings: ReconcileSettings) -> Self {
        Self { settings }
    }
}

impl Reconciler for CorporateReconciler {
    fn class(&self) -> EntityClass {
        EntityClass::CorporateAgent
    }

    fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    fn accept(&self, query: &LookupQuery, candidates: &[Candidate]) -> Resolution {
        let exact: Vec<&Candidate> = candidates
            .iter()
            .filter(|c| same_key(&c.label, &query.text))
            .collect();

        match unique(exact.iter().copied()) {
            Resolution::Unresolved(UnresolvedReason::Ambiguous) => {
                match unique(exact.into_iter().filter(|c| c.matched)) {
                    resolved @ Resolution::Resolved(_) => resolved,
                    _ => Resolution::Unresolved(UnresolvedReason::Ambiguous),
                }
            }
            other => other,
        }
    }
}

/// Topics: a single unambiguous label match
pub struct TopicReconciler {
    settings: ReconcileSettings,
}

impl TopicReconciler {
    pub fn new(settings: ReconcileSettings) -> Self {
        Self { settings }
    }
}

impl Reconciler for TopicReconciler {
    fn class(&self) -> EntityClass {
        EntityClass::Topic
    }

    fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    fn accept(&self, query: &LookupQuery, candidates: &[Candidate]) -> Resolution {
        unique(candidates.iter().filter(|c| same_key(&c.label, &query.text)))
    }
}

/// Other classed entities: single label match above a score threshold
pub struct GenericReconciler {
    settings: ReconcileSettings,
    min_score: f64,
}

impl GenericReconciler {
    pub fn new(settings: ReconcileSettings, min_score: f64) -> Self {
        Self {
            settings,
            min_score,
        }
    }
}

impl Reconciler for GenericReconciler {
    fn class(&self) -> EntityClass {
        EntityClass::Generic
    }

    fn settings(&self) -> &ReconcileSettings {
        &self.settings
    }

    fn accept(&self, query: &LookupQuery, candidates: &[Candidate]) -> Resolution {
        unique(
            candidates
                .iter()
                .filter(|c| c.score >= self.min_score && same_key(&c.label, &query.text)),
        )
    }
}

/// Reconciler variant for an entity class
pub fn reconciler_for(
    class: EntityClass,
    settings: ReconcileSettings,
    min_score: f64,
) -> Box<dyn Reconciler> {
    match class {
        EntityClass::Person => Box::new(PersonReconciler::new(settings)),
        EntityClass::CorporateAgent => Box::new(CorporateReconciler::new(settings)),
        EntityClass::Topic => Box::new(TopicReconciler::new(settings)),
        EntityClass::Generic => Box::new(GenericReconciler::new(settings, min_score)),
    }
}

/// Statistics from reconciliation
#[derive(Debug, Default, Clone, Serialize)]
pub struct ReconcileStats {
    pub attempted: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub lookup_failures: usize,
    pub ambiguous: usize,
    pub unnamed: usize,
}

impl ReconcileStats {
    fn record(&mut self, resolution: &Resolution) {
        self.attempted += 1;
        match resolution {
            Resolution::Resolved(_) => self.resolved += 1,
            Resolution::Unresolved(reason) => {
                self.unresolved += 1;
                match reason {
                    UnresolvedReason::LookupFailed => self.lookup_failures += 1,
                    UnresolvedReason::Ambiguous => self.ambiguous += 1,
                    UnresolvedReason::NoName => self.unnamed += 1,
                    _ => {}
                }
            }
        }
    }

    pub fn add(&mut self, other: &ReconcileStats) {
        self.attempted += other.attempted;
        self.resolved += other.resolved;
        self.unresolved += other.unresolved;
        self.lookup_failures += other.lookup_failures;
        self.ambiguous += other.ambiguous;
        self.unnamed += other.unnamed;
    }
}

#[derive(Debug, Default)]
pub struct ReconcileResult {
    pub results: BTreeMap<Term, Resolution>,
    pub stats: ReconcileStats,
}

/// Reconcile `subjects` of `statements`, issuing lookups in parallel
pub fn reconcile_subjects(
    statements: &StatementSet,
    subjects: &BTreeSet<Term>,
    reconciler: &dyn Reconciler,
    lookup: &dyn AuthorityLookup,
) -> ReconcileResult {
    let resolved: Vec<(Term, Resolution)> = subjects
        .par_iter()
        .map(|subject| {
            let resolution = reconciler.reconcile(subject, statements, lookup);
            (subject.clone(), resolution)
        })
        .collect();

    let mut stats = ReconcileStats::default();
    for (_, resolution) in &resolved {
        stats.record(resolution);
    }

    ReconcileResult {
        results: resolved.into_iter().collect(),
        stats,
    }
}

/// Mints local IRIs for unresolved blank-node subjects
///
/// IRIs have the form `<namespace><class slug>/<name key>`; a numeric
/// suffix keeps them unique within one minter and distinct from every IRI
/// passed to [`Minter::reserve`].
#[derive(Debug)]
pub struct Minter {
    namespace: String,
    used: BTreeSet<String>,
}

impl Minter {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            used: BTreeSet::new(),
        }
    }

    /// Mark IRIs already present in the graph as taken
    pub fn reserve<'a>(&mut self, terms: impl IntoIterator<Item = &'a Term>) {
        self.used
            .extend(terms.into_iter().filter_map(Term::as_iri).map(String::from));
    }

    pub fn mint(&mut self, class: EntityClass, name: &str) -> Option<Term> {
        let key = normalize_key(Some(name))?;
        let base = format!("{}{}/{}", self.namespace, class.slug(), key);
        let mut candidate = base.clone();
        let mut n = 1;
        while self.used.contains(&candidate) {
            n += 1;
            candidate = format!("{}-{}", base, n);
        }
        self.used.insert(candidate.clone());
        Some(Term::Iri(candidate))
    }
}

/// Fold reconciliation results into a statement set
///
/// Subjects listed in `renames` are renamed wherever they occur; every
/// resolved subject present in the set gains an `owl:sameAs` link to its
/// authority URI.
pub fn fold_resolutions(
    statements: &StatementSet,
    results: &BTreeMap<Term, Resolution>,
    renames: &BTreeMap<Term, Term>,
) -> StatementSet {
    let mut folded = if renames.is_empty() {
        statements.clone()
    } else {
        statements.map_terms(|t| renames.get(t).cloned().unwrap_or_else(|| t.clone()))
    };

    let subjects: BTreeSet<Term> = folded.subjects().into_iter().cloned().collect();
    for (subject, resolution) in results {
        let subject = renames.get(subject).unwrap_or(subject);
        if let (Some(uri), true) = (resolution.uri(), subjects.contains(subject)) {
            folded.insert(Statement::new(
                subject.clone(),
                OWL_SAME_AS,
                Term::iri(uri),
            ));
        }
    }
    folded
}
