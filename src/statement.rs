//! Statements and statement sets
//!
//! A [`StatementSet`] is an immutable-by-convention, sorted set of triples.
//! Stages never edit a set they were given; they build a new one.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rio_api::model as rio;

use crate::vocab::RDF_TYPE;

/// An RDF term
///
/// The variant order matters: IRIs sort before blank nodes, which sort
/// before literals. Canonical subject selection relies on it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Iri(String),
    /// Blank node label without the `_:` prefix
    Blank(String),
    Literal {
        value: String,
        datatype: Option<String>,
        language: Option<String>,
    },
}

impl Term {
    pub fn iri(iri: impl Into<String>) -> Self {
        Term::Iri(iri.into())
    }

    pub fn blank(label: impl Into<String>) -> Self {
        Term::Blank(label.into())
    }

    /// Plain string literal
    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    pub fn lang_literal(value: impl Into<String>, language: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: None,
            language: Some(language.into()),
        }
    }

    pub fn typed_literal(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: Some(datatype.into()),
            language: None,
        }
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Term::Literal { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Term::Blank(_))
    }

    /// IRIs and blank nodes can be subjects; literals cannot
    pub fn is_resource(&self) -> bool {
        !matches!(self, Term::Literal { .. })
    }
}

impl Term {
    /// Borrowed view in the `rio_api` model
    pub fn as_rio(&self) -> rio::Term<'_> {
        match self {
            Term::Iri(iri) => rio::Term::NamedNode(rio::NamedNode { iri: iri.as_str() }),
            Term::Blank(id) => rio::Term::BlankNode(rio::BlankNode { id: id.as_str() }),
            Term::Literal {
                value,
                datatype,
                language,
            } => rio::Term::Literal(match (language, datatype) {
                (Some(language), _) => rio::Literal::LanguageTaggedString {
                    value: value.as_str(),
                    language: language.as_str(),
                },
                (None, Some(datatype)) => rio::Literal::Typed {
                    value: value.as_str(),
                    datatype: rio::NamedNode {
                        iri: datatype.as_str(),
                    },
                },
                (None, None) => rio::Literal::Simple {
                    value: value.as_str(),
                },
            }),
        }
    }

    /// Subject view in the `rio_api` model; `None` for literals
    pub fn as_rio_subject(&self) -> Option<rio::Subject<'_>> {
        match self {
            Term::Iri(iri) => Some(rio::Subject::NamedNode(rio::NamedNode { iri: iri.as_str() })),
            Term::Blank(id) => Some(rio::Subject::BlankNode(rio::BlankNode { id: id.as_str() })),
            Term::Literal { .. } => None,
        }
    }
}

impl fmt::Display for Term {
    /// Formats the term in N-Triples syntax
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_rio())
    }
}

/// A single subject-predicate-object statement
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Statement {
    pub subject: Term,
    pub predicate: String,
    pub object: Term,
}

impl Statement {
    pub fn new(subject: Term, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let predicate = rio::NamedNode {
            iri: self.predicate.as_str(),
        };
        write!(f, "{} {} {} .", self.subject, predicate, self.object)
    }
}

/// A set of statements, unique by triple value, iterated in sorted order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatementSet {
    statements: BTreeSet<Statement>,
}

impl StatementSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a statement; returns false if it was already present
    pub fn insert(&mut self, statement: Statement) -> bool {
        self.statements.insert(statement)
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn contains(&self, statement: &Statement) -> bool {
        self.statements.contains(statement)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        self.statements.iter()
    }

    /// Distinct subjects in sorted order
    pub fn subjects(&self) -> BTreeSet<&Term> {
        self.statements.iter().map(|s| &s.subject).collect()
    }

    /// All statements whose subject is `subject`
    pub fn statements_about(&self, subject: &Term) -> impl Iterator<Item = &Statement> + '_ {
        // Statements are ordered by subject first; the smallest possible
        // statement about `subject` starts the range
        let subject = subject.clone();
        let first = Statement::new(subject.clone(), String::new(), Term::Iri(String::new()));
        self.statements
            .range(first..)
            .take_while(move |s| s.subject == subject)
    }

    /// Objects of `subject` under `predicate`
    pub fn objects(&self, subject: &Term, predicate: &str) -> Vec<&Term> {
        self.statements_about(subject)
            .filter(|s| s.predicate == predicate)
            .map(|s| &s.object)
            .collect()
    }

    /// Literal values of `subject` under `predicate`
    pub fn literal_values(&self, subject: &Term, predicate: &str) -> Vec<&str> {
        self.objects(subject, predicate)
            .into_iter()
            .filter_map(Term::as_literal)
            .collect()
    }

    /// rdf:type IRIs asserted for `subject`
    pub fn types_of(&self, subject: &Term) -> BTreeSet<String> {
        self.objects(subject, RDF_TYPE)
            .into_iter()
            .filter_map(Term::as_iri)
            .map(String::from)
            .collect()
    }

    /// Groups statements by subject
    pub fn by_subject(&self) -> BTreeMap<&Term, Vec<&Statement>> {
        let mut grouped: BTreeMap<&Term, Vec<&Statement>> = BTreeMap::new();
        for statement in &self.statements {
            grouped.entry(&statement.subject).or_default().push(statement);
        }
        grouped
    }

    /// New set holding only statements whose subject is in `subjects`
    pub fn restrict_to_subjects(&self, subjects: &BTreeSet<&Term>) -> StatementSet {
        self.statements
            .iter()
            .filter(|s| subjects.contains(&s.subject))
            .cloned()
            .collect()
    }

    pub fn union(&self, other: &StatementSet) -> StatementSet {
        self.statements
            .union(&other.statements)
            .cloned()
            .collect()
    }

    /// New set with every subject and object passed through `f`
    ///
    /// Statements that become identical collapse into one.
    pub fn map_terms<F>(&self, f: F) -> StatementSet
    where
        F: Fn(&Term) -> Term,
    {
        self.statements
            .iter()
            .map(|s| Statement::new(f(&s.subject), s.predicate.clone(), f(&s.object)))
            .collect()
    }
}

impl FromIterator<Statement> for StatementSet {
    fn from_iter<I: IntoIterator<Item = Statement>>(iter: I) -> Self {
        Self {
            statements: iter.into_iter().collect(),
        }
    }
}

impl Extend<Statement> for StatementSet {
    fn extend<I: IntoIterator<Item = Statement>>(&mut self, iter: I) {
        self.statements.extend(iter);
    }
}

impl IntoIterator for StatementSet {
    type Item = Statement;
    type IntoIter = std::collections::btree_set::IntoIter<Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.into_iter()
    }
}

impl<'a> IntoIterator for &'a StatementSet {
    type Item = &'a Statement;
    type IntoIter = std::collections::btree_set::Iter<'a, Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.iter()
    }
}
