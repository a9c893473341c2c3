//! Entity classes and the type-to-class table
//!
//! The table decides which deduper and reconciler variant handles a
//! partition, and which property carries the entity's authority name.
//! Types missing from the table (works, instances, ...) are never
//! deduplicated or reconciled.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::vocab::{
    BF_AGENT, BF_FAMILY, BF_JURISDICTION, BF_MEETING, BF_ORGANIZATION, BF_PERSON, BF_PLACE,
    BF_TOPIC, MADS_AUTHORITATIVE_LABEL, MADS_COMPLEX_SUBJECT, MADS_GEOGRAPHIC, MADS_TOPIC,
    RDFS_LABEL,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityClass {
    Person,
    CorporateAgent,
    Topic,
    Generic,
}

impl EntityClass {
    /// Path segment used when minting local IRIs
    pub fn slug(&self) -> &'static str {
        match self {
            EntityClass::Person => "person",
            EntityClass::CorporateAgent => "corporate",
            EntityClass::Topic => "topic",
            EntityClass::Generic => "agent",
        }
    }

    /// Higher wins when a subject belongs to several classed partitions
    pub fn specificity(&self) -> u8 {
        match self {
            EntityClass::Generic => 0,
            _ => 1,
        }
    }
}

impl fmt::Display for EntityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityClass::Person => "person",
            EntityClass::CorporateAgent => "corporate-agent",
            EntityClass::Topic => "topic",
            EntityClass::Generic => "generic",
        };
        f.write_str(name)
    }
}

/// One row of the class table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRule {
    pub type_uri: String,
    pub class: EntityClass,
    #[serde(default = "default_name_property")]
    pub name_property: String,
}

fn default_name_property() -> String {
    RDFS_LABEL.to_string()
}

impl ClassRule {
    pub fn new(type_uri: &str, class: EntityClass, name_property: &str) -> Self {
        Self {
            type_uri: type_uri.to_string(),
            class,
            name_property: name_property.to_string(),
        }
    }
}

/// Explicit mapping from type IRI to entity class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassTable {
    rules: Vec<ClassRule>,
}

impl ClassTable {
    pub fn new(rules: Vec<ClassRule>) -> Self {
        Self { rules }
    }

    /// Rule for a type IRI; the first matching row wins
    pub fn rule_for(&self, type_uri: &str) -> Option<&ClassRule> {
        self.rules.iter().find(|r| r.type_uri == type_uri)
    }

    pub fn rules(&self) -> &[ClassRule] {
        &self.rules
    }
}

impl Default for ClassTable {
    /// BIBFRAME agents and subjects, plus their MADS/RDF counterparts
    fn default() -> Self {
        use EntityClass::*;
        Self::new(vec![
            ClassRule::new(BF_PERSON, Person, RDFS_LABEL),
            ClassRule::new(BF_FAMILY, Generic, RDFS_LABEL),
            ClassRule::new(BF_ORGANIZATION, CorporateAgent, RDFS_LABEL),
            ClassRule::new(BF_JURISDICTION, CorporateAgent, RDFS_LABEL),
            ClassRule::new(BF_MEETING, CorporateAgent, RDFS_LABEL),
            ClassRule::new(BF_AGENT, Generic, RDFS_LABEL),
            ClassRule::new(BF_TOPIC, Topic, RDFS_LABEL),
            ClassRule::new(BF_PLACE, Topic, RDFS_LABEL),
            ClassRule::new(MADS_TOPIC, Topic, MADS_AUTHORITATIVE_LABEL),
            ClassRule::new(MADS_GEOGRAPHIC, Topic, MADS_AUTHORITATIVE_LABEL),
            ClassRule::new(MADS_COMPLEX_SUBJECT, Topic, MADS_AUTHORITATIVE_LABEL),
        ])
    }
}
