//! Vocabulary used by the pipeline
//!
//! RDF core terms plus the BIBFRAME and MADS/RDF properties the default
//! class table and the class-specific dedupers look at.

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";

/// Added by the reconcile stage to link a local subject to its authority
pub const OWL_SAME_AS: &str = "http://www.w3.org/2002/07/owl#sameAs";

pub const BF_AGENT: &str = "http://id.loc.gov/ontologies/bibframe/Agent";
pub const BF_PERSON: &str = "http://id.loc.gov/ontologies/bibframe/Person";
pub const BF_FAMILY: &str = "http://id.loc.gov/ontologies/bibframe/Family";
pub const BF_ORGANIZATION: &str = "http://id.loc.gov/ontologies/bibframe/Organization";
pub const BF_JURISDICTION: &str = "http://id.loc.gov/ontologies/bibframe/Jurisdiction";
pub const BF_MEETING: &str = "http://id.loc.gov/ontologies/bibframe/Meeting";
pub const BF_TOPIC: &str = "http://id.loc.gov/ontologies/bibframe/Topic";
pub const BF_PLACE: &str = "http://id.loc.gov/ontologies/bibframe/Place";

pub const BF_DATE: &str = "http://id.loc.gov/ontologies/bibframe/date";

/// Scheme a topic heading was taken from (e.g. LCSH vs. FAST)
pub const BF_SOURCE: &str = "http://id.loc.gov/ontologies/bibframe/source";

pub const MADS_TOPIC: &str = "http://www.loc.gov/mads/rdf/v1#Topic";
pub const MADS_GEOGRAPHIC: &str = "http://www.loc.gov/mads/rdf/v1#Geographic";
pub const MADS_COMPLEX_SUBJECT: &str = "http://www.loc.gov/mads/rdf/v1#ComplexSubject";
pub const MADS_AUTHORITATIVE_LABEL: &str = "http://www.loc.gov/mads/rdf/v1#authoritativeLabel";
pub const MADS_BIRTH_DATE: &str = "http://www.loc.gov/mads/rdf/v1#birthDate";
pub const MADS_DEATH_DATE: &str = "http://www.loc.gov/mads/rdf/v1#deathDate";

pub const SCHEMA_BIRTH_DATE: &str = "http://schema.org/birthDate";
pub const SCHEMA_DEATH_DATE: &str = "http://schema.org/deathDate";

/// Properties whose values carry a person's life dates
pub const PERSON_DATE_PROPERTIES: &[&str] = &[
    BF_DATE,
    MADS_BIRTH_DATE,
    MADS_DEATH_DATE,
    SCHEMA_BIRTH_DATE,
    SCHEMA_DEATH_DATE,
];

/// File stem used for the partition of subjects without any rdf:type
pub const UNTYPED_PARTITION: &str = "untyped";

/// Returns the local name of an IRI (the part after the last `#` or `/`)
pub fn local_name(iri: &str) -> &str {
    let trimmed = iri.trim_end_matches(['/', '#']);
    match trimmed.rfind(['#', '/']) {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}
