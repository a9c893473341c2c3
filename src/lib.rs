//! Bibliographic Graph Reconciliation Library
//!
//! This library cleans bibliographic RDF (BIBFRAME-style N-Triples) and links
//! its agents and subjects to external authority files.
//!
//! # Overview
//!
//! Catalog conversions produce one blank node or local IRI per heading
//! occurrence, so the same person, body or topic appears many times with
//! slightly different spellings. The pipeline:
//!
//! 1. Repairs locally minted identifiers whose local name starts with a digit
//! 2. Splits statements into one partition per subject type
//! 3. Normalizes authority names and merges subjects that share a key
//! 4. Looks each canonical subject up in an authority service and records
//!    accepted matches as `owl:sameAs` links
//!
//! Which types are deduplicated and reconciled, and with which rules, is
//! decided by an explicit [`ClassTable`].
//!
//! # Usage
//!
//! ## Run every stage on one document
//!
//! ```ignore
//! use bibgraph_reconcile::{Config, Pipeline};
//!
//! let config = Config::from_file(Path::new("reconcile.json"))?;
//! let pipeline = Pipeline::new(&config)?;
//! let lookup = config.build_lookup()?;
//!
//! let output = pipeline.run(&text, "catalog.nt", lookup.as_ref());
//! for (partition, statements) in &output.partitions {
//!     println!("{}: {} statements", partition, statements.len());
//! }
//! ```
//!
//! ## Process a directory stage by stage
//!
//! ```ignore
//! use bibgraph_reconcile::batch::{process_dedupe, process_split};
//!
//! let split = process_split(Path::new("input/"), Path::new("out/"), &pipeline)
//!     .ok_or("split failed")?;
//! process_dedupe(&split, Path::new("out/"), &pipeline);
//! ```

pub mod batch;
pub mod classes;
pub mod config;
pub mod dedupe;
pub mod error;
pub mod lookup;
pub mod normalize;
pub mod ntriples;
pub mod pipeline;
pub mod reconcile;
pub mod repair;
pub mod split;
pub mod statement;
pub mod vocab;

// Re-export main types for convenience
pub use crate::batch::{
    process_all, process_dedupe, process_reconcile, process_repair, process_split, provision,
};
pub use crate::classes::{ClassRule, ClassTable, EntityClass};
pub use crate::config::{AuthorityConfig, Config};
pub use crate::dedupe::{deduper_for, Deduper, MergeMap};
pub use crate::error::{LookupError, PipelineError};
pub use crate::lookup::{
    AuthorityLookup, CachedLookup, Candidate, HttpAuthorityLookup, LookupQuery, OfflineLookup,
    StaticLookup,
};
pub use crate::normalize::{normalize, normalize_key};
pub use crate::pipeline::{Pipeline, PipelineOutput, PipelineStats};
pub use crate::reconcile::{reconciler_for, Reconciler, Resolution, UnresolvedReason};
pub use crate::repair::LocalNameRepair;
pub use crate::split::{split, Partition, TypeLookup};
pub use crate::statement::{Statement, StatementSet, Term};
