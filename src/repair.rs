//! Repair of malformed local identifiers
//!
//! Locally minted IRIs whose local name starts with a digit
//! (`<ns>120632`) cannot be abbreviated to a prefixed name and break
//! downstream tooling. They are repaired by inserting a letter prefix right
//! after the namespace (`<ns>n120632`).
//!
//! Matching is anchored at the opening `<` of an IRI and done in a single
//! pass, so an identifier that extends a shorter one (`<ns>120632instance17`)
//! is repaired at its own boundary and never touched twice. The namespace
//! appearing as plain text inside a literal is left alone.

use regex::{Captures, Regex};
use serde::Serialize;
use std::borrow::Cow;

use url::Url;

use crate::error::PipelineError;

/// Default letter inserted before a numeric local name
pub const DEFAULT_PREFIX: &str = "n";

#[derive(Debug, Clone)]
pub struct LocalNameRepair {
    namespace: String,
    prefix: String,
    pattern: Regex,
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct RepairStats {
    pub lines: usize,
    pub repaired_lines: usize,
}

#[derive(Debug, Default)]
pub struct RepairResult {
    pub text: String,
    pub stats: RepairStats,
}

impl LocalNameRepair {
    /// Repair identifiers under `namespace` by inserting `prefix`
    ///
    /// The prefix must start with a letter, otherwise repairs would not be
    /// idempotent.
    pub fn new(namespace: &str, prefix: &str) -> Result<Self, PipelineError> {
        Url::parse(namespace).map_err(|_| PipelineError::InvalidNamespace(namespace.to_string()))?;
        if !prefix.chars().next().is_some_and(|c| c.is_alphabetic()) {
            return Err(PipelineError::Config(format!(
                "repair prefix '{}' must start with a letter",
                prefix
            )));
        }

        let pattern = Regex::new(&format!(r"<{}(\d)", regex::escape(namespace)))?;
        Ok(Self {
            namespace: namespace.to_string(),
            prefix: prefix.to_string(),
            pattern,
        })
    }

    /// Repair every malformed identifier in one line of statement text
    pub fn repair<'a>(&self, line: &'a str) -> Cow<'a, str> {
        self.pattern.replace_all(line, |caps: &Captures| {
            format!("<{}{}{}", self.namespace, self.prefix, &caps[1])
        })
    }

    /// Repair a whole document line by line, keeping line endings
    pub fn repair_text(&self, text: &str) -> RepairResult {
        let mut out = String::with_capacity(text.len());
        let mut stats = RepairStats::default();

        for line in text.split_inclusive('\n') {
            stats.lines += 1;
            let repaired = self.repair(line);
            if let Cow::Owned(_) = repaired {
                stats.repaired_lines += 1;
            }
            out.push_str(&repaired);
        }

        RepairResult { text: out, stats }
    }
}
