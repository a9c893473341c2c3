//! Authority lookup collaborators
//!
//! [`AuthorityLookup`] is the only seam through which reconciliation talks
//! to the outside world. This module provides:
//!
//! - [`HttpAuthorityLookup`]: a blocking client for reconciliation services
//!   speaking the OpenRefine reconciliation API
//! - [`StaticLookup`]: an in-memory table, loadable from a JSON file
//! - [`CachedLookup`]: a thread-safe cache around any other lookup
//! - [`OfflineLookup`]: always unavailable, for runs without an authority

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use url::Url;

use crate::classes::EntityClass;
use crate::error::{LookupError, PipelineError};
use crate::normalize::name_tokens;

/// A query against an authority service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupQuery {
    /// Name as found in the data
    pub text: String,
    pub class: EntityClass,
    /// Service-specific type to restrict the search to
    pub type_hint: Option<String>,
    /// Year tokens known for the entity
    pub years: Vec<String>,
    pub limit: usize,
}

/// One candidate returned by an authority service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub uri: String,
    pub label: String,
    /// Confidence in `0.0..=1.0`
    #[serde(default)]
    pub score: f64,
    /// The service itself considers this an exact match
    #[serde(default)]
    pub matched: bool,
}

impl Candidate {
    pub fn new(uri: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            label: label.into(),
            score: 1.0,
            matched: false,
        }
    }
}

/// Resolves names to ranked candidate authority URIs
///
/// Implementations are shared between worker threads.
pub trait AuthorityLookup: Send + Sync {
    fn lookup(&self, query: &LookupQuery) -> Result<Vec<Candidate>, LookupError>;
}

impl<L: AuthorityLookup + ?Sized> AuthorityLookup for Box<L> {
    fn lookup(&self, query: &LookupQuery) -> Result<Vec<Candidate>, LookupError> {
        (**self).lookup(query)
    }
}

/// Lookup used when no authority source is configured
#[derive(Debug, Default, Clone)]
pub struct OfflineLookup;

impl AuthorityLookup for OfflineLookup {
    fn lookup(&self, _query: &LookupQuery) -> Result<Vec<Candidate>, LookupError> {
        Err(LookupError::Unavailable(
            "no authority source configured".to_string(),
        ))
    }
}

/// In-memory authority table
///
/// Candidates are indexed by their name tokens without years, so a query for
/// "Twain, Mark" and one for "Twain, Mark, 1835-1910" find the same entries.
#[derive(Debug, Default, Clone)]
pub struct StaticLookup {
    entries: BTreeMap<String, Vec<Candidate>>,
}

impl StaticLookup {
    pub fn new(candidates: impl IntoIterator<Item = Candidate>) -> Self {
        let mut entries: BTreeMap<String, Vec<Candidate>> = BTreeMap::new();
        for candidate in candidates {
            let key = name_tokens(&candidate.label).join("_");
            if key.is_empty() {
                continue;
            }
            entries.entry(key).or_default().push(candidate);
        }
        Self { entries }
    }

    /// Load a JSON array of candidates
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::LoadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let candidates: Vec<Candidate> = serde_json::from_str(&content)?;
        Ok(Self::new(candidates))
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AuthorityLookup for StaticLookup {
    fn lookup(&self, query: &LookupQuery) -> Result<Vec<Candidate>, LookupError> {
        let key = name_tokens(&query.text).join("_");
        let found = self
            .entries
            .get(&key)
            .map(|c| c.iter().take(query.limit).cloned().collect())
            .unwrap_or_default();
        Ok(found)
    }
}

/// Caches successful responses of another lookup
///
/// Failures are not cached, so a later run of the same query may still
/// succeed.
pub struct CachedLookup<L> {
    inner: L,
    cache: RwLock<HashMap<LookupQuery, Vec<Candidate>>>,
}

impl<L: AuthorityLookup> CachedLookup<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn cached_queries(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl<L: AuthorityLookup> AuthorityLookup for CachedLookup<L> {
    fn lookup(&self, query: &LookupQuery) -> Result<Vec<Candidate>, LookupError> {
        if let Some(hit) = self
            .cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(query)
        {
            return Ok(hit.clone());
        }

        let candidates = self.inner.lookup(query)?;
        self.cache
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(query.clone(), candidates.clone());
        Ok(candidates)
    }
}

/// Upper bound of scores reported by reconciliation services
const SERVICE_SCORE_SCALE: f64 = 100.0;

/// Client for an OpenRefine-style reconciliation endpoint
///
/// Request: `POST <endpoint>` with form field `queries` set to
/// `{"q0": {"query": ..., "type": ..., "limit": ...}}`.
/// Response: `{"q0": {"result": [{"id", "name", "score", "match"}]}}`.
///
/// Service scores run from 0 to 100 and are rescaled to `0.0..=1.0`.
pub struct HttpAuthorityLookup {
    client: reqwest::blocking::Client,
    endpoint: Url,
    /// Base for candidate ids that are not absolute URLs
    identifier_space: Option<Url>,
}

#[derive(Debug, Deserialize)]
struct ServiceResult {
    #[serde(default)]
    result: Vec<ServiceCandidate>,
}

#[derive(Debug, Deserialize)]
struct ServiceCandidate {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    score: f64,
    #[serde(default, rename = "match")]
    matched: bool,
}

impl HttpAuthorityLookup {
    pub fn new(
        endpoint: &str,
        identifier_space: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, PipelineError> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| PipelineError::Config(format!("authority endpoint '{}': {}", endpoint, e)))?;
        let identifier_space = identifier_space
            .map(|s| {
                Url::parse(s)
                    .map_err(|e| PipelineError::Config(format!("identifier space '{}': {}", s, e)))
            })
            .transpose()?;

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            identifier_space,
        })
    }

    fn request_body(query: &LookupQuery) -> serde_json::Value {
        let mut q = serde_json::json!({
            "query": query.text,
            "limit": query.limit,
        });
        if let Some(hint) = &query.type_hint {
            q["type"] = serde_json::Value::String(hint.clone());
        }
        serde_json::json!({ "q0": q })
    }

    fn parse_response(&self, body: &str) -> Result<Vec<Candidate>, LookupError> {
        let mut results: HashMap<String, ServiceResult> = serde_json::from_str(body)
            .map_err(|e| LookupError::InvalidResponse(e.to_string()))?;
        let result = results
            .remove("q0")
            .ok_or_else(|| LookupError::InvalidResponse("missing q0 result".to_string()))?;

        Ok(result
            .result
            .into_iter()
            .filter_map(|c| {
                let uri = self.resolve_id(&c.id)?;
                Some(Candidate {
                    uri,
                    label: c.name,
                    score: (c.score / SERVICE_SCORE_SCALE).clamp(0.0, 1.0),
                    matched: c.matched,
                })
            })
            .collect())
    }

    fn resolve_id(&self, id: &str) -> Option<String> {
        match Url::parse(id) {
            Ok(url) => Some(url.to_string()),
            Err(_) => self
                .identifier_space
                .as_ref()
                .and_then(|base| base.join(id).ok())
                .map(|url| url.to_string()),
        }
    }
}

impl AuthorityLookup for HttpAuthorityLookup {
    fn lookup(&self, query: &LookupQuery) -> Result<Vec<Candidate>, LookupError> {
        let body = Self::request_body(query).to_string();

        let response = self
            .client
            .post(self.endpoint.clone())
            .form(&[("queries", body)])
            .send()
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Unavailable(format!(
                "{} returned HTTP {}",
                self.endpoint, status
            )));
        }

        let text = response.text().map_err(map_transport_error)?;
        self.parse_response(&text)
    }
}

fn map_transport_error(e: reqwest::Error) -> LookupError {
    if e.is_timeout() {
        LookupError::Timeout
    } else {
        LookupError::Unavailable(e.to_string())
    }
}
