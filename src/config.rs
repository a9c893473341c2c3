//! Pipeline configuration
//!
//! Loaded from a JSON file; every field has a default so a partial file
//! (or none at all) is valid. Command-line flags override file values.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::classes::{ClassTable, EntityClass};
use crate::error::PipelineError;
use crate::lookup::{AuthorityLookup, CachedLookup, HttpAuthorityLookup, OfflineLookup, StaticLookup};
use crate::repair::DEFAULT_PREFIX;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Namespace of locally minted identifiers; enables local-name repair
    pub local_namespace: Option<String>,
    pub repair_prefix: String,
    /// Type IRI → entity class table
    pub classes: ClassTable,
    pub authority: Option<AuthorityConfig>,
    /// JSON array of candidates used as a static authority table
    pub authority_file: Option<PathBuf>,
    /// Minimum candidate score for generic entities
    pub min_score: f64,
    /// Namespace for IRIs minted for unresolved blank nodes
    pub mint_namespace: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            local_namespace: None,
            repair_prefix: DEFAULT_PREFIX.to_string(),
            classes: ClassTable::default(),
            authority: None,
            authority_file: None,
            min_score: 0.9,
            mint_namespace: None,
        }
    }
}

/// Remote reconciliation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorityConfig {
    pub endpoint: String,
    /// Base IRI for candidate ids the service returns as bare local names
    #[serde(default)]
    pub identifier_space: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Service type to search per entity class
    #[serde(default)]
    pub type_hints: BTreeMap<EntityClass, String>,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_limit() -> usize {
    10
}

impl AuthorityConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            identifier_space: None,
            timeout_secs: default_timeout_secs(),
            limit: default_limit(),
            type_hints: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::LoadError {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        for ns in [&self.local_namespace, &self.mint_namespace].into_iter().flatten() {
            Url::parse(ns).map_err(|_| PipelineError::InvalidNamespace(ns.clone()))?;
        }
        if let Some(authority) = &self.authority {
            Url::parse(&authority.endpoint).map_err(|e| {
                PipelineError::Config(format!("authority endpoint '{}': {}", authority.endpoint, e))
            })?;
            if authority.timeout_secs == 0 {
                return Err(PipelineError::Config(
                    "authority timeout must be at least one second".to_string(),
                ));
            }
        }
        if !self.min_score.is_finite() {
            return Err(PipelineError::Config("min_score must be finite".to_string()));
        }
        Ok(())
    }

    /// Result limit passed with each lookup
    pub fn lookup_limit(&self) -> usize {
        self.authority
            .as_ref()
            .map(|a| a.limit)
            .unwrap_or_else(default_limit)
    }

    pub fn type_hint(&self, class: EntityClass) -> Option<String> {
        self.authority
            .as_ref()
            .and_then(|a| a.type_hints.get(&class).cloned())
    }

    /// Build the authority lookup described by this configuration
    ///
    /// A remote endpoint takes precedence over a static file; without
    /// either, every lookup reports the authority as unavailable.
    pub fn build_lookup(&self) -> Result<Box<dyn AuthorityLookup>, PipelineError> {
        if let Some(authority) = &self.authority {
            let http = HttpAuthorityLookup::new(
                &authority.endpoint,
                authority.identifier_space.as_deref(),
                Duration::from_secs(authority.timeout_secs),
            )?;
            tracing::info!(endpoint = %authority.endpoint, "using remote authority service");
            return Ok(Box::new(CachedLookup::new(http)));
        }
        if let Some(path) = &self.authority_file {
            let table = StaticLookup::from_file(path)?;
            tracing::info!(path = %path.display(), entries = table.len(), "using static authority table");
            return Ok(Box::new(table));
        }
        tracing::info!("no authority source configured; all entities stay unresolved");
        Ok(Box::new(OfflineLookup))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "local_namespace": "http://example.org/bib/",
                "authority": {{
                    "endpoint": "http://localhost:8000/reconcile",
                    "type_hints": {{"person": "PersonalName"}}
                }}
            }}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.local_namespace.as_deref(), Some("http://example.org/bib/"));
        assert_eq!(config.repair_prefix, "n");
        assert_eq!(config.classes, ClassTable::default());
        assert_eq!(config.lookup_limit(), 10);
        assert_eq!(config.type_hint(EntityClass::Person).as_deref(), Some("PersonalName"));
        assert_eq!(config.type_hint(EntityClass::Topic), None);
        assert_eq!(config.authority.unwrap().timeout_secs, 10);
    }

    #[test]
    fn test_invalid_namespace_rejected() {
        let config = Config {
            mint_namespace: Some("local/".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidNamespace(_))
        ));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let config = Config {
            authority: Some(AuthorityConfig::new("::nope")),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_static_authority_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"uri": "http://id.loc.gov/authorities/subjects/sh85114629", "label": "Rivers"}}]"#
        )
        .unwrap();

        let config = Config {
            authority_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let lookup = config.build_lookup().unwrap();
        let found = lookup
            .lookup(&crate::lookup::LookupQuery {
                text: "Rivers".to_string(),
                class: EntityClass::Topic,
                type_hint: None,
                years: vec![],
                limit: 10,
            })
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
