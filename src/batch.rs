//! Batch execution over files and stage directories
//!
//! Each stage reads the previous stage's output and writes a new stage
//! directory under an output root:
//!
//! ```text
//! repaired/<name>.nt
//! split/<name>/<partition>.nt        + partitions.json
//! deduped/<name>/<partition>.nt      + partitions.json, merge-map.json, report.json
//! reconciled/<name>/<partition>.nt   + partitions.json, authorities.json, report.json
//! ```
//!
//! Lines the reader could not parse travel alongside as `unparsed.nt`.
//! Input files are independent and processed in parallel. Stage entry points
//! log environment failures and return `None`; earlier stage directories are
//! never touched.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::lookup::AuthorityLookup;
use crate::ntriples::{read_file, write_file};
use crate::pipeline::{Partitions, Pipeline};
use crate::reconcile::{ReconcileStats, Resolution};
use crate::split::{partition_file_stems, Partition};

pub const REPAIRED_DIR: &str = "repaired";
pub const SPLIT_DIR: &str = "split";
pub const DEDUPED_DIR: &str = "deduped";
pub const RECONCILED_DIR: &str = "reconciled";

pub const MANIFEST_FILE: &str = "partitions.json";
pub const UNPARSED_FILE: &str = "unparsed.nt";
const UNPARSED_STEM: &str = "unparsed";
pub const MERGE_MAP_FILE: &str = "merge-map.json";
pub const REPORT_FILE: &str = "report.json";
pub const AUTHORITIES_FILE: &str = "authorities.json";

const STATEMENT_EXTENSION: &str = "nt";

/// Create (if needed) the directory for `stage` under `root`
pub fn provision(root: &Path, stage: &str) -> Result<PathBuf, PipelineError> {
    let dir = root.join(stage);
    fs::create_dir_all(&dir).map_err(|e| PipelineError::OutputLocation {
        path: dir.clone(),
        reason: e.to_string(),
    })?;
    Ok(dir)
}

fn provision_dir(dir: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(dir).map_err(|e| PipelineError::OutputLocation {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })
}

/// N-Triples files to process: the file itself, or every `.nt` file
/// directly inside a directory, sorted
pub fn statement_files(input: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        return Err(PipelineError::InvalidPath(input.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(input)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == STATEMENT_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Partition directories to process: the directory itself if it holds a
/// manifest, otherwise every subdirectory that does, sorted
pub fn partition_dirs(input: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    if !input.is_dir() {
        return Err(PipelineError::InvalidPath(input.to_path_buf()));
    }
    if input.join(MANIFEST_FILE).is_file() {
        return Ok(vec![input.to_path_buf()]);
    }

    let mut dirs = Vec::new();
    for entry in fs::read_dir(input)? {
        let path = entry?.path();
        if path.join(MANIFEST_FILE).is_file() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn name_of(path: &Path) -> Result<String, PipelineError> {
    let name = if path.is_dir() {
        path.file_name()
    } else {
        path.file_stem()
    };
    name.and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| PipelineError::InvalidPath(path.to_path_buf()))
}

/// Partitions of one input, as stored on disk
#[derive(Debug, Default)]
pub struct PartitionDir {
    pub partitions: Partitions,
    pub unparsed: Vec<String>,
}

/// `partitions.json`: file name → type IRI, `null` for untyped subjects
type Manifest = BTreeMap<String, Option<String>>;

pub fn read_partition_dir(dir: &Path) -> Result<PartitionDir, PipelineError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let content = fs::read_to_string(&manifest_path).map_err(|e| PipelineError::LoadError {
        path: manifest_path.display().to_string(),
        reason: e.to_string(),
    })?;
    let manifest: Manifest = serde_json::from_str(&content)?;

    let mut result = PartitionDir::default();
    for (file, type_uri) in manifest {
        let doc = read_file(&dir.join(&file))?;
        let partition = match type_uri {
            Some(uri) => Partition::Typed(uri),
            None => Partition::Untyped,
        };
        result
            .unparsed
            .extend(doc.rejected.into_iter().map(|(_, line)| line));
        result.partitions.entry(partition).or_default().extend(doc.statements);
    }

    let unparsed_path = dir.join(UNPARSED_FILE);
    if unparsed_path.is_file() {
        let text = fs::read_to_string(&unparsed_path)?;
        result.unparsed.extend(text.lines().map(str::to_string));
    }
    Ok(result)
}

pub fn write_partition_dir(
    dir: &Path,
    partitions: &Partitions,
    unparsed: &[String],
) -> Result<(), PipelineError> {
    provision_dir(dir)?;

    let mut manifest = Manifest::new();
    for (partition, stem) in partition_file_stems(partitions, &[UNPARSED_STEM]) {
        let file = format!("{}.{}", stem, STATEMENT_EXTENSION);
        if let Some(statements) = partitions.get(&partition) {
            write_file(statements, &dir.join(&file))?;
        }
        manifest.insert(file, partition.type_uri().map(str::to_string));
    }
    write_json(&dir.join(MANIFEST_FILE), &manifest)?;

    if !unparsed.is_empty() {
        let mut text = unparsed.join("\n");
        text.push('\n');
        fs::write(dir.join(UNPARSED_FILE), text)?;
    }
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PipelineError> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Log a failed stage and reduce the result to the stage directory
fn finish(stage: &str, result: Result<PathBuf, PipelineError>) -> Option<PathBuf> {
    match result {
        Ok(dir) => {
            tracing::info!(stage, dir = %dir.display(), "stage complete");
            Some(dir)
        }
        Err(e) => {
            tracing::error!(stage, error = %e, "stage failed");
            None
        }
    }
}

/// Repair malformed local names in every input file
pub fn process_repair(input: &Path, output_root: &Path, pipeline: &Pipeline) -> Option<PathBuf> {
    finish(REPAIRED_DIR, repair_stage(input, output_root, pipeline))
}

fn repair_stage(input: &Path, output_root: &Path, pipeline: &Pipeline) -> Result<PathBuf, PipelineError> {
    let files = statement_files(input)?;
    let out = provision(output_root, REPAIRED_DIR)?;

    files
        .par_iter()
        .map(|file| -> Result<(), PipelineError> {
            let text = fs::read_to_string(file).map_err(|e| PipelineError::LoadError {
                path: file.display().to_string(),
                reason: e.to_string(),
            })?;
            let result = pipeline.repair(&text);
            let target = out.join(format!("{}.{}", name_of(file)?, STATEMENT_EXTENSION));
            fs::write(&target, &result.text)?;
            tracing::info!(
                file = %file.display(),
                lines = result.stats.lines,
                repaired = result.stats.repaired_lines,
                "repaired local names"
            );
            Ok(())
        })
        .collect::<Result<Vec<()>, PipelineError>>()?;

    Ok(out)
}

/// Split every input file into per-type partitions
pub fn process_split(input: &Path, output_root: &Path, pipeline: &Pipeline) -> Option<PathBuf> {
    finish(SPLIT_DIR, split_stage(input, output_root, pipeline))
}

fn split_stage(input: &Path, output_root: &Path, pipeline: &Pipeline) -> Result<PathBuf, PipelineError> {
    let files = statement_files(input)?;
    let out = provision(output_root, SPLIT_DIR)?;

    files
        .par_iter()
        .map(|file| -> Result<(), PipelineError> {
            let doc = read_file(file)?;
            let result = pipeline.split(&doc.statements);
            let unparsed: Vec<String> = doc.rejected.into_iter().map(|(_, line)| line).collect();
            write_partition_dir(&out.join(name_of(file)?), &result.partitions, &unparsed)?;
            tracing::info!(
                file = %file.display(),
                subjects = result.stats.subjects,
                untyped = result.stats.untyped_subjects,
                partitions = result.stats.partitions,
                unparsed = unparsed.len(),
                "split by subject type"
            );
            Ok(())
        })
        .collect::<Result<Vec<()>, PipelineError>>()?;

    Ok(out)
}

/// Deduplicate every split input, writing the merge map and statistics
pub fn process_dedupe(input: &Path, output_root: &Path, pipeline: &Pipeline) -> Option<PathBuf> {
    finish(DEDUPED_DIR, dedupe_stage(input, output_root, pipeline))
}

fn dedupe_stage(input: &Path, output_root: &Path, pipeline: &Pipeline) -> Result<PathBuf, PipelineError> {
    let dirs = partition_dirs(input)?;
    let out = provision(output_root, DEDUPED_DIR)?;

    dirs.par_iter()
        .map(|dir| -> Result<(), PipelineError> {
            let loaded = read_partition_dir(dir)?;
            let result = pipeline.dedupe(&loaded.partitions);
            let target = out.join(name_of(dir)?);
            write_partition_dir(&target, &result.partitions, &loaded.unparsed)?;
            write_json(&target.join(MERGE_MAP_FILE), &result.merge_map.to_json())?;
            write_json(&target.join(REPORT_FILE), &result.stats)?;
            tracing::info!(
                input = %dir.display(),
                merged = result.merge_map.len(),
                "deduplicated entities"
            );
            Ok(())
        })
        .collect::<Result<Vec<()>, PipelineError>>()?;

    Ok(out)
}

/// `authorities.json`: outcome per reconciled subject and minted IRIs
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorityReport {
    pub resolutions: BTreeMap<String, ResolutionEntry>,
    pub minted: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionEntry {
    Resolved(String),
    Unresolved(String),
}

impl From<&Resolution> for ResolutionEntry {
    fn from(resolution: &Resolution) -> Self {
        match resolution {
            Resolution::Resolved(uri) => ResolutionEntry::Resolved(uri.clone()),
            Resolution::Unresolved(reason) => {
                ResolutionEntry::Unresolved(reason.as_str().to_string())
            }
        }
    }
}

/// Reconcile every deduplicated input against `lookup`
pub fn process_reconcile(
    input: &Path,
    output_root: &Path,
    pipeline: &Pipeline,
    lookup: &dyn AuthorityLookup,
) -> Option<PathBuf> {
    finish(RECONCILED_DIR, reconcile_stage(input, output_root, pipeline, lookup))
}

fn reconcile_stage(
    input: &Path,
    output_root: &Path,
    pipeline: &Pipeline,
    lookup: &dyn AuthorityLookup,
) -> Result<PathBuf, PipelineError> {
    let dirs = partition_dirs(input)?;
    let out = provision(output_root, RECONCILED_DIR)?;

    let stats = dirs
        .par_iter()
        .map(|dir| -> Result<ReconcileStats, PipelineError> {
            let loaded = read_partition_dir(dir)?;
            let result = pipeline.reconcile(&loaded.partitions, lookup);
            let target = out.join(name_of(dir)?);
            write_partition_dir(&target, &result.partitions, &loaded.unparsed)?;

            let report = AuthorityReport {
                resolutions: result
                    .results
                    .iter()
                    .map(|(subject, resolution)| (subject.to_string(), resolution.into()))
                    .collect(),
                minted: result
                    .renames
                    .iter()
                    .map(|(from, to)| (from.to_string(), to.to_string()))
                    .collect(),
            };
            write_json(&target.join(AUTHORITIES_FILE), &report)?;
            write_json(&target.join(REPORT_FILE), &result.stats)?;
            tracing::info!(
                input = %dir.display(),
                attempted = result.stats.attempted,
                resolved = result.stats.resolved,
                minted = result.renames.len(),
                "reconciled entities"
            );
            Ok(result.stats)
        })
        .collect::<Result<Vec<ReconcileStats>, PipelineError>>()?;

    let mut total = ReconcileStats::default();
    for s in &stats {
        total.add(s);
    }
    tracing::info!(
        inputs = stats.len(),
        resolved = total.resolved,
        unresolved = total.unresolved,
        lookup_failures = total.lookup_failures,
        "reconciliation summary"
    );

    Ok(out)
}

/// Run every stage in order, stopping at the first failed stage
pub fn process_all(
    input: &Path,
    output_root: &Path,
    pipeline: &Pipeline,
    lookup: &dyn AuthorityLookup,
) -> Option<PathBuf> {
    let repaired = process_repair(input, output_root, pipeline)?;
    let split = process_split(&repaired, output_root, pipeline)?;
    let deduped = process_dedupe(&split, output_root, pipeline)?;
    process_reconcile(&deduped, output_root, pipeline, lookup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::lookup::{Candidate, StaticLookup};
    use crate::statement::{Statement, StatementSet, Term};
    use crate::vocab::{BF_PERSON, RDFS_LABEL, RDF_TYPE};

    const SAMPLE: &str = r#"<http://example.org/bib/120632> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://id.loc.gov/ontologies/bibframe/Work> .
<http://example.org/bib/120632> <http://id.loc.gov/ontologies/bibframe/contributor> _:a1 .
<http://example.org/bib/120632> <http://id.loc.gov/ontologies/bibframe/contributor> _:a2 .
_:a1 <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://id.loc.gov/ontologies/bibframe/Person> .
_:a1 <http://www.w3.org/2000/01/rdf-schema#label> "Twain, Mark, 1835-1910" .
_:a2 <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://id.loc.gov/ontologies/bibframe/Person> .
_:a2 <http://www.w3.org/2000/01/rdf-schema#label> "Twain, Mark, 1835-1910." .
<http://example.org/bib/note> <http://www.w3.org/2000/01/rdf-schema#comment> "no type" .
not a statement
"#;

    fn pipeline() -> Pipeline {
        let config = Config {
            local_namespace: Some("http://example.org/bib/".to_string()),
            ..Default::default()
        };
        Pipeline::new(&config).unwrap()
    }

    fn authorities() -> StaticLookup {
        StaticLookup::new([Candidate::new(
            "http://id.loc.gov/authorities/names/n79021164",
            "Twain, Mark, 1835-1910",
        )])
    }

    #[test]
    fn test_process_all_layout() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::write(input.path().join("catalog.nt"), SAMPLE).unwrap();
        fs::write(input.path().join("readme.txt"), "ignored").unwrap();

        let result = process_all(input.path(), output.path(), &pipeline(), &authorities()).unwrap();
        assert_eq!(result, output.path().join(RECONCILED_DIR));

        let repaired = fs::read_to_string(output.path().join("repaired/catalog.nt")).unwrap();
        assert!(repaired.contains("<http://example.org/bib/n120632>"));
        assert!(!output.path().join("repaired/readme.nt").exists());

        let split = output.path().join("split/catalog");
        let manifest: Manifest =
            serde_json::from_str(&fs::read_to_string(split.join(MANIFEST_FILE)).unwrap()).unwrap();
        assert_eq!(manifest.get("Person.nt"), Some(&Some(BF_PERSON.to_string())));
        assert_eq!(manifest.get("untyped.nt"), Some(&None));
        assert_eq!(
            fs::read_to_string(split.join(UNPARSED_FILE)).unwrap(),
            "not a statement\n"
        );

        let deduped = output.path().join("deduped/catalog");
        let merge_map: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(deduped.join(MERGE_MAP_FILE)).unwrap()).unwrap();
        assert_eq!(merge_map.get("_:a2").map(String::as_str), Some("_:a1"));
        assert!(deduped.join(REPORT_FILE).is_file());

        let reconciled = result.join("catalog");
        let report: AuthorityReport =
            serde_json::from_str(&fs::read_to_string(reconciled.join(AUTHORITIES_FILE)).unwrap())
                .unwrap();
        assert_eq!(
            report.resolutions.get("_:a1"),
            Some(&ResolutionEntry::Resolved(
                "http://id.loc.gov/authorities/names/n79021164".to_string()
            ))
        );
        assert!(reconciled.join(UNPARSED_FILE).is_file());

        let persons = read_file(&reconciled.join("Person.nt")).unwrap().statements;
        assert!(persons.iter().any(|s| s.predicate.ends_with("#sameAs")));
    }

    #[test]
    fn test_partition_dir_keeps_untyped_and_unparsed() {
        let dir = tempfile::tempdir().unwrap();
        let subject = Term::blank("p");
        let typed: StatementSet = [
            Statement::new(subject.clone(), RDF_TYPE, Term::iri(BF_PERSON)),
            Statement::new(subject.clone(), RDFS_LABEL, Term::literal("Twain, Mark")),
        ]
        .into_iter()
        .collect();
        let untyped: StatementSet = [Statement::new(
            Term::iri("http://example.org/x"),
            RDFS_LABEL,
            Term::literal("x"),
        )]
        .into_iter()
        .collect();
        let partitions = Partitions::from([
            (Partition::Typed(BF_PERSON.to_string()), typed),
            (Partition::Untyped, untyped),
        ]);

        let target = dir.path().join("one");
        write_partition_dir(&target, &partitions, &["broken line".to_string()]).unwrap();
        let loaded = read_partition_dir(&target).unwrap();
        assert_eq!(loaded.partitions, partitions);
        assert_eq!(loaded.unparsed, vec!["broken line".to_string()]);
        assert_eq!(partition_dirs(dir.path()).unwrap(), vec![target]);
    }

    #[test]
    fn test_partition_dir_with_clashing_local_names() {
        let dir = tempfile::tempdir().unwrap();
        let partitions: Partitions = [
            "http://example.org/a/Topic",
            "http://example.org/b/Topic",
            "http://example.org/c/Topic-2",
            "http://example.org/d/unparsed",
        ]
        .into_iter()
        .enumerate()
        .map(|(i, uri)| {
            let subject = Term::blank(format!("s{}", i));
            let statements: StatementSet = [
                Statement::new(subject.clone(), RDF_TYPE, Term::iri(uri)),
                Statement::new(subject, RDFS_LABEL, Term::literal(uri)),
            ]
            .into_iter()
            .collect();
            (Partition::Typed(uri.to_string()), statements)
        })
        .collect();

        let target = dir.path().join("clash");
        write_partition_dir(&target, &partitions, &["broken line".to_string()]).unwrap();
        let loaded = read_partition_dir(&target).unwrap();
        assert_eq!(loaded.partitions, partitions);
        assert_eq!(loaded.unparsed, vec!["broken line".to_string()]);
    }

    #[test]
    fn test_unwritable_output_location() {
        let input = tempfile::tempdir().unwrap();
        fs::write(input.path().join("catalog.nt"), SAMPLE).unwrap();
        let blocker = tempfile::NamedTempFile::new().unwrap();

        assert!(matches!(
            provision(blocker.path(), REPAIRED_DIR),
            Err(PipelineError::OutputLocation { .. })
        ));
        assert!(process_repair(input.path(), blocker.path(), &pipeline()).is_none());
        assert!(process_all(input.path(), blocker.path(), &pipeline(), &authorities()).is_none());
    }

    #[test]
    fn test_missing_input() {
        let output = tempfile::tempdir().unwrap();
        let missing = output.path().join("missing.nt");
        assert!(process_split(&missing, output.path(), &pipeline()).is_none());
        assert!(process_dedupe(&missing, output.path(), &pipeline()).is_none());
    }
}
