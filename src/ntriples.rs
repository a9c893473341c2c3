//! N-Triples reading and writing
//!
//! Line-based format: `<subject> <predicate> <object> .`
//!
//! Parsing and formatting are done by Rio. Each line is parsed on its own so
//! that a malformed line never takes its neighbours down with it: lines that
//! cannot be parsed are returned verbatim in [`ParsedDocument::rejected`] so
//! the caller can pass them through.

use rio_api::formatter::TriplesFormatter;
use rio_api::model as rio;
use rio_api::parser::TriplesParser;
use rio_turtle::{NTriplesFormatter, NTriplesParser};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::PipelineError;
use crate::statement::{Statement, StatementSet, Term};

type ParseError = Box<dyn std::error::Error + Send + Sync>;

/// Result of parsing an N-Triples document
#[derive(Debug, Default)]
pub struct ParsedDocument {
    pub statements: StatementSet,
    /// Unparseable lines as (1-based line number, original text)
    pub rejected: Vec<(usize, String)>,
}

/// Parse an N-Triples document
///
/// `source` only labels warnings.
pub fn read_statements(text: &str, source: &str) -> ParsedDocument {
    let mut doc = ParsedDocument::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_line(line) {
            Ok(statement) => {
                doc.statements.insert(statement);
            }
            Err(reason) => {
                tracing::warn!(source, line = idx + 1, %reason, "passing through unparseable line");
                doc.rejected.push((idx + 1, raw.to_string()));
            }
        }
    }

    doc
}

/// Parse a single N-Triples line
pub fn parse_line(line: &str) -> Result<Statement, String> {
    let mut parsed = Vec::new();
    NTriplesParser::new(line.as_bytes())
        .parse_all(&mut |triple| -> Result<(), ParseError> {
            parsed.push(from_rio(&triple)?);
            Ok(())
        })
        .map_err(|e| e.to_string())?;

    let mut parsed = parsed.into_iter();
    match (parsed.next(), parsed.next()) {
        (Some(statement), None) => Ok(statement),
        (None, _) => Err("no statement on line".to_string()),
        (Some(_), Some(_)) => Err("more than one statement on line".to_string()),
    }
}

fn from_rio(triple: &rio::Triple<'_>) -> Result<Statement, String> {
    let subject = match triple.subject {
        rio::Subject::NamedNode(n) => Term::iri(n.iri),
        rio::Subject::BlankNode(b) => Term::blank(b.id),
        rio::Subject::Triple(_) => return Err("quoted triples are not supported".to_string()),
    };
    let object = match triple.object {
        rio::Term::NamedNode(n) => Term::iri(n.iri),
        rio::Term::BlankNode(b) => Term::blank(b.id),
        rio::Term::Literal(rio::Literal::Simple { value }) => Term::literal(value),
        rio::Term::Literal(rio::Literal::LanguageTaggedString { value, language }) => {
            Term::lang_literal(value, language)
        }
        rio::Term::Literal(rio::Literal::Typed { value, datatype }) => {
            Term::typed_literal(value, datatype.iri)
        }
        rio::Term::Triple(_) => return Err("quoted triples are not supported".to_string()),
    };
    Ok(Statement::new(subject, triple.predicate.iri, object))
}

/// Serialize statements, one per line, in set order
pub fn write_statements<W: Write>(statements: &StatementSet, writer: W) -> std::io::Result<()> {
    let mut formatter = NTriplesFormatter::new(writer);
    for statement in statements {
        let subject = statement.subject.as_rio_subject().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("literal subject in statement: {}", statement),
            )
        })?;
        formatter.format(&rio::Triple {
            subject,
            predicate: rio::NamedNode {
                iri: statement.predicate.as_str(),
            },
            object: statement.object.as_rio(),
        })?;
    }
    formatter.finish()?;
    Ok(())
}

/// Render statements as N-Triples text
pub fn to_string(statements: &StatementSet) -> String {
    let mut out = String::new();
    for statement in statements {
        out.push_str(&statement.to_string());
        out.push('\n');
    }
    out
}

/// Read and parse an N-Triples file
pub fn read_file(path: &Path) -> Result<ParsedDocument, PipelineError> {
    let text = fs::read_to_string(path).map_err(|e| PipelineError::LoadError {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(read_statements(&text, &path.display().to_string()))
}

/// Write statements to an N-Triples file, replacing it
pub fn write_file(statements: &StatementSet, path: &Path) -> Result<(), PipelineError> {
    let file = fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    write_statements(statements, &mut writer)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::{RDFS_LABEL, RDF_TYPE};

    #[test]
    fn test_parse_iri_triple() {
        let line = "<http://example.org/a> <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <http://id.loc.gov/ontologies/bibframe/Person> .";
        let s = parse_line(line).unwrap();
        assert_eq!(s.subject, Term::iri("http://example.org/a"));
        assert_eq!(s.predicate, RDF_TYPE);
        assert_eq!(
            s.object,
            Term::iri("http://id.loc.gov/ontologies/bibframe/Person")
        );
    }

    #[test]
    fn test_parse_literals() {
        let s = parse_line(r#"_:b0 <http://www.w3.org/2000/01/rdf-schema#label> "Twain, Mark, 1835-1910" ."#)
            .unwrap();
        assert_eq!(s.subject, Term::blank("b0"));
        assert_eq!(s.object, Term::literal("Twain, Mark, 1835-1910"));

        let s = parse_line(r#"_:b0 <http://x.org/p> "Clémence \"C\""@fr ."#).unwrap();
        assert_eq!(s.object, Term::lang_literal("Clémence \"C\"", "fr"));

        let s = parse_line(
            r#"_:b0 <http://x.org/p> "1892"^^<http://www.w3.org/2001/XMLSchema#gYear> ."#,
        )
        .unwrap();
        assert_eq!(
            s.object,
            Term::typed_literal("1892", "http://www.w3.org/2001/XMLSchema#gYear")
        );
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(parse_line("<http://x.org/s> <http://x.org/p>").is_err());
        assert!(parse_line(r#""lit" <http://x.org/p> <http://x.org/o> ."#).is_err());
        assert!(parse_line("<http://x.org/s> _:p <http://x.org/o> .").is_err());
        assert!(parse_line("<http://x.org/s> <http://x.org/p> <http://x.org/o>").is_err());
    }

    #[test]
    fn test_read_passes_through_rejected_lines() {
        let text = format!(
            "# comment\n<http://x.org/s> <{}> \"A\" .\n\nthis is not a triple\n",
            RDFS_LABEL
        );
        let doc = read_statements(&text, "test");
        assert_eq!(doc.statements.len(), 1);
        assert_eq!(doc.rejected, vec![(4, "this is not a triple".to_string())]);
    }

    #[test]
    fn test_written_output_parses_back() {
        let text = concat!(
            "<http://x.org/s> <http://x.org/p> \"line\\nbreak\" .\n",
            "_:b1 <http://x.org/p> <http://x.org/o> .\n",
        );
        let doc = read_statements(text, "test");
        let reparsed = read_statements(&to_string(&doc.statements), "test");
        assert_eq!(doc.statements, reparsed.statements);
        assert!(reparsed.rejected.is_empty());
    }
}
