//! Pack emission: renders the canonical graph through every enabled
//! projection spec and writes the resulting files.
//!
//! Emission is phase 2 of the run. The graph and config are frozen by the
//! time this crate sees them, so sources render on a rayon pool; every bit of
//! randomness inside a worker is a pure function of (seed, canonical id,
//! source), which keeps the output independent of scheduling.
//!
//! Structure:
//! - [`format`]: per-format byte renderers (CSV, JSON, XML, XLSX, JSONL)
//! - [`narrative`]: billing-note and document-body text, with the external
//!   producer seam and its deterministic fallback
//! - [`emit_pack`]: the driver

use std::io;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use thiserror::Error;

use lexfuse_core::{CanonicalGraph, ConfigError, GeneratorConfig, Value};
use lexfuse_project::{inventory, AliasRegistry, Projected, ProjectionSpec, Projector, SourceFormat};

pub mod format;
pub mod narrative;

pub use narrative::{NarrativeContext, TemplateProducer, TextProducer};

#[derive(Debug, Error)]
pub enum EmitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("csv rendering failed: {0}")]
    Csv(String),

    #[error("xml rendering failed")]
    Xml(#[from] quick_xml::Error),

    #[error("xlsx rendering failed")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("json rendering failed")]
    Json(#[from] serde_json::Error),
}

impl From<csv::Error> for EmitError {
    fn from(e: csv::Error) -> Self {
        EmitError::Csv(e.to_string())
    }
}

/// What one source produced.
#[derive(Debug)]
pub struct EmitOutcome {
    pub source: &'static str,
    pub files_written: usize,
    pub records: usize,
    /// Per-file failures; the run continues past them.
    pub failures: Vec<(PathBuf, String)>,
}

/// Result of a full emission pass, one outcome per enabled source.
#[derive(Debug)]
pub struct EmitReport {
    pub outcomes: Vec<EmitOutcome>,
}

impl EmitReport {
    pub fn all_ok(&self) -> bool {
        self.outcomes.iter().all(|o| o.failures.is_empty())
    }

    pub fn files_written(&self) -> usize {
        self.outcomes.iter().map(|o| o.files_written).sum()
    }

    pub fn records(&self) -> usize {
        self.outcomes.iter().map(|o| o.records).sum()
    }
}

/// Render every enabled source into `out_dir`.
///
/// Single-file sources fail atomically (an error on one leaves the others
/// intact); the per-entity text sources record individual file failures and
/// keep going. Configuration problems abort before anything is written.
pub fn emit_pack(
    graph: &CanonicalGraph,
    cfg: &GeneratorConfig,
    registry: &AliasRegistry,
    producer: &dyn TextProducer,
    out_dir: &Path,
) -> Result<EmitReport, EmitError> {
    let specs = inventory::enabled_specs(cfg)?;

    std::fs::create_dir_all(out_dir).map_err(|source| EmitError::Io {
        path: out_dir.to_path_buf(),
        source,
    })?;
    for spec in &specs {
        if matches!(spec.format, SourceFormat::TextPerMatter | SourceFormat::TextPerDocument) {
            let dir = out_dir.join(spec.file_name);
            std::fs::create_dir_all(&dir).map_err(|source| EmitError::Io { path: dir, source })?;
        }
    }

    let outcomes: Vec<EmitOutcome> = specs
        .into_par_iter()
        .map(|spec| emit_source(graph, cfg, registry, producer, out_dir, spec))
        .collect();

    for outcome in &outcomes {
        tracing::debug!(
            source = outcome.source,
            files = outcome.files_written,
            records = outcome.records,
            failures = outcome.failures.len(),
            "source emitted"
        );
    }
    Ok(EmitReport { outcomes })
}

fn emit_source(
    graph: &CanonicalGraph,
    cfg: &GeneratorConfig,
    registry: &AliasRegistry,
    producer: &dyn TextProducer,
    out_dir: &Path,
    spec: &'static ProjectionSpec,
) -> EmitOutcome {
    let result = match spec.format {
        SourceFormat::Csv | SourceFormat::Json | SourceFormat::Xml | SourceFormat::Xlsx => {
            emit_structured(graph, cfg, out_dir, spec)
        }
        SourceFormat::Jsonl => emit_emails(graph, cfg, registry, producer, out_dir, spec),
        SourceFormat::TextPerMatter => {
            return emit_billing_notes(graph, cfg, registry, producer, out_dir, spec)
        }
        SourceFormat::TextPerDocument => {
            return emit_doc_texts(graph, cfg, registry, producer, out_dir, spec)
        }
    };

    match result {
        Ok(records) => EmitOutcome {
            source: spec.source,
            files_written: 1,
            records,
            failures: Vec::new(),
        },
        Err(err) => {
            tracing::warn!(source = spec.source, error = %err, "source emission failed");
            EmitOutcome {
                source: spec.source,
                files_written: 0,
                records: 0,
                failures: vec![(out_dir.join(spec.file_name), err.to_string())],
            }
        }
    }
}

fn emit_structured(
    graph: &CanonicalGraph,
    cfg: &GeneratorConfig,
    out_dir: &Path,
    spec: &ProjectionSpec,
) -> Result<usize, EmitError> {
    let projector = Projector::new(graph, cfg);
    let records: Vec<Projected> = graph
        .entities(spec.kind)
        .iter()
        .map(|e| projector.project(e, spec))
        .collect();

    let bytes = match spec.format {
        SourceFormat::Csv => format::csv_bytes(spec, &records)?,
        SourceFormat::Json => format::json_bytes(&records)?,
        SourceFormat::Xml => format::xml_bytes(spec, &records)?,
        SourceFormat::Xlsx => format::xlsx_bytes(spec, &records)?,
        _ => unreachable!("emit_structured handles single-file tabular formats only"),
    };
    format::write_file_with_retry(&out_dir.join(spec.file_name), &bytes)?;
    Ok(records.len())
}

fn emit_emails(
    graph: &CanonicalGraph,
    cfg: &GeneratorConfig,
    registry: &AliasRegistry,
    producer: &dyn TextProducer,
    out_dir: &Path,
    spec: &ProjectionSpec,
) -> Result<usize, EmitError> {
    let projector = Projector::new(graph, cfg);
    let records: Vec<(Projected, String)> = inventory::email_documents(graph)
        .into_iter()
        .map(|doc| {
            let body = narrative::email_body(graph, cfg, registry, producer, doc);
            (projector.project(doc, spec), body)
        })
        .collect();

    let bytes = format::jsonl_bytes(&records)?;
    format::write_file_with_retry(&out_dir.join(spec.file_name), &bytes)?;
    Ok(records.len())
}

fn emit_billing_notes(
    graph: &CanonicalGraph,
    cfg: &GeneratorConfig,
    registry: &AliasRegistry,
    producer: &dyn TextProducer,
    out_dir: &Path,
    spec: &'static ProjectionSpec,
) -> EmitOutcome {
    let dir = out_dir.join(spec.file_name);
    let mut outcome = EmitOutcome {
        source: spec.source,
        files_written: 0,
        records: 0,
        failures: Vec::new(),
    };
    for matter in graph.entities(lexfuse_core::EntityKind::Matter) {
        let note = narrative::billing_note(graph, cfg, registry, producer, matter);
        let path = dir.join(format!("{}.txt", matter.canonical_id));
        match format::write_file_with_retry(&path, note.as_bytes()) {
            Ok(()) => {
                outcome.files_written += 1;
                outcome.records += 1;
            }
            Err(err) => outcome.failures.push((path, err.to_string())),
        }
    }
    outcome
}

fn emit_doc_texts(
    graph: &CanonicalGraph,
    cfg: &GeneratorConfig,
    registry: &AliasRegistry,
    producer: &dyn TextProducer,
    out_dir: &Path,
    spec: &'static ProjectionSpec,
) -> EmitOutcome {
    let dir = out_dir.join(spec.file_name);
    let mut outcome = EmitOutcome {
        source: spec.source,
        files_written: 0,
        records: 0,
        failures: Vec::new(),
    };
    for doc in graph.entities(lexfuse_core::EntityKind::Document) {
        let text = narrative::doc_text(graph, cfg, registry, producer, doc);
        let file_type = doc
            .get("file_type")
            .and_then(Value::as_str)
            .unwrap_or("txt");
        let path = dir.join(format!("{}_{}.txt", doc.canonical_id, file_type));
        match format::write_file_with_retry(&path, text.as_bytes()) {
            Ok(()) => {
                outcome.files_written += 1;
                outcome.records += 1;
            }
            Err(err) => outcome.failures.push((path, err.to_string())),
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexfuse_core::EntityKind;

    fn small_cfg() -> GeneratorConfig {
        let mut cfg = GeneratorConfig::default();
        cfg.counts.clients = 5;
        cfg.counts.matters = 8;
        cfg.counts.billing_entries = 24;
        cfg.counts.documents = 10;
        cfg
    }

    #[test]
    fn emit_pack_writes_every_enabled_source() {
        let cfg = small_cfg();
        let graph = CanonicalGraph::build(&cfg).unwrap();
        let registry = AliasRegistry::new();
        let dir = tempfile::tempdir().unwrap();

        let report =
            emit_pack(&graph, &cfg, &registry, &TemplateProducer, dir.path()).unwrap();
        assert!(report.all_ok());

        for name in [
            "structured_clients_A.csv",
            "structured_clients_B.json",
            "structured_clients_C.xml",
            "structured_clients_D.xlsx",
            "matters_A.csv",
            "matters_B.json",
            "billing_entries_A.csv",
            "document_metadata.json",
            "emails.jsonl",
        ] {
            assert!(dir.path().join(name).is_file(), "{name}");
        }
        assert_eq!(
            std::fs::read_dir(dir.path().join("billing_files")).unwrap().count(),
            graph.count(EntityKind::Matter)
        );
        assert_eq!(
            std::fs::read_dir(dir.path().join("documents")).unwrap().count(),
            graph.count(EntityKind::Document)
        );
    }

    #[test]
    fn reruns_are_byte_identical() {
        let cfg = small_cfg();
        let graph = CanonicalGraph::build(&cfg).unwrap();
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();

        emit_pack(&graph, &cfg, &AliasRegistry::new(), &TemplateProducer, a.path()).unwrap();
        emit_pack(&graph, &cfg, &AliasRegistry::new(), &TemplateProducer, b.path()).unwrap();

        for name in ["structured_clients_A.csv", "matters_B.json", "emails.jsonl"] {
            assert_eq!(
                std::fs::read(a.path().join(name)).unwrap(),
                std::fs::read(b.path().join(name)).unwrap(),
                "{name}"
            );
        }
        let note = "billing_files/MAT-1001.txt";
        assert_eq!(
            std::fs::read(a.path().join(note)).unwrap(),
            std::fs::read(b.path().join(note)).unwrap()
        );
    }

    #[test]
    fn source_selection_limits_the_output() {
        let mut cfg = small_cfg();
        cfg.sources = vec!["clients_a".to_string(), "matters_a".to_string()];
        let graph = CanonicalGraph::build(&cfg).unwrap();
        let dir = tempfile::tempdir().unwrap();

        let report = emit_pack(&graph, &cfg, &AliasRegistry::new(), &TemplateProducer, dir.path())
            .unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert!(dir.path().join("structured_clients_A.csv").is_file());
        assert!(!dir.path().join("structured_clients_B.json").exists());
    }

    #[test]
    fn unknown_source_aborts_before_writing() {
        let mut cfg = small_cfg();
        cfg.sources = vec!["bogus".to_string()];
        let graph = {
            let clean = small_cfg();
            CanonicalGraph::build(&clean).unwrap()
        };
        let dir = tempfile::tempdir().unwrap();
        let err = emit_pack(&graph, &cfg, &AliasRegistry::new(), &TemplateProducer, dir.path())
            .unwrap_err();
        assert!(matches!(err, EmitError::Config(ConfigError::UnknownSource(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
