//! Cross-reference validation of an emitted pack.
//!
//! Phase 3 of a run: after every source has been written, the pack is read
//! back from disk and checked against the canonical graph. Structured ID
//! fields must resolve byte-for-byte; narrative ID-like tokens may diverge,
//! but only through the alias registry. Findings are itemized, never fatal.

use std::collections::HashSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use regex::Regex;
use thiserror::Error;

use lexfuse_core::{CanonicalGraph, ConfigError, EntityKind, GeneratorConfig};
use lexfuse_project::{inventory, AliasRegistry, FieldRole, ProjectionSpec, SourceFormat};

pub mod readers;

use readers::RawRecord;

#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("csv parsing failed: {0}")]
    Csv(String),

    #[error("xml parsing failed")]
    Xml(#[from] quick_xml::Error),

    #[error("xlsx parsing failed: {0}")]
    Xlsx(String),

    #[error("json parsing failed")]
    Json(#[from] serde_json::Error),

    // Field deliberately not named `source`: thiserror reserves that name
    // for the error cause chain.
    #[error("source {src} is missing column {column}")]
    MissingColumn { src: &'static str, column: String },

    #[error("source {src} has an unexpected shape: {detail}")]
    Shape { src: &'static str, detail: String },

    #[error("invalid token pattern")]
    Pattern(#[from] regex::Error),
}

/// Info findings are expected divergence (aliases); Error findings mean the
/// pack's structured layer does not resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Discrepancy {
    pub severity: Severity,
    pub source: &'static str,
    pub message: String,
}

/// Itemized validation outcome for one pack.
#[derive(Debug, Default)]
pub struct DiscrepancyReport {
    pub items: Vec<Discrepancy>,
    pub files_checked: usize,
    pub records_checked: usize,
    /// Narrative tokens that matched a canonical id directly.
    pub tokens_resolved: usize,
    /// Narrative tokens that resolved through the alias registry.
    pub tokens_aliased: usize,
}

impl DiscrepancyReport {
    /// Clean means no Error-severity findings; Info items (alias sightings)
    /// are expected.
    pub fn is_clean(&self) -> bool {
        self.error_count() == 0
    }

    pub fn error_count(&self) -> usize {
        self.items
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    fn push(&mut self, severity: Severity, source: &'static str, message: String) {
        self.items.push(Discrepancy {
            severity,
            source,
            message,
        });
    }
}

/// Read every enabled source back from `pack_dir` and check it against the
/// graph. Only infrastructure problems (unreadable or unparseable files,
/// bad config) surface as `Err`; resolution failures land in the report.
pub fn validate(
    graph: &CanonicalGraph,
    cfg: &GeneratorConfig,
    registry: &AliasRegistry,
    pack_dir: &Path,
) -> Result<DiscrepancyReport, ValidateError> {
    let specs = inventory::enabled_specs(cfg)?;
    let scanner = TokenScanner::new(cfg)?;
    let mut report = DiscrepancyReport::default();

    for spec in specs {
        let path = pack_dir.join(spec.file_name);
        match spec.format {
            SourceFormat::Csv => {
                let records = readers::read_csv(&path, spec)?;
                check_structured(graph, spec, &records, &mut report);
                report.files_checked += 1;
            }
            SourceFormat::Json => {
                let records = readers::read_json(&path, spec)?;
                check_structured(graph, spec, &records, &mut report);
                report.files_checked += 1;
            }
            SourceFormat::Xml => {
                let records = readers::read_xml(&path, spec)?;
                check_structured(graph, spec, &records, &mut report);
                report.files_checked += 1;
            }
            SourceFormat::Xlsx => {
                let records = readers::read_xlsx(&path, spec)?;
                check_structured(graph, spec, &records, &mut report);
                report.files_checked += 1;
            }
            SourceFormat::Jsonl => {
                let records = readers::read_jsonl(&path, spec)?;
                let structured: Vec<RawRecord> =
                    records.iter().map(|(r, _)| RawRecord {
                        id: r.id.clone(),
                        fks: r.fks.clone(),
                    }).collect();
                check_structured(graph, spec, &structured, &mut report);
                for (record, body) in &records {
                    let context = record.id.as_deref().unwrap_or("<no id>");
                    scanner.check_text(graph, registry, spec.source, context, body, &mut report);
                }
                report.files_checked += 1;
            }
            SourceFormat::TextPerMatter | SourceFormat::TextPerDocument => {
                let dir = pack_dir.join(spec.file_name);
                let expected = match spec.format {
                    SourceFormat::TextPerMatter => graph.count(EntityKind::Matter),
                    _ => graph.count(EntityKind::Document),
                };
                let files = readers::read_text_dir(&dir)?;
                if files.len() != expected {
                    report.push(
                        Severity::Error,
                        spec.source,
                        format!("expected {expected} text files, found {}", files.len()),
                    );
                }
                for (name, text) in &files {
                    scanner.check_text(graph, registry, spec.source, name, text, &mut report);
                }
                report.files_checked += files.len();
                report.records_checked += files.len();
            }
        }
    }

    tracing::info!(
        files = report.files_checked,
        records = report.records_checked,
        errors = report.error_count(),
        aliased = report.tokens_aliased,
        "pack validated"
    );
    Ok(report)
}

/// Repopulate an alias registry for a pack that was emitted in an earlier
/// process. Alias derivation is a pure function of (seed, canonical id), so
/// replaying every narrative context reproduces exactly the aliases the
/// emitter handed out.
pub fn replay_aliases(graph: &CanonicalGraph, cfg: &GeneratorConfig) -> AliasRegistry {
    let registry = AliasRegistry::new();
    for matter in graph.entities(EntityKind::Matter) {
        for context in ["billing_note", "doc_text", "email_body"] {
            registry.narrative_id(cfg, &matter.canonical_id, context);
        }
    }
    registry
}

fn check_structured(
    graph: &CanonicalGraph,
    spec: &'static ProjectionSpec,
    records: &[RawRecord],
    report: &mut DiscrepancyReport,
) {
    let expected = if spec.source == "emails" {
        inventory::email_documents(graph).len()
    } else {
        graph.count(spec.kind)
    };
    if records.len() != expected {
        report.push(
            Severity::Error,
            spec.source,
            format!("expected {expected} records, found {}", records.len()),
        );
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for record in records {
        report.records_checked += 1;

        let Some(id) = record.id.as_deref().filter(|s| !s.is_empty()) else {
            report.push(
                Severity::Error,
                spec.source,
                "record with empty ID field".to_string(),
            );
            continue;
        };
        if !seen.insert(id) {
            report.push(
                Severity::Error,
                spec.source,
                format!("duplicate id {id}"),
            );
        }
        match graph.get(id) {
            Some(entity) if entity.kind == spec.kind => {}
            Some(entity) => report.push(
                Severity::Error,
                spec.source,
                format!("id {id} resolves to a {}, expected a {}", entity.kind.name(), spec.kind.name()),
            ),
            None => report.push(
                Severity::Error,
                spec.source,
                format!("id {id} does not resolve to any canonical entity"),
            ),
        }

        for (field, value) in &record.fks {
            let FieldRole::ForeignKey(expected_kind) = field.role else {
                continue;
            };
            if value.is_empty() {
                report.push(
                    Severity::Error,
                    spec.source,
                    format!("{id}: foreign key {} is empty", field.target),
                );
                continue;
            }
            match graph.get(value) {
                Some(target) if target.kind == expected_kind => {}
                Some(target) => report.push(
                    Severity::Error,
                    spec.source,
                    format!(
                        "{id}: foreign key {} = {value} resolves to a {}, expected a {}",
                        field.target,
                        target.kind.name(),
                        expected_kind.name()
                    ),
                ),
                None => report.push(
                    Severity::Error,
                    spec.source,
                    format!("{id}: foreign key {} = {value} does not resolve", field.target),
                ),
            }
        }

        if spec.source == "documents" {
            check_document_consistency(graph, spec, record, id, report);
        }
    }
}

/// A document's client field must agree with its matter's client.
fn check_document_consistency(
    graph: &CanonicalGraph,
    spec: &'static ProjectionSpec,
    record: &RawRecord,
    id: &str,
    report: &mut DiscrepancyReport,
) {
    let fk = |target: &str| -> Option<&str> {
        record
            .fks
            .iter()
            .find(|(f, _)| f.target == target)
            .map(|(_, v)| v.as_str())
    };
    let (Some(matter_id), Some(client_id)) = (fk("matter_id"), fk("client")) else {
        return;
    };
    let Some(matter_client) = graph.get(matter_id).and_then(|m| m.fk("client_id")) else {
        return;
    };
    if matter_client != client_id {
        report.push(
            Severity::Error,
            spec.source,
            format!("{id}: client {client_id} disagrees with matter {matter_id}'s client {matter_client}"),
        );
    }
}

/// Scanner for ID-like tokens in free text.
///
/// Only tokens with a known prefix count: the four canonical prefixes plus
/// whatever the alias rule maps onto. Attorney initials and other hyphenated
/// codes are left alone.
struct TokenScanner {
    pattern: Regex,
    known_prefixes: HashSet<String>,
}

impl TokenScanner {
    fn new(cfg: &GeneratorConfig) -> Result<Self, ValidateError> {
        let mut known_prefixes: HashSet<String> = EntityKind::ALL
            .iter()
            .map(|k| k.prefix().to_string())
            .collect();
        for (_, alias_prefix) in &cfg.noise.alias_rule.prefix_map {
            known_prefixes.insert(alias_prefix.clone());
        }
        Ok(Self {
            pattern: Regex::new(r"\b([A-Z]{1,4})-(\d+)\b")?,
            known_prefixes,
        })
    }

    fn check_text(
        &self,
        graph: &CanonicalGraph,
        registry: &AliasRegistry,
        source: &'static str,
        context: &str,
        text: &str,
        report: &mut DiscrepancyReport,
    ) {
        // Classify each distinct token once per text.
        let mut seen: HashSet<&str> = HashSet::new();
        for capture in self.pattern.captures_iter(text) {
            let token = capture.get(0).map(|m| m.as_str()).unwrap_or_default();
            let prefix = capture.get(1).map(|m| m.as_str()).unwrap_or_default();
            if !self.known_prefixes.contains(prefix) || !seen.insert(token) {
                continue;
            }

            if graph.get(token).is_some() {
                report.tokens_resolved += 1;
            } else if let Some(canonical) = registry.resolve(token) {
                report.tokens_aliased += 1;
                report.push(
                    Severity::Info,
                    source,
                    format!("{context}: token {token} is an alias of {canonical}"),
                );
            } else {
                report.push(
                    Severity::Error,
                    source,
                    format!("{context}: token {token} resolves to nothing"),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexfuse_core::AliasRule;
    use lexfuse_emit::{emit_pack, TemplateProducer};

    fn small_cfg() -> GeneratorConfig {
        let mut cfg = GeneratorConfig::default();
        cfg.counts.clients = 5;
        cfg.counts.matters = 8;
        cfg.counts.billing_entries = 24;
        cfg.counts.documents = 10;
        cfg
    }

    fn emitted_pack(cfg: &GeneratorConfig) -> (CanonicalGraph, AliasRegistry, tempfile::TempDir) {
        let graph = CanonicalGraph::build(cfg).unwrap();
        let registry = AliasRegistry::new();
        let dir = tempfile::tempdir().unwrap();
        let report = emit_pack(&graph, cfg, &registry, &TemplateProducer, dir.path()).unwrap();
        assert!(report.all_ok());
        (graph, registry, dir)
    }

    #[test]
    fn untampered_pack_is_clean() {
        let cfg = small_cfg();
        let (graph, registry, dir) = emitted_pack(&cfg);
        let report = validate(&graph, &cfg, &registry, dir.path()).unwrap();
        assert!(report.is_clean(), "{:#?}", report.items);
        assert!(report.records_checked > 0);
    }

    #[test]
    fn aliases_surface_as_info_not_error() {
        let mut cfg = small_cfg();
        cfg.noise.p_alias = 1.0;
        cfg.noise.alias_rule = AliasRule {
            prefix_map: vec![("MAT".to_string(), "MTR".to_string())],
            suffix_offset: 0,
        };
        let (graph, registry, dir) = emitted_pack(&cfg);
        let report = validate(&graph, &cfg, &registry, dir.path()).unwrap();
        assert!(report.is_clean(), "{:#?}", report.items);
        assert!(report.tokens_aliased > 0);
        assert!(report
            .items
            .iter()
            .any(|d| d.severity == Severity::Info && d.message.contains("MTR-")));
    }

    #[test]
    fn tampered_foreign_key_is_an_error() {
        let cfg = small_cfg();
        let (graph, registry, dir) = emitted_pack(&cfg);

        let billing = dir.path().join("billing_entries_A.csv");
        let tampered = std::fs::read_to_string(&billing)
            .unwrap()
            .replacen("MAT-1001", "MAT-9999", 1);
        std::fs::write(&billing, tampered).unwrap();

        let report = validate(&graph, &cfg, &registry, dir.path()).unwrap();
        assert!(!report.is_clean());
        assert!(report.items.iter().any(|d| {
            d.severity == Severity::Error
                && d.source == "billing_a"
                && d.message.contains("MAT-9999")
        }));
    }

    #[test]
    fn duplicated_record_is_an_error() {
        let cfg = small_cfg();
        let (graph, registry, dir) = emitted_pack(&cfg);

        let matters = dir.path().join("matters_A.csv");
        let mut text = std::fs::read_to_string(&matters).unwrap();
        let last_row = text.trim_end().lines().last().unwrap().to_string();
        text.push_str(&last_row);
        text.push('\n');
        std::fs::write(&matters, text).unwrap();

        let report = validate(&graph, &cfg, &registry, dir.path()).unwrap();
        assert!(report.items.iter().any(|d| {
            d.severity == Severity::Error
                && d.source == "matters_a"
                && d.message.contains("duplicate")
        }));
    }

    #[test]
    fn attorney_codes_are_not_id_like() {
        let cfg = small_cfg();
        let graph = CanonicalGraph::build(&cfg).unwrap();
        let registry = AliasRegistry::new();
        let scanner = TokenScanner::new(&cfg).unwrap();
        let mut report = DiscrepancyReport::default();
        scanner.check_text(
            &graph,
            &registry,
            "billing_notes",
            "MAT-1001.txt",
            "Attorney ID: AT-001 on matter MAT-1001",
            &mut report,
        );
        assert!(report.is_clean(), "{:#?}", report.items);
        assert_eq!(report.tokens_resolved, 1);
    }
}
