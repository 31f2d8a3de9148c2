//! The built-in source inventory.
//!
//! Field names and file layout are fixed per source and documented here;
//! downstream fusion tooling matches on them exactly. Changing a target path
//! is a breaking change to the pack schema.

use lexfuse_core::{CanonicalEntity, CanonicalGraph, ConfigError, EntityKind, GeneratorConfig, ValueCategory};

use crate::spec::{FieldMap, FieldRole, ProjectionSpec, SourceFormat};

use FieldRole::{Descriptive, ForeignKey, PrimaryKey};
use ValueCategory::{Currency, Date, Id, Label, Number, Phone, Text};

const CLIENTS_A: [FieldMap; 6] = [
    FieldMap::field("client_id", "client_id", PrimaryKey, Id),
    FieldMap::field("company_name", "company_name", Descriptive, Text),
    FieldMap::field("industry", "industry", Descriptive, Label),
    FieldMap::field("annual_revenue", "annual_revenue", Descriptive, Currency),
    FieldMap::field("contact_phone", "contact_phone", Descriptive, Phone),
    FieldMap::field("created_at", "created_at", Descriptive, Date),
];

const CLIENTS_B: [FieldMap; 7] = [
    FieldMap::field("client_id", "id", PrimaryKey, Id),
    FieldMap::field("company_name", "custFullNm", Descriptive, Text),
    FieldMap::field("industry", "sector", Descriptive, Label),
    FieldMap::field("annual_revenue", "financials.turnover", Descriptive, Currency),
    FieldMap::constant("financials.currency", "USD"),
    FieldMap::field("contact_phone", "phone", Descriptive, Phone),
    FieldMap::field("created_at", "meta.registered_on", Descriptive, Date),
];

const CLIENTS_C: [FieldMap; 5] = [
    // `cid` is written as an attribute on each <Entity> element.
    FieldMap::field("client_id", "cid", PrimaryKey, Id),
    FieldMap::field("company_name", "nm", Descriptive, Text),
    FieldMap::field("annual_revenue", "annual_turnover", Descriptive, Currency),
    FieldMap::field("industry", "cat", Descriptive, Label),
    FieldMap::field("contact_phone", "phone", Descriptive, Phone),
];

const CLIENTS_D: [FieldMap; 6] = [
    FieldMap::field("client_id", "cust_code", PrimaryKey, Id),
    FieldMap::field("company_name", "clientName", Descriptive, Text),
    FieldMap::field("industry", "industry", Descriptive, Label),
    FieldMap::field("annual_revenue", "revenue", Descriptive, Currency),
    FieldMap::field("contact_phone", "phone", Descriptive, Phone),
    FieldMap::field("created_at", "created", Descriptive, Date),
];

const MATTERS_A: [FieldMap; 7] = [
    FieldMap::field("matter_id", "matter_id", PrimaryKey, Id),
    FieldMap::field("client_id", "client_ref", ForeignKey(EntityKind::Client), Id),
    FieldMap::field("title", "title", Descriptive, Text),
    FieldMap::field("practice_area", "practice_area", Descriptive, Label),
    FieldMap::field("opened_on", "opened_on", Descriptive, Date),
    FieldMap::field("lead_attorney", "lead_attorney", Descriptive, Text),
    FieldMap::field("estimated_value", "estimated_value", Descriptive, Currency),
];

const MATTERS_B: [FieldMap; 6] = [
    FieldMap::field("matter_id", "file_no", PrimaryKey, Id),
    FieldMap::field("client_id", "client_id", ForeignKey(EntityKind::Client), Id),
    FieldMap::field("title", "matterSummary", Descriptive, Text),
    FieldMap::field("practice_area", "area", Descriptive, Label),
    FieldMap::field("opened_on", "startDate", Descriptive, Date),
    FieldMap::field("lead_attorney", "owner", Descriptive, Text),
];

const BILLING_A: [FieldMap; 8] = [
    FieldMap::field("entry_id", "entry_id", PrimaryKey, Id),
    FieldMap::field("matter_id", "file_id", ForeignKey(EntityKind::Matter), Id),
    FieldMap::field("att_id", "att_id", Descriptive, Text),
    FieldMap::field("hours", "hours", Descriptive, Number),
    FieldMap::field("rate", "rate", Descriptive, Number),
    FieldMap::field("amount", "amount", Descriptive, Currency),
    FieldMap::field("description", "description", Descriptive, Text),
    FieldMap::field("entry_date", "entry_date", Descriptive, Date),
];

const DOCUMENTS: [FieldMap; 8] = [
    FieldMap::field("doc_id", "doc_id", PrimaryKey, Id),
    FieldMap::field("matter_id", "matter_id", ForeignKey(EntityKind::Matter), Id),
    FieldMap::field("client_id", "client", ForeignKey(EntityKind::Client), Id),
    FieldMap::field("doc_type", "doc_type", Descriptive, Label),
    FieldMap::field("title", "title", Descriptive, Text),
    FieldMap::field("created", "created", Descriptive, Date),
    FieldMap::field("uploaded_by", "uploaded_by", Descriptive, Text),
    FieldMap::field("file_type", "file_type", Descriptive, Label),
];

const EMAILS: [FieldMap; 5] = [
    // Correspondence documents exported as a mail feed; the message id *is*
    // the document's canonical id, which keeps the feed resolvable.
    FieldMap::field("doc_id", "msg_id", PrimaryKey, Id),
    FieldMap::field("matter_id", "matter_ref", ForeignKey(EntityKind::Matter), Id),
    FieldMap::field("uploaded_by", "from", Descriptive, Text),
    FieldMap::field("created", "sent_at", Descriptive, Date),
    FieldMap::field("title", "subject", Descriptive, Text),
];

static SPECS: [ProjectionSpec; 11] = [
    ProjectionSpec {
        source: "clients_a",
        kind: EntityKind::Client,
        format: SourceFormat::Csv,
        file_name: "structured_clients_A.csv",
        fields: &CLIENTS_A,
    },
    ProjectionSpec {
        source: "clients_b",
        kind: EntityKind::Client,
        format: SourceFormat::Json,
        file_name: "structured_clients_B.json",
        fields: &CLIENTS_B,
    },
    ProjectionSpec {
        source: "clients_c",
        kind: EntityKind::Client,
        format: SourceFormat::Xml,
        file_name: "structured_clients_C.xml",
        fields: &CLIENTS_C,
    },
    ProjectionSpec {
        source: "clients_d",
        kind: EntityKind::Client,
        format: SourceFormat::Xlsx,
        file_name: "structured_clients_D.xlsx",
        fields: &CLIENTS_D,
    },
    ProjectionSpec {
        source: "matters_a",
        kind: EntityKind::Matter,
        format: SourceFormat::Csv,
        file_name: "matters_A.csv",
        fields: &MATTERS_A,
    },
    ProjectionSpec {
        source: "matters_b",
        kind: EntityKind::Matter,
        format: SourceFormat::Json,
        file_name: "matters_B.json",
        fields: &MATTERS_B,
    },
    ProjectionSpec {
        source: "billing_a",
        kind: EntityKind::BillingEntry,
        format: SourceFormat::Csv,
        file_name: "billing_entries_A.csv",
        fields: &BILLING_A,
    },
    ProjectionSpec {
        source: "documents",
        kind: EntityKind::Document,
        format: SourceFormat::Json,
        file_name: "document_metadata.json",
        fields: &DOCUMENTS,
    },
    ProjectionSpec {
        source: "emails",
        kind: EntityKind::Document,
        format: SourceFormat::Jsonl,
        file_name: "emails.jsonl",
        fields: &EMAILS,
    },
    ProjectionSpec {
        source: "billing_notes",
        kind: EntityKind::Matter,
        format: SourceFormat::TextPerMatter,
        file_name: "billing_files",
        fields: &[],
    },
    ProjectionSpec {
        source: "doc_texts",
        kind: EntityKind::Document,
        format: SourceFormat::TextPerDocument,
        file_name: "documents",
        fields: &[],
    },
];

pub fn all_specs() -> &'static [ProjectionSpec] {
    &SPECS
}

pub fn spec(source: &str) -> Option<&'static ProjectionSpec> {
    SPECS.iter().find(|s| s.source == source)
}

/// The specs a config enables (an empty `sources` list means all of them).
/// Unknown names are a fatal configuration error.
pub fn enabled_specs(cfg: &GeneratorConfig) -> Result<Vec<&'static ProjectionSpec>, ConfigError> {
    if cfg.sources.is_empty() {
        return Ok(SPECS.iter().collect());
    }
    cfg.sources
        .iter()
        .map(|name| spec(name).ok_or_else(|| ConfigError::UnknownSource(name.clone())))
        .collect()
}

pub fn check_sources(cfg: &GeneratorConfig) -> Result<(), ConfigError> {
    enabled_specs(cfg).map(|_| ())
}

/// Documents that appear in the `emails` feed: correspondence only.
pub fn email_documents(graph: &CanonicalGraph) -> Vec<&CanonicalEntity> {
    graph
        .entities(EntityKind::Document)
        .iter()
        .filter(|d| d.get("doc_type").and_then(|v| v.as_str()) == Some("Correspondence"))
        .collect()
}
