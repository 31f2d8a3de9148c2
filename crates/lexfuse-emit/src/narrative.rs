//! Narrative text: the external producer interface and the deterministic
//! fallback templates.
//!
//! The producer is invoked out of band from the core's point of view: a call
//! that errors (or, for the HTTP-backed producer, times out) falls back to
//! the template output. The substitution is logged but never fatal, and the
//! engine treats both origins as an interchangeable string.

use lexfuse_core::{encode_date, CanonicalEntity, CanonicalGraph, DateEncoding, GeneratorConfig, Value};
use lexfuse_project::drift::{self, drift_description};
use lexfuse_project::AliasRegistry;

/// What a narrative producer gets to work with.
#[derive(Debug, Clone)]
pub struct NarrativeContext<'a> {
    /// `billing_summary`, `document_body`, or `email_body`.
    pub kind: &'static str,
    pub client_name: &'a str,
    pub industry: &'a str,
    pub matter_title: &'a str,
    pub doc_type: Option<&'a str>,
    pub entry_count: usize,
}

/// External narrative text collaborator.
pub trait TextProducer: Send + Sync {
    fn produce_text(&self, ctx: &NarrativeContext<'_>) -> anyhow::Result<String>;
}

/// Deterministic template producer; also the fallback for every other
/// producer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateProducer;

impl TextProducer for TemplateProducer {
    fn produce_text(&self, ctx: &NarrativeContext<'_>) -> anyhow::Result<String> {
        let text = match ctx.kind {
            "billing_summary" => format!(
                "This file consolidates billing activity for '{}' on behalf of client {}, \
                 a corporate entity in the {} space. {} time entries are itemized above.",
                ctx.matter_title, ctx.client_name, ctx.industry, ctx.entry_count
            ),
            "document_body" => format!(
                "This {} sets out the terms and conditions agreed between {} and the \
                 counterparties to '{}'. The document contains standard legal language \
                 and provisions typical of commercial agreements in the {} industry.",
                ctx.doc_type.unwrap_or("document").to_lowercase(),
                ctx.client_name,
                ctx.matter_title,
                ctx.industry
            ),
            _ => format!(
                "Please find attached the latest materials for '{}'. Let us know if \
                 anything needs revisiting before the next review cycle.",
                ctx.matter_title
            ),
        };
        Ok(text)
    }
}

/// Run the producer, substituting the template output when it fails. The
/// substitution is observable in the logs, never fatal.
pub fn produce_or_fallback(producer: &dyn TextProducer, ctx: &NarrativeContext<'_>) -> String {
    match producer.produce_text(ctx) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            tracing::warn!(kind = ctx.kind, "narrative producer returned empty text, using template");
            fallback(ctx)
        }
        Err(err) => {
            tracing::warn!(kind = ctx.kind, error = %err, "narrative producer failed, using template");
            fallback(ctx)
        }
    }
}

fn fallback(ctx: &NarrativeContext<'_>) -> String {
    TemplateProducer
        .produce_text(ctx)
        .unwrap_or_else(|_| "Generated legal document content.".to_string())
}

/// Ollama-backed producer, mirroring the original pack generator's local
/// endpoint. Errors and timeouts surface as `Err` and are absorbed by
/// [`produce_or_fallback`].
#[cfg(feature = "ollama")]
pub struct OllamaProducer {
    endpoint: String,
    model: String,
    client: reqwest::blocking::Client,
}

#[cfg(feature = "ollama")]
impl OllamaProducer {
    pub fn new(endpoint: &str, model: &str, timeout: std::time::Duration) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            client,
        })
    }
}

#[cfg(feature = "ollama")]
impl TextProducer for OllamaProducer {
    fn produce_text(&self, ctx: &NarrativeContext<'_>) -> anyhow::Result<String> {
        let prompt = match ctx.kind {
            "billing_summary" => format!(
                "Generate a brief professional legal billing narrative (2-3 sentences) for \
                 matter '{}' on behalf of {} ({} industry, {} entries). Return only the text.",
                ctx.matter_title, ctx.client_name, ctx.industry, ctx.entry_count
            ),
            "document_body" => format!(
                "Generate a short legal {} (3-4 paragraphs) for client {} regarding '{}'. \
                 Return only the text.",
                ctx.doc_type.unwrap_or("document").to_lowercase(),
                ctx.client_name,
                ctx.matter_title
            ),
            _ => format!(
                "Write a short professional email body about the legal matter '{}'. \
                 Return only the text.",
                ctx.matter_title
            ),
        };

        let response: serde_json::Value = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
            }))
            .send()?
            .error_for_status()?
            .json()?;
        Ok(response["response"].as_str().unwrap_or_default().trim().to_string())
    }
}

fn attr<'a>(entity: &'a CanonicalEntity, field: &str) -> &'a str {
    entity.get(field).and_then(Value::as_str).unwrap_or_default()
}

fn iso_date(entity: &CanonicalEntity, field: &str) -> String {
    match entity.get(field) {
        Some(Value::Date(d)) => encode_date(*d, DateEncoding::Iso).render(),
        _ => String::new(),
    }
}

fn number(entity: &CanonicalEntity, field: &str) -> f64 {
    match entity.get(field) {
        Some(Value::Number(n)) | Some(Value::Currency(n)) => *n,
        _ => 0.0,
    }
}

/// Whether a matter's narrative artifacts use the noisy rendering (aliases,
/// drifted wording). Gated by the same fraction that drives aliasing, so
/// roughly `p_alias` of narratives diverge lexically.
fn is_noisy(cfg: &GeneratorConfig, canonical_id: &str) -> bool {
    lexfuse_core::fraction(cfg.seed, &["alias", canonical_id]) < cfg.noise.p_alias
}

/// Build one plain-text billing summary for a matter, in the layout the
/// downstream profiler expects: headed sections, itemized entries, then the
/// produced narrative.
pub fn billing_note(
    graph: &CanonicalGraph,
    cfg: &GeneratorConfig,
    registry: &AliasRegistry,
    producer: &dyn TextProducer,
    matter: &CanonicalEntity,
) -> String {
    let matter_id = matter.canonical_id.as_str();
    let client = matter
        .fk("client_id")
        .and_then(|id| graph.get(id));
    let client_id = client.map(|c| c.canonical_id.as_str()).unwrap_or_default();
    let client_name = client.map(|c| attr(c, "company_name")).unwrap_or_default();
    let industry = client.map(|c| attr(c, "industry")).unwrap_or_default();

    let noisy = is_noisy(cfg, matter_id);
    let narrative_matter_id = registry.narrative_id(cfg, matter_id, "billing_note");
    let simulated_format = *lexfuse_core::pick(cfg.seed, &["sim-format", matter_id], &["PDF", "DOCX", "TXT"]);

    let title = attr(matter, "title");
    let title_variants = drift::title_variants(title, cfg.noise.drift_variants);
    let shown_title = if noisy {
        drift::narrative_pick(cfg.seed, matter_id, "billing_note", &title_variants)
    } else {
        title
    };
    let name_variants = drift::name_variants(client_name, cfg.noise.drift_variants);
    let shown_name = if noisy {
        drift::narrative_pick(cfg.seed, client_id, "billing_note", &name_variants)
    } else {
        client_name
    };

    let entries: Vec<&CanonicalEntity> = graph.billing_for_matter(matter_id).collect();
    let total_hours: f64 = entries.iter().map(|e| number(e, "hours")).sum();
    let total_amount: f64 = entries.iter().map(|e| number(e, "amount")).sum();

    let mut lines = vec![
        format!("Billing Summary for Matter {matter_id}"),
        format!("Simulated_Format: {simulated_format}"),
        String::new(),
        format!("matter_id: {narrative_matter_id}"),
        format!("ClientId: {client_id}"),
        String::new(),
        "[Client Information]".to_string(),
        format!("client_name: {shown_name}"),
        format!("Canonical client_id: {client_id}"),
        format!("Canonical Client Name: {client_name}"),
        format!("industry: {industry}"),
        String::new(),
        "[Matter Information]".to_string(),
        format!("Case Title (narrative): {shown_title}"),
        format!("Formal Matter Title: {title}"),
        format!("Practice Area: {}", attr(matter, "practice_area")),
        format!("Lead Counsel: {}", attr(matter, "lead_attorney")),
        format!("Opened On: {}", iso_date(matter, "opened_on")),
        String::new(),
        "[Billing Entries]".to_string(),
    ];

    for entry in entries.iter().take(5) {
        let description = attr(entry, "description");
        lines.push(format!("- Entry ID: {}", entry.canonical_id));
        lines.push(format!("  Attorney ID: {}", attr(entry, "att_id")));
        lines.push(format!("  Hours Billed: {}", number(entry, "hours")));
        lines.push(format!("  Hourly Rate: {}", number(entry, "rate")));
        lines.push(format!("  Amount: {}", number(entry, "amount")));
        if noisy {
            lines.push(format!("  Work Description: {}", drift_description(description)));
            lines.push(format!("  Original Description: {description}"));
        } else {
            lines.push(format!("  Work Description: {description}"));
        }
        lines.push(format!("  Entry Date (raw): {}", iso_date(entry, "entry_date")));
        lines.push(String::new());
    }

    // Noisy notes misreport their totals by a seeded factor, so reported
    // figures need not match the itemized entries above.
    let totals_factor = if noisy {
        *lexfuse_core::pick(cfg.seed, &["totals", matter_id], &[0.9, 1.05, 1.1])
    } else {
        1.0
    };
    lines.push("[Totals]".to_string());
    lines.push(format!("Total Hours (reported): {:.2}", total_hours * totals_factor));
    lines.push(format!("Total Amount (reported): {:.2}", total_amount * totals_factor));
    if noisy {
        lines.push("Note: reported totals may not align with the itemized entries.".to_string());
    }
    lines.push(String::new());

    let ctx = NarrativeContext {
        kind: "billing_summary",
        client_name: shown_name,
        industry,
        matter_title: shown_title,
        doc_type: None,
        entry_count: entries.len(),
    };
    lines.push("[Narrative Summary]".to_string());
    lines.push(produce_or_fallback(producer, &ctx));
    lines.push(String::new());

    lines.join("\n")
}

/// Build one plain-text document body with its metadata header.
pub fn doc_text(
    graph: &CanonicalGraph,
    cfg: &GeneratorConfig,
    registry: &AliasRegistry,
    producer: &dyn TextProducer,
    doc: &CanonicalEntity,
) -> String {
    let matter = doc.fk("matter_id").and_then(|id| graph.get(id));
    let client = doc.fk("client_id").and_then(|id| graph.get(id));
    let matter_id = matter.map(|m| m.canonical_id.as_str()).unwrap_or_default();
    let narrative_matter_id = registry.narrative_id(cfg, matter_id, "doc_text");

    let ctx = NarrativeContext {
        kind: "document_body",
        client_name: client.map(|c| attr(c, "company_name")).unwrap_or_default(),
        industry: client.map(|c| attr(c, "industry")).unwrap_or_default(),
        matter_title: matter.map(|m| attr(m, "title")).unwrap_or_default(),
        doc_type: Some(attr(doc, "doc_type")),
        entry_count: 0,
    };

    format!(
        "Document ID: {}\nMatter ID: {}\nClient: {}\nDocument Type: {}\nCreated: {}\nUploaded By: {}\n\n---\n\n{}\n",
        doc.canonical_id,
        narrative_matter_id,
        doc.fk("client_id").unwrap_or_default(),
        attr(doc, "doc_type"),
        iso_date(doc, "created"),
        attr(doc, "uploaded_by"),
        produce_or_fallback(producer, &ctx),
    )
}

/// Free-text body for an email record. Identity drift is permitted here; the
/// structured `matter_ref` field next to it never drifts.
pub fn email_body(
    graph: &CanonicalGraph,
    cfg: &GeneratorConfig,
    registry: &AliasRegistry,
    producer: &dyn TextProducer,
    doc: &CanonicalEntity,
) -> String {
    let matter = doc.fk("matter_id").and_then(|id| graph.get(id));
    let client = doc.fk("client_id").and_then(|id| graph.get(id));
    let matter_id = matter.map(|m| m.canonical_id.as_str()).unwrap_or_default();
    let narrative_matter_id = registry.narrative_id(cfg, matter_id, "email_body");

    let ctx = NarrativeContext {
        kind: "email_body",
        client_name: client.map(|c| attr(c, "company_name")).unwrap_or_default(),
        industry: client.map(|c| attr(c, "industry")).unwrap_or_default(),
        matter_title: matter.map(|m| attr(m, "title")).unwrap_or_default(),
        doc_type: Some(attr(doc, "doc_type")),
        entry_count: 0,
    };

    format!(
        "Re {}: {} Regards, {}",
        narrative_matter_id,
        produce_or_fallback(producer, &ctx),
        attr(doc, "uploaded_by"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexfuse_core::EntityKind;

    struct FailingProducer;
    impl TextProducer for FailingProducer {
        fn produce_text(&self, _ctx: &NarrativeContext<'_>) -> anyhow::Result<String> {
            anyhow::bail!("collaborator unavailable")
        }
    }

    fn fixture() -> (CanonicalGraph, GeneratorConfig) {
        let mut cfg = GeneratorConfig::default();
        cfg.counts.clients = 4;
        cfg.counts.matters = 6;
        cfg.counts.billing_entries = 18;
        cfg.counts.documents = 6;
        let graph = CanonicalGraph::build(&cfg).unwrap();
        (graph, cfg)
    }

    #[test]
    fn failed_producer_falls_back_to_template() {
        let (graph, cfg) = fixture();
        let registry = AliasRegistry::new();
        let matter = &graph.entities(EntityKind::Matter)[0];
        let note = billing_note(&graph, &cfg, &registry, &FailingProducer, matter);
        assert!(note.contains("[Narrative Summary]"));
        assert!(note.contains("consolidates billing activity"));
    }

    #[test]
    fn billing_note_is_deterministic() {
        let (graph, cfg) = fixture();
        let matter = &graph.entities(EntityKind::Matter)[2];
        let a = billing_note(&graph, &cfg, &AliasRegistry::new(), &TemplateProducer, matter);
        let b = billing_note(&graph, &cfg, &AliasRegistry::new(), &TemplateProducer, matter);
        assert_eq!(a, b);
    }

    #[test]
    fn billing_note_header_carries_canonical_matter_id() {
        let (graph, cfg) = fixture();
        let registry = AliasRegistry::new();
        for matter in graph.entities(EntityKind::Matter) {
            let note = billing_note(&graph, &cfg, &registry, &TemplateProducer, matter);
            assert!(note.starts_with(&format!("Billing Summary for Matter {}", matter.canonical_id)));
        }
    }

    #[test]
    fn noisy_notes_misreport_totals_and_say_so() {
        let mut cfg = GeneratorConfig::default();
        cfg.counts.clients = 8;
        cfg.counts.matters = 24;
        cfg.counts.billing_entries = 96;
        cfg.counts.documents = 24;
        let graph = CanonicalGraph::build(&cfg).unwrap();
        let registry = AliasRegistry::new();
        let mut saw_noisy = false;
        let mut saw_clean = false;
        for matter in graph.entities(EntityKind::Matter) {
            let matter_id = matter.canonical_id.as_str();
            let exact_hours: f64 = graph
                .billing_for_matter(matter_id)
                .map(|e| number(e, "hours"))
                .sum();
            let note = billing_note(&graph, &cfg, &registry, &TemplateProducer, matter);
            let reported = format!("Total Hours (reported): {exact_hours:.2}");
            if is_noisy(&cfg, matter_id) {
                saw_noisy = true;
                assert!(note.contains("totals may not align"));
                if exact_hours > 0.0 {
                    assert!(!note.contains(&reported), "{matter_id} reported exact totals");
                }
            } else {
                saw_clean = true;
                assert!(!note.contains("totals may not align"));
                assert!(note.contains(&reported), "{matter_id} misreported totals");
            }
        }
        assert!(saw_noisy && saw_clean, "fixture should cover both branches");
    }

    #[test]
    fn doc_text_has_metadata_header() {
        let (graph, cfg) = fixture();
        let registry = AliasRegistry::new();
        let doc = &graph.entities(EntityKind::Document)[0];
        let text = doc_text(&graph, &cfg, &registry, &TemplateProducer, doc);
        assert!(text.starts_with(&format!("Document ID: {}", doc.canonical_id)));
        assert!(text.contains("\n---\n"));
    }
}
