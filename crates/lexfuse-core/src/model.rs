//! Canonical entity graph: the single ground truth every projection is a
//! view of.
//!
//! Built once, single-threaded, with strictly monotonic per-kind ID counters
//! and parent links that always point at already-built entities. After
//! `build` returns, the graph is immutable; phase-2 workers get `&` access
//! only.

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, GeneratorConfig, ParentAssignment};
use crate::derive::XorShift64;
use crate::value::{Phone, Value};
use crate::vocab;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Client,
    Matter,
    BillingEntry,
    Document,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Client,
        EntityKind::Matter,
        EntityKind::BillingEntry,
        EntityKind::Document,
    ];

    /// Canonical id prefix, `<PREFIX>-<monotonic_number>`.
    pub fn prefix(self) -> &'static str {
        match self {
            EntityKind::Client => "CL",
            EntityKind::Matter => "MAT",
            EntityKind::BillingEntry => "BL",
            EntityKind::Document => "D",
        }
    }

    /// Counter bases match the original pack (`CL-1001` is the first client,
    /// `D-2001` the first document).
    pub fn counter_base(self) -> u64 {
        match self {
            EntityKind::Client => 1000,
            EntityKind::Matter => 1000,
            EntityKind::BillingEntry => 100_000,
            EntityKind::Document => 2000,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            EntityKind::Client => "client",
            EntityKind::Matter => "matter",
            EntityKind::BillingEntry => "billing_entry",
            EntityKind::Document => "document",
        }
    }
}

/// One ground-truth record. Attributes keep insertion order so projections
/// and narrative renderings are stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntity {
    pub kind: EntityKind,
    pub canonical_id: String,
    attrs: Vec<(String, Value)>,
}

impl CanonicalEntity {
    fn new(kind: EntityKind, canonical_id: String) -> Self {
        Self {
            kind,
            canonical_id,
            attrs: Vec::new(),
        }
    }

    fn set(&mut self, field: &str, value: Value) {
        self.attrs.push((field.to_string(), value));
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attrs
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, v)| v)
    }

    /// Foreign-key accessor: the referenced canonical id, if the field holds
    /// one.
    pub fn fk(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.attrs.iter().map(|(name, v)| (name.as_str(), v))
    }
}

/// The immutable canonical graph plus an id index.
#[derive(Debug, Clone)]
pub struct CanonicalGraph {
    clients: Vec<CanonicalEntity>,
    matters: Vec<CanonicalEntity>,
    billing_entries: Vec<CanonicalEntity>,
    documents: Vec<CanonicalEntity>,
    index: HashMap<String, (EntityKind, usize)>,
}

impl CanonicalGraph {
    /// Phase 1: build the whole graph from config + seed. Fails fast on
    /// configuration problems; performs no I/O.
    pub fn build(cfg: &GeneratorConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;

        let mut rng = XorShift64::new(cfg.seed);
        let epoch = cfg.epoch;

        let clients = build_clients(cfg.counts.clients, epoch, &mut rng);
        let matters = build_matters(cfg, &clients, epoch, &mut rng);
        let billing_entries = build_billing_entries(cfg, &matters, epoch, &mut rng);
        let documents = build_documents(cfg, &matters, epoch, &mut rng);

        let mut index = HashMap::new();
        for (kind, pool) in [
            (EntityKind::Client, &clients),
            (EntityKind::Matter, &matters),
            (EntityKind::BillingEntry, &billing_entries),
            (EntityKind::Document, &documents),
        ] {
            for (i, entity) in pool.iter().enumerate() {
                index.insert(entity.canonical_id.clone(), (kind, i));
            }
        }

        tracing::debug!(
            clients = clients.len(),
            matters = matters.len(),
            billing_entries = billing_entries.len(),
            documents = documents.len(),
            seed = cfg.seed,
            "canonical graph built"
        );
        Ok(Self {
            clients,
            matters,
            billing_entries,
            documents,
            index,
        })
    }

    pub fn entities(&self, kind: EntityKind) -> &[CanonicalEntity] {
        match kind {
            EntityKind::Client => &self.clients,
            EntityKind::Matter => &self.matters,
            EntityKind::BillingEntry => &self.billing_entries,
            EntityKind::Document => &self.documents,
        }
    }

    pub fn get(&self, canonical_id: &str) -> Option<&CanonicalEntity> {
        let (kind, i) = self.index.get(canonical_id)?;
        Some(&self.entities(*kind)[*i])
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.entities(kind).len()
    }

    /// Billing entries attached to a matter, in build order.
    pub fn billing_for_matter<'a>(
        &'a self,
        matter_id: &'a str,
    ) -> impl Iterator<Item = &'a CanonicalEntity> {
        self.billing_entries
            .iter()
            .filter(move |e| e.fk("matter_id") == Some(matter_id))
    }
}

fn past_date(epoch: NaiveDate, rng: &mut XorShift64, min_days: u64, max_days: u64) -> NaiveDate {
    epoch - Days::new(rng.gen_range_u64(min_days, max_days))
}

fn build_clients(count: usize, epoch: NaiveDate, rng: &mut XorShift64) -> Vec<CanonicalEntity> {
    let mut clients = Vec::with_capacity(count);
    for i in 1..=count {
        let id = format!("CL-{}", EntityKind::Client.counter_base() + i as u64);
        let industry = *rng.pick(&vocab::INDUSTRIES);
        let name = rng
            .pick(&vocab::COMPANY_TEMPLATES)
            .replace("{industry}", industry);
        let revenue = rng.gen_range_u64(1_000_000, 100_000_000) as f64;
        let phone = Phone {
            area: rng.gen_range_u64(200, 999) as u16,
            exchange: rng.gen_range_u64(200, 999) as u16,
            line: rng.gen_range_u64(1000, 9999) as u16,
        };
        let created = past_date(epoch, rng, 30, 3650);

        let mut entity = CanonicalEntity::new(EntityKind::Client, id.clone());
        entity.set("client_id", Value::Str(id));
        entity.set("company_name", Value::Str(name));
        entity.set("industry", Value::Str(industry.to_string()));
        entity.set("annual_revenue", Value::Currency(revenue));
        entity.set("contact_phone", Value::Phone(phone));
        entity.set("created_at", Value::Date(created));
        clients.push(entity);
    }
    clients
}

/// Per-parent child counts for the balanced distribution: children split
/// evenly, remainder going to the earliest parents.
fn balanced_counts(children: usize, parents: usize) -> Vec<usize> {
    let per = children / parents;
    let extra = children % parents;
    (0..parents).map(|i| per + usize::from(i < extra)).collect()
}

/// Resolve each child's parent index, honoring the configured assignment
/// mode. The returned list is in child creation order.
fn assign_parents(
    cfg: &GeneratorConfig,
    children: usize,
    parents: usize,
    rng: &mut XorShift64,
) -> Vec<usize> {
    match cfg.parent_assignment {
        ParentAssignment::Balanced => {
            let mut out = Vec::with_capacity(children);
            for (parent_idx, n) in balanced_counts(children, parents).into_iter().enumerate() {
                out.extend(std::iter::repeat(parent_idx).take(n));
            }
            out
        }
        ParentAssignment::Uniform => (0..children)
            .map(|_| rng.gen_range_usize(parents))
            .collect(),
    }
}

fn build_matters(
    cfg: &GeneratorConfig,
    clients: &[CanonicalEntity],
    epoch: NaiveDate,
    rng: &mut XorShift64,
) -> Vec<CanonicalEntity> {
    let count = cfg.counts.matters;
    if count == 0 {
        return Vec::new();
    }
    let parent_of = assign_parents(cfg, count, clients.len(), rng);

    let mut matters = Vec::with_capacity(count);
    for (i, parent_idx) in parent_of.into_iter().enumerate() {
        let client = &clients[parent_idx];
        let id = format!("MAT-{}", EntityKind::Matter.counter_base() + i as u64 + 1);
        let company = client
            .get("company_name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let title = rng
            .pick(&vocab::MATTER_TITLE_TEMPLATES)
            .replace("{client}", company);
        let practice_area = *rng.pick(&vocab::PRACTICE_AREAS);
        let attorney = *rng.pick(&vocab::ATTORNEYS);
        let opened = past_date(epoch, rng, 1, 1825);
        let est_value = rng.gen_range_u64(5000, 50_000) as f64;

        let mut entity = CanonicalEntity::new(EntityKind::Matter, id.clone());
        entity.set("matter_id", Value::Str(id));
        entity.set("client_id", Value::Str(client.canonical_id.clone()));
        entity.set("title", Value::Str(title));
        entity.set("practice_area", Value::Str(practice_area.to_string()));
        entity.set("opened_on", Value::Date(opened));
        entity.set("lead_attorney", Value::Str(attorney.to_string()));
        entity.set("estimated_value", Value::Currency(est_value));
        matters.push(entity);
    }
    matters
}

fn build_billing_entries(
    cfg: &GeneratorConfig,
    matters: &[CanonicalEntity],
    epoch: NaiveDate,
    rng: &mut XorShift64,
) -> Vec<CanonicalEntity> {
    let count = cfg.counts.billing_entries;
    if count == 0 {
        return Vec::new();
    }
    let parent_of = assign_parents(cfg, count, matters.len(), rng);

    let mut entries = Vec::with_capacity(count);
    for (i, parent_idx) in parent_of.into_iter().enumerate() {
        let matter = &matters[parent_idx];
        let id = format!("BL-{}", EntityKind::BillingEntry.counter_base() + i as u64 + 1);
        let att_id = format!("AT-{:03}", rng.gen_range_u64(1, 10));
        let hours = rng.gen_range_u64(5, 100) as f64 / 10.0;
        let rate = *rng.pick(&vocab::BILLING_RATES) as f64;
        let amount = (hours * rate * 100.0).round() / 100.0;
        let description = *rng.pick(&vocab::WORK_DESCRIPTIONS);
        let entry_date = past_date(epoch, rng, 1, 1825);

        let mut entity = CanonicalEntity::new(EntityKind::BillingEntry, id.clone());
        entity.set("entry_id", Value::Str(id));
        entity.set("matter_id", Value::Str(matter.canonical_id.clone()));
        entity.set("att_id", Value::Str(att_id));
        entity.set("hours", Value::Number(hours));
        entity.set("rate", Value::Number(rate));
        entity.set("amount", Value::Currency(amount));
        entity.set("description", Value::Str(description.to_string()));
        entity.set("entry_date", Value::Date(entry_date));
        entries.push(entity);
    }
    entries
}

fn build_documents(
    cfg: &GeneratorConfig,
    matters: &[CanonicalEntity],
    epoch: NaiveDate,
    rng: &mut XorShift64,
) -> Vec<CanonicalEntity> {
    let count = cfg.counts.documents;
    if count == 0 {
        return Vec::new();
    }
    let parent_of = assign_parents(cfg, count, matters.len(), rng);

    let mut documents = Vec::with_capacity(count);
    for (i, parent_idx) in parent_of.into_iter().enumerate() {
        let matter = &matters[parent_idx];
        // Mutual consistency: the document's client is always its matter's
        // client, by construction.
        let client_id = matter.fk("client_id").unwrap_or_default().to_string();
        let id = format!("D-{}", EntityKind::Document.counter_base() + i as u64 + 1);
        let doc_type = *rng.pick(&vocab::DOC_TYPES);
        let file_type = *rng.pick(&vocab::FILE_TYPES);
        let created = past_date(epoch, rng, 1, 1825);
        let uploaded_by = *rng.pick(&vocab::ATTORNEYS);

        let mut entity = CanonicalEntity::new(EntityKind::Document, id.clone());
        entity.set("doc_id", Value::Str(id));
        entity.set("matter_id", Value::Str(matter.canonical_id.clone()));
        entity.set("client_id", Value::Str(client_id));
        entity.set("doc_type", Value::Str(doc_type.to_string()));
        entity.set("title", Value::Str(format!("{doc_type} Document")));
        entity.set("created", Value::Date(created));
        entity.set("uploaded_by", Value::Str(uploaded_by.to_string()));
        entity.set("file_type", Value::Str(file_type.to_string()));
        documents.push(entity);
    }
    documents
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorConfig;

    fn small_config() -> GeneratorConfig {
        let mut cfg = GeneratorConfig::default();
        cfg.counts.clients = 10;
        cfg.counts.matters = 15;
        cfg.counts.billing_entries = 40;
        cfg.counts.documents = 20;
        cfg
    }

    #[test]
    fn counts_match_config() {
        let graph = CanonicalGraph::build(&small_config()).unwrap();
        assert_eq!(graph.count(EntityKind::Client), 10);
        assert_eq!(graph.count(EntityKind::Matter), 15);
        assert_eq!(graph.count(EntityKind::BillingEntry), 40);
        assert_eq!(graph.count(EntityKind::Document), 20);
    }

    #[test]
    fn fourth_client_id_is_stable_for_seed_42() {
        let graph = CanonicalGraph::build(&small_config()).unwrap();
        assert_eq!(graph.entities(EntityKind::Client)[3].canonical_id, "CL-1004");

        let again = CanonicalGraph::build(&small_config()).unwrap();
        assert_eq!(again.entities(EntityKind::Client)[3].canonical_id, "CL-1004");
    }

    #[test]
    fn rebuild_is_identical() {
        let a = CanonicalGraph::build(&small_config()).unwrap();
        let b = CanonicalGraph::build(&small_config()).unwrap();
        for kind in EntityKind::ALL {
            assert_eq!(a.entities(kind), b.entities(kind));
        }
    }

    #[test]
    fn uniform_assignment_is_deterministic_too() {
        let mut cfg = small_config();
        cfg.parent_assignment = ParentAssignment::Uniform;
        let a = CanonicalGraph::build(&cfg).unwrap();
        let b = CanonicalGraph::build(&cfg).unwrap();
        assert_eq!(a.entities(EntityKind::Matter), b.entities(EntityKind::Matter));
    }

    #[test]
    fn document_client_matches_matter_client() {
        let graph = CanonicalGraph::build(&small_config()).unwrap();
        for doc in graph.entities(EntityKind::Document) {
            let matter_id = doc.fk("matter_id").unwrap();
            let matter = graph.get(matter_id).unwrap();
            assert_eq!(doc.fk("client_id"), matter.fk("client_id"));
        }
    }

    #[test]
    fn parent_links_reference_existing_entities() {
        let graph = CanonicalGraph::build(&small_config()).unwrap();
        for matter in graph.entities(EntityKind::Matter) {
            assert!(graph.get(matter.fk("client_id").unwrap()).is_some());
        }
        for entry in graph.entities(EntityKind::BillingEntry) {
            assert!(graph.get(entry.fk("matter_id").unwrap()).is_some());
        }
    }

    #[test]
    fn ids_are_monotonic_and_unique() {
        let graph = CanonicalGraph::build(&small_config()).unwrap();
        let matters = graph.entities(EntityKind::Matter);
        assert_eq!(matters[0].canonical_id, "MAT-1001");
        assert_eq!(matters[14].canonical_id, "MAT-1015");
        let mut ids: Vec<_> = matters.iter().map(|m| m.canonical_id.clone()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 15);
    }

    #[test]
    fn balanced_counts_spread_remainder_to_front() {
        assert_eq!(balanced_counts(7, 3), vec![3, 2, 2]);
        assert_eq!(balanced_counts(6, 3), vec![2, 2, 2]);
        assert_eq!(balanced_counts(2, 5), vec![1, 1, 0, 0, 0]);
    }
}
