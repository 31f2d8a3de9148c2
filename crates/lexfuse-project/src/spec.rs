//! Projection specs and the projection engine.

use lexfuse_core::{
    encode_currency, encode_date, encode_label, encode_phone, fraction, substream, CanonicalEntity,
    CanonicalGraph, EncodeError, EncodedValue, EntityKind, GeneratorConfig, Value, ValueCategory,
};
use serde::{Deserialize, Serialize};

/// What a projected field is allowed to carry.
///
/// Key fields are exempt from every noise mechanism in structured contexts:
/// their bytes must always decode back to a canonical id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    PrimaryKey,
    ForeignKey(EntityKind),
    Descriptive,
}

/// One canonical-field → target-path mapping inside a spec.
///
/// `target` uses dot notation; `financials.turnover` nests, `turnover` stays
/// flat. Omitted canonical fields are intentional per spec, not accidental
/// drops, so `included` is explicit.
#[derive(Debug, Clone, Copy)]
pub struct FieldMap {
    pub canonical: &'static str,
    pub target: &'static str,
    pub role: FieldRole,
    pub category: ValueCategory,
    /// A fixed surface value (e.g. the JSON client source always reports
    /// `financials.currency = "USD"`). Constant fields have no canonical
    /// counterpart.
    pub constant: Option<&'static str>,
    pub included: bool,
}

impl FieldMap {
    pub(crate) const fn field(
        canonical: &'static str,
        target: &'static str,
        role: FieldRole,
        category: ValueCategory,
    ) -> Self {
        Self {
            canonical,
            target,
            role,
            category,
            constant: None,
            included: true,
        }
    }

    pub(crate) const fn constant(target: &'static str, value: &'static str) -> Self {
        Self {
            canonical: "",
            target,
            role: FieldRole::Descriptive,
            category: ValueCategory::Text,
            constant: Some(value),
            included: true,
        }
    }

    pub fn is_key(&self) -> bool {
        matches!(self.role, FieldRole::PrimaryKey | FieldRole::ForeignKey(_))
    }
}

/// Target file formats for the emitted inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Csv,
    Json,
    Xml,
    Xlsx,
    Jsonl,
    /// One plain-text billing narrative per matter.
    TextPerMatter,
    /// One plain-text document body per document.
    TextPerDocument,
}

/// Static, versioned mapping for one (entity kind, source) pair.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionSpec {
    pub source: &'static str,
    pub kind: EntityKind,
    pub format: SourceFormat,
    /// File name inside the pack directory (narrative formats use it as a
    /// subdirectory name instead).
    pub file_name: &'static str,
    pub fields: &'static [FieldMap],
}

impl ProjectionSpec {
    /// The spec's own ID field mapping. Every structured spec has exactly
    /// one.
    pub fn id_field(&self) -> &'static FieldMap {
        self.fields
            .iter()
            .find(|f| f.role == FieldRole::PrimaryKey)
            .expect("structured projection specs declare a primary key field")
    }

    /// Flat header names, in spec order, for tabular formats.
    pub fn headers(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.included)
            .map(|f| f.target)
            .collect()
    }
}

/// A projected record: an ordered tree of already-encoded values.
#[derive(Debug, Clone, PartialEq)]
pub enum Projected {
    Object(Vec<(String, Projected)>),
    Leaf(EncodedValue),
}

impl Projected {
    fn empty() -> Self {
        Projected::Object(Vec::new())
    }

    /// Insert a leaf at a dot-notation path, creating intermediate objects.
    fn insert(&mut self, path: &str, value: EncodedValue) {
        let Projected::Object(entries) = self else {
            unreachable!("insert target is always an object");
        };
        match path.split_once('.') {
            None => entries.push((path.to_string(), Projected::Leaf(value))),
            Some((head, rest)) => {
                if let Some((_, child)) = entries
                    .iter_mut()
                    .find(|(name, node)| name == head && matches!(node, Projected::Object(_)))
                {
                    child.insert(rest, value);
                } else {
                    let mut child = Projected::empty();
                    child.insert(rest, value);
                    entries.push((head.to_string(), child));
                }
            }
        }
    }

    /// Leaf lookup by dot-notation path.
    pub fn leaf(&self, path: &str) -> Option<&EncodedValue> {
        match (self, path.split_once('.')) {
            (Projected::Object(entries), None) => entries.iter().find_map(|(name, node)| {
                match (name == path, node) {
                    (true, Projected::Leaf(v)) => Some(v),
                    _ => None,
                }
            }),
            (Projected::Object(entries), Some((head, rest))) => entries
                .iter()
                .find(|(name, _)| name == head)
                .and_then(|(_, node)| node.leaf(rest)),
            (Projected::Leaf(_), _) => None,
        }
    }

    /// Flat rendering in spec order, for CSV/XLSX rows.
    pub fn flat_values(&self, spec: &ProjectionSpec) -> Vec<EncodedValue> {
        spec.fields
            .iter()
            .filter(|f| f.included)
            .map(|f| self.leaf(f.target).cloned().unwrap_or(EncodedValue::Missing))
            .collect()
    }

    /// Ordered JSON rendering (`preserve_order` keeps spec field order).
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Projected::Object(entries) => {
                let mut map = serde_json::Map::new();
                for (name, node) in entries {
                    map.insert(name.clone(), node.to_json());
                }
                serde_json::Value::Object(map)
            }
            Projected::Leaf(EncodedValue::Text(s)) => serde_json::Value::String(s.clone()),
            Projected::Leaf(EncodedValue::Int(n)) => serde_json::Value::from(*n),
            Projected::Leaf(EncodedValue::Float(f)) => serde_json::Value::from(*f),
            Projected::Leaf(EncodedValue::Missing) => serde_json::Value::Null,
        }
    }
}

/// The projection engine: read-only over the immutable graph, so it is safe
/// to call from parallel emit workers.
pub struct Projector<'g> {
    pub graph: &'g CanonicalGraph,
    pub cfg: &'g GeneratorConfig,
}

impl<'g> Projector<'g> {
    pub fn new(graph: &'g CanonicalGraph, cfg: &'g GeneratorConfig) -> Self {
        Self { graph, cfg }
    }

    /// Project one entity through a spec, with structured-context noise
    /// already applied. Key fields are copied verbatim, always.
    pub fn project(&self, entity: &CanonicalEntity, spec: &ProjectionSpec) -> Projected {
        let mut out = Projected::empty();
        for field in spec.fields.iter().filter(|f| f.included) {
            let encoded = if let Some(text) = field.constant {
                EncodedValue::Text(text.to_string())
            } else {
                self.encode_field(entity, field, spec)
            };
            out.insert(field.target, encoded);
        }
        out
    }

    fn encode_field(
        &self,
        entity: &CanonicalEntity,
        field: &FieldMap,
        spec: &ProjectionSpec,
    ) -> EncodedValue {
        let id = entity.canonical_id.as_str();

        if field.is_key() {
            // Structured FK invariant: byte-identical to the canonical id.
            return match entity.get(field.canonical) {
                Some(Value::Str(s)) => EncodedValue::Text(s.clone()),
                _ => EncodedValue::Missing,
            };
        }

        let value = match self.noisy_value(entity, field, spec) {
            Some(v) => v,
            None => return EncodedValue::Missing,
        };

        match self.encode_value(&value, field, spec, id) {
            Ok(encoded) => encoded,
            Err(err) => {
                // Non-fatal per contract: fall back to the missing marker.
                tracing::warn!(
                    entity = %id,
                    source = spec.source,
                    field = field.canonical,
                    error = %err,
                    "encoding fallback to missing marker"
                );
                EncodedValue::Missing
            }
        }
    }

    /// The canonical value, a borrowed contradictory value, or `None` for an
    /// injected missing. Descriptive fields only; gates are pure functions of
    /// (seed, source, entity, field).
    fn noisy_value(
        &self,
        entity: &CanonicalEntity,
        field: &FieldMap,
        spec: &ProjectionSpec,
    ) -> Option<Value> {
        let seed = self.cfg.seed;
        let id = entity.canonical_id.as_str();

        if let Some(p) = self.cfg.noise.missing.get(field.canonical) {
            if fraction(seed, &["missing", spec.source, id, field.canonical]) < *p {
                return None;
            }
        }

        if let Some(p) = self.cfg.noise.contradict.get(field.canonical) {
            if fraction(seed, &["contradict", spec.source, id, field.canonical]) < *p {
                if let Some(donor) = self.donor_for(entity, field, spec) {
                    return Some(donor);
                }
            }
        }

        entity.get(field.canonical).cloned()
    }

    /// A value borrowed from a deterministically-chosen sibling of the same
    /// kind (never the entity itself).
    fn donor_for(
        &self,
        entity: &CanonicalEntity,
        field: &FieldMap,
        spec: &ProjectionSpec,
    ) -> Option<Value> {
        let pool = self.graph.entities(entity.kind);
        if pool.len() < 2 {
            return None;
        }
        let roll = substream(
            self.cfg.seed,
            &["donor", spec.source, &entity.canonical_id, field.canonical],
        );
        let mut idx = (roll % (pool.len() as u64 - 1)) as usize;
        if pool[idx].canonical_id == entity.canonical_id {
            idx = pool.len() - 1;
        }
        pool[idx].get(field.canonical).cloned()
    }

    fn encode_value(
        &self,
        value: &Value,
        field: &FieldMap,
        spec: &ProjectionSpec,
        id: &str,
    ) -> Result<EncodedValue, EncodeError> {
        if value.is_missing() {
            return Ok(EncodedValue::Missing);
        }
        let seed = self.cfg.seed;
        let key = ["enc", id, spec.source, field.category.name()];
        let enc = &self.cfg.encodings;

        match (field.category, value) {
            (ValueCategory::Id | ValueCategory::Text, Value::Str(s)) => {
                Ok(EncodedValue::Text(s.clone()))
            }
            (ValueCategory::Label, Value::Str(s)) => {
                Ok(encode_label(s, *lexfuse_core::pick(seed, &key, &enc.label)))
            }
            (ValueCategory::Date, Value::Date(d)) => {
                Ok(encode_date(*d, *lexfuse_core::pick(seed, &key, &enc.date)))
            }
            (ValueCategory::Currency, Value::Currency(v)) => {
                encode_currency(*v, *lexfuse_core::pick(seed, &key, &enc.currency))
            }
            (ValueCategory::Phone, Value::Phone(p)) => {
                Ok(encode_phone(*p, *lexfuse_core::pick(seed, &key, &enc.phone)))
            }
            (ValueCategory::Number, Value::Number(n)) => {
                if n.fract() == 0.0 {
                    Ok(EncodedValue::Int(*n as i64))
                } else {
                    Ok(EncodedValue::Float(*n))
                }
            }
            (category, other) => Err(EncodeError::Unrepresentable {
                encoding: category.name(),
                value: format!("{other:?}"),
            }),
        }
    }
}
