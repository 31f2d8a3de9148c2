//! Narrative ID aliasing and the alias registry.
//!
//! Aliases are the one noise mechanism that touches identity, so they are
//! fenced hard: an alias is *never* written to a structured foreign-key
//! field, only into narrative/free-text contexts, and every alias handed out
//! is recorded so the validator can resolve it back.

use std::collections::HashMap;

use parking_lot::RwLock;

use lexfuse_core::{fraction, GeneratorConfig};

/// Lazily and deterministically populated alias map.
///
/// Population happens as narrative contexts render (phase 2, possibly from
/// several rayon workers at once); derivation is a pure function of
/// (seed, canonical_id), so concurrent callers always record the same alias.
#[derive(Debug, Default)]
pub struct AliasRegistry {
    inner: RwLock<Maps>,
}

#[derive(Debug, Default)]
struct Maps {
    /// (canonical_id, context) -> alias actually emitted there.
    forward: HashMap<(String, String), String>,
    /// alias -> canonical_id.
    reverse: HashMap<String, String>,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id to print for `canonical_id` in a narrative context: the
    /// configured alias when this entity falls inside the `p_alias` fraction
    /// and the rule covers its prefix, the canonical id otherwise.
    pub fn narrative_id(&self, cfg: &GeneratorConfig, canonical_id: &str, context: &str) -> String {
        if fraction(cfg.seed, &["alias", canonical_id]) >= cfg.noise.p_alias {
            return canonical_id.to_string();
        }
        let Some(alias) = cfg.noise.alias_rule.apply(canonical_id) else {
            return canonical_id.to_string();
        };

        let mut maps = self.inner.write();
        maps.forward
            .entry((canonical_id.to_string(), context.to_string()))
            .or_insert_with(|| alias.clone());
        maps.reverse
            .entry(alias.clone())
            .or_insert_with(|| canonical_id.to_string());
        alias
    }

    /// Resolve a narrative token that did not match any canonical id.
    pub fn resolve(&self, token: &str) -> Option<String> {
        self.inner.read().reverse.get(token).cloned()
    }

    /// Aliased entity count (distinct canonical ids with at least one
    /// recorded context).
    pub fn len(&self) -> usize {
        self.inner.read().reverse.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().reverse.is_empty()
    }

    /// Contexts recorded for one canonical id, for reporting.
    pub fn contexts_for(&self, canonical_id: &str) -> Vec<String> {
        let maps = self.inner.read();
        let mut contexts: Vec<String> = maps
            .forward
            .keys()
            .filter(|(id, _)| id == canonical_id)
            .map(|(_, ctx)| ctx.clone())
            .collect();
        contexts.sort_unstable();
        contexts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexfuse_core::AliasRule;

    fn cfg_with_alias(p_alias: f64, offset: i64) -> GeneratorConfig {
        let mut cfg = GeneratorConfig::default();
        cfg.noise.p_alias = p_alias;
        cfg.noise.alias_rule = AliasRule {
            prefix_map: vec![("MAT".to_string(), "MTR".to_string())],
            suffix_offset: offset,
        };
        cfg
    }

    #[test]
    fn alias_scenario_mat_to_mtr_with_offset() {
        let cfg = cfg_with_alias(1.0, -1);
        let registry = AliasRegistry::new();
        let alias = registry.narrative_id(&cfg, "MAT-1011", "billing_note");
        assert_eq!(alias, "MTR-1010");
        assert_eq!(registry.resolve("MTR-1010").as_deref(), Some("MAT-1011"));
    }

    #[test]
    fn zero_fraction_never_aliases() {
        let cfg = cfg_with_alias(0.0, -1);
        let registry = AliasRegistry::new();
        assert_eq!(registry.narrative_id(&cfg, "MAT-1011", "x"), "MAT-1011");
        assert!(registry.is_empty());
    }

    #[test]
    fn unmapped_prefixes_stay_canonical() {
        let cfg = cfg_with_alias(1.0, -1);
        let registry = AliasRegistry::new();
        assert_eq!(registry.narrative_id(&cfg, "CL-1003", "x"), "CL-1003");
        assert!(registry.resolve("CL-1003").is_none());
    }

    #[test]
    fn same_entity_and_context_always_same_alias() {
        let cfg = cfg_with_alias(0.5, -1);
        let registry = AliasRegistry::new();
        let ids: Vec<String> = (1000..1100).map(|n| format!("MAT-{n}")).collect();
        let first: Vec<String> = ids
            .iter()
            .map(|id| registry.narrative_id(&cfg, id, "billing_note"))
            .collect();
        let second: Vec<String> = ids
            .iter()
            .map(|id| registry.narrative_id(&cfg, id, "billing_note"))
            .collect();
        assert_eq!(first, second);
        // With p = 0.5, both outcomes occur over a hundred entities.
        assert!(first.iter().any(|a| a.starts_with("MTR-")));
        assert!(first.iter().zip(&ids).any(|(a, id)| a == id));
    }

    #[test]
    fn contexts_are_tracked_per_entity() {
        let cfg = cfg_with_alias(1.0, 5);
        let registry = AliasRegistry::new();
        registry.narrative_id(&cfg, "MAT-1011", "billing_note");
        registry.narrative_id(&cfg, "MAT-1011", "email_body");
        assert_eq!(registry.contexts_for("MAT-1011"), vec!["billing_note", "email_body"]);
    }
}
