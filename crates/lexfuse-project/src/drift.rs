//! Name and title drift: surface variants that keep rough meaning while
//! diverging lexically, per the original pack's substitution tables.
//!
//! Variant generation is pure; narrative contexts select one variant
//! (possibly the canonical form) through the same seeded-choice function the
//! encoders use.

use lexfuse_core::substream;

/// Legal-suffix substitutions for company names.
const NAME_SUFFIX_RULES: [(&str, &str); 5] = [
    (" Inc", " Company"),
    (" Group", " Consortium"),
    (" LLC", " Holdings"),
    (" Solutions", " Systems"),
    (" Motors", " Automotive Works"),
];

/// Phrase substitutions for matter titles. The first alternative is used for
/// the first drift variant, the second for the second.
const TITLE_PHRASE_RULES: [(&str, [&str; 2]); 4] = [
    (
        "Regulatory Inquiry",
        ["government agency probe", "oversight investigation"],
    ),
    (
        "Master Services Agreement",
        ["framework commercial arrangement", "long-term supply accord"],
    ),
    (
        "Employment Dispute",
        ["workforce conflict", "labor controversy"],
    ),
    (
        "Contract Breach",
        ["agreement breakdown", "failure to honor obligations"],
    ),
];

/// Work-description substitutions used by noisy billing narratives.
pub const DESCRIPTION_RULES: [(&str, &str); 4] = [
    ("Reviewed contract", "analyzed the underlying agreement documents"),
    ("Drafted motion", "prepared substantive court application"),
    ("Prepared discovery", "organized evidentiary materials"),
    ("Client call", "strategic consultation with client team"),
];

/// The canonical name followed by up to `max_variants` drifted forms.
pub fn name_variants(name: &str, max_variants: u8) -> Vec<String> {
    let mut variants = vec![name.to_string()];
    if max_variants >= 1 {
        let drifted = NAME_SUFFIX_RULES
            .iter()
            .find(|(needle, _)| name.contains(needle))
            .map(|(needle, replacement)| name.replace(needle, replacement))
            .unwrap_or_else(|| format!("{name} International"));
        variants.push(drifted);
    }
    if max_variants >= 2 {
        variants.push(name.to_uppercase());
    }
    variants
}

/// The canonical title followed by up to `max_variants` drifted forms.
pub fn title_variants(title: &str, max_variants: u8) -> Vec<String> {
    let mut variants = vec![title.to_string()];
    let rule = TITLE_PHRASE_RULES
        .iter()
        .find(|(needle, _)| title.contains(needle));
    for i in 0..usize::from(max_variants.min(2)) {
        let drifted = match rule {
            Some((needle, alternatives)) => title.replace(needle, alternatives[i]),
            // Titles with no matching phrase drift by case only.
            None => {
                if i == 0 {
                    title.to_uppercase()
                } else {
                    title.to_lowercase()
                }
            }
        };
        variants.push(drifted);
    }
    variants
}

/// Seeded pick among variants for a narrative context. Index 0 (the
/// canonical form) is a legitimate outcome.
pub fn narrative_pick<'a>(
    seed: u64,
    canonical_id: &str,
    context: &str,
    variants: &'a [String],
) -> &'a str {
    let idx = (substream(seed, &["drift", context, canonical_id]) % variants.len() as u64) as usize;
    &variants[idx]
}

/// Drifted work description for noisy narratives, canonical when no rule
/// matches.
pub fn drift_description(description: &str) -> &str {
    DESCRIPTION_RULES
        .iter()
        .find(|(needle, _)| description.eq_ignore_ascii_case(needle))
        .map(|(_, replacement)| *replacement)
        .unwrap_or(description)
}
