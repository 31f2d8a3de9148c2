//! Lexfuse core: canonical ground truth for heterogeneous test packs.
//!
//! This crate owns the two halves of the engine that everything else builds
//! on:
//!
//! - the **canonical entity graph** (clients, matters, billing entries,
//!   documents) with immutable, monotonic IDs and consistent parent links,
//!   built once in a single-threaded phase, and
//! - the **value format diversifier**: explicit per-category encodings
//!   (date, currency, phone, label) with a documented decode priority order,
//!   so every downstream reader reproduces identical results.
//!
//! Determinism is the load-bearing property. There is no shared PRNG stream:
//! anything chosen after the graph is built derives from a pure keyed digest
//! of `(seed, canonical_id, source, category)` (see [`derive`]), so parallel
//! emit workers never contend and scheduling order never changes output.

pub mod config;
pub mod derive;
pub mod encode;
pub mod model;
pub mod value;
pub mod vocab;

pub use config::{AliasRule, ConfigError, EncodingConfig, EntityCounts, GeneratorConfig, NoiseConfig, ParentAssignment};
pub use derive::{fraction, pick, substream, XorShift64};
pub use encode::{
    decode_currency, decode_date, decode_phone, encode_currency, encode_date, encode_label,
    encode_phone, CurrencyEncoding, DateEncoding, EncodeError, LabelEncoding, PhoneEncoding,
    Unparseable, CURRENCY_ABBREV_UNIT,
};
pub use model::{CanonicalEntity, CanonicalGraph, EntityKind};
pub use value::{EncodedValue, Phone, Value, ValueCategory};
