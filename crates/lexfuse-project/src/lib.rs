//! Schema projections and identity noise.
//!
//! A *projection* renders a canonical entity through one source's lens:
//! different field names, different nesting, different value encodings. The
//! engine guarantees the mapping is schema-level lossless — every included
//! canonical field lands at exactly one target path, and each source's own ID
//! field always carries the canonical id verbatim — while the noise injector
//! perturbs everything that is *not* a key: missing values, contradictory
//! values borrowed from sibling entities, name/title drift, and (in narrative
//! contexts only) ID aliasing.

pub mod drift;
pub mod inventory;
pub mod noise;
pub mod spec;

pub use drift::{name_variants, narrative_pick, title_variants};
pub use noise::AliasRegistry;
pub use spec::{FieldMap, FieldRole, Projected, ProjectionSpec, Projector, SourceFormat};
