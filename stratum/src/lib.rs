//! The middle and back end of a Datalog compiler: a relational algebra
//! machine (RAM) intermediate representation, a pipeline of rewrite passes
//! optimizing it, a tree-walking interpreter executing it against an
//! in-memory relation store, and a provenance interface reconstructing
//! derivation trees for computed facts.
//!
//! The front end producing RAM translation units and the native-code
//! synthesizer consuming them are external collaborators; this crate
//! operates purely on the [ram] representation.

#![deny(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts
)]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_qualifications,
    unused_extern_crates,
    variant_size_differences
)]

/// The crate for the underlying physical value and relation storage layer.
pub use stratum_physical as physical;

pub mod analysis;
pub mod api;
pub mod config;
pub mod error;
pub mod interpreter;
pub mod provenance;
pub mod ram;
pub mod transform;
