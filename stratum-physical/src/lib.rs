//! This crate defines the low-level data structures of a relational
//! algebra machine: fixed-width domain values, dictionaries interning
//! symbols and records, indexed in-memory relations, and aggregate folds.
//! It corresponds to the physical layer of the engine and knows nothing
//! about programs, rules, or the IR operating on it.

#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
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

pub mod aggregates;
pub mod datatypes;
pub mod dictionary;
pub mod error;
pub mod tabular;
