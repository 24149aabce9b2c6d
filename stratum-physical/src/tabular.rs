//! In-memory relation storage: tuple sets with secondary indexes selected
//! by [search signatures](signature::SearchSignature).

pub mod relation;
pub mod signature;

pub use relation::Relation;
pub use signature::SearchSignature;
