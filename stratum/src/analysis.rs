//! Program analyses consumed by the transformation passes and the
//! interpreter. Results are cached on the
//! [translation unit](crate::ram::RamTranslationUnit) and recomputed after
//! the program changes.

pub mod indexes;
pub mod levels;
