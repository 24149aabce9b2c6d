//! Error-handling module for the physical layer.

use thiserror::Error;

use crate::datatypes::domain::DomainValue;

/// Error-collection for all the possible errors occurring in this crate.
#[allow(variant_size_differences)]
#[derive(Error, Debug)]
pub enum Error {
    /// A domain value was used as a symbol id but is not interned.
    #[error("domain value {0} does not resolve to an interned symbol")]
    UnresolvedSymbol(DomainValue),
    /// A domain value was used as a record handle but is not interned.
    #[error("domain value {0} does not resolve to an interned record")]
    UnresolvedRecord(DomainValue),
    /// A record was unpacked with a different arity than it was packed with.
    #[error("record of arity {found} unpacked with arity {expected}")]
    RecordArityMismatch {
        /// Arity requested by the caller.
        expected: usize,
        /// Arity the record was packed with.
        found: usize,
    },
    /// Error occurred during parsing of integer arguments.
    #[error(transparent)]
    ParseInt(#[from] std::num::ParseIntError),
    /// Error occurred during parsing of floating-point arguments.
    #[error(transparent)]
    ParseFloat(#[from] std::num::ParseFloatError),
}
