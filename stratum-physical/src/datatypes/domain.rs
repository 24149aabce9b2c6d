//! Fixed-width domain values.
//!
//! Every runtime value of the machine, whether it is a signed integer, an
//! unsigned integer, a floating-point number, an interned symbol id, or a
//! record handle, is stored as a single [DomainValue]. Values of the other
//! numeric types are reinterpreted at the bit level; the conversions in this
//! module are lossless in both directions.

/// Universal value type of the machine, 32 bits wide by default and 64 bits
/// wide with the `domain64` feature.
#[cfg(not(feature = "domain64"))]
pub type DomainValue = i32;
/// Universal value type of the machine, 32 bits wide by default and 64 bits
/// wide with the `domain64` feature.
#[cfg(feature = "domain64")]
pub type DomainValue = i64;

/// Signed view of a [DomainValue].
pub type DomainSigned = DomainValue;

/// Unsigned view of a [DomainValue].
#[cfg(not(feature = "domain64"))]
pub type DomainUnsigned = u32;
/// Unsigned view of a [DomainValue].
#[cfg(feature = "domain64")]
pub type DomainUnsigned = u64;

/// Floating-point view of a [DomainValue], of the same bit width.
#[cfg(not(feature = "domain64"))]
pub type DomainFloat = f32;
/// Floating-point view of a [DomainValue], of the same bit width.
#[cfg(feature = "domain64")]
pub type DomainFloat = f64;

/// An ordered, fixed-arity sequence of domain values. The arity is determined
/// by the schema of the owning relation; tuples are never mutated once they
/// have been projected into a relation.
pub type Tuple = Vec<DomainValue>;

/// Smallest signed domain value.
pub const MIN_DOMAIN_SIGNED: DomainSigned = DomainSigned::MIN;
/// Largest signed domain value.
pub const MAX_DOMAIN_SIGNED: DomainSigned = DomainSigned::MAX;
/// Smallest unsigned domain value.
pub const MIN_DOMAIN_UNSIGNED: DomainUnsigned = DomainUnsigned::MIN;
/// Largest unsigned domain value.
pub const MAX_DOMAIN_UNSIGNED: DomainUnsigned = DomainUnsigned::MAX;

/// Reinterpret an unsigned value as a domain value.
pub fn domain_from_unsigned(value: DomainUnsigned) -> DomainValue {
    DomainValue::from_ne_bytes(value.to_ne_bytes())
}

/// Reinterpret a domain value as an unsigned value.
pub fn unsigned_from_domain(value: DomainValue) -> DomainUnsigned {
    DomainUnsigned::from_ne_bytes(value.to_ne_bytes())
}

/// Reinterpret a floating-point value as a domain value.
pub fn domain_from_float(value: DomainFloat) -> DomainValue {
    DomainValue::from_ne_bytes(value.to_ne_bytes())
}

/// Reinterpret a domain value as a floating-point value.
pub fn float_from_domain(value: DomainValue) -> DomainFloat {
    DomainFloat::from_ne_bytes(value.to_ne_bytes())
}

/// Narrow an `f64` intermediate to the domain float width.
#[cfg(not(feature = "domain64"))]
pub fn domain_float_from_f64(value: f64) -> DomainFloat {
    value as DomainFloat
}

/// Narrow an `f64` intermediate to the domain float width.
#[cfg(feature = "domain64")]
pub fn domain_float_from_f64(value: f64) -> DomainFloat {
    value
}
