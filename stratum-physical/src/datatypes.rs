//! This module collects the primitive datatypes of the physical layer.

pub mod attribute;
pub mod domain;

pub use attribute::AttributeType;
pub use domain::{DomainFloat, DomainSigned, DomainUnsigned, DomainValue, Tuple};
