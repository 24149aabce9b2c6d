//! This module defines [AttributeType], the declared type of a relation
//! attribute, and the numeric conversions between attribute-typed text and
//! domain values used at the input/output boundaries of the engine.

use std::fmt::Display;

use crate::error::Error;

use super::domain::{
    domain_from_float, domain_from_unsigned, float_from_domain, unsigned_from_domain, DomainFloat,
    DomainSigned, DomainUnsigned, DomainValue,
};

/// Declared type of a relation attribute.
///
/// The attribute type does not change how a value is stored (every value is a
/// [DomainValue](super::domain::DomainValue)) but determines how text is
/// parsed into values and how values are rendered back into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// An interned string; the stored value is a symbol id.
    Symbol,
    /// A signed number.
    Signed,
    /// An unsigned number.
    Unsigned,
    /// A floating-point number, stored via bit reinterpretation.
    Float,
    /// An interned record; the stored value is a record handle.
    Record,
}

impl AttributeType {
    /// Returns true for the numeric attribute types.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            AttributeType::Signed | AttributeType::Unsigned | AttributeType::Float
        )
    }

    /// Parse `text` into a domain value according to this attribute type.
    ///
    /// [AttributeType::Symbol] and [AttributeType::Record] values cannot be
    /// produced from bare text; those conversions involve a dictionary and
    /// live with the callers owning one.
    pub fn parse_numeric(&self, text: &str) -> Result<DomainValue, Error> {
        match self {
            AttributeType::Unsigned => {
                let parsed: DomainUnsigned = text.parse()?;
                Ok(domain_from_unsigned(parsed))
            }
            AttributeType::Float => {
                let parsed: DomainFloat = text.parse()?;
                Ok(domain_from_float(parsed))
            }
            _ => {
                let parsed: DomainSigned = text.parse()?;
                Ok(parsed)
            }
        }
    }

    /// Render a numeric domain value according to this attribute type.
    pub fn format_numeric(&self, value: DomainValue) -> String {
        match self {
            AttributeType::Unsigned => unsigned_from_domain(value).to_string(),
            AttributeType::Float => float_from_domain(value).to_string(),
            _ => value.to_string(),
        }
    }
}

impl Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeType::Symbol => f.write_str("s"),
            AttributeType::Signed => f.write_str("i"),
            AttributeType::Unsigned => f.write_str("u"),
            AttributeType::Float => f.write_str("f"),
            AttributeType::Record => f.write_str("r"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_and_format() {
        assert_eq!(AttributeType::Signed.parse_numeric("-7").unwrap(), -7);
        assert_eq!(
            AttributeType::Signed.format_numeric(AttributeType::Signed.parse_numeric("42").unwrap()),
            "42"
        );

        let largest = DomainUnsigned::MAX.to_string();
        let value = AttributeType::Unsigned.parse_numeric(&largest).unwrap();
        assert_eq!(AttributeType::Unsigned.format_numeric(value), largest);

        let value = AttributeType::Float.parse_numeric("2.5").unwrap();
        assert_eq!(AttributeType::Float.format_numeric(value), "2.5");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(AttributeType::Signed.parse_numeric("banana").is_err());
        assert!(AttributeType::Unsigned.parse_numeric("-1").is_err());
    }
}
