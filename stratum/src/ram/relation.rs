//! This module defines [RelationDecl], the schema-level description of a
//! relation within a RAM program.

use std::fmt::Display;

use itertools::Itertools;
use stratum_physical::datatypes::AttributeType;

/// How a relation participates in the visible input/output of a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationRole {
    /// Holds facts supplied by the caller.
    Input,
    /// Part of the computed result returned to the caller.
    Output,
    /// Internal scratch relation (deltas, new-tuple buffers, ...).
    Auxiliary,
}

/// Declaration of a relation: name, schema, and role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDecl {
    name: String,
    attribute_names: Vec<String>,
    attribute_types: Vec<AttributeType>,
    role: RelationRole,
}

impl RelationDecl {
    /// Create a declaration. Attribute names and types must agree in number.
    pub fn new(
        name: impl Into<String>,
        attribute_names: Vec<String>,
        attribute_types: Vec<AttributeType>,
        role: RelationRole,
    ) -> Self {
        debug_assert_eq!(
            attribute_names.len(),
            attribute_types.len(),
            "attribute names and types must agree in number"
        );
        Self {
            name: name.into(),
            attribute_names,
            attribute_types,
            role,
        }
    }

    /// Shorthand for a declaration with generated attribute names and a
    /// uniform attribute type.
    pub fn with_uniform_type(
        name: impl Into<String>,
        arity: usize,
        attribute_type: AttributeType,
        role: RelationRole,
    ) -> Self {
        Self::new(
            name,
            (0..arity).map(|position| format!("x{position}")).collect(),
            vec![attribute_type; arity],
            role,
        )
    }

    /// Name of the relation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of attributes.
    pub fn arity(&self) -> usize {
        self.attribute_types.len()
    }

    /// Attribute names in schema order.
    pub fn attribute_names(&self) -> &[String] {
        &self.attribute_names
    }

    /// Attribute types in schema order.
    pub fn attribute_types(&self) -> &[AttributeType] {
        &self.attribute_types
    }

    /// Role of the relation.
    pub fn role(&self) -> RelationRole {
        self.role
    }
}

impl Display for RelationDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DECL {}({})",
            self.name,
            self.attribute_names
                .iter()
                .zip(&self.attribute_types)
                .map(|(name, attribute_type)| format!("{name}:{attribute_type}"))
                .format(", ")
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display() {
        let decl = RelationDecl::new(
            "name",
            vec!["key".to_owned(), "value".to_owned()],
            vec![AttributeType::Symbol, AttributeType::Symbol],
            RelationRole::Input,
        );
        assert_eq!(decl.to_string(), "DECL name(key:s, value:s)");
        assert_eq!(decl.arity(), 2);
    }
}
