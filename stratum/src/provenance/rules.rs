//! Rule metadata over which explanations are reconstructed.
//!
//! The front end hands these alongside the RAM program: one [RuleSpec] per
//! original rule, with atoms over variables and typed constants. The engine
//! never evaluates rules directly; the metadata only drives provenance.

use std::fmt::Display;

use itertools::Itertools;

use stratum_physical::datatypes::domain::{DomainFloat, DomainSigned, DomainUnsigned};

/// A typed constant appearing in a rule.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    /// A string constant; stored values are symbol ids.
    Symbol(String),
    /// A signed number.
    Signed(DomainSigned),
    /// An unsigned number.
    Unsigned(DomainUnsigned),
    /// A floating-point number.
    Float(DomainFloat),
}

impl Display for ConstantValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstantValue::Symbol(text) => write!(f, "\"{text}\""),
            ConstantValue::Signed(value) => write!(f, "{value}"),
            ConstantValue::Unsigned(value) => write!(f, "{value}"),
            ConstantValue::Float(value) => write!(f, "{value}"),
        }
    }
}

/// An argument position of a rule atom.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// A named variable; repeated occurrences must bind consistently.
    Variable(String),
    /// A constant pinning the position.
    Constant(ConstantValue),
}

impl Display for Term {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Term::Variable(name) => write!(f, "{name}"),
            Term::Constant(value) => write!(f, "{value}"),
        }
    }
}

/// A predicate applied to terms.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Relation the atom refers to.
    pub relation: String,
    /// One term per attribute.
    pub terms: Vec<Term>,
}

impl Atom {
    /// Create an atom.
    pub fn new(relation: impl Into<String>, terms: Vec<Term>) -> Self {
        Self {
            relation: relation.into(),
            terms,
        }
    }
}

impl Display for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.relation, self.terms.iter().format(", "))
    }
}

/// A body literal: an atom, possibly negated.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// The atom must hold.
    Positive(Atom),
    /// The atom must not hold.
    Negative(Atom),
}

impl Literal {
    /// The underlying atom.
    pub fn atom(&self) -> &Atom {
        match self {
            Literal::Positive(atom) | Literal::Negative(atom) => atom,
        }
    }

    /// Whether the literal is negated.
    pub fn is_negative(&self) -> bool {
        matches!(self, Literal::Negative(_))
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Positive(atom) => write!(f, "{atom}"),
            Literal::Negative(atom) => write!(f, "!{atom}"),
        }
    }
}

/// One rule: a head atom derived from body literals.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSpec {
    /// Derived atom.
    pub head: Atom,
    /// Body literals, in rule order.
    pub body: Vec<Literal>,
}

impl RuleSpec {
    /// Create a rule.
    pub fn new(head: Atom, body: Vec<Literal>) -> Self {
        Self { head, body }
    }
}

impl Display for RuleSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.body.is_empty() {
            write!(f, "{}.", self.head)
        } else {
            write!(f, "{} :- {}.", self.head, self.body.iter().format(", "))
        }
    }
}

/// All rules of a program, queryable by head relation.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    rules: Vec<RuleSpec>,
}

impl RuleCatalog {
    /// Create a catalog from rules in program order.
    pub fn new(rules: Vec<RuleSpec>) -> Self {
        Self { rules }
    }

    /// All rules.
    pub fn rules(&self) -> &[RuleSpec] {
        &self.rules
    }

    /// The rules whose head derives `relation`, with their indexes.
    pub fn rules_for<'a>(
        &'a self,
        relation: &'a str,
    ) -> impl Iterator<Item = (usize, &'a RuleSpec)> + 'a {
        self.rules
            .iter()
            .enumerate()
            .filter(move |(_, rule)| rule.head.relation == relation)
    }
}
