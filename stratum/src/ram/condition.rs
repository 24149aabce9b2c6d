//! This module defines [Condition], the boolean RAM nodes.

use std::fmt::Display;

use itertools::Itertools;

use super::{
    expression::Expression,
    node::{map_condition_box, map_expression_box, map_expressions, RamMapper},
};

/// Comparison operators usable in [Condition::Constraint].
///
/// Equality and inequality compare raw domain values; the ordering
/// comparisons exist per numeric interpretation. The string operators
/// interpret their operands as interned symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintOperation {
    /// Equal.
    Equal,
    /// Not equal.
    NotEqual,
    /// Signed less than.
    Less,
    /// Signed less or equal.
    LessEqual,
    /// Signed greater than.
    Greater,
    /// Signed greater or equal.
    GreaterEqual,
    /// Unsigned less than.
    UnsignedLess,
    /// Unsigned less or equal.
    UnsignedLessEqual,
    /// Unsigned greater than.
    UnsignedGreater,
    /// Unsigned greater or equal.
    UnsignedGreaterEqual,
    /// Floating-point less than.
    FloatLess,
    /// Floating-point less or equal.
    FloatLessEqual,
    /// Floating-point greater than.
    FloatGreater,
    /// Floating-point greater or equal.
    FloatGreaterEqual,
    /// Left operand is a regular expression fully matching the right one.
    Match,
    /// Negation of [ConstraintOperation::Match].
    NotMatch,
    /// Left operand is a substring of the right one.
    Contains,
    /// Negation of [ConstraintOperation::Contains].
    NotContains,
}

impl Display for ConstraintOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            ConstraintOperation::Equal => "=",
            ConstraintOperation::NotEqual => "!=",
            ConstraintOperation::Less => "<",
            ConstraintOperation::LessEqual => "<=",
            ConstraintOperation::Greater => ">",
            ConstraintOperation::GreaterEqual => ">=",
            ConstraintOperation::UnsignedLess => "u<",
            ConstraintOperation::UnsignedLessEqual => "u<=",
            ConstraintOperation::UnsignedGreater => "u>",
            ConstraintOperation::UnsignedGreaterEqual => "u>=",
            ConstraintOperation::FloatLess => "f<",
            ConstraintOperation::FloatLessEqual => "f<=",
            ConstraintOperation::FloatGreater => "f>",
            ConstraintOperation::FloatGreaterEqual => "f>=",
            ConstraintOperation::Match => "match",
            ConstraintOperation::NotMatch => "not_match",
            ConstraintOperation::Contains => "contains",
            ConstraintOperation::NotContains => "not_contains",
        };
        f.write_str(symbol)
    }
}

/// A boolean RAM node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Condition {
    /// Always holds.
    True,
    /// Never holds.
    False,
    /// Both sub-conditions hold.
    Conjunction(Box<Condition>, Box<Condition>),
    /// The sub-condition does not hold.
    Negation(Box<Condition>),
    /// A binary comparison between two expression values.
    Constraint {
        /// The comparison operator.
        operation: ConstraintOperation,
        /// Left operand.
        lhs: Box<Expression>,
        /// Right operand.
        rhs: Box<Expression>,
    },
    /// A tuple matching the pattern exists in the relation. Pattern slots
    /// may be [Expression::Undefined]; pattern length equals the relation
    /// arity.
    ExistenceCheck {
        /// Queried relation.
        relation: String,
        /// One expression slot per attribute.
        pattern: Vec<Expression>,
    },
    /// The relation holds no tuple.
    EmptinessCheck {
        /// Queried relation.
        relation: String,
    },
}

impl Condition {
    /// An equality constraint between two expressions.
    pub fn equal(lhs: Expression, rhs: Expression) -> Self {
        Condition::Constraint {
            operation: ConstraintOperation::Equal,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Conjoin a sequence of conditions into one; an empty sequence yields
    /// [Condition::True].
    pub fn conjoin(conditions: impl IntoIterator<Item = Condition>) -> Self {
        conditions
            .into_iter()
            .reduce(|lhs, rhs| Condition::Conjunction(Box::new(lhs), Box::new(rhs)))
            .unwrap_or(Condition::True)
    }

    /// Flatten nested conjunctions into the list of leaf conjuncts.
    pub fn into_conjuncts(self) -> Vec<Condition> {
        match self {
            Condition::Conjunction(lhs, rhs) => {
                let mut conjuncts = lhs.into_conjuncts();
                conjuncts.extend(rhs.into_conjuncts());
                conjuncts
            }
            Condition::True => Vec::new(),
            other => vec![other],
        }
    }

    /// Replace each direct child through `mapper`.
    pub fn apply(&mut self, mapper: &mut impl RamMapper) {
        match self {
            Condition::Conjunction(lhs, rhs) => {
                map_condition_box(lhs, mapper);
                map_condition_box(rhs, mapper);
            }
            Condition::Negation(inner) => map_condition_box(inner, mapper),
            Condition::Constraint { lhs, rhs, .. } => {
                map_expression_box(lhs, mapper);
                map_expression_box(rhs, mapper);
            }
            Condition::ExistenceCheck { pattern, .. } => map_expressions(pattern, mapper),
            Condition::True | Condition::False | Condition::EmptinessCheck { .. } => {}
        }
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Condition::True => f.write_str("true"),
            Condition::False => f.write_str("false"),
            Condition::Conjunction(lhs, rhs) => write!(f, "({lhs} AND {rhs})"),
            Condition::Negation(inner) => write!(f, "(NOT {inner})"),
            Condition::Constraint {
                operation,
                lhs,
                rhs,
            } => write!(f, "({lhs} {operation} {rhs})"),
            Condition::ExistenceCheck { relation, pattern } => {
                write!(f, "({}) IN {relation}", pattern.iter().format(", "))
            }
            Condition::EmptinessCheck { relation } => write!(f, "({relation} = EMPTY)"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn conjoin_and_flatten_are_inverse() {
        let conjuncts = vec![
            Condition::equal(Expression::signed(1), Expression::signed(1)),
            Condition::EmptinessCheck {
                relation: "delta".to_owned(),
            },
            Condition::Negation(Box::new(Condition::False)),
        ];

        let conjunction = Condition::conjoin(conjuncts.clone());
        assert_eq!(conjunction.into_conjuncts(), conjuncts);
        assert_eq!(Condition::conjoin([]), Condition::True);
    }

    #[test]
    fn structural_equality_ignores_identity() {
        let first = Condition::equal(
            Expression::TupleElement {
                tuple_id: 0,
                element: 1,
            },
            Expression::signed(5),
        );
        let second = Condition::equal(
            Expression::TupleElement {
                tuple_id: 0,
                element: 1,
            },
            Expression::signed(5),
        );
        assert_eq!(first, second);
    }

    #[test]
    fn display() {
        let condition = Condition::Conjunction(
            Box::new(Condition::True),
            Box::new(Condition::EmptinessCheck {
                relation: "edge".to_owned(),
            }),
        );
        assert_eq!(condition.to_string(), "(true AND (edge = EMPTY))");
    }
}
