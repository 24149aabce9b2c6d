//! Level analysis: which loop-nest bindings an expression or condition
//! depends on.
//!
//! The level of a node is the innermost (largest) tuple id it references;
//! ground nodes have no level. Filter hoisting uses levels to find the
//! outermost scope a condition can move to, and index inference uses them
//! to decide whether an equality constraint can become a pattern slot.

use hashbrown::HashSet;

use crate::ram::{
    condition::Condition, expression::Expression, node::TupleId, operation::Operation,
};

/// Collect every tuple id referenced by an expression.
pub fn expression_references(expression: &Expression, references: &mut HashSet<TupleId>) {
    if let Expression::TupleElement { tuple_id, .. } = expression {
        references.insert(*tuple_id);
    }
    for child in expression.children() {
        expression_references(child, references);
    }
}

/// Collect every tuple id referenced by a condition.
pub fn condition_references(condition: &Condition, references: &mut HashSet<TupleId>) {
    match condition {
        Condition::Conjunction(lhs, rhs) => {
            condition_references(lhs, references);
            condition_references(rhs, references);
        }
        Condition::Negation(inner) => condition_references(inner, references),
        Condition::Constraint { lhs, rhs, .. } => {
            expression_references(lhs, references);
            expression_references(rhs, references);
        }
        Condition::ExistenceCheck { pattern, .. } => {
            for slot in pattern {
                expression_references(slot, references);
            }
        }
        Condition::True | Condition::False | Condition::EmptinessCheck { .. } => {}
    }
}

/// Collect every tuple id referenced anywhere in an operation subtree,
/// including patterns, conditions, projected values, and nested operations.
/// Binding slots introduced by the operations themselves do not count.
pub fn operation_references(operation: &Operation, references: &mut HashSet<TupleId>) {
    match operation {
        Operation::IndexScan { pattern, .. } => {
            for slot in pattern {
                expression_references(slot, references);
            }
        }
        Operation::Choice { condition, .. } => condition_references(condition, references),
        Operation::IndexChoice {
            pattern, condition, ..
        } => {
            for slot in pattern {
                expression_references(slot, references);
            }
            condition_references(condition, references);
        }
        Operation::Aggregate {
            expression,
            condition,
            ..
        } => {
            expression_references(expression, references);
            condition_references(condition, references);
        }
        Operation::IndexAggregate {
            expression,
            condition,
            pattern,
            ..
        } => {
            expression_references(expression, references);
            condition_references(condition, references);
            for slot in pattern {
                expression_references(slot, references);
            }
        }
        Operation::UnpackRecord { expression, .. } => {
            expression_references(expression, references)
        }
        Operation::Filter { condition, .. } | Operation::Break { condition, .. } => {
            condition_references(condition, references)
        }
        Operation::Project { values, .. } | Operation::SubroutineReturn(values) => {
            for value in values {
                expression_references(value, references);
            }
        }
        Operation::Scan { .. } => {}
    }
    if let Some(nested) = operation.nested() {
        operation_references(nested, references);
    }
}

/// The level of an expression: the largest referenced tuple id, or `None`
/// for ground expressions.
pub fn expression_level(expression: &Expression) -> Option<TupleId> {
    let mut references = HashSet::new();
    expression_references(expression, &mut references);
    references.into_iter().max()
}

/// The level of a condition: the largest referenced tuple id, or `None`
/// for ground conditions.
pub fn condition_level(condition: &Condition) -> Option<TupleId> {
    let mut references = HashSet::new();
    condition_references(condition, &mut references);
    references.into_iter().max()
}

#[cfg(test)]
mod test {
    use crate::ram::expression::IntrinsicOperation;

    use super::*;

    #[test]
    fn levels() {
        let ground = Expression::signed(42);
        assert_eq!(expression_level(&ground), None);

        let nested = Expression::Intrinsic {
            operation: IntrinsicOperation::Add,
            arguments: vec![
                Expression::TupleElement {
                    tuple_id: 0,
                    element: 1,
                },
                Expression::TupleElement {
                    tuple_id: 2,
                    element: 0,
                },
            ],
        };
        assert_eq!(expression_level(&nested), Some(2));

        let condition = Condition::equal(nested, Expression::signed(1));
        assert_eq!(condition_level(&condition), Some(2));
        assert_eq!(condition_level(&Condition::True), None);
    }
}
