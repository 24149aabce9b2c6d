//! Pass converting scans whose binding is never consumed into choices.
//!
//! If the operations below a scan never read the scanned tuple, every
//! iteration behaves identically and one witness suffices: the scan has
//! at-most-one-result shape and becomes a choice, saving the iteration.

use hashbrown::HashSet;

use crate::{
    analysis::levels::operation_references,
    ram::{
        condition::Condition, expression::Expression, node::rewrite_operations,
        operation::Operation, RamTranslationUnit,
    },
};

use super::{transform_queries, Transformer};

/// Converts `FOR t IN R` into `CHOICE t IN R` when `t` is unused below.
#[derive(Debug, Clone, Copy, Default)]
pub struct IfExistsConversion;

impl Transformer for IfExistsConversion {
    fn name(&self) -> &'static str {
        "IfExistsConversion"
    }

    fn transform(&mut self, unit: &mut RamTranslationUnit) -> bool {
        transform_queries(unit, &mut |root| {
            rewrite_operations(root, &mut |operation| match operation {
                Operation::Scan {
                    relation,
                    tuple_id,
                    parallel,
                    nested,
                } if convertible(&nested, tuple_id) => Operation::Choice {
                    relation,
                    tuple_id,
                    condition: Box::new(Condition::True),
                    parallel,
                    nested,
                },
                Operation::IndexScan {
                    relation,
                    tuple_id,
                    pattern,
                    parallel,
                    nested,
                } if convertible(&nested, tuple_id) => Operation::IndexChoice {
                    relation,
                    tuple_id,
                    pattern,
                    condition: Box::new(Condition::True),
                    parallel,
                    nested,
                },
                other => other,
            })
        })
    }
}

/// The iteration collapses to a choice only if the body never reads the
/// scanned tuple and behaves identically per iteration; a counter in the
/// body makes iterations observable even without the binding.
fn convertible(nested: &Operation, tuple_id: usize) -> bool {
    let mut references = HashSet::new();
    operation_references(nested, &mut references);
    !references.contains(&tuple_id) && !contains_auto_increment(nested)
}

fn contains_auto_increment(operation: &Operation) -> bool {
    fn expression_has_counter(expression: &Expression) -> bool {
        matches!(expression, Expression::AutoIncrement)
            || expression.children().any(expression_has_counter)
    }

    fn condition_has_counter(condition: &Condition) -> bool {
        match condition {
            Condition::Conjunction(lhs, rhs) => {
                condition_has_counter(lhs) || condition_has_counter(rhs)
            }
            Condition::Negation(inner) => condition_has_counter(inner),
            Condition::Constraint { lhs, rhs, .. } => {
                expression_has_counter(lhs) || expression_has_counter(rhs)
            }
            Condition::ExistenceCheck { pattern, .. } => {
                pattern.iter().any(expression_has_counter)
            }
            Condition::True | Condition::False | Condition::EmptinessCheck { .. } => false,
        }
    }

    let own = match operation {
        Operation::IndexScan { pattern, .. } => pattern.iter().any(expression_has_counter),
        Operation::Choice { condition, .. } => condition_has_counter(condition),
        Operation::IndexChoice {
            pattern, condition, ..
        } => pattern.iter().any(expression_has_counter) || condition_has_counter(condition),
        Operation::Aggregate {
            expression,
            condition,
            ..
        } => expression_has_counter(expression) || condition_has_counter(condition),
        Operation::IndexAggregate {
            expression,
            condition,
            pattern,
            ..
        } => {
            expression_has_counter(expression)
                || condition_has_counter(condition)
                || pattern.iter().any(expression_has_counter)
        }
        Operation::UnpackRecord { expression, .. } => expression_has_counter(expression),
        Operation::Filter { condition, .. } | Operation::Break { condition, .. } => {
            condition_has_counter(condition)
        }
        Operation::Project { values, .. } | Operation::SubroutineReturn(values) => {
            values.iter().any(expression_has_counter)
        }
        Operation::Scan { .. } => false,
    };
    own || operation
        .nested()
        .is_some_and(contains_auto_increment)
}
