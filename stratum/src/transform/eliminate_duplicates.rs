//! Pass removing structurally equal duplicate conjuncts from conditions.
//!
//! Duplicates arise when rule bodies repeat literals or when hoisting and
//! collapsing bring equal conditions together; structural equality decides
//! what counts as the same condition.

use crate::ram::{
    condition::Condition, node::rewrite_operations, operation::Operation, RamTranslationUnit,
};

use super::{transform_queries, Transformer};

/// Deduplicates the conjuncts of every filter, choice, and aggregate
/// condition.
#[derive(Debug, Clone, Copy, Default)]
pub struct EliminateDuplicates;

impl Transformer for EliminateDuplicates {
    fn name(&self) -> &'static str {
        "EliminateDuplicates"
    }

    fn transform(&mut self, unit: &mut RamTranslationUnit) -> bool {
        transform_queries(unit, &mut |root| {
            rewrite_operations(root, &mut |mut operation| {
                if let Some(condition) = operation_condition_mut(&mut operation) {
                    let owned = std::mem::replace(condition, Condition::True);
                    *condition = deduplicate(owned);
                }
                operation
            })
        })
    }
}

pub(crate) fn operation_condition_mut(operation: &mut Operation) -> Option<&mut Condition> {
    match operation {
        Operation::Choice { condition, .. }
        | Operation::IndexChoice { condition, .. }
        | Operation::Aggregate { condition, .. }
        | Operation::IndexAggregate { condition, .. }
        | Operation::Filter { condition, .. }
        | Operation::Break { condition, .. } => Some(condition),
        _ => None,
    }
}

fn deduplicate(condition: Condition) -> Condition {
    let conjuncts = condition.into_conjuncts();
    if conjuncts.is_empty() {
        return Condition::True;
    }
    let mut unique: Vec<Condition> = Vec::with_capacity(conjuncts.len());
    for conjunct in conjuncts {
        if !unique.contains(&conjunct) {
            unique.push(conjunct);
        }
    }
    Condition::conjoin(unique)
}
