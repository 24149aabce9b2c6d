//! Pass ordering conjuncts by expected evaluation cost.
//!
//! Constraints over already-bound values are cheap; existence checks hit
//! the relation store and go last. The sort is stable, so conjuncts of the
//! same cost class keep their order and the pass cannot oscillate.

use crate::ram::{
    condition::Condition, node::rewrite_operations, RamTranslationUnit,
};

use super::{eliminate_duplicates::operation_condition_mut, transform_queries, Transformer};

/// Sorts the conjuncts of every condition from cheap to expensive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReorderConditions;

impl Transformer for ReorderConditions {
    fn name(&self) -> &'static str {
        "ReorderConditions"
    }

    fn transform(&mut self, unit: &mut RamTranslationUnit) -> bool {
        transform_queries(unit, &mut |root| {
            rewrite_operations(root, &mut |mut operation| {
                if let Some(condition) = operation_condition_mut(&mut operation) {
                    let owned = std::mem::replace(condition, Condition::True);
                    *condition = reorder(owned);
                }
                operation
            })
        })
    }
}

fn reorder(condition: Condition) -> Condition {
    let mut conjuncts = condition.into_conjuncts();
    if conjuncts.is_empty() {
        return Condition::True;
    }
    conjuncts.sort_by_key(cost);
    Condition::conjoin(conjuncts)
}

fn cost(condition: &Condition) -> u8 {
    match condition {
        Condition::True | Condition::False | Condition::Constraint { .. } => 0,
        Condition::Negation(inner) => cost(inner),
        Condition::Conjunction(..) => 1,
        Condition::EmptinessCheck { .. } => 2,
        Condition::ExistenceCheck { .. } => 3,
    }
}
