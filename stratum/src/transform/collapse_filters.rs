//! Pass merging chains of filters back into a single conjunction, after
//! index inference has consumed the conjuncts it needed.

use crate::ram::{
    condition::Condition, node::rewrite_operations, operation::Operation, RamTranslationUnit,
};

use super::{transform_queries, Transformer};

/// Merges `IF a` nested in `IF b` into `IF (a AND b)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollapseFilters;

impl Transformer for CollapseFilters {
    fn name(&self) -> &'static str {
        "CollapseFilters"
    }

    fn transform(&mut self, unit: &mut RamTranslationUnit) -> bool {
        transform_queries(unit, &mut |root| {
            rewrite_operations(root, &mut |operation| match operation {
                Operation::Filter { condition, nested } => match *nested {
                    // The inner chain is already collapsed bottom-up.
                    Operation::Filter {
                        condition: inner_condition,
                        nested: inner_nested,
                    } => Operation::Filter {
                        condition: Box::new(Condition::Conjunction(condition, inner_condition)),
                        nested: inner_nested,
                    },
                    other => Operation::Filter {
                        condition,
                        nested: Box::new(other),
                    },
                },
                other => other,
            })
        })
    }
}
