//! Pass renumbering tuple identifiers densely in loop-nest order.
//!
//! Structural rewrites leave gaps and reorderings in the identifier space
//! of a query; this pass reassigns `t0, t1, ...` in nesting order and
//! remaps every tuple-element access accordingly, restoring the invariant
//! that identifiers are unique and dense within a query.

use hashbrown::HashMap;

use crate::ram::{
    expression::Expression,
    node::{rewrite_expressions, TupleId},
    operation::Operation,
    RamTranslationUnit,
};

use super::{transform_queries, Transformer};

/// Renumbers the binding slots of every query to `0..n` in nesting order.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenumberTupleIds;

impl Transformer for RenumberTupleIds {
    fn name(&self) -> &'static str {
        "RenumberTupleIds"
    }

    fn transform(&mut self, unit: &mut RamTranslationUnit) -> bool {
        transform_queries(unit, &mut |root| {
            let mut order = Vec::new();
            collect_ids(&root, &mut order);
            let mapping: HashMap<TupleId, TupleId> = order
                .iter()
                .enumerate()
                .map(|(new, &old)| (old, new))
                .collect();
            debug_assert_eq!(
                mapping.len(),
                order.len(),
                "tuple identifiers must be unique within a query"
            );

            let mut renumbered = rewrite_expressions(root, &mut |expression| match expression {
                Expression::TupleElement { tuple_id, element } => Expression::TupleElement {
                    tuple_id: *mapping
                        .get(&tuple_id)
                        .expect("tuple-element access to an identifier bound in this query"),
                    element,
                },
                other => other,
            });
            renumber_bindings(&mut renumbered, &mapping);
            renumbered
        })
    }
}

fn collect_ids(operation: &Operation, order: &mut Vec<TupleId>) {
    if let Some(id) = operation.tuple_id() {
        order.push(id);
    }
    if let Some(nested) = operation.nested() {
        collect_ids(nested, order);
    }
}

fn renumber_bindings(operation: &mut Operation, mapping: &HashMap<TupleId, TupleId>) {
    if let Some(id) = operation.tuple_id() {
        operation.set_tuple_id(mapping[&id]);
    }
    if let Some(nested) = operation.nested_mut() {
        renumber_bindings(nested, mapping);
    }
}
