//! Pass hoisting filter conditions to the outermost scope in which they can
//! be evaluated.
//!
//! A condition can be evaluated as soon as every tuple id it references is
//! bound. Hoisting strips all filters off a loop nest and re-inserts each
//! condition at the earliest such point: ground conditions end up guarding
//! the whole query, conditions over outer loops move out of inner loops.
//! Index inference runs after this pass and expects equality conditions to
//! sit directly below the operation binding their tuple.

use hashbrown::HashSet;

use crate::{
    analysis::levels::condition_references,
    ram::{condition::Condition, node::TupleId, operation::Operation, RamTranslationUnit},
};

use super::{transform_queries, Transformer};

/// Moves each filter condition to the outermost scope where all referenced
/// tuple ids are bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoistConditions;

impl Transformer for HoistConditions {
    fn name(&self) -> &'static str {
        "HoistConditions"
    }

    fn transform(&mut self, unit: &mut RamTranslationUnit) -> bool {
        transform_queries(unit, &mut |root| {
            let mut pending = Vec::new();
            let stripped = strip_filters(root, &mut pending);
            let mut bound = HashSet::new();
            let placed = place_conditions(stripped, &mut bound, &mut pending);
            debug_assert!(
                pending.is_empty(),
                "conditions referencing unbound tuple ids left over"
            );
            placed
        })
    }
}

/// Remove every filter from the chain, collecting its conjuncts.
fn strip_filters(operation: Operation, collected: &mut Vec<Condition>) -> Operation {
    match operation {
        Operation::Filter { condition, nested } => {
            collected.extend(condition.into_conjuncts());
            strip_filters(*nested, collected)
        }
        mut other => {
            if let Some(nested) = other.nested_mut() {
                let owned = std::mem::replace(nested, Operation::SubroutineReturn(Vec::new()));
                *nested = strip_filters(owned, collected);
            }
            other
        }
    }
}

/// Re-insert conditions at the outermost point where they are evaluable,
/// walking the chain while tracking the bound tuple ids.
fn place_conditions(
    mut operation: Operation,
    bound: &mut HashSet<TupleId>,
    pending: &mut Vec<Condition>,
) -> Operation {
    let mut ready = Vec::new();
    let mut index = 0;
    while index < pending.len() {
        if is_evaluable(&pending[index], bound) {
            ready.push(pending.remove(index));
        } else {
            index += 1;
        }
    }

    if let Some(id) = operation.tuple_id() {
        bound.insert(id);
    }
    if let Some(nested) = operation.nested_mut() {
        let owned = std::mem::replace(nested, Operation::SubroutineReturn(Vec::new()));
        *nested = place_conditions(owned, bound, pending);
    }

    ready.into_iter().rev().fold(operation, |inner, condition| {
        Operation::Filter {
            condition: Box::new(condition),
            nested: Box::new(inner),
        }
    })
}

fn is_evaluable(condition: &Condition, bound: &HashSet<TupleId>) -> bool {
    let mut references = HashSet::new();
    condition_references(condition, &mut references);
    references.is_subset(bound)
}

#[cfg(test)]
mod test {
    use crate::ram::{expression::Expression, Program, Statement};

    use super::*;

    /// In `FOR t0 IN a: FOR t1 IN b: IF t0.0 = 1: PROJECT (t1.0)`, the
    /// filter only concerns the outer loop and must move above the inner
    /// scan.
    #[test]
    fn conditions_move_out_of_inner_loops() {
        let filter = Condition::equal(
            Expression::TupleElement {
                tuple_id: 0,
                element: 0,
            },
            Expression::signed(1),
        );
        let main = Statement::Query(Operation::Scan {
            relation: "a".to_owned(),
            tuple_id: 0,
            parallel: false,
            nested: Box::new(Operation::Scan {
                relation: "b".to_owned(),
                tuple_id: 1,
                parallel: false,
                nested: Box::new(Operation::Filter {
                    condition: Box::new(filter.clone()),
                    nested: Box::new(Operation::Project {
                        relation: "out".to_owned(),
                        values: vec![Expression::TupleElement {
                            tuple_id: 1,
                            element: 0,
                        }],
                    }),
                }),
            }),
        });
        let mut unit = RamTranslationUnit::new(Program::new(Vec::new(), main));

        assert!(HoistConditions.transform(&mut unit));

        let expected = Operation::Scan {
            relation: "a".to_owned(),
            tuple_id: 0,
            parallel: false,
            nested: Box::new(Operation::Filter {
                condition: Box::new(filter),
                nested: Box::new(Operation::Scan {
                    relation: "b".to_owned(),
                    tuple_id: 1,
                    parallel: false,
                    nested: Box::new(Operation::Project {
                        relation: "out".to_owned(),
                        values: vec![Expression::TupleElement {
                            tuple_id: 1,
                            element: 0,
                        }],
                    }),
                }),
            }),
        };
        assert_eq!(unit.program().main(), &Statement::Query(expected));

        // Hoisting is idempotent; the fixpoint loop terminates.
        assert!(!HoistConditions.transform(&mut unit));
    }

    #[test]
    fn ground_conditions_guard_the_whole_query() {
        let ground = Condition::EmptinessCheck {
            relation: "seen".to_owned(),
        };
        let main = Statement::Query(Operation::Scan {
            relation: "a".to_owned(),
            tuple_id: 0,
            parallel: false,
            nested: Box::new(Operation::Filter {
                condition: Box::new(ground.clone()),
                nested: Box::new(Operation::Project {
                    relation: "out".to_owned(),
                    values: vec![Expression::TupleElement {
                        tuple_id: 0,
                        element: 0,
                    }],
                }),
            }),
        });
        let mut unit = RamTranslationUnit::new(Program::new(Vec::new(), main));

        assert!(HoistConditions.transform(&mut unit));
        assert!(matches!(
            unit.program().main(),
            Statement::Query(Operation::Filter { .. })
        ));
    }
}
