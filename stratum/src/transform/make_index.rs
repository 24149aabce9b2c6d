//! Index inference: turns equality conditions into query patterns.
//!
//! An equality `t.k = e` where `e` does not depend on `t` pins attribute
//! `k` of the iteration binding `t`; such conditions become pattern slots
//! of an indexed operation instead of post-hoc filters. Runs after
//! condition hoisting, which places the relevant filters directly below
//! the operation binding their tuple.

use hashbrown::{HashMap, HashSet};

use crate::{
    analysis::levels::expression_references,
    ram::{
        condition::{Condition, ConstraintOperation},
        expression::Expression,
        node::{rewrite_operations, TupleId},
        operation::Operation,
        RamTranslationUnit,
    },
};

use super::{transform_queries, Transformer};

/// Converts scans, choices, and aggregates with equality conditions into
/// their indexed counterparts.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeIndex;

impl Transformer for MakeIndex {
    fn name(&self) -> &'static str {
        "MakeIndex"
    }

    fn transform(&mut self, unit: &mut RamTranslationUnit) -> bool {
        let arities: HashMap<String, usize> = unit
            .program()
            .declarations()
            .iter()
            .map(|declaration| (declaration.name().to_owned(), declaration.arity()))
            .collect();

        transform_queries(unit, &mut |root| {
            rewrite_operations(root, &mut |operation| index_operation(operation, &arities))
        })
    }
}

fn index_operation(operation: Operation, arities: &HashMap<String, usize>) -> Operation {
    match operation {
        Operation::Scan {
            relation,
            tuple_id,
            parallel,
            nested,
        } => {
            let Some(&arity) = arities.get(&relation) else {
                return Operation::Scan {
                    relation,
                    tuple_id,
                    parallel,
                    nested,
                };
            };
            let (conjuncts, inner) = peel_filters(*nested);
            let (pattern, leftover) = extract_pattern(conjuncts, tuple_id, arity);
            match pattern {
                Some(pattern) => Operation::IndexScan {
                    relation,
                    tuple_id,
                    pattern,
                    parallel,
                    nested: Box::new(wrap_filters(leftover, inner)),
                },
                None => Operation::Scan {
                    relation,
                    tuple_id,
                    parallel,
                    nested: Box::new(wrap_filters(leftover, inner)),
                },
            }
        }
        Operation::Choice {
            relation,
            tuple_id,
            condition,
            parallel,
            nested,
        } => {
            let Some(&arity) = arities.get(&relation) else {
                return Operation::Choice {
                    relation,
                    tuple_id,
                    condition,
                    parallel,
                    nested,
                };
            };
            let (pattern, leftover) = extract_pattern(condition.into_conjuncts(), tuple_id, arity);
            match pattern {
                Some(pattern) => Operation::IndexChoice {
                    relation,
                    tuple_id,
                    pattern,
                    condition: Box::new(Condition::conjoin(leftover)),
                    parallel,
                    nested,
                },
                None => Operation::Choice {
                    relation,
                    tuple_id,
                    condition: Box::new(Condition::conjoin(leftover)),
                    parallel,
                    nested,
                },
            }
        }
        Operation::Aggregate {
            relation,
            tuple_id,
            operation: fold,
            expression,
            condition,
            nested,
        } => {
            let Some(&arity) = arities.get(&relation) else {
                return Operation::Aggregate {
                    relation,
                    tuple_id,
                    operation: fold,
                    expression,
                    condition,
                    nested,
                };
            };
            let (pattern, leftover) = extract_pattern(condition.into_conjuncts(), tuple_id, arity);
            match pattern {
                Some(pattern) => Operation::IndexAggregate {
                    relation,
                    tuple_id,
                    operation: fold,
                    expression,
                    condition: Box::new(Condition::conjoin(leftover)),
                    pattern,
                    nested,
                },
                None => Operation::Aggregate {
                    relation,
                    tuple_id,
                    operation: fold,
                    expression,
                    condition: Box::new(Condition::conjoin(leftover)),
                    nested,
                },
            }
        }
        other => other,
    }
}

/// Collect the conjuncts of the filter chain directly below an operation.
fn peel_filters(operation: Operation) -> (Vec<Condition>, Operation) {
    match operation {
        Operation::Filter { condition, nested } => {
            let mut conjuncts = condition.into_conjuncts();
            let (rest, inner) = peel_filters(*nested);
            conjuncts.extend(rest);
            (conjuncts, inner)
        }
        other => (Vec::new(), other),
    }
}

fn wrap_filters(conjuncts: Vec<Condition>, inner: Operation) -> Operation {
    conjuncts.into_iter().rev().fold(inner, |nested, condition| {
        Operation::Filter {
            condition: Box::new(condition),
            nested: Box::new(nested),
        }
    })
}

/// Split equality conjuncts pinning attributes of `tuple_id` off into a
/// query pattern; everything else is returned as leftover. `None` when no
/// attribute could be pinned.
fn extract_pattern(
    conjuncts: Vec<Condition>,
    tuple_id: TupleId,
    arity: usize,
) -> (Option<Vec<Expression>>, Vec<Condition>) {
    let mut pattern = vec![Expression::Undefined; arity];
    let mut leftover = Vec::new();
    let mut any = false;

    for conjunct in conjuncts {
        match pinned_attribute(&conjunct, tuple_id, arity) {
            Some((element, value)) if pattern[element].is_undefined() => {
                pattern[element] = value;
                any = true;
            }
            _ => leftover.push(conjunct),
        }
    }

    (any.then_some(pattern), leftover)
}

/// `t.k = e` (or `e = t.k`) with `e` independent of `t` pins attribute `k`.
fn pinned_attribute(
    conjunct: &Condition,
    tuple_id: TupleId,
    arity: usize,
) -> Option<(usize, Expression)> {
    let Condition::Constraint {
        operation: ConstraintOperation::Equal,
        lhs,
        rhs,
    } = conjunct
    else {
        return None;
    };

    let candidate = |element_side: &Expression, value_side: &Expression| {
        let Expression::TupleElement {
            tuple_id: id,
            element,
        } = element_side
        else {
            return None;
        };
        if *id != tuple_id || *element >= arity || value_side.is_undefined() {
            return None;
        }
        // The pinning value is evaluated before the iteration binds its
        // tuple, so it may only use bindings of outer levels.
        let mut references = HashSet::new();
        expression_references(value_side, &mut references);
        references
            .iter()
            .all(|&reference| reference < tuple_id)
            .then(|| (*element, value_side.clone()))
    };

    candidate(lhs, rhs).or_else(|| candidate(rhs, lhs))
}

#[cfg(test)]
mod test {
    use stratum_physical::datatypes::AttributeType;

    use crate::ram::{
        relation::{RelationDecl, RelationRole},
        Program, Statement,
    };

    use super::*;

    fn unit_with_query(operation: Operation) -> RamTranslationUnit {
        let declarations = vec![
            RelationDecl::with_uniform_type("edge", 2, AttributeType::Signed, RelationRole::Input),
            RelationDecl::with_uniform_type("out", 1, AttributeType::Signed, RelationRole::Output),
        ];
        RamTranslationUnit::new(Program::new(declarations, Statement::Query(operation)))
    }

    #[test]
    fn equality_filter_becomes_index_scan() {
        let scan = Operation::Scan {
            relation: "edge".to_owned(),
            tuple_id: 0,
            parallel: false,
            nested: Box::new(Operation::Filter {
                condition: Box::new(Condition::equal(
                    Expression::TupleElement {
                        tuple_id: 0,
                        element: 0,
                    },
                    Expression::signed(1),
                )),
                nested: Box::new(Operation::Project {
                    relation: "out".to_owned(),
                    values: vec![Expression::TupleElement {
                        tuple_id: 0,
                        element: 1,
                    }],
                }),
            }),
        };
        let mut unit = unit_with_query(scan);

        assert!(MakeIndex.transform(&mut unit));

        match unit.program().main() {
            Statement::Query(Operation::IndexScan {
                relation, pattern, nested, ..
            }) => {
                assert_eq!(relation, "edge");
                assert_eq!(pattern[0], Expression::signed(1));
                assert!(pattern[1].is_undefined());
                assert!(matches!(nested.as_ref(), Operation::Project { .. }));
            }
            other => panic!("expected an index scan, got:\n{other}"),
        }
    }

    #[test]
    fn self_referencing_equalities_stay_filters() {
        // t0.0 = t0.1 cannot be answered by an index lookup.
        let scan = Operation::Scan {
            relation: "edge".to_owned(),
            tuple_id: 0,
            parallel: false,
            nested: Box::new(Operation::Filter {
                condition: Box::new(Condition::equal(
                    Expression::TupleElement {
                        tuple_id: 0,
                        element: 0,
                    },
                    Expression::TupleElement {
                        tuple_id: 0,
                        element: 1,
                    },
                )),
                nested: Box::new(Operation::Project {
                    relation: "out".to_owned(),
                    values: vec![Expression::TupleElement {
                        tuple_id: 0,
                        element: 0,
                    }],
                }),
            }),
        };
        let mut unit = unit_with_query(scan);

        assert!(!MakeIndex.transform(&mut unit));
        assert!(matches!(
            unit.program().main(),
            Statement::Query(Operation::Scan { .. })
        ));
    }

    #[test]
    fn choice_condition_contributes_to_the_pattern() {
        let choice = Operation::Choice {
            relation: "edge".to_owned(),
            tuple_id: 0,
            condition: Box::new(Condition::equal(
                Expression::TupleElement {
                    tuple_id: 0,
                    element: 1,
                },
                Expression::signed(3),
            )),
            parallel: false,
            nested: Box::new(Operation::Project {
                relation: "out".to_owned(),
                values: vec![Expression::TupleElement {
                    tuple_id: 0,
                    element: 0,
                }],
            }),
        };
        let mut unit = unit_with_query(choice);

        assert!(MakeIndex.transform(&mut unit));
        match unit.program().main() {
            Statement::Query(Operation::IndexChoice {
                pattern, condition, ..
            }) => {
                assert!(pattern[0].is_undefined());
                assert_eq!(pattern[1], Expression::signed(3));
                assert_eq!(condition.as_ref(), &Condition::True);
            }
            other => panic!("expected an index choice, got:\n{other}"),
        }
    }
}
