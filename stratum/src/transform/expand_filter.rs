//! Pass splitting conjunctive filters into chains of single-condition
//! filters, so later passes can move and consume each conjunct on its own.

use crate::ram::{node::rewrite_operations, operation::Operation, RamTranslationUnit};

use super::{transform_queries, Transformer};

/// Splits `IF (a AND b)` into `IF a` nested in `IF b`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpandFilter;

impl Transformer for ExpandFilter {
    fn name(&self) -> &'static str {
        "ExpandFilter"
    }

    fn transform(&mut self, unit: &mut RamTranslationUnit) -> bool {
        transform_queries(unit, &mut |root| {
            rewrite_operations(root, &mut |operation| match operation {
                Operation::Filter { condition, nested } => {
                    let conjuncts = condition.into_conjuncts();
                    // A filter on `true` carries no conjunct and disappears.
                    conjuncts.into_iter().rev().fold(*nested, |inner, conjunct| {
                        Operation::Filter {
                            condition: Box::new(conjunct),
                            nested: Box::new(inner),
                        }
                    })
                }
                other => other,
            })
        })
    }
}

#[cfg(test)]
mod test {
    use crate::ram::{condition::Condition, expression::Expression, Program, Statement};

    use super::*;

    #[test]
    fn splits_conjunctions_and_drops_true_filters() {
        let first = Condition::equal(
            Expression::TupleElement {
                tuple_id: 0,
                element: 0,
            },
            Expression::signed(1),
        );
        let second = Condition::EmptinessCheck {
            relation: "delta".to_owned(),
        };

        let main = Statement::Query(Operation::Scan {
            relation: "edge".to_owned(),
            tuple_id: 0,
            parallel: false,
            nested: Box::new(Operation::Filter {
                condition: Box::new(Condition::conjoin([first.clone(), second.clone()])),
                nested: Box::new(Operation::Filter {
                    condition: Box::new(Condition::True),
                    nested: Box::new(Operation::Project {
                        relation: "out".to_owned(),
                        values: vec![Expression::TupleElement {
                            tuple_id: 0,
                            element: 0,
                        }],
                    }),
                }),
            }),
        });
        let mut unit = RamTranslationUnit::new(Program::new(Vec::new(), main));

        assert!(ExpandFilter.transform(&mut unit));
        assert!(!ExpandFilter.transform(&mut unit));

        let rendered = unit.program().main().to_string();
        assert!(rendered.contains(&format!("IF {first}\n")));
        assert!(rendered.contains(&format!("IF {second}\n")));
        assert!(!rendered.contains("IF true"));
    }
}
