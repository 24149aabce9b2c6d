//! Index analysis: which search signatures a program uses per relation.
//!
//! The interpreter materializes one relation index per signature found
//! here before execution starts, so that every indexed operation of the
//! program can be answered without falling back to full scans.

use hashbrown::HashMap;
use std::collections::BTreeSet;

use stratum_physical::tabular::SearchSignature;

use crate::ram::{
    condition::Condition, expression::Expression, operation::Operation, program::Program,
    statement::Statement,
};

/// The set of search signatures each relation is accessed with.
#[derive(Debug, Default)]
pub struct IndexAnalysis {
    signatures: HashMap<String, BTreeSet<SearchSignature>>,
}

impl IndexAnalysis {
    /// Compute the analysis for `program`.
    pub fn compute(program: &Program) -> Self {
        let mut analysis = Self::default();
        analysis.visit_statement(program.main());
        for body in program.subroutines().values() {
            analysis.visit_statement(body);
        }
        log::debug!(
            "index analysis found signatures for {} relation(s)",
            analysis.signatures.len()
        );
        analysis
    }

    /// Iterate the signatures recorded for `relation`.
    pub fn signatures(&self, relation: &str) -> impl Iterator<Item = SearchSignature> + '_ {
        self.signatures
            .get(relation)
            .into_iter()
            .flatten()
            .copied()
    }

    /// Iterate all relations with at least one recorded signature.
    pub fn relations(&self) -> impl Iterator<Item = &str> {
        self.signatures.keys().map(String::as_str)
    }

    fn record(&mut self, relation: &str, pattern: &[Expression]) {
        let signature = SearchSignature::from_positions(
            pattern
                .iter()
                .enumerate()
                .filter(|(_, slot)| !slot.is_undefined())
                .map(|(position, _)| position),
        );
        if signature.is_empty() {
            return;
        }
        self.signatures
            .entry(relation.to_owned())
            .or_default()
            .insert(signature);
    }

    fn visit_statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Sequence(statements) | Statement::Parallel(statements) => {
                for statement in statements {
                    self.visit_statement(statement);
                }
            }
            Statement::Loop(body) => self.visit_statement(body),
            Statement::Exit(condition) => self.visit_condition(condition),
            Statement::Query(operation) => self.visit_operation(operation),
            Statement::Clear(_) | Statement::Merge { .. } | Statement::Swap { .. } => {}
        }
    }

    fn visit_operation(&mut self, operation: &Operation) {
        match operation {
            Operation::IndexScan {
                relation, pattern, ..
            } => self.record(relation, pattern),
            Operation::IndexChoice {
                relation,
                pattern,
                condition,
                ..
            }
            | Operation::IndexAggregate {
                relation,
                pattern,
                condition,
                ..
            } => {
                self.record(relation, pattern);
                self.visit_condition(condition);
            }
            Operation::Choice { condition, .. }
            | Operation::Aggregate { condition, .. }
            | Operation::Filter { condition, .. }
            | Operation::Break { condition, .. } => self.visit_condition(condition),
            Operation::Scan { .. }
            | Operation::UnpackRecord { .. }
            | Operation::Project { .. }
            | Operation::SubroutineReturn(_) => {}
        }
        if let Some(nested) = operation.nested() {
            self.visit_operation(nested);
        }
    }

    fn visit_condition(&mut self, condition: &Condition) {
        match condition {
            Condition::Conjunction(lhs, rhs) => {
                self.visit_condition(lhs);
                self.visit_condition(rhs);
            }
            Condition::Negation(inner) => self.visit_condition(inner),
            Condition::ExistenceCheck { relation, pattern } => self.record(relation, pattern),
            Condition::True
            | Condition::False
            | Condition::Constraint { .. }
            | Condition::EmptinessCheck { .. } => {}
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn collects_signatures_from_scans_and_existence_checks() {
        let main = Statement::Query(Operation::IndexScan {
            relation: "edge".to_owned(),
            tuple_id: 0,
            pattern: vec![Expression::signed(1), Expression::Undefined],
            parallel: false,
            nested: Box::new(Operation::Filter {
                condition: Box::new(Condition::ExistenceCheck {
                    relation: "edge".to_owned(),
                    pattern: vec![Expression::Undefined, Expression::signed(3)],
                }),
                nested: Box::new(Operation::Project {
                    relation: "out".to_owned(),
                    values: vec![Expression::TupleElement {
                        tuple_id: 0,
                        element: 1,
                    }],
                }),
            }),
        });
        let program = Program::new(Vec::new(), main);

        let analysis = IndexAnalysis::compute(&program);
        let signatures: Vec<_> = analysis.signatures("edge").collect();
        assert_eq!(
            signatures,
            vec![
                SearchSignature::from_positions([0]),
                SearchSignature::from_positions([1])
            ]
        );
    }
}
