//! This module defines [Program], a complete RAM translation result.

use std::collections::BTreeMap;
use std::fmt::Display;

use hashbrown::HashMap;

use crate::error::report::ErrorReport;

use super::{condition::Condition, operation::Operation, relation::RelationDecl, statement::Statement};

/// A RAM program: relation declarations, the main statement, and named
/// subroutines serving provenance queries.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    declarations: Vec<RelationDecl>,
    main: Statement,
    subroutines: BTreeMap<String, Statement>,
}

impl Program {
    /// Create a program from its parts.
    pub fn new(declarations: Vec<RelationDecl>, main: Statement) -> Self {
        Self {
            declarations,
            main,
            subroutines: BTreeMap::new(),
        }
    }

    /// Attach a named subroutine.
    pub fn add_subroutine(&mut self, name: impl Into<String>, body: Statement) {
        self.subroutines.insert(name.into(), body);
    }

    /// All relation declarations.
    pub fn declarations(&self) -> &[RelationDecl] {
        &self.declarations
    }

    /// Look up the declaration of a relation by name.
    pub fn declaration(&self, name: &str) -> Option<&RelationDecl> {
        self.declarations
            .iter()
            .find(|declaration| declaration.name() == name)
    }

    /// The main statement.
    pub fn main(&self) -> &Statement {
        &self.main
    }

    /// Mutable access to the main statement.
    pub fn main_mut(&mut self) -> &mut Statement {
        &mut self.main
    }

    /// The named subroutines.
    pub fn subroutines(&self) -> &BTreeMap<String, Statement> {
        &self.subroutines
    }

    /// Look up a subroutine body by name.
    pub fn subroutine(&self, name: &str) -> Option<&Statement> {
        self.subroutines.get(name)
    }

    /// Run `action` on the root operation of every query of the program,
    /// in the main statement and in every subroutine.
    pub fn for_each_query_mut(&mut self, action: &mut impl FnMut(&mut Operation)) {
        self.main.for_each_query_mut(action);
        for body in self.subroutines.values_mut() {
            body.for_each_query_mut(action);
        }
    }

    /// Check that every referenced relation is declared and that every
    /// query pattern has the arity of its relation; problems are reported
    /// as error diagnostics.
    pub fn validate(&self, report: &mut ErrorReport) {
        let arities: HashMap<&str, usize> = self
            .declarations
            .iter()
            .map(|declaration| (declaration.name(), declaration.arity()))
            .collect();

        let mut check_reference = |relation: &str, pattern_len: Option<usize>, report: &mut ErrorReport| {
            match arities.get(relation) {
                None => report.add_error(format!("relation \"{relation}\" is not declared")),
                Some(&arity) => {
                    if let Some(len) = pattern_len {
                        if len != arity {
                            report.add_error(format!(
                                "pattern of length {len} used on relation \"{relation}\" of arity {arity}"
                            ));
                        }
                    }
                }
            }
        };

        fn check_condition(
            condition: &Condition,
            check: &mut impl FnMut(&str, Option<usize>, &mut ErrorReport),
            report: &mut ErrorReport,
        ) {
            match condition {
                Condition::Conjunction(lhs, rhs) => {
                    check_condition(lhs, check, report);
                    check_condition(rhs, check, report);
                }
                Condition::Negation(inner) => check_condition(inner, check, report),
                Condition::ExistenceCheck { relation, pattern } => {
                    check(relation, Some(pattern.len()), report)
                }
                Condition::EmptinessCheck { relation } => check(relation, None, report),
                Condition::True | Condition::False | Condition::Constraint { .. } => {}
            }
        }

        fn check_operation(
            operation: &Operation,
            check: &mut impl FnMut(&str, Option<usize>, &mut ErrorReport),
            report: &mut ErrorReport,
        ) {
            match operation {
                Operation::Scan { relation, .. } => check(relation, None, report),
                Operation::IndexScan {
                    relation, pattern, ..
                } => check(relation, Some(pattern.len()), report),
                Operation::Choice {
                    relation, condition, ..
                } => {
                    check(relation, None, report);
                    check_condition(condition, check, report);
                }
                Operation::IndexChoice {
                    relation,
                    pattern,
                    condition,
                    ..
                } => {
                    check(relation, Some(pattern.len()), report);
                    check_condition(condition, check, report);
                }
                Operation::Aggregate {
                    relation, condition, ..
                } => {
                    check(relation, None, report);
                    check_condition(condition, check, report);
                }
                Operation::IndexAggregate {
                    relation,
                    pattern,
                    condition,
                    ..
                } => {
                    check(relation, Some(pattern.len()), report);
                    check_condition(condition, check, report);
                }
                Operation::Filter { condition, .. } | Operation::Break { condition, .. } => {
                    check_condition(condition, check, report)
                }
                Operation::Project {
                    relation, values, ..
                } => check(relation, Some(values.len()), report),
                Operation::UnpackRecord { .. } | Operation::SubroutineReturn(_) => {}
            }
            if let Some(nested) = operation.nested() {
                check_operation(nested, check, report);
            }
        }

        fn check_statement(
            statement: &Statement,
            check: &mut impl FnMut(&str, Option<usize>, &mut ErrorReport),
            report: &mut ErrorReport,
        ) {
            match statement {
                Statement::Sequence(statements) | Statement::Parallel(statements) => {
                    for statement in statements {
                        check_statement(statement, check, report);
                    }
                }
                Statement::Loop(body) => check_statement(body, check, report),
                Statement::Exit(condition) => check_condition(condition, check, report),
                Statement::Query(operation) => check_operation(operation, check, report),
                Statement::Clear(_) | Statement::Merge { .. } | Statement::Swap { .. } => {
                    for relation in statement.referenced_relations() {
                        check(relation, None, report);
                    }
                }
            }
        }

        check_statement(&self.main, &mut check_reference, report);
        for body in self.subroutines.values() {
            check_statement(body, &mut check_reference, report);
        }
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "PROGRAM")?;
        for declaration in &self.declarations {
            writeln!(f, " {declaration}")?;
        }
        writeln!(f, " BEGIN MAIN")?;
        for line in self.main.to_string().lines() {
            writeln!(f, "  {line}")?;
        }
        writeln!(f, " END MAIN")?;
        for (name, body) in &self.subroutines {
            writeln!(f, " BEGIN SUBROUTINE {name}")?;
            for line in body.to_string().lines() {
                writeln!(f, "  {line}")?;
            }
            writeln!(f, " END SUBROUTINE")?;
        }
        writeln!(f, "END PROGRAM")
    }
}
