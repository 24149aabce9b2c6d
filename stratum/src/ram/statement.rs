//! This module defines [Statement], the control-flow level of RAM programs.

use std::fmt::Display;

use super::{condition::Condition, node::RamMapper, operation::Operation};

/// A control-flow or relation-management RAM node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// Execute sub-statements in order.
    Sequence(Vec<Statement>),
    /// Repeat the body until an inner [Statement::Exit] fires.
    Loop(Box<Statement>),
    /// Terminate the innermost enclosing loop when the condition holds;
    /// the usual fixpoint test is emptiness of a delta relation.
    Exit(Condition),
    /// A block of independent sub-statements.
    Parallel(Vec<Statement>),
    /// Execute a loop nest.
    Query(Operation),
    /// Remove all tuples of a relation.
    Clear(String),
    /// Insert every tuple of `source` into `target`.
    Merge {
        /// Relation the tuples are read from.
        source: String,
        /// Relation the tuples are inserted into.
        target: String,
    },
    /// Exchange the contents of two relations of equal arity.
    Swap {
        /// One relation.
        first: String,
        /// The other relation.
        second: String,
    },
}

impl Statement {
    /// Replace each direct child through `mapper`.
    pub fn apply(&mut self, mapper: &mut impl RamMapper) {
        match self {
            Statement::Sequence(statements) | Statement::Parallel(statements) => {
                for slot in statements {
                    let owned = std::mem::replace(slot, Statement::Sequence(Vec::new()));
                    *slot = mapper.map_statement(owned);
                }
            }
            Statement::Loop(body) => {
                let owned = std::mem::replace(body.as_mut(), Statement::Sequence(Vec::new()));
                **body = mapper.map_statement(owned);
            }
            Statement::Exit(condition) => {
                let owned = std::mem::replace(condition, Condition::True);
                *condition = mapper.map_condition(owned);
            }
            Statement::Query(operation) => {
                let owned = std::mem::replace(operation, Operation::SubroutineReturn(Vec::new()));
                *operation = mapper.map_operation(owned);
            }
            Statement::Clear(_) | Statement::Merge { .. } | Statement::Swap { .. } => {}
        }
    }

    /// Run `action` on the root operation of every query in this statement
    /// tree, in execution order.
    pub fn for_each_query_mut(&mut self, action: &mut impl FnMut(&mut Operation)) {
        match self {
            Statement::Sequence(statements) | Statement::Parallel(statements) => {
                for statement in statements {
                    statement.for_each_query_mut(action);
                }
            }
            Statement::Loop(body) => body.for_each_query_mut(action),
            Statement::Query(operation) => action(operation),
            Statement::Exit(_)
            | Statement::Clear(_)
            | Statement::Merge { .. }
            | Statement::Swap { .. } => {}
        }
    }

    /// Run `action` on the root operation of every query, read-only.
    pub fn for_each_query(&self, action: &mut impl FnMut(&Operation)) {
        match self {
            Statement::Sequence(statements) | Statement::Parallel(statements) => {
                for statement in statements {
                    statement.for_each_query(action);
                }
            }
            Statement::Loop(body) => body.for_each_query(action),
            Statement::Query(operation) => action(operation),
            Statement::Exit(_)
            | Statement::Clear(_)
            | Statement::Merge { .. }
            | Statement::Swap { .. } => {}
        }
    }

    /// Names of the relations this statement refers to directly.
    pub fn referenced_relations(&self) -> Vec<&str> {
        match self {
            Statement::Clear(relation) => vec![relation],
            Statement::Merge { source, target } => vec![source, target],
            Statement::Swap { first, second } => vec![first, second],
            _ => Vec::new(),
        }
    }

    fn fmt_indented(&self, f: &mut std::fmt::Formatter<'_>, indent: usize) -> std::fmt::Result {
        let pad = " ".repeat(indent);
        match self {
            Statement::Sequence(statements) => {
                for statement in statements {
                    statement.fmt_indented(f, indent)?;
                }
                Ok(())
            }
            Statement::Loop(body) => {
                writeln!(f, "{pad}LOOP")?;
                body.fmt_indented(f, indent + 1)?;
                writeln!(f, "{pad}END LOOP")
            }
            Statement::Exit(condition) => writeln!(f, "{pad}EXIT {condition}"),
            Statement::Parallel(statements) => {
                writeln!(f, "{pad}PARALLEL")?;
                for statement in statements {
                    statement.fmt_indented(f, indent + 1)?;
                }
                writeln!(f, "{pad}END PARALLEL")
            }
            Statement::Query(operation) => {
                writeln!(f, "{pad}QUERY")?;
                write!(f, "{}", IndentedOperation(operation, indent + 1))
            }
            Statement::Clear(relation) => writeln!(f, "{pad}CLEAR {relation}"),
            Statement::Merge { source, target } => {
                writeln!(f, "{pad}MERGE {source} INTO {target}")
            }
            Statement::Swap { first, second } => writeln!(f, "{pad}SWAP ({first}, {second})"),
        }
    }
}

struct IndentedOperation<'a>(&'a Operation, usize);

impl Display for IndentedOperation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Re-indent the operation rendering under the query header.
        for line in self.0.to_string().lines() {
            writeln!(f, "{}{line}", " ".repeat(self.1))?;
        }
        Ok(())
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_indented(f, 0)
    }
}

#[cfg(test)]
mod test {
    use crate::ram::expression::Expression;

    use super::*;

    fn query(relation: &str) -> Statement {
        Statement::Query(Operation::Scan {
            relation: relation.to_owned(),
            tuple_id: 0,
            parallel: false,
            nested: Box::new(Operation::Project {
                relation: "out".to_owned(),
                values: vec![Expression::TupleElement {
                    tuple_id: 0,
                    element: 0,
                }],
            }),
        })
    }

    #[test]
    fn queries_are_visited_in_order() {
        let mut program = Statement::Sequence(vec![
            query("a"),
            Statement::Loop(Box::new(Statement::Sequence(vec![
                query("b"),
                Statement::Exit(Condition::EmptinessCheck {
                    relation: "delta".to_owned(),
                }),
            ]))),
            Statement::Clear("scratch".to_owned()),
        ]);

        let mut visited = Vec::new();
        program.for_each_query_mut(&mut |operation| {
            if let Operation::Scan { relation, .. } = operation {
                visited.push(relation.clone());
            }
        });
        assert_eq!(visited, vec!["a", "b"]);
    }

    #[test]
    fn display_renders_control_flow() {
        let statement = Statement::Loop(Box::new(Statement::Sequence(vec![
            Statement::Swap {
                first: "delta".to_owned(),
                second: "new".to_owned(),
            },
            Statement::Exit(Condition::EmptinessCheck {
                relation: "delta".to_owned(),
            }),
        ])));

        let rendered = statement.to_string();
        assert!(rendered.starts_with("LOOP\n SWAP (delta, new)\n EXIT (delta = EMPTY)\n"));
        assert!(rendered.ends_with("END LOOP\n"));
    }
}
