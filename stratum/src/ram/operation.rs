//! This module defines [Operation], the RAM nodes forming the loop nest of
//! a query.
//!
//! Every operation except [Operation::Project] and
//! [Operation::SubroutineReturn] nests exactly one inner operation; a query
//! is therefore a chain from the outermost iteration down to a projection or
//! return leaf. Scans and choices carry a `parallel` flag instead of being
//! distinct node kinds; a flagged operation is semantically identical but
//! marked safe for distributing its outer iteration across worker threads.

use std::fmt::Display;

use itertools::Itertools;
use stratum_physical::aggregates::AggregateOperation;

use super::{
    condition::Condition,
    expression::Expression,
    node::{map_condition_box, map_expression_box, map_expressions, map_operation_box, RamMapper, TupleId},
};

/// A RAM node of the loop nest of a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Iterate all tuples of a relation (`FOR t IN R`).
    Scan {
        /// Scanned relation.
        relation: String,
        /// Binding slot for the current tuple.
        tuple_id: TupleId,
        /// Whether the iteration may be distributed across workers.
        parallel: bool,
        /// Operation executed per tuple.
        nested: Box<Operation>,
    },
    /// Iterate the tuples of a relation matching a query pattern, resolved
    /// through a relation index.
    IndexScan {
        /// Scanned relation.
        relation: String,
        /// Binding slot for the current tuple.
        tuple_id: TupleId,
        /// One expression per attribute; [Expression::Undefined] slots are
        /// unbound. Length equals the relation arity.
        pattern: Vec<Expression>,
        /// Whether the iteration may be distributed across workers.
        parallel: bool,
        /// Operation executed per tuple.
        nested: Box<Operation>,
    },
    /// Find one tuple satisfying a condition, if any (`CHOICE t IN R WHERE c`).
    Choice {
        /// Searched relation.
        relation: String,
        /// Binding slot for the found tuple.
        tuple_id: TupleId,
        /// Condition the tuple must satisfy.
        condition: Box<Condition>,
        /// Whether the search may be distributed across workers.
        parallel: bool,
        /// Operation executed for the found tuple.
        nested: Box<Operation>,
    },
    /// Find one pattern-matching tuple satisfying a condition, if any.
    IndexChoice {
        /// Searched relation.
        relation: String,
        /// Binding slot for the found tuple.
        tuple_id: TupleId,
        /// One expression per attribute, as in [Operation::IndexScan].
        pattern: Vec<Expression>,
        /// Condition the tuple must satisfy.
        condition: Box<Condition>,
        /// Whether the search may be distributed across workers.
        parallel: bool,
        /// Operation executed for the found tuple.
        nested: Box<Operation>,
    },
    /// Fold an expression over the qualifying tuples of a relation
    /// (`t.0 = min ... FOR ALL t IN R WHERE c`).
    Aggregate {
        /// Aggregated relation.
        relation: String,
        /// Binding slot; holds the 1-tuple aggregate result for the nested
        /// operation and the candidate tuple while folding.
        tuple_id: TupleId,
        /// The fold to apply.
        operation: AggregateOperation,
        /// Expression folded per qualifying tuple; ignored by `count`.
        expression: Box<Expression>,
        /// Qualification condition.
        condition: Box<Condition>,
        /// Operation executed once with the result bound.
        nested: Box<Operation>,
    },
    /// Fold restricted to the tuples matching a query pattern.
    IndexAggregate {
        /// Aggregated relation.
        relation: String,
        /// Binding slot, as in [Operation::Aggregate].
        tuple_id: TupleId,
        /// The fold to apply.
        operation: AggregateOperation,
        /// Expression folded per qualifying tuple; ignored by `count`.
        expression: Box<Expression>,
        /// Qualification condition.
        condition: Box<Condition>,
        /// One expression per attribute, as in [Operation::IndexScan].
        pattern: Vec<Expression>,
        /// Operation executed once with the result bound.
        nested: Box<Operation>,
    },
    /// Dereference a record handle and bind its components
    /// (`UNPACK e INTO t`).
    UnpackRecord {
        /// Expression yielding the record handle.
        expression: Box<Expression>,
        /// Arity the record was packed with.
        arity: usize,
        /// Binding slot for the component tuple.
        tuple_id: TupleId,
        /// Operation executed with the components bound.
        nested: Box<Operation>,
    },
    /// Continue into the nested operation only if the condition holds
    /// (`IF c`).
    Filter {
        /// Guarding condition.
        condition: Box<Condition>,
        /// Operation executed when the condition holds.
        nested: Box<Operation>,
    },
    /// Abort the innermost enclosing iteration if the condition holds
    /// (`IF c BREAK`).
    Break {
        /// Condition triggering the break.
        condition: Box<Condition>,
        /// Operation executed when the condition does not trigger.
        nested: Box<Operation>,
    },
    /// Evaluate a tuple of expressions and insert it into a relation
    /// (`PROJECT (...) INTO R`). Insertion is idempotent.
    Project {
        /// Target relation.
        relation: String,
        /// One expression per attribute of the target.
        values: Vec<Expression>,
    },
    /// Return a tuple of expression results to the subroutine caller
    /// (`RETURN (...)`). Only legal inside subroutines.
    SubroutineReturn(Vec<Expression>),
}

impl Operation {
    /// The nested operation, if this node has one.
    pub fn nested(&self) -> Option<&Operation> {
        match self {
            Operation::Scan { nested, .. }
            | Operation::IndexScan { nested, .. }
            | Operation::Choice { nested, .. }
            | Operation::IndexChoice { nested, .. }
            | Operation::Aggregate { nested, .. }
            | Operation::IndexAggregate { nested, .. }
            | Operation::UnpackRecord { nested, .. }
            | Operation::Filter { nested, .. }
            | Operation::Break { nested, .. } => Some(nested),
            Operation::Project { .. } | Operation::SubroutineReturn(_) => None,
        }
    }

    /// Mutable access to the nested operation, if this node has one.
    pub fn nested_mut(&mut self) -> Option<&mut Operation> {
        match self {
            Operation::Scan { nested, .. }
            | Operation::IndexScan { nested, .. }
            | Operation::Choice { nested, .. }
            | Operation::IndexChoice { nested, .. }
            | Operation::Aggregate { nested, .. }
            | Operation::IndexAggregate { nested, .. }
            | Operation::UnpackRecord { nested, .. }
            | Operation::Filter { nested, .. }
            | Operation::Break { nested, .. } => Some(nested),
            Operation::Project { .. } | Operation::SubroutineReturn(_) => None,
        }
    }

    /// The binding slot this node introduces, if any.
    pub fn tuple_id(&self) -> Option<TupleId> {
        match self {
            Operation::Scan { tuple_id, .. }
            | Operation::IndexScan { tuple_id, .. }
            | Operation::Choice { tuple_id, .. }
            | Operation::IndexChoice { tuple_id, .. }
            | Operation::Aggregate { tuple_id, .. }
            | Operation::IndexAggregate { tuple_id, .. }
            | Operation::UnpackRecord { tuple_id, .. } => Some(*tuple_id),
            Operation::Filter { .. }
            | Operation::Break { .. }
            | Operation::Project { .. }
            | Operation::SubroutineReturn(_) => None,
        }
    }

    /// Renumber the binding slot this node introduces.
    pub fn set_tuple_id(&mut self, id: TupleId) {
        match self {
            Operation::Scan { tuple_id, .. }
            | Operation::IndexScan { tuple_id, .. }
            | Operation::Choice { tuple_id, .. }
            | Operation::IndexChoice { tuple_id, .. }
            | Operation::Aggregate { tuple_id, .. }
            | Operation::IndexAggregate { tuple_id, .. }
            | Operation::UnpackRecord { tuple_id, .. } => *tuple_id = id,
            Operation::Filter { .. }
            | Operation::Break { .. }
            | Operation::Project { .. }
            | Operation::SubroutineReturn(_) => {}
        }
    }

    /// Whether the outer iteration of this node is marked parallel.
    pub fn is_parallel(&self) -> bool {
        match self {
            Operation::Scan { parallel, .. }
            | Operation::IndexScan { parallel, .. }
            | Operation::Choice { parallel, .. }
            | Operation::IndexChoice { parallel, .. } => *parallel,
            _ => false,
        }
    }

    /// Replace each direct child through `mapper`.
    pub fn apply(&mut self, mapper: &mut impl RamMapper) {
        match self {
            Operation::Scan { nested, .. } => map_operation_box(nested, mapper),
            Operation::IndexScan {
                pattern, nested, ..
            } => {
                map_expressions(pattern, mapper);
                map_operation_box(nested, mapper);
            }
            Operation::Choice {
                condition, nested, ..
            } => {
                map_condition_box(condition, mapper);
                map_operation_box(nested, mapper);
            }
            Operation::IndexChoice {
                pattern,
                condition,
                nested,
                ..
            } => {
                map_expressions(pattern, mapper);
                map_condition_box(condition, mapper);
                map_operation_box(nested, mapper);
            }
            Operation::Aggregate {
                expression,
                condition,
                nested,
                ..
            } => {
                map_expression_box(expression, mapper);
                map_condition_box(condition, mapper);
                map_operation_box(nested, mapper);
            }
            Operation::IndexAggregate {
                expression,
                condition,
                pattern,
                nested,
                ..
            } => {
                map_expression_box(expression, mapper);
                map_condition_box(condition, mapper);
                map_expressions(pattern, mapper);
                map_operation_box(nested, mapper);
            }
            Operation::UnpackRecord {
                expression, nested, ..
            } => {
                map_expression_box(expression, mapper);
                map_operation_box(nested, mapper);
            }
            Operation::Filter { condition, nested } | Operation::Break { condition, nested } => {
                map_condition_box(condition, mapper);
                map_operation_box(nested, mapper);
            }
            Operation::Project { values, .. } => map_expressions(values, mapper),
            Operation::SubroutineReturn(values) => map_expressions(values, mapper),
        }
    }

    fn fmt_indented(&self, f: &mut std::fmt::Formatter<'_>, indent: usize) -> std::fmt::Result {
        let pad = " ".repeat(indent);
        match self {
            Operation::Scan {
                relation,
                tuple_id,
                parallel,
                nested,
            } => {
                let prefix = if *parallel { "PARALLEL " } else { "" };
                writeln!(f, "{pad}{prefix}FOR t{tuple_id} IN {relation}")?;
                nested.fmt_indented(f, indent + 1)
            }
            Operation::IndexScan {
                relation,
                tuple_id,
                pattern,
                parallel,
                nested,
            } => {
                let prefix = if *parallel { "PARALLEL " } else { "" };
                write!(f, "{pad}{prefix}FOR t{tuple_id} IN {relation}")?;
                Self::fmt_pattern(f, *tuple_id, pattern)?;
                writeln!(f)?;
                nested.fmt_indented(f, indent + 1)
            }
            Operation::Choice {
                relation,
                tuple_id,
                condition,
                parallel,
                nested,
            } => {
                let prefix = if *parallel { "PARALLEL " } else { "" };
                writeln!(f, "{pad}{prefix}CHOICE t{tuple_id} IN {relation} WHERE {condition}")?;
                nested.fmt_indented(f, indent + 1)
            }
            Operation::IndexChoice {
                relation,
                tuple_id,
                pattern,
                condition,
                parallel,
                nested,
            } => {
                let prefix = if *parallel { "PARALLEL " } else { "" };
                write!(f, "{pad}{prefix}CHOICE {relation} AS t{tuple_id}")?;
                Self::fmt_pattern(f, *tuple_id, pattern)?;
                writeln!(f, " WHERE {condition}")?;
                nested.fmt_indented(f, indent + 1)
            }
            Operation::Aggregate {
                relation,
                tuple_id,
                operation,
                expression,
                condition,
                nested,
            } => {
                write!(f, "{pad}t{tuple_id}.0 = {operation}")?;
                if operation.consumes_expression() {
                    write!(f, " {expression}")?;
                }
                write!(f, " FOR ALL t{tuple_id} IN {relation}")?;
                if **condition != Condition::True {
                    write!(f, " WHERE {condition}")?;
                }
                writeln!(f)?;
                nested.fmt_indented(f, indent + 1)
            }
            Operation::IndexAggregate {
                relation,
                tuple_id,
                operation,
                expression,
                condition,
                pattern,
                nested,
            } => {
                write!(f, "{pad}t{tuple_id}.0 = {operation}")?;
                if operation.consumes_expression() {
                    write!(f, " {expression}")?;
                }
                write!(f, " SEARCH t{tuple_id} IN {relation}")?;
                Self::fmt_pattern(f, *tuple_id, pattern)?;
                if **condition != Condition::True {
                    write!(f, " WHERE {condition}")?;
                }
                writeln!(f)?;
                nested.fmt_indented(f, indent + 1)
            }
            Operation::UnpackRecord {
                expression,
                arity,
                tuple_id,
                nested,
            } => {
                writeln!(f, "{pad}UNPACK {expression} ARITY {arity} INTO t{tuple_id}")?;
                nested.fmt_indented(f, indent + 1)
            }
            Operation::Filter { condition, nested } => {
                writeln!(f, "{pad}IF {condition}")?;
                nested.fmt_indented(f, indent + 1)
            }
            Operation::Break { condition, nested } => {
                writeln!(f, "{pad}IF {condition} BREAK")?;
                nested.fmt_indented(f, indent + 1)
            }
            Operation::Project { relation, values } => {
                writeln!(
                    f,
                    "{pad}PROJECT ({}) INTO {relation}",
                    values.iter().format(", ")
                )
            }
            Operation::SubroutineReturn(values) => {
                writeln!(f, "{pad}RETURN ({})", values.iter().format(", "))
            }
        }
    }

    fn fmt_pattern(
        f: &mut std::fmt::Formatter<'_>,
        tuple_id: TupleId,
        pattern: &[Expression],
    ) -> std::fmt::Result {
        let mut first = true;
        for (position, slot) in pattern.iter().enumerate() {
            if slot.is_undefined() {
                continue;
            }
            if first {
                write!(f, " ON INDEX ")?;
                first = false;
            } else {
                write!(f, " AND ")?;
            }
            write!(f, "t{tuple_id}.{position} = {slot}")?;
        }
        Ok(())
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.fmt_indented(f, 0)
    }
}
