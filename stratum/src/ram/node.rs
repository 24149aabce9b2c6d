//! Generic tree rewriting for RAM nodes.
//!
//! Rewrite passes implement [RamMapper] for the node categories they target
//! and use the `apply` method of each node to replace its direct children in
//! place; recursion happens by the mapper calling `apply` on the children it
//! receives. This keeps tree-walking boilerplate out of the passes.

use super::{condition::Condition, expression::Expression, operation::Operation, statement::Statement};

/// Identifier of a tuple binding slot, corresponding to its position in the
/// loop nest of a query (`t0`, `t1`, ...). Unique within a query; renumbered
/// by a dedicated pass after structural changes.
pub type TupleId = usize;

/// Maps owned child nodes to owned replacement nodes, one method per node
/// category. All methods default to the identity.
pub trait RamMapper {
    /// Replace a direct expression child.
    fn map_expression(&mut self, expression: Expression) -> Expression {
        expression
    }

    /// Replace a direct condition child.
    fn map_condition(&mut self, condition: Condition) -> Condition {
        condition
    }

    /// Replace a direct operation child.
    fn map_operation(&mut self, operation: Operation) -> Operation {
        operation
    }

    /// Replace a direct statement child.
    fn map_statement(&mut self, statement: Statement) -> Statement {
        statement
    }
}

pub(crate) fn map_expression_box(slot: &mut Box<Expression>, mapper: &mut impl RamMapper) {
    let owned = std::mem::replace(slot.as_mut(), Expression::Undefined);
    **slot = mapper.map_expression(owned);
}

pub(crate) fn map_condition_box(slot: &mut Box<Condition>, mapper: &mut impl RamMapper) {
    let owned = std::mem::replace(slot.as_mut(), Condition::True);
    **slot = mapper.map_condition(owned);
}

pub(crate) fn map_operation_box(slot: &mut Box<Operation>, mapper: &mut impl RamMapper) {
    let owned = std::mem::replace(slot.as_mut(), Operation::SubroutineReturn(Vec::new()));
    **slot = mapper.map_operation(owned);
}

pub(crate) fn map_expressions(slots: &mut [Expression], mapper: &mut impl RamMapper) {
    for slot in slots {
        let owned = std::mem::replace(slot, Expression::Undefined);
        *slot = mapper.map_expression(owned);
    }
}

/// Rewrite every operation node of a loop nest bottom-up: children first,
/// then `rewrite` at the node itself.
pub fn rewrite_operations(operation: Operation, rewrite: &mut impl FnMut(Operation) -> Operation) -> Operation {
    struct BottomUp<'a, F>(&'a mut F);

    impl<F: FnMut(Operation) -> Operation> RamMapper for BottomUp<'_, F> {
        fn map_operation(&mut self, operation: Operation) -> Operation {
            rewrite_operations(operation, self.0)
        }
    }

    let mut operation = operation;
    operation.apply(&mut BottomUp(rewrite));
    rewrite(operation)
}

/// Rewrite every expression reachable from an operation (including patterns,
/// conditions, and nested operations), bottom-up.
pub fn rewrite_expressions(operation: Operation, rewrite: &mut impl FnMut(Expression) -> Expression) -> Operation {
    struct Everywhere<'a, F>(&'a mut F);

    impl<F: FnMut(Expression) -> Expression> RamMapper for Everywhere<'_, F> {
        fn map_expression(&mut self, expression: Expression) -> Expression {
            let mut expression = expression;
            expression.apply(self);
            (self.0)(expression)
        }

        fn map_condition(&mut self, mut condition: Condition) -> Condition {
            condition.apply(self);
            condition
        }

        fn map_operation(&mut self, mut operation: Operation) -> Operation {
            operation.apply(self);
            operation
        }
    }

    let mut operation = operation;
    operation.apply(&mut Everywhere(rewrite));
    operation
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bottom_up_rewrite_reaches_nested_operations() {
        let operation = Operation::Scan {
            relation: "edge".to_owned(),
            tuple_id: 0,
            parallel: false,
            nested: Box::new(Operation::Project {
                relation: "reach".to_owned(),
                values: vec![Expression::TupleElement {
                    tuple_id: 0,
                    element: 0,
                }],
            }),
        };

        let mut seen = 0;
        rewrite_operations(operation, &mut |operation| {
            seen += 1;
            operation
        });
        assert_eq!(seen, 2);
    }
}
