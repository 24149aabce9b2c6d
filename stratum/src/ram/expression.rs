//! This module defines [Expression], the value-producing RAM nodes.

use std::fmt::Display;

use itertools::Itertools;
use stratum_physical::datatypes::domain::{
    domain_from_float, domain_from_unsigned, DomainFloat, DomainSigned, DomainUnsigned, DomainValue,
};

use super::node::{map_expressions, RamMapper, TupleId};

/// Built-in operators usable in [Expression::Intrinsic].
///
/// Arithmetic comes in signed, unsigned, and floating-point flavours where
/// the semantics differ; additive and multiplicative operations on the
/// two's-complement representation coincide for signed and unsigned values
/// and exist only once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntrinsicOperation {
    /// Signed negation.
    Negate,
    /// Bitwise complement.
    BitNot,
    /// Logical complement (0 becomes 1, everything else 0).
    LogNot,
    /// Length of an interned string.
    StringLength,
    /// Addition (wrapping).
    Add,
    /// Subtraction (wrapping).
    Subtract,
    /// Multiplication (wrapping).
    Multiply,
    /// Signed division.
    Divide,
    /// Signed remainder.
    Modulo,
    /// Signed exponentiation (wrapping, zero for negative exponents).
    Power,
    /// Signed maximum.
    Max,
    /// Signed minimum.
    Min,
    /// Bitwise and.
    BitAnd,
    /// Bitwise or.
    BitOr,
    /// Bitwise exclusive or.
    BitXor,
    /// Logical and.
    LogAnd,
    /// Logical or.
    LogOr,
    /// String concatenation of two interned strings.
    Concatenate,
    /// Unsigned division.
    UnsignedDivide,
    /// Unsigned remainder.
    UnsignedModulo,
    /// Floating-point addition.
    FloatAdd,
    /// Floating-point subtraction.
    FloatSubtract,
    /// Floating-point multiplication.
    FloatMultiply,
    /// Floating-point division.
    FloatDivide,
}

impl IntrinsicOperation {
    /// Number of arguments the operator takes.
    pub fn arity(&self) -> usize {
        match self {
            IntrinsicOperation::Negate
            | IntrinsicOperation::BitNot
            | IntrinsicOperation::LogNot
            | IntrinsicOperation::StringLength => 1,
            _ => 2,
        }
    }

    /// Whether the operator is rendered between its arguments.
    fn is_infix(&self) -> bool {
        matches!(
            self,
            IntrinsicOperation::Add
                | IntrinsicOperation::Subtract
                | IntrinsicOperation::Multiply
                | IntrinsicOperation::Divide
                | IntrinsicOperation::Modulo
                | IntrinsicOperation::Power
                | IntrinsicOperation::UnsignedDivide
                | IntrinsicOperation::UnsignedModulo
                | IntrinsicOperation::FloatAdd
                | IntrinsicOperation::FloatSubtract
                | IntrinsicOperation::FloatMultiply
                | IntrinsicOperation::FloatDivide
        )
    }
}

impl Display for IntrinsicOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IntrinsicOperation::Negate => "neg",
            IntrinsicOperation::BitNot => "bnot",
            IntrinsicOperation::LogNot => "lnot",
            IntrinsicOperation::StringLength => "strlen",
            IntrinsicOperation::Add => "+",
            IntrinsicOperation::Subtract => "-",
            IntrinsicOperation::Multiply => "*",
            IntrinsicOperation::Divide => "/",
            IntrinsicOperation::Modulo => "%",
            IntrinsicOperation::Power => "^",
            IntrinsicOperation::Max => "max",
            IntrinsicOperation::Min => "min",
            IntrinsicOperation::BitAnd => "band",
            IntrinsicOperation::BitOr => "bor",
            IntrinsicOperation::BitXor => "bxor",
            IntrinsicOperation::LogAnd => "land",
            IntrinsicOperation::LogOr => "lor",
            IntrinsicOperation::Concatenate => "cat",
            IntrinsicOperation::UnsignedDivide => "u/",
            IntrinsicOperation::UnsignedModulo => "u%",
            IntrinsicOperation::FloatAdd => "f+",
            IntrinsicOperation::FloatSubtract => "f-",
            IntrinsicOperation::FloatMultiply => "f*",
            IntrinsicOperation::FloatDivide => "f/",
        };
        f.write_str(name)
    }
}

/// A value-producing RAM node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    /// A literal domain value.
    Constant(DomainValue),
    /// Element access into the tuple bound at a loop-nest position.
    TupleElement {
        /// Binding slot of the accessed tuple.
        tuple_id: TupleId,
        /// Attribute position within the tuple.
        element: usize,
    },
    /// Application of a built-in operator.
    Intrinsic {
        /// The operator.
        operation: IntrinsicOperation,
        /// Argument expressions; length matches the operator arity.
        arguments: Vec<Expression>,
    },
    /// Call of a functor registered by the embedder.
    UserDefined {
        /// Registered name of the functor.
        name: String,
        /// Argument expressions.
        arguments: Vec<Expression>,
    },
    /// Interning of a record built from the argument values.
    PackRecord(Vec<Expression>),
    /// Access to an argument of the enclosing subroutine.
    SubroutineArgument(usize),
    /// A counter that yields a fresh value on every evaluation.
    AutoIncrement,
    /// Explicit wildcard marker; legal only in index-pattern slots.
    Undefined,
}

impl Expression {
    /// A constant from a signed value.
    pub fn signed(value: DomainSigned) -> Self {
        Expression::Constant(value)
    }

    /// A constant from an unsigned value, stored via bit reinterpretation.
    pub fn unsigned(value: DomainUnsigned) -> Self {
        Expression::Constant(domain_from_unsigned(value))
    }

    /// A constant from a floating-point value, stored via bit
    /// reinterpretation.
    pub fn float(value: DomainFloat) -> Self {
        Expression::Constant(domain_from_float(value))
    }

    /// Whether this is the [Expression::Undefined] marker.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Expression::Undefined)
    }

    /// Replace each direct child through `mapper`.
    pub fn apply(&mut self, mapper: &mut impl RamMapper) {
        match self {
            Expression::Intrinsic { arguments, .. }
            | Expression::UserDefined { arguments, .. }
            | Expression::PackRecord(arguments) => map_expressions(arguments, mapper),
            Expression::Constant(_)
            | Expression::TupleElement { .. }
            | Expression::SubroutineArgument(_)
            | Expression::AutoIncrement
            | Expression::Undefined => {}
        }
    }

    /// Borrow the direct children.
    pub fn children(&self) -> impl Iterator<Item = &Expression> {
        match self {
            Expression::Intrinsic { arguments, .. }
            | Expression::UserDefined { arguments, .. }
            | Expression::PackRecord(arguments) => arguments.iter(),
            _ => [].iter(),
        }
    }
}

impl Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Constant(value) => write!(f, "number({value})"),
            Expression::TupleElement { tuple_id, element } => write!(f, "t{tuple_id}.{element}"),
            Expression::Intrinsic {
                operation,
                arguments,
            } => {
                if operation.is_infix() {
                    write!(f, "({} {operation} {})", arguments[0], arguments[1])
                } else {
                    write!(f, "{operation}({})", arguments.iter().format(", "))
                }
            }
            Expression::UserDefined { name, arguments } => {
                write!(f, "@{name}({})", arguments.iter().format(", "))
            }
            Expression::PackRecord(arguments) => {
                write!(f, "[{}]", arguments.iter().format(", "))
            }
            Expression::SubroutineArgument(index) => write!(f, "argument({index})"),
            Expression::AutoIncrement => f.write_str("autoinc()"),
            Expression::Undefined => f.write_str("undef"),
        }
    }
}
