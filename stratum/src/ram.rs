//! The relational algebra machine (RAM) intermediate representation.
//!
//! A RAM program is an owned tree of nodes in four categories:
//! [expressions](expression::Expression), [conditions](condition::Condition),
//! [operations](operation::Operation) forming the loop nests of queries, and
//! [statements](statement::Statement) providing control flow and relation
//! management. Every node category derives deep [Clone] and structural
//! equality and supports child rewriting through [node::RamMapper].

pub mod condition;
pub mod expression;
pub mod node;
pub mod operation;
pub mod program;
pub mod relation;
pub mod statement;
pub mod translation_unit;

pub use condition::Condition;
pub use expression::Expression;
pub use node::{RamMapper, TupleId};
pub use operation::Operation;
pub use program::Program;
pub use relation::{RelationDecl, RelationRole};
pub use statement::Statement;
pub use translation_unit::RamTranslationUnit;
