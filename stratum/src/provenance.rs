//! Provenance: reconstructing the derivation tree that justifies a
//! computed tuple.
//!
//! Explanation works from rule metadata supplied by the front end and from
//! the relation store left behind by execution: a rule instance and
//! body-literal bindings justifying the tuple are found by re-querying the
//! store, recursing into each body literal down to base facts, bounded by a
//! depth limit. Negated literals are justified by the absence of the bound
//! tuple. Trees render as ascii or JSON; [explore] offers an interactive
//! loop.

pub mod constraints;
pub mod explain;
pub mod explore;
pub mod rules;
pub mod tree;

pub use explain::Explainer;
pub use explore::explore;
pub use rules::{Atom, ConstantValue, Literal, RuleCatalog, RuleSpec, Term};
pub use tree::TreeNode;
