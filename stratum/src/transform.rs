//! The transformation pipeline: composable, semantics-preserving rewrites
//! of RAM translation units.
//!
//! Every pass implements [Transformer] and reports whether it changed the
//! program; [LoopTransformer] repeats a pipeline until a fixpoint and
//! [ConditionalTransformer] gates a pipeline on configuration. The contract
//! order of the standard pipeline is fixed by [standard_pipeline]; passes
//! never alter program semantics, only shape and cost.

use std::fmt::Debug;

use crate::{
    config::EngineConfig,
    ram::{operation::Operation, RamTranslationUnit},
};

pub mod collapse_filters;
pub mod eliminate_duplicates;
pub mod expand_filter;
pub mod hoist_conditions;
pub mod if_exists;
pub mod make_index;
pub mod parallelize;
pub mod renumber;
pub mod reorder_conditions;

pub use collapse_filters::CollapseFilters;
pub use eliminate_duplicates::EliminateDuplicates;
pub use expand_filter::ExpandFilter;
pub use hoist_conditions::HoistConditions;
pub use if_exists::IfExistsConversion;
pub use make_index::MakeIndex;
pub use parallelize::Parallelize;
pub use renumber::RenumberTupleIds;
pub use reorder_conditions::ReorderConditions;

/// A whole-program rewrite with a stable name.
///
/// Passes do not fail: they receive well-formed trees and produce
/// well-formed trees; broken invariants are programming errors caught by
/// debug assertions, not recoverable conditions.
pub trait Transformer: Debug {
    /// Stable name used for logging and for disabling passes by
    /// configuration.
    fn name(&self) -> &'static str;

    /// Apply the rewrite, returning whether anything changed.
    fn transform(&mut self, unit: &mut RamTranslationUnit) -> bool;
}

/// Applies sub-transformers in order; reports change if any of them did.
#[derive(Debug, Default)]
pub struct TransformerSequence {
    transformers: Vec<Box<dyn Transformer>>,
}

impl TransformerSequence {
    /// Create an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transformer.
    pub fn push(&mut self, transformer: Box<dyn Transformer>) {
        self.transformers.push(transformer);
    }

    /// Whether the sequence contains no transformer.
    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }
}

impl Transformer for TransformerSequence {
    fn name(&self) -> &'static str {
        "Sequence"
    }

    fn transform(&mut self, unit: &mut RamTranslationUnit) -> bool {
        let mut changed = false;
        for transformer in &mut self.transformers {
            let step = transformer.transform(unit);
            log::debug!(
                "transformer {}: {}",
                transformer.name(),
                if step { "changed" } else { "no change" }
            );
            changed |= step;
        }
        changed
    }
}

/// Repeats a transformer until it reports no change (a fixpoint).
#[derive(Debug)]
pub struct LoopTransformer {
    body: Box<dyn Transformer>,
}

impl LoopTransformer {
    /// Loop over `body`.
    pub fn new(body: Box<dyn Transformer>) -> Self {
        Self { body }
    }
}

impl Transformer for LoopTransformer {
    fn name(&self) -> &'static str {
        "Loop"
    }

    fn transform(&mut self, unit: &mut RamTranslationUnit) -> bool {
        let mut changed = false;
        let mut iterations = 0usize;
        while self.body.transform(unit) {
            changed = true;
            iterations += 1;
        }
        log::debug!(
            "fixpoint of {} reached after {iterations} changing iteration(s)",
            self.body.name()
        );
        changed
    }
}

/// Applies a transformer only when a configuration predicate held at
/// pipeline construction time.
#[derive(Debug)]
pub struct ConditionalTransformer {
    enabled: bool,
    body: Box<dyn Transformer>,
}

impl ConditionalTransformer {
    /// Gate `body` on `enabled`.
    pub fn new(enabled: bool, body: Box<dyn Transformer>) -> Self {
        Self { enabled, body }
    }
}

impl Transformer for ConditionalTransformer {
    fn name(&self) -> &'static str {
        "Conditional"
    }

    fn transform(&mut self, unit: &mut RamTranslationUnit) -> bool {
        if !self.enabled {
            return false;
        }
        self.body.transform(unit)
    }
}

/// Build the standard optimization pipeline for `config`.
///
/// The order is a contract: filters are split and conditions hoisted to a
/// fixpoint before index inference can see them; redundancy elimination
/// runs on collapsed filters; identifiers are renumbered after all
/// structural changes; parallelization runs last and only when more than
/// one job is configured. Passes named in
/// [EngineConfig::disabled_transformers] are left out.
pub fn standard_pipeline(config: &EngineConfig) -> TransformerSequence {
    let mut pipeline = TransformerSequence::new();

    let mut normalize = TransformerSequence::new();
    add_enabled(config, &mut normalize, Box::new(ExpandFilter));
    add_enabled(config, &mut normalize, Box::new(HoistConditions));
    if !normalize.is_empty() {
        pipeline.push(Box::new(LoopTransformer::new(Box::new(normalize))));
    }

    add_enabled(config, &mut pipeline, Box::new(MakeIndex));
    add_enabled(config, &mut pipeline, Box::new(IfExistsConversion));
    add_enabled(config, &mut pipeline, Box::new(CollapseFilters));
    add_enabled(config, &mut pipeline, Box::new(EliminateDuplicates));
    add_enabled(config, &mut pipeline, Box::new(ReorderConditions));
    add_enabled(config, &mut pipeline, Box::new(RenumberTupleIds));

    if config.transformer_enabled(Parallelize.name()) {
        pipeline.push(Box::new(ConditionalTransformer::new(
            config.jobs.thread_count() != 1,
            Box::new(Parallelize),
        )));
    }

    pipeline
}

fn add_enabled(
    config: &EngineConfig,
    pipeline: &mut TransformerSequence,
    transformer: Box<dyn Transformer>,
) {
    if config.transformer_enabled(transformer.name()) {
        pipeline.push(transformer);
    } else {
        log::info!("transformer {} is disabled", transformer.name());
    }
}

/// Rewrite the root operation of every query of the unit's program and
/// report whether anything changed, decided by structural comparison.
pub(crate) fn transform_queries(
    unit: &mut RamTranslationUnit,
    rewrite: &mut impl FnMut(Operation) -> Operation,
) -> bool {
    let mut changed = false;
    unit.program_mut().for_each_query_mut(&mut |operation| {
        let original = operation.clone();
        let owned = std::mem::replace(operation, Operation::SubroutineReturn(Vec::new()));
        *operation = rewrite(owned);
        changed |= *operation != original;
    });
    changed
}
