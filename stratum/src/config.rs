//! Engine configuration.
//!
//! The embedding layer owns argument parsing; this module only defines the
//! validated configuration value that is threaded into the transformation
//! pipeline and the interpreter at construction time. Nothing in the engine
//! reads configuration from global state.

use std::num::NonZeroUsize;

use hashbrown::HashSet;
use strum_macros::{Display, EnumIter, EnumString};

use crate::error::Error;

/// Degree of data parallelism for the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jobs {
    /// Use every available core.
    Auto,
    /// Use exactly this many worker threads.
    Fixed(NonZeroUsize),
}

impl Jobs {
    /// Resolve to a concrete worker count.
    pub fn thread_count(&self) -> usize {
        match self {
            Jobs::Auto => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            Jobs::Fixed(count) => count.get(),
        }
    }
}

impl Default for Jobs {
    fn default() -> Self {
        Jobs::Fixed(NonZeroUsize::MIN)
    }
}

/// Which provenance capability the engine is asked to provide.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum ProvenanceMode {
    /// No provenance tracking.
    #[default]
    None,
    /// Single-shot explanation queries.
    Explain,
    /// Interactive exploration loop.
    Explore,
    /// Explanation queries with per-node subtree heights in the output.
    SubtreeHeights,
}

impl ProvenanceMode {
    /// Whether any provenance capability is requested.
    pub fn is_enabled(&self) -> bool {
        !matches!(self, ProvenanceMode::None)
    }
}

/// Configuration consumed by the pipeline and the interpreter.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Worker count for parallel-marked operations.
    pub jobs: Jobs,
    /// Requested provenance capability.
    pub provenance: ProvenanceMode,
    /// Names of transformation passes that must not run.
    pub disabled_transformers: HashSet<String>,
    /// Relation selector for the demand-driven rewriting of the front end;
    /// carried here read-only so one configuration value describes a run.
    pub magic_relations: Vec<String>,
}

impl EngineConfig {
    /// Check cross-field preconditions.
    ///
    /// Provenance reconstruction assumes deterministic single-threaded
    /// evaluation, so any provenance mode combined with more than one job
    /// is rejected before execution starts.
    pub fn validate(&self) -> Result<(), Error> {
        let jobs = self.jobs.thread_count();
        if self.provenance.is_enabled() && jobs != 1 {
            return Err(Error::ProvenanceWithParallelism { jobs });
        }
        Ok(())
    }

    /// Whether the pass with the given stable name may run.
    pub fn transformer_enabled(&self, name: &str) -> bool {
        !self.disabled_transformers.contains(name)
    }
}
