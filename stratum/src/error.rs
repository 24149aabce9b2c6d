//! Error-handling module for the crate.

use thiserror::Error;

pub mod report;

/// Error-collection for all the possible errors occurring in this crate.
#[allow(variant_size_differences)]
#[derive(Error, Debug)]
pub enum Error {
    /// Error in the physical layer.
    #[error(transparent)]
    Physical(#[from] stratum_physical::error::Error),
    /// A statement or operation references a relation the program never
    /// declared.
    #[error("relation \"{0}\" is not declared")]
    UnknownRelation(String),
    /// A provenance query named a subroutine the program does not define.
    #[error("subroutine \"{0}\" is not defined")]
    UnknownSubroutine(String),
    /// A user-defined functor was called without being registered.
    #[error("user-defined functor \"{0}\" is not registered")]
    UnresolvedFunctor(String),
    /// Integer division or modulo by zero during evaluation.
    #[error("division by zero")]
    DivisionByZero,
    /// An undefined-marker expression was evaluated outside a pattern slot.
    #[error("undefined value evaluated")]
    UndefinedValue,
    /// A subroutine argument index exceeded the supplied argument tuple.
    #[error("subroutine argument {0} out of range")]
    SubroutineArgumentOutOfRange(usize),
    /// A `match` constraint carried an invalid regular expression.
    #[error("invalid regular expression \"{pattern}\": {source}")]
    InvalidRegex {
        /// The offending pattern text.
        pattern: String,
        /// Underlying regex error.
        source: regex::Error,
    },
    /// Provenance tracking requires single-threaded evaluation.
    #[error("provenance tracking is incompatible with parallel evaluation (jobs = {jobs})")]
    ProvenanceWithParallelism {
        /// The configured worker count.
        jobs: usize,
    },
    /// A phase left errors in the report; later phases refuse to run.
    #[error("{errors} error(s) reported; evaluation was not attempted")]
    ReportedDiagnostics {
        /// Number of error-severity diagnostics in the report.
        errors: usize,
    },
    /// A provenance query asked about a tuple that was never derived.
    #[error("tuple {tuple} was not derived in relation \"{relation}\"")]
    TupleNotDerived {
        /// Relation that was queried.
        relation: String,
        /// Rendering of the queried tuple.
        tuple: String,
    },
    /// A provenance query was issued although provenance mode is off.
    #[error("provenance queries require a provenance mode other than \"none\"")]
    ProvenanceDisabled,
    /// IO error, e.g. while driving the interactive exploration loop.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// The worker pool for parallel evaluation could not be built.
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
