//! The embedding surface: run a program end to end and collect its output
//! relations as stringified tuples.
//!
//! The front end stays external: embedders supply a [ProgramTranslator]
//! turning source text into a [RamTranslationUnit]. This module drives
//! validation, the optimization pipeline, and the interpreter, and turns
//! the computed model into [ExecutionResults].

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    config::{EngineConfig, ProvenanceMode},
    error::Error,
    interpreter::Interpreter,
    ram::{relation::RelationRole, RamTranslationUnit},
    transform::{standard_pipeline, Transformer},
};

/// The engine exposed by the API.
pub type Engine = Interpreter;

/// The translate-to-RAM boundary: the external front end lowers source
/// text into a translation unit. Assumed total for semantically valid
/// input; front-end diagnostics land in the unit's report.
pub trait ProgramTranslator {
    /// Lower `source` into a RAM translation unit.
    fn translate(&self, source: &str) -> Result<RamTranslationUnit, Error>;
}

/// The computed model: every output relation mapped to its rows, each row
/// the tab-joined rendering of one tuple in schema order. Ordered for
/// deterministic iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionResults {
    relations: BTreeMap<String, Vec<String>>,
}

impl ExecutionResults {
    /// Iterate relation names and their rows.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.relations
            .iter()
            .map(|(name, rows)| (name.as_str(), rows.as_slice()))
    }

    /// The rows of one relation, if it was part of the output.
    pub fn rows(&self, relation: &str) -> Option<&[String]> {
        self.relations.get(relation).map(Vec::as_slice)
    }

    /// The underlying map.
    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.relations
    }
}

/// Translate, optimize, and execute `source`, returning the output
/// relations. `provenance` selects explanation support (and with it
/// single-threaded evaluation).
pub fn execute_program(
    translator: &dyn ProgramTranslator,
    source: &str,
    provenance: bool,
) -> Result<ExecutionResults, Error> {
    let config = EngineConfig {
        provenance: if provenance {
            ProvenanceMode::Explain
        } else {
            ProvenanceMode::None
        },
        ..Default::default()
    };
    let engine = execute_unit(translator.translate(source)?, config)?;
    collect_results(&engine)
}

/// Optimize and execute an already-translated unit, handing back the
/// engine so provenance queries can follow.
///
/// Halts before each phase if the report carries errors: front-end
/// diagnostics block optimization, structural RAM problems block
/// interpretation.
pub fn execute_unit(mut unit: RamTranslationUnit, config: EngineConfig) -> Result<Engine, Error> {
    config.validate()?;

    let errors = unit.report().error_count();
    if errors > 0 {
        return Err(Error::ReportedDiagnostics { errors });
    }

    let mut pipeline = standard_pipeline(&config);
    let changed = pipeline.transform(&mut unit);
    log::debug!(
        "optimization pipeline {}",
        if changed { "changed the program" } else { "left the program unchanged" }
    );

    unit.validate();
    let errors = unit.report().error_count();
    if errors > 0 {
        return Err(Error::ReportedDiagnostics { errors });
    }

    let mut engine = Interpreter::new(unit, config)?;
    engine.execute_main()?;
    Ok(engine)
}

/// Gather the rows of every output relation of a finished engine.
pub fn collect_results(engine: &Engine) -> Result<ExecutionResults, Error> {
    let mut relations = BTreeMap::new();
    for declaration in engine.unit().program().declarations() {
        if declaration.role() == RelationRole::Output {
            relations.insert(
                declaration.name().to_owned(),
                engine.formatted_rows(declaration.name())?,
            );
        }
    }
    Ok(ExecutionResults { relations })
}
