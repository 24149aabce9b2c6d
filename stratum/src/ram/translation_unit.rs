//! This module defines [RamTranslationUnit], the unit of work handed from
//! the front end to the optimizer and the interpreter.

use stratum_physical::dictionary::SymbolTable;

use crate::{
    analysis::indexes::IndexAnalysis, error::report::ErrorReport, provenance::rules::RuleCatalog,
};

use super::program::Program;

/// Owns a RAM [Program] together with the symbol table its constants are
/// interned in, its accumulated diagnostics, optional provenance rule
/// metadata, and lazily computed analyses.
///
/// Analyses are cached on first use and invalidated whenever the program is
/// borrowed mutably, which is how transformation passes access it.
#[derive(Debug)]
pub struct RamTranslationUnit {
    program: Program,
    symbols: SymbolTable,
    report: ErrorReport,
    rules: Option<RuleCatalog>,
    index_analysis: Option<IndexAnalysis>,
}

impl RamTranslationUnit {
    /// Wrap a freshly translated program with an empty symbol table.
    pub fn new(program: Program) -> Self {
        Self {
            program,
            symbols: SymbolTable::new(),
            report: ErrorReport::new(),
            rules: None,
            index_analysis: None,
        }
    }

    /// The symbol table shared between translation and evaluation; the
    /// front end interns symbol constants here while lowering.
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Attach the rule metadata needed to answer provenance queries.
    pub fn with_rules(mut self, rules: RuleCatalog) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Read access to the program.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Mutable access to the program; drops cached analyses.
    pub fn program_mut(&mut self) -> &mut Program {
        self.index_analysis = None;
        &mut self.program
    }

    /// Read access to the diagnostics report.
    pub fn report(&self) -> &ErrorReport {
        &self.report
    }

    /// Mutable access to the diagnostics report.
    pub fn report_mut(&mut self) -> &mut ErrorReport {
        &mut self.report
    }

    /// The provenance rule metadata, if the front end supplied any.
    pub fn rules(&self) -> Option<&RuleCatalog> {
        self.rules.as_ref()
    }

    /// The index analysis of the current program, computed on first use.
    pub fn index_analysis(&mut self) -> &IndexAnalysis {
        if self.index_analysis.is_none() {
            self.index_analysis = Some(IndexAnalysis::compute(&self.program));
        }
        self.index_analysis
            .as_ref()
            .expect("analysis was just computed")
    }

    /// Run structural validation of the program, reporting problems.
    pub fn validate(&mut self) {
        let mut report = std::mem::take(&mut self.report);
        self.program.validate(&mut report);
        self.report = report;
    }
}
