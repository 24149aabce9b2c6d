//! Aggregated diagnostics for a translation unit.
//!
//! Diagnostics accumulate here instead of being thrown across phase
//! boundaries; after each phase the caller inspects [ErrorReport::error_count]
//! and decides whether to halt.

use std::fmt::Display;

/// How severe a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Does not prevent later phases from running.
    Warning,
    /// Aborts the pipeline after the current phase.
    Error,
}

/// A single reported problem.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    severity: Severity,
    message: String,
}

impl Diagnostic {
    /// Severity of this diagnostic.
    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.severity {
            Severity::Warning => write!(f, "Warning: {}", self.message),
            Severity::Error => write!(f, "Error: {}", self.message),
        }
    }
}

/// Collection of diagnostics scoped to one translation unit.
#[derive(Debug, Default, Clone)]
pub struct ErrorReport {
    diagnostics: Vec<Diagnostic>,
}

impl ErrorReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error-severity diagnostic.
    pub fn add_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::debug!("reported error: {message}");
        self.diagnostics.push(Diagnostic {
            severity: Severity::Error,
            message,
        });
    }

    /// Record a warning-severity diagnostic.
    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            message: message.into(),
        });
    }

    /// Number of error-severity diagnostics.
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|diagnostic| diagnostic.severity() == Severity::Error)
            .count()
    }

    /// Whether any error-severity diagnostic has been recorded.
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Iterate all diagnostics in the order they were reported.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }
}

impl Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for diagnostic in &self.diagnostics {
            writeln!(f, "{diagnostic}")?;
        }
        let errors = self.error_count();
        if errors > 0 {
            writeln!(f, "{errors} error(s) generated")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counts_errors_not_warnings() {
        let mut report = ErrorReport::new();
        report.add_warning("relation is never read");
        assert!(!report.has_errors());

        report.add_error("relation \"edge\" is not declared");
        report.add_error("pattern arity mismatch");
        assert_eq!(report.error_count(), 2);
        assert_eq!(report.diagnostics().count(), 3);
        assert!(report.to_string().contains("2 error(s) generated"));
    }
}
