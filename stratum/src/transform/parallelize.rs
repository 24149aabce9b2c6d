//! Pass marking the outermost iteration of each query as parallel.
//!
//! Only the outermost scan or choice of a query is marked: its iterations
//! are independent up to relation insertion, which the store performs
//! safely under concurrency. Inner operations stay sequential within each
//! worker. The pipeline gates this pass on a configured job count other
//! than one.

use crate::ram::{operation::Operation, RamTranslationUnit};

use super::{transform_queries, Transformer};

/// Marks the outermost scan/choice of every query as parallel.
#[derive(Debug, Clone, Copy, Default)]
pub struct Parallelize;

impl Transformer for Parallelize {
    fn name(&self) -> &'static str {
        "Parallelize"
    }

    fn transform(&mut self, unit: &mut RamTranslationUnit) -> bool {
        transform_queries(unit, &mut |mut root| {
            mark_outermost(&mut root);
            root
        })
    }
}

fn mark_outermost(operation: &mut Operation) {
    match operation {
        Operation::Scan { parallel, .. }
        | Operation::IndexScan { parallel, .. }
        | Operation::Choice { parallel, .. }
        | Operation::IndexChoice { parallel, .. } => *parallel = true,
        // Filters hoisted above the outermost loop guard the whole query;
        // look through them for the iteration to mark.
        Operation::Filter { nested, .. } => mark_outermost(nested),
        // Aggregates, record unpacking, and leaf operations at the root of
        // a query have no outer iteration worth distributing.
        _ => {}
    }
}
