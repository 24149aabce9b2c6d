//! This module defines [Interpreter], the tree-walking evaluator.
//!
//! Execution is depth-first and single-pass per statement, with no
//! backtracking. Scans snapshot their candidate tuples at entry; parallel-
//! marked scans distribute the snapshot across a worker pool, with
//! thread-local binding frames and write-locked idempotent insertion as the
//! only shared mutation. A failing expression aborts the whole run and is
//! recorded in the translation unit's report.

use std::sync::{
    atomic::{AtomicBool, AtomicI64, Ordering},
    Mutex,
};
use std::time::Instant;

use hashbrown::HashMap;
use rayon::prelude::*;
use regex::Regex;

use stratum_physical::{
    aggregates::AggregateOperation,
    datatypes::{
        domain::{
            domain_from_float, domain_from_unsigned, float_from_domain, unsigned_from_domain,
            DomainValue, Tuple,
        },
        AttributeType,
    },
    dictionary::{RecordTable, SymbolTable},
};

use crate::{
    config::EngineConfig,
    error::Error,
    ram::{
        condition::{Condition, ConstraintOperation},
        expression::{Expression, IntrinsicOperation},
        node::TupleId,
        operation::Operation,
        relation::RelationDecl,
        statement::Statement,
        RamTranslationUnit,
    },
};

use super::store::RelationStore;

/// A functor registered by the embedder, callable through
/// [Expression::UserDefined].
pub type Functor = Box<dyn Fn(&[DomainValue]) -> Result<DomainValue, Error> + Send + Sync>;

/// Result of executing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpFlow {
    /// Continue with the enclosing iteration.
    Proceed,
    /// Abort the innermost enclosing iteration.
    Break,
}

/// Result of executing a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StmtFlow {
    Proceed,
    /// An `EXIT` condition held; terminate the innermost enclosing loop.
    Exit,
}

/// Tuple bindings of one loop nest, indexed by tuple id, plus the argument
/// tuple when executing a subroutine.
#[derive(Debug, Clone, Default)]
struct Frame {
    bindings: Vec<Tuple>,
    arguments: Vec<DomainValue>,
}

impl Frame {
    fn new(slots: usize, arguments: Vec<DomainValue>) -> Self {
        Self {
            bindings: vec![Tuple::new(); slots],
            arguments,
        }
    }

    fn bind(&mut self, tuple_id: TupleId, tuple: Tuple) {
        self.bindings[tuple_id] = tuple;
    }
}

/// The evaluator: owns the translation unit, the relation store, and the
/// dictionaries, and executes the program's main statement and subroutines.
pub struct Interpreter {
    unit: RamTranslationUnit,
    config: EngineConfig,
    store: RelationStore,
    records: RecordTable,
    functors: HashMap<String, Functor>,
    counter: AtomicI64,
    regex_cache: Mutex<HashMap<String, Regex>>,
    pool: Option<rayon::ThreadPool>,
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("relations", &self.store.names().count())
            .field("jobs", &self.config.jobs.thread_count())
            .field("provenance", &self.config.provenance)
            .finish_non_exhaustive()
    }
}

impl Interpreter {
    /// Set up an interpreter for `unit` under `config`.
    ///
    /// Validates the configuration, creates the declared relations, builds
    /// the indexes the program's search signatures call for, and spins up
    /// the worker pool when more than one job is configured.
    pub fn new(mut unit: RamTranslationUnit, config: EngineConfig) -> Result<Self, Error> {
        config.validate()?;

        let store = RelationStore::from_declarations(unit.program().declarations());

        let signatures: Vec<(String, _)> = {
            let analysis = unit.index_analysis();
            analysis
                .relations()
                .map(str::to_owned)
                .collect::<Vec<_>>()
                .into_iter()
                .flat_map(|relation| {
                    analysis
                        .signatures(&relation)
                        .map(move |signature| (relation.clone(), signature))
                        .collect::<Vec<_>>()
                })
                .collect()
        };
        for (relation, signature) in signatures {
            store.ensure_index(&relation, signature)?;
        }

        let jobs = config.jobs.thread_count();
        let pool = if jobs > 1 {
            log::debug!("starting worker pool with {jobs} threads");
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(jobs)
                    .build()?,
            )
        } else {
            None
        };

        Ok(Self {
            unit,
            config,
            store,
            records: RecordTable::new(),
            functors: HashMap::new(),
            counter: AtomicI64::new(0),
            regex_cache: Mutex::new(HashMap::new()),
            pool,
        })
    }

    /// The translation unit under execution.
    pub fn unit(&self) -> &RamTranslationUnit {
        &self.unit
    }

    /// The configuration this interpreter runs under.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The relation store.
    pub fn store(&self) -> &RelationStore {
        &self.store
    }

    /// The symbol table of the translation unit; embedders intern fact
    /// symbols through this.
    pub fn symbols(&self) -> &SymbolTable {
        self.unit.symbols()
    }

    /// The record table.
    pub fn records(&self) -> &RecordTable {
        &self.records
    }

    /// Register a functor callable through [Expression::UserDefined].
    pub fn register_functor(&mut self, name: impl Into<String>, functor: Functor) {
        self.functors.insert(name.into(), functor);
    }

    /// Insert an input fact directly into a relation.
    pub fn add_fact(&self, relation: &str, tuple: Tuple) -> Result<(), Error> {
        self.store.insert(relation, tuple)?;
        Ok(())
    }

    /// Execute the program's main statement to completion. Afterwards the
    /// relation contents represent the computed model.
    ///
    /// Refuses to run when the report already carries errors; a runtime
    /// evaluation error aborts the run, is recorded in the report, and is
    /// returned.
    pub fn execute_main(&mut self) -> Result<(), Error> {
        let errors = self.unit.report().error_count();
        if errors > 0 {
            return Err(Error::ReportedDiagnostics { errors });
        }

        let start = Instant::now();
        let main = self.unit.program().main().clone();
        let returns = Mutex::new(Vec::new());
        let result = self.execute_statement(&main, &returns, &[]);
        log::info!(
            "main program executed in {} ms",
            start.elapsed().as_millis()
        );

        match result {
            Ok(_) => Ok(()),
            Err(error) => {
                self.unit.report_mut().add_error(error.to_string());
                Err(error)
            }
        }
    }

    /// Execute a named subroutine, returning the tuples it produced through
    /// its return operations.
    pub fn execute_subroutine(
        &self,
        name: &str,
        arguments: &[DomainValue],
    ) -> Result<Vec<Tuple>, Error> {
        let body = self
            .unit
            .program()
            .subroutine(name)
            .ok_or_else(|| Error::UnknownSubroutine(name.to_owned()))?
            .clone();
        let returns = Mutex::new(Vec::new());
        self.execute_statement(&body, &returns, arguments)?;
        Ok(returns.into_inner().expect("return buffer lock poisoned"))
    }

    /// All tuples currently in a relation, in lexicographic order.
    pub fn relation_contents(&self, name: &str) -> Result<Vec<Tuple>, Error> {
        self.store.snapshot(name)
    }

    /// Stringified rows of a relation: fields rendered per attribute type
    /// in schema order, joined by tabs.
    pub fn formatted_rows(&self, name: &str) -> Result<Vec<String>, Error> {
        let declaration = self
            .unit
            .program()
            .declaration(name)
            .ok_or_else(|| Error::UnknownRelation(name.to_owned()))?;
        self.store
            .snapshot(name)?
            .into_iter()
            .map(|tuple| self.format_tuple(declaration, &tuple))
            .collect()
    }

    fn format_tuple(&self, declaration: &RelationDecl, tuple: &[DomainValue]) -> Result<String, Error> {
        let mut fields = Vec::with_capacity(tuple.len());
        for (attribute_type, &value) in declaration.attribute_types().iter().zip(tuple) {
            let field = match attribute_type {
                AttributeType::Symbol => self.symbols().resolve(value)?,
                AttributeType::Record => value.to_string(),
                numeric => numeric.format_numeric(value),
            };
            fields.push(field);
        }
        Ok(fields.join("\t"))
    }

    fn execute_statement(
        &self,
        statement: &Statement,
        returns: &Mutex<Vec<Tuple>>,
        arguments: &[DomainValue],
    ) -> Result<StmtFlow, Error> {
        match statement {
            Statement::Sequence(statements) | Statement::Parallel(statements) => {
                for statement in statements {
                    if self.execute_statement(statement, returns, arguments)? == StmtFlow::Exit {
                        return Ok(StmtFlow::Exit);
                    }
                }
                Ok(StmtFlow::Proceed)
            }
            Statement::Loop(body) => {
                let mut iterations = 0usize;
                loop {
                    iterations += 1;
                    if self.execute_statement(body, returns, arguments)? == StmtFlow::Exit {
                        break;
                    }
                }
                log::debug!("loop reached its exit after {iterations} iteration(s)");
                Ok(StmtFlow::Proceed)
            }
            Statement::Exit(condition) => {
                let frame = Frame::new(0, arguments.to_vec());
                if self.eval_condition(condition, &frame)? {
                    Ok(StmtFlow::Exit)
                } else {
                    Ok(StmtFlow::Proceed)
                }
            }
            Statement::Query(operation) => {
                let slots = frame_slots(operation);
                let mut frame = Frame::new(slots, arguments.to_vec());
                self.execute_operation(operation, &mut frame, returns)?;
                Ok(StmtFlow::Proceed)
            }
            Statement::Clear(relation) => {
                self.store.clear(relation)?;
                Ok(StmtFlow::Proceed)
            }
            Statement::Merge { source, target } => {
                self.store.merge(source, target)?;
                Ok(StmtFlow::Proceed)
            }
            Statement::Swap { first, second } => {
                self.store.swap(first, second)?;
                Ok(StmtFlow::Proceed)
            }
        }
    }

    fn execute_operation(
        &self,
        operation: &Operation,
        frame: &mut Frame,
        returns: &Mutex<Vec<Tuple>>,
    ) -> Result<OpFlow, Error> {
        match operation {
            Operation::Scan {
                relation,
                tuple_id,
                parallel,
                nested,
            } => {
                let tuples = self.store.snapshot(relation)?;
                self.iterate(tuples, *tuple_id, nested, *parallel, frame, returns)
            }
            Operation::IndexScan {
                relation,
                tuple_id,
                pattern,
                parallel,
                nested,
            } => {
                let pattern = self.eval_pattern(pattern, frame)?;
                let tuples = self.store.matching(relation, &pattern)?;
                self.iterate(tuples, *tuple_id, nested, *parallel, frame, returns)
            }
            Operation::Choice {
                relation,
                tuple_id,
                condition,
                nested,
                ..
            } => {
                let tuples = self.store.snapshot(relation)?;
                self.choose(tuples, *tuple_id, condition, nested, frame, returns)
            }
            Operation::IndexChoice {
                relation,
                tuple_id,
                pattern,
                condition,
                nested,
                ..
            } => {
                let pattern = self.eval_pattern(pattern, frame)?;
                let tuples = self.store.matching(relation, &pattern)?;
                self.choose(tuples, *tuple_id, condition, nested, frame, returns)
            }
            Operation::Aggregate {
                relation,
                tuple_id,
                operation: fold_operation,
                expression,
                condition,
                nested,
            } => {
                let tuples = self.store.snapshot(relation)?;
                self.aggregate(
                    tuples,
                    *tuple_id,
                    *fold_operation,
                    expression,
                    condition,
                    nested,
                    frame,
                    returns,
                )
            }
            Operation::IndexAggregate {
                relation,
                tuple_id,
                operation: fold_operation,
                expression,
                condition,
                pattern,
                nested,
            } => {
                let pattern = self.eval_pattern(pattern, frame)?;
                let tuples = self.store.matching(relation, &pattern)?;
                self.aggregate(
                    tuples,
                    *tuple_id,
                    *fold_operation,
                    expression,
                    condition,
                    nested,
                    frame,
                    returns,
                )
            }
            Operation::UnpackRecord {
                expression,
                arity,
                tuple_id,
                nested,
            } => {
                let handle = self.eval_expression(expression, frame)?;
                let record = self.records.unpack(handle, *arity).map_err(Error::from)?;
                frame.bind(*tuple_id, record);
                self.execute_operation(nested, frame, returns)
            }
            Operation::Filter { condition, nested } => {
                if self.eval_condition(condition, frame)? {
                    self.execute_operation(nested, frame, returns)
                } else {
                    Ok(OpFlow::Proceed)
                }
            }
            Operation::Break { condition, nested } => {
                if self.eval_condition(condition, frame)? {
                    Ok(OpFlow::Break)
                } else {
                    self.execute_operation(nested, frame, returns)
                }
            }
            Operation::Project { relation, values } => {
                let tuple = values
                    .iter()
                    .map(|value| self.eval_expression(value, frame))
                    .collect::<Result<Tuple, _>>()?;
                self.store.insert(relation, tuple)?;
                Ok(OpFlow::Proceed)
            }
            Operation::SubroutineReturn(values) => {
                let tuple = values
                    .iter()
                    .map(|value| self.eval_expression(value, frame))
                    .collect::<Result<Tuple, _>>()?;
                returns.lock().expect("return buffer lock poisoned").push(tuple);
                Ok(OpFlow::Proceed)
            }
        }
    }

    /// Iterate a snapshot, binding each tuple for the nested operation. A
    /// break from below stops the iteration and is consumed here.
    #[allow(clippy::too_many_arguments)]
    fn iterate(
        &self,
        tuples: Vec<Tuple>,
        tuple_id: TupleId,
        nested: &Operation,
        parallel: bool,
        frame: &mut Frame,
        returns: &Mutex<Vec<Tuple>>,
    ) -> Result<OpFlow, Error> {
        if parallel {
            if let Some(pool) = &self.pool {
                let broke = AtomicBool::new(false);
                let outer: &Frame = frame;
                pool.install(|| {
                    tuples.into_par_iter().try_for_each(|tuple| {
                        if broke.load(Ordering::Relaxed) {
                            return Ok::<(), Error>(());
                        }
                        let mut local = outer.clone();
                        local.bind(tuple_id, tuple);
                        match self.execute_operation(nested, &mut local, returns)? {
                            OpFlow::Break => {
                                broke.store(true, Ordering::Relaxed);
                                Ok(())
                            }
                            OpFlow::Proceed => Ok(()),
                        }
                    })
                })?;
                return Ok(OpFlow::Proceed);
            }
        }

        for tuple in tuples {
            frame.bind(tuple_id, tuple);
            if self.execute_operation(nested, frame, returns)? == OpFlow::Break {
                break;
            }
        }
        Ok(OpFlow::Proceed)
    }

    /// Find the first tuple satisfying the condition and execute the nested
    /// operation for it alone. Choices search sequentially even when marked
    /// parallel; one witness is all that is needed.
    fn choose(
        &self,
        tuples: Vec<Tuple>,
        tuple_id: TupleId,
        condition: &Condition,
        nested: &Operation,
        frame: &mut Frame,
        returns: &Mutex<Vec<Tuple>>,
    ) -> Result<OpFlow, Error> {
        for tuple in tuples {
            frame.bind(tuple_id, tuple);
            if self.eval_condition(condition, frame)? {
                self.execute_operation(nested, frame, returns)?;
                break;
            }
        }
        Ok(OpFlow::Proceed)
    }

    #[allow(clippy::too_many_arguments)]
    fn aggregate(
        &self,
        tuples: Vec<Tuple>,
        tuple_id: TupleId,
        operation: AggregateOperation,
        expression: &Expression,
        condition: &Condition,
        nested: &Operation,
        frame: &mut Frame,
        returns: &Mutex<Vec<Tuple>>,
    ) -> Result<OpFlow, Error> {
        let mut fold = operation.fold();
        for tuple in tuples {
            frame.bind(tuple_id, tuple);
            if self.eval_condition(condition, frame)? {
                let value = if operation.consumes_expression() {
                    self.eval_expression(expression, frame)?
                } else {
                    0
                };
                fold.observe(value);
            }
        }
        // The fold result (including the empty-input sentinel) is bound as
        // a 1-tuple in the aggregate's own slot.
        frame.bind(tuple_id, vec![fold.finish()]);
        self.execute_operation(nested, frame, returns)
    }

    fn eval_pattern(
        &self,
        pattern: &[Expression],
        frame: &Frame,
    ) -> Result<Vec<Option<DomainValue>>, Error> {
        pattern
            .iter()
            .map(|slot| {
                if slot.is_undefined() {
                    Ok(None)
                } else {
                    self.eval_expression(slot, frame).map(Some)
                }
            })
            .collect()
    }

    fn eval_condition(&self, condition: &Condition, frame: &Frame) -> Result<bool, Error> {
        match condition {
            Condition::True => Ok(true),
            Condition::False => Ok(false),
            Condition::Conjunction(lhs, rhs) => {
                Ok(self.eval_condition(lhs, frame)? && self.eval_condition(rhs, frame)?)
            }
            Condition::Negation(inner) => Ok(!self.eval_condition(inner, frame)?),
            Condition::Constraint {
                operation,
                lhs,
                rhs,
            } => {
                let lhs = self.eval_expression(lhs, frame)?;
                let rhs = self.eval_expression(rhs, frame)?;
                self.eval_constraint(*operation, lhs, rhs)
            }
            Condition::ExistenceCheck { relation, pattern } => {
                let pattern = self.eval_pattern(pattern, frame)?;
                if pattern.iter().all(Option::is_some) {
                    let tuple: Tuple = pattern
                        .into_iter()
                        .map(|slot| slot.expect("slot is bound"))
                        .collect();
                    self.store.contains(relation, &tuple)
                } else {
                    Ok(!self.store.matching(relation, &pattern)?.is_empty())
                }
            }
            Condition::EmptinessCheck { relation } => self.store.is_empty(relation),
        }
    }

    fn eval_constraint(
        &self,
        operation: ConstraintOperation,
        lhs: DomainValue,
        rhs: DomainValue,
    ) -> Result<bool, Error> {
        use ConstraintOperation::*;

        Ok(match operation {
            Equal => lhs == rhs,
            NotEqual => lhs != rhs,
            Less => lhs < rhs,
            LessEqual => lhs <= rhs,
            Greater => lhs > rhs,
            GreaterEqual => lhs >= rhs,
            UnsignedLess => unsigned_from_domain(lhs) < unsigned_from_domain(rhs),
            UnsignedLessEqual => unsigned_from_domain(lhs) <= unsigned_from_domain(rhs),
            UnsignedGreater => unsigned_from_domain(lhs) > unsigned_from_domain(rhs),
            UnsignedGreaterEqual => unsigned_from_domain(lhs) >= unsigned_from_domain(rhs),
            FloatLess => float_from_domain(lhs) < float_from_domain(rhs),
            FloatLessEqual => float_from_domain(lhs) <= float_from_domain(rhs),
            FloatGreater => float_from_domain(lhs) > float_from_domain(rhs),
            FloatGreaterEqual => float_from_domain(lhs) >= float_from_domain(rhs),
            Match | NotMatch => {
                let pattern = self.symbols().resolve(lhs).map_err(Error::from)?;
                let text = self.symbols().resolve(rhs).map_err(Error::from)?;
                let matched = self.regex_for(&pattern)?.is_match(&text);
                (operation == Match) == matched
            }
            Contains | NotContains => {
                let needle = self.symbols().resolve(lhs).map_err(Error::from)?;
                let haystack = self.symbols().resolve(rhs).map_err(Error::from)?;
                (operation == Contains) == haystack.contains(&needle)
            }
        })
    }

    fn eval_expression(&self, expression: &Expression, frame: &Frame) -> Result<DomainValue, Error> {
        match expression {
            Expression::Constant(value) => Ok(*value),
            Expression::TupleElement { tuple_id, element } => frame
                .bindings
                .get(*tuple_id)
                .and_then(|tuple| tuple.get(*element))
                .copied()
                .ok_or(Error::UndefinedValue),
            Expression::Intrinsic {
                operation,
                arguments,
            } => {
                debug_assert_eq!(arguments.len(), operation.arity(), "intrinsic arity mismatch");
                let values = arguments
                    .iter()
                    .map(|argument| self.eval_expression(argument, frame))
                    .collect::<Result<Vec<_>, _>>()?;
                self.eval_intrinsic(*operation, &values)
            }
            Expression::UserDefined { name, arguments } => {
                let functor = self
                    .functors
                    .get(name)
                    .ok_or_else(|| Error::UnresolvedFunctor(name.clone()))?;
                let values = arguments
                    .iter()
                    .map(|argument| self.eval_expression(argument, frame))
                    .collect::<Result<Vec<_>, _>>()?;
                functor(&values)
            }
            Expression::PackRecord(arguments) => {
                let values = arguments
                    .iter()
                    .map(|argument| self.eval_expression(argument, frame))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.records.pack(&values))
            }
            Expression::SubroutineArgument(index) => frame
                .arguments
                .get(*index)
                .copied()
                .ok_or(Error::SubroutineArgumentOutOfRange(*index)),
            Expression::AutoIncrement => {
                let value = self.counter.fetch_add(1, Ordering::Relaxed);
                Ok(DomainValue::try_from(value).unwrap_or(DomainValue::MAX))
            }
            Expression::Undefined => Err(Error::UndefinedValue),
        }
    }

    fn eval_intrinsic(
        &self,
        operation: IntrinsicOperation,
        values: &[DomainValue],
    ) -> Result<DomainValue, Error> {
        use IntrinsicOperation::*;

        let unary = || values[0];
        let binary = || (values[0], values[1]);

        Ok(match operation {
            Negate => unary().wrapping_neg(),
            BitNot => !unary(),
            LogNot => DomainValue::from(unary() == 0),
            StringLength => {
                let text = self.symbols().resolve(unary()).map_err(Error::from)?;
                DomainValue::try_from(text.chars().count()).unwrap_or(DomainValue::MAX)
            }
            Add => {
                let (lhs, rhs) = binary();
                lhs.wrapping_add(rhs)
            }
            Subtract => {
                let (lhs, rhs) = binary();
                lhs.wrapping_sub(rhs)
            }
            Multiply => {
                let (lhs, rhs) = binary();
                lhs.wrapping_mul(rhs)
            }
            Divide => {
                let (lhs, rhs) = binary();
                lhs.checked_div(rhs).ok_or(Error::DivisionByZero)?
            }
            Modulo => {
                let (lhs, rhs) = binary();
                lhs.checked_rem(rhs).ok_or(Error::DivisionByZero)?
            }
            Power => {
                let (lhs, rhs) = binary();
                if rhs < 0 {
                    0
                } else {
                    lhs.wrapping_pow(u32::try_from(rhs).unwrap_or(u32::MAX))
                }
            }
            Max => {
                let (lhs, rhs) = binary();
                lhs.max(rhs)
            }
            Min => {
                let (lhs, rhs) = binary();
                lhs.min(rhs)
            }
            BitAnd => {
                let (lhs, rhs) = binary();
                lhs & rhs
            }
            BitOr => {
                let (lhs, rhs) = binary();
                lhs | rhs
            }
            BitXor => {
                let (lhs, rhs) = binary();
                lhs ^ rhs
            }
            LogAnd => {
                let (lhs, rhs) = binary();
                DomainValue::from(lhs != 0 && rhs != 0)
            }
            LogOr => {
                let (lhs, rhs) = binary();
                DomainValue::from(lhs != 0 || rhs != 0)
            }
            Concatenate => {
                let (lhs, rhs) = binary();
                let mut text = self.symbols().resolve(lhs).map_err(Error::from)?;
                text.push_str(&self.symbols().resolve(rhs).map_err(Error::from)?);
                self.symbols().intern(&text)
            }
            UnsignedDivide => {
                let (lhs, rhs) = binary();
                let rhs = unsigned_from_domain(rhs);
                if rhs == 0 {
                    return Err(Error::DivisionByZero);
                }
                domain_from_unsigned(unsigned_from_domain(lhs) / rhs)
            }
            UnsignedModulo => {
                let (lhs, rhs) = binary();
                let rhs = unsigned_from_domain(rhs);
                if rhs == 0 {
                    return Err(Error::DivisionByZero);
                }
                domain_from_unsigned(unsigned_from_domain(lhs) % rhs)
            }
            FloatAdd => {
                let (lhs, rhs) = binary();
                domain_from_float(float_from_domain(lhs) + float_from_domain(rhs))
            }
            FloatSubtract => {
                let (lhs, rhs) = binary();
                domain_from_float(float_from_domain(lhs) - float_from_domain(rhs))
            }
            FloatMultiply => {
                let (lhs, rhs) = binary();
                domain_from_float(float_from_domain(lhs) * float_from_domain(rhs))
            }
            FloatDivide => {
                let (lhs, rhs) = binary();
                domain_from_float(float_from_domain(lhs) / float_from_domain(rhs))
            }
        })
    }

    fn regex_for(&self, pattern: &str) -> Result<Regex, Error> {
        let mut cache = self.regex_cache.lock().expect("regex cache lock poisoned");
        if let Some(compiled) = cache.get(pattern) {
            return Ok(compiled.clone());
        }
        // Full-string semantics, as the match constraint demands.
        let compiled = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
            Error::InvalidRegex {
                pattern: pattern.to_owned(),
                source,
            }
        })?;
        cache.insert(pattern.to_owned(), compiled.clone());
        Ok(compiled)
    }
}

/// Number of binding slots a query needs: one past its largest tuple id.
fn frame_slots(operation: &Operation) -> usize {
    let mut slots = operation.tuple_id().map_or(0, |id| id + 1);
    if let Some(nested) = operation.nested() {
        slots = slots.max(frame_slots(nested));
    }
    slots
}

#[cfg(test)]
mod test {
    use stratum_physical::datatypes::AttributeType;

    use crate::ram::{relation::RelationRole, Program};

    use super::*;

    fn decl(name: &str, arity: usize, attribute_type: AttributeType, role: RelationRole) -> RelationDecl {
        RelationDecl::with_uniform_type(name, arity, attribute_type, role)
    }

    fn element(tuple_id: TupleId, element: usize) -> Expression {
        Expression::TupleElement { tuple_id, element }
    }

    fn engine(program: Program) -> Interpreter {
        Interpreter::new(RamTranslationUnit::new(program), EngineConfig::default()).unwrap()
    }

    fn edge_facts(engine: &Interpreter) {
        engine.add_fact("edge", vec![1, 2]).unwrap();
        engine.add_fact("edge", vec![1, 3]).unwrap();
        engine.add_fact("edge", vec![2, 3]).unwrap();
    }

    /// Facts name("apple", "1") and name("banana", "2"), rule
    /// target(O) :- name("banana", O); the result must be exactly ("2").
    #[test]
    fn end_to_end_single_rule() {
        let declarations = vec![
            decl("name", 2, AttributeType::Symbol, RelationRole::Input),
            decl("target", 1, AttributeType::Symbol, RelationRole::Output),
        ];
        let main = Statement::Query(Operation::Scan {
            relation: "name".to_owned(),
            tuple_id: 0,
            parallel: false,
            nested: Box::new(Operation::Filter {
                condition: Box::new(Condition::equal(element(0, 0), Expression::signed(2))),
                nested: Box::new(Operation::Project {
                    relation: "target".to_owned(),
                    values: vec![element(0, 1)],
                }),
            }),
        });
        let mut engine = engine(Program::new(declarations, main));

        assert_eq!(engine.symbols().intern("apple"), 0);
        assert_eq!(engine.symbols().intern("1"), 1);
        assert_eq!(engine.symbols().intern("banana"), 2);
        assert_eq!(engine.symbols().intern("2"), 3);
        engine.add_fact("name", vec![0, 1]).unwrap();
        engine.add_fact("name", vec![2, 3]).unwrap();

        engine.execute_main().unwrap();
        assert_eq!(engine.formatted_rows("target").unwrap(), vec!["2"]);
    }

    #[test]
    fn projection_is_idempotent() {
        let declarations = vec![
            decl("edge", 2, AttributeType::Signed, RelationRole::Input),
            decl("out", 1, AttributeType::Signed, RelationRole::Output),
        ];
        // Two identical projections per scanned tuple.
        let project = Operation::Project {
            relation: "out".to_owned(),
            values: vec![Expression::signed(42)],
        };
        let main = Statement::Sequence(vec![
            Statement::Query(Operation::Scan {
                relation: "edge".to_owned(),
                tuple_id: 0,
                parallel: false,
                nested: Box::new(project.clone()),
            }),
            Statement::Query(Operation::Scan {
                relation: "edge".to_owned(),
                tuple_id: 0,
                parallel: false,
                nested: Box::new(project),
            }),
        ]);
        let mut engine = engine(Program::new(declarations, main));
        edge_facts(&engine);

        engine.execute_main().unwrap();
        assert_eq!(engine.relation_contents("out").unwrap(), vec![vec![42]]);
    }

    /// IndexScan(R, x = 1) must produce what Scan(R) plus a filter produces.
    #[test]
    fn index_scan_equals_filtered_scan() {
        let declarations = vec![
            decl("edge", 2, AttributeType::Signed, RelationRole::Input),
            decl("via_index", 2, AttributeType::Signed, RelationRole::Output),
            decl("via_scan", 2, AttributeType::Signed, RelationRole::Output),
        ];
        let main = Statement::Sequence(vec![
            Statement::Query(Operation::IndexScan {
                relation: "edge".to_owned(),
                tuple_id: 0,
                pattern: vec![Expression::signed(1), Expression::Undefined],
                parallel: false,
                nested: Box::new(Operation::Project {
                    relation: "via_index".to_owned(),
                    values: vec![element(0, 0), element(0, 1)],
                }),
            }),
            Statement::Query(Operation::Scan {
                relation: "edge".to_owned(),
                tuple_id: 0,
                parallel: false,
                nested: Box::new(Operation::Filter {
                    condition: Box::new(Condition::equal(element(0, 0), Expression::signed(1))),
                    nested: Box::new(Operation::Project {
                        relation: "via_scan".to_owned(),
                        values: vec![element(0, 0), element(0, 1)],
                    }),
                }),
            }),
        ]);
        let mut engine = engine(Program::new(declarations, main));
        edge_facts(&engine);

        engine.execute_main().unwrap();
        let via_index = engine.relation_contents("via_index").unwrap();
        assert_eq!(via_index, vec![vec![1, 2], vec![1, 3]]);
        assert_eq!(via_index, engine.relation_contents("via_scan").unwrap());
    }

    #[test]
    fn count_aggregate_over_edge_is_three() {
        let declarations = vec![
            decl("edge", 2, AttributeType::Signed, RelationRole::Input),
            decl("size", 1, AttributeType::Signed, RelationRole::Output),
            decl("empty", 2, AttributeType::Signed, RelationRole::Input),
            decl("empty_sum", 1, AttributeType::Signed, RelationRole::Output),
        ];
        let main = Statement::Sequence(vec![
            Statement::Query(Operation::Aggregate {
                relation: "edge".to_owned(),
                tuple_id: 0,
                operation: AggregateOperation::Count,
                expression: Box::new(Expression::Undefined),
                condition: Box::new(Condition::True),
                nested: Box::new(Operation::Project {
                    relation: "size".to_owned(),
                    values: vec![element(0, 0)],
                }),
            }),
            Statement::Query(Operation::Aggregate {
                relation: "empty".to_owned(),
                tuple_id: 0,
                operation: AggregateOperation::Sum,
                expression: Box::new(element(0, 1)),
                condition: Box::new(Condition::True),
                nested: Box::new(Operation::Project {
                    relation: "empty_sum".to_owned(),
                    values: vec![element(0, 0)],
                }),
            }),
        ]);
        let mut engine = engine(Program::new(declarations, main));
        edge_facts(&engine);

        engine.execute_main().unwrap();
        assert_eq!(engine.relation_contents("size").unwrap(), vec![vec![3]]);
        // Sum over the empty qualifying set is the additive identity.
        assert_eq!(engine.relation_contents("empty_sum").unwrap(), vec![vec![0]]);
    }

    /// Transitive closure via the usual delta loop; exercises Loop, Exit,
    /// Merge, Swap, Clear, and an index scan keyed on an outer binding.
    #[test_log::test]
    fn transitive_closure_reaches_its_fixpoint() {
        let declarations = vec![
            decl("edge", 2, AttributeType::Signed, RelationRole::Input),
            decl("path", 2, AttributeType::Signed, RelationRole::Output),
            decl("delta", 2, AttributeType::Signed, RelationRole::Auxiliary),
            decl("fresh", 2, AttributeType::Signed, RelationRole::Auxiliary),
        ];
        let step = Statement::Query(Operation::Scan {
            relation: "delta".to_owned(),
            tuple_id: 0,
            parallel: false,
            nested: Box::new(Operation::IndexScan {
                relation: "edge".to_owned(),
                tuple_id: 1,
                pattern: vec![element(0, 1), Expression::Undefined],
                parallel: false,
                nested: Box::new(Operation::Filter {
                    condition: Box::new(Condition::Negation(Box::new(Condition::ExistenceCheck {
                        relation: "path".to_owned(),
                        pattern: vec![element(0, 0), element(1, 1)],
                    }))),
                    nested: Box::new(Operation::Project {
                        relation: "fresh".to_owned(),
                        values: vec![element(0, 0), element(1, 1)],
                    }),
                }),
            }),
        });
        let main = Statement::Sequence(vec![
            Statement::Merge {
                source: "edge".to_owned(),
                target: "path".to_owned(),
            },
            Statement::Merge {
                source: "edge".to_owned(),
                target: "delta".to_owned(),
            },
            Statement::Loop(Box::new(Statement::Sequence(vec![
                step,
                Statement::Exit(Condition::EmptinessCheck {
                    relation: "fresh".to_owned(),
                }),
                Statement::Merge {
                    source: "fresh".to_owned(),
                    target: "path".to_owned(),
                },
                Statement::Swap {
                    first: "delta".to_owned(),
                    second: "fresh".to_owned(),
                },
                Statement::Clear("fresh".to_owned()),
            ]))),
        ]);
        let mut engine = engine(Program::new(declarations, main));
        engine.add_fact("edge", vec![1, 2]).unwrap();
        engine.add_fact("edge", vec![2, 3]).unwrap();
        engine.add_fact("edge", vec![3, 4]).unwrap();

        engine.execute_main().unwrap();
        assert_eq!(
            engine.relation_contents("path").unwrap(),
            vec![
                vec![1, 2],
                vec![1, 3],
                vec![1, 4],
                vec![2, 3],
                vec![2, 4],
                vec![3, 4]
            ]
        );
    }

    #[test]
    fn break_aborts_the_innermost_iteration() {
        let declarations = vec![
            decl("edge", 2, AttributeType::Signed, RelationRole::Input),
            decl("out", 2, AttributeType::Signed, RelationRole::Output),
        ];
        let main = Statement::Query(Operation::Scan {
            relation: "edge".to_owned(),
            tuple_id: 0,
            parallel: false,
            nested: Box::new(Operation::Break {
                condition: Box::new(Condition::equal(element(0, 0), Expression::signed(2))),
                nested: Box::new(Operation::Project {
                    relation: "out".to_owned(),
                    values: vec![element(0, 0), element(0, 1)],
                }),
            }),
        });
        let mut engine = engine(Program::new(declarations, main));
        edge_facts(&engine);

        engine.execute_main().unwrap();
        // Tuples arrive in lexicographic order; (2, 3) triggers the break.
        assert_eq!(
            engine.relation_contents("out").unwrap(),
            vec![vec![1, 2], vec![1, 3]]
        );
    }

    #[test]
    fn evaluation_errors_abort_and_land_in_the_report() {
        let declarations = vec![
            decl("edge", 2, AttributeType::Signed, RelationRole::Input),
            decl("out", 1, AttributeType::Signed, RelationRole::Output),
        ];
        let main = Statement::Query(Operation::Scan {
            relation: "edge".to_owned(),
            tuple_id: 0,
            parallel: false,
            nested: Box::new(Operation::Project {
                relation: "out".to_owned(),
                values: vec![Expression::Intrinsic {
                    operation: IntrinsicOperation::Divide,
                    arguments: vec![element(0, 0), Expression::signed(0)],
                }],
            }),
        });
        let mut engine = engine(Program::new(declarations, main));
        edge_facts(&engine);

        assert!(matches!(engine.execute_main(), Err(Error::DivisionByZero)));
        assert!(engine.unit().report().has_errors());
    }

    #[test]
    fn records_pack_and_unpack() {
        let declarations = vec![
            decl("edge", 2, AttributeType::Signed, RelationRole::Input),
            decl("handles", 1, AttributeType::Record, RelationRole::Auxiliary),
            decl("flipped", 2, AttributeType::Signed, RelationRole::Output),
        ];
        let main = Statement::Sequence(vec![
            Statement::Query(Operation::Scan {
                relation: "edge".to_owned(),
                tuple_id: 0,
                parallel: false,
                nested: Box::new(Operation::Project {
                    relation: "handles".to_owned(),
                    values: vec![Expression::PackRecord(vec![element(0, 0), element(0, 1)])],
                }),
            }),
            Statement::Query(Operation::Scan {
                relation: "handles".to_owned(),
                tuple_id: 0,
                parallel: false,
                nested: Box::new(Operation::UnpackRecord {
                    expression: Box::new(element(0, 0)),
                    arity: 2,
                    tuple_id: 1,
                    nested: Box::new(Operation::Project {
                        relation: "flipped".to_owned(),
                        values: vec![element(1, 1), element(1, 0)],
                    }),
                }),
            }),
        ]);
        let mut engine = engine(Program::new(declarations, main));
        edge_facts(&engine);

        engine.execute_main().unwrap();
        assert_eq!(
            engine.relation_contents("flipped").unwrap(),
            vec![vec![2, 1], vec![3, 1], vec![3, 2]]
        );
    }

    #[test]
    fn subroutines_return_tuples_instead_of_projecting() {
        let declarations = vec![decl("edge", 2, AttributeType::Signed, RelationRole::Input)];
        let mut program = Program::new(declarations, Statement::Sequence(Vec::new()));
        program.add_subroutine(
            "edges_from",
            Statement::Query(Operation::IndexScan {
                relation: "edge".to_owned(),
                tuple_id: 0,
                pattern: vec![Expression::SubroutineArgument(0), Expression::Undefined],
                parallel: false,
                nested: Box::new(Operation::SubroutineReturn(vec![element(0, 0), element(0, 1)])),
            }),
        );
        let mut engine = engine(program);
        edge_facts(&engine);

        engine.execute_main().unwrap();
        assert_eq!(
            engine.execute_subroutine("edges_from", &[1]).unwrap(),
            vec![vec![1, 2], vec![1, 3]]
        );
        assert!(matches!(
            engine.execute_subroutine("missing", &[]),
            Err(Error::UnknownSubroutine(_))
        ));
    }

    #[test_log::test]
    fn parallel_scan_matches_sequential_result() {
        let declarations = vec![
            decl("edge", 2, AttributeType::Signed, RelationRole::Input),
            decl("out", 2, AttributeType::Signed, RelationRole::Output),
        ];
        let query = |parallel| {
            Statement::Query(Operation::Scan {
                relation: "edge".to_owned(),
                tuple_id: 0,
                parallel,
                nested: Box::new(Operation::Project {
                    relation: "out".to_owned(),
                    values: vec![element(0, 1), element(0, 0)],
                }),
            })
        };

        let mut sequential = engine(Program::new(declarations.clone(), query(false)));
        edge_facts(&sequential);
        sequential.execute_main().unwrap();

        let config = EngineConfig {
            jobs: crate::config::Jobs::Fixed(std::num::NonZeroUsize::new(4).unwrap()),
            ..Default::default()
        };
        let mut parallel = Interpreter::new(
            RamTranslationUnit::new(Program::new(declarations, query(true))),
            config,
        )
        .unwrap();
        edge_facts(&parallel);
        parallel.execute_main().unwrap();

        assert_eq!(
            sequential.relation_contents("out").unwrap(),
            parallel.relation_contents("out").unwrap()
        );
    }

    #[test]
    fn string_constraints_use_the_symbol_table() {
        let declarations = vec![
            decl("name", 1, AttributeType::Symbol, RelationRole::Input),
            decl("matched", 1, AttributeType::Symbol, RelationRole::Output),
        ];
        let main = Statement::Query(Operation::Scan {
            relation: "name".to_owned(),
            tuple_id: 0,
            parallel: false,
            nested: Box::new(Operation::Filter {
                condition: Box::new(Condition::Constraint {
                    operation: ConstraintOperation::Match,
                    lhs: Box::new(Expression::signed(0)),
                    rhs: Box::new(element(0, 0)),
                }),
                nested: Box::new(Operation::Project {
                    relation: "matched".to_owned(),
                    values: vec![element(0, 0)],
                }),
            }),
        });
        let mut engine = engine(Program::new(declarations, main));

        assert_eq!(engine.symbols().intern("b.*"), 0);
        let apple = engine.symbols().intern("apple");
        let banana = engine.symbols().intern("banana");
        engine.add_fact("name", vec![apple]).unwrap();
        engine.add_fact("name", vec![banana]).unwrap();

        engine.execute_main().unwrap();
        assert_eq!(engine.formatted_rows("matched").unwrap(), vec!["banana"]);
    }
}
