//! This module defines [Explainer], the single-shot explanation interface.

use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};
use itertools::Itertools;

use stratum_physical::datatypes::{
    domain::{domain_from_float, domain_from_unsigned, DomainValue, Tuple},
    AttributeType,
};

use crate::{
    config::ProvenanceMode,
    error::Error,
    interpreter::Interpreter,
    ram::relation::RelationDecl,
};

use super::{
    constraints::{ConstConstraint, Equivalence},
    rules::{ConstantValue, Literal, RuleSpec, Term},
    tree::TreeNode,
};

/// Default bound on the recursion depth of an explanation, guarding against
/// non-termination on recursive rules.
pub const DEFAULT_DEPTH_LIMIT: usize = 10;

/// Reconstructs derivation trees for computed tuples by re-querying the
/// relation store under the rule metadata of the translation unit.
#[derive(Debug)]
pub struct Explainer<'a> {
    engine: &'a Interpreter,
    depth_limit: usize,
    with_heights: bool,
}

impl<'a> Explainer<'a> {
    /// Create an explainer over a finished run.
    ///
    /// Fails when the engine was not configured with a provenance mode.
    pub fn new(engine: &'a Interpreter) -> Result<Self, Error> {
        if !engine.config().provenance.is_enabled() {
            return Err(Error::ProvenanceDisabled);
        }
        Ok(Self {
            engine,
            depth_limit: DEFAULT_DEPTH_LIMIT,
            with_heights: engine.config().provenance == ProvenanceMode::SubtreeHeights,
        })
    }

    /// The current recursion bound.
    pub fn depth_limit(&self) -> usize {
        self.depth_limit
    }

    /// Change the recursion bound.
    pub fn set_depth_limit(&mut self, depth_limit: usize) {
        self.depth_limit = depth_limit.max(1);
    }

    /// Whether JSON renderings carry subtree heights.
    pub fn with_heights(&self) -> bool {
        self.with_heights
    }

    /// Explain the tuple given by `arguments` (strings in schema order;
    /// symbol attributes quoted) in `relation`.
    pub fn explain(&self, relation: &str, arguments: &[String]) -> Result<TreeNode, Error> {
        let declaration = self
            .engine
            .unit()
            .program()
            .declaration(relation)
            .ok_or_else(|| Error::UnknownRelation(relation.to_owned()))?;

        let not_derived = || Error::TupleNotDerived {
            relation: relation.to_owned(),
            tuple: format!("({})", arguments.iter().format(", ")),
        };
        if arguments.len() != declaration.arity() {
            return Err(not_derived());
        }
        let tuple = self
            .parse_arguments(declaration, arguments)?
            .ok_or_else(not_derived)?;

        self.derive(relation, &tuple, self.depth_limit)
    }

    /// Explain every tuple currently in `relation`; the result maps the
    /// rendered fact to its ascii explanation.
    pub fn explain_all(&self, relation: &str) -> Result<BTreeMap<String, String>, Error> {
        let mut explanations = BTreeMap::new();
        for tuple in self.engine.relation_contents(relation)? {
            let fact = self.format_fact(relation, &tuple)?;
            let rendered = self.derive(relation, &tuple, self.depth_limit)?.ascii();
            explanations.insert(fact, rendered);
        }
        Ok(explanations)
    }

    /// Render the fact of `relation` and `tuple` the way explanations do.
    pub fn format_fact(&self, relation: &str, tuple: &[DomainValue]) -> Result<String, Error> {
        let declaration = self
            .engine
            .unit()
            .program()
            .declaration(relation)
            .ok_or_else(|| Error::UnknownRelation(relation.to_owned()))?;

        let mut fields = Vec::with_capacity(tuple.len());
        for (attribute_type, &value) in declaration.attribute_types().iter().zip(tuple) {
            let field = match attribute_type {
                AttributeType::Symbol => {
                    format!("\"{}\"", self.engine.symbols().resolve(value)?)
                }
                AttributeType::Record => value.to_string(),
                numeric => numeric.format_numeric(value),
            };
            fields.push(field);
        }
        Ok(format!("{relation}({})", fields.join(", ")))
    }

    /// Convert textual arguments into a tuple, respecting declared
    /// attribute types. `None` when a symbol argument was never interned
    /// (the fact then cannot exist).
    fn parse_arguments(
        &self,
        declaration: &RelationDecl,
        arguments: &[String],
    ) -> Result<Option<Tuple>, Error> {
        let mut tuple = Tuple::with_capacity(arguments.len());
        for (attribute_type, argument) in declaration.attribute_types().iter().zip(arguments) {
            let value = match attribute_type {
                AttributeType::Symbol => {
                    let trimmed = argument
                        .strip_prefix('"')
                        .and_then(|rest| rest.strip_suffix('"'))
                        .unwrap_or(argument);
                    match self.engine.symbols().lookup(trimmed) {
                        Some(id) => id,
                        None => return Ok(None),
                    }
                }
                numeric => numeric
                    .parse_numeric(argument)
                    .map_err(Error::from)?,
            };
            tuple.push(value);
        }
        Ok(Some(tuple))
    }

    /// Reconstruct the derivation of `tuple` in `relation`.
    fn derive(&self, relation: &str, tuple: &Tuple, depth: usize) -> Result<TreeNode, Error> {
        if !self.engine.store().contains(relation, tuple)? {
            return Err(Error::TupleNotDerived {
                relation: relation.to_owned(),
                tuple: self
                    .format_fact(relation, tuple)
                    .unwrap_or_else(|_| relation.to_owned()),
            });
        }

        let fact = self.format_fact(relation, tuple)?;
        let rules: Vec<(usize, &RuleSpec)> = match self.engine.unit().rules() {
            Some(catalog) => catalog.rules_for(relation).collect(),
            None => Vec::new(),
        };
        if rules.is_empty() {
            return Ok(TreeNode::Leaf { fact });
        }
        if depth == 0 {
            return Ok(TreeNode::Leaf {
                fact: format!("{fact} (depth limit)"),
            });
        }

        for (index, rule) in rules {
            if let Some(tree) = self.try_rule(index, rule, &fact, tuple, depth)? {
                return Ok(tree);
            }
        }

        // Present in the store but not justified by the metadata; treat it
        // as a base fact rather than failing the whole explanation.
        log::debug!("no rule instance justifies {fact}");
        Ok(TreeNode::Leaf { fact })
    }

    /// Find body bindings deriving `tuple` through `rule`; `None` if the
    /// rule admits no such instance.
    fn try_rule(
        &self,
        index: usize,
        rule: &RuleSpec,
        fact: &str,
        tuple: &Tuple,
        depth: usize,
    ) -> Result<Option<TreeNode>, Error> {
        if rule.head.terms.len() != tuple.len() {
            return Ok(None);
        }

        // Equivalence classes over the head (product position 0) and the
        // positive body literals (position = body index + 1); negated
        // literals contribute placeholder product slots only.
        let mut classes: Vec<Equivalence> = Vec::new();
        let mut class_of: HashMap<String, usize> = HashMap::new();
        let mut constants = ConstConstraint::new();

        let record_atom = |atom_index: usize,
                           terms: &[Term],
                           classes: &mut Vec<Equivalence>,
                           class_of: &mut HashMap<String, usize>,
                           constants: &mut ConstConstraint|
         -> bool {
            for (argument, term) in terms.iter().enumerate() {
                match term {
                    Term::Variable(name) => match class_of.get(name.as_str()) {
                        Some(&class) => classes[class].push((atom_index, argument)),
                        None => {
                            class_of.insert(name.clone(), classes.len());
                            classes.push(Equivalence::new(name.clone(), (atom_index, argument)));
                        }
                    },
                    Term::Constant(constant) => match self.constant_value(constant) {
                        Some(value) => constants.push((atom_index, argument), value),
                        None => return false,
                    },
                }
            }
            true
        };

        if !record_atom(0, &rule.head.terms, &mut classes, &mut class_of, &mut constants) {
            return Ok(None);
        }
        for (body_index, literal) in rule.body.iter().enumerate() {
            if let Literal::Positive(atom) = literal {
                if !record_atom(
                    body_index + 1,
                    &atom.terms,
                    &mut classes,
                    &mut class_of,
                    &mut constants,
                ) {
                    return Ok(None);
                }
            }
        }

        // Every variable of a negated literal must be bound positively.
        let bound: HashSet<&str> = class_of.keys().map(String::as_str).collect();
        for literal in &rule.body {
            if let Literal::Negative(atom) = literal {
                for term in &atom.terms {
                    if let Term::Variable(name) = term {
                        if !bound.contains(name.as_str()) {
                            log::debug!(
                                "rule R{} has an unbound variable {name} in a negated literal",
                                index + 1
                            );
                            return Ok(None);
                        }
                    }
                }
            }
        }

        // Candidate tuples per product position.
        let mut candidates: Vec<Vec<Tuple>> = vec![vec![tuple.clone()]];
        for literal in &rule.body {
            match literal {
                Literal::Positive(atom) => {
                    let pattern = self.literal_pattern(atom.terms.as_slice());
                    let Some(pattern) = pattern else {
                        return Ok(None);
                    };
                    let matching = self.engine.store().matching(&atom.relation, &pattern)?;
                    if matching.is_empty() {
                        return Ok(None);
                    }
                    candidates.push(matching);
                }
                Literal::Negative(_) => candidates.push(vec![Tuple::new()]),
            }
        }

        'products: for combination in candidates
            .iter()
            .map(|tuples| tuples.iter())
            .multi_cartesian_product()
        {
            let product: Vec<Tuple> = combination.into_iter().cloned().collect();
            if !classes.iter().all(|class| class.verify(&product)) || !constants.verify(&product) {
                continue;
            }

            // Check the absence witnesses before committing to recursion.
            let mut absences = Vec::new();
            for literal in &rule.body {
                if let Literal::Negative(atom) = literal {
                    let mut resolved = Tuple::with_capacity(atom.terms.len());
                    for term in &atom.terms {
                        let value = match term {
                            Term::Variable(name) => {
                                classes[class_of[name.as_str()]].value(&product)
                            }
                            Term::Constant(constant) => match self.constant_value(constant) {
                                Some(value) => value,
                                None => continue 'products,
                            },
                        };
                        resolved.push(value);
                    }
                    if self.engine.store().contains(&atom.relation, &resolved)? {
                        continue 'products;
                    }
                    absences.push((atom.relation.clone(), resolved));
                }
            }

            let mut absences = absences.into_iter();
            let mut children = Vec::with_capacity(rule.body.len());
            for (body_index, literal) in rule.body.iter().enumerate() {
                match literal {
                    Literal::Positive(atom) => {
                        children.push(self.derive(
                            &atom.relation,
                            &product[body_index + 1],
                            depth - 1,
                        )?);
                    }
                    Literal::Negative(_) => {
                        let (relation, resolved) =
                            absences.next().expect("one absence per negated literal");
                        children.push(TreeNode::Leaf {
                            fact: format!("!{}", self.format_fact(&relation, &resolved)?),
                        });
                    }
                }
            }

            return Ok(Some(TreeNode::Inner {
                fact: fact.to_owned(),
                rule: format!("R{}", index + 1),
                children,
            }));
        }

        Ok(None)
    }

    /// The query pattern of a positive literal: constants bound, variables
    /// free. `None` when a symbol constant was never interned.
    fn literal_pattern(&self, terms: &[Term]) -> Option<Vec<Option<DomainValue>>> {
        terms
            .iter()
            .map(|term| match term {
                Term::Variable(_) => Some(None),
                Term::Constant(constant) => self.constant_value(constant).map(Some),
            })
            .collect()
    }

    fn constant_value(&self, constant: &ConstantValue) -> Option<DomainValue> {
        match constant {
            ConstantValue::Symbol(text) => self.engine.symbols().lookup(text),
            ConstantValue::Signed(value) => Some(*value),
            ConstantValue::Unsigned(value) => Some(domain_from_unsigned(*value)),
            ConstantValue::Float(value) => Some(domain_from_float(*value)),
        }
    }
}

#[cfg(test)]
mod test {
    use stratum_physical::datatypes::AttributeType;

    use crate::{
        config::EngineConfig,
        provenance::rules::{Atom, RuleCatalog},
        ram::{
            expression::Expression,
            operation::Operation,
            relation::{RelationDecl, RelationRole},
            statement::Statement,
            Program, RamTranslationUnit,
        },
    };

    use super::*;

    fn element(tuple_id: usize, element: usize) -> Expression {
        Expression::TupleElement { tuple_id, element }
    }

    fn variable(name: &str) -> Term {
        Term::Variable(name.to_owned())
    }

    fn symbol(text: &str) -> Term {
        Term::Constant(ConstantValue::Symbol(text.to_owned()))
    }

    /// Facts name("apple", "1"), name("banana", "2"), rule
    /// target(O) :- name("banana", O); engine run to completion.
    fn banana_engine() -> Interpreter {
        let declarations = vec![
            RelationDecl::with_uniform_type("name", 2, AttributeType::Symbol, RelationRole::Input),
            RelationDecl::with_uniform_type("target", 1, AttributeType::Symbol, RelationRole::Output),
        ];
        let main = Statement::Query(Operation::Scan {
            relation: "name".to_owned(),
            tuple_id: 0,
            parallel: false,
            nested: Box::new(Operation::Filter {
                condition: Box::new(crate::ram::condition::Condition::equal(
                    element(0, 0),
                    Expression::signed(2),
                )),
                nested: Box::new(Operation::Project {
                    relation: "target".to_owned(),
                    values: vec![element(0, 1)],
                }),
            }),
        });
        let rules = RuleCatalog::new(vec![RuleSpec::new(
            Atom::new("target", vec![variable("O")]),
            vec![Literal::Positive(Atom::new(
                "name",
                vec![symbol("banana"), variable("O")],
            ))],
        )]);

        let unit = RamTranslationUnit::new(Program::new(declarations, main)).with_rules(rules);
        let config = EngineConfig {
            provenance: ProvenanceMode::Explain,
            ..Default::default()
        };
        let mut engine = Interpreter::new(unit, config).unwrap();

        assert_eq!(engine.symbols().intern("apple"), 0);
        assert_eq!(engine.symbols().intern("1"), 1);
        assert_eq!(engine.symbols().intern("banana"), 2);
        assert_eq!(engine.symbols().intern("2"), 3);
        engine.add_fact("name", vec![0, 1]).unwrap();
        engine.add_fact("name", vec![2, 3]).unwrap();
        engine.execute_main().unwrap();
        engine
    }

    #[test]
    fn explanation_roots_in_the_deriving_rule() {
        let engine = banana_engine();
        let explainer = Explainer::new(&engine).unwrap();

        let tree = explainer
            .explain("target", &["\"2\"".to_owned()])
            .unwrap();

        match &tree {
            TreeNode::Inner {
                fact,
                rule,
                children,
            } => {
                assert_eq!(fact, "target(\"2\")");
                assert_eq!(rule, "R1");
                assert_eq!(
                    children,
                    &vec![TreeNode::Leaf {
                        fact: "name(\"banana\", \"2\")".to_owned()
                    }]
                );
            }
            other => panic!("expected a rule application, got {other:?}"),
        }

        // Round trip: the leaf fact is present in the store, and applying
        // the rule to it reproduces the queried tuple.
        assert!(engine.store().contains("name", &[2, 3]).unwrap());
        assert_eq!(tree.fact(), "target(\"2\")");
    }

    #[test]
    fn underived_tuples_are_rejected() {
        let engine = banana_engine();
        let explainer = Explainer::new(&engine).unwrap();

        assert!(matches!(
            explainer.explain("target", &["\"1\"".to_owned()]),
            Err(Error::TupleNotDerived { .. })
        ));
        assert!(matches!(
            explainer.explain("target", &["\"never-seen\"".to_owned()]),
            Err(Error::TupleNotDerived { .. })
        ));
    }

    #[test]
    fn explainer_requires_provenance_mode() {
        let declarations = vec![RelationDecl::with_uniform_type(
            "edge",
            2,
            AttributeType::Signed,
            RelationRole::Input,
        )];
        let unit = RamTranslationUnit::new(Program::new(
            declarations,
            Statement::Sequence(Vec::new()),
        ));
        let engine = Interpreter::new(unit, EngineConfig::default()).unwrap();

        assert!(matches!(
            Explainer::new(&engine),
            Err(Error::ProvenanceDisabled)
        ));
    }

    #[test]
    fn negated_literals_become_absence_witnesses() {
        // vegetarian(X) :- person(X), !eats_meat(X).
        let declarations = vec![
            RelationDecl::with_uniform_type("person", 1, AttributeType::Symbol, RelationRole::Input),
            RelationDecl::with_uniform_type("eats_meat", 1, AttributeType::Symbol, RelationRole::Input),
            RelationDecl::with_uniform_type("vegetarian", 1, AttributeType::Symbol, RelationRole::Output),
        ];
        let main = Statement::Query(Operation::Scan {
            relation: "person".to_owned(),
            tuple_id: 0,
            parallel: false,
            nested: Box::new(Operation::Filter {
                condition: Box::new(crate::ram::condition::Condition::Negation(Box::new(
                    crate::ram::condition::Condition::ExistenceCheck {
                        relation: "eats_meat".to_owned(),
                        pattern: vec![element(0, 0)],
                    },
                ))),
                nested: Box::new(Operation::Project {
                    relation: "vegetarian".to_owned(),
                    values: vec![element(0, 0)],
                }),
            }),
        });
        let rules = RuleCatalog::new(vec![RuleSpec::new(
            Atom::new("vegetarian", vec![variable("X")]),
            vec![
                Literal::Positive(Atom::new("person", vec![variable("X")])),
                Literal::Negative(Atom::new("eats_meat", vec![variable("X")])),
            ],
        )]);

        let unit = RamTranslationUnit::new(Program::new(declarations, main)).with_rules(rules);
        let config = EngineConfig {
            provenance: ProvenanceMode::Explain,
            ..Default::default()
        };
        let mut engine = Interpreter::new(unit, config).unwrap();

        let alice = engine.symbols().intern("alice");
        let bob = engine.symbols().intern("bob");
        engine.add_fact("person", vec![alice]).unwrap();
        engine.add_fact("person", vec![bob]).unwrap();
        engine.add_fact("eats_meat", vec![bob]).unwrap();
        engine.execute_main().unwrap();

        let explainer = Explainer::new(&engine).unwrap();
        let tree = explainer
            .explain("vegetarian", &["\"alice\"".to_owned()])
            .unwrap();

        match tree {
            TreeNode::Inner { children, .. } => {
                assert_eq!(children.len(), 2);
                assert_eq!(children[0].fact(), "person(\"alice\")");
                assert_eq!(children[1].fact(), "!eats_meat(\"alice\")");
            }
            other => panic!("expected a rule application, got {other:?}"),
        }
    }

    #[test]
    fn recursive_rules_stay_within_the_depth_limit() {
        // path(X, Y) :- edge(X, Y).  path(X, Y) :- path(X, Z), edge(Z, Y).
        let declarations = vec![
            RelationDecl::with_uniform_type("edge", 2, AttributeType::Signed, RelationRole::Input),
            RelationDecl::with_uniform_type("path", 2, AttributeType::Signed, RelationRole::Output),
        ];
        let rules = RuleCatalog::new(vec![
            RuleSpec::new(
                Atom::new("path", vec![variable("X"), variable("Y")]),
                vec![Literal::Positive(Atom::new(
                    "edge",
                    vec![variable("X"), variable("Y")],
                ))],
            ),
            RuleSpec::new(
                Atom::new("path", vec![variable("X"), variable("Y")]),
                vec![
                    Literal::Positive(Atom::new("path", vec![variable("X"), variable("Z")])),
                    Literal::Positive(Atom::new("edge", vec![variable("Z"), variable("Y")])),
                ],
            ),
        ]);

        // The model is filled in directly; only explanation is under test.
        let unit = RamTranslationUnit::new(Program::new(
            declarations,
            Statement::Sequence(Vec::new()),
        ))
        .with_rules(rules);
        let config = EngineConfig {
            provenance: ProvenanceMode::SubtreeHeights,
            ..Default::default()
        };
        let mut engine = Interpreter::new(unit, config).unwrap();
        engine.add_fact("edge", vec![1, 2]).unwrap();
        engine.add_fact("edge", vec![2, 3]).unwrap();
        engine.add_fact("path", vec![1, 2]).unwrap();
        engine.add_fact("path", vec![2, 3]).unwrap();
        engine.add_fact("path", vec![1, 3]).unwrap();
        engine.execute_main().unwrap();

        let mut explainer = Explainer::new(&engine).unwrap();
        assert!(explainer.with_heights());
        explainer.set_depth_limit(3);

        let tree = explainer
            .explain("path", &["1".to_owned(), "3".to_owned()])
            .unwrap();
        assert!(tree.height() <= 4);

        let json = tree.json(explainer.with_heights());
        assert!(json.get("height").is_some());
    }
}
