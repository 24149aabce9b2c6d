//! This module defines [RelationStore], the shared collection of relations
//! a program executes against.

use std::sync::{Arc, RwLock};

use hashbrown::HashMap;

use stratum_physical::{
    datatypes::domain::{DomainValue, Tuple},
    tabular::{relation::Pattern, Relation, SearchSignature},
};

use crate::{error::Error, ram::relation::RelationDecl};

/// Maps relation names to shared, lock-protected relations.
///
/// Scans snapshot the relevant tuples under a read lock and release it
/// before the nested operations run, so concurrent insertion during a
/// parallel region never invalidates an in-flight iteration. Inserts take
/// the write lock and are idempotent.
#[derive(Debug, Default)]
pub struct RelationStore {
    relations: HashMap<String, Arc<RwLock<Relation>>>,
}

impl RelationStore {
    /// Create one empty relation per declaration.
    pub fn from_declarations(declarations: &[RelationDecl]) -> Self {
        let mut relations = HashMap::new();
        for declaration in declarations {
            relations.insert(
                declaration.name().to_owned(),
                Arc::new(RwLock::new(Relation::new(
                    declaration.name(),
                    declaration.arity(),
                ))),
            );
        }
        Self { relations }
    }

    fn relation(&self, name: &str) -> Result<&Arc<RwLock<Relation>>, Error> {
        self.relations
            .get(name)
            .ok_or_else(|| Error::UnknownRelation(name.to_owned()))
    }

    /// Snapshot of all tuples of a relation, in lexicographic order.
    pub fn snapshot(&self, name: &str) -> Result<Vec<Tuple>, Error> {
        let relation = self.relation(name)?.read().expect("relation lock poisoned");
        Ok(relation.tuples().cloned().collect())
    }

    /// Snapshot of the tuples of a relation matching `pattern`.
    pub fn matching(&self, name: &str, pattern: Pattern) -> Result<Vec<Tuple>, Error> {
        let relation = self.relation(name)?.read().expect("relation lock poisoned");
        Ok(relation.matching(pattern))
    }

    /// Insert a tuple, returning whether it was new.
    pub fn insert(&self, name: &str, tuple: Tuple) -> Result<bool, Error> {
        let mut relation = self.relation(name)?.write().expect("relation lock poisoned");
        Ok(relation.insert(tuple))
    }

    /// Whether the relation contains `tuple`.
    pub fn contains(&self, name: &str, tuple: &[DomainValue]) -> Result<bool, Error> {
        let relation = self.relation(name)?.read().expect("relation lock poisoned");
        Ok(relation.contains(tuple))
    }

    /// Whether the relation holds no tuple.
    pub fn is_empty(&self, name: &str) -> Result<bool, Error> {
        let relation = self.relation(name)?.read().expect("relation lock poisoned");
        Ok(relation.is_empty())
    }

    /// Number of tuples in the relation.
    pub fn len(&self, name: &str) -> Result<usize, Error> {
        let relation = self.relation(name)?.read().expect("relation lock poisoned");
        Ok(relation.len())
    }

    /// Remove all tuples of the relation.
    pub fn clear(&self, name: &str) -> Result<(), Error> {
        let mut relation = self.relation(name)?.write().expect("relation lock poisoned");
        relation.purge();
        Ok(())
    }

    /// Insert every tuple of `source` into `target`.
    pub fn merge(&self, source: &str, target: &str) -> Result<(), Error> {
        if source == target {
            return Ok(());
        }
        // Snapshot the source first so only one lock is held at a time.
        let tuples = self.snapshot(source)?;
        let mut relation = self
            .relation(target)?
            .write()
            .expect("relation lock poisoned");
        for tuple in tuples {
            relation.insert(tuple);
        }
        Ok(())
    }

    /// Exchange the contents of two relations of equal arity.
    pub fn swap(&self, first: &str, second: &str) -> Result<(), Error> {
        if first == second {
            return Ok(());
        }
        // Locks ordered by name so concurrent swaps cannot deadlock.
        let (outer, inner) = if first < second {
            (self.relation(first)?, self.relation(second)?)
        } else {
            (self.relation(second)?, self.relation(first)?)
        };
        let mut outer = outer.write().expect("relation lock poisoned");
        let mut inner = inner.write().expect("relation lock poisoned");
        outer.swap_contents(&mut inner);
        Ok(())
    }

    /// Materialize an index for the given signature on the relation.
    pub fn ensure_index(&self, name: &str, signature: SearchSignature) -> Result<(), Error> {
        let mut relation = self.relation(name)?.write().expect("relation lock poisoned");
        relation.ensure_index(signature);
        Ok(())
    }

    /// Iterate the names of all relations.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }
}
