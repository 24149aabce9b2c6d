//! This module defines [Relation], an indexed in-memory table of tuples.

use std::collections::{BTreeMap, BTreeSet};

use hashbrown::HashMap;

use crate::datatypes::domain::{DomainValue, Tuple};

use super::signature::SearchSignature;

/// A query pattern over the attributes of a relation: `Some(value)` binds an
/// attribute to a known value, `None` leaves it unconstrained.
pub type Pattern<'a> = &'a [Option<DomainValue>];

/// A named, fixed-arity set of tuples with optional secondary indexes.
///
/// The primary storage keeps tuples in lexicographic order. Each secondary
/// index is keyed by a [SearchSignature] and maps the values at the bound
/// attribute positions to the tuples carrying them. Insertion is idempotent;
/// relations are sets.
#[derive(Debug, Clone)]
pub struct Relation {
    name: String,
    arity: usize,
    primary: BTreeSet<Tuple>,
    indexes: HashMap<SearchSignature, BTreeMap<Tuple, Vec<Tuple>>>,
}

impl Relation {
    /// Create an empty relation.
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
            primary: BTreeSet::new(),
            indexes: HashMap::new(),
        }
    }

    /// Name of the relation.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of attributes of every tuple in the relation.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Number of tuples.
    pub fn len(&self) -> usize {
        self.primary.len()
    }

    /// Whether the relation holds no tuple.
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    /// Insert `tuple`, returning whether it was new. Re-inserting an
    /// existing tuple leaves the relation unchanged.
    pub fn insert(&mut self, tuple: Tuple) -> bool {
        debug_assert_eq!(tuple.len(), self.arity, "tuple arity mismatch");

        if !self.primary.insert(tuple.clone()) {
            return false;
        }

        for (signature, index) in &mut self.indexes {
            let key = Self::index_key(signature, &tuple);
            index.entry(key).or_default().push(tuple.clone());
        }

        true
    }

    /// Whether `tuple` is present.
    pub fn contains(&self, tuple: &[DomainValue]) -> bool {
        self.primary.contains(tuple)
    }

    /// Iterate all tuples in lexicographic order.
    pub fn tuples(&self) -> impl Iterator<Item = &Tuple> {
        self.primary.iter()
    }

    /// Build the secondary index for `signature` if it does not exist yet.
    pub fn ensure_index(&mut self, signature: SearchSignature) {
        if signature.is_empty() || self.indexes.contains_key(&signature) {
            return;
        }

        log::debug!(
            "building index {signature} for relation {} ({} tuples)",
            self.name,
            self.primary.len()
        );

        let mut index: BTreeMap<Tuple, Vec<Tuple>> = BTreeMap::new();
        for tuple in &self.primary {
            let key = Self::index_key(&signature, tuple);
            index.entry(key).or_default().push(tuple.clone());
        }
        self.indexes.insert(signature, index);
    }

    /// Return a snapshot of all tuples matching `pattern`.
    ///
    /// Resolution goes through the narrowest usable index: among the
    /// existing indexes whose signature binds a subset of the pattern's
    /// bound positions, the one binding the most. Attributes the chosen
    /// index does not cover are checked by a residual filter; without any
    /// usable index the primary storage is scanned. The choice of index is
    /// invisible in the result.
    pub fn matching(&self, pattern: Pattern) -> Vec<Tuple> {
        debug_assert_eq!(pattern.len(), self.arity, "pattern arity mismatch");

        let bound = SearchSignature::from_positions(
            pattern
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.is_some())
                .map(|(position, _)| position),
        );

        if bound.is_empty() {
            return self.primary.iter().cloned().collect();
        }

        let best = self
            .indexes
            .keys()
            .filter(|signature| signature.is_subset_of(&bound))
            .max_by_key(|signature| signature.bound_count())
            .copied();

        match best {
            Some(signature) => {
                let key: Tuple = signature
                    .positions()
                    .map(|position| pattern[position].expect("position is bound"))
                    .collect();
                self.indexes[&signature]
                    .get(&key)
                    .into_iter()
                    .flatten()
                    .filter(|tuple| Self::residual_matches(pattern, tuple, &signature))
                    .cloned()
                    .collect()
            }
            None => self
                .primary
                .iter()
                .filter(|tuple| Self::matches(pattern, tuple))
                .cloned()
                .collect(),
        }
    }

    /// Remove all tuples, keeping the indexes registered for this relation.
    pub fn purge(&mut self) {
        self.primary.clear();
        for index in self.indexes.values_mut() {
            index.clear();
        }
    }

    /// Insert every tuple of `source` into this relation.
    pub fn merge_from(&mut self, source: &Relation) -> usize {
        debug_assert_eq!(source.arity, self.arity, "merging relations of different arity");

        let mut inserted = 0;
        for tuple in &source.primary {
            if self.insert(tuple.clone()) {
                inserted += 1;
            }
        }
        inserted
    }

    /// Exchange the contents of two relations of equal arity; names stay put.
    pub fn swap_contents(&mut self, other: &mut Relation) {
        debug_assert_eq!(self.arity, other.arity, "swapping relations of different arity");
        std::mem::swap(&mut self.primary, &mut other.primary);
        std::mem::swap(&mut self.indexes, &mut other.indexes);
    }

    fn index_key(signature: &SearchSignature, tuple: &[DomainValue]) -> Tuple {
        signature.positions().map(|position| tuple[position]).collect()
    }

    fn matches(pattern: Pattern, tuple: &[DomainValue]) -> bool {
        pattern
            .iter()
            .zip(tuple)
            .all(|(slot, value)| slot.is_none_or(|bound| bound == *value))
    }

    fn residual_matches(pattern: Pattern, tuple: &[DomainValue], covered: &SearchSignature) -> bool {
        pattern.iter().zip(tuple).enumerate().all(|(position, (slot, value))| {
            covered.is_bound(position) || slot.is_none_or(|bound| bound == *value)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn edge() -> Relation {
        let mut relation = Relation::new("edge", 2);
        relation.insert(vec![1, 2]);
        relation.insert(vec![1, 3]);
        relation.insert(vec![2, 3]);
        relation
    }

    #[test]
    fn insertion_is_idempotent() {
        let mut relation = edge();
        assert_eq!(relation.len(), 3);
        assert!(!relation.insert(vec![1, 2]));
        assert_eq!(relation.len(), 3);
    }

    #[test_log::test]
    fn index_and_scan_agree() {
        let mut indexed = edge();
        indexed.ensure_index(SearchSignature::from_positions([0]));

        let plain = edge();
        let pattern = [Some(1), None];

        let mut via_index = indexed.matching(&pattern);
        via_index.sort();
        let mut via_scan: Vec<_> = plain
            .tuples()
            .filter(|tuple| tuple[0] == 1)
            .cloned()
            .collect();
        via_scan.sort();

        assert_eq!(via_index, vec![vec![1, 2], vec![1, 3]]);
        assert_eq!(via_index, via_scan);
    }

    #[test]
    fn narrower_index_with_residual_filter() {
        let mut relation = edge();
        relation.ensure_index(SearchSignature::from_positions([0]));

        // Only attribute 0 is indexed; attribute 1 is checked residually.
        assert_eq!(relation.matching(&[Some(1), Some(3)]), vec![vec![1, 3]]);
        assert!(relation.matching(&[Some(1), Some(9)]).is_empty());
    }

    #[test]
    fn index_tracks_later_insertions() {
        let mut relation = edge();
        relation.ensure_index(SearchSignature::from_positions([1]));
        relation.insert(vec![4, 3]);

        let mut matched = relation.matching(&[None, Some(3)]);
        matched.sort();
        assert_eq!(matched, vec![vec![1, 3], vec![2, 3], vec![4, 3]]);
    }

    #[test]
    fn purge_merge_swap() {
        let mut full = edge();
        let mut empty = Relation::new("scratch", 2);

        assert_eq!(empty.merge_from(&full), 3);
        assert_eq!(empty.merge_from(&full), 0);

        full.purge();
        assert!(full.is_empty());

        full.swap_contents(&mut empty);
        assert_eq!(full.len(), 3);
        assert!(empty.is_empty());
        assert_eq!(full.name(), "edge");
    }
}
