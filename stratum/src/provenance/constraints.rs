//! Consistency checks over candidate body bindings.
//!
//! A candidate justification is a product of tuples, one per atom of a rule
//! (the head at position zero). [Equivalence] verifies that repeated
//! occurrences of a variable carry the same value across the product;
//! [ConstConstraint] pins positions to literal constants. The same checks
//! back the demand-driven (magic-set style) rewriting in the front end,
//! which shares these utilities.

use stratum_physical::datatypes::domain::{DomainValue, Tuple};

/// Position of a value within a candidate product: atom index, then
/// argument index within that atom.
pub type ProductIndex = (usize, usize);

/// Equivalence class of all occurrences of one variable within a rule.
#[derive(Debug, Clone)]
pub struct Equivalence {
    symbol: String,
    indices: Vec<ProductIndex>,
}

impl Equivalence {
    /// Create a class for `symbol` with its first occurrence.
    pub fn new(symbol: impl Into<String>, first: ProductIndex) -> Self {
        Self {
            symbol: symbol.into(),
            indices: vec![first],
        }
    }

    /// Record another occurrence of the variable.
    pub fn push(&mut self, index: ProductIndex) {
        self.indices.push(index);
    }

    /// The first occurrence of the variable.
    pub fn first(&self) -> ProductIndex {
        self.indices[0]
    }

    /// The variable name.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Whether all occurrences carry equal values in `product`.
    pub fn verify(&self, product: &[Tuple]) -> bool {
        self.indices.windows(2).all(|pair| {
            let (first_atom, first_argument) = pair[0];
            let (second_atom, second_argument) = pair[1];
            product[first_atom][first_argument] == product[second_atom][second_argument]
        })
    }

    /// The value bound to the variable in `product`.
    pub fn value(&self, product: &[Tuple]) -> DomainValue {
        let (atom, argument) = self.first();
        product[atom][argument]
    }
}

/// Constant constraints over a candidate product.
#[derive(Debug, Clone, Default)]
pub struct ConstConstraint {
    constraints: Vec<(ProductIndex, DomainValue)>,
}

impl ConstConstraint {
    /// Create an empty constraint set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin a position to a value.
    pub fn push(&mut self, index: ProductIndex, value: DomainValue) {
        self.constraints.push((index, value));
    }

    /// Whether `product` satisfies every pinned position.
    pub fn verify(&self, product: &[Tuple]) -> bool {
        self.constraints
            .iter()
            .all(|&((atom, argument), value)| product[atom][argument] == value)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn equivalence_verifies_consistent_products() {
        let mut class = Equivalence::new("X", (0, 0));
        class.push((1, 1));
        class.push((2, 0));

        let consistent = vec![vec![7, 0], vec![0, 7], vec![7, 9]];
        assert!(class.verify(&consistent));
        assert_eq!(class.value(&consistent), 7);

        let inconsistent = vec![vec![7, 0], vec![0, 8], vec![7, 9]];
        assert!(!class.verify(&inconsistent));
    }

    #[test]
    fn constants_pin_positions() {
        let mut constraint = ConstConstraint::new();
        constraint.push((0, 1), 5);

        assert!(constraint.verify(&[vec![0, 5]]));
        assert!(!constraint.verify(&[vec![0, 6]]));
    }
}
