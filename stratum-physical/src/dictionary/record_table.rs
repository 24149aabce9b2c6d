//! This module defines [RecordTable], a bijective mapping from fixed-arity
//! tuples ("records") to domain-value handles.

use std::sync::RwLock;

use hashbrown::HashMap;

use crate::{
    datatypes::domain::{DomainValue, Tuple},
    error::Error,
};

#[derive(Debug, Default)]
struct RecordTableInner {
    /// Packed records, indexed by handle.
    records: Vec<Tuple>,
    /// Reverse mapping from record to handle.
    handles: HashMap<Tuple, DomainValue>,
}

/// A bijective mapping from fixed-arity tuples to record handles.
///
/// Packing the same record twice yields the same handle; unpacking requires
/// the arity the record was packed with. Handle 0 is reserved for the empty
/// record so that it can serve as a nil marker.
#[derive(Debug)]
pub struct RecordTable {
    inner: RwLock<RecordTableInner>,
}

impl Default for RecordTable {
    fn default() -> Self {
        let mut inner = RecordTableInner::default();
        inner.records.push(Tuple::new());
        inner.handles.insert(Tuple::new(), 0);
        Self {
            inner: RwLock::new(inner),
        }
    }
}

impl RecordTable {
    /// Create a [RecordTable] containing only the empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `record`, returning its handle.
    pub fn pack(&self, record: &[DomainValue]) -> DomainValue {
        {
            let inner = self.inner.read().expect("record table lock poisoned");
            if let Some(&handle) = inner.handles.get(record) {
                return handle;
            }
        }

        let mut inner = self.inner.write().expect("record table lock poisoned");
        if let Some(&handle) = inner.handles.get(record) {
            return handle;
        }

        let handle = inner.records.len() as DomainValue;
        inner.records.push(record.to_vec());
        inner.handles.insert(record.to_vec(), handle);
        handle
    }

    /// Resolve `handle` back into the record it was packed from, checking
    /// that the record has the expected `arity`.
    pub fn unpack(&self, handle: DomainValue, arity: usize) -> Result<Tuple, Error> {
        let inner = self.inner.read().expect("record table lock poisoned");
        let record = usize::try_from(handle)
            .ok()
            .and_then(|index| inner.records.get(index))
            .ok_or(Error::UnresolvedRecord(handle))?;

        if record.len() != arity {
            return Err(Error::RecordArityMismatch {
                expected: arity,
                found: record.len(),
            });
        }

        Ok(record.clone())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pack_unpack_roundtrip() {
        let table = RecordTable::new();
        let handle = table.pack(&[1, 2, 3]);

        assert_eq!(table.pack(&[1, 2, 3]), handle);
        assert_eq!(table.unpack(handle, 3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn nil_is_handle_zero() {
        let table = RecordTable::new();
        assert_eq!(table.pack(&[]), 0);
    }

    #[test]
    fn arity_is_checked() {
        let table = RecordTable::new();
        let handle = table.pack(&[7, 8]);

        assert!(matches!(
            table.unpack(handle, 3),
            Err(Error::RecordArityMismatch {
                expected: 3,
                found: 2
            })
        ));
        assert!(table.unpack(999, 2).is_err());
    }
}
