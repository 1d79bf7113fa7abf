//! Table schema building (spec §3, invariant "first index is primary").

use crate::error::{CResult, Error};
use crate::index::IndexSchema;

/// A table's index set. The index passed to [`TableSchema::new`] is the
/// primary index (must be unique); indexes added afterward via
/// [`TableSchema::with_index`] are secondary and may be unique or not.
pub struct TableSchema<T> {
    indexes: Vec<IndexSchema<T>>,
}

impl<T> TableSchema<T> {
    /// Starts a schema with `primary` as the first (primary) index.
    pub fn new(primary: IndexSchema<T>) -> CResult<Self> {
        if !primary.is_unique() {
            return Err(Error::Internal(format!(
                "primary index {:?} must be unique",
                primary.name()
            )));
        }
        Ok(Self { indexes: vec![primary] })
    }

    /// Declares a secondary index. Fails if its name collides with an
    /// index already declared on this table.
    pub fn with_index(mut self, index: IndexSchema<T>) -> CResult<Self> {
        if self.indexes.iter().any(|i| i.name() == index.name()) {
            return Err(Error::DuplicateIndexName(index.name().to_string()));
        }
        self.indexes.push(index);
        Ok(self)
    }

    pub fn primary(&self) -> &IndexSchema<T> {
        &self.indexes[0]
    }

    pub fn secondary_indexes(&self) -> impl Iterator<Item = &IndexSchema<T>> {
        self.indexes[1..].iter()
    }

    pub fn all_indexes(&self) -> impl Iterator<Item = &IndexSchema<T>> {
        self.indexes.iter()
    }

    pub fn index_named(&self, name: &str) -> Option<&IndexSchema<T>> {
        self.indexes.iter().find(|i| i.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_must_be_unique() {
        let idx: IndexSchema<u32> = IndexSchema::multi("bad_primary", |_| vec![]);
        assert!(TableSchema::new(idx).is_err());
    }

    #[test]
    fn duplicate_index_name_is_rejected() {
        let primary: IndexSchema<u32> = IndexSchema::unique("id", |n| n.to_be_bytes().to_vec());
        let schema = TableSchema::new(primary).unwrap();
        let dup: IndexSchema<u32> = IndexSchema::unique("id", |n| n.to_be_bytes().to_vec());
        assert!(matches!(schema.with_index(dup), Err(Error::DuplicateIndexName(_))));
    }

    #[test]
    fn secondary_indexes_excludes_primary() {
        let primary: IndexSchema<u32> = IndexSchema::unique("id", |n| n.to_be_bytes().to_vec());
        let by_parity: IndexSchema<u32> = IndexSchema::multi("parity", |n| vec![vec![(*n % 2) as u8]]);
        let schema = TableSchema::new(primary).unwrap().with_index(by_parity).unwrap();
        let names: Vec<_> = schema.secondary_indexes().map(|i| i.name().to_string()).collect();
        assert_eq!(names, vec!["parity"]);
    }
}
