//! Index declarations (spec §3/§4.C).
//!
//! An index is a name, a uniqueness flag, and an extractor from an
//! object to zero or more byte-string keys. A table's first declared
//! index is always its primary index and must be unique; this is
//! enforced by `TableSchema::build`, not by this module.

use std::sync::Arc;

type Extractor<T> = Arc<dyn Fn(&T) -> Vec<Vec<u8>> + Send + Sync>;

/// One index over a table of `T`. Construct with [`IndexSchema::unique`]
/// or [`IndexSchema::multi`]; the extractor returns the raw key bytes an
/// object should be found under (already encoded, e.g. via [`crate::key`]
/// helpers for integer fields).
#[derive(Clone)]
pub struct IndexSchema<T> {
    name: String,
    unique: bool,
    extract: Extractor<T>,
}

impl<T> IndexSchema<T> {
    /// A unique index: `extract` must return exactly one key per object,
    /// and no two live objects may share a key.
    pub fn unique(name: impl Into<String>, extract: impl Fn(&T) -> Vec<u8> + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            unique: true,
            extract: Arc::new(move |obj| vec![extract(obj)]),
        }
    }

    /// A non-unique index: `extract` may return any number of keys
    /// (including zero) per object.
    pub fn multi(
        name: impl Into<String>,
        extract: impl Fn(&T) -> Vec<Vec<u8>> + Send + Sync + 'static,
    ) -> Self {
        Self { name: name.into(), unique: false, extract: Arc::new(extract) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn keys_for(&self, obj: &T) -> Vec<Vec<u8>> {
        (self.extract)(obj)
    }
}

impl<T> std::fmt::Debug for IndexSchema<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSchema")
            .field("name", &self.name)
            .field("unique", &self.unique)
            .finish_non_exhaustive()
    }
}
