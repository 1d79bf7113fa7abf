//! Query selectors for table reads (spec §4.E).

use crate::Revision;

/// How a read operation selects rows.
pub enum Query<'a> {
    /// Look up `key` in the named index (unique exact match, or a
    /// prefix scan over a non-unique index's composite encoding).
    Index { name: &'a str, key: &'a [u8] },
    /// Scan the revision tree from `rev` (big-endian encoded) onward.
    ByRevision(Revision),
}

impl<'a> Query<'a> {
    pub fn by_index(name: &'a str, key: &'a [u8]) -> Self {
        Query::Index { name, key }
    }

    pub fn by_revision(rev: Revision) -> Self {
        Query::ByRevision(rev)
    }
}
