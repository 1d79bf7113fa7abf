//! JSON snapshot dump.
//!
//! A thin `serde_json` wrapper that maps encode/decode failures into
//! the crate's own `Error`, rather than leaking `serde_json::Error`
//! directly.

use std::io::Write;

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map as JsonMap, Serializer as JsonSerializer, Value as JsonValue};

use crate::error::{CResult, Error};
use crate::table::query::Query;
use crate::table::Table;
use crate::txn::{ReadTxn, Readable};
use crate::Revision;

/// One dumped row: the object plus the revision it was written at.
#[derive(Serialize)]
struct Row<'a, T: Serialize> {
    object: &'a T,
    revision: Revision,
}

/// Dumps every live object in `table`, ordered by revision, as a JSON
/// array to `out`. `txn` may be a [`crate::txn::ReadTxn`] or an
/// in-progress [`crate::txn::WriteTxn`], matching every other table
/// read.
pub fn dump_table_json<T: Serialize + Send + Sync + 'static, R: Readable>(
    table: &Table<T>,
    txn: &R,
    out: impl Write,
) -> CResult<()> {
    let (rows, _watch) = table.get(txn, Query::by_revision(0))?;
    let mut formatter = PrettyFormatter::new();
    let mut ser = JsonSerializer::with_formatter(out, &mut formatter);
    let owned: Vec<Row<'_, T>> = rows.iter().map(|(obj, rev)| Row { object: obj.as_ref(), revision: *rev }).collect();
    owned.serialize(&mut ser).map_err(|e| Error::Encoding(format!("json dump: {e}")))
}

/// A table that knows how to serialize itself into the multi-table
/// snapshot (spec §4.H: "object keyed by table name, value = array of
/// stored objects in revision order"). Implemented for every
/// [`Table<T>`] whose `T` is itself `Serialize`; tables of
/// non-serializable types simply aren't passed to
/// [`dump_database_json`].
pub trait JsonDumpable: Send + Sync {
    fn table_name(&self) -> &str;
    fn dump_json_rows(&self, txn: &ReadTxn) -> CResult<JsonValue>;
}

impl<T: Serialize + Send + Sync + 'static> JsonDumpable for Table<T> {
    fn table_name(&self) -> &str {
        self.name()
    }

    fn dump_json_rows(&self, txn: &ReadTxn) -> CResult<JsonValue> {
        let (rows, _watch) = self.get(txn, Query::by_revision(0))?;
        let owned: Vec<Row<'_, T>> = rows.iter().map(|(obj, rev)| Row { object: obj.as_ref(), revision: *rev }).collect();
        serde_json::to_value(&owned).map_err(|e| Error::Encoding(format!("json dump: {e}")))
    }
}

/// Dumps `tables` (all, or a caller-selected subset) as a single JSON
/// object keyed by table name, each value the table's live objects in
/// revision order (spec §4.H). `txn` fixes every table to the same
/// consistent read snapshot.
pub fn dump_database_json(txn: &ReadTxn, tables: &[&dyn JsonDumpable], out: impl Write) -> CResult<()> {
    let mut map = JsonMap::with_capacity(tables.len());
    for table in tables {
        map.insert(table.table_name().to_string(), table.dump_json_rows(txn)?);
    }
    let mut formatter = PrettyFormatter::new();
    let mut ser = JsonSerializer::with_formatter(out, &mut formatter);
    JsonValue::Object(map).serialize(&mut ser).map_err(|e| Error::Encoding(format!("json dump: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::index::IndexSchema;
    use crate::table::schema::TableSchema;
    use serde::Serialize;

    #[derive(Clone, Debug, Serialize)]
    struct Item {
        id: u32,
    }

    #[tokio::test]
    async fn dumps_live_objects_in_revision_order() {
        let db = Database::new(Default::default());
        let items = db
            .register_table("items", TableSchema::new(IndexSchema::unique("id", |i: &Item| i.id.to_be_bytes().to_vec())).unwrap())
            .unwrap();
        let mut txn = db.write_txn(&[&items]).await.unwrap();
        items.insert(&mut txn, Item { id: 2 }).unwrap();
        items.insert(&mut txn, Item { id: 1 }).unwrap();
        txn.commit().unwrap();

        let read = db.read_txn();
        let mut buf = Vec::new();
        dump_table_json(&items, &read, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let first = text.find("\"id\": 2").unwrap();
        let second = text.find("\"id\": 1").unwrap();
        assert!(first < second, "expected id=2 (written first) before id=1 in revision order");
    }

    #[derive(Clone, Debug, Serialize)]
    struct Tag {
        label: String,
    }

    #[tokio::test]
    async fn dumps_multiple_tables_as_one_object_keyed_by_name() {
        let db = Database::new(Default::default());
        let items = db
            .register_table("items", TableSchema::new(IndexSchema::unique("id", |i: &Item| i.id.to_be_bytes().to_vec())).unwrap())
            .unwrap();
        let tags = db
            .register_table("tags", TableSchema::new(IndexSchema::unique("label", |t: &Tag| t.label.as_bytes().to_vec())).unwrap())
            .unwrap();
        let mut txn = db.write_txn(&[&items, &tags]).await.unwrap();
        items.insert(&mut txn, Item { id: 1 }).unwrap();
        tags.insert(&mut txn, Tag { label: "x".into() }).unwrap();
        txn.commit().unwrap();

        let read = db.read_txn();
        let mut buf = Vec::new();
        let dumpables: Vec<&dyn JsonDumpable> = vec![&items, &tags];
        dump_database_json(&read, &dumpables, &mut buf).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert!(parsed.get("items").is_some());
        assert!(parsed.get("tags").is_some());
        assert_eq!(parsed["items"][0]["object"]["id"], 1);
        assert_eq!(parsed["tags"][0]["object"]["label"], "x");
    }
}
