//! `PartitionEngine`: the db → schema → table → set-of-records nest a
//! `StoragePeer` applies requests against.

use std::collections::HashMap;

use crate::ordermap::OrderedMap;
use crate::record::Record;

type Table = OrderedMap<Record, ()>;

/// Default B+ tree parameters for every table's backing `OrderedMap`. The
/// source has no analogous tunable; these are chosen generously enough that
/// realistic record counts stay well below the point splits start mattering
/// for correctness testing.
const TABLE_DEGREE: usize = 32;
const TABLE_LEAF_CAPACITY: usize = 32;

fn new_table() -> Table {
    OrderedMap::new(TABLE_DEGREE, TABLE_LEAF_CAPACITY)
        .expect("fixed table parameters are always valid")
}

/// A peer's partition: every record it currently owns, organized by
/// namespace path. Namespace levels are created lazily on first `ADD` and
/// removed only by an explicit `DELETE_*`.
#[derive(Default)]
pub struct PartitionEngine {
    databases: HashMap<String, HashMap<String, HashMap<String, Table>>>,
}

impl PartitionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn table_mut(&mut self, db: &str, schema: &str, table: &str) -> &mut Table {
        self.databases
            .entry(db.to_owned())
            .or_default()
            .entry(schema.to_owned())
            .or_default()
            .entry(table.to_owned())
            .or_insert_with(new_table)
    }

    fn table(&self, db: &str, schema: &str, table: &str) -> Option<&Table> {
        self.databases.get(db)?.get(schema)?.get(table)
    }

    /// Insert `record`. `false` (no mutation) if an entry with the same key
    /// is already present.
    pub fn add(&mut self, db: &str, schema: &str, table: &str, record: Record) -> bool {
        self.table_mut(db, schema, table).add(record, ())
    }

    pub fn contains(&self, db: &str, schema: &str, table: &str, record: &Record) -> bool {
        self.table(db, schema, table)
            .map(|t| t.contains(record))
            .unwrap_or(false)
    }

    /// `false` if the namespace path or the record itself is absent.
    pub fn remove(&mut self, db: &str, schema: &str, table: &str, record: &Record) -> bool {
        match self.databases.get_mut(db).and_then(|s| s.get_mut(schema)).and_then(|t| t.get_mut(table)) {
            Some(t) => t.remove(record),
            None => false,
        }
    }

    /// Look up the full stored record (payload included) for a search-key
    /// probe, if present.
    pub fn get_key(&self, db: &str, schema: &str, table: &str, record: &Record) -> Option<&Record> {
        self.table(db, schema, table)
            .and_then(|t| t.get_entry(record))
            .map(|(k, _)| k)
    }

    /// `false` if `db` does not exist.
    pub fn delete_database(&mut self, db: &str) -> bool {
        self.databases.remove(db).is_some()
    }

    /// `false` if `db`/`schema` does not exist.
    pub fn delete_schema(&mut self, db: &str, schema: &str) -> bool {
        match self.databases.get_mut(db) {
            Some(schemas) => schemas.remove(schema).is_some(),
            None => false,
        }
    }

    /// `false` if `db`/`schema`/`table` does not exist.
    pub fn delete_table(&mut self, db: &str, schema: &str, table: &str) -> bool {
        match self.databases.get_mut(db).and_then(|s| s.get_mut(schema)) {
            Some(tables) => tables.remove(table).is_some(),
            None => false,
        }
    }

    /// Depth-first traversal over every record, yielding its full namespace
    /// path alongside it. Used by the resharding pass.
    pub fn iter_all(&self) -> impl Iterator<Item = (&str, &str, &str, &Record)> {
        self.databases.iter().flat_map(|(db, schemas)| {
            schemas.iter().flat_map(move |(schema, tables)| {
                tables.iter().flat_map(move |(table, records)| {
                    records
                        .keys()
                        .map(move |rec| (db.as_str(), schema.as_str(), table.as_str(), rec))
                })
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(candidate_id: i32, contest_id: i32) -> Record {
        Record {
            candidate_id,
            last_name: "Smith".into(),
            first_name: "Jo".into(),
            patronymic: String::new(),
            birth_date: "2000-01-01".into(),
            resume_link: String::new(),
            hr_manager_id: 1,
            contest_id,
            programming_language: "Rust".into(),
            num_tasks: 5,
            solved_tasks: 5,
            cheating_detected: false,
        }
    }

    #[test]
    fn add_creates_levels_lazily() {
        let mut engine = PartitionEngine::new();
        assert!(engine.add("db", "sch", "tbl", rec(1, 1)));
        assert!(engine.contains("db", "sch", "tbl", &rec(1, 1)));
        assert!(!engine.add("db", "sch", "tbl", rec(1, 1)));
    }

    #[test]
    fn missing_levels_report_absence_not_error() {
        let engine = PartitionEngine::new();
        assert!(!engine.contains("nope", "nope", "nope", &rec(1, 1)));
        assert!(engine.get_key("nope", "nope", "nope", &rec(1, 1)).is_none());
    }

    #[test]
    fn delete_table_removes_only_that_table() {
        let mut engine = PartitionEngine::new();
        engine.add("db", "sch", "a", rec(1, 1));
        engine.add("db", "sch", "b", rec(2, 2));
        assert!(engine.delete_table("db", "sch", "a"));
        assert!(!engine.contains("db", "sch", "a", &rec(1, 1)));
        assert!(engine.contains("db", "sch", "b", &rec(2, 2)));
        assert!(!engine.delete_table("db", "sch", "a"));
    }

    #[test]
    fn delete_database_cascades() {
        let mut engine = PartitionEngine::new();
        engine.add("db", "sch", "tbl", rec(1, 1));
        assert!(engine.delete_database("db"));
        assert!(!engine.contains("db", "sch", "tbl", &rec(1, 1)));
    }

    #[test]
    fn get_key_returns_full_payload() {
        let mut engine = PartitionEngine::new();
        engine.add("db", "sch", "tbl", rec(1, 1));
        let found = engine.get_key("db", "sch", "tbl", &Record::search_key(1, 1)).unwrap();
        assert_eq!(found.last_name, "Smith");
    }

    #[test]
    fn iter_all_visits_every_record_once() {
        let mut engine = PartitionEngine::new();
        engine.add("db1", "s", "t", rec(1, 1));
        engine.add("db1", "s", "t", rec(2, 1));
        engine.add("db2", "s", "t", rec(3, 1));
        let count = engine.iter_all().count();
        assert_eq!(count, 3);
    }
}
