//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use keelstore::{BufferManager, RecordId, RelationFile};
use tempfile::{tempdir, TempDir};

/// Route `log` output through the test harness. Safe to call repeatedly.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Build a relation whose records start with each key as a little-endian
/// `i32`, followed by `padding` filler bytes. Returns the record ids in
/// insertion order.
pub fn create_relation(keys: &[i32], padding: usize) -> (TempDir, PathBuf, Vec<RecordId>) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("relation");
    let relation = RelationFile::create(&path).unwrap();
    let bm = BufferManager::new(8);

    let rids = keys
        .iter()
        .map(|key| {
            let mut record = key.to_le_bytes().to_vec();
            record.resize(4 + padding, b'x');
            relation.insert_record(&bm, &record).unwrap()
        })
        .collect();
    bm.flush_file(relation.paged_file()).unwrap();

    (dir, path, rids)
}
