//! B+Tree index tests.
//!
//! Bulk load, reopen, insertion with splits and range scans, plus property
//! tests for leaf ordering and scan results against a sorted model.

mod common;

use std::collections::BTreeSet;

use keelstore::{
    BTreeIndex, BufferManager, Datatype, Error, IndexConfig, Operator, PageId, RecordId,
};
use proptest::prelude::*;

fn small_config(leaf: usize, node: usize) -> IndexConfig {
    IndexConfig::default()
        .with_leaf_capacity(leaf)
        .unwrap()
        .with_node_capacity(node)
        .unwrap()
}

/// Drain an active scan.
fn scan_all(index: &mut BTreeIndex<'_>) -> Vec<RecordId> {
    let mut rids = Vec::new();
    loop {
        match index.scan_next() {
            Ok(rid) => rids.push(rid),
            Err(Error::IndexScanCompleted) => return rids,
            Err(e) => panic!("scan failed: {}", e),
        }
    }
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_bulk_load_and_scan_order() {
    common::init_logger();
    let keys: Vec<i32> = (0..5000).map(|i| (i * 7919) % 5000).collect();
    let (_dir, path, rids) = common::create_relation(&keys, 60);
    let bm = BufferManager::new(64);

    let mut index = BTreeIndex::open(&bm, &path, 0, Datatype::Integer).unwrap();
    assert_eq!(index.index_name(), "relation.0");
    assert!(index.height() >= 2);

    index.start_scan(0, Operator::Gte, 4999, Operator::Lte).unwrap();
    let scanned = scan_all(&mut index);
    index.end_scan().unwrap();

    let mut expected: Vec<(i32, RecordId)> = keys.iter().copied().zip(rids).collect();
    expected.sort();
    assert_eq!(scanned, expected.into_iter().map(|(_, rid)| rid).collect::<Vec<_>>());
}

#[test]
fn test_index_on_non_zero_offset() {
    common::init_logger();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pairs");
    let rids = {
        let bm = BufferManager::new(8);
        let relation = keelstore::RelationFile::create(&path).unwrap();
        let rids: Vec<_> = (0..50i32)
            .map(|i| {
                let mut record = (1000 - i).to_le_bytes().to_vec();
                record.extend_from_slice(&(i * 2).to_le_bytes());
                relation.insert_record(&bm, &record).unwrap()
            })
            .collect();
        bm.flush_file(relation.paged_file()).unwrap();
        rids
    };

    let bm = BufferManager::new(16);
    let mut index = BTreeIndex::open(&bm, &path, 4, Datatype::Integer).unwrap();
    assert_eq!(index.index_name(), "pairs.4");

    index.start_scan(10, Operator::Gt, 20, Operator::Lt).unwrap();
    // Keys 12, 14, 16, 18 belong to records 6..=9.
    assert_eq!(scan_all(&mut index), rids[6..10].to_vec());
}

#[test]
fn test_bulk_load_sees_unflushed_relation_pages() {
    common::init_logger();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh");
    let bm = BufferManager::new(16);

    let relation = keelstore::RelationFile::create(&path).unwrap();
    let rids: Vec<_> = (0..10i32)
        .map(|key| relation.insert_record(&bm, &key.to_le_bytes()).unwrap())
        .collect();
    assert!(bm.cached_page_count() > 0);

    let mut index = BTreeIndex::open(&bm, &path, 0, Datatype::Integer).unwrap();
    assert_eq!(index.leaf_keys().unwrap(), vec![(0..10).collect::<Vec<_>>()]);

    index.start_scan(0, Operator::Gte, 9, Operator::Lte).unwrap();
    assert_eq!(scan_all(&mut index), rids);
    index.end_scan().unwrap();
    bm.check_invariants().unwrap();
}

#[test]
fn test_reopen_keeps_tree() {
    common::init_logger();
    let keys: Vec<i32> = (0..300).collect();
    let (_dir, path, _) = common::create_relation(&keys, 0);

    let (root, height, leaves) = {
        let bm = BufferManager::new(32);
        let mut index =
            BTreeIndex::open_with_config(&bm, &path, 0, Datatype::Integer, small_config(8, 4))
                .unwrap();
        index
            .insert_entry(1000, RecordId::new(PageId::new(1), 0))
            .unwrap();
        let state = (index.root_page(), index.height(), index.leaf_keys().unwrap());
        index.close().unwrap();
        state
    };

    let bm = BufferManager::new(32);
    // Capacities come from the meta page, not from the config passed here.
    let index = BTreeIndex::open(&bm, &path, 0, Datatype::Integer).unwrap();
    assert_eq!(index.root_page(), root);
    assert_eq!(index.height(), height);
    assert_eq!(index.leaf_capacity(), 8);
    assert_eq!(index.node_capacity(), 4);
    assert_eq!(index.leaf_keys().unwrap(), leaves);
    assert_eq!(bm.stats().pages_written, 0);
}

#[test]
fn test_reopen_with_mismatched_type_fails() {
    let (_dir, path, _) = common::create_relation(&[1, 2, 3], 0);
    let bm = BufferManager::new(8);

    drop(BTreeIndex::open(&bm, &path, 0, Datatype::Integer).unwrap());

    // Overwrite the stored type tag with Double.
    let index_file = keelstore::PagedFile::open(path.with_file_name("relation.0")).unwrap();
    {
        let mut guard = bm.read_page(&index_file, PageId::new(1)).unwrap();
        guard.data_mut().as_mut_slice()[32] = Datatype::Double as u8;
    }
    bm.flush_file(&index_file).unwrap();

    assert!(matches!(
        BTreeIndex::open(&bm, &path, 0, Datatype::Integer),
        Err(Error::BadIndexInfo(_))
    ));
}

#[test]
fn test_missing_relation() {
    let dir = tempfile::tempdir().unwrap();
    let bm = BufferManager::new(8);

    assert!(matches!(
        BTreeIndex::open(&bm, dir.path().join("absent"), 0, Datatype::Integer),
        Err(Error::Io(_))
    ));
    assert!(!dir.path().join("absent.0").exists());
}

// ============================================================================
// Splits
// ============================================================================

#[test]
fn test_capacity_four_split_and_scan() {
    common::init_logger();
    let (_dir, path, rids) = common::create_relation(&[10, 20, 30, 40, 50], 0);
    let bm = BufferManager::new(10);

    let mut index =
        BTreeIndex::open_with_config(&bm, &path, 0, Datatype::Integer, small_config(4, 4))
            .unwrap();
    assert_eq!(index.height(), 2);
    assert_eq!(index.leaf_keys().unwrap(), vec![vec![10, 20, 30], vec![40, 50]]);

    index.start_scan(15, Operator::Gte, 45, Operator::Lte).unwrap();
    assert_eq!(index.scan_next().unwrap(), rids[1]);
    assert_eq!(index.scan_next().unwrap(), rids[2]);
    assert_eq!(index.scan_next().unwrap(), rids[3]);
    assert!(matches!(index.scan_next(), Err(Error::IndexScanCompleted)));
    index.end_scan().unwrap();
}

#[test]
fn test_bad_scan_range_before_any_io() {
    let (_dir, path, _) = common::create_relation(&[1, 2, 3], 0);
    let bm = BufferManager::new(10);
    let mut index = BTreeIndex::open(&bm, &path, 0, Datatype::Integer).unwrap();
    let before = bm.stats();

    assert!(matches!(
        index.start_scan(50, Operator::Gt, 10, Operator::Lt),
        Err(Error::BadScanRange { low: 50, high: 10 })
    ));
    assert_eq!(bm.stats(), before);
}

#[test]
fn test_root_growth_to_three_levels() {
    common::init_logger();
    let (_dir, path, _) = common::create_relation(&[], 0);
    let bm = BufferManager::new(32);
    let mut index =
        BTreeIndex::open_with_config(&bm, &path, 0, Datatype::Integer, small_config(3, 2))
            .unwrap();

    let mut heights = vec![index.height()];
    for key in 0..40 {
        index
            .insert_entry(key, RecordId::new(PageId::new(1), key as u16))
            .unwrap();
        if heights.last() != Some(&index.height()) {
            heights.push(index.height());
        }
    }

    // Height grows one level at a time.
    assert!(heights.windows(2).all(|w| w[1] == w[0] + 1));
    assert!(index.height() >= 3);

    let leaves = index.leaf_keys().unwrap();
    assert!(leaves.iter().all(|leaf| (1..=3).contains(&leaf.len())));
    assert_eq!(leaves.concat(), (0..40).collect::<Vec<_>>());
}

#[test]
fn test_scan_survives_small_buffer() {
    let keys: Vec<i32> = (0..400).rev().collect();
    let (_dir, path, _) = common::create_relation(&keys, 0);
    // Height is at most 4 here, so 8 frames always leave room.
    let bm = BufferManager::new(8);
    let mut index =
        BTreeIndex::open_with_config(&bm, &path, 0, Datatype::Integer, small_config(16, 8))
            .unwrap();

    index.start_scan(100, Operator::Gte, 299, Operator::Lte).unwrap();
    assert_eq!(scan_all(&mut index).len(), 200);
    index.end_scan().unwrap();
    assert!(bm.stats().evictions > 0);
    bm.check_invariants().unwrap();
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Leaves stay sorted, non-empty, within capacity, and hold every key
    /// exactly once.
    #[test]
    fn prop_leaves_sorted_and_complete(
        keys in prop::collection::btree_set(-5000i32..5000, 0..300),
        leaf in 2usize..8,
        node in 2usize..6,
    ) {
        let shuffled: Vec<i32> = {
            let mut v: Vec<i32> = keys.iter().copied().collect();
            v.reverse();
            let mid = v.len() / 3;
            v.rotate_left(mid);
            v
        };
        let (_dir, path, _) = common::create_relation(&shuffled, 0);
        let bm = BufferManager::new(64);
        let index = BTreeIndex::open_with_config(
            &bm, &path, 0, Datatype::Integer, small_config(leaf, node),
        ).unwrap();

        let leaves = index.leaf_keys().unwrap();
        if keys.is_empty() {
            prop_assert_eq!(leaves, vec![Vec::<i32>::new()]);
        } else {
            prop_assert!(leaves.iter().all(|l| !l.is_empty() && l.len() <= leaf));
            let flat = leaves.concat();
            prop_assert_eq!(flat, keys.iter().copied().collect::<Vec<_>>());
        }
    }

    /// A scan returns exactly the model's entries in the range, in key order.
    #[test]
    fn prop_scan_matches_model(
        keys in prop::collection::btree_set(-1000i32..1000, 1..200),
        low in -1100i32..1100,
        span in 0i32..600,
        low_strict in any::<bool>(),
        high_strict in any::<bool>(),
    ) {
        let keys: Vec<i32> = keys.into_iter().collect();
        let (_dir, path, rids) = common::create_relation(&keys, 0);
        let bm = BufferManager::new(32);
        let mut index = BTreeIndex::open_with_config(
            &bm, &path, 0, Datatype::Integer, small_config(5, 3),
        ).unwrap();

        let high = low.saturating_add(span);
        let low_op = if low_strict { Operator::Gt } else { Operator::Gte };
        let high_op = if high_strict { Operator::Lt } else { Operator::Lte };

        let expected: Vec<RecordId> = keys
            .iter()
            .zip(&rids)
            .filter(|(k, _)| low_op.admits(**k, low) && high_op.admits(**k, high))
            .map(|(_, rid)| *rid)
            .collect();

        match index.start_scan(low, low_op, high, high_op) {
            Ok(()) => {
                prop_assert_eq!(scan_all(&mut index), expected);
                index.end_scan().unwrap();
            }
            Err(Error::NoSuchKeyFound) => prop_assert!(expected.is_empty()),
            Err(e) => return Err(TestCaseError::fail(e.to_string())),
        }
    }

    /// Key sets inserted in any order produce the same sorted leaf contents.
    #[test]
    fn prop_insert_order_independent(keys in prop::collection::vec(any::<i16>(), 0..150)) {
        let (_dir, path, _) = common::create_relation(&[], 0);
        let bm = BufferManager::new(64);
        let mut index = BTreeIndex::open_with_config(
            &bm, &path, 0, Datatype::Integer, small_config(4, 3),
        ).unwrap();

        let mut model = BTreeSet::new();
        for key in keys {
            let key = i32::from(key);
            let result = index.insert_entry(key, RecordId::new(PageId::new(1), 0));
            if model.insert(key) {
                prop_assert!(result.is_ok());
            } else {
                let is_duplicate = matches!(result, Err(Error::DuplicateKey(k)) if k == key);
                prop_assert!(is_duplicate);
            }
        }

        let flat = index.leaf_keys().unwrap().concat();
        prop_assert_eq!(flat, model.into_iter().collect::<Vec<_>>());
    }
}
