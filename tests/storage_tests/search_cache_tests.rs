//! Tests for SearchCache
//!
//! These tests verify:
//! - Building a cache table from a filtered scan
//! - Serving later reads without re-running the filter
//! - Paging over cached results
//! - Invalidation and byte-identical rebuilds
//! - Cache key validation

use std::fs;
use std::path::Path;

use csvdb::{
    ColumnType, CsvDbError, Record, RecordStore, ResultRow, SearchCache, TableConfig, Value,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn people_store(dir: &Path) -> RecordStore {
    let config = TableConfig::builder()
        .data_dir(dir)
        .table_name("people.csv")
        .max_record_width(64)
        .column("name", ColumnType::String)
        .column("age", ColumnType::Int)
        .column("city", ColumnType::String)
        .build()
        .unwrap();
    let store = RecordStore::new(config);
    store.create_table().unwrap();
    store
}

fn add_person(store: &RecordStore, name: &str, age: i64, city: &str) -> u64 {
    store
        .create(vec![Value::from(name), Value::Int(age), Value::from(city)])
        .unwrap()
}

fn seed_six(store: &RecordStore) {
    add_person(store, "Ann", 25, "Oslo");
    add_person(store, "Ben", 41, "Lima");
    add_person(store, "Cai", 19, "Oslo");
    add_person(store, "Dee", 30, "Rome");
    add_person(store, "Eve", 52, "Oslo, Norway");
    add_person(store, "Fox", 28, "Lima");
}

/// Adults over 40, projected to name and city
fn over_forty(records: Vec<Record>) -> Vec<ResultRow> {
    records
        .into_iter()
        .filter(|r| r.get("age").and_then(Value::as_i64).map_or(false, |age| age > 40))
        .map(|r| {
            vec![
                ("name".to_string(), r.get("name").cloned().unwrap_or(Value::Null)),
                ("city".to_string(), r.get("city").cloned().unwrap_or(Value::Null)),
            ]
        })
        .collect()
}

fn names_of(records: &[Record]) -> Vec<&str> {
    records.iter().filter_map(|r| r.get_str("name")).collect()
}

// =============================================================================
// Build / Read Tests
// =============================================================================

#[test]
fn test_build_and_read_matches() {
    let temp = TempDir::new().unwrap();
    let store = people_store(temp.path());
    seed_six(&store);
    let cache = SearchCache::new(store);

    let results = cache.get_or_build("over_forty", over_forty, 1, None).unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].r_id, 1);
    assert_eq!(results[1].r_id, 2);
    assert_eq!(names_of(&results), vec!["Ben", "Eve"]);
    assert_eq!(results[1].get_str("city"), Some("Oslo, Norway"));
    assert_eq!(results[0].get("age"), None);

    let path = temp.path().join("__csvdb_cache").join("people_over_forty.csv");
    assert_eq!(cache.cache_path("over_forty").unwrap(), path);
    assert!(cache.is_cached("over_forty").unwrap());
}

#[test]
fn test_cache_file_layout() {
    let temp = TempDir::new().unwrap();
    let store = people_store(temp.path());
    seed_six(&store);
    let cache = SearchCache::new(store);

    cache.get_or_build("over_forty", over_forty, 1, None).unwrap();

    let bytes = fs::read(cache.cache_path("over_forty").unwrap()).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    let lines: Vec<&str> = text.split_terminator('\n').collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("name,city,"));
    assert!(lines[1].starts_with("Ben,Lima,"));
    assert!(lines[2].starts_with("Eve,\"Oslo, Norway\","));
    // widest line is the Eve row: 18 bytes + separator + flag
    assert!(lines.iter().all(|line| line.len() == 20));
}

#[test]
fn test_cached_reads_skip_the_filter() {
    let temp = TempDir::new().unwrap();
    let store = people_store(temp.path());
    seed_six(&store);
    let cache = SearchCache::new(store);

    cache.get_or_build("over_forty", over_forty, 1, None).unwrap();

    let results = cache
        .get_or_build(
            "over_forty",
            |_records: Vec<Record>| -> Vec<ResultRow> { panic!("filter must not run") },
            1,
            None,
        )
        .unwrap();
    assert_eq!(names_of(&results), vec!["Ben", "Eve"]);
}

#[test]
fn test_cache_is_stale_until_invalidated() {
    let temp = TempDir::new().unwrap();
    let store = people_store(temp.path());
    seed_six(&store);
    let cache = SearchCache::new(store.clone());

    cache.get_or_build("over_forty", over_forty, 1, None).unwrap();
    add_person(&store, "Gus", 77, "Kyiv");

    let stale = cache.get_or_build("over_forty", over_forty, 1, None).unwrap();
    assert_eq!(stale.len(), 2);

    assert!(cache.invalidate("over_forty").unwrap());
    let fresh = cache.get_or_build("over_forty", over_forty, 1, None).unwrap();
    assert_eq!(names_of(&fresh), vec!["Ben", "Eve", "Gus"]);
}

#[test]
fn test_filter_sees_only_live_records() {
    let temp = TempDir::new().unwrap();
    let store = people_store(temp.path());
    seed_six(&store);
    store.delete(2, false).unwrap();
    store.delete(5, true).unwrap();
    let cache = SearchCache::new(store);

    let results = cache
        .get_or_build(
            "all",
            |records: Vec<Record>| {
                records
                    .into_iter()
                    .map(|r| vec![("name".to_string(), r.get("name").cloned().unwrap_or(Value::Null))])
                    .collect()
            },
            1,
            None,
        )
        .unwrap();

    assert_eq!(names_of(&results), vec!["Ann", "Cai", "Dee", "Fox"]);
}

#[test]
fn test_paged_cache_reads() {
    let temp = TempDir::new().unwrap();
    let store = people_store(temp.path());
    seed_six(&store);
    let cache = SearchCache::new(store);

    let everyone = |records: Vec<Record>| -> Vec<ResultRow> {
        records
            .into_iter()
            .map(|r| vec![("name".to_string(), r.get("name").cloned().unwrap_or(Value::Null))])
            .collect()
    };

    let page_2 = cache.get_or_build("everyone", everyone, 2, Some(4)).unwrap();
    assert_eq!(names_of(&page_2), vec!["Eve", "Fox"]);
    assert_eq!(page_2[0].r_id, 5);

    let page_1 = cache.get_or_build("everyone", everyone, 1, Some(4)).unwrap();
    assert_eq!(names_of(&page_1), vec!["Ann", "Ben", "Cai", "Dee"]);

    let page_3 = cache.get_or_build("everyone", everyone, 3, Some(4)).unwrap();
    assert!(page_3.is_empty());
}

#[test]
fn test_numbers_come_back_as_strings() {
    let temp = TempDir::new().unwrap();
    let store = people_store(temp.path());
    seed_six(&store);
    let cache = SearchCache::new(store);

    let results = cache
        .get_or_build(
            "ages",
            |records: Vec<Record>| {
                records
                    .into_iter()
                    .take(1)
                    .map(|r| vec![("age".to_string(), r.get("age").cloned().unwrap_or(Value::Null))])
                    .collect()
            },
            1,
            None,
        )
        .unwrap();

    assert_eq!(results[0].get("age"), Some(&Value::String("25".to_string())));
}

// =============================================================================
// Empty Result Tests
// =============================================================================

#[test]
fn test_empty_results_are_cached() {
    let temp = TempDir::new().unwrap();
    let store = people_store(temp.path());
    seed_six(&store);
    let cache = SearchCache::new(store);

    let nobody = |_records: Vec<Record>| -> Vec<ResultRow> { Vec::new() };
    let results = cache.get_or_build("nobody", nobody, 1, None).unwrap();

    assert!(results.is_empty());
    let path = cache.cache_path("nobody").unwrap();
    assert!(path.is_file());
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);

    let again = cache
        .get_or_build(
            "nobody",
            |_records: Vec<Record>| -> Vec<ResultRow> { panic!("filter must not run") },
            1,
            None,
        )
        .unwrap();
    assert!(again.is_empty());
}

#[test]
fn test_empty_source_table() {
    let temp = TempDir::new().unwrap();
    let store = people_store(temp.path());
    let cache = SearchCache::new(store);

    let results = cache.get_or_build("over_forty", over_forty, 1, None).unwrap();
    assert!(results.is_empty());
}

// =============================================================================
// Invalidation Tests
// =============================================================================

#[test]
fn test_invalidate_and_rebuild_is_byte_identical() {
    let temp = TempDir::new().unwrap();
    let store = people_store(temp.path());
    seed_six(&store);
    let cache = SearchCache::new(store);

    cache.get_or_build("over_forty", over_forty, 1, None).unwrap();
    let path = cache.cache_path("over_forty").unwrap();
    let first = fs::read(&path).unwrap();

    assert!(cache.invalidate("over_forty").unwrap());
    assert!(!path.exists());
    assert!(!cache.invalidate("over_forty").unwrap());

    cache.get_or_build("over_forty", over_forty, 1, None).unwrap();
    assert_eq!(fs::read(&path).unwrap(), first);
}

#[test]
fn test_invalidate_leaves_other_keys() {
    let temp = TempDir::new().unwrap();
    let store = people_store(temp.path());
    seed_six(&store);
    let cache = SearchCache::new(store);

    cache.get_or_build("a", over_forty, 1, None).unwrap();
    cache.get_or_build("b", over_forty, 1, None).unwrap();

    cache.invalidate("a").unwrap();

    assert!(!cache.is_cached("a").unwrap());
    assert!(cache.is_cached("b").unwrap());
}

// =============================================================================
// Error Tests
// =============================================================================

#[test]
fn test_invalid_cache_keys() {
    let temp = TempDir::new().unwrap();
    let cache = SearchCache::new(people_store(temp.path()));

    for key in ["", ".", "..", "../escape", "a/b", "a\\b"] {
        assert!(
            matches!(cache.cache_path(key), Err(CsvDbError::InvalidInput(_))),
            "key {:?} should be rejected",
            key
        );
    }
}

#[test]
fn test_page_zero_is_invalid() {
    let temp = TempDir::new().unwrap();
    let cache = SearchCache::new(people_store(temp.path()));

    assert!(matches!(
        cache.get_or_build("k", over_forty, 0, Some(5)),
        Err(CsvDbError::InvalidInput(_))
    ));
}

#[test]
fn test_duplicate_result_columns_rejected() {
    let temp = TempDir::new().unwrap();
    let store = people_store(temp.path());
    seed_six(&store);
    let cache = SearchCache::new(store);

    let result = cache.get_or_build(
        "dup",
        |_records: Vec<Record>| -> Vec<ResultRow> {
            vec![vec![
                ("name".to_string(), Value::from("a")),
                ("name".to_string(), Value::from("b")),
            ]]
        },
        1,
        None,
    );

    assert!(matches!(result, Err(CsvDbError::InvalidInput(_))));
    assert!(!cache.is_cached("dup").unwrap());
}

#[test]
fn test_line_break_in_result_column_rejected() {
    let temp = TempDir::new().unwrap();
    let store = people_store(temp.path());
    add_person(&store, "Ann", 25, "Oslo");
    let cache = SearchCache::new(store);

    for column in ["na\nme", "na\rme"] {
        let result = cache.get_or_build(
            "k",
            |records: Vec<Record>| -> Vec<ResultRow> {
                records
                    .into_iter()
                    .map(|r| vec![(column.to_string(), r.get("name").cloned().unwrap_or(Value::Null))])
                    .collect()
            },
            1,
            None,
        );

        assert!(matches!(result, Err(CsvDbError::InvalidInput(_))));
        assert!(!cache.is_cached("k").unwrap());
    }

    // the key stays usable once the filter is fixed
    let results = cache.get_or_build("k", over_forty, 1, None).unwrap();
    assert!(results.is_empty());
}

#[test]
fn test_build_leaves_no_staging_file() {
    let temp = TempDir::new().unwrap();
    let store = people_store(temp.path());
    seed_six(&store);
    let cache = SearchCache::new(store);

    let path = cache.cache_path("over_forty").unwrap();
    let staging = path.with_file_name("people_over_forty.csv.tmp");

    // a leftover from an interrupted build does not count as a cache
    fs::write(&staging, b"name,ci").unwrap();
    assert!(!cache.is_cached("over_forty").unwrap());

    let results = cache.get_or_build("over_forty", over_forty, 1, None).unwrap();

    assert_eq!(names_of(&results), vec!["Ben", "Eve"]);
    assert!(path.is_file());
    assert!(!staging.exists());
}
