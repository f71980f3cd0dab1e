use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::thread;

use webindex_core::{Error, Index, MemoryStore, SledStore, Store, TermCounter};

const U1: &str = "https://en.wikipedia.org/wiki/Java_(programming_language)";
const U2: &str = "https://en.wikipedia.org/wiki/Programming_language";

fn counter(url: &str, pairs: &[(&str, u64)]) -> TermCounter {
    let mut tc = TermCounter::new(url);
    for (t, c) in pairs {
        tc.put(*t, *c);
    }
    tc
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn roundtrip<S: Store>(index: &Index<S>) {
    let m = counter(U1, &[("java", 7), ("language", 3), ("the", 41)]);
    index.index_page(U1, &m).unwrap();

    assert!(index.is_indexed(U1).unwrap());
    for (t, c) in m.iter() {
        assert_eq!(index.count_at(U1, t).unwrap(), c);
        assert!(index.urls_for_term(t).unwrap().contains(U1));
    }
}

#[test]
fn roundtrip_memory() {
    roundtrip(&Index::new(MemoryStore::new()));
}

#[test]
fn roundtrip_sled() {
    roundtrip(&Index::new(SledStore::temporary().unwrap()));
}

#[test]
fn reindex_replaces_counts() {
    let index = Index::new(MemoryStore::new());
    index.index_page(U1, &counter(U1, &[("a", 1), ("b", 2)])).unwrap();
    index.index_page(U1, &counter(U1, &[("b", 5), ("c", 1)])).unwrap();

    assert_eq!(index.count_at(U1, "b").unwrap(), 5);
    assert_eq!(index.count_at(U1, "c").unwrap(), 1);
    match index.count_at(U1, "a") {
        Err(Error::TermNotFound { url, term }) => {
            assert_eq!(url, U1);
            assert_eq!(term, "a");
        }
        other => panic!("expected TermNotFound, got {other:?}"),
    }
}

#[test]
fn reindex_keeps_stale_membership() {
    let index = Index::new(MemoryStore::new());
    index.index_page(U1, &counter(U1, &[("a", 1), ("b", 2)])).unwrap();
    index.index_page(U1, &counter(U1, &[("b", 2)])).unwrap();

    // url stays listed for the dropped term, and asking for its counts says so
    assert!(index.urls_for_term("a").unwrap().contains(U1));
    assert!(matches!(index.counts_for_term("a"), Err(Error::TermNotFound { .. })));
}

#[test]
fn absence_is_not_zero() {
    let index = Index::new(MemoryStore::new());
    assert!(!index.is_indexed(U2).unwrap());
    assert!(matches!(index.count_at(U2, "java"), Err(Error::TermNotFound { .. })));
    assert!(index.urls_for_term("neverseen").unwrap().is_empty());
    assert!(index.counts_for_term("neverseen").unwrap().is_empty());
}

#[test]
fn zero_counts_are_not_stored() {
    let index = Index::new(MemoryStore::new());
    let mut tc = counter(U1, &[("kept", 2)]);
    tc.put("dropped", 0);
    index.index_page(U1, &tc).unwrap();
    assert!(matches!(index.count_at(U1, "dropped"), Err(Error::TermNotFound { .. })));
    assert!(index.urls_for_term("dropped").unwrap().is_empty());
}

#[test]
fn failed_commit_leaves_prior_state() {
    let store = Arc::new(MemoryStore::new());
    let index = Index::new(store.clone());
    index.index_page(U1, &counter(U1, &[("a", 1), ("b", 2)])).unwrap();

    // fails after the delete and one set-add have been staged
    store.fail_commit_after(2);
    let err = index.index_page(U1, &counter(U1, &[("b", 9), ("z", 4)])).unwrap_err();
    assert!(matches!(err, Error::StoreUnavailable(_)));

    assert_eq!(index.count_at(U1, "a").unwrap(), 1);
    assert_eq!(index.count_at(U1, "b").unwrap(), 2);
    assert!(matches!(index.count_at(U1, "z"), Err(Error::TermNotFound { .. })));
    assert!(index.urls_for_term("z").unwrap().is_empty());
    assert_eq!(index.indexed_terms().unwrap(), set(&["a", "b"]));
}

#[test]
fn offline_store_surfaces_unavailable() {
    let store = Arc::new(MemoryStore::new());
    let index = Index::new(store.clone());
    store.set_offline(true);
    assert!(matches!(index.is_indexed(U1), Err(Error::StoreUnavailable(_))));
    assert!(matches!(index.clear_all(), Err(Error::StoreUnavailable(_))));
}

fn enumeration<S: Store>(index: &Index<S>) {
    index.index_page(U1, &counter(U1, &[("a", 1), ("b", 2)])).unwrap();
    index.index_page(U2, &counter(U2, &[("b", 3), ("c", 4)])).unwrap();

    assert_eq!(index.indexed_terms().unwrap(), set(&["a", "b", "c"]));
    assert_eq!(index.urls_for_term("b").unwrap().into_inner(), set(&[U1, U2]));
    let expected: BTreeMap<String, u64> = [(U1.to_string(), 2), (U2.to_string(), 3)].into_iter().collect();
    assert_eq!(index.counts_for_term("b").unwrap(), expected);

    assert_eq!(index.url_set_keys().unwrap(), set(&["URLSet:a", "URLSet:b", "URLSet:c"]));
    let tc_keys: BTreeSet<String> = [format!("TermCounter:{U1}"), format!("TermCounter:{U2}")].into_iter().collect();
    assert_eq!(index.term_counter_keys().unwrap(), tc_keys);
}

#[test]
fn enumeration_memory() {
    enumeration(&Index::new(MemoryStore::new()));
}

#[test]
fn enumeration_sled() {
    enumeration(&Index::new(SledStore::temporary().unwrap()));
}

#[test]
fn clear_all_empties_index() {
    let index = Index::new(SledStore::temporary().unwrap());
    index.index_page(U1, &counter(U1, &[("a", 1), ("b", 2)])).unwrap();
    index.index_page(U2, &counter(U2, &[("b", 3)])).unwrap();

    assert_eq!(index.clear_all().unwrap(), 4);
    assert!(index.indexed_terms().unwrap().is_empty());
    assert!(!index.is_indexed(U1).unwrap());
    assert!(!index.is_indexed(U2).unwrap());
    assert_eq!(index.clear_all().unwrap(), 0);
}

#[test]
fn clears_by_family() {
    let index = Index::new(MemoryStore::new());
    index.index_page(U1, &counter(U1, &[("a", 1), ("b", 2)])).unwrap();

    assert_eq!(index.clear_term_counters().unwrap(), 1);
    assert!(!index.is_indexed(U1).unwrap());
    assert_eq!(index.indexed_terms().unwrap(), set(&["a", "b"]));

    assert_eq!(index.clear_url_sets().unwrap(), 2);
    assert!(index.indexed_terms().unwrap().is_empty());
}

#[test]
fn clear_all_reaches_foreign_keys() {
    let store = Arc::new(MemoryStore::new());
    store.set_add("unrelated", "x").unwrap();
    let index = Index::new(store.clone());
    index.index_page(U1, &counter(U1, &[("a", 1)])).unwrap();
    assert_eq!(index.clear_url_sets().unwrap(), 1);
    assert!(store.exists("unrelated").unwrap());
    index.clear_all().unwrap();
    assert!(store.is_empty());
}

#[test]
fn malformed_count_is_reported() {
    let store = Arc::new(MemoryStore::new());
    store.put_raw_field(&format!("TermCounter:{U1}"), "java", "lots").unwrap();
    let index = Index::new(store);
    assert!(matches!(index.count_at(U1, "java"), Err(Error::MalformedRecord { .. })));
}

#[test]
fn add_touches_only_url_set() {
    let index = Index::new(MemoryStore::new());
    let tc = counter(U2, &[("c", 1)]);
    index.add("c", &tc).unwrap();
    assert!(index.urls_for_term("c").unwrap().contains(U2));
    assert!(!index.is_indexed(U2).unwrap());
}

#[test]
fn dump_lists_terms_and_counts() {
    let index = Index::new(MemoryStore::new());
    index.index_page(U1, &counter(U1, &[("a", 1), ("b", 2)])).unwrap();
    index.index_page(U2, &counter(U2, &[("b", 3)])).unwrap();
    let mut out = Vec::new();
    index.dump(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    let expected = format!("a\n    {U1} 1\nb\n    {U1} 2\n    {U2} 3\n");
    assert_eq!(text, expected);
}

fn concurrent_reindex<S: Store + 'static>(index: Arc<Index<S>>) {
    let first = counter(U1, &[("x", 100), ("y", 100)]);
    let mut left = TermCounter::new(U1);
    let mut right = TermCounter::new(U1);
    for i in 0..200 {
        left.put(format!("left{i}"), 1);
        right.put(format!("right{i}"), 2);
    }
    index.index_page(U1, &first).unwrap();

    let handles: Vec<_> = [left.clone(), right.clone()]
        .into_iter()
        .map(|tc| {
            let index = index.clone();
            thread::spawn(move || {
                for _ in 0..20 {
                    index.index_page(U1, &tc).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let winner = if index.count_at(U1, "left0").is_ok() { &left } else { &right };
    let loser = if std::ptr::eq(winner, &left) { &right } else { &left };
    for (t, c) in winner.iter() {
        assert_eq!(index.count_at(U1, t).unwrap(), c);
    }
    for t in loser.terms() {
        assert!(matches!(index.count_at(U1, t), Err(Error::TermNotFound { .. })));
    }
}

#[test]
fn concurrent_reindex_of_same_url_is_whole_memory() {
    concurrent_reindex(Arc::new(Index::new(MemoryStore::new())));
}

#[test]
fn concurrent_reindex_of_same_url_is_whole_sled() {
    concurrent_reindex(Arc::new(Index::new(SledStore::temporary().unwrap())));
}
