use tiercache_core::traits::{Embedder, VectorStore};
use tiercache_core::types::{Domain, DomainFilter, Meta, StoredItem, DOMAIN_KEY};
use tiercache_embed::HashEmbedder;
use tiercache_vector::FlatVectorStore;

fn item(id: &str, text: &str, domain: &str) -> StoredItem {
    let mut meta = Meta::new();
    meta.insert(DOMAIN_KEY.to_string(), domain.to_string());
    StoredItem { id: id.to_string(), text: text.to_string(), meta }
}

fn seed(store: &FlatVectorStore, embedder: &HashEmbedder) {
    let items = vec![
        item("l1", "what is moon water", "lunar"),
        item("l2", "when is the next full moon", "lunar"),
        item("t1", "what is moon water in tarot readings", "tarot"),
        item("n1", "what is my life path number", "numerology"),
    ];
    let batch = items.into_iter().map(|i| { let v = embedder.embed(&i.text).expect("embed"); (i, v) }).collect();
    store.upsert_batch(batch).expect("upsert");
}

#[test]
fn nearest_orders_by_distance_and_respects_k() {
    let e = HashEmbedder::new(128);
    let store = FlatVectorStore::in_memory();
    seed(&store, &e);
    let q = e.embed("what is moon water").expect("q");
    let hits = store.nearest(&q, &DomainFilter::Any, 2).expect("nearest");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].item.id, "l1");
    assert!(hits[0].distance.abs() < 1e-5, "identical text has distance 0");
    assert!(hits[0].distance <= hits[1].distance);
    assert!(store.nearest(&q, &DomainFilter::Any, 0).expect("k=0").is_empty());
}

#[test]
fn domain_filter_excludes_other_domains() {
    let e = HashEmbedder::new(128);
    let store = FlatVectorStore::in_memory();
    seed(&store, &e);
    let q = e.embed("what is moon water in tarot readings").expect("q");
    let filter = DomainFilter::from_domains(&[Domain::new("lunar")]);
    let hits = store.nearest(&q, &filter, 10).expect("nearest");
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.item.domain() == Some("lunar")));
}

#[test]
fn upsert_replaces_and_delete_reports_presence() {
    let e = HashEmbedder::new(32);
    let store = FlatVectorStore::in_memory();
    seed(&store, &e);
    store.upsert(item("l1", "moon water recipe", "lunar"), e.embed("moon water recipe").expect("v")).expect("upsert");
    assert_eq!(store.len().expect("len"), 4);
    assert!(store.delete("l1").expect("delete"));
    assert!(!store.delete("l1").expect("delete again"));
    store.clear().expect("clear");
    assert!(store.is_empty().expect("empty"));
}

#[test]
fn persisted_store_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("vectors.jsonl");
    let e = HashEmbedder::new(64);
    {
        let store = FlatVectorStore::open(&path, 2.0);
        seed(&store, &e);
        store.delete("n1").expect("delete");
    }
    let reopened = FlatVectorStore::open(&path, 2.0);
    assert_eq!(reopened.len().expect("len"), 3);
    let q = e.embed("when is the next full moon").expect("q");
    assert_eq!(reopened.nearest(&q, &DomainFilter::Any, 1).expect("nearest")[0].item.id, "l2");
    reopened.flush().expect("flush");
    assert_eq!(FlatVectorStore::open(&path, 2.0).len().expect("len"), 3);
}

#[test]
fn corrupt_file_starts_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("vectors.jsonl");
    std::fs::write(&path, "{\"op\":\"header\",\"version\":42}\n").expect("write");
    let store = FlatVectorStore::open(&path, 2.0);
    assert_eq!(store.len().expect("len"), 0);
}

#[test]
fn failed_batch_write_leaves_index_unchanged() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("vectors.jsonl");
    let e = HashEmbedder::new(64);
    let store = FlatVectorStore::open(&path, 2.0);
    let first = item("c1", "how do I cleanse a crystal", "crystals");
    let v = e.embed(&first.text).expect("embed");
    store.upsert_batch(vec![(first, v)]).expect("upsert");

    std::fs::remove_file(&path).expect("remove");
    std::fs::create_dir(&path).expect("block journal path");

    let batch = ["what is a waning moon", "when is the next full moon"]
        .iter()
        .enumerate()
        .map(|(i, text)| (item(&format!("l{i}"), text, "lunar"), e.embed(text).expect("embed")))
        .collect();
    assert!(store.upsert_batch(batch).is_err());
    assert_eq!(store.len().expect("len"), 1);
    let q = e.embed("when is the next full moon").expect("q");
    let hits = store.nearest(&q, &DomainFilter::Any, 5).expect("nearest");
    assert!(hits.iter().all(|n| n.item.id == "c1"));
}
