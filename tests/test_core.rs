use assert_fs::prelude::*;
use ndarray::Array1;

use shopsight::models::chat::ChatHistoryStore;
use shopsight::models::order::{NewOrder, OrderLedger};
use shopsight::models::thread::ThreadRegistry;
use shopsight::{format_hits, ChatMessage, SearchIndex};

#[test]
fn test_search_index_from_files() {
    let dir = assert_fs::TempDir::new().unwrap();

    let bank = dir.child("embedding_bank.json");
    bank.write_str(
        r#"{
            "features": [[1.0, 0.0], [0.0, 1.0], [0.6, 0.8]],
            "entries": [
                {"product_id": "101", "path": "images/101.jpg", "caption": "red shoe"},
                {"product_id": "102", "path": "images/102.jpg", "caption": "blue bag"},
                {"product_id": "103", "path": "images/103.jpg", "caption": "green hat"}
            ]
        }"#,
    )
    .unwrap();

    let catalog = dir.child("catalog.csv");
    catalog
        .write_str("product_id,title\n101,Red Shoe Deluxe\n103,\"Hat, green\"\n")
        .unwrap();

    let index = SearchIndex::load(bank.path(), catalog.path()).unwrap();
    assert_eq!(index.len(), 3);

    let query = Array1::from(vec![0.0f32, 1.0]);
    let hits = index.search(&query, 5);

    // k is clamped to the bank size and ordering is by score descending
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].product_id, "102");
    assert_eq!(hits[1].product_id, "103");
    assert_eq!(hits[1].title.as_deref(), Some("Hat, green"));
    assert!(hits[0].title.is_none());

    // Repeating the query returns the same ranking
    let again = index.search(&query, 5);
    let ids: Vec<_> = again.iter().map(|h| h.product_id.as_str()).collect();
    assert_eq!(ids, vec!["102", "103", "101"]);

    let text = format_hits(&hits);
    assert!(text.contains("1. Similarity:"));
    assert!(text.contains("pID: 102"));
    assert!(text.contains("Title: Not found"));
}

#[test]
fn test_order_ledger_roundtrip() {
    let dir = assert_fs::TempDir::new().unwrap();
    let ledger = OrderLedger::new(dir.path().join("orders.json"));

    // Missing file reads as an empty table
    assert!(ledger.load().unwrap().is_empty());

    let rows = ledger
        .append(NewOrder {
            first_name: "Sara".to_string(),
            last_name: "Ahmadi".to_string(),
            address: "12 Vali Asr".to_string(),
            phone: "0912000000".to_string(),
            product: "red shoe".to_string(),
            price: "250000".to_string(),
            quantity: "2".to_string(),
        })
        .unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].product, "red shoe");

    // The file on disk matches what append returned
    let reloaded = ledger.load().unwrap();
    assert_eq!(reloaded, rows);
}

#[test]
fn test_thread_registry_and_history() {
    let dir = assert_fs::TempDir::new().unwrap();
    let registry = ThreadRegistry::new(dir.path().join("threads.json"));
    let history = ChatHistoryStore::new(dir.path().join("chat_history"));

    let info = registry.register("thread_abc", "Weekend order").unwrap();
    assert_eq!(info.name, "Weekend order");

    // Case-insensitive duplicate names are rejected
    assert!(registry.register("thread_def", "weekend ORDER").is_err());

    let messages = vec![
        ChatMessage::user("do you have red shoes?"),
        ChatMessage::assistant("Yes, in sizes 38-42."),
    ];
    history.save("thread_abc", &messages).unwrap();

    let reloaded = history.load("thread_abc").unwrap();
    assert_eq!(reloaded, messages);

    // An unknown thread has an empty history
    assert!(history.load("thread_zzz").unwrap().is_empty());
}
