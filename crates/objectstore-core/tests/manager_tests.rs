//! Entity operation and subscription tests for StoreManager over MemoryEngine

use std::cell::RefCell;
use std::rc::Rc;

use objectstore_core::{
    DatabaseConfig, DeleteListener, EngineErrorKind, Error, Key, MemoryEngine, PutListener,
    Record, StoreConfig, StoreManager, StoreName, TransactionMode,
};
use objectstore_core::{Connection, ObjectStore, Transaction};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
    email: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Note {
    #[serde(rename = "noteId")]
    note_id: String,
    body: String,
}

fn ann() -> User {
    User {
        id: 1,
        name: "Ann".into(),
        email: Some("ann@example.com".into()),
    }
}

fn config() -> DatabaseConfig {
    DatabaseConfig::new()
        .with_version(1)
        .with_store_config(
            StoreConfig::new()
                .with_store_name("users")
                .with_key_path("id")
                .with_index("by_email", "email", true)
                .with_index("by_name", "name", false),
        )
        .with_store_config(
            StoreConfig::new()
                .with_store_name("notes")
                .with_key_path("noteId"),
        )
}

fn users() -> StoreName {
    StoreName::new("users").unwrap()
}

fn notes() -> StoreName {
    StoreName::new("notes").unwrap()
}

async fn open(engine: &MemoryEngine) -> StoreManager<objectstore_core::memory::MemoryConnection> {
    StoreManager::open(engine, "app", config()).await.unwrap()
}

/// Put listener that appends `tag:id` to a shared log
fn recording_put(log: &Rc<RefCell<Vec<String>>>, tag: &str) -> PutListener {
    let log = log.clone();
    let tag = tag.to_string();
    Rc::new(move |record: &Record| {
        log.borrow_mut().push(format!("{}:{}", tag, record["id"]));
    })
}

#[tokio::test]
async fn test_put_then_get() {
    let engine = MemoryEngine::new();
    let manager = open(&engine).await;

    let stored = manager.put_entity(ann(), &users()).await.unwrap();
    assert_eq!(stored, ann());

    let retrieved: Option<User> = manager.get_entity(1, &users()).await.unwrap();
    assert_eq!(retrieved, Some(ann()));
}

#[tokio::test]
async fn test_get_missing_is_none() {
    let engine = MemoryEngine::new();
    let manager = open(&engine).await;

    let retrieved: Option<User> = manager.get_entity(42, &users()).await.unwrap();
    assert!(retrieved.is_none());
}

#[tokio::test]
async fn test_delete_then_get() {
    let engine = MemoryEngine::new();
    let manager = open(&engine).await;

    manager.put_entity(ann(), &users()).await.unwrap();
    manager.delete_entity(1, &users()).await.unwrap();

    let retrieved: Option<User> = manager.get_entity(1, &users()).await.unwrap();
    assert!(retrieved.is_none());
    assert_eq!(engine.record_count("app", "users"), Some(0));
}

#[tokio::test]
async fn test_get_maps_onto_requested_type() {
    let engine = MemoryEngine::new();
    let manager = open(&engine).await;

    // Stored record carries a field User doesn't declare and lacks `email`
    manager
        .put_entity(json!({"id": 5, "name": "Eve", "legacy": true}), &users())
        .await
        .unwrap();

    let retrieved: User = manager.get_entity(5, &users()).await.unwrap().unwrap();
    assert_eq!(
        retrieved,
        User {
            id: 5,
            name: "Eve".into(),
            email: None
        }
    );
}

#[tokio::test]
async fn test_get_as_record_keeps_every_field() {
    let engine = MemoryEngine::new();
    let manager = open(&engine).await;
    manager
        .put_entity(json!({"id": 1, "name": "Ann"}), &users())
        .await
        .unwrap();

    let record: Record = manager.get_entity(1, &users()).await.unwrap().unwrap();
    assert_eq!(serde_json::Value::Object(record), json!({"id": 1, "name": "Ann"}));
}

#[tokio::test]
async fn test_get_fills_fields_the_default_skips() {
    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Contact {
        id: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        email: Option<String>,
    }

    let engine = MemoryEngine::new();
    let manager = open(&engine).await;
    let contact = Contact {
        id: 1,
        email: Some("a@b.example".into()),
    };
    manager.put_entity(&contact, &users()).await.unwrap();

    let retrieved: Option<Contact> = manager.get_entity(1, &users()).await.unwrap();
    assert_eq!(retrieved, Some(contact));
}

#[tokio::test]
async fn test_put_fans_out_in_subscription_order() {
    let engine = MemoryEngine::new();
    let manager = open(&engine).await;
    let log = Rc::new(RefCell::new(Vec::new()));

    let listeners: Vec<PutListener> = (0..3)
        .map(|i| recording_put(&log, &format!("l{}", i)))
        .collect();
    for listener in &listeners {
        manager.subscribe_put(&users(), listener).unwrap();
    }

    manager.put_entity(ann(), &users()).await.unwrap();

    assert_eq!(*log.borrow(), vec!["l0:1", "l1:1", "l2:1"]);
}

#[tokio::test]
async fn test_listener_receives_written_record() {
    let engine = MemoryEngine::new();
    let manager = open(&engine).await;
    let seen: Rc<RefCell<Vec<Record>>> = Rc::new(RefCell::new(Vec::new()));

    let sink = seen.clone();
    let listener: PutListener = Rc::new(move |record: &Record| sink.borrow_mut().push(record.clone()));
    manager.subscribe_put(&users(), &listener).unwrap();

    manager.put_entity(ann(), &users()).await.unwrap();

    let expected = serde_json::to_value(ann()).unwrap();
    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(serde_json::Value::Object(seen.borrow()[0].clone()), expected);
}

#[tokio::test]
async fn test_dropped_listener_is_pruned() {
    let engine = MemoryEngine::new();
    let manager = open(&engine).await;
    let log = Rc::new(RefCell::new(Vec::new()));

    let kept = recording_put(&log, "kept");
    let dropped = recording_put(&log, "dropped");
    manager.subscribe_put(&users(), &dropped).unwrap();
    manager.subscribe_put(&users(), &kept).unwrap();

    drop(dropped);
    let registry = manager.registry(&users()).unwrap();
    assert_eq!(registry.put_listener_count(), 2);

    manager.put_entity(ann(), &users()).await.unwrap();

    assert_eq!(*log.borrow(), vec!["kept:1"]);
    assert_eq!(registry.put_listener_count(), 1);
}

#[tokio::test]
async fn test_dropped_delete_listener_is_pruned() {
    let engine = MemoryEngine::new();
    let manager = open(&engine).await;
    let calls = Rc::new(RefCell::new(Vec::new()));

    let sink = calls.clone();
    let kept: DeleteListener =
        Rc::new(move |key: &Key| sink.borrow_mut().push(format!("kept:{}", key)));
    let sink = calls.clone();
    let dropped: DeleteListener =
        Rc::new(move |key: &Key| sink.borrow_mut().push(format!("dropped:{}", key)));
    manager.subscribe_delete(&users(), &dropped).unwrap();
    manager.subscribe_delete(&users(), &kept).unwrap();

    drop(dropped);
    let registry = manager.registry(&users()).unwrap();
    assert_eq!(registry.delete_listener_count(), 2);

    manager.put_entity(ann(), &users()).await.unwrap();
    manager.delete_entity(1, &users()).await.unwrap();

    assert_eq!(*calls.borrow(), vec!["kept:1"]);
    assert_eq!(registry.delete_listener_count(), 1);
}

#[tokio::test]
async fn test_stores_have_independent_channels() {
    let engine = MemoryEngine::new();
    let manager = open(&engine).await;
    let log = Rc::new(RefCell::new(Vec::new()));

    let listener = recording_put(&log, "users");
    manager.subscribe_put(&users(), &listener).unwrap();

    manager
        .put_entity(
            Note {
                note_id: "n-1".into(),
                body: "hello".into(),
            },
            &notes(),
        )
        .await
        .unwrap();

    assert!(log.borrow().is_empty());
}

#[tokio::test]
async fn test_failed_put_does_not_notify() {
    let engine = MemoryEngine::new();
    let manager = open(&engine).await;
    manager.put_entity(ann(), &users()).await.unwrap();

    let log = Rc::new(RefCell::new(Vec::new()));
    let listener = recording_put(&log, "users");
    manager.subscribe_put(&users(), &listener).unwrap();

    // Same email under another id violates the unique index
    let clash = User {
        id: 2,
        name: "Impostor".into(),
        email: Some("ann@example.com".into()),
    };
    let err = manager.put_entity(clash, &users()).await.unwrap_err();

    match &err {
        Error::Operation { store, source } => {
            assert_eq!(store, "users");
            assert_eq!(source.kind, EngineErrorKind::Constraint);
        }
        other => panic!("expected an operation error, got {:?}", other),
    }
    assert!(log.borrow().is_empty());
}

#[tokio::test]
async fn test_delete_notifies_with_key() {
    let engine = MemoryEngine::new();
    let manager = open(&engine).await;
    let seen = Rc::new(RefCell::new(Vec::new()));

    let sink = seen.clone();
    let on_delete: DeleteListener = Rc::new(move |key: &Key| sink.borrow_mut().push(key.clone()));
    let on_put: PutListener = Rc::new(|_: &Record| {});
    manager.subscribe(&on_put, &on_delete, &users()).unwrap();

    manager.put_entity(ann(), &users()).await.unwrap();
    manager.delete_entity(1, &users()).await.unwrap();

    assert_eq!(*seen.borrow(), vec![Key::from(1)]);
}

#[tokio::test]
async fn test_failed_delete_does_not_notify() {
    let engine = MemoryEngine::new();
    let manager = open(&engine).await;
    let seen = Rc::new(RefCell::new(0));

    let sink = seen.clone();
    let on_delete: DeleteListener = Rc::new(move |_: &Key| *sink.borrow_mut() += 1);
    manager.subscribe_delete(&users(), &on_delete).unwrap();

    manager.close();
    let err = manager.delete_entity(1, &users()).await.unwrap_err();

    assert_eq!(
        err.engine_error().map(|e| e.kind),
        Some(EngineErrorKind::InvalidState)
    );
    assert_eq!(*seen.borrow(), 0);
}

#[tokio::test]
async fn test_listener_may_write_back_through_manager() {
    let engine = MemoryEngine::new();
    let manager = Rc::new(open(&engine).await);
    let log = Rc::new(RefCell::new(Vec::new()));

    // Subscribing from inside a notification must not conflict with the pass
    let weak = Rc::downgrade(&manager);
    let late = recording_put(&log, "late");
    let late_handle = late.clone();
    let subscriber: PutListener = Rc::new(move |_: &Record| {
        if let Some(manager) = weak.upgrade() {
            manager.subscribe_put(&users(), &late_handle).unwrap();
        }
    });
    manager.subscribe_put(&users(), &subscriber).unwrap();

    manager.put_entity(ann(), &users()).await.unwrap();
    assert!(log.borrow().is_empty());

    manager
        .put_entity(
            User {
                id: 2,
                ..Default::default()
            },
            &users(),
        )
        .await
        .unwrap();
    assert_eq!(*log.borrow(), vec!["late:2"]);
}

#[tokio::test]
async fn test_unknown_store_rejected() {
    let engine = MemoryEngine::new();
    let manager = open(&engine).await;
    let typo = StoreName::new("usres").unwrap();

    let err = manager.put_entity(ann(), &typo).await.unwrap_err();
    assert!(matches!(err, Error::UnknownStore(ref name) if name == "usres"));

    let listener: PutListener = Rc::new(|_: &Record| {});
    assert!(matches!(
        manager.subscribe_put(&typo, &listener),
        Err(Error::UnknownStore(_))
    ));
    assert_eq!(engine.record_count("app", "users"), Some(0));
}

#[tokio::test]
async fn test_non_record_entity_rejected() {
    let engine = MemoryEngine::new();
    let manager = open(&engine).await;

    let err = manager.put_entity("just a string", &users()).await.unwrap_err();
    assert!(matches!(err, Error::NotARecord { .. }));
}

#[tokio::test]
async fn test_find_by_index() {
    let engine = MemoryEngine::new();
    let manager = open(&engine).await;

    for (id, name) in [(3, "Bob"), (1, "Ann"), (2, "Bob")] {
        manager
            .put_entity(
                User {
                    id,
                    name: name.into(),
                    email: None,
                },
                &users(),
            )
            .await
            .unwrap();
    }

    let bobs: Vec<User> = manager.find_by_index("by_name", "Bob", &users()).await.unwrap();
    let ids: Vec<u64> = bobs.iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![2, 3]);

    let err = manager
        .find_by_index::<User>("by_age", 30, &users())
        .await
        .unwrap_err();
    assert_eq!(
        err.engine_error().map(|e| e.kind),
        Some(EngineErrorKind::NotFound)
    );
}

#[tokio::test]
async fn test_transaction_accessors() {
    let engine = MemoryEngine::new();
    let manager = open(&engine).await;
    manager.put_entity(ann(), &users()).await.unwrap();

    let tx = manager
        .transaction(TransactionMode::ReadOnly, &users())
        .unwrap();
    assert_eq!(tx.mode(), TransactionMode::ReadOnly);
    let store = manager.object_store(&tx, &users()).unwrap();
    assert_eq!(store.count().await.unwrap(), 1);

    let index = manager.index(&store, "by_email").unwrap();
    let found = objectstore_core::Index::get(&index, &Key::from("ann@example.com"))
        .await
        .unwrap();
    assert_eq!(found.unwrap()["name"], json!("Ann"));
    tx.complete().await.unwrap();
}

#[tokio::test]
async fn test_close_drops_subscriptions() {
    let engine = MemoryEngine::new();
    let manager = open(&engine).await;
    let listener: PutListener = Rc::new(|_: &Record| {});
    manager.subscribe_put(&users(), &listener).unwrap();
    assert!(manager.registry(&users()).is_some());

    manager.close();

    assert!(!manager.is_open());
    assert!(manager.registry(&users()).is_none());
    assert!(manager.connection().transaction("users", TransactionMode::ReadOnly).is_err());
}

#[tokio::test]
async fn test_subscribe_after_close_rejected() {
    let engine = MemoryEngine::new();
    let manager = open(&engine).await;
    manager.close();

    let listener: PutListener = Rc::new(|_: &Record| {});
    let err = manager.subscribe_put(&users(), &listener).unwrap_err();

    assert_eq!(
        err.engine_error().map(|e| e.kind),
        Some(EngineErrorKind::InvalidState)
    );
    assert!(manager.registry(&users()).is_none());
}
