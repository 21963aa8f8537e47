//! Store behaviour that must hold on both backends.
//!
//! Every scenario runs once against the sled database and once against the
//! flat JSON file, each in its own temporary data directory.

use std::collections::BTreeMap;
use std::time::Duration;

use kithub::models::is_generated_id;
use kithub::storage::FlatFileBackend;
use kithub::{
    BackendKind, BackendPreference, Snippet, SnippetDraft, SnippetPatch, SnippetStore, SortKey,
    SortOrder, StoreConfig, StoreError,
};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn temp_data_dir() -> TempDir {
    tempfile::Builder::new()
        .prefix("kithub_store_")
        .tempdir()
        .expect("should create tempdir")
}

fn config_for(dir: &TempDir, kind: BackendKind) -> StoreConfig {
    let preference = match kind {
        BackendKind::Structured => BackendPreference::Auto,
        BackendKind::Flat => BackendPreference::Flat,
    };
    StoreConfig::new(dir.path()).with_backend(preference)
}

async fn open(kind: BackendKind) -> (TempDir, SnippetStore) {
    let dir = temp_data_dir();
    let store = SnippetStore::open(config_for(&dir, kind))
        .await
        .expect("store should open");
    assert_eq!(store.ready().await.unwrap(), kind);
    (dir, store)
}

const BOTH: [BackendKind; 2] = [BackendKind::Structured, BackendKind::Flat];

fn sample(name: &str) -> SnippetDraft {
    SnippetDraft::new(name)
        .with_html(format!("<h1>{}</h1>", name))
        .with_css("h1 { color: #667eea; }")
        .with_js(format!("console.log({:?});", name))
}

fn by_id(snippets: Vec<Snippet>) -> BTreeMap<String, Snippet> {
    snippets.into_iter().map(|s| (s.id.clone(), s)).collect()
}

// ---------------------------------------------------------------------------
// CRUD
// ---------------------------------------------------------------------------

#[tokio::test]
async fn save_generates_unique_ids() {
    for kind in BOTH {
        let (_dir, store) = open(kind).await;
        let mut ids = std::collections::HashSet::new();

        for i in 0..20 {
            let saved = store.save(sample(&format!("s{}", i))).await.unwrap();
            assert!(!saved.id.is_empty());
            assert!(is_generated_id(&saved.id));
            ids.insert(saved.id);
        }

        assert_eq!(ids.len(), 20, "{:?}", kind);
    }
}

#[tokio::test]
async fn save_then_get_returns_same_record() {
    for kind in BOTH {
        let (_dir, store) = open(kind).await;
        let saved = store.save(sample("Roundtrip")).await.unwrap();

        let fetched = store.get(&saved.id).await.unwrap();
        assert_eq!(fetched, Some(saved), "{:?}", kind);
        assert_eq!(store.get("snippet-0-nothing").await.unwrap(), None);
    }
}

#[tokio::test]
async fn update_changes_only_requested_fields() {
    for kind in BOTH {
        let (_dir, store) = open(kind).await;
        let saved = store.save(sample("Before")).await.unwrap();

        let updated = store
            .update(
                &saved.id,
                SnippetPatch {
                    name: Some("X".into()),
                    ..SnippetPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.name, "X");
        assert_eq!(updated.html, saved.html);
        assert_eq!(updated.css, saved.css);
        assert_eq!(updated.js, saved.js);
        assert_eq!(updated.created_at, saved.created_at);
        assert!(updated.updated_at > saved.updated_at);
        assert_eq!(store.get(&saved.id).await.unwrap(), Some(updated));
    }
}

#[tokio::test]
async fn update_of_unknown_id_fails_on_both_backends() {
    for kind in BOTH {
        let (_dir, store) = open(kind).await;
        let err = store
            .update("never-saved", SnippetPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)), "{:?}: {}", kind, err);
    }
}

#[tokio::test]
async fn delete_is_idempotent() {
    for kind in BOTH {
        let (_dir, store) = open(kind).await;
        let saved = store.save(sample("Doomed")).await.unwrap();

        assert!(store.delete(&saved.id).await.unwrap());
        assert!(store.delete(&saved.id).await.unwrap());
        assert!(store.delete("snippet-0-ghost").await.unwrap());
        assert_eq!(store.get(&saved.id).await.unwrap(), None);
    }
}

#[tokio::test]
async fn stats_total_tracks_saves_and_deletes() {
    for kind in BOTH {
        let (_dir, store) = open(kind).await;
        let mut ids = Vec::new();
        for i in 0..5 {
            ids.push(store.save(sample(&format!("n{}", i))).await.unwrap().id);
        }
        store.delete(&ids[1]).await.unwrap();
        store.delete(&ids[3]).await.unwrap();
        store.delete("missing").await.unwrap();

        let stats = store.stats().await.unwrap();
        let all = store.get_all().await.unwrap();
        assert_eq!(stats.total, all.len());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.backend, kind);
        assert!(stats.total_size > 0);
    }
}

#[tokio::test]
async fn clear_removes_everything() {
    for kind in BOTH {
        let (_dir, store) = open(kind).await;
        store.save(sample("a")).await.unwrap();
        store.save(sample("b")).await.unwrap();

        assert!(store.clear().await.unwrap());
        assert!(store.get_all().await.unwrap().is_empty());
        assert_eq!(store.stats().await.unwrap().total, 0);
    }
}

// ---------------------------------------------------------------------------
// Import / export
// ---------------------------------------------------------------------------

#[tokio::test]
async fn export_clear_import_restores_collection() {
    for kind in BOTH {
        let (_dir, store) = open(kind).await;
        for name in ["Button", "Card", "Modal"] {
            store.save(sample(name)).await.unwrap();
        }
        let before = by_id(store.get_all().await.unwrap());

        let exported = store.export_all().await.unwrap();
        store.clear().await.unwrap();
        store.import_all(&exported).await.unwrap();

        let after = by_id(store.get_all().await.unwrap());
        assert_eq!(
            before.keys().collect::<Vec<_>>(),
            after.keys().collect::<Vec<_>>()
        );
        for (id, original) in &before {
            let restored = &after[id];
            assert_eq!(restored.name, original.name);
            assert_eq!(restored.html, original.html);
            assert_eq!(restored.css, original.css);
            assert_eq!(restored.js, original.js);
            assert_eq!(restored.created_at, original.created_at);
        }
    }
}

#[tokio::test]
async fn export_is_a_pretty_json_array() {
    let (_dir, store) = open(BackendKind::Flat).await;
    store.save(sample("Pretty")).await.unwrap();

    let exported = store.export_all().await.unwrap();
    assert!(exported.starts_with("[\n"));
    let value: serde_json::Value = serde_json::from_str(&exported).unwrap();
    let first = &value.as_array().unwrap()[0];
    assert!(first.get("createdAt").is_some());
    assert!(first.get("updatedAt").is_some());
}

#[tokio::test]
async fn import_accepts_exports_from_the_browser() {
    let payload = r#"[
      {
        "id": "snippet-1700000000000-k3j9x2m1q",
        "name": "Sin título",
        "html": "<p>hola</p>",
        "css": "",
        "js": "",
        "createdAt": "2023-11-14T22:13:20.000Z",
        "updatedAt": "2023-11-14T22:13:20.000Z"
      }
    ]"#;

    for kind in BOTH {
        let (_dir, store) = open(kind).await;
        let saved = store.import_all(payload).await.unwrap();

        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].id, "snippet-1700000000000-k3j9x2m1q");
        assert_eq!(saved[0].created_at.timestamp(), 1_700_000_000);
        assert!(saved[0].updated_at > saved[0].created_at);
    }
}

#[tokio::test]
async fn import_rejects_objects() {
    for kind in BOTH {
        let (_dir, store) = open(kind).await;
        let err = store.import_all(r#"{"snippets": []}"#).await.unwrap_err();
        assert!(matches!(err, StoreError::Format(_)), "{:?}", kind);
    }
}

// ---------------------------------------------------------------------------
// Backend equivalence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sorted_listings_agree_across_backends() {
    let (_a, structured) = open(BackendKind::Structured).await;
    let (_b, flat) = open(BackendKind::Flat).await;

    let payload = r#"[
        {"id": "c", "name": "Modal", "createdAt": "2024-01-03T00:00:00Z"},
        {"id": "a", "name": "Button", "createdAt": "2024-01-02T00:00:00Z"},
        {"id": "b", "name": "Button", "createdAt": "2024-01-01T00:00:00Z"},
        {"id": "d", "name": "Card", "createdAt": "2024-01-04T00:00:00Z"}
    ]"#;
    structured.import_all(payload).await.unwrap();
    flat.import_all(payload).await.unwrap();

    for key in [SortKey::Name, SortKey::CreatedAt] {
        for order in [SortOrder::Ascending, SortOrder::Descending] {
            let left: Vec<String> = structured
                .list_sorted(key, order)
                .await
                .unwrap()
                .into_iter()
                .map(|s| s.id)
                .collect();
            let right: Vec<String> = flat
                .list_sorted(key, order)
                .await
                .unwrap()
                .into_iter()
                .map(|s| s.id)
                .collect();
            assert_eq!(left, right, "{:?} {:?}", key, order);
        }
    }

    let by_name: Vec<String> = flat
        .list_sorted(SortKey::Name, SortOrder::Ascending)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(by_name, vec!["a", "b", "d", "c"]);

    let ids = |v: Vec<Snippet>| v.into_iter().map(|s| s.id).collect::<Vec<_>>();
    assert_eq!(
        ids(structured.get_all().await.unwrap()),
        ids(flat.get_all().await.unwrap())
    );
}

#[tokio::test]
async fn updated_index_follows_updates() {
    for kind in BOTH {
        let (_dir, store) = open(kind).await;
        let first = store.save(sample("first")).await.unwrap();
        let second = store.save(sample("second")).await.unwrap();

        store
            .update(
                &first.id,
                SnippetPatch {
                    js: Some("1".into()),
                    ..SnippetPatch::default()
                },
            )
            .await
            .unwrap();

        let newest = store
            .list_sorted(SortKey::UpdatedAt, SortOrder::Descending)
            .await
            .unwrap();
        assert_eq!(newest[0].id, first.id, "{:?}", kind);
        assert_eq!(newest[1].id, second.id);
    }
}

// ---------------------------------------------------------------------------
// Backend selection and persistence
// ---------------------------------------------------------------------------

#[tokio::test]
async fn data_survives_reopen() {
    for kind in BOTH {
        let dir = temp_data_dir();
        let saved = {
            let store = SnippetStore::open(config_for(&dir, kind)).await.unwrap();
            store.save(sample("Persistent")).await.unwrap()
        };

        let store = SnippetStore::open(config_for(&dir, kind)).await.unwrap();
        assert_eq!(store.get(&saved.id).await.unwrap(), Some(saved), "{:?}", kind);
    }
}

#[tokio::test]
async fn fallback_is_permanent_for_the_instance() {
    let dir = temp_data_dir();
    let config = StoreConfig::new(dir.path());
    std::fs::write(config.database_path(), b"not a database").unwrap();

    let store = SnippetStore::new(config.clone());
    let saved = store.save(sample("Fallback")).await.unwrap();
    assert_eq!(store.ready().await.unwrap(), BackendKind::Flat);

    // The obstacle going away does not switch this instance over
    std::fs::remove_file(config.database_path()).unwrap();
    store.save(sample("Still flat")).await.unwrap();
    assert_eq!(store.ready().await.unwrap(), BackendKind::Flat);
    assert!(!config.database_path().exists());
    assert_eq!(store.get_all().await.unwrap().len(), 2);
    assert!(store.get(&saved.id).await.unwrap().is_some());
}

#[tokio::test]
async fn corrupt_flat_file_reads_as_empty_store() {
    let dir = temp_data_dir();
    let config = config_for(&dir, BackendKind::Flat);
    std::fs::write(config.flat_path(), "[{\"id\": ").unwrap();

    let store = SnippetStore::open(config).await.unwrap();
    assert!(store.get_all().await.unwrap().is_empty());
    assert_eq!(store.stats().await.unwrap().total, 0);
}

#[tokio::test]
async fn injected_backend_is_used() {
    let dir = temp_data_dir();
    let path = dir.path().join("custom.json");
    let store = SnippetStore::with_backend(
        StoreConfig::new(dir.path()),
        Box::new(FlatFileBackend::new(&path)),
    );

    store.save(sample("Injected")).await.unwrap();
    assert_eq!(store.ready().await.unwrap(), BackendKind::Flat);
    assert!(path.exists());
}

#[tokio::test]
async fn second_store_on_same_dir_waits_for_the_database() {
    let dir = temp_data_dir();
    let config = StoreConfig::new(dir.path());
    let first = SnippetStore::open(config.clone()).await.unwrap();
    first.save(sample("From first")).await.unwrap();

    let second = SnippetStore::new(config.clone().with_lock_timeout(Duration::from_secs(5)));
    let release = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(first);
    };
    let (kind, ()) = tokio::join!(second.ready(), release);

    assert_eq!(kind.unwrap(), BackendKind::Structured);
    let saved = second.save(sample("From second")).await.unwrap();
    drop(second);

    // A later run sees both records in one place
    let third = SnippetStore::open(config.clone()).await.unwrap();
    assert_eq!(third.ready().await.unwrap(), BackendKind::Structured);
    assert_eq!(third.get_all().await.unwrap().len(), 2);
    assert!(third.get(&saved.id).await.unwrap().is_some());
    assert!(!config.flat_path().exists());
}

#[tokio::test]
async fn second_store_never_splits_into_flat_file() {
    let dir = temp_data_dir();
    let config = StoreConfig::new(dir.path());
    let _first = SnippetStore::open(config.clone()).await.unwrap();

    let second = SnippetStore::new(config.clone().with_lock_timeout(Duration::from_millis(50)));
    assert!(matches!(
        second.save(sample("Nowhere")).await,
        Err(StoreError::Locked(_))
    ));
    assert!(!config.flat_path().exists());
}
