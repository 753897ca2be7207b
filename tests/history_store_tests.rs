use chrono::Utc;
use healthmesh::{HealthMeshError, HistoryStore, JsonHistoryStore, MemoryHistoryStore, WellnessPlan};

fn sample_plan(user_id: &str, query: &str) -> WellnessPlan {
    WellnessPlan {
        user_id: user_id.to_string(),
        query: query.to_string(),
        symptom_analysis: "mild, monitor for 48h".to_string(),
        lifestyle: "regular sleep schedule".to_string(),
        diet: "light meals, plenty of fluids".to_string(),
        fitness: "short walks only".to_string(),
        synthesized_guidance: "## Overview\nTake it easy for a few days.".to_string(),
        recommendations: vec!["rest".to_string(), "hydrate".to_string()],
        agent_flow: Vec::new(),
        table_markdown: String::new(),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn json_store_round_trips_plans_across_instances() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");

    {
        let store = JsonHistoryStore::new(&path);
        store.append("alice", sample_plan("alice", "headache")).await.unwrap();
        store.append("alice", sample_plan("alice", "fatigue")).await.unwrap();
        store.append("bob", sample_plan("bob", "sore throat")).await.unwrap();
    }

    // A brand-new store over the same file sees everything.
    let store = JsonHistoryStore::new(&path);
    let alice = store.list("alice").await.unwrap();
    assert_eq!(alice.len(), 2);
    assert_eq!(alice[0].query, "headache");
    assert_eq!(alice[1].query, "fatigue");
    assert_eq!(alice[1].recommendations, vec!["rest", "hydrate"]);

    let bob = store.list("bob").await.unwrap();
    assert_eq!(bob.len(), 1);
    assert_eq!(bob[0].query, "sore throat");
}

#[tokio::test]
async fn unknown_user_lists_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonHistoryStore::new(dir.path().join("history.json"));
    assert!(store.list("nobody").await.unwrap().is_empty());
}

#[tokio::test]
async fn parent_directories_are_created_on_first_append() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("history.json");

    let store = JsonHistoryStore::new(&path);
    store.append("alice", sample_plan("alice", "headache")).await.unwrap();

    assert!(path.exists());
}

#[tokio::test]
async fn corrupt_file_surfaces_as_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.json");
    std::fs::write(&path, "{not json").unwrap();

    let store = JsonHistoryStore::new(&path);
    let result = store.list("alice").await;
    assert!(matches!(result, Err(HealthMeshError::Storage(_))));
}

#[tokio::test]
async fn concurrent_appends_are_all_retained() {
    let dir = tempfile::tempdir().unwrap();
    let store = std::sync::Arc::new(JsonHistoryStore::new(dir.path().join("history.json")));

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .append("alice", sample_plan("alice", &format!("query {}", i)))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(store.list("alice").await.unwrap().len(), 8);
}

#[tokio::test]
async fn memory_store_keeps_users_separate_in_insertion_order() {
    let store = MemoryHistoryStore::new();

    store.append("alice", sample_plan("alice", "first")).await.unwrap();
    store.append("alice", sample_plan("alice", "second")).await.unwrap();
    store.append("bob", sample_plan("bob", "other")).await.unwrap();

    let alice = store.list("alice").await.unwrap();
    assert_eq!(alice.len(), 2);
    assert_eq!(alice[0].query, "first");
    assert_eq!(alice[1].query, "second");
    assert_eq!(store.list("bob").await.unwrap().len(), 1);
    assert!(store.list("carol").await.unwrap().is_empty());
}
