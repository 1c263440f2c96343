//! SqliteMetadataStore: pending set, claims, atomic upsert

mod helpers;

use helpers::*;
use mscope_ingest::db::claims::try_claim;
use mscope_ingest::{MetadataStore, PopulationScheduler, UpsertOutcome};
use tempfile::TempDir;

const V4: &str = "Miniscope-DAQ-V4";

#[tokio::test]
async fn test_list_missing_excludes_computed() {
    let (_db_dir, store) = create_test_db().await;
    let data = TempDir::new().unwrap();
    write_avi(&data.path().join("a/0.avi"), 16, 16, 3, 10);

    let computed = key("s1", 0);
    let pending = key("s1", 1);
    register(store.pool(), &computed, V4, "a").await;
    register(store.pool(), &pending, V4, "missing").await;

    PopulationScheduler::new(store.clone(), test_config(vec![data.path().to_path_buf()]))
        .populate(false)
        .await
        .unwrap();

    let missing = store.list_missing().await.unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].key, pending);
    assert_eq!(missing[0].recording_directory, "missing");
    assert_eq!(store.list_references().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_duplicate_registration_ignored() {
    let (_db_dir, store) = create_test_db().await;
    let k = key("s2", 0);
    register(store.pool(), &k, V4, "a").await;

    let again = mscope_ingest::RecordingReference {
        key: k.clone(),
        acquisition_software: V4.to_string(),
        recording_directory: "b".to_string(),
    };
    let inserted = mscope_ingest::db::recordings::register_recording(store.pool(), &again)
        .await
        .unwrap();
    assert!(!inserted);
    assert_eq!(store.list_references().await.unwrap()[0].recording_directory, "a");
}

#[tokio::test]
async fn test_claim_is_exclusive_until_released() {
    let (_db_dir, store) = create_test_db().await;
    let k = key("s3", 0);
    register(store.pool(), &k, V4, "a").await;

    assert!(store.claim(&k, "worker-a", 3600).await.unwrap());
    assert!(!store.claim(&k, "worker-b", 3600).await.unwrap());
    // Re-claiming by the holder refreshes it
    assert!(store.claim(&k, "worker-a", 3600).await.unwrap());

    // Release by a non-holder is a no-op
    store.release(&k, "worker-b").await.unwrap();
    assert!(!store.claim(&k, "worker-b", 3600).await.unwrap());

    store.release(&k, "worker-a").await.unwrap();
    assert!(store.claim(&k, "worker-b", 3600).await.unwrap());
}

#[tokio::test]
async fn test_stale_claim_taken_over() {
    let (_db_dir, store) = create_test_db().await;
    let k = key("s4", 0);
    register(store.pool(), &k, V4, "a").await;

    assert!(try_claim(store.pool(), &k, "crashed", 3600).await.unwrap());
    sqlx::query("UPDATE recording_claims SET claimed_at = claimed_at - 7200")
        .execute(store.pool())
        .await
        .unwrap();

    assert!(store.claim(&k, "rescuer", 3600).await.unwrap());
}

#[tokio::test]
async fn test_claimed_recording_skipped_by_scheduler() {
    let (_db_dir, store) = create_test_db().await;
    let data = TempDir::new().unwrap();
    write_avi(&data.path().join("a/0.avi"), 16, 16, 3, 10);
    let k = key("s5", 0);
    register(store.pool(), &k, V4, "a").await;

    assert!(store.claim(&k, "other-worker", 3600).await.unwrap());

    let scheduler = PopulationScheduler::new(store.clone(), test_config(vec![data.path().to_path_buf()]))
        .with_worker_id("this-worker");
    let report = scheduler.populate(false).await.unwrap();
    assert_eq!(report.skipped, vec![k.clone()]);
    assert!(!store.has_metadata(&k).await.unwrap());

    store.release(&k, "other-worker").await.unwrap();
    let report = scheduler.populate(false).await.unwrap();
    assert_eq!(report.succeeded, vec![k.clone()]);

    // Claim released after processing
    assert!(store.claim(&k, "other-worker", 3600).await.unwrap());
}

#[tokio::test]
async fn test_upsert_without_force_keeps_existing() {
    let (_db_dir, store) = create_test_db().await;
    let data = TempDir::new().unwrap();
    write_avi(&data.path().join("a/0.avi"), 16, 16, 3, 10);
    let k = key("s6", 0);
    register(store.pool(), &k, V4, "a").await;

    PopulationScheduler::new(store.clone(), test_config(vec![data.path().to_path_buf()]))
        .populate(false)
        .await
        .unwrap();

    let original = store.load_metadata(&k).await.unwrap().unwrap();
    let mut changed = original.clone();
    changed.total_frames = 99;
    changed.files.clear();

    assert_eq!(store.upsert_metadata(&changed, false).await.unwrap(), UpsertOutcome::Unchanged);
    assert_eq!(store.load_metadata(&k).await.unwrap().unwrap(), original);

    assert_eq!(store.upsert_metadata(&changed, true).await.unwrap(), UpsertOutcome::Replaced);
    let replaced = store.load_metadata(&k).await.unwrap().unwrap();
    assert_eq!(replaced.total_frames, 99);
    assert!(replaced.files.is_empty());
}
