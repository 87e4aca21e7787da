use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use harvest_core::{DateWindow, JobRecord, JobStatus, MarkOutcome, WriteOutcome};
use harvest_engine::{Clock, MemoryStore, RecordStore, SqliteStore};
use pretty_assertions::assert_eq;
use serde_json::json;

/// A clock the test can move forward.
#[derive(Clone)]
struct ManualClock(Arc<Mutex<DateTime<Utc>>>);

impl ManualClock {
    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> Self {
        Self(Arc::new(Mutex::new(
            Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap(),
        )))
    }

    fn set(&self, y: i32, m: u32, d: u32, h: u32, min: u32) {
        *self.0.lock().unwrap() = Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap();
    }

    fn clock(&self) -> Clock {
        let inner = self.0.clone();
        Arc::new(move || *inner.lock().unwrap())
    }
}

async fn backends(clock: &ManualClock) -> Vec<(&'static str, Arc<dyn RecordStore>)> {
    let sqlite = SqliteStore::in_memory()
        .await
        .expect("open sqlite")
        .with_clock(clock.clock());
    let memory: Arc<dyn RecordStore> = Arc::new(MemoryStore::new().with_clock(clock.clock()));
    let sqlite: Arc<dyn RecordStore> = Arc::new(sqlite);
    vec![("memory", memory), ("sqlite", sqlite)]
}

#[tokio::test]
async fn create_job_is_idempotent() {
    let clock = ManualClock::at(2024, 1, 1, 12, 0);
    for (name, store) in backends(&clock).await {
        assert_eq!(store.create_job("s_1").await.unwrap(), WriteOutcome::Created, "{name}");
        assert_eq!(store.create_job("s_1").await.unwrap(), WriteOutcome::Duplicate, "{name}");
        store.create_job("s_2").await.unwrap();
        assert_eq!(
            store.list_pending_jobs().await.unwrap(),
            vec!["s_1".to_string(), "s_2".to_string()],
            "{name}"
        );
    }
}

#[tokio::test]
async fn processed_jobs_leave_the_pending_list_for_good() {
    let clock = ManualClock::at(2024, 1, 1, 12, 0);
    for (name, store) in backends(&clock).await {
        store.create_job("s_1").await.unwrap();
        store.create_job("s_2").await.unwrap();

        assert_eq!(store.mark_job_processed("s_1").await.unwrap(), MarkOutcome::Updated);
        // Marking twice is harmless and never resurrects the job.
        assert_eq!(store.mark_job_processed("s_1").await.unwrap(), MarkOutcome::Updated);
        assert_eq!(store.mark_job_processed("nope").await.unwrap(), MarkOutcome::NotFound);
        // Re-creating a processed handle does not reset it to pending.
        assert_eq!(store.create_job("s_1").await.unwrap(), WriteOutcome::Duplicate);

        assert_eq!(store.list_pending_jobs().await.unwrap(), vec!["s_2".to_string()], "{name}");
    }
}

#[tokio::test]
async fn one_response_per_job() {
    let clock = ManualClock::at(2024, 1, 1, 12, 0);
    for (name, store) in backends(&clock).await {
        let first = json!([{ "snippet": "first" }]);
        let second = json!([{ "snippet": "second" }]);
        assert_eq!(store.save_response("s_1", &first).await.unwrap(), WriteOutcome::Created);
        assert_eq!(
            store.save_response("s_1", &second).await.unwrap(),
            WriteOutcome::Duplicate,
            "{name}"
        );

        let rows = store.list_unextracted(10, 0).await.unwrap();
        assert_eq!(rows.len(), 1, "{name}");
        assert_eq!(rows[0].payload, first, "{name}");
        assert!(!rows[0].extracted);
    }
}

#[tokio::test]
async fn unextracted_set_only_shrinks() {
    let clock = ManualClock::at(2024, 1, 1, 12, 0);
    for (name, store) in backends(&clock).await {
        for id in ["a", "b", "c"] {
            store.save_response(id, &json!({ "id": id })).await.unwrap();
        }
        let ids = |rows: Vec<harvest_core::ResponseRecord>| -> Vec<String> {
            rows.into_iter().map(|r| r.job_id).collect()
        };

        assert_eq!(ids(store.list_unextracted(2, 0).await.unwrap()), vec!["a", "b"], "{name}");
        assert_eq!(ids(store.list_unextracted(2, 1).await.unwrap()), vec!["b", "c"], "{name}");

        assert_eq!(store.mark_extracted("b").await.unwrap(), MarkOutcome::Updated);
        assert_eq!(store.mark_extracted("b").await.unwrap(), MarkOutcome::Updated);
        assert_eq!(store.mark_extracted("zzz").await.unwrap(), MarkOutcome::NotFound);
        assert_eq!(ids(store.list_unextracted(10, 0).await.unwrap()), vec!["a", "c"], "{name}");

        // A duplicate save does not bring an extracted response back.
        store.save_response("b", &json!({ "id": "again" })).await.unwrap();
        assert_eq!(ids(store.list_unextracted(10, 0).await.unwrap()), vec!["a", "c"], "{name}");
    }
}

#[tokio::test]
async fn emails_are_unique_and_keep_first_timestamp() {
    let clock = ManualClock::at(2024, 1, 1, 9, 0);
    for (name, store) in backends(&clock).await {
        clock.set(2024, 1, 1, 9, 0);
        assert_eq!(store.save_email("a@b.com").await.unwrap(), WriteOutcome::Created);
        clock.set(2024, 1, 3, 9, 0);
        assert_eq!(
            store.save_email("a@b.com").await.unwrap(),
            WriteOutcome::Duplicate,
            "{name}"
        );

        let emails = store.query_emails(&DateWindow::all()).await.unwrap();
        assert_eq!(emails.len(), 1, "{name}");
        assert_eq!(
            emails[0].created_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
            "{name}"
        );
    }
}

#[tokio::test]
async fn end_date_includes_the_whole_day() {
    let clock = ManualClock::at(2024, 1, 1, 0, 0);
    for (name, store) in backends(&clock).await {
        clock.set(2023, 12, 31, 23, 59);
        store.save_email("before@x.com").await.unwrap();
        clock.set(2024, 1, 1, 0, 0);
        store.save_email("start@x.com").await.unwrap();
        clock.set(2024, 1, 5, 23, 59);
        store.save_email("late@x.com").await.unwrap();
        clock.set(2024, 1, 6, 0, 0);
        store.save_email("after@x.com").await.unwrap();

        let window = DateWindow::parse(Some("2024-01-01"), Some("2024-01-05")).unwrap();
        let found: Vec<String> = store
            .query_emails(&window)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.address)
            .collect();
        assert_eq!(found, vec!["late@x.com", "start@x.com"], "{name}");

        let open_start = DateWindow::parse(None, Some("2024-01-01")).unwrap();
        let found: Vec<String> = store
            .query_emails(&open_start)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.address)
            .collect();
        assert_eq!(found, vec!["start@x.com", "before@x.com"], "{name}");
    }
}

#[tokio::test]
async fn queries_return_newest_first() {
    let clock = ManualClock::at(2024, 2, 1, 8, 0);
    for (name, store) in backends(&clock).await {
        clock.set(2024, 2, 1, 8, 0);
        store.save_email("old@x.com").await.unwrap();
        clock.set(2024, 2, 3, 8, 0);
        store.save_email("new@x.com").await.unwrap();
        clock.set(2024, 2, 2, 8, 0);
        store.save_email("mid@x.com").await.unwrap();

        let all: Vec<String> = store
            .query_emails(&DateWindow::all())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.address)
            .collect();
        assert_eq!(all, vec!["new@x.com", "mid@x.com", "old@x.com"], "{name}");

        let empty = DateWindow::parse(Some("2030-01-01"), None).unwrap();
        assert!(store.query_emails(&empty).await.unwrap().is_empty(), "{name}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_writes_have_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("race.db").display());
    let store = Arc::new(SqliteStore::open(&url).await.unwrap());

    let mut tasks = Vec::new();
    for n in 0..8 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let response = store
                .save_response("s_race", &json!({ "writer": n }))
                .await
                .unwrap();
            let email = store.save_email("race@x.com").await.unwrap();
            (response, email)
        }));
    }

    let mut created_responses = 0;
    let mut created_emails = 0;
    for task in tasks {
        let (response, email) = task.await.unwrap();
        created_responses += usize::from(response.is_created());
        created_emails += usize::from(email.is_created());
    }
    assert_eq!(created_responses, 1);
    assert_eq!(created_emails, 1);
    assert_eq!(store.list_unextracted(10, 0).await.unwrap().len(), 1);
}

#[tokio::test]
async fn file_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("harvest.db").display());
    {
        let store = SqliteStore::open(&url).await.unwrap();
        store.create_job("s_1").await.unwrap();
        store.save_email("kept@x.com").await.unwrap();
        store.pool().close().await;
    }

    let store = SqliteStore::open(&url).await.unwrap();
    assert_eq!(store.create_job("s_1").await.unwrap(), WriteOutcome::Duplicate);
    assert_eq!(store.list_pending_jobs().await.unwrap(), vec!["s_1".to_string()]);
    assert_eq!(store.query_emails(&DateWindow::all()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sqlite_status_column_follows_job_status() {
    let store = SqliteStore::in_memory().await.unwrap();
    store.create_job("s_1").await.unwrap();
    assert_eq!(
        store.job("s_1").await.unwrap(),
        Some(JobRecord::pending("s_1"))
    );

    store.mark_job_processed("s_1").await.unwrap();
    let raw: String = sqlx::query_scalar("SELECT status FROM jobs WHERE job_id = 's_1'")
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(raw, JobStatus::Processed.as_str());
    let job = store.job("s_1").await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Processed);
    assert!(job.status.is_terminal());
    assert_eq!(store.job("missing").await.unwrap(), None);

    // An unknown status is reported, not silently treated as pending.
    sqlx::query("UPDATE jobs SET status = 'archived' WHERE job_id = 's_1'")
        .execute(store.pool())
        .await
        .unwrap();
    assert!(matches!(
        store.job("s_1").await,
        Err(harvest_engine::StoreError::Corrupt(_))
    ));
    assert!(store.list_pending_jobs().await.unwrap().is_empty());
}
