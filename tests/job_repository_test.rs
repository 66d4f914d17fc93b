/// Job repository tests - PostgreSQL operations
///
/// Tests cover:
/// - Insert and lookup, including the one-active-job-per-game index
/// - Atomic dequeue in FIFO order, respecting retry backoff
/// - State transitions (complete, retry, fail, cancel, reset)
/// - Counts, batches and the retention sweep
///
/// These need a PostgreSQL server: set TEST_DATABASE_URL and run with
/// `cargo test -- --ignored`.
mod utils;

use boardshelf_lib::modules::jobs::{
    JobRepository, JobRepositoryImpl, JobStatus, NewScrapeJob, ScrapeSubject,
};
use chrono::{Duration, Utc};
use utils::db;
use uuid::Uuid;

fn repository() -> JobRepositoryImpl {
    db::clean_test_db();
    JobRepositoryImpl::new(db::get_test_db_pool())
}

fn new_job(game_id: &str, batch_id: Option<Uuid>) -> NewScrapeJob {
    NewScrapeJob::new(&ScrapeSubject::new(game_id, "Test Game"), 3, batch_id)
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn insert_and_retrieve_job() {
    let _guard = db::acquire_test_lock();
    let repo = repository();

    let inserted = repo.insert(new_job("13", None)).await.unwrap().unwrap();
    assert_eq!(inserted.status, JobStatus::Pending);
    assert_eq!(inserted.retry_count, 0);
    assert_eq!(inserted.max_retries, 3);

    let fetched = repo.get_by_id(inserted.id).await.unwrap().unwrap();
    assert_eq!(fetched.game_id, "13");
    assert!(repo.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn second_active_job_for_game_is_rejected() {
    let _guard = db::acquire_test_lock();
    let repo = repository();

    let first = repo.insert(new_job("13", None)).await.unwrap().unwrap();
    assert!(repo.insert(new_job("13", None)).await.unwrap().is_none());

    let active = repo.find_active_by_game("13").await.unwrap().unwrap();
    assert_eq!(active.id, first.id);

    // Terminal jobs free the slot
    repo.mark_completed(first.id).await.unwrap();
    assert!(repo.find_active_by_game("13").await.unwrap().is_none());
    assert!(repo.insert(new_job("13", None)).await.unwrap().is_some());
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn dequeue_claims_oldest_pending_job() {
    let _guard = db::acquire_test_lock();
    let repo = repository();

    let newer = repo.insert(new_job("2", None)).await.unwrap().unwrap();
    let older = repo.insert(new_job("1", None)).await.unwrap().unwrap();
    db::backdate(older.id, Duration::minutes(5));

    let claimed = repo.dequeue().await.unwrap().unwrap();
    assert_eq!(claimed.id, older.id);
    assert_eq!(claimed.status, JobStatus::Processing);
    assert!(claimed.started_at.is_some());

    let claimed = repo.dequeue().await.unwrap().unwrap();
    assert_eq!(claimed.id, newer.id);
    assert!(repo.dequeue().await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn dequeue_skips_jobs_in_backoff() {
    let _guard = db::acquire_test_lock();
    let repo = repository();

    let job = repo.insert(new_job("13", None)).await.unwrap().unwrap();
    repo.dequeue().await.unwrap().unwrap();

    let retry_at = Utc::now() + Duration::minutes(10);
    repo.mark_retry(job.id, 1, "Attempt 1/4 failed: timeout", retry_at)
        .await
        .unwrap();

    let waiting = repo.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(waiting.status, JobStatus::Pending);
    assert_eq!(waiting.retry_count, 1);
    assert!(waiting.started_at.is_none());
    assert_eq!(waiting.error.as_deref(), Some("Attempt 1/4 failed: timeout"));

    assert!(repo.dequeue().await.unwrap().is_none());

    let next = repo.next_eligible_at().await.unwrap().unwrap();
    assert!((next - retry_at).num_milliseconds().abs() < 1);
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn job_due_now_is_claimable_and_reported_due() {
    let _guard = db::acquire_test_lock();
    let repo = repository();

    let job = repo.insert(new_job("13", None)).await.unwrap().unwrap();
    repo.dequeue().await.unwrap().unwrap();

    let retry_at = Utc::now() - Duration::milliseconds(50);
    repo.mark_retry(job.id, 1, "Attempt 1/4 failed: timeout", retry_at)
        .await
        .unwrap();

    // Whatever next_eligible_at reports as due, dequeue must be able to claim
    let due = repo.next_eligible_at().await.unwrap().unwrap();
    assert!(due <= Utc::now());

    let before = Utc::now();
    let claimed = repo.dequeue().await.unwrap().unwrap();
    assert_eq!(claimed.id, job.id);
    assert!(claimed.started_at.unwrap() >= before - Duration::milliseconds(1));
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn completion_clears_error_and_failure_keeps_it() {
    let _guard = db::acquire_test_lock();
    let repo = repository();

    let ok = repo.insert(new_job("1", None)).await.unwrap().unwrap();
    let bad = repo.insert(new_job("2", None)).await.unwrap().unwrap();

    repo.mark_retry(ok.id, 1, "Attempt 1/4 failed: boom", Utc::now())
        .await
        .unwrap();
    repo.mark_completed(ok.id).await.unwrap();
    repo.mark_failed(bad.id, "Failed after 3 retries: boom")
        .await
        .unwrap();

    let ok = repo.get_by_id(ok.id).await.unwrap().unwrap();
    assert_eq!(ok.status, JobStatus::Completed);
    assert!(ok.error.is_none());
    assert!(ok.completed_at.is_some());

    let bad = repo.get_by_id(bad.id).await.unwrap().unwrap();
    assert_eq!(bad.status, JobStatus::Failed);
    assert_eq!(bad.error.as_deref(), Some("Failed after 3 retries: boom"));
    assert!(bad.completed_at.is_some());
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn cancellation_only_touches_pending_jobs() {
    let _guard = db::acquire_test_lock();
    let repo = repository();

    let running = repo.insert(new_job("1", None)).await.unwrap().unwrap();
    db::backdate(running.id, Duration::minutes(1));
    let a = repo.insert(new_job("2", None)).await.unwrap().unwrap();
    repo.insert(new_job("3", None)).await.unwrap().unwrap();
    repo.dequeue().await.unwrap().unwrap();

    assert!(repo.cancel_pending_job(a.id).await.unwrap());
    assert!(!repo.cancel_pending_job(a.id).await.unwrap());
    assert!(!repo.cancel_pending_job(running.id).await.unwrap());

    assert_eq!(repo.cancel_all_pending().await.unwrap(), 1);

    let counts = repo.count_by_status().await.unwrap();
    assert_eq!(counts.pending, 0);
    assert_eq!(counts.processing, 1);
    assert_eq!(counts.cancelled, 2);

    let cancelled = repo.get_by_id(a.id).await.unwrap().unwrap();
    assert!(cancelled.completed_at.is_some());
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn reset_processing_requeues_without_counting_a_retry() {
    let _guard = db::acquire_test_lock();
    let repo = repository();

    let job = repo.insert(new_job("13", None)).await.unwrap().unwrap();
    repo.dequeue().await.unwrap().unwrap();

    assert_eq!(repo.reset_processing().await.unwrap(), 1);
    assert_eq!(repo.reset_processing().await.unwrap(), 0);

    let job = repo.get_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.started_at.is_none());
    assert_eq!(job.retry_count, 0);
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn batch_counts_and_latest_active_batch() {
    let _guard = db::acquire_test_lock();
    let repo = repository();

    let old_batch = Uuid::new_v4();
    let new_batch = Uuid::new_v4();

    let old = repo.insert(new_job("1", Some(old_batch))).await.unwrap().unwrap();
    db::backdate(old.id, Duration::minutes(10));
    let done = repo.insert(new_job("2", Some(new_batch))).await.unwrap().unwrap();
    repo.insert(new_job("3", Some(new_batch))).await.unwrap().unwrap();
    repo.mark_completed(done.id).await.unwrap();

    let counts = repo.batch_status_counts(new_batch).await.unwrap();
    assert_eq!(counts.total(), 2);
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.pending, 1);

    assert_eq!(repo.latest_active_batch().await.unwrap(), Some(new_batch));

    assert_eq!(repo.cancel_all_pending().await.unwrap(), 2);
    assert!(repo.latest_active_batch().await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn recent_jobs_are_newest_first() {
    let _guard = db::acquire_test_lock();
    let repo = repository();

    let oldest = repo.insert(new_job("1", None)).await.unwrap().unwrap();
    db::backdate(oldest.id, Duration::minutes(2));
    let middle = repo.insert(new_job("2", None)).await.unwrap().unwrap();
    db::backdate(middle.id, Duration::minutes(1));
    let newest = repo.insert(new_job("3", None)).await.unwrap().unwrap();

    let recent = repo.get_recent(2).await.unwrap();
    let ids: Vec<Uuid> = recent.iter().map(|job| job.id).collect();
    assert_eq!(ids, vec![newest.id, middle.id]);
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
async fn retention_sweep_removes_old_terminal_jobs() {
    let _guard = db::acquire_test_lock();
    let repo = repository();

    let expired = repo.insert(new_job("1", None)).await.unwrap().unwrap();
    repo.mark_completed(expired.id).await.unwrap();
    db::backdate(expired.id, Duration::days(8));

    let recent = repo.insert(new_job("2", None)).await.unwrap().unwrap();
    repo.mark_failed(recent.id, "Failed after 3 retries: boom")
        .await
        .unwrap();

    let stale_pending = repo.insert(new_job("3", None)).await.unwrap().unwrap();
    db::backdate(stale_pending.id, Duration::days(30));

    let cutoff = Utc::now() - Duration::days(7);
    assert_eq!(repo.delete_terminal_before(cutoff).await.unwrap(), 1);

    assert!(repo.get_by_id(expired.id).await.unwrap().is_none());
    assert!(repo.get_by_id(recent.id).await.unwrap().is_some());
    assert!(repo.get_by_id(stale_pending.id).await.unwrap().is_some());
}
