//! Tracker Module Tests
//!
//! ## Test Scopes
//! - **Stat**: counter lifecycle over the broker.
//! - **StatusTracker**: tracked status records, expiry.
//! - **FailureLog**: exception records on the failed list.

#[cfg(test)]
mod tests {
    use crate::broker::{Broker, ClusterRouter, MemoryBroker};
    use crate::job::types::{JobPayload, JobStatus};
    use crate::tracker::failure::FAILED_KEY;
    use crate::tracker::{FailureLog, FailureRecord, Stat, StatusTracker};
    use std::sync::Arc;

    fn router() -> Arc<ClusterRouter> {
        ClusterRouter::single("main", Arc::new(MemoryBroker::new("127.0.0.1:6379")))
    }

    // ============================================================
    // TEST 1: Stat - counter lifecycle
    // ============================================================

    #[tokio::test]
    async fn test_stat_counts_up_and_down() {
        let stats = Stat::new(router());

        assert_eq!(stats.get("processed").await.unwrap(), 0);

        assert_eq!(stats.incr("processed").await.unwrap(), 1);
        assert_eq!(stats.incr("processed").await.unwrap(), 2);
        assert_eq!(stats.decr("processed").await.unwrap(), 1);
        assert_eq!(stats.get("processed").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_stat_clear_resets_to_zero() {
        let stats = Stat::new(router());

        stats.incr("failed").await.unwrap();
        stats.incr("failed").await.unwrap();
        assert_eq!(stats.get("failed").await.unwrap(), 2);

        stats.clear("failed").await.unwrap();
        assert_eq!(stats.get("failed").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stats_are_independent_per_name() {
        let stats = Stat::new(router());

        stats.incr("processed").await.unwrap();
        stats.incr("processed:h1:1:mail").await.unwrap();
        stats.incr("processed:h1:1:mail").await.unwrap();

        assert_eq!(stats.get("processed").await.unwrap(), 1);
        assert_eq!(stats.get("processed:h1:1:mail").await.unwrap(), 2);
    }

    // ============================================================
    // TEST 2: StatusTracker - record lifecycle
    // ============================================================

    #[tokio::test]
    async fn test_status_starts_queued_and_transitions() {
        let statuses = StatusTracker::new(router());

        statuses.create("job-1").await.unwrap();
        assert_eq!(
            statuses.get("job-1").await.unwrap(),
            Some(JobStatus::Queued)
        );

        statuses.update("job-1", JobStatus::Running).await.unwrap();
        assert_eq!(
            statuses.get("job-1").await.unwrap(),
            Some(JobStatus::Running)
        );

        statuses.update("job-1", JobStatus::Complete).await.unwrap();
        assert_eq!(
            statuses.get("job-1").await.unwrap(),
            Some(JobStatus::Complete)
        );
    }

    #[tokio::test]
    async fn test_untracked_job_has_no_status() {
        let statuses = StatusTracker::new(router());

        assert_eq!(statuses.get("never-created").await.unwrap(), None);
        assert!(!statuses.is_tracking("never-created").await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_expires_the_record() {
        let statuses = StatusTracker::new(router());

        statuses.create("job-2").await.unwrap();
        assert!(statuses.is_tracking("job-2").await.unwrap());

        assert!(statuses.clear("job-2").await.unwrap());
        assert!(!statuses.is_tracking("job-2").await.unwrap());
        assert_eq!(statuses.get("job-2").await.unwrap(), None);

        // Clearing again reports that nothing was there.
        assert!(!statuses.clear("job-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_record_carries_an_update_timestamp() {
        let statuses = StatusTracker::new(router());

        statuses.create("job-3").await.unwrap();
        let record = statuses.record("job-3").await.unwrap().unwrap();

        assert_eq!(record.status, JobStatus::Queued);
        assert!(record.updated_at > 0);
    }

    // ============================================================
    // TEST 3: FailureLog - exception records
    // ============================================================

    #[tokio::test]
    async fn test_failure_create_appends_a_full_record() {
        let router = router();
        let failures = FailureLog::new(router.clone());
        let payload = JobPayload {
            handler: "SendEmail".to_string(),
            args: vec![serde_json::json!({"to": "a@b.c"})],
            id: None,
        };

        failures
            .create(&payload, "smtp timeout", "h1:1:mail", "mail")
            .await
            .unwrap();

        assert_eq!(failures.count().await.unwrap(), 1);
        let serialized = router.lpop(FAILED_KEY).await.unwrap().unwrap();
        let record: FailureRecord = serde_json::from_str(&serialized).unwrap();
        assert_eq!(record.error, "smtp timeout");
        assert_eq!(record.worker, "h1:1:mail");
        assert_eq!(record.queue, "mail");
        assert_eq!(record.payload.handler, "SendEmail");
        assert!(record.failed_at > 0);
    }

    #[tokio::test]
    async fn test_failures_accumulate_in_order() {
        let router = router();
        let failures = FailureLog::new(router.clone());
        let payload = JobPayload {
            handler: "Resize".to_string(),
            args: vec![serde_json::Value::Null],
            id: None,
        };

        failures.create(&payload, "first", "w", "q").await.unwrap();
        failures.create(&payload, "second", "w", "q").await.unwrap();

        assert_eq!(failures.count().await.unwrap(), 2);
        let records = failures.all().await.unwrap();
        assert_eq!(records[0].error, "first");
        assert_eq!(records[1].error, "second");
    }
}
