//! Job Module Tests
//!
//! ## Test Scopes
//! - **JobQueue**: enqueue validation, reservation, queue discovery.
//! - **Job**: the setup/perform/teardown protocol, abstain, failure
//!   bookkeeping, recreation.
//! - **HandlerRegistry**: name resolution.

#[cfg(test)]
mod tests {
    use crate::broker::{Broker, ClusterRouter, MemoryBroker};
    use crate::error::Error;
    use crate::job::queue::JobQueue;
    use crate::job::registry::{DontPerform, HandlerRegistry, JobHandler};
    use crate::job::types::JobStatus;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Handler that counts lifecycle calls and fails or abstains on demand.
    struct ProbeHandler {
        setups: Arc<AtomicUsize>,
        performs: Arc<AtomicUsize>,
        teardowns: Arc<AtomicUsize>,
        mode: ProbeMode,
    }

    #[derive(Clone, Copy)]
    enum ProbeMode {
        Succeed,
        FailPerform,
        AbstainInSetup,
        AbstainInPerform,
    }

    #[async_trait]
    impl JobHandler for ProbeHandler {
        async fn setup(&self, _args: &serde_json::Value) -> anyhow::Result<()> {
            self.setups.fetch_add(1, Ordering::SeqCst);
            if matches!(self.mode, ProbeMode::AbstainInSetup) {
                return Err(anyhow::Error::new(DontPerform));
            }
            Ok(())
        }

        async fn perform(&self, _args: &serde_json::Value) -> anyhow::Result<()> {
            self.performs.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                ProbeMode::FailPerform => anyhow::bail!("boom"),
                ProbeMode::AbstainInPerform => Err(anyhow::Error::new(DontPerform)),
                _ => Ok(()),
            }
        }

        async fn teardown(&self, _args: &serde_json::Value) -> anyhow::Result<()> {
            self.teardowns.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Probe {
        setups: Arc<AtomicUsize>,
        performs: Arc<AtomicUsize>,
        teardowns: Arc<AtomicUsize>,
    }

    fn register_probe(registry: &HandlerRegistry, name: &str, mode: ProbeMode) -> Probe {
        let probe = Probe {
            setups: Arc::new(AtomicUsize::new(0)),
            performs: Arc::new(AtomicUsize::new(0)),
            teardowns: Arc::new(AtomicUsize::new(0)),
        };
        let (setups, performs, teardowns) = (
            probe.setups.clone(),
            probe.performs.clone(),
            probe.teardowns.clone(),
        );
        registry.register(name, move || {
            Arc::new(ProbeHandler {
                setups: setups.clone(),
                performs: performs.clone(),
                teardowns: teardowns.clone(),
                mode,
            })
        });
        probe
    }

    fn queue_ctx() -> Arc<JobQueue> {
        let router = ClusterRouter::single("main", Arc::new(MemoryBroker::new("127.0.0.1:6379")));
        JobQueue::new(router, HandlerRegistry::new())
    }

    // ============================================================
    // TEST 1: JobQueue - enqueue and ids
    // ============================================================

    #[tokio::test]
    async fn test_create_returns_unique_ids() {
        let ctx = queue_ctx();

        let a = ctx.create("mail", "SendEmail", None, false).await.unwrap();
        let b = ctx.create("mail", "SendEmail", None, false).await.unwrap();

        assert_ne!(a, b);
        assert_eq!(ctx.queue_len("mail").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_scalar_args_are_rejected_and_nothing_is_enqueued() {
        let ctx = queue_ctx();

        for scalar in [
            serde_json::json!(42),
            serde_json::json!("a string"),
            serde_json::json!(true),
        ] {
            let result = ctx.create("mail", "SendEmail", Some(scalar), false).await;
            assert!(matches!(result, Err(Error::Argument(_))));
        }

        assert_eq!(ctx.queue_len("mail").await.unwrap(), 0);
        assert!(ctx.queues().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_structured_args_round_trip_through_reserve() {
        let ctx = queue_ctx();
        let args = serde_json::json!({"to": "a@b.c", "retries": 3});

        ctx.create("mail", "SendEmail", Some(args.clone()), false)
            .await
            .unwrap();

        let job = ctx.reserve("mail").await.unwrap().unwrap();
        assert_eq!(job.queue, "mail");
        assert_eq!(job.payload.handler, "SendEmail");
        assert_eq!(job.payload.arg(), args);
        assert!(!job.monitored());
        assert_eq!(job.id(), None);
    }

    #[tokio::test]
    async fn test_missing_args_travel_as_null() {
        let ctx = queue_ctx();

        ctx.create("mail", "SendEmail", None, false).await.unwrap();

        let job = ctx.reserve("mail").await.unwrap().unwrap();
        assert_eq!(job.payload.args, vec![serde_json::Value::Null]);
    }

    // ============================================================
    // TEST 2: JobQueue - reservation order and discovery
    // ============================================================

    #[tokio::test]
    async fn test_reserve_is_fifo_per_queue() {
        let ctx = queue_ctx();

        let first = ctx.create("mail", "A", None, true).await.unwrap();
        let second = ctx.create("mail", "B", None, true).await.unwrap();

        let job = ctx.reserve("mail").await.unwrap().unwrap();
        assert_eq!(job.id(), Some(first.as_str()));
        let job = ctx.reserve("mail").await.unwrap().unwrap();
        assert_eq!(job.id(), Some(second.as_str()));
        assert!(ctx.reserve("mail").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_queues_lists_every_pushed_queue_sorted() {
        let ctx = queue_ctx();

        ctx.create("mail", "A", None, false).await.unwrap();
        ctx.create("archive", "B", None, false).await.unwrap();
        ctx.create("mail", "A", None, false).await.unwrap();

        assert_eq!(ctx.queues().await.unwrap(), vec!["archive", "mail"]);
    }

    #[tokio::test]
    async fn test_reserve_blocking_strips_the_queue_prefix() {
        let ctx = queue_ctx();
        ctx.create("mail", "A", None, false).await.unwrap();

        let job = ctx
            .reserve_blocking(&["mail".to_string()], Duration::from_millis(50))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(job.queue, "mail");
    }

    // ============================================================
    // TEST 3: Monitoring - ids and status records
    // ============================================================

    #[tokio::test]
    async fn test_monitored_job_carries_its_id_and_starts_queued() {
        let ctx = queue_ctx();

        let id = ctx.create("mail", "SendEmail", None, true).await.unwrap();

        assert_eq!(ctx.statuses().get(&id).await.unwrap(), Some(JobStatus::Queued));
        let job = ctx.reserve("mail").await.unwrap().unwrap();
        assert!(job.monitored());
        assert_eq!(job.id(), Some(id.as_str()));
    }

    #[tokio::test]
    async fn test_unmonitored_job_is_never_tracked() {
        let ctx = queue_ctx();

        let id = ctx.create("mail", "SendEmail", None, false).await.unwrap();

        // The returned id exists for the caller's benefit only.
        assert!(!id.is_empty());
        assert!(!ctx.statuses().is_tracking(&id).await.unwrap());

        let job = ctx.reserve("mail").await.unwrap().unwrap();
        assert_eq!(job.status(&ctx).await.unwrap(), None);
        job.update_status(&ctx, JobStatus::Complete).await.unwrap();
        assert_eq!(job.status(&ctx).await.unwrap(), None);
    }

    // ============================================================
    // TEST 4: Job - the perform protocol
    // ============================================================

    #[tokio::test]
    async fn test_perform_runs_the_full_lifecycle() {
        let ctx = queue_ctx();
        let probe = register_probe(ctx.registry(), "Lifecycle", ProbeMode::Succeed);
        ctx.create("mail", "Lifecycle", None, false).await.unwrap();

        let mut job = ctx.reserve("mail").await.unwrap().unwrap();
        let performed = job.perform(&ctx).await.unwrap();

        assert!(performed);
        assert_eq!(probe.setups.load(Ordering::SeqCst), 1);
        assert_eq!(probe.performs.load(Ordering::SeqCst), 1);
        assert_eq!(probe.teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abstain_in_setup_skips_the_work() {
        let ctx = queue_ctx();
        let probe = register_probe(ctx.registry(), "Shy", ProbeMode::AbstainInSetup);
        ctx.create("mail", "Shy", None, false).await.unwrap();

        let mut job = ctx.reserve("mail").await.unwrap().unwrap();
        let performed = job.perform(&ctx).await.unwrap();

        assert!(!performed);
        assert_eq!(probe.performs.load(Ordering::SeqCst), 0);
        assert_eq!(probe.teardowns.load(Ordering::SeqCst), 0);
        // An abstain is a skip, not a failure.
        assert_eq!(ctx.failures().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_abstain_in_perform_is_not_a_failure() {
        let ctx = queue_ctx();
        register_probe(ctx.registry(), "Shy", ProbeMode::AbstainInPerform);
        ctx.create("mail", "Shy", None, false).await.unwrap();

        let mut job = ctx.reserve("mail").await.unwrap().unwrap();
        assert!(!job.perform(&ctx).await.unwrap());
        assert_eq!(ctx.failures().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_handler_errors_propagate_uncaught() {
        let ctx = queue_ctx();
        register_probe(ctx.registry(), "Broken", ProbeMode::FailPerform);
        ctx.create("mail", "Broken", None, false).await.unwrap();

        let mut job = ctx.reserve("mail").await.unwrap().unwrap();
        let result = job.perform(&ctx).await;

        assert!(matches!(result, Err(Error::Handler(_))));
    }

    #[tokio::test]
    async fn test_unknown_handler_is_reported_by_name() {
        let ctx = queue_ctx();
        ctx.create("mail", "Nobody", None, false).await.unwrap();

        let mut job = ctx.reserve("mail").await.unwrap().unwrap();
        let result = job.perform(&ctx).await;

        assert!(matches!(
            result,
            Err(Error::HandlerNotFound(name)) if name == "Nobody"
        ));
    }

    // ============================================================
    // TEST 5: Job - failure bookkeeping
    // ============================================================

    #[tokio::test]
    async fn test_fail_records_everything_once() {
        let ctx = queue_ctx();
        register_probe(ctx.registry(), "Broken", ProbeMode::FailPerform);
        let id = ctx.create("mail", "Broken", None, true).await.unwrap();

        let mut job = ctx.reserve("mail").await.unwrap().unwrap();
        job.set_worker("h1:1:mail");
        let error = job.perform(&ctx).await.unwrap_err();
        job.fail(&ctx, &error).await.unwrap();

        assert_eq!(ctx.statuses().get(&id).await.unwrap(), Some(JobStatus::Failed));
        assert_eq!(ctx.failures().count().await.unwrap(), 1);
        assert_eq!(ctx.stats().get("failed").await.unwrap(), 1);
        assert_eq!(ctx.stats().get("failed:h1:1:mail").await.unwrap(), 1);
    }

    // ============================================================
    // TEST 6: Job - recreation
    // ============================================================

    #[tokio::test]
    async fn test_recreate_preserves_queue_args_and_monitoring() {
        let ctx = queue_ctx();
        let args = serde_json::json!(["retry", 2]);
        ctx.create("mail", "SendEmail", Some(args.clone()), true)
            .await
            .unwrap();

        let original = ctx.reserve("mail").await.unwrap().unwrap();
        let new_id = original.recreate(&ctx).await.unwrap();

        assert_ne!(Some(new_id.as_str()), original.id());
        let copy = ctx.reserve("mail").await.unwrap().unwrap();
        assert_eq!(copy.payload.handler, "SendEmail");
        assert_eq!(copy.payload.arg(), args);
        assert!(copy.monitored());
        assert_eq!(copy.id(), Some(new_id.as_str()));
    }

    #[tokio::test]
    async fn test_recreate_of_an_argless_job_stays_argless() {
        let ctx = queue_ctx();
        ctx.create("mail", "SendEmail", None, false).await.unwrap();

        let original = ctx.reserve("mail").await.unwrap().unwrap();
        original.recreate(&ctx).await.unwrap();

        let copy = ctx.reserve("mail").await.unwrap().unwrap();
        assert_eq!(copy.payload.args, vec![serde_json::Value::Null]);
        assert!(!copy.monitored());
    }

    // ============================================================
    // TEST 7: HandlerRegistry - resolution
    // ============================================================

    #[tokio::test]
    async fn test_registry_resolves_registered_names_only() {
        let registry = HandlerRegistry::new();
        registry.register_fn("noop", |_args| async { Ok(()) });

        assert!(registry.has_handler("noop"));
        assert!(registry.resolve("noop").is_ok());
        assert_eq!(registry.handler_count(), 1);
        assert_eq!(registry.list_handlers(), vec!["noop"]);

        assert!(matches!(
            registry.resolve("other"),
            Err(Error::HandlerNotFound(name)) if name == "other"
        ));
    }

    #[tokio::test]
    async fn test_registered_closure_receives_the_argument_record() {
        let registry = HandlerRegistry::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        registry.register_fn("count", move |args| {
            let counter = counter.clone();
            async move {
                assert_eq!(args, serde_json::json!({"n": 7}));
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let handler = registry.resolve("count").unwrap();
        handler.perform(&serde_json::json!({"n": 7})).await.unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
