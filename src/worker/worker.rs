//! The worker process: polling, dispatch, supervision, registration.

use super::control::{control_channel, ControlHandle, ControlSignal};
use crate::broker::Broker;
use crate::error::{Error, Result};
use crate::events::WorkerEvent;
use crate::job::types::{now_ms, JobStatus, WorkingOn};
use crate::job::{Job, JobQueue};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};

/// Broker set holding the id of every registered worker in the cluster.
pub const WORKERS_KEY: &str = "workers";

fn worker_key(id: &str) -> String {
    format!("worker:{}", id)
}

fn started_key(id: &str) -> String {
    format!("worker:{}:started", id)
}

/// One polling worker.
///
/// Identified cluster-wide as `hostname:pid:queue1,queue2`. The worker owns
/// its half of the control channel and keeps a `ControlHandle` of its own, so
/// the channel never closes underneath the receive loop.
pub struct Worker {
    id: String,
    hostname: String,
    pid: u32,
    queues: Vec<String>,
    interval: Duration,
    paused: bool,
    shutdown: bool,
    ctx: Arc<JobQueue>,
    control: mpsc::UnboundedReceiver<ControlSignal>,
    control_handle: ControlHandle,
    current_job: Option<Job>,
    child: Option<AbortHandle>,
}

impl Worker {
    /// Worker identified by this process: hostname from the OS, pid of the
    /// running process.
    pub fn new(ctx: Arc<JobQueue>, queues: Vec<String>, interval: Duration) -> Self {
        let hostname =
            sysinfo::System::host_name().unwrap_or_else(|| "localhost".to_string());
        Self::with_identity(ctx, queues, interval, hostname, std::process::id())
    }

    /// Worker with an explicit identity, for embedders running several
    /// logical workers per process and for tests.
    pub fn with_identity(
        ctx: Arc<JobQueue>,
        queues: Vec<String>,
        interval: Duration,
        hostname: impl Into<String>,
        pid: u32,
    ) -> Self {
        let hostname = hostname.into();
        let id = format!("{}:{}:{}", hostname, pid, queues.join(","));
        let (control_handle, control) = control_channel();
        Self {
            id,
            hostname,
            pid,
            queues,
            interval,
            paused: false,
            shutdown: false,
            ctx,
            control,
            control_handle,
            current_job: None,
            child: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Handle for steering this worker from other tasks.
    pub fn control_handle(&self) -> ControlHandle {
        self.control_handle.clone()
    }

    /// Run the worker to completion: register, poll until told to stop (or,
    /// with a zero interval, for a single pass), then deregister. The worker
    /// is deregistered even when the loop exits with an error.
    pub async fn work(&mut self) -> Result<()> {
        self.startup().await?;
        let looped = self.run_loop().await;
        let deregistered = self.unregister().await;
        looped.and(deregistered)
    }

    async fn startup(&mut self) -> Result<()> {
        let pruned = self.prune_dead_workers().await?;
        if pruned > 0 {
            tracing::info!("Pruned {} dead worker(s) on {}", pruned, self.hostname);
        }
        self.ctx.router().sadd(WORKERS_KEY, &self.id).await?;
        self.ctx
            .router()
            .set(&started_key(&self.id), &now_ms().to_string())
            .await?;
        tracing::info!("Worker {} registered (queues: {:?})", self.id, self.queues);
        Ok(())
    }

    async fn run_loop(&mut self) -> Result<()> {
        loop {
            self.drain_control().await?;
            if self.shutdown {
                break;
            }
            let mut worked = false;
            if !self.paused {
                if let Some(job) = self.reserve_next().await? {
                    self.process(job).await?;
                    worked = true;
                }
            }
            if self.shutdown || self.interval.is_zero() {
                break;
            }
            // Poll again immediately after working; sleep only when idle.
            if !worked {
                self.idle_wait().await?;
            }
        }
        Ok(())
    }

    /// Apply every control message already queued, without blocking.
    async fn drain_control(&mut self) -> Result<()> {
        while let Ok(signal) = self.control.try_recv() {
            self.apply_signal(signal).await?;
        }
        Ok(())
    }

    /// Sleep one poll interval, waking early for control messages.
    async fn idle_wait(&mut self) -> Result<()> {
        let mut received = None;
        tokio::select! {
            signal = self.control.recv() => received = signal,
            _ = tokio::time::sleep(self.interval) => {}
        }
        if let Some(signal) = received {
            self.apply_signal(signal).await?;
        }
        Ok(())
    }

    async fn apply_signal(&mut self, signal: ControlSignal) -> Result<()> {
        match signal {
            ControlSignal::Pause => {
                tracing::info!("Worker {} paused", self.id);
                self.paused = true;
            }
            ControlSignal::Resume => {
                tracing::info!("Worker {} resumed", self.id);
                self.paused = false;
            }
            ControlSignal::Shutdown => {
                tracing::info!("Worker {} shutting down", self.id);
                self.shutdown = true;
            }
            ControlSignal::ForceShutdown => {
                tracing::warn!("Worker {} force shutdown", self.id);
                self.shutdown = true;
                self.kill_child();
            }
            ControlSignal::KillChild => self.kill_child(),
            ControlSignal::Reconnect => {
                tracing::info!("Worker {} reconnecting to all shards", self.id);
                // One attempt; a shard that stays down takes the worker with it.
                self.ctx.router().reconnect_all().await?;
            }
        }
        Ok(())
    }

    fn kill_child(&mut self) {
        match &self.child {
            Some(child) => {
                tracing::warn!("Worker {} aborting job in flight", self.id);
                child.abort();
            }
            None => tracing::debug!("Worker {} has no job in flight to abort", self.id),
        }
    }

    /// Queue list with `*` expanded to every live queue, alphabetically,
    /// resolved fresh from the broker on each poll.
    async fn resolved_queues(&self) -> Result<Vec<String>> {
        let mut resolved = Vec::new();
        for queue in &self.queues {
            if queue == "*" {
                for live in self.ctx.queues().await? {
                    if !resolved.contains(&live) {
                        resolved.push(live);
                    }
                }
            } else if !resolved.contains(queue) {
                resolved.push(queue.clone());
            }
        }
        Ok(resolved)
    }

    /// One reservation pass over the queue list in priority order.
    async fn reserve_next(&self) -> Result<Option<Job>> {
        for queue in self.resolved_queues().await? {
            if let Some(job) = self.ctx.reserve(&queue).await? {
                tracing::debug!("Worker {} reserved job on queue '{}'", self.id, queue);
                return Ok(Some(job));
            }
        }
        Ok(None)
    }

    /// Dispatch one job into an isolated child task and supervise it.
    ///
    /// The child runs the whole perform/complete/fail protocol itself; the
    /// parent only supervises. A child that dies without reporting (panic or
    /// abort) is recorded as a `DirtyExit` failure by the parent. The
    /// working-on record and processed counters are maintained here either
    /// way: a job counts as processed once dispatch completes, successful or
    /// not.
    async fn process(&mut self, mut job: Job) -> Result<()> {
        job.set_worker(&self.id);
        self.working_on(&job).await?;
        self.current_job = Some(job.clone());

        self.ctx.events().trigger(WorkerEvent::BeforeDispatch {
            payload: &job.payload,
        });
        let mut handle = tokio::spawn(run_job(self.ctx.clone(), job.clone()));
        self.child = Some(handle.abort_handle());
        self.ctx.events().trigger(WorkerEvent::AfterDispatch {
            payload: &job.payload,
        });

        let outcome = self.supervise(&mut handle, &job).await;
        self.child = None;
        self.done_working().await?;
        self.current_job = None;
        outcome
    }

    /// Block on the child while still consuming control messages, so a
    /// long-running job cannot make the worker deaf to pause or shutdown.
    async fn supervise(&mut self, handle: &mut JoinHandle<Result<()>>, job: &Job) -> Result<()> {
        loop {
            let mut finished = None;
            let mut received = None;
            tokio::select! {
                result = &mut *handle => finished = Some(result),
                signal = self.control.recv() => received = signal,
            }

            if let Some(result) = finished {
                return match result {
                    Ok(reported) => reported,
                    Err(join_error) => {
                        let cause = if join_error.is_panic() {
                            "job task panicked"
                        } else {
                            "job task was aborted"
                        };
                        let error = Error::DirtyExit(cause.to_string());
                        job.fail(&self.ctx, &error).await?;
                        Ok(())
                    }
                };
            }
            if let Some(signal) = received {
                self.apply_signal(signal).await?;
            }
        }
    }

    /// Publish the working-on record and flip the tracked status to Running.
    async fn working_on(&self, job: &Job) -> Result<()> {
        let record = WorkingOn {
            queue: job.queue.clone(),
            run_at: now_ms(),
            payload: job.payload.clone(),
        };
        self.ctx
            .router()
            .set(&worker_key(&self.id), &serde_json::to_string(&record)?)
            .await?;
        job.update_status(&self.ctx, JobStatus::Running).await
    }

    async fn done_working(&self) -> Result<()> {
        self.ctx.router().del(&worker_key(&self.id)).await?;
        self.ctx.stats().incr("processed").await?;
        self.ctx
            .stats()
            .incr(&format!("processed:{}", self.id))
            .await?;
        Ok(())
    }

    /// Remove this worker's presence from the cluster. A job still marked in
    /// flight at this point can no longer be completed and is failed as a
    /// dirty exit first.
    async fn unregister(&mut self) -> Result<()> {
        if let Some(job) = self.current_job.take() {
            let error = Error::DirtyExit("worker deregistered with job in flight".to_string());
            job.fail(&self.ctx, &error).await?;
        }
        tracing::info!("Worker {} deregistered", self.id);
        Self::unregister_id(&self.ctx, &self.id).await
    }

    /// Shared teardown for own deregistration and pruning of dead peers.
    async fn unregister_id(ctx: &JobQueue, id: &str) -> Result<()> {
        let router = ctx.router();
        router.srem(WORKERS_KEY, id).await?;
        router.del(&worker_key(id)).await?;
        router.del(&started_key(id)).await?;
        ctx.stats().clear(&format!("processed:{}", id)).await?;
        ctx.stats().clear(&format!("failed:{}", id)).await?;
        Ok(())
    }

    /// Deregister workers on this host whose process no longer exists.
    /// Registrations from other hosts and from live pids are left alone.
    pub async fn prune_dead_workers(&self) -> Result<usize> {
        self.prune_dead_workers_with(&live_pids()).await
    }

    pub(crate) async fn prune_dead_workers_with(&self, live: &HashSet<u32>) -> Result<usize> {
        let mut pruned = 0;
        for id in self.ctx.router().smembers(WORKERS_KEY).await? {
            let Some((host, pid)) = parse_worker_id(&id) else {
                tracing::warn!("Skipping malformed worker id: {}", id);
                continue;
            };
            if host != self.hostname || pid == self.pid || live.contains(&pid) {
                continue;
            }
            tracing::warn!("Pruning dead worker: {}", id);
            Self::unregister_id(&self.ctx, &id).await?;
            pruned += 1;
        }
        Ok(pruned)
    }
}

/// `(hostname, pid)` out of a `hostname:pid:queues` worker id.
fn parse_worker_id(id: &str) -> Option<(&str, u32)> {
    let mut parts = id.splitn(3, ':');
    let host = parts.next()?;
    let pid = parts.next()?.parse().ok()?;
    parts.next()?;
    Some((host, pid))
}

/// Pids of every process currently running on this host. Pruning treats any
/// existing pid as alive, which can only under-prune, never deregister a
/// running worker.
fn live_pids() -> HashSet<u32> {
    let mut system = sysinfo::System::new();
    system.refresh_processes();
    system.processes().keys().map(|pid| pid.as_u32()).collect()
}

/// The child side of a dispatch: the whole perform protocol for one job.
/// Abstain is a skip, not a failure; handler errors are recorded through
/// `fail` and never crash the worker.
async fn run_job(ctx: Arc<JobQueue>, mut job: Job) -> Result<()> {
    match job.perform(&ctx).await {
        Ok(true) => job.update_status(&ctx, JobStatus::Complete).await,
        Ok(false) => {
            tracing::info!(
                "Job on queue '{}' skipped (handler: {})",
                job.queue,
                job.payload.handler
            );
            job.update_status(&ctx, JobStatus::Complete).await
        }
        Err(error) => job.fail(&ctx, &error).await,
    }
}
