use distributed_jobq::broker::{ClusterRouter, MemoryBroker, ShardConn};
use distributed_jobq::job::{HandlerRegistry, JobQueue};
#[cfg(unix)]
use distributed_jobq::worker::install_signal_bridge;
use distributed_jobq::worker::Worker;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut queues: Vec<String> = vec!["*".to_string()];
    let mut shards: Vec<(String, String)> = vec![];
    let mut interval = Duration::from_secs(5);
    let mut demo_jobs: u32 = 0;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--queues" => {
                queues = args[i + 1].split(',').map(|q| q.trim().to_string()).collect();
                i += 2;
            }
            "--shard" => {
                let Some((alias, endpoint)) = args[i + 1].split_once('=') else {
                    eprintln!("--shard expects alias=endpoint, got: {}", args[i + 1]);
                    std::process::exit(1);
                };
                shards.push((alias.to_string(), endpoint.to_string()));
                i += 2;
            }
            "--interval" => {
                interval = Duration::from_millis(args[i + 1].parse()?);
                i += 2;
            }
            "--demo-jobs" => {
                demo_jobs = args[i + 1].parse()?;
                i += 2;
            }
            "--help" | "-h" => {
                eprintln!(
                    "Usage: {} [--queues q1,q2|*] [--shard alias=endpoint ...] [--interval ms] [--demo-jobs n]",
                    args[0]
                );
                eprintln!("Example: {} --queues mail,archive --shard main=127.0.0.1:6379 --interval 1000", args[0]);
                std::process::exit(0);
            }
            _ => {
                i += 1;
            }
        }
    }

    if shards.is_empty() {
        shards.push(("main".to_string(), "127.0.0.1:6379".to_string()));
    }

    // 1. Broker shards and the cluster router:
    let connections = shards
        .into_iter()
        .map(|(alias, endpoint)| ShardConn::new(alias, Arc::new(MemoryBroker::new(endpoint))))
        .collect();
    let router = ClusterRouter::new(connections)?;

    // 2. Handler registry with a demo handler:
    let registry = HandlerRegistry::new();
    registry.register_fn("echo", |args| async move {
        tracing::info!("Echo job running with args: {}", args);
        tokio::time::sleep(Duration::from_secs(2)).await;
        Ok(())
    });

    let ctx = JobQueue::new(router, registry);

    for n in 0..demo_jobs {
        let id = ctx
            .create("demo", "echo", Some(serde_json::json!({ "n": n })), true)
            .await?;
        tracing::info!("Enqueued demo job {}", id);
    }

    // 3. Run one worker; Unix signals steer it (QUIT drains, TERM/INT abort,
    //    USR1 kills the job in flight, USR2 pauses).
    let mut worker = Worker::new(ctx, queues, interval);
    tracing::info!("Starting worker {} (poll interval {:?})", worker.id(), interval);

    #[cfg(unix)]
    install_signal_bridge(&worker.control_handle())?;

    worker.work().await?;
    Ok(())
}
