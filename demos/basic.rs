//! # Example: Basic Session
//!
//! Pushes one input to an RTMP endpoint, pauses and resumes it, then stops it.
//!
//! ```text
//! cargo run --example basic -- /media/clip.mp4 rtmp://localhost/live stream-key
//! ```
//!
//! `FFMPEG_PATH`, `DEFAULT_QUALITY` and the other variables from `Config` apply.

use std::sync::Arc;
use std::time::Duration;

use castvisor::{CallerId, Config, LogWriter, Orchestrator, RtmpTarget, SessionSpec, SessionState};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("castvisor=debug"))
        .init();

    let mut args = std::env::args().skip(1);
    let source = args.next().unwrap_or_else(|| "/media/clip.mp4".into());
    let url = args.next().unwrap_or_else(|| "rtmp://localhost/live".into());
    let key = args.next().unwrap_or_else(|| "demo-key-0001".into());

    let orch = Orchestrator::builder(Config::from_env()?)
        .with_subscriber(Arc::new(LogWriter))
        .build();

    let me = CallerId(1);
    let session = orch
        .create(me, SessionSpec::new(source, RtmpTarget::new(url, key)))
        .await?;
    println!("[main] created {} ({})", session.id, session.target);

    orch.start(me, session.id).await?;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let status = orch.get(me, session.id).await?;
    println!("[main] state after 5s: {}", status.state);

    if status.state == SessionState::Running {
        orch.pause(me, session.id).await?;
        println!("[main] paused");
        tokio::time::sleep(Duration::from_secs(2)).await;
        orch.resume(me, session.id).await?;
        println!("[main] resumed");
        tokio::time::sleep(Duration::from_secs(3)).await;
    }

    let stopped = orch.stop(me, session.id).await?;
    println!(
        "[main] stopped: restarts={} last_error={:?}",
        stopped.restart_count, stopped.last_error
    );

    orch.shutdown().await;
    Ok(())
}
