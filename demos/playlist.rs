//! # Example: Looping Playlist
//!
//! Queues several inputs, streams them back to back in a loop and prints every
//! lifecycle event through a custom subscriber until Ctrl-C.
//!
//! ```text
//! cargo run --example playlist -- rtmp://localhost/live stream-key a.mp4 b.mp4
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use castvisor::{CallerId, Config, Event, Orchestrator, RtmpTarget, Subscribe};

/// Prints events as one line each.
struct Printer;

#[async_trait]
impl Subscribe for Printer {
    async fn on_event(&self, e: &Event) {
        let session = e.session.map(|s| s.short()).unwrap_or_default();
        match &e.reason {
            Some(reason) => println!("[{:>4}] {session} {} ({reason})", e.seq, e.kind.as_str()),
            None => println!("[{:>4}] {session} {}", e.seq, e.kind.as_str()),
        }
    }

    fn name(&self) -> &'static str {
        "printer"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| "rtmp://localhost/live".into());
    let key = args.next().unwrap_or_else(|| "demo-key-0001".into());
    let inputs: Vec<String> = args.collect();
    anyhow::ensure!(!inputs.is_empty(), "pass at least one input file");

    let orch = Orchestrator::builder(Config::from_env()?)
        .with_subscriber(Arc::new(Printer))
        .build();

    let me = CallerId(1);
    for input in inputs {
        let pos = orch.enqueue(me, input).await?;
        println!("[main] queued at {pos}");
    }

    let session = orch
        .create_from_playlist(me, RtmpTarget::new(url, key), None, true)
        .await?;
    orch.start(me, session.id).await?;

    let report = orch.run_until_signal().await?;
    println!("[main] stopped {} session(s), {} failed", report.stopped.len(), report.failed.len());
    Ok(())
}
