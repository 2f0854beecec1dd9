use std::time::Duration;

use anyhow::Context;
use layoutscope::protocol::{Worker, WorkerConfig};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::app::BuildOptions;

pub fn run(
    id: &str,
    wait: bool,
    idle_timeout: u64,
    build: &BuildOptions,
    log: UnboundedReceiver<Vec<u8>>,
) -> anyhow::Result<()> {
    let worker = Worker::new(WorkerConfig {
        id: id.to_string(),
        platform: build.platform,
        settings: build.settings(),
        idle_timeout: Duration::from_secs(idle_timeout),
        wait_for_debugger: wait,
    });

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    let reason = runtime
        .block_on(worker.run(Some(log)))
        .with_context(|| format!("worker {id} failed"))?;

    log::info!("Worker {id} stopped: {reason:?}");
    Ok(())
}
