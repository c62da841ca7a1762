//! Periodic runtime statistics.

use crate::metrics;
use crate::stack::{FaultSink, Service, ServiceError};
use async_trait::async_trait;
use blockd_core::config::StatsConfig;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// One runtime sample.
#[derive(Clone, Copy, Debug)]
pub struct RuntimeSample {
    pub workers: usize,
    pub alive_tasks: usize,
    pub resident_bytes: u64,
    pub uptime: Duration,
}

impl RuntimeSample {
    /// Sample the current runtime. Must be called from within a tokio runtime.
    pub fn take(started: Instant) -> Self {
        let runtime = tokio::runtime::Handle::current().metrics();
        Self {
            workers: runtime.num_workers(),
            alive_tasks: runtime.num_alive_tasks(),
            resident_bytes: process_rss(),
            uptime: started.elapsed(),
        }
    }

    fn record(&self) {
        tracing::info!(
            target: "blockd::stats",
            workers = self.workers,
            alive_tasks = self.alive_tasks,
            resident_bytes = self.resident_bytes,
            uptime_secs = self.uptime.as_secs(),
            "runtime sample"
        );
        metrics::RUNTIME_WORKERS.set(self.workers as i64);
        metrics::RUNTIME_ALIVE_TASKS.set(self.alive_tasks as i64);
        metrics::PROCESS_RESIDENT_BYTES.set(self.resident_bytes as i64);
        metrics::PROCESS_UPTIME_SECONDS.set(self.uptime.as_secs() as i64);
    }
}

/// Current process RSS in bytes, or 0 where unsupported.
pub fn process_rss() -> u64 {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:")
                    && let Some(kb_str) = line.split_whitespace().nth(1)
                    && let Ok(kb) = kb_str.parse::<u64>()
                {
                    return kb * 1024;
                }
            }
        }
        0
    }

    #[cfg(not(target_os = "linux"))]
    {
        0
    }
}

type StopRequest = oneshot::Sender<()>;

struct Running {
    stop: mpsc::Sender<StopRequest>,
    task: JoinHandle<()>,
}

/// Samples the runtime on a fixed interval while started.
///
/// Stopping is a request/acknowledgement exchange: `stop` returns only after
/// the sampling task has seen the request and exited its loop.
pub struct StatsSampler {
    interval: Duration,
    running: Option<Running>,
}

impl StatsSampler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            running: None,
        }
    }

    pub fn from_config(config: &StatsConfig) -> Self {
        Self::new(config.interval())
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

async fn sample_loop(interval: Duration, mut stop: mpsc::Receiver<StopRequest>) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            request = stop.recv() => {
                if let Some(ack) = request {
                    let _ = ack.send(());
                }
                break;
            }
            _ = ticker.tick() => RuntimeSample::take(started).record(),
        }
    }
}

#[async_trait]
impl Service for StatsSampler {
    fn name(&self) -> &str {
        "stats"
    }

    async fn start(&mut self, _faults: FaultSink) -> Result<(), ServiceError> {
        if self.running.is_some() {
            return Err(ServiceError::AlreadyStarted);
        }
        let (stop, stop_rx) = mpsc::channel(1);
        let task = tokio::spawn(sample_loop(self.interval, stop_rx));
        self.running = Some(Running { stop, task });
        tracing::debug!(interval = ?self.interval, "Stats sampler started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), ServiceError> {
        let Running { stop, task } = self.running.take().ok_or(ServiceError::NotStarted)?;

        let (ack, acked) = oneshot::channel();
        stop.send(ack)
            .await
            .map_err(|_| ServiceError::Failed("stats sampler exited early".to_string()))?;
        acked
            .await
            .map_err(|_| ServiceError::Failed("stats sampler did not acknowledge stop".to_string()))?;
        task.await
            .map_err(|e| ServiceError::Failed(format!("stats sampler task failed: {e}")))?;
        Ok(())
    }
}
