//! Update manager for periodic sensor polling

use anyhow::{anyhow, Result};
use log::{error, info, trace, warn};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use zen_sens_core::{SensorDescriptor, SensorRegistry};

/// Drives an initialized registry on a fixed cadence
///
/// Each cycle runs `update_all` on a blocking worker, since the register
/// sampler sleeps through its measurement window. Descriptors are collected
/// once and read without taking the registry lock.
pub struct UpdateManager {
    registry: Arc<Mutex<SensorRegistry>>,
    sensors: Vec<SensorDescriptor>,
}

impl UpdateManager {
    /// Take ownership of a registry whose `init_all` has already run
    pub fn new(registry: SensorRegistry) -> Self {
        let sensors = registry.sensors().cloned().collect();
        Self {
            registry: Arc::new(Mutex::new(registry)),
            sensors,
        }
    }

    /// Every enabled descriptor, in display order
    pub fn sensors(&self) -> &[SensorDescriptor] {
        &self.sensors
    }

    /// Run one update cycle over every enabled source
    pub async fn update_once(&self) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut registry = registry
                .lock()
                .map_err(|_| anyhow!("sensor registry lock poisoned"))?;
            registry.update_all();
            Ok(())
        })
        .await?
    }

    /// Reset running extremes of every enabled source
    pub async fn clear_min_max(&self) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut registry = registry
                .lock()
                .map_err(|_| anyhow!("sensor registry lock poisoned"))?;
            registry.clear_all_min_max();
            Ok(())
        })
        .await?
    }

    /// Poll until Ctrl-C or `max_cycles`, handing each cycle to `on_cycle`
    ///
    /// SIGUSR1 resets the running min/max of every sensor.
    pub async fn run<F>(
        &self,
        interval: Duration,
        max_cycles: Option<u64>,
        on_cycle: F,
    ) -> Result<u64>
    where
        F: FnMut(u64, &[SensorDescriptor]) -> Result<()>,
    {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        };
        let (clear_tx, clear_rx) = mpsc::unbounded_channel();
        forward_clear_signal(clear_tx);
        self.run_until(interval, max_cycles, shutdown, clear_rx, on_cycle)
            .await
    }

    /// Poll until `shutdown` resolves or `max_cycles` is reached
    ///
    /// Shutdown and min/max reset requests are only observed between cycles;
    /// a cycle in progress always completes. Returns the number of completed
    /// cycles.
    pub async fn run_until<S, F>(
        &self,
        interval: Duration,
        max_cycles: Option<u64>,
        shutdown: S,
        mut clear_requests: mpsc::UnboundedReceiver<()>,
        mut on_cycle: F,
    ) -> Result<u64>
    where
        S: Future<Output = ()>,
        F: FnMut(u64, &[SensorDescriptor]) -> Result<()>,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut cycles = 0u64;
        loop {
            if max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    trace!("Shutdown requested after {} cycles", cycles);
                    break;
                }
                Some(()) = clear_requests.recv() => {
                    info!("Resetting min/max of every sensor");
                    self.clear_min_max().await?;
                    continue;
                }
                _ = ticker.tick() => {}
            }

            let start = Instant::now();
            self.update_once().await?;
            trace!("Update cycle took {:?}", start.elapsed());

            cycles += 1;
            on_cycle(cycles, &self.sensors)?;
        }

        Ok(cycles)
    }
}

/// Turn every SIGUSR1 into a min/max reset request
#[cfg(unix)]
fn forward_clear_signal(requests: mpsc::UnboundedSender<()>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 = match signal(SignalKind::user_defined1()) {
        Ok(usr1) => usr1,
        Err(e) => {
            warn!("Cannot listen for SIGUSR1: {}", e);
            return;
        }
    };
    tokio::spawn(async move {
        while usr1.recv().await.is_some() {
            if requests.send(()).is_err() {
                break;
            }
        }
    });
}

#[cfg(not(unix))]
fn forward_clear_signal(_requests: mpsc::UnboundedSender<()>) {}
