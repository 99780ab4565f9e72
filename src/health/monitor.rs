//! Health Monitor
//!
//! A single periodic background task that samples the node's resource indicators and
//! reports them through `tracing`.
//!
//! The sampler only touches atomics and its own `sysinfo::System`, never a lock that the
//! request path takes, so monitoring cannot stall user operations.
//!
//! The task only holds a `Weak` reference to its monitor. Dropping the last handle to the
//! monitor (for example an instance dropped without `shutdown`) cancels the task.

use super::types::*;
use crate::instance::node::ClusterNode;
use crate::proxy::listeners::panic_message;
use crate::proxy::registry::ProxyRegistry;

use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use sysinfo::System;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

struct RunningTask {
    cancel: CancellationToken,
    _handle: JoinHandle<()>,
}

pub struct HealthMonitor {
    settings: HealthSettings,
    registry: Arc<ProxyRegistry>,
    node: Arc<dyn ClusterNode>,
    task: Mutex<Option<RunningTask>>,
    /// Held for the duration of one sample; `stop` waits on it.
    sampling: Mutex<()>,
    samples_taken: AtomicU64,
    latest: watch::Sender<Option<HealthSample>>,
}

impl HealthMonitor {
    pub fn new(
        settings: HealthSettings,
        registry: Arc<ProxyRegistry>,
        node: Arc<dyn ClusterNode>,
    ) -> Arc<Self> {
        let (latest, _) = watch::channel(None);

        Arc::new(Self {
            settings,
            registry,
            node,
            task: Mutex::new(None),
            sampling: Mutex::new(()),
            samples_taken: AtomicU64::new(0),
            latest,
        })
    }

    pub fn settings(&self) -> &HealthSettings {
        &self.settings
    }

    /// Spawns the sampling task. No-op when the level is OFF or the task already runs.
    pub fn start(self: &Arc<Self>) {
        if self.settings.level == HealthMonitorLevel::Off {
            tracing::debug!("Health monitor is OFF, not starting");
            return;
        }

        let mut task = self.task.lock();
        if task.is_some() {
            tracing::debug!("Health monitor already running");
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Self::sample_loop(
            Arc::downgrade(self),
            self.settings.interval,
            cancel.clone(),
        ));

        *task = Some(RunningTask {
            cancel,
            _handle: handle,
        });

        tracing::info!(
            "Health monitor started (level={}, interval={:?})",
            self.settings.level,
            self.settings.interval
        );
    }

    /// Cancels the sampling task. Safe to call when never started.
    ///
    /// Waits for a sample that is already being taken; none is started afterwards.
    pub fn stop(&self) {
        let Some(task) = self.task.lock().take() else {
            return;
        };

        task.cancel.cancel();
        drop(self.sampling.lock());

        tracing::info!(
            "Health monitor stopped after {} samples",
            self.samples_taken()
        );
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    pub fn samples_taken(&self) -> u64 {
        self.samples_taken.load(Ordering::SeqCst)
    }

    /// Receiver for the most recent sample.
    pub fn subscribe(&self) -> watch::Receiver<Option<HealthSample>> {
        self.latest.subscribe()
    }

    async fn sample_loop(monitor: Weak<Self>, period: Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut system = System::new();

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let Some(active) = monitor.upgrade() else {
                break;
            };
            if !active.sample_once(&cancel, &mut system) {
                break;
            }
        }

        tracing::debug!("Health monitor loop exited");
    }

    /// Takes and reports one sample. Returns `false` if the monitor was stopped meanwhile.
    fn sample_once(&self, cancel: &CancellationToken, system: &mut System) -> bool {
        let _sampling = self.sampling.lock();
        if cancel.is_cancelled() {
            return false;
        }

        match catch_unwind(AssertUnwindSafe(|| self.take_sample(system))) {
            Ok(sample) => self.report(sample),
            Err(panic) => {
                tracing::error!("Health sample failed: {}", panic_message(&*panic));
            }
        }
        true
    }

    fn take_sample(&self, system: &mut System) -> HealthSample {
        system.refresh_memory();
        let load = System::load_average();
        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        HealthSample {
            taken_at_ms: now_ms(),
            memory_total_bytes: system.total_memory(),
            memory_used_bytes: system.used_memory(),
            load_one: load.one,
            load_five: load.five,
            load_fifteen: load.fifteen,
            cpu_count,
            proxy_count: self.registry.proxy_count(),
            object_listener_count: self.registry.listeners().listener_count(),
            member_count: self.node.member_count(),
            connection_count: self.node.connection_count(),
        }
    }

    fn report(&self, sample: HealthSample) {
        self.samples_taken.fetch_add(1, Ordering::SeqCst);

        match self.settings.level {
            HealthMonitorLevel::Noisy => tracing::info!("{}", sample),
            HealthMonitorLevel::Silent if sample.exceeds(&self.settings) => {
                tracing::warn!("{}", sample)
            }
            _ => tracing::trace!("{}", sample),
        }

        self.latest.send_replace(Some(sample));
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.cancel.cancel();
        }
    }
}
