// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scheduled sync loop with signal handling and cooperative shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{TimeDelta, Utc};
use legible_core::config::DaemonConfig;
use legible_core::error::{LegibleError, Result};
use legible_sync::{Orchestrator, SyncContext, SyncResult};
use tracing::{Instrument, Span, error, info, info_span, warn};

use crate::pidfile::PidFile;
use crate::server::StatusServer;
use crate::status::{StatusTracker, SyncSummary};

/// Something that performs one blocking sync run.
pub trait SyncRunner: Send + Sync + 'static {
    fn run_sync(&self, ctx: &SyncContext) -> Result<SyncResult>;
}

impl SyncRunner for Orchestrator {
    fn run_sync(&self, ctx: &SyncContext) -> Result<SyncResult> {
        self.sync(ctx)
    }
}

pub struct Daemon {
    config: DaemonConfig,
    runner: Arc<dyn SyncRunner>,
    tracker: Arc<StatusTracker>,
    span: Span,
}

impl Daemon {
    /// # Errors
    ///
    /// Returns [`LegibleError::Config`] for a zero sync interval.
    pub fn new(
        config: DaemonConfig,
        runner: Arc<dyn SyncRunner>,
        tracker: Arc<StatusTracker>,
    ) -> Result<Self> {
        if config.sync_interval.is_zero() {
            return Err(LegibleError::Config("sync interval must be positive".into()));
        }
        let span = info_span!("daemon", interval_secs = config.sync_interval.as_secs());
        Ok(Self {
            config,
            runner,
            tracker,
            span,
        })
    }

    pub fn tracker(&self) -> &Arc<StatusTracker> {
        &self.tracker
    }

    /// Run until SIGINT or SIGTERM.
    pub async fn run(&self) -> Result<()> {
        let signals = Termination::install()?;
        self.run_until(signals.recv()).await
    }

    /// Run until `shutdown` resolves. An in-flight sync always finishes first.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        self.serve(shutdown).instrument(self.span.clone()).await
    }

    async fn serve<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!("starting daemon");

        let pid_file = match &self.config.pid_file {
            Some(path) => Some(PidFile::write(path)?),
            None => None,
        };

        let server = match &self.config.health_addr {
            Some(addr) => match StatusServer::start(addr, Arc::clone(&self.tracker)).await {
                Ok(server) => Some(server),
                Err(e) => {
                    if let Some(pid_file) = pid_file {
                        pid_file.remove();
                    }
                    return Err(e);
                }
            },
            None => None,
        };

        // Runs stay on a fixed grid anchored at startup; a run that overruns
        // its slot skips to the next grid point still in the future.
        let interval = self.config.sync_interval;
        let mut next_run = tokio::time::Instant::now() + interval;
        tokio::pin!(shutdown);

        info!("running initial sync");
        self.sync_once().await;

        loop {
            let now = tokio::time::Instant::now();
            while next_run <= now {
                next_run += interval;
            }
            self.advertise(next_run);
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested");
                    break;
                }
                () = tokio::time::sleep_until(next_run) => {
                    info!("sync interval elapsed");
                    self.sync_once().await;
                }
            }
        }

        if let Some(server) = server {
            server.stop(self.config.shutdown_grace).await;
        }
        if let Some(pid_file) = pid_file {
            pid_file.remove();
        }
        info!("daemon stopped");
        Ok(())
    }

    fn advertise(&self, next_run: tokio::time::Instant) {
        let remaining = next_run.saturating_duration_since(tokio::time::Instant::now());
        if let Ok(step) = TimeDelta::from_std(remaining) {
            if let Some(next) = Utc::now().checked_add_signed(step) {
                self.tracker.set_next_sync_time(next);
            }
        }
    }

    /// One bounded sync on the blocking pool; the outcome goes to the tracker.
    async fn sync_once(&self) {
        let runner = Arc::clone(&self.runner);
        let ctx = SyncContext::with_timeout(self.config.sync_timeout);
        let span = Span::current();

        self.tracker.sync_started(0);
        let started = Instant::now();
        let outcome =
            tokio::task::spawn_blocking(move || span.in_scope(|| runner.run_sync(&ctx))).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(Ok(result)) => {
                info!(
                    total = result.total_documents,
                    processed = result.processed_documents,
                    successful = result.success_count(),
                    failed = result.failure_count(),
                    duration_ms = elapsed.as_millis() as u64,
                    "sync completed"
                );
                if result.has_failures() {
                    warn!(count = result.failure_count(), "sync completed with failures");
                    for failure in &result.failures {
                        warn!(
                            document_id = %failure.document_id,
                            title = %failure.title,
                            error = %failure.error,
                            "document sync failed"
                        );
                    }
                }
                self.tracker.sync_completed(SyncSummary::from(&result));
            }
            Ok(Err(e)) => {
                error!(error = %e, duration_ms = elapsed.as_millis() as u64, "sync failed");
                self.tracker.sync_failed(&e, elapsed);
            }
            Err(e) => {
                error!(error = %e, "sync task did not complete");
                self.tracker.sync_failed(format!("sync task failed: {e}"), elapsed);
            }
        }
    }
}

/// Termination signal handlers, installed before the first sync.
pub struct Termination {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl Termination {
    /// # Errors
    ///
    /// Returns [`LegibleError::Server`] if a handler cannot be registered.
    #[cfg(unix)]
    pub fn install() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        let register = |kind: SignalKind, name: &str| {
            signal(kind).map_err(|e| LegibleError::Server(format!("{name} handler: {e}")))
        };
        Ok(Self {
            interrupt: register(SignalKind::interrupt(), "SIGINT")?,
            terminate: register(SignalKind::terminate(), "SIGTERM")?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> Result<Self> {
        Ok(Self {})
    }

    /// Resolves on the first signal.
    #[cfg(unix)]
    pub async fn recv(mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => info!(signal = "SIGINT", "received shutdown signal"),
            _ = self.terminate.recv() => info!(signal = "SIGTERM", "received shutdown signal"),
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(self) {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!(signal = "ctrl-c", "received shutdown signal"),
            Err(e) => {
                warn!(error = %e, "ctrl-c handler failed; waiting indefinitely");
                std::future::pending::<()>().await;
            }
        }
    }
}
