// src/engine/runtime.rs

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::ci::CiServer;
use crate::errors::{Recovery, Result, SchedError};

use super::core::SweepEngine;
use super::sweep::SweepReport;

/// Drives [`SweepEngine`] forever: sweep, pause, repeat.
///
/// Errors never stop the loop. A failed sweep is abandoned and the next one
/// starts from scratch after the pause:
/// - connection errors recreate the CI client,
/// - API errors double the pause,
/// - anything else is logged.
///
/// Shutdown is only observed during the pause, so an in-flight sweep always
/// runs to completion (or to its first error).
#[derive(Debug)]
pub struct Runtime<S: CiServer> {
    engine: SweepEngine<S>,
    sweeps: u64,
}

impl<S: CiServer> Runtime<S> {
    pub fn new(engine: SweepEngine<S>) -> Self {
        Self { engine, sweeps: 0 }
    }

    pub fn engine(&self) -> &SweepEngine<S> {
        &self.engine
    }

    /// Number of sweeps started so far.
    pub fn sweeps(&self) -> u64 {
        self.sweeps
    }

    /// Main loop. Returns once `shutdown` fires or its sender is dropped.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        info!(
            nodes = self.engine.order().len(),
            pause_secs = self.engine.policy().pause.as_secs_f64(),
            "gitlab-ci-sched runtime started"
        );

        loop {
            let pause = match self.run_once().await {
                Ok(report) => {
                    debug!(
                        sweep = self.sweeps,
                        rebuilt = report.rebuilt().len(),
                        locked = report.state.locks.len(),
                        "sweep finished"
                    );
                    self.engine.policy().pause
                }
                Err(err) => self.recover(err),
            };

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("shutdown requested; stopping runtime");
                    break;
                }
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!(sweeps = self.sweeps, "runtime exiting");
        Ok(())
    }

    /// Run a single sweep and hand back its report or error.
    pub async fn run_once(&mut self) -> Result<SweepReport> {
        self.sweeps += 1;
        debug!(sweep = self.sweeps, "starting sweep");
        self.engine.sweep().await
    }

    /// Apply the recovery policy for a failed sweep; returns the pause to
    /// wait before the next one.
    fn recover(&mut self, err: SchedError) -> Duration {
        match err.recovery() {
            Recovery::Reconnect => {
                warn!(sweep = self.sweeps, error = %err, "CI server unreachable; recreating client");
                if let Err(e) = self.engine.ci_mut().reconnect() {
                    error!(error = %e, "failed to recreate CI client");
                }
            }
            Recovery::Backoff => {
                warn!(sweep = self.sweeps, error = %err, "CI server returned an error; backing off");
            }
            Recovery::Abort => {
                error!(sweep = self.sweeps, error = %err, "sweep failed");
            }
        }
        pause_after(self.engine.policy().pause, &err)
    }
}

/// Pause before the next sweep after a sweep failed with `err`.
///
/// API errors double `pause`; everything else keeps it.
pub fn pause_after(pause: Duration, err: &SchedError) -> Duration {
    match err.recovery() {
        Recovery::Backoff => pause * 2,
        Recovery::Reconnect | Recovery::Abort => pause,
    }
}
