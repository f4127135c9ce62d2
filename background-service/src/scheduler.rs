use chrono::{DateTime, Utc};
use engager_core::{Clock, CoreError, ErrorReporter};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::controller::CycleReport;

/// One unit of scheduled work.
pub trait CycleRunner {
    async fn run_cycle(&self, cycle: u64, now: DateTime<Utc>) -> Result<CycleReport, CoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Sleeping,
    Stopped,
}

/// Requests a stop. Takes effect at the next phase boundary; a running cycle
/// always finishes.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Runs cycles back to back on a fixed cadence until stopped.
pub struct CycleScheduler<R, C> {
    runner: R,
    clock: C,
    interval: Duration,
    state: SchedulerState,
    cycles_run: u64,
    stop_rx: watch::Receiver<bool>,
    reporter: ErrorReporter,
}

impl<R, C> CycleScheduler<R, C>
where
    R: CycleRunner,
    C: Clock,
{
    pub fn new(runner: R, clock: C, interval: Duration) -> (Self, StopHandle) {
        let (tx, stop_rx) = watch::channel(false);
        let scheduler = Self {
            runner,
            clock,
            interval,
            state: SchedulerState::Idle,
            cycles_run: 0,
            stop_rx,
            reporter: ErrorReporter::new(),
        };
        (scheduler, StopHandle { tx: Arc::new(tx) })
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn cycles_run(&self) -> u64 {
        self.cycles_run
    }

    fn stop_requested(&self) -> bool {
        *self.stop_rx.borrow()
    }

    fn transition(&mut self, next: SchedulerState) {
        debug!("Scheduler {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run a single cycle. Errors are reported and swallowed.
    pub async fn run_once(&mut self) -> Option<CycleReport> {
        self.transition(SchedulerState::Running);
        self.cycles_run += 1;
        let cycle = self.cycles_run;
        let now = self.clock.now();

        info!("{}", "=".repeat(60));
        info!("Starting cycle #{} at {}", cycle, now.format("%Y-%m-%d %H:%M:%S"));
        info!("{}", "=".repeat(60));

        match self.runner.run_cycle(cycle, now).await {
            Ok(report) => Some(report),
            Err(e) => {
                info!("Cycle #{} aborted", cycle);
                self.reporter.report_error(&e);
                None
            }
        }
    }

    /// Loop until a stop is requested. Returns the number of cycles run.
    pub async fn run(&mut self) -> u64 {
        info!(
            "Starting main loop (checking every {} minutes)",
            self.interval.as_secs_f64() / 60.0
        );

        while !self.stop_requested() {
            let started = Instant::now();
            self.run_once().await;
            if self.stop_requested() {
                break;
            }

            let remaining = self.interval.saturating_sub(started.elapsed());
            self.transition(SchedulerState::Sleeping);
            info!(
                "Sleeping for {:.1} minutes until next cycle",
                remaining.as_secs_f64() / 60.0
            );
            if self.sleep_or_stop(remaining).await {
                break;
            }
        }

        self.transition(SchedulerState::Stopped);
        info!("Scheduler stopped after {} cycle(s)", self.cycles_run);
        self.cycles_run
    }

    /// Sleep for `duration`, returning early with `true` when a stop arrives.
    async fn sleep_or_stop(&mut self, duration: Duration) -> bool {
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        tokio::select! {
            _ = &mut sleep => false,
            changed = self.stop_rx.wait_for(|stop| *stop) => match changed {
                Ok(_) => true,
                // Every stop handle is gone, so nothing can interrupt the sleep.
                Err(_) => {
                    sleep.await;
                    false
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use engager_core::DiscoveryError;
    use std::sync::{Arc, Mutex};

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
        }
    }

    /// Records when each cycle started and finished, optionally failing or
    /// taking a while.
    #[derive(Clone, Default)]
    struct RecordingRunner {
        started: Arc<Mutex<Vec<Instant>>>,
        finished: Arc<Mutex<Vec<u64>>>,
        cycle_duration: Duration,
        fail_first: bool,
    }

    impl CycleRunner for RecordingRunner {
        async fn run_cycle(&self, cycle: u64, _now: DateTime<Utc>) -> Result<CycleReport, CoreError> {
            self.started.lock().unwrap().push(Instant::now());
            if !self.cycle_duration.is_zero() {
                tokio::time::sleep(self.cycle_duration).await;
            }
            self.finished.lock().unwrap().push(cycle);
            if self.fail_first && cycle == 1 {
                return Err(DiscoveryError::CliTimeout { seconds: 60 }.into());
            }
            Ok(CycleReport::default())
        }
    }

    const INTERVAL: Duration = Duration::from_secs(600);

    #[tokio::test(start_paused = true)]
    async fn test_runs_on_fixed_interval_until_stopped() {
        let runner = RecordingRunner::default();
        let (mut scheduler, stop) = CycleScheduler::new(runner.clone(), FixedClock, INTERVAL);

        let origin = Instant::now();
        let stopper = async {
            tokio::time::sleep(Duration::from_secs(1500)).await;
            stop.stop();
        };
        let (cycles, ()) = tokio::join!(scheduler.run(), stopper);

        assert_eq!(cycles, 3);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        let offsets: Vec<u64> = runner
            .started
            .lock()
            .unwrap()
            .iter()
            .map(|at| at.duration_since(origin).as_secs())
            .collect();
        assert_eq!(offsets, vec![0, 600, 1200]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_duration_is_subtracted_from_sleep() {
        let runner = RecordingRunner {
            cycle_duration: Duration::from_secs(240),
            ..RecordingRunner::default()
        };
        let (mut scheduler, stop) = CycleScheduler::new(runner.clone(), FixedClock, INTERVAL);

        let origin = Instant::now();
        let stopper = async {
            tokio::time::sleep(Duration::from_secs(1000)).await;
            stop.stop();
        };
        tokio::join!(scheduler.run(), stopper);

        let offsets: Vec<u64> = runner
            .started
            .lock()
            .unwrap()
            .iter()
            .map(|at| at.duration_since(origin).as_secs())
            .collect();
        assert_eq!(offsets, vec![0, 600]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_cycle_does_not_stop_the_loop() {
        let runner = RecordingRunner {
            fail_first: true,
            ..RecordingRunner::default()
        };
        let (mut scheduler, stop) = CycleScheduler::new(runner.clone(), FixedClock, INTERVAL);

        let stopper = async {
            tokio::time::sleep(Duration::from_secs(700)).await;
            stop.stop();
        };
        let (cycles, ()) = tokio::join!(scheduler.run(), stopper);

        assert_eq!(cycles, 2);
        assert_eq!(*runner.finished.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_cycle_lets_it_finish() {
        let runner = RecordingRunner {
            cycle_duration: Duration::from_secs(120),
            ..RecordingRunner::default()
        };
        let (mut scheduler, stop) = CycleScheduler::new(runner.clone(), FixedClock, INTERVAL);

        let stopper = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            stop.stop();
        };
        let (cycles, ()) = tokio::join!(scheduler.run(), stopper);

        assert_eq!(cycles, 1);
        assert_eq!(*runner.finished.lock().unwrap(), vec![1]);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_start_runs_nothing() {
        let runner = RecordingRunner::default();
        let (mut scheduler, stop) = CycleScheduler::new(runner.clone(), FixedClock, INTERVAL);
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        stop.stop();
        assert!(stop.is_stopped());
        assert_eq!(scheduler.run().await, 0);
        assert!(runner.started.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_keeps_cadence() {
        let runner = RecordingRunner::default();
        let (mut scheduler, stop) = CycleScheduler::new(runner.clone(), FixedClock, INTERVAL);
        drop(stop);

        let origin = Instant::now();
        let _ = tokio::time::timeout(Duration::from_secs(1300), scheduler.run()).await;

        let offsets: Vec<u64> = runner
            .started
            .lock()
            .unwrap()
            .iter()
            .map(|at| at.duration_since(origin).as_secs())
            .collect();
        assert_eq!(offsets, vec![0, 600, 1200]);
    }

    #[tokio::test]
    async fn test_run_once_swallows_errors() {
        let runner = RecordingRunner {
            fail_first: true,
            ..RecordingRunner::default()
        };
        let (mut scheduler, _stop) = CycleScheduler::new(runner, FixedClock, INTERVAL);

        assert!(scheduler.run_once().await.is_none());
        assert!(scheduler.run_once().await.is_some());
        assert_eq!(scheduler.cycles_run(), 2);
    }
}
