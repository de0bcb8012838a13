//! Hashed-wheel scheduler and its worker thread.

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use crossbeam_queue::SegQueue;
use parking_lot::{Condvar, Mutex};
use sirocco_core::config::Validatable;
use sirocco_core::identifiers::Address;
use sirocco_core::mailbox::Endpoint;
use tracing::{debug, error, info, trace, warn};

use crate::bucket::Bucket;
use crate::{Cancelable, Registration, ScheduledAction, SchedulerConfig, SchedulerError};

/// Upper bound on registrations moved from the inbound queue per tick.
const MAX_TRANSFERS_PER_TICK: usize = 100_000;

/// Largest accepted delay or interval, in nanoseconds.
const MAX_DELAY_NANOS: u64 = u64::MAX / 2;

const INIT: u8 = 0;
const STARTED: u8 = 1;
const SHUTDOWN: u8 = 2;

/// Lifecycle state of the scheduler. Transitions happen once each, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No registration has been submitted yet; the worker is not running.
    Init,
    /// The worker thread is running.
    Started,
    /// The scheduler has been shut down.
    Shutdown,
}

impl From<u8> for SchedulerState {
    fn from(value: u8) -> Self {
        match value {
            INIT => Self::Init,
            STARTED => Self::Started,
            _ => Self::Shutdown,
        }
    }
}

fn to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

fn check_delay(delay: Duration) -> Result<u64, SchedulerError> {
    let nanos = to_nanos(delay);
    if nanos > MAX_DELAY_NANOS {
        return Err(SchedulerError::InvalidDelay {
            delay,
            reason: format!("must not exceed {:?}", Duration::from_nanos(MAX_DELAY_NANOS)),
        });
    }
    Ok(nanos)
}

fn check_interval(interval: Duration) -> Result<u64, SchedulerError> {
    if interval.is_zero() {
        return Err(SchedulerError::InvalidInterval {
            interval,
            reason: "must be positive".to_string(),
        });
    }
    let nanos = to_nanos(interval);
    if nanos > MAX_DELAY_NANOS {
        return Err(SchedulerError::InvalidInterval {
            interval,
            reason: format!("must not exceed {:?}", Duration::from_nanos(MAX_DELAY_NANOS)),
        });
    }
    Ok(nanos)
}

/// State shared between callers and the worker thread.
struct Shared {
    state: AtomicU8,
    queue: SegQueue<Registration>,
    start: OnceLock<Instant>,
    gate: Mutex<()>,
    started: Condvar,
    pending: AtomicUsize,
}

impl Shared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(INIT),
            queue: SegQueue::new(),
            start: OnceLock::new(),
            gate: Mutex::new(()),
            started: Condvar::new(),
            pending: AtomicUsize::new(0),
        }
    }

    fn state(&self) -> SchedulerState {
        SchedulerState::from(self.state.load(Ordering::Acquire))
    }

    fn transition(&self, from: u8, to: u8) -> bool {
        self.state
            .compare_exchange(from, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn notify_started(&self) {
        let _guard = self.gate.lock();
        self.started.notify_all();
    }

    fn retire(&self, count: usize) {
        if count > 0 {
            self.pending.fetch_sub(count, Ordering::AcqRel);
        }
    }

    /// Undoes the count of a submission rejected after the worker may
    /// already have reset `pending`.
    fn withdraw(&self) {
        let _ = self
            .pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    fn drain_queue(&self, out: &mut Vec<Registration>) {
        while let Some(registration) = self.queue.pop() {
            if !registration.is_cancelled() {
                out.push(registration);
            }
        }
    }
}

/// Timer scheduler backed by a hashed timing wheel.
///
/// The worker thread starts lazily on the first scheduling call, which
/// blocks until the worker has recorded its start time. Every later call
/// only pushes onto a lock-free queue.
///
/// Deadlines are rounded to tick boundaries, so an action fires between
/// `delay` and `delay + tick_duration` after it was scheduled. Repeating
/// actions advance their deadline by exactly one interval each time they fire.
pub struct HashedWheelScheduler {
    config: SchedulerConfig,
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    completion_tx: Mutex<Option<Sender<Vec<Registration>>>>,
    completion_rx: Mutex<Option<Receiver<Vec<Registration>>>>,
}

impl HashedWheelScheduler {
    /// Creates a scheduler with the default configuration
    /// (10ms ticks, 512 buckets).
    #[must_use]
    pub fn new() -> Self {
        Self::build(SchedulerConfig::default())
    }

    /// Creates a scheduler from a validated configuration.
    pub fn with_config(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: SchedulerConfig) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self {
            config,
            shared: Arc::new(Shared::new()),
            worker: Mutex::new(None),
            completion_tx: Mutex::new(Some(tx)),
            completion_rx: Mutex::new(Some(rx)),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        self.shared.state()
    }

    /// Returns true while the worker thread is running.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.state() == SchedulerState::Started
    }

    /// Number of registrations submitted and not yet retired.
    ///
    /// Cancelled registrations count until the worker encounters them.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Runs `action` once after `delay`.
    pub fn schedule_once<F>(&self, delay: Duration, action: F) -> Result<(), SchedulerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(delay, None, ScheduledAction::once(action), Cancelable::new())
    }

    /// Runs `action` once after `delay`, returning a handle that cancels it.
    pub fn schedule_once_cancelable<F>(
        &self,
        delay: Duration,
        action: F,
    ) -> Result<Cancelable, SchedulerError>
    where
        F: FnOnce() + Send + 'static,
    {
        let token = Cancelable::new();
        self.submit(delay, None, ScheduledAction::once(action), token.clone())?;
        Ok(token)
    }

    /// Runs `action` once at `time`. A time in the past fires on the next tick.
    pub fn schedule_once_at<F>(&self, time: DateTime<Utc>, action: F) -> Result<(), SchedulerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_once(Self::delay_until(time), action)
    }

    /// Runs `action` once at `time`, returning a handle that cancels it.
    pub fn schedule_once_at_cancelable<F>(
        &self,
        time: DateTime<Utc>,
        action: F,
    ) -> Result<Cancelable, SchedulerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_once_cancelable(Self::delay_until(time), action)
    }

    /// Runs `action` after `initial_delay` and then every `interval`.
    pub fn schedule_repeatedly<F>(
        &self,
        initial_delay: Duration,
        interval: Duration,
        action: F,
    ) -> Result<(), SchedulerError>
    where
        F: FnMut() + Send + 'static,
    {
        self.submit(
            initial_delay,
            Some(interval),
            ScheduledAction::run(action),
            Cancelable::new(),
        )
    }

    /// Runs `action` after `initial_delay` and then every `interval` until cancelled.
    pub fn schedule_repeatedly_cancelable<F>(
        &self,
        initial_delay: Duration,
        interval: Duration,
        action: F,
    ) -> Result<Cancelable, SchedulerError>
    where
        F: FnMut() + Send + 'static,
    {
        let token = Cancelable::new();
        self.submit(
            initial_delay,
            Some(interval),
            ScheduledAction::run(action),
            token.clone(),
        )?;
        Ok(token)
    }

    /// Delivers `message` to `receiver` once after `delay`.
    pub fn schedule_tell_once<M>(
        &self,
        delay: Duration,
        receiver: Arc<dyn Endpoint<M>>,
        message: M,
        sender: Option<Address>,
    ) -> Result<(), SchedulerError>
    where
        M: Send + 'static,
    {
        let action = ScheduledAction::tell_once(receiver, message, sender);
        self.submit(delay, None, action, Cancelable::new())
    }

    /// Delivers `message` to `receiver` once after `delay`, returning a handle that cancels it.
    pub fn schedule_tell_once_cancelable<M>(
        &self,
        delay: Duration,
        receiver: Arc<dyn Endpoint<M>>,
        message: M,
        sender: Option<Address>,
    ) -> Result<Cancelable, SchedulerError>
    where
        M: Send + 'static,
    {
        let token = Cancelable::new();
        let action = ScheduledAction::tell_once(receiver, message, sender);
        self.submit(delay, None, action, token.clone())?;
        Ok(token)
    }

    /// Delivers a clone of `message` to `receiver` after `initial_delay` and
    /// then every `interval`.
    pub fn schedule_tell_repeatedly<M>(
        &self,
        initial_delay: Duration,
        interval: Duration,
        receiver: Arc<dyn Endpoint<M>>,
        message: M,
        sender: Option<Address>,
    ) -> Result<(), SchedulerError>
    where
        M: Clone + Send + 'static,
    {
        let action = ScheduledAction::tell_repeatedly(receiver, message, sender);
        self.submit(initial_delay, Some(interval), action, Cancelable::new())
    }

    /// Cancelable variant of [`schedule_tell_repeatedly`](Self::schedule_tell_repeatedly).
    pub fn schedule_tell_repeatedly_cancelable<M>(
        &self,
        initial_delay: Duration,
        interval: Duration,
        receiver: Arc<dyn Endpoint<M>>,
        message: M,
        sender: Option<Address>,
    ) -> Result<Cancelable, SchedulerError>
    where
        M: Clone + Send + 'static,
    {
        let token = Cancelable::new();
        let action = ScheduledAction::tell_repeatedly(receiver, message, sender);
        self.submit(initial_delay, Some(interval), action, token.clone())?;
        Ok(token)
    }

    fn delay_until(time: DateTime<Utc>) -> Duration {
        (time - Utc::now()).to_std().unwrap_or(Duration::ZERO)
    }

    fn submit(
        &self,
        delay: Duration,
        interval: Option<Duration>,
        action: ScheduledAction,
        cancel: Cancelable,
    ) -> Result<(), SchedulerError> {
        let delay = check_delay(delay)?;
        let offset = interval.map(check_interval).transpose()?.unwrap_or(0);
        let start = self.ensure_started()?;

        let deadline = to_nanos(start.elapsed()).saturating_add(delay);
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        self.shared
            .queue
            .push(Registration::new(deadline, offset, action, cancel.clone()));

        // Shutdown may have drained the queue before this push landed.
        let state = SchedulerState::from(self.shared.state.load(Ordering::SeqCst));
        if state == SchedulerState::Shutdown {
            cancel.cancel();
            self.shared.withdraw();
            return Err(SchedulerError::AfterShutdown);
        }
        Ok(())
    }

    fn ensure_started(&self) -> Result<Instant, SchedulerError> {
        if let Some(start) = self.shared.start.get() {
            return match self.state() {
                SchedulerState::Shutdown => Err(SchedulerError::AfterShutdown),
                _ => Ok(*start),
            };
        }

        if self.shared.transition(INIT, STARTED) {
            self.spawn_worker()?;
        }
        self.wait_for_start()
    }

    fn spawn_worker(&self) -> Result<(), SchedulerError> {
        let worker = Worker::new(
            &self.config,
            Arc::clone(&self.shared),
            self.completion_tx.lock().take(),
        );
        let spawned = std::thread::Builder::new()
            .name("sirocco-scheduler".to_string())
            .spawn(move || worker.run());

        match spawned {
            Ok(handle) => {
                *self.worker.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to spawn scheduler worker");
                self.shared.state.store(SHUTDOWN, Ordering::Release);
                self.shared.notify_started();
                Err(SchedulerError::WorkerSpawn(e.to_string()))
            }
        }
    }

    fn wait_for_start(&self) -> Result<Instant, SchedulerError> {
        let mut guard = self.shared.gate.lock();
        loop {
            if let Some(start) = self.shared.start.get() {
                return Ok(*start);
            }
            if self.state() == SchedulerState::Shutdown {
                return Err(SchedulerError::AfterShutdown);
            }
            self.shared.started.wait(&mut guard);
        }
    }

    /// Stops the worker and returns every registration that had not been
    /// cancelled and had not yet fired (one-shots) or retired (repeats).
    ///
    /// Only the first call does any work; later calls return an empty set.
    /// Waits at most `shutdown_timeout` for the worker to finish its tick.
    pub fn shutdown(&self) -> Result<Vec<Registration>, SchedulerError> {
        loop {
            match self.state() {
                SchedulerState::Init => {
                    if self.shared.transition(INIT, SHUTDOWN) {
                        self.shared.notify_started();
                        let mut unprocessed = Vec::new();
                        self.shared.drain_queue(&mut unprocessed);
                        info!("Scheduler shut down before it was started");
                        return Ok(unprocessed);
                    }
                }
                SchedulerState::Started => {
                    if self.shared.transition(STARTED, SHUTDOWN) {
                        break;
                    }
                }
                SchedulerState::Shutdown => return Ok(Vec::new()),
            }
        }

        let Some(rx) = self.completion_rx.lock().take() else {
            return Ok(Vec::new());
        };
        let timeout = self.config.shutdown_timeout;
        match rx.recv_timeout(timeout) {
            Ok(unprocessed) => {
                if let Some(handle) = self.worker.lock().take()
                    && handle.join().is_err()
                {
                    error!("Scheduler worker panicked during shutdown");
                }
                info!(unprocessed = unprocessed.len(), "Scheduler shut down");
                Ok(unprocessed)
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout_ms = timeout.as_millis(), "Scheduler worker did not stop in time");
                Err(SchedulerError::ShutdownTimeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!("Scheduler worker exited without returning its registrations");
                Ok(Vec::new())
            }
        }
    }
}

impl Default for HashedWheelScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HashedWheelScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashedWheelScheduler")
            .field("state", &self.state())
            .field("tick_duration", &self.config.tick_duration)
            .field("wheel_size", &self.config.wheel_size())
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl Drop for HashedWheelScheduler {
    fn drop(&mut self) {
        if self.state() == SchedulerState::Shutdown {
            return;
        }
        match self.shutdown() {
            Ok(orphans) if !orphans.is_empty() => {
                warn!(
                    orphaned = orphans.len(),
                    "Scheduler dropped with registrations that never fired"
                );
            }
            Ok(_) => {}
            Err(e) => error!(error = %e, "Scheduler shutdown on drop failed"),
        }
    }
}

/// Owns the wheel; runs on the dedicated scheduler thread.
struct Worker {
    shared: Arc<Shared>,
    start: Instant,
    wheel: Vec<Bucket>,
    mask: u64,
    tick_nanos: u64,
    tick: u64,
    reschedule: Vec<Registration>,
    completion: Option<Sender<Vec<Registration>>>,
}

impl Worker {
    fn new(
        config: &SchedulerConfig,
        shared: Arc<Shared>,
        completion: Option<Sender<Vec<Registration>>>,
    ) -> Self {
        let size = config.wheel_size();
        Self {
            shared,
            start: Instant::now(),
            wheel: (0..size).map(|_| Bucket::default()).collect(),
            mask: size as u64 - 1,
            tick_nanos: config.tick_nanos(),
            tick: 0,
            reschedule: Vec::new(),
            completion,
        }
    }

    fn run(mut self) {
        self.start = Instant::now();
        let start = self.start;
        let _ = self.shared.start.set(start);
        self.shared.notify_started();

        let span = sirocco_telemetry::scheduler_span(
            Duration::from_nanos(self.tick_nanos),
            self.wheel.len(),
        );
        let _enter = span.enter();
        debug!("Scheduler worker started");

        while self.shared.state() == SchedulerState::Started {
            let elapsed = self.wait_for_next_tick(start);
            if self.shared.state() != SchedulerState::Started {
                break;
            }
            self.process_tick(elapsed);
        }

        let unprocessed = self.drain();
        debug!(
            ticks = self.tick,
            unprocessed = unprocessed.len(),
            "Scheduler worker stopping"
        );
        if let Some(tx) = self.completion.take()
            && tx.send(unprocessed).is_err()
        {
            debug!("Nobody waiting for unprocessed registrations");
        }
    }

    /// Sleeps until the end of the current tick and returns the elapsed
    /// time since start in nanoseconds.
    fn wait_for_next_tick(&self, start: Instant) -> u64 {
        let deadline = self.tick_nanos.saturating_mul(self.tick + 1);
        loop {
            let elapsed = to_nanos(start.elapsed());
            let remaining = deadline.saturating_sub(elapsed);
            if remaining == 0 {
                return elapsed;
            }
            std::thread::sleep(Duration::from_millis(remaining.div_ceil(1_000_000)));
        }
    }

    fn process_tick(&mut self, elapsed: u64) {
        let idx = (self.tick & self.mask) as usize;
        self.transfer_registrations();

        let expiry = self.wheel[idx].execute(elapsed, &mut self.reschedule);
        self.shared.retire(expiry.retired);
        if expiry.fired > 0 {
            trace!(tick = self.tick, fired = expiry.fired, "Tick expired registrations");
        }

        self.tick += 1;
        self.process_reschedule();
    }

    fn transfer_registrations(&mut self) {
        for _ in 0..MAX_TRANSFERS_PER_TICK {
            let Some(registration) = self.shared.queue.pop() else {
                return;
            };
            if registration.is_cancelled() {
                self.shared.retire(1);
                continue;
            }
            self.place_in_bucket(registration);
        }
    }

    /// Advances each fired repeat by its interval. A repeat that fell behind
    /// fires once more right away, then continues at its interval from now.
    fn process_reschedule(&mut self) {
        if self.reschedule.is_empty() {
            return;
        }
        let now = to_nanos(self.start.elapsed());
        let due = std::mem::take(&mut self.reschedule);
        for mut registration in due {
            registration.deadline = registration
                .deadline
                .saturating_add(registration.offset)
                .max(now);
            self.place_in_bucket(registration);
        }
    }

    fn place_in_bucket(&mut self, mut registration: Registration) {
        let calculated = registration.deadline / self.tick_nanos;
        registration.remaining_rounds =
            calculated.saturating_sub(self.tick) / self.wheel.len() as u64;
        let ticks = calculated.max(self.tick);
        self.wheel[(ticks & self.mask) as usize].add(registration);
    }

    fn drain(&mut self) -> Vec<Registration> {
        let mut unprocessed = Vec::new();
        for bucket in &mut self.wheel {
            bucket.drain_live(&mut unprocessed);
        }
        unprocessed.extend(self.reschedule.drain(..).filter(|r| !r.is_cancelled()));
        self.shared.drain_queue(&mut unprocessed);
        self.shared.pending.store(0, Ordering::Release);
        unprocessed
    }
}
