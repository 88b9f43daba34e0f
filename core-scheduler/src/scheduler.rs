//! # Scheduler
//!
//! One cooperative scheduler per OS thread. The scheduler owns a ready queue
//! (shared with every thread that completes requests) and a timer queue
//! (touched only on its own thread), and dispatches active objects one at a
//! time.
//!
//! ## Lifecycle
//!
//! 1. [`Scheduler::install`] registers a scheduler on the calling thread.
//! 2. Active objects join with [`ActiveObject::add_to_scheduler`].
//! 3. The thread runs either [`start_scheduler`](Scheduler::start_scheduler)
//!    (blocks until stopped) or repeated
//!    [`run_scheduler_non_blocking`](Scheduler::run_scheduler_non_blocking)
//!    calls driven by a host loop.
//! 4. [`uninstall`](Scheduler::uninstall) removes every queued object and
//!    releases the thread.
//!
//! Any thread may call [`stop_scheduler`](Scheduler::stop_scheduler),
//! [`suspend_scheduler`](Scheduler::suspend_scheduler) and
//! [`resume_scheduler`](Scheduler::resume_scheduler). Those requests travel
//! through an internal highest-priority "stopper" object, so they take
//! effect between two dispatches and never interrupt a running handler.
//!
//! ## Lock order
//!
//! Timer queue lock, then ready queue lock, then a request's own lock.

use crate::active::{ActiveHandler, ActiveObject, RunResult, PRIORITY_HIGHEST};
use crate::error::{Result, SchedError};
use crate::observer::SchedulerObserver;
use crate::order::TIME_COMPARE_THRESHOLD;
use crate::ready_queue::ReadyQueue;
use crate::registry;
use crate::status::{CompletionHint, RequestStatus};
use crate::sync::Semaphore;
use crate::thread_context::ThreadContext;
use crate::timer_queue::TimerQueue;
use bridge_traits::time::TickSource;
use core_runtime::config::SchedulerConfig;
use core_runtime::events::{EventBus, SchedulerEvent};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tracing::{debug, error, info, trace, trace_span, warn};

const STOPPER_STOP: RequestStatus = RequestStatus::new(1);
const STOPPER_SUSPEND: RequestStatus = RequestStatus::new(2);

/// Carries stop and suspend requests into the scheduling loop.
struct Stopper {
    scheduler: Weak<Scheduler>,
}

impl ActiveHandler for Stopper {
    fn run(&self, active: &Arc<ActiveObject>) -> RunResult {
        let Some(scheduler) = self.scheduler.upgrade() else {
            return Ok(());
        };

        match active.status() {
            STOPPER_STOP => scheduler.do_stop.store(true, Ordering::SeqCst),
            STOPPER_SUSPEND => {
                scheduler.do_suspend.store(true, Ordering::SeqCst);
                // Stay armed for the next stop or suspend
                active
                    .pend_for_exec()
                    .map_err(|_| RequestStatus::GENERAL.code())?;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Per-thread active object scheduler.
pub struct Scheduler {
    name: String,
    thread_checks: bool,
    ticks: Arc<dyn TickSource>,
    event_bus: Option<EventBus>,
    ready: ReadyQueue,
    timers: Mutex<TimerQueue>,
    context: ThreadContext,
    stopper: Arc<ActiveObject>,
    stopper_lock: Mutex<()>,
    resume_sem: Semaphore,
    blocking: AtomicBool,
    do_stop: AtomicBool,
    do_suspend: AtomicBool,
    suspended: AtomicBool,
    num_added: AtomicU64,
}

impl Scheduler {
    fn new(config: SchedulerConfig, weak: Weak<Scheduler>) -> Self {
        Self {
            ready: ReadyQueue::new(
                config.reserve,
                config.tie_break,
                Arc::clone(&config.tick_source),
            ),
            timers: Mutex::new(TimerQueue::new(
                config.reserve,
                config.tie_break,
                Arc::clone(&config.tick_source),
            )),
            stopper: ActiveObject::new("Stopper", PRIORITY_HIGHEST, Stopper { scheduler: weak }),
            name: config.name,
            thread_checks: config.thread_checks,
            ticks: config.tick_source,
            event_bus: config.event_bus,
            context: ThreadContext::new(),
            stopper_lock: Mutex::new(()),
            resume_sem: Semaphore::new(),
            blocking: AtomicBool::new(false),
            do_stop: AtomicBool::new(false),
            do_suspend: AtomicBool::new(false),
            suspended: AtomicBool::new(false),
            num_added: AtomicU64::new(1),
        }
    }

    /// Installs a new scheduler on the calling thread.
    ///
    /// # Errors
    ///
    /// `AlreadyInstalled` if this thread already has a scheduler.
    pub fn install(config: SchedulerConfig) -> Result<Arc<Scheduler>> {
        if registry::is_installed() {
            return Err(SchedError::AlreadyInstalled);
        }

        let scheduler = Arc::new_cyclic(|weak| Scheduler::new(config, weak.clone()));
        registry::set(Some(Arc::clone(&scheduler)));

        let setup = scheduler
            .context
            .enter()
            .and_then(|_| scheduler.ready.thread_logon())
            .and_then(|_| scheduler.resume_sem.create(0).map_err(SchedError::from));

        if let Err(err) = setup {
            scheduler.context.exit();
            registry::set(None);
            error!(scheduler = %scheduler.name, error = %err, "Scheduler install failed");
            return Err(err);
        }

        info!(
            scheduler = %scheduler.name,
            thread_id = ThreadContext::id(),
            "Scheduler installed"
        );
        scheduler.emit(SchedulerEvent::Installed {
            scheduler: scheduler.name.clone(),
            thread_id: ThreadContext::id(),
        });
        Ok(scheduler)
    }

    /// Scheduler installed on the calling thread.
    pub fn current() -> Option<Arc<Scheduler>> {
        registry::current()
    }

    /// Removes this scheduler from its thread.
    ///
    /// Every object still queued is removed from the scheduler. Fails with
    /// `InvalidState` while a blocking loop is running.
    pub fn uninstall(&self) -> Result<()> {
        if !self.is_installed_here() {
            return Err(SchedError::NotInstalled);
        }

        if self.is_blocking() {
            if self.is_started() {
                return Err(SchedError::InvalidState);
            }
        } else if self.is_started() {
            self.end_scheduling()?;
        }

        // Keep our registry entry alive until cleanup finishes
        let _installed = registry::set(None);
        self.context.exit();

        self.cleanup_exec_q()?;

        self.ready.thread_logoff()?;
        self.resume_sem.close()?;

        info!(
            scheduler = %self.name,
            thread_id = ThreadContext::id(),
            "Scheduler uninstalled"
        );
        self.emit(SchedulerEvent::Uninstalled {
            scheduler: self.name.clone(),
        });
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether active objects reject `set_busy`/`cancel` from foreign threads.
    pub fn thread_checks(&self) -> bool {
        self.thread_checks
    }

    pub fn tick_source(&self) -> &Arc<dyn TickSource> {
        &self.ticks
    }

    pub fn is_installed(&self) -> bool {
        self.context.is_open()
    }

    /// True between the start and end of a blocking or non-blocking run.
    pub fn is_started(&self) -> bool {
        let _guard = self.stopper_lock.lock();
        self.stopper.is_added()
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking.load(Ordering::SeqCst)
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    pub fn ready_queue(&self) -> &ReadyQueue {
        &self.ready
    }

    pub fn timer_count(&self) -> usize {
        self.timers.lock().len()
    }

    pub(crate) fn next_added_number(&self) -> u64 {
        self.num_added.fetch_add(1, Ordering::SeqCst)
    }

    /// Runs the blocking scheduling loop until [`stop_scheduler`] is called.
    ///
    /// `signal`, if given, is signaled once the loop is about to start, so a
    /// controlling thread knows when stop/suspend requests are accepted.
    ///
    /// # Errors
    ///
    /// `Unhandled(code)` if an active object's `run` fails and its
    /// `run_error` does not recover.
    ///
    /// [`stop_scheduler`]: Scheduler::stop_scheduler
    pub fn start_scheduler(&self, signal: Option<&Semaphore>) -> Result<()> {
        self.begin_scheduling(true)?;

        if let Some(signal) = signal {
            if let Err(err) = signal.signal() {
                warn!(scheduler = %self.name, error = %err, "Failed to signal scheduler start");
            }
        }

        debug!(
            scheduler = %self.name,
            thread_id = ThreadContext::id(),
            "Starting scheduling loop"
        );
        let outcome = self.blocking_loop();
        debug!(
            scheduler = %self.name,
            thread_id = ThreadContext::id(),
            "Exited scheduling loop"
        );

        let ended = self.end_scheduling();
        outcome.and(ended)
    }

    /// Asks the blocking loop to exit. Callable from any thread.
    pub fn stop_scheduler(&self) -> Result<()> {
        if !self.is_installed() {
            return Err(SchedError::NotInstalled);
        }
        if !self.is_blocking() {
            return Err(SchedError::NotReady);
        }
        if !self.is_started() {
            return Ok(());
        }
        if !self.stopper.status().is_pending() {
            return Err(SchedError::NotReady);
        }

        // Wake the loop if it is parked in a suspend
        if self.do_suspend.load(Ordering::SeqCst) || self.is_suspended() {
            self.resume_sem.signal()?;
        }

        self.stopper.pend_complete(STOPPER_STOP)
    }

    /// Parks the blocking loop after the current dispatch. Callable from any
    /// thread.
    pub fn suspend_scheduler(&self) -> Result<()> {
        if !self.is_installed() {
            return Err(SchedError::NotInstalled);
        }
        if !self.is_blocking() {
            return Err(SchedError::NotSupported);
        }
        if !self.is_started() {
            return Ok(());
        }
        if !self.stopper.status().is_pending() {
            return Err(SchedError::NotReady);
        }

        self.stopper.pend_complete(STOPPER_SUSPEND)
    }

    /// Continues a suspended blocking loop. Callable from any thread.
    pub fn resume_scheduler(&self) -> Result<()> {
        if !self.is_installed() {
            return Err(SchedError::NotInstalled);
        }
        if self.do_suspend.load(Ordering::SeqCst) || self.is_suspended() {
            self.resume_sem.signal()?;
            Ok(())
        } else {
            Err(SchedError::NotReady)
        }
    }

    /// Runs up to `max_count` ready objects without blocking.
    ///
    /// Returns the number of requests still ready and the delay in
    /// milliseconds until the earliest pending timer (0 if none).
    pub fn run_scheduler_non_blocking(&self, max_count: usize) -> Result<(usize, u32)> {
        if !self.is_installed_here() {
            return Err(SchedError::NotInstalled);
        }

        if !self.is_started() {
            self.begin_scheduling(false)?;
        } else if self.is_blocking() {
            return Err(SchedError::InvalidState);
        }

        let mut shortest_delay = self.shortest_delay_msec()?;

        let mut count = 0;
        while count < max_count {
            let Some(active) = self.ready.pop_top()? else {
                break;
            };
            count += 1;
            self.call_run_exec(&active)?;
            shortest_delay = self.shortest_delay_msec()?;
        }

        Ok((self.ready.len(), shortest_delay))
    }

    /// Registers a one-shot observer on the ready queue.
    pub fn register_for_callback(&self, observer: Option<Arc<dyn SchedulerObserver>>) {
        self.ready.register_for_callback(observer);
    }

    /// Completes a request for this scheduler. Callable from any thread.
    ///
    /// An in-thread completion first pulls the request off the timer queue,
    /// which is how timer cancellation completes.
    pub fn pend_complete(
        &self,
        active: &Arc<ActiveObject>,
        reason: RequestStatus,
        hint: CompletionHint,
    ) -> Result<()> {
        if reason.is_pending() {
            return Err(SchedError::InvalidState);
        }
        if hint == CompletionHint::InThread {
            let mut timers = self.timers.lock();
            if timers.contains(active) {
                timers.remove(active);
            }
        }

        trace!(active_object = %active.name(), reason = %reason, "request complete");
        self.ready.pend_complete(active, reason)
    }

    /// Finishes a cancellation after the handler's `do_cancel` ran.
    ///
    /// If the request has not completed yet this blocks until it does, then
    /// discards it so the object will not run.
    pub fn request_canceled(&self, active: &Arc<ActiveObject>) -> Result<()> {
        if !self.ready.contains(active) {
            debug!(active_object = %active.name(), "waiting on cancel");
            self.ready.wait_for_request_complete(active)?;
        }

        active.clear_busy();
        self.ready.remove(active)?;
        Ok(())
    }

    /// Queues a timer request due in `delay_us` microseconds.
    pub fn add_to_exec_timer_q(&self, active: &Arc<ActiveObject>, delay_us: u32) -> Result<()> {
        if active.is_in_any_queue() {
            return Err(SchedError::InvalidState);
        }

        // Round to the nearest tick; the deadline may wrap with the counter
        let period = u64::from(self.ticks.tick_period_us().max(1));
        let delay_ticks = ((u64::from(delay_us) * 2 / period + 1) / 2) as u32;
        let now = self.ticks.tick_count();
        active.request().time_to_run = now.wrapping_add(delay_ticks);

        if delay_us > 0 {
            trace!(
                active_object = %active.name(),
                delay_us,
                time_to_run = now.wrapping_add(delay_ticks),
                now,
                "timer queued"
            );
        }

        let is_earliest = {
            let mut timers = self.timers.lock();
            timers.add(active)?;
            timers
                .top()
                .is_some_and(|(top, _)| Arc::ptr_eq(top, active))
        };

        if is_earliest && self.ready.has_callback() {
            self.ready.timer_callback(delay_us);
        }
        Ok(())
    }

    fn is_installed_here(&self) -> bool {
        self.is_installed() && registry::is_current(self)
    }

    fn begin_scheduling(&self, blocking: bool) -> Result<()> {
        if !self.is_installed_here() {
            return Err(SchedError::NotInstalled);
        }
        if self.is_started() {
            return Err(SchedError::InvalidState);
        }

        self.blocking.store(blocking, Ordering::SeqCst);

        {
            let _guard = self.stopper_lock.lock();
            self.stopper.add_to_scheduler()?;
            self.stopper.pend_for_exec()?;
        }

        self.emit(SchedulerEvent::Started {
            scheduler: self.name.clone(),
        });
        Ok(())
    }

    fn end_scheduling(&self) -> Result<()> {
        if !self.is_started() {
            return Ok(());
        }

        {
            let _guard = self.stopper_lock.lock();
            self.stopper.remove_from_scheduler()?;
        }

        self.emit(SchedulerEvent::Stopped {
            scheduler: self.name.clone(),
        });
        Ok(())
    }

    fn blocking_loop(&self) -> Result<()> {
        while !self.do_stop.load(Ordering::SeqCst) {
            let active = self.wait_for_ready_ao()?;
            self.call_run_exec(&active)?;

            if self.do_suspend.load(Ordering::SeqCst) {
                self.suspended.store(true, Ordering::SeqCst);
                self.do_suspend.store(false, Ordering::SeqCst);

                debug!(scheduler = %self.name, "Scheduler suspended");
                self.emit(SchedulerEvent::Suspended {
                    scheduler: self.name.clone(),
                });

                let resumed = self.resume_sem.wait();
                self.suspended.store(false, Ordering::SeqCst);
                resumed?;

                debug!(scheduler = %self.name, "Scheduler resumed");
                self.emit(SchedulerEvent::Resumed {
                    scheduler: self.name.clone(),
                });
            }
        }

        self.do_stop.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Next object to run, blocking until one is ready or a timer is due.
    fn wait_for_ready_ao(&self) -> Result<Arc<ActiveObject>> {
        let pending_timer = self.update_timers(false)?;

        if let Some(active) = self.ready.pop_top()? {
            return Ok(active);
        }

        let Some((timer, wait_ticks)) = pending_timer else {
            trace!(scheduler = %self.name, "waiting on any request");
            return self.ready.wait_and_pop_top();
        };

        trace!(
            scheduler = %self.name,
            wait_ticks,
            active_object = %timer.name(),
            "waiting on timer"
        );
        if let Some(active) = self
            .ready
            .wait_and_pop_top_timeout(self.ticks.ticks_to_msec(wait_ticks))?
        {
            return Ok(active);
        }

        // The timer is due; run it straight off the timer queue
        timer.set_status(RequestStatus::NONE);
        self.timers.lock().pop(&timer)?;
        Ok(timer)
    }

    fn shortest_delay_msec(&self) -> Result<u32> {
        Ok(self.update_timers(true)?.map_or(0, |(_, delay)| delay))
    }

    /// Completes every due timer and returns the earliest pending one with
    /// its remaining delay, in ticks or in milliseconds.
    ///
    /// In milliseconds, a delay that rounds down to zero counts as due.
    fn update_timers(&self, in_msec: bool) -> Result<Option<(Arc<ActiveObject>, u32)>> {
        let now = self.ticks.tick_count();

        loop {
            let due = {
                let mut timers = self.timers.lock();
                let Some((top, time_to_run)) = timers.top().map(|(a, t)| (Arc::clone(a), t)) else {
                    return Ok(None);
                };

                let delta = now.wrapping_sub(time_to_run);
                if delta > TIME_COMPARE_THRESHOLD {
                    let ticks = (delta as i32).unsigned_abs();
                    let delay = if in_msec {
                        self.ticks.ticks_to_msec(ticks)
                    } else {
                        ticks
                    };
                    if delay > 0 {
                        return Ok(Some((top, delay)));
                    }
                }

                timers.pop_top();
                top
            };

            self.pend_complete(&due, RequestStatus::NONE, CompletionHint::InThread)?;
        }
    }

    fn call_run_exec(&self, active: &Arc<ActiveObject>) -> Result<()> {
        active.clear_busy();
        let wait_ticks = self.ticks.tick_count().wrapping_sub(active.time_queued());
        let span = trace_span!(
            "run",
            active_object = %active.name(),
            status = %active.status(),
            wait_ticks
        );
        let _entered = span.enter();

        let started = Instant::now();
        let outcome = active.run().or_else(|code| active.run_error(code));
        let run_time = started.elapsed();
        active.record_run(wait_ticks, run_time, outcome.is_ok());
        trace!(run_us = run_time.as_micros() as u64, "run finished");

        let Err(code) = outcome else {
            return Ok(());
        };

        error!(
            scheduler = %self.name,
            thread_id = ThreadContext::id(),
            active_object = %active.name(),
            code,
            "Active object error not handled"
        );
        self.emit(SchedulerEvent::Error {
            scheduler: self.name.clone(),
            active_object: active.name().to_string(),
            code,
        });
        Err(SchedError::Unhandled(code))
    }

    /// Removes every queued object from the scheduler.
    fn cleanup_exec_q(&self) -> Result<()> {
        loop {
            let Some(timer) = self.timers.lock().pop_top() else {
                break;
            };
            timer.remove_from_scheduler()?;
        }

        while let Some(active) = self.ready.top() {
            active.remove_from_scheduler()?;
            // A custom do_cancel may leave the entry behind
            self.ready.remove(&active)?;
        }
        Ok(())
    }

    fn emit(&self, event: SchedulerEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(event).ok();
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("name", &self.name)
            .field("installed", &self.is_installed())
            .field("blocking", &self.is_blocking())
            .field("suspended", &self.is_suspended())
            .field("ready", &self.ready)
            .finish()
    }
}
