//! Single-threaded event dispatch
//!
//! The reactor owns every periodic timer together with its handler and runs
//! handlers to completion on one thread:
//!
//! ```text
//!            ┌─────────────────────────────────────────┐
//!            │ Reactor (main thread)                   │
//!  timers ──►│  dispatch table: [timer, handler] ...   │
//!            │  expired? → handler.on_timer(..)        │
//! commands ─►│  CommandRequest → dispatch() → reply    │
//!            │  ShutdownFlag checked between events    │
//!            └─────────────────────────────────────────┘
//! ```
//!
//! Remote commands arrive over a `crossbeam_channel` from the command
//! server thread and are executed between timer dispatches, so a command
//! never runs concurrently with an acquisition cycle.
//!
//! Dropping the reactor releases every handler in registration order,
//! logging each one.

mod shutdown;
mod timer;

pub use shutdown::ShutdownFlag;
pub use timer::PeriodicTimer;

use crate::commands::{self, CommandRequest, CommandTarget};
use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

/// Longest wait between shutdown checks
const MAX_WAIT: Duration = Duration::from_millis(100);

/// Index into the reactor's dispatch table
pub type TimerId = usize;

/// Work run when a periodic timer expires
pub trait TimerHandler {
    /// Called once per expiry; must consume `timer` before doing work
    fn on_timer(&mut self, timer: &mut PeriodicTimer, now: Instant, shutdown: &ShutdownFlag);

    /// Name used when the handler is released
    fn name(&self) -> &str;
}

struct TimerEntry {
    timer: PeriodicTimer,
    handler: Box<dyn TimerHandler>,
}

/// Event-dispatch loop
pub struct Reactor {
    entries: Vec<TimerEntry>,
    commands: Option<Receiver<CommandRequest>>,
    poll_timer: Option<TimerId>,
    shutdown: ShutdownFlag,
}

impl Reactor {
    pub fn new(shutdown: ShutdownFlag) -> Self {
        Self {
            entries: Vec::new(),
            commands: None,
            poll_timer: None,
            shutdown,
        }
    }

    /// Register a periodic timer; the first expiry is one period from now
    pub fn add_timer(&mut self, period: Duration, handler: Box<dyn TimerHandler>) -> Result<TimerId> {
        let timer = PeriodicTimer::new(period, Instant::now())?;
        log::info!("Registered {} timer ({:?} period)", handler.name(), period);
        self.entries.push(TimerEntry { timer, handler });
        Ok(self.entries.len() - 1)
    }

    /// Accept remote commands; `setSensorPollTime` acts on `poll_timer`
    pub fn attach_commands(&mut self, requests: Receiver<CommandRequest>, poll_timer: TimerId) -> Result<()> {
        if poll_timer >= self.entries.len() {
            return Err(Error::Initialization(format!("no timer with id {}", poll_timer)));
        }
        self.commands = Some(requests);
        self.poll_timer = Some(poll_timer);
        Ok(())
    }

    pub fn timer(&self, id: TimerId) -> Option<&PeriodicTimer> {
        self.entries.get(id).map(|entry| &entry.timer)
    }

    pub fn shutdown_flag(&self) -> &ShutdownFlag {
        &self.shutdown
    }

    /// Dispatch until shutdown is requested
    pub fn run(&mut self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(Error::Initialization("reactor has no timers".to_string()));
        }

        while !self.shutdown.is_requested() {
            self.dispatch_timers(Instant::now());
            if self.shutdown.is_requested() {
                break;
            }

            let wait = self.time_to_next_deadline().min(MAX_WAIT);
            self.wait_for_command(wait);
        }

        log::info!("Reactor stopped");
        Ok(())
    }

    /// One non-blocking pass: expired timers, then queued commands
    ///
    /// Returns the number of events handled.
    pub fn poll_once(&mut self, now: Instant) -> usize {
        let mut handled = self.dispatch_timers(now);
        while let Some(rx) = &self.commands {
            match rx.try_recv() {
                Ok(request) => {
                    self.handle_command(request);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.detach_commands();
                    break;
                }
            }
        }
        handled
    }

    fn dispatch_timers(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        for entry in &mut self.entries {
            if self.shutdown.is_requested() {
                break;
            }
            if entry.timer.is_expired(now) {
                entry.handler.on_timer(&mut entry.timer, now, &self.shutdown);
                fired += 1;
            }
        }
        fired
    }

    fn time_to_next_deadline(&self) -> Duration {
        let now = Instant::now();
        self.entries
            .iter()
            .map(|entry| entry.timer.deadline().saturating_duration_since(now))
            .min()
            .unwrap_or(MAX_WAIT)
    }

    fn wait_for_command(&mut self, wait: Duration) {
        let Some(rx) = &self.commands else {
            thread::sleep(wait);
            return;
        };

        match rx.recv_timeout(wait) {
            Ok(request) => self.handle_command(request),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => self.detach_commands(),
        }
    }

    fn detach_commands(&mut self) {
        log::warn!("Command channel disconnected; remote commands disabled");
        self.commands = None;
    }

    fn handle_command(&mut self, request: CommandRequest) {
        log::debug!("Executing command {} ({:?})", request.method, request.payload);

        let response = {
            let mut control = ReactorControl {
                timer: self
                    .poll_timer
                    .and_then(|id| self.entries.get_mut(id))
                    .map(|entry| &mut entry.timer),
                shutdown: &self.shutdown,
            };
            commands::dispatch(&request.method, &request.payload, &mut control)
        };

        if request.reply.send(response).is_err() {
            log::warn!("Command client went away before reply to {}", request.method);
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        for entry in self.entries.drain(..) {
            log::info!("Closing {} timer", entry.handler.name());
        }
        if self.commands.take().is_some() {
            log::info!("Closing command channel");
        }
    }
}

/// Runtime control surface handed to command dispatch
struct ReactorControl<'a> {
    timer: Option<&'a mut PeriodicTimer>,
    shutdown: &'a ShutdownFlag,
}

impl CommandTarget for ReactorControl<'_> {
    fn set_poll_period(&mut self, period: Duration) -> Result<()> {
        let timer = self
            .timer
            .as_deref_mut()
            .ok_or_else(|| Error::Scheduling("no acquisition timer".to_string()))?;
        timer.set_period(period, Instant::now())
    }

    fn halt(&mut self) {
        self.shutdown.request();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandResponse;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Counts ticks; requests shutdown after `limit`
    struct Counter {
        ticks: Arc<Mutex<u32>>,
        limit: u32,
    }

    impl TimerHandler for Counter {
        fn on_timer(&mut self, timer: &mut PeriodicTimer, now: Instant, shutdown: &ShutdownFlag) {
            if timer.consume(now).is_err() {
                shutdown.request();
                return;
            }
            let mut ticks = self.ticks.lock();
            *ticks += 1;
            if *ticks >= self.limit {
                shutdown.request();
            }
        }

        fn name(&self) -> &str {
            "counter"
        }
    }

    fn counter(limit: u32) -> (Box<Counter>, Arc<Mutex<u32>>) {
        let ticks = Arc::new(Mutex::new(0));
        let handler = Box::new(Counter {
            ticks: Arc::clone(&ticks),
            limit,
        });
        (handler, ticks)
    }

    fn request(method: &str, payload: &str) -> (CommandRequest, Receiver<CommandResponse>) {
        let (reply, rx) = crossbeam_channel::bounded(1);
        (
            CommandRequest {
                method: method.to_string(),
                payload: payload.to_string(),
                reply,
            },
            rx,
        )
    }

    #[test]
    fn test_run_until_handler_requests_shutdown() {
        let mut reactor = Reactor::new(ShutdownFlag::new());
        let (handler, ticks) = counter(3);
        reactor.add_timer(Duration::from_millis(5), handler).unwrap();

        reactor.run().unwrap();
        assert_eq!(*ticks.lock(), 3);
    }

    #[test]
    fn test_run_without_timers_fails() {
        let mut reactor = Reactor::new(ShutdownFlag::new());
        assert!(matches!(reactor.run(), Err(Error::Initialization(_))));
    }

    #[test]
    fn test_poll_time_command_sets_period() {
        let mut reactor = Reactor::new(ShutdownFlag::new());
        let (handler, _) = counter(u32::MAX);
        let id = reactor.add_timer(Duration::from_secs(1), handler).unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        reactor.attach_commands(rx, id).unwrap();

        let (req, reply) = request("setSensorPollTime", r#"{"pollTime":500}"#);
        tx.send(req).unwrap();
        let (bad, bad_reply) = request("setSensorPollTime", r#"{"pollTime":0}"#);
        tx.send(bad).unwrap();

        reactor.poll_once(Instant::now());

        assert_eq!(reply.try_recv().unwrap().status, 200);
        assert_eq!(bad_reply.try_recv().unwrap().status, 400);
        assert_eq!(reactor.timer(id).unwrap().period(), Duration::from_nanos(500));
    }

    #[test]
    fn test_halt_command_stops_run() {
        let shutdown = ShutdownFlag::new();
        let mut reactor = Reactor::new(shutdown.clone());
        let (handler, _) = counter(u32::MAX);
        let id = reactor.add_timer(Duration::from_secs(60), handler).unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        reactor.attach_commands(rx, id).unwrap();
        let (req, reply) = request("haltApplication", "");
        tx.send(req).unwrap();

        reactor.run().unwrap();
        assert!(shutdown.is_requested());
        assert_eq!(reply.try_recv().unwrap().status, 200);
    }

    #[test]
    fn test_attach_unknown_timer_fails() {
        let mut reactor = Reactor::new(ShutdownFlag::new());
        let (_tx, rx) = crossbeam_channel::unbounded();
        assert!(reactor.attach_commands(rx, 0).is_err());
    }
}
