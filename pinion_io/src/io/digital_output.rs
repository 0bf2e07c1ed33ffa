//! Digital output endpoint.
//!
//! Owns the state machine for one commanded pin: transitions go through
//! the provider-opened backend, fire change events only when the level
//! actually changes, and drive the timed pulse/blink protocols.

use std::any::Any;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, trace};

use pinion_common::config::DigitalOutputConfig;
use pinion_common::describe::Descriptor;
use pinion_common::digital::{DigitalState, IoType, TimeUnit};
use pinion_common::error::{IoError, LifecycleError};
use pinion_common::event::{DigitalStateChangeEvent, DigitalStateListener, ListenerToken};
use pinion_common::provider::DigitalWriter;

use crate::io::{Io, ListenerSet};
use crate::task::ToggleTask;

/// Completion callback for the pulse/blink protocols.
///
/// A callback failure (error or panic) is logged and never propagated
/// into the operation's result.
pub type ToggleCallback =
    Box<dyn FnOnce() -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send>;

/// Transition machinery shared with async toggle workers.
struct OutputCore {
    id: String,
    writer: Box<dyn DigitalWriter>,
    state: Mutex<DigitalState>,
    listeners: ListenerSet,
}

impl OutputCore {
    fn state(&self) -> DigitalState {
        *self.state.lock().expect("output state lock poisoned")
    }

    fn set_state(&self, new: DigitalState) -> Result<(), IoError> {
        let mut state = self.state.lock().expect("output state lock poisoned");
        if *state == new {
            return Ok(());
        }
        self.writer.write(new)?;
        *state = new;
        trace!("'{}' -> {}", self.id, new);
        // Dispatch under the state lock so event order always matches
        // transition order.
        let event = DigitalStateChangeEvent {
            id: self.id.clone(),
            state: new,
        };
        self.listeners.dispatch(&event);
        Ok(())
    }

    fn toggle_from_current(&self) -> Result<(), IoError> {
        let current = self.state();
        self.set_state(current.inverse())
    }
}

/// A digital output endpoint.
///
/// Created by the registry around a provider-opened [`DigitalWriter`]
/// backend. The instance exclusively owns its state field and listener
/// set; the registry owns its presence in the id space.
pub struct DigitalOutput {
    config: DigitalOutputConfig,
    provider_id: String,
    core: Arc<OutputCore>,
}

impl std::fmt::Debug for DigitalOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigitalOutput")
            .field("provider_id", &self.provider_id)
            .finish_non_exhaustive()
    }
}

impl DigitalOutput {
    pub(crate) fn new(
        config: DigitalOutputConfig,
        provider_id: &str,
        writer: Box<dyn DigitalWriter>,
    ) -> Self {
        let core = Arc::new(OutputCore {
            id: config.id.clone(),
            writer,
            state: Mutex::new(DigitalState::Unknown),
            listeners: ListenerSet::new(),
        });
        Self {
            config,
            provider_id: provider_id.to_string(),
            core,
        }
    }

    /// This endpoint's immutable configuration.
    pub fn config(&self) -> &DigitalOutputConfig {
        &self.config
    }

    /// Current logical state.
    pub fn state(&self) -> DigitalState {
        self.core.state()
    }

    /// Drive the pin to `new`.
    ///
    /// A no-op when `new` equals the current state: no device write, no
    /// event. Otherwise the backend write happens first; on success the
    /// state is updated and a change event is dispatched synchronously to
    /// all listeners, in registration order, on the calling thread.
    /// Listeners must not write this pin's state from within the
    /// callback.
    ///
    /// # Errors
    /// Returns the device error; the logical state is unchanged and no
    /// event fires.
    pub fn set_state(&self, new: DigitalState) -> Result<(), IoError> {
        self.core.set_state(new)
    }

    /// The configured "on" level. Default: `High`.
    pub fn on_state(&self) -> DigitalState {
        self.config.on_state.unwrap_or(DigitalState::High)
    }

    /// Drive the pin to its configured "on" level.
    ///
    /// # Errors
    /// Returns the device error from the underlying write.
    pub fn on(&self) -> Result<(), IoError> {
        self.set_state(self.on_state())
    }

    /// Drive the pin to the inverse of its configured "on" level.
    ///
    /// # Errors
    /// Returns the device error from the underlying write.
    pub fn off(&self) -> Result<(), IoError> {
        self.set_state(self.on_state().inverse())
    }

    /// Invert the current level. From `Unknown` the pin goes to the
    /// configured "off" level.
    ///
    /// # Errors
    /// Returns the device error from the underlying write.
    pub fn toggle(&self) -> Result<(), IoError> {
        let next = match self.state() {
            DigitalState::Unknown => self.on_state().inverse(),
            current => current.inverse(),
        };
        self.set_state(next)
    }

    fn pulse_millis(interval: u32, unit: TimeUnit) -> Result<u64, IoError> {
        if interval == 0 {
            return Err(IoError::InvalidInterval { what: "interval" });
        }
        unit.to_millis(interval)
    }

    fn blink_millis(delay: u32, duration: u32, unit: TimeUnit) -> Result<u64, IoError> {
        if delay == 0 {
            return Err(IoError::InvalidInterval { what: "delay" });
        }
        if duration == 0 {
            return Err(IoError::InvalidInterval { what: "duration" });
        }
        unit.to_millis(delay)
    }

    /// Single timed toggle: set `state`, hold it for the interval, then
    /// restore its inverse.
    ///
    /// **Blocks the calling thread** for the full interval; use
    /// [`pulse_async`](Self::pulse_async) from latency-sensitive threads.
    /// The optional callback runs after the second transition; its
    /// failure is logged, never propagated.
    ///
    /// # Errors
    /// Rejects a zero interval and microsecond/day granularities before
    /// any transition. A device failure aborts the sequence, leaving the
    /// pin wherever it got to.
    pub fn pulse(
        &self,
        interval: u32,
        unit: TimeUnit,
        state: DigitalState,
        callback: Option<ToggleCallback>,
    ) -> Result<(), IoError> {
        let millis = Self::pulse_millis(interval, unit)?;
        self.core.set_state(state)?;
        thread::sleep(Duration::from_millis(millis));
        self.core.set_state(state.inverse())?;
        run_callback(&self.core.id, callback);
        Ok(())
    }

    /// Repeated timed toggle.
    ///
    /// Produces exactly `duration` transitions: the first sets `state`,
    /// each subsequent one (after sleeping `delay`) inverts the current
    /// level. `duration` counts transitions, not on/off cycles:
    ///
    /// ```text
    ///   on  +-----+     +-----+
    ///       |     |     |     |
    ///  off  +     +-----+     +-----
    ///       ^                      ^
    ///       1     2     3     4    (duration = 4, ~2 visible blinks)
    /// ```
    ///
    /// An odd `duration` leaves the pin opposite its starting level.
    /// **Blocks the calling thread** for the whole sequence; see
    /// [`blink_async`](Self::blink_async).
    ///
    /// # Errors
    /// Rejects zero delay/duration and microsecond/day granularities
    /// before any transition. A device failure aborts the remaining
    /// iterations, leaving the pin wherever the sequence got to.
    pub fn blink(
        &self,
        delay: u32,
        duration: u32,
        unit: TimeUnit,
        state: DigitalState,
        callback: Option<ToggleCallback>,
    ) -> Result<(), IoError> {
        let millis = Self::blink_millis(delay, duration, unit)?;
        self.core.set_state(state)?;
        for _ in 1..duration {
            thread::sleep(Duration::from_millis(millis));
            self.core.toggle_from_current()?;
        }
        run_callback(&self.core.id, callback);
        Ok(())
    }

    /// Asynchronous [`pulse`](Self::pulse): validates arguments
    /// synchronously, then runs the toggle sequence on a worker thread.
    ///
    /// Cancelling the returned task stops further toggling and leaves
    /// the pin in its last-set state.
    ///
    /// # Errors
    /// Argument validation and thread-spawn failures surface before the
    /// task starts.
    pub fn pulse_async(
        &self,
        interval: u32,
        unit: TimeUnit,
        state: DigitalState,
        callback: Option<ToggleCallback>,
    ) -> Result<ToggleTask, IoError> {
        let millis = Self::pulse_millis(interval, unit)?;
        let core = Arc::clone(&self.core);
        ToggleTask::spawn(format!("pulse-{}", self.core.id), move |token| {
            core.set_state(state)?;
            if token.wait(Duration::from_millis(millis)) {
                debug!("pulse on '{}' cancelled", core.id);
                return Ok(());
            }
            core.set_state(state.inverse())?;
            run_callback(&core.id, callback);
            Ok(())
        })
    }

    /// Asynchronous [`blink`](Self::blink) with the same transition
    /// semantics, cancellable between toggles.
    ///
    /// # Errors
    /// Argument validation and thread-spawn failures surface before the
    /// task starts.
    pub fn blink_async(
        &self,
        delay: u32,
        duration: u32,
        unit: TimeUnit,
        state: DigitalState,
        callback: Option<ToggleCallback>,
    ) -> Result<ToggleTask, IoError> {
        let millis = Self::blink_millis(delay, duration, unit)?;
        let core = Arc::clone(&self.core);
        ToggleTask::spawn(format!("blink-{}", self.core.id), move |token| {
            core.set_state(state)?;
            for _ in 1..duration {
                if token.wait(Duration::from_millis(millis)) {
                    debug!("blink on '{}' cancelled", core.id);
                    return Ok(());
                }
                core.toggle_from_current()?;
            }
            run_callback(&core.id, callback);
            Ok(())
        })
    }

    /// Register a state-change listener. Returns a token for
    /// [`remove_listener`](Self::remove_listener).
    pub fn add_listener<F>(&self, listener: F) -> ListenerToken
    where
        F: Fn(&DigitalStateChangeEvent) + Send + Sync + 'static,
    {
        let listener: Arc<DigitalStateListener> = Arc::new(listener);
        self.core.listeners.add(listener)
    }

    /// Deregister a listener. Returns false when the token is unknown.
    pub fn remove_listener(&self, token: ListenerToken) -> bool {
        self.core.listeners.remove(token)
    }

    /// Apply the configured initial state, if any.
    pub(crate) fn initialize(&self) -> Result<(), LifecycleError> {
        trace!("initializing output '{}'", self.core.id);
        if let Some(initial) = self.config.initial_state {
            self.core
                .set_state(initial)
                .map_err(LifecycleError::Initialize)?;
        }
        Ok(())
    }
}

impl Io for DigitalOutput {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn name(&self) -> &str {
        self.config.display_name()
    }

    fn io_type(&self) -> IoType {
        IoType::Output
    }

    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn describe(&self) -> Descriptor {
        Descriptor::new("OUT", self.config.display_name()).id(&self.config.id)
    }

    fn shutdown(&self) -> Result<(), LifecycleError> {
        debug!("shutting down output '{}'", self.core.id);
        if let Some(shutdown_state) = self.config.shutdown_state {
            if shutdown_state != DigitalState::Unknown {
                self.core
                    .set_state(shutdown_state)
                    .map_err(LifecycleError::Shutdown)?;
            }
        }
        self.core.listeners.clear();
        self.core.writer.detach().map_err(LifecycleError::Shutdown)
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Run an optional completion callback, isolating its failure.
fn run_callback(id: &str, callback: Option<ToggleCallback>) {
    let Some(callback) = callback else { return };
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || callback())) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("toggle callback for '{id}' failed: {e}"),
        Err(_) => error!("toggle callback for '{id}' panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Instant;

    /// Backend recording every accepted write, with failure injection.
    struct RecordingWriter {
        writes: Mutex<Vec<DigitalState>>,
        fail: AtomicBool,
        detached: AtomicBool,
    }

    impl RecordingWriter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                writes: Mutex::new(Vec::new()),
                fail: AtomicBool::new(false),
                detached: AtomicBool::new(false),
            })
        }
    }

    impl DigitalWriter for RecordingWriter {
        fn write(&self, state: DigitalState) -> Result<(), IoError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(IoError::WriteFailed {
                    address: 0,
                    reason: "injected".to_string(),
                });
            }
            self.writes.lock().unwrap().push(state);
            Ok(())
        }

        fn detach(&self) -> Result<(), IoError> {
            self.detached.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Thin forwarding handle so the same `RecordingWriter` can be boxed as
    /// the endpoint's backend while a shared `Arc` is kept in the test for
    /// inspection.
    struct SharedRecordingWriter(Arc<RecordingWriter>);

    impl DigitalWriter for SharedRecordingWriter {
        fn write(&self, state: DigitalState) -> Result<(), IoError> {
            self.0.write(state)
        }

        fn detach(&self) -> Result<(), IoError> {
            self.0.detach()
        }
    }

    fn output_with(config: DigitalOutputConfig) -> (DigitalOutput, Arc<RecordingWriter>) {
        let writer = RecordingWriter::new();
        let output = DigitalOutput::new(
            config,
            "test",
            Box::new(SharedRecordingWriter(Arc::clone(&writer))),
        );
        (output, writer)
    }

    fn plain_output() -> (DigitalOutput, Arc<RecordingWriter>) {
        output_with(DigitalOutputConfig::new("out", 17))
    }

    #[test]
    fn repeated_state_fires_one_event() {
        let (output, _writer) = plain_output();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        output.add_listener(move |e| sink.lock().unwrap().push(e.state));

        output.set_state(DigitalState::High).unwrap();
        output.set_state(DigitalState::High).unwrap();
        assert_eq!(*events.lock().unwrap(), vec![DigitalState::High]);

        output.set_state(DigitalState::Low).unwrap();
        output.set_state(DigitalState::High).unwrap();
        assert_eq!(
            *events.lock().unwrap(),
            vec![DigitalState::High, DigitalState::Low, DigitalState::High]
        );
    }

    #[test]
    fn noop_write_skips_device() {
        let (output, writer) = plain_output();
        output.set_state(DigitalState::Low).unwrap();
        output.set_state(DigitalState::Low).unwrap();
        assert_eq!(writer.writes.lock().unwrap().len(), 1);
    }

    #[test]
    fn on_off_honor_configured_on_state() {
        // Active-low wiring: "on" means Low.
        let (output, _writer) =
            output_with(DigitalOutputConfig::new("led", 18).on_state(DigitalState::Low));
        output.on().unwrap();
        assert_eq!(output.state(), DigitalState::Low);
        output.off().unwrap();
        assert_eq!(output.state(), DigitalState::High);
    }

    #[test]
    fn toggle_from_unknown_goes_off() {
        let (output, _writer) = plain_output();
        output.toggle().unwrap();
        assert_eq!(output.state(), DigitalState::Low);
        output.toggle().unwrap();
        assert_eq!(output.state(), DigitalState::High);
    }

    #[test]
    fn pulse_blocks_and_restores_inverse() {
        let (output, writer) = plain_output();
        output.set_state(DigitalState::Low).unwrap();

        let called = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&called);
        let start = Instant::now();
        output
            .pulse(
                100,
                TimeUnit::Milliseconds,
                DigitalState::High,
                Some(Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })),
            )
            .unwrap();

        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(
            *writer.writes.lock().unwrap(),
            vec![DigitalState::Low, DigitalState::High, DigitalState::Low]
        );
        assert_eq!(called.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pulse_rejects_microseconds_without_transition() {
        let (output, writer) = plain_output();
        let err = output
            .pulse(5, TimeUnit::Microseconds, DigitalState::High, None)
            .unwrap_err();
        assert!(matches!(
            err,
            IoError::UnsupportedUnit(TimeUnit::Microseconds)
        ));
        assert!(writer.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn pulse_rejects_zero_interval() {
        let (output, writer) = plain_output();
        let err = output
            .pulse(0, TimeUnit::Milliseconds, DigitalState::High, None)
            .unwrap_err();
        assert!(matches!(err, IoError::InvalidInterval { what: "interval" }));
        assert!(writer.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn blink_duration_counts_transitions() {
        let (output, writer) = plain_output();
        output.set_state(DigitalState::Low).unwrap();

        output
            .blink(10, 4, TimeUnit::Milliseconds, DigitalState::High, None)
            .unwrap();

        // 4 transitions from the initial set: High, Low, High, Low.
        assert_eq!(
            *writer.writes.lock().unwrap(),
            vec![
                DigitalState::Low,
                DigitalState::High,
                DigitalState::Low,
                DigitalState::High,
                DigitalState::Low,
            ]
        );
        assert_eq!(output.state(), DigitalState::Low);
    }

    #[test]
    fn odd_blink_duration_ends_opposite_start() {
        let (output, _writer) = plain_output();
        output.set_state(DigitalState::Low).unwrap();
        output
            .blink(5, 3, TimeUnit::Milliseconds, DigitalState::High, None)
            .unwrap();
        assert_eq!(output.state(), DigitalState::High);
    }

    #[test]
    fn blink_rejects_bad_arguments() {
        let (output, _writer) = plain_output();
        assert!(matches!(
            output.blink(0, 4, TimeUnit::Milliseconds, DigitalState::High, None),
            Err(IoError::InvalidInterval { what: "delay" })
        ));
        assert!(matches!(
            output.blink(10, 0, TimeUnit::Milliseconds, DigitalState::High, None),
            Err(IoError::InvalidInterval { what: "duration" })
        ));
        assert!(matches!(
            output.blink(1, 4, TimeUnit::Days, DigitalState::High, None),
            Err(IoError::UnsupportedUnit(TimeUnit::Days))
        ));
    }

    #[test]
    fn device_failure_aborts_blink() {
        let (output, writer) = plain_output();
        output.set_state(DigitalState::Low).unwrap();
        writer.fail.store(true, Ordering::SeqCst);

        let err = output
            .blink(5, 4, TimeUnit::Milliseconds, DigitalState::High, None)
            .unwrap_err();
        assert!(matches!(err, IoError::WriteFailed { .. }));
        // State left where the sequence got to.
        assert_eq!(output.state(), DigitalState::Low);
    }

    #[test]
    fn failing_callback_does_not_fail_pulse() {
        let (output, _writer) = plain_output();
        output
            .pulse(
                5,
                TimeUnit::Milliseconds,
                DigitalState::High,
                Some(Box::new(|| Err("callback exploded".into()))),
            )
            .unwrap();
        assert_eq!(output.state(), DigitalState::Low);
    }

    #[test]
    fn initialize_applies_initial_state() {
        let (output, _writer) =
            output_with(DigitalOutputConfig::new("out", 4).initial(DigitalState::High));
        output.initialize().unwrap();
        assert_eq!(output.state(), DigitalState::High);
    }

    #[test]
    fn shutdown_applies_shutdown_state_and_detaches() {
        let (output, writer) =
            output_with(DigitalOutputConfig::new("out", 4).on_shutdown(DigitalState::Low));
        output.set_state(DigitalState::High).unwrap();
        output.shutdown().unwrap();
        assert_eq!(output.state(), DigitalState::Low);
        assert!(writer.detached.load(Ordering::SeqCst));
    }

    #[test]
    fn shutdown_failure_surfaces_typed() {
        let (output, writer) =
            output_with(DigitalOutputConfig::new("out", 4).on_shutdown(DigitalState::Low));
        output.set_state(DigitalState::High).unwrap();
        writer.fail.store(true, Ordering::SeqCst);
        assert!(matches!(output.shutdown(), Err(LifecycleError::Shutdown(_))));
    }

    #[test]
    fn blink_async_cancellation_stops_toggling() {
        let (output, _writer) = plain_output();
        output.set_state(DigitalState::Low).unwrap();

        let task = output
            .blink_async(20, 1_000, TimeUnit::Milliseconds, DigitalState::High, None)
            .unwrap();
        thread::sleep(Duration::from_millis(60));
        task.cancel();
        assert!(task.is_cancelled());
        task.join().unwrap();

        // Far fewer transitions than requested; pin kept its last level.
        let state = output.state();
        assert!(state == DigitalState::High || state == DigitalState::Low);
    }

    #[test]
    fn pulse_async_validates_before_spawn() {
        let (output, writer) = plain_output();
        assert!(
            output
                .pulse_async(1, TimeUnit::Days, DigitalState::High, None)
                .is_err()
        );
        assert!(writer.writes.lock().unwrap().is_empty());
    }

    #[test]
    fn pulse_async_completes_like_pulse() {
        let (output, writer) = plain_output();
        output.set_state(DigitalState::Low).unwrap();
        let task = output
            .pulse_async(20, TimeUnit::Milliseconds, DigitalState::High, None)
            .unwrap();
        task.join().unwrap();
        assert_eq!(
            *writer.writes.lock().unwrap(),
            vec![DigitalState::Low, DigitalState::High, DigitalState::Low]
        );
    }
}
