//! Clocks that drive property animations.
//!
//! A [`Clock`] reports elapsed time against a duration and notifies
//! subscribers when it starts, stops, pauses or resumes. Animated property
//! values subscribe to their clock and sample it on every digest.
//!
//! [`SimpleClock`] is advanced explicitly with [`SimpleClock::update`].
//! [`ClockPool`] keeps reusable clocks in a generational arena; a
//! [`PooledClock`] handle checks on every access that its slot is still
//! live, so a clock released back to the pool is observed as stopped rather
//! than silently driving an unrelated animation.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use slotmap::{new_key_type, SlotMap};

use crate::foundation::PresentationFoundation;
use crate::logging::targets;

/// The run state of a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockState {
    /// Not running; elapsed time is zero.
    #[default]
    Stopped,
    /// Advancing.
    Running,
    /// Holding its elapsed time.
    Paused,
}

/// A state transition reported to clock subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    /// The clock started from zero.
    Started,
    /// The clock was stopped explicitly.
    Stopped,
    /// The clock was paused.
    Paused,
    /// The clock resumed after a pause.
    Resumed,
}

/// What a clock does when it reaches its duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopBehavior {
    /// Hold at the end.
    #[default]
    None,
    /// Restart from zero.
    Loop,
    /// Run backwards, then forwards again.
    Reverse,
}

/// Receives clock state transitions.
pub trait ClockSubscriber {
    /// Handle a transition.
    fn on_clock_event(&self, event: ClockEvent);
}

/// Identifies one subscription on one clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockSubscription(u64);

/// A source of animation time.
pub trait Clock {
    /// Time elapsed in the current iteration.
    fn elapsed(&self) -> Duration;

    /// Length of one iteration.
    fn duration(&self) -> Duration;

    /// The current run state.
    fn state(&self) -> ClockState;

    /// Subscribe to state transitions.
    fn subscribe(&self, subscriber: Weak<dyn ClockSubscriber>) -> ClockSubscription;

    /// Cancel a subscription.
    fn unsubscribe(&self, subscription: ClockSubscription);

    /// Elapsed time as a fraction of the duration.
    fn progress(&self) -> f32 {
        let duration = self.duration();
        if duration.is_zero() {
            1.0
        } else {
            (self.elapsed().as_secs_f64() / duration.as_secs_f64()) as f32
        }
    }
}

#[derive(Debug, Default)]
struct ClockTimes {
    state: ClockState,
    total: Duration,
    elapsed: Duration,
}

/// A clock advanced explicitly by its owner.
pub struct SimpleClock {
    duration: Duration,
    loop_behavior: LoopBehavior,
    times: RefCell<ClockTimes>,
    subscribers: RefCell<Vec<(ClockSubscription, Weak<dyn ClockSubscriber>)>>,
    next_subscription: Cell<u64>,
}

impl SimpleClock {
    /// A stopped clock.
    pub fn new(loop_behavior: LoopBehavior, duration: Duration) -> Self {
        Self {
            duration,
            loop_behavior,
            times: RefCell::new(ClockTimes::default()),
            subscribers: RefCell::new(Vec::new()),
            next_subscription: Cell::new(0),
        }
    }

    /// The loop behavior.
    pub fn loop_behavior(&self) -> LoopBehavior {
        self.loop_behavior
    }

    /// Returns `true` once a non-looping clock has reached its duration.
    pub fn is_finished(&self) -> bool {
        self.loop_behavior == LoopBehavior::None
            && self.state() != ClockState::Stopped
            && self.times.borrow().total >= self.duration
    }

    /// Start (or restart) from zero.
    pub fn start(&self) {
        {
            let mut times = self.times.borrow_mut();
            times.state = ClockState::Running;
            times.total = Duration::ZERO;
            times.elapsed = Duration::ZERO;
        }
        self.notify(ClockEvent::Started);
    }

    /// Stop and reset to zero.
    pub fn stop(&self) {
        {
            let mut times = self.times.borrow_mut();
            if times.state == ClockState::Stopped {
                return;
            }
            *times = ClockTimes::default();
        }
        self.notify(ClockEvent::Stopped);
    }

    /// Pause a running clock.
    pub fn pause(&self) {
        {
            let mut times = self.times.borrow_mut();
            if times.state != ClockState::Running {
                return;
            }
            times.state = ClockState::Paused;
        }
        self.notify(ClockEvent::Paused);
    }

    /// Resume a paused clock.
    pub fn resume(&self) {
        {
            let mut times = self.times.borrow_mut();
            if times.state != ClockState::Paused {
                return;
            }
            times.state = ClockState::Running;
        }
        self.notify(ClockEvent::Resumed);
    }

    /// Advance a running clock by `delta`.
    pub fn update(&self, delta: Duration) {
        let mut times = self.times.borrow_mut();
        if times.state != ClockState::Running {
            return;
        }
        times.total += delta;
        times.elapsed = self.position(times.total);
    }

    fn position(&self, total: Duration) -> Duration {
        if self.duration.is_zero() {
            return Duration::ZERO;
        }
        let duration = self.duration.as_nanos();
        let total_nanos = total.as_nanos();
        let within = |nanos: u128| Duration::from_nanos(nanos.min(u64::MAX as u128) as u64);

        match self.loop_behavior {
            LoopBehavior::None => total.min(self.duration),
            LoopBehavior::Loop => within(total_nanos % duration),
            LoopBehavior::Reverse => {
                let iteration = total_nanos / duration;
                let offset = total_nanos % duration;
                if iteration % 2 == 0 {
                    within(offset)
                } else {
                    within(duration - offset)
                }
            }
        }
    }

    /// Drop every subscriber and reset to the stopped state without notifying.
    fn reset(&self) {
        *self.times.borrow_mut() = ClockTimes::default();
        self.subscribers.borrow_mut().clear();
    }

    fn notify(&self, event: ClockEvent) {
        let live: Vec<Rc<dyn ClockSubscriber>> = {
            let mut subscribers = self.subscribers.borrow_mut();
            subscribers.retain(|(_, subscriber)| subscriber.strong_count() > 0);
            subscribers
                .iter()
                .filter_map(|(_, subscriber)| subscriber.upgrade())
                .collect()
        };
        tracing::trace!(target: targets::ANIMATION, ?event, subscribers = live.len(), "clock transition");
        for subscriber in live {
            subscriber.on_clock_event(event);
        }
    }
}

impl Clock for SimpleClock {
    fn elapsed(&self) -> Duration {
        self.times.borrow().elapsed
    }

    fn duration(&self) -> Duration {
        self.duration
    }

    fn state(&self) -> ClockState {
        self.times.borrow().state
    }

    fn subscribe(&self, subscriber: Weak<dyn ClockSubscriber>) -> ClockSubscription {
        let id = self.next_subscription.get();
        self.next_subscription.set(id + 1);
        let subscription = ClockSubscription(id);
        self.subscribers.borrow_mut().push((subscription, subscriber));
        subscription
    }

    fn unsubscribe(&self, subscription: ClockSubscription) {
        self.subscribers
            .borrow_mut()
            .retain(|(id, _)| *id != subscription);
    }
}

impl std::fmt::Debug for SimpleClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let times = self.times.borrow();
        f.debug_struct("SimpleClock")
            .field("state", &times.state)
            .field("elapsed", &times.elapsed)
            .field("duration", &self.duration)
            .field("loop_behavior", &self.loop_behavior)
            .finish()
    }
}

new_key_type! {
    /// A slot in the clock pool.
    ///
    /// Keys are generational: once a clock is released the key no longer
    /// resolves, even if its slot is reused.
    pub struct ClockId;
}

/// A pool of reusable clocks.
pub struct ClockPool {
    live: SlotMap<ClockId, Rc<SimpleClock>>,
    free: Vec<Rc<SimpleClock>>,
}

impl ClockPool {
    /// An empty pool that keeps up to `capacity` released clocks for reuse.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            live: SlotMap::with_capacity_and_key(capacity),
            free: Vec::with_capacity(capacity),
        }
    }

    /// Take a stopped clock from the pool.
    pub fn retrieve(&mut self, loop_behavior: LoopBehavior, duration: Duration) -> ClockId {
        let clock = match self.free.iter().position(|clock| {
            clock.loop_behavior == loop_behavior && clock.duration == duration
        }) {
            Some(index) => self.free.swap_remove(index),
            None => Rc::new(SimpleClock::new(loop_behavior, duration)),
        };
        self.live.insert(clock)
    }

    /// Stop a clock and return it to the pool.
    ///
    /// Returns the clock so the caller can stop it outside any borrow of the
    /// pool, or `None` if the id is no longer live.
    pub fn release(&mut self, id: ClockId) -> Option<Rc<SimpleClock>> {
        let clock = self.live.remove(id)?;
        if self.free.len() < self.free.capacity() {
            self.free.push(clock.clone());
        }
        Some(clock)
    }

    /// Returns `true` if the id refers to a clock that has not been released.
    pub fn is_alive(&self, id: ClockId) -> bool {
        self.live.contains_key(id)
    }

    /// The clock behind a live id.
    pub fn get(&self, id: ClockId) -> Option<Rc<SimpleClock>> {
        self.live.get(id).cloned()
    }

    /// All live clocks.
    pub fn clocks(&self) -> Vec<Rc<SimpleClock>> {
        self.live.values().cloned().collect()
    }

    /// Number of live clocks.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Returns `true` if no clocks are live.
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

/// A handle to a clock owned by the thread's clock pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PooledClock {
    id: ClockId,
}

impl PooledClock {
    /// Retrieve a clock from the thread's pool.
    pub fn retrieve(loop_behavior: LoopBehavior, duration: Duration) -> Self {
        let id = PresentationFoundation::with_clock_pool(|pool| pool.retrieve(loop_behavior, duration));
        Self { id }
    }

    /// The pool slot.
    pub fn id(&self) -> ClockId {
        self.id
    }

    /// Returns `true` if the clock has not been released.
    pub fn is_alive(&self) -> bool {
        PresentationFoundation::with_clock_pool(|pool| pool.is_alive(self.id))
    }

    /// Start the clock, if it is still live.
    pub fn start(&self) {
        if let Some(clock) = self.clock() {
            clock.start();
        }
    }

    /// Stop the clock, if it is still live.
    pub fn stop(&self) {
        if let Some(clock) = self.clock() {
            clock.stop();
        }
    }

    /// Stop the clock and return it to the pool.
    pub fn release(self) {
        let released = PresentationFoundation::with_clock_pool(|pool| pool.release(self.id));
        if let Some(clock) = released {
            clock.stop();
            clock.reset();
        }
    }

    /// The pooled clock, to animate with. `None` once released.
    pub fn clock(&self) -> Option<Rc<SimpleClock>> {
        PresentationFoundation::with_clock_pool(|pool| pool.get(self.id))
    }
}

impl Clock for PooledClock {
    fn elapsed(&self) -> Duration {
        self.clock().map(|clock| clock.elapsed()).unwrap_or_default()
    }

    fn duration(&self) -> Duration {
        self.clock().map(|clock| clock.duration()).unwrap_or_default()
    }

    fn state(&self) -> ClockState {
        self.clock().map(|clock| clock.state()).unwrap_or_default()
    }

    fn subscribe(&self, subscriber: Weak<dyn ClockSubscriber>) -> ClockSubscription {
        match self.clock() {
            Some(clock) => clock.subscribe(subscriber),
            None => ClockSubscription(u64::MAX),
        }
    }

    fn unsubscribe(&self, subscription: ClockSubscription) {
        if let Some(clock) = self.clock() {
            clock.unsubscribe(subscription);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: RefCell<Vec<ClockEvent>>,
    }

    impl ClockSubscriber for Recorder {
        fn on_clock_event(&self, event: ClockEvent) {
            self.events.borrow_mut().push(event);
        }
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn test_simple_clock_advances_while_running() {
        let clock = SimpleClock::new(LoopBehavior::None, ms(1000));
        clock.update(ms(100));
        assert_eq!(clock.elapsed(), Duration::ZERO);

        clock.start();
        clock.update(ms(250));
        assert_eq!(clock.elapsed(), ms(250));
        assert_eq!(clock.progress(), 0.25);

        clock.pause();
        clock.update(ms(250));
        assert_eq!(clock.elapsed(), ms(250));

        clock.resume();
        clock.update(ms(2000));
        assert_eq!(clock.elapsed(), ms(1000));
        assert!(clock.is_finished());
        assert_eq!(clock.state(), ClockState::Running);
    }

    #[test]
    fn test_loop_behaviors() {
        let looping = SimpleClock::new(LoopBehavior::Loop, ms(100));
        looping.start();
        looping.update(ms(250));
        assert_eq!(looping.elapsed(), ms(50));

        let reversing = SimpleClock::new(LoopBehavior::Reverse, ms(100));
        reversing.start();
        reversing.update(ms(130));
        assert_eq!(reversing.elapsed(), ms(70));
    }

    #[test]
    fn test_subscribers_receive_events() {
        let clock = SimpleClock::new(LoopBehavior::None, ms(100));
        let recorder = Rc::new(Recorder::default());
        let weak: Weak<dyn ClockSubscriber> = Rc::downgrade(&(recorder.clone() as Rc<dyn ClockSubscriber>));
        let subscription = clock.subscribe(weak);

        clock.start();
        clock.pause();
        clock.resume();
        clock.stop();
        assert_eq!(
            *recorder.events.borrow(),
            vec![
                ClockEvent::Started,
                ClockEvent::Paused,
                ClockEvent::Resumed,
                ClockEvent::Stopped
            ]
        );

        clock.unsubscribe(subscription);
        clock.start();
        assert_eq!(recorder.events.borrow().len(), 4);
    }

    #[test]
    fn test_pool_generations() {
        let mut pool = ClockPool::with_capacity(2);
        let first = pool.retrieve(LoopBehavior::None, ms(100));
        assert!(pool.is_alive(first));

        let released = pool.release(first);
        assert!(released.is_some());
        assert!(!pool.is_alive(first));
        assert!(pool.release(first).is_none());

        let second = pool.retrieve(LoopBehavior::None, ms(100));
        assert_ne!(first, second);
        assert!(pool.is_alive(second));
        assert!(!pool.is_alive(first));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_released_pooled_clock_reads_as_stopped() {
        let clock = PooledClock::retrieve(LoopBehavior::None, ms(100));
        clock.start();
        assert_eq!(clock.state(), ClockState::Running);

        clock.release();
        assert!(!clock.is_alive());
        assert_eq!(clock.state(), ClockState::Stopped);
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }
}
