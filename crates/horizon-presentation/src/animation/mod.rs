//! Property animation.
//!
//! Dependency property values can be animated in two ways:
//!
//! - towards a single target with an easing function
//!   ([`DependencyObject::animate_to`](crate::DependencyObject::animate_to)),
//!   interpolating from the value the property had when the animation began
//!   (the *hand-off* value);
//! - through an [`Animation`] made of [`KeyFrame`]s
//!   ([`DependencyObject::animate`](crate::DependencyObject::animate)).
//!
//! Either way the animation is driven by a [`Clock`]. The property samples
//! the clock on every digest; starting, stopping, pausing or resuming the
//! clock is observed through its subscription.
//!
//! # Example
//!
//! ```ignore
//! use std::rc::Rc;
//! use std::time::Duration;
//! use horizon_presentation::animation::{Easing, LoopBehavior, SimpleClock};
//!
//! let clock = Rc::new(SimpleClock::new(LoopBehavior::None, Duration::from_millis(1000)));
//! button.animate_to(opacity, 1.0f32, Easing::Linear, clock.clone())?;
//! clock.start();
//! ```

mod clock;
mod easing;

pub use clock::{
    Clock, ClockEvent, ClockId, ClockPool, ClockState, ClockSubscriber, ClockSubscription,
    LoopBehavior, PooledClock, SimpleClock,
};
pub use easing::{ease, interpolate_eased, Easing, EasingCurve};

use std::time::Duration;

use crate::value::PropertyValue;

/// What a keyframe animation does once its last keyframe has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillBehavior {
    /// Keep the last keyframe's value.
    #[default]
    Hold,
    /// Stop contributing; the property falls back to its next value source.
    Stop,
}

/// A value at a point in time.
#[derive(Debug, Clone)]
pub struct KeyFrame<T> {
    time: Duration,
    value: Option<T>,
    easing: Easing,
}

impl<T: PropertyValue> KeyFrame<T> {
    /// A keyframe reaching `value` at `time`, eased from the previous keyframe.
    pub fn new(time: Duration, value: T, easing: Easing) -> Self {
        Self {
            time,
            value: Some(value),
            easing,
        }
    }

    /// A keyframe whose value is the hand-off value.
    pub fn hand_off(time: Duration, easing: Easing) -> Self {
        Self {
            time,
            value: None,
            easing,
        }
    }

    /// The keyframe time.
    pub fn time(&self) -> Duration {
        self.time
    }

    /// The keyframe value, or `None` for a hand-off keyframe.
    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// The easing applied on the way into this keyframe.
    pub fn easing(&self) -> Easing {
        self.easing
    }

    fn resolve<'a>(&'a self, hand_off: &'a T) -> &'a T {
        self.value.as_ref().unwrap_or(hand_off)
    }
}

/// Result of sampling an animation.
#[derive(Debug, Clone, PartialEq)]
pub enum AnimationSample<T> {
    /// The animated value.
    Value(T),
    /// The animation no longer contributes a value.
    Expired,
}

/// A keyframe animation.
#[derive(Debug, Clone)]
pub struct Animation<T> {
    keyframes: Vec<KeyFrame<T>>,
    fill_behavior: FillBehavior,
}

impl<T: PropertyValue> Default for Animation<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PropertyValue> Animation<T> {
    /// An animation without keyframes.
    pub fn new() -> Self {
        Self {
            keyframes: Vec::new(),
            fill_behavior: FillBehavior::Hold,
        }
    }

    /// An animation from the hand-off value to `target` over `duration`.
    pub fn to(target: T, duration: Duration, easing: Easing) -> Self {
        Self::new().with_keyframe(KeyFrame::new(duration, target, easing))
    }

    /// Add a keyframe. Keyframes are kept ordered by time.
    pub fn with_keyframe(mut self, keyframe: KeyFrame<T>) -> Self {
        let index = self
            .keyframes
            .partition_point(|existing| existing.time <= keyframe.time);
        self.keyframes.insert(index, keyframe);
        self
    }

    /// Set the fill behavior.
    pub fn with_fill_behavior(mut self, fill_behavior: FillBehavior) -> Self {
        self.fill_behavior = fill_behavior;
        self
    }

    /// The keyframes in time order.
    pub fn keyframes(&self) -> &[KeyFrame<T>] {
        &self.keyframes
    }

    /// The fill behavior.
    pub fn fill_behavior(&self) -> FillBehavior {
        self.fill_behavior
    }

    /// Time of the last keyframe.
    pub fn duration(&self) -> Duration {
        self.keyframes.last().map(KeyFrame::time).unwrap_or_default()
    }

    /// Returns `true` if the first keyframe is at time zero.
    pub fn starts_at_zero(&self) -> bool {
        self.keyframes.first().is_some_and(|keyframe| keyframe.time.is_zero())
    }

    /// The value at time zero, given the hand-off value.
    pub fn initial_value(&self, hand_off: &T) -> T {
        match self.keyframes.first() {
            Some(first) if first.time.is_zero() => first.resolve(hand_off).clone(),
            _ => hand_off.clone(),
        }
    }

    /// Sample the animation at `elapsed`.
    pub fn sample(&self, hand_off: &T, elapsed: Duration) -> AnimationSample<T> {
        let Some(last) = self.keyframes.last() else {
            return AnimationSample::Value(hand_off.clone());
        };

        if elapsed >= last.time {
            if elapsed > last.time && self.fill_behavior == FillBehavior::Stop {
                return AnimationSample::Expired;
            }
            return AnimationSample::Value(last.resolve(hand_off).clone());
        }

        let next = self.keyframes.partition_point(|keyframe| keyframe.time <= elapsed);
        let to = &self.keyframes[next];
        let (from_time, from_value) = match next.checked_sub(1) {
            Some(previous) => {
                let previous = &self.keyframes[previous];
                (previous.time, previous.resolve(hand_off))
            }
            None => (Duration::ZERO, hand_off),
        };

        let span = (to.time - from_time).as_secs_f64();
        let t = if span == 0.0 {
            1.0
        } else {
            ((elapsed - from_time).as_secs_f64() / span) as f32
        };
        AnimationSample::Value(interpolate_eased(to.easing, from_value, to.resolve(hand_off), t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn value(sample: AnimationSample<f32>) -> f32 {
        match sample {
            AnimationSample::Value(value) => value,
            AnimationSample::Expired => panic!("animation expired"),
        }
    }

    #[test]
    fn test_keyframes_are_sorted() {
        let animation = Animation::new()
            .with_keyframe(KeyFrame::new(ms(200), 2.0f32, Easing::Linear))
            .with_keyframe(KeyFrame::new(ms(100), 1.0, Easing::Linear));
        let times: Vec<_> = animation.keyframes().iter().map(KeyFrame::time).collect();
        assert_eq!(times, vec![ms(100), ms(200)]);
        assert_eq!(animation.duration(), ms(200));
        assert!(!animation.starts_at_zero());
    }

    #[test]
    fn test_sample_brackets_keyframes() {
        let animation = Animation::new()
            .with_keyframe(KeyFrame::new(Duration::ZERO, 0.0f32, Easing::Linear))
            .with_keyframe(KeyFrame::new(ms(100), 10.0, Easing::Linear))
            .with_keyframe(KeyFrame::new(ms(300), 30.0, Easing::Linear));

        assert_eq!(animation.initial_value(&-1.0), 0.0);
        assert_eq!(value(animation.sample(&-1.0, ms(50))), 5.0);
        assert_eq!(value(animation.sample(&-1.0, ms(200))), 20.0);
        assert_eq!(value(animation.sample(&-1.0, ms(300))), 30.0);
        assert_eq!(value(animation.sample(&-1.0, ms(900))), 30.0);
    }

    #[test]
    fn test_sample_from_hand_off() {
        let animation = Animation::to(1.0f32, ms(1000), Easing::Linear);
        assert_eq!(animation.initial_value(&0.0), 0.0);
        assert!((value(animation.sample(&0.0, ms(500))) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_hand_off_keyframe() {
        let animation = Animation::new()
            .with_keyframe(KeyFrame::new(ms(100), 10.0f32, Easing::Linear))
            .with_keyframe(KeyFrame::hand_off(ms(200), Easing::Linear));
        assert_eq!(value(animation.sample(&4.0, ms(150))), 7.0);
        assert_eq!(value(animation.sample(&4.0, ms(250))), 4.0);
    }

    #[test]
    fn test_fill_behavior_stop() {
        let animation = Animation::to(1.0f32, ms(100), Easing::Linear)
            .with_fill_behavior(FillBehavior::Stop);
        assert_eq!(value(animation.sample(&0.0, ms(100))), 1.0);
        assert_eq!(animation.sample(&0.0, ms(101)), AnimationSample::Expired);
    }

    #[test]
    fn test_easing_of_target_keyframe_applies() {
        let animation = Animation::new()
            .with_keyframe(KeyFrame::new(Duration::ZERO, 0.0f32, Easing::Linear))
            .with_keyframe(KeyFrame::new(ms(100), 1.0, Easing::EASE_IN));
        assert!(value(animation.sample(&0.0, ms(50))) < 0.5);
    }
}
