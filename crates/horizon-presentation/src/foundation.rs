//! The per-thread coordinator of digest cycles.
//!
//! [`PresentationFoundation`] owns the state every dependency object on a
//! thread shares: the global digest cycle counter, the element tree, the
//! tree walker used for inheritance and digestion, and the clock pool.
//!
//! A host drives the presentation layer by calling
//! [`PresentationFoundation::update`] once per frame with the root of its
//! tree:
//!
//! ```ignore
//! let root = DependencyObject::new::<Window>();
//! loop {
//!     let elapsed = frame_timer.tick();
//!     PresentationFoundation::update(&root, elapsed);
//! }
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use crate::animation::ClockPool;
use crate::config::PresentationConfig;
use crate::logging::targets;
use crate::object::DependencyObject;
use crate::tree::{ElementTree, ElementTreeWalker, TreeWalker};

/// Timing information for one digest cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpdateTime {
    /// Time accumulated over all updates.
    pub total: Duration,
    /// Time since the previous update.
    pub elapsed: Duration,
}

struct FoundationState {
    cycle: Cell<u64>,
    total: Cell<Duration>,
    tree: RefCell<ElementTree>,
    walker: RefCell<Rc<dyn TreeWalker>>,
    clock_pool: RefCell<ClockPool>,
}

impl FoundationState {
    fn new() -> Self {
        Self {
            cycle: Cell::new(0),
            total: Cell::new(Duration::ZERO),
            tree: RefCell::new(ElementTree::new()),
            walker: RefCell::new(Rc::new(ElementTreeWalker)),
            clock_pool: RefCell::new(ClockPool::with_capacity(
                PresentationConfig::current().clock_pool_capacity,
            )),
        }
    }
}

thread_local! {
    static FOUNDATION: FoundationState = FoundationState::new();
}

/// Per-thread digest cycle state.
pub struct PresentationFoundation;

impl PresentationFoundation {
    /// The id of the current digest cycle. Zero before the first update.
    pub fn current_cycle_id() -> u64 {
        FOUNDATION.with(|state| state.cycle.get())
    }

    /// Start a new digest cycle and return its id.
    pub fn next_cycle() -> u64 {
        FOUNDATION.with(|state| {
            let cycle = state.cycle.get() + 1;
            state.cycle.set(cycle);
            cycle
        })
    }

    /// Advance pooled clocks by `elapsed`, then digest every object in the
    /// tree under `root`, parents before children.
    pub fn update(root: &DependencyObject, elapsed: Duration) -> UpdateTime {
        let cycle = Self::next_cycle();
        let time = FOUNDATION.with(|state| {
            let total = state.total.get() + elapsed;
            state.total.set(total);
            UpdateTime { total, elapsed }
        });

        let clocks = Self::with_clock_pool(|pool| pool.clocks());
        for clock in &clocks {
            clock.update(elapsed);
        }

        let walker = Self::tree_walker();
        let mut digested = 0usize;
        digest_subtree(root, walker.as_ref(), time, &mut digested);

        if PresentationConfig::current().trace_digest {
            tracing::debug!(
                target: targets::DIGEST,
                cycle,
                objects = digested,
                clocks = clocks.len(),
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                "digest cycle complete"
            );
        }
        time
    }

    /// Run `f` with the element tree.
    pub fn with_element_tree<R>(f: impl FnOnce(&ElementTree) -> R) -> R {
        FOUNDATION.with(|state| f(&state.tree.borrow()))
    }

    pub(crate) fn with_element_tree_mut<R>(f: impl FnOnce(&mut ElementTree) -> R) -> R {
        FOUNDATION.with(|state| f(&mut state.tree.borrow_mut()))
    }

    /// Like [`with_element_tree_mut`](Self::with_element_tree_mut), but does
    /// nothing during thread teardown or while the tree is borrowed.
    pub(crate) fn try_with_element_tree_mut(f: impl FnOnce(&mut ElementTree)) {
        let _ = FOUNDATION.try_with(|state| {
            if let Ok(mut tree) = state.tree.try_borrow_mut() {
                f(&mut tree);
            }
        });
    }

    /// The active tree walker.
    pub fn tree_walker() -> Rc<dyn TreeWalker> {
        FOUNDATION.with(|state| state.walker.borrow().clone())
    }

    /// Replace the tree walker, for hosts that keep their own visual tree.
    pub fn set_tree_walker(walker: Rc<dyn TreeWalker>) {
        FOUNDATION.with(|state| *state.walker.borrow_mut() = walker);
    }

    /// Restore the walker over the built-in element tree.
    pub fn reset_tree_walker() {
        Self::set_tree_walker(Rc::new(ElementTreeWalker));
    }

    /// Run `f` with the clock pool.
    ///
    /// Clock callbacks must not run inside `f`; take the clocks out first.
    pub fn with_clock_pool<R>(f: impl FnOnce(&mut ClockPool) -> R) -> R {
        FOUNDATION.with(|state| f(&mut state.clock_pool.borrow_mut()))
    }
}

fn digest_subtree(
    object: &DependencyObject,
    walker: &dyn TreeWalker,
    time: UpdateTime,
    digested: &mut usize,
) {
    object.digest(time);
    *digested += 1;
    walker.for_each_child(object, &mut |child| digest_subtree(child, walker, time, digested));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_ids_increase() {
        let before = PresentationFoundation::current_cycle_id();
        let next = PresentationFoundation::next_cycle();
        assert_eq!(next, before + 1);
        assert_eq!(PresentationFoundation::current_cycle_id(), next);
    }

    #[test]
    fn test_update_accumulates_time() {
        struct Root;
        let root = DependencyObject::new::<Root>();
        let first = PresentationFoundation::update(&root, Duration::from_millis(16));
        let second = PresentationFoundation::update(&root, Duration::from_millis(16));
        assert_eq!(second.elapsed, Duration::from_millis(16));
        assert_eq!(second.total - first.total, Duration::from_millis(16));
        assert_eq!(
            root.last_digested_cycle_id(),
            Some(PresentationFoundation::current_cycle_id())
        );
    }
}
