//! Integration tests for digest cycles: animation, coercion, precedence,
//! inheritance and resource wrappers.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::LazyLock;
use std::time::Duration;

use horizon_presentation::animation::{KeyFrame, PooledClock};
use horizon_presentation::{
    Animation, Clock, DependencyObject, DependencyProperty, Easing, FillBehavior, LoopBehavior,
    PresentationFoundation, PropertyMetadata, SetTriggerAction, SimpleClock, Trigger, ValueSource,
    VersionedStringBuilder, VersionedStringSource,
};

struct Panel;

static OPACITY: LazyLock<DependencyProperty> = LazyLock::new(|| {
    DependencyProperty::register::<f32, Panel>("Opacity", PropertyMetadata::new(0.0)).unwrap()
});

static LEVEL: LazyLock<DependencyProperty> = LazyLock::new(|| {
    DependencyProperty::register::<i32, Panel>(
        "Level",
        PropertyMetadata::new(0).coerce(|_, value: i32| value.clamp(0, 10)),
    )
    .unwrap()
});

static WIDTH: LazyLock<DependencyProperty> = LazyLock::new(|| {
    DependencyProperty::register::<f64, Panel>("Width", PropertyMetadata::new(100.0)).unwrap()
});

static FONT_SIZE: LazyLock<DependencyProperty> = LazyLock::new(|| {
    DependencyProperty::register::<f64, Panel>("FontSize", PropertyMetadata::new(12.0).inherits()).unwrap()
});

static IS_HOVERED: LazyLock<DependencyProperty> = LazyLock::new(|| {
    DependencyProperty::register::<bool, Panel>("IsHovered", PropertyMetadata::new(false)).unwrap()
});

static CONTENT: LazyLock<DependencyProperty> = LazyLock::new(|| {
    DependencyProperty::register::<VersionedStringSource, Panel>(
        "Content",
        PropertyMetadata::with_default_factory(VersionedStringSource::empty),
    )
    .unwrap()
});

fn update(root: &DependencyObject, millis: u64) {
    PresentationFoundation::update(root, Duration::from_millis(millis));
}

fn count_changes(object: &DependencyObject, watched: DependencyProperty) -> Rc<Cell<usize>> {
    let changes = Rc::new(Cell::new(0));
    let counter = changes.clone();
    object.subscribe(move |_, property| {
        if property == watched {
            counter.set(counter.get() + 1);
        }
    });
    changes
}

#[test]
fn test_pooled_clock_drives_animation() {
    let panel = DependencyObject::new::<Panel>();
    let pooled = PooledClock::retrieve(LoopBehavior::None, Duration::from_millis(1000));
    let clock: Rc<dyn Clock> = pooled.clock().unwrap();

    panel.animate_to(*OPACITY, 1.0f32, Easing::Linear, clock).unwrap();
    pooled.start();
    assert_eq!(panel.value_source(*OPACITY).unwrap(), ValueSource::Animated);

    update(&panel, 500);
    let halfway = panel.get_value::<f32>(*OPACITY).unwrap();
    assert!((halfway - 0.5).abs() < 1e-3, "halfway value was {halfway}");

    update(&panel, 600);
    assert_eq!(panel.get_value::<f32>(*OPACITY).unwrap(), 1.0);

    pooled.release();
    assert_eq!(panel.get_value::<f32>(*OPACITY).unwrap(), 0.0);
    assert_eq!(panel.value_source(*OPACITY).unwrap(), ValueSource::Default);
}

#[test]
fn test_keyframes_with_stop_fill() {
    let panel = DependencyObject::new::<Panel>();
    panel.set_value(*WIDTH, 50.0).unwrap();

    let clock = Rc::new(SimpleClock::new(LoopBehavior::None, Duration::from_millis(200)));
    let animation = Animation::new()
        .with_keyframe(KeyFrame::hand_off(Duration::ZERO, Easing::Linear))
        .with_keyframe(KeyFrame::new(Duration::from_millis(200), 150.0, Easing::Linear))
        .with_fill_behavior(FillBehavior::Stop);
    panel.animate(*WIDTH, animation, clock.clone()).unwrap();
    clock.start();

    clock.update(Duration::from_millis(100));
    update(&panel, 0);
    assert!((panel.get_value::<f64>(*WIDTH).unwrap() - 100.0).abs() < 1e-6);

    clock.update(Duration::from_millis(100));
    update(&panel, 0);
    assert_eq!(panel.get_value::<f64>(*WIDTH).unwrap(), 50.0);
    assert_eq!(panel.value_source(*WIDTH).unwrap(), ValueSource::Local);
}

#[test]
fn test_coercion_clamps() {
    let panel = DependencyObject::new::<Panel>();
    assert!(panel.has_default_value(*LEVEL));

    panel.set_value(*LEVEL, 15).unwrap();
    assert_eq!(panel.get_value::<i32>(*LEVEL).unwrap(), 10);
    assert_eq!(panel.value_source(*LEVEL).unwrap(), ValueSource::Coerced);
    assert!(!panel.has_default_value(*LEVEL));

    panel.set_value(*LEVEL, 4).unwrap();
    assert_eq!(panel.get_value::<i32>(*LEVEL).unwrap(), 4);
    assert_eq!(panel.value_source(*LEVEL).unwrap(), ValueSource::Local);
}

#[test]
fn test_value_precedence() {
    let panel = DependencyObject::new::<Panel>();
    assert_eq!(panel.value_source(*WIDTH).unwrap(), ValueSource::Default);

    panel.set_styled_value(*WIDTH, 200.0).unwrap();
    assert_eq!(panel.get_value::<f64>(*WIDTH).unwrap(), 200.0);
    assert_eq!(panel.value_source(*WIDTH).unwrap(), ValueSource::Styled);

    let trigger = Rc::new(
        Trigger::equals(*IS_HOVERED, true).with_action(SetTriggerAction::new(*WIDTH, 250.0f64)),
    );
    panel.attach_trigger(trigger.clone()).unwrap();
    panel.set_value(*IS_HOVERED, true).unwrap();
    update(&panel, 16);
    assert_eq!(panel.get_value::<f64>(*WIDTH).unwrap(), 250.0);
    assert_eq!(panel.value_source(*WIDTH).unwrap(), ValueSource::Triggered);

    panel.set_value(*WIDTH, 300.0).unwrap();
    assert_eq!(panel.value_source(*WIDTH).unwrap(), ValueSource::Local);

    panel.clear_local_value(*WIDTH).unwrap();
    panel.detach_trigger(&trigger);
    assert_eq!(panel.get_value::<f64>(*WIDTH).unwrap(), 200.0);

    panel.clear_styled_value(*WIDTH).unwrap();
    assert_eq!(panel.get_value::<f64>(*WIDTH).unwrap(), 100.0);
    assert!(panel.has_default_value(*WIDTH));
}

#[test]
fn test_inheritance_follows_nearest_ancestor() {
    let root = DependencyObject::new::<Panel>();
    let middle = DependencyObject::new::<Panel>();
    let leaf = DependencyObject::new::<Panel>();
    middle.set_parent(Some(&root)).unwrap();
    leaf.set_parent(Some(&middle)).unwrap();

    root.set_value(*FONT_SIZE, 20.0).unwrap();
    update(&root, 16);
    assert_eq!(leaf.get_value::<f64>(*FONT_SIZE).unwrap(), 20.0);
    assert_eq!(leaf.value_source(*FONT_SIZE).unwrap(), ValueSource::Inherited);

    let changes = count_changes(&leaf, *FONT_SIZE);
    middle.set_value(*FONT_SIZE, 16.0).unwrap();
    update(&root, 16);
    assert_eq!(leaf.get_value::<f64>(*FONT_SIZE).unwrap(), 16.0);
    assert_eq!(changes.get(), 1);

    leaf.set_parent(None).unwrap();
    update(&leaf, 16);
    assert_eq!(leaf.get_value::<f64>(*FONT_SIZE).unwrap(), 12.0);
}

#[test]
fn test_digest_runs_once_per_cycle() {
    let root = DependencyObject::new::<Panel>();
    let child = DependencyObject::new::<Panel>();
    child.set_parent(Some(&root)).unwrap();

    let order = Rc::new(RefCell::new(Vec::new()));
    for (object, name) in [(&root, "root"), (&child, "child")] {
        let order = order.clone();
        object.subscribe(move |_, _| order.borrow_mut().push(name));
    }

    let defer_root = root.defer_change_events();
    let defer_child = child.defer_change_events();
    child.set_value(*WIDTH, 1.0).unwrap();
    root.set_value(*WIDTH, 2.0).unwrap();
    assert!(order.borrow().is_empty());
    drop(defer_child);
    drop(defer_root);
    assert_eq!(order.borrow().len(), 2);

    let clock = Rc::new(SimpleClock::new(LoopBehavior::None, Duration::from_millis(100)));
    child
        .animate_to(*OPACITY, 1.0f32, Easing::Linear, clock.clone() as Rc<dyn Clock>)
        .unwrap();
    clock.start();
    update(&root, 16);
    let cycle = PresentationFoundation::current_cycle_id();
    assert_eq!(root.last_digested_cycle_id(), Some(cycle));
    assert_eq!(child.last_digested_cycle_id(), Some(cycle));

    order.borrow_mut().clear();
    clock.update(Duration::from_millis(50));
    root.digest(Default::default());
    child.digest(Default::default());
    assert!(order.borrow().is_empty());
    assert_eq!(child.get_value::<f32>(*OPACITY).unwrap(), 0.0);

    update(&root, 16);
    assert_eq!(*order.borrow(), vec!["child"]);
    assert!((child.get_value::<f32>(*OPACITY).unwrap() - 0.5).abs() < 1e-4);
}

#[test]
fn test_resource_wrapper_change_raises_notification() {
    let panel = DependencyObject::new::<Panel>();
    let builder = VersionedStringBuilder::new();
    builder.push_str("Hello");
    panel.set_value(*CONTENT, builder.to_source()).unwrap();
    update(&panel, 16);

    let changes = count_changes(&panel, *CONTENT);
    update(&panel, 16);
    assert_eq!(changes.get(), 0);

    builder.push_str(", world");
    update(&panel, 16);
    assert_eq!(changes.get(), 1);

    let stale = panel.get_value::<VersionedStringSource>(*CONTENT).unwrap();
    assert!(stale.to_string_checked().is_err());

    panel.set_value(*CONTENT, builder.to_source()).unwrap();
    let fresh = panel.get_value::<VersionedStringSource>(*CONTENT).unwrap();
    assert_eq!(fresh.to_string_checked().unwrap(), "Hello, world");
}
