use std::{cell::Cell, rc::Rc};
use vellum_reactive::{
    create_effect, create_memo, create_runtime, create_scope, create_signal,
    ReactiveError, SignalGet, SignalSet,
};

#[test]
fn batched_writes_commit_atomically() {
    create_scope(create_runtime(), |cx| {
        let runs = Rc::new(Cell::new(0));
        let (x, set_x) = create_signal(cx, 0);
        let (y, set_y) = create_signal(cx, 0);
        let sum = create_memo(cx, move |_| x.get() + y.get());

        create_effect(cx, {
            let runs = Rc::clone(&runs);
            move |_| {
                sum.get();
                runs.set(runs.get() + 1);
            }
        });
        assert_eq!(runs.get(), 1);

        cx.batch(|| {
            set_x.set(1);
            set_y.set(2);
            // nothing has flushed yet
            assert_eq!(runs.get(), 1);
        });

        // the dependent effect ran exactly once for the whole batch
        assert_eq!(runs.get(), 2);
        assert_eq!(sum.get(), 3);
    })
    .dispose()
}

#[test]
fn effect_observes_no_intermediate_state() {
    use std::cell::RefCell;

    create_scope(create_runtime(), |cx| {
        let observed = Rc::new(RefCell::new(Vec::new()));
        let (x, set_x) = create_signal(cx, 0);
        let (y, set_y) = create_signal(cx, 0);

        create_effect(cx, {
            let observed = Rc::clone(&observed);
            move |_| {
                observed.borrow_mut().push((x.get(), y.get()));
            }
        });

        cx.batch(|| {
            set_x.set(1);
            set_y.set(2);
        });

        // never (1, 0): both writes are visible together
        assert_eq!(*observed.borrow(), vec![(0, 0), (1, 2)]);
    })
    .dispose()
}

#[test]
fn nested_batches_collapse_into_outermost() {
    create_scope(create_runtime(), |cx| {
        let runs = Rc::new(Cell::new(0));
        let (a, set_a) = create_signal(cx, 0);

        create_effect(cx, {
            let runs = Rc::clone(&runs);
            move |_| {
                a.get();
                runs.set(runs.get() + 1);
            }
        });
        assert_eq!(runs.get(), 1);

        cx.batch(|| {
            set_a.set(1);
            cx.batch(|| {
                set_a.set(2);
            });
            // the inner batch exit does not flush
            assert_eq!(runs.get(), 1);
            set_a.set(3);
        });

        assert_eq!(runs.get(), 2);
        assert_eq!(a.get(), 3);
    })
    .dispose()
}

#[test]
fn batch_returns_the_closure_value() {
    create_scope(create_runtime(), |cx| {
        let (a, set_a) = create_signal(cx, 1);
        let doubled = cx.batch(|| {
            set_a.set(2);
            a.get() * 2
        });
        assert_eq!(doubled, 4);
    })
    .dispose()
}

#[test]
fn effect_cycle_is_detected_and_queue_cleared() {
    create_scope(create_runtime(), |cx| {
        let (a, set_a) = create_signal(cx, 0);
        let (b, set_b) = create_signal(cx, 0);

        // two effects that keep waking each other up
        create_effect(cx, move |_| {
            set_b.set(a.get() + 1);
        });
        create_effect(cx, move |_| {
            set_a.set(b.get() + 1);
        });

        let result = cx.try_batch(|| set_a.set(1));
        assert!(matches!(
            result,
            Err(ReactiveError::CycleDetected { .. })
        ));

        // the graph stays usable after the aborted flush
        let (c, set_c) = create_signal(cx, 0);
        set_c.set(5);
        assert_eq!(c.get(), 5);
    })
    .dispose()
}

#[test]
fn writes_inside_effects_flush_in_the_same_pass() {
    create_scope(create_runtime(), |cx| {
        let (a, set_a) = create_signal(cx, 0);
        let (b, set_b) = create_signal(cx, 0);
        let b_seen = Rc::new(Cell::new(0));

        // first effect forwards a into b; second observes b
        create_effect(cx, move |_| {
            set_b.set(a.get() * 10);
        });
        create_effect(cx, {
            let b_seen = Rc::clone(&b_seen);
            move |_| {
                b_seen.set(b.get());
            }
        });

        set_a.set(2);
        assert_eq!(b_seen.get(), 20);
    })
    .dispose()
}
