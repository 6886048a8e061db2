use std::{cell::Cell, rc::Rc};
use vellum_reactive::{
    create_effect, create_memo, create_runtime, create_scope, create_signal,
    SignalGet, SignalSet,
};

#[test]
fn basic_memo() {
    create_scope(create_runtime(), |cx| {
        let a = create_memo(cx, |_| 5);
        assert_eq!(a.get(), 5);
    })
    .dispose()
}

#[test]
fn memo_with_computed_value() {
    create_scope(create_runtime(), |cx| {
        let (a, set_a) = create_signal(cx, 0);
        let (b, set_b) = create_signal(cx, 0);
        let c = create_memo(cx, move |_| a.get() + b.get());
        assert_eq!(c.get(), 0);
        set_a.set(5);
        assert_eq!(c.get(), 5);
        set_b.set(1);
        assert_eq!(c.get(), 6);
    })
    .dispose()
}

#[test]
fn nested_memos() {
    create_scope(create_runtime(), |cx| {
        let (a, set_a) = create_signal(cx, 0);
        let (b, set_b) = create_signal(cx, 0);
        let c = create_memo(cx, move |_| a.get() + b.get());
        let d = create_memo(cx, move |_| c.get() * 2);
        let e = create_memo(cx, move |_| d.get() + 1);
        assert_eq!(d.get(), 0);
        set_a.set(5);
        assert_eq!(e.get(), 11);
        assert_eq!(d.get(), 10);
        assert_eq!(c.get(), 5);
        set_b.set(1);
        assert_eq!(e.get(), 13);
        assert_eq!(d.get(), 12);
        assert_eq!(c.get(), 6);
    })
    .dispose()
}

#[test]
fn memo_runs_only_when_inputs_change() {
    create_scope(create_runtime(), |cx| {
        let call_count = Rc::new(Cell::new(0));
        let (a, set_a) = create_signal(cx, 0);
        let (b, _) = create_signal(cx, 0);
        let (c, _) = create_signal(cx, 0);

        let c = create_memo(cx, {
            let call_count = Rc::clone(&call_count);
            move |_| {
                call_count.set(call_count.get() + 1);
                a.get() + b.get() + c.get()
            }
        });

        // memos are lazy: no run until first read
        assert_eq!(call_count.get(), 0);
        assert_eq!(c.get(), 0);
        assert_eq!(call_count.get(), 1);

        // reading again does not re-run
        c.get();
        c.get();
        assert_eq!(call_count.get(), 1);

        // writing marks stale but does not recompute eagerly
        set_a.set(1);
        assert_eq!(call_count.get(), 1);
        assert_eq!(c.get(), 1);
        assert_eq!(call_count.get(), 2);
    })
    .dispose()
}

#[test]
fn memo_equality_short_circuits_dependents() {
    create_scope(create_runtime(), |cx| {
        let runs = Rc::new(Cell::new(0));
        let (a, set_a) = create_signal(cx, 0);
        let is_positive = create_memo(cx, move |_| a.get() > 0);

        create_effect(cx, {
            let runs = Rc::clone(&runs);
            move |_| {
                is_positive.get();
                runs.set(runs.get() + 1);
            }
        });
        assert_eq!(runs.get(), 1);

        set_a.set(1);
        assert_eq!(runs.get(), 2);

        // recomputes to an equal value: dependents are not scheduled
        set_a.set(2);
        assert_eq!(runs.get(), 2);

        set_a.set(-1);
        assert_eq!(runs.get(), 3);
    })
    .dispose()
}

#[test]
fn diamond_dependencies_are_glitch_free() {
    create_scope(create_runtime(), |cx| {
        let observed = Rc::new(std::cell::RefCell::new(Vec::new()));
        let (a, set_a) = create_signal(cx, 0);
        let left = create_memo(cx, move |_| a.get() + 1);
        let right = create_memo(cx, move |_| a.get() + 2);

        create_effect(cx, {
            let observed = Rc::clone(&observed);
            move |_| {
                observed.borrow_mut().push(left.get() + right.get());
            }
        });

        set_a.set(1);
        set_a.set(2);

        // the effect sees only fully-settled sums, one per write
        assert_eq!(*observed.borrow(), vec![3, 5, 7]);
    })
    .dispose()
}

#[test]
fn memo_receives_previous_value() {
    create_scope(create_runtime(), |cx| {
        let (a, set_a) = create_signal(cx, 1);
        let running_max = create_memo(cx, move |prev: Option<&i32>| {
            a.get().max(prev.copied().unwrap_or(i32::MIN))
        });
        assert_eq!(running_max.get(), 1);
        set_a.set(5);
        assert_eq!(running_max.get(), 5);
        set_a.set(3);
        assert_eq!(running_max.get(), 5);
    })
    .dispose()
}
