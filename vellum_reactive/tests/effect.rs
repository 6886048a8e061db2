use std::{cell::RefCell, rc::Rc};
use vellum_reactive::{
    create_effect, create_memo, create_runtime, create_scope, create_signal,
    SignalGet, SignalSet,
};

#[test]
fn effect_runs() {
    create_scope(create_runtime(), |cx| {
        let (a, set_a) = create_signal(cx, -1);

        // simulate an arbitrary side effect
        let b = Rc::new(RefCell::new(String::new()));

        create_effect(cx, {
            let b = b.clone();
            move |_| {
                let formatted = format!("Value is {}", a.get());
                *b.borrow_mut() = formatted;
            }
        });

        assert_eq!(b.borrow().as_str(), "Value is -1");

        set_a.set(1);

        assert_eq!(b.borrow().as_str(), "Value is 1");
    })
    .dispose()
}

#[test]
fn effect_tracks_memo() {
    create_scope(create_runtime(), |cx| {
        let (a, set_a) = create_signal(cx, -1);
        let b = create_memo(cx, move |_| format!("Value is {}", a.get()));

        // simulate an arbitrary side effect
        let c = Rc::new(RefCell::new(String::new()));

        create_effect(cx, {
            let c = c.clone();
            move |_| {
                *c.borrow_mut() = b.get();
            }
        });

        assert_eq!(b.get().as_str(), "Value is -1");
        assert_eq!(c.borrow().as_str(), "Value is -1");

        set_a.set(1);

        assert_eq!(b.get().as_str(), "Value is 1");
        assert_eq!(c.borrow().as_str(), "Value is 1");
    })
    .dispose()
}

#[test]
fn untrack_mutes_effect() {
    create_scope(create_runtime(), |cx| {
        let (a, set_a) = create_signal(cx, -1);

        // simulate an arbitrary side effect
        let b = Rc::new(RefCell::new(String::new()));

        create_effect(cx, {
            let b = b.clone();
            move |_| {
                let formatted =
                    format!("Value is {}", cx.untrack(move || a.get()));
                *b.borrow_mut() = formatted;
            }
        });

        assert_eq!(a.get(), -1);
        assert_eq!(b.borrow().as_str(), "Value is -1");

        set_a.set(1);

        assert_eq!(a.get(), 1);
        assert_eq!(b.borrow().as_str(), "Value is -1");
    })
    .dispose()
}

#[test]
fn effect_receives_previous_value() {
    create_scope(create_runtime(), |cx| {
        let (a, set_a) = create_signal(cx, 0);
        let history = Rc::new(RefCell::new(Vec::new()));

        create_effect(cx, {
            let history = Rc::clone(&history);
            move |prev: Option<i32>| {
                let current = a.get();
                history.borrow_mut().push((prev, current));
                current
            }
        });

        set_a.set(1);
        set_a.set(2);

        assert_eq!(
            *history.borrow(),
            vec![(None, 0), (Some(0), 1), (Some(1), 2)]
        );
    })
    .dispose()
}

#[test]
fn effects_run_in_registration_order() {
    create_scope(create_runtime(), |cx| {
        let order = Rc::new(RefCell::new(Vec::new()));
        let (a, set_a) = create_signal(cx, 0);

        create_effect(cx, {
            let order = Rc::clone(&order);
            move |_| {
                a.get();
                order.borrow_mut().push("first");
            }
        });
        create_effect(cx, {
            let order = Rc::clone(&order);
            move |_| {
                a.get();
                order.borrow_mut().push("second");
            }
        });

        order.borrow_mut().clear();
        set_a.set(1);

        assert_eq!(*order.borrow(), vec!["first", "second"]);
    })
    .dispose()
}

#[test]
fn effect_swaps_dependencies_dynamically() {
    use std::cell::Cell;

    create_scope(create_runtime(), |cx| {
        let runs = Rc::new(Cell::new(0));
        let (use_a, set_use_a) = create_signal(cx, true);
        let (a, set_a) = create_signal(cx, 0);
        let (b, set_b) = create_signal(cx, 0);

        create_effect(cx, {
            let runs = Rc::clone(&runs);
            move |_| {
                if use_a.get() {
                    a.get();
                } else {
                    b.get();
                }
                runs.set(runs.get() + 1);
            }
        });
        assert_eq!(runs.get(), 1);

        // while watching `a`, `b` is not a dependency
        set_b.set(1);
        assert_eq!(runs.get(), 1);
        set_a.set(1);
        assert_eq!(runs.get(), 2);

        // switch to watching `b`: the old `a` edge is dropped
        set_use_a.set(false);
        assert_eq!(runs.get(), 3);
        set_a.set(2);
        assert_eq!(runs.get(), 3);
        set_b.set(2);
        assert_eq!(runs.get(), 4);
    })
    .dispose()
}

#[test]
fn stopped_effect_never_runs_again() {
    use std::cell::Cell;

    create_scope(create_runtime(), |cx| {
        let runs = Rc::new(Cell::new(0));
        let (a, set_a) = create_signal(cx, 0);

        let handle = create_effect(cx, {
            let runs = Rc::clone(&runs);
            move |_| {
                a.get();
                runs.set(runs.get() + 1);
            }
        });
        assert_eq!(runs.get(), 1);

        set_a.set(1);
        assert_eq!(runs.get(), 2);

        handle.stop();
        set_a.set(2);
        assert_eq!(runs.get(), 2);
    })
    .dispose()
}
