use std::{cell::RefCell, rc::Rc};
use vellum_reactive::{
    create_runtime, create_scope, create_signal, watch, SignalGet, SignalSet,
};

#[test]
fn watch_sees_old_and_new_values() {
    create_scope(create_runtime(), |cx| {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (count, set_count) = create_signal(cx, 0);

        watch(
            cx,
            move || count.get(),
            {
                let seen = Rc::clone(&seen);
                move |count: &i32, prev: Option<&i32>, _: Option<()>| {
                    seen.borrow_mut().push((*count, prev.copied()));
                }
            },
            false,
        );

        // not immediate: the initial run only records the deps value
        assert!(seen.borrow().is_empty());

        set_count.set(1);
        set_count.set(2);

        assert_eq!(*seen.borrow(), vec![(1, Some(0)), (2, Some(1))]);
    })
    .dispose()
}

#[test]
fn immediate_watch_fires_on_creation() {
    create_scope(create_runtime(), |cx| {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (count, set_count) = create_signal(cx, 10);

        watch(
            cx,
            move || count.get(),
            {
                let seen = Rc::clone(&seen);
                move |count: &i32, prev: Option<&i32>, _: Option<()>| {
                    seen.borrow_mut().push((*count, prev.copied()));
                }
            },
            true,
        );

        assert_eq!(*seen.borrow(), vec![(10, None)]);

        set_count.set(11);
        assert_eq!(*seen.borrow(), vec![(10, None), (11, Some(10))]);
    })
    .dispose()
}

#[test]
fn stopped_watch_never_fires_again() {
    create_scope(create_runtime(), |cx| {
        let runs = Rc::new(std::cell::Cell::new(0));
        let (count, set_count) = create_signal(cx, 0);

        let stop = watch(
            cx,
            move || count.get(),
            {
                let runs = Rc::clone(&runs);
                move |_: &i32, _: Option<&i32>, _: Option<()>| {
                    runs.set(runs.get() + 1);
                }
            },
            false,
        );

        set_count.set(1);
        assert_eq!(runs.get(), 1);

        stop();
        set_count.set(2);
        assert_eq!(runs.get(), 1);
    })
    .dispose()
}

#[test]
fn callback_reads_are_untracked() {
    create_scope(create_runtime(), |cx| {
        let runs = Rc::new(std::cell::Cell::new(0));
        let (a, set_a) = create_signal(cx, 0);
        let (b, set_b) = create_signal(cx, 100);

        watch(
            cx,
            move || a.get(),
            {
                let runs = Rc::clone(&runs);
                move |_: &i32, _: Option<&i32>, _: Option<()>| {
                    // reading `b` here must not subscribe the watcher to it
                    b.get();
                    runs.set(runs.get() + 1);
                }
            },
            false,
        );

        set_a.set(1);
        assert_eq!(runs.get(), 1);

        set_b.set(101);
        assert_eq!(runs.get(), 1);

        set_a.set(2);
        assert_eq!(runs.get(), 2);
    })
    .dispose()
}
