use vellum_reactive::{
    create_runtime, create_rw_signal, create_scope, create_signal, SignalGet,
    SignalGetUntracked, SignalSet, SignalSetUntracked, SignalUpdate,
    SignalWith,
};

#[test]
fn basic_signal() {
    create_scope(create_runtime(), |cx| {
        let (a, set_a) = create_signal(cx, 0);
        assert_eq!(a.get(), 0);
        set_a.set(5);
        assert_eq!(a.get(), 5);
    })
    .dispose()
}

#[test]
fn derived_signals() {
    create_scope(create_runtime(), |cx| {
        let (a, set_a) = create_signal(cx, 0);
        let (b, set_b) = create_signal(cx, 0);
        let c = move || a.get() + b.get();
        assert_eq!(c(), 0);
        set_a.set(5);
        assert_eq!(c(), 5);
        set_b.set(1);
        assert_eq!(c(), 6);
    })
    .dispose()
}

#[test]
fn update_in_place() {
    create_scope(create_runtime(), |cx| {
        let (items, set_items) = create_signal(cx, vec![1, 2]);
        set_items.update(|items| items.push(3));
        assert_eq!(items.get(), vec![1, 2, 3]);
    })
    .dispose()
}

#[test]
fn signal_with_avoids_clone() {
    create_scope(create_runtime(), |cx| {
        let (name, set_name) = create_signal(cx, "Alice".to_string());
        let first_char = move || name.with(|n| n.chars().next().unwrap());
        assert_eq!(first_char(), 'A');
        set_name.set("Bob".to_string());
        assert_eq!(first_char(), 'B');
    })
    .dispose()
}

#[test]
fn rw_signal_read_and_write_through_one_handle() {
    create_scope(create_runtime(), |cx| {
        let count = create_rw_signal(cx, 0);
        count.set(1);
        assert_eq!(count.get(), 1);
        count.update(|n| *n += 1);
        assert_eq!(count.get(), 2);
    })
    .dispose()
}

#[test]
fn read_only_projection_tracks_the_same_node() {
    create_scope(create_runtime(), |cx| {
        let count = create_rw_signal(cx, 0);
        let reader = count.read_only();
        count.set(42);
        assert_eq!(reader.get(), 42);

        let (read, write) = count.split();
        write.set(7);
        assert_eq!(read.get(), 7);
        assert_eq!(reader.get(), 7);
    })
    .dispose()
}

#[test]
fn set_untracked_does_not_notify() {
    use std::{cell::Cell, rc::Rc};
    use vellum_reactive::create_effect;

    create_scope(create_runtime(), |cx| {
        let (a, set_a) = create_signal(cx, 0);
        let runs = Rc::new(Cell::new(0));

        create_effect(cx, {
            let runs = Rc::clone(&runs);
            move |_| {
                a.get();
                runs.set(runs.get() + 1);
            }
        });
        assert_eq!(runs.get(), 1);

        set_a.set_untracked(42);
        assert_eq!(runs.get(), 1);
        assert_eq!(a.get_untracked(), 42);

        set_a.set(43);
        assert_eq!(runs.get(), 2);
    })
    .dispose()
}

#[test]
fn try_accessors_fail_softly_after_dispose() {
    let runtime = create_runtime();
    create_scope(runtime, |cx| {
        let (a, set_a) = {
            let ((a, set_a), disposer) =
                cx.run_child_scope(|child| create_signal(child, 0));
            disposer.dispose();
            (a, set_a)
        };

        assert_eq!(a.try_get(), None);
        assert_eq!(a.try_get_untracked(), None);
        assert_eq!(set_a.try_set(1), Some(1));
        assert_eq!(set_a.try_update(|n| *n), None);
    })
    .dispose()
}
