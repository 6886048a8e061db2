use std::{cell::Cell, rc::Rc};
use vellum_core::{lazy, preload, Error, LazyError, LazyResult, StringError};

#[tokio::test]
async fn loader_runs_once_and_later_calls_are_transparent() {
    let loader_runs = Rc::new(Cell::new(0));

    let component = lazy({
        let loader_runs = Rc::clone(&loader_runs);
        move || {
            loader_runs.set(loader_runs.get() + 1);
            async { Ok::<_, Error>("ok") }
        }
    });

    // first call starts the load and reports pending
    let pending = match component.get() {
        LazyResult::Pending(pending) => pending,
        _ => panic!("first call must be pending"),
    };
    assert_eq!(loader_runs.get(), 1);

    pending.wait().await.unwrap();

    // second call sees the cached value
    assert!(matches!(component.get(), LazyResult::Ready("ok")));

    // a third call does not invoke the loader again
    assert!(matches!(component.get(), LazyResult::Ready("ok")));
    assert_eq!(loader_runs.get(), 1);
}

#[tokio::test]
async fn concurrent_first_calls_share_one_in_flight_load() {
    let loader_runs = Rc::new(Cell::new(0));

    let component = lazy({
        let loader_runs = Rc::clone(&loader_runs);
        move || {
            loader_runs.set(loader_runs.get() + 1);
            async { Ok::<_, Error>(42) }
        }
    });

    let first = match component.get() {
        LazyResult::Pending(p) => p,
        _ => panic!("expected pending"),
    };
    let second = match component.get() {
        LazyResult::Pending(p) => p,
        _ => panic!("expected pending"),
    };
    let third = match component.get() {
        LazyResult::Pending(p) => p,
        _ => panic!("expected pending"),
    };
    assert_eq!(loader_runs.get(), 1);

    // every caller resolves from the same load
    assert_eq!(first.wait().await.unwrap(), 42);
    assert_eq!(second.wait().await.unwrap(), 42);
    assert_eq!(third.wait().await.unwrap(), 42);
    assert_eq!(loader_runs.get(), 1);
}

#[tokio::test]
async fn failed_load_poisons_the_cell() {
    let loader_runs = Rc::new(Cell::new(0));

    let component = lazy({
        let loader_runs = Rc::clone(&loader_runs);
        move || {
            loader_runs.set(loader_runs.get() + 1);
            async { Err::<i32, _>(StringError::boxed("network down")) }
        }
    });

    let pending = match component.get() {
        LazyResult::Pending(p) => p,
        _ => panic!("expected pending"),
    };
    let err = pending.wait().await.unwrap_err();
    assert!(matches!(&err, LazyError::LoadFailed(e) if e.to_string() == "network down"));

    // every subsequent call reports the same failure, without re-running
    for _ in 0..3 {
        match component.get() {
            LazyResult::Failed(LazyError::LoadFailed(e)) => {
                assert_eq!(e.to_string(), "network down")
            }
            _ => panic!("expected sticky failure"),
        }
    }
    assert_eq!(loader_runs.get(), 1);
}

#[tokio::test]
async fn preload_triggers_and_awaits_without_rendering() {
    let loader_runs = Rc::new(Cell::new(0));

    let component = lazy({
        let loader_runs = Rc::clone(&loader_runs);
        move || {
            loader_runs.set(loader_runs.get() + 1);
            async { Ok::<_, Error>("preloaded") }
        }
    });

    assert_eq!(preload(&component).await.unwrap(), "preloaded");
    assert_eq!(loader_runs.get(), 1);
    assert!(component.is_ready());

    // the component is already settled for the first real invocation
    assert!(matches!(component.get(), LazyResult::Ready("preloaded")));
}
