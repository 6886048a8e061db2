use std::{cell::Cell, cell::RefCell, rc::Rc};
use vellum_core::{
    create_root, create_runtime, create_suspense, lazy, Error, LazyResult,
    RenderFn, SuspenseBoundary,
};

#[tokio::test]
async fn suspense_shows_fallback_until_the_lazy_child_loads() {
    let runtime = create_runtime();
    let boundary_handle: Rc<RefCell<Option<SuspenseBoundary<String>>>> =
        Rc::new(RefCell::new(None));

    let greeting = lazy(|| async { Ok::<_, Error>("hello") });

    let root = create_root(runtime, {
        let boundary_handle = Rc::clone(&boundary_handle);
        let greeting = greeting.clone();
        move |cx| {
            let boundary = create_suspense(
                cx,
                {
                    let greeting = greeting.clone();
                    move || match greeting.get() {
                        LazyResult::Ready(text) => Ok(text.to_string()),
                        LazyResult::Pending(pending) => {
                            Err(pending.suspension())
                        }
                        LazyResult::Failed(err) => Ok(format!("error: {err}")),
                    }
                },
                || "loading...".to_string(),
            );
            *boundary_handle.borrow_mut() = Some(boundary.clone());

            Box::new(move || boundary.render()) as RenderFn<String>
        }
    });

    // first render suspends
    assert_eq!(root.view(), "loading...");

    // drive the pending load; resolution re-renders through the effect
    boundary_handle.borrow().as_ref().unwrap().settle().await;
    assert_eq!(root.view(), "hello");

    root.unmount();
    runtime.dispose();
}

#[tokio::test]
async fn pending_count_tracks_outstanding_work() {
    let runtime = create_runtime();
    let boundary_handle: Rc<RefCell<Option<SuspenseBoundary<&'static str>>>> =
        Rc::new(RefCell::new(None));

    let widget = lazy(|| async { Ok::<_, Error>("widget") });

    let root = create_root(runtime, {
        let boundary_handle = Rc::clone(&boundary_handle);
        let widget = widget.clone();
        move |cx| {
            let boundary = create_suspense(
                cx,
                {
                    let widget = widget.clone();
                    move || match widget.get() {
                        LazyResult::Ready(text) => Ok(text),
                        LazyResult::Pending(pending) => {
                            Err(pending.suspension())
                        }
                        LazyResult::Failed(_) => Ok("failed"),
                    }
                },
                || "pending",
            );
            *boundary_handle.borrow_mut() = Some(boundary.clone());
            Box::new(move || boundary.render()) as RenderFn<&'static str>
        }
    });

    {
        let handle = boundary_handle.borrow();
        let boundary = handle.as_ref().unwrap();
        assert!(!boundary.context().ready());
        boundary.settle().await;
        assert!(boundary.context().ready());
    }
    assert_eq!(root.view(), "widget");

    root.unmount();
    runtime.dispose();
}

#[tokio::test]
async fn loader_runs_once_even_when_the_boundary_rerenders() {
    let runtime = create_runtime();
    let loader_runs = Rc::new(Cell::new(0));
    let boundary_handle: Rc<RefCell<Option<SuspenseBoundary<String>>>> =
        Rc::new(RefCell::new(None));

    let slow = lazy({
        let loader_runs = Rc::clone(&loader_runs);
        move || {
            loader_runs.set(loader_runs.get() + 1);
            async { Ok::<_, Error>("done") }
        }
    });

    let root = create_root(runtime, {
        let boundary_handle = Rc::clone(&boundary_handle);
        let slow = slow.clone();
        move |cx| {
            let boundary = create_suspense(
                cx,
                {
                    let slow = slow.clone();
                    move || match slow.get() {
                        LazyResult::Ready(text) => Ok(text.to_string()),
                        LazyResult::Pending(pending) => {
                            Err(pending.suspension())
                        }
                        LazyResult::Failed(err) => Ok(err.to_string()),
                    }
                },
                || "loading...".to_string(),
            );
            *boundary_handle.borrow_mut() = Some(boundary.clone());
            Box::new(move || boundary.render()) as RenderFn<String>
        }
    });

    assert_eq!(root.view(), "loading...");
    boundary_handle.borrow().as_ref().unwrap().settle().await;
    assert_eq!(root.view(), "done");
    assert_eq!(loader_runs.get(), 1);

    root.unmount();
    runtime.dispose();
}
