use futures::StreamExt;
use vellum_reactive::{
    create_runtime, create_signal, raw_scope_and_disposer, SignalSet,
    SignalStream,
};

#[tokio::test]
async fn signal_to_stream_emits_current_then_changes() {
    let runtime = create_runtime();
    let (cx, disposer) = raw_scope_and_disposer(runtime);

    let (a, set_a) = create_signal(cx, 0);
    let stream = a.to_stream(cx);

    set_a.set(1);
    set_a.set(2);

    // ends the subscription, closing the stream
    disposer.dispose();

    let values: Vec<_> = stream.collect().await;
    assert_eq!(values, vec![0, 1, 2]);

    runtime.dispose();
}

#[tokio::test]
async fn stream_subscription_is_stable_until_scope_disposes() {
    let runtime = create_runtime();
    let (cx, disposer) = raw_scope_and_disposer(runtime);

    let (a, set_a) = create_signal(cx, 0);
    let mut stream = a.to_stream(cx);

    assert_eq!(stream.next().await, Some(0));
    set_a.set(10);
    assert_eq!(stream.next().await, Some(10));

    disposer.dispose();
    assert_eq!(stream.next().await, None);

    runtime.dispose();
}
