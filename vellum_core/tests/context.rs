use vellum_core::{
    create_context, create_runtime, create_scope, create_signal, SignalGet,
    SignalSet,
};

#[derive(Clone, Debug, PartialEq)]
struct Theme(&'static str);

#[test]
fn consume_falls_back_to_the_default() {
    let theme = create_context(Theme("light"));

    create_scope(create_runtime(), move |cx| {
        assert_eq!(theme.consume(cx), Theme("light"));
        assert!(!theme.is_provided(cx));
    })
    .dispose()
}

#[test]
fn provided_value_wins_over_the_default() {
    let theme = create_context(Theme("light"));

    create_scope(create_runtime(), move |cx| {
        theme.provide(cx, Theme("dark"));

        cx.run_child_scope(|child| {
            assert_eq!(theme.consume(child), Theme("dark"));
            assert!(theme.is_provided(child));
        });
    })
    .dispose()
}

#[test]
fn nested_providers_shadow_for_descendants_only() {
    let theme = create_context(Theme("default"));

    create_scope(create_runtime(), move |cx| {
        theme.provide(cx, Theme("outer"));

        cx.run_child_scope(|inner| {
            theme.provide(inner, Theme("inner"));
            inner.run_child_scope(|descendant| {
                assert_eq!(theme.consume(descendant), Theme("inner"));
            });
        });

        cx.run_child_scope(|sibling| {
            assert_eq!(theme.consume(sibling), Theme("outer"));
        });
    })
    .dispose()
}

#[test]
fn reactive_provider_updates_consumers() {
    use vellum_core::ReadSignal;

    let theme = create_context::<Option<ReadSignal<&'static str>>>(None);

    create_scope(create_runtime(), move |cx| {
        let (current, set_current) = create_signal(cx, "light");
        theme.provide(cx, Some(current));

        cx.run_child_scope(|child| {
            let provided = theme.consume(child).unwrap();
            assert_eq!(provided.get(), "light");
            set_current.set("dark");
            assert_eq!(provided.get(), "dark");
        });
    })
    .dispose()
}
