use vellum_reactive::{
    create_runtime, create_scope, expect_context, provide_context, use_context,
};

#[test]
fn context_is_visible_to_descendants() {
    create_scope(create_runtime(), |cx| {
        provide_context(cx, String::from("test"));

        cx.run_child_scope(|child| {
            assert_eq!(
                use_context::<String>(child),
                Some(String::from("test"))
            );
            assert_eq!(use_context::<i32>(child), None);

            child.run_child_scope(|grandchild| {
                assert_eq!(
                    use_context::<String>(grandchild),
                    Some(String::from("test"))
                );
            });
        });
    })
    .dispose()
}

#[test]
fn inner_provider_shadows_outer_for_descendants_only() {
    #[derive(Clone, Debug, PartialEq)]
    struct Theme(&'static str);

    create_scope(create_runtime(), |cx| {
        provide_context(cx, Theme("light"));

        cx.run_child_scope(|inner| {
            provide_context(inner, Theme("dark"));

            inner.run_child_scope(|descendant| {
                assert_eq!(
                    use_context::<Theme>(descendant),
                    Some(Theme("dark"))
                );
            });
        });

        // a sibling of the inner provider sees the outer value
        cx.run_child_scope(|sibling| {
            assert_eq!(use_context::<Theme>(sibling), Some(Theme("light")));
        });
    })
    .dispose()
}

#[test]
fn disposed_provider_unmasks_outer_value() {
    #[derive(Clone, Debug, PartialEq)]
    struct Theme(&'static str);

    create_scope(create_runtime(), |cx| {
        provide_context(cx, Theme("light"));

        let (_, disposer) = cx.run_child_scope(|inner| {
            provide_context(inner, Theme("dark"));
        });
        disposer.dispose();

        cx.run_child_scope(|after| {
            assert_eq!(use_context::<Theme>(after), Some(Theme("light")));
        });
    })
    .dispose()
}

#[test]
fn expect_context_returns_the_value() {
    create_scope(create_runtime(), |cx| {
        provide_context(cx, 42i32);
        assert_eq!(expect_context::<i32>(cx), 42);
    })
    .dispose()
}

#[test]
#[should_panic]
fn expect_context_panics_when_missing() {
    create_scope(create_runtime(), |cx| {
        expect_context::<bool>(cx);
    })
    .dispose()
}

#[test]
fn provider_value_can_be_a_signal() {
    use vellum_reactive::{create_signal, ReadSignal, SignalGet, SignalSet};

    create_scope(create_runtime(), |cx| {
        let (theme, set_theme) = create_signal(cx, "light");
        provide_context(cx, theme);

        cx.run_child_scope(|child| {
            let theme = use_context::<ReadSignal<&str>>(child).unwrap();
            assert_eq!(theme.get(), "light");
            set_theme.set("dark");
            assert_eq!(theme.get(), "dark");
        });
    })
    .dispose()
}
