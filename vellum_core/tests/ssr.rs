use std::time::Duration;
use vellum_core::{
    create_suspense, lazy,
    ssr::{
        collect_data, extract_styles, get_ssr_context, render_to_string,
        SsrError,
    },
    Error, LazyResult, RenderFn,
};

#[tokio::test]
async fn collected_data_round_trips() {
    let rendered = render_to_string(
        |_cx| {
            Box::new(|| {
                collect_data("user", serde_json::json!({ "id": 1 }));
                "page"
            }) as RenderFn<&'static str>
        },
        Duration::from_secs(1),
    )
    .await
    .unwrap();

    assert_eq!(rendered.html, "page");
    assert_eq!(rendered.data["user"], serde_json::json!({ "id": 1 }));
}

#[tokio::test]
async fn duplicate_data_keys_are_last_write_wins() {
    let rendered = render_to_string(
        |_cx| {
            Box::new(|| {
                collect_data("user", "first");
                collect_data("user", "second");
                "page"
            }) as RenderFn<&'static str>
        },
        Duration::from_secs(1),
    )
    .await
    .unwrap();

    assert_eq!(rendered.data["user"], serde_json::json!("second"));
}

#[test]
fn collecting_outside_a_render_is_a_silent_no_op() {
    assert!(get_ssr_context().is_none());
    // must not panic or store anything
    collect_data("user", 1);
    extract_styles(".a { color: red }");
    assert!(get_ssr_context().is_none());
}

#[tokio::test]
async fn styles_deduplicate_by_exact_string_equality() {
    let rendered = render_to_string(
        |_cx| {
            Box::new(|| {
                extract_styles(".a { color: red }");
                extract_styles(".b { color: blue }");
                extract_styles(".a { color: red }");
                // whitespace differences are different strings
                extract_styles(".a  { color: red }");
                "styled"
            }) as RenderFn<&'static str>
        },
        Duration::from_secs(1),
    )
    .await
    .unwrap();

    assert_eq!(
        rendered.styles,
        vec![
            ".a { color: red }".to_string(),
            ".b { color: blue }".to_string(),
            ".a  { color: red }".to_string(),
        ]
    );
}

#[tokio::test]
async fn suspended_work_resolves_before_the_output_is_taken() {
    let profile = lazy(|| async { Ok::<_, Error>("profile loaded") });

    let rendered = render_to_string(
        move |cx| {
            let boundary = create_suspense(
                cx,
                {
                    let profile = profile.clone();
                    move || match profile.get() {
                        LazyResult::Ready(text) => {
                            collect_data("profile", text);
                            Ok(text.to_string())
                        }
                        LazyResult::Pending(pending) => {
                            Err(pending.suspension())
                        }
                        LazyResult::Failed(err) => Ok(err.to_string()),
                    }
                },
                || "loading...".to_string(),
            );
            Box::new(move || boundary.render()) as RenderFn<String>
        },
        Duration::from_secs(1),
    )
    .await
    .unwrap();

    // the render settled before the string was taken
    assert_eq!(rendered.html, "profile loaded");
    assert_eq!(rendered.data["profile"], serde_json::json!("profile loaded"));
}

#[tokio::test]
async fn exceeding_the_budget_fails_with_timeout() {
    let never = lazy(|| async {
        futures::future::pending::<()>().await;
        Ok::<_, Error>("unreachable")
    });

    let result = render_to_string(
        move |cx| {
            let boundary = create_suspense(
                cx,
                {
                    let never = never.clone();
                    move || match never.get() {
                        LazyResult::Ready(text) => Ok(text.to_string()),
                        LazyResult::Pending(pending) => {
                            Err(pending.suspension())
                        }
                        LazyResult::Failed(err) => Ok(err.to_string()),
                    }
                },
                || "loading...".to_string(),
            );
            Box::new(move || boundary.render()) as RenderFn<String>
        },
        Duration::from_millis(50),
    )
    .await;

    assert!(matches!(result, Err(SsrError::Timeout(_))));
    // the failed render did not leak its context
    assert!(get_ssr_context().is_none());
}

#[tokio::test]
async fn islands_pass_through_opaquely() {
    let rendered = render_to_string(
        |_cx| {
            Box::new(|| {
                if let Some(ssr) = get_ssr_context() {
                    ssr.collect_island(serde_json::json!({
                        "component": "Counter",
                        "strategy": "visible",
                    }));
                }
                "island page"
            }) as RenderFn<&'static str>
        },
        Duration::from_secs(1),
    )
    .await
    .unwrap();

    assert_eq!(rendered.islands.len(), 1);
    assert_eq!(rendered.islands[0]["component"], "Counter");
}
