//! End-to-end dispatch tests through the public surface:
//! registration, fan-out ordering, aggregation modes, cascades,
//! failure isolation, snapshot behavior.

use pulse_core::{Error, ErrorSink, EventArgs, EventBus, EventBusConfig, FireOptions};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Counting sink for asserting report behavior from outside the crate.
struct CountingSink {
    reports: Mutex<Vec<String>>,
}

impl CountingSink {
    fn new() -> Self {
        Self {
            reports: Mutex::new(Vec::new()),
        }
    }

    fn count(&self) -> usize {
        self.reports.lock().unwrap().len()
    }
}

impl ErrorSink for CountingSink {
    fn report(&self, context: &str, error: &Error) {
        self.reports
            .lock()
            .unwrap()
            .push(format!("{context}: {error}"));
    }
}

fn test_bus() -> (EventBus, Arc<CountingSink>) {
    let sink = Arc::new(CountingSink::new());
    let bus = EventBus::with_sink(EventBusConfig::default(), sink.clone());
    (bus, sink)
}

#[tokio::test]
async fn fire_on_unknown_event_returns_none_without_logging() {
    let (bus, sink) = test_bus();

    let result = bus
        .fire("movie.searcher.started", EventArgs::new(), FireOptions::new())
        .await;

    assert_eq!(result, None);
    assert_eq!(sink.count(), 0);
}

#[tokio::test]
async fn single_registered_handler_returns_raw_value() {
    let (bus, _) = test_bus();
    bus.register_fn("media.get", |_call| async { Ok(json!([1, 2, 3])) })
        .await;

    let result = bus
        .fire("media.get", EventArgs::new(), FireOptions::new())
        .await;

    // Raw value, not wrapped into a result list.
    assert_eq!(result, Some(json!([1, 2, 3])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn outcomes_are_presented_in_priority_order_despite_completion_order() {
    let (bus, _) = test_bus();

    // 느리게 끝나는 쪽이 priority가 낮음 - 제시 순서는 완료 순서와 무관해야 함
    bus.register_fn_with_priority("provider.search", 110, |_call| async {
        Ok(json!("p110"))
    })
    .await;
    bus.register_fn_with_priority("provider.search", 1, |_call| async {
        tokio::time::sleep(Duration::from_millis(40)).await;
        Ok(json!("p1"))
    })
    .await;
    bus.register_fn_with_priority("provider.search", 100, |_call| async {
        tokio::time::sleep(Duration::from_millis(15)).await;
        Ok(json!("p100"))
    })
    .await;

    for _ in 0..3 {
        let result = bus
            .fire("provider.search", EventArgs::new(), FireOptions::new())
            .await;
        assert_eq!(result, Some(json!(["p1", "p100", "p110"])));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_mode_returns_first_truthy_by_priority() {
    let (bus, _) = test_bus();
    bus.register_fn_with_priority("searcher.single", 1, |_call| async { Ok(Value::Null) })
        .await;
    bus.register_fn_with_priority("searcher.single", 100, |_call| async { Ok(json!("B")) })
        .await;
    bus.register_fn_with_priority("searcher.single", 110, |_call| async { Ok(json!("C")) })
        .await;

    let result = bus
        .fire(
            "searcher.single",
            EventArgs::new(),
            FireOptions::new().with_single(),
        )
        .await;
    assert_eq!(result, Some(json!("B")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn merge_mode_deep_merges_dicts() {
    let (bus, _) = test_bus();
    bus.register_fn_with_priority("settings.options", 1, |_call| async {
        Ok(json!({"a": 1, "b": [1]}))
    })
    .await;
    bus.register_fn_with_priority("settings.options", 100, |_call| async {
        Ok(json!({"a": 2, "b": [2], "c": 3}))
    })
    .await;

    let result = bus
        .fire(
            "settings.options",
            EventArgs::new(),
            FireOptions::new().with_merge(),
        )
        .await;
    assert_eq!(result, Some(json!({"a": 1, "b": [1, 2], "c": 3})));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn merge_mode_concats_lists_dropping_duplicates() {
    let (bus, _) = test_bus();
    bus.register_fn_with_priority("provider.urls", 1, |_call| async { Ok(json!([1, 2])) })
        .await;
    bus.register_fn_with_priority("provider.urls", 100, |_call| async { Ok(json!([2, 3])) })
        .await;

    let result = bus
        .fire(
            "provider.urls",
            EventArgs::new(),
            FireOptions::new().with_merge(),
        )
        .await;
    assert_eq!(result, Some(json!([1, 2, 3])));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failing_handler_is_excluded_but_does_not_abort_siblings() {
    let (bus, sink) = test_bus();
    bus.register_fn_with_priority("movie.update", 1, |_call| async { Ok(json!("ok")) })
        .await;
    bus.register_fn_with_priority("movie.update", 50, |call| async move {
        Err(Error::handler(call.event(), "provider offline"))
    })
    .await;
    bus.register_fn_with_priority("movie.update", 100, |_call| async { Ok(json!("also ok")) })
        .await;

    let result = bus
        .fire("movie.update", EventArgs::new(), FireOptions::new())
        .await;

    assert_eq!(result, Some(json!(["ok", "also ok"])));
    assert!(sink.count() >= 1);
}

#[tokio::test]
async fn sole_failing_handler_returns_empty_list() {
    let (bus, sink) = test_bus();
    bus.register_fn("renamer.scan", |call| async move {
        Err(Error::handler(call.event(), "disk unavailable"))
    })
    .await;

    let result = bus
        .fire("renamer.scan", EventArgs::new(), FireOptions::new())
        .await;

    // 핸들러가 있었으나 실패한 경우는 빈 목록, 핸들러 없음(None)과 구분
    assert_eq!(result, Some(json!([])));
    assert_eq!(sink.count(), 1);
}

#[tokio::test]
async fn registry_reflects_registrations() {
    let (bus, _) = test_bus();
    bus.register_fn("movie.add", |_call| async { Ok(Value::Null) })
        .await;
    bus.register_fn("movie.add", |_call| async { Ok(Value::Null) })
        .await;
    bus.register_fn("movie.delete", |_call| async { Ok(Value::Null) })
        .await;

    let registry = bus.registry();
    assert_eq!(registry.handler_count("movie.add").await, 2);
    assert_eq!(registry.handler_count("movie.delete").await, 1);
    assert_eq!(registry.handler_count("movie.refresh").await, 0);

    let mut names = registry.event_names().await;
    names.sort();
    assert_eq!(names, vec!["movie.add", "movie.delete"]);
}

#[tokio::test]
async fn after_event_fires_exactly_once_without_recursion() {
    let (bus, _) = test_bus();
    let after = Arc::new(AtomicUsize::new(0));
    let nested = Arc::new(AtomicUsize::new(0));

    bus.register_fn("x", |_call| async { Ok(json!(true)) }).await;

    let counted = after.clone();
    bus.register_fn("x.after", move |_call| {
        let counted = counted.clone();
        async move {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        }
    })
    .await;

    let counted = nested.clone();
    bus.register_fn("x.after.after", move |_call| {
        let counted = counted.clone();
        async move {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        }
    })
    .await;

    bus.fire("x", EventArgs::new(), FireOptions::new()).await;

    assert_eq!(after.load(Ordering::SeqCst), 1);
    assert_eq!(nested.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn result_modify_handler_rewrites_the_result() {
    let (bus, _) = test_bus();
    bus.register_fn("release.download", |_call| async { Ok(json!("magnet:a")) })
        .await;
    bus.register_fn("release.download.result.modify", |call| {
        let original = call.arg(0).cloned().unwrap_or(Value::Null);
        async move {
            assert_eq!(original, json!("magnet:a"));
            Ok(json!("magnet:rewritten"))
        }
    })
    .await;

    let result = bus
        .fire("release.download", EventArgs::new(), FireOptions::new())
        .await;
    assert_eq!(result, Some(json!("magnet:rewritten")));
}

#[tokio::test]
async fn falsy_result_modify_value_keeps_original_result() {
    let (bus, _) = test_bus();
    bus.register_fn("release.download", |_call| async { Ok(json!("magnet:a")) })
        .await;
    bus.register_fn("release.download.result.modify", |_call| async {
        Ok(Value::Null)
    })
    .await;

    let result = bus
        .fire("release.download", EventArgs::new(), FireOptions::new())
        .await;
    assert_eq!(result, Some(json!("magnet:a")));
}

#[tokio::test]
async fn late_registration_does_not_affect_in_flight_fire() {
    let (bus, _) = test_bus();

    let registrar = bus.clone();
    bus.register_fn("library.scan", move |_call| {
        let registrar = registrar.clone();
        async move {
            // 발행 도중 같은 이벤트에 새 핸들러 등록 - 이번 발행엔 반영 안 됨
            registrar
                .register_fn("library.scan", |_call| async { Ok(json!("late")) })
                .await;
            Ok(json!("original"))
        }
    })
    .await;

    let first = bus
        .fire("library.scan", EventArgs::new(), FireOptions::new())
        .await;
    assert_eq!(first, Some(json!("original")));

    // 다음 발행부터 두 핸들러 모두 참여 (두 번째 핸들러도 또 등록하므로 세 번째부터는 3개)
    let second = bus
        .fire("library.scan", EventArgs::new(), FireOptions::new())
        .await;
    assert_eq!(second, Some(json!(["original", "late"])));
}

#[tokio::test]
async fn duplicate_registration_is_invoked_twice() {
    let (bus, _) = test_bus();
    let count = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let counted = count.clone();
        bus.register_fn("core.notify", move |_call| {
            let counted = counted.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                Ok(json!("sent"))
            }
        })
        .await;
    }

    let result = bus
        .fire("core.notify", EventArgs::new(), FireOptions::new())
        .await;
    assert_eq!(result, Some(json!(["sent", "sent"])));
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn on_complete_runs_after_cascades() {
    let (bus, _) = test_bus();
    let log = Arc::new(Mutex::new(Vec::new()));

    let logged = log.clone();
    bus.register_fn("renamer.scan", move |_call| {
        let logged = logged.clone();
        async move {
            logged.lock().unwrap().push("handler");
            Ok(json!(true))
        }
    })
    .await;

    let logged = log.clone();
    bus.register_fn("renamer.scan.after", move |_call| {
        let logged = logged.clone();
        async move {
            logged.lock().unwrap().push("after");
            Ok(Value::Null)
        }
    })
    .await;

    let logged = log.clone();
    let options = FireOptions::new().with_on_complete(move || {
        logged.lock().unwrap().push("complete");
    });
    bus.fire("renamer.scan", EventArgs::new(), options).await;

    assert_eq!(*log.lock().unwrap(), vec!["handler", "after", "complete"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn order_token_lets_handlers_serialize_themselves() {
    let (bus, _) = test_bus();
    let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

    for id in ["a", "b"] {
        let logged = log.clone();
        bus.register_fn("downloader.queue", move |call| {
            let logged = logged.clone();
            async move {
                let token = call.order_token().cloned().expect("token expected");
                let _guard = token.acquire().await;
                logged.lock().unwrap().push(format!("{id}:start"));
                tokio::time::sleep(Duration::from_millis(10)).await;
                logged.lock().unwrap().push(format!("{id}:end"));
                Ok(json!(id))
            }
        })
        .await;
    }

    bus.fire(
        "downloader.queue",
        EventArgs::new(),
        FireOptions::new().with_in_order(),
    )
    .await;

    // guard를 쥔 구간은 서로 겹치지 않아야 함
    let log = log.lock().unwrap();
    assert_eq!(log.len(), 4);
    assert_eq!(log[0].split(':').nth(1), Some("start"));
    assert_eq!(log[1].split(':').nth(0), log[0].split(':').nth(0));
    assert_eq!(log[1].split(':').nth(1), Some("end"));
}

#[tokio::test]
async fn order_token_is_absent_without_single_or_in_order() {
    let (bus, _) = test_bus();
    bus.register_fn_with_priority("a.b", 1, |call| async move {
        Ok(json!(call.order_token().is_some()))
    })
    .await;
    bus.register_fn_with_priority("a.b", 2, |call| async move {
        Ok(json!(call.order_token().is_some()))
    })
    .await;

    let result = bus.fire("a.b", EventArgs::new(), FireOptions::new()).await;
    // truthy 필터로 false 값은 목록에서 제외됨 → 토큰이 없으면 빈 목록
    assert_eq!(result, Some(json!([])));
}

#[tokio::test]
async fn kwargs_reach_handlers() {
    let (bus, _) = test_bus();
    bus.register_fn("movie.add", |call| {
        let title = call.kwarg("title").cloned().unwrap_or(Value::Null);
        async move { Ok(json!({ "added": title })) }
    })
    .await;

    let args = EventArgs::new().with_kwarg("title", json!("The Movie"));
    let result = bus.fire("movie.add", args, FireOptions::new()).await;
    assert_eq!(result, Some(json!({ "added": "The Movie" })));
}

#[tokio::test]
async fn fire_async_returns_true_and_runs_detached() {
    let (bus, _) = test_bus();
    let fired = Arc::new(AtomicUsize::new(0));

    let counted = fired.clone();
    bus.register_fn("core.shutdown", move |_call| {
        let counted = counted.clone();
        async move {
            counted.fetch_add(1, Ordering::SeqCst);
            Ok(json!(true))
        }
    })
    .await;

    assert!(bus.fire_async("core.shutdown", EventArgs::new()));

    for _ in 0..100 {
        if fired.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[test]
fn fire_async_without_runtime_reports_scheduling_failure() {
    let sink = Arc::new(CountingSink::new());
    let bus = EventBus::with_sink(EventBusConfig::default(), sink.clone());

    assert!(!bus.fire_async("core.shutdown", EventArgs::new()));
    assert_eq!(sink.count(), 1);
}
