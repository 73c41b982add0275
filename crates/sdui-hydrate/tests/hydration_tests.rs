//! Integration tests for concurrent hydration
//!
//! All tests run on a paused tokio clock so delays, backoff and TTLs are
//! deterministic.

use pretty_assertions::assert_eq;
use sdui_hydrate::{
    CacheStatus, DataHydrator, HydrationErrorKind, HydrationSettings, HydratorConfig, RetryPolicy,
};
use sdui_schema::HydrationDirective;
use sdui_test_utils::{Reply, ScriptedTransport};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn setup(transport: ScriptedTransport) -> (Arc<ScriptedTransport>, DataHydrator) {
    let transport = Arc::new(transport);
    let hydrator = DataHydrator::new(transport.clone());
    (transport, hydrator)
}

#[tokio::test(start_paused = true)]
async fn concurrent_identical_requests_share_one_fetch() {
    let (transport, hydrator) = setup(
        ScriptedTransport::new()
            .with_ok("/kpis", json!({ "revenue": 10 }))
            .with_delay("/kpis", Duration::from_millis(50)),
    );
    let directive = HydrationDirective::new("/kpis").with_param("range", "7d");

    let (a, b) = tokio::join!(
        hydrator.hydrate(std::slice::from_ref(&directive)),
        hydrator.hydrate(std::slice::from_ref(&directive)),
    );

    assert_eq!(transport.calls("/kpis"), 1);
    assert_eq!(a.outcomes[0].status, CacheStatus::Miss);
    assert_eq!(b.outcomes[0].status, CacheStatus::Coalesced);
    assert_eq!(
        a.outcomes[0].result.as_deref().unwrap(),
        b.outcomes[0].result.as_deref().unwrap()
    );
    assert_eq!(hydrator.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn cache_ttl_boundary() {
    let (transport, hydrator) = setup(ScriptedTransport::new().with_ok("/x", json!(1)));
    let directive = HydrationDirective::new("/x").with_ttl(Duration::from_millis(100));

    let first = hydrator.hydrate(std::slice::from_ref(&directive)).await;
    assert_eq!(first.outcomes[0].status, CacheStatus::Miss);

    tokio::time::advance(Duration::from_millis(99)).await;
    let second = hydrator.hydrate(std::slice::from_ref(&directive)).await;
    assert_eq!(second.outcomes[0].status, CacheStatus::Hit);

    tokio::time::advance(Duration::from_millis(2)).await;
    let third = hydrator.hydrate(std::slice::from_ref(&directive)).await;
    assert_eq!(third.outcomes[0].status, CacheStatus::Miss);

    assert_eq!(transport.calls("/x"), 2);
}

#[tokio::test(start_paused = true)]
async fn settings_ttl_applies_when_directive_has_none() {
    let (_, hydrator) = setup(ScriptedTransport::new().with_ok("/x", json!(1)));
    let settings = HydrationSettings::new().with_ttl(Duration::from_millis(10));
    let directive = [HydrationDirective::new("/x")];

    hydrator.hydrate_with(&directive, &settings).await;
    tokio::time::advance(Duration::from_millis(11)).await;

    let batch = hydrator.hydrate_with(&directive, &settings).await;
    assert_eq!(batch.outcomes[0].status, CacheStatus::Miss);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_retry_then_succeed() {
    let (transport, hydrator) = setup(
        ScriptedTransport::new()
            .with_script(
                "/flaky",
                vec![Reply::Transient("503".into()), Reply::Transient("reset".into())],
            )
            .with_ok("/flaky", json!("ok")),
    );

    let batch = hydrator.hydrate(&[HydrationDirective::new("/flaky")]).await;

    assert_eq!(batch.outcomes[0].result.as_deref().unwrap(), &json!("ok"));
    assert_eq!(transport.calls("/flaky"), 3);
    assert_eq!(batch.stats.transport_calls, 3);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_exhaust_retry_budget() {
    let (transport, hydrator) = setup(
        ScriptedTransport::new().with_reply("/down", Reply::Transient("503".into())),
    );

    let batch = hydrator.hydrate(&[HydrationDirective::new("/down")]).await;

    let err = batch.outcomes[0].result.as_ref().unwrap_err();
    assert_eq!(err.kind, HydrationErrorKind::TransientFailure);
    assert_eq!(err.attempts, 4);
    assert_eq!(transport.calls("/down"), 4);
}

#[tokio::test(start_paused = true)]
async fn retry_count_override() {
    let (transport, hydrator) = setup(
        ScriptedTransport::new().with_reply("/down", Reply::Transient("503".into())),
    );
    let settings = HydrationSettings::new().with_retry(RetryPolicy::default().with_max_retries(1));

    hydrator
        .hydrate_with(&[HydrationDirective::new("/down")], &settings)
        .await;
    assert_eq!(transport.calls("/down"), 2);
}

#[tokio::test(start_paused = true)]
async fn permanent_failure_is_not_retried() {
    let (transport, hydrator) = setup(
        ScriptedTransport::new().with_reply("/missing", Reply::Permanent("404".into())),
    );

    let batch = hydrator.hydrate(&[HydrationDirective::new("/missing")]).await;

    let err = batch.outcomes[0].result.as_ref().unwrap_err();
    assert_eq!(err.kind, HydrationErrorKind::PermanentFailure);
    assert_eq!(transport.calls("/missing"), 1);
}

#[tokio::test(start_paused = true)]
async fn timeout_is_isolated_to_its_directive() {
    let (_, hydrator) = setup(
        ScriptedTransport::new()
            .with_reply("/stuck", Reply::Hang)
            .with_ok("/fast", json!("fast")),
    );

    let batch = hydrator
        .hydrate(&[
            HydrationDirective::new("/stuck").with_timeout(Duration::from_millis(100)),
            HydrationDirective::new("/fast"),
        ])
        .await;

    let err = batch.outcomes[0].result.as_ref().unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(batch.outcomes[1].result.as_deref().unwrap(), &json!("fast"));
    assert!(batch.elapsed < Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn late_success_still_populates_cache() {
    let (transport, hydrator) = setup(
        ScriptedTransport::new()
            .with_ok("/slow", json!({ "late": true }))
            .with_delay("/slow", Duration::from_millis(300)),
    );
    let directive = HydrationDirective::new("/slow").with_timeout(Duration::from_millis(100));

    let first = hydrator.hydrate(std::slice::from_ref(&directive)).await;
    assert!(first.outcomes[0].result.as_ref().unwrap_err().is_timeout());

    tokio::time::sleep(Duration::from_millis(300)).await;

    let second = hydrator.hydrate(std::slice::from_ref(&directive)).await;
    assert_eq!(second.outcomes[0].status, CacheStatus::Hit);
    assert_eq!(
        second.outcomes[0].result.as_deref().unwrap(),
        &json!({ "late": true })
    );
    assert_eq!(transport.calls("/slow"), 1);
}

#[tokio::test(start_paused = true)]
async fn timed_out_fetch_does_not_block_later_attempts() {
    let (transport, hydrator) = setup(
        ScriptedTransport::new()
            .with_script("/x", vec![Reply::Hang])
            .with_ok("/x", json!("fresh")),
    );
    let directive = [HydrationDirective::new("/x").with_timeout(Duration::from_millis(50))];

    let first = hydrator.hydrate(&directive).await;
    assert_eq!(first.outcomes[0].status, CacheStatus::Miss);
    assert!(first.outcomes[0].result.as_ref().unwrap_err().is_timeout());
    assert_eq!(hydrator.in_flight(), 0);

    let second = hydrator.hydrate(&directive).await;
    assert_eq!(second.outcomes[0].status, CacheStatus::Miss);
    assert_eq!(second.outcomes[0].result.as_deref().unwrap(), &json!("fresh"));
    assert_eq!(transport.calls("/x"), 2);
}

#[tokio::test(start_paused = true)]
async fn transport_override_has_its_own_cache_namespace() {
    let (transport, hydrator) = setup(ScriptedTransport::new().with_ok("/x", json!("default")));
    let tenant = Arc::new(ScriptedTransport::new().with_ok("/x", json!("tenant")));
    let settings = HydrationSettings::new().with_transport("tenant", tenant.clone());
    let directive = [HydrationDirective::new("/x")];

    hydrator.hydrate(&directive).await;
    let scoped = hydrator.hydrate_with(&directive, &settings).await;
    assert_eq!(scoped.outcomes[0].status, CacheStatus::Miss);
    assert_eq!(scoped.outcomes[0].result.as_deref().unwrap(), &json!("tenant"));

    let again = hydrator.hydrate_with(&directive, &settings).await;
    assert_eq!(again.outcomes[0].status, CacheStatus::Hit);
    assert_eq!(again.outcomes[0].result.as_deref().unwrap(), &json!("tenant"));

    let plain = hydrator.hydrate(&directive).await;
    assert_eq!(plain.outcomes[0].result.as_deref().unwrap(), &json!("default"));
    assert_eq!((transport.calls("/x"), tenant.calls("/x")), (1, 1));
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_is_retried_fresh_next_time() {
    let (transport, hydrator) = setup(
        ScriptedTransport::new()
            .with_script("/x", vec![Reply::Permanent("410".into())])
            .with_ok("/x", json!("back")),
    );
    let directive = [HydrationDirective::new("/x")];

    assert!(!hydrator.hydrate(&directive).await.outcomes[0].is_ok());
    let batch = hydrator.hydrate(&directive).await;

    assert_eq!(batch.outcomes[0].status, CacheStatus::Miss);
    assert_eq!(batch.outcomes[0].result.as_deref().unwrap(), &json!("back"));
    assert_eq!(transport.calls("/x"), 2);
}

#[tokio::test(start_paused = true)]
async fn directives_run_concurrently() {
    let mut transport = ScriptedTransport::new();
    let mut directives = Vec::new();
    for i in 0..5 {
        let endpoint = format!("/slow/{i}");
        transport = transport
            .with_ok(&endpoint, json!(i))
            .with_delay(&endpoint, Duration::from_millis(100));
        directives.push(HydrationDirective::new(endpoint));
    }
    let (_, hydrator) = setup(transport);

    let batch = hydrator.hydrate(&directives).await;

    assert!(batch.iter().all(|o| o.is_ok()));
    assert!(batch.elapsed < Duration::from_millis(200), "{:?}", batch.elapsed);
}

#[tokio::test(start_paused = true)]
async fn outcomes_keep_input_order() {
    let (_, hydrator) = setup(
        ScriptedTransport::new()
            .with_ok("/a", json!("a"))
            .with_delay("/a", Duration::from_millis(300))
            .with_ok("/b", json!("b"))
            .with_delay("/b", Duration::from_millis(100))
            .with_ok("/c", json!("c"))
            .with_delay("/c", Duration::from_millis(200)),
    );

    let batch = hydrator
        .hydrate(&[
            HydrationDirective::new("/a"),
            HydrationDirective::new("/b"),
            HydrationDirective::new("/c"),
        ])
        .await;

    let values: Vec<_> = batch
        .iter()
        .map(|o| o.result.as_deref().unwrap().clone())
        .collect();
    assert_eq!(values, vec![json!("a"), json!("b"), json!("c")]);
}

#[tokio::test(start_paused = true)]
async fn sweeper_evicts_expired_results() {
    let transport = Arc::new(ScriptedTransport::new().with_ok("/x", json!(1)));
    let hydrator = DataHydrator::with_config(
        transport,
        HydratorConfig::default()
            .with_default_ttl(Duration::from_millis(10))
            .with_sweep_interval(Duration::from_millis(50)),
    );

    hydrator.hydrate(&[HydrationDirective::new("/x")]).await;
    hydrator.cache().sync().await;
    assert_eq!(hydrator.cache().stats().entry_count, 1);

    let sweeper = hydrator.spawn_sweeper();
    tokio::time::sleep(Duration::from_millis(120)).await;
    hydrator.cache().sync().await;
    assert_eq!(hydrator.cache().stats().entry_count, 0);
    drop(sweeper);
}

#[tokio::test(start_paused = true)]
async fn cumulative_stats_span_batches() {
    let (_, hydrator) = setup(
        ScriptedTransport::new()
            .with_ok("/ok", json!(1))
            .with_reply("/bad", Reply::Permanent("400".into())),
    );
    let directives = [HydrationDirective::new("/ok"), HydrationDirective::new("/bad")];

    hydrator.hydrate(&directives).await;
    hydrator.hydrate(&directives).await;

    let stats = hydrator.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 3);
    assert_eq!(stats.failures, 2);
    assert_eq!(stats.transport_calls, 3);
    assert_eq!(stats.requests(), 4);
}
