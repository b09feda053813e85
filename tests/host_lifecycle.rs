//! End-to-end lifecycle of a function host.

mod common;

use std::time::Duration;

use common::{invocation, EchoHandler, SlowHandler};
use function_host::config::HostConfig;
use function_host::lifecycle::LifecycleEvent;
use function_host::runtime::{channel, GatewayResponse};
use function_host::FunctionHost;

fn position(events: &[LifecycleEvent], event: LifecycleEvent) -> usize {
    events
        .iter()
        .position(|e| *e == event)
        .unwrap_or_else(|| panic!("{event:?} not recorded in {events:?}"))
}

#[tokio::test]
async fn test_shutdown_after_invocations() {
    let host = FunctionHost::new(HostConfig::default(), EchoHandler);
    let shutdown = host.shutdown_handle();
    let journal = host.journal();
    let (sender, source) = channel(4);
    let running = tokio::spawn(host.run_with_source(source));

    let ok = sender.invoke(invocation("req1", "/hello")).await.unwrap();
    assert_eq!(ok.unwrap().body.as_deref(), Some("/hello"));

    let failed = sender.invoke(invocation("req2", "/fail")).await.unwrap();
    let reply = failed.unwrap_err();
    assert_eq!(reply.error_type, "HandlerError");
    assert_eq!(reply.error_message, "invalidRequest");

    assert!(shutdown.trigger());
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("host did not stop")
        .unwrap()
        .unwrap();

    let events = journal.events();
    assert!(events.contains(&LifecycleEvent::ShutdownSignalled));
    assert!(
        position(&events, LifecycleEvent::CancellationRequested)
            < position(&events, LifecycleEvent::LoopStopped)
    );
    assert!(
        position(&events, LifecycleEvent::LoopStopped)
            < position(&events, LifecycleEvent::ResourceReleased)
    );
    assert!(
        position(&events, LifecycleEvent::ResourceReleased)
            < position(&events, LifecycleEvent::CoordinatorFinished)
    );
    assert_eq!(journal.count(LifecycleEvent::ResourceReleased), 1);

    // The loop is gone, so new work is refused.
    assert!(sender.invoke(invocation("req3", "/late")).await.is_err());
}

#[tokio::test]
async fn test_in_flight_invocation_survives_shutdown() {
    let handler = SlowHandler::default();
    let host = FunctionHost::new(HostConfig::default(), handler.clone());
    let shutdown = host.shutdown_handle();
    let journal = host.journal();
    let (sender, source) = channel(1);
    let running = tokio::spawn(host.run_with_source(source));

    let caller = tokio::spawn(async move { sender.invoke(invocation("req1", "/slow")).await });
    handler.wait_started().await;

    shutdown.trigger();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!running.is_finished());
    assert!(!caller.is_finished());
    assert_eq!(journal.count(LifecycleEvent::ResourceReleased), 0);

    handler.release();
    let reply: GatewayResponse = caller.await.unwrap().unwrap().unwrap();
    assert_eq!(reply.body.as_deref(), Some("slow done"));

    running.await.unwrap().unwrap();
    let events = journal.events();
    assert!(
        position(&events, LifecycleEvent::LoopStopped)
            < position(&events, LifecycleEvent::ResourceReleased)
    );
    assert!(
        position(&events, LifecycleEvent::ResourceReleased)
            < position(&events, LifecycleEvent::CoordinatorFinished)
    );
    assert_eq!(journal.count(LifecycleEvent::ResourceReleased), 1);
    assert_eq!(handler.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_recorded_shutdown_order_is_stable() {
    for _ in 0..20 {
        let host = FunctionHost::new(HostConfig::default(), EchoHandler);
        let shutdown = host.shutdown_handle();
        let journal = host.journal();
        let (_sender, source) = channel(1);
        let running = tokio::spawn(host.run_with_source(source));

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.trigger();
        running.await.unwrap().unwrap();

        let events = journal.events();
        let chain = [
            LifecycleEvent::CancellationRequested,
            LifecycleEvent::LoopStopped,
            LifecycleEvent::ResourceReleased,
            LifecycleEvent::CoordinatorFinished,
        ];
        for pair in chain.windows(2) {
            assert!(
                position(&events, pair[0]) < position(&events, pair[1]),
                "{:?} recorded after {:?}: {events:?}",
                pair[0],
                pair[1]
            );
        }
        assert_eq!(journal.count(LifecycleEvent::LoopStopped), 1);
    }
}

#[tokio::test]
async fn test_duplicate_shutdown_is_absorbed() {
    let host = FunctionHost::new(HostConfig::default(), EchoHandler);
    let shutdown = host.shutdown_handle();
    let journal = host.journal();
    let (_sender, source) = channel(1);
    let running = tokio::spawn(host.run_with_source(source));

    assert!(shutdown.trigger());
    assert!(!shutdown.trigger());
    assert!(!shutdown.trigger());

    running.await.unwrap().unwrap();
    assert_eq!(journal.count(LifecycleEvent::ResourceReleased), 1);
    assert_eq!(journal.count(LifecycleEvent::CoordinatorFinished), 1);

    // Triggered before the loop ever polled: it is still recorded as stopped first.
    let events = journal.events();
    assert_eq!(journal.count(LifecycleEvent::LoopStopped), 1);
    assert!(
        position(&events, LifecycleEvent::LoopStopped)
            < position(&events, LifecycleEvent::ResourceReleased)
    );
}

#[tokio::test]
async fn test_exhausted_source_stops_host() {
    let host = FunctionHost::new(HostConfig::default(), EchoHandler);
    let shutdown = host.shutdown_handle();
    let journal = host.journal();
    let (sender, source) = channel(1);
    let running = tokio::spawn(host.run_with_source(source));

    sender.invoke(invocation("req1", "/once")).await.unwrap().unwrap();
    drop(sender);

    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("host did not stop")
        .unwrap()
        .unwrap();

    assert!(!shutdown.is_triggered());
    let events = journal.events();
    assert_eq!(events[0], LifecycleEvent::LoopFinished);
    assert_eq!(journal.count(LifecycleEvent::ResourceReleased), 1);
}

#[tokio::test]
async fn test_local_invoke_server() {
    let addr = common::unused_addr().await;
    let mut config = HostConfig::default();
    config.local.enabled = true;
    config.local.bind_address = addr.to_string();
    config.shutdown.signals = Vec::new();

    let host = FunctionHost::new(config, EchoHandler);
    let shutdown = host.shutdown_handle();
    let running = tokio::spawn(host.run());

    let fixture = std::fs::read_to_string(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/fixtures/get_webhook_api_gtw.json"
    ))
    .unwrap();
    let client = reqwest::Client::new();
    let url = format!("http://{}/invoke", addr);

    let mut response = None;
    for _ in 0..50 {
        match client
            .post(&url)
            .header("content-type", "application/json")
            .body(fixture.clone())
            .send()
            .await
        {
            Ok(res) => {
                response = Some(res);
                break;
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
    let response = response.expect("local server never came up");
    assert_eq!(response.status(), 200);
    let body: GatewayResponse = response.json().await.unwrap();
    assert_eq!(body.status_code, 200);
    assert_eq!(body.body.as_deref(), Some("/webhook"));
    drop(client);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("host did not stop")
        .unwrap()
        .unwrap();
}
