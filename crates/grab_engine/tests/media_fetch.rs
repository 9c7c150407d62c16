use std::time::Duration;

use grab_engine::{
    DirectStrategy, FetchOutcome, FetchSettings, MediaFetcher, ReachabilityProbe, RelayStrategy,
    StrategyKind,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn init_logging() {
    grab_logging::initialize_for_tests();
}

fn fast_settings(relays: Vec<String>) -> FetchSettings {
    FetchSettings {
        backoff_step: Duration::from_millis(1),
        relays,
        relay_timeout: Duration::from_millis(200),
        ..FetchSettings::default()
    }
}

#[tokio::test]
async fn direct_fetch_returns_bytes_and_content_type() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"jpegdata".to_vec(), "image/jpeg"))
        .mount(&server)
        .await;

    let fetcher = MediaFetcher::new(&fast_settings(Vec::new())).unwrap();
    let url = format!("{}/media/a.jpg", server.uri());

    match fetcher.fetch(&url).await {
        FetchOutcome::Success(payload) => {
            assert_eq!(&payload.bytes[..], b"jpegdata");
            assert_eq!(payload.content_type.as_deref(), Some("image/jpeg"));
            assert_eq!(payload.via, StrategyKind::Direct);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn direct_fetch_sends_browser_headers() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/b.jpg"))
        .and(wiremock::matchers::header("referer", "https://www.instagram.com/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = MediaFetcher::new(&fast_settings(Vec::new())).unwrap();
    let payload = fetcher
        .fetch_media_bytes(&format!("{}/media/b.jpg", server.uri()))
        .await
        .expect("payload");
    assert_eq!(&payload.bytes[..], b"ok");
}

#[tokio::test]
async fn direct_fetch_retries_transient_failures() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/flaky.mp4"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/flaky.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"video".to_vec(), "video/mp4"))
        .mount(&server)
        .await;

    let settings = fast_settings(Vec::new());
    let fetcher =
        MediaFetcher::with_strategies(&settings, vec![Box::new(DirectStrategy::new(&settings))])
            .unwrap();

    let payload = fetcher
        .fetch_media_bytes(&format!("{}/media/flaky.mp4", server.uri()))
        .await
        .expect("third attempt succeeds");
    assert_eq!(&payload.bytes[..], b"video");
}

#[tokio::test]
async fn payloads_at_or_below_threshold_are_rejected() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/tiny.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_string("tiny"))
        .expect(3)
        .mount(&server)
        .await;

    let settings = FetchSettings {
        min_payload_bytes: 4,
        ..fast_settings(Vec::new())
    };
    let fetcher =
        MediaFetcher::with_strategies(&settings, vec![Box::new(DirectStrategy::new(&settings))])
            .unwrap();

    let outcome = fetcher
        .fetch(&format!("{}/media/tiny.jpg", server.uri()))
        .await;
    assert_eq!(outcome, FetchOutcome::Failure);
}

#[tokio::test]
async fn relay_is_used_when_direct_fetch_fails() {
    init_logging();
    let server = MockServer::start().await;
    let media_url = format!("{}/media/blocked.jpg", server.uri());
    Mock::given(method("GET"))
        .and(path("/media/blocked.jpg"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/relay"))
        .and(query_param("url", media_url.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"relayed".to_vec(), "image/png"))
        .mount(&server)
        .await;

    let settings = fast_settings(vec![format!("{}/relay?url=", server.uri())]);
    let fetcher = MediaFetcher::new(&settings).unwrap();

    match fetcher.fetch(&media_url).await {
        FetchOutcome::Success(payload) => {
            assert_eq!(payload.via, StrategyKind::Relay);
            assert_eq!(&payload.bytes[..], b"relayed");
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn slow_relay_does_not_block_the_next_one() {
    init_logging();
    let server = MockServer::start().await;
    let media_url = "https://cdn.invalid/media/x.jpg";
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(2))
                .set_body_string("late"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fast"))
        .and(query_param("url", media_url))
        .respond_with(ResponseTemplate::new(200).set_body_string("fast"))
        .mount(&server)
        .await;

    let settings = fast_settings(vec![
        format!("{}/slow?url=", server.uri()),
        format!("{}/fast?url=", server.uri()),
    ]);
    let relay = RelayStrategy::new(&settings);
    let fetcher = MediaFetcher::with_strategies(&settings, vec![Box::new(relay)]).unwrap();

    let payload = fetcher.fetch_media_bytes(media_url).await.expect("fast relay");
    assert_eq!(&payload.bytes[..], b"fast");
}

#[tokio::test]
async fn reachable_but_unreadable_media_is_reported_as_opaque() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/opaque.jpg"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/media/opaque.jpg"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let fetcher = MediaFetcher::new(&fast_settings(Vec::new())).unwrap();
    let url = format!("{}/media/opaque.jpg", server.uri());

    assert_eq!(fetcher.fetch(&url).await, FetchOutcome::OpaqueUnreadable);
    assert_eq!(fetcher.fetch_media_bytes(&url).await, None);
}

#[tokio::test]
async fn exhausted_chain_returns_failure() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let settings = fast_settings(vec![format!("{}/relay?url=", server.uri())]);
    let fetcher = MediaFetcher::new(&settings).unwrap();

    let outcome = fetcher
        .fetch(&format!("{}/media/gone.jpg", server.uri()))
        .await;
    assert_eq!(outcome, FetchOutcome::Failure);
}

#[tokio::test]
async fn injected_chain_short_circuits_on_first_success() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/media/probe.jpg"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let settings = fast_settings(Vec::new());
    let fetcher = MediaFetcher::with_strategies(
        &settings,
        vec![Box::new(ReachabilityProbe), Box::new(DirectStrategy::new(&settings))],
    )
    .unwrap();

    let outcome = fetcher
        .fetch(&format!("{}/media/probe.jpg", server.uri()))
        .await;
    assert_eq!(outcome, FetchOutcome::OpaqueUnreadable);
}

#[tokio::test]
async fn stalled_direct_fetch_gives_way_to_relays() {
    init_logging();
    let server = MockServer::start().await;
    let media_url = format!("{}/media/stalled.jpg", server.uri());
    Mock::given(method("GET"))
        .and(path("/media/stalled.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(3600))
                .set_body_string("never"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/relay"))
        .and(query_param("url", media_url.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string("relayed"))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(300),
        direct_attempts: 2,
        ..fast_settings(vec![format!("{}/relay?url=", server.uri())])
    };
    let fetcher = MediaFetcher::with_strategies(
        &settings,
        vec![
            Box::new(DirectStrategy::new(&settings)),
            Box::new(RelayStrategy::new(&settings)),
        ],
    )
    .unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(10), fetcher.fetch(&media_url))
        .await
        .expect("request timeout bounds the direct attempts");
    let payload = outcome.into_payload().expect("relay payload");
    assert_eq!(payload.via, StrategyKind::Relay);
    assert_eq!(&payload.bytes[..], b"relayed");
}
