//! HTTP API tests against the in-memory browser backend.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use tweet_harvest::{HarvestSettings, Harvester, MemoryFactory, MemoryFeed};
use tweet_harvest_server::http::{router, AppState, SKIPPED_HEADER, TERMINATION_HEADER};

// ─────────────────────── helpers ───────────────────────

fn post(n: usize) -> String {
    format!(
        r#"<div class="tweet">
             <a class="account-group" href="/user{n}" data-user-id="{n}">
               <strong class="fullname">User {n}</strong>
             </a>
             <a class="tweet-timestamp" title="9:15 PM - 3 Mar 2019">3 Mar</a>
             <p class="tweet-text">body {n}</p>
             <div class="ProfileTweet-action--reply"><span class="ProfileTweet-actionCountForPresentation">0</span></div>
             <div class="ProfileTweet-action--retweet"><span class="ProfileTweet-actionCountForPresentation">4</span></div>
             <div class="ProfileTweet-action--favorite"><span class="ProfileTweet-actionCountForPresentation">15</span></div>
           </div>"#
    )
}

fn app(factory: &MemoryFactory) -> Router {
    let harvester = Harvester::new(Arc::new(factory.clone()), &HarvestSettings::immediate());
    router(Arc::new(AppState::new(harvester)))
}

fn big_feed() -> MemoryFactory {
    MemoryFactory::new(MemoryFeed::new((0..50).map(post).collect()).paged(20, 20))
}

async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, serde_json::from_slice(&bytes).unwrap())
}

fn len(body: &Value) -> usize {
    body.as_array().expect("array body").len()
}

// ─────────────────────── tests ───────────────────────

#[tokio::test]
async fn test_hashtags_default_limit() {
    let (status, headers, body) = get(app(&big_feed()), "/hashtags/Python").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(len(&body), 30);
    assert_eq!(headers[TERMINATION_HEADER], "limit_reached");
    assert_eq!(headers[SKIPPED_HEADER], "0");
}

#[tokio::test]
async fn test_record_wire_format() {
    let (_, _, body) = get(app(&big_feed()), "/hashtags/Python?limit=1").await;

    let record = &body[0];
    assert_eq!(record["account"]["fullname"], "User 0");
    assert_eq!(record["account"]["href"], "/user0");
    assert_eq!(record["account"]["id"], "0");
    assert_eq!(record["date"], "9:15 PM - 3 Mar 2019");
    assert_eq!(record["hashtags"], serde_json::json!([]));
    assert_eq!(record["likes"], "15");
    assert_eq!(record["replies"], "0");
    assert_eq!(record["retweets"], "4");
    assert_eq!(record["text"], "body 0");
}

#[tokio::test]
async fn test_explicit_limit() {
    let (status, _, body) = get(app(&big_feed()), "/users/Python?limit=5").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(len(&body), 5);
}

#[tokio::test]
async fn test_bad_limit_falls_back_to_default() {
    for uri in ["/hashtags/Python?limit=abc", "/hashtags/Python?limit=0", "/users/x?limit=-4"] {
        let (status, _, body) = get(app(&big_feed()), uri).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(len(&body), 30, "{uri}");
    }
}

#[tokio::test]
async fn test_short_feed_reports_exhaustion() {
    let factory = MemoryFactory::new(MemoryFeed::new((0..3).map(post).collect()));
    let (status, headers, body) = get(app(&factory), "/hashtags/Python").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(len(&body), 3);
    assert_eq!(headers[TERMINATION_HEADER], "feed_exhausted");
}

#[tokio::test]
async fn test_users_route_queries_author() {
    let factory = big_feed();
    get(app(&factory), "/users/Python?limit=1").await;

    assert_eq!(
        factory.stats().last_url().as_deref(),
        Some("https://twitter.com/search?q=from%3APython")
    );
    assert_eq!(factory.stats().closed(), 1);
}

#[tokio::test]
async fn test_unavailable_browser_is_503() {
    let factory = MemoryFactory::unavailable("no chromium");
    let (status, _, body) = get(app(&factory), "/hashtags/Python").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "E_SESSION_ACQUISITION");
}

#[tokio::test]
async fn test_unreadable_feed_is_502() {
    let broken = (0..3).map(|n| post(n).replace("tweet-timestamp", "elsewhere")).collect();
    let factory = MemoryFactory::new(MemoryFeed::new(broken));
    let (status, _, body) = get(app(&factory), "/hashtags/Python").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "E_NO_RECORD_EXTRACTED");
    assert_eq!(factory.stats().closed(), 1);
}

#[tokio::test]
async fn test_navigation_failure_is_502() {
    let factory = big_feed().failing_navigation("net::ERR_NAME_NOT_RESOLVED");
    let (status, _, body) = get(app(&factory), "/users/Python").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"]["code"], "E_NAVIGATION");
}

#[tokio::test]
async fn test_health() {
    let (status, _, body) = get(app(&big_feed()), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_client_disconnect_cancels_run() {
    let factory =
        MemoryFactory::new(MemoryFeed::new((0..200).map(post).collect()).paged(1, 1));
    let settings = HarvestSettings {
        settle: Duration::from_millis(50),
        ..HarvestSettings::immediate()
    };
    let harvester = Harvester::new(Arc::new(factory.clone()), &settings);
    let app = router(Arc::new(AppState::new(harvester)));

    let request = Request::builder()
        .uri("/hashtags/Python?limit=90")
        .body(Body::empty())
        .unwrap();
    let outcome = tokio::time::timeout(Duration::from_millis(200), app.oneshot(request)).await;
    assert!(outcome.is_err(), "request should still be in flight");

    let stats = factory.stats();
    for _ in 0..100 {
        if stats.closed() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(stats.opened(), 1);
    assert_eq!(stats.closed(), 1);

    let loads = stats.loads();
    assert!(loads < 20, "run kept scrolling after disconnect: {loads} loads");
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(stats.loads(), loads);
}
