//! End-to-end query sessions against the in-memory backend.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use tweet_harvest::{
    ExtractError, HarvestError, HarvestSettings, Harvester, MemoryFactory, MemoryFeed, Query,
    Termination,
};

// ── helpers ──

fn post(n: usize) -> String {
    format!(
        r#"<div class="tweet">
             <a class="account-group" href="https://twitter.com/user{n}" data-user-id="{n}">
               <strong class="fullname">User {n}</strong>
             </a>
             <a class="tweet-timestamp" title="10:0{d} AM - 1 Jan 2019">1 Jan</a>
             <p class="tweet-text">post {n} <a class="twitter-hashtag">#Python</a></p>
             <div class="ProfileTweet-action--reply"><span class="ProfileTweet-actionCountForPresentation">{n}</span></div>
             <div class="ProfileTweet-action--retweet"><span class="ProfileTweet-actionCountForPresentation">1.{d}K</span></div>
             <div class="ProfileTweet-action--favorite"><span class="ProfileTweet-actionCountForPresentation">2.{d}M</span></div>
           </div>"#,
        d = n % 10
    )
}

/// A post without its account block.
fn broken_post(n: usize) -> String {
    post(n).replace("account-group", "somewhere-else")
}

fn harvester(factory: &MemoryFactory) -> Harvester {
    Harvester::new(Arc::new(factory.clone()), &HarvestSettings::immediate())
}

// ── tests ──

#[tokio::test]
async fn test_returns_exactly_limit_records_in_order() {
    let factory = MemoryFactory::new(MemoryFeed::new((0..40).map(post).collect()).paged(10, 10));
    let query = Query::hashtag("Python", 30).unwrap();

    let harvest = harvester(&factory)
        .run(&query, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(harvest.records.len(), 30);
    assert_eq!(harvest.termination, Termination::LimitReached);
    assert_eq!(harvest.skipped, 0);
    let handles: Vec<_> = harvest.records.iter().map(|r| r.account.handle.as_str()).collect();
    assert_eq!(handles[0], "/user0");
    assert_eq!(handles[29], "/user29");
}

#[tokio::test]
async fn test_badges_kept_verbatim() {
    let factory = MemoryFactory::new(MemoryFeed::new(vec![post(3)]));
    let query = Query::user("user3", 1).unwrap();

    let harvest = harvester(&factory)
        .run(&query, &CancellationToken::new())
        .await
        .unwrap();

    let record = &harvest.records[0];
    assert_eq!(record.reply_count, "3");
    assert_eq!(record.repost_count, "1.3K");
    assert_eq!(record.like_count, "2.3M");
    assert_eq!(record.posted_at, "10:03 AM - 1 Jan 2019");
    assert_eq!(record.tags, vec!["#Python"]);
}

#[tokio::test]
async fn test_stalled_feed_returns_fewer_than_limit() {
    let factory = MemoryFactory::new(MemoryFeed::new((0..3).map(post).collect()).paged(1, 1));
    let query = Query::hashtag("Python", 30).unwrap();

    let harvest = harvester(&factory)
        .run(&query, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(harvest.records.len(), 3);
    assert!(matches!(harvest.termination, Termination::FeedExhausted { .. }));
}

#[tokio::test]
async fn test_query_urls_reach_the_session() {
    let factory = MemoryFactory::new(MemoryFeed::new(vec![post(1)]));
    let h = harvester(&factory);
    let cancel = CancellationToken::new();

    h.run(&Query::hashtag("Python", 1).unwrap(), &cancel).await.unwrap();
    assert_eq!(
        factory.stats().last_url().as_deref(),
        Some("https://twitter.com/search?q=%23Python")
    );

    h.run(&Query::user("Python", 1).unwrap(), &cancel).await.unwrap();
    assert_eq!(
        factory.stats().last_url().as_deref(),
        Some("https://twitter.com/search?q=from%3APython")
    );
}

#[tokio::test]
async fn test_incomplete_items_are_dropped() {
    let items = vec![post(0), broken_post(1), post(2)];
    let factory = MemoryFactory::new(MemoryFeed::new(items));
    let query = Query::hashtag("Python", 3).unwrap();

    let harvest = harvester(&factory)
        .run(&query, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(harvest.records.len(), 2);
    assert_eq!(harvest.skipped, 1);
    assert_eq!(harvest.records[0].account.handle, "/user0");
    assert_eq!(harvest.records[1].account.handle, "/user2");
}

#[tokio::test]
async fn test_every_item_failing_reports_failures() {
    let items = vec![broken_post(0), broken_post(1)];
    let factory = MemoryFactory::new(MemoryFeed::new(items));
    let query = Query::hashtag("Python", 2).unwrap();

    let err = harvester(&factory)
        .run(&query, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        HarvestError::NoRecordExtracted { failures } => {
            assert_eq!(failures.len(), 2);
            assert_eq!(failures[0], ExtractError::IncompleteRecord { field: "account" });
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(factory.stats().closed(), 1);
}

#[tokio::test]
async fn test_session_released_on_navigation_failure() {
    let factory = MemoryFactory::new(MemoryFeed::new(vec![post(0)])).failing_navigation("offline");
    let query = Query::hashtag("Python", 1).unwrap();

    let err = harvester(&factory)
        .run(&query, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::Navigation { .. }));
    assert_eq!(factory.stats().opened(), 1);
    assert_eq!(factory.stats().closed(), 1);
}

#[tokio::test]
async fn test_acquisition_failure_is_fatal() {
    let factory = MemoryFactory::unavailable("chromium crashed");
    let query = Query::hashtag("Python", 1).unwrap();

    let err = harvester(&factory)
        .run(&query, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, HarvestError::SessionAcquisition(_)));
}

#[tokio::test]
async fn test_cancelled_run_still_releases_session() {
    let factory = MemoryFactory::new(MemoryFeed::new(vec![post(0)]));
    let query = Query::hashtag("Python", 1).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = harvester(&factory).run(&query, &cancel).await.unwrap_err();

    assert!(matches!(err, HarvestError::Cancelled));
    assert_eq!(factory.stats().closed(), 1);
}

#[tokio::test]
async fn test_concurrent_runs_use_separate_sessions() {
    let factory = MemoryFactory::new(MemoryFeed::new((0..10).map(post).collect()).paged(2, 2));
    let h = harvester(&factory);

    let mut tasks = Vec::new();
    for limit in 1..=6 {
        let h = h.clone();
        tasks.push(tokio::spawn(async move {
            let query = Query::hashtag("Python", limit).unwrap();
            h.run(&query, &CancellationToken::new()).await
        }));
    }

    for (i, task) in tasks.into_iter().enumerate() {
        let harvest = task.await.unwrap().unwrap();
        assert_eq!(harvest.records.len(), i + 1);
    }

    let stats = factory.stats();
    assert_eq!(stats.opened(), 6);
    assert_eq!(stats.closed(), 6);
}
