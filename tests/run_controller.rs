// tests/run_controller.rs
//
// End-to-end runs of the controller against in-process fakes: no network.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use feed_summarizer::content::{ArticleContent, ContentKind, ContentResolver, SkipDomains};
use feed_summarizer::cursor::{
    self, CursorLocation, MemoryObjectStore, ObjectStore, StoreError, DEFAULT_BUCKET,
    DEFAULT_OBJECT_KEY,
};
use feed_summarizer::feed::{Feed, FeedEntry, FeedSource, StaticFeedSource};
use feed_summarizer::notify::{Message, Notifier, WebhookResponse};
use feed_summarizer::summarize::{
    Completion, CompletionProvider, ProviderError, RetryPolicy, Summarizer,
};
use feed_summarizer::{Collaborators, RunController, RunSettings, SelectionMode};

fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn entry(title: &str, link: &str, published: &str) -> FeedEntry {
    FeedEntry {
        title: title.to_string(),
        link: link.to_string(),
        description: format!("comment on {title}"),
        published_at: ts(published),
    }
}

// ------------------------------------------------------------
// Fakes
// ------------------------------------------------------------

struct FakeFeed {
    entries: Vec<FeedEntry>,
    fail: bool,
    calls: Mutex<usize>,
}

impl FakeFeed {
    fn new(entries: Vec<FeedEntry>) -> Arc<Self> {
        Arc::new(Self {
            entries,
            fail: false,
            calls: Mutex::new(0),
        })
    }
    fn failing() -> Arc<Self> {
        Arc::new(Self {
            entries: vec![],
            fail: true,
            calls: Mutex::new(0),
        })
    }
    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl FeedSource for FakeFeed {
    async fn fetch(&self) -> Result<Feed> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(anyhow!("connection reset"));
        }
        Ok(Feed {
            title: Some("fake".into()),
            entries: self.entries.clone(),
        })
    }
    fn describe(&self) -> String {
        "fake".into()
    }
}

#[derive(Default)]
struct FakeResolver {
    fail_for: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeResolver {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentResolver for FakeResolver {
    async fn resolve(&self, url: &str) -> Result<ArticleContent> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.fail_for.iter().any(|u| u == url) {
            return Err(anyhow!("article non-2xx: 404"));
        }
        Ok(ArticleContent {
            text: format!("body of {url}"),
            image_url: Some(format!("{url}/cover.png")),
            kind: ContentKind::Html,
        })
    }
}

struct FakeProvider {
    fail: bool,
    calls: Mutex<usize>,
}

impl FakeProvider {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            calls: Mutex::new(0),
        })
    }
    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl CompletionProvider for FakeProvider {
    async fn complete(&self, title: &str, _text: &str) -> Result<Completion, ProviderError> {
        *self.calls.lock().unwrap() += 1;
        if self.fail {
            return Err(anyhow!("upstream 500").into());
        }
        Ok(Completion {
            choices: vec![format!("- about {title}")],
        })
    }
    fn name(&self) -> &'static str {
        "fake"
    }
}

struct FakeNotifier {
    fail: bool,
    sent: Mutex<Vec<Message>>,
}

impl FakeNotifier {
    fn new(fail: bool) -> Arc<Self> {
        Arc::new(Self {
            fail,
            sent: Mutex::new(vec![]),
        })
    }
    fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn send(&self, msg: &Message) -> Result<WebhookResponse> {
        if self.fail {
            return Err(anyhow!("webhook timed out"));
        }
        self.sent.lock().unwrap().push(msg.clone());
        Ok(WebhookResponse { status: 200 })
    }
    fn name(&self) -> &'static str {
        "fake"
    }
}

struct DeniedStore;

#[async_trait]
impl ObjectStore for DeniedStore {
    async fn get_object(&self, _b: &str, _k: &str) -> Result<Vec<u8>, StoreError> {
        Err(StoreError::Other("AccessDenied".into()))
    }
    async fn put_object(&self, _b: &str, _k: &str, _body: Vec<u8>) -> Result<(), StoreError> {
        Err(StoreError::Other("AccessDenied".into()))
    }
}

// ------------------------------------------------------------
// Harness
// ------------------------------------------------------------

struct Harness {
    store: Arc<MemoryObjectStore>,
    resolver: Arc<FakeResolver>,
    provider: Arc<FakeProvider>,
    notifier: Arc<FakeNotifier>,
    controller: RunController,
}

fn harness_with(
    feed: Arc<dyn FeedSource>,
    mode: SelectionMode,
    resolver: FakeResolver,
    provider_fails: bool,
    notifier_fails: bool,
) -> Harness {
    let store = Arc::new(MemoryObjectStore::new());
    let resolver = Arc::new(resolver);
    let provider = FakeProvider::new(provider_fails);
    let notifier = FakeNotifier::new(notifier_fails);
    let controller = RunController::new(
        Collaborators {
            store: store.clone(),
            feed,
            resolver: resolver.clone(),
            summarizer: Summarizer::new(
                provider.clone(),
                RetryPolicy {
                    max_attempts: 2,
                    ..RetryPolicy::default()
                },
            ),
            notifier: notifier.clone(),
        },
        RunSettings {
            mode,
            cursor: CursorLocation::default(),
            skip_domains: SkipDomains::default(),
        },
    );
    Harness {
        store,
        resolver,
        provider,
        notifier,
        controller,
    }
}

fn harness(feed: Arc<dyn FeedSource>, mode: SelectionMode) -> Harness {
    harness_with(feed, mode, FakeResolver::default(), false, false)
}

impl Harness {
    async fn set_cursor(&self, s: &str) {
        cursor::write_cursor(self.store.as_ref(), &CursorLocation::default(), ts(s))
            .await
            .unwrap();
    }

    async fn cursor(&self) -> DateTime<Utc> {
        cursor::read_cursor(self.store.as_ref(), &CursorLocation::default())
            .await
            .unwrap()
    }
}

// ------------------------------------------------------------
// Tests
// ------------------------------------------------------------

#[tokio::test]
async fn batch_notifies_only_entries_newer_than_cursor() {
    let feed = FakeFeed::new(vec![
        entry("Old Article", "https://example.com/old", "2021-09-01T10:00:00Z"),
        entry("New Article", "https://example.com/new", "2021-09-15T12:00:00Z"),
    ]);
    let h = harness(feed, SelectionMode::Batch);
    h.set_cursor("2021-09-10T12:00:00Z").await;

    let now = ts("2021-09-20T00:00:00Z");
    let res = h.controller.run_at(now).await.unwrap();

    assert_eq!(res.selected, 1);
    assert_eq!(res.notified, 1);
    assert_eq!(h.resolver.calls(), vec!["https://example.com/new".to_string()]);
    assert_eq!(
        h.notifier.sent(),
        vec![Message::Article {
            title: "New Article".into(),
            link: "https://example.com/new".into(),
            image_url: Some("https://example.com/new/cover.png".into()),
            comment: "comment on New Article".into(),
            summary: "- about New Article".into(),
        }]
    );
    assert_eq!(h.cursor().await, now);
    assert_eq!(res.cursor_after, now);
    assert_eq!(res.to_invocation_response().body, "Processed 1 entries.");
}

#[tokio::test]
async fn missing_cursor_processes_whole_feed() {
    let feed = FakeFeed::new(vec![entry(
        "Only",
        "https://example.com/only",
        "2024-01-01T00:00:00Z",
    )]);
    let h = harness(feed, SelectionMode::Batch);

    let res = h.controller.run_at(ts("2024-02-01T00:00:00Z")).await.unwrap();
    assert_eq!(res.cursor_before, DateTime::<Utc>::MIN_UTC);
    assert_eq!(res.notified, 1);
}

#[tokio::test]
async fn skip_domain_links_never_fetch_or_summarize() {
    let feed = FakeFeed::new(vec![
        entry("A post", "https://x.com/someone/status/1", "2024-05-14T09:00:00Z"),
        entry("Another", "https://mobile.twitter.com/a/status/2", "2024-05-13T09:00:00Z"),
    ]);
    let h = harness(feed, SelectionMode::Batch);

    let res = h.controller.run_at(ts("2024-05-15T00:00:00Z")).await.unwrap();

    assert!(h.resolver.calls().is_empty());
    assert_eq!(h.provider.calls(), 0);
    assert_eq!(res.reference_only, 2);
    assert_eq!(
        h.notifier.sent(),
        vec![
            Message::Reference {
                url: "https://x.com/someone/status/1".into()
            },
            Message::Reference {
                url: "https://mobile.twitter.com/a/status/2".into()
            },
        ]
    );
}

#[tokio::test]
async fn single_mode_drains_backlog_one_entry_per_run() {
    let feed = FakeFeed::new(vec![
        entry("Third", "https://example.com/3", "2024-03-03T00:00:00Z"),
        entry("Second", "https://example.com/2", "2024-03-02T00:00:00Z"),
        entry("First", "https://example.com/1", "2024-03-01T00:00:00Z"),
    ]);
    let h = harness(feed, SelectionMode::Single);
    let now = ts("2024-04-01T00:00:00Z");

    for (i, expected) in ["First", "Second", "Third"].iter().enumerate() {
        let res = h.controller.run_at(now).await.unwrap();
        assert_eq!(res.notified, 1, "run {i}");
        let sent = h.notifier.sent();
        match &sent[i] {
            Message::Article { title, .. } => assert_eq!(title, expected),
            other => panic!("unexpected message {other:?}"),
        }
        // cursor tracks the entry, not the clock
        assert_eq!(h.cursor().await, res.cursor_after);
        assert_ne!(res.cursor_after, now);
    }

    let res = h.controller.run_at(now).await.unwrap();
    assert_eq!(res.selected, 0);
    assert_eq!(res.body(), "No new entries.");
    assert_eq!(h.cursor().await, ts("2024-03-03T00:00:00Z"));
}

#[tokio::test]
async fn no_new_entries_leaves_stored_cursor_untouched() {
    let feed = FakeFeed::new(vec![entry(
        "Seen",
        "https://example.com/seen",
        "2024-03-01T00:00:00Z",
    )]);
    let h = harness(feed, SelectionMode::Batch);
    h.set_cursor("2024-03-01T00:00:00Z").await;
    let before = h.store.get_raw(DEFAULT_BUCKET, DEFAULT_OBJECT_KEY).unwrap();

    let res = h.controller.run_at(ts("2024-03-02T00:00:00Z")).await.unwrap();

    assert_eq!(res.selected, 0);
    assert!(h.notifier.sent().is_empty());
    assert_eq!(h.store.get_raw(DEFAULT_BUCKET, DEFAULT_OBJECT_KEY).unwrap(), before);
}

#[tokio::test]
async fn empty_feed_writes_nothing() {
    let h = harness(FakeFeed::new(vec![]), SelectionMode::Batch);
    let res = h.controller.run().await.unwrap();
    assert_eq!(res.selected, 0);
    assert!(h.store.get_raw(DEFAULT_BUCKET, DEFAULT_OBJECT_KEY).is_none());
}

#[tokio::test]
async fn rerun_with_same_feed_is_idempotent() {
    let feed = FakeFeed::new(vec![
        entry("B", "https://example.com/b", "2024-03-02T00:00:00Z"),
        entry("A", "https://example.com/a", "2024-03-01T00:00:00Z"),
    ]);
    let h = harness(feed, SelectionMode::Batch);

    let first = h.controller.run_at(ts("2024-03-05T00:00:00Z")).await.unwrap();
    let second = h.controller.run_at(ts("2024-03-06T00:00:00Z")).await.unwrap();

    assert_eq!(first.notified, 2);
    assert_eq!(second.notified, 0);
    assert_eq!(h.notifier.sent().len(), 2);
}

#[tokio::test]
async fn feed_failure_aborts_without_touching_cursor() {
    let h = harness(FakeFeed::failing(), SelectionMode::Batch);
    h.set_cursor("2024-03-01T00:00:00Z").await;

    let err = h.controller.run().await.unwrap_err();
    assert!(format!("{err:#}").contains("connection reset"));
    assert_eq!(h.cursor().await, ts("2024-03-01T00:00:00Z"));
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn store_failure_aborts_before_fetching_feed() {
    let feed = FakeFeed::new(vec![entry("A", "https://example.com/a", "2024-03-01T00:00:00Z")]);
    let notifier = FakeNotifier::new(false);
    let controller = RunController::new(
        Collaborators {
            store: Arc::new(DeniedStore),
            feed: feed.clone(),
            resolver: Arc::new(FakeResolver::default()),
            summarizer: Summarizer::new(FakeProvider::new(false), RetryPolicy::default()),
            notifier: notifier.clone(),
        },
        RunSettings::default(),
    );

    let err = controller.run().await.unwrap_err();
    assert!(format!("{err:#}").contains("AccessDenied"));
    assert_eq!(feed.calls(), 0);
    assert!(notifier.sent().is_empty());
}

#[tokio::test]
async fn content_failure_drops_only_that_entry() {
    let feed = FakeFeed::new(vec![
        entry("Broken", "https://example.com/broken", "2024-03-02T00:00:00Z"),
        entry("Fine", "https://example.com/fine", "2024-03-01T00:00:00Z"),
    ]);
    let resolver = FakeResolver {
        fail_for: vec!["https://example.com/broken".into()],
        ..FakeResolver::default()
    };
    let h = harness_with(feed, SelectionMode::Batch, resolver, false, false);
    let now = ts("2024-03-05T00:00:00Z");

    let res = h.controller.run_at(now).await.unwrap();

    assert_eq!(res.selected, 2);
    assert_eq!(res.notified, 1);
    assert_eq!(res.failed, 1);
    assert_eq!(h.notifier.sent()[0].link(), "https://example.com/fine");
    assert_eq!(h.cursor().await, now);
    assert_eq!(res.body(), "Processed 1 entries. 1 failed.");
}

#[tokio::test]
async fn degraded_summarizer_still_notifies_with_empty_summary() {
    let feed = FakeFeed::new(vec![entry("A", "https://example.com/a", "2024-03-01T00:00:00Z")]);
    let h = harness_with(feed, SelectionMode::Batch, FakeResolver::default(), true, false);

    let res = h.controller.run_at(ts("2024-03-05T00:00:00Z")).await.unwrap();

    assert_eq!(res.notified, 1);
    assert_eq!(h.provider.calls(), 2, "bounded by max_attempts");
    match &h.notifier.sent()[0] {
        Message::Article { summary, .. } => assert!(summary.is_empty()),
        other => panic!("unexpected message {other:?}"),
    }
}

#[tokio::test]
async fn webhook_failure_aborts_without_advancing_cursor() {
    let feed = FakeFeed::new(vec![entry("A", "https://example.com/a", "2024-03-02T00:00:00Z")]);
    let h = harness_with(feed, SelectionMode::Batch, FakeResolver::default(), false, true);
    h.set_cursor("2024-03-01T00:00:00Z").await;

    let err = h.controller.run().await.unwrap_err();
    assert!(format!("{err:#}").contains("webhook timed out"));
    assert_eq!(h.cursor().await, ts("2024-03-01T00:00:00Z"));
}

#[tokio::test]
async fn saved_feed_with_mixed_links() {
    let feed = Arc::new(StaticFeedSource::new(
        include_str!("fixtures/mixed_links_rss2.xml").as_bytes().to_vec(),
    ));
    let h = harness(feed, SelectionMode::Batch);
    h.set_cursor("2024-05-05T00:00:00Z").await;

    let res = h.controller.run_at(ts("2024-05-20T00:00:00Z")).await.unwrap();

    assert_eq!(res.selected, 2);
    assert_eq!(res.reference_only, 1);
    let sent = h.notifier.sent();
    assert!(sent[0].is_reference());
    assert_eq!(sent[1].link(), "https://blog.example.org/rust-2024");
    assert_eq!(h.resolver.calls(), vec!["https://blog.example.org/rust-2024".to_string()]);
}

/// Publishes its single entry at the moment of the first fetch, i.e. after the
/// run already started.
#[derive(Default)]
struct JustPublishedFeed {
    published: Mutex<Option<DateTime<Utc>>>,
}

#[async_trait]
impl FeedSource for JustPublishedFeed {
    async fn fetch(&self) -> Result<Feed> {
        let published = *self.published.lock().unwrap().get_or_insert_with(Utc::now);
        Ok(Feed {
            title: Some("live".into()),
            entries: vec![FeedEntry {
                title: "Fresh".into(),
                link: "https://example.com/fresh".into(),
                description: String::new(),
                published_at: published,
            }],
        })
    }
    fn describe(&self) -> String {
        "live".into()
    }
}

#[tokio::test]
async fn batch_entry_published_mid_run_is_notified_once() {
    let h = harness(Arc::new(JustPublishedFeed::default()), SelectionMode::Batch);

    let first = h.controller.run().await.unwrap();
    let second = h.controller.run().await.unwrap();

    assert_eq!(first.notified, 1);
    assert_eq!(second.selected, 0);
    assert_eq!(h.notifier.sent().len(), 1);
}

#[tokio::test]
async fn batch_clock_is_read_after_notifications() {
    let feed = FakeFeed::new(vec![entry("A", "https://example.com/a", "2024-03-01T00:00:00Z")]);
    let h = harness(feed, SelectionMode::Batch);
    let notifier = h.notifier.clone();

    let res = h
        .controller
        .run_with_clock(|| {
            // the cursor value must be taken once everything was posted
            assert_eq!(notifier.sent().len(), 1);
            ts("2024-03-05T00:00:00Z")
        })
        .await
        .unwrap();

    assert_eq!(res.cursor_after, ts("2024-03-05T00:00:00Z"));
}

struct RejectingNotifier;

#[async_trait]
impl Notifier for RejectingNotifier {
    async fn send(&self, _msg: &Message) -> Result<WebhookResponse> {
        Ok(WebhookResponse { status: 410 })
    }
    fn name(&self) -> &'static str {
        "rejecting"
    }
}

#[tokio::test]
async fn non_2xx_webhook_is_counted_and_run_completes() {
    let store = Arc::new(MemoryObjectStore::new());
    let controller = RunController::new(
        Collaborators {
            store: store.clone(),
            feed: FakeFeed::new(vec![entry("A", "https://x.com/a/status/1", "2024-03-02T00:00:00Z")]),
            resolver: Arc::new(FakeResolver::default()),
            summarizer: Summarizer::new(FakeProvider::new(false), RetryPolicy::default()),
            notifier: Arc::new(RejectingNotifier),
        },
        RunSettings::default(),
    );

    let now = ts("2024-03-05T00:00:00Z");
    let res = controller.run_at(now).await.unwrap();

    assert_eq!(res.notified, 1);
    assert_eq!(res.non_2xx, 1);
    assert_eq!(res.cursor_after, now);
}
