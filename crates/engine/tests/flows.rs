use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use suggest_cache::ManualClock;
use suggest_engine::{
    EngineConfig, EngineError, Selection, SuggestionClient, SuggestionEngine, SuggestionRequest,
    TransportError,
};
use suggest_lifecycle::{CancellationToken, RequestState};
use suggest_protocol::{Anchor, LockedSpan, RawSpan, SpanPayload, SuggestionsPayload};
use suggest_spans::Taxonomy;

const PROMPT: &str = "A cowboy in a leather jacket rides at dusk";

struct FakeClient {
    latency: Duration,
    suggestions: Mutex<Vec<String>>,
    spans: Mutex<Vec<RawSpan>>,
    failure: Mutex<Option<TransportError>>,
    suggestion_calls: AtomicUsize,
    span_calls: AtomicUsize,
    last_request: Mutex<Option<SuggestionRequest>>,
}

impl FakeClient {
    fn new(suggestions: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            latency: Duration::from_millis(50),
            suggestions: Mutex::new(suggestions.iter().map(ToString::to_string).collect()),
            spans: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            suggestion_calls: AtomicUsize::new(0),
            span_calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    fn suggestion_calls(&self) -> usize {
        self.suggestion_calls.load(Ordering::SeqCst)
    }

    async fn wait(&self, token: &CancellationToken) -> Result<(), TransportError> {
        tokio::select! {
            () = token.cancelled() => Err(TransportError::Aborted),
            () = tokio::time::sleep(self.latency) => Ok(()),
        }
    }
}

#[async_trait]
impl SuggestionClient for FakeClient {
    async fn fetch_suggestions(
        &self,
        request: SuggestionRequest,
        token: CancellationToken,
    ) -> Result<SuggestionsPayload, TransportError> {
        self.suggestion_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
        self.wait(&token).await?;
        let failure = self.failure.lock().unwrap().clone();
        if let Some(err) = failure {
            return Err(err);
        }
        let suggestions = self.suggestions.lock().unwrap().clone();
        Ok(SuggestionsPayload { suggestions })
    }

    async fn fetch_spans(
        &self,
        _text: String,
        token: CancellationToken,
    ) -> Result<SpanPayload, TransportError> {
        self.span_calls.fetch_add(1, Ordering::SeqCst);
        self.wait(&token).await?;
        let spans = self.spans.lock().unwrap().clone();
        Ok(SpanPayload { spans })
    }
}

fn taxonomy() -> Arc<Taxonomy> {
    Arc::new(
        Taxonomy::new(
            ["subject", "subject.wardrobe", "lighting"],
            [("Wardrobe", "subject.wardrobe"), ("Lighting", "lighting")],
            "subject",
        )
        .unwrap(),
    )
}

fn engine(client: Arc<FakeClient>) -> (SuggestionEngine, ManualClock) {
    let clock = ManualClock::new(1_000);
    let engine = SuggestionEngine::with_clock(
        EngineConfig::default(),
        taxonomy(),
        client,
        Arc::new(clock.clone()),
    )
    .unwrap();
    (engine, clock)
}

fn cowboy() -> Selection {
    Selection::new(PROMPT, 2, 8)
}

#[tokio::test(start_paused = true)]
async fn suggestions_are_cached_by_fingerprint() {
    let client = FakeClient::new(&["rancher", " drifter "]);
    let (engine, _clock) = engine(client.clone());

    let first = engine.request_suggestions(&cowboy(), false).await.unwrap();
    assert_eq!(first.suggestions, vec!["rancher".to_string(), "drifter".to_string()]);
    assert!(!first.from_cache);
    assert_eq!(first.anchor.quote, "cowboy");
    assert_eq!(first.anchor.prefer_index, Some(2));

    let request = client.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.left_ctx, "A ");
    assert_eq!(request.full_text, PROMPT);

    let second = engine.request_suggestions(&cowboy(), false).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.fingerprint, first.fingerprint);
    assert_eq!(client.suggestion_calls(), 1);

    let refreshed = engine.request_suggestions(&cowboy(), true).await.unwrap();
    assert!(!refreshed.from_cache);
    assert_eq!(client.suggestion_calls(), 2);
    assert_eq!(engine.cache_stats().suggestions.hits, 1);
}

#[tokio::test(start_paused = true)]
async fn empty_results_are_not_cached() {
    let client = FakeClient::new(&["  "]);
    let (engine, _clock) = engine(client.clone());

    let first = engine.request_suggestions(&cowboy(), false).await.unwrap();
    assert!(first.suggestions.is_empty());
    let second = engine.request_suggestions(&cowboy(), false).await.unwrap();
    assert!(!second.from_cache);
    assert_eq!(client.suggestion_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn newer_selection_cancels_the_older_request() {
    let client = FakeClient::new(&["rancher"]);
    let (engine, _clock) = engine(client.clone());
    let cowboy = cowboy();
    let jacket = Selection::new(PROMPT, 14, 28);

    let (older, newer) = tokio::join!(
        engine.request_suggestions(&cowboy, false),
        engine.request_suggestions(&jacket, false),
    );

    assert!(older.unwrap_err().is_cancelled());
    assert_eq!(newer.unwrap().anchor.quote, "leather jacket");
    assert_eq!(client.suggestion_calls(), 1);
    assert_eq!(engine.request_state().state, RequestState::Idle);
}

#[tokio::test(start_paused = true)]
async fn cancel_aborts_the_network_call() {
    let client = FakeClient::new(&["rancher"]);
    let (engine, _clock) = engine(client.clone());

    let cowboy = cowboy();

    let (result, ()) = tokio::join!(engine.request_suggestions(&cowboy, false), async {
        tokio::time::sleep(Duration::from_millis(320)).await;
        assert_eq!(engine.request_state().state, RequestState::InFlight);
        engine.cancel();
    });

    assert!(matches!(result, Err(EngineError::Cancelled)));
    assert_eq!(client.suggestion_calls(), 1);
    assert_eq!(engine.request_state().state, RequestState::Idle);
}

#[tokio::test(start_paused = true)]
async fn cache_hit_cancels_the_older_request() {
    let client = FakeClient::new(&["tan suede coat"]);
    let (engine, _clock) = engine(client.clone());
    let jacket = Selection::new(PROMPT, 14, 28);
    engine.request_suggestions(&jacket, false).await.unwrap();

    let cowboy = cowboy();
    let (older, newer) = tokio::join!(engine.request_suggestions(&cowboy, false), async {
        tokio::time::sleep(Duration::from_millis(320)).await;
        engine.request_suggestions(&jacket, false).await
    });

    assert!(older.unwrap_err().is_cancelled());
    assert!(newer.unwrap().from_cache);
    assert_eq!(client.suggestion_calls(), 2);
    assert_eq!(engine.request_state().state, RequestState::Idle);
}

#[tokio::test(start_paused = true)]
async fn transport_failures_surface() {
    let client = FakeClient::new(&["rancher"]);
    *client.failure.lock().unwrap() = Some(TransportError::Status {
        status: 503,
        message: "overloaded".to_string(),
    });
    let (engine, _clock) = engine(client);

    let err = engine.request_suggestions(&cowboy(), false).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Transport(TransportError::Status { status: 503, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn expired_entries_are_refetched() {
    let client = FakeClient::new(&["rancher"]);
    let (engine, clock) = engine(client.clone());

    engine.request_suggestions(&cowboy(), false).await.unwrap();
    clock.advance(Duration::from_millis(300_001));
    assert_eq!(engine.prune_caches(), 1);

    let again = engine.request_suggestions(&cowboy(), false).await.unwrap();
    assert!(!again.from_cache);
    assert_eq!(client.suggestion_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn empty_selection_is_rejected() {
    let (engine, _clock) = engine(FakeClient::new(&[]));
    let err = engine
        .request_suggestions(&Selection::new(PROMPT, 5, 5), false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::EmptySelection { start: 5, end: 5 }));
}

#[tokio::test(start_paused = true)]
async fn labels_are_normalized_and_cached_by_document() {
    let client = FakeClient::new(&[]);
    *client.spans.lock().unwrap() = vec![
        RawSpan::new("Wardrobe", 14.0, 21.0),
        RawSpan::new("Wardrobe", 22.0, 28.0),
        RawSpan::new("Mystery", 2.0, 8.0),
        RawSpan::new("Lighting", f64::NAN, 3.0),
    ];
    let (engine, _clock) = engine(client.clone());

    let labeled = engine.label_text(PROMPT).await.unwrap();
    assert!(!labeled.from_cache);
    let quotes: Vec<&str> = labeled.highlights.iter().map(|h| h.quote.as_str()).collect();
    assert_eq!(quotes, vec!["cowboy", "leather jacket"]);
    assert_eq!(labeled.highlights[0].category, "subject");
    assert_eq!(labeled.highlights[1].category, "subject.wardrobe");
    assert!(labeled.highlights[1].graphemes.is_some());

    let report = labeled.report.unwrap();
    assert_eq!(report.merged, 1);
    assert_eq!(report.dropped_total(), 1);
    assert_eq!(report.fallback_roles, vec!["Mystery".to_string()]);

    let cached = engine.label_text(PROMPT).await.unwrap();
    assert!(cached.from_cache);
    assert_eq!(cached.highlights, labeled.highlights);
    assert_eq!(client.span_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn apply_respects_locks() {
    let (engine, _clock) = engine(FakeClient::new(&[]));
    let lock = LockedSpan::capture("lock-jacket", PROMPT, 14, 28, 20).unwrap();

    let blocked = engine.apply_suggestion(
        PROMPT,
        "denim coat",
        &Anchor::new("leather").context("in a ", " jacket"),
        &[lock.clone()],
        Some("k1".to_string()),
    );
    assert_eq!(blocked.updated_prompt, None);
    assert_eq!(blocked.locked_by.as_deref(), Some("lock-jacket"));

    let applied = engine.apply_suggestion(
        PROMPT,
        "rancher",
        &Anchor::new("cowboy").context("A ", " in").prefer_index(2),
        &[lock],
        Some("k2".to_string()),
    );
    assert_eq!(
        applied.updated_prompt.as_deref(),
        Some("A rancher in a leather jacket rides at dusk")
    );
    assert_eq!(applied.idempotency_key.as_deref(), Some("k2"));
}

#[tokio::test(start_paused = true)]
async fn dispose_refuses_further_work() {
    let client = FakeClient::new(&["rancher"]);
    let (engine, _clock) = engine(client.clone());
    engine.request_suggestions(&cowboy(), false).await.unwrap();

    engine.dispose();
    let err = engine.request_suggestions(&cowboy(), true).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(client.suggestion_calls(), 1);
}
