use crate::client::{SuggestionClient, SuggestionRequest};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use log::{debug, info};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use suggest_anchor::AnchorResolver;
use suggest_cache::{document_hash, CacheStats, Clock, Fingerprint, ResultCache, SystemClock};
use suggest_lifecycle::{RequestLifecycleManager, RequestSnapshot};
use suggest_protocol::{Anchor, Highlight, LockedSpan, SuggestionApplication};
use suggest_spans::{GraphemeIndex, NormalizeReport, SpanNormalizer, Taxonomy};

/// A selection in the editor, in UTF-16 units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Selection {
    pub fn new(text: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            text: text.into(),
            start,
            end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionResult {
    pub suggestions: Vec<String>,
    /// Anchor to hand back when the user picks a suggestion
    pub anchor: Anchor,
    pub fingerprint: String,
    pub from_cache: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelResult {
    pub highlights: Vec<Highlight>,
    pub document_hash: String,
    pub from_cache: bool,
    /// Only present when the spans were normalized by this call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<NormalizeReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineCacheStats {
    pub suggestions: CacheStats,
    pub labels: CacheStats,
}

/// Orchestrates the request scheduler, both result caches, the span
/// normalizer and the anchor resolver around one [`SuggestionClient`].
///
/// Each engine owns its own scheduler slot and caches. Nothing is global.
pub struct SuggestionEngine {
    config: EngineConfig,
    client: Arc<dyn SuggestionClient>,
    lifecycle: RequestLifecycleManager,
    suggestions: Mutex<ResultCache<Vec<String>>>,
    labels: Mutex<ResultCache<Vec<Highlight>>>,
    taxonomy: Arc<Taxonomy>,
    normalizer: SpanNormalizer,
    resolver: AnchorResolver,
    fingerprint: Fingerprint,
}

impl SuggestionEngine {
    pub fn new(
        config: EngineConfig,
        taxonomy: Arc<Taxonomy>,
        client: Arc<dyn SuggestionClient>,
    ) -> Result<Self> {
        Self::with_clock(config, taxonomy, client, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: EngineConfig,
        taxonomy: Arc<Taxonomy>,
        client: Arc<dyn SuggestionClient>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate().map_err(EngineError::Config)?;
        Ok(Self {
            lifecycle: RequestLifecycleManager::new(config.lifecycle()),
            suggestions: Mutex::new(ResultCache::with_clock(config.cache(), clock.clone())),
            labels: Mutex::new(ResultCache::with_clock(config.cache(), clock)),
            normalizer: SpanNormalizer::new(config.normalizer()),
            resolver: AnchorResolver::new(config.resolver()),
            fingerprint: config.fingerprint(),
            taxonomy,
            client,
            config,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fetch rewrite suggestions for `selection`.
    ///
    /// Cached results are served unless `force_refresh` is set. Otherwise the
    /// fetch goes through the single request slot, keyed by the selection's
    /// fingerprint, and any earlier pending request is cancelled.
    pub async fn request_suggestions(
        &self,
        selection: &Selection,
        force_refresh: bool,
    ) -> Result<SuggestionResult> {
        let anchor = Anchor::capture(
            &selection.text,
            selection.start,
            selection.end,
            self.config.context_window,
        )
        .ok_or(EngineError::EmptySelection {
            start: selection.start,
            end: selection.end,
        })?;
        let fingerprint = self.fingerprint.for_anchor(&anchor, &selection.text);

        if force_refresh {
            debug!("suggestions for {fingerprint}: cache bypassed");
        } else if let Some(cached) = lock(&self.suggestions).get(&fingerprint).cloned() {
            debug!("suggestions for {fingerprint}: cache hit");
            // The cached answer is now the freshest; older work must not land after it.
            self.lifecycle.cancel_current_request();
            return Ok(SuggestionResult {
                suggestions: cached,
                anchor,
                fingerprint,
                from_cache: true,
            });
        }

        let client = self.client.clone();
        let request = SuggestionRequest {
            quote: anchor.quote.clone(),
            left_ctx: anchor.left_ctx.clone(),
            right_ctx: anchor.right_ctx.clone(),
            full_text: selection.text.clone(),
        };
        let payload = self
            .lifecycle
            .schedule_request(fingerprint.clone(), move |token| async move {
                client.fetch_suggestions(request, token).await
            })
            .await?;

        let suggestions: Vec<String> = payload
            .suggestions
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        info!(
            "received {} suggestions for '{}'",
            suggestions.len(),
            anchor.quote
        );
        if !suggestions.is_empty() {
            lock(&self.suggestions).set(fingerprint.clone(), suggestions.clone());
        }

        Ok(SuggestionResult {
            suggestions,
            anchor,
            fingerprint,
            from_cache: false,
        })
    }

    /// Label `text` and normalize the returned spans into highlights.
    pub async fn label_text(&self, text: &str) -> Result<LabelResult> {
        let hash = document_hash(text);
        let key = format!("labels:{hash}");

        if let Some(cached) = lock(&self.labels).get(&key).cloned() {
            debug!("labels for {hash}: cache hit");
            self.lifecycle.cancel_current_request();
            return Ok(LabelResult {
                highlights: cached,
                document_hash: hash,
                from_cache: true,
                report: None,
            });
        }

        let client = self.client.clone();
        let owned = text.to_string();
        let payload = self
            .lifecycle
            .schedule_request(key.clone(), move |token| async move {
                client.fetch_spans(owned, token).await
            })
            .await?;

        let graphemes = GraphemeIndex::new(text);
        let output =
            self.normalizer
                .normalize_with_report(&payload.spans, text, &self.taxonomy, Some(&graphemes));
        info!(
            "labeled {hash}: {} highlights from {} spans ({} dropped)",
            output.highlights.len(),
            output.report.input,
            output.report.dropped_total()
        );
        lock(&self.labels).set(key, output.highlights.clone());

        Ok(LabelResult {
            highlights: output.highlights,
            document_hash: hash,
            from_cache: false,
            report: Some(output.report),
        })
    }

    /// Substitute `suggestion` where `anchor` resolves in `prompt`, unless
    /// that region overlaps a lock that still resolves.
    #[must_use]
    pub fn apply_suggestion(
        &self,
        prompt: &str,
        suggestion: &str,
        anchor: &Anchor,
        locks: &[LockedSpan],
        idempotency_key: Option<String>,
    ) -> SuggestionApplication {
        self.resolver
            .apply_guarded(prompt, suggestion, anchor, locks)
            .into_application(idempotency_key)
    }

    pub fn cancel(&self) {
        self.lifecycle.cancel_current_request();
    }

    /// Cancel pending work, refuse new requests and drop cached results.
    pub fn dispose(&self) {
        self.lifecycle.dispose();
        lock(&self.suggestions).clear();
        lock(&self.labels).clear();
    }

    /// Sweep expired entries from both caches.
    pub fn prune_caches(&self) -> usize {
        lock(&self.suggestions).prune() + lock(&self.labels).prune()
    }

    #[must_use]
    pub fn request_state(&self) -> RequestSnapshot {
        self.lifecycle.snapshot()
    }

    #[must_use]
    pub fn cache_stats(&self) -> EngineCacheStats {
        EngineCacheStats {
            suggestions: lock(&self.suggestions).stats(),
            labels: lock(&self.labels).stats(),
        }
    }
}

fn lock<T>(cache: &Mutex<ResultCache<T>>) -> MutexGuard<'_, ResultCache<T>> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}
