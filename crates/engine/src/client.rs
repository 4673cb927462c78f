use crate::error::TransportError;
use async_trait::async_trait;
use serde::Serialize;
use suggest_lifecycle::CancellationToken;
use suggest_protocol::{SpanPayload, SuggestionsPayload};

/// Body of a suggestion request: the selected quote, its surroundings and
/// the whole document for grounding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionRequest {
    pub quote: String,
    pub left_ctx: String,
    pub right_ctx: String,
    pub full_text: String,
}

/// Network side of the engine.
///
/// Implementations must watch `token` during the call and during any retry
/// backoff, returning [`TransportError::Aborted`] once it fires.
#[async_trait]
pub trait SuggestionClient: Send + Sync {
    async fn fetch_suggestions(
        &self,
        request: SuggestionRequest,
        token: CancellationToken,
    ) -> Result<SuggestionsPayload, TransportError>;

    async fn fetch_spans(
        &self,
        text: String,
        token: CancellationToken,
    ) -> Result<SpanPayload, TransportError>;
}
