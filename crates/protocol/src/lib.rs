//! # Suggest Protocol
//!
//! Data model shared by every component of the suggestion engine.
//!
//! Offsets in this crate are UTF-16 code-unit indices, which is what the
//! editor widget and the labeling service speak. [`Utf16Text`] converts them
//! to byte offsets into a Rust `&str`.
//!
//! ```text
//! labeling service ──> SpanPayload { spans: RawSpan[] }
//!                          │
//!                          └──> SpanNormalizer ──> Highlight[]
//!
//! editor selection ──> Anchor { quote, leftCtx, rightCtx, preferIndex? }
//!                          │
//!                          └──> AnchorResolver ──> SuggestionApplication
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod offset;
mod text;

pub use text::Utf16Text;

/// Schema version stamped on highlights produced by this crate family.
pub const HIGHLIGHT_VERSION: u32 = 1;

/// An offset-based label produced by the external labeling service.
///
/// `start`/`end` are kept as `f64` because the service is not trusted to send
/// integers; the normalizer rejects anything non-finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RawSpan {
    pub role: String,
    #[serde(default = "offset::missing", deserialize_with = "offset::lenient")]
    #[schemars(with = "f64")]
    pub start: f64,
    #[serde(default = "offset::missing", deserialize_with = "offset::lenient")]
    #[schemars(with = "f64")]
    pub end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl RawSpan {
    pub fn new(role: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            role: role.into(),
            start,
            end,
            confidence: None,
            id: None,
        }
    }

    /// Builder: set confidence
    #[must_use]
    pub const fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Builder: set caller-supplied id
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Where a highlight came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HighlightSource {
    #[default]
    Llm,
}

/// Grapheme-cluster indices for a highlight, present only when a grapheme
/// mapper was available during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GraphemeRange {
    pub start_grapheme: usize,
    pub end_grapheme: usize,
}

/// A validated, taxonomy-categorized region of a text buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub id: String,
    pub category: String,
    pub role: String,
    pub start: usize,
    pub end: usize,
    pub quote: String,
    pub left_ctx: String,
    pub right_ctx: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub source: HighlightSource,
    pub version: u32,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub graphemes: Option<GraphemeRange>,
}

impl Highlight {
    /// Length in UTF-16 code units.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Feed a stored highlight back through normalization.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_raw_span(&self) -> RawSpan {
        RawSpan {
            role: self.role.clone(),
            start: self.start as f64,
            end: self.end as f64,
            confidence: self.confidence,
            id: Some(self.id.clone()),
        }
    }

    /// Re-anchor this highlight so it can be relocated after edits.
    #[must_use]
    pub fn anchor(&self) -> Anchor {
        Anchor {
            quote: self.quote.clone(),
            left_ctx: self.left_ctx.clone(),
            right_ctx: self.right_ctx.clone(),
            prefer_index: Some(self.start),
        }
    }
}

/// Location-independent description of "this text, bounded by this context".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    pub quote: String,
    #[serde(default)]
    pub left_ctx: String,
    #[serde(default)]
    pub right_ctx: String,
    /// Offset observed when the anchor was captured. Only a hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefer_index: Option<usize>,
}

impl Anchor {
    pub fn new(quote: impl Into<String>) -> Self {
        Self {
            quote: quote.into(),
            ..Self::default()
        }
    }

    /// Builder: set both context strings
    #[must_use]
    pub fn context(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.left_ctx = left.into();
        self.right_ctx = right.into();
        self
    }

    /// Builder: set the offset hint
    #[must_use]
    pub const fn prefer_index(mut self, index: usize) -> Self {
        self.prefer_index = Some(index);
        self
    }

    /// Capture an anchor for `[start, end)` of `text` with context windows of
    /// `window` UTF-16 units on either side. Returns `None` when the range is
    /// empty after clamping.
    #[must_use]
    pub fn capture(text: &str, start: usize, end: usize, window: usize) -> Option<Self> {
        let indexed = Utf16Text::new(text);
        let (start, end) = indexed.snap_outward(start, end);
        if end <= start {
            return None;
        }
        Some(Self {
            quote: indexed.slice(start, end).to_string(),
            left_ctx: indexed.left_window(start, window).to_string(),
            right_ctx: indexed.right_window(end, window).to_string(),
            prefer_index: Some(start),
        })
    }
}

/// A phrase the user asked automated rewriting to leave alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LockedSpan {
    pub id: String,
    #[serde(flatten)]
    pub anchor: Anchor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl LockedSpan {
    pub fn new(id: impl Into<String>, anchor: Anchor) -> Self {
        Self {
            id: id.into(),
            anchor,
            category: None,
            source: None,
            confidence: None,
        }
    }

    /// Lock the selection `[start, end)` of `text`.
    #[must_use]
    pub fn capture(
        id: impl Into<String>,
        text: &str,
        start: usize,
        end: usize,
        window: usize,
    ) -> Option<Self> {
        Anchor::capture(text, start, end, window).map(|anchor| Self::new(id, anchor))
    }

    /// Lock an existing highlight, keeping its category and confidence.
    #[must_use]
    pub fn from_highlight(highlight: &Highlight) -> Self {
        Self {
            id: highlight.id.clone(),
            anchor: highlight.anchor(),
            category: Some(highlight.category.clone()),
            source: Some("llm".to_string()),
            confidence: highlight.confidence,
        }
    }
}

/// Labeling response body.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SpanPayload {
    #[serde(default)]
    pub spans: Vec<RawSpan>,
}

/// Suggestion response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SuggestionsPayload {
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplySuggestionRequest {
    pub prompt: String,
    pub suggestion_text: String,
    pub anchor: Anchor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}

/// Flat result record handed back to the editor. `updated_prompt` is `None`
/// whenever nothing should change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionApplication {
    pub updated_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement_target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_start: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_end: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Id of the locked span that vetoed the replacement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked_by: Option<String>,
}
