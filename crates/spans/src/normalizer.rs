use crate::grapheme::GraphemeMapper;
use crate::taxonomy::{Resolution, Taxonomy};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use suggest_protocol::{
    GraphemeRange, Highlight, HighlightSource, RawSpan, Utf16Text, HIGHLIGHT_VERSION,
};

/// UTF-16 units of context kept on each side of a highlight.
pub const DEFAULT_CONTEXT_WINDOW: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Size of `leftCtx` / `rightCtx`, independent of the taxonomy
    pub context_window: usize,

    /// Version stamped on every emitted highlight
    pub version: u32,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            context_window: DEFAULT_CONTEXT_WINDOW,
            version: HIGHLIGHT_VERSION,
        }
    }
}

/// Why a raw span was left out of the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// `start` or `end` was NaN or infinite
    NonFiniteOffsets,
    /// `end <= start` as received
    EmptyRange,
    /// Range vanished after clamping to the buffer
    CollapsedByClamp,
    /// The buffer slice was empty
    EmptyQuote,
    /// Overlapped an earlier highlight of a different category
    Overlap,
}

/// Bookkeeping for one normalization pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeReport {
    pub input: usize,
    pub emitted: usize,
    pub merged: usize,
    pub dropped: BTreeMap<DropReason, usize>,
    /// Roles that matched neither a category nor an alias
    pub fallback_roles: Vec<String>,
}

impl NormalizeReport {
    #[must_use]
    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }

    fn drop_span(&mut self, index: usize, reason: DropReason) {
        debug!("dropping span #{index}: {reason:?}");
        *self.dropped.entry(reason).or_default() += 1;
    }
}

#[derive(Debug, Clone)]
pub struct NormalizeOutput {
    pub highlights: Vec<Highlight>,
    pub report: NormalizeReport,
}

/// Turns raw labeled spans into ordered, merged highlights over one buffer.
#[derive(Debug, Clone, Default)]
pub struct SpanNormalizer {
    config: NormalizerConfig,
}

impl SpanNormalizer {
    #[must_use]
    pub const fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    #[must_use]
    pub fn normalize(
        &self,
        spans: &[RawSpan],
        text: &str,
        taxonomy: &Taxonomy,
        graphemes: Option<&dyn GraphemeMapper>,
    ) -> Vec<Highlight> {
        self.normalize_with_report(spans, text, taxonomy, graphemes)
            .highlights
    }

    #[must_use]
    pub fn normalize_with_report(
        &self,
        spans: &[RawSpan],
        text: &str,
        taxonomy: &Taxonomy,
        graphemes: Option<&dyn GraphemeMapper>,
    ) -> NormalizeOutput {
        let buffer = Utf16Text::new(text);
        let mut report = NormalizeReport {
            input: spans.len(),
            ..NormalizeReport::default()
        };

        let mut highlights: Vec<Highlight> = spans
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| {
                match self.build(index, raw, &buffer, taxonomy, graphemes, &mut report) {
                    Ok(highlight) => Some(highlight),
                    Err(reason) => {
                        report.drop_span(index, reason);
                        None
                    }
                }
            })
            .collect();

        highlights.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));

        let highlights = merge_pass(highlights, &buffer, &mut report);
        report.emitted = highlights.len();
        NormalizeOutput { highlights, report }
    }

    fn build(
        &self,
        index: usize,
        raw: &RawSpan,
        buffer: &Utf16Text<'_>,
        taxonomy: &Taxonomy,
        graphemes: Option<&dyn GraphemeMapper>,
        report: &mut NormalizeReport,
    ) -> Result<Highlight, DropReason> {
        if !raw.start.is_finite() || !raw.end.is_finite() {
            return Err(DropReason::NonFiniteOffsets);
        }
        if raw.end <= raw.start {
            return Err(DropReason::EmptyRange);
        }

        let len = buffer.len();
        let (start, end) = buffer.snap_outward(clamp_offset(raw.start, len), clamp_offset(raw.end, len));
        if end <= start {
            return Err(DropReason::CollapsedByClamp);
        }

        let quote = buffer.slice(start, end);
        if quote.is_empty() {
            return Err(DropReason::EmptyQuote);
        }

        let (category, resolution) = taxonomy.resolve(&raw.role);
        if resolution == Resolution::Fallback {
            warn!(
                "role '{}' is not in the taxonomy; using fallback '{category}'",
                raw.role
            );
            report.fallback_roles.push(raw.role.clone());
        }

        let id = match raw.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("llm_{category}_{index}_{start}_{end}"),
        };

        Ok(Highlight {
            id,
            category: category.to_string(),
            role: raw.role.clone(),
            start,
            end,
            quote: quote.to_string(),
            left_ctx: buffer.left_window(start, self.config.context_window).to_string(),
            right_ctx: buffer.right_window(end, self.config.context_window).to_string(),
            confidence: raw.confidence.filter(|c| c.is_finite()),
            source: HighlightSource::Llm,
            version: self.config.version,
            graphemes: graphemes.map(|mapper| GraphemeRange {
                start_grapheme: mapper.start_grapheme(start),
                end_grapheme: mapper.end_grapheme(end),
            }),
        })
    }
}

/// Default-configured [`SpanNormalizer::normalize`].
#[must_use]
pub fn normalize(
    spans: &[RawSpan],
    text: &str,
    taxonomy: &Taxonomy,
    graphemes: Option<&dyn GraphemeMapper>,
) -> Vec<Highlight> {
    SpanNormalizer::default().normalize(spans, text, taxonomy, graphemes)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn clamp_offset(value: f64, len: usize) -> usize {
    if value <= 0.0 {
        0
    } else if value >= len as f64 {
        len
    } else {
        value.trunc() as usize
    }
}

/// Fold same-category neighbours separated only by whitespace into one
/// highlight. Input must be sorted by `(start, end)`.
fn merge_pass(
    sorted: Vec<Highlight>,
    buffer: &Utf16Text<'_>,
    report: &mut NormalizeReport,
) -> Vec<Highlight> {
    let mut out: Vec<Highlight> = Vec::with_capacity(sorted.len());
    for next in sorted {
        let Some(current) = out.last_mut() else {
            out.push(next);
            continue;
        };

        if next.start < current.end {
            if next.category == current.category {
                absorb(current, next, buffer);
                report.merged += 1;
            } else {
                debug!(
                    "highlight {} overlaps {} ({} vs {})",
                    next.id, current.id, next.category, current.category
                );
                *report.dropped.entry(DropReason::Overlap).or_default() += 1;
            }
            continue;
        }

        let gap = buffer.slice(current.end, next.start);
        if next.category == current.category && gap.chars().all(char::is_whitespace) {
            absorb(current, next, buffer);
            report.merged += 1;
            continue;
        }

        out.push(next);
    }
    out
}

/// Extend `current` over `next`, keeping `current`'s start, left context and
/// id.
fn absorb(current: &mut Highlight, next: Highlight, buffer: &Utf16Text<'_>) {
    if next.end <= current.end {
        return;
    }
    current.end = next.end;
    current.quote = buffer.slice(current.start, current.end).to_string();
    current.right_ctx = next.right_ctx;
    if let (Some(range), Some(absorbed)) = (current.graphemes.as_mut(), next.graphemes) {
        range.end_grapheme = absorbed.end_grapheme;
    }
}
