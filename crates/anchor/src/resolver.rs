use crate::fuzzy::{FuzzySearch, DEFAULT_MIN_CONFIDENCE, DEFAULT_TOKEN_FLOOR};
use log::debug;
use serde::{Deserialize, Serialize};
use suggest_protocol::{Anchor, Utf16Text};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Minimum window similarity for a fuzzy match to count
    pub fuzzy_min_confidence: f64,

    /// Per-token similarity below this contributes nothing
    pub token_floor: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fuzzy_min_confidence: DEFAULT_MIN_CONFIDENCE,
            token_floor: DEFAULT_TOKEN_FLOOR,
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.fuzzy_min_confidence) || self.fuzzy_min_confidence == 0.0 {
            return Err("fuzzy_min_confidence must be in (0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.token_floor) {
            return Err("token_floor must be in [0, 1]".to_string());
        }
        Ok(())
    }
}

/// Which strategy located the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// The quote sat verbatim at `prefer_index`
    Hint,
    /// The trimmed quote occurs exactly once
    Unique,
    /// Several occurrences, picked by surrounding text
    Context,
    /// No verbatim occurrence; token-window similarity
    Fuzzy,
}

/// A located anchor, in UTF-16 units.
///
/// `score` is 1.0 for [`MatchTier::Hint`] and [`MatchTier::Unique`], the
/// number of context chars that still agree for [`MatchTier::Context`], and
/// the window similarity in `[0, 1]` for [`MatchTier::Fuzzy`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorMatch {
    pub start: usize,
    pub end: usize,
    pub tier: MatchTier,
    pub score: f64,
}

/// Finds where an [`Anchor`] lives in the current text.
///
/// Offsets stored in the anchor are hints only. When no tier produces a
/// confident answer the resolver returns `None`; it never guesses.
#[derive(Debug, Clone, Default)]
pub struct AnchorResolver {
    config: ResolverConfig,
}

impl AnchorResolver {
    #[must_use]
    pub const fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &ResolverConfig {
        &self.config
    }

    #[must_use]
    pub fn resolve(&self, text: &str, anchor: &Anchor) -> Option<AnchorMatch> {
        let buffer = Utf16Text::new(text);
        let needle = anchor.quote.trim();
        if needle.is_empty() {
            debug!("anchor has an empty quote; nothing to resolve");
            return None;
        }

        if let Some(found) = hint_match(&buffer, anchor) {
            debug!("anchor resolved at its hint {}", found.start);
            return Some(found);
        }

        let prefer_byte = anchor.prefer_index.map(|index| buffer.to_byte(index));
        let occurrences = occurrences(text, needle);
        match occurrences.as_slice() {
            [] => {}
            [only] => {
                debug!("anchor resolved to its only occurrence");
                return Some(to_match(&buffer, *only, only + needle.len(), MatchTier::Unique, 1.0));
            }
            many => {
                let (best, score) = best_by_context(text, needle, anchor, many, prefer_byte);
                debug!(
                    "anchor resolved by context among {} occurrences (score {score})",
                    many.len()
                );
                #[allow(clippy::cast_precision_loss)]
                let score = score as f64;
                return Some(to_match(&buffer, best, best + needle.len(), MatchTier::Context, score));
            }
        }

        let hit = FuzzySearch::new(self.config).find(text, anchor, prefer_byte);
        match hit {
            Some(hit) => {
                debug!("anchor resolved fuzzily (similarity {:.3})", hit.score);
                Some(to_match(&buffer, hit.start, hit.end, MatchTier::Fuzzy, hit.score))
            }
            None => {
                debug!("anchor '{needle}' not found");
                None
            }
        }
    }
}

fn hint_match(buffer: &Utf16Text<'_>, anchor: &Anchor) -> Option<AnchorMatch> {
    let index = anchor.prefer_index?;
    if !buffer.is_boundary(index) {
        return None;
    }
    let byte = buffer.to_byte(index);
    if !buffer.as_str()[byte..].starts_with(anchor.quote.as_str()) {
        return None;
    }
    // Report the trimmed quote, as the search tiers do.
    let lead = anchor.quote.len() - anchor.quote.trim_start().len();
    let start = byte + lead;
    let end = start + anchor.quote.trim().len();
    Some(to_match(buffer, start, end, MatchTier::Hint, 1.0))
}

fn to_match(
    buffer: &Utf16Text<'_>,
    start_byte: usize,
    end_byte: usize,
    tier: MatchTier,
    score: f64,
) -> AnchorMatch {
    AnchorMatch {
        start: buffer.to_utf16(start_byte),
        end: buffer.to_utf16(end_byte),
        tier,
        score,
    }
}

/// Byte offsets of every occurrence of `needle`, overlapping ones included.
pub(crate) fn occurrences(haystack: &str, needle: &str) -> Vec<usize> {
    let mut found = Vec::new();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let at = from + pos;
        found.push(at);
        let step = haystack[at..].chars().next().map_or(1, char::len_utf8);
        from = at + step;
    }
    found
}

/// Pick the occurrence whose neighbourhood best agrees with the recorded
/// context. Ties go to the one nearest the hint, then the leftmost.
fn best_by_context(
    text: &str,
    needle: &str,
    anchor: &Anchor,
    candidates: &[usize],
    prefer_byte: Option<usize>,
) -> (usize, usize) {
    let mut best = (candidates[0], 0usize);
    let mut best_key: Option<(usize, usize)> = None;
    for &at in candidates {
        let score = shared_suffix(&text[..at], &anchor.left_ctx)
            + shared_prefix(&text[at + needle.len()..], &anchor.right_ctx);
        let distance = prefer_byte.map_or(0, |prefer| at.abs_diff(prefer));
        let better = match best_key {
            None => true,
            Some((best_score, best_distance)) => {
                score > best_score || (score == best_score && distance < best_distance)
            }
        };
        if better {
            best = (at, score);
            best_key = Some((score, distance));
        }
    }
    best
}

pub(crate) fn shared_suffix(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

pub(crate) fn shared_prefix(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .count()
}
