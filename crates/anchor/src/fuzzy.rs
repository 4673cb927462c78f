//! Token-window fallback for anchors whose quote no longer occurs verbatim.
//!
//! The quote and the buffer are split into Unicode words. Candidate windows
//! sit next to the places where the anchor's context words still occur; the
//! whole buffer is scanned only when the context matches nowhere. Each window
//! is aligned against the quote tokens in order, and scores
//! `2 * aligned / (quote_tokens + window_tokens)`.

use crate::resolver::ResolverConfig;
use log::trace;
use nucleo_matcher::pattern::{AtomKind, CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher, Utf32String};
use std::collections::BTreeSet;
use suggest_protocol::Anchor;
use unicode_segmentation::UnicodeSegmentation;

pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.75;
pub const DEFAULT_TOKEN_FLOOR: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    /// Byte range in the source string
    pub start: usize,
    pub end: usize,
    pub folded: String,
}

pub(crate) fn tokenize(text: &str) -> Vec<Token> {
    text.unicode_word_indices()
        .map(|(start, word)| Token {
            start,
            end: start + word.len(),
            folded: word.to_lowercase(),
        })
        .collect()
}

/// Best window found, as a byte range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct FuzzyHit {
    pub start: usize,
    pub end: usize,
    pub score: f64,
}

pub(crate) struct FuzzySearch {
    config: ResolverConfig,
    matcher: Matcher,
}

impl FuzzySearch {
    pub fn new(config: ResolverConfig) -> Self {
        Self {
            config,
            matcher: Matcher::new(Config::DEFAULT),
        }
    }

    /// Similarity of two folded tokens in `[0, 1]`, or 0 below the floor.
    pub fn token_similarity(&mut self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let best = self.ratio(a, b).max(self.ratio(b, a));
        if best >= self.config.token_floor {
            best
        } else {
            0.0
        }
    }

    /// How well `needle` fuzzy-matches inside `haystack`, relative to a
    /// perfect match and scaled down by the length difference.
    fn ratio(&mut self, needle: &str, haystack: &str) -> f64 {
        let pattern = Pattern::new(
            needle,
            CaseMatching::Ignore,
            Normalization::Smart,
            AtomKind::Fuzzy,
        );
        let target = Utf32String::from(haystack);
        let Some(score) = pattern.score(target.slice(..), &mut self.matcher) else {
            return 0.0;
        };
        let own = Utf32String::from(needle);
        let perfect = match pattern.score(own.slice(..), &mut self.matcher) {
            Some(perfect) if perfect > 0 => perfect,
            _ => return 0.0,
        };

        let (a, b) = (needle.chars().count(), haystack.chars().count());
        #[allow(clippy::cast_precision_loss)]
        let length = a.min(b) as f64 / a.max(b) as f64;
        (f64::from(score) / f64::from(perfect)).min(1.0) * length
    }

    pub fn find(&mut self, text: &str, anchor: &Anchor, prefer_byte: Option<usize>) -> Option<FuzzyHit> {
        let quote = tokenize(&anchor.quote);
        let words = tokenize(text);
        if quote.is_empty() || words.is_empty() {
            return None;
        }

        let mut similarity = vec![vec![0.0; words.len()]; quote.len()];
        for (row, q) in similarity.iter_mut().zip(&quote) {
            for (cell, w) in row.iter_mut().zip(&words) {
                *cell = self.token_similarity(&q.folded, &w.folded);
            }
        }

        let min = quote.len().saturating_sub(1).max(1);
        let max = (quote.len() + 1).min(words.len());
        if min > max {
            return None;
        }

        // Where the context still matches, only windows next to it count.
        let seeded = context_seeds(anchor, &words, min..=max);
        let best = if seeded.is_empty() {
            let all = (min..=max)
                .flat_map(|size| (0..=words.len() - size).map(move |start| (start, size)));
            self.best_window(&similarity, &words, all, prefer_byte)?
        } else {
            self.best_window(&similarity, &words, seeded.into_iter(), prefer_byte)?
        };

        if best.score >= self.config.fuzzy_min_confidence {
            Some(best)
        } else {
            trace!(
                "best fuzzy window scored {:.3}, below {:.3}",
                best.score,
                self.config.fuzzy_min_confidence
            );
            None
        }
    }

    fn best_window(
        &self,
        similarity: &[Vec<f64>],
        words: &[Token],
        windows: impl Iterator<Item = (usize, usize)>,
        prefer_byte: Option<usize>,
    ) -> Option<FuzzyHit> {
        let mut best: Option<(FuzzyHit, usize)> = None;
        for (start, size) in windows {
            let aligned = align(similarity, start, size);
            #[allow(clippy::cast_precision_loss)]
            let score = 2.0 * aligned / (similarity.len() + size) as f64;
            if score <= 0.0 {
                continue;
            }
            let hit = FuzzyHit {
                start: words[start].start,
                end: words[start + size - 1].end,
                score,
            };
            let distance = prefer_byte.map_or(0, |prefer| hit.start.abs_diff(prefer));
            let better = best.as_ref().map_or(true, |(current, current_distance)| {
                score > current.score
                    || (score == current.score
                        && (distance, hit.start) < (*current_distance, current.start))
            });
            if better {
                best = Some((hit, distance));
            }
        }
        best.map(|(hit, _)| hit)
    }
}

/// Weighted in-order alignment of every quote token against the window
/// `words[start..start + size]`.
fn align(similarity: &[Vec<f64>], start: usize, size: usize) -> f64 {
    let mut previous = vec![0.0f64; size + 1];
    let mut current = vec![0.0f64; size + 1];
    for row in similarity {
        for j in 1..=size {
            let diagonal = previous[j - 1] + row[start + j - 1];
            current[j] = diagonal.max(previous[j]).max(current[j - 1]);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[size]
}

/// Context words that must agree before a window is seeded next to them.
const SEED_CONTEXT_TOKENS: usize = 2;

/// Windows anchored on places where the context still matches: right after
/// the last words of `left_ctx`, or right before the first words of
/// `right_ctx`.
fn context_seeds(
    anchor: &Anchor,
    words: &[Token],
    sizes: std::ops::RangeInclusive<usize>,
) -> BTreeSet<(usize, usize)> {
    let mut left = tokenize(&anchor.left_ctx);
    let left = left.split_off(left.len().saturating_sub(SEED_CONTEXT_TOKENS));
    let mut right = tokenize(&anchor.right_ctx);
    right.truncate(SEED_CONTEXT_TOKENS);

    let mut seeds = BTreeSet::new();
    if !left.is_empty() {
        for (index, run) in words.windows(left.len()).enumerate() {
            if !same_words(run, &left) {
                continue;
            }
            let start = index + left.len();
            for size in sizes.clone() {
                if start + size <= words.len() {
                    seeds.insert((start, size));
                }
            }
        }
    }
    if !right.is_empty() {
        for (index, run) in words.windows(right.len()).enumerate() {
            if !same_words(run, &right) {
                continue;
            }
            for size in sizes.clone() {
                if index >= size {
                    seeds.insert((index - size, size));
                }
            }
        }
    }
    seeds
}

fn same_words(a: &[Token], b: &[Token]) -> bool {
    a.iter().zip(b).all(|(x, y)| x.folded == y.folded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn search() -> FuzzySearch {
        FuzzySearch::new(ResolverConfig::default())
    }

    #[test]
    fn tokens_skip_punctuation_and_fold_case() {
        let tokens = tokenize("Leather-Jacket, at dawn!");
        let folded: Vec<&str> = tokens.iter().map(|t| t.folded.as_str()).collect();
        assert_eq!(folded, vec!["leather", "jacket", "at", "dawn"]);
        assert_eq!((tokens[1].start, tokens[1].end), (8, 14));
    }

    #[test]
    fn identical_tokens_are_fully_similar() {
        assert_eq!(search().token_similarity("cowboy", "cowboy"), 1.0);
    }

    #[test]
    fn unrelated_tokens_score_zero() {
        let mut search = search();
        assert_eq!(search.token_similarity("cowboy", "rancher"), 0.0);
        assert_eq!(search.token_similarity("scarf", "hat"), 0.0);
        // A one-letter token is a subsequence but far too short to count.
        assert_eq!(search.token_similarity("a", "scarf"), 0.0);
    }

    #[test]
    fn alignment_respects_order() {
        // quote [x, y] against window [y, x]: only one token can align in order.
        let similarity = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        assert_eq!(align(&similarity, 0, 2), 1.0);
        let straight = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        assert_eq!(align(&straight, 0, 2), 2.0);
    }

    #[test]
    fn finds_quote_after_casing_and_punctuation_changes() {
        let text = "A cowboy in a Leather-Jacket rides at dawn.";
        let anchor = Anchor::new("leather jacket").context("in a ", " rides");
        let hit = search().find(text, &anchor, None).unwrap();
        assert_eq!(&text[hit.start..hit.end], "Leather-Jacket");
        assert_eq!(hit.score, 1.0);
    }

    #[test]
    fn falls_back_to_full_scan_without_context() {
        let text = "Golden Hour, backlit";
        let anchor = Anchor::new("golden hour");
        let hit = search().find(text, &anchor, None).unwrap();
        assert_eq!(&text[hit.start..hit.end], "Golden Hour");
    }

    #[test]
    fn matching_context_keeps_the_search_local() {
        // The context still frames "leather coat"; the exact tokens further on
        // must not pull the anchor away from it.
        let text = "A cowboy in a leather coat rides at dawn. Later: a Leather-Jacket hangs on a hook.";
        let anchor = Anchor::new("leather jacket").context("in a ", " rides");
        assert_eq!(search().find(text, &anchor, None), None);

        let mut lenient = FuzzySearch::new(ResolverConfig {
            fuzzy_min_confidence: 0.6,
            ..ResolverConfig::default()
        });
        let hit = lenient.find(text, &anchor, None).unwrap();
        assert_eq!(&text[hit.start..hit.end], "leather");
    }

    #[test]
    fn weak_windows_are_rejected() {
        let text = "A cowboy wears a red hat at dawn.";
        let anchor = Anchor::new("red scarf").context("wears a ", " at");
        assert_eq!(search().find(text, &anchor, None), None);
    }
}
