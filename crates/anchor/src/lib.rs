//! # Suggest Anchor
//!
//! Relocates a captured anchor (quote plus surrounding context) inside a text
//! that may have changed since, and applies replacements at the relocated
//! position.
//!
//! ## Resolution tiers
//!
//! ```text
//! 1. Hint     quote verbatim at prefer_index
//! 2. Unique   trimmed quote occurs exactly once
//! 3. Context  several occurrences, best left/right context agreement
//!             (ties: nearest prefer_index, then leftmost)
//! 4. Fuzzy    token windows seeded from matching context,
//!             accepted above a minimum similarity
//! ```
//!
//! The first tier with an answer wins. When none has one the result is
//! `None`, and [`apply_suggestion_to_prompt`] leaves the prompt untouched.
//!
//! ```
//! use suggest_anchor::{AnchorResolver, MatchTier};
//! use suggest_protocol::Anchor;
//!
//! let anchor = Anchor::new("cowboy").context("A ", " in a leather jacket").prefer_index(2);
//! let text = "An cowboy in a leather jacket rides past another cowboy at dawn.";
//! let found = AnchorResolver::default().resolve(text, &anchor).unwrap();
//! assert_eq!((found.start, found.end, found.tier), (3, 9, MatchTier::Context));
//! ```

mod apply;
mod fuzzy;
mod locks;
mod resolver;

pub use apply::{apply_suggestion_to_prompt, ApplyOutcome};
pub use fuzzy::{DEFAULT_MIN_CONFIDENCE, DEFAULT_TOKEN_FLOOR};
pub use locks::{resolve_locked_spans, LocatedLock, LockResolution};
pub use resolver::{AnchorMatch, AnchorResolver, MatchTier, ResolverConfig};
