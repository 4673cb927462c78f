//! # Suggest Spans
//!
//! Turns the labeling service's raw `{role, start, end}` spans into
//! validated, ordered highlight records.
//!
//! ## Pipeline
//!
//! ```text
//! RawSpan[] ──> resolve role ──> validate + clamp ──> snap to chars
//!                (taxonomy)                              │
//!                                                        v
//! Highlight[] <── merge same-category neighbours <── sort by (start, end)
//! ```
//!
//! Bad spans are dropped one at a time; a batch never fails as a whole.
//! [`SpanNormalizer::normalize_with_report`] says what was dropped and why.
//!
//! ## Example
//!
//! ```
//! use suggest_protocol::RawSpan;
//! use suggest_spans::{normalize, Taxonomy};
//!
//! let taxonomy = Taxonomy::new(["subject", "lighting"], [("Lighting", "lighting")], "subject")
//!     .unwrap();
//! let highlights = normalize(
//!     &[RawSpan::new("Lighting", 4.0, 9.0)],
//!     "Low amber light",
//!     &taxonomy,
//!     None,
//! );
//! assert_eq!(highlights[0].category, "lighting");
//! assert_eq!(highlights[0].quote, "amber");
//! ```

mod error;
mod grapheme;
mod normalizer;
mod taxonomy;

pub use error::{Result, TaxonomyError};
pub use grapheme::{GraphemeIndex, GraphemeMapper};
pub use normalizer::{
    normalize, DropReason, NormalizeOutput, NormalizeReport, NormalizerConfig, SpanNormalizer,
    DEFAULT_CONTEXT_WINDOW,
};
pub use taxonomy::{Resolution, Taxonomy, TaxonomyTable};
