//! # Suggest Engine
//!
//! Orchestration layer for suggestion and labeling flows.
//!
//! ## Architecture
//!
//! ```text
//! Selection ──> Anchor::capture ──> fingerprint ──> ResultCache ──hit──> result
//!                                        │              miss
//!                                        v
//!                             RequestLifecycleManager (one slot, debounced)
//!                                        │
//!                                        v
//!                              SuggestionClient (network)
//!
//! Text ──> document hash ──> cache / scheduler ──> SpanNormalizer ──> Highlight[]
//!
//! apply_suggestion ──> AnchorResolver (+ locked spans) ──> SuggestionApplication
//! ```
//!
//! Cancellation is never an error the user sees: callers should ignore
//! [`EngineError::Cancelled`] and surface [`EngineError::Transport`].

mod client;
mod config;
mod engine;
mod error;

pub use client::{SuggestionClient, SuggestionRequest};
pub use config::{
    EngineConfig, ENV_CACHE_CAPACITY, ENV_CACHE_TTL_MS, ENV_CONTEXT_WINDOW, ENV_DEBOUNCE_MS,
    ENV_FUZZY_MIN_CONFIDENCE,
};
pub use engine::{EngineCacheStats, LabelResult, Selection, SuggestionEngine, SuggestionResult};
pub use error::{EngineError, Result, TransportError};
