//! # Suggest Lifecycle
//!
//! Single-slot request scheduler feeding the labeling and suggestion calls.
//!
//! ## State machine
//!
//! ```text
//! Idle ──schedule──> Debouncing ──timer──> InFlight ──> Resolved | Failed
//!   ^                    │                    │
//!   │                    └──── superseded / cancelled ───> Cancelled
//!   └──────────────────────── slot cleared ──────────────────────┘
//! ```
//!
//! There is one slot per manager, not one per key: a new call always
//! restarts the machine and the previous caller observes
//! [`RequestError::Cancelled`].
//!
//! ## Example
//!
//! ```no_run
//! use std::convert::Infallible;
//! use suggest_lifecycle::{LifecycleConfig, RequestLifecycleManager};
//!
//! #[tokio::main]
//! async fn main() {
//!     let manager = RequestLifecycleManager::new(LifecycleConfig::default());
//!     let labels = manager
//!         .schedule_request("labels:doc-1", |_token| async {
//!             Ok::<_, Infallible>(vec!["subject".to_string()])
//!         })
//!         .await;
//!     assert!(labels.is_ok());
//! }
//! ```

mod error;
mod manager;

pub use error::{IsCancellation, RequestError};
pub use manager::{
    LifecycleConfig, RequestLifecycleManager, RequestSnapshot, RequestState,
};
pub use tokio_util::sync::CancellationToken;
