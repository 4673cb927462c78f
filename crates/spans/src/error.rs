use thiserror::Error;

/// Result type for taxonomy construction
pub type Result<T> = std::result::Result<T, TaxonomyError>;

/// Problems with a taxonomy table. Individual spans never produce errors;
/// see [`DropReason`](crate::DropReason) for those.
#[derive(Error, Debug)]
pub enum TaxonomyError {
    /// The table has no categories at all
    #[error("Taxonomy has no categories")]
    Empty,

    /// Fallback category missing from the valid set
    #[error("Fallback category '{0}' is not a valid category")]
    UnknownFallback(String),

    /// Alias pointing at a category that does not exist
    #[error("Alias '{alias}' targets unknown category '{target}'")]
    UnknownAliasTarget { alias: String, target: String },

    /// Table could not be decoded
    #[error("Invalid taxonomy table: {0}")]
    Decode(#[from] serde_json::Error),
}
