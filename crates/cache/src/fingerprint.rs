use sha2::{Digest, Sha256};
use suggest_protocol::{Anchor, Utf16Text};

/// Characters of each context string that take part in a fingerprint.
pub const DEFAULT_KEY_CONTEXT_WINDOW: usize = 100;

/// Short, stable hash of a whole document.
#[must_use]
pub fn document_hash(document: &str) -> String {
    let digest = Sha256::digest(document.as_bytes());
    format!("{:x}", digest)[..16].to_string()
}

/// Cache/dedup key for a suggestion request.
///
/// Combines the quote, the nearest `context_window` chars of each context
/// string and the document hash. Every field is length-prefixed before
/// hashing, so text containing separators cannot make two different requests
/// collide.
#[derive(Debug, Clone, Copy)]
pub struct Fingerprint {
    pub context_window: usize,
}

impl Default for Fingerprint {
    fn default() -> Self {
        Self {
            context_window: DEFAULT_KEY_CONTEXT_WINDOW,
        }
    }
}

impl Fingerprint {
    #[must_use]
    pub const fn new(context_window: usize) -> Self {
        Self { context_window }
    }

    #[must_use]
    pub fn key(&self, quote: &str, left_ctx: &str, right_ctx: &str, document: &str) -> String {
        let left = tail_chars(left_ctx, self.context_window);
        let right = head_chars(right_ctx, self.context_window);
        let doc = document_hash(document);

        let mut hasher = Sha256::new();
        for field in [quote, left, right, doc.as_str()] {
            hasher.update((field.len() as u64).to_be_bytes());
            hasher.update(field.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Key for an anchor captured from `document`.
    ///
    /// With a `prefer_index` the context is the document text on either side
    /// of the quote; without one it falls back to the anchor's own context.
    #[must_use]
    pub fn for_anchor(&self, anchor: &Anchor, document: &str) -> String {
        let Some(start) = anchor.prefer_index else {
            return self.key(&anchor.quote, &anchor.left_ctx, &anchor.right_ctx, document);
        };
        let buffer = Utf16Text::new(document);
        let end = (start + anchor.quote.encode_utf16().count()).min(buffer.len());
        let start = start.min(end);
        self.key(
            &anchor.quote,
            buffer.slice(0, start),
            buffer.slice(end, buffer.len()),
            document,
        )
    }
}

/// [`Fingerprint::key`] with the default context window.
#[must_use]
pub fn generate_key(quote: &str, left_ctx: &str, right_ctx: &str, document: &str) -> String {
    Fingerprint::default().key(quote, left_ctx, right_ctx, document)
}

fn tail_chars(text: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    match text.char_indices().rev().nth(count - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

fn head_chars(text: &str, count: usize) -> &str {
    match text.char_indices().nth(count) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
