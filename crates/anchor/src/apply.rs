use crate::resolver::{AnchorMatch, AnchorResolver};
use log::{debug, info};
use suggest_protocol::{
    Anchor, ApplySuggestionRequest, LockedSpan, SuggestionApplication, Utf16Text,
};

/// What happened to an apply request.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    Applied {
        updated_prompt: String,
        /// Text that was replaced
        replaced: String,
        found: AnchorMatch,
    },
    /// The region already reads as the suggestion
    Unchanged { found: AnchorMatch },
    /// The region overlaps a locked span that still resolves
    Locked { lock_id: String, found: AnchorMatch },
    NotFound,
}

impl ApplyOutcome {
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    #[must_use]
    pub fn updated_prompt(&self) -> Option<&str> {
        match self {
            Self::Applied { updated_prompt, .. } => Some(updated_prompt),
            _ => None,
        }
    }

    /// Flatten into the record handed back to the editor.
    #[must_use]
    pub fn into_application(self, idempotency_key: Option<String>) -> SuggestionApplication {
        let mut application = SuggestionApplication {
            idempotency_key,
            ..SuggestionApplication::default()
        };
        match self {
            Self::Applied {
                updated_prompt,
                replaced,
                found,
            } => {
                application.updated_prompt = Some(updated_prompt);
                application.replacement_target = Some(replaced);
                application.match_start = Some(found.start);
                application.match_end = Some(found.end);
            }
            Self::Unchanged { found } => {
                application.match_start = Some(found.start);
                application.match_end = Some(found.end);
            }
            Self::Locked { lock_id, found } => {
                application.match_start = Some(found.start);
                application.match_end = Some(found.end);
                application.locked_by = Some(lock_id);
            }
            Self::NotFound => {}
        }
        application
    }
}

impl AnchorResolver {
    /// Replace the text `anchor` points at with `suggestion`.
    ///
    /// A missing anchor is a no-op, never a whole-buffer replacement.
    #[must_use]
    pub fn apply(&self, prompt: &str, suggestion: &str, anchor: &Anchor) -> ApplyOutcome {
        self.apply_guarded(prompt, suggestion, anchor, &[])
    }

    /// Like [`apply`](Self::apply), but refuses to touch any region that
    /// overlaps one of `locks` as they resolve in `prompt`.
    #[must_use]
    pub fn apply_guarded(
        &self,
        prompt: &str,
        suggestion: &str,
        anchor: &Anchor,
        locks: &[LockedSpan],
    ) -> ApplyOutcome {
        let Some(found) = self.resolve(prompt, anchor) else {
            info!("suggestion target '{}' not found; leaving prompt alone", anchor.quote);
            return ApplyOutcome::NotFound;
        };

        if let Some(lock) = self
            .resolve_locks(prompt, locks)
            .located
            .into_iter()
            .find(|lock| lock.overlaps(found.start, found.end))
        {
            info!("suggestion target overlaps locked span {}", lock.id);
            return ApplyOutcome::Locked {
                lock_id: lock.id,
                found,
            };
        }

        let buffer = Utf16Text::new(prompt);
        let (start, end) = (buffer.to_byte(found.start), buffer.to_byte(found.end));
        let replaced = &prompt[start..end];
        if replaced == suggestion {
            debug!("suggestion matches the current text; nothing to do");
            return ApplyOutcome::Unchanged { found };
        }

        let mut updated_prompt = String::with_capacity(prompt.len() - replaced.len() + suggestion.len());
        updated_prompt.push_str(&prompt[..start]);
        updated_prompt.push_str(suggestion);
        updated_prompt.push_str(&prompt[end..]);

        ApplyOutcome::Applied {
            updated_prompt,
            replaced: replaced.to_string(),
            found,
        }
    }
}

/// Resolve `request.anchor` in `request.prompt` and substitute the
/// suggestion there, using the default resolver.
#[must_use]
pub fn apply_suggestion_to_prompt(request: &ApplySuggestionRequest) -> SuggestionApplication {
    AnchorResolver::default()
        .apply(&request.prompt, &request.suggestion_text, &request.anchor)
        .into_application(request.idempotency_key.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::MatchTier;
    use pretty_assertions::assert_eq;

    #[test]
    fn replaces_resolved_region() {
        let request = ApplySuggestionRequest {
            prompt: "A cowboy rides at dusk".to_string(),
            suggestion_text: "rancher".to_string(),
            anchor: Anchor::new("cowboy").context("A ", " rides").prefer_index(2),
            idempotency_key: Some("k-1".to_string()),
        };
        let application = apply_suggestion_to_prompt(&request);
        assert_eq!(
            application,
            SuggestionApplication {
                updated_prompt: Some("A rancher rides at dusk".to_string()),
                replacement_target: Some("cowboy".to_string()),
                match_start: Some(2),
                match_end: Some(8),
                idempotency_key: Some("k-1".to_string()),
                locked_by: None,
            }
        );
    }

    #[test]
    fn same_text_is_a_no_op() {
        let outcome = AnchorResolver::default().apply("A cowboy rides", "cowboy", &Anchor::new("cowboy"));
        assert!(matches!(outcome, ApplyOutcome::Unchanged { .. }));
        assert_eq!(outcome.updated_prompt(), None);
    }

    #[test]
    fn replacement_around_astral_chars() {
        let outcome =
            AnchorResolver::default().apply("🤠 cowboy 🤠", "rider", &Anchor::new("cowboy").prefer_index(3));
        assert_eq!(outcome.updated_prompt(), Some("🤠 rider 🤠"));
        let ApplyOutcome::Applied { found, .. } = outcome else {
            panic!("expected an applied outcome");
        };
        assert_eq!((found.start, found.end, found.tier), (3, 9, MatchTier::Hint));
    }

    #[test]
    fn padded_quote_keeps_surrounding_spaces() {
        let resolver = AnchorResolver::default();
        let padded = Anchor::new("cowboy ");
        let hinted = resolver.apply("A cowboy rides", "rancher", &padded.clone().prefer_index(2));
        let searched = resolver.apply("A cowboy rides", "rancher", &padded);
        assert_eq!(hinted.updated_prompt(), Some("A rancher rides"));
        assert_eq!(searched.updated_prompt(), Some("A rancher rides"));
    }

    #[test]
    fn locked_region_is_left_alone() {
        let prompt = "A cowboy in a leather jacket";
        let lock = LockedSpan::capture("lock-1", prompt, 2, 8, 20).unwrap();
        let outcome = AnchorResolver::default().apply_guarded(
            prompt,
            "rancher",
            &Anchor::new("cowboy in"),
            &[lock],
        );
        assert!(matches!(&outcome, ApplyOutcome::Locked { lock_id, .. } if lock_id == "lock-1"));
        let application = outcome.into_application(None);
        assert_eq!(application.updated_prompt, None);
        assert_eq!(application.locked_by.as_deref(), Some("lock-1"));
    }

    #[test]
    fn unlocked_neighbour_can_change() {
        let prompt = "A cowboy in a leather jacket";
        let lock = LockedSpan::capture("lock-1", prompt, 2, 8, 20).unwrap();
        let outcome = AnchorResolver::default().apply_guarded(
            prompt,
            "denim",
            &Anchor::new("leather"),
            &[lock],
        );
        assert_eq!(outcome.updated_prompt(), Some("A cowboy in a denim jacket"));
    }
}
