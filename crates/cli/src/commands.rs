use anyhow::{anyhow, Result};
use log::info;
use serde::{Deserialize, Serialize};
use suggest_anchor::{AnchorMatch, AnchorResolver, LockResolution};
use suggest_cache::document_hash;
use suggest_engine::EngineConfig;
use suggest_protocol::{
    Anchor, Highlight, LockedSpan, RawSpan, SpanPayload, SuggestionApplication, Utf16Text,
};
use suggest_spans::{GraphemeIndex, GraphemeMapper, NormalizeReport, SpanNormalizer, Taxonomy};

#[derive(Deserialize)]
#[serde(untagged)]
enum SpansInput {
    Payload(SpanPayload),
    Bare(Vec<RawSpan>),
}

pub fn parse_spans(raw: &str) -> Result<Vec<RawSpan>> {
    Ok(match serde_json::from_str(raw)? {
        SpansInput::Payload(payload) => payload.spans,
        SpansInput::Bare(spans) => spans,
    })
}

pub fn parse_taxonomy(raw: &str) -> Result<Taxonomy> {
    Ok(Taxonomy::from_json_str(raw)?)
}

#[derive(Serialize)]
pub struct NormalizeOutput {
    pub highlights: Vec<Highlight>,
    pub report: NormalizeReport,
}

pub fn normalize(
    config: &EngineConfig,
    text: &str,
    spans: &[RawSpan],
    taxonomy: &Taxonomy,
    graphemes: bool,
) -> NormalizeOutput {
    let index = graphemes.then(|| GraphemeIndex::new(text));
    let mapper = index.as_ref().map(|index| index as &dyn GraphemeMapper);
    let output =
        SpanNormalizer::new(config.normalizer()).normalize_with_report(spans, text, taxonomy, mapper);
    info!(
        "{} spans in, {} highlights out",
        output.report.input, output.report.emitted
    );
    NormalizeOutput {
        highlights: output.highlights,
        report: output.report,
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AnchorInput {
    Locks(Vec<LockedSpan>),
    Single(Anchor),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedAnchor {
    pub found: Option<AnchorMatch>,
    /// Text currently at the resolved range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum ResolveOutput {
    Anchor(ResolvedAnchor),
    Locks(LockResolution),
}

pub fn resolve(config: &EngineConfig, text: &str, raw: &str) -> Result<ResolveOutput> {
    let resolver = AnchorResolver::new(config.resolver());
    Ok(match serde_json::from_str(raw)? {
        AnchorInput::Single(anchor) => {
            let found = resolver.resolve(text, &anchor);
            let quoted = found.map(|m| Utf16Text::new(text).slice(m.start, m.end).to_string());
            ResolveOutput::Anchor(ResolvedAnchor {
                found,
                text: quoted,
            })
        }
        AnchorInput::Locks(locks) => ResolveOutput::Locks(resolver.resolve_locks(text, &locks)),
    })
}

pub fn apply(
    config: &EngineConfig,
    text: &str,
    suggestion: &str,
    anchor: &Anchor,
    locks: &[LockedSpan],
    idempotency_key: Option<String>,
) -> SuggestionApplication {
    AnchorResolver::new(config.resolver())
        .apply_guarded(text, suggestion, anchor, locks)
        .into_application(idempotency_key)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintOutput {
    pub fingerprint: String,
    pub document_hash: String,
    pub anchor: Anchor,
}

pub fn fingerprint(
    config: &EngineConfig,
    text: &str,
    start: usize,
    end: usize,
) -> Result<FingerprintOutput> {
    let anchor = Anchor::capture(text, start, end, config.context_window)
        .ok_or_else(|| anyhow!("selection [{start}, {end}) is empty"))?;
    let fingerprint = config.fingerprint().for_anchor(&anchor, text);
    Ok(FingerprintOutput {
        fingerprint,
        document_hash: document_hash(text),
        anchor,
    })
}
