//! NER tagger contract (§6.4, §4.5): `tag(text) -> [{start, end, label, confidence}]`.

use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub label: String,
    pub confidence: f64,
}

#[async_trait::async_trait]
pub trait NerTagger: Send + Sync {
    async fn tag(&self, text: &str) -> AppResult<Vec<Span>>;
}

/// No-op tagger for tests and environments without a spaCy backend reachable:
/// returns no spans, leaving NER-sourced entities absent (regex/header
/// extraction still runs, per §4.5's independent source tagging).
pub struct NoopNerTagger;

#[async_trait::async_trait]
impl NerTagger for NoopNerTagger {
    async fn tag(&self, _text: &str) -> AppResult<Vec<Span>> {
        Ok(Vec::new())
    }
}

/// Capitalized-run heuristic tagger used by tests in place of a real spaCy
/// model: tags runs of 2+ Title-Case words as `PERSON` and single
/// Title-Case words followed by "Inc"/"LLC"/"Corp" as `ORG`. Good enough to
/// exercise the entity-extraction pipeline deterministically without a
/// network dependency.
pub struct HeuristicNerTagger;

#[async_trait::async_trait]
impl NerTagger for HeuristicNerTagger {
    async fn tag(&self, text: &str) -> AppResult<Vec<Span>> {
        let mut spans = Vec::new();
        let words: Vec<(usize, &str)> = text
            .split_whitespace()
            .scan(0usize, |pos, w| {
                let start = text[*pos..].find(w).map(|i| i + *pos).unwrap_or(*pos);
                *pos = start + w.len();
                Some((start, w))
            })
            .collect();

        let is_title_case = |w: &str| {
            let w = w.trim_matches(|c: char| !c.is_alphanumeric());
            w.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
                && w.len() > 1
                && w.chars().skip(1).all(|c| c.is_lowercase() || !c.is_alphabetic())
        };

        let mut i = 0;
        while i < words.len() {
            let (start, w) = words[i];
            if is_title_case(w) {
                let mut j = i + 1;
                while j < words.len() && is_title_case(words[j].1) {
                    j += 1;
                }
                if j - i >= 2 {
                    let end = words[j - 1].0 + words[j - 1].1.len();
                    let label = if words[j - 1]
                        .1
                        .trim_matches(|c: char| !c.is_alphanumeric())
                        .eq_ignore_ascii_case("inc")
                        || words[j - 1]
                            .1
                            .trim_matches(|c: char| !c.is_alphanumeric())
                            .eq_ignore_ascii_case("llc")
                        || words[j - 1]
                            .1
                            .trim_matches(|c: char| !c.is_alphanumeric())
                            .eq_ignore_ascii_case("corp")
                    {
                        "ORG"
                    } else {
                        "PERSON"
                    };
                    spans.push(Span {
                        start,
                        end,
                        label: label.to_string(),
                        confidence: 0.7,
                    });
                }
                i = j;
            } else {
                i += 1;
            }
        }
        Ok(spans)
    }
}
