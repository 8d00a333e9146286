//! Candidate scoring for multi-candidate completions.

use std::collections::BTreeSet;

use tg_providers::CandidateCompletion;

/// Phrases that suggest a response is handing the student solution code.
pub const CODE_LEAKAGE_MARKERS: [&str; 3] = ["```", "should look like", "should look something like"];

const AVOID_PENALTY: i64 = 1;
const LEAKAGE_PENALTY: i64 = 100;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AvoidSet
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Terms an instructor does not want answers to mention (e.g. `eval()`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvoidSet {
    terms: BTreeSet<String>,
}

impl AvoidSet {
    /// One term per line; surrounding whitespace and blank lines are dropped.
    pub fn parse(text: &str) -> Self {
        Self {
            terms: text
                .lines()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }
}

impl<S: Into<String>> FromIterator<S> for AvoidSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().map(Into::into).collect(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Scoring
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Score one response text. `0` is best; matches are case-sensitive.
pub fn score(text: &str, avoid: &AvoidSet) -> i64 {
    let avoided: i64 = avoid
        .iter()
        .map(|term| text.matches(term).count() as i64 * AVOID_PENALTY)
        .sum();
    let leaked: i64 = CODE_LEAKAGE_MARKERS
        .iter()
        .map(|marker| text.matches(marker).count() as i64 * LEAKAGE_PENALTY)
        .sum();
    -(avoided + leaked)
}

/// The first code-leakage marker found in `text`, if any.
pub fn leakage_marker(text: &str) -> Option<&'static str> {
    CODE_LEAKAGE_MARKERS.into_iter().find(|m| text.contains(m))
}

/// Pick the highest-scoring candidate. Ties go to the earliest candidate.
pub fn select_best<'a>(
    candidates: &'a [CandidateCompletion],
    avoid: &AvoidSet,
) -> Option<&'a CandidateCompletion> {
    let mut best: Option<(&CandidateCompletion, i64)> = None;
    for candidate in candidates {
        let s = score(&candidate.text, avoid);
        match best {
            Some((_, top)) if s <= top => {}
            _ => best = Some((candidate, s)),
        }
    }
    best.map(|(c, _)| c)
}
