//! Fuzzy filename matcher.
//!
//! Resolution ladder, strictest first: exact, normalized (case/extension
//! noise stripped), prefix (with a length ratio floor so shared stems do not
//! cross-match), token-set Jaccard. Names that differ only in a digit or a
//! trailing character must never cross-resolve: the exact and normalized
//! rungs catch the right candidate before prefix ever runs, and a literal
//! prefix cannot bridge a differing character inside the shorter name.

use std::collections::BTreeSet;

/// Image extensions stripped during normalization (sidecar names usually
/// embed them: `scan 12.jpg.ref.json`).
const IMAGE_EXTENSIONS: [&str; 8] = [
    ".jpg", ".jpeg", ".png", ".gif", ".tiff", ".tif", ".bmp", ".webp",
];

/// Sidecar suffix stripped before image extensions.
const REF_SUFFIX: &str = ".ref.json";

/// Prefix matches require the shorter side to cover this share of the longer.
const PREFIX_MIN_RATIO: f64 = 0.6;

/// Normalized strings shorter than this never prefix-match.
const PREFIX_MIN_CHARS: usize = 4;

/// Token-set similarity floor for the last rung.
const TOKEN_MIN_JACCARD: f64 = 0.7;

/// How confident the matcher is in a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchConfidence {
    Exact,
    Normalized,
    Prefix,
    Token,
}

impl MatchConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchConfidence::Exact => "exact",
            MatchConfidence::Normalized => "normalized",
            MatchConfidence::Prefix => "prefix",
            MatchConfidence::Token => "token",
        }
    }
}

/// Lowercase, strip `.ref.json` then image extensions, collapse whitespace.
pub fn normalize(name: &str) -> String {
    let mut s = name.to_lowercase();

    if let Some(stripped) = s.strip_suffix(REF_SUFFIX) {
        s = stripped.to_string();
    }
    for ext in IMAGE_EXTENSIONS {
        if let Some(stripped) = s.strip_suffix(ext) {
            s = stripped.to_string();
            break;
        }
    }

    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a normalized name into its token set.
fn token_set(normalized: &str) -> BTreeSet<String> {
    normalized
        .split(|c: char| matches!(c, ' ' | '_' | '-' | '.'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

struct MatchEntry {
    original: String,
    normalized: String,
    tokens: BTreeSet<String>,
}

/// A batched matcher over one request's input names.
///
/// Normalized forms and token sets are computed once at construction;
/// each lookup is O(|inputs|).
pub struct NameMatcher {
    entries: Vec<MatchEntry>,
}

impl NameMatcher {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Self {
        let entries = names
            .iter()
            .map(|n| {
                let original = n.as_ref().to_string();
                let normalized = normalize(&original);
                let tokens = token_set(&normalized);
                MatchEntry {
                    original,
                    normalized,
                    tokens,
                }
            })
            .collect();
        Self { entries }
    }

    /// Resolve a model-returned string to an input name.
    pub fn resolve(&self, s: &str) -> Option<(&str, MatchConfidence)> {
        // 1. Exact.
        if let Some(entry) = self.entries.iter().find(|e| e.original == s) {
            return Some((&entry.original, MatchConfidence::Exact));
        }

        // 2. Normalized. On ties, the first input wins.
        let norm = normalize(s);
        if !norm.is_empty() {
            if let Some(entry) = self.entries.iter().find(|e| e.normalized == norm) {
                return Some((&entry.original, MatchConfidence::Normalized));
            }
        }

        // 3. Prefix, either direction, with a length-ratio floor.
        if norm.len() >= PREFIX_MIN_CHARS {
            if let Some(entry) = self.entries.iter().find(|e| prefix_match(&norm, &e.normalized)) {
                return Some((&entry.original, MatchConfidence::Prefix));
            }
        }

        // 4. Token-set similarity; best candidate above the floor wins.
        let query_tokens = token_set(&norm);
        if !query_tokens.is_empty() {
            let mut best: Option<(usize, f64)> = None;
            for (idx, entry) in self.entries.iter().enumerate() {
                let score = jaccard(&query_tokens, &entry.tokens);
                if score >= TOKEN_MIN_JACCARD
                    && best.is_none_or(|(_, best_score)| score > best_score)
                {
                    best = Some((idx, score));
                }
            }
            if let Some((idx, _)) = best {
                return Some((&self.entries[idx].original, MatchConfidence::Token));
            }
        }

        None
    }
}

fn prefix_match(a: &str, b: &str) -> bool {
    let (shorter, longer) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if shorter.len() < PREFIX_MIN_CHARS || longer.is_empty() {
        return false;
    }
    longer.starts_with(shorter) && shorter.len() as f64 >= PREFIX_MIN_RATIO * longer.len() as f64
}
