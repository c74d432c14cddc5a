//! Merging candidates into one ordered, deduplicated text body.

use std::collections::HashSet;

use crate::{Candidate, StrategyType};

/// Body used when nothing survives deduplication and cleanup.
pub const EMPTY_BODY: &str = "Nenhum conteúdo significativo encontrado.";

/// Accepted texts at or below this length never suppress other candidates.
const CONTAINMENT_MIN_LEN: usize = 50;

/// Shortest candidate or line worth keeping is one character longer.
const NOISE_MAX_LEN: usize = 3;

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

struct Accepted {
    /// Lower-cased, whitespace-collapsed form used for containment checks.
    normalized: String,
    long: bool,
}

/// Pick the candidates that make it into the body, in output order.
///
/// Types are visited in [`StrategyType::PRIORITY`] order and candidates of a
/// type in collection order. A candidate is dropped when it is too short, an
/// exact repeat, or contained in (or containing) an accepted text longer than
/// 50 characters.
pub fn dedupe(candidates: &[Candidate]) -> Vec<Candidate> {
    let mut accepted: Vec<Accepted> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();

    for kind in StrategyType::PRIORITY {
        for candidate in candidates.iter().filter(|c| c.kind == kind) {
            let text = candidate.text.as_str();
            if char_len(text.trim()) <= NOISE_MAX_LEN || seen.contains(text) {
                continue;
            }

            let normalized = collapse_whitespace(text).to_lowercase();
            let overlaps = accepted.iter().filter(|a| a.long).any(|a| {
                a.normalized.contains(normalized.as_str()) || normalized.contains(a.normalized.as_str())
            });
            if overlaps {
                continue;
            }

            seen.insert(text);
            accepted.push(Accepted {
                long: char_len(text) > CONTAINMENT_MIN_LEN,
                normalized,
            });
            out.push(candidate.clone());
        }
    }

    out
}

/// Line-level cleanup of the joined body.
///
/// Lines are trimmed and whitespace-collapsed, lines of three characters or
/// fewer are dropped, blank runs become a single blank line and consecutive
/// repeats are removed.
pub fn normalize_lines(text: &str) -> String {
    let mut cleaned: Vec<String> = Vec::new();
    let mut previous_blank = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !previous_blank && !cleaned.is_empty() {
                cleaned.push(String::new());
                previous_blank = true;
            }
            continue;
        }
        if char_len(line) > NOISE_MAX_LEN {
            cleaned.push(collapse_whitespace(line));
            previous_blank = false;
        }
    }

    cleaned.dedup();
    if cleaned.last().is_some_and(String::is_empty) {
        cleaned.pop();
    }
    cleaned.join("\n")
}

/// Deduplicate, join with blank lines and clean up.
pub fn assemble(candidates: &[Candidate]) -> String {
    let joined = dedupe(candidates)
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let body = normalize_lines(&joined);
    if body.trim().is_empty() {
        EMPTY_BODY.to_string()
    } else {
        body
    }
}
