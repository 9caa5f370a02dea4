//! Answer normalisation shared by the grader and its tests.

/// Normalise an answer for comparison: trims, collapses interior whitespace
/// runs to a single space and lowercases.
pub fn normalize_answer(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Case- and whitespace-insensitive answer comparison.
pub fn answers_match(expected: &str, given: &str) -> bool {
    normalize_answer(expected) == normalize_answer(given)
}
