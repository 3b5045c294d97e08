//! crates/courseforge_core/src/eval.rs
//!
//! Answer evaluation for the two exercise kinds, plus the shuffled
//! presentation order for matching exercises. Pure functions: the only side
//! effect of grading (recording an attempt) belongs to the caller.
//!
//! Malformed submissions are never errors. A non-numeric or out-of-range
//! answer simply scores as incorrect.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;

use crate::domain::MatchingPair;

/// Grades a multiple-choice submission. Correct iff the submitted text parses
/// as an index that is in range and equals `correct_index`.
pub fn evaluate_multiple_choice(options: &[String], correct_index: usize, submitted: &str) -> bool {
    match submitted.trim().parse::<usize>() {
        Ok(index) => index < options.len() && index == correct_index,
        Err(_) => false,
    }
}

/// Grades a matching submission. `submitted` maps each left position to the
/// learner's chosen right item, identified by its original index.
///
/// All-or-nothing: correct iff the map has exactly `pair_count` entries and
/// every left position i is matched to right index i (the canonical order).
pub fn evaluate_matching(pair_count: usize, submitted: &BTreeMap<usize, String>) -> bool {
    if submitted.len() != pair_count {
        return false;
    }
    (0..pair_count).all(|i| {
        submitted
            .get(&i)
            .and_then(|choice| choice.trim().parse::<usize>().ok())
            == Some(i)
    })
}

/// Produces the display order for the right-hand items of a matching
/// exercise: `(original_index, right_text)` pairs in a fresh random
/// permutation. The original index travels with each displayed choice so a
/// selection maps straight back to the canonical order for grading.
pub fn shuffle_presentation(pairs: &[MatchingPair]) -> Vec<(usize, String)> {
    let mut indices: Vec<usize> = (0..pairs.len()).collect();
    indices.shuffle(&mut rand::thread_rng());
    indices
        .into_iter()
        .map(|i| (i, pairs[i].right.clone()))
        .collect()
}
