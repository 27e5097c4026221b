use super::ValidationResult;
use crate::story::text::{count_blanks, count_occurrences};
use crate::story::types::{Exercise, WordSet};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuralReason {
    /// Some target is missing or duplicated in `solution_text`.
    MustBeOnce,
    /// `gap_text` does not hold one blank per target.
    GapCountMismatch,
}

impl StructuralReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MustBeOnce => "must_be_once",
            Self::GapCountMismatch => "gap_count_mismatch",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralFailure {
    pub reason: StructuralReason,
    /// Occurrences of each target in `solution_text`.
    pub counts: BTreeMap<String, usize>,
    pub gap_count: usize,
    pub expected_count: usize,
}

impl StructuralFailure {
    /// Targets absent from the solution, in word-set order.
    pub fn missing_words(&self, words: &WordSet) -> Vec<String> {
        self.words_where(words, |count| count == 0)
    }

    /// Targets that occur more than once, in word-set order.
    pub fn duplicated_words(&self, words: &WordSet) -> Vec<String> {
        self.words_where(words, |count| count > 1)
    }

    fn words_where(&self, words: &WordSet, pred: impl Fn(usize) -> bool) -> Vec<String> {
        words
            .iter()
            .filter(|w| pred(self.counts.get(w.as_str()).copied().unwrap_or(0)))
            .cloned()
            .collect()
    }
}

pub fn occurrence_counts(solution_text: &str, words: &WordSet) -> BTreeMap<String, usize> {
    words
        .iter()
        .map(|w| (w.clone(), count_occurrences(solution_text, w)))
        .collect()
}

/// Each target exactly once in the solution, one blank per target.
pub fn check(exercise: &Exercise, words: &WordSet) -> ValidationResult {
    let counts = occurrence_counts(&exercise.solution_text, words);
    let gap_count = count_blanks(&exercise.gap_text);
    let expected_count = words.len();

    let reason = if counts.values().any(|&c| c != 1) {
        StructuralReason::MustBeOnce
    } else if gap_count != expected_count {
        StructuralReason::GapCountMismatch
    } else {
        return ValidationResult::Ok;
    };

    ValidationResult::StructuralFailure(StructuralFailure {
        reason,
        counts,
        gap_count,
        expected_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(list: &[&str]) -> WordSet {
        WordSet::new(list.iter().map(ToString::to_string).collect()).unwrap()
    }

    fn exercise(gap: &str, solution: &str, words: &WordSet) -> Exercise {
        Exercise {
            gap_text: gap.into(),
            solution_text: solution.into(),
            used_words: words.as_slice().to_vec(),
            gaps_meta: vec![],
            notes: vec![],
        }
    }

    #[test]
    fn valid_whale_owl_exercise_passes() {
        let words = set(&["whale", "owl"]);
        let ex = exercise(
            "The ______ swam. The ______ hooted.",
            "The whale swam. The owl hooted.",
            &words,
        );
        assert_eq!(check(&ex, &words), ValidationResult::Ok);
    }

    #[test]
    fn duplicate_and_missing_words_fail_must_be_once() {
        let words = set(&["whale", "owl"]);
        let ex = exercise(
            "The ______ swam. The ______ dived.",
            "The whale swam. The whale dived.",
            &words,
        );
        let ValidationResult::StructuralFailure(failure) = check(&ex, &words) else {
            panic!("expected structural failure");
        };
        assert_eq!(failure.reason, StructuralReason::MustBeOnce);
        assert_eq!(failure.counts["whale"], 2);
        assert_eq!(failure.counts["owl"], 0);
        assert_eq!(failure.missing_words(&words), vec!["owl"]);
        assert_eq!(failure.duplicated_words(&words), vec!["whale"]);
    }

    #[test]
    fn wrong_blank_count_fails_gap_count_mismatch() {
        let words = set(&["whale", "owl"]);
        let ex = exercise(
            "The ______ swam. The owl hooted.",
            "The whale swam. The owl hooted.",
            &words,
        );
        let ValidationResult::StructuralFailure(failure) = check(&ex, &words) else {
            panic!("expected structural failure");
        };
        assert_eq!(failure.reason, StructuralReason::GapCountMismatch);
        assert_eq!(failure.gap_count, 1);
        assert_eq!(failure.expected_count, 2);
        assert!(failure.missing_words(&words).is_empty());
    }

    #[test]
    fn substring_hits_do_not_satisfy_a_word() {
        let words = set(&["owl"]);
        let ex = exercise("A ______ sat.", "A bowl sat.", &words);
        assert_eq!(check(&ex, &words).reason(), "must_be_once");
    }

    #[test]
    fn matching_ignores_case() {
        let words = set(&["whale"]);
        let ex = exercise("______ songs carry far.", "Whale songs carry far.", &words);
        assert!(check(&ex, &words).is_ok());
    }
}
