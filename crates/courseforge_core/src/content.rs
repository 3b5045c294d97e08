//! crates/courseforge_core/src/content.rs
//!
//! The structured-output contract of the course generation service, plus the
//! validation applied to generated content before anything is persisted.
//! A violation fails the whole generation job; content is never silently
//! truncated or padded into shape.

use serde::{Deserialize, Serialize};

use crate::domain::MatchingPair;
use crate::ports::GenerationRequest;

/// Exactly this many options per multiple-choice exercise.
pub const MULTIPLE_CHOICE_OPTIONS: usize = 4;
/// Allowed pair counts for a matching exercise.
pub const MIN_MATCHING_PAIRS: usize = 4;
pub const MAX_MATCHING_PAIRS: usize = 6;

/// One exercise as produced by the generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExerciseItem {
    MultipleChoice {
        question: String,
        options: Vec<String>,
        correct_index: usize,
        #[serde(default)]
        explanation: String,
    },
    Matching {
        question: String,
        pairs: Vec<MatchingPair>,
    },
}

/// One flashcard as produced by the generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashcardItem {
    pub front: String,
    pub back: String,
}

/// Full course content as returned by the generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseContent {
    pub title: String,
    pub overview: String,
    pub cheatsheet: String,
    #[serde(default)]
    pub exercises: Vec<ExerciseItem>,
    #[serde(default)]
    pub flashcards: Vec<FlashcardItem>,
}

/// A structural violation in generated content.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("exercise {index} has {count} options; multiple choice requires exactly {MULTIPLE_CHOICE_OPTIONS}")]
    WrongOptionCount { index: usize, count: usize },
    #[error("exercise {index} has correct_index {correct_index}, outside 0..{MULTIPLE_CHOICE_OPTIONS}")]
    CorrectIndexOutOfRange { index: usize, correct_index: usize },
    #[error("exercise {index} has {count} pairs; matching requires {MIN_MATCHING_PAIRS} to {MAX_MATCHING_PAIRS}")]
    WrongPairCount { index: usize, count: usize },
    #[error("questions were requested but the generator returned no exercises")]
    NoExercises,
    #[error("flashcards were requested but the generator returned no flashcards")]
    NoFlashcards,
}

/// Checks generated content against the shape invariants before persistence.
pub fn validate(content: &CourseContent, request: &GenerationRequest) -> Result<(), ContentError> {
    for (index, item) in content.exercises.iter().enumerate() {
        match item {
            ExerciseItem::MultipleChoice {
                options,
                correct_index,
                ..
            } => {
                if options.len() != MULTIPLE_CHOICE_OPTIONS {
                    return Err(ContentError::WrongOptionCount {
                        index,
                        count: options.len(),
                    });
                }
                if *correct_index >= MULTIPLE_CHOICE_OPTIONS {
                    return Err(ContentError::CorrectIndexOutOfRange {
                        index,
                        correct_index: *correct_index,
                    });
                }
            }
            ExerciseItem::Matching { pairs, .. } => {
                if pairs.len() < MIN_MATCHING_PAIRS || pairs.len() > MAX_MATCHING_PAIRS {
                    return Err(ContentError::WrongPairCount {
                        index,
                        count: pairs.len(),
                    });
                }
            }
        }
    }

    if request.include_questions && content.exercises.is_empty() {
        return Err(ContentError::NoExercises);
    }
    if request.include_flashcards && content.flashcards.is_empty() {
        return Err(ContentError::NoFlashcards);
    }

    Ok(())
}

/// Turns a course title into a URL-safe slug candidate. Uniqueness against
/// existing courses is the persistence layer's job.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            for lower in c.to_lowercase() {
                slug.push(lower);
            }
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "course".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::Difficulty;

    fn request(questions: bool, flashcards: bool) -> GenerationRequest {
        GenerationRequest {
            topic: "Binary Search".to_string(),
            difficulty: Difficulty::Intermediate,
            additional_instructions: None,
            include_questions: questions,
            include_flashcards: flashcards,
            num_exercises: None,
            num_flashcards: None,
        }
    }

    fn multiple_choice(option_count: usize, correct_index: usize) -> ExerciseItem {
        ExerciseItem::MultipleChoice {
            question: "Which?".to_string(),
            options: (0..option_count).map(|i| format!("option {}", i)).collect(),
            correct_index,
            explanation: String::new(),
        }
    }

    fn matching(pair_count: usize) -> ExerciseItem {
        ExerciseItem::Matching {
            question: "Match.".to_string(),
            pairs: (0..pair_count)
                .map(|i| MatchingPair {
                    left: format!("left {}", i),
                    right: format!("right {}", i),
                })
                .collect(),
        }
    }

    fn content(exercises: Vec<ExerciseItem>, flashcards: Vec<FlashcardItem>) -> CourseContent {
        CourseContent {
            title: "Binary Search".to_string(),
            overview: "Learn binary search.".to_string(),
            cheatsheet: "### Key facts".to_string(),
            exercises,
            flashcards,
        }
    }

    #[test]
    fn accepts_well_formed_content() {
        let content = content(
            vec![multiple_choice(4, 3), matching(4), matching(6)],
            vec![FlashcardItem {
                front: "O(?)".to_string(),
                back: "O(log n)".to_string(),
            }],
        );
        assert!(validate(&content, &request(true, true)).is_ok());
    }

    #[test]
    fn rejects_wrong_option_count() {
        for count in [3, 5] {
            let content = content(vec![multiple_choice(count, 0)], vec![]);
            assert!(matches!(
                validate(&content, &request(true, false)),
                Err(ContentError::WrongOptionCount { index: 0, .. })
            ));
        }
    }

    #[test]
    fn rejects_correct_index_out_of_range() {
        let content = content(vec![multiple_choice(4, 4)], vec![]);
        assert!(matches!(
            validate(&content, &request(true, false)),
            Err(ContentError::CorrectIndexOutOfRange {
                index: 0,
                correct_index: 4
            })
        ));
    }

    #[test]
    fn rejects_pair_count_outside_bounds() {
        for count in [3, 7] {
            let content = content(vec![matching(count)], vec![]);
            assert!(matches!(
                validate(&content, &request(true, false)),
                Err(ContentError::WrongPairCount { index: 0, .. })
            ));
        }
    }

    #[test]
    fn rejects_missing_content_for_requested_kind() {
        let no_exercises = content(vec![], vec![]);
        assert!(matches!(
            validate(&no_exercises, &request(true, false)),
            Err(ContentError::NoExercises)
        ));

        let no_flashcards = content(vec![multiple_choice(4, 0)], vec![]);
        assert!(matches!(
            validate(&no_flashcards, &request(true, true)),
            Err(ContentError::NoFlashcards)
        ));

        // Flashcards-only request does not require exercises.
        let cards_only = content(
            vec![],
            vec![FlashcardItem {
                front: "f".to_string(),
                back: "b".to_string(),
            }],
        );
        assert!(validate(&cards_only, &request(false, true)).is_ok());
    }

    #[test]
    fn exercise_items_parse_from_tagged_json() {
        let json = r####"{
            "title": "Python list comprehensions",
            "overview": "You will learn list comprehensions.",
            "cheatsheet": "### Syntax\n- [x for x in xs]",
            "exercises": [
                {"type": "multiple_choice", "question": "Result of [x*2 for x in [1,2,3]]?",
                 "options": ["[2,4,6]", "[1,2,3]", "[]", "Error"], "correct_index": 0},
                {"type": "matching", "question": "Match construct to description.",
                 "pairs": [{"left": "a", "right": "1"}, {"left": "b", "right": "2"},
                           {"left": "c", "right": "3"}, {"left": "d", "right": "4"}]}
            ],
            "flashcards": [{"front": "f", "back": "b"}]
        }"####;
        let content: CourseContent = serde_json::from_str(json).unwrap();
        assert_eq!(content.exercises.len(), 2);
        assert!(matches!(
            content.exercises[0],
            ExerciseItem::MultipleChoice { correct_index: 0, .. }
        ));
        assert!(matches!(&content.exercises[1], ExerciseItem::Matching { pairs, .. } if pairs.len() == 4));
        assert_eq!(content.flashcards.len(), 1);
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let json = r#"{"title": "t", "overview": "o", "cheatsheet": "c"}"#;
        let content: CourseContent = serde_json::from_str(json).unwrap();
        assert!(content.exercises.is_empty());
        assert!(content.flashcards.is_empty());
    }

    #[test]
    fn slugify_produces_url_safe_slugs() {
        assert_eq!(slugify("Intro Python"), "intro-python");
        assert_eq!(slugify("  C++ & Rust!  "), "c-rust");
        assert_eq!(slugify("Álgebra Básica"), "álgebra-básica");
        assert_eq!(slugify("???"), "course");
    }
}
