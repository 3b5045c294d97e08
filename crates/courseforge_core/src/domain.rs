//! crates/courseforge_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or web framework, with one
//! exception: `ExercisePayload` derives serde so the tagged variant is the
//! boundary for the JSON payload column.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a course-generation job.
///
/// Transitions only move forward: Pending -> Running -> {Complete, Failed}.
/// Once a job is Complete or Failed it never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    /// The stable string code stored in the database and returned by the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` respects the monotonic forward order.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Complete)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "complete" => Ok(JobStatus::Complete),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// Durable record tracking one asynchronous course-generation request.
///
/// Acts as the mailbox between the request that triggered generation and the
/// requests polling for its result.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub id: Uuid,
    pub status: JobStatus,
    pub status_message: String,
    pub error: String,
    pub course_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub topic: String,
    pub created_at: DateTime<Utc>,
}

/// A generated lesson unit: overview, cheatsheet, exercises, flashcards.
#[derive(Debug, Clone)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub overview: String,
    pub cheatsheet: String,
    pub topic_normalized: String,
    /// Model identifier used at generation time; empty for legacy rows.
    pub generation_model: String,
    pub has_questions: bool,
    pub has_flashcards: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// One pair of items to be matched (e.g. term and definition).
///
/// The stored order is canonical: `right` at position i is the correct match
/// for `left` at position i.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingPair {
    pub left: String,
    pub right: String,
}

/// Type-specific exercise content, stored as tagged JSON in the payload
/// column and deserialized into this enum immediately after retrieval so the
/// evaluator never inspects untyped structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExercisePayload {
    MultipleChoice {
        options: Vec<String>,
        correct_index: usize,
        #[serde(default)]
        explanation: String,
    },
    MatchingPairs {
        pairs: Vec<MatchingPair>,
    },
}

impl ExercisePayload {
    /// The stable type tag stored alongside the payload.
    pub fn type_tag(&self) -> &'static str {
        match self {
            ExercisePayload::MultipleChoice { .. } => "multiple_choice",
            ExercisePayload::MatchingPairs { .. } => "matching_pairs",
        }
    }
}

/// One gradable question belonging to a course.
#[derive(Debug, Clone)]
pub struct Exercise {
    pub id: Uuid,
    pub course_id: Uuid,
    /// Zero-based position, unique within the course.
    pub order_index: usize,
    pub question: String,
    pub payload: ExercisePayload,
}

/// A short front/back study card belonging to a course.
#[derive(Debug, Clone)]
pub struct Flashcard {
    pub id: Uuid,
    pub course_id: Uuid,
    pub order_index: usize,
    pub front: String,
    pub back: String,
}

/// One recorded learner submission against an exercise. Append-only: a user
/// may have many attempts per exercise and none is ever rewritten.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub exercise_id: Uuid,
    pub correct: bool,
    pub completed_at: DateTime<Utc>,
}
