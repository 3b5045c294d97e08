//! crates/courseforge_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the
//! core to be independent of specific external implementations like databases
//! or LLM APIs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::content::CourseContent;
use crate::domain::{
    Attempt, Course, Exercise, ExercisePayload, Flashcard, GenerationJob,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Generation Request
//=========================================================================================

/// Target difficulty for a generated course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "beginner" => Ok(Difficulty::Beginner),
            "intermediate" => Ok(Difficulty::Intermediate),
            "advanced" => Ok(Difficulty::Advanced),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

/// Everything the generation service needs to produce one course.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub topic: String,
    pub difficulty: Difficulty,
    pub additional_instructions: Option<String>,
    pub include_questions: bool,
    pub include_flashcards: bool,
    pub num_exercises: Option<u8>,
    pub num_flashcards: Option<u8>,
}

/// Fields needed to persist a new course. The store assigns id, timestamps,
/// and a guaranteed-unique slug derived from the title.
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub title: String,
    pub overview: String,
    pub cheatsheet: String,
    pub topic_normalized: String,
    pub generation_model: String,
    pub has_questions: bool,
    pub has_flashcards: bool,
    pub created_by: Option<Uuid>,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The persistence gateway. Courses and their exercises/flashcards are owned
/// by the implementation; the core operates on them as values.
#[async_trait]
pub trait CourseStore: Send + Sync {
    // --- Generation Jobs ---

    /// Creates a job in Pending state and returns it.
    async fn create_job(&self, created_by: Option<Uuid>, topic: &str) -> PortResult<GenerationJob>;

    async fn get_job(&self, job_id: Uuid) -> PortResult<GenerationJob>;

    /// Guarded Pending -> Running transition. An unknown or already-advanced
    /// job is a logged no-op.
    async fn mark_job_running(&self, job_id: Uuid, message: &str) -> PortResult<()>;

    /// Guarded Running -> Complete transition, attaching the produced course.
    async fn mark_job_complete(
        &self,
        job_id: Uuid,
        course_id: Uuid,
        message: &str,
    ) -> PortResult<()>;

    /// Guarded (Pending|Running) -> Failed transition, recording error detail.
    async fn mark_job_failed(&self, job_id: Uuid, error: &str) -> PortResult<()>;

    // --- Courses ---

    /// Persists a course under a guaranteed-unique slug: the slugified title,
    /// suffixed `-1`, `-2`, ... until free.
    async fn create_course(&self, new_course: NewCourse) -> PortResult<Course>;

    async fn get_course_by_slug(&self, slug: &str) -> PortResult<Course>;

    async fn get_course_by_id(&self, course_id: Uuid) -> PortResult<Course>;

    /// All courses, newest first.
    async fn list_courses(&self) -> PortResult<Vec<Course>>;

    // --- Exercises and Flashcards ---

    async fn create_exercise(
        &self,
        course_id: Uuid,
        order_index: usize,
        question: &str,
        payload: &ExercisePayload,
    ) -> PortResult<Exercise>;

    /// Exercises of a course in order_index order.
    async fn exercises_for_course(&self, course_id: Uuid) -> PortResult<Vec<Exercise>>;

    async fn create_flashcard(
        &self,
        course_id: Uuid,
        order_index: usize,
        front: &str,
        back: &str,
    ) -> PortResult<Flashcard>;

    /// Flashcards of a course in order_index order.
    async fn flashcards_for_course(&self, course_id: Uuid) -> PortResult<Vec<Flashcard>>;

    // --- Progress ---

    /// Records one attempt. Append-only: re-submissions create new rows.
    async fn record_attempt(
        &self,
        user_id: Uuid,
        exercise_id: Uuid,
        correct: bool,
    ) -> PortResult<Attempt>;

    /// How many distinct exercises of the course the user has attempted.
    async fn distinct_exercises_attempted(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> PortResult<u64>;
}

/// The content-generation service. One call produces the full structured
/// course content; network or schema failures surface as a single error the
/// job failure path can record.
#[async_trait]
pub trait CourseGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> PortResult<CourseContent>;

    /// Model identifier recorded on courses produced by this generator.
    fn model_name(&self) -> &str;
}
