//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `CourseStore` port from the `core` crate. It handles all interactions
//! with the SQLite database using `sqlx`.
//!
//! Job status updates are guarded in SQL (`WHERE status = ...`) so transitions
//! only ever move forward and a terminal job can never change again, no matter
//! which concurrency context issues the update.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use courseforge_core::content::slugify;
use courseforge_core::domain::{
    Attempt, Course, Exercise, ExercisePayload, Flashcard, GenerationJob, JobStatus,
};
use courseforge_core::ports::{CourseStore, NewCourse, PortError, PortResult};
use sqlx::{FromRow, SqlitePool};
use tracing::warn;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `CourseStore` port.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Creates a new `SqliteStore`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn slug_exists(&self, slug: &str) -> PortResult<bool> {
        let exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM courses WHERE slug = ?1)")
                .bind(slug)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(exists != 0)
    }
}

//=========================================================================================
// Conversion Helpers
//=========================================================================================

fn parse_uuid(value: &str) -> PortResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| PortError::Unexpected(format!("invalid uuid '{}' in database: {}", value, e)))
}

fn parse_timestamp(value: &str) -> PortResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            PortError::Unexpected(format!("invalid timestamp '{}' in database: {}", value, e))
        })
}

/// Stable, sortable timestamp encoding for TEXT columns.
fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct JobRecord {
    id: String,
    status: String,
    status_message: String,
    error: String,
    course_id: Option<String>,
    created_by: Option<String>,
    topic: String,
    created_at: String,
}

impl JobRecord {
    fn to_domain(self) -> PortResult<GenerationJob> {
        Ok(GenerationJob {
            id: parse_uuid(&self.id)?,
            status: self
                .status
                .parse::<JobStatus>()
                .map_err(PortError::Unexpected)?,
            status_message: self.status_message,
            error: self.error,
            course_id: self.course_id.as_deref().map(parse_uuid).transpose()?,
            created_by: self.created_by.as_deref().map(parse_uuid).transpose()?,
            topic: self.topic,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

#[derive(FromRow)]
struct CourseRecord {
    id: String,
    title: String,
    slug: String,
    overview: String,
    cheatsheet: String,
    topic_normalized: String,
    generation_model: String,
    has_questions: bool,
    has_flashcards: bool,
    created_by: Option<String>,
    created_at: String,
}

impl CourseRecord {
    fn to_domain(self) -> PortResult<Course> {
        Ok(Course {
            id: parse_uuid(&self.id)?,
            title: self.title,
            slug: self.slug,
            overview: self.overview,
            cheatsheet: self.cheatsheet,
            topic_normalized: self.topic_normalized,
            generation_model: self.generation_model,
            has_questions: self.has_questions,
            has_flashcards: self.has_flashcards,
            created_by: self.created_by.as_deref().map(parse_uuid).transpose()?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

#[derive(FromRow)]
struct ExerciseRecord {
    id: String,
    course_id: String,
    order_index: i64,
    question: String,
    payload: String,
}

impl ExerciseRecord {
    fn to_domain(self) -> PortResult<Exercise> {
        // Deserialize into the typed variant right at the boundary; nothing
        // downstream ever looks at raw JSON.
        let payload: ExercisePayload = serde_json::from_str(&self.payload).map_err(|e| {
            PortError::Unexpected(format!("invalid exercise payload in database: {}", e))
        })?;
        Ok(Exercise {
            id: parse_uuid(&self.id)?,
            course_id: parse_uuid(&self.course_id)?,
            order_index: self.order_index as usize,
            question: self.question,
            payload,
        })
    }
}

#[derive(FromRow)]
struct FlashcardRecord {
    id: String,
    course_id: String,
    order_index: i64,
    front: String,
    back: String,
}

impl FlashcardRecord {
    fn to_domain(self) -> PortResult<Flashcard> {
        Ok(Flashcard {
            id: parse_uuid(&self.id)?,
            course_id: parse_uuid(&self.course_id)?,
            order_index: self.order_index as usize,
            front: self.front,
            back: self.back,
        })
    }
}

const JOB_COLUMNS: &str =
    "id, status, status_message, error, course_id, created_by, topic, created_at";
const COURSE_COLUMNS: &str = "id, title, slug, overview, cheatsheet, topic_normalized, \
     generation_model, has_questions, has_flashcards, created_by, created_at";

//=========================================================================================
// `CourseStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CourseStore for SqliteStore {
    async fn create_job(&self, created_by: Option<Uuid>, topic: &str) -> PortResult<GenerationJob> {
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        sqlx::query(
            "INSERT INTO generation_jobs (id, status, status_message, error, created_by, topic, created_at) \
             VALUES (?1, 'pending', 'Waiting to start...', '', ?2, ?3, ?4)",
        )
        .bind(id.to_string())
        .bind(created_by.map(|u| u.to_string()))
        .bind(topic)
        .bind(format_timestamp(created_at))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        self.get_job(id).await
    }

    async fn get_job(&self, job_id: Uuid) -> PortResult<GenerationJob> {
        let record = sqlx::query_as::<_, JobRecord>(&format!(
            "SELECT {JOB_COLUMNS} FROM generation_jobs WHERE id = ?1"
        ))
        .bind(job_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Job {} not found", job_id)))?;
        record.to_domain()
    }

    async fn mark_job_running(&self, job_id: Uuid, message: &str) -> PortResult<()> {
        let affected = sqlx::query(
            "UPDATE generation_jobs SET status = 'running', status_message = ?1 \
             WHERE id = ?2 AND status = 'pending'",
        )
        .bind(message)
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?
        .rows_affected();

        if affected == 0 {
            warn!(%job_id, "job not advanced to running: missing or already past pending");
        }
        Ok(())
    }

    async fn mark_job_complete(
        &self,
        job_id: Uuid,
        course_id: Uuid,
        message: &str,
    ) -> PortResult<()> {
        let affected = sqlx::query(
            "UPDATE generation_jobs SET status = 'complete', status_message = ?1, course_id = ?2 \
             WHERE id = ?3 AND status = 'running'",
        )
        .bind(message)
        .bind(course_id.to_string())
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?
        .rows_affected();

        if affected == 0 {
            warn!(%job_id, "job not marked complete: missing or not running");
        }
        Ok(())
    }

    async fn mark_job_failed(&self, job_id: Uuid, error: &str) -> PortResult<()> {
        let affected = sqlx::query(
            "UPDATE generation_jobs SET status = 'failed', status_message = 'Generation failed.', error = ?1 \
             WHERE id = ?2 AND status IN ('pending', 'running')",
        )
        .bind(error)
        .bind(job_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?
        .rows_affected();

        if affected == 0 {
            warn!(%job_id, "job not marked failed: missing or already terminal");
        }
        Ok(())
    }

    async fn create_course(&self, new_course: NewCourse) -> PortResult<Course> {
        let base_slug = slugify(&new_course.title);
        let mut slug = base_slug.clone();
        let mut n = 1;
        while self.slug_exists(&slug).await? {
            slug = format!("{}-{}", base_slug, n);
            n += 1;
        }

        let id = Uuid::new_v4();
        let created_at = Utc::now();
        sqlx::query(
            "INSERT INTO courses \
             (id, title, slug, overview, cheatsheet, topic_normalized, generation_model, \
              has_questions, has_flashcards, created_by, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(id.to_string())
        .bind(&new_course.title)
        .bind(&slug)
        .bind(&new_course.overview)
        .bind(&new_course.cheatsheet)
        .bind(&new_course.topic_normalized)
        .bind(&new_course.generation_model)
        .bind(new_course.has_questions)
        .bind(new_course.has_flashcards)
        .bind(new_course.created_by.map(|u| u.to_string()))
        .bind(format_timestamp(created_at))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        self.get_course_by_id(id).await
    }

    async fn get_course_by_slug(&self, slug: &str) -> PortResult<Course> {
        let record = sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE slug = ?1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Course '{}' not found", slug)))?;
        record.to_domain()
    }

    async fn get_course_by_id(&self, course_id: Uuid) -> PortResult<Course> {
        let record = sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?1"
        ))
        .bind(course_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("Course {} not found", course_id)))?;
        record.to_domain()
    }

    async fn list_courses(&self) -> PortResult<Vec<Course>> {
        let records = sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn create_exercise(
        &self,
        course_id: Uuid,
        order_index: usize,
        question: &str,
        payload: &ExercisePayload,
    ) -> PortResult<Exercise> {
        let id = Uuid::new_v4();
        let payload_json = serde_json::to_string(payload)
            .map_err(|e| PortError::Unexpected(format!("could not encode payload: {}", e)))?;
        sqlx::query(
            "INSERT INTO exercises (id, course_id, order_index, exercise_type, question, payload) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(id.to_string())
        .bind(course_id.to_string())
        .bind(order_index as i64)
        .bind(payload.type_tag())
        .bind(question)
        .bind(payload_json)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(Exercise {
            id,
            course_id,
            order_index,
            question: question.to_string(),
            payload: payload.clone(),
        })
    }

    async fn exercises_for_course(&self, course_id: Uuid) -> PortResult<Vec<Exercise>> {
        let records = sqlx::query_as::<_, ExerciseRecord>(
            "SELECT id, course_id, order_index, question, payload FROM exercises \
             WHERE course_id = ?1 ORDER BY order_index ASC",
        )
        .bind(course_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn create_flashcard(
        &self,
        course_id: Uuid,
        order_index: usize,
        front: &str,
        back: &str,
    ) -> PortResult<Flashcard> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO flashcards (id, course_id, order_index, front, back) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(id.to_string())
        .bind(course_id.to_string())
        .bind(order_index as i64)
        .bind(front)
        .bind(back)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(Flashcard {
            id,
            course_id,
            order_index,
            front: front.to_string(),
            back: back.to_string(),
        })
    }

    async fn flashcards_for_course(&self, course_id: Uuid) -> PortResult<Vec<Flashcard>> {
        let records = sqlx::query_as::<_, FlashcardRecord>(
            "SELECT id, course_id, order_index, front, back FROM flashcards \
             WHERE course_id = ?1 ORDER BY order_index ASC",
        )
        .bind(course_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn record_attempt(
        &self,
        user_id: Uuid,
        exercise_id: Uuid,
        correct: bool,
    ) -> PortResult<Attempt> {
        let id = Uuid::new_v4();
        let completed_at = Utc::now();
        sqlx::query(
            "INSERT INTO attempts (id, user_id, exercise_id, correct, completed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(exercise_id.to_string())
        .bind(correct)
        .bind(format_timestamp(completed_at))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(Attempt {
            id,
            user_id,
            exercise_id,
            correct,
            completed_at,
        })
    }

    async fn distinct_exercises_attempted(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> PortResult<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT a.exercise_id) FROM attempts a \
             JOIN exercises e ON e.id = a.exercise_id \
             WHERE a.user_id = ?1 AND e.course_id = ?2",
        )
        .bind(user_id.to_string())
        .bind(course_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(count as u64)
    }
}
