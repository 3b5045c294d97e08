//! services/api/src/web/generation_task.rs
//!
//! The fire-and-forget background task that owns one generation job from
//! Pending through to Complete or Failed. The job row is the only channel
//! back to the polling requests; nothing is shared in memory.

use std::sync::Arc;

use courseforge_core::{
    content::{self, ExerciseItem},
    domain::{Course, ExercisePayload},
    ports::{GenerationRequest, NewCourse, PortError, PortResult},
};
use tracing::{error, info};
use uuid::Uuid;

use crate::web::state::AppState;

/// Schedules generation for an already-created Pending job and returns
/// immediately. The caller holds no handle to the spawned task.
pub fn spawn_generation(app_state: Arc<AppState>, job_id: Uuid, request: GenerationRequest) {
    tokio::spawn(run_generation(app_state, job_id, request));
}

/// Drives one generation job to a terminal state. Every fault on any step
/// (the external call, its timeout, content validation, persistence) lands in
/// `mark_job_failed`, so no uncaught error can leave the job stuck in
/// Pending or Running. Faults are terminal to this task only.
pub async fn run_generation(app_state: Arc<AppState>, job_id: Uuid, request: GenerationRequest) {
    info!(%job_id, topic = %request.topic, "generation job started");
    match generate_and_store(&app_state, job_id, &request).await {
        Ok(course) => {
            info!(%job_id, slug = %course.slug, "generation job complete");
        }
        Err(e) => {
            error!(%job_id, error = %e, "generation job failed");
            if let Err(mark_err) = app_state.store.mark_job_failed(job_id, &e.to_string()).await {
                error!(%job_id, error = %mark_err, "could not record job failure");
            }
        }
    }
}

async fn generate_and_store(
    app_state: &AppState,
    job_id: Uuid,
    request: &GenerationRequest,
) -> PortResult<Course> {
    let store = &app_state.store;
    let job = store.get_job(job_id).await?;

    store
        .mark_job_running(job_id, "Generating course content...")
        .await?;

    let timeout = app_state.config.generation_timeout;
    let content = match tokio::time::timeout(timeout, app_state.generator.generate(request)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(PortError::Unexpected(format!(
                "generation timed out after {}s",
                timeout.as_secs()
            )))
        }
    };

    content::validate(&content, request).map_err(|e| PortError::Unexpected(e.to_string()))?;

    let course = store
        .create_course(NewCourse {
            title: content.title.clone(),
            overview: content.overview.clone(),
            cheatsheet: content.cheatsheet.clone(),
            topic_normalized: request.topic.trim().to_lowercase(),
            generation_model: app_state.generator.model_name().to_string(),
            has_questions: !content.exercises.is_empty(),
            has_flashcards: !content.flashcards.is_empty(),
            created_by: job.created_by,
        })
        .await?;

    for (order_index, item) in content.exercises.iter().enumerate() {
        let (question, payload) = match item {
            ExerciseItem::MultipleChoice {
                question,
                options,
                correct_index,
                explanation,
            } => (
                question,
                ExercisePayload::MultipleChoice {
                    options: options.clone(),
                    correct_index: *correct_index,
                    explanation: explanation.clone(),
                },
            ),
            ExerciseItem::Matching { question, pairs } => (
                question,
                ExercisePayload::MatchingPairs {
                    pairs: pairs.clone(),
                },
            ),
        };
        store
            .create_exercise(course.id, order_index, question, &payload)
            .await?;
    }

    for (order_index, card) in content.flashcards.iter().enumerate() {
        store
            .create_flashcard(course.id, order_index, &card.front, &card.back)
            .await?;
    }

    store
        .mark_job_complete(job_id, course.id, "Course ready.")
        .await?;
    Ok(course)
}
