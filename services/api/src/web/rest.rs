//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{generation_task, state::AppState};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use courseforge_core::{
    domain::ExercisePayload,
    eval,
    ports::{Difficulty, GenerationRequest, PortError},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        submit_course_handler,
        job_status_handler,
        list_courses_handler,
        course_detail_handler,
        exercise_handler,
        submit_attempt_handler,
        list_flashcards_handler,
    ),
    components(
        schemas(
            SubmitCourseRequest,
            SubmitCourseResponse,
            JobStatusResponse,
            CourseSummary,
            CourseDetailResponse,
            ExerciseResponse,
            RightOption,
            SubmitAttemptRequest,
            AttemptResponse,
            FlashcardResponse,
        )
    ),
    tags(
        (name = "CourseForge API", description = "API endpoints for AI-generated short courses.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The payload submitted to kick off course generation.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitCourseRequest {
    pub topic: String,
    /// beginner | intermediate | advanced; defaults to beginner.
    pub difficulty: Option<String>,
    pub additional_instructions: Option<String>,
    /// Defaults to true.
    pub include_questions: Option<bool>,
    /// Defaults to false.
    pub include_flashcards: Option<bool>,
    pub num_exercises: Option<u8>,
    pub num_flashcards: Option<u8>,
}

/// Returned immediately after a job is created; generation continues in the
/// background.
#[derive(Serialize, ToSchema)]
pub struct SubmitCourseResponse {
    pub job_id: Uuid,
}

/// One snapshot of a generation job, safe to poll repeatedly.
#[derive(Serialize, ToSchema)]
pub struct JobStatusResponse {
    pub status: String,
    pub message: String,
    /// Set once the job is complete.
    pub course_slug: Option<String>,
    pub error: String,
}

#[derive(Serialize, ToSchema)]
pub struct CourseSummary {
    pub title: String,
    pub slug: String,
    pub overview: String,
    pub has_questions: bool,
    pub has_flashcards: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, ToSchema)]
pub struct CourseDetailResponse {
    pub title: String,
    pub slug: String,
    pub overview: String,
    pub cheatsheet: String,
    pub generation_model: String,
    pub exercise_count: usize,
    pub flashcard_count: usize,
    /// Distinct exercises the calling user has attempted; present only when
    /// an `x-user-id` header was sent.
    pub completed_count: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// One selectable right-hand item of a matching exercise. `original_index`
/// identifies the item in canonical order and is what the learner submits.
#[derive(Serialize, ToSchema)]
pub struct RightOption {
    pub original_index: usize,
    pub text: String,
}

#[derive(Serialize, ToSchema)]
pub struct ExerciseResponse {
    pub index: usize,
    pub total: usize,
    pub exercise_type: String,
    pub question: String,
    /// Multiple choice only. The correct index is never exposed.
    pub options: Option<Vec<String>>,
    /// Matching only: left items in canonical order.
    pub left_items: Option<Vec<String>>,
    /// Matching only: right items in freshly shuffled display order.
    pub right_options: Option<Vec<RightOption>>,
}

/// A learner's answer. `answer` carries the selected option index for
/// multiple choice; `matches` maps each left position to the chosen right
/// item's original index for matching. Malformed values score as incorrect.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitAttemptRequest {
    pub answer: Option<String>,
    pub matches: Option<BTreeMap<String, String>>,
}

#[derive(Serialize, ToSchema)]
pub struct AttemptResponse {
    pub correct: bool,
    /// The next exercise to take, or null when the course is finished.
    pub next_index: Option<usize>,
    pub course_completed: bool,
}

#[derive(Serialize, ToSchema)]
pub struct FlashcardResponse {
    pub order_index: usize,
    pub front: String,
    pub back: String,
}

//=========================================================================================
// Shared Helpers
//=========================================================================================

/// Maps a port error onto an HTTP response: not-found stays a distinct 404,
/// everything else becomes a generic 500 with details kept in the logs.
fn port_error_response(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Unexpected(msg) => {
            error!("unexpected port error: {}", msg);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    }
}

fn optional_user_id(headers: &HeaderMap) -> Result<Option<Uuid>, (StatusCode, String)> {
    match headers.get("x-user-id").map(|v| v.to_str().ok()) {
        None => Ok(None),
        Some(Some(value)) => Uuid::parse_str(value).map(Some).map_err(|_| {
            (
                StatusCode::BAD_REQUEST,
                "Invalid x-user-id format".to_string(),
            )
        }),
        Some(None) => Err((
            StatusCode::BAD_REQUEST,
            "Invalid x-user-id format".to_string(),
        )),
    }
}

fn required_user_id(headers: &HeaderMap) -> Result<Uuid, (StatusCode, String)> {
    optional_user_id(headers)?.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "x-user-id header is required".to_string(),
        )
    })
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Submit a topic for course generation.
///
/// Creates a generation job and schedules the work in the background; the
/// caller polls `/jobs/{id}` with the returned job id.
#[utoipa::path(
    post,
    path = "/courses",
    request_body = SubmitCourseRequest,
    responses(
        (status = 202, description = "Generation job created", body = SubmitCourseResponse),
        (status = 400, description = "Bad request (blank topic, unknown difficulty, or no content requested)"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("x-user-id" = Option<Uuid>, Header, description = "Optional id of the submitting user.")
    )
)]
pub async fn submit_course_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SubmitCourseRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = optional_user_id(&headers)?;

    let topic = body.topic.trim().to_string();
    if topic.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Topic is required".to_string()));
    }

    let difficulty = match body.difficulty.as_deref() {
        None => Difficulty::Beginner,
        Some(value) => value
            .parse::<Difficulty>()
            .map_err(|e| (StatusCode::BAD_REQUEST, e))?,
    };

    let include_questions = body.include_questions.unwrap_or(true);
    let include_flashcards = body.include_flashcards.unwrap_or(false);
    if !include_questions && !include_flashcards {
        return Err((
            StatusCode::BAD_REQUEST,
            "Select at least one of questions or flashcards".to_string(),
        ));
    }

    let request = GenerationRequest {
        topic: topic.clone(),
        difficulty,
        additional_instructions: body.additional_instructions,
        include_questions,
        include_flashcards,
        num_exercises: body.num_exercises,
        num_flashcards: body.num_flashcards,
    };

    let job = app_state
        .store
        .create_job(user_id, &topic)
        .await
        .map_err(port_error_response)?;

    generation_task::spawn_generation(app_state.clone(), job.id, request);

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitCourseResponse { job_id: job.id }),
    ))
}

/// Poll the status of a generation job.
#[utoipa::path(
    get,
    path = "/jobs/{id}",
    responses(
        (status = 200, description = "Current job status", body = JobStatusResponse),
        (status = 404, description = "Unknown job id")
    ),
    params(
        ("id" = Uuid, Path, description = "The job id returned at submission.")
    )
)]
pub async fn job_status_handler(
    State(app_state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let job = app_state
        .store
        .get_job(id)
        .await
        .map_err(port_error_response)?;

    let course_slug = match job.course_id {
        Some(course_id) => app_state
            .store
            .get_course_by_id(course_id)
            .await
            .ok()
            .map(|course| course.slug),
        None => None,
    };

    Ok(Json(JobStatusResponse {
        status: job.status.as_str().to_string(),
        message: job.status_message,
        course_slug,
        error: job.error,
    }))
}

/// Browse all courses, newest first.
#[utoipa::path(
    get,
    path = "/courses",
    responses(
        (status = 200, description = "All courses, newest first", body = [CourseSummary])
    )
)]
pub async fn list_courses_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let courses = app_state
        .store
        .list_courses()
        .await
        .map_err(port_error_response)?;

    let summaries: Vec<CourseSummary> = courses
        .into_iter()
        .map(|course| CourseSummary {
            title: course.title,
            slug: course.slug,
            overview: course.overview,
            has_questions: course.has_questions,
            has_flashcards: course.has_flashcards,
            created_at: course.created_at,
        })
        .collect();

    Ok(Json(summaries))
}

/// Show one course with its content counts and the caller's progress.
#[utoipa::path(
    get,
    path = "/courses/{slug}",
    responses(
        (status = 200, description = "Course detail", body = CourseDetailResponse),
        (status = 404, description = "Unknown slug")
    ),
    params(
        ("slug" = String, Path, description = "Course slug."),
        ("x-user-id" = Option<Uuid>, Header, description = "Optional user id for progress display.")
    )
)]
pub async fn course_detail_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = optional_user_id(&headers)?;

    let course = app_state
        .store
        .get_course_by_slug(&slug)
        .await
        .map_err(port_error_response)?;
    let exercises = app_state
        .store
        .exercises_for_course(course.id)
        .await
        .map_err(port_error_response)?;
    let flashcards = app_state
        .store
        .flashcards_for_course(course.id)
        .await
        .map_err(port_error_response)?;

    let completed_count = match user_id {
        Some(user_id) => Some(
            app_state
                .store
                .distinct_exercises_attempted(user_id, course.id)
                .await
                .map_err(port_error_response)?,
        ),
        None => None,
    };

    Ok(Json(CourseDetailResponse {
        title: course.title,
        slug: course.slug,
        overview: course.overview,
        cheatsheet: course.cheatsheet,
        generation_model: course.generation_model,
        exercise_count: exercises.len(),
        flashcard_count: flashcards.len(),
        completed_count,
        created_at: course.created_at,
    }))
}

/// Fetch one exercise for display.
///
/// Matching exercises get a freshly shuffled presentation order on every
/// request; each displayed right item carries its original index so the
/// submission can be graded against the canonical order.
#[utoipa::path(
    get,
    path = "/courses/{slug}/exercises/{index}",
    responses(
        (status = 200, description = "One exercise", body = ExerciseResponse),
        (status = 404, description = "Unknown slug or index out of range")
    ),
    params(
        ("slug" = String, Path, description = "Course slug."),
        ("index" = usize, Path, description = "Zero-based exercise index.")
    )
)]
pub async fn exercise_handler(
    State(app_state): State<Arc<AppState>>,
    Path((slug, index)): Path<(String, usize)>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let course = app_state
        .store
        .get_course_by_slug(&slug)
        .await
        .map_err(port_error_response)?;
    let exercises = app_state
        .store
        .exercises_for_course(course.id)
        .await
        .map_err(port_error_response)?;

    let exercise = exercises.get(index).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!("Course '{}' has no exercise {}", slug, index),
        )
    })?;

    let response = match &exercise.payload {
        ExercisePayload::MultipleChoice { options, .. } => ExerciseResponse {
            index,
            total: exercises.len(),
            exercise_type: exercise.payload.type_tag().to_string(),
            question: exercise.question.clone(),
            options: Some(options.clone()),
            left_items: None,
            right_options: None,
        },
        ExercisePayload::MatchingPairs { pairs } => {
            let right_options = eval::shuffle_presentation(pairs)
                .into_iter()
                .map(|(original_index, text)| RightOption {
                    original_index,
                    text,
                })
                .collect();
            ExerciseResponse {
                index,
                total: exercises.len(),
                exercise_type: exercise.payload.type_tag().to_string(),
                question: exercise.question.clone(),
                options: None,
                left_items: Some(pairs.iter().map(|p| p.left.clone()).collect()),
                right_options: Some(right_options),
            }
        }
    };

    Ok(Json(response))
}

/// Submit an answer for one exercise.
///
/// Always records a new attempt; re-submission after completion is allowed.
/// A malformed answer scores as incorrect rather than failing the request.
#[utoipa::path(
    post,
    path = "/courses/{slug}/exercises/{index}/attempts",
    request_body = SubmitAttemptRequest,
    responses(
        (status = 200, description = "Graded attempt", body = AttemptResponse),
        (status = 400, description = "Missing or invalid x-user-id header"),
        (status = 404, description = "Unknown slug or index out of range")
    ),
    params(
        ("slug" = String, Path, description = "Course slug."),
        ("index" = usize, Path, description = "Zero-based exercise index."),
        ("x-user-id" = Uuid, Header, description = "The id of the answering user.")
    )
)]
pub async fn submit_attempt_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((slug, index)): Path<(String, usize)>,
    Json(body): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user_id = required_user_id(&headers)?;

    let course = app_state
        .store
        .get_course_by_slug(&slug)
        .await
        .map_err(port_error_response)?;
    let exercises = app_state
        .store
        .exercises_for_course(course.id)
        .await
        .map_err(port_error_response)?;

    let exercise = exercises.get(index).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!("Course '{}' has no exercise {}", slug, index),
        )
    })?;

    let correct = match &exercise.payload {
        ExercisePayload::MultipleChoice {
            options,
            correct_index,
            ..
        } => eval::evaluate_multiple_choice(
            options,
            *correct_index,
            body.answer.as_deref().unwrap_or(""),
        ),
        ExercisePayload::MatchingPairs { pairs } => {
            // Keys that do not parse as positions are dropped, which shows up
            // as a length mismatch and grades as incorrect.
            let submitted: BTreeMap<usize, String> = body
                .matches
                .clone()
                .unwrap_or_default()
                .into_iter()
                .filter_map(|(k, v)| k.trim().parse::<usize>().ok().map(|k| (k, v)))
                .collect();
            eval::evaluate_matching(pairs.len(), &submitted)
        }
    };

    app_state
        .store
        .record_attempt(user_id, exercise.id, correct)
        .await
        .map_err(port_error_response)?;

    let next_index = (index + 1 < exercises.len()).then_some(index + 1);
    Ok(Json(AttemptResponse {
        correct,
        next_index,
        course_completed: next_index.is_none(),
    }))
}

/// List a course's flashcards for review, in order.
#[utoipa::path(
    get,
    path = "/courses/{slug}/flashcards",
    responses(
        (status = 200, description = "Flashcards in order", body = [FlashcardResponse]),
        (status = 404, description = "Unknown slug")
    ),
    params(
        ("slug" = String, Path, description = "Course slug.")
    )
)]
pub async fn list_flashcards_handler(
    State(app_state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let course = app_state
        .store
        .get_course_by_slug(&slug)
        .await
        .map_err(port_error_response)?;
    let flashcards = app_state
        .store
        .flashcards_for_course(course.id)
        .await
        .map_err(port_error_response)?;

    let response: Vec<FlashcardResponse> = flashcards
        .into_iter()
        .map(|card| FlashcardResponse {
            order_index: card.order_index,
            front: card.front,
            back: card.back,
        })
        .collect();

    Ok(Json(response))
}
