//! Integration tests for the generation job lifecycle and the SQLite store,
//! using an in-memory database and a stubbed course generator.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_lib::adapters::db::SqliteStore;
use api_lib::config::Config;
use api_lib::web::generation_task::run_generation;
use api_lib::web::state::AppState;
use async_trait::async_trait;
use courseforge_core::content::{CourseContent, ExerciseItem, FlashcardItem};
use courseforge_core::domain::{ExercisePayload, JobStatus, MatchingPair};
use courseforge_core::ports::{
    CourseGenerator, CourseStore, Difficulty, GenerationRequest, NewCourse, PortError, PortResult,
};
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

async fn setup_store() -> SqliteStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test db");
    let store = SqliteStore::new(pool);
    store
        .run_migrations()
        .await
        .expect("Failed to run migrations");
    store
}

fn test_config(timeout: Duration) -> Config {
    Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "sqlite::memory:".to_string(),
        log_level: tracing::Level::INFO,
        openai_api_key: None,
        course_model: "stub-model".to_string(),
        generation_timeout: timeout,
    }
}

fn app_state(
    store: SqliteStore,
    generator: Arc<dyn CourseGenerator>,
    timeout: Duration,
) -> Arc<AppState> {
    Arc::new(AppState {
        store: Arc::new(store),
        generator,
        config: Arc::new(test_config(timeout)),
    })
}

/// A generator that returns one preset result.
struct StubGenerator {
    result: Mutex<Option<PortResult<CourseContent>>>,
}

impl StubGenerator {
    fn with(result: PortResult<CourseContent>) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Some(result)),
        })
    }
}

#[async_trait]
impl CourseGenerator for StubGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> PortResult<CourseContent> {
        self.result
            .lock()
            .unwrap()
            .take()
            .expect("stub generator called more than once")
    }

    fn model_name(&self) -> &str {
        "stub-model"
    }
}

/// A generator that never finishes within any reasonable test timeout.
struct SlowGenerator;

#[async_trait]
impl CourseGenerator for SlowGenerator {
    async fn generate(&self, _request: &GenerationRequest) -> PortResult<CourseContent> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(PortError::Unexpected("unreachable".to_string()))
    }

    fn model_name(&self) -> &str {
        "slow-model"
    }
}

fn matching_pairs(n: usize) -> Vec<MatchingPair> {
    (0..n)
        .map(|i| MatchingPair {
            left: format!("term {}", i),
            right: format!("definition {}", i),
        })
        .collect()
}

fn sample_content() -> CourseContent {
    CourseContent {
        title: "Binary Search".to_string(),
        overview: "You will learn how binary search works.".to_string(),
        cheatsheet: "### Complexity\n- O(log n) comparisons".to_string(),
        exercises: vec![
            ExerciseItem::MultipleChoice {
                question: "What is the complexity of binary search?".to_string(),
                options: vec![
                    "O(n)".to_string(),
                    "O(log n)".to_string(),
                    "O(1)".to_string(),
                    "O(n log n)".to_string(),
                ],
                correct_index: 1,
                explanation: "Each step halves the search space.".to_string(),
            },
            ExerciseItem::Matching {
                question: "Match each term to its definition.".to_string(),
                pairs: matching_pairs(4),
            },
        ],
        flashcards: vec![FlashcardItem {
            front: "Precondition".to_string(),
            back: "The input must be sorted.".to_string(),
        }],
    }
}

fn generation_request() -> GenerationRequest {
    GenerationRequest {
        topic: "Binary Search".to_string(),
        difficulty: Difficulty::Intermediate,
        additional_instructions: None,
        include_questions: true,
        include_flashcards: true,
        num_exercises: None,
        num_flashcards: None,
    }
}

#[tokio::test]
async fn generation_success_runs_job_to_complete() {
    let store = setup_store().await;
    let state = app_state(
        store,
        StubGenerator::with(Ok(sample_content())),
        Duration::from_secs(5),
    );

    let job = state
        .store
        .create_job(Some(Uuid::new_v4()), "Binary Search")
        .await
        .unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.course_id.is_none());

    run_generation(state.clone(), job.id, generation_request()).await;

    let job = state.store.get_job(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Complete);
    assert!(!job.status_message.is_empty());
    assert!(job.error.is_empty());

    let course_id = job.course_id.expect("completed job should carry a course");
    let course = state.store.get_course_by_id(course_id).await.unwrap();
    assert_eq!(course.slug, "binary-search");
    assert_eq!(course.generation_model, "stub-model");
    assert!(course.has_questions);
    assert!(course.has_flashcards);

    let exercises = state.store.exercises_for_course(course_id).await.unwrap();
    assert_eq!(exercises.len(), 2);
    assert_eq!(exercises[0].order_index, 0);
    assert_eq!(exercises[1].order_index, 1);
    assert!(matches!(
        exercises[0].payload,
        ExercisePayload::MultipleChoice { correct_index: 1, .. }
    ));
    assert!(matches!(
        &exercises[1].payload,
        ExercisePayload::MatchingPairs { pairs } if pairs.len() == 4
    ));

    let flashcards = state.store.flashcards_for_course(course_id).await.unwrap();
    assert_eq!(flashcards.len(), 1);
    assert_eq!(flashcards[0].front, "Precondition");
}

#[tokio::test]
async fn generator_error_marks_job_failed_without_a_course() {
    let store = setup_store().await;
    let state = app_state(
        store,
        StubGenerator::with(Err(PortError::Unexpected("upstream unavailable".to_string()))),
        Duration::from_secs(5),
    );

    let job = state.store.create_job(None, "Binary Search").await.unwrap();
    run_generation(state.clone(), job.id, generation_request()).await;

    let job = state.store.get_job(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.contains("upstream unavailable"));
    assert!(job.course_id.is_none());
    assert!(state.store.list_courses().await.unwrap().is_empty());
}

#[tokio::test]
async fn structurally_invalid_content_fails_the_job() {
    let mut content = sample_content();
    content.exercises[0] = ExerciseItem::MultipleChoice {
        question: "Too few options?".to_string(),
        options: vec!["yes".to_string(), "no".to_string(), "maybe".to_string()],
        correct_index: 0,
        explanation: String::new(),
    };

    let store = setup_store().await;
    let state = app_state(
        store,
        StubGenerator::with(Ok(content)),
        Duration::from_secs(5),
    );

    let job = state.store.create_job(None, "Binary Search").await.unwrap();
    run_generation(state.clone(), job.id, generation_request()).await;

    let job = state.store.get_job(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.contains("options"));
    assert!(state.store.list_courses().await.unwrap().is_empty());
}

#[tokio::test]
async fn generation_timeout_fails_the_job() {
    let store = setup_store().await;
    let state = app_state(store, Arc::new(SlowGenerator), Duration::from_millis(50));

    let job = state.store.create_job(None, "Binary Search").await.unwrap();
    run_generation(state.clone(), job.id, generation_request()).await;

    let job = state.store.get_job(job.id).await.unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.contains("timed out"));
}

#[tokio::test]
async fn job_transitions_are_guarded_and_terminal_states_are_immutable() {
    let store = setup_store().await;

    let job = store.create_job(None, "Guard test").await.unwrap();
    let course = store
        .create_course(NewCourse {
            title: "Guard Course".to_string(),
            overview: "o".to_string(),
            cheatsheet: "c".to_string(),
            topic_normalized: "guard test".to_string(),
            generation_model: String::new(),
            has_questions: true,
            has_flashcards: false,
            created_by: None,
        })
        .await
        .unwrap();

    // Completing a job that never ran is a no-op: Running cannot be skipped.
    store
        .mark_job_complete(job.id, course.id, "done")
        .await
        .unwrap();
    assert_eq!(store.get_job(job.id).await.unwrap().status, JobStatus::Pending);

    store.mark_job_running(job.id, "working").await.unwrap();
    let running = store.get_job(job.id).await.unwrap();
    assert_eq!(running.status, JobStatus::Running);
    assert_eq!(running.status_message, "working");

    // A second advance does not overwrite the running state.
    store.mark_job_running(job.id, "working again").await.unwrap();
    assert_eq!(
        store.get_job(job.id).await.unwrap().status_message,
        "working"
    );

    store
        .mark_job_complete(job.id, course.id, "done")
        .await
        .unwrap();
    let complete = store.get_job(job.id).await.unwrap();
    assert_eq!(complete.status, JobStatus::Complete);
    assert_eq!(complete.course_id, Some(course.id));

    // Terminal jobs never change again.
    store.mark_job_failed(job.id, "too late").await.unwrap();
    let still_complete = store.get_job(job.id).await.unwrap();
    assert_eq!(still_complete.status, JobStatus::Complete);
    assert!(still_complete.error.is_empty());
}

#[tokio::test]
async fn pending_job_can_fail_directly() {
    let store = setup_store().await;
    let job = store.create_job(None, "doomed").await.unwrap();

    store.mark_job_failed(job.id, "early fault").await.unwrap();
    let failed = store.get_job(job.id).await.unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert_eq!(failed.error, "early fault");
}

#[tokio::test]
async fn unknown_job_id_is_not_found() {
    let store = setup_store().await;
    match store.get_job(Uuid::new_v4()).await {
        Err(PortError::NotFound(_)) => {}
        other => panic!("expected NotFound, got {:?}", other.map(|j| j.status)),
    }
}

#[tokio::test]
async fn slug_collisions_get_incrementing_suffixes() {
    let store = setup_store().await;
    let new_course = |title: &str| NewCourse {
        title: title.to_string(),
        overview: "o".to_string(),
        cheatsheet: "c".to_string(),
        topic_normalized: "intro python".to_string(),
        generation_model: String::new(),
        has_questions: true,
        has_flashcards: false,
        created_by: None,
    };

    let first = store.create_course(new_course("Intro Python")).await.unwrap();
    let second = store.create_course(new_course("Intro Python")).await.unwrap();
    let third = store.create_course(new_course("Intro Python")).await.unwrap();

    assert_eq!(first.slug, "intro-python");
    assert_eq!(second.slug, "intro-python-1");
    assert_eq!(third.slug, "intro-python-2");
}

#[tokio::test]
async fn progress_counts_distinct_exercises_not_attempts() {
    let store = setup_store().await;
    let course = store
        .create_course(NewCourse {
            title: "Progress".to_string(),
            overview: "o".to_string(),
            cheatsheet: "c".to_string(),
            topic_normalized: "progress".to_string(),
            generation_model: String::new(),
            has_questions: true,
            has_flashcards: false,
            created_by: None,
        })
        .await
        .unwrap();

    let payload = ExercisePayload::MultipleChoice {
        options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        correct_index: 0,
        explanation: String::new(),
    };
    let first = store
        .create_exercise(course.id, 0, "q0", &payload)
        .await
        .unwrap();
    let second = store
        .create_exercise(course.id, 1, "q1", &payload)
        .await
        .unwrap();

    let user = Uuid::new_v4();
    // Two attempts on the same exercise plus one on another: re-submission is
    // always permitted and recorded, but progress counts exercises once.
    store.record_attempt(user, first.id, false).await.unwrap();
    store.record_attempt(user, first.id, true).await.unwrap();
    store.record_attempt(user, second.id, false).await.unwrap();

    assert_eq!(
        store
            .distinct_exercises_attempted(user, course.id)
            .await
            .unwrap(),
        2
    );
    // A different user has no progress here.
    assert_eq!(
        store
            .distinct_exercises_attempted(Uuid::new_v4(), course.id)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn stored_exercises_round_trip_through_the_typed_payload() {
    let store = setup_store().await;
    let course = store
        .create_course(NewCourse {
            title: "Payload".to_string(),
            overview: "o".to_string(),
            cheatsheet: "c".to_string(),
            topic_normalized: "payload".to_string(),
            generation_model: String::new(),
            has_questions: true,
            has_flashcards: false,
            created_by: None,
        })
        .await
        .unwrap();

    let payload = ExercisePayload::MatchingPairs {
        pairs: matching_pairs(5),
    };
    store
        .create_exercise(course.id, 0, "match these", &payload)
        .await
        .unwrap();

    let exercises = store.exercises_for_course(course.id).await.unwrap();
    assert_eq!(exercises.len(), 1);
    assert_eq!(exercises[0].payload, payload);
    assert_eq!(exercises[0].question, "match these");
}
