pub mod generation_task;
pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible
// to the binary that will build the web server router.
pub use rest::{
    course_detail_handler, exercise_handler, job_status_handler, list_courses_handler,
    list_flashcards_handler, submit_attempt_handler, submit_course_handler,
};
