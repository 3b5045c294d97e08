pub mod course_llm;
pub mod db;

pub use course_llm::OpenAiCourseGenerator;
pub use db::SqliteStore;
