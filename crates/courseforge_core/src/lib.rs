pub mod content;
pub mod domain;
pub mod eval;
pub mod ports;

pub use content::{ContentError, CourseContent, ExerciseItem, FlashcardItem};
pub use domain::{
    Attempt, Course, Exercise, ExercisePayload, Flashcard, GenerationJob, JobStatus, MatchingPair,
};
pub use ports::{
    CourseGenerator, CourseStore, Difficulty, GenerationRequest, NewCourse, PortError, PortResult,
};
