//! services/api/src/adapters/course_llm.rs
//!
//! This module contains the adapter for the course-generating LLM.
//! It implements the `CourseGenerator` port from the `core` crate.

const SYSTEM_INSTRUCTIONS: &str = r#"You are an educational content designer. You will receive a structured request containing:
- Topic: the subject of the course
- Difficulty: Beginner, Intermediate, or Advanced. Adapt vocabulary, depth of explanation, and exercise difficulty to this level (Beginner = simpler terms and easier questions; Advanced = more technical and challenging)
- Optional additional instructions: free-form guidance (e.g. "focus on async/await", "use real-world examples"). Follow these carefully when provided
- A "Content to generate" line naming Questions and/or Flashcards, optionally with counts; produce exactly the kinds (and counts) requested, using between 5 and 8 exercises when no count is given

Produce a short course with:
1. A clear title (short, based on the topic).
2. One overview paragraph (2-4 sentences) explaining what the learner will learn.
3. A cheatsheet with key facts, formulas, or definitions written in valid Markdown. Use ### headings for category titles and bullet list items only for the entries beneath each heading. Never put a category title inside a bullet point.
4. The requested exercises, mixing multiple choice and matching:
- Multiple choice: exactly 4 options, one correct. Set correct_index to 0, 1, 2, or 3 for the correct option. Always include an explanation: a short sentence explaining why the correct answer is right.
- Matching: 4 to 6 pairs of (left, right) items that belong together (e.g. term-definition, question-answer).
5. The requested flashcards: short front/back pairs suitable for quick review.

Respond with a single JSON object and nothing else, shaped exactly like this:
{
  "title": "...",
  "overview": "...",
  "cheatsheet": "...",
  "exercises": [
    {"type": "multiple_choice", "question": "...", "options": ["...", "...", "...", "..."], "correct_index": 0, "explanation": "..."},
    {"type": "matching", "question": "...", "pairs": [{"left": "...", "right": "..."}]}
  ],
  "flashcards": [
    {"front": "...", "back": "..."}
  ]
}
Omit no fields; use empty lists for content kinds that were not requested. Keep explanations clear and concise. Make exercises fun and instructive. Always respect the difficulty level and any additional instructions."#;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ResponseFormat,
    },
    error::OpenAIError,
    Client,
};
use async_trait::async_trait;
use courseforge_core::{
    content::CourseContent,
    ports::{CourseGenerator, GenerationRequest, PortError, PortResult},
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CourseGenerator` using an OpenAI-compatible LLM.
#[derive(Clone)]
pub struct OpenAiCourseGenerator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiCourseGenerator {
    /// Creates a new `OpenAiCourseGenerator`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

/// Assembles the user prompt: topic and difficulty lines, optional free-form
/// instructions, and a content-type/count directive line.
fn build_prompt(request: &GenerationRequest) -> String {
    let mut difficulty = request.difficulty.as_str().to_string();
    if let Some(first) = difficulty.get_mut(0..1) {
        first.make_ascii_uppercase();
    }

    let mut parts = vec![
        format!("Topic: {}", request.topic.trim()),
        format!("Difficulty: {}", difficulty),
    ];
    if let Some(instructions) = request
        .additional_instructions
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        parts.push(format!("Additional instructions: {}", instructions));
    }

    let mut content_bits = Vec::new();
    if request.include_questions {
        match request.num_exercises {
            Some(n) => content_bits.push(format!("Questions ({})", n)),
            None => content_bits.push("Questions".to_string()),
        }
    }
    if request.include_flashcards {
        match request.num_flashcards {
            Some(n) => content_bits.push(format!("Flashcards ({})", n)),
            None => content_bits.push("Flashcards".to_string()),
        }
    }
    if !content_bits.is_empty() {
        parts.push(format!("Content to generate: {}", content_bits.join(", ")));
    }

    parts.join("\n\n")
}

/// Strips a Markdown code fence if the model wrapped its JSON in one.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

//=========================================================================================
// `CourseGenerator` Trait Implementation
//=========================================================================================

#[async_trait]
impl CourseGenerator for OpenAiCourseGenerator {
    /// Generates full course content for the request as one structured call.
    async fn generate(&self, request: &GenerationRequest) -> PortResult<CourseContent> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(build_prompt(request))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .response_format(ResponseFormat::JsonObject)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let raw = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected(
                    "Course generation LLM response contained no text content.".to_string(),
                )
            })?;

        serde_json::from_str(strip_code_fence(&raw)).map_err(|e| {
            PortError::Unexpected(format!("Course generation LLM returned malformed JSON: {}", e))
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
