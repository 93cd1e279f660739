use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::SourceKind;

use super::response::{parse_generated_content, GeneratedContent};

const SYSTEM_PROMPT: &str = r#"You are an expert educational content creator.
Create comprehensive study materials and respond with ONLY a JSON object, no other text.
The JSON object must have exactly these keys:
- "summary": a concise 2-3 paragraph summary (string)
- "flashcards": 5-10 items of {"question": string, "answer": string, "difficulty": "easy" | "medium" | "hard"}
- "key_points": 5-8 key takeaways (array of strings)
- "examples": 3-5 concrete examples or applications (array of strings)
- "quiz_questions": 5-8 items of {"question": string, "type": "multiple_choice" | "true_false",
  "options": array of strings, "correct_answer": string that is exactly one of the options,
  "explanation": string}"#;

const TOPIC_TITLE_INSTRUCTION: &str =
    r#"Also include a "title" key (string): a short, descriptive title for the topic."#;

/// What the user asked to study.
#[derive(Debug, Clone)]
pub enum GenerationInput {
    /// Text the user pasted or imported from a file.
    Paste {
        title: String,
        content: String,
        source: SourceKind,
    },
    /// A topic name; the model writes the material itself.
    Topic { topic: String },
}

impl GenerationInput {
    /// Rejects blank input before anything is sent over the network.
    pub fn validate(&self) -> Result<()> {
        match self {
            GenerationInput::Paste { title, content, .. } => {
                if title.trim().is_empty() || content.trim().is_empty() {
                    return Err(AppError::Validation(
                        "Please provide both a title and content.".to_string(),
                    ));
                }
            }
            GenerationInput::Topic { topic } => {
                if topic.trim().is_empty() {
                    return Err(AppError::Validation("Please enter a topic.".to_string()));
                }
            }
        }
        Ok(())
    }

    pub fn source(&self) -> SourceKind {
        match self {
            GenerationInput::Paste { source, .. } => *source,
            GenerationInput::Topic { .. } => SourceKind::AiGenerated,
        }
    }

    fn system_prompt(&self) -> String {
        match self {
            GenerationInput::Paste { .. } => SYSTEM_PROMPT.to_string(),
            GenerationInput::Topic { .. } => format!("{SYSTEM_PROMPT}\n{TOPIC_TITLE_INSTRUCTION}"),
        }
    }

    fn user_message(&self) -> String {
        match self {
            GenerationInput::Paste { title, content, .. } => format!(
                "Create study materials from the following content.\n\nTitle: {}\n\nContent:\n{}",
                title.trim(),
                content
            ),
            GenerationInput::Topic { topic } => format!(
                "Create comprehensive study materials about the topic: {}",
                topic.trim()
            ),
        }
    }
}

/// Anything that can turn a [`GenerationInput`] into study content.
pub trait ContentGenerator: Send + Sync {
    fn generate<'a>(&'a self, input: &'a GenerationInput) -> BoxFuture<'a, Result<GeneratedContent>>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Chat-completion client for an OpenAI-compatible endpoint.
pub struct GenerationClient {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl GenerationClient {
    pub fn new(api_url: String, api_key: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .user_agent("study-buddy/1.0")
            .build()?;
        Ok(Self {
            client,
            api_url,
            api_key,
            model,
        })
    }

    pub async fn generate_content(&self, input: &GenerationInput) -> Result<GeneratedContent> {
        input.validate()?;

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: input.system_prompt(),
                },
                Message {
                    role: "user".to_string(),
                    content: input.user_message(),
                },
            ],
        };

        tracing::info!("Requesting study content from {}", self.api_url);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        check_status(status, &body)?;

        let completion: CompletionResponse = serde_json::from_str(&body)
            .map_err(|e| AppError::GenerationFormat(format!("unexpected completion shape: {e}")))?;

        let text = completion
            .choices
            .into_iter()
            .filter_map(|choice| choice.message.content)
            .collect::<Vec<_>>()
            .join("\n");

        if text.trim().is_empty() {
            return Err(AppError::GenerationFormat("empty completion".to_string()));
        }

        parse_generated_content(&text)
    }
}

impl ContentGenerator for GenerationClient {
    fn generate<'a>(&'a self, input: &'a GenerationInput) -> BoxFuture<'a, Result<GeneratedContent>> {
        self.generate_content(input).boxed()
    }
}

/// Maps a non-success HTTP status from the completion endpoint onto the
/// error the user should see.
pub fn check_status(status: u16, body: &str) -> Result<()> {
    match status {
        200..=299 => Ok(()),
        429 => {
            tracing::warn!("Generation endpoint rate limited the request");
            Err(AppError::RateLimited)
        }
        402 => {
            tracing::warn!("Generation endpoint reports exhausted quota");
            Err(AppError::QuotaExhausted)
        }
        _ => {
            tracing::error!("Generation endpoint returned HTTP {}: {}", status, body);
            Err(AppError::Upstream(format!("HTTP {status}: {body}")))
        }
    }
}
