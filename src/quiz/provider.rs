use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::quiz::{ContractViolation, Difficulty, Question, RawQuestion};

const GRADE: &str = "7º ano";

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("generation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("generation service answered with status {0}")]
    HttpStatus(StatusCode),
    #[error("generation service returned no content")]
    EmptyResponse,
    #[error("generated payload is not a valid question: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("generated question breaks the contract: {0}")]
    Contract(#[from] ContractViolation),
}

/// Source of quiz questions.
#[async_trait]
pub trait QuestionProvider: Send + Sync {
    async fn fetch(&self, difficulty: Difficulty) -> Result<Question, ProviderError>;
}

#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

/// Asks a Gemini model for a question using schema-constrained JSON output.
#[derive(Clone)]
pub struct GeminiProvider {
    client: Client,
    config: ProviderConfig,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl QuestionProvider for GeminiProvider {
    async fn fetch(&self, difficulty: Difficulty) -> Result<Question, ProviderError> {
        debug!("Requesting a {} question from {}", difficulty, self.config.model);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&GenerateRequest::for_difficulty(difficulty))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::HttpStatus(response.status()));
        }

        let body: GenerateResponse = response.json().await?;
        let text = body.text().ok_or(ProviderError::EmptyResponse)?;
        debug!("Generated payload: {text}");

        parse_question(&text)
    }
}

/// Parses and validates the JSON text produced by the model.
pub fn parse_question(text: &str) -> Result<Question, ProviderError> {
    let raw: RawQuestion = serde_json::from_str(text)?;
    Ok(Question::try_from(raw)?)
}

pub fn instruction(difficulty: Difficulty) -> String {
    format!(
        "Gere um novo problema de matemática para o {GRADE} com um tema futurista ou espacial. \
         A dificuldade deve ser {difficulty}. Forneça quatro opções de múltipla escolha."
    )
}

pub fn system_instruction(difficulty: Difficulty) -> String {
    format!(
        "Você é uma IA futurista criando problemas de matemática para cadetes em uma academia \
         espacial. Os problemas devem ser adequados para o nível do {GRADE} com uma dificuldade \
         de {difficulty}."
    )
}

fn response_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "question": {
                "type": "STRING",
                "description": "O problema de matemática com um tema futurista/espacial."
            },
            "options": {
                "type": "ARRAY",
                "description": "Um array de 4 respostas possíveis, uma das quais é a correta.",
                "items": { "type": "STRING" },
                "minItems": 4,
                "maxItems": 4
            },
            "correctAnswerIndex": {
                "type": "INTEGER",
                "description": "O índice (0-3) da resposta correta no array 'options'."
            }
        },
        "required": ["question", "options", "correctAnswerIndex"],
        "propertyOrdering": ["question", "options", "correctAnswerIndex"]
    })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: GenerationConfig,
}

impl GenerateRequest {
    fn for_difficulty(difficulty: Difficulty) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part {
                    text: instruction(difficulty),
                }],
            }],
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: system_instruction(difficulty),
                }],
            },
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: response_schema(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// Text of the first candidate, with its parts joined.
    fn text(self) -> Option<String> {
        let text: String = self
            .candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}
