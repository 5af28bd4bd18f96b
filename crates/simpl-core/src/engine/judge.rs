//! LLM-as-judge metrics.
//!
//! A judge metric asks a chat model to grade each row against a rubric and
//! reply with `{"score": n, "justification": "..."}`. Calls for one metric
//! run with at most `max_workers` in flight; a failed call only costs that
//! row its score.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::resolver::JudgeMetric;

/// Default OpenAI-compatible API base.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors from a single judge call.
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("invalid judge model reference: {0}")]
    InvalidModelRef(String),

    #[error("unsupported judge provider: {0}")]
    UnsupportedProvider(String),

    #[error("judge request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("judge returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("judge returned no choices")]
    EmptyResponse,

    #[error("could not parse judge verdict: {0}")]
    Verdict(String),
}

/// Split `openai:/gpt-4` (or `openai:gpt-4`) into provider and model.
pub fn parse_model_ref(model_ref: &str) -> Result<(&str, &str), JudgeError> {
    let (provider, model) = model_ref
        .split_once(":/")
        .or_else(|| model_ref.split_once(':'))
        .ok_or_else(|| JudgeError::InvalidModelRef(model_ref.to_string()))?;
    let model = model.trim_start_matches('/');
    if provider.is_empty() || model.is_empty() {
        return Err(JudgeError::InvalidModelRef(model_ref.to_string()));
    }
    Ok((provider, model))
}

/// A chat model that can grade.
#[async_trait]
pub trait JudgeClient: Send + Sync {
    /// Send `system` + `prompt` to the model named by `model_ref` and return
    /// the reply text.
    async fn complete(
        &self,
        model_ref: &str,
        system: &str,
        prompt: &str,
    ) -> Result<String, JudgeError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Judge client for OpenAI-compatible `/chat/completions` endpoints.
#[derive(Debug, Clone)]
pub struct OpenAiJudgeClient {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenAiJudgeClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Default for OpenAiJudgeClient {
    fn default() -> Self {
        Self::new(DEFAULT_OPENAI_BASE_URL, None)
    }
}

#[async_trait]
impl JudgeClient for OpenAiJudgeClient {
    async fn complete(
        &self,
        model_ref: &str,
        system: &str,
        prompt: &str,
    ) -> Result<String, JudgeError> {
        let (provider, model) = parse_model_ref(model_ref)?;
        if provider != "openai" {
            return Err(JudgeError::UnsupportedProvider(provider.to_string()));
        }

        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.http_client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(JudgeError::Status { status, body });
        }

        let parsed = response.json::<ChatResponse>().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(JudgeError::EmptyResponse)
    }
}

/// A parsed judge reply.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Verdict {
    pub score: f64,
    #[serde(default)]
    pub justification: String,
}

/// Extract the JSON verdict from a reply, tolerating surrounding prose or
/// code fences.
pub fn parse_verdict(reply: &str) -> Result<Verdict, JudgeError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let body = match (start, end) {
        (Some(s), Some(e)) if s < e => &reply[s..=e],
        _ => return Err(JudgeError::Verdict(format!("no JSON object in {reply:?}"))),
    };
    serde_json::from_str::<Verdict>(body).map_err(|e| JudgeError::Verdict(e.to_string()))
}

/// System message for `metric`.
pub fn system_prompt(metric: &JudgeMetric) -> String {
    let polarity = if metric.config.greater_is_better {
        "Higher scores are better."
    } else {
        "Lower scores are better."
    };
    format!(
        "You are an impartial judge grading the output of an AI system for the metric \
         \"{name}\". {polarity} Respond only with a JSON object of the form \
         {{\"score\": <number>, \"justification\": \"<one or two sentences>\"}}.",
        name = metric.name,
    )
}

/// User message grading one row.
pub fn grading_prompt(metric: &JudgeMetric, input: &str, output: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("Metric definition:\n{}\n\n", metric.config.definition));
    prompt.push_str(&format!("Grading rubric:\n{}\n\n", metric.config.grading_prompt));
    if !metric.config.examples.is_empty() {
        prompt.push_str("Examples:\n");
        for (i, example) in metric.config.examples.iter().enumerate() {
            prompt.push_str(&format!(
                "Example {n}:\nInput: {input}\nOutput: {output}\nScore: {score}\n",
                n = i + 1,
                input = example.input,
                output = example.output,
                score = example.score,
            ));
            if let Some(justification) = &example.justification {
                prompt.push_str(&format!("Justification: {justification}\n"));
            }
            prompt.push('\n');
        }
    }
    prompt.push_str(&format!("Input:\n{input}\n\nOutput:\n{output}\n"));
    prompt
}

/// Per-row judge results, in dataset order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JudgeScores {
    pub scores: Vec<Option<f64>>,
    pub justifications: Vec<String>,
}

/// Grade every row. Never fails as a whole.
pub async fn grade_rows(
    client: &dyn JudgeClient,
    metric: &JudgeMetric,
    inputs: &[&str],
    outputs: &[&str],
) -> JudgeScores {
    let system = system_prompt(metric);
    let workers = metric.config.max_workers.max(1);
    debug!(metric = %metric.name, rows = outputs.len(), workers, "grading rows");

    let prompts: Vec<String> = outputs
        .iter()
        .enumerate()
        .map(|(row, output)| {
            let input = inputs.get(row).copied().unwrap_or_default();
            grading_prompt(metric, input, output)
        })
        .collect();

    let system = system.as_str();
    let model = metric.config.judge_model.as_str();
    let results: Vec<(Option<f64>, String)> = stream::iter(prompts.into_iter().enumerate())
        .map(move |(row, prompt)| async move {
            let verdict = match client.complete(model, system, &prompt).await {
                Ok(reply) => parse_verdict(&reply),
                Err(err) => Err(err),
            };
            match verdict {
                Ok(v) if v.score.is_finite() => (Some(v.score), v.justification),
                Ok(v) => (None, format!("Judge returned non-finite score {}", v.score)),
                Err(err) => {
                    warn!(metric = %metric.name, row, error = %err, "judge call failed");
                    (None, format!("Failed to score row: {err}"))
                }
            }
        })
        .buffered(workers)
        .collect()
        .await;

    let (scores, justifications) = results.into_iter().unzip();
    JudgeScores {
        scores,
        justifications,
    }
}
