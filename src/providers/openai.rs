use std::time::Duration;

use eventsource_stream::{Event, Eventsource};
use futures::{Stream, StreamExt};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{GptBotError, Result};
use crate::model::{ChatRequest, Message};
use crate::providers::http_errors::chat_api_request_error;
use crate::providers::{ChatApi, ChatChunk, ChatCompletion, ChatFuture, ChunkStream, Usage};

const ORGANIZATION_HEADER: &str = "OpenAI-Organization";
const STREAM_DONE: &str = "[DONE]";

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f64,
    max_tokens: usize,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<UsageBody>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageBody {
    prompt_tokens: usize,
    completion_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct StreamEventBody {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

#[derive(Debug, PartialEq, Eq)]
enum StreamEvent {
    Chunk(ChatChunk),
    Done,
    /// Keep-alives and usage-only events that carry no choice.
    Skip,
}

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    api_org: Option<String>,
    api_url: String,
    connect_timeout_secs: u64,
}

impl OpenAiClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .build()
            .map_err(|err| GptBotError::api_with("Failed to initialize HTTP client", err))?;

        Ok(Self {
            client,
            api_key: cfg.api_key.clone(),
            api_org: cfg.api_org.clone(),
            api_url: completions_url(&cfg.base_url),
            connect_timeout_secs: cfg.connect_timeout_secs,
        })
    }

    async fn send(&self, request: &ChatRequest, stream: bool) -> Result<Response> {
        let body = CompletionBody {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        };
        debug!(
            api_url = %self.api_url,
            model = %request.model,
            message_count = request.messages.len(),
            max_tokens = request.max_tokens,
            stream,
            "sending chat completion request"
        );

        let mut builder = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body);
        if let Some(org) = &self.api_org {
            builder = builder.header(ORGANIZATION_HEADER, org);
        }

        let response = builder.send().await.map_err(|err| {
            warn!(
                api_url = %self.api_url,
                model = %request.model,
                error = %err,
                "chat completion request failed"
            );
            chat_api_request_error(err, &self.api_url, self.connect_timeout_secs)
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let response_body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read response body>".to_string());
            warn!(
                api_url = %self.api_url,
                model = %request.model,
                status = %status,
                response_body_len = response_body.len(),
                "chat API returned non-success status"
            );
            return Err(GptBotError::api(format!(
                "Chat completion request failed with status {}: {}",
                status,
                api_error_message(&response_body)
            )));
        }

        Ok(response)
    }
}

impl ChatApi for OpenAiClient {
    fn complete<'a>(&'a self, request: &'a ChatRequest) -> ChatFuture<'a, ChatCompletion> {
        Box::pin(async move {
            let response = self.send(request, false).await?;
            let text = response.text().await.map_err(|err| {
                GptBotError::api_with("Failed to read chat completion response", err)
            })?;
            let completion = parse_completion(&text)?;
            debug!(
                model = %request.model,
                response_len = completion.content.len(),
                usage_reported = completion.usage.is_some(),
                "received chat completion"
            );
            Ok(completion)
        })
    }

    fn stream<'a>(&'a self, request: &'a ChatRequest) -> ChatFuture<'a, ChunkStream<'a>> {
        Box::pin(async move {
            let response = self.send(request, true).await?;
            Ok(chunk_stream(response))
        })
    }
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

fn parse_completion(text: &str) -> Result<ChatCompletion> {
    let parsed: CompletionResponse = serde_json::from_str(text)
        .map_err(|err| GptBotError::api_with("Failed to parse chat completion response", err))?;
    if let Some(error) = parsed.error {
        return Err(GptBotError::api(format!(
            "Chat completion response reported an error: {}",
            error.message
        )));
    }
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GptBotError::api("Chat completion response contained no choices"))?;

    Ok(ChatCompletion {
        content: choice.message.content.unwrap_or_default(),
        usage: parsed.usage.map(|usage| Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        }),
    })
}

fn parse_stream_event(data: &str) -> Result<StreamEvent> {
    if data.trim() == STREAM_DONE {
        return Ok(StreamEvent::Done);
    }

    let event: StreamEventBody = serde_json::from_str(data)
        .map_err(|err| GptBotError::api_with("Failed to parse chat completion chunk", err))?;
    if let Some(error) = event.error {
        return Err(GptBotError::api(format!(
            "Chat completion stream reported an error: {}",
            error.message
        )));
    }

    Ok(match event.choices.into_iter().next() {
        Some(choice) => StreamEvent::Chunk(ChatChunk {
            content: choice.delta.content.unwrap_or_default(),
            finish_reason: choice.finish_reason,
        }),
        None => StreamEvent::Skip,
    })
}

/// Stops after the first chunk carrying a finish reason, or at `[DONE]`.
fn chunk_stream<'a>(response: Response) -> ChunkStream<'a> {
    let events = Box::pin(response.bytes_stream().eventsource());
    Box::pin(futures::stream::try_unfold(
        (events, false),
        |(events, finished)| next_chunk(events, finished),
    ))
}

async fn next_chunk<S, E>(mut events: S, finished: bool) -> Result<Option<(ChatChunk, (S, bool))>>
where
    S: Stream<Item = std::result::Result<Event, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    if finished {
        return Ok(None);
    }

    while let Some(event) = events.next().await {
        let event =
            event.map_err(|err| GptBotError::api_with("Chat completion stream interrupted", err))?;
        match parse_stream_event(&event.data)? {
            StreamEvent::Chunk(chunk) => {
                let finished = chunk.is_final();
                return Ok(Some((chunk, (events, finished))));
            }
            StreamEvent::Done => return Ok(None),
            StreamEvent::Skip => {}
        }
    }

    Err(GptBotError::api(
        "Chat completion stream closed before the response completed",
    ))
}
