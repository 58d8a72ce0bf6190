pub(crate) mod http_errors;
pub mod openai;

use futures::Stream;
use std::future::Future;
use std::pin::Pin;

use crate::error::Result;
use crate::model::ChatRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// A complete, non-streamed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatCompletion {
    pub content: String,
    /// Provider-reported accounting, when the provider sends it.
    pub usage: Option<Usage>,
}

/// One streamed delta.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatChunk {
    pub content: String,
    pub finish_reason: Option<String>,
}

impl ChatChunk {
    pub fn is_final(&self) -> bool {
        self.finish_reason.is_some()
    }
}

/// Chunks in arrival order. Ends after the final chunk; cannot be restarted.
pub type ChunkStream<'a> = Pin<Box<dyn Stream<Item = Result<ChatChunk>> + 'a>>;

pub type ChatFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a>>;

pub trait ChatApi {
    fn complete<'a>(&'a self, request: &'a ChatRequest) -> ChatFuture<'a, ChatCompletion>;

    fn stream<'a>(&'a self, request: &'a ChatRequest) -> ChatFuture<'a, ChunkStream<'a>>;
}
