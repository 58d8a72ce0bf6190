use futures::StreamExt;
use tracing::{debug, warn};

use crate::config::Config;
use crate::dispatch::{Dispatched, dispatch};
use crate::error::Result;
use crate::metrics::{PerfResults, measure};
use crate::model::{ChatRequest, build_messages};
use crate::providers::{ChatApi, ChatCompletion, ChunkStream};
use crate::sink::ResponseSink;
use crate::tokens::{Tokenizer, remaining_budget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    RequestBuilt,
    Dispatched,
    Streaming,
    SingleResponse,
    Completed,
    Failed,
}

/// Drives one prompt through request assembly, dispatch and delivery.
///
/// There is no retry: any error moves the run to `Failed` and is returned as is.
/// Output already handed to the sink stays where it is.
pub struct Orchestrator<'a, A: ?Sized, S> {
    config: &'a Config,
    api: &'a A,
    tokenizer: &'a dyn Tokenizer,
    sink: S,
    state: RunState,
}

impl<'a, A, S> Orchestrator<'a, A, S>
where
    A: ChatApi + ?Sized,
    S: ResponseSink,
{
    pub fn new(config: &'a Config, api: &'a A, tokenizer: &'a dyn Tokenizer, sink: S) -> Self {
        Self {
            config,
            api,
            tokenizer,
            sink,
            state: RunState::Idle,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> RunState {
        self.state
    }

    #[cfg(test)]
    pub(crate) fn into_sink(self) -> S {
        self.sink
    }

    pub async fn evaluate(&mut self) -> Result<PerfResults> {
        match self.run().await {
            Ok(results) => {
                self.transition(RunState::Completed);
                Ok(results)
            }
            Err(err) => {
                warn!(state = ?self.state, error = %err, "chat run failed");
                self.transition(RunState::Failed);
                Err(err)
            }
        }
    }

    async fn run(&mut self) -> Result<PerfResults> {
        let messages = build_messages(&self.config.system_prompt, &self.config.user_prompts);
        let tokens_sent = self
            .config
            .token_accounting
            .tokens_consumed(self.tokenizer, &messages);
        let max_tokens = remaining_budget(self.config.max_tokens, tokens_sent)?;
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
            max_tokens,
        };
        debug!(
            accounting = self.config.token_accounting.as_str(),
            tokens_sent,
            max_tokens,
            "built chat request"
        );
        self.transition(RunState::RequestBuilt);

        let (delivered, elapsed) = measure(self.deliver(&request, tokens_sent)).await;
        let mut results = delivered?;
        results.duration_seconds = elapsed.as_secs_f64();
        results.completed_successfully = true;
        Ok(results)
    }

    async fn deliver(&mut self, request: &ChatRequest, tokens_sent: usize) -> Result<PerfResults> {
        let dispatched = dispatch(self.api, request, self.config.streaming).await?;
        self.transition(RunState::Dispatched);

        match dispatched {
            Dispatched::Single(completion) => self.deliver_single(completion, tokens_sent),
            Dispatched::Stream(chunks) => self.deliver_stream(chunks, tokens_sent).await,
        }
    }

    fn deliver_single(
        &mut self,
        completion: ChatCompletion,
        tokens_sent: usize,
    ) -> Result<PerfResults> {
        self.transition(RunState::SingleResponse);
        self.sink.emit(&completion.content, true)?;

        // Provider usage is authoritative; local counts only fill in when it is absent.
        let (tokens_sent, tokens_received) = match completion.usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
            None => (tokens_sent, self.tokenizer.count(&completion.content)),
        };
        Ok(PerfResults {
            tokens_sent,
            tokens_received,
            ..PerfResults::default()
        })
    }

    async fn deliver_stream(
        &mut self,
        mut chunks: ChunkStream<'_>,
        tokens_sent: usize,
    ) -> Result<PerfResults> {
        self.transition(RunState::Streaming);

        let mut tokens_received = 0;
        let mut finished = false;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            if self.config.include_statistics {
                tokens_received += self.tokenizer.count(&chunk.content);
            }
            finished = chunk.is_final();
            self.sink.emit(&chunk.content, finished)?;
            if finished {
                break;
            }
        }

        if !finished {
            warn!("chat stream ended without a finish reason");
            self.sink.emit("", true)?;
        }

        Ok(PerfResults {
            tokens_sent,
            tokens_received,
            ..PerfResults::default()
        })
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "run state transition");
        self.state = next;
    }
}
