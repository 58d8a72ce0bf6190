use tracing::debug;

use crate::error::Result;
use crate::model::ChatRequest;
use crate::providers::{ChatApi, ChatCompletion, ChunkStream};

pub enum Dispatched<'a> {
    Stream(ChunkStream<'a>),
    Single(ChatCompletion),
}

/// Sends `request` down the streaming or the single-response path.
pub async fn dispatch<'a, A>(
    api: &'a A,
    request: &'a ChatRequest,
    streaming: bool,
) -> Result<Dispatched<'a>>
where
    A: ChatApi + ?Sized,
{
    let roles: Vec<&str> = request
        .messages
        .iter()
        .map(|message| message.role.as_str())
        .collect();
    debug!(
        model = %request.model,
        roles = ?roles,
        max_tokens = request.max_tokens,
        streaming,
        "dispatching chat request"
    );

    if streaming {
        Ok(Dispatched::Stream(api.stream(request).await?))
    } else {
        Ok(Dispatched::Single(api.complete(request).await?))
    }
}
