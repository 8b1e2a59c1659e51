//! Chat-completion provider abstraction
//!
//! Providers open a streamed model turn and hand back decoded
//! [`StreamEvent`]s; accumulation and dispatch happen in the runtime.

pub mod accumulator;
mod error;
mod openai;
pub mod streaming;
mod types;

#[cfg(test)]
mod proptests;

pub use accumulator::ToolCallAccumulator;
pub use error::{LlmError, LlmErrorKind};
pub use openai::{OpenAIProvider, DEFAULT_BASE_URL};
pub use streaming::{decode_sse, EventStream, FinishReason, StreamEvent, ToolCallDelta};
pub use types::*;

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;

/// Common interface for chat-completion providers
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Open a streamed completion. Errors here mean the stream never
    /// started; failures after that arrive as [`StreamEvent::StreamError`].
    async fn stream_chat(&self, request: &ChatRequest) -> Result<EventStream, LlmError>;

    /// Name used in logs
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: ChatProvider + ?Sized> ChatProvider for Arc<T> {
    async fn stream_chat(&self, request: &ChatRequest) -> Result<EventStream, LlmError> {
        (**self).stream_chat(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Logging wrapper for providers
pub struct LoggingProvider {
    inner: Arc<dyn ChatProvider>,
    name: String,
}

impl LoggingProvider {
    pub fn new(inner: Arc<dyn ChatProvider>) -> Self {
        let name = inner.name().to_string();
        Self { inner, name }
    }
}

#[async_trait]
impl ChatProvider for LoggingProvider {
    async fn stream_chat(&self, request: &ChatRequest) -> Result<EventStream, LlmError> {
        let start = Instant::now();
        let model = request.model.clone();
        let result = self.inner.stream_chat(request).await;

        match result {
            Ok(stream) => {
                tracing::info!(
                    provider = %self.name,
                    model = %model,
                    messages = request.messages.len(),
                    open_ms = %start.elapsed().as_millis(),
                    "LLM stream opened"
                );
                let provider = self.name.clone();
                Ok(stream
                    .inspect(move |event| match event {
                        StreamEvent::Done(reason) => tracing::info!(
                            provider = %provider,
                            model = %model,
                            duration_ms = %start.elapsed().as_millis(),
                            finish_reason = ?reason,
                            "LLM stream completed"
                        ),
                        StreamEvent::StreamError(e) => tracing::error!(
                            provider = %provider,
                            model = %model,
                            duration_ms = %start.elapsed().as_millis(),
                            error = %e.message,
                            retryable = e.kind.is_retryable(),
                            "LLM stream failed"
                        ),
                        StreamEvent::ContentDelta(_) | StreamEvent::ToolCallDelta(_) => {}
                    })
                    .boxed())
            }
            Err(e) => {
                tracing::error!(
                    provider = %self.name,
                    model = %model,
                    duration_ms = %start.elapsed().as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "LLM request failed"
                );
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
