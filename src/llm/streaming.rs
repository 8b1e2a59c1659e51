//! Streaming chat-completion decoder
//!
//! Turns the provider's server-sent-event byte stream into typed
//! [`StreamEvent`]s. SSE framing (including frames and UTF-8 sequences split
//! across network chunks) is handled by `eventsource-stream`; this module
//! interprets the JSON payload of each frame.
//!
//! The decoded sequence is finite: it ends right after the first
//! [`StreamEvent::Done`] or [`StreamEvent::StreamError`].

use super::LlmError;
use eventsource_stream::{Event, Eventsource};
use futures::stream::{self, BoxStream};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::collections::VecDeque;
use std::fmt::Display;

/// One decoded increment of a model turn
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Fragment of assistant text
    ContentDelta(String),
    /// Fragment of one tool call, addressed by `index`
    ToolCallDelta(ToolCallDelta),
    /// The turn is complete
    Done(Option<FinishReason>),
    /// The stream failed; nothing follows
    StreamError(LlmError),
}

/// Partial tool call as the provider streams it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCallDelta {
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments: String,
}

impl ToolCallDelta {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn arguments(mut self, fragment: impl Into<String>) -> Self {
        self.arguments = fragment.into();
        self
    }
}

/// Why the provider ended the turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
    Other(String),
}

impl From<&str> for FinishReason {
    fn from(reason: &str) -> Self {
        match reason {
            "stop" => Self::Stop,
            "tool_calls" | "function_call" => Self::ToolCalls,
            "length" => Self::Length,
            "content_filter" => Self::ContentFilter,
            other => Self::Other(other.to_string()),
        }
    }
}

pub type EventStream = BoxStream<'static, StreamEvent>;

/// Decode an SSE byte stream into [`StreamEvent`]s
pub fn decode_sse<S, B, E>(bytes: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let decoder = Decoder {
        frames: bytes.eventsource().boxed(),
        pending: VecDeque::new(),
        finished: false,
    };
    stream::unfold(decoder, |mut decoder| async move {
        let event = decoder.next_event().await?;
        Some((event, decoder))
    })
    .boxed()
}

type Frame<E> = Result<Event, eventsource_stream::EventStreamError<E>>;

struct Decoder<E> {
    frames: BoxStream<'static, Frame<E>>,
    pending: VecDeque<StreamEvent>,
    finished: bool,
}

impl<E: Display> Decoder<E> {
    async fn next_event(&mut self) -> Option<StreamEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                if matches!(event, StreamEvent::Done(_) | StreamEvent::StreamError(_)) {
                    self.finished = true;
                    self.pending.clear();
                }
                return Some(event);
            }
            if self.finished {
                return None;
            }
            match self.frames.next().await {
                Some(Ok(frame)) => self.decode_frame(&frame.data),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "Stream interrupted");
                    self.pending
                        .push_back(StreamEvent::StreamError(LlmError::network(format!(
                            "Stream interrupted: {e}"
                        ))));
                }
                None => {
                    self.pending.push_back(StreamEvent::StreamError(LlmError::network(
                        "stream closed before completion",
                    )));
                }
            }
        }
    }

    fn decode_frame(&mut self, data: &str) {
        let data = data.trim();
        if data.is_empty() {
            return;
        }
        if data == "[DONE]" {
            self.pending.push_back(StreamEvent::Done(None));
            return;
        }

        let chunk: ChunkPayload = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(error = %e, data, "Unparseable stream frame");
                self.pending.push_back(StreamEvent::StreamError(LlmError::unknown(format!(
                    "Unparseable stream frame: {e}"
                ))));
                return;
            }
        };

        if let Some(error) = chunk.error {
            self.pending
                .push_back(StreamEvent::StreamError(LlmError::provider(error.message())));
            return;
        }

        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                self.pending.push_back(StreamEvent::ContentDelta(text));
            }
            for call in choice.delta.tool_calls {
                let function = call.function.unwrap_or_default();
                self.pending.push_back(StreamEvent::ToolCallDelta(ToolCallDelta {
                    index: call.index,
                    id: call.id,
                    name: function.name,
                    arguments: function.arguments.unwrap_or_default(),
                }));
            }
            // Some compatible providers send "" on intermediate chunks
            if let Some(reason) = choice.finish_reason.filter(|r| !r.is_empty()) {
                self.pending
                    .push_back(StreamEvent::Done(Some(FinishReason::from(reason.as_str()))));
            }
        }
    }
}

// Wire types for one `chat.completion.chunk`

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ChunkToolCall>,
}

#[derive(Debug, Deserialize)]
struct ChunkToolCall {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<ChunkFunction>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkFunction {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChunkError {
    Detailed { message: String },
    Plain(String),
    Other(serde_json::Value),
}

impl ChunkError {
    fn message(&self) -> String {
        match self {
            ChunkError::Detailed { message } | ChunkError::Plain(message) => message.clone(),
            ChunkError::Other(value) => value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmErrorKind;

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send {
        let owned: Vec<Result<Vec<u8>, std::io::Error>> =
            parts.iter().map(|p| Ok(p.to_vec())).collect();
        stream::iter(owned)
    }

    async fn collect(parts: &[&[u8]]) -> Vec<StreamEvent> {
        decode_sse(chunks(parts)).collect().await
    }

    #[tokio::test]
    async fn test_content_and_finish_reason() {
        let events = collect(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Is your \"}}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"person bald?\"}}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            b"data: [DONE]\n\n",
        ])
        .await;

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], StreamEvent::ContentDelta(t) if t == "Is your "));
        assert!(matches!(&events[1], StreamEvent::ContentDelta(t) if t == "person bald?"));
        assert!(matches!(
            &events[2],
            StreamEvent::Done(Some(FinishReason::Stop))
        ));
    }

    #[tokio::test]
    async fn test_empty_finish_reason_is_not_done() {
        let events = collect(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Does \"},\"finish_reason\":\"\"}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"she smile?\"},\"finish_reason\":\"\"}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        ])
        .await;

        assert_eq!(events.len(), 3);
        assert!(matches!(&events[1], StreamEvent::ContentDelta(t) if t == "she smile?"));
        assert!(matches!(
            &events[2],
            StreamEvent::Done(Some(FinishReason::Stop))
        ));
    }

    #[tokio::test]
    async fn test_frames_split_mid_line() {
        let events = collect(&[
            b"data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"t1\",",
            b"\"function\":{\"name\":\"eliminateCharacter\",\"arguments\":\"{\\\"char\"}}]}}]}\n",
            b"\ndata: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"acterName\\\":\\\"Alex\\\"}\"}}]}}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
        ])
        .await;

        assert_eq!(events.len(), 3);
        let StreamEvent::ToolCallDelta(first) = &events[0] else {
            panic!("expected tool call delta, got {:?}", events[0]);
        };
        assert_eq!(first.index, 0);
        assert_eq!(first.id.as_deref(), Some("t1"));
        assert_eq!(first.name.as_deref(), Some("eliminateCharacter"));
        assert_eq!(first.arguments, "{\"char");

        let StreamEvent::ToolCallDelta(second) = &events[1] else {
            panic!("expected tool call delta, got {:?}", events[1]);
        };
        assert!(second.id.is_none());
        assert_eq!(second.arguments, "acterName\":\"Alex\"}");
        assert!(matches!(
            &events[2],
            StreamEvent::Done(Some(FinishReason::ToolCalls))
        ));
    }

    #[tokio::test]
    async fn test_utf8_split_across_chunks() {
        let frame = "data: {\"choices\":[{\"delta\":{\"content\":\"caf\u{e9}\"}}]}\n\ndata: [DONE]\n\n";
        let bytes = frame.as_bytes();
        let split = frame.find('\u{e9}').unwrap() + 1;
        let events = collect(&[&bytes[..split], &bytes[split..]]).await;

        assert!(matches!(&events[0], StreamEvent::ContentDelta(t) if t == "caf\u{e9}"));
        assert!(matches!(&events[1], StreamEvent::Done(None)));
    }

    #[tokio::test]
    async fn test_done_sentinel_without_finish_reason() {
        let events = collect(&[
            b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n",
            b"data: [DONE]\n\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        ])
        .await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], StreamEvent::Done(None)));
    }

    #[tokio::test]
    async fn test_early_close_is_stream_error() {
        let events = collect(&[b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n"]).await;

        assert_eq!(events.len(), 2);
        let StreamEvent::StreamError(err) = &events[1] else {
            panic!("expected stream error, got {:?}", events[1]);
        };
        assert_eq!(err.kind, LlmErrorKind::Network);
        assert_eq!(err.message, "stream closed before completion");
    }

    #[tokio::test]
    async fn test_provider_error_payload() {
        let events = collect(&[
            b"data: {\"error\":{\"message\":\"model overloaded\",\"type\":\"server_error\"}}\n\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"never\"}}]}\n\n",
        ])
        .await;

        assert_eq!(events.len(), 1);
        let StreamEvent::StreamError(err) = &events[0] else {
            panic!("expected stream error");
        };
        assert_eq!(err.kind, LlmErrorKind::Provider);
        assert_eq!(err.message, "model overloaded");
    }

    #[tokio::test]
    async fn test_unparseable_frame() {
        let events = collect(&[b"data: {not json\n\n"]).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::StreamError(e) if e.kind == LlmErrorKind::Unknown));
    }

    #[tokio::test]
    async fn test_transport_failure_emits_single_error() {
        let parts: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\n".to_vec()),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            )),
            Ok(b"data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n\n".to_vec()),
        ];
        let events: Vec<StreamEvent> = decode_sse(stream::iter(parts)).collect().await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], StreamEvent::ContentDelta(_)));
        assert!(matches!(&events[1], StreamEvent::StreamError(e) if e.kind == LlmErrorKind::Network));
    }

    #[tokio::test]
    async fn test_interleaved_indices_keep_arrival_order() {
        let events = collect(&[
            b"data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":1,\"id\":\"b\",\"function\":{\"name\":\"endGame\",\"arguments\":\"\"}}]}}]}\n\n",
            b"data: {\"choices\":[{\"delta\":{\"content\":\"x\",\"tool_calls\":[{\"index\":0,\"id\":\"a\",\"function\":{\"name\":\"eliminateCharacter\"}}]}}]}\n\n",
            b"data: [DONE]\n\n",
        ])
        .await;

        let indices: Vec<u32> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ToolCallDelta(d) => Some(d.index),
                _ => None,
            })
            .collect();
        assert_eq!(indices, vec![1, 0]);
        assert!(matches!(&events[1], StreamEvent::ContentDelta(t) if t == "x"));
    }
}
