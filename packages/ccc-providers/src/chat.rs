//! OpenAI-compatible chat completions, blocking and server-sent-event streaming.

use std::{collections::VecDeque, pin::Pin};

use futures::{Stream, StreamExt, future, stream};
use reqwest::Client;
use reqwest_eventsource::{Error as EventSourceError, Event, EventSource, retry};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

const SSE_DONE: &str = "[DONE]";

pub type ChatStream = Pin<Box<dyn Stream<Item = Result<ChatChunk>> + Send>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
	pub role: String,
	pub content: String,
}
impl ChatMessage {
	pub fn system(content: impl Into<String>) -> Self {
		Self { role: "system".to_string(), content: content.into() }
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self { role: "user".to_string(), content: content.into() }
	}

	pub fn assistant(content: impl Into<String>) -> Self {
		Self { role: "assistant".to_string(), content: content.into() }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
	Text,
	JsonObject,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
	#[serde(default)]
	pub prompt_tokens: u64,
	#[serde(default)]
	pub completion_tokens: u64,
	#[serde(default)]
	pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatCompletion {
	pub content: String,
	pub usage: Usage,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatChunk {
	Content(String),
	Usage(Usage),
}

pub async fn complete(
	client: &Client,
	cfg: &ccc_config::LlmProviderConfig,
	messages: &[ChatMessage],
	format: ResponseFormat,
) -> Result<ChatCompletion> {
	let mut body = request_body(cfg, messages);

	if format == ResponseFormat::JsonObject {
		body["response_format"] = serde_json::json!({ "type": "json_object" });
	}

	let url = format!("{}{}", cfg.api_base, cfg.path);
	let res = crate::with_timeout(client.post(url), cfg.timeout_ms)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_completion(json)
}

pub async fn complete_stream(
	client: &Client,
	cfg: &ccc_config::LlmProviderConfig,
	messages: &[ChatMessage],
) -> Result<ChatStream> {
	let mut body = request_body(cfg, messages);

	body["stream"] = Value::Bool(true);
	body["stream_options"] = serde_json::json!({ "include_usage": true });

	let url = format!("{}{}", cfg.api_base, cfg.path);
	let request = crate::with_timeout(client.post(url), cfg.timeout_ms)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body);
	let mut source = EventSource::new(request)?;

	source.set_retry_policy(Box::new(retry::Never));

	let data = source.filter_map(|event| future::ready(event_data(event)));

	Ok(Box::pin(sse_chunks(data)))
}

fn request_body(cfg: &ccc_config::LlmProviderConfig, messages: &[ChatMessage]) -> Value {
	serde_json::json!({
		"model": cfg.model,
		"messages": messages,
		"temperature": cfg.temperature,
		"top_p": cfg.top_p,
		"max_tokens": cfg.max_tokens,
	})
}

fn parse_completion(json: Value) -> Result<ChatCompletion> {
	if let Some(error) = json.get("error") {
		return Err(Error::InvalidResponse { message: format!("Chat provider error: {error}.") });
	}

	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Chat response is missing message content.".to_string(),
		})?;
	let usage = match json.get("usage") {
		Some(usage) if !usage.is_null() => serde_json::from_value(usage.clone())?,
		_ => Usage::default(),
	};

	Ok(ChatCompletion { content: content.to_string(), usage })
}

/// Payload of one SSE event, or `None` for events that carry no chat data.
fn event_data(event: Result<Event, EventSourceError>) -> Option<Result<String>> {
	match event {
		Ok(Event::Open) | Err(EventSourceError::StreamEnded) => None,
		Ok(Event::Message(message)) => Some(Ok(message.data)),
		Err(EventSourceError::Transport(err)) => Some(Err(err.into())),
		Err(EventSourceError::InvalidStatusCode(status, _)) => Some(Err(Error::InvalidResponse {
			message: format!("Chat stream returned HTTP {status}."),
		})),
		Err(err) =>
			Some(Err(Error::InvalidResponse { message: format!("Chat stream failed: {err}.") })),
	}
}

struct SseState<S> {
	events: Pin<Box<S>>,
	pending: VecDeque<ChatChunk>,
	finished: bool,
}

/// Turns SSE `data` payloads into content and usage chunks.
///
/// The stream ends at `[DONE]`, when the events run out, or after the first error.
pub fn sse_chunks<S>(events: S) -> impl Stream<Item = Result<ChatChunk>> + Send
where
	S: Stream<Item = Result<String>> + Send + 'static,
{
	let state = SseState { events: Box::pin(events), pending: VecDeque::new(), finished: false };

	stream::unfold(state, |mut state| async move {
		loop {
			if let Some(chunk) = state.pending.pop_front() {
				return Some((Ok(chunk), state));
			}
			if state.finished {
				return None;
			}

			let parsed = match state.events.next().await? {
				Ok(data) => parse_event_data(&data),
				Err(err) => Err(err),
			};

			match parsed {
				Ok(EventData::Done) => state.finished = true,
				Ok(EventData::Chunks(chunks)) => state.pending.extend(chunks),
				Err(err) => {
					state.finished = true;

					return Some((Err(err), state));
				},
			}
		}
	})
}

#[derive(Debug)]
enum EventData {
	Done,
	Chunks(Vec<ChatChunk>),
}

fn parse_event_data(data: &str) -> Result<EventData> {
	let data = data.trim();

	if data == SSE_DONE {
		return Ok(EventData::Done);
	}
	if data.is_empty() {
		return Ok(EventData::Chunks(Vec::new()));
	}

	let json: Value = serde_json::from_str(data).map_err(|err| Error::InvalidResponse {
		message: format!("Chat stream event is not valid JSON: {err}."),
	})?;

	if let Some(error) = json.get("error") {
		return Err(Error::InvalidResponse { message: format!("Chat provider error: {error}.") });
	}

	let mut chunks = Vec::new();

	if let Some(content) = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("delta"))
		.and_then(|delta| delta.get("content"))
		.and_then(|c| c.as_str())
		.filter(|c| !c.is_empty())
	{
		chunks.push(ChatChunk::Content(content.to_string()));
	}
	if let Some(usage) = json.get("usage").filter(|usage| usage.is_object()) {
		chunks.push(ChatChunk::Usage(serde_json::from_value(usage.clone())?));
	}

	Ok(EventData::Chunks(chunks))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn data(events: &[&str]) -> stream::Iter<std::vec::IntoIter<Result<String>>> {
		let events: Vec<Result<String>> = events.iter().map(|event| Ok(event.to_string())).collect();

		stream::iter(events)
	}

	async fn collect(events: &[&str]) -> Vec<Result<ChatChunk>> {
		sse_chunks(data(events)).collect().await
	}

	#[test]
	fn parses_completion_content_and_usage() {
		let json = serde_json::json!({
			"choices": [{ "message": { "content": "{\"ans\": \"ตอบ\"}" } }],
			"usage": { "prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17 }
		});
		let parsed = parse_completion(json).expect("parse failed");

		assert_eq!(parsed.content, "{\"ans\": \"ตอบ\"}");
		assert_eq!(parsed.usage.total_tokens, 17);
	}

	#[test]
	fn completion_without_usage_counts_zero() {
		let json = serde_json::json!({ "choices": [{ "message": { "content": "safe" } }] });

		assert_eq!(parse_completion(json).expect("parse failed").usage, Usage::default());
	}

	#[test]
	fn completion_without_content_is_rejected() {
		let json = serde_json::json!({ "choices": [] });

		assert!(matches!(parse_completion(json), Err(Error::InvalidResponse { .. })));
	}

	#[tokio::test]
	async fn stream_stops_at_done_marker() {
		let events = [
			r#"{"choices":[{"delta":{"content":"มาตรา"}}]}"#,
			r#"{"choices":[],"usage":{"prompt_tokens":3,"completion_tokens":2,"total_tokens":5}}"#,
			"[DONE]",
			r#"{"choices":[{"delta":{"content":"after done"}}]}"#,
		];
		let chunks: Vec<ChatChunk> =
			collect(&events).await.into_iter().collect::<Result<_>>().expect("stream failed");

		assert_eq!(
			chunks,
			vec![
				ChatChunk::Content("มาตรา".to_string()),
				ChatChunk::Usage(Usage { prompt_tokens: 3, completion_tokens: 2, total_tokens: 5 }),
			]
		);
	}

	#[tokio::test]
	async fn stream_skips_role_deltas_and_blank_data() {
		let events = [
			r#"{"choices":[{"delta":{"role":"assistant"}}]}"#,
			"  ",
			r#"{"choices":[{"delta":{"content":"ok"}}]}"#,
		];
		let chunks: Vec<ChatChunk> =
			collect(&events).await.into_iter().collect::<Result<_>>().expect("stream failed");

		assert_eq!(chunks, vec![ChatChunk::Content("ok".to_string())]);
	}

	#[tokio::test]
	async fn stream_stops_after_malformed_event() {
		let items = collect(&["{not json}", r#"{"choices":[{"delta":{"content":"late"}}]}"#]).await;

		assert_eq!(items.len(), 1);
		assert!(matches!(items[0], Err(Error::InvalidResponse { .. })));
	}

	#[test]
	fn provider_error_event_is_surfaced() {
		let parsed = parse_event_data(r#"{"error":{"message":"overloaded"}}"#);

		assert!(matches!(parsed, Err(Error::InvalidResponse { .. })));
	}

	#[test]
	fn connection_events_carry_no_data() {
		assert!(event_data(Ok(Event::Open)).is_none());
		assert!(event_data(Err(EventSourceError::StreamEnded)).is_none());
	}
}
