//! Streaming variants of both answer paths.
//!
//! A spawned orchestrator writes [`StreamEvent`]s into a bounded channel. Dropping the receiving
//! stream closes the channel, which stops the orchestrator and drops any in-flight upstream call.

use std::sync::Arc;

use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use ccc_domain::safety::PROCESSING_ERROR_MESSAGE;
use ccc_providers::chat::{ChatChunk, ChatMessage, Usage};

use crate::{
	CccService, Error, Result, UsageTotals,
	prompts::{self, OutputStyle},
};

/// Literal payload of the last SSE event on the wire.
pub const STREAM_DONE_SENTINEL: &str = "[DONE]";

pub(crate) const STATUS_PLANNING: &str = "กำลังวางแผนการค้นหา...";
const STATUS_SEARCHING: &str = "กำลังค้นหาข้อมูล...";
const STATUS_ANSWERING: &str = "กำลังวิเคราะห์และสร้างคำตอบ...";
const STATUS_SYNTHESIZING: &str = "กำลังสรุปคำตอบ...";

const EVENT_BUFFER: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
	Status {
		message: String,
	},
	Plan {
		steps: Vec<String>,
		rationale: String,
	},
	CotStep {
		step: usize,
		total: usize,
		description: String,
	},
	Content {
		text: String,
	},
	Done {
		#[serde(flatten)]
		usage: UsageTotals,
		#[serde(rename = "fullContent")]
		full_content: String,
	},
	Error {
		message: String,
	},
}
impl StreamEvent {
	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Done { .. } | Self::Error { .. })
	}
}

/// Event sink for one run. A silent sink drops every event.
#[derive(Debug, Clone, Default)]
pub(crate) struct Progress {
	tx: Option<mpsc::Sender<StreamEvent>>,
}
impl Progress {
	pub(crate) fn silent() -> Self {
		Self { tx: None }
	}

	pub(crate) async fn emit(&self, event: StreamEvent) -> Result<()> {
		let Some(tx) = &self.tx else {
			return Ok(());
		};

		tx.send(event).await.map_err(|_| Error::Cancelled)
	}

	pub(crate) async fn status(&self, message: impl Into<String>) -> Result<()> {
		self.emit(StreamEvent::Status { message: message.into() }).await
	}
}

#[derive(Debug, Clone, Copy)]
enum Mode {
	SingleHop,
	ChainOfThought,
}

impl CccService {
	/// Streams a single-hop answer as plain text.
	pub fn answer_stream(self: &Arc<Self>, question: String) -> ReceiverStream<StreamEvent> {
		self.spawn_stream(question, Mode::SingleHop)
	}

	/// Streams a chain-of-thought answer; the synthesis is streamed as plain text.
	pub fn answer_cot_stream(self: &Arc<Self>, question: String) -> ReceiverStream<StreamEvent> {
		self.spawn_stream(question, Mode::ChainOfThought)
	}

	fn spawn_stream(self: &Arc<Self>, question: String, mode: Mode) -> ReceiverStream<StreamEvent> {
		let (tx, rx) = mpsc::channel(EVENT_BUFFER);
		let service = Arc::clone(self);

		tokio::spawn(async move {
			let progress = Progress { tx: Some(tx.clone()) };
			let run = async {
				match mode {
					Mode::SingleHop => service.run_single_hop_stream(&question, &progress).await,
					Mode::ChainOfThought => service.run_cot_stream(&question, &progress).await,
				}
			};

			tokio::select! {
				_ = tx.closed() => {
					tracing::debug!(?mode, "Stream consumer went away. Run cancelled.");
				},
				result = run => match result {
					Ok(()) | Err(Error::Cancelled) => {},
					Err(err) => {
						tracing::warn!(?mode, error = %err, "Streaming run failed.");

						let event = StreamEvent::Error { message: PROCESSING_ERROR_MESSAGE.to_string() };
						let _ = tx.send(event).await;
					},
				},
			}
		});

		ReceiverStream::new(rx)
	}

	async fn run_single_hop_stream(&self, question: &str, progress: &Progress) -> Result<()> {
		let question = crate::require_question(question)?;

		progress.status(STATUS_SEARCHING).await?;

		let evidence = self.retrieve(question).await?;

		progress.status(STATUS_ANSWERING).await?;

		let messages = [
			ChatMessage::system(prompts::DETAIL_STREAMING_SYSTEM_PROMPT),
			ChatMessage::user(prompts::single_hop_prompt(question, &evidence, OutputStyle::PlainText)),
		];

		self.stream_final(&messages, UsageTotals::default(), progress).await
	}

	async fn run_cot_stream(&self, question: &str, progress: &Progress) -> Result<()> {
		let question = crate::require_question(question)?;
		let run = self.plan_and_execute(question, progress).await?;

		progress.status(STATUS_SYNTHESIZING).await?;

		let messages = run.synthesis_messages(OutputStyle::PlainText);

		self.stream_final(&messages, run.usage, progress).await
	}

	/// Relays the final generation as content events, then emits the one `done` event.
	async fn stream_final(
		&self,
		messages: &[ChatMessage],
		mut usage: UsageTotals,
		progress: &Progress,
	) -> Result<()> {
		let mut stream =
			self.providers.chat.complete_stream(&self.cfg.providers.chat, messages).await?;
		let mut full_content = String::new();
		let mut final_usage = Usage::default();

		while let Some(chunk) = stream.next().await {
			match chunk? {
				ChatChunk::Content(text) => {
					full_content.push_str(&text);

					progress.emit(StreamEvent::Content { text }).await?;
				},
				ChatChunk::Usage(reported) => final_usage = reported,
			}
		}

		usage.record_final(final_usage);

		tracing::info!(
			content_chars = full_content.chars().count(),
			total_used_tokens = usage.total_used_tokens,
			"Streamed answer finished."
		);

		progress.emit(StreamEvent::Done { usage, full_content }).await
	}
}
