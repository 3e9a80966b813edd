//! Scripted stand-ins for the chat, embedding and index collaborators.

use std::{
	collections::{HashMap, VecDeque},
	sync::{
		Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use futures::stream;
use serde_json::{Map, Value};

use ccc_config::{
	Config, Cot, EmbeddingProviderConfig, Guard, LlmProviderConfig, Providers, Qdrant, Retrieval,
	Security, Service, Storage,
};
use ccc_providers::{
	Error as ProviderError,
	chat::{ChatChunk, ChatCompletion, ChatMessage, ChatStream, ResponseFormat, Usage},
};
use ccc_service::{BoxFuture, ChatProvider, EmbeddingProvider, VectorIndex};
use ccc_storage::models::Match;

pub const CHAT_MODEL: &str = "chat-model";
pub const GUARD_MODEL: &str = "guard-model";
pub const PROMPT_GUARD_MODEL: &str = "prompt-guard-model";
pub const VECTOR_DIM: u32 = 4;

const STREAM_FRAGMENT_CHARS: usize = 3;

#[derive(Debug, Clone)]
pub struct ChatCall {
	pub model: String,
	pub messages: Vec<ChatMessage>,
	/// `None` for streaming calls.
	pub format: Option<ResponseFormat>,
}

/// Chat provider answering from per-model reply queues.
///
/// A queued reply is used once; a sticky reply answers whenever the queue is empty.
/// Streaming calls draw from the same queues and split the reply into short fragments.
pub struct ScriptedChat {
	queued: Mutex<HashMap<String, VecDeque<String>>>,
	sticky: Mutex<HashMap<String, String>>,
	calls: Mutex<Vec<ChatCall>>,
	usage: Usage,
}
impl ScriptedChat {
	pub fn new() -> Self {
		Self::with_usage(Usage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 })
	}

	pub fn with_usage(usage: Usage) -> Self {
		Self {
			queued: Mutex::new(HashMap::new()),
			sticky: Mutex::new(HashMap::new()),
			calls: Mutex::new(Vec::new()),
			usage,
		}
	}

	/// Guard layers 1 and 2 pass and layer 3 allows.
	pub fn allowing() -> Self {
		let chat = Self::new();

		chat.set_sticky(GUARD_MODEL, "safe");
		chat.set_sticky(PROMPT_GUARD_MODEL, "0.01");

		chat
	}

	pub fn push_reply(&self, model: &str, reply: impl Into<String>) {
		let mut queued = self.queued.lock().unwrap_or_else(|err| err.into_inner());

		queued.entry(model.to_string()).or_default().push_back(reply.into());
	}

	pub fn set_sticky(&self, model: &str, reply: impl Into<String>) {
		let mut sticky = self.sticky.lock().unwrap_or_else(|err| err.into_inner());

		sticky.insert(model.to_string(), reply.into());
	}

	pub fn calls(&self) -> Vec<ChatCall> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn calls_for(&self, model: &str) -> Vec<ChatCall> {
		self.calls().into_iter().filter(|call| call.model == model).collect()
	}

	pub fn usage(&self) -> Usage {
		self.usage
	}

	fn next_reply(&self, call: ChatCall) -> ccc_providers::Result<String> {
		let model = call.model.clone();

		self.calls.lock().unwrap_or_else(|err| err.into_inner()).push(call);

		let queued = self
			.queued
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.get_mut(&model)
			.and_then(VecDeque::pop_front);

		if let Some(reply) = queued {
			return Ok(reply);
		}

		self.sticky.lock().unwrap_or_else(|err| err.into_inner()).get(&model).cloned().ok_or_else(
			|| ProviderError::InvalidResponse { message: format!("No scripted reply for {model}.") },
		)
	}
}

impl Default for ScriptedChat {
	fn default() -> Self {
		Self::new()
	}
}

impl ChatProvider for ScriptedChat {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [ChatMessage],
		format: ResponseFormat,
	) -> BoxFuture<'a, ccc_providers::Result<ChatCompletion>> {
		let call =
			ChatCall { model: cfg.model.clone(), messages: messages.to_vec(), format: Some(format) };
		let result =
			self.next_reply(call).map(|content| ChatCompletion { content, usage: self.usage });

		Box::pin(async move { result })
	}

	fn complete_stream<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, ccc_providers::Result<ChatStream>> {
		let call = ChatCall { model: cfg.model.clone(), messages: messages.to_vec(), format: None };
		let usage = self.usage;
		let result = self.next_reply(call).map(|reply| {
			let chars: Vec<char> = reply.chars().collect();
			let mut chunks: Vec<ccc_providers::Result<ChatChunk>> = chars
				.chunks(STREAM_FRAGMENT_CHARS)
				.map(|fragment| Ok(ChatChunk::Content(fragment.iter().collect())))
				.collect();

			chunks.push(Ok(ChatChunk::Usage(usage)));

			Box::pin(stream::iter(chunks)) as ChatStream
		});

		Box::pin(async move { result })
	}
}

/// Embedding provider returning the same vector for every text.
pub struct FixedEmbedding {
	vector: Vec<f32>,
	texts: Mutex<Vec<String>>,
}
impl FixedEmbedding {
	pub fn new(dim: u32) -> Self {
		Self { vector: vec![0.1; dim as usize], texts: Mutex::new(Vec::new()) }
	}

	pub fn texts(&self) -> Vec<String> {
		self.texts.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}

impl Default for FixedEmbedding {
	fn default() -> Self {
		Self::new(VECTOR_DIM)
	}
}

impl EmbeddingProvider for FixedEmbedding {
	fn embed<'a>(
		&'a self,
		_: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, ccc_providers::Result<Vec<Vec<f32>>>> {
		self.texts.lock().unwrap_or_else(|err| err.into_inner()).extend_from_slice(texts);

		let vectors = texts.iter().map(|_| self.vector.clone()).collect();

		Box::pin(async move { Ok(vectors) })
	}
}

/// Index returning queued match lists in order, then the default list.
pub struct StubIndex {
	queued: Mutex<VecDeque<Vec<Match>>>,
	default: Vec<Match>,
	queries: AtomicUsize,
}
impl StubIndex {
	pub fn new(default: Vec<Match>) -> Self {
		Self { queued: Mutex::new(VecDeque::new()), default, queries: AtomicUsize::new(0) }
	}

	pub fn empty() -> Self {
		Self::new(Vec::new())
	}

	pub fn push_matches(&self, matches: Vec<Match>) {
		self.queued.lock().unwrap_or_else(|err| err.into_inner()).push_back(matches);
	}

	pub fn queries(&self) -> usize {
		self.queries.load(Ordering::SeqCst)
	}
}

impl VectorIndex for StubIndex {
	fn nearest<'a>(
		&'a self,
		_: &'a [f32],
		top_k: u32,
	) -> BoxFuture<'a, ccc_storage::Result<Vec<Match>>> {
		self.queries.fetch_add(1, Ordering::SeqCst);

		let mut matches = self
			.queued
			.lock()
			.unwrap_or_else(|err| err.into_inner())
			.pop_front()
			.unwrap_or_else(|| self.default.clone());

		matches.truncate(top_k as usize);

		Box::pin(async move { Ok(matches) })
	}
}

/// Index hit whose payload carries `text`.
pub fn text_match(text: &str) -> Match {
	let mut metadata = Map::new();

	metadata.insert("text".to_string(), Value::String(text.to_string()));

	Match { id: None, score: 0.9, metadata }
}

pub fn answer_json(sections: &str, ans: &str) -> String {
	serde_json::json!({ "sections": sections, "ans": ans }).to_string()
}

pub fn test_config() -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage {
			qdrant: Qdrant {
				url: "http://127.0.0.1:6334".to_string(),
				collection: "ccc_sections_test".to_string(),
				vector_dim: VECTOR_DIM,
			},
		},
		providers: Providers {
			chat: llm(CHAT_MODEL),
			guard: llm(GUARD_MODEL),
			prompt_guard: llm(PROMPT_GUARD_MODEL),
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:9".to_string(),
				api_key: "test-key".to_string(),
				path: "/embeddings".to_string(),
				model: "embedding-model".to_string(),
				dimensions: VECTOR_DIM,
				timeout_ms: None,
				serverless_envelope: false,
				default_headers: Map::new(),
			},
		},
		retrieval: Retrieval::default(),
		guard: Guard::default(),
		cot: Cot::default(),
		security: Security { bind_localhost_only: true, api_auth_token: None },
	}
}

fn llm(model: &str) -> LlmProviderConfig {
	LlmProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://127.0.0.1:9".to_string(),
		api_key: "test-key".to_string(),
		path: "/chat/completions".to_string(),
		model: model.to_string(),
		temperature: 0.0,
		top_p: 0.1,
		max_tokens: 1_024,
		timeout_ms: None,
		default_headers: Map::new(),
	}
}
