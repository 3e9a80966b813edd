pub mod answer;
pub mod cot;
pub mod guard;
pub mod prompts;
pub mod retrieval;
pub mod stream;
pub mod usage;

mod error;

pub use answer::{AnswerMemory, AnswerPayload, DETAIL_AGENT, FinalAnswer};
pub use cot::{CotRun, Plan, RetrievalTask, TaskType};
pub use error::{Error, Result};
pub use guard::{Decision, GUARD_AGENT, GuardMemory, GuardReply, GuardVerdict};
pub use stream::{STREAM_DONE_SENTINEL, StreamEvent};
pub use usage::UsageTotals;

use std::{future::Future, pin::Pin, sync::Arc};

use serde::de::DeserializeOwned;

use ccc_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use ccc_domain::json_repair::{JsonRepair, LenientJsonRepair};
use ccc_providers::{
	chat::{self, ChatCompletion, ChatMessage, ChatStream, ResponseFormat, Usage},
	embedding,
};
use ccc_storage::{models::Match, qdrant::QdrantStore};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait ChatProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [ChatMessage],
		format: ResponseFormat,
	) -> BoxFuture<'a, ccc_providers::Result<ChatCompletion>>;

	/// Content fragments followed by one usage record.
	fn complete_stream<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, ccc_providers::Result<ChatStream>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, ccc_providers::Result<Vec<Vec<f32>>>>;
}

pub trait VectorIndex
where
	Self: Send + Sync,
{
	/// Best matches first.
	fn nearest<'a>(
		&'a self,
		vector: &'a [f32],
		top_k: u32,
	) -> BoxFuture<'a, ccc_storage::Result<Vec<Match>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub chat: Arc<dyn ChatProvider>,
	pub embedding: Arc<dyn EmbeddingProvider>,
}
impl Providers {
	pub fn new(chat: Arc<dyn ChatProvider>, embedding: Arc<dyn EmbeddingProvider>) -> Self {
		Self { chat, embedding }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders::default());

		Self { chat: provider.clone(), embedding: provider }
	}
}

/// HTTP-backed providers sharing one connection pool for the life of the process.
#[derive(Debug, Clone, Default)]
pub struct DefaultProviders {
	client: reqwest::Client,
}
impl DefaultProviders {
	pub fn new(client: reqwest::Client) -> Self {
		Self { client }
	}
}

impl ChatProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [ChatMessage],
		format: ResponseFormat,
	) -> BoxFuture<'a, ccc_providers::Result<ChatCompletion>> {
		Box::pin(chat::complete(&self.client, cfg, messages, format))
	}

	fn complete_stream<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [ChatMessage],
	) -> BoxFuture<'a, ccc_providers::Result<ChatStream>> {
		Box::pin(chat::complete_stream(&self.client, cfg, messages))
	}
}

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, ccc_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(&self.client, cfg, texts))
	}
}

impl VectorIndex for QdrantStore {
	fn nearest<'a>(
		&'a self,
		vector: &'a [f32],
		top_k: u32,
	) -> BoxFuture<'a, ccc_storage::Result<Vec<Match>>> {
		Box::pin(QdrantStore::nearest(self, vector, top_k))
	}
}

pub struct CccService {
	pub cfg: Config,
	pub index: Arc<dyn VectorIndex>,
	pub providers: Providers,
	pub repair: Arc<dyn JsonRepair>,
}
impl CccService {
	pub fn new(cfg: Config, qdrant: QdrantStore) -> Self {
		Self::with_providers(cfg, Arc::new(qdrant), Providers::default())
	}

	pub fn with_providers(cfg: Config, index: Arc<dyn VectorIndex>, providers: Providers) -> Self {
		Self { cfg, index, providers, repair: Arc::new(LenientJsonRepair) }
	}

	pub fn with_json_repair(mut self, repair: Arc<dyn JsonRepair>) -> Self {
		self.repair = repair;

		self
	}

	/// One JSON-mode call to the primary chat model, decoded into `T`.
	pub(crate) async fn generate_json<T>(
		&self,
		stage: &'static str,
		messages: &[ChatMessage],
	) -> Result<(T, Usage)>
	where
		T: DeserializeOwned,
	{
		let completion = self
			.providers
			.chat
			.complete(&self.cfg.providers.chat, messages, ResponseFormat::JsonObject)
			.await?;
		let value = self.decode(stage, &completion.content)?;

		Ok((value, completion.usage))
	}

	pub(crate) fn decode<T>(&self, stage: &'static str, raw: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let repaired = self
			.repair
			.repair(raw)
			.map_err(|err| Error::MalformedOutput { stage, message: err.to_string() })?;

		serde_json::from_str(&repaired)
			.map_err(|err| Error::MalformedOutput { stage, message: err.to_string() })
	}
}

pub(crate) fn require_question(question: &str) -> Result<&str> {
	let question = question.trim();

	if question.is_empty() {
		return Err(Error::InvalidRequest { message: "Question must be non-empty.".to_string() });
	}

	Ok(question)
}
