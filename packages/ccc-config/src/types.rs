use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub guard: Guard,
	#[serde(default)]
	pub cot: Cot,
	pub security: Security,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	/// Primary chat model. Answers, plans, step definitions and the domain guard layer.
	pub chat: LlmProviderConfig,
	/// Content-safety classifier replying `safe` or `unsafe\n<code>`.
	pub guard: LlmProviderConfig,
	/// Prompt-injection classifier replying with a numeric score.
	pub prompt_guard: LlmProviderConfig,
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	/// Unset leaves the HTTP client without a request timeout.
	pub timeout_ms: Option<u64>,
	/// Wraps the request as `{"input": {...}}` for serverless endpoints.
	#[serde(default)]
	pub serverless_envelope: bool,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	#[serde(default = "default_top_p")]
	pub top_p: f32,
	#[serde(default = "default_max_tokens")]
	pub max_tokens: u32,
	/// Unset leaves the HTTP client without a request timeout.
	pub timeout_ms: Option<u64>,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub top_k: u32,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self { top_k: 10 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Guard {
	pub chunk_chars: usize,
	pub overlap_chars: usize,
	pub attack_threshold: f32,
}
impl Default for Guard {
	fn default() -> Self {
		Self { chunk_chars: 800, overlap_chars: 300, attack_threshold: 0.9 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Cot {
	pub max_steps: usize,
}
impl Default for Cot {
	fn default() -> Self {
		Self { max_steps: 3 }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
	pub api_auth_token: Option<String>,
}

fn default_top_p() -> f32 {
	0.1
}

fn default_max_tokens() -> u32 {
	8_192
}
