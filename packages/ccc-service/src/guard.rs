use serde::{Deserialize, Deserializer, Serialize, de::Error as _};

use ccc_domain::safety::{self, ScanOutcome};
use ccc_providers::chat::{ChatMessage, ResponseFormat};

use crate::{CccService, Error, Result, prompts};

pub const GUARD_AGENT: &str = "guard_agent";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
	#[serde(rename = "allowed")]
	Allowed,
	#[serde(rename = "not allowed")]
	NotAllowed,
}
impl Decision {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Allowed => "allowed",
			Self::NotAllowed => "not allowed",
		}
	}
}

impl<'de> Deserialize<'de> for Decision {
	fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
	where
		D: Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;
		let normalized = raw.trim().to_lowercase().replace(['_', '-'], " ");

		match normalized.as_str() {
			"allowed" => Ok(Self::Allowed),
			"not allowed" => Ok(Self::NotAllowed),
			_ => Err(D::Error::custom(format!("Unknown guard decision {raw:?}."))),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardVerdict {
	pub decision: Decision,
	#[serde(default)]
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reason: Option<String>,
}
impl GuardVerdict {
	fn denied(message: impl Into<String>) -> Self {
		Self { decision: Decision::NotAllowed, message: message.into(), reason: None }
	}

	pub fn is_allowed(&self) -> bool {
		self.decision == Decision::Allowed
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardMemory {
	pub agent: String,
	pub guard_decision: Decision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardReply {
	pub role: String,
	pub content: String,
	pub memory: GuardMemory,
}

pub fn postprocess(verdict: &GuardVerdict) -> GuardReply {
	GuardReply {
		role: "assistant".to_string(),
		content: verdict.message.clone(),
		memory: GuardMemory { agent: GUARD_AGENT.to_string(), guard_decision: verdict.decision },
	}
}

/// Content of the most recent non-blank user message.
pub fn latest_user_message(conversation: &[ChatMessage]) -> Result<&str> {
	conversation
		.iter()
		.rev()
		.find(|message| message.role == "user" && !message.content.trim().is_empty())
		.map(|message| message.content.as_str())
		.ok_or_else(|| Error::InvalidRequest {
			message: "Conversation has no user message.".to_string(),
		})
}

impl CccService {
	/// Runs the three guard layers in order and stops at the first denial.
	pub async fn evaluate(&self, conversation: &[ChatMessage]) -> Result<GuardVerdict> {
		let prompt = latest_user_message(conversation)?;

		if let ScanOutcome::Blocked { code, message } = self.taxonomy_layer(prompt).await? {
			tracing::info!(
				layer = 1,
				code = code.as_deref().unwrap_or("unknown"),
				category = code.as_deref().and_then(safety::taxonomy_category).unwrap_or("unknown"),
				"Guard denied request."
			);

			return Ok(GuardVerdict::denied(message));
		}
		if let ScanOutcome::Blocked { message, .. } = self.prompt_attack_layer(prompt).await? {
			tracing::info!(layer = 2, "Guard denied request.");

			return Ok(GuardVerdict::denied(message));
		}

		let verdict = self.domain_layer(conversation).await?;

		tracing::info!(layer = 3, decision = verdict.decision.as_str(), "Guard finished.");

		Ok(verdict)
	}

	async fn taxonomy_layer(&self, prompt: &str) -> Result<ScanOutcome> {
		let messages = [ChatMessage::user(prompt)];
		let reply = self
			.providers
			.chat
			.complete(&self.cfg.providers.guard, &messages, ResponseFormat::Text)
			.await?;

		Ok(safety::evaluate_taxonomy(&reply.content))
	}

	async fn prompt_attack_layer(&self, prompt: &str) -> Result<ScanOutcome> {
		let guard = &self.cfg.guard;
		let windows = safety::scan_windows(prompt, guard.chunk_chars, guard.overlap_chars);

		for (index, window) in windows.iter().enumerate() {
			let messages = [ChatMessage::user(*window)];
			let reply = self
				.providers
				.chat
				.complete(&self.cfg.providers.prompt_guard, &messages, ResponseFormat::Text)
				.await?;
			let outcome = safety::check_prompt_attack(&reply.content, guard.attack_threshold);

			if !outcome.is_safe() {
				tracing::debug!(window = index + 1, windows = windows.len(), "Unsafe window found.");

				return Ok(outcome);
			}
		}

		Ok(ScanOutcome::Safe)
	}

	async fn domain_layer(&self, conversation: &[ChatMessage]) -> Result<GuardVerdict> {
		let mut messages = Vec::with_capacity(conversation.len() + 1);

		messages.push(ChatMessage::system(prompts::GUARD_SYSTEM_PROMPT));
		messages.extend_from_slice(conversation);

		let (mut verdict, _): (GuardVerdict, _) = self.generate_json("guard", &messages).await?;

		if !verdict.is_allowed() && verdict.message.trim().is_empty() {
			verdict.message = safety::DEFAULT_DENIAL_MESSAGE.to_string();
		}

		Ok(verdict)
	}
}
