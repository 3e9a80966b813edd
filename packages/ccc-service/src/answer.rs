use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_json::Value;

use ccc_domain::sections;
use ccc_providers::chat::ChatMessage;

use crate::{
	CccService, Result, UsageTotals,
	prompts::{self, OutputStyle},
};

pub const DETAIL_AGENT: &str = "detail_agent";

/// `{sections, ans}` object produced by every answering call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerPayload {
	#[serde(deserialize_with = "text_or_list")]
	pub sections: String,
	#[serde(deserialize_with = "text_or_list")]
	pub ans: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub question: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerMemory {
	pub agent: String,
	pub sections: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalAnswer {
	pub role: String,
	pub content: String,
	pub memory: AnswerMemory,
	#[serde(flatten)]
	pub usage: UsageTotals,
}
impl FinalAnswer {
	pub fn from_payload(payload: AnswerPayload, usage: UsageTotals) -> Self {
		Self {
			role: "assistant".to_string(),
			content: payload.ans,
			memory: AnswerMemory { agent: DETAIL_AGENT.to_string(), sections: payload.sections },
			usage,
		}
	}
}

impl CccService {
	/// Single-hop answer: one retrieval, one JSON-mode generation.
	pub async fn answer(&self, question: &str) -> Result<FinalAnswer> {
		let question = crate::require_question(question)?;
		let evidence = self.retrieve(question).await?;
		let messages = [
			ChatMessage::system(prompts::DETAIL_SYSTEM_PROMPT),
			ChatMessage::user(prompts::single_hop_prompt(question, &evidence, OutputStyle::Json)),
		];
		let (payload, usage): (AnswerPayload, _) = self.generate_json("answer", &messages).await?;
		let mut totals = UsageTotals::default();

		totals.record_final(usage);

		tracing::info!(
			sections = ?sections::cited_sections(&payload.sections),
			total_used_tokens = totals.total_used_tokens,
			"Single-hop answer generated."
		);

		Ok(FinalAnswer::from_payload(payload, totals))
	}
}

/// Accepts a string, a list of strings or a number; models are loose about `sections`.
fn text_or_list<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	match Value::deserialize(deserializer)? {
		Value::String(text) => Ok(text),
		Value::Number(number) => Ok(number.to_string()),
		Value::Array(items) => {
			let mut parts = Vec::with_capacity(items.len());

			for item in items {
				match item {
					Value::String(text) => parts.push(text),
					Value::Number(number) => parts.push(number.to_string()),
					other => {
						return Err(D::Error::custom(format!("Unexpected list item {other}.")));
					},
				}
			}

			Ok(parts.join(", "))
		},
		other => Err(D::Error::custom(format!("Expected text, found {other}."))),
	}
}
