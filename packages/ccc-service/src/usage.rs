use ccc_providers::chat::Usage;
use serde::Serialize;

/// Token counters for one request. Starts at zero and only grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageTotals {
	pub total_input_tokens: u64,
	pub total_output_tokens: u64,
	/// Completion tokens of the last generation that produced the user-visible answer.
	pub final_output_tokens: u64,
	pub total_used_tokens: u64,
}
impl UsageTotals {
	pub fn record(&mut self, usage: Usage) {
		self.total_input_tokens = self.total_input_tokens.saturating_add(usage.prompt_tokens);
		self.total_output_tokens = self.total_output_tokens.saturating_add(usage.completion_tokens);
		self.total_used_tokens = self.total_used_tokens.saturating_add(usage.total_tokens);
	}

	pub fn record_final(&mut self, usage: Usage) {
		self.record(usage);

		self.final_output_tokens = usage.completion_tokens;
	}
}
