//! Chain-of-thought orchestration: plan, then define, retrieve and answer per step, then
//! synthesize over every step outcome and the deduplicated evidence.

use serde::{Deserialize, Serialize};

use ccc_domain::sections;
use ccc_providers::chat::ChatMessage;

use crate::{
	AnswerPayload, CccService, Error, FinalAnswer, Result, UsageTotals,
	prompts::{self, OutputStyle},
	stream::{Progress, STATUS_PLANNING, StreamEvent},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
	#[serde(default)]
	pub rationale: String,
	pub steps: Vec<String>,
}
impl Plan {
	/// Drops blank steps and everything past `max_steps`.
	///
	/// A plan left without steps falls back to the question as its only step.
	pub fn bounded(mut self, max_steps: usize, question: &str) -> Self {
		self.steps.retain(|step| !step.trim().is_empty());

		if self.steps.len() > max_steps {
			tracing::warn!(planned = self.steps.len(), max_steps, "Plan truncated to step cap.");

			self.steps.truncate(max_steps);
		}
		if self.steps.is_empty() {
			tracing::warn!("Plan has no steps. Using the question as the only step.");

			self.steps.push(question.to_string());
		}

		self
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
	Search,
	Aggregate,
	Verify,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalTask {
	pub task_type: TaskType,
	pub query: String,
	#[serde(default)]
	pub notes: String,
}

/// Per-request state of one chain-of-thought run.
#[derive(Debug, Clone)]
pub struct CotRun {
	pub question: String,
	pub plan: Plan,
	pub history: Vec<AnswerPayload>,
	pub evidence: Vec<String>,
	pub usage: UsageTotals,
}
impl CotRun {
	fn new(question: &str, plan: Plan) -> Self {
		Self {
			question: question.to_string(),
			plan,
			history: Vec::new(),
			evidence: Vec::new(),
			usage: UsageTotals::default(),
		}
	}

	pub fn joined_history(&self) -> String {
		let mut out = String::new();

		for outcome in &self.history {
			if let Some(question) = outcome.question.as_deref() {
				out.push_str(&format!("question: {question}\n"));
			}

			out.push_str(&format!("sections: {}\nans: {}\n\n", outcome.sections, outcome.ans));
		}

		out
	}

	pub fn joined_steps(&self) -> String {
		self.plan
			.steps
			.iter()
			.enumerate()
			.map(|(index, step)| format!("{}.{step}\n", index + 1))
			.collect()
	}

	pub fn deduped_evidence(&self) -> String {
		sections::dedupe_by_section(&self.evidence.join("\n\n"))
	}

	pub(crate) fn synthesis_messages(&self, style: OutputStyle) -> [ChatMessage; 2] {
		let system = match style {
			OutputStyle::Json => prompts::DETAIL_SYSTEM_PROMPT,
			OutputStyle::PlainText => prompts::DETAIL_STREAMING_SYSTEM_PROMPT,
		};
		let evidence = self.deduped_evidence();

		tracing::debug!(
			evidence_blocks = self.evidence.len(),
			deduped_chars = evidence.chars().count(),
			"Synthesis evidence prepared."
		);

		[
			ChatMessage::system(system),
			ChatMessage::user(prompts::synthesis_prompt(
				&self.question,
				&self.joined_steps(),
				&self.joined_history(),
				&evidence,
				style,
			)),
		]
	}
}

impl CccService {
	/// Chain-of-thought answer with a JSON-mode synthesis.
	pub async fn answer_cot(&self, question: &str) -> Result<FinalAnswer> {
		let question = crate::require_question(question)?;
		let mut run = self.plan_and_execute(question, &Progress::silent()).await?;
		let messages = run.synthesis_messages(OutputStyle::Json);
		let (payload, usage): (AnswerPayload, _) =
			self.generate_json("synthesis", &messages).await?;

		run.usage.record_final(usage);

		tracing::info!(
			steps = run.history.len(),
			sections = ?sections::cited_sections(&payload.sections),
			total_used_tokens = run.usage.total_used_tokens,
			"Chain-of-thought answer generated."
		);

		Ok(FinalAnswer::from_payload(payload, run.usage))
	}

	/// Planning plus every step, strictly in order. Synthesis is left to the caller.
	pub(crate) async fn plan_and_execute(
		&self,
		question: &str,
		progress: &Progress,
	) -> Result<CotRun> {
		progress.status(STATUS_PLANNING).await?;

		let max_steps = self.cfg.cot.max_steps;
		let messages = [
			ChatMessage::system(prompts::PLANNER_SYSTEM_PROMPT),
			ChatMessage::user(prompts::planner_prompt(question, max_steps)),
		];
		let (plan, usage): (Plan, _) = self.generate_json("plan", &messages).await?;
		let mut run = CotRun::new(question, plan.bounded(max_steps, question));

		run.usage.record(usage);

		tracing::info!(steps = run.plan.steps.len(), "Plan ready.");

		progress
			.emit(StreamEvent::Plan {
				steps: run.plan.steps.clone(),
				rationale: run.plan.rationale.clone(),
			})
			.await?;

		let steps = run.plan.steps.clone();
		let total = steps.len();

		for (index, step) in steps.into_iter().enumerate() {
			let number = index + 1;

			progress
				.emit(StreamEvent::CotStep { step: number, total, description: step.clone() })
				.await?;
			progress.status(format!("กำลังปรับแต่งรอบที่ {number}")).await?;

			let task = self.define_step(&mut run, &step).await?;

			progress.status(format!("กำลังค้นหาข้อมูลรอบที่ {number}")).await?;

			let evidence = self.retrieve(&task.query).await?;

			progress.status(format!("กำลังวิเคราะห์และสร้างคำตอบรอบที่ {number}")).await?;

			let messages = [
				ChatMessage::system(prompts::DETAIL_SYSTEM_PROMPT),
				ChatMessage::user(prompts::step_answer_prompt(&run.question, &task.query, &evidence)),
			];
			let (outcome, usage): (AnswerPayload, _) =
				self.generate_json("step answer", &messages).await?;

			run.usage.record(usage);

			tracing::info!(
				step = number,
				total,
				task_type = ?task.task_type,
				evidence_chars = evidence.chars().count(),
				sections = ?sections::cited_sections(&outcome.sections),
				"Step completed."
			);

			run.evidence.push(evidence);
			run.history.push(outcome);
		}

		Ok(run)
	}

	async fn define_step(&self, run: &mut CotRun, step: &str) -> Result<RetrievalTask> {
		let messages = [
			ChatMessage::system(prompts::STEP_DEFINER_SYSTEM_PROMPT),
			ChatMessage::user(prompts::definer_prompt(&run.question, step, &run.joined_history())),
		];
		let (mut task, usage): (RetrievalTask, _) = self.generate_json("define", &messages).await?;

		run.usage.record(usage);

		task.query = task.query.trim().to_string();

		if task.query.is_empty() {
			return Err(Error::MalformedOutput {
				stage: "define",
				message: "Retrieval task query is empty.".to_string(),
			});
		}

		Ok(task)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn outcome(question: Option<&str>, sections: &str, ans: &str) -> AnswerPayload {
		AnswerPayload {
			sections: sections.to_string(),
			ans: ans.to_string(),
			question: question.map(str::to_string),
		}
	}

	#[test]
	fn plan_is_capped_and_blank_steps_dropped() {
		let plan = Plan {
			rationale: String::new(),
			steps: vec!["a".into(), " ".into(), "b".into(), "c".into(), "d".into(), "e".into()],
		};

		assert_eq!(plan.bounded(3, "q").steps, vec!["a", "b", "c"]);
	}

	#[test]
	fn empty_plan_falls_back_to_question() {
		let plan = Plan { rationale: "r".into(), steps: Vec::new() };

		assert_eq!(plan.bounded(3, "คำถาม").steps, vec!["คำถาม"]);
	}

	#[test]
	fn history_and_steps_are_joined_in_order() {
		let mut run = CotRun::new(
			"q",
			Plan { rationale: String::new(), steps: vec!["แรก".into(), "สอง".into()] },
		);

		run.history.push(outcome(Some("ถาม"), "มาตรา ๑", "ตอบ"));
		run.history.push(outcome(None, "ไม่ทราบ", "ไม่ทราบ"));

		assert_eq!(
			run.joined_history(),
			"question: ถาม\nsections: มาตรา ๑\nans: ตอบ\n\nsections: ไม่ทราบ\nans: ไม่ทราบ\n\n"
		);
		assert_eq!(run.joined_steps(), "1.แรก\n2.สอง\n");
	}

	#[test]
	fn evidence_is_deduplicated_across_steps() {
		let mut run = CotRun::new("q", Plan { rationale: String::new(), steps: vec!["s".into()] });

		run.evidence.push("มาตรา ๑\nก".to_string());
		run.evidence.push("มาตรา ๒\nข\n\nมาตรา ๑\nซ้ำ".to_string());

		assert_eq!(run.deduped_evidence(), "มาตรา ๑\nก\n\nมาตรา ๒\nข");
	}

	#[test]
	fn task_type_is_lowercase() {
		let task: RetrievalTask =
			serde_json::from_str(r#"{"task_type": "aggregate", "query": "q"}"#).expect("parse failed");

		assert_eq!(task.task_type, TaskType::Aggregate);
		assert!(serde_json::from_str::<RetrievalTask>(r#"{"task_type": "lookup", "query": "q"}"#)
			.is_err());
	}
}
