//! Pure decision rules behind the first two guard layers.

/// Scores strictly above this value are treated as prompt attacks.
pub const ATTACK_THRESHOLD: f32 = 0.9;
pub const CHUNK_CHARS: usize = 800;
pub const OVERLAP_CHARS: usize = 300;

pub const DEFAULT_DENIAL_MESSAGE: &str =
	"ขออภัย ระบบไม่สามารถตอบคำถามนี้ได้ กรุณาลองถามคำถามด้านกฎหมายแทน";
pub const PROMPT_ATTACK_MESSAGE: &str = "ขออภัย ระบบตรวจพบรูปแบบคำถามที่ไม่เหมาะสม กรุณาสอบถามคำถามด้านกฎหมายโดยตรง เช่น 'การเช่าถือสวนมีระยะเวลากี่ปี' หรือ 'การเช่าบ้านมีกฎหมายอะไรบ้าง'";
pub const PROCESSING_ERROR_MESSAGE: &str =
	"ขออภัย เกิดข้อผิดพลาดในการประมวลผล กรุณาลองใหม่อีกครั้ง";

const UNSAFE_MARKER: &str = "unsafe";

/// Content-safety taxonomy codes with their category and the message shown to the user.
const TAXONOMY: [(&str, &str, &str); 14] = [
	(
		"S1",
		"Violent Crimes",
		"ขออภัย ระบบไม่สามารถให้ข้อมูลเกี่ยวกับการกระทำที่อาจก่อให้เกิดอันตรายต่อผู้อื่นได้ กรุณาสอบถามคำถามด้านกฎหมายแทน",
	),
	(
		"S2",
		"Non-Violent Crimes",
		"ขออภัย ระบบไม่สามารถให้คำแนะนำเกี่ยวกับการกระทำที่ผิดกฎหมายได้ กรุณาสอบถามคำถามด้านกฎหมายแทน",
	),
	("S3", "Sex-Related Crimes", "ขออภัย ระบบไม่สามารถตอบคำถามที่เกี่ยวข้องกับเนื้อหาที่ไม่เหมาะสมได้"),
	("S4", "Child Sexual Exploitation", "ขออภัย ระบบไม่สามารถตอบคำถามนี้ได้"),
	("S5", "Defamation", "ขออภัย ระบบไม่สามารถให้คำแนะนำที่อาจนำไปสู่การหมิ่นประมาทผู้อื่นได้"),
	(
		"S6",
		"Specialized Advice",
		"ขออภัย คำถามนี้ต้องการคำแนะนำจากผู้เชี่ยวชาญเฉพาะทางโดยตรง ระบบแนะนำให้ปรึกษาทนายความหรือผู้เชี่ยวชาญที่เกี่ยวข้อง",
	),
	("S7", "Privacy", "ขออภัย ระบบไม่สามารถให้ข้อมูลที่อาจละเมิดความเป็นส่วนตัวของบุคคลอื่นได้"),
	(
		"S8",
		"Intellectual Property",
		"ขออภัย ระบบไม่สามารถให้คำแนะนำที่อาจเกี่ยวข้องกับการละเมิดทรัพย์สินทางปัญญาได้",
	),
	("S9", "Indiscriminate Weapons", "ขออภัย ระบบไม่สามารถให้ข้อมูลเกี่ยวกับอาวุธหรือวัตถุอันตรายได้"),
	(
		"S10",
		"Hate",
		"ขออภัย ระบบไม่สามารถตอบคำถามที่มีเนื้อหาสร้างความเกลียดชังได้ กรุณาสอบถามด้วยถ้อยคำที่เหมาะสม",
	),
	(
		"S11",
		"Suicide & Self-Harm",
		"ขออภัย หากคุณกำลังรู้สึกไม่สบายใจ กรุณาติดต่อสายด่วนสุขภาพจิต 1323 หรือปรึกษาผู้เชี่ยวชาญ",
	),
	("S12", "Sexual Content", "ขออภัย ระบบไม่สามารถตอบคำถามที่มีเนื้อหาไม่เหมาะสมได้"),
	("S13", "Elections", "ขออภัย ระบบไม่สามารถให้ข้อมูลที่อาจส่งผลกระทบต่อกระบวนการเลือกตั้งได้"),
	(
		"S14",
		"Code Interpreter Abuse",
		"ขออภัย ระบบตรวจพบคำขอที่ไม่เหมาะสม กรุณาสอบถามคำถามด้านกฎหมายโดยตรง",
	),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
	Safe,
	Blocked { code: Option<String>, message: String },
}
impl ScanOutcome {
	pub fn is_safe(&self) -> bool {
		matches!(self, Self::Safe)
	}

	fn blocked(code: Option<String>, message: &str) -> Self {
		Self::Blocked { code, message: message.to_string() }
	}
}

pub fn taxonomy_category(code: &str) -> Option<&'static str> {
	TAXONOMY.iter().find(|(known, _, _)| *known == code).map(|(_, category, _)| *category)
}

/// Localized denial message for a taxonomy code, falling back to the generic message.
pub fn denial_message(code: Option<&str>) -> &'static str {
	code.and_then(|code| TAXONOMY.iter().find(|(known, _, _)| *known == code))
		.map(|(_, _, message)| *message)
		.unwrap_or(DEFAULT_DENIAL_MESSAGE)
}

/// Reads a content-safety classifier reply of the form `safe` or `unsafe\nS<n>`.
pub fn evaluate_taxonomy(output: &str) -> ScanOutcome {
	if !output.contains(UNSAFE_MARKER) {
		return ScanOutcome::Safe;
	}

	let code = output.split('\n').nth(1).map(str::trim).filter(|code| !code.is_empty());

	ScanOutcome::blocked(code.map(str::to_string), denial_message(code))
}

/// Compares a prompt-injection score against `threshold`.
///
/// Scores that do not parse as a finite number block the request.
pub fn check_prompt_attack(score: &str, threshold: f32) -> ScanOutcome {
	match score.trim().parse::<f32>() {
		Ok(value) if value.is_finite() =>
			if value > threshold {
				ScanOutcome::blocked(None, PROMPT_ATTACK_MESSAGE)
			} else {
				ScanOutcome::Safe
			},
		_ => ScanOutcome::blocked(None, PROCESSING_ERROR_MESSAGE),
	}
}

/// Windows scanned by the prompt-injection layer.
///
/// Lengths are counted in characters. Text up to `chunk_chars` is one window; longer text gets
/// a window of `chunk_chars` starting every `chunk_chars - overlap_chars` characters until the
/// start passes the end of the text.
pub fn scan_windows(text: &str, chunk_chars: usize, overlap_chars: usize) -> Vec<&str> {
	let offsets: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
	let len = offsets.len();

	if len <= chunk_chars {
		return vec![text];
	}

	let stride = chunk_chars.saturating_sub(overlap_chars).max(1);
	let byte_at = |index: usize| offsets.get(index).copied().unwrap_or(text.len());

	(0..len).step_by(stride).map(|start| &text[byte_at(start)..byte_at(start + chunk_chars)]).collect()
}
