use ccc_domain::{
	json_repair::{JsonRepair, LenientJsonRepair, RepairError},
	safety::{self, ATTACK_THRESHOLD, CHUNK_CHARS, OVERLAP_CHARS, ScanOutcome},
	sections,
};

const MIXED_EVIDENCE: &str = "\
ข้อความนำก่อนมาตราแรก
มาตรา ๔๒๐
ผู้ใดจงใจหรือประมาทเลินเล่อ ทำต่อบุคคลอื่นโดยผิดกฎหมาย

มาตรา ๔๒๑
การใช้สิทธิซึ่งมีแต่จะให้เกิดเสียหายแก่บุคคลอื่นนั้น ท่านว่าเป็นการอันมิชอบด้วยกฎหมาย

มาตรา ๔๒๐
ฉบับที่ซ้ำกันซึ่งต้องถูกตัดทิ้ง

มาตรา ๔๒๐ วรรคสอง
วรรคที่แยกเป็นคีย์ของตัวเอง
";

#[test]
fn dedupe_keeps_first_block_per_header_in_order() {
	let deduped = sections::dedupe_by_section(MIXED_EVIDENCE);

	assert_eq!(
		deduped,
		"\
มาตรา ๔๒๐
ผู้ใดจงใจหรือประมาทเลินเล่อ ทำต่อบุคคลอื่นโดยผิดกฎหมาย

มาตรา ๔๒๑
การใช้สิทธิซึ่งมีแต่จะให้เกิดเสียหายแก่บุคคลอื่นนั้น ท่านว่าเป็นการอันมิชอบด้วยกฎหมาย

มาตรา ๔๒๐ วรรคสอง
วรรคที่แยกเป็นคีย์ของตัวเอง"
	);
}

#[test]
fn dedupe_discards_text_before_first_header() {
	let deduped = sections::dedupe_by_section(MIXED_EVIDENCE);

	assert!(!deduped.contains("ข้อความนำ"));
	assert!(deduped.starts_with("มาตรา ๔๒๐"));
	assert_eq!(sections::dedupe_by_section("ไม่มีหัวมาตราเลย\nอีกบรรทัด"), "");
}

#[test]
fn dedupe_is_idempotent() {
	let inputs = [
		MIXED_EVIDENCE,
		"",
		"มาตรา 1\n\n\n  body with indent  \n\nมาตรา 2\nx\n\nมาตรา 1\ny",
		"   มาตรา 5   \ntrailing spaces on header\r\nมาตรา 6\r\n",
		"มาตรา 7",
		"มาตรา ๑ วรรคสอง\r\nx\r\n มาตรา ๑ \r\nมาตรา ๒\r\nx\r\r\nbody\r\n",
		"มาตรา 8\rold mac line\rมาตรา 9\nx\r\n\rmore",
	];

	for input in inputs {
		let once = sections::dedupe_by_section(input);
		let twice = sections::dedupe_by_section(&once);

		assert_eq!(once, twice, "dedupe must be idempotent for input {input:?}");
		assert!(!once.contains('\r'), "carriage return kept for input {input:?}");
	}
}

#[test]
fn dedupe_treats_every_line_break_style_alike() {
	let deduped = sections::dedupe_by_section("มาตรา ๒\r\nx\r\r\nbody\rมาตรา ๓\ny");

	assert_eq!(deduped, "มาตรา ๒\nx\n\nbody\n\nมาตรา ๓\ny");
}

#[test]
fn short_prompt_is_scanned_as_one_window() {
	let text = "a".repeat(CHUNK_CHARS);
	let windows = safety::scan_windows(&text, CHUNK_CHARS, OVERLAP_CHARS);

	assert_eq!(windows, vec![text.as_str()]);
}

#[test]
fn long_prompt_is_scanned_in_overlapping_windows() {
	let text: String = (0..1_200).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
	let windows = safety::scan_windows(&text, CHUNK_CHARS, OVERLAP_CHARS);

	assert_eq!(windows.len(), 3);
	assert_eq!(windows[0], &text[0..800]);
	assert_eq!(windows[1], &text[500..1_200]);
	assert_eq!(windows[2], &text[1_000..1_200]);
	assert_eq!(&windows[0][500..800], &windows[1][0..300]);
}

#[test]
fn prompt_attack_threshold_is_exclusive() {
	assert!(!safety::check_prompt_attack("0.95", ATTACK_THRESHOLD).is_safe());
	assert!(safety::check_prompt_attack("0.5", ATTACK_THRESHOLD).is_safe());
	assert!(safety::check_prompt_attack("0.9", ATTACK_THRESHOLD).is_safe());
	assert!(safety::check_prompt_attack(" 0.2\n", ATTACK_THRESHOLD).is_safe());
}

#[test]
fn non_numeric_score_is_denied_with_processing_message() {
	assert_eq!(
		safety::check_prompt_attack("abc", ATTACK_THRESHOLD),
		ScanOutcome::Blocked {
			code: None,
			message: safety::PROCESSING_ERROR_MESSAGE.to_string()
		}
	);
}

#[test]
fn taxonomy_reply_maps_code_to_message() {
	assert!(safety::evaluate_taxonomy("safe").is_safe());

	let ScanOutcome::Blocked { code, message } = safety::evaluate_taxonomy("unsafe\nS9") else {
		panic!("Expected unsafe verdict.");
	};

	assert_eq!(code.as_deref(), Some("S9"));
	assert_eq!(message, safety::denial_message(Some("S9")));

	let ScanOutcome::Blocked { code, message } = safety::evaluate_taxonomy("unsafe") else {
		panic!("Expected unsafe verdict.");
	};

	assert!(code.is_none());
	assert_eq!(message, safety::DEFAULT_DENIAL_MESSAGE);
}

#[test]
fn repair_passes_valid_json_through() {
	let raw = r#"{"sections":"มาตรา ๔๒๐","ans":"คำตอบ"}"#;

	assert_eq!(LenientJsonRepair.repair(raw).expect("Valid JSON must pass."), raw);
}

#[test]
fn repair_tolerates_reasoning_fences_and_trailing_text() {
	let raw = "<think>คิดก่อน {ไม่ใช่ JSON}</think>\n```json\n{\"sections\": \"มาตรา ๔๒๐\", \"ans\": \"ตอบ\",}\n```\nขอบคุณครับ";
	let repaired = LenientJsonRepair.repair(raw).expect("Repair must succeed.");
	let value: serde_json::Value = serde_json::from_str(&repaired).expect("Repaired JSON parses.");

	assert_eq!(value["sections"], "มาตรา ๔๒๐");
	assert_eq!(value["ans"], "ตอบ");
}

#[test]
fn repair_closes_truncated_output_and_escapes_newlines() {
	let raw = "{\"rationale\": \"สอง\nบรรทัด\", \"steps\": [\"ขั้นแรก\", \"ขั้นที่สอง";
	let repaired = LenientJsonRepair.repair(raw).expect("Repair must succeed.");
	let value: serde_json::Value = serde_json::from_str(&repaired).expect("Repaired JSON parses.");

	assert_eq!(value["rationale"], "สอง\nบรรทัด");
	assert_eq!(value["steps"][1], "ขั้นที่สอง");
}

#[test]
fn repair_fails_without_json() {
	assert!(matches!(LenientJsonRepair.repair("ไม่ทราบ"), Err(RepairError::NoJson)));
	assert!(matches!(
		LenientJsonRepair.repair("{\"a\": }"),
		Err(RepairError::Unrecoverable { .. })
	));
}
