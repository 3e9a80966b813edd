//! Statutory section handling for retrieved Civil and Commercial Code excerpts.

use std::collections::HashSet;

/// Prefix of every section header line, e.g. `มาตรา ๑๑๘๔` or `มาตรา 420 วรรคสอง`.
pub const SECTION_MARKER: &str = "มาตรา ";
/// Literal the model must return for both `sections` and `ans` when evidence is insufficient.
pub const UNKNOWN_SENTINEL: &str = "ไม่ทราบ";

pub fn is_section_header(line: &str) -> bool {
	line.trim().starts_with(SECTION_MARKER)
}

/// Collapses concatenated excerpts into one block per section header.
///
/// Blocks are keyed by the full trimmed header line, so `มาตรา ๑๑๒๙` and
/// `มาตรา ๑๑๒๙ วรรคสอง` stay distinct. The first block for a key wins and keeps its position.
/// Text before the first header is dropped. Surviving blocks are joined with one blank line,
/// which makes the function idempotent.
pub fn dedupe_by_section(text: &str) -> String {
	let normalized = text.replace("\r\n", "\n");
	let mut blocks: Vec<(&str, String)> = Vec::new();
	let mut current: Option<(&str, Vec<&str>)> = None;

	// A lone `\r` is a line break too, so no kept line can end in one.
	for line in normalized.split(['\n', '\r']) {
		let stripped = line.trim();

		if stripped.starts_with(SECTION_MARKER) {
			if let Some((title, lines)) = current.take() {
				blocks.push((title, lines.join("\n").trim().to_string()));
			}

			current = Some((stripped, vec![stripped]));
		} else if let Some((_, lines)) = current.as_mut() {
			lines.push(line);
		}
	}

	if let Some((title, lines)) = current.take() {
		blocks.push((title, lines.join("\n").trim().to_string()));
	}

	let mut seen = HashSet::with_capacity(blocks.len());
	let kept: Vec<String> =
		blocks.into_iter().filter(|(title, _)| seen.insert(*title)).map(|(_, block)| block).collect();

	kept.join("\n\n")
}

/// Splits a model `sections` field such as `มาตรา ๒๔๓, มาตรา ๒๔๔` into citations.
///
/// The unknown sentinel yields no citations.
pub fn cited_sections(sections: &str) -> Vec<String> {
	sections
		.split([',', '\n'])
		.map(str::trim)
		.filter(|part| !part.is_empty() && *part != UNKNOWN_SENTINEL)
		.map(str::to_string)
		.collect()
}
