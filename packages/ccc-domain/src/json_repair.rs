//! Best-effort syntactic repair of near-JSON model output.
//!
//! Repair only fixes syntax: reasoning preambles, code fences and trailing prose are cut,
//! unbalanced brackets are closed, trailing commas are dropped and raw control characters
//! inside strings are escaped. Values are never rewritten.

use serde_json::Value;

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

#[derive(Debug, thiserror::Error)]
pub enum RepairError {
	#[error("Model output contains no JSON object or array.")]
	NoJson,
	#[error("Model output could not be repaired into JSON: {message}")]
	Unrecoverable { message: String },
}

pub trait JsonRepair
where
	Self: Send + Sync,
{
	/// Returns well-formed JSON text or fails.
	fn repair(&self, raw: &str) -> Result<String, RepairError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LenientJsonRepair;
impl JsonRepair for LenientJsonRepair {
	fn repair(&self, raw: &str) -> Result<String, RepairError> {
		let candidate = strip_reasoning(raw).trim();

		if serde_json::from_str::<Value>(candidate).is_ok() {
			return Ok(candidate.to_string());
		}

		let start = candidate.find(['{', '[']).ok_or(RepairError::NoJson)?;
		let repaired = rebalance(&candidate[start..]);

		serde_json::from_str::<Value>(&repaired)
			.map_err(|err| RepairError::Unrecoverable { message: err.to_string() })?;

		Ok(repaired)
	}
}

/// Drops a leading `<think>...</think>` block; an unterminated block is left alone.
fn strip_reasoning(raw: &str) -> &str {
	let Some(open) = raw.find(THINK_OPEN) else {
		return raw;
	};
	let Some(close) = raw[open..].find(THINK_CLOSE) else {
		return raw;
	};

	&raw[open + close + THINK_CLOSE.len()..]
}

fn rebalance(input: &str) -> String {
	let mut out = String::with_capacity(input.len() + 8);
	let mut closers: Vec<char> = Vec::new();
	let mut in_string = false;
	let mut escaped = false;

	for ch in input.chars() {
		if in_string {
			if escaped {
				escaped = false;
				out.push(ch);

				continue;
			}

			match ch {
				'\\' => {
					escaped = true;
					out.push(ch);
				},
				'"' => {
					in_string = false;
					out.push(ch);
				},
				'\n' => out.push_str("\\n"),
				'\r' => out.push_str("\\r"),
				'\t' => out.push_str("\\t"),
				_ => out.push(ch),
			}

			continue;
		}

		match ch {
			'"' => {
				in_string = true;
				out.push(ch);
			},
			'{' => {
				closers.push('}');
				out.push(ch);
			},
			'[' => {
				closers.push(']');
				out.push(ch);
			},
			'}' | ']' => {
				// A closer that matches nothing open is noise.
				let Some(position) = closers.iter().rposition(|open| *open == ch) else {
					continue;
				};

				while closers.len() > position {
					if let Some(closer) = closers.pop() {
						strip_trailing_comma(&mut out);
						out.push(closer);
					}
				}

				if closers.is_empty() {
					return out;
				}
			},
			_ => out.push(ch),
		}
	}

	if in_string {
		if escaped {
			out.pop();
		}

		out.push('"');
	}

	while let Some(closer) = closers.pop() {
		strip_trailing_comma(&mut out);
		out.push(closer);
	}

	out
}

fn strip_trailing_comma(out: &mut String) {
	let trimmed = out.trim_end().len();

	if out[..trimmed].ends_with(',') {
		out.truncate(trimmed - 1);
	}
}
