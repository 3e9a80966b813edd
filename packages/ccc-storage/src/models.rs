use serde_json::{Map, Value};

/// Payload key holding the statutory excerpt of an indexed chunk.
pub const TEXT_KEY: &str = "text";

/// One nearest-neighbour hit from the statute index.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
	pub id: Option<String>,
	pub score: f32,
	pub metadata: Map<String, Value>,
}
impl Match {
	pub fn text(&self) -> Option<&str> {
		self.metadata.get(TEXT_KEY).and_then(Value::as_str)
	}
}
