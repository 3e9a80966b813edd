use std::collections::HashMap;

use qdrant_client::qdrant::{
	PointId, Query, QueryPointsBuilder, ScoredPoint, Value as QdrantValue, point_id::PointIdOptions,
	value::Kind,
};
use serde_json::{Map, Number, Value};

use crate::{Error, Result, models::Match};

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &ccc_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Top `top_k` points by vector similarity, best first, with their payloads.
	pub async fn nearest(&self, vector: &[f32], top_k: u32) -> Result<Vec<Match>> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Query vector has {} dimensions, index expects {}.",
				vector.len(),
				self.vector_dim
			)));
		}
		if top_k == 0 {
			return Err(Error::InvalidArgument("top_k must be greater than zero.".to_string()));
		}

		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector.to_vec()))
			.limit(top_k as u64)
			.with_payload(true);
		let response = self.client.query(search).await?;

		Ok(response.result.into_iter().map(scored_point_to_match).collect())
	}
}

fn scored_point_to_match(point: ScoredPoint) -> Match {
	Match {
		id: point.id.as_ref().and_then(point_id_to_string),
		score: point.score,
		metadata: payload_to_json(point.payload),
	}
}

fn point_id_to_string(point_id: &PointId) -> Option<String> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Num(id)) => Some(id.to_string()),
		Some(PointIdOptions::Uuid(id)) => Some(id.clone()),
		None => None,
	}
}

fn payload_to_json(payload: HashMap<String, QdrantValue>) -> Map<String, Value> {
	payload.into_iter().map(|(key, value)| (key, value_to_json(value))).collect()
}

fn value_to_json(value: QdrantValue) -> Value {
	match value.kind {
		Some(Kind::NullValue(_)) | None => Value::Null,
		Some(Kind::BoolValue(flag)) => Value::Bool(flag),
		Some(Kind::IntegerValue(number)) => Value::from(number),
		Some(Kind::DoubleValue(number)) =>
			Number::from_f64(number).map_or(Value::Null, Value::Number),
		Some(Kind::StringValue(text)) => Value::String(text),
		Some(Kind::ListValue(list)) =>
			Value::Array(list.values.into_iter().map(value_to_json).collect()),
		Some(Kind::StructValue(object)) => Value::Object(payload_to_json(object.fields)),
	}
}

#[cfg(test)]
mod tests {
	use qdrant_client::qdrant::{ListValue, Struct};

	use super::*;

	fn string(text: &str) -> QdrantValue {
		QdrantValue { kind: Some(Kind::StringValue(text.to_string())) }
	}

	#[test]
	fn converts_nested_payload_values() {
		let mut fields = HashMap::new();

		fields.insert("book".to_string(), QdrantValue { kind: Some(Kind::IntegerValue(2)) });

		let mut payload = HashMap::new();

		payload.insert("text".to_string(), string("มาตรา ๔๒๐"));
		payload.insert(
			"tags".to_string(),
			QdrantValue {
				kind: Some(Kind::ListValue(ListValue { values: vec![string("ละเมิด")] })),
			},
		);
		payload.insert(
			"source".to_string(),
			QdrantValue { kind: Some(Kind::StructValue(Struct { fields })) },
		);
		payload.insert("weight".to_string(), QdrantValue { kind: Some(Kind::DoubleValue(0.5)) });
		payload.insert("missing".to_string(), QdrantValue { kind: None });

		let json = Value::Object(payload_to_json(payload));

		assert_eq!(
			json,
			serde_json::json!({
				"text": "มาตรา ๔๒๐",
				"tags": ["ละเมิด"],
				"source": { "book": 2 },
				"weight": 0.5,
				"missing": null
			})
		);
	}

	#[test]
	fn point_ids_render_as_strings() {
		let numeric = PointId { point_id_options: Some(PointIdOptions::Num(7)) };
		let uuid = PointId {
			point_id_options: Some(PointIdOptions::Uuid(
				"6f1c0e1a-1b9e-4c55-8f4f-3a2a0f6c1d11".to_string(),
			)),
		};

		assert_eq!(point_id_to_string(&numeric).as_deref(), Some("7"));
		assert_eq!(
			point_id_to_string(&uuid).as_deref(),
			Some("6f1c0e1a-1b9e-4c55-8f4f-3a2a0f6c1d11")
		);
	}
}
