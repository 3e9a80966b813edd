use std::sync::Arc;

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode, header::AUTHORIZATION},
	response::Response,
};
use serde_json::Value;
use tower::util::ServiceExt;

use ccc_api::{routes, state::AppState};
use ccc_domain::safety;
use ccc_service::{CccService, Providers};
use ccc_testkit::{
	CHAT_MODEL, FixedEmbedding, GUARD_MODEL, ScriptedChat, StubIndex, answer_json, test_config,
	text_match,
};

const QUESTION: &str = "สัญญาเช่าสวนมีระยะเวลาได้กี่ปี";

fn app(chat: Arc<ScriptedChat>, index: StubIndex, auth_token: Option<&str>) -> Router {
	let mut config = test_config();

	config.security.api_auth_token = auth_token.map(str::to_string);

	let providers = Providers::new(chat, Arc::new(FixedEmbedding::default()));
	let service = CccService::with_providers(config, Arc::new(index), providers);

	routes::router(AppState { service: Arc::new(service) })
}

fn allowed_guard() -> String {
	serde_json::json!({ "reason": "law", "decision": "allowed", "message": "" }).to_string()
}

fn chat_body(question: &str) -> Value {
	serde_json::json!({
		"messages": [{ "role": "user", "content": question }],
		"session_id": "s-1"
	})
}

async fn post(app: Router, path: &str, body: &Value, bearer: Option<&str>) -> Response {
	let mut request = Request::builder()
		.method("POST")
		.uri(path)
		.header("content-type", "application/json");

	if let Some(token) = bearer {
		request = request.header(AUTHORIZATION, format!("Bearer {token}"));
	}

	let request = request.body(Body::from(body.to_string())).expect("Failed to build request.");

	app.oneshot(request).await.expect("Failed to call route.")
}

async fn json_of(response: Response) -> Value {
	let bytes =
		body::to_bytes(response.into_body(), usize::MAX).await.expect("Failed to read body.");

	serde_json::from_slice(&bytes).expect("Body is not JSON.")
}

/// `data` payloads of an SSE body, in order.
async fn sse_data(response: Response) -> Vec<String> {
	let bytes =
		body::to_bytes(response.into_body(), usize::MAX).await.expect("Failed to read body.");
	let text = String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8.");

	text.lines()
		.filter_map(|line| line.strip_prefix("data:"))
		.map(|data| data.trim_start().to_string())
		.collect()
}

#[tokio::test]
async fn health_is_open_even_with_a_token() {
	let app = app(Arc::new(ScriptedChat::allowing()), StubIndex::empty(), Some("secret"));
	let request =
		Request::builder().uri("/health").body(Body::empty()).expect("Failed to build request.");
	let response = app.oneshot(request).await.expect("Failed to call health.");

	assert_eq!(response.status(), StatusCode::OK);
	assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn chat_returns_processed_answer() {
	let chat = Arc::new(ScriptedChat::allowing());

	chat.push_reply(CHAT_MODEL, allowed_guard());
	chat.push_reply(CHAT_MODEL, answer_json("มาตรา ๕๔๑", "ไม่เกินสามสิบปี"));

	let index = StubIndex::new(vec![text_match("มาตรา ๕๔๑\nอันเช่าทรัพย์สินนั้น ...")]);
	let response = post(app(chat, index, None), "/v1/chat", &chat_body(QUESTION), None).await;

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_of(response).await;

	assert_eq!(json["decision"], "processed");
	assert_eq!(json["role"], "assistant");
	assert_eq!(json["content"], "ไม่เกินสามสิบปี");
	assert_eq!(json["memory"]["agent"], "detail_agent");
	assert_eq!(json["memory"]["sections"], "มาตรา ๕๔๑");
	assert_eq!(json["totalUsedTokens"], 15);
}

#[tokio::test]
async fn chat_denial_carries_guard_decision() {
	let chat = Arc::new(ScriptedChat::allowing());

	chat.set_sticky(GUARD_MODEL, "unsafe\nS9");

	let response =
		post(app(chat.clone(), StubIndex::empty(), None), "/v1/chat", &chat_body(QUESTION), None)
			.await;

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_of(response).await;

	assert_eq!(json["decision"], "not allowed");
	assert_eq!(json["content"], safety::denial_message(Some("S9")));
	assert_eq!(json["memory"]["agent"], "guard_agent");
	assert_eq!(json["memory"]["guard_decision"], "not allowed");
	assert!(chat.calls_for(CHAT_MODEL).is_empty());
}

#[tokio::test]
async fn cot_route_runs_the_planner() {
	let chat = Arc::new(ScriptedChat::allowing());

	chat.push_reply(CHAT_MODEL, allowed_guard());
	chat.push_reply(CHAT_MODEL, r#"{"rationale": "ตรงไปตรงมา", "steps": ["หาระยะเวลาเช่า"]}"#);
	chat.push_reply(CHAT_MODEL, r#"{"task_type": "search", "query": "ระยะเวลาเช่า"}"#);
	chat.push_reply(CHAT_MODEL, answer_json("มาตรา ๕๔๐", "ไม่เกินสามสิบปี"));
	chat.push_reply(CHAT_MODEL, answer_json("มาตรา ๕๔๐", "ไม่เกินสามสิบปี"));

	let index = StubIndex::new(vec![text_match("มาตรา ๕๔๐\nอันการเช่าอสังหาริมทรัพย์นั้น ...")]);
	let response = post(app(chat.clone(), index, None), "/v1/chat/cot", &chat_body(QUESTION), None)
		.await;

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_of(response).await;

	assert_eq!(json["decision"], "processed");
	assert_eq!(json["content"], "ไม่เกินสามสิบปี");
	// Guard, plan, define, step answer, synthesis.
	assert_eq!(chat.calls_for(CHAT_MODEL).len(), 5);
	assert_eq!(json["finalOutputTokens"], 5);
}

#[tokio::test]
async fn trailing_assistant_turn_is_rejected() {
	let chat = Arc::new(ScriptedChat::allowing());
	let body = serde_json::json!({
		"messages": [
			{ "role": "user", "content": QUESTION },
			{ "role": "assistant", "content": "ตอบแล้ว" }
		]
	});
	let response = post(app(chat.clone(), StubIndex::empty(), None), "/v1/chat", &body, None).await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
	assert_eq!(json_of(response).await["error_code"], "invalid_request");
	assert!(chat.calls().is_empty());
}

#[tokio::test]
async fn empty_conversation_is_rejected() {
	let body = serde_json::json!({ "messages": [] });
	let response = post(
		app(Arc::new(ScriptedChat::allowing()), StubIndex::empty(), None),
		"/v1/chat/stream",
		&body,
		None,
	)
	.await;

	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn bearer_token_is_enforced_when_configured() {
	let chat = Arc::new(ScriptedChat::allowing());

	chat.push_reply(CHAT_MODEL, allowed_guard());
	chat.push_reply(CHAT_MODEL, answer_json("ไม่ทราบ", "ไม่ทราบ"));

	let missing = post(
		app(chat.clone(), StubIndex::empty(), Some("secret")),
		"/v1/chat",
		&chat_body(QUESTION),
		None,
	)
	.await;

	assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
	assert_eq!(json_of(missing).await["error_code"], "unauthorized");
	assert!(chat.calls().is_empty());

	let accepted = post(
		app(chat, StubIndex::empty(), Some("secret")),
		"/v1/chat",
		&chat_body(QUESTION),
		Some("secret"),
	)
	.await;

	assert_eq!(accepted.status(), StatusCode::OK);
	assert_eq!(json_of(accepted).await["content"], "ไม่ทราบ");
}

#[tokio::test]
async fn upstream_failure_is_a_generic_server_error() {
	// No scripted reply for the domain guard call.
	let chat = Arc::new(ScriptedChat::allowing());
	let response =
		post(app(chat, StubIndex::empty(), None), "/v1/chat", &chat_body(QUESTION), None).await;

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

	let json = json_of(response).await;

	assert_eq!(json["error_code"], "internal_error");
	assert!(!json["message"].as_str().unwrap_or_default().contains("scripted"));
}

#[tokio::test]
async fn stream_route_emits_events_then_done_sentinel() {
	let chat = Arc::new(ScriptedChat::allowing());

	chat.push_reply(CHAT_MODEL, allowed_guard());
	chat.push_reply(CHAT_MODEL, "การเช่าสวนมีกำหนดไม่เกินสามสิบปี");

	let index = StubIndex::new(vec![text_match("มาตรา ๕๔๐\nอันการเช่าอสังหาริมทรัพย์นั้น ...")]);
	let response =
		post(app(chat, index, None), "/v1/chat/stream", &chat_body(QUESTION), None).await;

	assert_eq!(response.status(), StatusCode::OK);

	let data = sse_data(response).await;

	assert_eq!(data.last().map(String::as_str), Some("[DONE]"));

	let events: Vec<Value> = data[..data.len() - 1]
		.iter()
		.map(|raw| serde_json::from_str(raw).expect("Event is not JSON."))
		.collect();
	let content: String = events
		.iter()
		.filter(|event| event["type"] == "content")
		.filter_map(|event| event["text"].as_str())
		.collect();

	assert_eq!(content, "การเช่าสวนมีกำหนดไม่เกินสามสิบปี");
	assert_eq!(events.first().map(|event| event["type"].clone()), Some("status".into()));

	let done = events.last().expect("No events streamed.");

	assert_eq!(done["type"], "done");
	assert_eq!(done["fullContent"], content.as_str());
	assert_eq!(done["totalUsedTokens"], 15);
}

#[tokio::test]
async fn stream_denial_is_a_single_guard_event() {
	let chat = Arc::new(ScriptedChat::allowing());
	let verdict = serde_json::json!({
		"reason": "off topic",
		"decision": "not allowed",
		"message": "ขออภัย ระบบตอบเฉพาะคำถามด้านกฎหมาย"
	});

	chat.push_reply(CHAT_MODEL, verdict.to_string());

	let response = post(
		app(chat, StubIndex::empty(), None),
		"/v1/chat/cot/stream",
		&chat_body("ช่วยแต่งกลอนให้หน่อย"),
		None,
	)
	.await;

	assert_eq!(response.status(), StatusCode::OK);

	let data = sse_data(response).await;

	assert_eq!(data.len(), 2);
	assert_eq!(data[1], "[DONE]");

	let event: Value = serde_json::from_str(&data[0]).expect("Event is not JSON.");

	assert_eq!(event["type"], "guard");
	assert_eq!(event["content"], "ขออภัย ระบบตอบเฉพาะคำถามด้านกฎหมาย");
	assert_eq!(event["memory"]["guard_decision"], "not allowed");
}
