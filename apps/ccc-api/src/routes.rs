use std::pin::Pin;

use axum::{
	Json, Router,
	body::Body,
	extract::State,
	http::{HeaderMap, HeaderValue, Request, StatusCode, header::AUTHORIZATION},
	middleware::{self, Next},
	response::{
		IntoResponse, Response,
		sse::{Event, KeepAlive, KeepAliveStream, Sse},
	},
	routing::{get, post},
};
use futures::{Stream, StreamExt, stream};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use ccc_providers::chat::ChatMessage;
use ccc_service::{
	Decision, Error as ServiceError, FinalAnswer, GuardReply, STREAM_DONE_SENTINEL, guard,
};

use crate::state::AppState;

const HEADER_REQUEST_ID: &str = "x-request-id";
const DECISION_PROCESSED: &str = "processed";

type EventStream = Pin<Box<dyn Stream<Item = Result<Event, axum::Error>> + Send>>;

pub fn router(state: AppState) -> Router {
	let api = Router::new()
		.route("/v1/chat", post(chat))
		.route("/v1/chat/cot", post(chat_cot))
		.route("/v1/chat/stream", post(chat_stream))
		.route("/v1/chat/cot/stream", post(chat_cot_stream))
		.route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

	Router::new()
		.route("/health", get(health))
		.merge(api)
		.layer(middleware::from_fn(request_span))
		.with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
	pub messages: Vec<ChatMessage>,
	#[serde(default)]
	pub session_id: Option<String>,
}
impl ChatRequest {
	/// The trailing user turn, which is the question to answer.
	fn question(&self) -> Result<&str, ApiError> {
		let Some(last) = self.messages.last() else {
			return Err(invalid_request("messages must be non-empty."));
		};

		if last.role != "user" {
			return Err(invalid_request("The last message must come from the user."));
		}

		let question = last.content.trim();

		if question.is_empty() {
			return Err(invalid_request("The last message must be non-blank."));
		}

		Ok(question)
	}
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ChatResponse {
	Processed {
		#[serde(flatten)]
		answer: FinalAnswer,
		decision: &'static str,
	},
	Denied {
		#[serde(flatten)]
		reply: GuardReply,
		decision: Decision,
	},
}

#[derive(Debug, Serialize)]
struct GuardEvent {
	#[serde(rename = "type")]
	kind: &'static str,
	#[serde(flatten)]
	reply: GuardReply,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
	SingleHop,
	ChainOfThought,
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn chat(
	State(state): State<AppState>,
	Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
	Ok(Json(respond(&state, &request, Mode::SingleHop).await?))
}

async fn chat_cot(
	State(state): State<AppState>,
	Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
	Ok(Json(respond(&state, &request, Mode::ChainOfThought).await?))
}

async fn chat_stream(
	State(state): State<AppState>,
	Json(request): Json<ChatRequest>,
) -> Result<Sse<KeepAliveStream<EventStream>>, ApiError> {
	respond_stream(&state, &request, Mode::SingleHop).await
}

async fn chat_cot_stream(
	State(state): State<AppState>,
	Json(request): Json<ChatRequest>,
) -> Result<Sse<KeepAliveStream<EventStream>>, ApiError> {
	respond_stream(&state, &request, Mode::ChainOfThought).await
}

async fn respond(
	state: &AppState,
	request: &ChatRequest,
	mode: Mode,
) -> Result<ChatResponse, ApiError> {
	let question = request.question()?;

	log_request(request, mode);

	let verdict = state.service.evaluate(&request.messages).await?;

	if !verdict.is_allowed() {
		return Ok(ChatResponse::Denied {
			reply: guard::postprocess(&verdict),
			decision: verdict.decision,
		});
	}

	let answer = match mode {
		Mode::SingleHop => state.service.answer(question).await?,
		Mode::ChainOfThought => state.service.answer_cot(question).await?,
	};

	Ok(ChatResponse::Processed { answer, decision: DECISION_PROCESSED })
}

async fn respond_stream(
	state: &AppState,
	request: &ChatRequest,
	mode: Mode,
) -> Result<Sse<KeepAliveStream<EventStream>>, ApiError> {
	let question = request.question()?.to_string();

	log_request(request, mode);

	let verdict = state.service.evaluate(&request.messages).await?;
	let events: EventStream = if verdict.is_allowed() {
		let events = match mode {
			Mode::SingleHop => state.service.answer_stream(question),
			Mode::ChainOfThought => state.service.answer_cot_stream(question),
		};

		Box::pin(events.map(|event| Event::default().json_data(event)))
	} else {
		let event = GuardEvent { kind: "guard", reply: guard::postprocess(&verdict) };

		Box::pin(stream::once(async move { Event::default().json_data(event) }))
	};
	let done = stream::once(async { Ok(Event::default().data(STREAM_DONE_SENTINEL)) });
	let body: EventStream = Box::pin(events.chain(done));

	Ok(Sse::new(body).keep_alive(KeepAlive::default()))
}

fn log_request(request: &ChatRequest, mode: Mode) {
	tracing::info!(
		?mode,
		session_id = request.session_id.as_deref().unwrap_or("-"),
		turns = request.messages.len(),
		"Chat request received."
	);
}

async fn request_span(req: Request<Body>, next: Next) -> Response {
	let request_id = Uuid::new_v4();
	let span = tracing::info_span!(
		"request",
		%request_id,
		method = %req.method(),
		path = %req.uri().path(),
	);
	let mut response = next.run(req).instrument(span).await;

	if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
		response.headers_mut().insert(HEADER_REQUEST_ID, value);
	}

	response
}

async fn require_bearer(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
	if !is_authorized(req.headers(), state.auth_token()) {
		return json_error(
			StatusCode::UNAUTHORIZED,
			"unauthorized",
			"A valid bearer token is required.",
		)
		.into_response();
	}

	next.run(req).await
}

fn is_authorized(headers: &HeaderMap, expected: Option<&str>) -> bool {
	match expected {
		None => true,
		Some(expected) => read_bearer_token(headers).is_some_and(|token| token == expected),
	}
}

fn read_bearer_token(headers: &HeaderMap) -> Option<&str> {
	let raw = headers.get(AUTHORIZATION)?;
	let value = raw.to_str().ok()?.trim();
	let token = value.strip_prefix("Bearer ")?.trim();

	if token.is_empty() { None } else { Some(token) }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } => invalid_request(message),
			err => {
				tracing::error!(error = %err, "Request failed.");

				json_error(
					StatusCode::INTERNAL_SERVER_ERROR,
					"internal_error",
					"The request could not be processed.",
				)
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError::new(status, code, message)
}

fn invalid_request(message: impl Into<String>) -> ApiError {
	json_error(StatusCode::BAD_REQUEST, "invalid_request", message)
}
