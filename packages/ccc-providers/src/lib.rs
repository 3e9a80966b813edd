pub mod chat;
pub mod embedding;

mod error;

pub use error::{Error, Result};

use std::time::Duration;

use reqwest::{
	RequestBuilder,
	header::{AUTHORIZATION, HeaderMap, HeaderName},
};
use serde_json::{Map, Value};

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(Error::InvalidConfig {
				message: "Default header values must be strings.".to_string(),
			});
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

/// Applies a per-request timeout; `None` keeps the client default, which never times out.
pub(crate) fn with_timeout(request: RequestBuilder, timeout_ms: Option<u64>) -> RequestBuilder {
	match timeout_ms {
		Some(timeout_ms) => request.timeout(Duration::from_millis(timeout_ms)),
		None => request,
	}
}
