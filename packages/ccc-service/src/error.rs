pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Index error: {message}")]
	Index { message: String },
	#[error("Malformed {stage} output: {message}")]
	MalformedOutput { stage: &'static str, message: String },
	#[error("Request cancelled by the consumer.")]
	Cancelled,
}
impl From<ccc_providers::Error> for Error {
	fn from(err: ccc_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<ccc_storage::Error> for Error {
	fn from(err: ccc_storage::Error) -> Self {
		Self::Index { message: err.to_string() }
	}
}
