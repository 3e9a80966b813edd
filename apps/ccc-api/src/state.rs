use std::sync::Arc;

use ccc_service::CccService;
use ccc_storage::qdrant::QdrantStore;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<CccService>,
}
impl AppState {
	pub fn new(config: ccc_config::Config) -> color_eyre::Result<Self> {
		let qdrant = QdrantStore::new(&config.storage.qdrant)?;
		let service = CccService::new(config, qdrant);

		Ok(Self { service: Arc::new(service) })
	}

	/// Bearer token required on `/v1` routes, if any.
	pub fn auth_token(&self) -> Option<&str> {
		self.service.cfg.security.api_auth_token.as_deref()
	}
}
