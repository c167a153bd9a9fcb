use std::sync::Arc;

use annal_service::AnnalService;
use annal_storage::QdrantStore;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<AnnalService>,
}
impl AppState {
	pub fn new(config: annal_config::Config) -> color_eyre::Result<Self> {
		let qdrant = QdrantStore::new(&config.storage.qdrant)?;

		Ok(Self::from_service(AnnalService::new(config, qdrant)))
	}

	pub fn from_service(service: AnnalService) -> Self {
		Self { service: Arc::new(service) }
	}
}
