use std::sync::Arc;

use lici_service::LiciService;
use lici_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<LiciService>,
}
impl AppState {
	pub async fn new(config: lici_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema(config.providers.embedding.dimensions).await?;

		let service = LiciService::new(config, db);
		let count = service.refresh_categories().await?;

		if count == 0 {
			tracing::warn!(
				"Category index is empty; correspondence and filter strategies will return no results."
			);
		}

		Ok(Self { service: Arc::new(service) })
	}
}
