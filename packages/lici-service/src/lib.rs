pub mod category;
pub mod decompose;
pub mod embed;
pub mod export;
pub mod search;
pub mod time_serde;

mod error;

pub use error::{Error, Result};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

pub use category::{CategoryIndex, CategoryMatch, SharedCategoryIndex};
pub use decompose::Decomposition;
pub use search::{
	Algorithm, MatchedCategory, ResultItem, SearchRequest, SearchResponse, SortMode, Strategy,
};

use lici_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use lici_providers::{decomposer, embedding};
use lici_storage::db::Db;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait DecomposerProvider
where
	Self: Send + Sync,
{
	fn decompose<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>>;
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl DecomposerProvider for DefaultProviders {
	fn decompose<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		Box::pin(decomposer::decompose(cfg, messages))
	}
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub decomposer: Arc<dyn DecomposerProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, decomposer: Arc<dyn DecomposerProvider>) -> Self {
		Self { embedding, decomposer }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), decomposer: provider }
	}
}

pub struct LiciService {
	pub cfg: Config,
	pub db: Db,
	pub categories: SharedCategoryIndex,
	pub providers: Providers,
}
impl LiciService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self { cfg, db, categories: SharedCategoryIndex::empty(), providers: Providers::default() }
	}

	pub fn with_providers(cfg: Config, db: Db, providers: Providers) -> Self {
		Self { cfg, db, categories: SharedCategoryIndex::empty(), providers }
	}

	/// Load (or atomically reload) the category index from the record
	/// store. Returns the number of categories now visible to readers.
	pub async fn refresh_categories(&self) -> Result<usize> {
		let version = embedding_version(&self.cfg);
		let index = CategoryIndex::load(&self.db, &version).await?;
		let count = index.len();

		self.categories.swap(index);
		tracing::info!(count, version, "Category index refreshed.");

		Ok(count)
	}
}

/// The embedding column key. Records and categories embedded under a
/// different provider, model, or dimension are invisible to this
/// instance.
pub fn embedding_version(cfg: &Config) -> String {
	format!(
		"{}:{}:{}",
		cfg.providers.embedding.provider_id,
		cfg.providers.embedding.model,
		cfg.providers.embedding.dimensions,
	)
}
