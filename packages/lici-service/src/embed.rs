//! Query embedding construction.
//!
//! One provider call per text fragment, under the shared retry policy.
//! With a negative fragment present the result is the signed
//! composition `normalize(normalize(p) - w * normalize(n))`; otherwise
//! the plain normalized positive embedding.

use lici_domain::vector;
use lici_providers::retry::{self, RetryPolicy};

use crate::{Error, Providers, Result};

pub async fn query_embedding(
	cfg: &lici_config::Config,
	providers: &Providers,
	positive: &str,
	negative: &str,
) -> Result<Vec<f32>> {
	let positive_vec = embed_one(cfg, providers, positive).await?;

	if negative.trim().is_empty() {
		return Ok(vector::l2_normalize(&positive_vec));
	}

	let negative_vec = embed_one(cfg, providers, negative).await?;

	Ok(vector::compose_signed(&positive_vec, &negative_vec, cfg.search.negation_weight))
}

async fn embed_one(
	cfg: &lici_config::Config,
	providers: &Providers,
	text: &str,
) -> Result<Vec<f32>> {
	let texts = [text.to_string()];
	let policy = RetryPolicy::from_config(&cfg.search.retry);
	let vectors =
		retry::with_retry(policy, "embedding", || {
			providers.embedding.embed(&cfg.providers.embedding, &texts)
		})
		.await
		.map_err(|err| Error::Embedding { message: err.to_string() })?;
	let vec = vectors
		.into_iter()
		.next()
		.ok_or_else(|| Error::Embedding { message: "Provider returned no vectors.".to_string() })?;

	if vec.len() != cfg.providers.embedding.dimensions as usize {
		return Err(Error::Embedding {
			message: format!(
				"Vector dimension mismatch: expected {}, got {}.",
				cfg.providers.embedding.dimensions,
				vec.len(),
			),
		});
	}

	Ok(vec)
}
