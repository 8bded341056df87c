pub(crate) mod assemble;
pub(crate) mod engine;
pub(crate) mod strategy;

use std::time::Instant;

use lici_storage::{queries, vector_text};
use tracing::info;

use crate::{
	CategoryMatch, Error, LiciService, Result, decompose, embed,
	search::strategy::StrategyInput,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
	Lexical,
	Semantic,
	Hybrid,
}
impl Algorithm {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Lexical => "lexical",
			Self::Semantic => "semantic",
			Self::Hybrid => "hybrid",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
	Direct,
	Correspondence,
	Filter,
}
impl Strategy {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Direct => "direct",
			Self::Correspondence => "correspondence",
			Self::Filter => "filter",
		}
	}
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
	#[default]
	Similarity,
	ClosingDate,
	EstimatedValue,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SearchRequest {
	pub query: String,
	pub algorithm: Algorithm,
	pub strategy: Strategy,
	pub top_categories: Option<u32>,
	pub limit: Option<i64>,
	#[serde(default)]
	pub sort_mode: SortMode,
	#[serde(default)]
	pub filter_expired: bool,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MatchedCategory {
	pub code: String,
	pub name: String,
	pub query_similarity: f32,
	pub record_similarity: f32,
	pub combined: f32,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ResultItem {
	pub rank: u32,
	pub control_id: String,
	pub description: String,
	pub buyer_name: String,
	pub state_code: String,
	pub municipality_code: String,
	pub modality_code: String,
	pub status: String,
	pub estimated_value: Option<f64>,
	#[serde(with = "crate::time_serde::option")]
	pub published_at: Option<time::OffsetDateTime>,
	#[serde(with = "crate::time_serde::option")]
	pub closing_date: Option<time::OffsetDateTime>,
	pub score: f32,
	pub matched_category: Option<MatchedCategory>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SearchResponse {
	pub results: Vec<ResultItem>,
	pub categories_used: Option<Vec<CategoryMatch>>,
	pub confidence: f32,
	pub elapsed_ms: f64,
	pub explanation: String,
}

struct ValidatedRequest {
	limit: i64,
	top_categories: usize,
	candidate_k: i64,
}

impl LiciService {
	/// Run one retrieval pipeline invocation.
	///
	/// Validation happens before any external call; decomposition
	/// failures degrade to the literal query inside `decompose`; an
	/// empty result set is a success.
	pub async fn search(&self, req: &SearchRequest) -> Result<SearchResponse> {
		let validated = validate(&self.cfg, req)?;
		let started = Instant::now();
		let decomposition = decompose::decompose(&self.cfg, &self.providers, &req.query).await;
		let terms = engine::tokenize(&decomposition.search_terms);

		// Lexical + direct is the only combination that works without a
		// query vector.
		let needs_vector = req.algorithm != Algorithm::Lexical || req.strategy != Strategy::Direct;
		let (embedding, categories_used) = if needs_vector {
			let vec = embed::query_embedding(
				&self.cfg,
				&self.providers,
				&decomposition.search_terms,
				&decomposition.negative_terms,
			)
			.await?;
			// Category routing needs the vector, and every non-direct
			// strategy sets `needs_vector`.
			let categories = (req.strategy != Strategy::Direct)
				.then(|| self.categories.snapshot().nearest(&vec, validated.top_categories));

			(Some(vec), categories)
		} else {
			(None, None)
		};
		let vec_text = embedding.as_deref().map(vector_text::vector_to_pg);
		let input = StrategyInput {
			algorithm: req.algorithm,
			strategy: req.strategy,
			terms: &terms,
			vec_text: vec_text.as_deref(),
			filters: &decomposition.structured_filters,
			exclude_expired: req.filter_expired,
			categories: categories_used.as_deref(),
			candidate_k: validated.candidate_k,
		};
		let matches = strategy::run(self, &input).await?;
		let control_ids = matches.iter().map(|m| m.control_id.clone()).collect::<Vec<_>>();
		let records = queries::fetch_records(&self.db, &control_ids).await?;
		let results = assemble::assemble(records, matches, req.sort_mode, validated.limit);
		let confidence = assemble::confidence(&results);
		let elapsed_ms = started.elapsed().as_secs_f64() * 1_000.0;

		info!(
			query = %req.query,
			algorithm = req.algorithm.as_str(),
			strategy = req.strategy.as_str(),
			fallback = decomposition.fallback,
			result_count = results.len(),
			confidence,
			elapsed_ms,
			"Search completed."
		);

		Ok(SearchResponse {
			results,
			categories_used,
			confidence,
			elapsed_ms,
			explanation: decomposition.explanation,
		})
	}
}

fn validate(cfg: &lici_config::Config, req: &SearchRequest) -> Result<ValidatedRequest> {
	if req.query.trim().is_empty() {
		return Err(Error::InvalidRequest { message: "query must not be empty.".to_string() });
	}

	let limit = req.limit.unwrap_or(i64::from(cfg.search.default_limit));

	if limit <= 0 {
		return Err(Error::InvalidRequest {
			message: format!("limit must be positive, got {limit}."),
		});
	}
	if limit > i64::from(cfg.search.max_limit) {
		return Err(Error::InvalidRequest {
			message: format!("limit {limit} exceeds the maximum of {}.", cfg.search.max_limit),
		});
	}

	let top_categories = req.top_categories.unwrap_or(cfg.search.top_categories);

	if top_categories == 0 {
		return Err(Error::InvalidRequest {
			message: "top_categories must be positive.".to_string(),
		});
	}

	let candidate_k = i64::from(cfg.search.candidate_k).max(limit);

	Ok(ValidatedRequest { limit, top_categories: top_categories as usize, candidate_k })
}

#[cfg(test)]
mod tests {
	use super::*;

	fn sample_config() -> lici_config::Config {
		let toml = r#"
[service]
http_bind  = "127.0.0.1:8080"
admin_bind = "127.0.0.1:8081"
log_level  = "info"

[storage.postgres]
dsn            = "postgres://localhost/lici"
pool_max_conns = 4

[providers.embedding]
provider_id     = "openai"
api_base        = "https://api.openai.com"
api_key         = "k"
path            = "/v1/embeddings"
model           = "text-embedding-3-small"
dimensions      = 1536
timeout_ms      = 10000
default_headers = {}

[providers.decomposer]
provider_id     = "openai"
api_base        = "https://api.openai.com"
api_key         = "k"
path            = "/v1/chat/completions"
model           = "gpt-4o-mini"
temperature     = 0.0
timeout_ms      = 15000
default_headers = {}

[search]

[security]
bind_localhost_only = true
"#;

		toml::from_str(toml).expect("config parse failed")
	}

	fn request(limit: Option<i64>) -> SearchRequest {
		SearchRequest {
			query: "merenda escolar".to_string(),
			algorithm: Algorithm::Lexical,
			strategy: Strategy::Direct,
			top_categories: None,
			limit,
			sort_mode: SortMode::Similarity,
			filter_expired: false,
		}
	}

	#[test]
	fn defaults_apply_when_request_omits_limits() {
		let cfg = sample_config();
		let validated = validate(&cfg, &request(None)).expect("validate failed");

		assert_eq!(validated.limit, 30);
		assert_eq!(validated.top_categories, 10);
		assert_eq!(validated.candidate_k, 200);
	}

	#[test]
	fn zero_limit_is_rejected() {
		let cfg = sample_config();

		assert!(matches!(
			validate(&cfg, &request(Some(0))),
			Err(Error::InvalidRequest { .. })
		));
	}

	#[test]
	fn negative_limit_is_rejected() {
		let cfg = sample_config();

		assert!(validate(&cfg, &request(Some(-5))).is_err());
	}

	#[test]
	fn oversized_limit_is_rejected() {
		let cfg = sample_config();

		assert!(validate(&cfg, &request(Some(10_000))).is_err());
	}

	#[test]
	fn blank_query_is_rejected() {
		let cfg = sample_config();
		let mut req = request(None);

		req.query = "   ".to_string();

		assert!(validate(&cfg, &req).is_err());
	}

	#[test]
	fn enums_deserialize_from_wire_names() {
		let req: SearchRequest = serde_json::from_value(serde_json::json!({
			"query": "obras",
			"algorithm": "hybrid",
			"strategy": "correspondence",
			"sort_mode": "closing_date"
		}))
		.expect("deserialize failed");

		assert_eq!(req.algorithm, Algorithm::Hybrid);
		assert_eq!(req.strategy, Strategy::Correspondence);
		assert_eq!(req.sort_mode, SortMode::ClosingDate);

		assert!(
			serde_json::from_value::<SearchRequest>(serde_json::json!({
				"query": "obras",
				"algorithm": "fuzzy",
				"strategy": "direct"
			}))
			.is_err()
		);
	}
}
