//! End-to-end pipeline tests against a real Postgres with pgvector.
//!
//! Gated on `LICI_PG_DSN`; each test seeds its own throwaway database.
//! Providers are mocked with fixed vectors so rankings are exact.

use std::sync::{
	Arc,
	atomic::{AtomicUsize, Ordering},
};

use serde_json::{Map, Value};

use lici_config::{
	Config, EmbeddingProviderConfig, LlmProviderConfig, Postgres, Providers as ProviderConfigs,
	Search, SearchRetry, Security, Service, Storage,
};
use lici_service::{
	Algorithm, BoxFuture, DecomposerProvider, EmbeddingProvider, LiciService, Providers,
	SearchRequest, SortMode, Strategy,
};
use lici_storage::{db::Db, models::ProcurementRecord, queries, vector_text};
use lici_testkit::TestDatabase;
use time::OffsetDateTime;

const DIM: u32 = 3;
const EMBED_VERSION: &str = "mock:mock-embed:3";

struct FixedEmbedding {
	calls: Arc<AtomicUsize>,
	fail: bool,
}
impl FixedEmbedding {
	fn new() -> Self {
		Self { calls: Arc::new(AtomicUsize::new(0)), fail: false }
	}

	fn failing() -> Self {
		Self { calls: Arc::new(AtomicUsize::new(0)), fail: true }
	}

	fn count(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl EmbeddingProvider for FixedEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let fail = self.fail;
		let vectors = texts.iter().map(|text| vector_for(text)).collect::<Vec<_>>();

		Box::pin(async move {
			if fail {
				return Err(color_eyre::eyre::eyre!("embedding provider down"));
			}

			Ok(vectors)
		})
	}
}

/// Replies with the user message as literal search terms, so queries
/// without a negation marker still reach the engine verbatim.
struct EchoDecomposer;
impl DecomposerProvider for EchoDecomposer {
	fn decompose<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Value>> {
		let query = messages
			.last()
			.and_then(|m| m.get("content"))
			.and_then(Value::as_str)
			.unwrap_or_default()
			.to_string();

		Box::pin(async move {
			Ok(serde_json::json!({
				"search_terms": query,
				"negative_terms": "",
				"structured_filters": [],
				"explanation": "echo"
			}))
		})
	}
}

fn vector_for(text: &str) -> Vec<f32> {
	if text.contains("merenda") {
		vec![1.0, 0.0, 0.0]
	} else if text.contains("agricultura") {
		vec![0.0, 1.0, 0.0]
	} else {
		vec![0.0, 0.0, 1.0]
	}
}

fn test_config(dsn: &str) -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:8080".to_string(),
			admin_bind: "127.0.0.1:8081".to_string(),
			log_level: "info".to_string(),
		},
		storage: Storage {
			postgres: Postgres { dsn: dsn.to_string(), pool_max_conns: 2 },
		},
		providers: ProviderConfigs {
			embedding: EmbeddingProviderConfig {
				provider_id: "mock".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "test".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "mock-embed".to_string(),
				dimensions: DIM,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			decomposer: LlmProviderConfig {
				provider_id: "mock".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "test".to_string(),
				path: "/v1/chat/completions".to_string(),
				model: "mock-llm".to_string(),
				temperature: 0.0,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		search: Search {
			default_limit: 30,
			max_limit: 200,
			top_categories: 10,
			candidate_k: 200,
			negation_weight: 0.6,
			hybrid_weight: 0.75,
			retry: SearchRetry { max_attempts: 2, backoff_ms: 1 },
		},
		security: Security { bind_localhost_only: true, admin_auth_token: None },
	}
}

fn record(control_id: &str, description: &str) -> ProcurementRecord {
	ProcurementRecord {
		control_id: control_id.to_string(),
		description: description.to_string(),
		buyer_name: "Prefeitura de Teste".to_string(),
		admin_unit: "Secretaria de Compras".to_string(),
		state_code: "SP".to_string(),
		municipality_code: "3550308".to_string(),
		modality_code: "6".to_string(),
		status: "open".to_string(),
		estimated_value: Some(100_000.0),
		published_at: Some(OffsetDateTime::UNIX_EPOCH),
		opening_date: None,
		closing_date: None,
	}
}

async fn seed(db: &Db) {
	db.ensure_schema(DIM).await.expect("Failed to ensure schema.");

	let seeds = [
		("A-1", "aquisição de merenda escolar para a rede municipal", [1.0, 0.0, 0.0], Some(("FOOD", 0.9))),
		("B-2", "aquisição de produtos da agricultura familiar", [0.0, 1.0, 0.0], Some(("AGRI", 0.85))),
		("C-3", "contratação de obras de pavimentação asfáltica", [0.0, 0.0, 1.0], Some(("ROAD", 0.8))),
		("D-4", "merenda escolar complementar sem categoria", [0.8, 0.6, 0.0], None),
	];

	for (control_id, description, vec, category) in seeds {
		queries::upsert_record(db, &record(control_id, description))
			.await
			.expect("Failed to upsert record.");
		queries::upsert_record_embedding(
			db,
			control_id,
			EMBED_VERSION,
			&vector_text::vector_to_pg(&vec),
			DIM as i32,
		)
		.await
		.expect("Failed to upsert embedding.");

		if let Some((code, similarity)) = category {
			queries::upsert_record_category(db, control_id, code, similarity)
				.await
				.expect("Failed to upsert record category.");
		}
	}

	let categories =
		[("FOOD", [1.0, 0.0, 0.0]), ("AGRI", [0.0, 1.0, 0.0]), ("ROAD", [0.0, 0.0, 1.0])];

	for (code, vec) in categories {
		queries::upsert_category_node(
			db,
			code,
			code,
			None,
			EMBED_VERSION,
			&vector_text::vector_to_pg(&vec),
		)
		.await
		.expect("Failed to upsert category node.");
	}
}

async fn service_for(test_db: &TestDatabase, embedding: Arc<FixedEmbedding>) -> LiciService {
	let cfg = test_config(test_db.dsn());
	let db = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect to Postgres.");

	seed(&db).await;

	let service =
		LiciService::with_providers(cfg, db, Providers::new(embedding, Arc::new(EchoDecomposer)));

	service.refresh_categories().await.expect("Failed to load categories.");

	service
}

fn request(query: &str, algorithm: Algorithm, strategy: Strategy) -> SearchRequest {
	SearchRequest {
		query: query.to_string(),
		algorithm,
		strategy,
		top_categories: None,
		limit: Some(5),
		sort_mode: SortMode::Similarity,
		filter_expired: false,
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set LICI_PG_DSN to run."]
async fn negated_semantic_filter_scenario() {
	let Some(base_dsn) = lici_testkit::env_dsn() else {
		eprintln!("Skipping negated_semantic_filter_scenario; set LICI_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = service_for(&test_db, Arc::new(FixedEmbedding::new())).await;
	let response = service
		.search(&request(
			"merenda escolar -- agricultura familiar",
			Algorithm::Semantic,
			Strategy::Filter,
		))
		.await
		.expect("search failed");
	let categories_used = response.categories_used.expect("expected categories_used");

	assert!(!categories_used.is_empty());
	assert!(categories_used.len() <= 10);

	let used_codes =
		categories_used.iter().map(|c| c.code.as_str()).collect::<Vec<_>>();

	// D-4 has no category assignment, so the filter universe excludes it.
	assert!(response.results.iter().all(|r| r.control_id != "D-4"));
	assert_eq!(response.results[0].control_id, "A-1");

	for result in &response.results {
		let matched =
			result.matched_category.as_ref().expect("expected a matched category");

		assert!(used_codes.contains(&matched.code.as_str()));
	}

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set LICI_PG_DSN to run."]
async fn filter_results_are_a_subset_of_direct_results() {
	let Some(base_dsn) = lici_testkit::env_dsn() else {
		eprintln!("Skipping filter_results_are_a_subset_of_direct_results; set LICI_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = service_for(&test_db, Arc::new(FixedEmbedding::new())).await;
	let direct = service
		.search(&request("merenda escolar", Algorithm::Semantic, Strategy::Direct))
		.await
		.expect("direct search failed");
	let filtered = service
		.search(&request("merenda escolar", Algorithm::Semantic, Strategy::Filter))
		.await
		.expect("filter search failed");
	let direct_ids =
		direct.results.iter().map(|r| r.control_id.as_str()).collect::<Vec<_>>();

	assert!(direct_ids.contains(&"D-4"));

	for result in &filtered.results {
		assert!(direct_ids.contains(&result.control_id.as_str()));
	}
	assert!(filtered.results.iter().all(|r| r.control_id != "D-4"));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set LICI_PG_DSN to run."]
async fn correspondence_excludes_uncategorized_records() {
	let Some(base_dsn) = lici_testkit::env_dsn() else {
		eprintln!("Skipping correspondence_excludes_uncategorized_records; set LICI_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = service_for(&test_db, Arc::new(FixedEmbedding::new())).await;
	let response = service
		.search(&request("merenda escolar", Algorithm::Semantic, Strategy::Correspondence))
		.await
		.expect("search failed");

	assert!(response.results.iter().all(|r| r.control_id != "D-4"));

	let top = &response.results[0];

	assert_eq!(top.control_id, "A-1");

	let matched = top.matched_category.as_ref().expect("expected matched category");

	assert_eq!(matched.code, "FOOD");
	assert!((matched.combined - matched.query_similarity * matched.record_similarity).abs() < 1e-6);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set LICI_PG_DSN to run."]
async fn lexical_direct_succeeds_without_an_embedding() {
	let Some(base_dsn) = lici_testkit::env_dsn() else {
		eprintln!("Skipping lexical_direct_succeeds_without_an_embedding; set LICI_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let embedding = Arc::new(FixedEmbedding::failing());
	let service = service_for(&test_db, embedding.clone()).await;
	let response = service
		.search(&request("merenda escolar", Algorithm::Lexical, Strategy::Direct))
		.await
		.expect("search failed");

	assert!(!response.results.is_empty());
	assert_eq!(embedding.count(), 0);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set LICI_PG_DSN to run."]
async fn no_matches_is_an_empty_success() {
	let Some(base_dsn) = lici_testkit::env_dsn() else {
		eprintln!("Skipping no_matches_is_an_empty_success; set LICI_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = service_for(&test_db, Arc::new(FixedEmbedding::new())).await;
	let response = service
		.search(&request("inexistente zzz", Algorithm::Lexical, Strategy::Direct))
		.await
		.expect("search failed");

	assert!(response.results.is_empty());
	assert_eq!(response.confidence, 0.0);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set LICI_PG_DSN to run."]
async fn hybrid_ranking_is_deterministic() {
	let Some(base_dsn) = lici_testkit::env_dsn() else {
		eprintln!("Skipping hybrid_ranking_is_deterministic; set LICI_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let service = service_for(&test_db, Arc::new(FixedEmbedding::new())).await;
	let req = request("merenda escolar", Algorithm::Hybrid, Strategy::Direct);
	let first = service.search(&req).await.expect("search failed");
	let second = service.search(&req).await.expect("search failed");
	let first_json = serde_json::to_string(&first.results).expect("serialize failed");
	let second_json = serde_json::to_string(&second.results).expect("serialize failed");

	assert_eq!(first_json, second_json);
	assert!(!first.results.is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
