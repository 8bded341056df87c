use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub search: Search,
	pub security: Security,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub decomposer: LlmProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Search {
	#[serde(default = "default_limit")]
	pub default_limit: u32,
	#[serde(default = "default_max_limit")]
	pub max_limit: u32,
	#[serde(default = "default_top_categories")]
	pub top_categories: u32,
	#[serde(default = "default_candidate_k")]
	pub candidate_k: u32,
	/// Weight of the negative embedding when composing a signed query
	/// vector. Model-version dependent; re-tune empirically whenever
	/// `providers.embedding.model` changes.
	#[serde(default = "default_negation_weight")]
	pub negation_weight: f32,
	/// Semantic share of the hybrid score. The lexical share is
	/// `1 - hybrid_weight`.
	#[serde(default = "default_hybrid_weight")]
	pub hybrid_weight: f32,
	#[serde(default)]
	pub retry: SearchRetry,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchRetry {
	pub max_attempts: u32,
	pub backoff_ms: u64,
}
impl Default for SearchRetry {
	fn default() -> Self {
		Self { max_attempts: 3, backoff_ms: 250 }
	}
}

#[derive(Debug, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
	pub admin_auth_token: Option<String>,
}

fn default_limit() -> u32 {
	30
}

fn default_max_limit() -> u32 {
	200
}

fn default_top_categories() -> u32 {
	10
}

fn default_candidate_k() -> u32 {
	200
}

fn default_negation_weight() -> f32 {
	0.6
}

fn default_hybrid_weight() -> f32 {
	0.75
}
