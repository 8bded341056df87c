use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use lici_config::Error;

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn sample_toml() -> String {
	SAMPLE_CONFIG_TEMPLATE_TOML.to_string()
}

fn sample_toml_with<F>(mutate: F) -> String
where
	F: FnOnce(&mut toml::Table),
{
	let mut value: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let root = value.as_table_mut().expect("Template config must be a table.");

	mutate(root);

	toml::to_string(&value).expect("Failed to render template config.")
}

fn write_temp_config(contents: &str) -> PathBuf {
	let nanos = SystemTime::now().duration_since(UNIX_EPOCH).expect("clock").as_nanos();
	let unique = COUNTER.fetch_add(1, Ordering::SeqCst);
	let path = env::temp_dir().join(format!("lici_config_test_{nanos}_{unique}.toml"));

	fs::write(&path, contents).expect("Failed to write temp config.");

	path
}

fn load(contents: &str) -> Result<lici_config::Config, Error> {
	let path = write_temp_config(contents);
	let result = lici_config::load(&path);

	let _ = fs::remove_file(&path);

	result
}

#[test]
fn loads_sample_config() {
	let cfg = load(&sample_toml()).expect("Sample config must load.");

	assert_eq!(cfg.search.default_limit, 30);
	assert_eq!(cfg.search.top_categories, 10);
	assert!((cfg.search.negation_weight - 0.6).abs() < f32::EPSILON);
}

#[test]
fn defaults_apply_when_search_table_is_minimal() {
	let raw = sample_toml_with(|root| {
		root.insert("search".to_string(), Value::Table(toml::Table::new()));
	});
	let cfg = load(&raw).expect("Minimal search table must load with defaults.");

	assert_eq!(cfg.search.default_limit, 30);
	assert_eq!(cfg.search.max_limit, 200);
	assert_eq!(cfg.search.candidate_k, 200);
	assert_eq!(cfg.search.retry.max_attempts, 3);
	assert!((cfg.search.hybrid_weight - 0.75).abs() < f32::EPSILON);
}

#[test]
fn rejects_zero_embedding_dimensions() {
	let raw = sample_toml_with(|root| {
		let providers =
			root.get_mut("providers").and_then(Value::as_table_mut).expect("providers table");
		let embedding =
			providers.get_mut("embedding").and_then(Value::as_table_mut).expect("embedding table");

		embedding.insert("dimensions".to_string(), Value::Integer(0));
	});
	let err = load(&raw).expect_err("Zero dimensions must be rejected.");

	assert!(err.to_string().contains("dimensions"));
}

#[test]
fn rejects_out_of_range_hybrid_weight() {
	let raw = sample_toml_with(|root| {
		let search = root.get_mut("search").and_then(Value::as_table_mut).expect("search table");

		search.insert("hybrid_weight".to_string(), Value::Float(1.5));
	});
	let err = load(&raw).expect_err("hybrid_weight above 1.0 must be rejected.");

	assert!(err.to_string().contains("hybrid_weight"));
}

#[test]
fn rejects_non_positive_negation_weight() {
	let raw = sample_toml_with(|root| {
		let search = root.get_mut("search").and_then(Value::as_table_mut).expect("search table");

		search.insert("negation_weight".to_string(), Value::Float(0.0));
	});

	assert!(load(&raw).is_err());
}

#[test]
fn rejects_empty_provider_api_key() {
	let raw = sample_toml_with(|root| {
		let providers =
			root.get_mut("providers").and_then(Value::as_table_mut).expect("providers table");
		let decomposer = providers
			.get_mut("decomposer")
			.and_then(Value::as_table_mut)
			.expect("decomposer table");

		decomposer.insert("api_key".to_string(), Value::String("  ".to_string()));
	});
	let err = load(&raw).expect_err("Blank api_key must be rejected.");

	assert!(err.to_string().contains("api_key"));
}

#[test]
fn blank_admin_token_normalizes_to_none() {
	let raw = sample_toml_with(|root| {
		let security =
			root.get_mut("security").and_then(Value::as_table_mut).expect("security table");

		security.insert("admin_auth_token".to_string(), Value::String("   ".to_string()));
	});
	let cfg = load(&raw).expect("Blank admin token must normalize.");

	assert!(cfg.security.admin_auth_token.is_none());
}

#[test]
fn rejects_candidate_k_below_max_limit() {
	let raw = sample_toml_with(|root| {
		let search = root.get_mut("search").and_then(Value::as_table_mut).expect("search table");

		search.insert("candidate_k".to_string(), Value::Integer(10));
	});
	let err = load(&raw).expect_err("candidate_k below max_limit must be rejected.");

	assert!(err.to_string().contains("candidate_k"));
}
