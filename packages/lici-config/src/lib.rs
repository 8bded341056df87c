mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, LlmProviderConfig, Postgres, Providers, Search, SearchRetry,
	Security, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.admin_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.admin_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.search.default_limit == 0 {
		return Err(Error::Validation {
			message: "search.default_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.search.max_limit < cfg.search.default_limit {
		return Err(Error::Validation {
			message: "search.max_limit must be at least search.default_limit.".to_string(),
		});
	}
	if cfg.search.top_categories == 0 {
		return Err(Error::Validation {
			message: "search.top_categories must be greater than zero.".to_string(),
		});
	}
	if cfg.search.candidate_k < cfg.search.max_limit {
		return Err(Error::Validation {
			message: "search.candidate_k must be at least search.max_limit.".to_string(),
		});
	}
	if !cfg.search.negation_weight.is_finite() || cfg.search.negation_weight <= 0.0 {
		return Err(Error::Validation {
			message: "search.negation_weight must be a finite number greater than zero.".to_string(),
		});
	}
	if !cfg.search.hybrid_weight.is_finite() || !(0.0..=1.0).contains(&cfg.search.hybrid_weight) {
		return Err(Error::Validation {
			message: "search.hybrid_weight must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.search.retry.max_attempts == 0 {
		return Err(Error::Validation {
			message: "search.retry.max_attempts must be greater than zero.".to_string(),
		});
	}

	for (label, provider_timeout) in [
		("embedding", cfg.providers.embedding.timeout_ms),
		("decomposer", cfg.providers.decomposer.timeout_ms),
	] {
		if provider_timeout == 0 {
			return Err(Error::Validation {
				message: format!("Provider {label} timeout_ms must be greater than zero."),
			});
		}
	}
	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("decomposer", &cfg.providers.decomposer.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg
		.security
		.admin_auth_token
		.as_deref()
		.map(|token| token.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.security.admin_auth_token = None;
	}
}
