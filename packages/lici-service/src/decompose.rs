//! Query decomposition.
//!
//! A raw analyst query becomes `{search_terms, negative_terms,
//! structured_filters, explanation}`. The `--` marker short-circuits
//! the LLM call; otherwise the query-understanding service is asked
//! for structured JSON under the shared retry policy. Total failure
//! degrades to a literal-query decomposition and never propagates.

use lici_domain::{filters, filters::FilterClause, negation};
use lici_providers::retry::{self, RetryPolicy};
use serde_json::Value;

use crate::Providers;

const INSTRUCTION: &str = "\
You split procurement search queries into structured parts. Reply with a single JSON object and \
nothing else: {\"search_terms\": string, \"negative_terms\": string, \"structured_filters\": \
[{\"field\": string, \"op\": string, \"value\": string|number}], \"explanation\": string}. \
Allowed fields: status, modality_code, state_code, municipality_code, buyer_name, \
estimated_value, published_at, opening_date, closing_date. Allowed ops: eq, neq, contains, gt, \
gte, lt, lte. Dates are RFC3339 strings. Use empty strings and an empty array when a part does \
not apply.";

#[derive(Clone, Debug)]
pub struct Decomposition {
	pub search_terms: String,
	pub negative_terms: String,
	pub structured_filters: Vec<FilterClause>,
	pub explanation: String,
	pub fallback: bool,
}
impl Decomposition {
	fn literal(raw_query: &str, reason: &str) -> Self {
		Self {
			search_terms: raw_query.to_string(),
			negative_terms: String::new(),
			structured_filters: Vec::new(),
			explanation: format!("Decomposition fell back to the literal query: {reason}"),
			fallback: true,
		}
	}
}

pub async fn decompose(
	cfg: &lici_config::Config,
	providers: &Providers,
	raw_query: &str,
) -> Decomposition {
	// Explicit `--` marker: the caller already split the query, no LLM
	// round trip needed.
	if let Some(split) = negation::split_marker(raw_query) {
		return Decomposition {
			search_terms: split.positive,
			negative_terms: split.negative,
			structured_filters: Vec::new(),
			explanation: "Split on explicit negation marker.".to_string(),
			fallback: false,
		};
	}

	let messages = [
		serde_json::json!({ "role": "system", "content": INSTRUCTION }),
		serde_json::json!({ "role": "user", "content": raw_query }),
	];
	let policy = RetryPolicy::from_config(&cfg.search.retry);
	let reply = retry::with_retry(policy, "decomposer", || {
		providers.decomposer.decompose(&cfg.providers.decomposer, &messages)
	})
	.await;
	let reply = match reply {
		Ok(reply) => reply,
		Err(err) => {
			tracing::warn!(error = %err, "Decomposer unavailable; using literal query.");

			return Decomposition::literal(raw_query, "service unavailable.");
		},
	};

	match interpret(&reply, raw_query) {
		Ok(decomposition) => decomposition,
		Err(reason) => {
			tracing::warn!(reason, "Decomposer reply malformed; using literal query.");

			Decomposition::literal(raw_query, reason)
		},
	}
}

fn interpret(reply: &Value, raw_query: &str) -> Result<Decomposition, &'static str> {
	let search_terms = reply
		.get("search_terms")
		.and_then(Value::as_str)
		.ok_or("reply is missing search_terms.")?
		.trim()
		.to_string();
	let negative_terms = reply
		.get("negative_terms")
		.and_then(Value::as_str)
		.unwrap_or_default()
		.trim()
		.to_string();
	let structured_filters = match reply.get("structured_filters") {
		Some(raw) => filters::parse_filters(raw).map_err(|err| {
			tracing::warn!(error = %err, "Rejecting decomposer filters.");

			"structured_filters failed validation."
		})?,
		None => Vec::new(),
	};
	let explanation = reply
		.get("explanation")
		.and_then(Value::as_str)
		.unwrap_or("Decomposed by the query-understanding service.")
		.to_string();

	// An empty search_terms would silently drop the query text; treat
	// it the same as a malformed reply.
	let search_terms = if search_terms.is_empty() {
		if structured_filters.is_empty() {
			return Err("reply produced neither terms nor filters.");
		}

		raw_query.to_string()
	} else {
		search_terms
	};

	Ok(Decomposition {
		search_terms,
		negative_terms,
		structured_filters,
		explanation,
		fallback: false,
	})
}
