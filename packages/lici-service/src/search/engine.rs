//! Base retrieval algorithms.
//!
//! Lexical relevance is a term-overlap ratio in `[0, 1]` computed over
//! the candidate descriptions, so hybrid combination never deals with
//! an unbounded text-rank score. Semantic scores are cosine
//! similarities straight from the store.

use lici_domain::filters::FilterClause;
use lici_storage::{
	db::Db,
	models::CandidateRow,
	queries::{self, CandidateScope},
};

use crate::{Error, Result, search::Algorithm};

pub(crate) struct EngineInput<'a> {
	pub terms: &'a [String],
	pub vec_text: Option<&'a str>,
	pub filters: &'a [FilterClause],
	pub exclude_expired: bool,
	pub category_codes: Option<&'a [String]>,
	pub candidate_k: i64,
}

#[derive(Clone, Debug)]
pub(crate) struct EngineMatch {
	pub control_id: String,
	pub score: f32,
}

pub(crate) async fn run(
	db: &Db,
	cfg: &lici_config::Config,
	algorithm: Algorithm,
	input: &EngineInput<'_>,
) -> Result<Vec<EngineMatch>> {
	let scope = CandidateScope {
		filters: input.filters,
		exclude_expired: input.exclude_expired,
		category_codes: input.category_codes,
		limit: input.candidate_k,
	};

	// No terms left after decomposition: lexical and hybrid degrade to
	// a filter-only listing ordered by publication recency.
	if input.terms.is_empty() && algorithm != Algorithm::Semantic {
		let rows = queries::lexical_candidates(db, &[], &scope).await?;

		return Ok(rows
			.into_iter()
			.map(|row| EngineMatch { control_id: row.control_id, score: 0.0 })
			.collect());
	}

	match algorithm {
		Algorithm::Lexical => {
			let rows = queries::lexical_candidates(db, input.terms, &scope).await?;

			Ok(rank(score_lexical(rows, input.terms)))
		},
		Algorithm::Semantic => {
			let vec_text = require_vector(input)?;
			let version = crate::embedding_version(cfg);
			let rows = queries::semantic_candidates(db, vec_text, &version, &scope).await?;

			Ok(rows
				.into_iter()
				.map(|row| EngineMatch { control_id: row.control_id, score: row.score })
				.collect())
		},
		Algorithm::Hybrid => {
			let vec_text = require_vector(input)?;
			let version = crate::embedding_version(cfg);
			let rows = queries::semantic_candidates(db, vec_text, &version, &scope).await?;
			let w = cfg.search.hybrid_weight;

			Ok(rank(
				rows.into_iter()
					.map(|row| {
						let lexical = lexical_overlap(&row.description, input.terms);

						EngineMatch {
							control_id: row.control_id,
							score: w * row.score + (1.0 - w) * lexical,
						}
					})
					.collect(),
			))
		},
	}
}

fn require_vector<'a>(input: &EngineInput<'a>) -> Result<&'a str> {
	input.vec_text.ok_or_else(|| Error::Embedding {
		message: "Semantic retrieval requires a query embedding.".to_string(),
	})
}

fn score_lexical(rows: Vec<CandidateRow>, terms: &[String]) -> Vec<EngineMatch> {
	rows.into_iter()
		.map(|row| EngineMatch {
			score: lexical_overlap(&row.description, terms),
			control_id: row.control_id,
		})
		.collect()
}

fn rank(mut matches: Vec<EngineMatch>) -> Vec<EngineMatch> {
	matches.sort_by(|a, b| {
		b.score.total_cmp(&a.score).then_with(|| a.control_id.cmp(&b.control_id))
	});

	matches
}

/// Fraction of query terms present in the description,
/// case-insensitively. Empty terms score zero.
pub(crate) fn lexical_overlap(description: &str, terms: &[String]) -> f32 {
	if terms.is_empty() {
		return 0.0;
	}

	let haystack = description.to_lowercase();
	let matched =
		terms.iter().filter(|term| haystack.contains(term.to_lowercase().as_str())).count();

	matched as f32 / terms.len() as f32
}

pub(crate) fn tokenize(text: &str) -> Vec<String> {
	text.split_whitespace().map(str::to_string).collect()
}
