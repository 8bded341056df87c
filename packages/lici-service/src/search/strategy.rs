//! Category-aware strategies layered on the retrieval engine.
//!
//! Direct ignores the taxonomy. Filter narrows the candidate universe
//! to records whose assigned category set intersects the query's top-N
//! and keeps the base algorithm's ranking. Correspondence re-ranks by
//! the product of query-to-category and record-to-category similarity
//! and drops records with no overlapping category.

use std::collections::HashMap;

use lici_domain::filters::FilterClause;
use lici_storage::queries;

use crate::{
	CategoryMatch, LiciService, Result,
	search::{
		Algorithm, MatchedCategory, Strategy,
		engine::{self, EngineInput, EngineMatch},
	},
};

pub(crate) struct StrategyInput<'a> {
	pub algorithm: Algorithm,
	pub strategy: Strategy,
	pub terms: &'a [String],
	pub vec_text: Option<&'a str>,
	pub filters: &'a [FilterClause],
	pub exclude_expired: bool,
	pub categories: Option<&'a [CategoryMatch]>,
	pub candidate_k: i64,
}

#[derive(Clone, Debug)]
pub(crate) struct ScoredMatch {
	pub control_id: String,
	pub score: f32,
	pub matched_category: Option<MatchedCategory>,
}

pub(crate) async fn run(
	service: &LiciService,
	input: &StrategyInput<'_>,
) -> Result<Vec<ScoredMatch>> {
	match input.strategy {
		Strategy::Direct => {
			let matches = run_engine(service, input, None).await?;

			Ok(matches
				.into_iter()
				.map(|m| ScoredMatch {
					control_id: m.control_id,
					score: m.score,
					matched_category: None,
				})
				.collect())
		},
		Strategy::Filter | Strategy::Correspondence => {
			let categories = input.categories.unwrap_or_default();

			// No categories near the query: Filter has an empty
			// universe and Correspondence excludes everything. Both
			// are empty successes.
			if categories.is_empty() {
				return Ok(Vec::new());
			}

			let codes = categories.iter().map(|c| c.code.clone()).collect::<Vec<_>>();
			let matches = run_engine(service, input, Some(&codes)).await?;
			let control_ids = matches.iter().map(|m| m.control_id.clone()).collect::<Vec<_>>();
			let rows = queries::record_categories_for(&service.db, &control_ids).await?;
			let mut assignments: HashMap<String, Vec<(String, f32)>> = HashMap::new();

			for row in rows {
				assignments
					.entry(row.control_id)
					.or_default()
					.push((row.category_code, row.similarity));
			}

			let rerank = input.strategy == Strategy::Correspondence;

			Ok(apply_categories(matches, &assignments, categories, rerank))
		},
	}
}

async fn run_engine(
	service: &LiciService,
	input: &StrategyInput<'_>,
	category_codes: Option<&[String]>,
) -> Result<Vec<EngineMatch>> {
	let engine_input = EngineInput {
		terms: input.terms,
		vec_text: input.vec_text,
		filters: input.filters,
		exclude_expired: input.exclude_expired,
		category_codes,
		candidate_k: input.candidate_k,
	};

	engine::run(&service.db, &service.cfg, input.algorithm, &engine_input).await
}

/// Attach the dominant overlapping category to each match. With
/// `rerank` set the combined product becomes the match score and
/// records without any overlapping category are dropped.
fn apply_categories(
	matches: Vec<EngineMatch>,
	assignments: &HashMap<String, Vec<(String, f32)>>,
	categories: &[CategoryMatch],
	rerank: bool,
) -> Vec<ScoredMatch> {
	let by_code: HashMap<&str, &CategoryMatch> =
		categories.iter().map(|c| (c.code.as_str(), c)).collect();
	let mut out = Vec::with_capacity(matches.len());

	for m in matches {
		let matched = assignments.get(&m.control_id).and_then(|assigned| {
			assigned
				.iter()
				.filter_map(|(code, record_sim)| {
					by_code.get(code.as_str()).map(|category| MatchedCategory {
						code: category.code.clone(),
						name: category.name.clone(),
						query_similarity: category.similarity,
						record_similarity: *record_sim,
						combined: category.similarity * record_sim,
					})
				})
				.max_by(|a, b| {
					a.combined.total_cmp(&b.combined).then_with(|| b.code.cmp(&a.code))
				})
		});

		match matched {
			Some(matched) => {
				let score = if rerank { matched.combined } else { m.score };

				out.push(ScoredMatch {
					control_id: m.control_id,
					score,
					matched_category: Some(matched),
				});
			},
			None if rerank => {},
			None => out.push(ScoredMatch {
				control_id: m.control_id,
				score: m.score,
				matched_category: None,
			}),
		}
	}

	if rerank {
		out.sort_by(|a, b| {
			b.score.total_cmp(&a.score).then_with(|| a.control_id.cmp(&b.control_id))
		});
	}

	out
}
