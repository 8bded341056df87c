//! Result assembly: dedupe, stable ordering, dense ranks, confidence.

use std::collections::HashMap;

use lici_storage::models::ProcurementRecord;

use crate::search::{ResultItem, SortMode, strategy::ScoredMatch};

/// Merge raw matches with their records into the final ordered list.
///
/// Duplicate control ids keep their highest-scoring match. Sorting is
/// stable with the control id as tiebreak, so identical inputs always
/// produce identical output. Ranks are dense and 1-based.
pub(crate) fn assemble(
	records: Vec<ProcurementRecord>,
	matches: Vec<ScoredMatch>,
	sort_mode: SortMode,
	limit: i64,
) -> Vec<ResultItem> {
	let records: HashMap<String, ProcurementRecord> =
		records.into_iter().map(|r| (r.control_id.clone(), r)).collect();
	let mut deduped: HashMap<String, ScoredMatch> = HashMap::new();

	for m in matches {
		match deduped.get(&m.control_id) {
			Some(existing) if existing.score >= m.score => {},
			_ => {
				deduped.insert(m.control_id.clone(), m);
			},
		}
	}

	let mut items = deduped
		.into_values()
		.filter_map(|m| {
			let record = records.get(&m.control_id)?;

			Some(ResultItem {
				rank: 0,
				control_id: record.control_id.clone(),
				description: record.description.clone(),
				buyer_name: record.buyer_name.clone(),
				state_code: record.state_code.clone(),
				municipality_code: record.municipality_code.clone(),
				modality_code: record.modality_code.clone(),
				status: record.status.clone(),
				estimated_value: record.estimated_value,
				published_at: record.published_at,
				closing_date: record.closing_date,
				score: m.score,
				matched_category: m.matched_category,
			})
		})
		.collect::<Vec<_>>();

	sort_items(&mut items, sort_mode);
	items.truncate(limit.max(0) as usize);

	for (i, item) in items.iter_mut().enumerate() {
		item.rank = i as u32 + 1;
	}

	items
}

fn sort_items(items: &mut [ResultItem], sort_mode: SortMode) {
	match sort_mode {
		SortMode::Similarity => items.sort_by(|a, b| {
			b.score.total_cmp(&a.score).then_with(|| a.control_id.cmp(&b.control_id))
		}),
		// Records without a closing date sort last; soonest-closing
		// first among the rest.
		SortMode::ClosingDate => items.sort_by(|a, b| match (&a.closing_date, &b.closing_date) {
			(Some(a_date), Some(b_date)) =>
				a_date.cmp(b_date).then_with(|| a.control_id.cmp(&b.control_id)),
			(Some(_), None) => std::cmp::Ordering::Less,
			(None, Some(_)) => std::cmp::Ordering::Greater,
			(None, None) => a.control_id.cmp(&b.control_id),
		}),
		SortMode::EstimatedValue => items.sort_by(|a, b| match (&a.estimated_value, &b.estimated_value) {
			(Some(a_value), Some(b_value)) =>
				b_value.total_cmp(a_value).then_with(|| a.control_id.cmp(&b.control_id)),
			(Some(_), None) => std::cmp::Ordering::Less,
			(None, Some(_)) => std::cmp::Ordering::Greater,
			(None, None) => a.control_id.cmp(&b.control_id),
		}),
	}
}

/// Arithmetic mean of the primary score, scaled to 0-100. Empty input
/// is 0, never a division error.
pub(crate) fn confidence(items: &[ResultItem]) -> f32 {
	if items.is_empty() {
		return 0.0;
	}

	let mean = items.iter().map(|item| item.score).sum::<f32>() / items.len() as f32;

	(mean * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
	use time::OffsetDateTime;

	use super::*;

	fn record(control_id: &str) -> ProcurementRecord {
		ProcurementRecord {
			control_id: control_id.to_string(),
			description: format!("record {control_id}"),
			buyer_name: String::new(),
			admin_unit: String::new(),
			state_code: "SP".to_string(),
			municipality_code: String::new(),
			modality_code: String::new(),
			status: "open".to_string(),
			estimated_value: None,
			published_at: None,
			opening_date: None,
			closing_date: None,
		}
	}

	fn scored(control_id: &str, score: f32) -> ScoredMatch {
		ScoredMatch { control_id: control_id.to_string(), score, matched_category: None }
	}

	fn ids(items: &[ResultItem]) -> Vec<&str> {
		items.iter().map(|item| item.control_id.as_str()).collect()
	}

	#[test]
	fn deduplicates_keeping_the_best_score() {
		let items = assemble(
			vec![record("A")],
			vec![scored("A", 0.3), scored("A", 0.8), scored("A", 0.5)],
			SortMode::Similarity,
			10,
		);

		assert_eq!(items.len(), 1);
		assert_eq!(items[0].score, 0.8);
	}

	#[test]
	fn ranks_are_dense_and_one_based() {
		let items = assemble(
			vec![record("A"), record("B"), record("C")],
			vec![scored("A", 0.9), scored("B", 0.5), scored("C", 0.7)],
			SortMode::Similarity,
			10,
		);

		assert_eq!(ids(&items), ["A", "C", "B"]);
		assert_eq!(items.iter().map(|i| i.rank).collect::<Vec<_>>(), [1, 2, 3]);
	}

	#[test]
	fn score_ties_break_by_control_id() {
		let items = assemble(
			vec![record("B"), record("A")],
			vec![scored("B", 0.5), scored("A", 0.5)],
			SortMode::Similarity,
			10,
		);

		assert_eq!(ids(&items), ["A", "B"]);
	}

	#[test]
	fn assemble_is_deterministic_across_runs() {
		let build = || {
			assemble(
				vec![record("C"), record("A"), record("B")],
				vec![scored("B", 0.5), scored("C", 0.5), scored("A", 0.9)],
				SortMode::Similarity,
				10,
			)
		};
		let first = serde_json::to_string(&build()).expect("serialize failed");
		let second = serde_json::to_string(&build()).expect("serialize failed");

		assert_eq!(first, second);
	}

	#[test]
	fn closing_date_sorts_ascending_with_missing_dates_last() {
		let mut soon = record("SOON");
		let mut later = record("LATER");

		soon.closing_date = Some(OffsetDateTime::UNIX_EPOCH);
		later.closing_date = Some(OffsetDateTime::UNIX_EPOCH + time::Duration::days(30));

		let items = assemble(
			vec![record("NONE"), later, soon],
			vec![scored("NONE", 0.9), scored("LATER", 0.1), scored("SOON", 0.5)],
			SortMode::ClosingDate,
			10,
		);

		assert_eq!(ids(&items), ["SOON", "LATER", "NONE"]);
	}

	#[test]
	fn estimated_value_sorts_descending() {
		let mut cheap = record("CHEAP");
		let mut dear = record("DEAR");

		cheap.estimated_value = Some(1_000.0);
		dear.estimated_value = Some(900_000.0);

		let items = assemble(
			vec![cheap, dear, record("NONE")],
			vec![scored("CHEAP", 0.9), scored("DEAR", 0.1), scored("NONE", 0.5)],
			SortMode::EstimatedValue,
			10,
		);

		assert_eq!(ids(&items), ["DEAR", "CHEAP", "NONE"]);
	}

	#[test]
	fn limit_truncates_after_sorting() {
		let items = assemble(
			vec![record("A"), record("B"), record("C")],
			vec![scored("A", 0.1), scored("B", 0.9), scored("C", 0.5)],
			SortMode::Similarity,
			2,
		);

		assert_eq!(ids(&items), ["B", "C"]);
	}

	#[test]
	fn confidence_is_bounded_and_zero_for_empty() {
		assert_eq!(confidence(&[]), 0.0);

		let items = assemble(
			vec![record("A"), record("B")],
			vec![scored("A", 0.5), scored("B", 1.0)],
			SortMode::Similarity,
			10,
		);
		let value = confidence(&items);

		assert!((value - 75.0).abs() < 1e-4);

		let negative = assemble(
			vec![record("A")],
			vec![scored("A", -0.4)],
			SortMode::Similarity,
			10,
		);

		assert_eq!(confidence(&negative), 0.0);
	}
}
