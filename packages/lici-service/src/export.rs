//! Tabular export of a result list.
//!
//! One row per result, columns in a fixed order, RFC 4180 quoting.
//! Downstream consumers get a stable shape without re-deriving it from
//! the JSON response.

use time::format_description::well_known::Rfc3339;

use crate::search::ResultItem;

const HEADER: &[&str] = &[
	"rank",
	"control_id",
	"description",
	"buyer_name",
	"state_code",
	"municipality_code",
	"modality_code",
	"status",
	"estimated_value",
	"published_at",
	"closing_date",
	"score",
	"matched_category",
];

pub fn to_csv(results: &[ResultItem]) -> String {
	let mut out = String::new();

	push_row(&mut out, HEADER.iter().map(|s| s.to_string()));

	for item in results {
		let published_at = item
			.published_at
			.and_then(|dt| dt.format(&Rfc3339).ok())
			.unwrap_or_default();
		let closing_date = item
			.closing_date
			.and_then(|dt| dt.format(&Rfc3339).ok())
			.unwrap_or_default();
		let estimated_value =
			item.estimated_value.map(|v| v.to_string()).unwrap_or_default();
		let matched_category = item
			.matched_category
			.as_ref()
			.map(|c| c.code.clone())
			.unwrap_or_default();

		push_row(
			&mut out,
			[
				item.rank.to_string(),
				item.control_id.clone(),
				item.description.clone(),
				item.buyer_name.clone(),
				item.state_code.clone(),
				item.municipality_code.clone(),
				item.modality_code.clone(),
				item.status.clone(),
				estimated_value,
				published_at,
				closing_date,
				item.score.to_string(),
				matched_category,
			]
			.into_iter(),
		);
	}

	out
}

fn push_row(out: &mut String, fields: impl Iterator<Item = String>) {
	for (i, field) in fields.enumerate() {
		if i > 0 {
			out.push(',');
		}

		push_field(out, &field);
	}

	out.push_str("\r\n");
}

fn push_field(out: &mut String, field: &str) {
	if field.contains(['"', ',', '\n', '\r']) {
		out.push('"');
		out.push_str(&field.replace('"', "\"\""));
		out.push('"');
	} else {
		out.push_str(field);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn item(control_id: &str, description: &str) -> ResultItem {
		ResultItem {
			rank: 1,
			control_id: control_id.to_string(),
			description: description.to_string(),
			buyer_name: "Prefeitura".to_string(),
			state_code: "SP".to_string(),
			municipality_code: "3550308".to_string(),
			modality_code: "6".to_string(),
			status: "open".to_string(),
			estimated_value: Some(1234.5),
			published_at: None,
			closing_date: None,
			score: 0.75,
			matched_category: None,
		}
	}

	#[test]
	fn header_comes_first() {
		let csv = to_csv(&[]);

		assert!(csv.starts_with("rank,control_id,description"));
		assert_eq!(csv.lines().count(), 1);
	}

	#[test]
	fn one_row_per_result() {
		let csv = to_csv(&[item("A-1", "merenda escolar"), item("B-2", "obras")]);

		assert_eq!(csv.lines().count(), 3);
		assert!(csv.contains("A-1,merenda escolar"));
	}

	#[test]
	fn quotes_fields_with_separators_and_quotes() {
		let csv = to_csv(&[item("A-1", "aquisição de \"gêneros\", diversos")]);

		assert!(csv.contains("\"aquisição de \"\"gêneros\"\", diversos\""));
	}
}
