//! Explicit negation marker handling.
//!
//! Analysts can write `merenda escolar -- agricultura familiar` to
//! exclude a topic without involving the query-understanding service.
//! The marker is a standalone `--` token; dashes glued to a word (e.g.
//! `covid-19` or `--flag`) do not count.

pub const NEGATION_MARKER: &str = "--";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NegationSplit {
	pub positive: String,
	pub negative: String,
}

/// Split a raw query on the first standalone `--` token. Returns `None`
/// when no marker is present or either side of the marker is empty;
/// an unsplit query goes through the regular decomposition path.
pub fn split_marker(raw: &str) -> Option<NegationSplit> {
	let tokens: Vec<&str> = raw.split_whitespace().collect();
	let marker_at = tokens.iter().position(|token| *token == NEGATION_MARKER)?;
	let positive = tokens[..marker_at].join(" ");
	let negative: String = tokens[marker_at + 1..]
		.iter()
		.filter(|token| **token != NEGATION_MARKER)
		.copied()
		.collect::<Vec<_>>()
		.join(" ");

	if positive.is_empty() || negative.is_empty() {
		return None;
	}

	Some(NegationSplit { positive, negative })
}
