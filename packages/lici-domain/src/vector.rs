//! Embedding vector arithmetic.
//!
//! Every vector entering the comparison paths is L2-normalized first so
//! cosine similarity reduces to a dot product and stays well-scaled in
//! [-1, 1].

/// L2-normalize a vector to unit length. A zero vector is returned
/// unchanged; callers treat it as "no usable embedding" rather than a
/// valid direction.
pub fn l2_normalize(vec: &[f32]) -> Vec<f32> {
	let norm = vec.iter().map(|value| value * value).sum::<f32>().sqrt();

	if norm == 0.0 || !norm.is_finite() {
		return vec.to_vec();
	}

	vec.iter().map(|value| value / norm).collect()
}

/// Cosine similarity between two vectors. Returns 0.0 when either side
/// has zero norm or the dimensions disagree.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
	if a.len() != b.len() || a.is_empty() {
		return 0.0;
	}

	let mut dot = 0.0;
	let mut norm_a = 0.0;
	let mut norm_b = 0.0;

	for (lhs, rhs) in a.iter().zip(b.iter()) {
		dot += lhs * rhs;
		norm_a += lhs * lhs;
		norm_b += rhs * rhs;
	}

	if norm_a == 0.0 || norm_b == 0.0 {
		return 0.0;
	}

	dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Compose a signed query vector from a positive and a negative
/// embedding: `normalize(normalize(positive) - weight * normalize(negative))`.
///
/// The weight is model-version dependent and comes from configuration.
pub fn compose_signed(positive: &[f32], negative: &[f32], weight: f32) -> Vec<f32> {
	let positive = l2_normalize(positive);

	if negative.is_empty() {
		return positive;
	}

	let negative = l2_normalize(negative);
	let signed: Vec<f32> = positive
		.iter()
		.zip(negative.iter())
		.map(|(pos, neg)| pos - weight * neg)
		.collect();

	l2_normalize(&signed)
}
