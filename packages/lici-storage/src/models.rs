use time::OffsetDateTime;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct ProcurementRecord {
	pub control_id: String,
	pub description: String,
	pub buyer_name: String,
	pub admin_unit: String,
	pub state_code: String,
	pub municipality_code: String,
	pub modality_code: String,
	pub status: String,
	pub estimated_value: Option<f64>,
	pub published_at: Option<OffsetDateTime>,
	pub opening_date: Option<OffsetDateTime>,
	pub closing_date: Option<OffsetDateTime>,
}

/// A record surfaced by a retrieval query together with its raw engine score.
///
/// Lexical candidates carry an overlap ratio in `[0, 1]`; semantic candidates
/// carry a cosine similarity.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct CandidateRow {
	pub control_id: String,
	pub description: String,
	pub score: f32,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct CategoryNodeRow {
	pub code: String,
	pub name: String,
	pub parent_code: Option<String>,
	pub vec_text: String,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct RecordCategoryRow {
	pub control_id: String,
	pub category_code: String,
	pub similarity: f32,
}
