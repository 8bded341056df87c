use lici_domain::filters::{FilterClause, FilterOp, FilterValue};
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::{
	Result,
	db::Db,
	models::{CandidateRow, CategoryNodeRow, ProcurementRecord, RecordCategoryRow},
};

/// Shared restriction set applied to every candidate query.
pub struct CandidateScope<'a> {
	pub filters: &'a [FilterClause],
	pub exclude_expired: bool,
	pub category_codes: Option<&'a [String]>,
	pub limit: i64,
}

/// Records whose description matches any of the given terms, most recently
/// published first. With no terms this degrades to a filter-only listing.
///
/// Scores are left at zero; lexical relevance is computed by the caller from
/// the returned descriptions.
pub async fn lexical_candidates(
	db: &Db,
	terms: &[String],
	scope: &CandidateScope<'_>,
) -> Result<Vec<CandidateRow>> {
	let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
		"\
SELECT
	r.control_id,
	r.description,
	0::real AS score
FROM procurement_records r
WHERE TRUE",
	);

	if !terms.is_empty() {
		qb.push(" AND (");

		for (i, term) in terms.iter().enumerate() {
			if i > 0 {
				qb.push(" OR ");
			}

			qb.push("r.description ILIKE ").push_bind(format!("%{term}%"));
		}

		qb.push(")");
	}

	push_scope(&mut qb, scope);

	qb.push(" ORDER BY r.published_at DESC NULLS LAST, r.control_id LIMIT ").push_bind(scope.limit);

	let rows = qb.build_query_as::<CandidateRow>().fetch_all(&db.pool).await?;

	Ok(rows)
}

/// Records nearest to the given query vector under cosine distance.
pub async fn semantic_candidates(
	db: &Db,
	vec_text: &str,
	embedding_version: &str,
	scope: &CandidateScope<'_>,
) -> Result<Vec<CandidateRow>> {
	let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
		"\
SELECT
	r.control_id,
	r.description,
	(1 - (e.vec <=> ",
	);

	qb.push_bind(vec_text.to_string());
	qb.push(
		"::text::vector))::real AS score
FROM procurement_records r
JOIN record_embeddings e
	ON e.control_id = r.control_id
	AND e.embedding_version = ",
	);
	qb.push_bind(embedding_version.to_string());
	qb.push(" WHERE TRUE");

	push_scope(&mut qb, scope);

	qb.push(" ORDER BY e.vec <=> ");
	qb.push_bind(vec_text.to_string());
	qb.push("::text::vector ASC, r.control_id LIMIT ").push_bind(scope.limit);

	let rows = qb.build_query_as::<CandidateRow>().fetch_all(&db.pool).await?;

	Ok(rows)
}

pub async fn fetch_records(db: &Db, control_ids: &[String]) -> Result<Vec<ProcurementRecord>> {
	if control_ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as::<_, ProcurementRecord>(
		"\
SELECT
	control_id,
	description,
	buyer_name,
	admin_unit,
	state_code,
	municipality_code,
	modality_code,
	status,
	estimated_value,
	published_at,
	opening_date,
	closing_date
FROM procurement_records
WHERE control_id = ANY($1)",
	)
	.bind(control_ids)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn load_categories(db: &Db, embedding_version: &str) -> Result<Vec<CategoryNodeRow>> {
	let rows = sqlx::query_as::<_, CategoryNodeRow>(
		"\
SELECT
	code,
	name,
	parent_code,
	vec::text AS vec_text
FROM category_nodes
WHERE embedding_version = $1
ORDER BY code",
	)
	.bind(embedding_version)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn record_categories_for(
	db: &Db,
	control_ids: &[String],
) -> Result<Vec<RecordCategoryRow>> {
	if control_ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as::<_, RecordCategoryRow>(
		"\
SELECT
	control_id,
	category_code,
	similarity
FROM record_categories
WHERE control_id = ANY($1)
ORDER BY control_id, category_code",
	)
	.bind(control_ids)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn upsert_record(db: &Db, record: &ProcurementRecord) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO procurement_records (
	control_id,
	description,
	buyer_name,
	admin_unit,
	state_code,
	municipality_code,
	modality_code,
	status,
	estimated_value,
	published_at,
	opening_date,
	closing_date
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
ON CONFLICT (control_id) DO UPDATE
SET
	description = EXCLUDED.description,
	buyer_name = EXCLUDED.buyer_name,
	admin_unit = EXCLUDED.admin_unit,
	state_code = EXCLUDED.state_code,
	municipality_code = EXCLUDED.municipality_code,
	modality_code = EXCLUDED.modality_code,
	status = EXCLUDED.status,
	estimated_value = EXCLUDED.estimated_value,
	published_at = EXCLUDED.published_at,
	opening_date = EXCLUDED.opening_date,
	closing_date = EXCLUDED.closing_date,
	updated_at = now()",
	)
	.bind(record.control_id.as_str())
	.bind(record.description.as_str())
	.bind(record.buyer_name.as_str())
	.bind(record.admin_unit.as_str())
	.bind(record.state_code.as_str())
	.bind(record.municipality_code.as_str())
	.bind(record.modality_code.as_str())
	.bind(record.status.as_str())
	.bind(record.estimated_value)
	.bind(record.published_at)
	.bind(record.opening_date)
	.bind(record.closing_date)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn upsert_record_embedding(
	db: &Db,
	control_id: &str,
	embedding_version: &str,
	vec_text: &str,
	embedding_dim: i32,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO record_embeddings (control_id, embedding_version, embedding_dim, vec)
VALUES ($1, $2, $3, $4::text::vector)
ON CONFLICT (control_id, embedding_version) DO UPDATE
SET
	embedding_dim = EXCLUDED.embedding_dim,
	vec = EXCLUDED.vec,
	created_at = now()",
	)
	.bind(control_id)
	.bind(embedding_version)
	.bind(embedding_dim)
	.bind(vec_text)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn upsert_category_node(
	db: &Db,
	code: &str,
	name: &str,
	parent_code: Option<&str>,
	embedding_version: &str,
	vec_text: &str,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO category_nodes (code, embedding_version, name, parent_code, vec)
VALUES ($1, $2, $3, $4, $5::text::vector)
ON CONFLICT (code, embedding_version) DO UPDATE
SET
	name = EXCLUDED.name,
	parent_code = EXCLUDED.parent_code,
	vec = EXCLUDED.vec,
	created_at = now()",
	)
	.bind(code)
	.bind(embedding_version)
	.bind(name)
	.bind(parent_code)
	.bind(vec_text)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn upsert_record_category(
	db: &Db,
	control_id: &str,
	category_code: &str,
	similarity: f32,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO record_categories (control_id, category_code, similarity)
VALUES ($1, $2, $3)
ON CONFLICT (control_id, category_code) DO UPDATE
SET similarity = EXCLUDED.similarity",
	)
	.bind(control_id)
	.bind(category_code)
	.bind(similarity)
	.execute(&db.pool)
	.await?;

	Ok(())
}

fn push_scope(qb: &mut QueryBuilder<Postgres>, scope: &CandidateScope<'_>) {
	for clause in scope.filters {
		push_filter_clause(qb, clause);
	}

	if scope.exclude_expired {
		qb.push(" AND (r.closing_date IS NULL OR r.closing_date > now())");
	}

	if let Some(codes) = scope.category_codes {
		qb.push(
			" AND EXISTS (\
SELECT 1 FROM record_categories rc \
WHERE rc.control_id = r.control_id AND rc.category_code = ANY(",
		);
		qb.push_bind(codes.to_vec());
		qb.push("))");
	}
}

fn push_filter_clause(qb: &mut QueryBuilder<Postgres>, clause: &FilterClause) {
	// Column names come from the field allowlist, never from user input.
	qb.push(" AND r.").push(clause.field.column());

	match clause.op {
		FilterOp::Contains => {
			qb.push(" ILIKE ");

			if let FilterValue::String(value) = &clause.value {
				qb.push_bind(format!("%{value}%"));
			}

			return;
		},
		FilterOp::Eq => qb.push(" = "),
		FilterOp::Neq => qb.push(" <> "),
		FilterOp::Gt => qb.push(" > "),
		FilterOp::Gte => qb.push(" >= "),
		FilterOp::Lt => qb.push(" < "),
		FilterOp::Lte => qb.push(" <= "),
	};

	push_filter_value(qb, &clause.value);
}

fn push_filter_value(qb: &mut QueryBuilder<Postgres>, value: &FilterValue) {
	match value {
		FilterValue::String(value) => {
			qb.push_bind(value.clone());
		},
		FilterValue::Number(value) => {
			qb.push_bind(*value);
		},
		FilterValue::DateTime(value) => {
			let value: OffsetDateTime = *value;

			qb.push_bind(value);
		},
	}
}
