//! In-memory category taxonomy index.
//!
//! The taxonomy is small (hundreds to low thousands of nodes), so
//! nearest-neighbor lookup is a linear cosine scan over the loaded
//! snapshot. Readers share the snapshot through an `Arc`; an explicit
//! refresh swaps the whole snapshot so in-flight reads are never
//! disturbed.

use std::sync::{Arc, RwLock};

use lici_domain::vector;
use lici_storage::{db::Db, queries, vector_text};

use crate::Result;

#[derive(Clone, Debug)]
pub struct CategoryEntry {
	pub code: String,
	pub name: String,
	pub parent_code: Option<String>,
	pub vec: Vec<f32>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CategoryMatch {
	pub code: String,
	pub name: String,
	pub similarity: f32,
	pub rank: u32,
}

#[derive(Debug, Default)]
pub struct CategoryIndex {
	entries: Vec<CategoryEntry>,
}
impl CategoryIndex {
	pub fn from_entries(entries: Vec<CategoryEntry>) -> Self {
		Self { entries }
	}

	pub async fn load(db: &Db, embedding_version: &str) -> Result<Self> {
		let rows = queries::load_categories(db, embedding_version).await?;
		let mut entries = Vec::with_capacity(rows.len());

		for row in rows {
			let vec = vector_text::parse_pg_vector(&row.vec_text)?;

			entries.push(CategoryEntry {
				code: row.code,
				name: row.name,
				parent_code: row.parent_code,
				vec,
			});
		}

		Ok(Self { entries })
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Top `k` categories by cosine similarity, descending. Equal
	/// similarities order by category code so repeated runs agree.
	pub fn nearest(&self, query: &[f32], k: usize) -> Vec<CategoryMatch> {
		if k == 0 || self.entries.is_empty() {
			return Vec::new();
		}

		let mut scored = self
			.entries
			.iter()
			.map(|entry| (vector::cosine(query, &entry.vec), entry))
			.collect::<Vec<_>>();

		scored.sort_by(|(sim_a, a), (sim_b, b)| {
			sim_b.total_cmp(sim_a).then_with(|| a.code.cmp(&b.code))
		});

		scored
			.into_iter()
			.take(k)
			.enumerate()
			.map(|(i, (similarity, entry))| CategoryMatch {
				code: entry.code.clone(),
				name: entry.name.clone(),
				similarity,
				rank: i as u32 + 1,
			})
			.collect()
	}
}

/// Read-mostly handle around the current index snapshot.
pub struct SharedCategoryIndex {
	inner: RwLock<Arc<CategoryIndex>>,
}
impl SharedCategoryIndex {
	pub fn empty() -> Self {
		Self { inner: RwLock::new(Arc::new(CategoryIndex::default())) }
	}

	pub fn snapshot(&self) -> Arc<CategoryIndex> {
		self.inner.read().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn swap(&self, index: CategoryIndex) {
		*self.inner.write().unwrap_or_else(|err| err.into_inner()) = Arc::new(index);
	}
}
