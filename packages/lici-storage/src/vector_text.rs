//! Text-form pgvector encoding.
//!
//! Vectors cross the wire as `[f32,f32,…]` literals cast with `::text::vector`
//! so queries stay plain SQL with string binds.

use crate::{Error, Result};

pub fn vector_to_pg(vec: &[f32]) -> String {
	let mut out = String::with_capacity(vec.len() * 8);
	out.push('[');

	for (i, value) in vec.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}
		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

pub fn parse_pg_vector(text: &str) -> Result<Vec<f32>> {
	let trimmed = text.trim();
	let without_brackets = trimmed
		.strip_prefix('[')
		.and_then(|s| s.strip_suffix(']'))
		.ok_or_else(|| Error::InvalidArgument("Vector text is not bracketed.".to_string()))?;

	if without_brackets.trim().is_empty() {
		return Ok(Vec::new());
	}

	let mut vec = Vec::new();

	for part in without_brackets.split(',') {
		let value = part.trim().parse::<f32>().map_err(|_| {
			Error::InvalidArgument(format!("Vector component is not a number: {part}."))
		})?;

		vec.push(value);
	}

	Ok(vec)
}
