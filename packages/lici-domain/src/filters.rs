//! Structured filter clauses extracted by the query decomposer.
//!
//! A filter set is an ordered list of `field / op / value` triples,
//! AND-combined. Fields are allowlisted against the procurement record
//! metadata; values are typed so a malformed decomposer reply is
//! rejected instead of silently coerced.

use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

const MAX_CLAUSES: usize = 16;
const MAX_STRING_BYTES: usize = 256;

#[derive(Clone, Debug, thiserror::Error)]
#[error("{path}: {message}")]
pub struct FilterParseError {
	path: String,
	message: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterField {
	Status,
	ModalityCode,
	StateCode,
	MunicipalityCode,
	BuyerName,
	EstimatedValue,
	PublishedAt,
	OpeningDate,
	ClosingDate,
}
impl FilterField {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Status => "status",
			Self::ModalityCode => "modality_code",
			Self::StateCode => "state_code",
			Self::MunicipalityCode => "municipality_code",
			Self::BuyerName => "buyer_name",
			Self::EstimatedValue => "estimated_value",
			Self::PublishedAt => "published_at",
			Self::OpeningDate => "opening_date",
			Self::ClosingDate => "closing_date",
		}
	}

	/// Column name in the record store. Kept identical to the wire
	/// name so exported rows and filter clauses line up.
	pub fn column(&self) -> &'static str {
		self.as_str()
	}

	fn parse(path: &str, raw: &Value) -> Result<Self, FilterParseError> {
		let field = raw
			.as_str()
			.ok_or_else(|| FilterParseError {
				path: path.to_string(),
				message: "filter field must be a string.".to_string(),
			})?
			.to_ascii_lowercase();

		match field.as_str() {
			"status" => Ok(Self::Status),
			"modality_code" => Ok(Self::ModalityCode),
			"state_code" => Ok(Self::StateCode),
			"municipality_code" => Ok(Self::MunicipalityCode),
			"buyer_name" => Ok(Self::BuyerName),
			"estimated_value" => Ok(Self::EstimatedValue),
			"published_at" => Ok(Self::PublishedAt),
			"opening_date" => Ok(Self::OpeningDate),
			"closing_date" => Ok(Self::ClosingDate),
			_ => Err(FilterParseError {
				path: path.to_string(),
				message: format!(
					"field '{field}' is not in allowlist: status, modality_code, state_code, municipality_code, buyer_name, estimated_value, published_at, opening_date, closing_date",
				),
			}),
		}
	}

	fn is_textual(&self) -> bool {
		matches!(
			self,
			Self::Status
				| Self::ModalityCode
				| Self::StateCode
				| Self::MunicipalityCode
				| Self::BuyerName
		)
	}

	fn is_temporal(&self) -> bool {
		matches!(self, Self::PublishedAt | Self::OpeningDate | Self::ClosingDate)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
	Eq,
	Neq,
	Contains,
	Gt,
	Gte,
	Lt,
	Lte,
}
impl FilterOp {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Eq => "eq",
			Self::Neq => "neq",
			Self::Contains => "contains",
			Self::Gt => "gt",
			Self::Gte => "gte",
			Self::Lt => "lt",
			Self::Lte => "lte",
		}
	}

	fn parse(path: &str, raw: &Value) -> Result<Self, FilterParseError> {
		let op = raw
			.as_str()
			.ok_or_else(|| FilterParseError {
				path: path.to_string(),
				message: "filter op must be a string.".to_string(),
			})?
			.to_ascii_lowercase();

		match op.as_str() {
			"eq" => Ok(Self::Eq),
			"neq" => Ok(Self::Neq),
			"contains" => Ok(Self::Contains),
			"gt" => Ok(Self::Gt),
			"gte" => Ok(Self::Gte),
			"lt" => Ok(Self::Lt),
			"lte" => Ok(Self::Lte),
			_ => Err(FilterParseError {
				path: path.to_string(),
				message: format!("unsupported filter op '{op}'."),
			}),
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
	String(String),
	Number(f64),
	DateTime(OffsetDateTime),
}
impl FilterValue {
	pub fn to_value(&self) -> Value {
		match self {
			Self::String(value) => Value::String(value.clone()),
			Self::Number(value) => serde_json::json!(value),
			Self::DateTime(value) => Value::String(value.format(&Rfc3339).unwrap_or_default()),
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct FilterClause {
	pub field: FilterField,
	pub op: FilterOp,
	pub value: FilterValue,
}
impl FilterClause {
	pub fn to_value(&self) -> Value {
		serde_json::json!({
			"field": self.field.as_str(),
			"op": self.op.as_str(),
			"value": self.value.to_value(),
		})
	}
}

/// Parse the decomposer's `structured_filters` array. `null` and a
/// missing value both mean "no filters".
pub fn parse_filters(raw: &Value) -> Result<Vec<FilterClause>, FilterParseError> {
	let path = "$.structured_filters";

	if raw.is_null() {
		return Ok(Vec::new());
	}

	let clauses = raw.as_array().ok_or_else(|| FilterParseError {
		path: path.to_string(),
		message: "structured_filters must be an array.".to_string(),
	})?;

	if clauses.len() > MAX_CLAUSES {
		return Err(FilterParseError {
			path: path.to_string(),
			message: format!("filter list exceeds maximum size ({}/{MAX_CLAUSES}).", clauses.len()),
		});
	}

	clauses
		.iter()
		.enumerate()
		.map(|(index, clause)| parse_clause(clause, &format!("{path}[{index}]")))
		.collect()
}

fn parse_clause(raw: &Value, path: &str) -> Result<FilterClause, FilterParseError> {
	let obj = raw.as_object().ok_or_else(|| FilterParseError {
		path: path.to_string(),
		message: "filter clause must be an object.".to_string(),
	})?;
	let field = FilterField::parse(
		&format!("{path}.field"),
		obj.get("field").ok_or_else(|| FilterParseError {
			path: format!("{path}.field"),
			message: "filter clause is missing required field 'field'.".to_string(),
		})?,
	)?;
	let op = FilterOp::parse(
		&format!("{path}.op"),
		obj.get("op").ok_or_else(|| FilterParseError {
			path: format!("{path}.op"),
			message: "filter clause is missing required field 'op'.".to_string(),
		})?,
	)?;
	let value_path = format!("{path}.value");
	let value_raw = obj.get("value").ok_or_else(|| FilterParseError {
		path: value_path.clone(),
		message: "filter clause is missing required field 'value'.".to_string(),
	})?;
	let value = parse_value(&field, value_raw, &value_path)?;

	validate_combination(&field, &op, &value, path)?;

	Ok(FilterClause { field, op, value })
}

fn parse_value(
	field: &FilterField,
	raw: &Value,
	path: &str,
) -> Result<FilterValue, FilterParseError> {
	if field.is_textual() {
		let value = raw.as_str().ok_or_else(|| FilterParseError {
			path: path.to_string(),
			message: "string value expected.".to_string(),
		})?;

		if value.len() > MAX_STRING_BYTES {
			return Err(FilterParseError {
				path: path.to_string(),
				message: format!("string value exceeds maximum bytes ({MAX_STRING_BYTES})."),
			});
		}

		return Ok(FilterValue::String(value.to_string()));
	}
	if field.is_temporal() {
		let text = raw.as_str().ok_or_else(|| FilterParseError {
			path: path.to_string(),
			message: "datetime value must be an RFC3339 string.".to_string(),
		})?;

		return OffsetDateTime::parse(text, &Rfc3339).map(FilterValue::DateTime).map_err(|_| {
			FilterParseError {
				path: path.to_string(),
				message: "datetime value must be RFC3339.".to_string(),
			}
		});
	}

	let value = raw.as_f64().ok_or_else(|| FilterParseError {
		path: path.to_string(),
		message: "numeric value expected.".to_string(),
	})?;

	if !value.is_finite() {
		return Err(FilterParseError {
			path: path.to_string(),
			message: "numeric value must be finite.".to_string(),
		});
	}

	Ok(FilterValue::Number(value))
}

fn validate_combination(
	field: &FilterField,
	op: &FilterOp,
	value: &FilterValue,
	path: &str,
) -> Result<(), FilterParseError> {
	match op {
		FilterOp::Contains if !matches!(value, FilterValue::String(_)) => Err(FilterParseError {
			path: path.to_string(),
			message: "contains requires a string value.".to_string(),
		}),
		FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte
			if matches!(value, FilterValue::String(_)) =>
			Err(FilterParseError {
				path: path.to_string(),
				message: format!(
					"op '{}' is not supported for textual field '{}'.",
					op.as_str(),
					field.as_str(),
				),
			}),
		_ => Ok(()),
	}
}
