//! Search constraints and the schema that admits them.
//!
//! Both request modes run their raw arguments through [`sanitize`], which keeps
//! only recognized keys whose JSON type matches [`SCHEMA`]. Anything else is
//! dropped without complaint.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKey { Brand, Model, YearMin, YearMax, FuelType, PriceMax }

/// Expected JSON shape of a filter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
	Text,
	/// Integral numbers only; floats and booleans are rejected.
	Integer,
	/// Any JSON number, widened to `f64`.
	Number,
}

pub struct FilterField {
	pub key: FilterKey,
	pub wire: &'static str,
	pub alias: &'static str,
	pub kind: FieldKind,
}

pub const SCHEMA: &[FilterField] = &[
	FilterField { key: FilterKey::Brand, wire: "marca", alias: "brand", kind: FieldKind::Text },
	FilterField { key: FilterKey::Model, wire: "modelo", alias: "model", kind: FieldKind::Text },
	FilterField { key: FilterKey::YearMin, wire: "ano_min", alias: "year_min", kind: FieldKind::Integer },
	FilterField { key: FilterKey::YearMax, wire: "ano_max", alias: "year_max", kind: FieldKind::Integer },
	FilterField { key: FilterKey::FuelType, wire: "tipo_combustivel", alias: "fuel_type", kind: FieldKind::Text },
	FilterField { key: FilterKey::PriceMax, wire: "preco_max", alias: "price_max", kind: FieldKind::Number },
];

#[derive(Debug, Clone, PartialEq)]
enum FilterValue {
	Text(String),
	Integer(i64),
	Number(f64),
}

impl FieldKind {
	fn extract(self, value: &JsonValue) -> Option<FilterValue> {
		match (self, value) {
			(FieldKind::Text, JsonValue::String(s)) => Some(FilterValue::Text(s.clone())),
			(FieldKind::Integer, JsonValue::Number(n)) => n.as_i64().map(FilterValue::Integer),
			(FieldKind::Number, JsonValue::Number(n)) => n.as_f64().map(FilterValue::Number),
			_ => None,
		}
	}
}

/// Sanitized search constraints. `None` means unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
	#[serde(rename = "marca", default, skip_serializing_if = "Option::is_none")]
	pub brand: Option<String>,
	/// Case-insensitive substring of the model name.
	#[serde(rename = "modelo", default, skip_serializing_if = "Option::is_none")]
	pub model: Option<String>,
	#[serde(rename = "ano_min", default, skip_serializing_if = "Option::is_none")]
	pub year_min: Option<i64>,
	#[serde(rename = "ano_max", default, skip_serializing_if = "Option::is_none")]
	pub year_max: Option<i64>,
	#[serde(rename = "tipo_combustivel", default, skip_serializing_if = "Option::is_none")]
	pub fuel_type: Option<String>,
	#[serde(rename = "preco_max", default, skip_serializing_if = "Option::is_none")]
	pub price_max: Option<f64>,
}

impl FilterSet {
	pub fn is_empty(&self) -> bool { *self == Self::default() }

	fn set(&mut self, key: FilterKey, value: FilterValue) {
		match (key, value) {
			(FilterKey::Brand, FilterValue::Text(s)) => self.brand = Some(s),
			(FilterKey::Model, FilterValue::Text(s)) => self.model = Some(s),
			(FilterKey::YearMin, FilterValue::Integer(n)) => self.year_min = Some(n),
			(FilterKey::YearMax, FilterValue::Integer(n)) => self.year_max = Some(n),
			(FilterKey::FuelType, FilterValue::Text(s)) => self.fuel_type = Some(s),
			(FilterKey::PriceMax, FilterValue::Number(x)) => self.price_max = Some(x),
			_ => {}
		}
	}

	pub fn to_json(&self) -> JsonValue {
		serde_json::to_value(self).unwrap_or_else(|_| JsonValue::Object(Default::default()))
	}
}

impl fmt::Display for FilterSet {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.to_json())
	}
}

/// Builds a [`FilterSet`] from arbitrary JSON. Non-objects yield an empty set.
pub fn sanitize(raw: &JsonValue) -> FilterSet {
	let mut out = FilterSet::default();
	let Some(map) = raw.as_object() else { return out };
	for field in SCHEMA {
		let value = map.get(field.wire).and_then(|v| field.kind.extract(v))
			.or_else(|| map.get(field.alias).and_then(|v| field.kind.extract(v)));
		if let Some(v) = value {
			out.set(field.key, v);
		}
	}
	out
}
