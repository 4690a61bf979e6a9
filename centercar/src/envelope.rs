//! Request classification and reply shapes for both protocol modes.
//!
//! Envelope mode: `{"tool": "search_cars", "args": {..}}` answered with
//! `{"ok": true, "result": [..]}` or `{"ok": false, "error": {code, message}}`.
//! Legacy mode: a bare filter object answered with a bare array.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::filters::{sanitize, FilterSet};
use crate::vehicle::Vehicle;

/// The only tool this server knows.
pub const TOOL_NAME: &str = "search_cars";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	InvalidJson,
	UnknownTool,
	InvalidRequest,
	ServerError,
}

impl ErrorCode {
	pub fn as_str(self) -> &'static str {
		match self {
			ErrorCode::InvalidJson => "INVALID_JSON",
			ErrorCode::UnknownTool => "UNKNOWN_TOOL",
			ErrorCode::InvalidRequest => "INVALID_REQUEST",
			ErrorCode::ServerError => "SERVER_ERROR",
		}
	}
}

impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
	pub code: ErrorCode,
	pub message: String,
}

impl ErrorBody {
	pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
		Self { code, message: message.into() }
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
	Envelope,
	Legacy,
}

impl fmt::Display for Mode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self { Mode::Envelope => "mcp", Mode::Legacy => "legacy" })
	}
}

/// A decoded request, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
	Envelope { tool: JsonValue, args: JsonValue },
	Legacy(JsonValue),
}

impl Request {
	/// An object carrying both `tool` and `args` is an envelope; anything else
	/// is a legacy filter request.
	pub fn classify(value: JsonValue) -> Self {
		match value {
			JsonValue::Object(mut map) if map.contains_key("tool") && map.contains_key("args") => {
				let tool = map.remove("tool").unwrap_or(JsonValue::Null);
				let args = map.remove("args").unwrap_or(JsonValue::Null);
				Request::Envelope { tool, args }
			}
			other => Request::Legacy(other),
		}
	}

	pub fn mode(&self) -> Mode {
		match self { Request::Envelope { .. } => Mode::Envelope, Request::Legacy(_) => Mode::Legacy }
	}

	/// Validates the request and extracts its filters.
	///
	/// Legacy requests never fail: a non-object body just means no filters.
	pub fn into_filters(self) -> Result<FilterSet, ErrorBody> {
		match self {
			Request::Envelope { tool, args } => {
				if tool.as_str() != Some(TOOL_NAME) {
					let name = match &tool { JsonValue::String(s) => s.clone(), other => other.to_string() };
					return Err(ErrorBody::new(ErrorCode::UnknownTool, format!("Tool '{name}' is not supported")));
				}
				if !args.is_object() {
					return Err(ErrorBody::new(ErrorCode::InvalidRequest, "'args' must be an object"));
				}
				Ok(sanitize(&args))
			}
			Request::Legacy(raw) => Ok(sanitize(&raw)),
		}
	}
}

/// What the server writes back, exactly once per connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
	Success(Vec<Vehicle>),
	Failure(ErrorBody),
	Legacy(Vec<Vehicle>),
}

impl Reply {
	pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
		Reply::Failure(ErrorBody::new(code, message))
	}

	pub fn to_json(&self) -> JsonValue {
		match self {
			Reply::Success(records) => json!({ "ok": true, "result": records }),
			Reply::Failure(err) => json!({ "ok": false, "error": err }),
			Reply::Legacy(records) => json!(records),
		}
	}

	pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
		serde_json::to_vec(&self.to_json())
	}
}

/// The envelope a client sends for a search.
pub fn search_request(filters: &FilterSet) -> JsonValue {
	json!({ "tool": TOOL_NAME, "args": filters })
}
