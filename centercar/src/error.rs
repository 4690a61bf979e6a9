//! Failure taxonomies for the wire layer.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the framing codec.
#[derive(Error, Debug)]
pub enum FrameError {
	/// Fewer than four header bytes arrived before the peer closed.
	#[error("incomplete frame header: got {received} of 4 bytes")]
	IncompleteHeader { received: usize },

	/// Payload does not fit the 32-bit length prefix.
	#[error("payload of {0} bytes exceeds the frame limit")]
	TooLarge(usize),

	#[error("timed out after {0:?}")]
	Timeout(Duration),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
}

/// Everything that can go wrong inside a client query.
///
/// None of these reach the caller of [`crate::client::CatalogClient::query`]; they only
/// feed the debug log before collapsing into an empty result.
#[derive(Error, Debug)]
pub enum QueryError {
	#[error("connection to {addr} failed: {source}")]
	Connect { addr: String, source: std::io::Error },

	#[error("timed out after {0:?}")]
	Timeout(Duration),

	#[error("frame error: {0}")]
	Frame(#[from] FrameError),

	#[error("response declared no payload")]
	EmptyPayload,

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("server rejected request ({code}): {message}")]
	Rejected { code: String, message: String },

	#[error("unexpected response shape: {0}")]
	UnexpectedShape(&'static str),
}

impl QueryError {
	pub fn connect(addr: impl ToString, source: std::io::Error) -> Self {
		Self::Connect { addr: addr.to_string(), source }
	}
}
