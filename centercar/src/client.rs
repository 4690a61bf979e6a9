//! Client side of the search protocol.
//!
//! [`CatalogClient::query`] never fails. Transport problems, rejected
//! requests and odd replies all come back as an empty list; the reason is only
//! visible in the debug log.

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time;
use tracing::debug;

use crate::envelope;
use crate::error::QueryError;
use crate::filters::FilterSet;
use crate::frame;

/// Bound for connecting and, separately, for the whole exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Records as the server sent them. Legacy peers may send partial records,
/// so nothing is reshaped on the way in.
pub type Records = Vec<JsonValue>;

/// Anything that can answer a search; the terminal agent only needs this.
#[allow(async_fn_in_trait)]
pub trait Search {
	async fn search(&self, filters: &FilterSet) -> Records;
}

#[derive(Debug, Clone)]
pub struct CatalogClient {
	addr: SocketAddr,
	timeout: Duration,
}

impl CatalogClient {
	pub fn new(addr: SocketAddr) -> Self { Self { addr, timeout: DEFAULT_TIMEOUT } }

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	pub async fn query(&self, filters: &FilterSet) -> Records {
		match self.try_query(filters).await {
			Ok(records) => records,
			Err(e) => {
				debug!(addr = %self.addr, error = %e, "query failed, returning no results");
				Vec::new()
			}
		}
	}

	pub async fn try_query(&self, filters: &FilterSet) -> Result<Records, QueryError> {
		let payload = serde_json::to_vec(&envelope::search_request(filters))?;
		let mut stream = time::timeout(self.timeout, TcpStream::connect(self.addr))
			.await
			.map_err(|_| QueryError::Timeout(self.timeout))?
			.map_err(|e| QueryError::connect(self.addr, e))?;
		let body = time::timeout(self.timeout, exchange(&mut stream, &payload))
			.await
			.map_err(|_| QueryError::Timeout(self.timeout))??;
		interpret(serde_json::from_slice(&body)?)
	}
}

impl Search for CatalogClient {
	async fn search(&self, filters: &FilterSet) -> Records { self.query(filters).await }
}

/// Sends one framed request and reads one framed reply.
pub async fn exchange<S>(stream: &mut S, payload: &[u8]) -> Result<Vec<u8>, QueryError>
where
	S: AsyncRead + AsyncWrite + Unpin,
{
	frame::write_frame(stream, payload).await?;
	let header = frame::read_header(stream).await?;
	let len = frame::declared_len(header).ok_or(QueryError::EmptyPayload)?;
	Ok(frame::read_body(stream, len).await?)
}

/// Maps a decoded reply onto the records it carries.
///
/// `{"ok": true, "result": [..]}` and a bare array are the only shapes that
/// yield records.
pub fn interpret(reply: JsonValue) -> Result<Records, QueryError> {
	match reply {
		JsonValue::Array(records) => Ok(records),
		JsonValue::Object(mut map) => {
			if map.get("ok") != Some(&JsonValue::Bool(true)) {
				let error = map.get("error");
				let field = |k: &str| {
					error.and_then(|e| e.get(k)).and_then(JsonValue::as_str).unwrap_or_default().to_string()
				};
				return Err(QueryError::Rejected { code: field("code"), message: field("message") });
			}
			match map.remove("result") {
				Some(JsonValue::Array(records)) => Ok(records),
				_ => Err(QueryError::UnexpectedShape("result is not an array")),
			}
		}
		_ => Err(QueryError::UnexpectedShape("neither an object nor an array")),
	}
}
