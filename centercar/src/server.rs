//! Accept loop and per-connection handler.
//!
//! Each connection carries exactly one request and one reply. There is no
//! cap on concurrent connections: every accepted socket gets its own task.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value as JsonValue;
use tokio::io::{self, AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::{task, time};
use tracing::{debug, error, info, warn};

use crate::catalog::{Catalog, CatalogSession};
use crate::envelope::{ErrorCode, Mode, Reply, Request};
use crate::error::FrameError;
use crate::filters::FilterSet;
use crate::frame;
use crate::vehicle::Vehicle;

/// Bound on each read call while receiving a request.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// How long input left unread after a no-payload request is drained.
const LINGER: Duration = Duration::from_secs(1);

pub struct Server<C> {
	listener: TcpListener,
	catalog: Arc<C>,
}

impl<C: Catalog> Server<C> {
	pub async fn bind(addr: SocketAddr, catalog: C) -> Result<Self> {
		let listener = TcpListener::bind(addr).await?;
		Ok(Self { listener, catalog: Arc::new(catalog) })
	}

	pub fn local_addr(&self) -> Result<SocketAddr> { Ok(self.listener.local_addr()?) }

	/// Serves until `shutdown` resolves. In-flight connections keep running.
	pub async fn run_until<F>(self, shutdown: F) -> Result<()>
	where
		F: Future<Output = ()>,
	{
		let addr = self.local_addr()?;
		info!(%addr, "catalog server listening");
		tokio::pin!(shutdown);
		loop {
			tokio::select! {
				_ = &mut shutdown => {
					info!("Shutdown signal received");
					return Ok(());
				}
				accepted = self.listener.accept() => match accepted {
					Ok((stream, peer)) => {
						let catalog = self.catalog.clone();
						task::spawn(async move { serve_tcp(stream, peer, catalog).await });
					}
					Err(e) => {
						warn!(error = %e, "accept failed");
						time::sleep(Duration::from_millis(50)).await;
					}
				},
			}
		}
	}

	pub async fn run(self) -> Result<()> {
		self.run_until(std::future::pending()).await
	}
}

async fn serve_tcp<C: Catalog>(stream: TcpStream, peer: SocketAddr, catalog: Arc<C>) {
	let _ = stream.set_nodelay(true);
	handle_connection(stream, peer, catalog).await;
}

/// Runs one request/reply exchange and closes the stream.
///
/// A missing or truncated header, or a read timeout, closes the stream
/// without writing anything. A prefix declaring no payload is answered as an
/// empty body.
pub async fn handle_connection<S, C>(mut stream: S, peer: SocketAddr, catalog: Arc<C>)
where
	S: AsyncRead + AsyncWrite + Unpin,
	C: Catalog,
{
	let (body, declared) = match read_request(&mut stream).await {
		Ok(Some(body)) => (body, true),
		Ok(None) => {
			debug!(%peer, "frame declares no payload");
			(Vec::new(), false)
		}
		Err(e) => {
			debug!(%peer, error = %e, "dropping connection without reply");
			return;
		}
	};

	let reply = respond(&body, peer, catalog).await;
	let bytes = match reply.to_bytes() {
		Ok(b) => b,
		Err(e) => {
			error!(%peer, error = %e, "failed to encode reply");
			return;
		}
	};
	if let Err(e) = frame::write_frame(&mut stream, &bytes).await {
		warn!(%peer, error = %e, "failed to send reply");
		return;
	}
	let _ = stream.shutdown().await;
	if !declared {
		// unread input would turn the close into a reset and lose the reply
		let _ = time::timeout(LINGER, io::copy(&mut stream, &mut io::sink())).await;
	}
}

/// Header plus body, each read call bounded by [`READ_TIMEOUT`]. `None` when
/// the prefix declares no payload.
async fn read_request<S>(stream: &mut S) -> Result<Option<Vec<u8>>, FrameError>
where
	S: AsyncRead + Unpin,
{
	let header = frame::read_header_within(stream, READ_TIMEOUT).await?;
	match frame::declared_len(header) {
		Some(len) => Ok(Some(frame::read_body_within(stream, len, READ_TIMEOUT).await?)),
		None => Ok(None),
	}
}

/// Decodes, validates and resolves one request body.
pub async fn respond<C: Catalog>(body: &[u8], peer: SocketAddr, catalog: Arc<C>) -> Reply {
	let value: JsonValue = match serde_json::from_slice(body) {
		Ok(v) => v,
		Err(e) => {
			debug!(%peer, error = %e, "malformed request body");
			return Reply::failure(ErrorCode::InvalidJson, format!("malformed JSON: {e}"));
		}
	};

	let request = Request::classify(value);
	let mode = request.mode();
	let filters = match request.into_filters() {
		Ok(f) => f,
		Err(err) => {
			info!(%peer, %mode, code = %err.code, "rejected request");
			return Reply::Failure(err);
		}
	};
	info!(%peer, %mode, %filters, "search request");

	match (mode, resolve(catalog, filters).await) {
		(Mode::Envelope, Ok(found)) => Reply::Success(found),
		(Mode::Envelope, Err(e)) => {
			let message = format!("{e:#}");
			error!(%peer, error = %message, "search failed");
			Reply::failure(ErrorCode::ServerError, message)
		}
		(Mode::Legacy, Ok(found)) => Reply::Legacy(found),
		(Mode::Legacy, Err(e)) => {
			// legacy peers have no error shape; they get an empty list
			error!(%peer, error = ?e, "legacy search failed");
			Reply::Legacy(Vec::new())
		}
	}
}

/// Runs the catalog lookup on the blocking pool with a fresh session.
async fn resolve<C: Catalog>(catalog: Arc<C>, filters: FilterSet) -> Result<Vec<Vehicle>> {
	let joined = task::spawn_blocking(move || {
		let session = catalog.session()?;
		session.find(&filters)
	})
	.await;
	match joined {
		Ok(found) => found,
		Err(e) => Err(anyhow::anyhow!("catalog lookup aborted: {e}")),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::SledCatalog;
	use crate::vehicle::NewVehicle;
	use serde_json::json;
	use tokio::io::AsyncReadExt;

	fn peer() -> SocketAddr { "127.0.0.1:12345".parse().unwrap() }

	fn car(brand: &str, model: &str, year: i64) -> NewVehicle {
		NewVehicle {
			brand: brand.into(),
			model: model.into(),
			year,
			engine: "1.0".into(),
			fuel_type: "Etanol".into(),
			color: "Azul".into(),
			mileage: 12345.6,
			door_count: 4,
			transmission: "Automático".into(),
			price: 98765.43,
		}
	}

	fn catalog() -> Arc<SledCatalog> {
		let cat = SledCatalog::temporary().unwrap();
		cat.insert(car("Jeep", "Alpha", 2021)).unwrap();
		cat.insert(car("Ford", "Beta", 2020)).unwrap();
		Arc::new(cat)
	}

	struct Broken;
	struct BrokenSession;

	impl Catalog for Broken {
		type Session = BrokenSession;
		fn session(&self) -> Result<BrokenSession> { Ok(BrokenSession) }
	}

	impl CatalogSession for BrokenSession {
		fn find(&self, _: &FilterSet) -> Result<Vec<Vehicle>> { Err(anyhow::anyhow!("database is locked")) }
	}

	async fn exchange<C: Catalog>(raw: Vec<u8>, catalog: Arc<C>) -> Vec<u8> {
		let (mut client, server) = tokio::io::duplex(1 << 16);
		let handler = tokio::spawn(handle_connection(server, peer(), catalog));
		client.write_all(&raw).await.unwrap();
		let mut out = Vec::new();
		client.read_to_end(&mut out).await.unwrap();
		handler.await.unwrap();
		out
	}

	async fn exchange_json<C: Catalog>(req: JsonValue, catalog: Arc<C>) -> JsonValue {
		let raw = frame::encode_frame(&serde_json::to_vec(&req).unwrap()).unwrap();
		let out = exchange(raw, catalog).await;
		let len = u32::from_be_bytes(out[..4].try_into().unwrap()) as usize;
		assert_eq!(len, out.len() - 4);
		serde_json::from_slice(&out[4..]).unwrap()
	}

	#[tokio::test]
	async fn envelope_search_filters_results() {
		let reply = exchange_json(json!({ "tool": "search_cars", "args": { "marca": "Jeep", "ano_min": 2020 } }), catalog()).await;
		assert_eq!(reply["ok"], true);
		let result = reply["result"].as_array().unwrap();
		assert_eq!(result.len(), 1);
		assert_eq!(result[0]["marca"], "Jeep");
		assert_eq!(result[0]["modelo"], "Alpha");
		assert_eq!(result[0]["ano"], 2021);
		for key in ["id", "cor", "quilometragem", "preco", "numero_portas", "transmissao", "tipo_combustivel"] {
			assert!(result[0].get(key).is_some(), "missing {key}");
		}
	}

	#[tokio::test]
	async fn unknown_tool() {
		let reply = exchange_json(json!({ "tool": "xpto", "args": {} }), catalog()).await;
		assert_eq!(reply["ok"], false);
		assert_eq!(reply["error"]["code"], "UNKNOWN_TOOL");
	}

	#[tokio::test]
	async fn args_must_be_object() {
		let reply = exchange_json(json!({ "tool": "search_cars", "args": "marca=Jeep" }), catalog()).await;
		assert_eq!(reply["ok"], false);
		assert_eq!(reply["error"]["code"], "INVALID_REQUEST");
	}

	#[tokio::test]
	async fn malformed_json() {
		let raw = frame::encode_frame(b"{not json").unwrap();
		let out = exchange(raw, catalog()).await;
		let reply: JsonValue = serde_json::from_slice(&out[4..]).unwrap();
		assert_eq!(reply["ok"], false);
		assert_eq!(reply["error"]["code"], "INVALID_JSON");
	}

	#[tokio::test]
	async fn zero_length_body_is_invalid_json() {
		let out = exchange(vec![0, 0, 0, 0], catalog()).await;
		let reply: JsonValue = serde_json::from_slice(&out[4..]).unwrap();
		assert_eq!(reply["error"]["code"], "INVALID_JSON");
	}

	#[tokio::test]
	async fn truncated_body_is_invalid_json() {
		let mut raw = vec![0, 0, 0, 50];
		raw.extend_from_slice(br#"{"tool":"sea"#);
		let (mut client, server) = tokio::io::duplex(1024);
		let handler = tokio::spawn(handle_connection(server, peer(), catalog()));
		client.write_all(&raw).await.unwrap();
		client.shutdown().await.unwrap();
		let mut out = Vec::new();
		client.read_to_end(&mut out).await.unwrap();
		handler.await.unwrap();
		let reply: JsonValue = serde_json::from_slice(&out[4..]).unwrap();
		assert_eq!(reply["error"]["code"], "INVALID_JSON");
	}

	#[tokio::test]
	async fn short_header_gets_no_reply() {
		let (mut client, server) = tokio::io::duplex(64);
		let handler = tokio::spawn(handle_connection(server, peer(), catalog()));
		client.write_all(&[0, 0]).await.unwrap();
		client.shutdown().await.unwrap();
		let mut out = Vec::new();
		client.read_to_end(&mut out).await.unwrap();
		handler.await.unwrap();
		assert!(out.is_empty());
	}

	#[tokio::test]
	async fn legacy_request_gets_bare_array() {
		let reply = exchange_json(json!({ "marca": "Ford" }), catalog()).await;
		let list = reply.as_array().unwrap();
		assert_eq!(list.len(), 1);
		assert_eq!(list[0]["modelo"], "Beta");

		let reply = exchange_json(json!("whatever"), catalog()).await;
		assert_eq!(reply.as_array().unwrap().len(), 2);
	}

	#[tokio::test]
	async fn catalog_failure_is_server_error() {
		let reply = exchange_json(json!({ "tool": "search_cars", "args": {} }), Arc::new(Broken)).await;
		assert_eq!(reply["ok"], false);
		assert_eq!(reply["error"]["code"], "SERVER_ERROR");
		assert_eq!(reply["error"]["message"], "database is locked");
	}

	#[tokio::test]
	async fn catalog_failure_in_legacy_mode_is_empty_list() {
		let reply = exchange_json(json!({ "marca": "Jeep" }), Arc::new(Broken)).await;
		assert_eq!(reply, json!([]));
	}

	#[tokio::test]
	async fn negative_length_prefix_is_invalid_json() {
		let mut raw = vec![0x80, 0, 0, 0];
		raw.extend_from_slice(br#"{"marca":"Jeep"}"#);
		let (mut client, server) = tokio::io::duplex(1024);
		let handler = tokio::spawn(handle_connection(server, peer(), catalog()));
		client.write_all(&raw).await.unwrap();
		client.shutdown().await.unwrap();
		let mut out = Vec::new();
		client.read_to_end(&mut out).await.unwrap();
		handler.await.unwrap();
		let reply: JsonValue = serde_json::from_slice(&out[4..]).unwrap();
		assert_eq!(reply["ok"], false);
		assert_eq!(reply["error"]["code"], "INVALID_JSON");
	}

	#[tokio::test(start_paused = true)]
	async fn silent_peer_times_out() {
		let (mut client, server) = tokio::io::duplex(64);
		let handler = tokio::spawn(handle_connection(server, peer(), catalog()));
		time::advance(READ_TIMEOUT + Duration::from_secs(1)).await;
		handler.await.unwrap();
		let mut out = Vec::new();
		client.read_to_end(&mut out).await.unwrap();
		assert!(out.is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn stalled_body_gets_no_reply() {
		let (mut client, server) = tokio::io::duplex(64);
		let handler = tokio::spawn(handle_connection(server, peer(), catalog()));
		client.write_all(&[0, 0, 0, 40, b'{']).await.unwrap();
		handler.await.unwrap();
		let mut out = Vec::new();
		client.read_to_end(&mut out).await.unwrap();
		assert!(out.is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn slow_request_that_keeps_arriving_is_served() {
		let raw = frame::encode_frame(&serde_json::to_vec(&json!({ "tool": "search_cars", "args": {} })).unwrap()).unwrap();
		let (mut client, server) = tokio::io::duplex(1024);
		let handler = tokio::spawn(handle_connection(server, peer(), catalog()));
		for piece in raw.chunks(8) {
			client.write_all(piece).await.unwrap();
			time::sleep(READ_TIMEOUT - Duration::from_secs(1)).await;
		}
		let mut out = Vec::new();
		client.read_to_end(&mut out).await.unwrap();
		handler.await.unwrap();
		let reply: JsonValue = serde_json::from_slice(&out[4..]).unwrap();
		assert_eq!(reply["result"].as_array().unwrap().len(), 2);
	}
}
