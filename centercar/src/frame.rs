//! Length-prefixed framing: `[u32 big-endian length][payload]`.
//!
//! Shared by the server handler and the client; both sides speak exactly one
//! frame in each direction per connection.

use std::future::Future;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time;

use crate::error::FrameError;

pub const HEADER_LEN: usize = 4;

/// Upper bound for a single read call while collecting a body.
pub const CHUNK_SIZE: usize = 64 * 1024;

pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, FrameError> {
	let len = u32::try_from(payload.len()).map_err(|_| FrameError::TooLarge(payload.len()))?;
	let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
	out.extend_from_slice(&len.to_be_bytes());
	out.extend_from_slice(payload);
	Ok(out)
}

/// Payload length as a peer would see it when reading the prefix as signed.
/// `None` for zero and for anything with the high bit set.
pub fn declared_len(header: [u8; HEADER_LEN]) -> Option<usize> {
	let n = i32::from_be_bytes(header);
	if n <= 0 { None } else { Some(n as usize) }
}

/// Reads the 4-byte prefix, tolerating partial reads until EOF.
pub async fn read_header<R>(reader: &mut R) -> Result<[u8; HEADER_LEN], FrameError>
where
	R: AsyncRead + Unpin,
{
	fill_header(reader, None).await
}

/// Like [`read_header`], but every single read call must finish within
/// `per_read`.
pub async fn read_header_within<R>(reader: &mut R, per_read: Duration) -> Result<[u8; HEADER_LEN], FrameError>
where
	R: AsyncRead + Unpin,
{
	fill_header(reader, Some(per_read)).await
}

/// Collects up to `len` bytes. Stops early when the peer closes and returns
/// what arrived; a short body is the decoder's problem, not the codec's.
pub async fn read_body<R>(reader: &mut R, len: usize) -> Result<Vec<u8>, FrameError>
where
	R: AsyncRead + Unpin,
{
	collect_body(reader, len, None).await
}

/// Like [`read_body`], but a peer that stalls for longer than `per_read`
/// between chunks fails with [`FrameError::Timeout`]. A slow peer that keeps
/// sending is never cut off.
pub async fn read_body_within<R>(reader: &mut R, len: usize, per_read: Duration) -> Result<Vec<u8>, FrameError>
where
	R: AsyncRead + Unpin,
{
	collect_body(reader, len, Some(per_read)).await
}

async fn bounded<F>(read: F, per_read: Option<Duration>) -> Result<usize, FrameError>
where
	F: Future<Output = std::io::Result<usize>>,
{
	match per_read {
		Some(limit) => Ok(time::timeout(limit, read).await.map_err(|_| FrameError::Timeout(limit))??),
		None => Ok(read.await?),
	}
}

async fn fill_header<R>(reader: &mut R, per_read: Option<Duration>) -> Result<[u8; HEADER_LEN], FrameError>
where
	R: AsyncRead + Unpin,
{
	let mut header = [0u8; HEADER_LEN];
	let mut filled = 0;
	while filled < HEADER_LEN {
		let n = bounded(reader.read(&mut header[filled..]), per_read).await?;
		if n == 0 {
			return Err(FrameError::IncompleteHeader { received: filled });
		}
		filled += n;
	}
	Ok(header)
}

async fn collect_body<R>(reader: &mut R, len: usize, per_read: Option<Duration>) -> Result<Vec<u8>, FrameError>
where
	R: AsyncRead + Unpin,
{
	let mut body = Vec::with_capacity(len.min(CHUNK_SIZE));
	let mut chunk = vec![0u8; len.min(CHUNK_SIZE)];
	while body.len() < len {
		let want = (len - body.len()).min(CHUNK_SIZE);
		let n = bounded(reader.read(&mut chunk[..want]), per_read).await?;
		if n == 0 {
			break;
		}
		body.extend_from_slice(&chunk[..n]);
	}
	Ok(body)
}

/// Reads one frame. A prefix that is zero or negative as a signed integer
/// declares no payload, and nothing past the header is read.
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, FrameError>
where
	R: AsyncRead + Unpin,
{
	let header = read_header(reader).await?;
	match declared_len(header) {
		Some(len) => read_body(reader, len).await,
		None => Ok(Vec::new()),
	}
}

pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
	W: AsyncWrite + Unpin,
{
	let framed = encode_frame(payload)?;
	writer.write_all(&framed).await?;
	writer.flush().await?;
	Ok(())
}
