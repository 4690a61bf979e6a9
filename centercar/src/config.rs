use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_DB_PATH: &str = "./centercar.db";

/// Process-wide settings, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
	pub addr: SocketAddr,
	pub db_path: PathBuf,
}

impl Config {
	/// Environment first (`.env` included), built-in defaults otherwise.
	pub fn load() -> anyhow::Result<Self> {
		let _ = dotenvy::dotenv();
		let host = env_any(&["CENTERCAR_HOST"]).unwrap_or_else(|| DEFAULT_HOST.to_string());
		let port = match env_any(&["CENTERCAR_PORT", "CENTERCAR_PORTA"]) {
			Some(p) => p.parse::<u16>().with_context(|| format!("invalid port {p:?}"))?,
			None => DEFAULT_PORT,
		};
		let db_path = env_any(&["CENTERCAR_DB", "CENTERCAR_BD"]).unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
		Ok(Self { addr: resolve_addr(&host, port)?, db_path: PathBuf::from(db_path) })
	}

	/// Applies command-line overrides on top of the loaded values.
	pub fn with_overrides(mut self, host: Option<&str>, port: Option<u16>, db_path: Option<PathBuf>) -> anyhow::Result<Self> {
		if host.is_some() || port.is_some() {
			let host = host.map(str::to_string).unwrap_or_else(|| self.addr.ip().to_string());
			self.addr = resolve_addr(&host, port.unwrap_or(self.addr.port()))?;
		}
		if let Some(p) = db_path { self.db_path = p; }
		Ok(self)
	}
}

fn env_any(keys: &[&str]) -> Option<String> {
	keys.iter().find_map(|k| std::env::var(k).ok().filter(|v| !v.trim().is_empty()))
}

fn resolve_addr(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
	use std::net::ToSocketAddrs;
	(host, port)
		.to_socket_addrs()
		.with_context(|| format!("cannot resolve {host}:{port}"))?
		.next()
		.with_context(|| format!("no address for {host}:{port}"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn overrides_replace_only_given_parts() {
		let base = Config { addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)), db_path: PathBuf::from(DEFAULT_DB_PATH) };
		let cfg = base.with_overrides(None, Some(6001), None).unwrap();
		assert_eq!(cfg.addr, "127.0.0.1:6001".parse().unwrap());
		assert_eq!(cfg.db_path, PathBuf::from(DEFAULT_DB_PATH));

		let cfg = cfg.with_overrides(Some("0.0.0.0"), None, Some(PathBuf::from("/tmp/cars.db"))).unwrap();
		assert_eq!(cfg.addr, "0.0.0.0:6001".parse().unwrap());
		assert_eq!(cfg.db_path, PathBuf::from("/tmp/cars.db"));
	}

	#[test]
	fn localhost_resolves() {
		let addr = resolve_addr("localhost", 5000).unwrap();
		assert_eq!(addr.port(), 5000);
		assert!(addr.ip().is_loopback());
	}
}
