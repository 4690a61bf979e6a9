use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::BufReader;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use centercar::agent::Agent;
use centercar::catalog::SledCatalog;
use centercar::client::CatalogClient;
use centercar::config::Config;
use centercar::seed;
use centercar::server::Server;

#[derive(Parser, Debug)]
#[command(name = "centercar", version, about = "Vehicle catalog server and terminal search agent")]
struct Cli {
	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Run only the catalog server
	Serve(Endpoint),
	/// Run only the terminal agent against a running server
	Agent(Endpoint),
	/// Run the server in the background and the agent in the foreground
	All(Endpoint),
	/// Fill the catalog with fake vehicles
	Seed {
		/// Number of vehicles to insert
		#[arg(default_value_t = seed::DEFAULT_COUNT)]
		count: usize,
		/// Catalog database path
		#[arg(long, env = "CENTERCAR_DB")]
		db: Option<PathBuf>,
	},
}

#[derive(Args, Debug)]
struct Endpoint {
	/// Server host
	#[arg(long, env = "CENTERCAR_HOST")]
	host: Option<String>,
	/// Server port
	#[arg(long, env = "CENTERCAR_PORT")]
	port: Option<u16>,
	/// Catalog database path (server side)
	#[arg(long, env = "CENTERCAR_DB")]
	db: Option<PathBuf>,
}

impl Endpoint {
	fn config(self, base: Config) -> Result<Config> {
		base.with_overrides(self.host.as_deref(), self.port, self.db)
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	init_tracing();
	let env_cfg = Config::load()?;
	let cli = Cli::parse();

	match cli.command {
		Command::Serve(ep) => {
			let cfg = ep.config(env_cfg)?;
			let server = Server::bind(cfg.addr, open_catalog(&cfg)?).await?;
			server.run_until(shutdown_signal()).await
		}
		Command::Agent(ep) => {
			let cfg = ep.config(env_cfg)?;
			run_agent(CatalogClient::new(cfg.addr)).await
		}
		Command::All(ep) => {
			let cfg = ep.config(env_cfg)?;
			// bound before the agent starts, so its first query cannot race the listener
			let server = Server::bind(cfg.addr, open_catalog(&cfg)?).await?;
			let addr = server.local_addr()?;
			let server_task = tokio::spawn(server.run());
			let result = run_agent(CatalogClient::new(addr)).await;
			server_task.abort();
			result
		}
		Command::Seed { count, db } => {
			let cfg = env_cfg.with_overrides(None, None, db)?;
			let catalog = open_catalog(&cfg)?;
			let written = seed::populate(&catalog, count, &mut rand::thread_rng())?;
			println!("{written} vehicles inserted.");
			Ok(())
		}
	}
}

fn init_tracing() {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	// stderr only; stdout belongs to the terminal agent
	let fmt_layer = fmt::layer().with_target(false).with_ansi(false).with_writer(std::io::stderr);
	tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();
}

fn open_catalog(cfg: &Config) -> Result<SledCatalog> {
	let catalog = SledCatalog::open(&cfg.db_path)
		.with_context(|| format!("cannot open catalog {}", cfg.db_path.display()))?;
	info!(path = %cfg.db_path.display(), vehicles = catalog.count(), "catalog opened");
	Ok(catalog)
}

async fn run_agent(client: CatalogClient) -> Result<()> {
	let input = BufReader::new(tokio::io::stdin());
	let mut agent = Agent::new(input, tokio::io::stdout(), client);
	agent.run().await
}

async fn shutdown_signal() {
	let _ = signal::ctrl_c().await;
}
