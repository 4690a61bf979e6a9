//! Interactive terminal front end.
//!
//! Asks for search criteria one question at a time, runs the search through
//! [`Search`] and prints whatever comes back.

use anyhow::Result;
use serde_json::Value as JsonValue;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::client::Search;
use crate::filters::FilterSet;

const WELCOME_BANNER: &str = "=== CenterCar ===\n";
const INTRO_MESSAGE: &str = "Hi! I'm the CenterCar assistant and I'll help you find a vehicle.\nPress Enter to skip any question.\n";
const SEPARATOR: &str = "----------------------------------------";

const PROMPT_BRAND: &str = "Which brand are you looking for?";
const PROMPT_MODEL: &str = "Which model (or part of its name) do you have in mind?";
const PROMPT_YEAR_MIN: &str = "Minimum year? (e.g. 2010)";
const PROMPT_YEAR_MAX: &str = "Maximum year? (e.g. 2023)";
const PROMPT_FUEL: &str = "Fuel type? (Gasolina, Etanol, Diesel, Elétrico, Híbrido)";
const PROMPT_PRICE_MAX: &str = "Maximum price? (numbers only)";

const PROMPT_LIST_ALL: &str = "Would you like to see every vehicle in the catalog?";
const PROMPT_AGAIN: &str = "Would you like to run another search?";

const NO_MATCH_MSG: &str = "\nSorry, no vehicle matches those criteria. Shall we try again?\n";
const EMPTY_LIST_MSG: &str = "\nNo vehicles registered.\n";
const GOODBYE_MSG: &str = "\nThanks for using CenterCar. See you next time!";

/// User spellings mapped onto the catalog's fuel values.
const FUEL_ALIASES: &[(&str, &str)] = &[
	("gasolina", "Gasolina"),
	("etanol", "Etanol"),
	("diesel", "Diesel"),
	("elétrico", "Elétrico"),
	("eletrico", "Elétrico"),
	// the catalog has no hybrid category; flex is the closest
	("hibrido", "Flex"),
	("híbrido", "Flex"),
	("flex", "Flex"),
];

pub fn normalize_fuel(input: &str) -> String {
	let key = input.trim().to_lowercase();
	FUEL_ALIASES
		.iter()
		.find(|(alias, _)| *alias == key)
		.map(|(_, canonical)| canonical.to_string())
		.unwrap_or_else(|| title_case(input.trim()))
}

/// Upper-cases the first letter of every word and lower-cases the rest.
pub fn title_case(input: &str) -> String {
	let mut out = String::with_capacity(input.len());
	let mut prev_alpha = false;
	for c in input.chars() {
		if prev_alpha { out.extend(c.to_lowercase()) } else { out.extend(c.to_uppercase()) }
		prev_alpha = c.is_alphabetic();
	}
	out
}

fn parse_year(input: &str) -> Option<i64> {
	if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
		return None;
	}
	input.parse().ok()
}

fn parse_price(input: &str) -> Option<f64> {
	input.parse::<f64>().ok().filter(|p| p.is_finite())
}

fn field(v: &JsonValue, wire: &str, alias: &str) -> String {
	match v.get(wire).or_else(|| v.get(alias)) {
		Some(JsonValue::String(s)) => s.clone(),
		Some(JsonValue::Null) | None => "-".to_string(),
		Some(other) => other.to_string(),
	}
}

fn describe(v: &JsonValue) -> String {
	format!(
		"{} {} ({}) – {}, {} km, R$ {}",
		field(v, "marca", "brand"),
		field(v, "modelo", "model"),
		field(v, "ano", "year"),
		field(v, "cor", "color"),
		field(v, "quilometragem", "mileage"),
		field(v, "preco", "price"),
	)
}

pub fn render_matches(vehicles: &[JsonValue]) -> String {
	if vehicles.is_empty() {
		return format!("{NO_MATCH_MSG}\n");
	}
	let mut out = format!("\nFound {} matching vehicle(s):\n\n", vehicles.len());
	for v in vehicles {
		out.push_str(&format!(" • {}\n", describe(v)));
	}
	out.push('\n');
	out
}

pub fn render_listing(vehicles: &[JsonValue]) -> String {
	if vehicles.is_empty() {
		return format!("{EMPTY_LIST_MSG}\n");
	}
	let mut out = format!("\nFull listing: {} vehicle(s) in the catalog:\n\n", vehicles.len());
	for v in vehicles {
		out.push_str(&format!("{}: {}\n", field(v, "id", "id"), describe(v)));
	}
	out.push('\n');
	out
}

pub struct Agent<R, W, S> {
	input: R,
	output: W,
	search: S,
}

impl<R, W, S> Agent<R, W, S>
where
	R: AsyncBufRead + Unpin,
	W: AsyncWrite + Unpin,
	S: Search,
{
	pub fn new(input: R, output: W, search: S) -> Self { Self { input, output, search } }

	pub fn into_output(self) -> W { self.output }

	/// Conversation loop; returns when the user declines another search or
	/// input runs out.
	pub async fn run(&mut self) -> Result<()> {
		self.say(WELCOME_BANNER).await?;
		loop {
			let Some(filters) = self.collect_criteria().await? else { break };
			self.say("\nSearching vehicles...\n").await?;
			let found = self.search.search(&filters).await;
			self.say(&render_matches(&found)).await?;

			if self.confirm(PROMPT_LIST_ALL).await? {
				let all = self.search.search(&FilterSet::default()).await;
				self.say(&render_listing(&all)).await?;
			}

			if !self.confirm(PROMPT_AGAIN).await? {
				self.say(&format!("{GOODBYE_MSG}\n")).await?;
				break;
			}
			self.say(&format!("\n{SEPARATOR}\n\n")).await?;
		}
		Ok(())
	}

	/// Asks every criteria question. `None` when input ends midway.
	pub async fn collect_criteria(&mut self) -> Result<Option<FilterSet>> {
		self.say(&format!("{INTRO_MESSAGE}\n")).await?;
		let mut filters = FilterSet::default();

		let Some(brand) = self.ask(PROMPT_BRAND).await? else { return Ok(None) };
		if !brand.is_empty() { filters.brand = Some(title_case(&brand)); }

		let Some(model) = self.ask(PROMPT_MODEL).await? else { return Ok(None) };
		if !model.is_empty() { filters.model = Some(title_case(&model)); }

		let Some(year_min) = self.ask(PROMPT_YEAR_MIN).await? else { return Ok(None) };
		filters.year_min = parse_year(&year_min);

		let Some(year_max) = self.ask(PROMPT_YEAR_MAX).await? else { return Ok(None) };
		filters.year_max = parse_year(&year_max);

		let Some(fuel) = self.ask(PROMPT_FUEL).await? else { return Ok(None) };
		if !fuel.is_empty() { filters.fuel_type = Some(normalize_fuel(&fuel)); }

		let Some(price) = self.ask(PROMPT_PRICE_MAX).await? else { return Ok(None) };
		filters.price_max = parse_price(&price);

		Ok(Some(filters))
	}

	/// Yes only for `y` or `s`; end of input counts as no.
	pub async fn confirm(&mut self, question: &str) -> Result<bool> {
		let answer = self.ask(&format!("{question} (y/N)")).await?;
		Ok(matches!(answer.as_deref().map(str::to_lowercase).as_deref(), Some("y") | Some("s")))
	}

	async fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
		self.say(&format!("{prompt} ")).await?;
		let mut line = String::new();
		if self.input.read_line(&mut line).await? == 0 {
			return Ok(None);
		}
		Ok(Some(line.trim().to_string()))
	}

	async fn say(&mut self, text: &str) -> Result<()> {
		self.output.write_all(text.as_bytes()).await?;
		self.output.flush().await?;
		Ok(())
	}
}
