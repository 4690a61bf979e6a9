//! Fake inventory for demos and manual testing.

use anyhow::Result;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::catalog::SledCatalog;
use crate::vehicle::NewVehicle;

pub const DEFAULT_COUNT: usize = 100;
const FLUSH_INTERVAL: usize = 50;

const BRANDS: &[&str] = &["Ford", "Chevrolet", "Toyota", "Honda", "Volkswagen", "BMW", "Jeep", "Jaguar"];
const FUELS: &[&str] = &["Gasolina", "Etanol", "Diesel", "Flex", "Elétrico"];
const TRANSMISSIONS: &[&str] = &["Manual", "Automática", "CVT"];
const DOOR_COUNTS: &[i64] = &[2, 4, 5];
const COLORS: &[&str] = &[
	"Azul", "Preto", "Branco", "Prata", "Vermelho", "Cinza", "Verde", "Amarelo", "Marrom", "Bege", "Laranja", "Vinho",
];
const MODEL_WORDS: &[&str] = &[
	"alpha", "beta", "gamma", "delta", "sigma", "omega", "aurora", "brisa", "cometa", "duna", "eclipse", "falcao",
	"galaxia", "horizonte", "ipanema", "jade", "kappa", "lince", "marea", "nimbus", "orion", "pampa", "quasar",
	"rota", "savana", "tempesta", "urbano", "vento", "zenite", "atlas", "bora", "cerrado", "estrada", "fenix",
];

/// Hands out each model name once, then repeats at random.
struct ModelNames {
	pool: Vec<&'static str>,
}

impl ModelNames {
	fn new<R: Rng>(rng: &mut R) -> Self {
		let mut pool = MODEL_WORDS.to_vec();
		pool.shuffle(rng);
		Self { pool }
	}

	fn next<R: Rng>(&mut self, rng: &mut R) -> String {
		let word = self.pool.pop().unwrap_or_else(|| MODEL_WORDS[rng.gen_range(0..MODEL_WORDS.len())]);
		crate::agent::title_case(word)
	}
}

fn pick<T: Copy, R: Rng>(rng: &mut R, items: &[T]) -> T {
	items[rng.gen_range(0..items.len())]
}

fn round2(x: f64) -> f64 { (x * 100.0).round() / 100.0 }

pub fn random_vehicle<R: Rng>(rng: &mut R, model: String) -> NewVehicle {
	NewVehicle {
		brand: pick(rng, BRANDS).to_string(),
		model,
		year: rng.gen_range(2000..=2025),
		engine: format!("{}.0", rng.gen_range(1..=4)),
		fuel_type: pick(rng, FUELS).to_string(),
		color: pick(rng, COLORS).to_string(),
		mileage: round2(rng.gen_range(0.0..=200_000.0)),
		door_count: pick(rng, DOOR_COUNTS),
		transmission: pick(rng, TRANSMISSIONS).to_string(),
		price: round2(rng.gen_range(10_000.0..=300_000.0)),
	}
}

/// Inserts `count` random vehicles and returns how many were written.
pub fn populate<R: Rng>(catalog: &SledCatalog, count: usize, rng: &mut R) -> Result<usize> {
	let mut names = ModelNames::new(rng);
	for i in 0..count {
		let model = names.next(rng);
		catalog.insert(random_vehicle(rng, model))?;
		if (i + 1) % FLUSH_INTERVAL == 0 {
			catalog.flush()?;
		}
	}
	catalog.flush()?;
	info!(count, total = catalog.count(), "seeded catalog");
	Ok(count)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::{Catalog, CatalogSession};
	use crate::filters::FilterSet;
	use rand::rngs::StdRng;
	use rand::SeedableRng;
	use std::collections::HashSet;

	#[test]
	fn vehicles_stay_in_range() {
		let mut rng = StdRng::seed_from_u64(7);
		for _ in 0..200 {
			let v = random_vehicle(&mut rng, "Alpha".into());
			assert!(BRANDS.contains(&v.brand.as_str()));
			assert!(FUELS.contains(&v.fuel_type.as_str()));
			assert!((2000..=2025).contains(&v.year));
			assert!((0.0..=200_000.0).contains(&v.mileage));
			assert!((10_000.0..=300_000.0).contains(&v.price));
			assert!(DOOR_COUNTS.contains(&v.door_count));
			assert_eq!(round2(v.price), v.price);
		}
	}

	#[test]
	fn model_names_unique_until_pool_runs_out() {
		let mut rng = StdRng::seed_from_u64(1);
		let mut names = ModelNames::new(&mut rng);
		let first: HashSet<String> = (0..MODEL_WORDS.len()).map(|_| names.next(&mut rng)).collect();
		assert_eq!(first.len(), MODEL_WORDS.len());
		// exhausted pool still yields names
		assert!(!names.next(&mut rng).is_empty());
	}

	#[test]
	fn populate_writes_requested_count() {
		let cat = SledCatalog::temporary().unwrap();
		let mut rng = StdRng::seed_from_u64(42);
		assert_eq!(populate(&cat, 120, &mut rng).unwrap(), 120);
		assert_eq!(cat.count(), 120);
		let all = cat.session().unwrap().find(&FilterSet::default()).unwrap();
		assert_eq!(all.len(), 120);
	}
}
