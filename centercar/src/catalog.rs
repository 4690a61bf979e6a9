//! Vehicle storage behind a narrow `find` interface.
//!
//! The connection handler opens one [`CatalogSession`] per request and drops
//! it when the request is done; sessions are never shared between
//! connections.

use std::path::Path;

use anyhow::{Context, Result};

use crate::filters::FilterSet;
use crate::vehicle::{NewVehicle, StoredVehicle, Vehicle};

const VEHICLES_TREE: &str = "vehicles";

pub trait Catalog: Send + Sync + 'static {
	type Session: CatalogSession;

	fn session(&self) -> Result<Self::Session>;
}

pub trait CatalogSession {
	/// All vehicles matching every present constraint, in id order.
	fn find(&self, filters: &FilterSet) -> Result<Vec<Vehicle>>;
}

/// Predicate semantics shared by every backend.
pub fn matches(filters: &FilterSet, v: &Vehicle) -> bool {
	if let Some(brand) = &filters.brand {
		if &v.brand != brand { return false; }
	}
	if let Some(model) = &filters.model {
		if !v.model.to_lowercase().contains(&model.to_lowercase()) { return false; }
	}
	if let Some(min) = filters.year_min {
		if v.year < min { return false; }
	}
	if let Some(max) = filters.year_max {
		if v.year > max { return false; }
	}
	if let Some(fuel) = &filters.fuel_type {
		if &v.fuel_type != fuel { return false; }
	}
	if let Some(max) = filters.price_max {
		if v.price > max { return false; }
	}
	true
}

/// sled-backed catalog. Keys are big-endian ids so iteration follows id order.
#[derive(Clone)]
pub struct SledCatalog {
	db: sled::Db,
	vehicles: sled::Tree,
}

impl SledCatalog {
	pub fn open(path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let db = sled::open(path).with_context(|| format!("opening catalog at {}", path.display()))?;
		Self::from_db(db)
	}

	/// In-memory database removed on drop.
	pub fn temporary() -> Result<Self> {
		Self::from_db(sled::Config::new().temporary(true).open()?)
	}

	fn from_db(db: sled::Db) -> Result<Self> {
		let vehicles = db.open_tree(VEHICLES_TREE)?;
		Ok(Self { db, vehicles })
	}

	pub fn insert(&self, new: NewVehicle) -> Result<Vehicle> {
		let id = self.db.generate_id()? as i64 + 1;
		let stored = new.into_stored(id);
		self.vehicles.insert(id.to_be_bytes(), serde_json::to_vec(&stored)?)?;
		Ok(stored.vehicle)
	}

	pub fn count(&self) -> usize { self.vehicles.len() }

	pub fn flush(&self) -> Result<()> {
		self.db.flush()?;
		Ok(())
	}
}

impl Catalog for SledCatalog {
	type Session = SledSession;

	fn session(&self) -> Result<SledSession> {
		Ok(SledSession { vehicles: self.vehicles.clone() })
	}
}

pub struct SledSession {
	vehicles: sled::Tree,
}

impl CatalogSession for SledSession {
	fn find(&self, filters: &FilterSet) -> Result<Vec<Vehicle>> {
		let mut out = Vec::new();
		for kv in self.vehicles.iter() {
			let (k, v) = kv?;
			let stored: StoredVehicle = serde_json::from_slice(&v)
				.with_context(|| format!("corrupt vehicle entry {:?}", k.as_ref()))?;
			if matches(filters, &stored.vehicle) {
				out.push(stored.vehicle);
			}
		}
		Ok(out)
	}
}
