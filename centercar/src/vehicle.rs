use serde::{Deserialize, Serialize};

/// A catalog entry as it travels on the wire.
///
/// Field names on the wire follow the catalog's original schema; the English
/// names are accepted when reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
	pub id: i64,
	#[serde(rename = "marca", alias = "brand")]
	pub brand: String,
	#[serde(rename = "modelo", alias = "model")]
	pub model: String,
	#[serde(rename = "ano", alias = "year")]
	pub year: i64,
	#[serde(rename = "tipo_combustivel", alias = "fuel_type")]
	pub fuel_type: String,
	#[serde(rename = "cor", alias = "color")]
	pub color: String,
	#[serde(rename = "quilometragem", alias = "mileage")]
	pub mileage: f64,
	#[serde(rename = "numero_portas", alias = "door_count")]
	pub door_count: i64,
	#[serde(rename = "transmissao", alias = "transmission")]
	pub transmission: String,
	#[serde(rename = "preco", alias = "price")]
	pub price: f64,
}

/// Stored form: the wire record plus columns the protocol never exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVehicle {
	#[serde(flatten)]
	pub vehicle: Vehicle,
	#[serde(rename = "motorizacao", default)]
	pub engine: String,
}

/// Everything needed to insert a vehicle; the catalog assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewVehicle {
	pub brand: String,
	pub model: String,
	pub year: i64,
	pub engine: String,
	pub fuel_type: String,
	pub color: String,
	pub mileage: f64,
	pub door_count: i64,
	pub transmission: String,
	pub price: f64,
}

impl NewVehicle {
	pub fn into_stored(self, id: i64) -> StoredVehicle {
		StoredVehicle {
			vehicle: Vehicle {
				id,
				brand: self.brand,
				model: self.model,
				year: self.year,
				fuel_type: self.fuel_type,
				color: self.color,
				mileage: self.mileage,
				door_count: self.door_count,
				transmission: self.transmission,
				price: self.price,
			},
			engine: self.engine,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn sample() -> Vehicle {
		Vehicle {
			id: 1,
			brand: "Jeep".into(),
			model: "Alpha".into(),
			year: 2021,
			fuel_type: "Etanol".into(),
			color: "Azul".into(),
			mileage: 12345.6,
			door_count: 4,
			transmission: "Automático".into(),
			price: 98765.43,
		}
	}

	#[test]
	fn serializes_with_wire_keys() {
		let v = serde_json::to_value(sample()).unwrap();
		assert_eq!(v["marca"], "Jeep");
		assert_eq!(v["ano"], 2021);
		assert_eq!(v["quilometragem"], 12345.6);
		assert_eq!(v["numero_portas"], 4);
		assert!(v.get("brand").is_none());
		assert_eq!(v.as_object().unwrap().len(), 10);
	}

	#[test]
	fn reads_english_aliases() {
		let v: Vehicle = serde_json::from_value(json!({
			"id": 1, "brand": "Jeep", "model": "Alpha", "year": 2021, "fuel_type": "Etanol",
			"color": "Azul", "mileage": 12345.6, "door_count": 4, "transmission": "Automático", "price": 98765.43
		}))
		.unwrap();
		assert_eq!(v, sample());
	}

	#[test]
	fn stored_form_keeps_engine_off_the_wire_record() {
		let stored = StoredVehicle { vehicle: sample(), engine: "2.0".into() };
		let raw = serde_json::to_vec(&stored).unwrap();
		let back: StoredVehicle = serde_json::from_slice(&raw).unwrap();
		assert_eq!(back, stored);
		assert!(serde_json::to_value(&back.vehicle).unwrap().get("motorizacao").is_none());
	}
}
