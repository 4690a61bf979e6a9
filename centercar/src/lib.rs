//! CenterCar: a vehicle catalog served over a small length-prefixed JSON
//! protocol, plus the terminal client that queries it.

pub mod agent;
pub mod catalog;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod filters;
pub mod frame;
pub mod seed;
pub mod server;
pub mod vehicle;
