//! Configuration for the ingestion fabric: environment-variable loading
//! (teacher's `EnvConfigLoader` idiom) plus the typed `FabricConfig`
//! surface for spec §6's environment variables and the ambient
//! Postgres/Redis/concurrency settings this expansion adds.

mod config;
mod env;

pub use config::FabricConfig;
pub use env::{EnvConfigLoader, EnvError};
