//! The fabric's own configuration surface (spec §6 environment variables,
//! plus the ambient Postgres/Redis/concurrency settings the expanded
//! system needs), built on `EnvConfigLoader`.

use crate::env::{EnvConfigLoader, EnvError};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FabricConfig {
    pub pubsub_project_id: String,
    /// Set for local development against the Pub/Sub emulator; unset in production.
    pub pubsub_emulator_host: Option<String>,
    pub database_url: String,
    pub redis_url: String,
    pub max_concurrency: usize,
    pub batch_timeout: Duration,
}

impl FabricConfig {
    pub fn from_env() -> Result<Self, EnvError> {
        let loader = EnvConfigLoader::new()
            .require("PUBSUB_PROJECT_ID")
            .require("DATABASE_URL")
            .require("REDIS_URL")
            .default("MAX_CONCURRENCY", "0")
            .default("BATCH_TIMEOUT", "5s");
        loader.validate()?;

        Ok(Self {
            pubsub_project_id: loader.get("PUBSUB_PROJECT_ID")?,
            pubsub_emulator_host: loader.get_optional("PUBSUB_EMULATOR_HOST"),
            database_url: loader.get("DATABASE_URL")?,
            redis_url: loader.get("REDIS_URL")?,
            max_concurrency: loader.get_uint("MAX_CONCURRENCY")? as usize,
            batch_timeout: loader.get_duration("BATCH_TIMEOUT")?,
        })
    }

    /// `true` when running against the local Pub/Sub emulator rather than `pubsub.googleapis.com`.
    pub fn is_emulator(&self) -> bool {
        self.pubsub_emulator_host.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn set(vars: &[(&str, &str)]) {
        for (k, v) in vars {
            std::env::set_var(k, v);
        }
    }

    fn clear(vars: &[&str]) {
        for k in vars {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn loads_required_and_optional_fields() {
        let _guard = ENV_LOCK.lock().unwrap();
        set(&[
            ("PUBSUB_PROJECT_ID", "proj-1"),
            ("DATABASE_URL", "postgres://localhost/ingest"),
            ("REDIS_URL", "redis://localhost"),
            ("PUBSUB_EMULATOR_HOST", "localhost:8085"),
        ]);

        let config = FabricConfig::from_env().unwrap();
        assert_eq!(config.pubsub_project_id, "proj-1");
        assert!(config.is_emulator());

        clear(&["PUBSUB_PROJECT_ID", "DATABASE_URL", "REDIS_URL", "PUBSUB_EMULATOR_HOST"]);
    }

    #[test]
    fn missing_required_variable_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear(&["PUBSUB_PROJECT_ID", "DATABASE_URL", "REDIS_URL", "PUBSUB_EMULATOR_HOST"]);
        assert!(FabricConfig::from_env().is_err());
    }
}
