//! Environment variable loading with type conversion, prefixing, and
//! defaults. Trimmed from the teacher's `EnvConfigLoader` to the
//! self-contained subset (the teacher's builder-macro integration isn't
//! needed here).

use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("environment variable not found: {var}")]
    NotFound { var: String },

    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

pub struct EnvConfigLoader {
    prefix: Option<String>,
    required: Vec<String>,
    defaults: HashMap<String, String>,
}

impl EnvConfigLoader {
    pub fn new() -> Self {
        Self {
            prefix: None,
            required: Vec::new(),
            defaults: HashMap::new(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn require(mut self, var: impl Into<String>) -> Self {
        self.required.push(var.into());
        self
    }

    pub fn default(mut self, var: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(var.into(), value.into());
        self
    }

    pub fn get(&self, var: &str) -> Result<String, EnvError> {
        let full_var = self.make_var_name(var);
        env::var(&full_var).or_else(|_| {
            self.defaults.get(var).cloned().ok_or_else(|| EnvError::NotFound { var: full_var.clone() })
        })
    }

    pub fn get_optional(&self, var: &str) -> Option<String> {
        let full_var = self.make_var_name(var);
        env::var(&full_var).ok().or_else(|| self.defaults.get(var).cloned())
    }

    pub fn get_uint(&self, var: &str) -> Result<u64, EnvError> {
        let value = self.get(var)?;
        value.parse().map_err(|e| EnvError::InvalidValue {
            var: self.make_var_name(var),
            reason: format!("cannot parse as unsigned integer: {e}"),
        })
    }

    pub fn get_duration(&self, var: &str) -> Result<Duration, EnvError> {
        let value = self.get(var)?;
        parse_duration(&value).map_err(|reason| EnvError::InvalidValue {
            var: self.make_var_name(var),
            reason,
        })
    }

    pub fn validate(&self) -> Result<(), EnvError> {
        for var in &self.required {
            self.get(var)?;
        }
        Ok(())
    }

    fn make_var_name(&self, var: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{}", var.to_uppercase()),
            None => var.to_uppercase(),
        }
    }
}

impl Default for EnvConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim().to_lowercase();
    if let Some(num) = s.strip_suffix("ms") {
        return num.parse().map(Duration::from_millis).map_err(|e| format!("invalid milliseconds: {e}"));
    }
    if let Some(num) = s.strip_suffix('s') {
        return num.parse().map(Duration::from_secs).map_err(|e| format!("invalid seconds: {e}"));
    }
    if let Some(num) = s.strip_suffix('m') {
        return num.parse::<u64>().map(|n| Duration::from_secs(n * 60)).map_err(|e| format!("invalid minutes: {e}"));
    }
    if let Ok(num) = s.parse::<u64>() {
        return Ok(Duration::from_secs(num));
    }
    Err(format!("invalid duration format: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_prefixed_variable_with_type_conversion() {
        std::env::set_var("TEST_ENV_VALUE", "123");
        let loader = EnvConfigLoader::new().with_prefix("TEST_ENV_");
        assert_eq!(loader.get_uint("VALUE").unwrap(), 123);
        std::env::remove_var("TEST_ENV_VALUE");
    }

    #[test]
    fn falls_back_to_default_when_unset() {
        let loader = EnvConfigLoader::new().with_prefix("MISSING_ENV_").default("timeout", "30s");
        assert_eq!(loader.get_duration("timeout").unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn validate_fails_when_a_required_variable_is_absent() {
        let loader = EnvConfigLoader::new().with_prefix("ABSENT_ENV_").require("REQUIRED");
        assert!(loader.validate().is_err());
    }

    #[test]
    fn duration_parsing_handles_unit_suffixes() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("60").unwrap(), Duration::from_secs(60));
    }
}
