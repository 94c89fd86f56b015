use std::path::PathBuf;

use crate::pipeline::gemini_types::{validate_base_url, validate_model_name, EndpointError};

/// Application-level constants
pub const APP_NAME: &str = "MediCipher";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Storage identifier of the tracked-medicine collection.
pub const TRACKED_MEDICINES_KEY: &str = "medicipher.tracked_medicines.v1";

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Credential variables, first match wins.
const API_KEY_VARS: &[&str] = &["MEDICIPHER_API_KEY", "GEMINI_API_KEY", "API_KEY"];

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "medicipher=info,warn"
}

/// Get the application data directory
/// (platform data dir, e.g. ~/.local/share/MediCipher on Linux).
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No API credential found; set MEDICIPHER_API_KEY (or GEMINI_API_KEY)")]
    MissingApiKey,

    #[error("{var} has an invalid value: '{value}'")]
    InvalidValue { var: &'static str, value: String },

    #[error("Endpoint configuration rejected: {0}")]
    Endpoint(#[from] EndpointError),

    #[error("HTTP client could not be created: {0}")]
    HttpClient(String),
}

/// Runtime configuration, read once at startup.
#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub grounding_enabled: bool,
    pub data_dir: PathBuf,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("grounding_enabled", &self.grounding_enabled)
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = API_KEY_VARS
            .iter()
            .find_map(|var| get(*var))
            .ok_or(ConfigError::MissingApiKey)?;

        let api_base = get("MEDICIPHER_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        validate_base_url(&api_base)?;

        let model = get("MEDICIPHER_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        validate_model_name(&model)?;

        let timeout_secs = match get("MEDICIPHER_TIMEOUT_SECS") {
            Some(raw) => parse_number::<u64>("MEDICIPHER_TIMEOUT_SECS", &raw)
                .and_then(|v| positive("MEDICIPHER_TIMEOUT_SECS", v))?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let max_retries = match get("MEDICIPHER_MAX_RETRIES") {
            Some(raw) => parse_number::<u32>("MEDICIPHER_MAX_RETRIES", &raw)?,
            None => DEFAULT_MAX_RETRIES,
        };

        let grounding_enabled = match get("MEDICIPHER_GROUNDING") {
            Some(raw) => parse_bool("MEDICIPHER_GROUNDING", &raw)?,
            None => true,
        };

        let data_dir = get("MEDICIPHER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(app_data_dir);

        Ok(Self {
            api_key,
            api_base,
            model,
            timeout_secs,
            max_retries,
            grounding_enabled,
            data_dir,
        })
    }

    /// File backing the tracked-medicine collection.
    pub fn tracker_path(&self) -> PathBuf {
        self.data_dir.join(format!("{TRACKED_MEDICINES_KEY}.json"))
    }
}

/// Data directory for commands that never talk to the service.
pub fn data_dir_from_env() -> PathBuf {
    std::env::var("MEDICIPHER_DATA_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(app_data_dir)
}

fn parse_number<T: std::str::FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: raw.to_string(),
    })
}

fn positive(var: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        });
    }
    Ok(value)
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: raw.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_key_fails_fast() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let err = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "   ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingApiKey));
    }

    #[test]
    fn defaults_applied() {
        let config = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "abc")])).unwrap();
        assert_eq!(config.api_key, "abc");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert!(config.grounding_enabled);
        assert!(config.data_dir.ends_with(APP_NAME));
    }

    #[test]
    fn specific_key_wins_over_generic() {
        let config = Config::from_lookup(lookup(&[
            ("API_KEY", "generic"),
            ("MEDICIPHER_API_KEY", "specific"),
        ]))
        .unwrap();
        assert_eq!(config.api_key, "specific");
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("API_KEY", "k"),
            ("MEDICIPHER_API_BASE", "http://localhost:8080"),
            ("MEDICIPHER_MODEL", "gemini-2.5-flash"),
            ("MEDICIPHER_TIMEOUT_SECS", "15"),
            ("MEDICIPHER_MAX_RETRIES", "0"),
            ("MEDICIPHER_GROUNDING", "off"),
            ("MEDICIPHER_DATA_DIR", "/tmp/medicipher-test"),
        ]))
        .unwrap();
        assert_eq!(config.api_base, "http://localhost:8080");
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.max_retries, 0);
        assert!(!config.grounding_enabled);
        assert_eq!(
            config.tracker_path(),
            PathBuf::from("/tmp/medicipher-test/medicipher.tracked_medicines.v1.json")
        );
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("API_KEY", "k"),
            ("MEDICIPHER_TIMEOUT_SECS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var: "MEDICIPHER_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn insecure_remote_endpoint_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("API_KEY", "k"),
            ("MEDICIPHER_API_BASE", "http://proxy.example.com"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Endpoint(EndpointError::InsecureEndpoint(_))));
    }

    #[test]
    fn bad_bool_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("API_KEY", "k"),
            ("MEDICIPHER_GROUNDING", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn debug_output_redacts_key() {
        let config = Config::from_lookup(lookup(&[("API_KEY", "super-secret")])).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn app_name_is_medicipher() {
        assert_eq!(APP_NAME, "MediCipher");
    }
}
