//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use chrono::FixedOffset;
use medassist_core::domain::Role;
use medassist_core::quota::{QuotaPolicy, RoleCeilings};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_EUROPE_PMC_BASE_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest";
pub const DEFAULT_PUBMED_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which bibliographic index answers literature searches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LiteratureBackend {
    /// Europe PMC REST search, JSON results with inline abstracts.
    EuropePmc { base_url: String },
    /// NCBI E-utilities: esearch for ids, then efetch XML.
    PubMed {
        base_url: String,
        api_key: Option<String>,
    },
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub llm_api_key: String,
    pub llm_api_base: Option<String>,
    pub answer_model: String,
    pub allowed_models: Vec<String>,
    pub utility_model: String,
    pub literature_backend: LiteratureBackend,
    pub http_timeout: Duration,
    pub max_prompt_chars: usize,
    pub quota_policy: QuotaPolicy,
    pub quota_offset: FixedOffset,
    pub guest_query_limit: u32,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or_default = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        // --- Load Server and Database Settings ---
        let bind_address_str = or_default("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url =
            var("DATABASE_URL").ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = or_default("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Inference Settings ---
        let llm_api_key =
            var("LLM_API_KEY").ok_or_else(|| ConfigError::MissingVar("LLM_API_KEY".to_string()))?;
        let llm_api_base = var("LLM_API_BASE");
        let answer_model = or_default("ANSWER_MODEL", "gpt-4o");
        let allowed_models = match var("ALLOWED_MODELS") {
            Some(list) => list
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
            None => vec![answer_model.clone()],
        };
        let utility_model = or_default("UTILITY_MODEL", "gpt-4o-mini");
        let max_prompt_chars = parse_number("MAX_PROMPT_CHARS", var("MAX_PROMPT_CHARS"), 4000)?;

        // --- Load Literature Settings ---
        let backend_name = or_default("LITERATURE_BACKEND", "europepmc").to_lowercase();
        let literature_backend = match backend_name.as_str() {
            "europepmc" | "europe_pmc" => LiteratureBackend::EuropePmc {
                base_url: or_default("EUROPE_PMC_BASE_URL", DEFAULT_EUROPE_PMC_BASE_URL),
            },
            "pubmed" => LiteratureBackend::PubMed {
                base_url: or_default("PUBMED_BASE_URL", DEFAULT_PUBMED_BASE_URL),
                api_key: var("NCBI_API_KEY"),
            },
            other => {
                return Err(ConfigError::InvalidValue(
                    "LITERATURE_BACKEND".to_string(),
                    format!("'{}' is not one of europepmc, pubmed", other),
                ))
            }
        };
        let http_timeout = Duration::from_secs(parse_number(
            "HTTP_TIMEOUT_SECS",
            var("HTTP_TIMEOUT_SECS"),
            15,
        )?);

        // --- Load Quota Settings ---
        let mut quota_policy = QuotaPolicy::default();
        for role in Role::ALL {
            let defaults = quota_policy.ceilings(role);
            let daily_key = format!("QUOTA_{}_DAILY", role.as_str().to_uppercase());
            let monthly_key = format!("QUOTA_{}_MONTHLY", role.as_str().to_uppercase());
            let daily = parse_ceiling(&daily_key, lookup(&daily_key), defaults.daily)?;
            let monthly = parse_ceiling(&monthly_key, lookup(&monthly_key), defaults.monthly)?;
            quota_policy = quota_policy.with_ceilings(role, RoleCeilings { daily, monthly });
        }

        let offset_minutes: i32 = parse_number(
            "QUOTA_UTC_OFFSET_MINUTES",
            var("QUOTA_UTC_OFFSET_MINUTES"),
            0,
        )?;
        let quota_offset = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| {
            ConfigError::InvalidValue(
                "QUOTA_UTC_OFFSET_MINUTES".to_string(),
                format!("{} minutes is out of range", offset_minutes),
            )
        })?;

        let guest_query_limit = parse_number("GUEST_QUERY_LIMIT", var("GUEST_QUERY_LIMIT"), 3)?;
        let cors_origin = or_default("CORS_ORIGIN", "http://localhost:3000");

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            llm_api_key,
            llm_api_base,
            answer_model,
            allowed_models,
            utility_model,
            literature_backend,
            http_timeout,
            max_prompt_chars,
            quota_policy,
            quota_offset,
            guest_query_limit,
            cors_origin,
        })
    }
}

fn parse_number<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}

/// `None` (unset) keeps the default; `unlimited` or an empty value lifts the ceiling.
fn parse_ceiling(
    key: &str,
    raw: Option<String>,
    default: Option<u64>,
) -> Result<Option<u64>, ConfigError> {
    match raw.as_deref().map(str::trim) {
        None => Ok(default),
        Some("") => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("unlimited") => Ok(None),
        Some(v) => v
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/medassist"),
        ("LLM_API_KEY", "sk-test"),
    ];

    #[test]
    fn defaults_apply_when_only_required_vars_are_set() {
        let config = load(&REQUIRED).unwrap();
        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.answer_model, "gpt-4o");
        assert_eq!(config.allowed_models, vec!["gpt-4o"]);
        assert_eq!(config.utility_model, "gpt-4o-mini");
        assert_eq!(config.max_prompt_chars, 4000);
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert_eq!(config.guest_query_limit, 3);
        assert_eq!(config.quota_policy, QuotaPolicy::default());
        assert_eq!(
            config.literature_backend,
            LiteratureBackend::EuropePmc {
                base_url: DEFAULT_EUROPE_PMC_BASE_URL.to_string()
            }
        );
    }

    #[test]
    fn missing_database_url_is_reported() {
        match load(&[("LLM_API_KEY", "sk-test")]) {
            Err(ConfigError::MissingVar(var)) => assert_eq!(var, "DATABASE_URL"),
            other => panic!("expected MissingVar, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn quota_overrides_are_parsed_per_role() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("QUOTA_FREE_DAILY", "5"));
        pairs.push(("QUOTA_PREMIUM_MONTHLY", "unlimited"));
        let config = load(&pairs).unwrap();

        let free = config.quota_policy.ceilings(Role::Free);
        assert_eq!(free.daily, Some(5));
        assert_eq!(free.monthly, Some(20));
        let premium = config.quota_policy.ceilings(Role::Premium);
        assert_eq!(premium.daily, Some(100));
        assert_eq!(premium.monthly, None);
    }

    #[test]
    fn invalid_quota_value_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("QUOTA_TEST_DAILY", "lots"));
        assert!(matches!(
            load(&pairs),
            Err(ConfigError::InvalidValue(key, _)) if key == "QUOTA_TEST_DAILY"
        ));
    }

    #[test]
    fn pubmed_backend_and_offset() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("LITERATURE_BACKEND", "PubMed"));
        pairs.push(("NCBI_API_KEY", "ncbi-key"));
        pairs.push(("QUOTA_UTC_OFFSET_MINUTES", "-300"));
        pairs.push(("ALLOWED_MODELS", "gpt-4o, gpt-4o-mini ,"));
        let config = load(&pairs).unwrap();
        assert_eq!(
            config.literature_backend,
            LiteratureBackend::PubMed {
                base_url: DEFAULT_PUBMED_BASE_URL.to_string(),
                api_key: Some("ncbi-key".to_string()),
            }
        );
        assert_eq!(config.quota_offset.local_minus_utc(), -300 * 60);
        assert_eq!(config.allowed_models, vec!["gpt-4o", "gpt-4o-mini"]);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("LITERATURE_BACKEND", "scopus"));
        assert!(load(&pairs).is_err());
    }
}
