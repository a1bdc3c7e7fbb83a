//! The environment a session evaluates in: timezone, date and number
//! formats, languages, and the injectable runtime sources (clock, UUIDs,
//! randomness, locations) that replace process-wide state.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod datetime;
pub mod location;

pub use datetime::{DateFormat, TimeFormat};
pub use location::{Location, LocationHierarchy, LocationLevel};

/// An ISO-639-3 language code, e.g. `eng`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Language(String);

impl Language {
    pub fn parse(code: &str) -> Result<Self> {
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(anyhow!("iso-639-3 codes must be 3 lowercase letters, got: {code}"));
        }
        Ok(Language(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ISO-3166-1 alpha-2 country code, e.g. `US`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Country(pub String);

/// How numbers are written in the environment's locale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberFormat {
    pub decimal_symbol: String,
    pub digit_grouping_symbol: String,
}

impl Default for NumberFormat {
    fn default() -> Self {
        NumberFormat {
            decimal_symbol: ".".to_string(),
            digit_grouping_symbol: ",".to_string(),
        }
    }
}

/// Whether sensitive values (URNs) are redacted in rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedactionPolicy {
    #[default]
    None,
    Urns,
}

/* ===================== Runtime sources ===================== */

/// Source of the current time. Tests pin this to a fixed instant so sprints
/// are reproducible.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<FixedOffset>),
}

/// Source of new UUIDs. The seeded variant generates a deterministic
/// sequence for tests and serialization round-trip checks.
#[derive(Debug, Clone, Default)]
pub enum UuidSource {
    #[default]
    Random,
    Seeded(Arc<AtomicU64>),
}

impl UuidSource {
    pub fn seeded() -> Self {
        UuidSource::Seeded(Arc::new(AtomicU64::new(0)))
    }
}

/// Source of randomness for `rand()` and the random router.
#[derive(Debug, Clone)]
pub enum RngSource {
    Random,
    Seeded(Arc<Mutex<StdRng>>),
}

impl Default for RngSource {
    fn default() -> Self {
        RngSource::Random
    }
}

impl RngSource {
    pub fn seeded(seed: u64) -> Self {
        RngSource::Seeded(Arc::new(Mutex::new(StdRng::seed_from_u64(seed))))
    }
}

/* ===================== Environment ===================== */

fn default_timezone() -> Tz {
    chrono_tz::UTC
}

/// Evaluation environment for a session. The serialized form carries only
/// the locale configuration; runtime sources reset to their defaults when an
/// environment is read back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default)]
    pub date_format: DateFormat,
    #[serde(default)]
    pub time_format: TimeFormat,
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_language: Option<Language>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_languages: Vec<Language>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_country: Option<Country>,
    #[serde(default)]
    pub number_format: NumberFormat,
    #[serde(default)]
    pub redaction_policy: RedactionPolicy,

    #[serde(skip)]
    pub clock: Clock,
    #[serde(skip)]
    pub uuids: UuidSource,
    #[serde(skip)]
    pub rng: RngSource,
    #[serde(skip)]
    pub locations: Option<Arc<LocationHierarchy>>,
}

impl Default for Environment {
    fn default() -> Self {
        EnvironmentBuilder::new().build()
    }
}

impl Environment {
    /// The current moment, localized to this environment's timezone.
    pub fn now(&self) -> DateTime<FixedOffset> {
        match &self.clock {
            Clock::System => Utc::now().with_timezone(&self.timezone).fixed_offset(),
            Clock::Fixed(dt) => *dt,
        }
    }

    /// A new UUID from this environment's source.
    pub fn new_uuid(&self) -> String {
        match &self.uuids {
            UuidSource::Random => Uuid::new_v4().to_string(),
            UuidSource::Seeded(counter) => {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                format!("{:08x}-7c53-4c24-8f9a-{:012x}", n, n)
            }
        }
    }

    /// A random decimal in `[0, 1)`.
    pub fn random_decimal(&self) -> Decimal {
        let f = match &self.rng {
            RngSource::Random => rand::thread_rng().gen::<f64>(),
            RngSource::Seeded(rng) => rng.lock().expect("rng lock").gen::<f64>(),
        };
        Decimal::from_f64(f).unwrap_or_default()
    }

    pub fn timezone_name(&self) -> &str {
        self.timezone.name()
    }
}

/// Builder for environments, mirroring the shape hosts configure them in.
pub struct EnvironmentBuilder {
    env: Environment,
}

impl EnvironmentBuilder {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        EnvironmentBuilder {
            env: Environment {
                date_format: DateFormat::default(),
                time_format: TimeFormat::default(),
                timezone: chrono_tz::UTC,
                default_language: None,
                allowed_languages: Vec::new(),
                default_country: None,
                number_format: NumberFormat::default(),
                redaction_policy: RedactionPolicy::None,
                clock: Clock::System,
                uuids: UuidSource::Random,
                rng: RngSource::Random,
                locations: None,
            },
        }
    }

    pub fn with_date_format(mut self, fmt: DateFormat) -> Self {
        self.env.date_format = fmt;
        self
    }

    pub fn with_time_format(mut self, fmt: TimeFormat) -> Self {
        self.env.time_format = fmt;
        self
    }

    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.env.timezone = tz;
        self
    }

    pub fn with_default_language(mut self, lang: Language) -> Self {
        self.env.default_language = Some(lang);
        self
    }

    pub fn with_allowed_languages(mut self, langs: Vec<Language>) -> Self {
        self.env.allowed_languages = langs;
        self
    }

    pub fn with_default_country(mut self, country: Country) -> Self {
        self.env.default_country = Some(country);
        self
    }

    pub fn with_number_format(mut self, fmt: NumberFormat) -> Self {
        self.env.number_format = fmt;
        self
    }

    pub fn with_redaction_policy(mut self, policy: RedactionPolicy) -> Self {
        self.env.redaction_policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.env.clock = clock;
        self
    }

    pub fn with_uuids(mut self, uuids: UuidSource) -> Self {
        self.env.uuids = uuids;
        self
    }

    pub fn with_rng(mut self, rng: RngSource) -> Self {
        self.env.rng = rng;
        self
    }

    pub fn with_locations(mut self, locations: Arc<LocationHierarchy>) -> Self {
        self.env.locations = Some(locations);
        self
    }

    pub fn build(self) -> Environment {
        self.env
    }
}

/// Parses a timezone name like `America/Guayaquil`.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    Tz::from_str(name).map_err(|_| anyhow!("unknown timezone: {name}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_parse() {
        assert_eq!("eng", Language::parse("eng").unwrap().as_str());
        assert!(Language::parse("en").is_err());
        assert!(Language::parse("ENG").is_err());
        assert!(Language::parse("engl").is_err());
    }

    #[test]
    fn test_environment_json_round_trip() {
        let env = EnvironmentBuilder::new()
            .with_timezone(parse_timezone("America/Guayaquil").unwrap())
            .with_default_language(Language::parse("eng").unwrap())
            .with_allowed_languages(vec![
                Language::parse("eng").unwrap(),
                Language::parse("fra").unwrap(),
            ])
            .with_default_country(Country("EC".to_string()))
            .build();

        let marshaled = serde_json::to_string(&env).unwrap();
        let read: Environment = serde_json::from_str(&marshaled).unwrap();
        assert_eq!(env.timezone, read.timezone);
        assert_eq!(env.default_language, read.default_language);
        assert_eq!(env.allowed_languages, read.allowed_languages);
        assert_eq!(env.number_format, read.number_format);
    }

    #[test]
    fn test_seeded_uuids() {
        let env = EnvironmentBuilder::new().with_uuids(UuidSource::seeded()).build();
        let first = env.new_uuid();
        let second = env.new_uuid();
        assert_ne!(first, second);
        assert!(first.starts_with("00000001-"));
    }

    #[test]
    fn test_fixed_clock() {
        let at = "2018-04-11T13:24:30Z".parse::<DateTime<FixedOffset>>().unwrap();
        let env = EnvironmentBuilder::new().with_clock(Clock::Fixed(at)).build();
        assert_eq!(at, env.now());
        assert_eq!(at, env.now());
    }
}
