use crate::aggregate::city::CitySort;
use crate::prelude::*;
use crate::translate::page::Variant;
use anyhow::anyhow;
use std::{env::var, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

#[derive(Debug, Clone)]
pub struct Config {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub fixture_app: String,
    pub browser: BrowserConfig,
    pub translate: TranslateConfig,
    pub city_sort: CitySort,
    pub checkpoint_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub driver_path: Option<PathBuf>,
    pub headless: bool,
}

#[derive(Debug, Clone)]
pub struct TranslateConfig {
    pub source_lang: String,
    pub target_lang: String,
    pub variant: Variant,
    pub search_query: String,
    pub max_attempts: u32,
    pub poll_interval: Duration,
    pub settle: Duration,
    pub call_timeout: Duration,
    pub workers: usize,
    pub run_deadline: Option<Duration>,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            source_lang: "en".to_string(),
            target_lang: "tr".to_string(),
            variant: Variant::SearchWidget,
            search_query: "çeviri".to_string(),
            max_attempts: 40,
            poll_interval: Duration::from_millis(250),
            settle: Duration::from_millis(1500),
            call_timeout: Duration::from_secs(30),
            workers: 1,
            run_deadline: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = TranslateConfig::default();
        let translate = TranslateConfig {
            source_lang: get_string("SOURCE_LANG", &defaults.source_lang)?,
            target_lang: get_string("TARGET_LANG", &defaults.target_lang)?,
            variant: get_parsed("TRANSLATE_VARIANT", defaults.variant)?,
            search_query: get_string("SEARCH_QUERY", &defaults.search_query)?,
            max_attempts: get_positive("MAX_POLL_ATTEMPTS", defaults.max_attempts)?,
            poll_interval: Duration::from_millis(get_parsed("POLL_INTERVAL_MS", 250)?),
            settle: Duration::from_millis(get_parsed("SETTLE_MS", 1500)?),
            call_timeout: Duration::from_secs(get_positive("TRANSLATE_TIMEOUT_SECS", 30)?),
            workers: get_positive("TRANSLATE_WORKERS", defaults.workers)?,
            run_deadline: get_optional::<u64>("RUN_DEADLINE_SECS")?.map(Duration::from_secs),
        };

        Ok(Self {
            input_path: PathBuf::from(get_string("INPUT_PATH", "worldcities.xlsx")?),
            output_dir: PathBuf::from(get_string("OUTPUT_DIR", "fixtures")?),
            fixture_app: get_string("FIXTURE_APP", "information")?,
            browser: BrowserConfig {
                webdriver_url: get_string("WEBDRIVER_URL", "http://localhost:9515")?,
                driver_path: get_optional::<PathBuf>("CHROMEDRIVER_PATH")?,
                headless: get_parsed("HEADLESS", false)?,
            },
            translate,
            city_sort: get_parsed("CITY_SORT", CitySort::CountryThenName)?,
            checkpoint_path: get_optional::<PathBuf>("CHECKPOINT_PATH")?,
        })
    }
}

/// Read on its own so logging can be installed before the rest of the
/// configuration is parsed.
pub fn get_log_level() -> Result<tracing::Level> {
    log_level(var("LOG_LEVEL").ok())
}

fn log_level(raw: Option<String>) -> Result<tracing::Level> {
    parse_value("LOG_LEVEL", raw, tracing::Level::INFO)
}

fn get_string(name: &str, default: &str) -> Result<String> {
    parse_value(name, var(name).ok(), default.to_string())
}

fn get_parsed<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    parse_value(name, var(name).ok(), default)
}

fn get_positive<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr + PartialOrd + Default,
    T::Err: Display,
{
    let value = get_parsed(name, default)?;
    if value <= T::default() {
        let err = format!("{} must be greater than zero", name);
        tracing::error!(err);
        return Err(anyhow!(err));
    }

    Ok(value)
}

fn get_optional<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match var(name) {
        Ok(raw) => Ok(Some(parse_raw(name, &raw)?)),
        Err(_) => Ok(None),
    }
}

/// Falls back to `default` when the variable is unset; an empty or
/// unparsable value is an error.
pub(crate) fn parse_value<T>(name: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        Some(raw) => parse_raw(name, &raw),
        None => Ok(default),
    }
}

fn parse_raw<T>(name: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = raw.trim();
    if raw.is_empty() {
        let err = format!("{} is empty", name);
        tracing::error!(err);
        return Err(anyhow!(err));
    }

    match raw.parse::<T>() {
        Ok(value) => Ok(value),
        Err(e) => {
            let err = format!("Failed to parse {}={:?}: {}", name, raw, e);
            tracing::error!(err);
            Err(anyhow!(err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variable_uses_default() {
        let value: u32 = parse_value("MAX_POLL_ATTEMPTS", None, 40).unwrap();
        assert_eq!(value, 40);
    }

    #[test]
    fn set_variable_is_parsed_and_trimmed() {
        let value: u32 = parse_value("MAX_POLL_ATTEMPTS", Some(" 7 ".to_string()), 40).unwrap();
        assert_eq!(value, 7);

        let variant: Variant =
            parse_value("TRANSLATE_VARIANT", Some("page".to_string()), Variant::SearchWidget)
                .unwrap();
        assert_eq!(variant, Variant::DedicatedPage);
    }

    #[test]
    fn empty_variable_is_an_error() {
        let err = parse_value::<String>("INPUT_PATH", Some("  ".to_string()), String::new())
            .unwrap_err();
        assert!(err.to_string().contains("INPUT_PATH is empty"));
    }

    #[test]
    fn unparsable_variable_is_an_error() {
        let err = parse_value::<bool>("HEADLESS", Some("sometimes".to_string()), false)
            .unwrap_err();
        assert!(err.to_string().contains("HEADLESS"));
    }

    #[test]
    fn log_level_accepts_names() {
        assert_eq!(log_level(Some("debug".to_string())).unwrap(), tracing::Level::DEBUG);
        assert_eq!(log_level(None).unwrap(), tracing::Level::INFO);
        assert!(log_level(Some("loud".to_string())).is_err());
    }
}
