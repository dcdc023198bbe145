use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Translation session unavailable: {0}")]
    TranslationUnavailable(String),
    #[error("No translation for {text:?} after {attempts} attempts ({elapsed:?})")]
    TranslationTimeout {
        text: String,
        attempts: u32,
        elapsed: Duration,
    },
    #[error("City {city:?} references unknown country {country:?}")]
    UnresolvedCountry { country: String, city: String },
    #[error("Translation batch exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),
}
