use super::page::{extract_result, same_location, Variant};
use super::session::BrowserSession;
use crate::error::FixtureError;
use crate::prelude::*;
use crate::service::var_service::TranslateConfig;
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Waiting,
    ResultReady,
    RetryAvailable,
    Failed,
}

impl PollState {
    fn observe(result_present: bool, retry_visible: bool) -> Self {
        match (result_present, retry_visible) {
            (true, _) => PollState::ResultReady,
            (false, true) => PollState::RetryAvailable,
            (false, false) => PollState::Waiting,
        }
    }
}

/// Drives one browser session through the provider's translation UI.
pub struct TranslationClient<S: BrowserSession> {
    session: S,
    variant: Variant,
    search_query: String,
    max_attempts: u32,
    poll_interval: Duration,
    settle: Duration,
    call_timeout: Duration,
    /// Result still rendered by the search widget from the previous call.
    shown: Option<String>,
    /// Ticks made by the current call.
    attempts: u32,
}

impl<S: BrowserSession> TranslationClient<S> {
    pub fn new(session: S, config: &TranslateConfig) -> Self {
        Self {
            session,
            variant: config.variant,
            search_query: config.search_query.clone(),
            max_attempts: config.max_attempts,
            poll_interval: config.poll_interval,
            settle: config.settle,
            call_timeout: config.call_timeout,
            shown: None,
            attempts: 0,
        }
    }

    pub async fn translate(&mut self, text: &str, from: &str, to: &str) -> Result<String> {
        let started = Instant::now();
        self.attempts = 0;
        let target = self.variant.query_url(text, from, to, &self.search_query)?;
        if self.open(&target).await? {
            self.shown = None;
        }

        if let Some(input) = self.variant.input_selector() {
            self.session.fill(input, text).await?;
            sleep(self.settle).await;
        }

        let stale = self.shown.take();
        let polled = timeout(self.call_timeout, self.poll(text, stale.as_deref())).await;
        match polled {
            Ok(Ok(translation)) => {
                tracing::info!("{} -> {}", text, translation);
                if self.variant.input_selector().is_some() {
                    self.shown = Some(translation.clone());
                }
                Ok(translation)
            }
            Ok(Err(e)) => {
                self.shown = stale;
                Err(e)
            }
            Err(_) => {
                self.shown = stale;
                tracing::error!(
                    "Translating {:?} exceeded {:?} after {} attempts",
                    text,
                    self.call_timeout,
                    self.attempts
                );
                Err(FixtureError::TranslationTimeout {
                    text: text.to_string(),
                    attempts: self.attempts,
                    elapsed: started.elapsed(),
                }
                .into())
            }
        }
    }

    pub async fn close(&mut self) -> Result<()> {
        self.session.close().await
    }

    /// Navigates unless already there. `true` when a fresh page was loaded.
    async fn open(&mut self, target: &Url) -> Result<bool> {
        let current = self.session.current_url().await?;
        if same_location(&current, target) {
            tracing::trace!("Already at {}", target);
            return Ok(false);
        }

        self.session.goto(target).await?;
        Ok(true)
    }

    /// A result equal to `stale` is the previous call's and counts as absent.
    async fn poll(&mut self, text: &str, stale: Option<&str>) -> Result<String> {
        let started = Instant::now();

        for attempt in 1..=self.max_attempts {
            self.attempts = attempt;
            let source = self.session.page_source().await?;
            let result = extract_result(&source, self.variant)
                .filter(|result| Some(result.as_str()) != stale);
            let retry_visible = match (&result, self.variant.retry_selector()) {
                (None, Some(retry)) => self.session.is_displayed(retry).await?,
                _ => false,
            };

            let state = PollState::observe(result.is_some(), retry_visible);
            tracing::trace!("{:?} attempt {}: {:?}", text, attempt, state);
            match (state, result) {
                (PollState::ResultReady, Some(translation)) => return Ok(translation),
                (PollState::RetryAvailable, _) => {
                    tracing::debug!("Retry offered for {:?}, clicking", text);
                    if let Some(retry) = self.variant.retry_selector() {
                        self.session.click(retry).await?;
                    }
                }
                _ => {}
            }

            if attempt < self.max_attempts {
                sleep(self.poll_interval).await;
            }
        }

        tracing::error!(
            "{:?} {:?} after {} attempts",
            text,
            PollState::Failed,
            self.attempts
        );
        Err(FixtureError::TranslationTimeout {
            text: text.to_string(),
            attempts: self.attempts,
            elapsed: started.elapsed(),
        }
        .into())
    }
}
