use super::client::TranslationClient;
use super::session::{BrowserSession, WebDriverSession};
use crate::db::checkpoint::Checkpoint;
use crate::error::FixtureError;
use crate::prelude::*;
use anyhow::anyhow;
use crate::service::driver_service::DriverProcess;
use crate::service::var_service::{BrowserConfig, TranslateConfig};
use std::{
    collections::{BTreeMap, VecDeque},
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{
    sync::{mpsc, watch},
    task::{JoinError, JoinSet},
    time::{sleep_until, Instant},
};

/// A bounded set of translation clients working one shared queue of texts.
pub struct TranslationPool<S: BrowserSession> {
    clients: Vec<TranslationClient<S>>,
    source_lang: String,
    target_lang: String,
    _driver: Option<DriverProcess>,
}

impl TranslationPool<WebDriverSession> {
    pub async fn connect(browser: &BrowserConfig, translate: &TranslateConfig) -> Result<Self> {
        let driver = match &browser.driver_path {
            Some(path) => Some(DriverProcess::spawn(path, &browser.webdriver_url).await?),
            None => None,
        };

        let mut pool = Self::open_sessions(translate, || WebDriverSession::connect(browser)).await?;
        pool._driver = driver;
        Ok(pool)
    }
}

impl<S: BrowserSession + 'static> TranslationPool<S> {
    pub fn from_clients(clients: Vec<TranslationClient<S>>, source_lang: &str, target_lang: &str) -> Self {
        Self {
            clients,
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            _driver: None,
        }
    }

    /// Opens one session per worker. If any fails, the ones already open are
    /// closed before the error is returned.
    async fn open_sessions<F, Fut>(translate: &TranslateConfig, mut connect: F) -> Result<Self>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<S>>,
    {
        let mut pool = Self::from_clients(
            Vec::with_capacity(translate.workers),
            &translate.source_lang,
            &translate.target_lang,
        );
        for _ in 0..translate.workers {
            match connect().await {
                Ok(session) => pool.clients.push(TranslationClient::new(session, translate)),
                Err(e) => {
                    pool.close().await;
                    return Err(e);
                }
            }
        }

        Ok(pool)
    }

    /// Translates every text, then tears every session down whatever the
    /// outcome.
    pub async fn translate_and_close(
        mut self,
        texts: Vec<String>,
        checkpoint: Option<&Checkpoint>,
        deadline: Option<Duration>,
    ) -> Result<BTreeMap<String, String>> {
        let translated = self.translate_all(texts, checkpoint, deadline).await;
        self.close().await;
        translated
    }

    pub async fn translate_all(
        &mut self,
        texts: Vec<String>,
        checkpoint: Option<&Checkpoint>,
        deadline: Option<Duration>,
    ) -> Result<BTreeMap<String, String>> {
        let mut translations = BTreeMap::new();
        if texts.is_empty() {
            return Ok(translations);
        }

        tracing::info!(
            "Translating {} texts with {} workers",
            texts.len(),
            self.clients.len()
        );
        let queue = Arc::new(Mutex::new(VecDeque::from(texts)));
        let cancel = Arc::new(watch::channel(false).0);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();
        let mut workers = JoinSet::new();
        for client in self.clients.drain(..) {
            workers.spawn(work(
                client,
                Arc::clone(&queue),
                self.source_lang.clone(),
                self.target_lang.clone(),
                done_tx.clone(),
                Arc::clone(&cancel),
            ));
        }
        drop(done_tx);

        let expires = deadline.map(|deadline| Instant::now() + deadline);
        let mut expired = false;
        let mut failure = None;
        loop {
            tokio::select! {
                done = done_rx.recv() => match done {
                    Some((text, translation)) => {
                        if let Some(checkpoint) = checkpoint {
                            if let Err(e) = checkpoint.store(&text, &translation).await {
                                cancel.send_replace(true);
                                failure.get_or_insert(e);
                            }
                        }
                        translations.insert(text, translation);
                    }
                    None => break,
                },
                Some(joined) = workers.join_next() => self.rejoin(joined, &cancel, &mut failure),
                _ = sleep_until(expires.unwrap_or_else(Instant::now)), if expires.is_some() && !expired => {
                    tracing::error!("Translation deadline reached, cancelling workers");
                    expired = true;
                    cancel.send_replace(true);
                }
            }
        }

        while let Some(joined) = workers.join_next().await {
            self.rejoin(joined, &cancel, &mut failure);
        }

        if let Some(e) = failure {
            return Err(e);
        }
        if expired {
            if let Some(deadline) = deadline {
                return Err(FixtureError::DeadlineExceeded(deadline).into());
            }
        }

        Ok(translations)
    }

    /// Takes a finished worker's client back. A dead worker cancels the rest.
    fn rejoin(
        &mut self,
        joined: std::result::Result<(TranslationClient<S>, Result<()>), JoinError>,
        cancel: &watch::Sender<bool>,
        failure: &mut Option<anyhow::Error>,
    ) {
        match joined {
            Ok((client, outcome)) => {
                self.clients.push(client);
                if let Err(e) = outcome {
                    failure.get_or_insert(e);
                }
            }
            Err(e) => {
                tracing::error!("Translation worker died: {}", e);
                cancel.send_replace(true);
                failure.get_or_insert(anyhow!("Translation worker died: {}", e));
            }
        }
    }

    /// Closes every session. Failures are logged, not returned, so one stuck
    /// session cannot keep the rest open.
    pub async fn close(&mut self) {
        for client in self.clients.iter_mut() {
            if let Err(e) = client.close().await {
                tracing::error!("Failed to close browser session: {}", e);
            }
        }
    }
}

async fn work<S: BrowserSession>(
    mut client: TranslationClient<S>,
    queue: Arc<Mutex<VecDeque<String>>>,
    source_lang: String,
    target_lang: String,
    done: mpsc::UnboundedSender<(String, String)>,
    cancel: Arc<watch::Sender<bool>>,
) -> (TranslationClient<S>, Result<()>) {
    let mut cancelled = cancel.subscribe();
    let outcome = loop {
        if *cancelled.borrow() {
            break Ok(());
        }

        let next = match queue.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(poisoned) => {
                tracing::error!("Poisoned lock: {:?}", poisoned);
                None
            }
        };
        let Some(text) = next else {
            break Ok(());
        };

        let translated = tokio::select! {
            translated = client.translate(&text, &source_lang, &target_lang) => Some(translated),
            _ = cancelled.changed() => None,
        };
        match translated {
            Some(Ok(translation)) => {
                let _ = done.send((text, translation));
            }
            Some(Err(e)) => {
                cancel.send_replace(true);
                break Err(e);
            }
            None => break Ok(()),
        }
    };

    (client, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::page::Variant;
    use crate::translate::testing::{ScriptedSession, SessionLog, Tick};
    use pretty_assertions::assert_eq;

    fn config(max_attempts: u32) -> TranslateConfig {
        TranslateConfig {
            variant: Variant::DedicatedPage,
            max_attempts,
            poll_interval: Duration::ZERO,
            settle: Duration::ZERO,
            ..TranslateConfig::default()
        }
    }

    fn pool(
        sessions: Vec<ScriptedSession>,
        config: &TranslateConfig,
    ) -> (TranslationPool<ScriptedSession>, Vec<Arc<Mutex<SessionLog>>>) {
        let logs = sessions.iter().map(|session| session.log()).collect();
        let clients = sessions
            .into_iter()
            .map(|session| TranslationClient::new(session, config))
            .collect();
        (TranslationPool::from_clients(clients, "en", "tr"), logs)
    }

    const DICTIONARY: &[(&str, &str)] = &[
        ("Brazil", "Brezilya"),
        ("Chile", "Şili"),
        ("Germany", "Almanya"),
        ("Japan", "Japonya"),
    ];

    #[tokio::test]
    async fn workers_share_the_queue() {
        let sessions = vec![
            ScriptedSession::dictionary(DICTIONARY),
            ScriptedSession::dictionary(DICTIONARY),
        ];
        let (pool, logs) = pool(sessions, &config(5));
        let texts = DICTIONARY.iter().map(|(k, _)| k.to_string()).collect();

        let translations = pool.translate_and_close(texts, None, None).await.unwrap();

        let expected: BTreeMap<String, String> = DICTIONARY
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(translations, expected);
        for log in logs {
            assert!(log.lock().unwrap().closed);
        }
    }

    #[tokio::test]
    async fn timeout_fails_the_batch_and_releases_sessions() {
        let sessions = vec![ScriptedSession::scripted(vec![Tick::Empty; 3])];
        let (pool, logs) = pool(sessions, &config(3));

        let err = pool
            .translate_and_close(vec!["Brazil".to_string()], None, None)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FixtureError>(),
            Some(FixtureError::TranslationTimeout { .. })
        ));
        assert!(logs[0].lock().unwrap().closed);
    }

    #[tokio::test]
    async fn deadline_cancels_in_flight_polling() {
        let mut config = config(u32::MAX);
        config.poll_interval = Duration::from_millis(5);
        config.call_timeout = Duration::from_secs(60);
        let (pool, logs) = pool(vec![ScriptedSession::scripted(Vec::new())], &config);

        let err = pool
            .translate_and_close(
                vec!["Brazil".to_string()],
                None,
                Some(Duration::from_millis(50)),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<FixtureError>(),
            Some(FixtureError::DeadlineExceeded(_))
        ));
        assert!(logs[0].lock().unwrap().closed);
    }

    #[tokio::test]
    async fn dead_worker_still_releases_the_others() {
        let mut config = config(u32::MAX);
        config.poll_interval = Duration::from_millis(5);
        let sessions = vec![
            ScriptedSession::scripted(vec![Tick::Panic]),
            ScriptedSession::scripted(Vec::new()),
        ];
        let (pool, logs) = pool(sessions, &config);

        let err = pool
            .translate_and_close(vec!["Brazil".to_string(), "Chile".to_string()], None, None)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("worker died"));
        assert!(logs[1].lock().unwrap().closed);
    }

    #[tokio::test]
    async fn failed_connect_closes_sessions_already_open() {
        let mut config = config(5);
        config.workers = 3;
        let mut logs = Vec::new();

        let result = TranslationPool::open_sessions(&config, || {
            let session = ScriptedSession::dictionary(DICTIONARY);
            let opened = logs.len();
            logs.push(session.log());
            async move {
                match opened {
                    0 | 1 => Ok(session),
                    _ => Err(anyhow::Error::from(FixtureError::TranslationUnavailable(
                        "refused".to_string(),
                    ))),
                }
            }
        })
        .await;

        let err = match result {
            Ok(_) => panic!("third connect should fail"),
            Err(e) => e,
        };
        assert!(matches!(
            err.downcast_ref::<FixtureError>(),
            Some(FixtureError::TranslationUnavailable(_))
        ));
        assert!(logs[0].lock().unwrap().closed);
        assert!(logs[1].lock().unwrap().closed);
    }

    #[tokio::test]
    async fn empty_batch_makes_no_requests() {
        let (mut pool, logs) = pool(vec![ScriptedSession::dictionary(DICTIONARY)], &config(5));

        let translations = pool.translate_all(Vec::new(), None, None).await.unwrap();

        assert!(translations.is_empty());
        assert_eq!(logs[0].lock().unwrap().polls, 0);
    }
}
