use super::page::PAGE_RETRY;
use super::session::BrowserSession;
use crate::prelude::*;
use async_trait::async_trait;
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Empty,
    Retry,
    Result(&'static str),
    /// Panics the task polling the page.
    Panic,
}

#[derive(Debug, Default)]
pub struct SessionLog {
    pub gotos: Vec<Url>,
    pub fills: Vec<String>,
    pub polls: u32,
    pub clicks: u32,
    pub closed: bool,
}

/// Renders pages from a fixed tick script, then from a text -> translation
/// dictionary keyed by the last typed text or the `text` URL parameter.
pub struct ScriptedSession {
    script: VecDeque<Tick>,
    dictionary: HashMap<String, String>,
    current: Tick,
    url: Url,
    log: Arc<Mutex<SessionLog>>,
}

impl ScriptedSession {
    pub fn scripted(script: Vec<Tick>) -> Self {
        Self::new(script.into(), HashMap::new())
    }

    pub fn dictionary(entries: &[(&str, &str)]) -> Self {
        let dictionary = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::new(VecDeque::new(), dictionary)
    }

    fn new(script: VecDeque<Tick>, dictionary: HashMap<String, String>) -> Self {
        Self {
            script,
            dictionary,
            current: Tick::Empty,
            url: Url::parse("about:blank").unwrap(),
            log: Arc::new(Mutex::new(SessionLog::default())),
        }
    }

    pub fn log(&self) -> Arc<Mutex<SessionLog>> {
        Arc::clone(&self.log)
    }

    fn current_text(&self) -> Option<String> {
        let log = self.log.lock().unwrap();
        match log.fills.last() {
            Some(text) => Some(text.clone()),
            None => self
                .url
                .query_pairs()
                .find(|(k, _)| k == "text")
                .map(|(_, v)| v.into_owned()),
        }
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn current_url(&mut self) -> Result<Url> {
        Ok(self.url.clone())
    }

    async fn goto(&mut self, url: &Url) -> Result<()> {
        self.url = url.clone();
        self.log.lock().unwrap().gotos.push(url.clone());
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String> {
        self.log.lock().unwrap().polls += 1;
        let body = match self.script.pop_front() {
            Some(tick) => {
                self.current = tick;
                match tick {
                    Tick::Empty => String::new(),
                    Tick::Retry => "<button jsname=\"s3WOVd\">Try again</button>".to_string(),
                    Tick::Result(text) => result_html(text),
                    Tick::Panic => panic!("scripted session panicked"),
                }
            }
            None => {
                self.current = Tick::Empty;
                match self.current_text().and_then(|text| self.dictionary.get(&text)) {
                    Some(translation) => result_html(translation),
                    None => String::new(),
                }
            }
        };

        Ok(format!("<html><body>{}</body></html>", body))
    }

    async fn is_displayed(&mut self, css: &str) -> Result<bool> {
        Ok(css == PAGE_RETRY && self.current == Tick::Retry)
    }

    async fn click(&mut self, _css: &str) -> Result<()> {
        self.log.lock().unwrap().clicks += 1;
        Ok(())
    }

    async fn fill(&mut self, _css: &str, text: &str) -> Result<()> {
        self.log.lock().unwrap().fills.push(text.to_string());
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.log.lock().unwrap().closed = true;
        Ok(())
    }
}

fn result_html(text: &str) -> String {
    format!(
        "<div id=\"tw-target-text\"><span>{0}</span></div><span jsname=\"W297wb\">{0}</span>",
        text
    )
}
