use crate::error::FixtureError;
use crate::prelude::*;
use crate::service::var_service::BrowserConfig;
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};
use url::Url;

/// The handful of browser operations the poll protocol needs.
#[async_trait]
pub trait BrowserSession: Send {
    async fn current_url(&mut self) -> Result<Url>;
    async fn goto(&mut self, url: &Url) -> Result<()>;
    async fn page_source(&mut self) -> Result<String>;
    /// `false` when nothing matches `css`.
    async fn is_displayed(&mut self, css: &str) -> Result<bool>;
    async fn click(&mut self, css: &str) -> Result<()>;
    /// Clears the input matched by `css` and types `text` into it.
    async fn fill(&mut self, css: &str, text: &str) -> Result<()>;
    async fn close(&mut self) -> Result<()>;
}

pub struct WebDriverSession {
    client: Option<Client>,
}

impl WebDriverSession {
    pub async fn connect(config: &BrowserConfig) -> Result<Self> {
        let client = match ClientBuilder::native()
            .capabilities(chrome_capabilities(config.headless))
            .connect(&config.webdriver_url)
            .await
        {
            Ok(client) => client,
            Err(e) => {
                let err = format!("{} ({})", e, config.webdriver_url);
                tracing::error!("Failed to start browser session: {}", err);
                return Err(FixtureError::TranslationUnavailable(err).into());
            }
        };
        tracing::info!("Browser session started at {}", config.webdriver_url);

        Ok(Self {
            client: Some(client),
        })
    }

    fn client(&self) -> Result<&Client> {
        match &self.client {
            Some(client) => Ok(client),
            None => Err(FixtureError::TranslationUnavailable("session already closed".into()).into()),
        }
    }
}

fn chrome_capabilities(headless: bool) -> Map<String, Value> {
    let mut args = vec!["--start-maximized", "--window-size=1920,1080"];
    if headless {
        args.push("--headless=new");
    }

    let mut capabilities = Map::new();
    capabilities.insert("browserName".to_string(), json!("chrome"));
    capabilities.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
    capabilities
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn current_url(&mut self) -> Result<Url> {
        Ok(self.client()?.current_url().await?)
    }

    async fn goto(&mut self, url: &Url) -> Result<()> {
        Ok(self.client()?.goto(url.as_str()).await?)
    }

    async fn page_source(&mut self) -> Result<String> {
        Ok(self.client()?.source().await?)
    }

    async fn is_displayed(&mut self, css: &str) -> Result<bool> {
        match self.client()?.find(Locator::Css(css)).await {
            Ok(element) => Ok(element.is_displayed().await?),
            Err(e) if e.is_no_such_element() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn click(&mut self, css: &str) -> Result<()> {
        self.client()?.find(Locator::Css(css)).await?.click().await?;
        Ok(())
    }

    async fn fill(&mut self, css: &str, text: &str) -> Result<()> {
        let element = self.client()?.find(Locator::Css(css)).await?;
        element.clear().await?;
        element.send_keys(text).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            client.close().await?;
            tracing::info!("Browser session closed");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_driver_is_unavailable() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = BrowserConfig {
            webdriver_url: format!("http://127.0.0.1:{}", port),
            driver_path: None,
            headless: true,
        };

        let err = match WebDriverSession::connect(&config).await {
            Ok(_) => panic!("connected to a closed port"),
            Err(e) => e,
        };

        assert!(matches!(
            err.downcast_ref::<FixtureError>(),
            Some(FixtureError::TranslationUnavailable(_))
        ));
    }

    #[test]
    fn headless_flag_adds_argument() {
        let capabilities = chrome_capabilities(true);
        let args = capabilities["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.contains(&json!("--headless=new")));
        assert!(args.contains(&json!("--start-maximized")));

        let capabilities = chrome_capabilities(false);
        let args = capabilities["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(!args.contains(&json!("--headless=new")));
    }
}
