use crate::error::FixtureError;
use crate::prelude::*;
use std::{path::Path, process::Stdio, time::Duration};
use tokio::{
    net::TcpStream,
    process::{Child, Command},
    time::sleep,
};
use url::Url;

const STARTUP_ATTEMPTS: u32 = 50;
const STARTUP_INTERVAL: Duration = Duration::from_millis(100);

/// A chromedriver child process owned by one browser session. Killed when
/// dropped.
pub struct DriverProcess {
    child: Child,
}

impl DriverProcess {
    pub async fn spawn(driver_path: &Path, webdriver_url: &str) -> Result<Self> {
        let (host, port) = driver_address(webdriver_url)?;
        let child = match Command::new(driver_path)
            .arg(format!("--port={}", port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                let err = format!("Failed to spawn {}: {}", driver_path.display(), e);
                tracing::error!(err);
                return Err(FixtureError::TranslationUnavailable(err).into());
            }
        };

        let mut driver = Self { child };
        for _ in 0..STARTUP_ATTEMPTS {
            if TcpStream::connect((host.as_str(), port)).await.is_ok() {
                tracing::debug!("chromedriver listening on {}:{}", host, port);
                return Ok(driver);
            }

            if let Some(status) = driver.child.try_wait()? {
                let err = format!("chromedriver exited during startup: {}", status);
                tracing::error!(err);
                return Err(FixtureError::TranslationUnavailable(err).into());
            }

            sleep(STARTUP_INTERVAL).await;
        }

        let err = format!("chromedriver did not open port {} in time", port);
        tracing::error!(err);
        Err(FixtureError::TranslationUnavailable(err).into())
    }
}

fn driver_address(webdriver_url: &str) -> Result<(String, u16)> {
    let url = Url::parse(webdriver_url)?;
    let host = match url.host_str() {
        Some(host) => host.to_string(),
        None => {
            let err = format!("WEBDRIVER_URL has no host: {}", webdriver_url);
            tracing::error!(err);
            return Err(FixtureError::TranslationUnavailable(err).into());
        }
    };

    Ok((host, url.port_or_known_default().unwrap_or(9515)))
}
