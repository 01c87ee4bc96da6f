use crate::transport::{Outcome, Settle, Transport};
use anyhow::{Context, Result};
use tokio::runtime::Handle;
use url::Url;

/// Fires beacons as plain HTTP GET requests on a tokio runtime.
///
/// Mirrors what a browser does with an image source: relative references are
/// resolved against an optional base, the body is read and thrown away, and a
/// non-2xx status counts as an error. There are no retries and no timeout.
#[derive(Clone)]
pub struct Http {
    client: reqwest::Client,
    runtime: Handle,
    base: Option<Url>,
}

impl Http {
    pub fn new(runtime: Handle) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("failed to build http client")?;
        Ok(Http {
            client,
            runtime,
            base: None,
        })
    }

    /// Bind to the tokio runtime the caller is running on.
    pub fn current() -> Result<Self> {
        let runtime = Handle::try_current().context("http transport requires a tokio runtime")?;
        Self::new(runtime)
    }

    pub fn with_base(mut self, base: Url) -> Self {
        self.base = Some(base);
        self
    }

    fn locate(&self, url: &str) -> Result<Url> {
        Url::options()
            .base_url(self.base.as_ref())
            .parse(url)
            .with_context(|| format!("invalid beacon url: {url}"))
    }
}

impl Transport for Http {
    fn fire(&self, url: String, settle: Settle) {
        let target = match self.locate(&url) {
            Ok(target) => target,
            Err(_err) => {
                #[cfg(debug_assertions)]
                log::debug!("beacon not sent: {_err:#}");

                settle.settle(Outcome::Errored);
                return;
            }
        };

        let client = self.client.clone();
        self.runtime.spawn(async move {
            let outcome = get(&client, target).await;
            settle.settle(outcome);
        });
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

async fn get(client: &reqwest::Client, target: Url) -> Outcome {
    match client.get(target).send().await {
        Ok(resp) => {
            let status = resp.status();
            // Drain the body so the connection goes back to the pool.
            let _ = resp.bytes().await;
            if status.is_success() {
                Outcome::Loaded
            } else {
                #[cfg(debug_assertions)]
                log::debug!("beacon rejected with status: {status}");

                Outcome::Errored
            }
        }
        Err(_err) => {
            #[cfg(debug_assertions)]
            log::debug!("beacon request failed: {_err}");

            Outcome::Errored
        }
    }
}
