//! HEAD-request probe transport backed by reqwest.

use std::error::Error;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::Client;
use tether_core::ProbeTransport;

/// Issues `HEAD` requests without following redirects.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    /// Build a probe client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ProbeTransport for HttpProbe {
    async fn head(&self, url: &str) -> Result<u16, Box<dyn Error + Send + Sync>> {
        let response = self.client.head(url).send().await?;
        Ok(response.status().as_u16())
    }
}
