use std::time::Duration;

use anyhow::Context;
use reqwest::{Client, Url};

use crate::error::DirectoryError;

const BOM: char = '\u{feff}';

/// Thin wrapper over a shared reqwest client: one GET, whole body as text.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    /// `timeout` of `None` keeps the transport default.
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("failed to build reqwest client")?;
        Ok(Self { client })
    }

    pub async fn fetch_text(&self, url: Url) -> Result<String, DirectoryError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        let mut text = String::from_utf8(body.to_vec()).map_err(|_| DirectoryError::Decode)?;
        if text.starts_with(BOM) {
            text.drain(..BOM.len_utf8());
        }
        Ok(text)
    }
}
