use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ShellError};

/// The JSON document describing the latest published build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDescriptor {
    pub version: String,
    pub apk_url: String,
    pub changelog: String,
}

impl UpdateDescriptor {
    pub fn parse(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }
}

/// Where update descriptors come from.
pub trait DescriptorSource: Send + Sync {
    fn fetch(&self) -> BoxFuture<'_, Result<UpdateDescriptor>>;
}

pub struct HttpDescriptorSource {
    client: Client,
    url: String,
    timeout: Duration,
}

impl HttpDescriptorSource {
    pub fn new(client: Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    async fn fetch_descriptor(&self) -> Result<UpdateDescriptor> {
        debug!("Fetching update descriptor from {}", self.url);
        let response = self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ShellError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        UpdateDescriptor::parse(&body)
    }
}

impl DescriptorSource for HttpDescriptorSource {
    fn fetch(&self) -> BoxFuture<'_, Result<UpdateDescriptor>> {
        Box::pin(self.fetch_descriptor())
    }
}
