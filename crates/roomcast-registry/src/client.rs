//! Mountpoint registry HTTP client

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{RegistryError, Result};
use crate::store::{CreateMountpoint, Mountpoint};
use crate::MountpointRegistry;

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    #[serde(default)]
    data: Vec<Mountpoint>,
}

#[derive(Debug, Deserialize)]
struct ItemEnvelope {
    data: Mountpoint,
}

/// Client for a remote [`RegistryServer`](crate::RegistryServer).
pub struct RegistryClient {
    base_url: String,
    client: reqwest::Client,
}

impl RegistryClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/mountpoints", self.base_url)
    }

    async fn rejection(response: reqwest::Response) -> RegistryError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        RegistryError::Rejected { status, message }
    }
}

#[async_trait]
impl MountpointRegistry for RegistryClient {
    async fn create(&self, request: CreateMountpoint) -> Result<Mountpoint> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        let envelope: ItemEnvelope = response.json().await?;
        Ok(envelope.data)
    }

    async fn list(&self) -> Result<Vec<Mountpoint>> {
        let response = self.client.get(self.endpoint()).send().await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        let envelope: ListEnvelope = response.json().await?;
        Ok(envelope.data)
    }

    async fn delete(&self, id: u64) -> Result<Mountpoint> {
        let url = format!("{}?id={}", self.endpoint(), id);
        let response = self.client.delete(&url).send().await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }
        let envelope: ItemEnvelope = response.json().await?;
        Ok(envelope.data)
    }
}
