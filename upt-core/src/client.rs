use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::store::{EntryKind, RemoteEntry, RemoteStore, StoreError};

const DEFAULT_BASE_URL: &str = "https://cloud-api.yandex.net";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const LIST_PAGE_SIZE: u32 = 100;
const OPERATION_POLL_ATTEMPTS: u32 = 10;
const OPERATION_POLL_BASE: Duration = Duration::from_millis(250);
const OPERATION_POLL_MAX: Duration = Duration::from_secs(10);

/// What a caller needs to open a [`DiskClient`].
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    pub base_url: String,
    pub token: String,
    pub timeout: Duration,
}

impl ConnectionParams {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// REST disk API client; the production [`RemoteStore`].
pub struct DiskClient {
    http: Client,
    base_url: Url,
    token: String,
    closed: AtomicBool,
}

impl DiskClient {
    pub fn connect(params: &ConnectionParams) -> Result<Self, StoreError> {
        let http = Client::builder().timeout(params.timeout).build()?;
        Ok(Self {
            http,
            base_url: Url::parse(&params.base_url)?,
            token: params.token.clone(),
            closed: AtomicBool::new(false),
        })
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, StoreError> {
        Self::connect(&ConnectionParams::new(token).with_base_url(base_url))
    }

    pub async fn get_resource(&self, path: &str) -> Result<Resource, StoreError> {
        self.ensure_open()?;
        let mut url = self.endpoint("/v1/disk/resources")?;
        url.query_pairs_mut().append_pair("path", path);
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response, path).await
    }

    pub async fn list_directory(
        &self,
        path: &str,
        limit: u32,
        offset: u32,
    ) -> Result<ResourceList, StoreError> {
        self.ensure_open()?;
        let mut url = self.endpoint("/v1/disk/resources")?;
        url.query_pairs_mut()
            .append_pair("path", path)
            .append_pair("limit", &limit.to_string())
            .append_pair("offset", &offset.to_string());
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        let payload: ResourceListResponse = Self::handle_response(response, path).await?;
        // A file has no embedded listing; it is not a directory we can list.
        payload
            .embedded
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    pub async fn list_directory_all(&self, path: &str) -> Result<Vec<Resource>, StoreError> {
        let mut offset = 0u32;
        let mut items = Vec::new();
        loop {
            let page = self.list_directory(path, LIST_PAGE_SIZE, offset).await?;
            let received = page.items.len() as u32;
            offset = offset.saturating_add(received);
            items.extend(page.items);
            if received == 0 || offset >= page.total {
                break;
            }
        }
        Ok(items)
    }

    pub async fn get_upload_link(&self, path: &str) -> Result<TransferLink, StoreError> {
        self.ensure_open()?;
        let mut url = self.endpoint("/v1/disk/resources/upload")?;
        url.query_pairs_mut()
            .append_pair("path", path)
            .append_pair("overwrite", "true");
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response, path).await
    }

    pub async fn get_download_link(&self, path: &str) -> Result<TransferLink, StoreError> {
        self.ensure_open()?;
        let mut url = self.endpoint("/v1/disk/resources/download")?;
        url.query_pairs_mut().append_pair("path", path);
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response, path).await
    }

    async fn delete_resource(&self, path: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut url = self.endpoint("/v1/disk/resources")?;
        url.query_pairs_mut()
            .append_pair("path", path)
            .append_pair("permanently", "true");
        let response = self
            .http
            .delete(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(());
        }
        let link: TransferLink = Self::handle_response(response, path).await?;
        self.wait_for_operation(link.href.as_str(), path).await
    }

    async fn wait_for_operation(&self, operation_url: &str, path: &str) -> Result<(), StoreError> {
        for attempt in 0..OPERATION_POLL_ATTEMPTS {
            let url = Url::parse(operation_url)?;
            let response = self
                .http
                .get(url)
                .header("Authorization", self.auth_header_value())
                .send()
                .await?;
            let info: OperationInfo = Self::handle_response(response, path).await?;
            match info.status {
                OperationStatus::Success => return Ok(()),
                OperationStatus::Failure => {
                    return Err(StoreError::OperationFailed(path.to_string()));
                }
                OperationStatus::InProgress => {
                    debug!(path, attempt, "remote operation still in progress");
                    tokio::time::sleep(poll_delay(attempt)).await;
                }
            }
        }
        Err(StoreError::OperationFailed(path.to_string()))
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn auth_header_value(&self) -> String {
        format!("OAuth {}", self.token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        Ok(self.base_url.join(path)?)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        path: &str,
    ) -> Result<T, StoreError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(Self::status_error(response, path).await)
        }
    }

    async fn status_error(response: reqwest::Response, path: &str) -> StoreError {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return StoreError::NotFound(path.to_string());
        }
        let body = response.text().await.unwrap_or_default();
        StoreError::Api { status, body }
    }
}

#[async_trait]
impl RemoteStore for DiskClient {
    async fn list_entries(&self, path: &str) -> Result<Vec<RemoteEntry>, StoreError> {
        let items = self.list_directory_all(path).await?;
        Ok(items.into_iter().map(RemoteEntry::from).collect())
    }

    async fn make_directory(&self, path: &str) -> Result<(), StoreError> {
        self.ensure_open()?;
        let mut url = self.endpoint("/v1/disk/resources")?;
        url.query_pairs_mut().append_pair("path", path);
        let response = self
            .http
            .put(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let err = Self::status_error(response, path).await;
        // 409 covers both "already exists" and "parent missing".
        if status == StatusCode::CONFLICT {
            match self.get_resource(path).await {
                Ok(resource) if resource.resource_type == ResourceType::Dir => return Ok(()),
                Ok(_) => return Err(StoreError::Conflict(path.to_string())),
                Err(_) => return Err(err),
            }
        }
        Err(err)
    }

    async fn store_file(&self, path: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let link = self.get_upload_link(path).await?;
        let response = self.http.put(link.href).body(bytes).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::status_error(response, path).await)
        }
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let link = self.get_download_link(path).await?;
        let response = self.http.get(link.href).send().await?;
        if !response.status().is_success() {
            return Err(Self::status_error(response, path).await);
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn delete_file(&self, path: &str) -> Result<(), StoreError> {
        self.delete_resource(path).await
    }

    async fn remove_directory(&self, path: &str) -> Result<(), StoreError> {
        self.delete_resource(path).await
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

fn poll_delay(attempt: u32) -> Duration {
    let base_ms = OPERATION_POLL_BASE.as_millis() as u64;
    let max_ms = OPERATION_POLL_MAX.as_millis() as u64;
    Duration::from_millis(base_ms.saturating_mul(1u64 << attempt.min(16)).min(max_ms))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Resource {
    pub path: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default)]
    pub size: Option<u64>,
}

impl From<Resource> for RemoteEntry {
    fn from(resource: Resource) -> Self {
        let kind = match resource.resource_type {
            ResourceType::File => EntryKind::File,
            ResourceType::Dir => EntryKind::Dir,
        };
        Self {
            name: resource.name,
            kind,
            size: resource.size,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    File,
    Dir,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum OperationStatus {
    Success,
    Failure,
    InProgress,
}

#[derive(Debug, Deserialize, Serialize)]
struct OperationInfo {
    status: OperationStatus,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ResourceList {
    pub items: Vec<Resource>,
    pub limit: u32,
    pub offset: u32,
    pub total: u32,
}

#[derive(Debug, Deserialize, Serialize)]
struct ResourceListResponse {
    #[serde(rename = "_embedded")]
    embedded: Option<ResourceList>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TransferLink {
    pub href: Url,
    pub method: String,
    #[serde(default)]
    pub templated: bool,
}
