//! Azure Blob Storage REST client: single-container object operations with
//! Shared Key authorization.

use bytes::Bytes;
use chrono::Utc;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use crate::config::AzureStorageConfig;
use crate::error::{AppError, Result};
use crate::storage::azure::signer::{RequestSigner, SharedKeyCredential, API_VERSION};
use crate::storage::provider::{Precondition, PutOptions, Revision};

static BLOB_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Name>([^<]+)</Name>").unwrap());

#[derive(Clone)]
pub struct AzureClient {
    account: String,
    container: String,
    endpoint: String,
    credential: Option<SharedKeyCredential>,
    http: reqwest::Client,
}

impl AzureClient {
    pub fn new(config: &AzureStorageConfig, container: &str) -> Result<Self> {
        let endpoint = if config.endpoint.is_empty() {
            format!("https://{}.blob.core.windows.net", config.account)
        } else {
            config.endpoint.trim_end_matches('/').to_string()
        };

        let credential = if config.access_key.is_empty() {
            tracing::warn!("No storage access key configured; requests are unsigned");
            None
        } else {
            Some(SharedKeyCredential::from_base64(
                &config.account,
                &config.access_key,
            )?)
        };

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(AppError::Request)?;

        Ok(Self {
            account: config.account.clone(),
            container: container.to_string(),
            endpoint,
            credential,
            http,
        })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn blob_url(&self, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint,
            self.container,
            urlencoding::encode(name)
        )
    }

    fn container_url(&self) -> String {
        format!("{}/{}", self.endpoint, self.container)
    }

    /// Headers every request carries; both go into the canonical string.
    fn common_ms_headers(&self) -> Vec<(String, String)> {
        let now = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        vec![
            ("x-ms-date".to_string(), now),
            ("x-ms-version".to_string(), API_VERSION.to_string()),
        ]
    }

    /// `/{account}/{container}[/{blob}]` plus sorted `key:value` query lines.
    fn canonical_resource(&self, blob: Option<&str>, query: &[(&str, &str)]) -> String {
        let mut resource = match blob {
            Some(name) => format!("/{}/{}/{}", self.account, self.container, name),
            None => format!("/{}/{}", self.account, self.container),
        };
        let mut sorted: Vec<&(&str, &str)> = query.iter().collect();
        sorted.sort_by_key(|(k, _)| *k);
        for (k, v) in sorted {
            resource.push_str(&format!("\n{}:{}", k, v));
        }
        resource
    }

    fn header_map(
        &self,
        ms_headers: &[(String, String)],
        authorization: Option<String>,
    ) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (k, v) in ms_headers {
            headers.insert(
                HeaderName::from_str(k)
                    .map_err(|e| AppError::Internal(format!("Bad header name {}: {}", k, e)))?,
                HeaderValue::from_str(v)
                    .map_err(|e| AppError::Internal(format!("Bad header value: {}", e)))?,
            );
        }
        if let Some(auth) = authorization {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth)
                    .map_err(|e| AppError::Internal(format!("Bad auth header: {}", e)))?,
            );
        }
        Ok(headers)
    }

    fn etag_revision(headers: &reqwest::header::HeaderMap) -> Revision {
        let etag = headers
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        Revision::new(etag)
    }

    pub async fn put_blob(&self, name: &str, data: Bytes, opts: &PutOptions) -> Result<Revision> {
        let mut ms_headers = self.common_ms_headers();
        ms_headers.push(("x-ms-blob-type".to_string(), "BlockBlob".to_string()));
        if let Some(cache_control) = &opts.cache_control {
            ms_headers.push(("x-ms-blob-cache-control".to_string(), cache_control.clone()));
        }

        let (if_match, if_none_match) = match &opts.precondition {
            Precondition::Any => (String::new(), String::new()),
            Precondition::IfAbsent => (String::new(), "*".to_string()),
            Precondition::IfRevision(rev) => (rev.as_str().to_string(), String::new()),
        };

        let mut headers = if let Some(credential) = &self.credential {
            let auth = RequestSigner::new("put", self.canonical_resource(Some(name), &[]))
                .content(data.len(), &opts.content_type)
                .conditions(&if_match, &if_none_match)
                .ms_headers(&ms_headers)
                .authorization(credential);
            self.header_map(&ms_headers, Some(auth))?
        } else {
            self.header_map(&ms_headers, None)?
        };
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(&opts.content_type)
                .map_err(|e| AppError::Internal(format!("Bad content type: {}", e)))?,
        );
        if !if_match.is_empty() {
            headers.insert(
                "If-Match",
                HeaderValue::from_str(&if_match)
                    .map_err(|e| AppError::Internal(format!("Bad If-Match: {}", e)))?,
            );
        }
        if !if_none_match.is_empty() {
            headers.insert("If-None-Match", HeaderValue::from_static("*"));
        }

        let resp = self
            .http
            .put(self.blob_url(name))
            .headers(headers)
            .body(data)
            .send()
            .await?;

        match resp.status().as_u16() {
            200..=299 => Ok(Self::etag_revision(resp.headers())),
            409 | 412 => Err(AppError::Conflict(format!(
                "Write precondition failed for {}",
                name
            ))),
            status => Err(AppError::StorageUnavailable(format!(
                "Put {} failed with status {}",
                name, status
            ))),
        }
    }

    pub async fn get_blob(&self, name: &str) -> Result<Option<(Bytes, Revision)>> {
        let ms_headers = self.common_ms_headers();
        let headers = if let Some(credential) = &self.credential {
            let auth = RequestSigner::new("get", self.canonical_resource(Some(name), &[]))
                .ms_headers(&ms_headers)
                .authorization(credential);
            self.header_map(&ms_headers, Some(auth))?
        } else {
            self.header_map(&ms_headers, None)?
        };

        let resp = self
            .http
            .get(self.blob_url(name))
            .headers(headers)
            .send()
            .await?;

        match resp.status().as_u16() {
            200..=299 => {
                let revision = Self::etag_revision(resp.headers());
                let data = resp.bytes().await?;
                Ok(Some((data, revision)))
            }
            404 => Ok(None),
            status => Err(AppError::StorageUnavailable(format!(
                "Get {} failed with status {}",
                name, status
            ))),
        }
    }

    pub async fn delete_blob(&self, name: &str) -> Result<()> {
        let ms_headers = self.common_ms_headers();
        let headers = if let Some(credential) = &self.credential {
            let auth = RequestSigner::new("delete", self.canonical_resource(Some(name), &[]))
                .ms_headers(&ms_headers)
                .authorization(credential);
            self.header_map(&ms_headers, Some(auth))?
        } else {
            self.header_map(&ms_headers, None)?
        };

        let resp = self
            .http
            .delete(self.blob_url(name))
            .headers(headers)
            .send()
            .await?;

        match resp.status().as_u16() {
            200..=299 | 404 => Ok(()),
            status => Err(AppError::StorageUnavailable(format!(
                "Delete {} failed with status {}",
                name, status
            ))),
        }
    }

    pub async fn head_blob(&self, name: &str) -> Result<bool> {
        let ms_headers = self.common_ms_headers();
        let headers = if let Some(credential) = &self.credential {
            let auth = RequestSigner::new("head", self.canonical_resource(Some(name), &[]))
                .ms_headers(&ms_headers)
                .authorization(credential);
            self.header_map(&ms_headers, Some(auth))?
        } else {
            self.header_map(&ms_headers, None)?
        };

        let resp = self
            .http
            .head(self.blob_url(name))
            .headers(headers)
            .send()
            .await?;

        match resp.status().as_u16() {
            200..=299 => Ok(true),
            404 => Ok(false),
            status => Err(AppError::StorageUnavailable(format!(
                "Head {} failed with status {}",
                name, status
            ))),
        }
    }

    pub async fn list_blobs(&self, prefix: Option<&str>) -> Result<Vec<String>> {
        let mut query: Vec<(&str, &str)> = vec![("restype", "container"), ("comp", "list")];
        if let Some(p) = prefix {
            query.push(("prefix", p));
        }

        let ms_headers = self.common_ms_headers();
        let headers = if let Some(credential) = &self.credential {
            let auth = RequestSigner::new("get", self.canonical_resource(None, &query))
                .ms_headers(&ms_headers)
                .authorization(credential);
            self.header_map(&ms_headers, Some(auth))?
        } else {
            self.header_map(&ms_headers, None)?
        };

        let mut url = format!("{}?restype=container&comp=list", self.container_url());
        if let Some(p) = prefix {
            url.push_str(&format!("&prefix={}", urlencoding::encode(p)));
        }

        let resp = self.http.get(url).headers(headers).send().await?;
        if !resp.status().is_success() {
            return Err(AppError::StorageUnavailable(format!(
                "List blobs failed with status {}",
                resp.status()
            )));
        }

        let body = resp.text().await?;
        Ok(BLOB_NAME_RE
            .captures_iter(&body)
            .map(|c| c[1].to_string())
            .collect())
    }

    /// Create the container if it does not exist yet.
    pub async fn ensure_container(&self) -> Result<()> {
        let query: Vec<(&str, &str)> = vec![("restype", "container")];
        let ms_headers = self.common_ms_headers();
        let headers = if let Some(credential) = &self.credential {
            let auth = RequestSigner::new("put", self.canonical_resource(None, &query))
                .ms_headers(&ms_headers)
                .authorization(credential);
            self.header_map(&ms_headers, Some(auth))?
        } else {
            self.header_map(&ms_headers, None)?
        };

        let url = format!("{}?restype=container", self.container_url());
        let resp = self.http.put(url).headers(headers).send().await?;

        match resp.status().as_u16() {
            200..=299 => {
                tracing::info!("Created container {}", self.container);
                Ok(())
            }
            409 => Ok(()),
            status => Err(AppError::StorageUnavailable(format!(
                "Create container {} failed with status {}",
                self.container, status
            ))),
        }
    }

    /// Presigned read URL; plain URL when no credential is configured.
    pub fn presigned_url(&self, name: &str, valid_for: Duration) -> String {
        let base = self.blob_url(name);
        match &self.credential {
            Some(credential) => {
                let expiry = Utc::now()
                    + chrono::Duration::seconds(valid_for.as_secs().min(i64::MAX as u64) as i64);
                let query = credential.sas_query(&self.container, name, expiry);
                format!("{}?{}", base, query)
            }
            None => base,
        }
    }
}
