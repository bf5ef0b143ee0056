//! HTTP client for the reference manager's local connector server.
//!
//! Talks to the two plugin endpoints: one lists candidate attachments for a
//! filter, the other returns a single file as base64.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AppError, Document, FetchedFile, MimeType, Result, SourceConfig, SourceQuery,
    SourceRepository,
};

const LIST_PATH: &str = "/notebooklm/list";
const FILE_PATH: &str = "/notebooklm/file";

/// Header the connector requires on every request.
const ALLOWED_REQUEST_HEADER: &str = "Zotero-Allowed-Request";

/// Ids arrive as numbers from the plugin but are opaque to us.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireId {
    Number(i64),
    Text(String),
}

impl WireId {
    fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

/// One record of the list response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListedItem {
    id: WireId,
    #[serde(default)]
    parent_id: Option<WireId>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    fingerprint: Option<String>,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    date_modified: Option<String>,
    #[serde(default)]
    version: Option<u64>,
}

impl ListedItem {
    /// Convert to a document, or `None` when the type is not accepted.
    fn into_document(self) -> Option<Document> {
        let mime_type: MimeType = match self.mime_type.parse() {
            Ok(mime) => mime,
            Err(_) => {
                tracing::debug!(mime = %self.mime_type, "Skipping unsupported attachment type");
                return None;
            }
        };

        let id = self.id.into_string();
        let modified_at = match (self.date_modified, self.version) {
            (Some(date), _) if !date.trim().is_empty() => date,
            (_, Some(version)) => format!("v{version}"),
            _ => String::new(),
        };

        Some(Document {
            filename: self
                .filename
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| format!("attachment-{id}")),
            id,
            parent_id: self.parent_id.map(WireId::into_string).unwrap_or_default(),
            title: self.title.unwrap_or_default(),
            mime_type,
            fingerprint: [self.fingerprint, self.hash]
                .into_iter()
                .flatten()
                .find(|value| !value.is_empty())
                .unwrap_or_default(),
            modified_at,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    collection_name: Option<&'a str>,
    #[serde(rename = "libraryID", skip_serializing_if = "Option::is_none")]
    library_id: Option<&'a str>,
}

impl<'a> From<&'a SourceQuery> for ListRequest<'a> {
    fn from(query: &'a SourceQuery) -> Self {
        Self {
            tag: query.tag.as_deref(),
            collection_name: query.collection_name.as_deref(),
            library_id: query.library_id.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
struct FileRequest<'a> {
    id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResponse {
    success: bool,
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

/// Parse a list response body into accepted documents, keeping source order.
///
/// Malformed records are skipped with a warning; they do not fail the list.
///
/// # Errors
/// Returns error if the body is not a JSON array.
pub fn parse_list_response(body: &str) -> Result<Vec<Document>> {
    let records: Vec<serde_json::Value> =
        serde_json::from_str(body).map_err(AppError::json_parse)?;

    Ok(records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| {
            match serde_json::from_value::<ListedItem>(record) {
                Ok(item) => item.into_document(),
                Err(e) => {
                    tracing::warn!(index, error = %e, "Skipping malformed list record");
                    None
                }
            }
        })
        .collect())
}

/// Parse a file response body for document `id`.
///
/// # Errors
/// Returns `NotFound` on `success: false` and `InvalidData` on bad base64.
pub fn parse_file_response(id: &str, body: &str) -> Result<FetchedFile> {
    let response: FileResponse = serde_json::from_str(body).map_err(AppError::json_parse)?;

    let data = match (response.success, response.data) {
        (true, Some(data)) => data,
        _ => return Err(AppError::not_found(format!("attachment {id}"))),
    };

    let bytes = STANDARD.decode(data.trim()).map_err(|e| AppError::InvalidData {
        message: format!("attachment {id} is not valid base64: {e}"),
    })?;

    Ok(FetchedFile {
        bytes,
        mime_type: response.mime_type,
    })
}

/// Source repository backed by the connector HTTP endpoints.
pub struct ZoteroClient {
    client: Client,
    base_url: String,
}

impl ZoteroClient {
    /// Create a client for the configured connector.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::http("Failed to build HTTP client", e))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(StatusCode, String)> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .header(ALLOWED_REQUEST_HEADER, "true")
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::http(format!("Request to {url} failed"), e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::http(format!("Failed to read response from {url}"), e))?;

        Ok((status, text))
    }
}

#[async_trait]
impl SourceRepository for ZoteroClient {
    async fn query(&self, query: &SourceQuery) -> Result<Vec<Document>> {
        let (status, body) = self.post(LIST_PATH, &ListRequest::from(query)).await?;

        if !status.is_success() {
            return Err(AppError::Http {
                message: format!("{status} - {}", body.trim()),
                source: None,
            });
        }

        let documents = parse_list_response(&body)?;
        tracing::debug!(count = documents.len(), "Listed candidates");
        Ok(documents)
    }

    async fn fetch(&self, id: &str) -> Result<FetchedFile> {
        let (status, body) = self.post(FILE_PATH, &FileRequest { id }).await?;

        match status {
            StatusCode::NOT_FOUND => Err(AppError::not_found(format!(
                "attachment {id}: {}",
                body.trim()
            ))),
            s if !s.is_success() => Err(AppError::Http {
                message: format!("{s} - {}", body.trim()),
                source: None,
            }),
            _ => parse_file_response(id, &body),
        }
    }
}
