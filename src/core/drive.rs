//! Google Drive v3 REST client.
//!
//! Only the calls the backup pipeline needs: folder lookup/creation, file
//! upload (multipart or resumable), listing a folder, deletion and the
//! `about` quota query.

use std::path::Path;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::core::http::check_drive_response;
use crate::error::{GdabError, Result};
use crate::storage::Endpoints;

/// MIME type Drive uses for folders.
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// Files above this size use a resumable session.
pub const RESUMABLE_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Size of each resumable chunk.
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// Consecutive 308 replies that store nothing before a resumable upload is abandoned.
const MAX_STALLED_CHUNKS: u32 = 3;

const PAGE_SIZE: &str = "1000";
const LIST_FIELDS: &str = "nextPageToken,files(id,name,createdTime,mimeType)";
const MULTIPART_BOUNDARY: &str = "gdab_multipart_boundary_b8a1f3";

/// A file or folder in Drive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// Result of resolving the backup folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRef {
    pub id: String,
    /// Whether the folder had to be created.
    pub created: bool,
}

/// How a file is sent to Drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    /// One `multipart/related` request.
    Multipart,
    /// Resumable session, fixed-size chunks.
    Resumable,
}

impl UploadStrategy {
    /// Files strictly larger than `threshold` are chunked.
    #[must_use]
    pub const fn for_size(size: u64, threshold: u64) -> Self {
        if size > threshold {
            Self::Resumable
        } else {
            Self::Multipart
        }
    }
}

/// A completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub strategy: UploadStrategy,
}

/// Connected account and storage quota.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct About {
    #[serde(default)]
    pub user: Option<DriveUser>,
    #[serde(default)]
    pub storage_quota: StorageQuota,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveUser {
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Quota in bytes. Drive sends these as decimal strings; `limit` is absent
/// for unlimited accounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct StorageQuota {
    #[serde(default, deserialize_with = "u64_from_string")]
    pub limit: u64,
    #[serde(default, deserialize_with = "u64_from_string")]
    pub usage: u64,
}

fn u64_from_string<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s.parse().unwrap_or(0),
        serde_json::Value::Number(n) => n.as_u64().unwrap_or(0),
        _ => 0,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

/// Drive operations used by the backup pipeline.
#[allow(async_fn_in_trait)]
pub trait DriveApi {
    /// First non-trashed folder named `name`.
    async fn find_folder(&self, name: &str) -> Result<Option<String>>;

    async fn create_folder(&self, name: &str) -> Result<String>;

    /// Upload `path` as `name` into `parent_id`.
    async fn upload_file(
        &self,
        path: &Path,
        name: &str,
        mime_type: &str,
        parent_id: &str,
    ) -> Result<UploadedFile>;

    /// Every non-trashed child of `folder_id`, across all pages.
    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteFile>>;

    async fn delete_file(&self, file_id: &str) -> Result<()>;

    async fn about(&self) -> Result<About>;

    /// Strategy [`DriveApi::upload_file`] will use for a file of `size` bytes.
    fn upload_strategy(&self, size: u64) -> UploadStrategy {
        UploadStrategy::for_size(size, RESUMABLE_THRESHOLD)
    }

    /// Look the folder up, creating it when missing.
    async fn find_or_create_folder(&self, name: &str) -> Result<FolderRef> {
        if let Some(id) = self.find_folder(name).await? {
            return Ok(FolderRef { id, created: false });
        }
        let id = self.create_folder(name).await?;
        Ok(FolderRef { id, created: true })
    }
}

/// [`DriveApi`] over HTTPS with a bearer token.
#[derive(Debug, Clone)]
pub struct DriveClient {
    http: Client,
    access_token: String,
    api_base: String,
    upload_base: String,
    resumable_threshold: u64,
    chunk_size: usize,
}

impl DriveClient {
    #[must_use]
    pub fn new(http: Client, access_token: impl Into<String>, endpoints: &Endpoints) -> Self {
        Self {
            http,
            access_token: access_token.into(),
            api_base: endpoints.api_base.clone(),
            upload_base: endpoints.upload_base.clone(),
            resumable_threshold: RESUMABLE_THRESHOLD,
            chunk_size: CHUNK_SIZE,
        }
    }

    /// Override the resumable threshold and chunk size.
    #[must_use]
    pub fn with_upload_limits(mut self, resumable_threshold: u64, chunk_size: usize) -> Self {
        self.resumable_threshold = resumable_threshold;
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_base)
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/drive/v3/files", self.upload_base)
    }

    async fn upload_multipart(
        &self,
        path: &Path,
        name: &str,
        mime_type: &str,
        parent_id: &str,
    ) -> Result<String> {
        let content = tokio::fs::read(path).await?;
        let metadata = serde_json::json!({ "name": name, "parents": [parent_id] });
        let body = multipart_body(&metadata.to_string(), mime_type, &content);

        let response = self
            .http
            .post(self.upload_url())
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "multipart"), ("fields", "id")])
            .header(
                header::CONTENT_TYPE,
                format!("multipart/related; boundary={MULTIPART_BOUNDARY}"),
            )
            .body(body)
            .send()
            .await?;

        let created: CreatedFile = check_drive_response(response, "upload")
            .await?
            .json()
            .await?;
        Ok(created.id)
    }

    async fn upload_resumable(
        &self,
        path: &Path,
        name: &str,
        mime_type: &str,
        parent_id: &str,
        size: u64,
    ) -> Result<String> {
        let metadata = serde_json::json!({ "name": name, "parents": [parent_id] });
        let response = self
            .http
            .post(self.upload_url())
            .bearer_auth(&self.access_token)
            .query(&[("uploadType", "resumable"), ("fields", "id")])
            .header("X-Upload-Content-Type", mime_type)
            .header("X-Upload-Content-Length", size.to_string())
            .json(&metadata)
            .send()
            .await?;
        let response = check_drive_response(response, "start resumable upload").await?;

        let session_url = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| GdabError::DriveApi {
                operation: "start resumable upload".to_string(),
                status_code: Some(response.status().as_u16()),
                message: "response carried no upload session URL".to_string(),
            })?;

        let mut file = tokio::fs::File::open(path).await?;
        let mut buffer = vec![0u8; self.chunk_size];
        let mut offset: u64 = 0;
        let mut stalled = 0;

        while offset < size {
            file.seek(std::io::SeekFrom::Start(offset)).await?;
            let len = read_chunk(&mut file, &mut buffer).await?;
            if len == 0 {
                return Err(GdabError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("{} shrank during upload", path.display()),
                )));
            }

            let end = offset + len as u64 - 1;
            tracing::trace!(offset, end, size, "Uploading chunk");

            let response = self
                .http
                .put(&session_url)
                .header(header::CONTENT_RANGE, content_range(offset, end, size))
                .body(buffer[..len].to_vec())
                .send()
                .await?;

            if response.status() == StatusCode::PERMANENT_REDIRECT {
                // No Range header means Drive kept none of the session's bytes.
                let next = response
                    .headers()
                    .get(header::RANGE)
                    .and_then(|v| v.to_str().ok())
                    .and_then(committed_end)
                    .map_or(0, |stored| stored + 1);
                if next <= offset {
                    stalled += 1;
                    if stalled >= MAX_STALLED_CHUNKS {
                        return Err(GdabError::DriveApi {
                            operation: "upload chunk".to_string(),
                            status_code: Some(StatusCode::PERMANENT_REDIRECT.as_u16()),
                            message: format!("upload of {name} stopped progressing at byte {offset}"),
                        });
                    }
                } else {
                    stalled = 0;
                }
                if next != end + 1 {
                    tracing::debug!(sent_end = end, resume_at = next, "Drive stored a partial chunk");
                }
                offset = next;
                continue;
            }

            let created: CreatedFile = check_drive_response(response, "upload chunk")
                .await?
                .json()
                .await?;
            return Ok(created.id);
        }

        Err(GdabError::DriveApi {
            operation: "upload chunk".to_string(),
            status_code: Some(StatusCode::PERMANENT_REDIRECT.as_u16()),
            message: format!("upload of {name} ended without a created file"),
        })
    }
}

impl DriveApi for DriveClient {
    async fn find_folder(&self, name: &str) -> Result<Option<String>> {
        let query = format!(
            "mimeType='{FOLDER_MIME_TYPE}' and name='{}' and trashed=false",
            escape_query(name)
        );
        let response = self
            .http
            .get(self.files_url())
            .bearer_auth(&self.access_token)
            .query(&[
                ("q", query.as_str()),
                ("spaces", "drive"),
                ("fields", "files(id,name)"),
            ])
            .send()
            .await?;

        let list: FileList = check_drive_response(response, "find folder")
            .await?
            .json()
            .await?;
        Ok(list.files.into_iter().next().map(|f| f.id))
    }

    async fn create_folder(&self, name: &str) -> Result<String> {
        let response = self
            .http
            .post(self.files_url())
            .bearer_auth(&self.access_token)
            .query(&[("fields", "id")])
            .json(&serde_json::json!({ "name": name, "mimeType": FOLDER_MIME_TYPE }))
            .send()
            .await?;

        let created: CreatedFile = check_drive_response(response, "create folder")
            .await?
            .json()
            .await?;
        Ok(created.id)
    }

    async fn upload_file(
        &self,
        path: &Path,
        name: &str,
        mime_type: &str,
        parent_id: &str,
    ) -> Result<UploadedFile> {
        let size = tokio::fs::metadata(path).await?.len();
        let strategy = self.upload_strategy(size);
        tracing::debug!(name, size, ?strategy, "Uploading file");

        let id = match strategy {
            UploadStrategy::Multipart => {
                self.upload_multipart(path, name, mime_type, parent_id)
                    .await?
            }
            UploadStrategy::Resumable => {
                self.upload_resumable(path, name, mime_type, parent_id, size)
                    .await?
            }
        };

        Ok(UploadedFile {
            id,
            name: name.to_string(),
            size,
            strategy,
        })
    }

    async fn list_children(&self, folder_id: &str) -> Result<Vec<RemoteFile>> {
        let query = format!("'{}' in parents and trashed=false", escape_query(folder_id));
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(self.files_url())
                .bearer_auth(&self.access_token)
                .query(&[
                    ("q", query.as_str()),
                    ("spaces", "drive"),
                    ("orderBy", "createdTime"),
                    ("pageSize", PAGE_SIZE),
                    ("fields", LIST_FIELDS),
                ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: FileList = check_drive_response(request.send().await?, "list files")
                .await?
                .json()
                .await?;
            files.extend(page.files);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!(folder_id, count = files.len(), "Listed folder");
        Ok(files)
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        let response = self
            .http
            .delete(format!("{}/{file_id}", self.files_url()))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        check_drive_response(response, "delete file").await?;
        Ok(())
    }

    async fn about(&self) -> Result<About> {
        let response = self
            .http
            .get(format!("{}/drive/v3/about", self.api_base))
            .bearer_auth(&self.access_token)
            .query(&[("fields", "storageQuota,user")])
            .send()
            .await?;
        Ok(check_drive_response(response, "about").await?.json().await?)
    }

    fn upload_strategy(&self, size: u64) -> UploadStrategy {
        UploadStrategy::for_size(size, self.resumable_threshold)
    }
}

/// Fill `buffer` from `file`, stopping early only at end of file.
async fn read_chunk(file: &mut tokio::fs::File, buffer: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = file.read(&mut buffer[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Escape a value for use inside a single-quoted Drive query string.
#[must_use]
pub fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Last byte Drive has stored, from a `Range: bytes=0-<end>` reply header.
#[must_use]
pub fn committed_end(range: &str) -> Option<u64> {
    let (_, end) = range.trim().strip_prefix("bytes=")?.split_once('-')?;
    end.trim().parse().ok()
}

/// `Content-Range` header value for bytes `start..=end` of `total`.
#[must_use]
pub fn content_range(start: u64, end: u64, total: u64) -> String {
    format!("bytes {start}-{end}/{total}")
}

fn multipart_body(metadata: &str, mime_type: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(content.len() + metadata.len() + 256);
    body.extend_from_slice(
        format!(
            "--{MULTIPART_BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n--{MULTIPART_BOUNDARY}\r\nContent-Type: {mime_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
    body
}
