//! HTTP seam between the orchestrator and the recognition server.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::TaskId,
    protocol::{
        RecognizeRequest, RecognizeResponse, StatusResponse, UploadResponse, UPLOAD_FIELD,
    },
};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::file::SelectedFile;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("server responded with status {status}")]
    Status { status: u16 },
    #[error("{0}")]
    Transport(String),
    #[error("malformed server response: {0}")]
    Decode(String),
    #[error("invalid server url '{0}'")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else if let Some(status) = value.status() {
            Self::Status {
                status: status.as_u16(),
            }
        } else {
            Self::Transport(value.to_string())
        }
    }
}

#[async_trait]
pub trait RecognitionApi: Send + Sync {
    /// `contents` is the body of `file`, already loaded by the caller.
    async fn upload(&self, file: &SelectedFile, contents: Bytes)
        -> Result<UploadResponse, ApiError>;
    async fn recognize(&self, filename: &str) -> Result<RecognizeResponse, ApiError>;
    async fn status(&self, task_id: &TaskId) -> Result<StatusResponse, ApiError>;
    async fn download(&self, filename: &str) -> Result<Vec<u8>, ApiError>;
    fn download_url(&self, filename: &str) -> Result<Url, ApiError>;
}

pub struct HttpRecognitionApi {
    http: Client,
    base_url: Url,
}

impl HttpRecognitionApi {
    pub fn new(server_url: &str) -> Result<Self, ApiError> {
        let base_url =
            Url::parse(server_url).map_err(|_| ApiError::InvalidUrl(server_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl(server_url.to_string()));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn ensure_success(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
        });
    }
    Ok(response)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = ensure_success(response)?.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

#[async_trait]
impl RecognitionApi for HttpRecognitionApi {
    async fn upload(
        &self,
        file: &SelectedFile,
        contents: Bytes,
    ) -> Result<UploadResponse, ApiError> {
        let size_bytes = contents.len() as u64;
        let part = multipart::Part::stream_with_length(contents, size_bytes)
            .file_name(file.name().to_string())
            .mime_str(file.mime_type())?;
        let form = multipart::Form::new().part(UPLOAD_FIELD, part);
        let url = self.endpoint(&["upload"])?;
        debug!(%url, filename = file.name(), size_bytes, "uploading file");
        let response = self.http.post(url).multipart(form).send().await?;
        read_json(response).await
    }

    async fn recognize(&self, filename: &str) -> Result<RecognizeResponse, ApiError> {
        let url = self.endpoint(&["recognize"])?;
        let response = self
            .http
            .post(url)
            .json(&RecognizeRequest {
                filename: filename.to_string(),
            })
            .send()
            .await?;
        read_json(response).await
    }

    async fn status(&self, task_id: &TaskId) -> Result<StatusResponse, ApiError> {
        let url = self.endpoint(&["status", task_id.as_str()])?;
        let response = self.http.get(url).send().await?;
        read_json(response).await
    }

    async fn download(&self, filename: &str) -> Result<Vec<u8>, ApiError> {
        let url = self.download_url(filename)?;
        let bytes = ensure_success(self.http.get(url).send().await?)?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }

    fn download_url(&self, filename: &str) -> Result<Url, ApiError> {
        self.endpoint(&["download", filename])
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
