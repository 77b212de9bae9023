use crate::application::ports::BlobTransport;
use crate::domain::value_objects::StorageId;
use crate::shared::error::RemoteError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    storage_id: String,
}

/// Raw blob transfer against short-lived upload URLs and serving URLs.
#[derive(Debug, Clone)]
pub struct HttpBlobTransport {
    client: reqwest::Client,
}

impl HttpBlobTransport {
    pub fn new(timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::network(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BlobTransport for HttpBlobTransport {
    async fn upload(
        &self,
        target: String,
        bytes: Vec<u8>,
        mime_type: String,
    ) -> Result<StorageId, RemoteError> {
        let size = bytes.len();
        let response = self
            .client
            .post(&target)
            .header(CONTENT_TYPE, mime_type)
            .body(bytes)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            return Err(RemoteError::api(status, body));
        }
        let storage_id = parse_upload_response(&body)?;
        tracing::debug!(bytes = size, storage_id = %storage_id, "blob uploaded");
        Ok(storage_id)
    }

    async fn download(&self, url: String) -> Result<(Vec<u8>, String), RemoteError> {
        let response = self.client.get(&url).send().await?;
        let status = response.status().as_u16();
        if status == 404 {
            return Err(RemoteError::NotFound(format!("No blob at {url}")));
        }
        if !(200..300).contains(&status) {
            return Err(RemoteError::api(status, format!("Blob download failed: {url}")));
        }
        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = response.bytes().await?;
        Ok((bytes.to_vec(), mime_type))
    }
}

pub(crate) fn parse_upload_response(body: &str) -> Result<StorageId, RemoteError> {
    let parsed: UploadResponse = serde_json::from_str(body)
        .map_err(|e| RemoteError::Rejected(format!("Malformed upload response: {e}")))?;
    StorageId::new(parsed.storage_id).map_err(RemoteError::Rejected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_response_yields_storage_id() {
        let id = parse_upload_response(r#"{"storageId":"kg2abc"}"#).unwrap();
        assert_eq!(id.as_str(), "kg2abc");
    }

    #[test]
    fn malformed_upload_responses_are_rejected() {
        assert!(matches!(
            parse_upload_response("{}"),
            Err(RemoteError::Rejected(_))
        ));
        assert!(matches!(
            parse_upload_response(r#"{"storageId":" "}"#),
            Err(RemoteError::Rejected(_))
        ));
    }
}
