use crate::domain::value_objects::{ClientId, PhotoId, UploadStatus};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Captured photo waiting to be uploaded and attached to a daily chore.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoQueueEntry {
    pub id: PhotoId,
    pub daily_chore_id: ClientId,
    #[serde(skip)]
    pub blob: Vec<u8>,
    #[serde(skip)]
    pub thumbnail: Option<Vec<u8>>,
    pub mime_type: String,
    pub original_size: u64,
    pub compressed_size: u64,
    /// sha256 hex of `blob` at capture time.
    pub checksum: String,
    pub captured_at: i64,
    pub captured_by: String,
    pub upload_status: UploadStatus,
    pub retry_count: u32,
    pub last_attempt_at: Option<i64>,
    pub next_retry_at: Option<i64>,
}

/// Photo handed over by the capture layer, already compressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPhoto {
    pub daily_chore_id: ClientId,
    pub blob: Vec<u8>,
    pub thumbnail: Option<Vec<u8>>,
    pub mime_type: String,
    pub original_size: u64,
    pub captured_by: String,
}

impl PhotoQueueEntry {
    pub fn from_capture(photo: CapturedPhoto, captured_at: i64) -> Result<Self, String> {
        if photo.blob.is_empty() {
            return Err(format!(
                "Refusing to queue an empty photo for {}",
                photo.daily_chore_id
            ));
        }
        let checksum = checksum_hex(&photo.blob);
        let compressed_size = photo.blob.len() as u64;
        Ok(Self {
            id: PhotoId::generate(),
            daily_chore_id: photo.daily_chore_id,
            thumbnail: photo.thumbnail.filter(|t| !t.is_empty()),
            blob: photo.blob,
            mime_type: photo.mime_type,
            original_size: photo.original_size,
            compressed_size,
            checksum,
            captured_at,
            captured_by: photo.captured_by,
            upload_status: UploadStatus::Pending,
            retry_count: 0,
            last_attempt_at: None,
            next_retry_at: None,
        })
    }

    /// Whether the stored blob is still the one that was captured.
    pub fn blob_is_intact(&self) -> bool {
        !self.blob.is_empty() && checksum_hex(&self.blob) == self.checksum
    }

    pub fn is_due(&self, now_ms: i64) -> bool {
        self.next_retry_at.is_none_or(|at| at <= now_ms)
    }
}

// Blobs are large; print sizes instead.
impl std::fmt::Debug for PhotoQueueEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoQueueEntry")
            .field("id", &self.id)
            .field("daily_chore_id", &self.daily_chore_id)
            .field("blob_len", &self.blob.len())
            .field("thumbnail_len", &self.thumbnail.as_ref().map(Vec::len))
            .field("upload_status", &self.upload_status)
            .field("retry_count", &self.retry_count)
            .field("next_retry_at", &self.next_retry_at)
            .finish()
    }
}

pub fn checksum_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
