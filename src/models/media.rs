//! Media upload payloads and responses.

use serde::{Deserialize, Serialize};

/// A file to upload for a member.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PicUpload {
    pub pic: String,
    pub pic_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotosUpload {
    pub photos: String,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub keys: Vec<String>,
}
