use serde::{Deserialize, Serialize};

pub const DEFAULT_ENDPOINT: &str = "http://localhost:1111/functions/sync-image-to-local";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub local_path: String,
    pub cached_url: String,
    pub original_url: String,
}

#[derive(Deserialize)]
pub struct SyncFailure {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingEntry {
    pub original_url: String,
    pub local_path: String,
    pub cached_url: String,
}

impl From<SyncResponse> for MappingEntry {
    fn from(response: SyncResponse) -> Self {
        Self {
            original_url: response.original_url,
            local_path: response.local_path,
            cached_url: response.cached_url,
        }
    }
}
