use serde::{Deserialize, Serialize};
use url::Url;

/// Every source available for one logical image slot, e.g. a model's primary photo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCandidateSet {
    #[serde(default)]
    pub local: Option<String>,
    #[serde(default)]
    pub external: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
}

impl ImageCandidateSet {
    pub fn new(
        local: Option<impl Into<String>>,
        external: Option<impl Into<String>>,
        placeholder: Option<impl Into<String>>,
    ) -> Self {
        Self {
            local: local.map(Into::into),
            external: external.map(Into::into),
            placeholder: placeholder.map(Into::into),
        }
    }
}

const SCRIPT_SCHEMES: [&str; 2] = ["javascript", "vbscript"];

/// Root-relative path or any absolute URL, non-empty after trimming.
///
/// `data:` and `blob:` sources count. Script schemes never do.
pub fn is_well_formed(candidate: &str) -> bool {
    let candidate = candidate.trim();

    if candidate.is_empty() {
        return false;
    }

    if candidate.starts_with('/') {
        return true;
    }

    Url::parse(candidate)
        .map(|url| !SCRIPT_SCHEMES.contains(&url.scheme()))
        .unwrap_or(false)
}

pub(crate) fn accept(candidate: Option<&str>) -> Option<&str> {
    candidate
        .map(str::trim)
        .filter(|candidate| is_well_formed(candidate))
}
