use url::Url;

pub const DEFAULT_EXTENSION: &str = "jpg";

/// Content type served for a bucket key, by extension. Anything unknown is served as jpeg.
pub fn from_key(key: &str) -> &'static str {
    match extension(key).as_deref() {
        Some("webp") => "image/webp",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("avif") => "image/avif",
        _ => "image/jpeg",
    }
}

/// Lowercased extension of the last path segment, if it looks like one.
pub fn extension(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let name = path.rsplit('/').next().unwrap_or_default();
    let (stem, ext) = name.rsplit_once('.')?;

    let valid = !stem.is_empty()
        && (1..=5).contains(&ext.len())
        && ext.chars().all(|c| c.is_ascii_alphanumeric());

    valid.then(|| ext.to_ascii_lowercase())
}

/// Extension of a source image URL, `jpg` when the URL does not carry one.
pub fn extension_from_url(source: &str) -> String {
    Url::parse(source)
        .ok()
        .and_then(|url| extension(url.path()))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}
