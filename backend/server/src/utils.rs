use std::sync::{
    LazyLock,
    atomic::{AtomicI64, Ordering},
};

use axum::http::{HeaderName, header};
use chrono::Utc;
use regex::Regex;
use showcase::content_type::extension_from_url;

use crate::error::AppError;

pub const LOCAL_CACHE_PREFIX: &str = "local-cache";
pub const LOCAL_PATH_PREFIX: &str = "/images";
pub const PLACEHOLDER_PREFIX: &str = "placeholders";
pub const DEFAULT_IMAGE_TYPE: &str = "image";

pub const PROXY_METHODS: &str = "GET, OPTIONS";
pub const FUNCTION_METHODS: &str = "POST, OPTIONS";

pub const fn cors_headers(methods: &'static str) -> [(HeaderName, &'static str); 4] {
    [
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        (header::ACCESS_CONTROL_ALLOW_METHODS, methods),
        (header::ACCESS_CONTROL_ALLOW_HEADERS, "*"),
        (header::ACCESS_CONTROL_MAX_AGE, "86400"),
    ]
}

static LAST_STAMP: AtomicI64 = AtomicI64::new(0);

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_-]+").expect("valid pattern"));
static REPEATED_DASHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-{2,}").expect("valid pattern"));

/// Epoch millis, strictly increasing across the whole process.
pub fn next_stamp() -> i64 {
    let now = Utc::now().timestamp_millis();
    let previous = LAST_STAMP
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);

    now.max(previous + 1)
}

/// Bucket key from a proxy path. Empty keys and `..` segments are rejected.
pub fn normalize_key(raw: &str) -> Result<String, AppError> {
    let key = raw.trim().trim_start_matches('/');

    if key.is_empty() {
        return Err(AppError::MissingKey);
    }

    if key.split('/').any(|segment| segment == ".." || segment == ".") {
        return Err(AppError::InvalidKey);
    }

    Ok(key.to_string())
}

/// Content-based entity tag.
pub fn etag(bytes: &[u8]) -> String {
    format!("\"{}\"", blake3::hash(bytes).to_hex())
}

pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match
        .split(',')
        .map(|tag| tag.trim().trim_start_matches("W/"))
        .any(|tag| tag == "*" || tag == etag)
}

pub fn sanitize(input: &str) -> String {
    let lowered = input.trim().to_lowercase().replace(' ', "-");
    let cleaned = UNSAFE_CHARS.replace_all(&lowered, "");
    let collapsed = REPEATED_DASHES.replace_all(&cleaned, "-");

    collapsed.trim_matches('-').to_string()
}

pub fn image_type_or_default(image_type: Option<&str>) -> String {
    let sanitized = image_type.map(sanitize).unwrap_or_default();

    if sanitized.is_empty() {
        DEFAULT_IMAGE_TYPE.to_string()
    } else {
        sanitized
    }
}

pub fn sync_file_name(image_type: &str, source_url: &str, stamp: i64) -> String {
    format!("{image_type}-{stamp}.{}", extension_from_url(source_url))
}

pub fn escape_xml(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());

    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }

    escaped
}

pub fn render_placeholder(width: u32, height: u32, label: &str) -> String {
    let font_size = (width.min(height) / 12).max(10);

    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}"><rect width="100%" height="100%" fill="#e5e1dc"/><text x="50%" y="50%" dominant-baseline="middle" text-anchor="middle" font-family="sans-serif" font-size="{font_size}" fill="#8a8178">{}</text></svg>"##,
        escape_xml(label)
    )
}
