//! # Client Context
//!
//! Facts about the requesting client, derived once at the edge and passed down explicitly.
//!
//! ## Mobile Detection
//! - Explicit `mobile` override query parameter wins (`1`/`true`/`yes`, `0`/`false`/`no`)
//! - Otherwise case-insensitive user-agent match against a fixed token list
//! - Best-effort only, user agents are untrusted strings
//!
//! ## Notes
//! - Only the cache-bust annotator reads this today
//! - Mobile clients were seen serving stale image bytes from their cache, hence the unstable token
use std::sync::LazyLock;

use regex::Regex;

pub const MOBILE_TOKENS: [&str; 9] = [
    "android",
    "iphone",
    "ipad",
    "ipod",
    "mobile",
    "blackberry",
    "iemobile",
    "opera mini",
    "webos",
];

static MOBILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = MOBILE_TOKENS.map(regex::escape).join("|");

    Regex::new(&format!("(?i){alternatives}")).expect("mobile token pattern is valid")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientContext {
    pub is_mobile: bool,
}

impl ClientContext {
    pub const DESKTOP: Self = Self { is_mobile: false };
    pub const MOBILE: Self = Self { is_mobile: true };

    pub fn detect(user_agent: Option<&str>, mobile_override: Option<&str>) -> Self {
        if let Some(is_mobile) = mobile_override.and_then(parse_override) {
            return Self { is_mobile };
        }

        Self {
            is_mobile: user_agent.is_some_and(|agent| MOBILE_PATTERN.is_match(agent)),
        }
    }
}

fn parse_override(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
