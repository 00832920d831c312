//! # Cache-Busting
//!
//! Appends a freshness token to URLs served by our own storage.
//!
//! ## Rules
//! 1. URL not on a managed storage host: unchanged
//! 2. Content record given and client not mobile: `v={last modified millis}` from the content store
//! 3. Mobile client: `t={now millis}&cb={salt}`, different on every call
//! 4. Otherwise unchanged
//!
//! ## Notes
//! - `v` only changes when the record changes, so CDN caches keep working
//! - `t`/`cb` defeats every cache on purpose
//! - Storage ignores all three parameters, only intermediary caches see them
//! - Failed version lookups leave the URL untouched
use std::{error::Error, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use tracing::{debug, warn};
use url::Url;

use crate::client::ClientContext;

pub const VERSION_PARAM: &str = "v";
pub const TIMESTAMP_PARAM: &str = "t";
pub const SALT_PARAM: &str = "cb";

const SALT_LEN: usize = 8;

pub type LookupError = Box<dyn Error + Send + Sync>;

/// Last-modified lookup for content records.
#[async_trait]
pub trait VersionLookup: Send + Sync {
    async fn last_modified(&self, table: &str, id: &str)
    -> Result<Option<DateTime<Utc>>, LookupError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRef {
    pub table: String,
    pub id: String,
}

impl ContentRef {
    pub fn new(table: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnnotateOptions {
    pub client: ClientContext,
    pub content: Option<ContentRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheToken {
    Version(i64),
    Salted { timestamp: i64, salt: String },
}

impl CacheToken {
    pub fn salted() -> Self {
        let salt = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SALT_LEN)
            .map(char::from)
            .collect();

        CacheToken::Salted {
            timestamp: Utc::now().timestamp_millis(),
            salt,
        }
    }

    /// Appends the token. The existing query text is left as it was.
    pub fn apply(&self, url: &mut Url) {
        let mut query = url.query_pairs_mut();

        match self {
            CacheToken::Version(stamp) => {
                query.append_pair(VERSION_PARAM, &stamp.to_string());
            }
            CacheToken::Salted { timestamp, salt } => {
                query.append_pair(TIMESTAMP_PARAM, &timestamp.to_string());
                query.append_pair(SALT_PARAM, salt);
            }
        }
    }
}

#[derive(Clone)]
pub struct Annotator {
    managed_hosts: Vec<String>,
    versions: Arc<dyn VersionLookup>,
}

impl Annotator {
    pub fn new(managed_hosts: Vec<String>, versions: Arc<dyn VersionLookup>) -> Self {
        let managed_hosts = managed_hosts
            .into_iter()
            .map(|host| host.trim().to_ascii_lowercase())
            .filter(|host| !host.is_empty())
            .collect();

        Self {
            managed_hosts,
            versions,
        }
    }

    pub fn is_managed(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();

        self.managed_hosts.iter().any(|managed| {
            host == *managed
                || host
                    .strip_suffix(managed.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    pub async fn annotate(&self, url: &str, opts: &AnnotateOptions) -> String {
        let Ok(mut parsed) = Url::parse(url) else {
            return url.to_string();
        };

        if !self.is_managed(&parsed) {
            return url.to_string();
        }

        let token = match (&opts.content, opts.client.is_mobile) {
            (Some(content), false) => self.version_token(content).await,
            (_, true) => Some(CacheToken::salted()),
            (None, false) => None,
        };

        let Some(token) = token else {
            return url.to_string();
        };

        token.apply(&mut parsed);
        debug!(url = %parsed, "Annotated image url");

        parsed.into()
    }

    async fn version_token(&self, content: &ContentRef) -> Option<CacheToken> {
        match self
            .versions
            .last_modified(&content.table, &content.id)
            .await
        {
            Ok(Some(modified)) => Some(CacheToken::Version(modified.timestamp_millis())),
            Ok(None) => {
                debug!(table = %content.table, id = %content.id, "No version for content record");
                None
            }
            Err(e) => {
                warn!(
                    table = %content.table,
                    id = %content.id,
                    "Content version lookup failed: {e}"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use url::Url;

    use super::{
        AnnotateOptions, Annotator, CacheToken, ContentRef, LookupError, VersionLookup,
    };
    use crate::client::ClientContext;

    const MANAGED: &str = "https://cdn.example.com/models/a.jpg";

    #[derive(Default)]
    struct Versions {
        records: HashMap<(String, String), DateTime<Utc>>,
        calls: AtomicUsize,
        broken: bool,
    }

    #[async_trait]
    impl VersionLookup for Versions {
        async fn last_modified(
            &self,
            table: &str,
            id: &str,
        ) -> Result<Option<DateTime<Utc>>, LookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);

            if self.broken {
                return Err("content store down".into());
            }

            Ok(self
                .records
                .get(&(table.to_string(), id.to_string()))
                .copied())
        }
    }

    fn modified() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn versions() -> Arc<Versions> {
        let mut records = HashMap::new();
        records.insert(("models".to_string(), "42".to_string()), modified());

        Arc::new(Versions {
            records,
            ..Default::default()
        })
    }

    fn annotator(versions: Arc<Versions>) -> Annotator {
        Annotator::new(vec!["cdn.example.com".to_string()], versions)
    }

    fn params(url: &str) -> HashMap<String, String> {
        Url::parse(url).unwrap().query_pairs().into_owned().collect()
    }

    fn desktop_with(table: &str, id: &str) -> AnnotateOptions {
        AnnotateOptions {
            client: ClientContext::DESKTOP,
            content: Some(ContentRef::new(table, id)),
        }
    }

    fn mobile() -> AnnotateOptions {
        AnnotateOptions {
            client: ClientContext::MOBILE,
            content: None,
        }
    }

    #[tokio::test]
    async fn test_no_rule_applies() {
        let annotator = annotator(versions());

        assert_eq!(annotator.annotate(MANAGED, &AnnotateOptions::default()).await, MANAGED);
    }

    #[tokio::test]
    async fn test_unmanaged_host_unchanged() {
        let versions = versions();
        let annotator = annotator(versions.clone());

        let url = "https://x.com/b.jpg";
        assert_eq!(annotator.annotate(url, &mobile()).await, url);
        assert_eq!(annotator.annotate(url, &desktop_with("models", "42")).await, url);
        assert_eq!(annotator.annotate("/images/a.jpg", &mobile()).await, "/images/a.jpg");
        assert_eq!(versions.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_version_token() {
        let annotator = annotator(versions());

        let annotated = annotator.annotate(MANAGED, &desktop_with("models", "42")).await;
        let params = params(&annotated);

        assert!(annotated.starts_with(MANAGED));
        assert_eq!(params["v"], modified().timestamp_millis().to_string());
        assert!(!params.contains_key("t"));
    }

    #[tokio::test]
    async fn test_version_token_is_stable() {
        let annotator = annotator(versions());
        let opts = desktop_with("models", "42");

        assert_eq!(
            annotator.annotate(MANAGED, &opts).await,
            annotator.annotate(MANAGED, &opts).await
        );
    }

    #[tokio::test]
    async fn test_missing_record_unchanged() {
        let annotator = annotator(versions());

        assert_eq!(annotator.annotate(MANAGED, &desktop_with("models", "7")).await, MANAGED);
    }

    #[tokio::test]
    async fn test_lookup_failure_unchanged() {
        let annotator = annotator(Arc::new(Versions {
            broken: true,
            ..Default::default()
        }));

        assert_eq!(annotator.annotate(MANAGED, &desktop_with("models", "42")).await, MANAGED);
    }

    #[tokio::test]
    async fn test_mobile_salted() {
        let versions = versions();
        let annotator = annotator(versions.clone());

        let first = params(&annotator.annotate(MANAGED, &mobile()).await);
        let second = params(&annotator.annotate(MANAGED, &mobile()).await);

        assert!(first.contains_key("t"));
        assert_eq!(first["cb"].len(), 8);
        assert_ne!(first["cb"], second["cb"]);
        assert_eq!(versions.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_mobile_ignores_content_version() {
        let versions = versions();
        let annotator = annotator(versions.clone());
        let opts = AnnotateOptions {
            client: ClientContext::MOBILE,
            content: Some(ContentRef::new("models", "42")),
        };

        let params = params(&annotator.annotate(MANAGED, &opts).await);

        assert!(params.contains_key("t"));
        assert!(params.contains_key("cb"));
        assert!(!params.contains_key("v"));
        assert_eq!(versions.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_existing_query_kept() {
        let annotator = annotator(versions());
        let url = "https://img.cdn.example.com/a.jpg?width=400&title=red%20dress&v=1";

        let annotated = annotator.annotate(url, &desktop_with("models", "42")).await;

        assert_eq!(
            annotated,
            format!("{url}&v={}", modified().timestamp_millis())
        );
    }

    #[tokio::test]
    async fn test_salted_query_appended() {
        let annotator = annotator(versions());
        let url = "https://cdn.example.com/a.jpg?t=1&cb=mine";

        let annotated = annotator.annotate(url, &mobile()).await;

        assert!(annotated.starts_with(&format!("{url}&t=")));
        assert_eq!(annotated.matches("cb=").count(), 2);
    }

    #[test]
    fn test_managed_host_matching() {
        let annotator = annotator(versions());

        let managed = |url: &str| annotator.is_managed(&Url::parse(url).unwrap());

        assert!(managed("https://cdn.example.com/a.jpg"));
        assert!(managed("https://eu.CDN.example.com/a.jpg"));
        assert!(!managed("https://evilcdn.example.com/a.jpg"));
        assert!(!managed("https://example.com/a.jpg"));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(CacheToken::salted(), CacheToken::salted());
    }
}
