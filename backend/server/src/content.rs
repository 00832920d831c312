//! # Content Store
//!
//! Relational store holding models, galleries, blog posts and site config.
//!
//! We only ever read one thing from it here: a record's `updated_at`, used as the stable `v=` cache token.
//!
//! ```sh
//! curl -H "apikey: $(cat /run/secrets/STORAGE_SERVICE_KEY)" \
//!   "http://localhost:54321/rest/v1/models?id=eq.42&select=updated_at"
//! ```
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use showcase::cache_bust::{LookupError, VersionLookup};

#[derive(Deserialize)]
struct VersionRow {
    updated_at: Option<String>,
}

pub struct RestContentStore {
    client: Client,
    base_url: String,
    service_key: String,
}

impl RestContentStore {
    pub fn new(client: Client, base_url: &str, service_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }
}

#[async_trait]
impl VersionLookup for RestContentStore {
    async fn last_modified(
        &self,
        table: &str,
        id: &str,
    ) -> Result<Option<DateTime<Utc>>, LookupError> {
        if !is_identifier(table) {
            return Err(format!("invalid table name: {table}").into());
        }

        let rows: Vec<VersionRow> = self
            .client
            .get(format!("{}/rest/v1/{table}", self.base_url))
            .query(&[("id", format!("eq.{id}")), ("select", "updated_at".to_string())])
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        parse_version(rows)
    }
}

fn parse_version(rows: Vec<VersionRow>) -> Result<Option<DateTime<Utc>>, LookupError> {
    let Some(raw) = rows.into_iter().next().and_then(|row| row.updated_at) else {
        return Ok(None);
    };

    let modified = DateTime::parse_from_rfc3339(&raw)?;

    Ok(Some(modified.with_timezone(&Utc)))
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{VersionRow, is_identifier, parse_version};

    fn row(updated_at: Option<&str>) -> VersionRow {
        VersionRow {
            updated_at: updated_at.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_version() {
        let parsed = parse_version(vec![row(Some("2025-03-01T12:00:00+00:00"))]).unwrap();

        assert_eq!(parsed, Some(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()));
    }

    #[test]
    fn test_parse_version_offset() {
        let parsed = parse_version(vec![row(Some("2025-03-01T14:00:00.250+02:00"))])
            .unwrap()
            .unwrap();

        let noon = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

        assert_eq!(parsed.timestamp_millis(), noon.timestamp_millis() + 250);
    }

    #[test]
    fn test_missing_version() {
        assert_eq!(parse_version(vec![]).unwrap(), None);
        assert_eq!(parse_version(vec![row(None)]).unwrap(), None);
        assert!(parse_version(vec![row(Some("yesterday"))]).is_err());
    }

    #[test]
    fn test_identifier() {
        assert!(is_identifier("models"));
        assert!(is_identifier("model_gallery"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("models?select=*"));
    }
}
