//! # Image Backfill
//!
//! Copies external model images into the local cache area, in bulk.
//!
//! ## Flow
//! 1. Read a manifest, a JSON array of `{ "imageUrl": ..., "imageType": ... }`.
//!
//! 2. Drop blank and repeated urls.
//!
//! 3. Post each entry to the sync function, one at a time, single attempt each.
//!
//! 4. Write `{ originalUrl, localPath, cachedUrl }` for every success to the mapping file.
//!    Writing `localPath` back into the content records is left to the admin.
//!
//! ## Notes
//! - The sync function never deduplicates, rerunning a manifest creates new copies
//! - Failures are reported and skipped, nothing is retried
use std::{path::Path, time::Duration};

use anyhow::{Context, Result, anyhow};
use indicatif::ProgressBar;
use reqwest::Client;

pub mod models;
pub mod utils;

use models::{ManifestEntry, MappingEntry, SyncFailure, SyncResponse};
use utils::{progress_style, read_manifest, write_mapping};

pub struct Summary {
    pub synced: usize,
    pub failed: Vec<(String, String)>,
}

pub async fn backfill(
    manifest: &Path,
    endpoint: &str,
    output: &Path,
    timeout: Duration,
) -> Result<Summary> {
    let entries = read_manifest(manifest)?;
    println!("Loaded Entries: {}\n", entries.len());

    let client = Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build http client")?;

    let pb = ProgressBar::new(entries.len() as u64);
    pb.set_style(progress_style());

    let mut mapping = Vec::new();
    let mut failed = Vec::new();

    for entry in &entries {
        pb.set_message(format!("Syncing {}", entry.image_url));

        match sync_one(&client, endpoint, entry).await {
            Ok(synced) => mapping.push(synced),
            Err(e) => {
                pb.println(format!("Failed {}: {e:#}", entry.image_url));
                failed.push((entry.image_url.clone(), format!("{e:#}")));
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");

    write_mapping(output, &mapping)?;

    println!("\nSynced: {}", mapping.len());
    println!("Failed: {}", failed.len());
    println!("Mapping: {}", output.display());

    Ok(Summary {
        synced: mapping.len(),
        failed,
    })
}

async fn sync_one(client: &Client, endpoint: &str, entry: &ManifestEntry) -> Result<MappingEntry> {
    let response = client.post(endpoint).json(entry).send().await?;
    let status = response.status();

    if !status.is_success() {
        let reason = response
            .json::<SyncFailure>()
            .await
            .map(|failure| failure.error)
            .unwrap_or_else(|_| status.to_string());

        return Err(anyhow!("{status}: {reason}"));
    }

    let synced: SyncResponse = response.json().await?;

    Ok(synced.into())
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf, time::Duration};

    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::{Value, json};
    use tempfile::{TempDir, tempdir};
    use tokio::net::TcpListener;

    use super::{backfill, models::MappingEntry};

    fn manifest(dir: &TempDir, body: &str) -> (PathBuf, PathBuf) {
        let manifest = dir.path().join("manifest.json");
        fs::write(&manifest, body).unwrap();

        (manifest, dir.path().join("mapping.json"))
    }

    /// Answers like the sync function. Urls containing `missing` fail upstream.
    async fn spawn_sync_endpoint() -> String {
        let app = Router::new().route(
            "/functions/sync-image-to-local",
            post(|Json(body): Json<Value>| async move {
                let image_url = body["imageUrl"].as_str().unwrap_or_default().to_string();

                if image_url.contains("missing") {
                    return (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "success": false, "error": "Failed to fetch image: Not Found" })),
                    );
                }

                let image_type = body["imageType"].as_str().unwrap_or("image");
                let file_name = format!("{image_type}-1700000000000.jpg");

                (
                    StatusCode::OK,
                    Json(json!({
                        "success": true,
                        "localPath": format!("/images/{file_name}"),
                        "cachedUrl": format!("https://cdn.example.com/local-cache/{file_name}"),
                        "originalUrl": image_url,
                        "fileName": file_name,
                    })),
                )
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{address}/functions/sync-image-to-local")
    }

    #[tokio::test]
    async fn test_successes_written_to_mapping() {
        let endpoint = spawn_sync_endpoint().await;
        let dir = tempdir().unwrap();
        let (manifest, output) = manifest(
            &dir,
            r#"[{"imageUrl":"https://x.com/a.jpg","imageType":"model"},{"imageUrl":"https://x.com/missing.jpg"}]"#,
        );

        let summary = backfill(&manifest, &endpoint, &output, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(summary.synced, 1);
        assert_eq!(summary.failed.len(), 1);
        assert_eq!(summary.failed[0].0, "https://x.com/missing.jpg");
        assert!(summary.failed[0].1.contains("500"));
        assert!(summary.failed[0].1.ends_with("Failed to fetch image: Not Found"));

        let mapping: Vec<MappingEntry> =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(
            mapping,
            vec![MappingEntry {
                original_url: "https://x.com/a.jpg".to_string(),
                local_path: "/images/model-1700000000000.jpg".to_string(),
                cached_url: "https://cdn.example.com/local-cache/model-1700000000000.jpg"
                    .to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_failures() {
        let dir = tempdir().unwrap();
        let (manifest, output) = manifest(
            &dir,
            r#"[{"imageUrl":"https://x.com/a.jpg"},{"imageUrl":"https://x.com/b.jpg"},{"imageUrl":" "}]"#,
        );

        let summary = backfill(
            &manifest,
            "http://127.0.0.1:1/functions/sync-image-to-local",
            &output,
            Duration::from_secs(2),
        )
        .await
        .unwrap();

        assert_eq!(summary.synced, 0);
        assert_eq!(summary.failed.len(), 2);
        assert_eq!(fs::read_to_string(&output).unwrap(), "[]");
    }
}
