use std::{collections::HashSet, fs, path::Path};

use anyhow::{Context, Result};
use indicatif::ProgressStyle;

use crate::models::{ManifestEntry, MappingEntry};

pub fn read_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;

    let entries: Vec<ManifestEntry> =
        serde_json::from_str(&raw).context("Manifest is not a JSON array of entries")?;

    Ok(clean_entries(entries))
}

/// Trims urls, drops blanks and repeated urls, keeps the first occurrence.
pub fn clean_entries(entries: Vec<ManifestEntry>) -> Vec<ManifestEntry> {
    let mut seen = HashSet::new();

    entries
        .into_iter()
        .map(|entry| ManifestEntry {
            image_url: entry.image_url.trim().to_string(),
            image_type: entry.image_type,
        })
        .filter(|entry| !entry.image_url.is_empty())
        .filter(|entry| seen.insert(entry.image_url.clone()))
        .collect()
}

pub fn write_mapping(path: &Path, mapping: &[MappingEntry]) -> Result<()> {
    let json = serde_json::to_string_pretty(mapping)?;

    fs::write(path, json).with_context(|| format!("Failed to write mapping {}", path.display()))
}

pub fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ")
}
