use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::scrapers::types::slugify;

/// `{source}_{city}_{locality}_{timestamp}.json`
pub fn result_file_name(label: &str, city: &str, locality: &str) -> String {
    format!(
        "{}_{}_{}_{}.json",
        label,
        slugify(city, '-'),
        slugify(locality, '-'),
        Utc::now().format("%Y%m%d_%H%M%S")
    )
}

/// Write a response payload next to earlier ones; nothing ever reads these back
pub async fn save_results<T: Serialize>(
    dir: &Path,
    label: &str,
    city: &str,
    locality: &str,
    payload: &T,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let path = dir.join(result_file_name(label, city, locality));
    let json = serde_json::to_string_pretty(payload)?;
    tokio::fs::write(&path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!("💾 Saved results to {}", path.display());
    Ok(path)
}
