use std::path::Path;

use crate::error::Result;

/// Fixed assets fetched once at startup: (file name, shared drive id)
const ASSETS: &[(&str, &str)] = &[
    ("catalog.csv", "1Y1DW_sY2mnK8Ty080fRtLQ4shMKHOZCG"),
    ("embedding_bank.json", "1-1ikhnjrS3ZdDfroa9sDTq4P5mELa0KL"),
    ("clip_image_encoder.pt", "1cZm-MVPCVcvkY0FJ9iZpDjSe9JiPIzm7"),
];

/// Download any missing assets into the drive directory.
///
/// Files already present on disk are left untouched, so a populated drive
/// directory makes this a no-op and the service can start offline.
pub async fn ensure_assets(client: &reqwest::Client, drive_dir: &Path) -> Result<()> {
    fetch_missing(client, drive_dir, ASSETS).await
}

async fn fetch_missing(
    client: &reqwest::Client,
    drive_dir: &Path,
    assets: &[(&str, &str)],
) -> Result<()> {
    std::fs::create_dir_all(drive_dir)?;

    for (name, file_id) in assets {
        let output = drive_dir.join(name);

        if output.exists() {
            tracing::info!("{} already exists locally", name);
            continue;
        }

        let url = format!("https://drive.google.com/uc?id={}", file_id);
        tracing::info!("Downloading {} from shared drive...", name);

        let response = client.get(&url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        std::fs::write(&output, &bytes)?;

        tracing::info!("Saved {} ({} bytes)", output.display(), bytes.len());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[tokio::test]
    async fn test_existing_assets_are_skipped() {
        let dir = assert_fs::TempDir::new().unwrap();
        for (name, _) in ASSETS {
            dir.child(name).write_str("stub").unwrap();
        }

        // All files present, so no request is ever made
        let client = reqwest::Client::new();
        ensure_assets(&client, dir.path()).await.unwrap();

        for (name, _) in ASSETS {
            dir.child(name).assert("stub");
        }
    }

    #[tokio::test]
    async fn test_creates_drive_dir() {
        let dir = assert_fs::TempDir::new().unwrap();
        let nested = dir.path().join("data/drive");
        assert!(!nested.exists());

        // An empty asset list never touches the network but still has to
        // create the directory
        let client = reqwest::Client::new();
        fetch_missing(&client, &nested, &[]).await.unwrap();

        assert!(nested.is_dir());
    }
}
