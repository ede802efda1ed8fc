//! Probe a media file and print its metadata.

use std::path::PathBuf;

use reelcut_job_model::SourceRole;
use reelcut_media_probe::probe;

pub async fn run(path: PathBuf) -> anyhow::Result<()> {
    let result = probe(&path, SourceRole::Primary).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
