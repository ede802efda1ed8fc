//! Check host capabilities.

use std::path::Path;

use tokio::process::Command;

use reelcut_common::WorkerConfig;
use reelcut_media_probe::command_exists;
use reelcut_render_engine::hardware_encoder_available;

pub async fn run(config: WorkerConfig) -> anyhow::Result<()> {
    println!("Reelcut Worker Check");
    println!("{}", "=".repeat(50));

    let mut tools_ok = true;
    for tool in ["ffmpeg", "ffprobe"] {
        if command_exists(tool) {
            match version_line(tool).await {
                Some(version) => println!("[OK] {tool}: {version}"),
                None => println!("[OK] {tool}: found (version unknown)"),
            }
        } else {
            println!("[WARN] {tool} not found in PATH");
            tools_ok = false;
        }
    }

    if tools_ok {
        if hardware_encoder_available().await {
            println!("[OK] Hardware encoder: h264_nvenc");
        } else {
            println!("[WARN] No hardware encoder, jobs will use libx264");
        }
    }

    if config.transcription_key.is_some() {
        println!("[OK] Transcription credential present");
    } else {
        println!("[WARN] REELCUT_TRANSCRIBE_KEY unset, captions are disabled");
    }

    report_dir("Scratch directory", &config.scratch_dir);
    report_dir("Output directory", &config.output_dir);

    println!();
    if tools_ok {
        println!("Worker is ready to accept jobs.");
    } else {
        println!("Required tools are missing. Install ffmpeg and ffprobe first.");
    }
    Ok(())
}

async fn version_line(tool: &str) -> Option<String> {
    let output = Command::new(tool)
        .arg("-version")
        .kill_on_drop(true)
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
}

fn report_dir(label: &str, dir: &Path) {
    match std::fs::create_dir_all(dir) {
        Ok(()) => {
            let probe = dir.join(".reelcut-write-check");
            match std::fs::write(&probe, b"ok") {
                Ok(()) => {
                    let _ = std::fs::remove_file(&probe);
                    println!("[OK] {label}: {} (writable)", dir.display());
                }
                Err(e) => println!("[WARN] {label}: {} not writable: {e}", dir.display()),
            }
        }
        Err(e) => println!("[WARN] {label}: cannot create {}: {e}", dir.display()),
    }
}
