//! Check system capabilities.

use reelcut_common::pool::MAX_WORKERS;
use reelcut_render_engine::backend::ffmpeg_available;

pub fn run() -> anyhow::Result<()> {
    println!("Reelcut System Check");
    println!("{}", "=".repeat(50));

    if ffmpeg_available() {
        println!("[OK] ffmpeg found on PATH");
    } else {
        println!("[FAIL] ffmpeg not found; export requires it");
    }

    let parallelism = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    println!(
        "[OK] Render workers: {} (of {} hardware threads)",
        parallelism.min(MAX_WORKERS),
        parallelism
    );

    let config = reelcut_common::config::AppConfig::load();
    println!(
        "[OK] Config: chunk size {} frames, {} kbps {}",
        config.export.chunk_size_frames, config.export.video_bitrate_kbps, config.export.video_codec
    );

    println!();
    if ffmpeg_available() {
        println!("Reelcut is ready.");
    } else {
        println!("Install ffmpeg to enable export.");
    }

    Ok(())
}
