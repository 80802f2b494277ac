use std::path::{Path, PathBuf};

/// Write a turn's screenshot as `<dir>/<timestamp>-turn<NNN>.png`.
pub fn save_screenshot(dir: &Path, turn: usize, png: &[u8]) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let name = format!(
        "{}-turn{:03}.png",
        chrono::Local::now().format("%Y%m%d%H%M%S"),
        turn
    );
    let path = dir.join(name);
    std::fs::write(&path, png)?;
    Ok(path)
}
