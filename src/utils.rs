use std::{
    fs, io,
    path::{Path, PathBuf},
};

pub fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Writes `contents` next to `path` first and renames it into place, so the
/// destination holds either the old document or the complete new one.
pub fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    ensure_parent(path)?;
    let staging = staging_path(path);
    fs::write(&staging, contents)?;
    if let Err(err) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(err);
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "output".into());
    name.push(".partial");
    path.with_file_name(name)
}
